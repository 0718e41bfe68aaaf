//! Poll voting and live-result engine for chat clients.
//!
//! A [`PollSession`] is the entry point for the UI: it loads polls into a
//! [`PollStore`], validates and submits votes and new polls against a
//! [`PollAuthority`], and keeps snapshots fresh through a
//! [`LiveSyncController`].

pub mod authority;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod store;
pub mod tasks;
pub mod voting;

pub use authority::{InMemoryAuthority, PollAuthority};
pub use config::Config;
pub use error::{ActionError, AuthorityError, Rejection};
pub use handlers::{PollSession, PollView, ViewMode};
pub use models::{Poll, PollMessage, PollOption, PollSnapshot, VoteRecord};
pub use store::PollStore;
pub use tasks::LiveSyncController;
pub use voting::{DraftSelection, PollDraft, PollResults, compute_results};
