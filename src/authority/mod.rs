//! The remote side of the poll engine: the contract the chat backend offers,
//! its request/response shapes, and the change notifications it emits.

pub mod memory;

pub use memory::{AuthorityClient, InMemoryAuthority};

use crate::error::AuthorityError;
use crate::models::{PollPayload, wire};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Options chosen in one submission. Single-choice polls send one id,
/// multi-choice polls send a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VoteSelection {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddVoteRequest {
    pub message_id: String,
    pub option_id: VoteSelection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPollOption {
    pub option: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePollRequest {
    pub question: String,
    pub options: Vec<NewPollOption>,
    pub channel_id: String,
    #[serde(with = "wire::flag")]
    pub is_multi_choice: bool,
    #[serde(with = "wire::flag")]
    pub is_anonymous: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedPoll {
    pub poll_id: String,
    pub message_id: String,
}

/// Who picked an option. Only ever served for non-anonymous polls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionVoters {
    pub option_id: String,
    pub voters: Vec<String>,
}

/// "This poll document changed". Carries no delta: receivers refetch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentChanged {
    pub poll_id: String,
}

pub type ChangeFeed = broadcast::Receiver<DocumentChanged>;

/// Request/response operations offered by the chat backend, scoped to the
/// calling user's session.
#[async_trait]
pub trait PollAuthority: Send + Sync {
    /// Full poll state plus the caller's own votes.
    async fn get_poll(&self, message_id: &str) -> Result<PollPayload, AuthorityError>;

    async fn add_vote(&self, request: AddVoteRequest) -> Result<(), AuthorityError>;

    async fn create_poll(&self, request: CreatePollRequest) -> Result<CreatedPoll, AuthorityError>;

    async fn get_poll_votes(&self, message_id: &str) -> Result<Vec<OptionVoters>, AuthorityError>;
}

impl VoteSelection {
    pub fn for_poll(is_multi_choice: bool, mut option_ids: Vec<String>) -> Self {
        if !is_multi_choice && option_ids.len() == 1 {
            VoteSelection::One(option_ids.remove(0))
        } else {
            VoteSelection::Many(option_ids)
        }
    }

    pub fn option_ids(&self) -> Vec<String> {
        match self {
            VoteSelection::One(id) => vec![id.clone()],
            VoteSelection::Many(ids) => ids.clone(),
        }
    }
}
