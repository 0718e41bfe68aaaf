pub(crate) mod wire;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A poll as the chat backend reports it. Option order is display order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Poll {
    #[serde(rename = "name")]
    pub id: String,
    pub question: String,
    #[serde(default)]
    pub options: Vec<PollOption>,
    #[serde(default, with = "wire::flag")]
    pub is_multi_choice: bool,
    #[serde(default, with = "wire::flag")]
    pub is_anonymous: bool,
    #[serde(default, with = "wire::flag")]
    pub is_disabled: bool,
    #[serde(default, deserialize_with = "wire::count")]
    pub total_votes: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollOption {
    #[serde(rename = "name")]
    pub id: String,
    #[serde(rename = "option")]
    pub text: String,
    #[serde(default, deserialize_with = "wire::count")]
    pub votes: u64,
}

/// One user's vote for one option of one poll.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VoteRecord {
    pub user_id: String,
    pub poll_id: String,
    pub option_id: String,
}

/// A chat message carrying a poll. The message only knows the poll's id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PollMessage {
    pub message_id: String,
    pub poll_id: String,
}

/// The caller's own vote as returned alongside the poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUserVote {
    pub option: String,
}

/// Response of `get_poll`: the full poll plus the caller's own votes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollPayload {
    pub poll: Poll,
    #[serde(default)]
    pub current_user_votes: Vec<CurrentUserVote>,
}

/// Client-local view of a poll as last observed by one user.
///
/// Snapshots are never edited in place; a newer fetch produces a new snapshot
/// which replaces the old one wholesale in the store.
#[derive(Debug, Clone, PartialEq)]
pub struct PollSnapshot {
    pub poll: Poll,
    pub user_id: String,
    pub votes: Vec<VoteRecord>,
    pub fetched_at: DateTime<Utc>,
}

impl Poll {
    pub fn new(
        question: String,
        options: Vec<String>,
        is_multi_choice: bool,
        is_anonymous: bool,
    ) -> Self {
        let options = options
            .into_iter()
            .map(|text| PollOption {
                id: Uuid::new_v4().to_string(),
                text,
                votes: 0,
            })
            .collect();

        Self {
            id: Uuid::new_v4().to_string(),
            question,
            options,
            is_multi_choice,
            is_anonymous,
            is_disabled: false,
            total_votes: 0,
        }
    }

    pub fn option(&self, option_id: &str) -> Option<&PollOption> {
        self.options.iter().find(|option| option.id == option_id)
    }

    pub fn has_option(&self, option_id: &str) -> bool {
        self.option(option_id).is_some()
    }

    // Used for labels, falls back when the option has since disappeared
    pub fn option_text(&self, option_id: &str) -> &str {
        self.option(option_id)
            .map(|option| option.text.as_str())
            .unwrap_or("Unknown Option")
    }

    /// Sum of option counts. In multi-choice mode this exceeds the voter count.
    pub fn selections_cast(&self) -> u64 {
        self.options.iter().map(|option| option.votes).sum()
    }
}

impl PollSnapshot {
    pub fn from_payload(user_id: &str, payload: PollPayload) -> Self {
        let votes = payload
            .current_user_votes
            .into_iter()
            .map(|vote| VoteRecord {
                user_id: user_id.to_string(),
                poll_id: payload.poll.id.clone(),
                option_id: vote.option,
            })
            .collect();

        Self {
            poll: payload.poll,
            user_id: user_id.to_string(),
            votes,
            fetched_at: Utc::now(),
        }
    }

    pub fn poll_id(&self) -> &str {
        &self.poll.id
    }

    pub fn has_voted(&self) -> bool {
        !self.votes.is_empty()
    }

    pub fn voted_for(&self, option_id: &str) -> bool {
        self.votes.iter().any(|vote| vote.option_id == option_id)
    }
}
