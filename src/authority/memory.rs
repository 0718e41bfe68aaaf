use crate::authority::{
    AddVoteRequest, ChangeFeed, CreatePollRequest, CreatedPoll, DocumentChanged, OptionVoters,
    PollAuthority, VoteSelection,
};
use crate::error::AuthorityError;
use crate::models::{CurrentUserVote, Poll, PollPayload, VoteRecord};
use crate::voting::{PollDraft, can_create, can_vote};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast;
use uuid::Uuid;

struct StoredVote {
    user_id: String,
    option_id: String,
    timestamp: DateTime<Utc>,
}

struct StoredPoll {
    poll: Poll,
    channel_id: String,
    owner: String,
    votes: Vec<StoredVote>,
}

#[derive(Default)]
struct State {
    polls: HashMap<String, StoredPoll>,
    // message id -> poll id
    messages: HashMap<String, String>,
}

/// A self-contained poll backend: keeps polls and votes in memory, enforces
/// the server-side rules and broadcasts a [`DocumentChanged`] after every
/// mutation. Used by the demo binary and the tests.
pub struct InMemoryAuthority {
    state: Mutex<State>,
    changes: broadcast::Sender<DocumentChanged>,
    reachable: AtomicBool,
}

/// One user's session against an [`InMemoryAuthority`].
#[derive(Clone)]
pub struct AuthorityClient {
    authority: Arc<InMemoryAuthority>,
    user_id: String,
    latency: Duration,
}

impl InMemoryAuthority {
    pub fn new(notification_buffer: usize) -> Arc<Self> {
        let (changes, _) = broadcast::channel(notification_buffer.max(1));
        Arc::new(Self {
            state: Mutex::new(State::default()),
            changes,
            reachable: AtomicBool::new(true),
        })
    }

    pub fn client(self: &Arc<Self>, user_id: &str) -> AuthorityClient {
        AuthorityClient {
            authority: Arc::clone(self),
            user_id: user_id.to_string(),
            latency: Duration::ZERO,
        }
    }

    /// A fresh receiver for change notifications.
    pub fn changes(&self) -> ChangeFeed {
        self.changes.subscribe()
    }

    /// Simulates the network going away; every call fails with a transport
    /// error until restored.
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Admin action: stop accepting votes.
    pub fn close_poll(&self, poll_id: &str) -> Result<(), AuthorityError> {
        {
            let mut state = self.lock();
            let stored = state
                .polls
                .get_mut(poll_id)
                .ok_or_else(|| AuthorityError::Rejected(format!("Poll {} not found", poll_id)))?;
            stored.poll.is_disabled = true;
        }
        info!("Closed poll {}", poll_id);
        self.publish(poll_id);
        Ok(())
    }

    /// Removes every vote `user_id` holds on the poll attached to
    /// `message_id`. Happens outside the voting flow; clients only learn
    /// about it through the change notification.
    pub fn retract_votes(&self, user_id: &str, message_id: &str) -> Result<usize, AuthorityError> {
        let (poll_id, removed) = {
            let mut state = self.lock();
            let stored = Self::stored_mut(&mut state, message_id)?;
            let before = stored.votes.len();
            stored.votes.retain(|vote| vote.user_id != user_id);
            let removed = before - stored.votes.len();
            Self::recount(stored);
            (stored.poll.id.clone(), removed)
        };
        info!("Retracted {} vote(s) of {} on poll {}", removed, user_id, poll_id);
        if removed > 0 {
            self.publish(&poll_id);
        }
        Ok(removed)
    }

    pub fn poll_count(&self) -> usize {
        self.lock().polls.len()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_reachable(&self) -> Result<(), AuthorityError> {
        if self.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(AuthorityError::Transport("connection refused".into()))
        }
    }

    fn stored<'a>(state: &'a State, message_id: &str) -> Result<&'a StoredPoll, AuthorityError> {
        state
            .messages
            .get(message_id)
            .and_then(|poll_id| state.polls.get(poll_id))
            .ok_or_else(|| AuthorityError::NotFound(message_id.to_string()))
    }

    fn stored_mut<'a>(
        state: &'a mut State,
        message_id: &str,
    ) -> Result<&'a mut StoredPoll, AuthorityError> {
        let poll_id = state
            .messages
            .get(message_id)
            .cloned()
            .ok_or_else(|| AuthorityError::NotFound(message_id.to_string()))?;
        state
            .polls
            .get_mut(&poll_id)
            .ok_or_else(|| AuthorityError::NotFound(message_id.to_string()))
    }

    // Counts are always derived from the vote records
    fn recount(stored: &mut StoredPoll) {
        for option in stored.poll.options.iter_mut() {
            option.votes = stored
                .votes
                .iter()
                .filter(|vote| vote.option_id == option.id)
                .count() as u64;
        }
        let voters: HashSet<&str> = stored.votes.iter().map(|vote| vote.user_id.as_str()).collect();
        stored.poll.total_votes = voters.len() as u64;
    }

    fn publish(&self, poll_id: &str) {
        let event = DocumentChanged {
            poll_id: poll_id.to_string(),
        };
        // No receivers is fine: nobody is watching
        if self.changes.send(event).is_err() {
            debug!("No listeners for changes to poll {}", poll_id);
        }
    }

    fn payload_for(&self, user_id: &str, message_id: &str) -> Result<PollPayload, AuthorityError> {
        let state = self.lock();
        let stored = Self::stored(&state, message_id)?;
        // Only the caller's own choices leave the server, anonymous or not
        let current_user_votes = stored
            .votes
            .iter()
            .filter(|vote| vote.user_id == user_id)
            .map(|vote| CurrentUserVote {
                option: vote.option_id.clone(),
            })
            .collect();
        Ok(PollPayload {
            poll: stored.poll.clone(),
            current_user_votes,
        })
    }

    fn record_vote(&self, user_id: &str, request: AddVoteRequest) -> Result<(), AuthorityError> {
        let poll_id = {
            let mut state = self.lock();
            let stored = Self::stored_mut(&mut state, &request.message_id)?;

            if !stored.poll.is_multi_choice && matches!(request.option_id, VoteSelection::Many(_)) {
                return Err(AuthorityError::Rejected(
                    "Single-choice polls take one option".into(),
                ));
            }

            let prior: Vec<VoteRecord> = stored
                .votes
                .iter()
                .filter(|vote| vote.user_id == user_id)
                .map(|vote| VoteRecord {
                    user_id: vote.user_id.clone(),
                    poll_id: stored.poll.id.clone(),
                    option_id: vote.option_id.clone(),
                })
                .collect();
            let option_ids = request.option_id.option_ids();

            if let Err(rejection) = can_vote(&stored.poll, &prior, &option_ids) {
                warn!(
                    "Refused vote by {} on poll {}: {}",
                    user_id, stored.poll.id, rejection
                );
                return Err(AuthorityError::Rejected(rejection.to_string()));
            }

            let now = Utc::now();
            stored.votes.extend(option_ids.into_iter().map(|option_id| StoredVote {
                user_id: user_id.to_string(),
                option_id,
                timestamp: now,
            }));
            Self::recount(stored);
            stored.poll.id.clone()
        };

        info!("Recorded vote: poll_id={}, user_id={}", poll_id, user_id);
        self.publish(&poll_id);
        Ok(())
    }

    fn create(
        &self,
        user_id: &str,
        request: CreatePollRequest,
    ) -> Result<CreatedPoll, AuthorityError> {
        let draft = PollDraft {
            question: request.question,
            options: request.options.into_iter().map(|option| option.option).collect(),
            is_multi_choice: request.is_multi_choice,
            is_anonymous: request.is_anonymous,
        };
        can_create(&draft).map_err(|rejection| AuthorityError::Rejected(rejection.to_string()))?;

        let poll = Poll::new(
            draft.question.trim().to_string(),
            draft.trimmed_options(),
            draft.is_multi_choice,
            draft.is_anonymous,
        );
        let created = CreatedPoll {
            poll_id: poll.id.clone(),
            message_id: Uuid::new_v4().to_string(),
        };

        {
            let mut state = self.lock();
            state
                .messages
                .insert(created.message_id.clone(), created.poll_id.clone());
            state.polls.insert(
                created.poll_id.clone(),
                StoredPoll {
                    poll,
                    channel_id: request.channel_id,
                    owner: user_id.to_string(),
                    votes: Vec::new(),
                },
            );
        }

        info!(
            "Created poll {} (message {}) for {}",
            created.poll_id, created.message_id, user_id
        );
        Ok(created)
    }

    fn voters(&self, message_id: &str) -> Result<Vec<OptionVoters>, AuthorityError> {
        let state = self.lock();
        let stored = Self::stored(&state, message_id)?;
        if stored.poll.is_anonymous {
            return Err(AuthorityError::Rejected("This poll is anonymous".into()));
        }

        let mut by_option: HashMap<&str, Vec<(&DateTime<Utc>, String)>> = HashMap::new();
        for vote in &stored.votes {
            by_option
                .entry(vote.option_id.as_str())
                .or_default()
                .push((&vote.timestamp, vote.user_id.clone()));
        }

        Ok(stored
            .poll
            .options
            .iter()
            .map(|option| {
                let mut voters = by_option.remove(option.id.as_str()).unwrap_or_default();
                voters.sort_by(|a, b| a.0.cmp(b.0));
                OptionVoters {
                    option_id: option.id.clone(),
                    voters: voters.into_iter().map(|(_, user)| user).collect(),
                }
            })
            .collect())
    }

    /// Channel and owner of a poll, for diagnostics.
    pub fn poll_origin(&self, poll_id: &str) -> Option<(String, String)> {
        self.lock()
            .polls
            .get(poll_id)
            .map(|stored| (stored.channel_id.clone(), stored.owner.clone()))
    }
}

impl AuthorityClient {
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Every call waits this long before reaching the authority, and the
    /// same again before the response arrives.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    async fn round_trip(&self) -> Result<(), AuthorityError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.authority.check_reachable()
    }

    async fn respond(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

#[async_trait]
impl PollAuthority for AuthorityClient {
    async fn get_poll(&self, message_id: &str) -> Result<PollPayload, AuthorityError> {
        self.round_trip().await?;
        let payload = self.authority.payload_for(&self.user_id, message_id);
        self.respond().await;
        payload
    }

    async fn add_vote(&self, request: AddVoteRequest) -> Result<(), AuthorityError> {
        self.round_trip().await?;
        let result = self.authority.record_vote(&self.user_id, request);
        self.respond().await;
        result
    }

    async fn create_poll(&self, request: CreatePollRequest) -> Result<CreatedPoll, AuthorityError> {
        self.round_trip().await?;
        let result = self.authority.create(&self.user_id, request);
        self.respond().await;
        result
    }

    async fn get_poll_votes(&self, message_id: &str) -> Result<Vec<OptionVoters>, AuthorityError> {
        self.round_trip().await?;
        let result = self.authority.voters(message_id);
        self.respond().await;
        result
    }
}
