use crate::authority::{AddVoteRequest, PollAuthority, VoteSelection};
use crate::error::{ActionError, AuthorityError};
use crate::models::{PollMessage, PollSnapshot};
use crate::store::PollStore;
use crate::tasks::refetch;
use log::{error, info, warn};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The server looked at the vote and said no.
    AuthorityRejected,
    /// The request never got a proper answer. Worth retrying.
    Transport,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionOutcome {
    /// The vote was recorded. `snapshot` is the reconciled state, or `None`
    /// if the refetch failed or the poll was closed in the meantime.
    Accepted { snapshot: Option<Arc<PollSnapshot>> },
    Failed { kind: FailureKind, cause: String },
}

/// Sends votes to the authority and reconciles the store afterwards.
///
/// Never writes the submitted choice into the store directly: after an
/// accepted vote the whole poll is fetched again, so votes other users cast
/// in the meantime are included.
#[derive(Clone)]
pub struct VoteSubmission {
    authority: Arc<dyn PollAuthority>,
    store: PollStore,
    user_id: String,
}

impl VoteSubmission {
    pub fn new(authority: Arc<dyn PollAuthority>, store: PollStore, user_id: &str) -> Self {
        Self {
            authority,
            store,
            user_id: user_id.to_string(),
        }
    }

    /// Submits `option_ids` for the poll behind `message_id`. Callers run
    /// [`can_vote`](crate::voting::can_vote) first. Exactly one `add_vote`
    /// call is made and failures are not retried.
    pub async fn submit_vote(
        &self,
        poll_id: &str,
        message_id: &str,
        option_ids: Vec<String>,
    ) -> SubmissionOutcome {
        let message = PollMessage {
            message_id: message_id.to_string(),
            poll_id: poll_id.to_string(),
        };
        let epoch = self.store.epoch(poll_id);
        let is_multi_choice = match self.store.get(poll_id) {
            Some(snapshot) => snapshot.poll.is_multi_choice,
            None => option_ids.len() != 1,
        };

        info!(
            "Submitting vote: poll_id={}, user_id={}, options={:?}",
            poll_id, self.user_id, option_ids
        );

        let request = AddVoteRequest {
            message_id: message_id.to_string(),
            option_id: VoteSelection::for_poll(is_multi_choice, option_ids),
        };

        if let Err(e) = self.authority.add_vote(request).await {
            error!("Vote on poll {} failed: {}", poll_id, e);
            let kind = match e {
                AuthorityError::Transport(_) => FailureKind::Transport,
                AuthorityError::Rejected(_) | AuthorityError::NotFound(_) => {
                    FailureKind::AuthorityRejected
                }
            };
            return SubmissionOutcome::Failed {
                kind,
                cause: e.to_string(),
            };
        }

        let reconciled =
            refetch(self.authority.as_ref(), &self.store, &self.user_id, &message, epoch).await;
        let snapshot = match reconciled {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Vote on poll {} recorded but refetch failed: {}", poll_id, e);
                None
            }
        };

        info!("Successfully recorded vote on poll {}", poll_id);
        SubmissionOutcome::Accepted { snapshot }
    }
}

impl SubmissionOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, SubmissionOutcome::Accepted { .. })
    }

    pub fn into_result(self) -> Result<Option<Arc<PollSnapshot>>, ActionError> {
        match self {
            SubmissionOutcome::Accepted { snapshot } => Ok(snapshot),
            SubmissionOutcome::Failed {
                kind: FailureKind::AuthorityRejected,
                cause,
            } => Err(ActionError::AuthorityRejected(cause)),
            SubmissionOutcome::Failed {
                kind: FailureKind::Transport,
                cause,
            } => Err(ActionError::Transport(cause)),
        }
    }
}
