pub mod create;
pub mod view;
pub mod vote;

pub use view::{OptionView, PollView, ViewMode};
pub use vote::{FailureKind, SubmissionOutcome, VoteSubmission};

use crate::authority::{OptionVoters, PollAuthority};
use crate::error::{ActionError, Rejection};
use crate::models::{PollMessage, PollSnapshot};
use crate::store::{PollStore, Subscription};
use crate::tasks::{LiveSyncController, refetch};
use crate::voting::{PollDraft, can_vote};
use log::{info, warn};
use std::sync::Arc;

/// Everything the chat UI needs from the poll engine, for one signed-in user.
///
/// Every action ends in exactly one outcome: a value, or an [`ActionError`]
/// the UI can turn into a specific message. Raw transport errors never leak
/// out of here.
pub struct PollSession {
    user_id: String,
    channel_id: String,
    authority: Arc<dyn PollAuthority>,
    store: PollStore,
    votes: VoteSubmission,
    sync: Option<LiveSyncController>,
}

impl PollSession {
    pub fn new(
        user_id: &str,
        channel_id: &str,
        authority: Arc<dyn PollAuthority>,
        store: PollStore,
    ) -> Self {
        let votes = VoteSubmission::new(Arc::clone(&authority), store.clone(), user_id);
        Self {
            user_id: user_id.to_string(),
            channel_id: channel_id.to_string(),
            authority,
            store,
            votes,
            sync: None,
        }
    }

    /// Polls opened from now on are kept live through `sync`.
    pub fn with_live_sync(mut self, sync: LiveSyncController) -> Self {
        self.sync = Some(sync);
        self
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn store(&self) -> &PollStore {
        &self.store
    }

    /// Loads the poll behind `message` and starts watching it for remote
    /// changes. A failed load leaves the poll unwatched.
    ///
    /// Fails with [`ActionError::NotLoaded`] if the poll was unmounted while
    /// the fetch was in flight.
    pub async fn open(&self, message: &PollMessage) -> Result<Arc<PollSnapshot>, ActionError> {
        // Watch before fetching so a change during the fetch is not missed
        if let Some(sync) = &self.sync {
            sync.watch(message);
        }
        let epoch = self.store.epoch(&message.poll_id);
        match refetch(self.authority.as_ref(), &self.store, &self.user_id, message, epoch).await {
            Ok(Some(snapshot)) => Ok(snapshot),
            Ok(None) => Err(ActionError::NotLoaded(message.poll_id.clone())),
            Err(e) => {
                warn!("Could not open poll {}: {}", message.poll_id, e);
                if let Some(sync) = &self.sync {
                    sync.unwatch(&message.poll_id);
                }
                Err(e.into())
            }
        }
    }

    /// Stops watching `message`'s poll and drops its snapshot unless a
    /// subscription still holds it.
    pub fn close(&self, message: &PollMessage) {
        if let Some(sync) = &self.sync {
            sync.unwatch(&message.poll_id);
        }
        self.store.discard(&message.poll_id);
    }

    pub fn get_snapshot(&self, poll_id: &str) -> Option<Arc<PollSnapshot>> {
        self.store.get(poll_id)
    }

    pub fn view(&self, poll_id: &str) -> Option<PollView> {
        self.store.get(poll_id).map(PollView::new)
    }

    pub fn subscribe<F>(&self, poll_id: &str, callback: F) -> Subscription
    where
        F: Fn(&Arc<PollSnapshot>) + Send + Sync + 'static,
    {
        self.store.subscribe(poll_id, callback)
    }

    /// Validates locally, then submits. Local rejections never reach the
    /// authority.
    pub async fn attempt_vote(
        &self,
        message: &PollMessage,
        option_ids: Vec<String>,
    ) -> Result<Option<Arc<PollSnapshot>>, ActionError> {
        let snapshot = self
            .store
            .get(&message.poll_id)
            .ok_or_else(|| ActionError::NotLoaded(message.poll_id.clone()))?;

        if let Err(rejection) = can_vote(&snapshot.poll, &snapshot.votes, &option_ids) {
            info!(
                "Vote by {} on poll {} refused locally: {}",
                self.user_id, message.poll_id, rejection
            );
            return Err(rejection.into());
        }

        self.votes
            .submit_vote(&message.poll_id, &message.message_id, option_ids)
            .await
            .into_result()
    }

    pub async fn attempt_create(&self, draft: &PollDraft) -> Result<PollMessage, ActionError> {
        create::create_poll(self.authority.as_ref(), &self.channel_id, draft).await
    }

    /// Who voted for what. Refused without a remote call for anonymous polls.
    pub async fn voter_breakdown(
        &self,
        message: &PollMessage,
    ) -> Result<Vec<OptionVoters>, ActionError> {
        let snapshot = self
            .store
            .get(&message.poll_id)
            .ok_or_else(|| ActionError::NotLoaded(message.poll_id.clone()))?;
        if snapshot.poll.is_anonymous {
            return Err(Rejection::AnonymousPoll.into());
        }
        Ok(self.authority.get_poll_votes(&message.message_id).await?)
    }

    /// Throws away what is known about `message`'s poll and fetches it again,
    /// e.g. after a vote was retracted elsewhere.
    pub async fn invalidate(
        &self,
        message: &PollMessage,
    ) -> Result<Option<Arc<PollSnapshot>>, ActionError> {
        let epoch = self.store.epoch(&message.poll_id);
        refetch(self.authority.as_ref(), &self.store, &self.user_id, message, epoch)
            .await
            .map_err(|e| {
                warn!("Could not refresh poll {}: {}", message.poll_id, e);
                ActionError::from(e)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authority::InMemoryAuthority;

    fn session(authority: &Arc<InMemoryAuthority>, user: &str) -> PollSession {
        PollSession::new(user, "general", Arc::new(authority.client(user)), PollStore::new())
    }

    async fn best_season(owner: &PollSession) -> PollMessage {
        let draft = PollDraft::new("Best season?").with_options(["Summer", "Winter"]);
        owner.attempt_create(&draft).await.unwrap()
    }

    #[tokio::test]
    async fn best_season_end_to_end() {
        let authority = InMemoryAuthority::new(16);
        let alice = session(&authority, "alice");
        let message = best_season(&alice).await;

        let opened = alice.open(&message).await.unwrap();
        assert_eq!(opened.poll.total_votes, 0);
        assert_eq!(alice.view(&message.poll_id).unwrap().mode(), ViewMode::SingleChoiceBallot);

        let summer = opened.poll.options[0].id.clone();
        let snapshot = alice
            .attempt_vote(&message, vec![summer.clone()])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(snapshot.poll.total_votes, 1);

        let view = alice.view(&message.poll_id).unwrap();
        assert_eq!(view.mode(), ViewMode::Results);
        let results: Vec<(String, u64, f64)> = view
            .results()
            .options
            .iter()
            .map(|r| (r.option_text.clone(), r.votes, r.percentage))
            .collect();
        assert_eq!(
            results,
            vec![("Summer".to_string(), 1, 100.0), ("Winter".to_string(), 0, 0.0)]
        );
    }

    #[tokio::test]
    async fn local_rejections_are_typed() {
        let authority = InMemoryAuthority::new(16);
        let alice = session(&authority, "alice");
        let message = best_season(&alice).await;

        assert_eq!(
            alice.attempt_vote(&message, vec!["x".into()]).await,
            Err(ActionError::NotLoaded(message.poll_id.clone()))
        );

        let opened = alice.open(&message).await.unwrap();
        let ids: Vec<String> = opened.poll.options.iter().map(|o| o.id.clone()).collect();
        assert_eq!(
            alice.attempt_vote(&message, ids.clone()).await,
            Err(ActionError::Rejected(Rejection::InvalidSelectionCount))
        );

        alice.attempt_vote(&message, vec![ids[0].clone()]).await.unwrap();
        assert_eq!(
            alice.attempt_vote(&message, vec![ids[1].clone()]).await,
            Err(ActionError::Rejected(Rejection::AlreadyVoted))
        );
    }

    #[tokio::test]
    async fn stale_snapshot_defers_to_the_authority() {
        let authority = InMemoryAuthority::new(16);
        let alice = session(&authority, "alice");
        let message = best_season(&alice).await;
        let opened = alice.open(&message).await.unwrap();

        // Closed remotely, but this session has no live sync to notice
        authority.close_poll(&message.poll_id).unwrap();
        let result = alice
            .attempt_vote(&message, vec![opened.poll.options[0].id.clone()])
            .await;
        assert!(matches!(result, Err(ActionError::AuthorityRejected(_))));
        assert!(!alice.get_snapshot(&message.poll_id).unwrap().poll.is_disabled);

        let refreshed = alice.invalidate(&message).await.unwrap().unwrap();
        assert!(refreshed.poll.is_disabled);
        assert!(!alice.view(&message.poll_id).unwrap().ballot_enabled());
    }

    #[tokio::test]
    async fn voter_breakdown_respects_anonymity() {
        let authority = InMemoryAuthority::new(16);
        let alice = session(&authority, "alice");

        let public = best_season(&alice).await;
        let opened = alice.open(&public).await.unwrap();
        alice
            .attempt_vote(&public, vec![opened.poll.options[1].id.clone()])
            .await
            .unwrap();
        let voters = alice.voter_breakdown(&public).await.unwrap();
        assert_eq!(voters[1].voters, vec!["alice".to_string()]);

        let secret = alice
            .attempt_create(
                &PollDraft::new("Secret?")
                    .with_options(["Yes", "No"])
                    .anonymous(true),
            )
            .await
            .unwrap();
        alice.open(&secret).await.unwrap();
        // refused before the request is made, even with the server down
        authority.set_reachable(false);
        assert_eq!(
            alice.voter_breakdown(&secret).await,
            Err(ActionError::Rejected(Rejection::AnonymousPoll))
        );
    }

    #[tokio::test]
    async fn failed_open_leaves_the_poll_unwatched() {
        let authority = InMemoryAuthority::new(16);
        let client: Arc<dyn PollAuthority> = Arc::new(authority.client("alice"));
        let store = PollStore::new();
        let sync = LiveSyncController::spawn(
            Arc::clone(&client),
            store.clone(),
            "alice".into(),
            authority.changes(),
            Default::default(),
        );
        let alice = PollSession::new("alice", "general", client, store).with_live_sync(sync);
        let message = best_season(&alice).await;

        authority.set_reachable(false);
        let err = alice.open(&message).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(!alice.sync.as_ref().unwrap().is_watching(&message.poll_id));
        assert!(alice.get_snapshot(&message.poll_id).is_none());

        authority.set_reachable(true);
        alice.open(&message).await.unwrap();
        assert!(alice.sync.as_ref().unwrap().is_watching(&message.poll_id));
    }

    #[tokio::test]
    async fn close_drops_snapshots_nobody_holds() {
        let authority = InMemoryAuthority::new(16);
        let alice = session(&authority, "alice");
        let first = best_season(&alice).await;
        let second = best_season(&alice).await;

        alice.open(&first).await.unwrap();
        alice.open(&second).await.unwrap();
        let _held = alice.subscribe(&second.poll_id, |_| {});

        alice.close(&first);
        alice.close(&second);
        assert!(alice.get_snapshot(&first.poll_id).is_none());
        assert!(alice.get_snapshot(&second.poll_id).is_some());
    }

    #[tokio::test]
    async fn transport_failures_surface_as_retryable() {
        let authority = InMemoryAuthority::new(16);
        let alice = session(&authority, "alice");
        authority.set_reachable(false);

        let err = alice
            .attempt_create(&PollDraft::new("Best season?").with_options(["Summer", "Winter"]))
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(authority.poll_count(), 0);
    }
}
