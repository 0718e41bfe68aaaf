use crate::models::PollSnapshot;
use crate::voting::{PollResults, compute_results};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    /// The user has voted: show the breakdown.
    Results,
    SingleChoiceBallot,
    MultiChoiceBallot,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptionView {
    pub option_id: String,
    pub text: String,
    pub votes: u64,
    pub percentage: f64,
    pub percentage_label: String,
    pub is_own_vote: bool,
}

/// What a poll message should render, derived from one snapshot.
#[derive(Debug, Clone)]
pub struct PollView {
    snapshot: Arc<PollSnapshot>,
    results: PollResults,
}

impl PollView {
    pub fn new(snapshot: Arc<PollSnapshot>) -> Self {
        let results = compute_results(&snapshot.poll);
        Self { snapshot, results }
    }

    pub fn question(&self) -> &str {
        &self.snapshot.poll.question
    }

    // Results stay hidden until the user has cast a vote
    pub fn mode(&self) -> ViewMode {
        if self.snapshot.has_voted() {
            ViewMode::Results
        } else if self.snapshot.poll.is_multi_choice {
            ViewMode::MultiChoiceBallot
        } else {
            ViewMode::SingleChoiceBallot
        }
    }

    pub fn is_closed(&self) -> bool {
        self.snapshot.poll.is_disabled
    }

    pub fn is_anonymous(&self) -> bool {
        self.snapshot.poll.is_anonymous
    }

    pub fn ballot_enabled(&self) -> bool {
        !self.is_closed() && self.mode() != ViewMode::Results
    }

    /// Whether a "view votes" affordance may be offered.
    pub fn shows_voters(&self) -> bool {
        !self.is_anonymous()
    }

    pub fn options(&self) -> Vec<OptionView> {
        self.results
            .options
            .iter()
            .map(|result| OptionView {
                option_id: result.option_id.clone(),
                text: result.option_text.clone(),
                votes: result.votes,
                percentage: result.percentage,
                percentage_label: result.percentage_label(),
                is_own_vote: self.snapshot.voted_for(&result.option_id),
            })
            .collect()
    }

    pub fn total_votes_label(&self) -> String {
        self.results.total_votes_label()
    }

    pub fn results(&self) -> &PollResults {
        &self.results
    }

    pub fn snapshot(&self) -> &Arc<PollSnapshot> {
        &self.snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Poll, PollOption, VoteRecord};
    use chrono::Utc;

    fn snapshot(multi: bool, anonymous: bool, own: &[&str]) -> Arc<PollSnapshot> {
        let poll = Poll {
            id: "poll-1".into(),
            question: "Best season?".into(),
            options: vec![
                PollOption { id: "s".into(), text: "Summer".into(), votes: 3 },
                PollOption { id: "w".into(), text: "Winter".into(), votes: 1 },
            ],
            is_multi_choice: multi,
            is_anonymous: anonymous,
            is_disabled: false,
            total_votes: 4,
        };
        Arc::new(PollSnapshot {
            votes: own
                .iter()
                .map(|option| VoteRecord {
                    user_id: "alice".into(),
                    poll_id: "poll-1".into(),
                    option_id: option.to_string(),
                })
                .collect(),
            poll,
            user_id: "alice".into(),
            fetched_at: Utc::now(),
        })
    }

    #[test]
    fn ballot_until_voted_then_results() {
        assert_eq!(PollView::new(snapshot(false, false, &[])).mode(), ViewMode::SingleChoiceBallot);
        assert_eq!(PollView::new(snapshot(true, false, &[])).mode(), ViewMode::MultiChoiceBallot);

        let view = PollView::new(snapshot(false, false, &["s"]));
        assert_eq!(view.mode(), ViewMode::Results);
        assert!(!view.ballot_enabled());

        let options = view.options();
        assert!(options[0].is_own_vote);
        assert!(!options[1].is_own_vote);
        assert_eq!(options[0].percentage_label, "75.0%");
        assert_eq!(view.total_votes_label(), "4 votes");
    }

    #[test]
    fn anonymous_polls_hide_the_voter_list() {
        let view = PollView::new(snapshot(false, true, &[]));
        assert!(view.is_anonymous());
        assert!(!view.shows_voters());
        assert!(PollView::new(snapshot(false, false, &[])).shows_voters());
    }
}
