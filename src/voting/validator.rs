use crate::error::Rejection;
use crate::models::{Poll, VoteRecord};
use std::collections::HashSet;

/// Decides whether `attempted` may be submitted by a user holding
/// `prior_votes` on `poll`.
///
/// Runs before any remote call so the UI can react immediately. The server
/// applies its own checks and has the final word.
pub fn can_vote(
    poll: &Poll,
    prior_votes: &[VoteRecord],
    attempted: &[String],
) -> Result<(), Rejection> {
    if poll.is_disabled {
        return Err(Rejection::PollClosed);
    }

    let prior: Vec<&VoteRecord> = prior_votes
        .iter()
        .filter(|vote| vote.poll_id == poll.id)
        .collect();

    if !poll.is_multi_choice {
        if attempted.len() != 1 {
            return Err(Rejection::InvalidSelectionCount);
        }
        if !prior.is_empty() {
            return Err(Rejection::AlreadyVoted);
        }
    } else if attempted.is_empty() {
        return Err(Rejection::EmptySelection);
    }

    if let Some(unknown) = attempted.iter().find(|id| !poll.has_option(id)) {
        return Err(Rejection::UnknownOption(unknown.clone()));
    }

    // At most one record per (user, option), even in multi-choice mode
    let mut seen = HashSet::new();
    for option_id in attempted {
        if !seen.insert(option_id.as_str()) {
            return Err(Rejection::DuplicateOption(option_id.clone()));
        }
        if prior.iter().any(|vote| &vote.option_id == option_id) {
            return Err(Rejection::AlreadyVoted);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PollOption;

    fn poll(multi: bool, disabled: bool) -> Poll {
        Poll {
            id: "poll-1".into(),
            question: "Lunch?".into(),
            options: ["pizza", "sushi", "tacos"]
                .iter()
                .map(|name| PollOption {
                    id: name.to_string(),
                    text: name.to_uppercase(),
                    votes: 0,
                })
                .collect(),
            is_multi_choice: multi,
            is_anonymous: false,
            is_disabled: disabled,
            total_votes: 0,
        }
    }

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn vote(option_id: &str) -> VoteRecord {
        VoteRecord {
            user_id: "alice".into(),
            poll_id: "poll-1".into(),
            option_id: option_id.into(),
        }
    }

    #[test]
    fn disabled_poll_rejects_every_selection() {
        for multi in [false, true] {
            let poll = poll(multi, true);
            for attempt in [ids(&[]), ids(&["pizza"]), ids(&["pizza", "sushi"]), ids(&["nope"])] {
                assert_eq!(can_vote(&poll, &[], &attempt), Err(Rejection::PollClosed));
            }
        }
    }

    #[test]
    fn single_choice_needs_exactly_one_option() {
        let poll = poll(false, false);
        assert_eq!(can_vote(&poll, &[], &ids(&[])), Err(Rejection::InvalidSelectionCount));
        assert_eq!(
            can_vote(&poll, &[], &ids(&["pizza", "sushi"])),
            Err(Rejection::InvalidSelectionCount)
        );
        assert_eq!(can_vote(&poll, &[], &ids(&["pizza"])), Ok(()));
    }

    #[test]
    fn single_choice_rejects_revote() {
        let poll = poll(false, false);
        assert_eq!(
            can_vote(&poll, &[vote("sushi")], &ids(&["pizza"])),
            Err(Rejection::AlreadyVoted)
        );
    }

    #[test]
    fn votes_on_other_polls_are_ignored() {
        let poll = poll(false, false);
        let other = VoteRecord {
            poll_id: "poll-2".into(),
            ..vote("pizza")
        };
        assert_eq!(can_vote(&poll, &[other], &ids(&["pizza"])), Ok(()));
    }

    #[test]
    fn multi_choice_rules() {
        let poll = poll(true, false);
        assert_eq!(can_vote(&poll, &[], &ids(&[])), Err(Rejection::EmptySelection));
        assert_eq!(can_vote(&poll, &[], &ids(&["pizza", "tacos"])), Ok(()));
        assert_eq!(
            can_vote(&poll, &[], &ids(&["pizza", "pizza"])),
            Err(Rejection::DuplicateOption("pizza".into()))
        );
        assert_eq!(
            can_vote(&poll, &[vote("pizza")], &ids(&["sushi", "pizza"])),
            Err(Rejection::AlreadyVoted)
        );
        assert_eq!(can_vote(&poll, &[vote("pizza")], &ids(&["sushi"])), Ok(()));
    }

    #[test]
    fn unknown_option_is_rejected() {
        for multi in [false, true] {
            assert_eq!(
                can_vote(&poll(multi, false), &[], &ids(&["burgers"])),
                Err(Rejection::UnknownOption("burgers".into()))
            );
        }
    }

    #[test]
    fn rules_apply_in_order() {
        // closed wins over a bad selection count, count wins over revote
        assert_eq!(
            can_vote(&poll(false, true), &[vote("pizza")], &ids(&[])),
            Err(Rejection::PollClosed)
        );
        assert_eq!(
            can_vote(&poll(false, false), &[vote("pizza")], &ids(&["a", "b"])),
            Err(Rejection::InvalidSelectionCount)
        );
        assert_eq!(
            can_vote(&poll(false, false), &[vote("pizza")], &ids(&["burgers"])),
            Err(Rejection::AlreadyVoted)
        );
    }
}
