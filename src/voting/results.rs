use crate::models::Poll;
use crate::voting::{OptionResult, PollResults};
use std::collections::HashSet;

/// Turns the poll's raw option counts into a percentage breakdown.
///
/// Single-choice polls divide by `total_votes` (one vote per voter).
/// Multi-choice polls divide by the number of selections made across all
/// options, so their percentages are independent shares and need not add up
/// to 100. A zero denominator yields 0% everywhere.
pub fn compute_results(poll: &Poll) -> PollResults {
    let counts: Vec<u64> = poll.options.iter().map(|option| option.votes).collect();
    build_results(poll, &counts, poll.total_votes)
}

/// What the results would look like if `selection` were added as one more
/// voter. Pure projection for previewing a draft; nothing is recorded.
pub fn project_selection(poll: &Poll, selection: &[String]) -> PollResults {
    let chosen: HashSet<&str> = selection
        .iter()
        .map(String::as_str)
        .filter(|option_id| poll.has_option(option_id))
        .collect();

    let counts: Vec<u64> = poll
        .options
        .iter()
        .map(|option| option.votes + u64::from(chosen.contains(option.id.as_str())))
        .collect();

    let total_votes = if chosen.is_empty() {
        poll.total_votes
    } else {
        poll.total_votes + 1
    };

    build_results(poll, &counts, total_votes)
}

fn build_results(poll: &Poll, counts: &[u64], total_votes: u64) -> PollResults {
    let denominator = if poll.is_multi_choice {
        counts.iter().sum()
    } else {
        total_votes
    };

    // Dense ranking: equal counts share a rank
    let mut distinct: Vec<u64> = counts.to_vec();
    distinct.sort_unstable_by(|a, b| b.cmp(a));
    distinct.dedup();

    let options = poll
        .options
        .iter()
        .zip(counts)
        .map(|(option, &votes)| OptionResult {
            option_id: option.id.clone(),
            option_text: option.text.clone(),
            votes,
            percentage: percentage(votes, denominator),
            rank: distinct.iter().position(|&count| count == votes).unwrap_or(0) + 1,
        })
        .collect();

    PollResults {
        poll_id: poll.id.clone(),
        options,
        total_votes,
        denominator,
    }
}

fn percentage(votes: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    votes as f64 * 100.0 / denominator as f64
}
