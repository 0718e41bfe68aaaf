pub mod draft;
pub mod results;
pub mod selection;
pub mod validator;

pub use draft::{PollDraft, can_create};
pub use results::{compute_results, project_selection};
pub use selection::DraftSelection;
pub use validator::can_vote;

/// Options accepted on a poll, inclusive.
pub const MIN_OPTIONS: usize = 2;
pub const MAX_OPTIONS: usize = 10;

// Result breakdown for a poll, in display order
#[derive(Debug, Clone, PartialEq)]
pub struct PollResults {
    pub poll_id: String,
    pub options: Vec<OptionResult>,
    pub total_votes: u64,
    pub denominator: u64,
}

// One option's share of the vote
#[derive(Debug, Clone, PartialEq)]
pub struct OptionResult {
    pub option_id: String,
    pub option_text: String,
    pub votes: u64,
    pub percentage: f64,
    pub rank: usize,
}

impl OptionResult {
    /// Display form, one fractional digit: `"75.0%"`.
    pub fn percentage_label(&self) -> String {
        format!("{:.1}%", self.percentage)
    }
}

impl PollResults {
    pub fn option(&self, option_id: &str) -> Option<&OptionResult> {
        self.options.iter().find(|result| result.option_id == option_id)
    }

    /// Options sharing the highest count. Empty while nobody has voted.
    pub fn leaders(&self) -> Vec<&OptionResult> {
        let top = self.options.iter().map(|result| result.votes).max().unwrap_or(0);
        if top == 0 {
            return Vec::new();
        }
        self.options.iter().filter(|result| result.votes == top).collect()
    }

    /// Results ordered by rank, display order breaking ties.
    pub fn ranked(&self) -> Vec<&OptionResult> {
        let mut ranked: Vec<&OptionResult> = self.options.iter().collect();
        ranked.sort_by_key(|result| result.rank);
        ranked
    }

    pub fn total_votes_label(&self) -> String {
        if self.total_votes == 1 {
            "1 vote".to_string()
        } else {
            format!("{} votes", self.total_votes)
        }
    }
}
