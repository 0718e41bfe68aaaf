use crate::models::Poll;
use crate::voting::{PollResults, results};

/// Options ticked in a multi-choice ballot before submission.
///
/// Lives only in the caller's hands: it is never written into the store, so
/// "what I am about to vote for" cannot leak into the authoritative tally.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DraftSelection {
    option_ids: Vec<String>,
}

impl DraftSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks or unchecks an option. Checking twice keeps a single entry.
    pub fn set(&mut self, option_id: &str, checked: bool) {
        if checked {
            if !self.contains(option_id) {
                self.option_ids.push(option_id.to_string());
            }
        } else {
            self.option_ids.retain(|id| id != option_id);
        }
    }

    pub fn toggle(&mut self, option_id: &str) {
        let checked = !self.contains(option_id);
        self.set(option_id, checked);
    }

    pub fn contains(&self, option_id: &str) -> bool {
        self.option_ids.iter().any(|id| id == option_id)
    }

    pub fn is_empty(&self) -> bool {
        self.option_ids.is_empty()
    }

    pub fn clear(&mut self) {
        self.option_ids.clear();
    }

    /// Selected ids in the poll's display order, dropping ids the poll no
    /// longer has.
    pub fn option_ids(&self, poll: &Poll) -> Vec<String> {
        poll.options
            .iter()
            .filter(|option| self.contains(&option.id))
            .map(|option| option.id.clone())
            .collect()
    }

    pub fn preview(&self, poll: &Poll) -> PollResults {
        results::project_selection(poll, &self.option_ids(poll))
    }
}
