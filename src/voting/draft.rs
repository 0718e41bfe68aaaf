use crate::error::Rejection;
use crate::voting::{MAX_OPTIONS, MIN_OPTIONS};
use serde::{Deserialize, Serialize};

/// A poll being authored. Starts with two blank options, like the compose
/// dialog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollDraft {
    pub question: String,
    pub options: Vec<String>,
    pub is_multi_choice: bool,
    pub is_anonymous: bool,
}

impl Default for PollDraft {
    fn default() -> Self {
        Self {
            question: String::new(),
            options: vec![String::new(); MIN_OPTIONS],
            is_multi_choice: false,
            is_anonymous: false,
        }
    }
}

impl PollDraft {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            ..Self::default()
        }
    }

    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }

    pub fn multi_choice(mut self, enabled: bool) -> Self {
        self.is_multi_choice = enabled;
        self
    }

    pub fn anonymous(mut self, enabled: bool) -> Self {
        self.is_anonymous = enabled;
        self
    }

    /// Appends a blank option, refusing past the maximum.
    pub fn add_option(&mut self) -> Result<usize, Rejection> {
        if self.options.len() >= MAX_OPTIONS {
            return Err(Rejection::MaximumOptionsReached);
        }
        self.options.push(String::new());
        Ok(self.options.len() - 1)
    }

    /// Removes the option at `index`. The last two options always stay.
    pub fn remove_option(&mut self, index: usize) -> Result<String, Rejection> {
        if self.options.len() <= MIN_OPTIONS {
            return Err(Rejection::MinimumOptionsReached);
        }
        if index >= self.options.len() {
            return Err(Rejection::UnknownOption(index.to_string()));
        }
        Ok(self.options.remove(index))
    }

    pub fn set_option(&mut self, index: usize, text: impl Into<String>) -> Result<(), Rejection> {
        match self.options.get_mut(index) {
            Some(slot) => {
                *slot = text.into();
                Ok(())
            }
            None => Err(Rejection::UnknownOption(index.to_string())),
        }
    }

    pub fn can_remove_option(&self) -> bool {
        self.options.len() > MIN_OPTIONS
    }

    pub fn can_add_option(&self) -> bool {
        self.options.len() < MAX_OPTIONS
    }

    /// Option texts with surrounding whitespace removed, ready to send.
    pub fn trimmed_options(&self) -> Vec<String> {
        self.options.iter().map(|text| text.trim().to_string()).collect()
    }
}

/// Authoring checks applied before a creation request leaves the client.
pub fn can_create(draft: &PollDraft) -> Result<(), Rejection> {
    if draft.question.trim().is_empty() {
        return Err(Rejection::EmptyQuestion);
    }
    if draft.options.len() < MIN_OPTIONS {
        return Err(Rejection::TooFewOptions { min: MIN_OPTIONS });
    }
    if draft.options.len() > MAX_OPTIONS {
        return Err(Rejection::TooManyOptions { max: MAX_OPTIONS });
    }
    if let Some(index) = draft.options.iter().position(|text| text.trim().is_empty()) {
        return Err(Rejection::EmptyOption { index });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_draft_is_allowed() {
        let draft = PollDraft::new("Best season?").with_options(["Summer", "Winter"]);
        assert_eq!(can_create(&draft), Ok(()));
    }

    #[test]
    fn empty_question_is_rejected() {
        let draft = PollDraft::new("   ").with_options(["Summer", "Winter"]);
        assert_eq!(can_create(&draft), Err(Rejection::EmptyQuestion));
    }

    #[test]
    fn option_count_bounds() {
        let one = PollDraft::new("q").with_options(["only"]);
        assert_eq!(can_create(&one), Err(Rejection::TooFewOptions { min: 2 }));

        let eleven = PollDraft::new("q").with_options((0..11).map(|i| format!("option {}", i)));
        assert_eq!(can_create(&eleven), Err(Rejection::TooManyOptions { max: 10 }));

        let ten = PollDraft::new("q").with_options((0..10).map(|i| format!("option {}", i)));
        assert_eq!(can_create(&ten), Ok(()));
    }

    #[test]
    fn whitespace_only_option_is_rejected() {
        let draft = PollDraft::new("q").with_options(["a", " \t ", "c"]);
        assert_eq!(can_create(&draft), Err(Rejection::EmptyOption { index: 1 }));
    }

    #[test]
    fn removing_keeps_the_last_two_options() {
        let mut draft = PollDraft::new("q").with_options(["A", "B"]);
        assert!(!draft.can_remove_option());
        assert_eq!(draft.remove_option(0), Err(Rejection::MinimumOptionsReached));
        assert_eq!(draft.options, vec!["A".to_string(), "B".to_string()]);

        draft.add_option().unwrap();
        draft.set_option(2, "C").unwrap();
        assert_eq!(draft.remove_option(0), Ok("A".to_string()));
        assert_eq!(draft.options, vec!["B".to_string(), "C".to_string()]);
    }

    #[test]
    fn adding_stops_at_ten_options() {
        let mut draft = PollDraft::default();
        assert_eq!(draft.options.len(), 2);
        while draft.can_add_option() {
            draft.add_option().unwrap();
        }
        assert_eq!(draft.options.len(), 10);
        assert_eq!(draft.add_option(), Err(Rejection::MaximumOptionsReached));
    }

    #[test]
    fn trimmed_options_strip_whitespace() {
        let draft = PollDraft::new("q").with_options([" Summer ", "Winter\n"]);
        assert_eq!(draft.trimmed_options(), vec!["Summer".to_string(), "Winter".to_string()]);
    }
}
