use std::collections::HashMap;

/// Question identifier to chosen option identifier for one attempt.
#[derive(Debug, Clone, Default)]
pub struct AnswerTracker {
    chosen: HashMap<String, String>,
}

impl AnswerTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record (or overwrite) the option chosen for a question.
    pub fn select(&mut self, question_id: impl Into<String>, option_id: impl Into<String>) {
        self.chosen.insert(question_id.into(), option_id.into());
    }

    pub fn chosen(&self, question_id: &str) -> Option<&str> {
        self.chosen.get(question_id).map(String::as_str)
    }

    pub fn is_answered(&self, question_id: &str) -> bool {
        self.chosen.contains_key(question_id)
    }

    pub fn len(&self) -> usize {
        self.chosen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chosen.is_empty()
    }

    pub fn clear(&mut self) {
        self.chosen.clear();
    }
}
