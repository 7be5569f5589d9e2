use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum NavigationError {
    #[error("there are no questions to navigate")]
    NoQuestions,

    #[error("answer the current question before moving on")]
    UnansweredCurrent,

    #[error("already at the last question")]
    AtEnd,

    #[error("already at the first question")]
    AtStart,
}

/// Index of the question currently presented, always `0 <= index < len` when
/// there is at least one question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavigationCursor {
    index: usize,
    len: usize,
}

impl NavigationCursor {
    pub fn new(len: usize) -> Self {
        Self { index: 0, len }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_last(&self) -> bool {
        self.len > 0 && self.index == self.len - 1
    }

    pub fn can_advance(&self, answered_current: bool) -> bool {
        self.check_advance(answered_current).is_ok()
    }

    pub fn can_retreat(&self) -> bool {
        self.check_retreat().is_ok()
    }

    /// Move forward one question. Gated on the current question only.
    pub fn advance(&mut self, answered_current: bool) -> Result<usize, NavigationError> {
        self.check_advance(answered_current)?;
        self.index += 1;
        Ok(self.index)
    }

    pub fn retreat(&mut self) -> Result<usize, NavigationError> {
        self.check_retreat()?;
        self.index -= 1;
        Ok(self.index)
    }

    fn check_advance(&self, answered_current: bool) -> Result<(), NavigationError> {
        if self.len == 0 {
            return Err(NavigationError::NoQuestions);
        }
        if !answered_current {
            return Err(NavigationError::UnansweredCurrent);
        }
        if self.is_last() {
            return Err(NavigationError::AtEnd);
        }
        Ok(())
    }

    fn check_retreat(&self) -> Result<(), NavigationError> {
        if self.len == 0 {
            return Err(NavigationError::NoQuestions);
        }
        if self.index == 0 {
            return Err(NavigationError::AtStart);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_first_question() {
        let cursor = NavigationCursor::new(3);
        assert_eq!(cursor.index(), 0);
        assert!(!cursor.is_last());
        assert!(!cursor.can_retreat());
    }

    #[test]
    fn advance_requires_answered_current() {
        let mut cursor = NavigationCursor::new(2);

        assert_eq!(cursor.advance(false), Err(NavigationError::UnansweredCurrent));
        assert_eq!(cursor.index(), 0);
        assert_eq!(cursor.advance(true), Ok(1));
        assert!(cursor.is_last());
    }

    #[test]
    fn never_moves_past_the_last_question() {
        let mut cursor = NavigationCursor::new(2);
        cursor.advance(true).unwrap();

        assert_eq!(cursor.advance(true), Err(NavigationError::AtEnd));
        assert_eq!(cursor.index(), 1);
    }

    #[test]
    fn retreat_stops_at_zero() {
        let mut cursor = NavigationCursor::new(3);
        cursor.advance(true).unwrap();

        assert_eq!(cursor.retreat(), Ok(0));
        assert_eq!(cursor.retreat(), Err(NavigationError::AtStart));
    }

    #[test]
    fn stays_in_bounds_for_any_walk() {
        for len in 1..6 {
            let mut cursor = NavigationCursor::new(len);
            for step in 0..(len * 4) {
                if step % 3 == 2 {
                    let _ = cursor.retreat();
                } else {
                    let _ = cursor.advance(true);
                }
                assert!(cursor.index() < len);
            }
        }
    }

    #[test]
    fn empty_sequence_disables_navigation() {
        let mut cursor = NavigationCursor::new(0);

        assert!(cursor.is_empty());
        assert!(!cursor.is_last());
        assert_eq!(cursor.advance(true), Err(NavigationError::NoQuestions));
        assert_eq!(cursor.retreat(), Err(NavigationError::NoQuestions));
    }
}
