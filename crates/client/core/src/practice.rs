//! Practice mode feedback.
use crate::gesture::is_idle_name;

/// Result of comparing a recognized gesture against the one being practiced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PracticeFeedback {
    /// Nothing recognized yet, or the recognizer sees no hand.
    #[default]
    Idle,
    Match,
    Mismatch,
}

impl PracticeFeedback {
    pub fn evaluate(recognized: &str, expected: &str) -> Self {
        if recognized.is_empty() || is_idle_name(recognized) {
            PracticeFeedback::Idle
        } else if recognized == expected {
            PracticeFeedback::Match
        } else {
            PracticeFeedback::Mismatch
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evaluates_against_expected_gesture() {
        assert_eq!(
            PracticeFeedback::evaluate("Swipe Left", "Swipe Left"),
            PracticeFeedback::Match
        );
        assert_eq!(
            PracticeFeedback::evaluate("Zoom In", "Swipe Left"),
            PracticeFeedback::Mismatch
        );
        assert_eq!(
            PracticeFeedback::evaluate("no hand detected", "Swipe Left"),
            PracticeFeedback::Idle
        );
        assert_eq!(
            PracticeFeedback::evaluate("Normal", "Swipe Left"),
            PracticeFeedback::Idle
        );
    }
}
