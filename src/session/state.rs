//! Session phase and per-run answer state.

use crate::interview::Interview;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    NotStarted,
    /// Speaking question `i`.
    Asking(usize),
    /// Collecting the answer to question `i`.
    Listening(usize),
    Scoring,
    Done,
    Cancelled,
}

impl SessionPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionPhase::Done | SessionPhase::Cancelled)
    }
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionPhase::NotStarted => write!(f, "NotStarted"),
            SessionPhase::Asking(i) => write!(f, "Asking({i})"),
            SessionPhase::Listening(i) => write!(f, "Listening({i})"),
            SessionPhase::Scoring => write!(f, "Scoring"),
            SessionPhase::Done => write!(f, "Done"),
            SessionPhase::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// The interview being taken and the answers given so far.
///
/// `answers` has one slot per question from the start; unanswered slots
/// hold `""`.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub interview: Interview,
    pub current_question: usize,
    pub answers: Vec<String>,
    pub listening: bool,
}

impl SessionState {
    pub fn new(interview: Interview) -> Self {
        let slots = interview.questions.len();
        Self {
            interview,
            current_question: 0,
            answers: vec![String::new(); slots],
            listening: false,
        }
    }

    pub fn total(&self) -> usize {
        self.interview.questions.len()
    }

    pub fn question(&self, index: usize) -> Option<&str> {
        self.interview.questions.get(index).map(String::as_str)
    }
}
