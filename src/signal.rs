//! User input delivered to the voice flows while they run.

/// Signals from the front end (keyboard, buttons) to a running flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserSignal {
    /// Done answering the current question.
    Finish,
    /// A typed answer fragment.
    Typed(String),
    /// Restart capture after a blocked microphone.
    Retry,
    /// Abandon the flow.
    Cancel,
}
