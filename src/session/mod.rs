//! Interview session: ask each question, collect the answer, score.
//!
//! # Architecture
//!
//! ```text
//!                 UserSignal (Finish / Typed / Retry / Cancel)
//!                        │
//! SessionRunner ◀────────┤
//!   │   ▲                │
//!   │   └── TaggedCapture (epoch-checked) ◀── SpeechChannel capture
//!   ▼
//! SessionMachine (sans-IO)
//!   NotStarted → Asking(i) → Listening(i) → … → Scoring → Done
//!   │
//!   └─ Complete{answers} ─▶ feedback::score ─▶ Repository::append_result
//! ```

pub mod machine;
pub mod runner;
pub mod state;

use thiserror::Error;

use crate::interview::InterviewResult;
use crate::speech::SpeechError;
use crate::store::PersistenceError;

pub use machine::{SessionAction, SessionMachine, SessionMode, SessionNotice};
pub use runner::SessionRunner;
pub use state::{SessionPhase, SessionState};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("voice session is unavailable: {0}")]
    Unavailable(String),

    #[error("session cancelled")]
    Cancelled,

    #[error(transparent)]
    Speech(#[from] SpeechError),

    /// Scoring finished but the result could not be stored.
    #[error("interview completed but the result could not be saved: {source}")]
    Persist {
        result: Box<InterviewResult>,
        #[source]
        source: PersistenceError,
    },
}
