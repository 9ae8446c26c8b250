//! Voice intake: collect interview-setup fields by spoken Q&A.
//!
//! # Architecture
//!
//! ```text
//! run_voice_intake (async driver)
//!   │  speaks / listens through SpeechChannel, watches UserSignal::Cancel
//!   ▼
//! IntakeWizard (sans-IO state machine)
//!   Idle → Asking(0) → Listening(0) → Asking(1) → … → Complete
//!                 ▲          │ no result
//!                 └──────────┘ (bounded retries → Failed)
//! ```
//!
//! The wizard never touches audio.  It hands out epoch-tagged
//! [`WizardStep`]s and ignores every event whose epoch is not the one it is
//! waiting for, so late transcripts from a superseded listen are harmless.

pub mod driver;
pub mod fields;
pub mod state;
pub mod wizard;

use thiserror::Error;

use crate::speech::SpeechError;

pub use driver::run_voice_intake;
pub use fields::{normalize, normalize_typed, FieldKey, FieldSpec, FIELDS};
pub use state::{IntakeFields, IntakeState};
pub use wizard::{IntakeWizard, WizardPhase, WizardStep};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum IntakeError {
    #[error("voice intake is unavailable: {0}")]
    Unavailable(String),

    #[error("no answer heard for `{field}` after several attempts; please enter it manually")]
    RetriesExhausted { field: FieldKey },

    #[error("intake cancelled")]
    Cancelled,

    #[error("missing value for `{0}`")]
    MissingField(FieldKey),

    #[error(transparent)]
    Speech(#[from] SpeechError),
}
