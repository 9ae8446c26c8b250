//! Speech I/O: prompt playback and spoken-answer capture.
//!
//! # Architecture
//!
//! ```text
//! IntakeWizard / SessionMachine
//!        │  Speak / Listen / StartCapture (epoch-tagged)
//!        ▼
//! SpeechChannel            ← sole owner of mic + speaker, one capture at a time
//!        │
//!        ▼
//! dyn SpeechAdapter
//!        └─ LocalSpeech
//!             ├─ speak:   TTS command (or stdout)
//!             └─ listen:  cpal capture → mono 16 kHz → UtteranceSegmenter
//!                          → spawn_blocking(SttEngine::transcribe)
//! ```
//!
//! Continuous capture delivers [`CaptureEvent`]s over a `tokio::sync::mpsc`
//! channel.  Every event carries the [`Epoch`] it was started with so the
//! owning state machine can drop events from a superseded capture.

pub mod capture;
pub mod channel;
pub mod local;
pub mod segmenter;
pub mod stt;

#[cfg(test)]
pub mod testing;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

pub use capture::{resample_to_16k, to_mono, AudioCapture, AudioChunk, CaptureError};
pub use channel::SpeechChannel;
pub use local::LocalSpeech;
pub use segmenter::{SegmentEvent, UtteranceSegmenter};
pub use stt::{SttEngine, SttError, WhisperEngine};

// ---------------------------------------------------------------------------
// SpeechError
// ---------------------------------------------------------------------------

/// Everything that can go wrong while speaking or listening.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SpeechError {
    /// The host has no usable capture capability (no device, no model).
    #[error("speech capture is unavailable: {0}")]
    Unavailable(String),

    /// The capture session ended without any recognisable speech.
    #[error("no speech detected")]
    NoSpeech,

    /// The microphone is blocked by the OS or the user.
    #[error("microphone access is blocked; allow microphone access and retry")]
    PermissionDenied,

    /// A capture was requested while another one was still active.
    #[error("a capture session is already active")]
    Busy,

    /// A single listen attempt exceeded its deadline.
    #[error("listening timed out")]
    Timeout,

    #[error("audio capture failed: {0}")]
    Capture(String),

    #[error("transcription failed: {0}")]
    Transcription(String),

    #[error("prompt playback failed: {0}")]
    Playback(String),
}

impl SpeechError {
    /// `true` for outcomes that warrant re-asking rather than giving up.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, SpeechError::NoSpeech | SpeechError::Timeout)
    }
}

// ---------------------------------------------------------------------------
// Availability
// ---------------------------------------------------------------------------

/// Up-front capability report, distinct from a per-listen no-result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Availability {
    Available,
    Unavailable(String),
}

impl Availability {
    pub fn is_available(&self) -> bool {
        matches!(self, Availability::Available)
    }

    /// Convert into a `Result`, mapping `Unavailable` to [`SpeechError::Unavailable`].
    pub fn check(&self) -> Result<(), SpeechError> {
        match self {
            Availability::Available => Ok(()),
            Availability::Unavailable(reason) => Err(SpeechError::Unavailable(reason.clone())),
        }
    }
}

// ---------------------------------------------------------------------------
// Epoch / capture events
// ---------------------------------------------------------------------------

/// Generation tag identifying one pending operation of one state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Epoch(pub u64);

impl Epoch {
    pub fn next(self) -> Self {
        Epoch(self.0 + 1)
    }
}

impl std::fmt::Display for Epoch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Events produced by a continuous capture session.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureEvent {
    /// One finalized utterance.
    Fragment(String),
    /// The host ended the session on its own (e.g. no-speech timeout).
    Ended,
    /// The session failed.
    Error(SpeechError),
}

/// A [`CaptureEvent`] together with the epoch of the capture that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct TaggedCapture {
    pub epoch: Epoch,
    pub event: CaptureEvent,
}

/// Sending half handed to [`SpeechAdapter::start_capture`].
pub type CaptureSender = mpsc::Sender<TaggedCapture>;

// ---------------------------------------------------------------------------
// SpeechAdapter trait
// ---------------------------------------------------------------------------

/// Host speech capabilities consumed by the wizard and the session runner.
///
/// Implementations must be `Send + Sync` so they can sit behind an
/// `Arc<dyn SpeechAdapter>`.  Callers should go through [`SpeechChannel`],
/// which serialises access and rejects overlapping captures.
#[async_trait]
pub trait SpeechAdapter: Send + Sync {
    /// Whether capture can work at all on this host.
    fn availability(&self) -> Availability;

    /// Play `text`; resolves exactly once, after playback has finished.
    async fn speak(&self, text: &str) -> Result<(), SpeechError>;

    /// Capture one utterance and return its transcript.
    ///
    /// Dropping the returned future must stop the capture.
    async fn listen_once(&self) -> Result<String, SpeechError>;

    /// Begin continuous capture; every event is sent tagged with `epoch`.
    fn start_capture(&self, epoch: Epoch, events: CaptureSender) -> Result<(), SpeechError>;

    /// Stop listening for new speech but keep delivering what was already
    /// heard, then send [`CaptureEvent::Ended`].  The default stops at once.
    fn finish_capture(&self) {
        self.stop_capture();
    }

    /// Stop the current continuous capture.  Idempotent.
    fn stop_capture(&self);
}

const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn SpeechAdapter>) {}
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverable_errors() {
        assert!(SpeechError::NoSpeech.is_recoverable());
        assert!(SpeechError::Timeout.is_recoverable());
        assert!(!SpeechError::PermissionDenied.is_recoverable());
        assert!(!SpeechError::Busy.is_recoverable());
        assert!(!SpeechError::Unavailable("no mic".into()).is_recoverable());
    }

    #[test]
    fn availability_check_maps_reason() {
        assert!(Availability::Available.check().is_ok());
        let err = Availability::Unavailable("model missing".into())
            .check()
            .unwrap_err();
        assert_eq!(err, SpeechError::Unavailable("model missing".into()));
    }

    #[test]
    fn epochs_increase() {
        let e = Epoch::default();
        assert_eq!(e.next(), Epoch(1));
        assert!(e.next().next() > e);
        assert_eq!(Epoch(7).to_string(), "#7");
    }

    #[test]
    fn permission_message_is_actionable() {
        let msg = SpeechError::PermissionDenied.to_string();
        assert!(msg.contains("allow microphone access"));
    }
}
