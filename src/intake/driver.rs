//! Async driver that runs an [`IntakeWizard`] against a [`SpeechChannel`].

use tokio::sync::mpsc;

use crate::signal::UserSignal;
use crate::speech::{SpeechChannel, SpeechError};

use super::state::IntakeFields;
use super::wizard::{confirmation, IntakeWizard, WizardStep};
use super::IntakeError;

pub const INTRO: &str = "Hello! I'm your AI assistant. I'll help you generate a custom interview. \
                         Let's start with the first question.";
pub const CLOSING: &str = "Perfect! Generating your interview now.";

enum Outcome<T> {
    Done(T),
    Cancelled,
}

/// Run `fut` unless a [`UserSignal::Cancel`] arrives first.
///
/// Other signals are dropped; a closed signal channel disables cancellation.
async fn or_cancel<T>(
    fut: impl std::future::Future<Output = T>,
    signals: &mut mpsc::Receiver<UserSignal>,
) -> Outcome<T> {
    tokio::pin!(fut);
    loop {
        tokio::select! {
            out = &mut fut => return Outcome::Done(out),
            Some(signal) = signals.recv() => {
                if signal == UserSignal::Cancel {
                    return Outcome::Cancelled;
                }
                log::debug!("intake: ignoring {signal:?}");
            }
        }
    }
}

/// Collect all intake fields by voice.
///
/// Returns [`IntakeError::Unavailable`] up front when the host cannot
/// capture, and [`IntakeError::RetriesExhausted`] when a field went
/// unanswered; callers fall back to manual entry in both cases.  Cancelling
/// drops the in-flight listen, which stops the capture.
pub async fn run_voice_intake(
    channel: &SpeechChannel,
    max_retries: u32,
    signals: &mut mpsc::Receiver<UserSignal>,
) -> Result<IntakeFields, IntakeError> {
    if let Err(SpeechError::Unavailable(reason)) = channel.availability().check() {
        log::warn!("intake: voice unavailable: {reason}");
        return Err(IntakeError::Unavailable(reason));
    }

    let mut wizard = IntakeWizard::new(max_retries);
    log::info!("intake: voice intake started");

    if let Outcome::Cancelled = or_cancel(channel.speak(INTRO), signals).await {
        wizard.cancel();
        return Err(IntakeError::Cancelled);
    }

    let mut next = wizard.start();
    while let Some(step) = next {
        next = match step {
            WizardStep::Speak { epoch, text, .. } => {
                match or_cancel(channel.speak(&text), signals).await {
                    Outcome::Done(result) => {
                        result?;
                        wizard.on_spoken(epoch)
                    }
                    Outcome::Cancelled => break,
                }
            }
            WizardStep::Listen { epoch } => match or_cancel(channel.listen_once(), signals).await {
                Outcome::Done(Ok(transcript)) => {
                    log::debug!("intake: heard {transcript:?}");
                    wizard.on_transcript(epoch, &transcript)
                }
                Outcome::Done(Err(e)) if e.is_recoverable() => {
                    log::warn!("intake: {e}");
                    wizard.on_no_result(epoch)
                }
                Outcome::Done(Err(e)) => {
                    log::error!("intake: capture failed: {e}");
                    wizard.cancel();
                    return Err(e.into());
                }
                Outcome::Cancelled => break,
            },
            WizardStep::Complete(fields) => {
                let closing = format!("{} {CLOSING}", confirmation(&fields.question_count));
                if let Err(e) = channel.speak(&closing).await {
                    log::warn!("intake: closing prompt failed: {e}");
                }
                log::info!("intake: complete");
                return Ok(fields);
            }
            WizardStep::Failed(e) => return Err(e),
        };
    }

    wizard.cancel();
    log::info!("intake: cancelled");
    Err(IntakeError::Cancelled)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
