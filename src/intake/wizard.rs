//! Sans-IO intake state machine.
//!
//! Each call either returns the next [`WizardStep`] for the driver to
//! perform or `None` when the event was stale (wrong epoch or wrong phase).

use crate::speech::Epoch;

use super::fields::{normalize, FieldKey, FIELDS};
use super::state::{IntakeFields, IntakeState};
use super::IntakeError;

const RETRY_PREFIX: &str = "I didn't catch that.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardPhase {
    Idle,
    /// Speaking the prompt for field `i`.
    Asking(usize),
    /// Waiting for the answer to field `i`.
    Listening(usize),
    Complete,
    Cancelled,
    Failed,
}

impl WizardPhase {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            WizardPhase::Complete | WizardPhase::Cancelled | WizardPhase::Failed
        )
    }
}

/// What the driver has to do next.
#[derive(Debug, Clone, PartialEq)]
pub enum WizardStep {
    /// Speak `text`, then report [`IntakeWizard::on_spoken`] with `epoch`.
    Speak {
        epoch: Epoch,
        field: FieldKey,
        text: String,
    },
    /// Capture one answer, then report it with `epoch`.
    Listen { epoch: Epoch },
    Complete(IntakeFields),
    Failed(IntakeError),
}

/// Short spoken confirmation of a captured value.
pub fn confirmation(value: &str) -> String {
    format!("Got it! {value}.")
}

#[derive(Debug)]
pub struct IntakeWizard {
    state: IntakeState,
    phase: WizardPhase,
    epoch: Epoch,
    retries: u32,
    max_retries: u32,
}

impl IntakeWizard {
    pub fn new(max_retries: u32) -> Self {
        Self {
            state: IntakeState::new(),
            phase: WizardPhase::Idle,
            epoch: Epoch::default(),
            retries: 0,
            max_retries,
        }
    }

    pub fn phase(&self) -> WizardPhase {
        self.phase
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    pub fn state(&self) -> &IntakeState {
        &self.state
    }

    pub fn is_listening(&self) -> bool {
        matches!(self.phase, WizardPhase::Listening(_))
    }

    /// Ask the first field.  Only valid from `Idle`.
    pub fn start(&mut self) -> Option<WizardStep> {
        if self.phase != WizardPhase::Idle {
            return None;
        }
        Some(self.ask(0, None))
    }

    /// The prompt for the pending `Speak` finished playing.
    pub fn on_spoken(&mut self, epoch: Epoch) -> Option<WizardStep> {
        let WizardPhase::Asking(i) = self.phase else {
            return None;
        };
        if epoch != self.epoch {
            log::debug!("intake: stale speak completion {epoch} (current {})", self.epoch);
            return None;
        }
        self.epoch = self.epoch.next();
        self.phase = WizardPhase::Listening(i);
        log::debug!("intake: Asking({i}) → Listening({i}) {}", self.epoch);
        Some(WizardStep::Listen { epoch: self.epoch })
    }

    /// A transcript arrived for the pending listen.
    ///
    /// A blank transcript counts as no result.
    pub fn on_transcript(&mut self, epoch: Epoch, transcript: &str) -> Option<WizardStep> {
        let i = self.listening_index(epoch)?;
        if transcript.trim().is_empty() {
            return self.on_no_result(epoch);
        }

        let key = FIELDS[i].key;
        let value = normalize(key, transcript);
        log::debug!("intake: {key} = {value:?}");
        self.state.record_current(value.clone());
        self.retries = 0;

        if self.state.is_complete() {
            return Some(match self.state.to_fields() {
                Ok(fields) => {
                    self.phase = WizardPhase::Complete;
                    self.epoch = self.epoch.next();
                    log::debug!("intake: Listening({i}) → Complete");
                    WizardStep::Complete(fields)
                }
                Err(e) => self.fail(e),
            });
        }
        Some(self.ask(i + 1, Some(confirmation(&value))))
    }

    /// The pending listen ended without a usable answer.
    pub fn on_no_result(&mut self, epoch: Epoch) -> Option<WizardStep> {
        let i = self.listening_index(epoch)?;
        if self.retries >= self.max_retries {
            let field = FIELDS[i].key;
            log::warn!("intake: no answer for {field} after {} retries", self.retries);
            return Some(self.fail(IntakeError::RetriesExhausted { field }));
        }
        self.retries += 1;
        log::debug!("intake: no result for field {i}, retry {}", self.retries);
        Some(self.ask(i, Some(RETRY_PREFIX.to_string())))
    }

    /// Abandon the intake from any non-terminal phase, discarding answers.
    ///
    /// Returns `true` if the wizard was active.
    pub fn cancel(&mut self) -> bool {
        if self.phase.is_terminal() {
            return false;
        }
        log::debug!("intake: {:?} → Cancelled", self.phase);
        self.phase = WizardPhase::Cancelled;
        self.state = IntakeState::new();
        self.epoch = self.epoch.next();
        true
    }

    fn listening_index(&self, epoch: Epoch) -> Option<usize> {
        match self.phase {
            WizardPhase::Listening(i) if epoch == self.epoch => Some(i),
            WizardPhase::Listening(_) => {
                log::debug!("intake: stale listen result {epoch} (current {})", self.epoch);
                None
            }
            _ => None,
        }
    }

    fn ask(&mut self, i: usize, prefix: Option<String>) -> WizardStep {
        let field = &FIELDS[i];
        self.epoch = self.epoch.next();
        self.phase = WizardPhase::Asking(i);
        let text = match prefix {
            Some(p) => format!("{p} {}", field.prompt),
            None => field.prompt.to_string(),
        };
        WizardStep::Speak {
            epoch: self.epoch,
            field: field.key,
            text,
        }
    }

    fn fail(&mut self, error: IntakeError) -> WizardStep {
        self.phase = WizardPhase::Failed;
        self.epoch = self.epoch.next();
        WizardStep::Failed(error)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
