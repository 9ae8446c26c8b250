//! Sans-IO interview session state machine.
//!
//! Inputs are method calls (`on_spoken`, `on_capture`, `on_finish`, …); the
//! output of every call is the list of [`SessionAction`]s the runner must
//! perform, in order.  Stale inputs produce an empty list.

use crate::interview::Interview;
use crate::speech::{CaptureEvent, Epoch, SpeechError, TaggedCapture};

use super::state::{SessionPhase, SessionState};

/// How answers are collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    /// Continuous speech capture while listening.
    Voice,
    /// Answers arrive as typed text; no capture is started.
    Typed,
}

/// Progress reports for the front end.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionNotice {
    Question {
        index: usize,
        total: usize,
        text: String,
    },
    Listening {
        index: usize,
    },
    /// The answer text accumulated so far for the current question.
    Transcript {
        index: usize,
        text: String,
    },
    CaptureRestarted {
        index: usize,
    },
    /// Capture cannot continue until the user retries.
    Blocked {
        message: String,
    },
    AnswerSaved {
        index: usize,
        total: usize,
        answer: String,
    },
    Scored {
        result_id: String,
        confidence: u8,
    },
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionAction {
    Speak { epoch: Epoch, text: String },
    StartCapture { epoch: Epoch },
    /// Stop listening but deliver what was already heard, then `Ended`.
    DrainCapture { epoch: Epoch },
    StopCapture,
    Notify(SessionNotice),
    /// Every question has been answered; score these answers.
    Complete { answers: Vec<String> },
}

#[derive(Debug)]
pub struct SessionMachine {
    state: SessionState,
    mode: SessionMode,
    phase: SessionPhase,
    epoch: Epoch,
    fragments: Vec<String>,
    capturing: bool,
    draining: bool,
    blocked: bool,
}

impl SessionMachine {
    pub fn new(interview: Interview, mode: SessionMode) -> Self {
        Self {
            state: SessionState::new(interview),
            mode,
            phase: SessionPhase::NotStarted,
            epoch: Epoch::default(),
            fragments: Vec::new(),
            capturing: false,
            draining: false,
            blocked: false,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_blocked(&self) -> bool {
        self.blocked
    }

    /// `true` between a finish and the end of the capture drain.
    pub fn is_draining(&self) -> bool {
        self.draining
    }

    /// Answer text collected so far for the current question.
    pub fn current_answer(&self) -> String {
        self.fragments.join(" ")
    }

    pub fn start(&mut self) -> Vec<SessionAction> {
        if self.phase != SessionPhase::NotStarted {
            return Vec::new();
        }
        if self.state.total() == 0 {
            return self.complete();
        }
        self.ask(0)
    }

    /// The pending `Speak` finished.
    pub fn on_spoken(&mut self, epoch: Epoch) -> Vec<SessionAction> {
        let SessionPhase::Asking(i) = self.phase else {
            return Vec::new();
        };
        if epoch != self.epoch {
            log::debug!("session: stale speak completion {epoch} (current {})", self.epoch);
            return Vec::new();
        }

        self.phase = SessionPhase::Listening(i);
        self.state.listening = true;
        log::debug!("session: Asking({i}) → Listening({i})");

        let mut actions = vec![SessionAction::Notify(SessionNotice::Listening { index: i })];
        if self.mode == SessionMode::Voice {
            actions.push(self.start_capture());
        }
        actions
    }

    /// An event from the continuous capture.
    pub fn on_capture(&mut self, tagged: TaggedCapture) -> Vec<SessionAction> {
        let SessionPhase::Listening(i) = self.phase else {
            return Vec::new();
        };
        if tagged.epoch != self.epoch || !(self.capturing || self.draining) {
            log::debug!(
                "session: dropping capture event from {} (current {})",
                tagged.epoch,
                self.epoch
            );
            return Vec::new();
        }

        if self.draining {
            return match tagged.event {
                CaptureEvent::Fragment(text) => self.append(i, &text),
                CaptureEvent::Ended => self.save_answer(i),
                CaptureEvent::Error(e) => {
                    log::warn!("session: capture failed while finishing: {e}");
                    self.save_answer(i)
                }
            };
        }

        match tagged.event {
            CaptureEvent::Fragment(text) => self.append(i, &text),
            CaptureEvent::Ended => {
                log::debug!("session: capture ended while listening, restarting");
                self.restart_capture(i)
            }
            CaptureEvent::Error(e) if e.is_recoverable() => {
                log::warn!("session: {e}, restarting capture");
                self.restart_capture(i)
            }
            CaptureEvent::Error(e) => self.block(e),
        }
    }

    /// A typed answer fragment.
    pub fn on_typed(&mut self, text: &str) -> Vec<SessionAction> {
        match self.phase {
            SessionPhase::Listening(i) => self.append(i, text),
            _ => Vec::new(),
        }
    }

    /// Restart capture after it was blocked.
    pub fn on_retry(&mut self) -> Vec<SessionAction> {
        let SessionPhase::Listening(i) = self.phase else {
            return Vec::new();
        };
        if !self.blocked || self.mode != SessionMode::Voice {
            return Vec::new();
        }
        log::debug!("session: retrying capture for question {i}");
        self.blocked = false;
        vec![self.start_capture()]
    }

    /// The user is done with the current answer.
    ///
    /// A running capture is drained first; the answer is saved once it
    /// reports `Ended`, on [`Self::on_drain_timeout`], or on a second finish.
    pub fn on_finish(&mut self) -> Vec<SessionAction> {
        let SessionPhase::Listening(i) = self.phase else {
            return Vec::new();
        };

        if self.capturing {
            self.capturing = false;
            self.draining = true;
            log::debug!("session: draining capture {} for answer {}", self.epoch, i + 1);
            return vec![SessionAction::DrainCapture { epoch: self.epoch }];
        }
        self.save_answer(i)
    }

    /// The drain started by `on_finish` took too long; save what we have.
    pub fn on_drain_timeout(&mut self, epoch: Epoch) -> Vec<SessionAction> {
        let SessionPhase::Listening(i) = self.phase else {
            return Vec::new();
        };
        if !self.draining || epoch != self.epoch {
            return Vec::new();
        }
        log::warn!("session: capture {epoch} did not drain in time");
        self.save_answer(i)
    }

    /// Abandon the session from any non-terminal phase.
    pub fn cancel(&mut self) -> Vec<SessionAction> {
        if self.phase.is_terminal() {
            return Vec::new();
        }
        log::debug!("session: {} → Cancelled", self.phase);
        let mut actions = Vec::new();
        if self.capturing || self.draining {
            self.capturing = false;
            self.draining = false;
            actions.push(SessionAction::StopCapture);
        }
        self.phase = SessionPhase::Cancelled;
        self.epoch = self.epoch.next();
        self.state.listening = false;
        self.fragments.clear();
        actions.push(SessionAction::Notify(SessionNotice::Cancelled));
        actions
    }

    /// The result has been handled; the session is over.
    pub fn mark_done(&mut self) {
        if self.phase == SessionPhase::Scoring {
            self.phase = SessionPhase::Done;
        }
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn save_answer(&mut self, i: usize) -> Vec<SessionAction> {
        let mut actions = Vec::new();
        if self.draining {
            self.draining = false;
            actions.push(SessionAction::StopCapture);
        }
        self.epoch = self.epoch.next();
        self.blocked = false;
        self.state.listening = false;

        let answer = std::mem::take(&mut self.fragments).join(" ");
        self.state.answers[i] = answer.clone();
        let total = self.state.total();
        log::debug!("session: answer {} of {total} saved ({} chars)", i + 1, answer.len());
        actions.push(SessionAction::Notify(SessionNotice::AnswerSaved {
            index: i,
            total,
            answer,
        }));

        if i + 1 < total {
            actions.extend(self.ask(i + 1));
        } else {
            actions.extend(self.complete());
        }
        actions
    }

    fn ask(&mut self, i: usize) -> Vec<SessionAction> {
        self.epoch = self.epoch.next();
        self.phase = SessionPhase::Asking(i);
        self.state.current_question = i;

        let question = self.state.question(i).unwrap_or_default().to_string();
        log::debug!("session: → Asking({i})");
        vec![
            SessionAction::Notify(SessionNotice::Question {
                index: i,
                total: self.state.total(),
                text: question.clone(),
            }),
            SessionAction::Speak {
                epoch: self.epoch,
                text: format!("Question {}: {question}", i + 1),
            },
        ]
    }

    fn start_capture(&mut self) -> SessionAction {
        self.epoch = self.epoch.next();
        self.capturing = true;
        SessionAction::StartCapture { epoch: self.epoch }
    }

    fn restart_capture(&mut self, i: usize) -> Vec<SessionAction> {
        vec![
            SessionAction::StopCapture,
            self.start_capture(),
            SessionAction::Notify(SessionNotice::CaptureRestarted { index: i }),
        ]
    }

    fn block(&mut self, error: SpeechError) -> Vec<SessionAction> {
        log::error!("session: capture blocked: {error}");
        self.capturing = false;
        self.blocked = true;
        self.epoch = self.epoch.next();
        vec![
            SessionAction::StopCapture,
            SessionAction::Notify(SessionNotice::Blocked {
                message: error.to_string(),
            }),
        ]
    }

    fn append(&mut self, i: usize, text: &str) -> Vec<SessionAction> {
        let text = text.trim();
        if text.is_empty() {
            return Vec::new();
        }
        self.fragments.push(text.to_string());
        vec![SessionAction::Notify(SessionNotice::Transcript {
            index: i,
            text: self.current_answer(),
        })]
    }

    fn complete(&mut self) -> Vec<SessionAction> {
        self.phase = SessionPhase::Scoring;
        log::debug!("session: → Scoring");
        vec![SessionAction::Complete {
            answers: self.state.answers.clone(),
        }]
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
