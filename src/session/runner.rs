//! Async session runner. Performs [`SessionAction`]s and feeds capture
//! events and user signals back into the [`SessionMachine`].
//!
//! # Event loop
//!
//! ```text
//! speak welcome
//! loop:
//!   perform pending actions in order
//!     Speak        → channel.speak (Cancel interrupts, other signals are deferred)
//!     StartCapture → channel.start_capture(epoch, capture_tx)
//!     DrainCapture → channel.finish_capture + drain deadline
//!     StopCapture  → channel.stop_capture
//!     Notify       → notices channel (+ spoken acknowledgement)
//!     Complete     → score → append_result → return
//!   next input: queued capture event, deferred signal, or
//!   select! (biased: capture events, user signals, drain deadline)
//! ```

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::feedback;
use crate::interview::{Interview, InterviewResult};
use crate::signal::UserSignal;
use crate::speech::{CaptureEvent, Epoch, SpeechChannel, SpeechError, TaggedCapture};
use crate::store::Repository;

use super::machine::{SessionAction, SessionMachine, SessionMode, SessionNotice};
use super::state::SessionPhase;
use super::SessionError;

const CAPTURE_QUEUE: usize = 32;

/// How long a finished capture may take to deliver its last utterance.
/// Covers one Whisper pass over a long trailing utterance.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

const ACKNOWLEDGEMENT: &str = "Thank you for your answer. Moving to the next question.";
const COMPLETION: &str = "Congratulations! You have completed the interview. \
                          I'm now generating your feedback. Please wait a moment.";

fn welcome(interview: &Interview) -> String {
    format!(
        "Welcome to your {} interview. I'll be asking you {} questions. Please answer each \
         question clearly and take your time. Let's begin with the first question.",
        interview.role,
        interview.questions.len()
    )
}

enum Input {
    Capture(TaggedCapture),
    Signal(UserSignal),
    DrainElapsed,
    Closed,
}

enum Spoken {
    Done,
    Cancelled,
}

/// Runs one interview for one user and stores the scored result.
pub struct SessionRunner {
    channel: Arc<SpeechChannel>,
    repository: Repository,
    user: String,
    notices: Option<mpsc::Sender<SessionNotice>>,
    drain_timeout: Duration,
}

impl SessionRunner {
    /// `user` is the storage namespace the result is appended under.
    pub fn new(channel: Arc<SpeechChannel>, repository: Repository, user: impl Into<String>) -> Self {
        Self {
            channel,
            repository,
            user: user.into(),
            notices: None,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }

    /// Report progress on `notices`.  Notices are dropped if the receiver
    /// falls behind.
    pub fn with_notices(mut self, notices: mpsc::Sender<SessionNotice>) -> Self {
        self.notices = Some(notices);
        self
    }

    /// Save the answer anyway if a finished capture has not ended within
    /// `timeout`.
    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// Run `interview` to completion.
    ///
    /// Closing `signals` cancels the session.
    pub async fn run(
        &self,
        interview: Interview,
        mode: SessionMode,
        signals: &mut mpsc::Receiver<UserSignal>,
    ) -> Result<InterviewResult, SessionError> {
        if mode == SessionMode::Voice {
            if let Err(SpeechError::Unavailable(reason)) = self.channel.availability().check() {
                log::warn!("session: voice unavailable: {reason}");
                return Err(SessionError::Unavailable(reason));
            }
        }
        log::info!(
            "session: starting {} ({} questions, {mode:?})",
            interview.id,
            interview.questions.len()
        );

        let mut machine = SessionMachine::new(interview.clone(), mode);
        let (capture_tx, mut capture_rx) = mpsc::channel(CAPTURE_QUEUE);
        let mut deferred: VecDeque<UserSignal> = VecDeque::new();
        let mut drain: Option<(Epoch, Instant)> = None;

        if let Spoken::Cancelled = self
            .speak_watching(&welcome(&interview), signals, &mut deferred)
            .await?
        {
            return Err(self.cancelled(&mut machine, &interview));
        }
        let mut pending: VecDeque<SessionAction> = machine.start().into();

        loop {
            while let Some(action) = pending.pop_front() {
                match action {
                    SessionAction::Speak { epoch, text } => {
                        match self.speak_watching(&text, signals, &mut deferred).await {
                            Ok(Spoken::Done) => pending.extend(machine.on_spoken(epoch)),
                            Ok(Spoken::Cancelled) => {
                                return Err(self.cancelled(&mut machine, &interview));
                            }
                            Err(e) => {
                                self.channel.stop_capture();
                                return Err(e.into());
                            }
                        }
                    }
                    SessionAction::StartCapture { epoch } => {
                        if let Err(e) = self.channel.start_capture(epoch, capture_tx.clone()) {
                            log::warn!("session: capture {epoch} failed to start: {e}");
                            pending.extend(machine.on_capture(TaggedCapture {
                                epoch,
                                event: CaptureEvent::Error(e),
                            }));
                        }
                    }
                    SessionAction::DrainCapture { epoch } => {
                        self.channel.finish_capture();
                        drain = Some((epoch, Instant::now() + self.drain_timeout));
                    }
                    SessionAction::StopCapture => self.channel.stop_capture(),
                    SessionAction::Notify(notice) => {
                        let more_questions = matches!(
                            &notice,
                            SessionNotice::AnswerSaved { index, total, .. } if index + 1 < *total
                        );
                        self.notify(notice);
                        if more_questions {
                            if let Spoken::Cancelled = self
                                .speak_watching(ACKNOWLEDGEMENT, signals, &mut deferred)
                                .await?
                            {
                                return Err(self.cancelled(&mut machine, &interview));
                            }
                        }
                    }
                    SessionAction::Complete { answers } => {
                        return self.finish(&mut machine, &interview, answers).await;
                    }
                }
            }

            if machine.phase() == SessionPhase::Cancelled {
                self.channel.stop_capture();
                log::info!("session: {} cancelled", interview.id);
                return Err(SessionError::Cancelled);
            }
            if !machine.is_draining() {
                drain = None;
            }

            let input = if let Ok(tagged) = capture_rx.try_recv() {
                Input::Capture(tagged)
            } else if let Some(signal) = deferred.pop_front() {
                Input::Signal(signal)
            } else {
                let deadline = drain.map_or_else(Instant::now, |(_, at)| at);
                tokio::select! {
                    biased;
                    Some(tagged) = capture_rx.recv() => Input::Capture(tagged),
                    signal = signals.recv() => signal.map_or(Input::Closed, Input::Signal),
                    () = tokio::time::sleep_until(deadline), if drain.is_some() => Input::DrainElapsed,
                }
            };

            let actions = match input {
                Input::Capture(tagged) => machine.on_capture(tagged),
                Input::Signal(UserSignal::Finish) => machine.on_finish(),
                Input::Signal(UserSignal::Typed(text)) => machine.on_typed(&text),
                Input::Signal(UserSignal::Retry) => machine.on_retry(),
                Input::Signal(UserSignal::Cancel) => machine.cancel(),
                Input::DrainElapsed => match drain.take() {
                    Some((epoch, _)) => machine.on_drain_timeout(epoch),
                    None => Vec::new(),
                },
                Input::Closed => {
                    log::debug!("session: signal channel closed");
                    machine.cancel()
                }
            };
            pending.extend(actions);
        }
    }

    /// Speak `text` while watching `signals`.  Cancel (or a closed channel)
    /// interrupts playback; every other signal is queued on `deferred` in
    /// arrival order.
    async fn speak_watching(
        &self,
        text: &str,
        signals: &mut mpsc::Receiver<UserSignal>,
        deferred: &mut VecDeque<UserSignal>,
    ) -> Result<Spoken, SpeechError> {
        let speech = self.channel.speak(text);
        tokio::pin!(speech);
        loop {
            tokio::select! {
                result = &mut speech => return result.map(|()| Spoken::Done),
                signal = signals.recv() => match signal {
                    Some(UserSignal::Cancel) | None => return Ok(Spoken::Cancelled),
                    Some(other) => deferred.push_back(other),
                },
            }
        }
    }

    fn cancelled(&self, machine: &mut SessionMachine, interview: &Interview) -> SessionError {
        for action in machine.cancel() {
            if let SessionAction::Notify(notice) = action {
                self.notify(notice);
            }
        }
        self.channel.stop_capture();
        log::info!("session: {} cancelled during playback", interview.id);
        SessionError::Cancelled
    }

    async fn finish(
        &self,
        machine: &mut SessionMachine,
        interview: &Interview,
        answers: Vec<String>,
    ) -> Result<InterviewResult, SessionError> {
        if let Err(e) = self.channel.speak(COMPLETION).await {
            log::warn!("session: completion prompt failed: {e}");
        }

        let fb = feedback::score(interview, &answers);
        let result = InterviewResult::new(
            interview,
            answers,
            fb.feedback_text,
            fb.confidence_score,
        );
        machine.mark_done();

        match self.repository.append_result(&self.user, &result) {
            Ok(()) => {
                log::info!(
                    "session: {} scored {} ({})",
                    result.id,
                    result.confidence_score,
                    fb.level
                );
                self.notify(SessionNotice::Scored {
                    result_id: result.id.clone(),
                    confidence: result.confidence_score,
                });
                Ok(result)
            }
            Err(source) => {
                log::error!("session: failed to save {}: {source}", result.id);
                Err(SessionError::Persist {
                    result: Box::new(result),
                    source,
                })
            }
        }
    }

    fn notify(&self, notice: SessionNotice) {
        if let Some(tx) = &self.notices {
            if let Err(e) = tx.try_send(notice) {
                log::debug!("session: notice dropped: {e}");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intake::IntakeFields;
    use crate::speech::testing::ScriptedSpeech;
    use crate::store::{FailingStore, MemoryStore};
    use std::time::Duration;

    fn interview(count: &str) -> Interview {
        let fields =
            IntakeFields::manual("Backend developer", "technical", "senior", "Rust", count)
                .unwrap();
        Interview::generate(&fields)
    }

    fn fragment(text: &str) -> CaptureEvent {
        CaptureEvent::Fragment(text.into())
    }

    struct Harness {
        adapter: Arc<ScriptedSpeech>,
        repository: Repository,
        runner: SessionRunner,
        notices: mpsc::Receiver<SessionNotice>,
    }

    fn harness(adapter: ScriptedSpeech) -> Harness {
        harness_with_store(adapter, Repository::new(Arc::new(MemoryStore::new())))
    }

    fn harness_with_store(adapter: ScriptedSpeech, repository: Repository) -> Harness {
        let adapter = Arc::new(adapter);
        let channel = Arc::new(SpeechChannel::new(adapter.clone(), Duration::from_secs(5)));
        let (tx, notices) = mpsc::channel(64);
        let runner = SessionRunner::new(channel, repository.clone(), "ana").with_notices(tx);
        Harness {
            adapter,
            repository,
            runner,
            notices,
        }
    }

    async fn signals(list: Vec<UserSignal>) -> (mpsc::Sender<UserSignal>, mpsc::Receiver<UserSignal>) {
        let (tx, rx) = mpsc::channel(16);
        for s in list {
            tx.send(s).await.unwrap();
        }
        (tx, rx)
    }

    fn drain(rx: &mut mpsc::Receiver<SessionNotice>) -> Vec<SessionNotice> {
        let mut out = Vec::new();
        while let Ok(n) = rx.try_recv() {
            out.push(n);
        }
        out
    }

    #[tokio::test]
    async fn voice_session_collects_answers_and_persists() {
        let h = harness(ScriptedSpeech::new().with_captures(vec![
            vec![fragment("I would use"), fragment("a hash map")],
            vec![fragment("Profiling first")],
        ]));
        let iv = interview("2");
        let (_tx, mut rx) = signals(vec![UserSignal::Finish, UserSignal::Finish]).await;

        let result = h.runner.run(iv.clone(), SessionMode::Voice, &mut rx).await.unwrap();
        assert_eq!(result.answers, vec!["I would use a hash map", "Profiling first"]);
        assert_eq!(result.interview_id, iv.id);
        assert_eq!(result.role, "Backend developer");

        let stored = h.repository.find_result("ana", &result.id).unwrap();
        assert_eq!(stored, Some(result));

        let spoken = h.adapter.spoken();
        assert!(spoken[0].starts_with("Welcome to your Backend developer interview."));
        assert!(spoken[0].contains("I'll be asking you 2 questions."));
        assert_eq!(spoken[1], format!("Question 1: {}", iv.questions[0]));
        assert_eq!(spoken[2], ACKNOWLEDGEMENT);
        assert_eq!(spoken[3], format!("Question 2: {}", iv.questions[1]));
        assert_eq!(spoken.last().map(String::as_str), Some(COMPLETION));
        assert_eq!(h.adapter.started_epochs().len(), 2);
        assert_eq!(h.adapter.stop_count(), 2);
    }

    #[tokio::test]
    async fn capture_restart_keeps_partial_answer() {
        let mut h = harness(ScriptedSpeech::new().with_captures(vec![
            vec![fragment("part one"), CaptureEvent::Ended],
            vec![fragment("part two")],
        ]));
        let (_tx, mut rx) = signals(vec![UserSignal::Finish]).await;

        let result = h.runner.run(interview("1"), SessionMode::Voice, &mut rx).await.unwrap();
        assert_eq!(result.answers, vec!["part one part two"]);

        let epochs = h.adapter.started_epochs();
        assert_eq!(epochs.len(), 2);
        assert!(epochs[1] > epochs[0]);
        assert!(drain(&mut h.notices)
            .iter()
            .any(|n| matches!(n, SessionNotice::CaptureRestarted { index: 0 })));
    }

    #[tokio::test]
    async fn permission_denied_blocks_until_retry() {
        let mut h = harness(ScriptedSpeech::new().with_captures(vec![
            vec![
                fragment("partial"),
                CaptureEvent::Error(SpeechError::PermissionDenied),
            ],
            vec![fragment("more")],
        ]));
        let (_tx, mut rx) = signals(vec![UserSignal::Retry, UserSignal::Finish]).await;

        let result = h.runner.run(interview("1"), SessionMode::Voice, &mut rx).await.unwrap();
        assert_eq!(result.answers, vec!["partial more"]);

        let notices = drain(&mut h.notices);
        assert!(notices.iter().any(|n| matches!(
            n,
            SessionNotice::Blocked { message } if message.contains("microphone")
        )));
        assert!(notices
            .iter()
            .any(|n| matches!(n, SessionNotice::Scored { .. })));
    }

    #[tokio::test]
    async fn typed_session_works_without_capture() {
        let h = harness(ScriptedSpeech::new().unavailable("no microphone"));
        let (_tx, mut rx) = signals(vec![
            UserSignal::Typed("Because".into()),
            UserSignal::Typed("it scales".into()),
            UserSignal::Finish,
            UserSignal::Finish,
        ])
        .await;

        let result = h.runner.run(interview("2"), SessionMode::Typed, &mut rx).await.unwrap();
        assert_eq!(result.answers, vec!["Because it scales".to_string(), String::new()]);
        assert_eq!(result.confidence_score, 50);
        assert!(h.adapter.started_epochs().is_empty());
    }

    #[tokio::test]
    async fn voice_session_refused_when_unavailable() {
        let h = harness(ScriptedSpeech::new().unavailable("model missing"));
        let (_tx, mut rx) = signals(vec![]).await;

        let err = h
            .runner
            .run(interview("1"), SessionMode::Voice, &mut rx)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Unavailable(r) if r == "model missing"));
        assert!(h.adapter.spoken().is_empty());
    }

    #[tokio::test]
    async fn persistence_failure_returns_completed_result() {
        let h = harness_with_store(
            ScriptedSpeech::new(),
            Repository::new(Arc::new(FailingStore)),
        );
        let (_tx, mut rx) = signals(vec![
            UserSignal::Typed("an answer".into()),
            UserSignal::Finish,
        ])
        .await;

        match h.runner.run(interview("1"), SessionMode::Typed, &mut rx).await {
            Err(SessionError::Persist { result, source }) => {
                assert_eq!(result.answers, vec!["an answer"]);
                assert!(matches!(source, crate::store::PersistenceError::Io(_)));
            }
            other => panic!("expected Persist error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn cancel_stops_capture_and_persists_nothing() {
        let h = harness(ScriptedSpeech::new().with_captures(vec![vec![fragment("half")]]));
        let (tx, mut rx) = signals(vec![]).await;
        let adapter = h.adapter.clone();
        let cancel_once_listening = async move {
            while adapter.started_epochs().is_empty() {
                tokio::task::yield_now().await;
            }
            tx.send(UserSignal::Cancel).await.unwrap();
            tx
        };

        let (outcome, _tx) = tokio::join!(
            h.runner.run(interview("2"), SessionMode::Voice, &mut rx),
            cancel_once_listening
        );
        assert!(matches!(outcome, Err(SessionError::Cancelled)));
        assert_eq!(h.adapter.stop_count(), 1);
        assert!(h.repository.results("ana").unwrap().is_empty());
    }

    #[tokio::test]
    async fn cancel_interrupts_playback() {
        let mut h = harness(
            ScriptedSpeech::new()
                .slow_speech(Duration::from_secs(60))
                .with_captures(vec![vec![fragment("never heard")]]),
        );
        let (_tx, mut rx) = signals(vec![UserSignal::Cancel]).await;

        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            h.runner.run(interview("2"), SessionMode::Voice, &mut rx),
        )
        .await
        .expect("cancel must not wait for playback to end");
        assert!(matches!(outcome, Err(SessionError::Cancelled)));
        assert_eq!(h.adapter.spoken().len(), 1);
        assert!(h.adapter.started_epochs().is_empty());
        assert!(drain(&mut h.notices)
            .iter()
            .any(|n| matches!(n, SessionNotice::Cancelled)));
        assert!(h.repository.results("ana").unwrap().is_empty());
    }

    #[tokio::test]
    async fn signals_sent_during_playback_keep_their_order() {
        let h = harness(ScriptedSpeech::new().slow_speech(Duration::from_millis(20)));
        let (_tx, mut rx) = signals(vec![
            UserSignal::Typed("first".into()),
            UserSignal::Finish,
            UserSignal::Typed("second".into()),
            UserSignal::Finish,
        ])
        .await;

        let result = h.runner.run(interview("2"), SessionMode::Typed, &mut rx).await.unwrap();
        assert_eq!(result.answers, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn finish_keeps_the_utterance_still_being_transcribed() {
        let h = harness(
            ScriptedSpeech::new()
                .with_captures(vec![vec![fragment("I would use")]])
                .with_tails(vec![vec![fragment("a bounded queue")]]),
        );
        let (_tx, mut rx) = signals(vec![UserSignal::Finish]).await;

        let result = h.runner.run(interview("1"), SessionMode::Voice, &mut rx).await.unwrap();
        assert_eq!(result.answers, vec!["I would use a bounded queue"]);
        assert_eq!(h.adapter.finish_count(), 1);
        assert_eq!(h.adapter.stop_count(), 1);
    }

    #[tokio::test]
    async fn capture_that_never_ends_is_saved_after_drain_timeout() {
        let adapter = ScriptedSpeech::new()
            .stalled_finish()
            .with_captures(vec![vec![fragment("kept anyway")]]);
        let mut h = harness(adapter);
        h.runner = h.runner.with_drain_timeout(Duration::from_millis(50));
        let (_tx, mut rx) = signals(vec![UserSignal::Finish]).await;

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            h.runner.run(interview("1"), SessionMode::Voice, &mut rx),
        )
        .await
        .expect("drain deadline must fire")
        .unwrap();
        assert_eq!(result.answers, vec!["kept anyway"]);
        assert_eq!(h.adapter.finish_count(), 1);
        assert_eq!(h.adapter.stop_count(), 1);
    }

    #[tokio::test]
    async fn closed_signal_channel_cancels() {
        let h = harness(ScriptedSpeech::new());
        let (tx, mut rx) = signals(vec![]).await;
        drop(tx);

        let err = h
            .runner
            .run(interview("1"), SessionMode::Typed, &mut rx)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Cancelled));
    }
}
