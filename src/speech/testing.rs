//! Scripted [`SpeechAdapter`] for driver and runner tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::{
    Availability, CaptureEvent, CaptureSender, Epoch, SpeechAdapter, SpeechError, TaggedCapture,
};

/// Plays back queued listen results and capture scripts.
///
/// * `listen_once` pops the next scripted result; with none left it never
///   resolves, like a microphone that hears nothing.
/// * `start_capture` pops the next script and queues all of its events,
///   tagged with the given epoch, before returning.
/// * `finish_capture` queues the next tail script followed by `Ended`,
///   unless built with [`ScriptedSpeech::stalled_finish`].
pub struct ScriptedSpeech {
    availability: Availability,
    listens: Mutex<VecDeque<Result<String, SpeechError>>>,
    captures: Mutex<VecDeque<Vec<CaptureEvent>>>,
    tails: Mutex<VecDeque<Vec<CaptureEvent>>>,
    active: Mutex<Option<(Epoch, CaptureSender)>>,
    stalled_finish: bool,
    speak_delay: Option<Duration>,
    finishes: AtomicUsize,
    spoken: Mutex<Vec<String>>,
    started: Mutex<Vec<Epoch>>,
    stops: AtomicUsize,
    listen_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl Default for ScriptedSpeech {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedSpeech {
    pub fn new() -> Self {
        Self {
            availability: Availability::Available,
            listens: Mutex::new(VecDeque::new()),
            captures: Mutex::new(VecDeque::new()),
            tails: Mutex::new(VecDeque::new()),
            active: Mutex::new(None),
            stalled_finish: false,
            speak_delay: None,
            finishes: AtomicUsize::new(0),
            spoken: Mutex::new(Vec::new()),
            started: Mutex::new(Vec::new()),
            stops: AtomicUsize::new(0),
            listen_calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn unavailable(mut self, reason: &str) -> Self {
        self.availability = Availability::Unavailable(reason.to_string());
        self
    }

    pub fn with_listens(self, listens: Vec<Result<String, SpeechError>>) -> Self {
        self.listens.lock().unwrap().extend(listens);
        self
    }

    pub fn with_captures(self, captures: Vec<Vec<CaptureEvent>>) -> Self {
        self.captures.lock().unwrap().extend(captures);
        self
    }

    /// Events delivered only once the capture is asked to finish, one
    /// script per `finish_capture`.
    pub fn with_tails(self, tails: Vec<Vec<CaptureEvent>>) -> Self {
        self.tails.lock().unwrap().extend(tails);
        self
    }

    /// `finish_capture` never reports `Ended`.
    pub fn stalled_finish(mut self) -> Self {
        self.stalled_finish = true;
        self
    }

    /// Every `speak` takes `delay` after recording its text.
    pub fn slow_speech(mut self, delay: Duration) -> Self {
        self.speak_delay = Some(delay);
        self
    }

    pub fn finish_count(&self) -> usize {
        self.finishes.load(Ordering::SeqCst)
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }

    pub fn started_epochs(&self) -> Vec<Epoch> {
        self.started.lock().unwrap().clone()
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn listen_count(&self) -> usize {
        self.listen_calls.load(Ordering::SeqCst)
    }

    /// Highest number of `listen_once` calls that were in progress at once.
    pub fn max_concurrent_listens(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl SpeechAdapter for ScriptedSpeech {
    fn availability(&self) -> Availability {
        self.availability.clone()
    }

    async fn speak(&self, text: &str) -> Result<(), SpeechError> {
        self.spoken.lock().unwrap().push(text.to_string());
        match self.speak_delay {
            Some(delay) => tokio::time::sleep(delay).await,
            None => tokio::task::yield_now().await,
        }
        Ok(())
    }

    async fn listen_once(&self) -> Result<String, SpeechError> {
        self.listen_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        let next = self.listens.lock().unwrap().pop_front();
        match next {
            Some(result) => {
                tokio::task::yield_now().await;
                result
            }
            None => std::future::pending().await,
        }
    }

    fn start_capture(&self, epoch: Epoch, events: CaptureSender) -> Result<(), SpeechError> {
        self.started.lock().unwrap().push(epoch);
        let script = self.captures.lock().unwrap().pop_front().unwrap_or_default();
        for event in script {
            events
                .try_send(TaggedCapture { epoch, event })
                .expect("capture channel has room for the script");
        }
        *self.active.lock().unwrap() = Some((epoch, events));
        Ok(())
    }

    fn finish_capture(&self) {
        self.finishes.fetch_add(1, Ordering::SeqCst);
        if self.stalled_finish {
            return;
        }
        let Some((epoch, events)) = self.active.lock().unwrap().clone() else {
            return;
        };
        let tail = self.tails.lock().unwrap().pop_front().unwrap_or_default();
        for event in tail.into_iter().chain([CaptureEvent::Ended]) {
            events
                .try_send(TaggedCapture { epoch, event })
                .expect("capture channel has room for the tail");
        }
    }

    fn stop_capture(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.active.lock().unwrap().take();
    }
}
