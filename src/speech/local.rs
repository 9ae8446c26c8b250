//! Production [`SpeechAdapter`]: cpal microphone + Whisper + optional TTS
//! command.
//!
//! Capture runs on a dedicated std thread that owns the cpal stream (the
//! stream is `!Send` on some hosts).  The thread downmixes and resamples
//! every chunk, feeds the [`UtteranceSegmenter`] and forwards its events to
//! the async side over a tokio channel.  Transcription happens on
//! `spawn_blocking`.
//!
//! ```text
//! capture thread                         async side
//! ──────────────                         ──────────
//! cpal → to_16k_mono → segmenter ──▶ WorkerEvent ──▶ spawn_blocking(transcribe)
//!        ▲                                            └─▶ transcript / CaptureEvent
//!        └── stop flag (raised on drop, finish_capture or stop_capture)
//! ```
//!
//! Raising the stop flag ends the capture thread, which first flushes the
//! segmenter so an utterance still open at that moment is transcribed and
//! delivered before [`CaptureEvent::Ended`].

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc as std_mpsc, Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::{AudioConfig, SpeechConfig};

use super::capture::AudioCapture;
use super::segmenter::{SegmentEvent, UtteranceSegmenter};
use super::stt::{SttEngine, WhisperEngine};
use super::{
    Availability, CaptureEvent, CaptureSender, Epoch, SpeechAdapter, SpeechError, TaggedCapture,
};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

// ---------------------------------------------------------------------------
// Worker plumbing
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum WorkerEvent {
    Utterance(Vec<f32>),
    Idle,
    Failed(SpeechError),
}

/// Raises the shared stop flag when dropped.
struct StopOnDrop(Arc<AtomicBool>);

impl Drop for StopOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

fn spawn_worker(
    device: Option<String>,
    audio: AudioConfig,
    stop: Arc<AtomicBool>,
    events: mpsc::Sender<WorkerEvent>,
) {
    let spawned = std::thread::Builder::new()
        .name("speech-capture".into())
        .spawn(move || capture_loop(device.as_deref(), &audio, &stop, &events));

    if let Err(e) = spawned {
        log::error!("speech: failed to spawn capture thread: {e}");
    }
}

fn capture_loop(
    device: Option<&str>,
    audio: &AudioConfig,
    stop: &AtomicBool,
    events: &mpsc::Sender<WorkerEvent>,
) {
    let capture = match AudioCapture::open(device) {
        Ok(c) => c,
        Err(e) => {
            log::error!("speech: cannot open input device: {e}");
            let _ = events.blocking_send(WorkerEvent::Failed(e.into()));
            return;
        }
    };

    let (chunk_tx, chunk_rx) = std_mpsc::channel();
    let stream = match capture.start(chunk_tx) {
        Ok(handle) => handle,
        Err(e) => {
            log::error!("speech: cannot start input stream: {e}");
            let _ = events.blocking_send(WorkerEvent::Failed(e.into()));
            return;
        }
    };
    log::debug!(
        "speech: capturing at {} Hz, {} channel(s)",
        capture.sample_rate(),
        capture.channels()
    );

    let mut segmenter = UtteranceSegmenter::from_config(audio);
    while !stop.load(Ordering::SeqCst) {
        let chunk = match chunk_rx.recv_timeout(POLL_INTERVAL) {
            Ok(chunk) => chunk,
            Err(std_mpsc::RecvTimeoutError::Timeout) => continue,
            Err(std_mpsc::RecvTimeoutError::Disconnected) => {
                let _ = events.blocking_send(WorkerEvent::Failed(SpeechError::Capture(
                    "input stream closed".into(),
                )));
                return;
            }
        };

        if !forward(segmenter.push(&chunk.to_16k_mono()), events) {
            return;
        }
    }

    drop(stream);
    for chunk in chunk_rx.try_iter() {
        if !forward(segmenter.push(&chunk.to_16k_mono()), events) {
            return;
        }
    }
    if let Some(tail) = segmenter.flush() {
        log::debug!("speech: flushing open utterance on stop");
        let _ = events.blocking_send(WorkerEvent::Utterance(tail));
    }
    log::debug!("speech: capture thread stopped");
}

/// Returns `false` once the receiving side is gone.
fn forward(segments: Vec<SegmentEvent>, events: &mpsc::Sender<WorkerEvent>) -> bool {
    for event in segments {
        let forwarded = match event {
            SegmentEvent::Utterance(samples) => WorkerEvent::Utterance(samples),
            SegmentEvent::Idle => WorkerEvent::Idle,
        };
        if events.blocking_send(forwarded).is_err() {
            return false;
        }
    }
    true
}

async fn transcribe(stt: Arc<dyn SttEngine>, audio: Vec<f32>) -> Result<String, SpeechError> {
    let secs = audio.len() as f32 / super::capture::TARGET_RATE as f32;
    log::debug!("speech: transcribing {secs:.2}s of audio");

    tokio::task::spawn_blocking(move || stt.transcribe(&audio))
        .await
        .map_err(|e| SpeechError::Transcription(format!("transcription task failed: {e}")))?
        .map_err(SpeechError::from)
}

struct ActiveCapture {
    epoch: Epoch,
    stop: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

// ---------------------------------------------------------------------------
// LocalSpeech
// ---------------------------------------------------------------------------

pub struct LocalSpeech {
    engine: Result<Arc<dyn SttEngine>, String>,
    audio: AudioConfig,
    tts_command: Option<String>,
    active: Mutex<Option<ActiveCapture>>,
}

impl LocalSpeech {
    /// Load the Whisper model at `model_path`.
    ///
    /// A missing or broken model does not fail construction; the adapter then
    /// reports [`Availability::Unavailable`] and voice flows are refused.
    pub fn load(model_path: &Path, speech: &SpeechConfig, audio: &AudioConfig) -> Self {
        let engine = match WhisperEngine::load(model_path, &speech.language) {
            Ok(engine) => {
                log::info!("speech: loaded model {}", model_path.display());
                Ok(Arc::new(engine) as Arc<dyn SttEngine>)
            }
            Err(e) => {
                log::warn!("speech: {e}; voice capture disabled");
                Err(e.to_string())
            }
        };
        Self {
            engine,
            audio: audio.clone(),
            tts_command: speech.tts_command.clone(),
            active: Mutex::new(None),
        }
    }

    /// Build around an already-loaded engine.
    pub fn with_engine(
        engine: Arc<dyn SttEngine>,
        audio: AudioConfig,
        tts_command: Option<String>,
    ) -> Self {
        Self {
            engine: Ok(engine),
            audio,
            tts_command,
            active: Mutex::new(None),
        }
    }

    fn engine(&self) -> Result<Arc<dyn SttEngine>, SpeechError> {
        self.engine
            .clone()
            .map_err(SpeechError::Unavailable)
    }

    fn take_active(&self) -> Option<ActiveCapture> {
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
    }
}

#[async_trait]
impl SpeechAdapter for LocalSpeech {
    fn availability(&self) -> Availability {
        if let Err(reason) = &self.engine {
            return Availability::Unavailable(reason.clone());
        }
        if self.audio.input_device.is_none() && !AudioCapture::has_input_device() {
            return Availability::Unavailable("no microphone found".into());
        }
        Availability::Available
    }

    async fn speak(&self, text: &str) -> Result<(), SpeechError> {
        let Some(command) = self.tts_command.as_deref() else {
            println!("{text}");
            return Ok(());
        };

        let mut parts = command.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| SpeechError::Playback("tts_command is empty".into()))?;

        let status = tokio::process::Command::new(program)
            .args(parts)
            .arg(text)
            .status()
            .await
            .map_err(|e| SpeechError::Playback(format!("{program}: {e}")))?;

        if !status.success() {
            return Err(SpeechError::Playback(format!("{program} exited with {status}")));
        }
        Ok(())
    }

    async fn listen_once(&self) -> Result<String, SpeechError> {
        let stt = self.engine()?;
        let stop = Arc::new(AtomicBool::new(false));
        let _stop_guard = StopOnDrop(stop.clone());
        let (tx, mut rx) = mpsc::channel(8);

        spawn_worker(self.audio.input_device.clone(), self.audio.clone(), stop, tx);

        match rx.recv().await {
            Some(WorkerEvent::Utterance(audio)) => {
                let text = transcribe(stt, audio).await?;
                if text.is_empty() {
                    log::debug!("speech: utterance transcribed to nothing");
                    return Err(SpeechError::NoSpeech);
                }
                Ok(text)
            }
            Some(WorkerEvent::Idle) => Err(SpeechError::NoSpeech),
            Some(WorkerEvent::Failed(e)) => Err(e),
            None => Err(SpeechError::Capture("capture thread exited".into())),
        }
    }

    fn start_capture(&self, epoch: Epoch, events: CaptureSender) -> Result<(), SpeechError> {
        let stt = self.engine()?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| SpeechError::Unavailable(format!("no async runtime: {e}")))?;

        if let Some(previous) = self.take_active() {
            log::warn!("speech: capture {} replaced by {epoch}", previous.epoch);
            previous.stop.store(true, Ordering::SeqCst);
            previous.task.abort();
        }

        let stop = Arc::new(AtomicBool::new(false));
        let (tx, mut rx) = mpsc::channel(8);
        spawn_worker(self.audio.input_device.clone(), self.audio.clone(), stop.clone(), tx);

        let guard = StopOnDrop(stop.clone());
        let finishing = stop.clone();
        let task = runtime.spawn(async move {
            let _guard = guard;
            while let Some(worker_event) = rx.recv().await {
                let event = match worker_event {
                    WorkerEvent::Utterance(audio) => match transcribe(stt.clone(), audio).await {
                        Ok(text) if text.is_empty() => continue,
                        Ok(text) => CaptureEvent::Fragment(text),
                        Err(e) => CaptureEvent::Error(e),
                    },
                    WorkerEvent::Idle if finishing.load(Ordering::SeqCst) => continue,
                    WorkerEvent::Idle => CaptureEvent::Ended,
                    WorkerEvent::Failed(e) => CaptureEvent::Error(e),
                };

                let last = !matches!(event, CaptureEvent::Fragment(_));
                if events.send(TaggedCapture { epoch, event }).await.is_err() || last {
                    return;
                }
            }
            // The capture thread exited after a finish request.
            let _ = events
                .send(TaggedCapture {
                    epoch,
                    event: CaptureEvent::Ended,
                })
                .await;
        });

        *self.active.lock().unwrap_or_else(|e| e.into_inner()) =
            Some(ActiveCapture { epoch, stop, task });
        Ok(())
    }

    fn finish_capture(&self) {
        let active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(active) = active.as_ref() {
            active.stop.store(true, Ordering::SeqCst);
            log::debug!("speech: capture {} finishing", active.epoch);
        }
    }

    fn stop_capture(&self) {
        if let Some(active) = self.take_active() {
            active.stop.store(true, Ordering::SeqCst);
            active.task.abort();
            log::debug!("speech: capture {} stop requested", active.epoch);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
