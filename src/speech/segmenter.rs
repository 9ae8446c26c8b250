//! Streaming energy-based utterance segmentation.
//!
//! [`UtteranceSegmenter`] consumes 16 kHz mono audio in arbitrary-sized
//! pieces and reports when an utterance has been finalized (enough trailing
//! silence, or the maximum length was reached) and when the microphone has
//! been idle for the configured no-speech timeout.
//!
//! ## Algorithm
//!
//! Audio is split into 30 ms frames (480 samples).  A frame is *voice* when
//! its RMS exceeds the threshold.  The first voice frame opens an utterance;
//! `end_silence` worth of consecutive quiet frames closes it.  Utterances
//! with fewer voiced frames than `min_utterance` are dropped as noise.

use std::time::Duration;

use crate::config::AudioConfig;

use super::capture::TARGET_RATE;

const FRAME_SIZE: usize = 480;

/// Output of [`UtteranceSegmenter::push`].
#[derive(Debug, Clone, PartialEq)]
pub enum SegmentEvent {
    /// A finalized utterance, trailing silence removed.
    Utterance(Vec<f32>),
    /// No speech for the whole no-speech timeout.  Reported once per idle run.
    Idle,
}

/// Streaming end-of-utterance detector.
///
/// ```rust
/// use std::time::Duration;
/// use interview_rehearsal::speech::{SegmentEvent, UtteranceSegmenter};
///
/// let mut seg = UtteranceSegmenter::new(
///     0.01,
///     Duration::from_millis(300), // end silence
///     Duration::from_millis(90),  // min utterance
///     Duration::from_secs(30),
///     Duration::from_secs(8),
/// );
///
/// let mut audio = vec![0.5_f32; 4_800]; // 300 ms of "speech"
/// audio.extend(vec![0.0_f32; 4_800]);  // 300 ms of silence
/// let events = seg.push(&audio);
/// assert!(matches!(&events[..], [SegmentEvent::Utterance(u)] if u.len() == 4_800));
/// ```
#[derive(Debug)]
pub struct UtteranceSegmenter {
    rms_threshold: f32,
    end_silence_frames: usize,
    min_voiced_frames: usize,
    max_frames: usize,
    idle_frames: usize,

    pending: Vec<f32>,
    current: Vec<f32>,
    in_speech: bool,
    voiced_frames: usize,
    silence_run: usize,
    idle_run: usize,
    idle_reported: bool,
}

fn frames_for(duration: Duration) -> usize {
    let samples = duration.as_millis() as usize * (TARGET_RATE as usize / 1_000);
    (samples / FRAME_SIZE).max(1)
}

impl UtteranceSegmenter {
    pub fn new(
        rms_threshold: f32,
        end_silence: Duration,
        min_utterance: Duration,
        max_utterance: Duration,
        no_speech_timeout: Duration,
    ) -> Self {
        Self {
            rms_threshold,
            end_silence_frames: frames_for(end_silence),
            min_voiced_frames: frames_for(min_utterance),
            max_frames: frames_for(max_utterance),
            idle_frames: frames_for(no_speech_timeout),
            pending: Vec::with_capacity(FRAME_SIZE * 2),
            current: Vec::new(),
            in_speech: false,
            voiced_frames: 0,
            silence_run: 0,
            idle_run: 0,
            idle_reported: false,
        }
    }

    pub fn from_config(config: &AudioConfig) -> Self {
        Self::new(
            config.vad_threshold,
            Duration::from_millis(config.end_silence_ms),
            Duration::from_millis(config.min_utterance_ms),
            Duration::from_secs(config.max_utterance_secs),
            Duration::from_secs(config.no_speech_timeout_secs),
        )
    }

    /// `true` while an utterance is open.
    pub fn in_speech(&self) -> bool {
        self.in_speech
    }

    /// Feed more 16 kHz mono samples.
    pub fn push(&mut self, samples: &[f32]) -> Vec<SegmentEvent> {
        self.pending.extend_from_slice(samples);

        let mut events = Vec::new();
        while self.pending.len() >= FRAME_SIZE {
            let frame: Vec<f32> = self.pending.drain(..FRAME_SIZE).collect();
            if let Some(event) = self.process_frame(frame) {
                events.push(event);
            }
        }
        events
    }

    /// Close any open utterance, e.g. when capture is being stopped.
    pub fn flush(&mut self) -> Option<Vec<f32>> {
        if !self.in_speech {
            return None;
        }
        match self.finalize() {
            Some(SegmentEvent::Utterance(audio)) => Some(audio),
            _ => None,
        }
    }

    fn process_frame(&mut self, frame: Vec<f32>) -> Option<SegmentEvent> {
        let voice = self.is_voice_frame(&frame);

        if self.in_speech {
            self.current.extend_from_slice(&frame);
            if voice {
                self.voiced_frames += 1;
                self.silence_run = 0;
            } else {
                self.silence_run += 1;
            }

            let frames = self.current.len() / FRAME_SIZE;
            if self.silence_run >= self.end_silence_frames || frames >= self.max_frames {
                return self.finalize();
            }
            return None;
        }

        if voice {
            self.in_speech = true;
            self.current = frame;
            self.voiced_frames = 1;
            self.silence_run = 0;
            self.idle_run = 0;
            self.idle_reported = false;
            return None;
        }

        self.idle_run += 1;
        if self.idle_run >= self.idle_frames && !self.idle_reported {
            self.idle_reported = true;
            return Some(SegmentEvent::Idle);
        }
        None
    }

    fn finalize(&mut self) -> Option<SegmentEvent> {
        let trailing = (self.silence_run * FRAME_SIZE).min(self.current.len());
        let keep = self.current.len() - trailing;
        self.current.truncate(keep);

        let audio = std::mem::take(&mut self.current);
        let voiced = self.voiced_frames;

        self.in_speech = false;
        self.voiced_frames = 0;
        self.silence_run = 0;
        self.idle_run = 0;
        self.idle_reported = false;

        if voiced < self.min_voiced_frames {
            log::debug!("segmenter: dropped {voiced}-frame blip");
            return None;
        }
        Some(SegmentEvent::Utterance(audio))
    }

    fn is_voice_frame(&self, frame: &[f32]) -> bool {
        if frame.is_empty() {
            return false;
        }
        let mean_sq = frame.iter().map(|s| s * s).sum::<f32>() / frame.len() as f32;
        mean_sq.sqrt() > self.rms_threshold
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn segmenter() -> UtteranceSegmenter {
        // 1.2 s end silence, 300 ms minimum, 30 s max, 8 s idle
        UtteranceSegmenter::from_config(&AudioConfig::default())
    }

    fn voice(frames: usize) -> Vec<f32> {
        vec![0.5_f32; frames * FRAME_SIZE]
    }

    fn silence(frames: usize) -> Vec<f32> {
        vec![0.0_f32; frames * FRAME_SIZE]
    }

    #[test]
    fn speech_then_trailing_silence_emits_trimmed_utterance() {
        let mut seg = segmenter();
        assert!(seg.push(&voice(16)).is_empty());
        assert!(seg.in_speech());

        let events = seg.push(&silence(40));
        assert_eq!(events.len(), 1);
        match &events[0] {
            SegmentEvent::Utterance(audio) => assert_eq!(audio.len(), 16 * FRAME_SIZE),
            other => panic!("expected utterance, got {other:?}"),
        }
        assert!(!seg.in_speech());
    }

    #[test]
    fn short_pause_does_not_split_utterance() {
        let mut seg = segmenter();
        let mut audio = voice(12);
        audio.extend(silence(10));
        audio.extend(voice(12));
        assert!(seg.push(&audio).is_empty());

        let events = seg.push(&silence(40));
        match &events[..] {
            [SegmentEvent::Utterance(a)] => assert_eq!(a.len(), 34 * FRAME_SIZE),
            other => panic!("unexpected events: {other:?}"),
        }
    }

    #[test]
    fn blip_shorter_than_minimum_is_dropped() {
        let mut seg = segmenter();
        let mut audio = voice(3);
        audio.extend(silence(40));
        assert!(seg.push(&audio).is_empty());
    }

    #[test]
    fn silence_reports_idle_once() {
        let mut seg = segmenter();
        // 8 s = 266 frames of 30 ms
        let events = seg.push(&silence(300));
        assert_eq!(events, vec![SegmentEvent::Idle]);
        assert!(seg.push(&silence(300)).is_empty());
    }

    #[test]
    fn idle_is_rearmed_after_speech() {
        let mut seg = segmenter();
        assert_eq!(seg.push(&silence(300)), vec![SegmentEvent::Idle]);

        let mut audio = voice(20);
        audio.extend(silence(40));
        let events = seg.push(&audio);
        assert!(matches!(&events[..], [SegmentEvent::Utterance(_)]));

        assert_eq!(seg.push(&silence(300)), vec![SegmentEvent::Idle]);
    }

    #[test]
    fn max_length_cuts_utterance() {
        let mut seg = UtteranceSegmenter::new(
            0.01,
            Duration::from_millis(1_200),
            Duration::from_millis(300),
            Duration::from_millis(900), // 30 frames
            Duration::from_secs(8),
        );
        let events = seg.push(&voice(45));
        match &events[..] {
            [SegmentEvent::Utterance(a)] => assert_eq!(a.len(), 30 * FRAME_SIZE),
            other => panic!("unexpected events: {other:?}"),
        }
        assert!(seg.in_speech());
    }

    #[test]
    fn odd_sized_pushes_are_buffered() {
        let mut seg = segmenter();
        let audio = voice(20);
        for piece in audio.chunks(333) {
            assert!(seg.push(piece).is_empty());
        }
        assert_eq!(seg.flush().map(|a| a.len()), Some(20 * FRAME_SIZE));
    }

    #[test]
    fn flush_without_speech_is_none() {
        let mut seg = segmenter();
        seg.push(&silence(5));
        assert!(seg.flush().is_none());
    }
}
