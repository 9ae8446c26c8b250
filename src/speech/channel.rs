//! Single owner of the audio channel.
//!
//! [`SpeechChannel`] wraps a `dyn SpeechAdapter` and guarantees that at most
//! one capture (a one-shot listen or a continuous capture) is active at a
//! time.  A second request while one is active fails fast with
//! [`SpeechError::Busy`] instead of queueing behind it.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use super::{Availability, CaptureSender, Epoch, SpeechAdapter, SpeechError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lease {
    Listen,
    Capture(Epoch),
}

pub struct SpeechChannel {
    adapter: Arc<dyn SpeechAdapter>,
    active: Mutex<Option<Lease>>,
    listen_timeout: Duration,
}

/// Releases the listen lease when the listen future completes or is dropped.
struct ListenLease<'a> {
    channel: &'a SpeechChannel,
}

impl Drop for ListenLease<'_> {
    fn drop(&mut self) {
        *self.channel.slot() = None;
    }
}

impl SpeechChannel {
    pub fn new(adapter: Arc<dyn SpeechAdapter>, listen_timeout: Duration) -> Self {
        Self {
            adapter,
            active: Mutex::new(None),
            listen_timeout,
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<Lease>> {
        // The guarded value is a plain enum; a poisoned lock still holds a
        // usable state.
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn availability(&self) -> Availability {
        self.adapter.availability()
    }

    /// `true` while a listen or a continuous capture is active.
    pub fn is_busy(&self) -> bool {
        self.slot().is_some()
    }

    /// Epoch of the active continuous capture, if any.
    pub fn active_capture(&self) -> Option<Epoch> {
        match *self.slot() {
            Some(Lease::Capture(epoch)) => Some(epoch),
            _ => None,
        }
    }

    /// Play a prompt.  Playback does not take the capture lease.
    pub async fn speak(&self, text: &str) -> Result<(), SpeechError> {
        log::debug!("speech: speak {:?}", truncate(text));
        self.adapter.speak(text).await
    }

    /// Capture exactly one utterance.
    ///
    /// Exceeding the listen timeout is reported as [`SpeechError::Timeout`],
    /// which callers treat like no speech.  The in-flight adapter future is
    /// dropped, which stops its capture.
    pub async fn listen_once(&self) -> Result<String, SpeechError> {
        let _lease = {
            let mut slot = self.slot();
            if let Some(lease) = *slot {
                log::warn!("speech: listen rejected, {lease:?} still active");
                return Err(SpeechError::Busy);
            }
            *slot = Some(Lease::Listen);
            ListenLease { channel: self }
        };

        match tokio::time::timeout(self.listen_timeout, self.adapter.listen_once()).await {
            Ok(result) => result,
            Err(_) => {
                log::warn!("speech: listen timed out after {:?}", self.listen_timeout);
                Err(SpeechError::Timeout)
            }
        }
    }

    /// Begin continuous capture tagged with `epoch`.
    pub fn start_capture(&self, epoch: Epoch, events: CaptureSender) -> Result<(), SpeechError> {
        let mut slot = self.slot();
        if let Some(lease) = *slot {
            log::warn!("speech: capture {epoch} rejected, {lease:?} still active");
            return Err(SpeechError::Busy);
        }
        self.adapter.start_capture(epoch, events)?;
        *slot = Some(Lease::Capture(epoch));
        log::debug!("speech: capture {epoch} started");
        Ok(())
    }

    /// Let the active capture deliver its remaining speech.  The lease is
    /// kept until [`Self::stop_capture`].
    pub fn finish_capture(&self) {
        if let Some(Lease::Capture(epoch)) = *self.slot() {
            self.adapter.finish_capture();
            log::debug!("speech: capture {epoch} finishing");
        }
    }

    /// Stop the active continuous capture.  No-op when none is running.
    pub fn stop_capture(&self) {
        let mut slot = self.slot();
        if let Some(Lease::Capture(epoch)) = *slot {
            self.adapter.stop_capture();
            *slot = None;
            log::debug!("speech: capture {epoch} stopped");
        }
    }
}

fn truncate(text: &str) -> String {
    const MAX: usize = 48;
    match text.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
