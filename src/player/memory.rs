//! Headless media sink.
//!
//! Plays nothing: it answers `load` according to a per-URL script and keeps
//! a simulated clock. Used by `--dry-run` and by the test suites.

use super::traits::{MediaSink, SinkEvent, SinkEventKind, SinkEventSender};
use crate::error::{MediaErrorKind, SinkError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// How the sink answers a load request.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadBehavior {
    /// Become playable with the given media duration in seconds.
    Ready(f64),
    Fail(MediaErrorKind),
    /// Never answer; the caller's timeout has to fire.
    Hang,
}

/// Every operation the controller performed, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum SinkCall {
    SetSource(String),
    ClearSource,
    Load,
    Play,
    Pause,
    SetVolume(f32),
    SetPosition(f64),
}

#[derive(Debug)]
struct Inner {
    events: SinkEventSender,
    source: Option<String>,
    generation: u64,
    paused: bool,
    ended: bool,
    volume: f32,
    position: f64,
    duration: Option<f64>,
    default_behavior: LoadBehavior,
    behaviors: HashMap<String, LoadBehavior>,
    reject_play: bool,
    /// Hold `play` until the source is ready, like a real decoder would
    defer_play: bool,
    ready: bool,
    play_pending: bool,
    calls: Vec<SinkCall>,
}

impl Inner {
    fn emit(&self, kind: SinkEventKind) {
        // The receiver goes away when the controller disconnects.
        let _ = self.events.send(SinkEvent {
            generation: self.generation,
            kind,
        });
    }
}

pub struct MemorySink {
    inner: Arc<Mutex<Inner>>,
}

/// Cloneable handle for scripting and inspecting a [`MemorySink`] after it
/// has been handed to a controller.
#[derive(Clone)]
pub struct MemorySinkHandle {
    inner: Arc<Mutex<Inner>>,
}

fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MemorySink {
    pub fn new(events: SinkEventSender) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                events,
                source: None,
                generation: 0,
                paused: true,
                ended: false,
                volume: 1.0,
                position: 0.0,
                duration: None,
                default_behavior: LoadBehavior::Ready(180.0),
                behaviors: HashMap::new(),
                reject_play: false,
                defer_play: false,
                ready: false,
                play_pending: false,
                calls: Vec::new(),
            })),
        }
    }

    pub fn handle(&self) -> MemorySinkHandle {
        MemorySinkHandle {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl MemorySinkHandle {
    pub fn set_default_behavior(&self, behavior: LoadBehavior) {
        lock(&self.inner).default_behavior = behavior;
    }

    pub fn set_behavior(&self, url: &str, behavior: LoadBehavior) {
        lock(&self.inner).behaviors.insert(url.to_string(), behavior);
    }

    pub fn reject_play(&self, reject: bool) {
        lock(&self.inner).reject_play = reject;
    }

    /// When set, `play` before readiness only arms playback; `Play` is
    /// emitted once the source becomes ready.
    pub fn defer_play_until_ready(&self, defer: bool) {
        lock(&self.inner).defer_play = defer;
    }

    pub fn calls(&self) -> Vec<SinkCall> {
        lock(&self.inner).calls.clone()
    }

    pub fn clear_calls(&self) {
        lock(&self.inner).calls.clear();
    }

    pub fn volume(&self) -> f32 {
        lock(&self.inner).volume
    }

    /// Move the simulated clock forward while playing. Emits a position
    /// update, and end-of-media once the duration is reached.
    pub fn advance(&self, secs: f64) {
        let mut inner = lock(&self.inner);
        if inner.paused || inner.ended || inner.source.is_none() {
            return;
        }
        let end = inner.duration.unwrap_or(f64::INFINITY);
        inner.position = (inner.position + secs).min(end);
        inner.emit(SinkEventKind::TimeUpdate(inner.position));
        if inner.position >= end {
            inner.ended = true;
            inner.paused = true;
            inner.emit(SinkEventKind::Ended);
        }
    }

    /// Jump straight to end-of-media.
    pub fn finish(&self) {
        let mut inner = lock(&self.inner);
        inner.position = inner.duration.unwrap_or(inner.position);
        inner.ended = true;
        inner.paused = true;
        inner.emit(SinkEventKind::Ended);
    }

    /// Report a media error for the current source.
    pub fn fail(&self, kind: MediaErrorKind) {
        lock(&self.inner).emit(SinkEventKind::Error(kind));
    }
}

#[async_trait]
impl MediaSink for MemorySink {
    fn set_source(&mut self, url: &str) {
        let mut inner = lock(&self.inner);
        inner.calls.push(SinkCall::SetSource(url.to_string()));
        inner.generation += 1;
        inner.source = Some(url.to_string());
        inner.paused = true;
        inner.ended = false;
        inner.ready = false;
        inner.play_pending = false;
        inner.position = 0.0;
        inner.duration = None;
    }

    fn clear_source(&mut self) {
        let mut inner = lock(&self.inner);
        inner.calls.push(SinkCall::ClearSource);
        inner.generation += 1;
        inner.source = None;
        inner.paused = true;
        inner.ended = false;
        inner.ready = false;
        inner.play_pending = false;
        inner.duration = None;
    }

    fn source(&self) -> Option<String> {
        lock(&self.inner).source.clone()
    }

    fn generation(&self) -> u64 {
        lock(&self.inner).generation
    }

    fn load(&mut self) {
        let mut inner = lock(&self.inner);
        inner.calls.push(SinkCall::Load);
        let Some(url) = inner.source.clone() else {
            inner.emit(SinkEventKind::Error(MediaErrorKind::Aborted));
            return;
        };
        inner.emit(SinkEventKind::LoadStart);

        let behavior = inner
            .behaviors
            .get(&url)
            .cloned()
            .unwrap_or_else(|| inner.default_behavior.clone());
        match behavior {
            LoadBehavior::Ready(duration) => {
                inner.duration = Some(duration);
                inner.ready = true;
                inner.emit(SinkEventKind::LoadedData);
                inner.emit(SinkEventKind::CanPlay);
                if std::mem::take(&mut inner.play_pending) {
                    inner.paused = false;
                    inner.emit(SinkEventKind::Play);
                }
            }
            LoadBehavior::Fail(kind) => inner.emit(SinkEventKind::Error(kind)),
            LoadBehavior::Hang => {}
        }
    }

    async fn play(&mut self) -> Result<(), SinkError> {
        let mut inner = lock(&self.inner);
        inner.calls.push(SinkCall::Play);
        if inner.source.is_none() {
            return Err(SinkError::NoSource);
        }
        if inner.reject_play {
            return Err(SinkError::Rejected("playback not allowed".into()));
        }
        if inner.defer_play && !inner.ready {
            inner.play_pending = true;
            return Ok(());
        }
        if inner.ended {
            inner.position = 0.0;
            inner.ended = false;
        }
        inner.paused = false;
        inner.emit(SinkEventKind::Play);
        Ok(())
    }

    fn pause(&mut self) {
        let mut inner = lock(&self.inner);
        inner.calls.push(SinkCall::Pause);
        if !inner.paused {
            inner.paused = true;
            inner.emit(SinkEventKind::Pause);
        }
    }

    fn is_paused(&self) -> bool {
        lock(&self.inner).paused
    }

    fn has_ended(&self) -> bool {
        lock(&self.inner).ended
    }

    fn set_volume(&mut self, volume: f32) {
        let mut inner = lock(&self.inner);
        inner.calls.push(SinkCall::SetVolume(volume));
        inner.volume = volume.clamp(0.0, 1.0);
    }

    fn position(&self) -> f64 {
        lock(&self.inner).position
    }

    fn set_position(&mut self, secs: f64) {
        let mut inner = lock(&self.inner);
        inner.calls.push(SinkCall::SetPosition(secs));
        inner.position = secs.max(0.0);
        inner.emit(SinkEventKind::TimeUpdate(inner.position));
    }

    fn duration(&self) -> Option<f64> {
        lock(&self.inner).duration
    }
}
