//! Speaker output through rodio.
//!
//! The output stream is not `Send`, so it lives on a dedicated audio thread
//! driven by a command channel. Downloads run as tokio tasks and hand the
//! finished buffer to that thread for decoding.

use super::traits::{MediaSink, SinkEvent, SinkEventKind, SinkEventSender};
use crate::error::{MediaErrorKind, SinkError};
use async_trait::async_trait;
use reqwest::StatusCode;
use rodio::decoder::DecoderError;
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use std::io::Cursor;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const TICK: Duration = Duration::from_millis(250);

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Whole-file download limit; a source that never answers ends as a network error.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(90);

/// Downloaded audio, shared between the decoder and later seeks.
#[derive(Clone)]
struct SharedBytes(Arc<[u8]>);

impl AsRef<[u8]> for SharedBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

enum AudioCommand {
    Prepare { generation: u64, bytes: SharedBytes },
    Play,
    Pause,
    Volume(f32),
    Seek(f64),
    Clear,
    Shutdown,
}

#[derive(Debug)]
struct Status {
    generation: u64,
    paused: bool,
    ended: bool,
    position: f64,
    duration: Option<f64>,
}

fn lock(status: &Mutex<Status>) -> MutexGuard<'_, Status> {
    status.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Default)]
struct PlayClock {
    base: f64,
    started: Option<Instant>,
}

impl PlayClock {
    fn position(&self) -> f64 {
        self.base + self.started.map(|s| s.elapsed().as_secs_f64()).unwrap_or(0.0)
    }

    fn start(&mut self) {
        if self.started.is_none() {
            self.started = Some(Instant::now());
        }
    }

    fn stop(&mut self) {
        self.base = self.position();
        self.started = None;
    }

    fn reset(&mut self, at: f64) {
        self.base = at;
        self.started = None;
    }
}

struct AudioThread {
    handle: OutputStreamHandle,
    output: Option<Sink>,
    bytes: Option<SharedBytes>,
    loaded: Option<u64>,
    playing: bool,
    play_when_ready: bool,
    volume: f32,
    clock: PlayClock,
    last_reported: u64,
    status: Arc<Mutex<Status>>,
    events: SinkEventSender,
}

impl AudioThread {
    fn run(mut self, commands: Receiver<AudioCommand>) {
        loop {
            match commands.recv_timeout(TICK) {
                Ok(AudioCommand::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                Ok(cmd) => self.apply(cmd),
                Err(RecvTimeoutError::Timeout) => {}
            }
            self.tick();
        }
        debug!("audio thread stopped");
    }

    fn emit(&self, generation: u64, kind: SinkEventKind) {
        let _ = self.events.send(SinkEvent { generation, kind });
    }

    fn generation(&self) -> u64 {
        self.loaded.unwrap_or_else(|| lock(&self.status).generation)
    }

    fn apply(&mut self, cmd: AudioCommand) {
        match cmd {
            AudioCommand::Prepare { generation, bytes } => self.prepare(generation, bytes),
            AudioCommand::Play => {
                if self.loaded.is_some() {
                    self.start();
                } else {
                    self.play_when_ready = true;
                }
            }
            AudioCommand::Pause => {
                self.play_when_ready = false;
                if self.playing {
                    if let Some(out) = &self.output {
                        out.pause();
                    }
                    self.playing = false;
                    self.clock.stop();
                    lock(&self.status).paused = true;
                    self.emit(self.generation(), SinkEventKind::Pause);
                }
            }
            AudioCommand::Volume(v) => {
                self.volume = v;
                if let Some(out) = &self.output {
                    out.set_volume(v);
                }
            }
            AudioCommand::Seek(secs) => self.seek(secs),
            AudioCommand::Clear => {
                self.output = None;
                self.bytes = None;
                self.loaded = None;
                self.playing = false;
                self.play_when_ready = false;
                self.clock.reset(0.0);
                self.last_reported = 0;
            }
            AudioCommand::Shutdown => {}
        }
    }

    fn prepare(&mut self, generation: u64, bytes: SharedBytes) {
        if generation != lock(&self.status).generation {
            debug!(generation, "discarding download for a replaced source");
            return;
        }
        let decoder = match Decoder::new(Cursor::new(bytes.clone())) {
            Ok(d) => d,
            Err(e) => {
                warn!(error = %e, "audio decode failed");
                let kind = match e {
                    DecoderError::UnrecognizedFormat => MediaErrorKind::Unsupported,
                    _ => MediaErrorKind::Decode,
                };
                self.emit(generation, SinkEventKind::Error(kind));
                return;
            }
        };
        let duration = decoder.total_duration().map(|d| d.as_secs_f64());

        let out = match Sink::try_new(&self.handle) {
            Ok(out) => out,
            Err(e) => {
                warn!(error = %e, "could not open output sink");
                self.emit(generation, SinkEventKind::Error(MediaErrorKind::Unknown));
                return;
            }
        };
        out.pause();
        out.set_volume(self.volume);
        out.append(decoder);

        self.output = Some(out);
        self.bytes = Some(bytes);
        self.loaded = Some(generation);
        self.playing = false;
        self.clock.reset(0.0);
        lock(&self.status).duration = duration;

        self.emit(generation, SinkEventKind::LoadedData);
        self.emit(generation, SinkEventKind::CanPlay);

        if std::mem::take(&mut self.play_when_ready) {
            self.start();
        }
    }

    fn start(&mut self) {
        if self.playing {
            return;
        }
        if lock(&self.status).ended {
            self.seek(0.0);
        }
        if let Some(out) = &self.output {
            out.play();
        }
        self.playing = true;
        self.clock.start();
        {
            let mut status = lock(&self.status);
            status.paused = false;
            status.ended = false;
        }
        self.emit(self.generation(), SinkEventKind::Play);
    }

    /// Rebuild the decoder from the kept buffer, skipping ahead.
    fn seek(&mut self, secs: f64) {
        let Some(bytes) = self.bytes.clone() else {
            return;
        };
        let decoder = match Decoder::new(Cursor::new(bytes)) {
            Ok(d) => d,
            Err(e) => {
                warn!(error = %e, "re-decode for seek failed");
                return;
            }
        };
        let out = match Sink::try_new(&self.handle) {
            Ok(out) => out,
            Err(e) => {
                warn!(error = %e, "could not reopen output sink");
                return;
            }
        };
        out.set_volume(self.volume);
        if !self.playing {
            out.pause();
        }
        out.append(decoder.skip_duration(Duration::from_secs_f64(secs.max(0.0))));
        self.output = Some(out);

        self.clock.reset(secs);
        if self.playing {
            self.clock.start();
        }
        {
            let mut status = lock(&self.status);
            status.position = secs;
            status.ended = false;
        }
        self.emit(self.generation(), SinkEventKind::TimeUpdate(secs));
    }

    fn tick(&mut self) {
        if !self.playing {
            return;
        }
        let position = self.clock.position();
        lock(&self.status).position = position;

        let whole = position.floor() as u64;
        if whole != self.last_reported {
            self.last_reported = whole;
            self.emit(self.generation(), SinkEventKind::TimeUpdate(position));
        }

        if self.output.as_ref().map_or(true, |out| out.empty()) {
            self.playing = false;
            self.clock.stop();
            {
                let mut status = lock(&self.status);
                status.ended = true;
                status.paused = true;
            }
            self.emit(self.generation(), SinkEventKind::Ended);
        }
    }
}

fn status_error(status: StatusCode) -> Option<MediaErrorKind> {
    if status.is_success() {
        None
    } else if status == StatusCode::UNSUPPORTED_MEDIA_TYPE {
        Some(MediaErrorKind::Unsupported)
    } else {
        Some(MediaErrorKind::Network)
    }
}

async fn fetch_audio(http: &reqwest::Client, url: &str) -> Result<SharedBytes, MediaErrorKind> {
    let resp = http.get(url).send().await.map_err(|e| {
        warn!(url, error = %e, "audio request failed");
        MediaErrorKind::Network
    })?;

    let status = resp.status();
    if let Some(kind) = status_error(status) {
        warn!(url, %status, "audio request rejected");
        return Err(kind);
    }

    let body = resp.bytes().await.map_err(|e| {
        warn!(url, error = %e, "audio download interrupted");
        MediaErrorKind::Network
    })?;
    Ok(SharedBytes(Arc::from(&body[..])))
}

pub struct RodioSink {
    commands: Sender<AudioCommand>,
    events: SinkEventSender,
    http: reqwest::Client,
    status: Arc<Mutex<Status>>,
    source: Option<String>,
    fetch: Option<JoinHandle<()>>,
    thread: Option<thread::JoinHandle<()>>,
}

impl RodioSink {
    /// Open the default output device. `load` must be called from within a
    /// tokio runtime.
    pub fn new(events: SinkEventSender) -> Result<Self, SinkError> {
        let (commands, command_rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), String>>();
        let status = Arc::new(Mutex::new(Status {
            generation: 0,
            paused: true,
            ended: false,
            position: 0.0,
            duration: None,
        }));

        let thread_status = Arc::clone(&status);
        let thread_events = events.clone();
        let thread = thread::Builder::new()
            .name("jamtune-audio".into())
            .spawn(move || {
                let (_stream, handle) = match OutputStream::try_default() {
                    Ok(pair) => pair,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.to_string()));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));
                AudioThread {
                    handle,
                    output: None,
                    bytes: None,
                    loaded: None,
                    playing: false,
                    play_when_ready: false,
                    volume: 1.0,
                    clock: PlayClock::default(),
                    last_reported: 0,
                    status: thread_status,
                    events: thread_events,
                }
                .run(command_rx);
            })
            .map_err(|e| SinkError::Device(e.to_string()))?;

        ready_rx
            .recv()
            .map_err(|_| SinkError::Device("audio thread exited during startup".into()))?
            .map_err(SinkError::Device)?;

        let http = reqwest::Client::builder()
            .user_agent(concat!("jamtune/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(DOWNLOAD_TIMEOUT)
            .build()
            .map_err(|e| SinkError::Device(e.to_string()))?;

        Ok(Self {
            commands,
            events,
            http,
            status,
            source: None,
            fetch: None,
            thread: Some(thread),
        })
    }

    fn send(&self, cmd: AudioCommand) -> Result<(), SinkError> {
        self.commands
            .send(cmd)
            .map_err(|_| SinkError::Device("audio thread stopped".into()))
    }

    fn reset_source(&mut self, url: Option<&str>) {
        if let Some(task) = self.fetch.take() {
            task.abort();
        }
        {
            let mut status = lock(&self.status);
            status.generation += 1;
            status.paused = true;
            status.ended = false;
            status.position = 0.0;
            status.duration = None;
        }
        let _ = self.send(AudioCommand::Clear);
        self.source = url.map(str::to_string);
    }
}

#[async_trait]
impl MediaSink for RodioSink {
    fn set_source(&mut self, url: &str) {
        self.reset_source(Some(url));
    }

    fn clear_source(&mut self) {
        self.reset_source(None);
    }

    fn source(&self) -> Option<String> {
        self.source.clone()
    }

    fn generation(&self) -> u64 {
        lock(&self.status).generation
    }

    fn load(&mut self) {
        let generation = self.generation();
        let Some(url) = self.source.clone() else {
            let _ = self.events.send(SinkEvent {
                generation,
                kind: SinkEventKind::Error(MediaErrorKind::Aborted),
            });
            return;
        };
        let _ = self.events.send(SinkEvent {
            generation,
            kind: SinkEventKind::LoadStart,
        });

        if let Some(task) = self.fetch.take() {
            task.abort();
        }
        let http = self.http.clone();
        let events = self.events.clone();
        let commands = self.commands.clone();
        self.fetch = Some(tokio::spawn(async move {
            match fetch_audio(&http, &url).await {
                Ok(bytes) => {
                    let _ = commands.send(AudioCommand::Prepare { generation, bytes });
                }
                Err(kind) => {
                    let _ = events.send(SinkEvent {
                        generation,
                        kind: SinkEventKind::Error(kind),
                    });
                }
            }
        }));
    }

    async fn play(&mut self) -> Result<(), SinkError> {
        if self.source.is_none() {
            return Err(SinkError::NoSource);
        }
        self.send(AudioCommand::Play)?;
        lock(&self.status).paused = false;
        Ok(())
    }

    fn pause(&mut self) {
        let _ = self.send(AudioCommand::Pause);
        lock(&self.status).paused = true;
    }

    fn is_paused(&self) -> bool {
        lock(&self.status).paused
    }

    fn has_ended(&self) -> bool {
        lock(&self.status).ended
    }

    fn set_volume(&mut self, volume: f32) {
        let _ = self.send(AudioCommand::Volume(volume.clamp(0.0, 1.0)));
    }

    fn position(&self) -> f64 {
        lock(&self.status).position
    }

    fn set_position(&mut self, secs: f64) {
        let _ = self.send(AudioCommand::Seek(secs));
        lock(&self.status).position = secs;
    }

    fn duration(&self) -> Option<f64> {
        lock(&self.status).duration
    }
}

impl Drop for RodioSink {
    fn drop(&mut self) {
        if let Some(task) = self.fetch.take() {
            task.abort();
        }
        let _ = self.commands.send(AudioCommand::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_accumulates_across_pauses() {
        let mut clock = PlayClock::default();
        assert_eq!(clock.position(), 0.0);

        clock.start();
        thread::sleep(Duration::from_millis(20));
        clock.stop();
        let first = clock.position();
        assert!(first >= 0.02);

        thread::sleep(Duration::from_millis(20));
        assert_eq!(clock.position(), first);

        clock.start();
        clock.start();
        thread::sleep(Duration::from_millis(20));
        assert!(clock.position() >= first + 0.02);
    }

    #[test]
    fn test_clock_reset_sets_base_and_stops() {
        let mut clock = PlayClock::default();
        clock.start();
        clock.reset(42.5);
        assert_eq!(clock.position(), 42.5);
        assert!(clock.started.is_none());
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_error(StatusCode::OK), None);
        assert_eq!(status_error(StatusCode::PARTIAL_CONTENT), None);
        assert_eq!(
            status_error(StatusCode::UNSUPPORTED_MEDIA_TYPE),
            Some(MediaErrorKind::Unsupported)
        );
        assert_eq!(status_error(StatusCode::NOT_FOUND), Some(MediaErrorKind::Network));
        assert_eq!(
            status_error(StatusCode::INTERNAL_SERVER_ERROR),
            Some(MediaErrorKind::Network)
        );
    }

    #[test]
    fn test_shared_bytes_reads_as_slice() {
        let bytes = SharedBytes(Arc::from(&b"ID3"[..]));
        assert_eq!(bytes.clone().as_ref(), b"ID3");
    }
}
