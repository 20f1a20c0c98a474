use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::compositor::{format_duration, Compositor, Frame, FrameLayout, FrameSource};
use super::peer::MediaError;

pub const DEFAULT_FRAME_RATE: u32 = 30;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RecordingError {
    #[error("a recording is already in progress")]
    AlreadyRecording,
    #[error(transparent)]
    Media(#[from] MediaError),
}

/// Turns composited frames into encoded media chunks
pub trait Encoder: Send {
    fn mime_type(&self) -> &str;

    fn encode(&mut self, frame: &Frame) -> Result<Vec<u8>, MediaError>;
}

/// Encoded media of a finished recording. Lives in memory only.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaBlob {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// A completed recording
#[derive(Debug, Clone, PartialEq)]
pub struct Recording {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub duration_seconds: u64,
    pub frames: u64,
    pub media: MediaBlob,
}

impl Recording {
    pub fn duration_text(&self) -> String {
        format_duration(self.duration_seconds)
    }
}

struct Capture {
    encoder: Box<dyn Encoder>,
    chunks: Vec<Vec<u8>>,
    frames: u64,
    failure: Option<MediaError>,
}

struct ActiveRecording {
    id: String,
    title: String,
    created_at: DateTime<Utc>,
    started: Instant,
    running: watch::Sender<bool>,
    task: JoinHandle<()>,
    capture: Arc<Mutex<Capture>>,
}

enum RecordingState {
    Idle,
    Recording(ActiveRecording),
}

/// Local recorder: `idle -> recording -> idle`.
///
/// While recording, a task composites one frame per tick at the configured
/// frame rate. Stopping flips the running flag and waits for that task, so no
/// frame is produced after `stop` returns.
pub struct RecordingController {
    frame_rate: u32,
    layout: FrameLayout,
    source: Arc<dyn FrameSource>,
    state: RecordingState,
}

impl RecordingController {
    pub fn new(source: Arc<dyn FrameSource>, frame_rate: u32) -> Self {
        Self {
            frame_rate: frame_rate.max(1),
            layout: FrameLayout::default(),
            source,
            state: RecordingState::Idle,
        }
    }

    pub fn with_layout(mut self, layout: FrameLayout) -> Self {
        self.layout = layout;
        self
    }

    /// True while frames are being captured. A recording whose encoder
    /// failed no longer counts.
    pub fn is_recording(&self) -> bool {
        match &self.state {
            RecordingState::Recording(active) => lock(&active.capture).failure.is_none(),
            RecordingState::Idle => false,
        }
    }

    /// Error that ended the capture of the current recording, if any
    pub fn failure(&self) -> Option<MediaError> {
        match &self.state {
            RecordingState::Recording(active) => lock(&active.capture).failure.clone(),
            RecordingState::Idle => None,
        }
    }

    /// Id of the recording in progress
    pub fn active_id(&self) -> Option<&str> {
        match &self.state {
            RecordingState::Recording(active) => Some(&active.id),
            RecordingState::Idle => None,
        }
    }

    /// Frames captured so far by the recording in progress
    pub fn frames_captured(&self) -> u64 {
        match &self.state {
            RecordingState::Recording(active) => lock(&active.capture).frames,
            RecordingState::Idle => 0,
        }
    }

    /// Start capturing. Refused while a recording is already running, in
    /// which case the running one is left untouched.
    ///
    /// When the previous recording died on an encoder error and was never
    /// stopped, it is discarded, the controller returns to idle and the error
    /// is reported as `RecordingError::Media`. The next `start` then succeeds.
    pub fn start(&mut self, encoder: Box<dyn Encoder>) -> Result<String, RecordingError> {
        if let Some(failure) = self.failure() {
            if let RecordingState::Recording(active) = std::mem::replace(&mut self.state, RecordingState::Idle) {
                active.task.abort();
                warn!("Discarding recording {} after encoder failure: {}", active.id, failure);
            }
            return Err(RecordingError::Media(failure));
        }
        if self.is_recording() {
            warn!("Recording already in progress, ignoring start");
            return Err(RecordingError::AlreadyRecording);
        }

        let created_at = Utc::now();
        let id = created_at.timestamp_millis().to_string();
        let title = self.source.session_title();
        let started = Instant::now();
        let capture = Arc::new(Mutex::new(Capture {
            encoder,
            chunks: Vec::new(),
            frames: 0,
            failure: None,
        }));
        let (running, running_rx) = watch::channel(true);

        let task = tokio::spawn(capture_loop(
            Compositor::new(self.layout),
            self.source.clone(),
            capture.clone(),
            running_rx,
            started,
            Duration::from_secs_f64(1.0 / f64::from(self.frame_rate)),
        ));

        info!("Recording {} started at {} fps", id, self.frame_rate);
        self.state = RecordingState::Recording(ActiveRecording {
            id: id.clone(),
            title,
            created_at,
            started,
            running,
            task,
            capture,
        });
        Ok(id)
    }

    /// Finish the recording in progress, keeping whatever was captured
    /// before an encoder failure. `None` when idle.
    pub async fn stop(&mut self) -> Option<Recording> {
        let RecordingState::Recording(active) = std::mem::replace(&mut self.state, RecordingState::Idle) else {
            debug!("Stop requested with no recording in progress");
            return None;
        };

        let _ = active.running.send(false);
        if let Err(e) = active.task.await {
            error!("Recording {} capture task ended abnormally: {}", active.id, e);
        }
        let duration_seconds = active.started.elapsed().as_secs();

        let mut capture = lock(&active.capture);
        if let Some(failure) = capture.failure.take() {
            warn!("Recording {} stopped early: {}", active.id, failure);
        }
        let media = MediaBlob {
            mime_type: capture.encoder.mime_type().to_string(),
            bytes: std::mem::take(&mut capture.chunks).concat(),
        };

        info!(
            "Recording {} finished: {} frames, {}",
            active.id,
            capture.frames,
            format_duration(duration_seconds)
        );
        Some(Recording {
            id: active.id.clone(),
            title: active.title.clone(),
            created_at: active.created_at,
            duration_seconds,
            frames: capture.frames,
            media,
        })
    }
}

impl Drop for RecordingController {
    fn drop(&mut self) {
        if let RecordingState::Recording(active) = &self.state {
            let _ = active.running.send(false);
            active.task.abort();
        }
    }
}

fn lock(capture: &Mutex<Capture>) -> std::sync::MutexGuard<'_, Capture> {
    capture.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn capture_loop(
    compositor: Compositor,
    source: Arc<dyn FrameSource>,
    capture: Arc<Mutex<Capture>>,
    running: watch::Receiver<bool>,
    started: Instant,
    period: Duration,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        interval.tick().await;
        if !*running.borrow() {
            break;
        }

        let mut capture = lock(&capture);
        let frame = compositor.compose(capture.frames, started.elapsed(), source.as_ref());
        match capture.encoder.encode(&frame) {
            Ok(chunk) => {
                if !chunk.is_empty() {
                    capture.chunks.push(chunk);
                }
                capture.frames += 1;
            }
            Err(e) => {
                error!("Failed to encode frame {}: {}", frame.index, e);
                capture.failure = Some(e);
                break;
            }
        }
    }
}
