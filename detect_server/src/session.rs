//! Session orchestration: the start/stop lifecycle around the detection
//! loop.
//!
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::detect_loop::DetectionLoop;
use crate::detector::Detector;
use crate::media::{MediaError, MediaHandle, MediaSession, StreamConstraints};
use crate::renderer::RenderSink;

/// Lifecycle of the single detection session.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SessionState {
    Idle,
    Starting,
    Detecting,
    Stopping,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Starting => "starting",
            SessionState::Detecting => "detecting",
            SessionState::Stopping => "stopping",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    /// Another start/stop transition is in progress.
    #[error("session is busy with another transition")]
    Busy,
    #[error("session is already detecting")]
    AlreadyRunning,
    #[error("session is not detecting")]
    NotRunning,
    #[error(transparent)]
    Media(#[from] MediaError),
}

struct ActiveSession {
    cancel: CancellationToken,
    handle: MediaHandle,
    task: JoinHandle<()>,
}

/// Composes media session, detector and renderer into one start/stop
/// session. Owns the session state; nothing else mutates it.
pub struct SessionController {
    media: MediaSession,
    detector: Arc<dyn Detector>,
    renderer: Arc<dyn RenderSink>,
    constraints: StreamConstraints,
    cadence: Duration,
    state: Mutex<SessionState>,
    active: Mutex<Option<ActiveSession>>,
    transition: tokio::sync::Mutex<()>,
    status_tx: watch::Sender<String>,
    status_rx: watch::Receiver<String>,
}

impl SessionController {
    pub fn new(
        media: MediaSession,
        detector: Arc<dyn Detector>,
        renderer: Arc<dyn RenderSink>,
        constraints: StreamConstraints,
        cadence: Duration,
    ) -> Self {
        let (status_tx, status_rx) = watch::channel("ready".to_string());
        Self {
            media,
            detector,
            renderer,
            constraints,
            cadence,
            state: Mutex::new(SessionState::Idle),
            active: Mutex::new(None),
            transition: tokio::sync::Mutex::new(()),
            status_tx,
            status_rx,
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap()
    }

    /// Current status text.
    pub fn status_text(&self) -> String {
        self.status_rx.borrow().clone()
    }

    /// Number of live capture tracks (0 when no session is active).
    pub fn active_tracks(&self) -> usize {
        self.active
            .lock()
            .unwrap()
            .as_ref()
            .map(|active| active.handle.active_tracks())
            .unwrap_or(0)
    }

    /// Acquire media and launch the detection loop.
    ///
    /// While a transition runs, further start/stop calls are rejected with
    /// `Busy` - the single user-facing control stays disabled exactly that
    /// long. Every exit path leaves the state at `Idle` or `Detecting`.
    pub async fn start(&self) -> Result<(), SessionError> {
        let _transition = self.transition.try_lock().map_err(|_| SessionError::Busy)?;

        {
            let mut state = self.state.lock().unwrap();
            match *state {
                SessionState::Idle => *state = SessionState::Starting,
                SessionState::Detecting => return Err(SessionError::AlreadyRunning),
                SessionState::Starting | SessionState::Stopping => {
                    return Err(SessionError::Busy)
                }
            }
        }
        self.set_status("starting the camera...");

        let handle = match self.media.acquire(&self.constraints) {
            Ok(handle) => handle,
            Err(err) => {
                // Recoverable: the control is usable again right away.
                self.set_status(&format!("camera unavailable: {err}"));
                *self.state.lock().unwrap() = SessionState::Idle;
                return Err(err.into());
            }
        };

        let (width, height) = handle.resolution();
        self.set_status(&format!("detecting at {width}x{height}"));

        let cancel = CancellationToken::new();
        let detection_loop = DetectionLoop::new(
            handle.clone(),
            Arc::clone(&self.detector),
            Arc::clone(&self.renderer),
            cancel.clone(),
            self.cadence,
        );
        let task = tokio::spawn(detection_loop.run());

        *self.active.lock().unwrap() = Some(ActiveSession {
            cancel,
            handle,
            task,
        });
        *self.state.lock().unwrap() = SessionState::Detecting;

        Ok(())
    }

    /// Cancel the loop, release the camera and clear the surface.
    pub async fn stop(&self) -> Result<(), SessionError> {
        let _transition = self.transition.try_lock().map_err(|_| SessionError::Busy)?;

        {
            let mut state = self.state.lock().unwrap();
            match *state {
                SessionState::Detecting => *state = SessionState::Stopping,
                SessionState::Idle => return Err(SessionError::NotRunning),
                SessionState::Starting | SessionState::Stopping => {
                    return Err(SessionError::Busy)
                }
            }
        }
        self.set_status("stopping...");

        let active = self.active.lock().unwrap().take();
        if let Some(active) = active {
            active.cancel.cancel();
            // The in-flight pass is allowed to finish; its result is
            // discarded by the loop itself.
            if let Err(err) = active.task.await {
                log::warn!("detection loop task failed: {err}");
            }
            self.media.release(&active.handle);
        }
        self.renderer.clear();

        *self.state.lock().unwrap() = SessionState::Idle;
        self.set_status("stopped");

        Ok(())
    }

    fn set_status(&self, text: &str) {
        log::info!("session: {text}");
        self.status_tx.send_replace(text.to_string());
    }
}
