//! Capture session: one open camera handle plus the producer thread that
//! feeds a [`FrameBuffer`].

use crate::buffer::FrameBuffer;
use crate::camera::{CameraDevice, CameraError, CameraSource};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Pause between capture iterations (~30 fps cap).
pub const CAPTURE_INTERVAL: Duration = Duration::from_millis(33);

/// How long `stop()` waits for the producer before giving up on it.
const JOIN_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Stopped,
    Starting,
    Running,
    /// Stop was requested but the producer has not released the camera
    /// yet. The next `start()` or `stop()` tries again to reap it.
    Stopping,
}

/// Flags shared with the producer thread.
#[derive(Default)]
struct Shared {
    running: AtomicBool,
    ready: AtomicBool,
    frames: AtomicU64,
}

struct Producer {
    handle: JoinHandle<()>,
    done: mpsc::Receiver<()>,
}

/// Owns a camera handle and its producer thread while running.
///
/// The camera handle lives on the producer thread and is dropped there
/// before the thread reports completion. The session reports `Stopped`
/// only once that has happened, so a camera handle is open exactly when
/// the state is not `Stopped`.
pub struct CaptureSession {
    source: Arc<dyn CameraSource>,
    buffer: Arc<FrameBuffer>,
    interval: Duration,
    join_timeout: Duration,
    state: SessionState,
    shared: Arc<Shared>,
    producer: Option<Producer>,
}

impl CaptureSession {
    pub fn new(source: Arc<dyn CameraSource>) -> Self {
        Self::with_interval(source, CAPTURE_INTERVAL)
    }

    pub fn with_interval(source: Arc<dyn CameraSource>, interval: Duration) -> Self {
        Self {
            source,
            buffer: Arc::new(FrameBuffer::new()),
            interval,
            join_timeout: JOIN_TIMEOUT,
            state: SessionState::Stopped,
            shared: Arc::new(Shared::default()),
            producer: None,
        }
    }

    /// Override how long `stop()` and `start()` wait for a producer that is
    /// still inside a frame read.
    pub fn with_join_timeout(mut self, timeout: Duration) -> Self {
        self.join_timeout = timeout;
        self
    }

    /// Open the camera and launch the producer loop.
    ///
    /// No-op while already running. If a previous producer still holds the
    /// camera, waits for it once more and fails with
    /// [`CameraError::DeviceBusy`] if it is still there.
    pub fn start(&mut self) -> Result<(), CameraError> {
        if self.state == SessionState::Stopping {
            if !self.reap_producer() {
                tracing::warn!(camera = %self.source.describe(), "previous capture thread still holds the camera");
                return Err(CameraError::DeviceBusy);
            }
            self.state = SessionState::Stopped;
        }
        if self.state != SessionState::Stopped {
            return Ok(());
        }
        self.state = SessionState::Starting;

        let device = match self.source.open() {
            Ok(device) => device,
            Err(e) => {
                tracing::warn!(camera = %self.source.describe(), error = %e, "camera unavailable");
                self.state = SessionState::Stopped;
                return Err(e);
            }
        };

        // Fresh buffer and flags: nothing from an earlier producer can reach
        // this session's consumer.
        self.buffer = Arc::new(FrameBuffer::new());
        self.shared = Arc::new(Shared::default());
        self.shared.running.store(true, Ordering::SeqCst);

        let (done_tx, done_rx) = mpsc::channel();
        let shared = Arc::clone(&self.shared);
        let buffer = Arc::clone(&self.buffer);
        let interval = self.interval;

        let handle = std::thread::Builder::new()
            .name("facegate-capture".into())
            .spawn(move || {
                produce(device, &shared, &buffer, interval);
                let _ = done_tx.send(());
            })
            .expect("failed to spawn capture thread");

        self.producer = Some(Producer {
            handle,
            done: done_rx,
        });
        self.state = SessionState::Running;
        tracing::info!(camera = %self.source.describe(), "capture started");
        Ok(())
    }

    /// Signal the producer to exit and wait (bounded) for it to release the
    /// camera. Safe to call when never started.
    ///
    /// If the producer is stuck in a read past the join timeout the session
    /// is left `Stopping` rather than `Stopped`.
    pub fn stop(&mut self) {
        self.shared.running.store(false, Ordering::SeqCst);

        if self.producer.is_some() {
            if self.reap_producer() {
                tracing::info!(
                    camera = %self.source.describe(),
                    frames = self.shared.frames.load(Ordering::Relaxed),
                    "capture stopped"
                );
            } else {
                tracing::warn!(
                    timeout_ms = self.join_timeout.as_millis() as u64,
                    "capture thread did not exit in time; camera still held"
                );
            }
        }

        self.shared.ready.store(false, Ordering::SeqCst);
        self.buffer.clear();
        self.state = if self.producer.is_some() {
            SessionState::Stopping
        } else {
            SessionState::Stopped
        };
    }

    /// Wait up to the join timeout for the producer to finish. True once no
    /// producer thread is left.
    fn reap_producer(&mut self) -> bool {
        let Some(producer) = self.producer.take() else {
            return true;
        };
        match producer.done.recv_timeout(self.join_timeout) {
            Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => {
                if producer.handle.join().is_err() {
                    tracing::error!("capture thread panicked");
                }
                true
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                self.producer = Some(producer);
                false
            }
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == SessionState::Running
    }

    /// True once at least one frame was produced since the last `start()`,
    /// and only while running.
    pub fn is_ready(&self) -> bool {
        self.is_running() && self.shared.ready.load(Ordering::SeqCst)
    }

    /// Frames produced since the last `start()`.
    pub fn frames_captured(&self) -> u64 {
        self.shared.frames.load(Ordering::Relaxed)
    }

    /// The consumer side of the current session's hand-off. Replaced on
    /// every `start()`.
    pub fn buffer(&self) -> &Arc<FrameBuffer> {
        &self.buffer
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.stop();
        if self.producer.is_some() {
            tracing::warn!("capture thread detached; camera released when its read returns");
        }
    }
}

/// Producer loop. Runs until `shared.running` is cleared; the device is
/// dropped (released) on return. A frame read that finishes after the stop
/// request is discarded.
fn produce(
    mut device: Box<dyn CameraDevice>,
    shared: &Shared,
    buffer: &FrameBuffer,
    interval: Duration,
) {
    tracing::debug!("capture thread started");
    while shared.running.load(Ordering::SeqCst) {
        match device.read_frame() {
            Ok(_) if !shared.running.load(Ordering::SeqCst) => break,
            Ok(frame) => {
                buffer.put(frame);
                shared.frames.fetch_add(1, Ordering::Relaxed);
                shared.ready.store(true, Ordering::SeqCst);
            }
            Err(e) => tracing::debug!(error = %e, "frame read failed; skipping"),
        }
        std::thread::sleep(interval);
    }
    drop(device);
    tracing::debug!("capture thread exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockCamera;

    fn session(camera: &MockCamera) -> CaptureSession {
        CaptureSession::with_interval(Arc::new(camera.clone()), Duration::from_millis(2))
    }

    fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
        for _ in 0..500 {
            if cond() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        false
    }

    #[test]
    fn test_stop_when_never_started_is_noop() {
        let camera = MockCamera::new(4, 4);
        let mut session = session(&camera);
        session.stop();
        session.stop();
        assert_eq!(session.state(), SessionState::Stopped);
        assert_eq!(camera.open_count(), 0);
    }

    #[test]
    fn test_start_produces_frames_and_becomes_ready() {
        let camera = MockCamera::new(4, 4);
        let mut session = session(&camera);
        assert!(!session.is_ready());

        session.start().unwrap();
        assert_eq!(session.state(), SessionState::Running);
        assert_eq!(camera.open_handles(), 1);

        assert!(wait_until(|| session.is_ready()));
        assert!(wait_until(|| !session.buffer().is_empty()));

        session.stop();
        assert_eq!(camera.open_handles(), 0);
        assert!(!session.is_ready());
        assert!(session.buffer().is_empty());
    }

    #[test]
    fn test_start_twice_is_noop() {
        let camera = MockCamera::new(4, 4);
        let mut session = session(&camera);
        session.start().unwrap();
        session.start().unwrap();
        assert_eq!(camera.open_count(), 1);
        assert_eq!(camera.open_handles(), 1);
        session.stop();
    }

    #[test]
    fn test_unavailable_camera_leaves_session_stopped() {
        let camera = MockCamera::new(4, 4);
        camera.set_unavailable(true);
        let mut session = session(&camera);

        assert!(session.start().is_err());
        assert_eq!(session.state(), SessionState::Stopped);
        assert_eq!(camera.open_handles(), 0);

        camera.set_unavailable(false);
        session.start().unwrap();
        assert!(session.is_running());
        session.stop();
    }

    #[test]
    fn test_read_failures_do_not_end_session() {
        let camera = MockCamera::new(4, 4);
        camera.set_read_failing(true);
        let mut session = session(&camera);
        session.start().unwrap();

        std::thread::sleep(Duration::from_millis(20));
        assert!(session.is_running());
        assert!(!session.is_ready());

        camera.set_read_failing(false);
        assert!(wait_until(|| session.is_ready()));
        session.stop();
    }

    #[test]
    fn test_stop_then_start_never_overlaps_handles() {
        let camera = MockCamera::new(4, 4);
        let mut session = session(&camera);
        for _ in 0..20 {
            session.start().unwrap();
            session.stop();
            session.start().unwrap();
        }
        session.stop();
        assert_eq!(camera.max_concurrent_handles(), 1);
        assert_eq!(camera.open_handles(), 0);
    }

    #[test]
    fn test_restart_does_not_serve_stale_frames() {
        let camera = MockCamera::new(4, 4);
        let mut session = session(&camera);
        session.start().unwrap();
        assert!(wait_until(|| session.is_ready()));
        session.stop();

        session.start().unwrap();
        assert!(wait_until(|| session.is_ready()));
        // Sequence numbering restarts with each opened handle; the counter
        // may trail the buffered frame by one.
        let frame = session.buffer().try_take().unwrap();
        assert!(frame.sequence as u64 <= session.frames_captured() + 1);

        let previous = Arc::clone(session.buffer());
        session.stop();
        session.start().unwrap();
        assert!(!Arc::ptr_eq(&previous, session.buffer()));
        session.stop();
    }

    #[test]
    fn test_frame_sequence_increases_within_a_session() {
        let camera = MockCamera::new(4, 4);
        let mut session = session(&camera);
        session.start().unwrap();

        let mut last = 0;
        for _ in 0..3 {
            assert!(wait_until(|| !session.buffer().is_empty()));
            let frame = session.buffer().try_take().unwrap();
            assert!(frame.sequence > last, "{} after {last}", frame.sequence);
            last = frame.sequence;
        }
        session.stop();

        session.start().unwrap();
        assert!(wait_until(|| !session.buffer().is_empty()));
        let frame = session.buffer().try_take().unwrap();
        assert!(frame.sequence >= 1);
        session.stop();
        assert_eq!(camera.open_count(), 2);
    }

    #[test]
    fn test_drop_releases_camera() {
        let camera = MockCamera::new(4, 4);
        {
            let mut session = session(&camera);
            session.start().unwrap();
        }
        assert_eq!(camera.open_handles(), 0);
    }

    #[test]
    fn test_slow_read_keeps_session_stopping_until_camera_released() {
        let camera = MockCamera::new(4, 4);
        camera.set_read_delay(Duration::from_millis(200));
        let mut session = session(&camera).with_join_timeout(Duration::from_millis(20));
        session.start().unwrap();

        // Producer is inside its first read when stop is requested.
        std::thread::sleep(Duration::from_millis(10));
        session.stop();
        assert_eq!(session.state(), SessionState::Stopping);
        assert!(!session.is_running());
        assert!(!session.is_ready());
        assert_eq!(camera.open_handles(), 1);

        // An immediate restart must not open a second handle.
        assert!(matches!(session.start(), Err(CameraError::DeviceBusy)));
        assert_eq!(camera.open_handles(), 1);

        assert!(wait_until(|| session.start().is_ok()));
        assert_eq!(session.state(), SessionState::Running);
        assert_eq!(camera.max_concurrent_handles(), 1);
        // The new handle has not finished a read; nothing from the old one.
        assert!(session.buffer().is_empty());

        camera.set_read_delay(Duration::ZERO);
        assert!(wait_until(|| {
            session.stop();
            session.state() == SessionState::Stopped
        }));
        assert_eq!(camera.open_handles(), 0);
        assert_eq!(camera.max_concurrent_handles(), 1);
    }

    #[test]
    fn test_read_finishing_after_stop_does_not_mark_ready() {
        let camera = MockCamera::new(4, 4);
        camera.set_read_delay(Duration::from_millis(60));
        let mut session = session(&camera);
        session.start().unwrap();

        std::thread::sleep(Duration::from_millis(10));
        session.stop();

        assert_eq!(session.state(), SessionState::Stopped);
        assert!(!session.is_ready());
        assert_eq!(session.frames_captured(), 0);
        assert!(session.buffer().is_empty());
        assert_eq!(camera.open_handles(), 0);
    }
}
