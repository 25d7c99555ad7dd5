//! Synthetic camera for tests and camera-less demos.
//!
//! Generates a deterministic pattern per frame and keeps count of how many
//! handles are open at once, so callers can check that handles never
//! overlap.

use crate::camera::{CameraDevice, CameraError, CameraSource};
use crate::frame::Frame;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Default)]
struct MockState {
    width: u32,
    height: u32,
    unavailable: AtomicBool,
    read_failing: AtomicBool,
    read_delay_ms: AtomicU64,
    open_handles: AtomicUsize,
    max_open: AtomicUsize,
    opens: AtomicUsize,
}

/// Cloneable handle to a shared synthetic camera.
#[derive(Debug, Clone)]
pub struct MockCamera {
    state: Arc<MockState>,
}

impl MockCamera {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            state: Arc::new(MockState {
                width,
                height,
                ..Default::default()
            }),
        }
    }

    /// Make subsequent `open()` calls fail as if the device were missing.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make `read_frame()` fail on every open handle.
    pub fn set_read_failing(&self, failing: bool) {
        self.state.read_failing.store(failing, Ordering::SeqCst);
    }

    /// Make every `read_frame()` block for `delay` first, like a camera
    /// waiting on exposure.
    pub fn set_read_delay(&self, delay: Duration) {
        self.state
            .read_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Handles currently open.
    pub fn open_handles(&self) -> usize {
        self.state.open_handles.load(Ordering::SeqCst)
    }

    /// Highest number of handles ever open at the same time.
    pub fn max_concurrent_handles(&self) -> usize {
        self.state.max_open.load(Ordering::SeqCst)
    }

    /// Total successful `open()` calls.
    pub fn open_count(&self) -> usize {
        self.state.opens.load(Ordering::SeqCst)
    }
}

impl CameraSource for MockCamera {
    fn open(&self) -> Result<Box<dyn CameraDevice>, CameraError> {
        if self.state.unavailable.load(Ordering::SeqCst) {
            return Err(CameraError::DeviceNotFound("mock camera".into()));
        }
        let open = self.state.open_handles.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.max_open.fetch_max(open, Ordering::SeqCst);
        self.state.opens.fetch_add(1, Ordering::SeqCst);
        tracing::info!(open, "MockCamera opened");
        Ok(Box::new(MockDevice {
            state: Arc::clone(&self.state),
            sequence: 0,
        }))
    }

    fn describe(&self) -> String {
        format!("mock {}x{}", self.state.width, self.state.height)
    }
}

struct MockDevice {
    state: Arc<MockState>,
    sequence: u32,
}

impl CameraDevice for MockDevice {
    fn read_frame(&mut self) -> Result<Frame, CameraError> {
        let delay = self.state.read_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            std::thread::sleep(Duration::from_millis(delay));
        }
        if self.state.read_failing.load(Ordering::SeqCst) {
            return Err(CameraError::CaptureFailed("mock read failure".into()));
        }
        self.sequence += 1;

        // Mid-gray base with a moving pattern; never a dark frame.
        let pixel_count = (self.state.width * self.state.height) as usize;
        let seq = self.sequence as usize;
        let data: Vec<u8> = (0..pixel_count * 3)
            .map(|i| 64 + ((i ^ seq) % 128) as u8)
            .collect();

        Frame::new(data, self.state.width, self.state.height, self.sequence)
            .map_err(|e| CameraError::CaptureFailed(e.to_string()))
    }
}

impl Drop for MockDevice {
    fn drop(&mut self) {
        self.state.open_handles.fetch_sub(1, Ordering::SeqCst);
        tracing::info!("MockCamera closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_camera_lifecycle() {
        let camera = MockCamera::new(8, 6);
        assert_eq!(camera.open_handles(), 0);

        let mut device = camera.open().unwrap();
        assert_eq!(camera.open_handles(), 1);

        let frame = device.read_frame().unwrap();
        assert_eq!(frame.sequence, 1);
        assert_eq!(frame.data().len(), 8 * 6 * 3);
        assert!(!frame.is_dark());

        let frame2 = device.read_frame().unwrap();
        assert_eq!(frame2.sequence, 2);

        drop(device);
        assert_eq!(camera.open_handles(), 0);
        assert_eq!(camera.open_count(), 1);

        // Each handle numbers its own frames.
        let mut device = camera.open().unwrap();
        assert_eq!(device.read_frame().unwrap().sequence, 1);
    }

    #[test]
    fn test_unavailable() {
        let camera = MockCamera::new(2, 2);
        camera.set_unavailable(true);
        assert!(matches!(camera.open(), Err(CameraError::DeviceNotFound(_))));
        assert_eq!(camera.open_count(), 0);
    }

    #[test]
    fn test_tracks_concurrent_handles() {
        let camera = MockCamera::new(2, 2);
        let a = camera.open().unwrap();
        let b = camera.open().unwrap();
        drop(a);
        drop(b);
        assert_eq!(camera.max_concurrent_handles(), 2);
        assert_eq!(camera.open_handles(), 0);
    }
}
