//! facegate-hw — Camera capture and the producer side of the frame pipeline.
//!
//! Provides V4L2 camera access, a synthetic camera for tests and demos,
//! the single-slot [`FrameBuffer`] hand-off, and [`CaptureSession`], which
//! owns a camera handle plus the thread that feeds the buffer.

pub mod buffer;
pub mod camera;
pub mod frame;
pub mod mock;
pub mod session;

pub use buffer::FrameBuffer;
pub use camera::{Camera, CameraDevice, CameraError, CameraSource, DeviceInfo, V4l2Source};
pub use frame::Frame;
pub use mock::MockCamera;
pub use session::{CaptureSession, SessionState, CAPTURE_INTERVAL};
