//! Camera access: the device traits used by capture sessions and the
//! V4L2 implementation via the `v4l` crate.

use crate::frame::{self, Frame};
use std::path::Path;
use thiserror::Error;
use v4l::buffer::Type as BufType;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::FourCC;

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    #[error("capture failed: {0}")]
    CaptureFailed(String),
    #[error("device busy")]
    DeviceBusy,
    #[error("format negotiation failed: {0}")]
    FormatNegotiationFailed(String),
    #[error("streaming not supported")]
    StreamingNotSupported,
}

/// An open camera handle. Dropping it releases the device.
pub trait CameraDevice: Send {
    /// Acquire one frame. Errors are per-frame; the handle stays usable.
    fn read_frame(&mut self) -> Result<Frame, CameraError>;
}

/// Something that can open a camera handle on demand.
pub trait CameraSource: Send + Sync {
    fn open(&self) -> Result<Box<dyn CameraDevice>, CameraError>;

    /// Human-readable name for logs.
    fn describe(&self) -> String;
}

/// A capture-capable V4L2 node found by [`Camera::list_devices`].
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub path: String,
    pub name: String,
    pub driver: String,
    pub bus: String,
}

/// Wire formats a camera may deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PixelFormat {
    /// YUYV 4:2:2 packed (2 bytes/pixel).
    Yuyv,
    /// Packed RGB24 (3 bytes/pixel).
    Rgb3,
}

/// An open V4L2 device with its negotiated capture format.
pub struct Camera {
    device: Device,
    device_path: String,
    width: u32,
    height: u32,
    pixel_format: PixelFormat,
    sequence: u32,
}

impl Camera {
    /// Open a V4L2 capture device by path (e.g. "/dev/video0").
    pub fn open(device_path: &str) -> Result<Self, CameraError> {
        if !Path::new(device_path).exists() {
            return Err(CameraError::DeviceNotFound(device_path.to_string()));
        }

        let device = Device::with_path(device_path).map_err(|e| {
            let msg = e.to_string();
            if msg.contains("busy") || msg.contains("EBUSY") {
                CameraError::DeviceBusy
            } else {
                CameraError::DeviceNotFound(format!("{device_path}: {msg}"))
            }
        })?;

        let caps = device
            .query_caps()
            .map_err(|e| CameraError::CaptureFailed(format!("query capabilities: {e}")))?;
        if !caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE) {
            return Err(CameraError::StreamingNotSupported);
        }
        tracing::info!(device = device_path, driver = %caps.driver, card = %caps.card, "opened camera");

        let (width, height, pixel_format) = negotiate(&device)?;

        Ok(Self {
            device,
            device_path: device_path.to_string(),
            width,
            height,
            pixel_format,
            sequence: 0,
        })
    }

    /// Grab one frame and convert it to RGB.
    ///
    /// A short-lived mmap stream is opened per call; sessions call this once
    /// per capture interval.
    pub fn capture_frame(&mut self) -> Result<Frame, CameraError> {
        let mut stream = MmapStream::with_buffers(&self.device, BufType::VideoCapture, 4)
            .map_err(|e| CameraError::CaptureFailed(format!("mmap stream: {e}")))?;
        let (raw, _meta) = stream
            .next()
            .map_err(|e| CameraError::CaptureFailed(format!("dequeue: {e}")))?;

        let rgb = match self.pixel_format {
            PixelFormat::Yuyv => frame::yuyv_to_rgb(raw, self.width, self.height)
                .map_err(|e| CameraError::CaptureFailed(format!("YUYV conversion: {e}")))?,
            PixelFormat::Rgb3 => {
                let expected = (self.width * self.height * 3) as usize;
                raw.get(..expected)
                    .ok_or_else(|| {
                        CameraError::CaptureFailed(format!(
                            "RGB3 buffer holds {} bytes, need {expected}",
                            raw.len()
                        ))
                    })?
                    .to_vec()
            }
        };

        self.sequence = self.sequence.wrapping_add(1);
        Frame::new(rgb, self.width, self.height, self.sequence)
            .map_err(|e| CameraError::CaptureFailed(e.to_string()))
    }

    /// Scan /dev/video0..15 for devices that can capture video.
    pub fn list_devices() -> Vec<DeviceInfo> {
        (0..16)
            .map(|i| format!("/dev/video{i}"))
            .filter(|path| Path::new(path).exists())
            .filter_map(|path| {
                let caps = Device::with_path(&path).ok()?.query_caps().ok()?;
                caps.capabilities
                    .contains(v4l::capability::Flags::VIDEO_CAPTURE)
                    .then(|| DeviceInfo {
                        path,
                        name: caps.card,
                        driver: caps.driver,
                        bus: caps.bus,
                    })
            })
            .collect()
    }
}

/// Request 640x480 YUYV. Drivers that answer with RGB24 are accepted too.
fn negotiate(device: &Device) -> Result<(u32, u32, PixelFormat), CameraError> {
    let mut requested = device
        .format()
        .map_err(|e| CameraError::FormatNegotiationFailed(format!("get format: {e}")))?;
    requested.fourcc = FourCC::new(b"YUYV");
    requested.width = 640;
    requested.height = 480;

    let actual = device
        .set_format(&requested)
        .map_err(|e| CameraError::FormatNegotiationFailed(format!("set format: {e}")))?;

    let pixel_format = match &actual.fourcc.repr {
        b"YUYV" => PixelFormat::Yuyv,
        b"RGB3" => PixelFormat::Rgb3,
        _ => {
            return Err(CameraError::FormatNegotiationFailed(format!(
                "driver offered {}, need YUYV or RGB3",
                actual.fourcc
            )))
        }
    };

    tracing::info!(width = actual.width, height = actual.height, format = ?pixel_format, "negotiated format");
    Ok((actual.width, actual.height, pixel_format))
}

impl CameraDevice for Camera {
    fn read_frame(&mut self) -> Result<Frame, CameraError> {
        self.capture_frame()
    }
}

impl Drop for Camera {
    fn drop(&mut self) {
        tracing::info!(device = %self.device_path, "released camera");
    }
}

/// Opens a V4L2 device by path each time a session starts.
#[derive(Clone)]
pub struct V4l2Source {
    path: String,
}

impl V4l2Source {
    pub fn new(device_path: impl Into<String>) -> Self {
        Self {
            path: device_path.into(),
        }
    }
}

impl CameraSource for V4l2Source {
    fn open(&self) -> Result<Box<dyn CameraDevice>, CameraError> {
        Ok(Box::new(Camera::open(&self.path)?))
    }

    fn describe(&self) -> String {
        self.path.clone()
    }
}
