use crate::engine::EngineError;
use facegate_hw::CameraError;
use thiserror::Error;

/// User-facing failures. Every one is recovered on the page that raised it.
#[derive(Error, Debug)]
pub enum KioskError {
    #[error("Camera unavailable: {0}")]
    DeviceUnavailable(#[from] CameraError),
    #[error("Please enter a valid name: {0}")]
    InvalidInput(String),
    #[error("Kindly move closer to the camera such that your face covers majority of the camera frame.")]
    NoFaceFrame,
    #[error("Registration failed: {0}")]
    EmbeddingFailed(#[source] EngineError),
    #[error("Recognition failed: {0}")]
    MatchError(#[source] EngineError),
}

impl KioskError {
    /// Shown next to the input rather than as a dialog.
    pub fn is_inline(&self) -> bool {
        matches!(self, KioskError::InvalidInput(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert!(KioskError::NoFaceFrame.to_string().contains("move closer"));
        let err = KioskError::DeviceUnavailable(CameraError::DeviceBusy);
        assert_eq!(err.to_string(), "Camera unavailable: device busy");
        assert!(!err.is_inline());
        assert!(KioskError::InvalidInput("name is empty".into()).is_inline());
    }
}
