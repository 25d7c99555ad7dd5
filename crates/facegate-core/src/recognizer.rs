//! ArcFace face embeddings via ONNX Runtime.
//!
//! The kiosk framing keeps the visitor's face centred, so the embedder works
//! on a centred square crop of the frame scaled to the 112x112 ArcFace input
//! instead of running a separate detector.

use crate::types::Embedding;
use facegate_hw::Frame;
use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

const ARCFACE_INPUT_SIZE: usize = 112;
const ARCFACE_MEAN: f32 = 127.5;
const ARCFACE_STD: f32 = 127.5;
const ARCFACE_EMBEDDING_DIM: usize = 512;
const ARCFACE_MODEL_VERSION: &str = "w600k_r50";

/// File name of the ArcFace model inside the model directory.
pub const ARCFACE_MODEL_FILE: &str = "w600k_r50.onnx";

#[derive(Error, Debug)]
pub enum RecognizerError {
    #[error("model file not found: {0} (download w600k_r50.onnx from insightface)")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("frame too dark to contain a usable face")]
    DarkFrame,
    #[error("invalid frame: {0}")]
    InvalidFrame(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Turns a camera frame into a face embedding.
pub trait FaceEmbedder: Send {
    fn extract(&mut self, frame: &Frame) -> Result<Embedding, RecognizerError>;
}

/// ArcFace-based face recognizer.
pub struct FaceRecognizer {
    session: Session,
}

impl FaceRecognizer {
    /// Load the ArcFace ONNX model from the given path.
    pub fn load(model_path: &Path) -> Result<Self, RecognizerError> {
        if !model_path.exists() {
            return Err(RecognizerError::ModelNotFound(
                model_path.display().to_string(),
            ));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(
            path = %model_path.display(),
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded ArcFace model"
        );

        Ok(Self { session })
    }

    /// Preprocess an RGB frame into a 1x3x112x112 NCHW float tensor.
    fn preprocess(frame: &Frame) -> Result<Array4<f32>, RecognizerError> {
        let crop = center_crop(frame)?;
        let size = ARCFACE_INPUT_SIZE;
        let face = imageops::resize(&crop, size as u32, size as u32, FilterType::Triangle);

        let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
        for (x, y, pixel) in face.enumerate_pixels() {
            for c in 0..3 {
                tensor[[0, c, y as usize, x as usize]] =
                    (pixel[c] as f32 - ARCFACE_MEAN) / ARCFACE_STD;
            }
        }
        Ok(tensor)
    }
}

impl FaceEmbedder for FaceRecognizer {
    fn extract(&mut self, frame: &Frame) -> Result<Embedding, RecognizerError> {
        if frame.is_dark() {
            return Err(RecognizerError::DarkFrame);
        }

        let input = Self::preprocess(frame)?;

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, raw_data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| RecognizerError::InferenceFailed(format!("embedding extraction: {e}")))?;

        let raw: Vec<f32> = raw_data.to_vec();
        if raw.len() != ARCFACE_EMBEDDING_DIM {
            return Err(RecognizerError::InferenceFailed(format!(
                "expected {ARCFACE_EMBEDDING_DIM}-dim embedding, got {}",
                raw.len()
            )));
        }

        Ok(Embedding {
            values: l2_normalize(raw),
            model_version: Some(ARCFACE_MODEL_VERSION.to_string()),
        })
    }
}

/// Largest centred square of the frame.
fn center_crop(frame: &Frame) -> Result<RgbImage, RecognizerError> {
    let image = RgbImage::from_raw(frame.width, frame.height, frame.data().to_vec())
        .ok_or_else(|| RecognizerError::InvalidFrame("pixel buffer size mismatch".into()))?;

    let side = frame.width.min(frame.height);
    if side == 0 {
        return Err(RecognizerError::InvalidFrame("empty frame".into()));
    }
    let x = (frame.width - side) / 2;
    let y = (frame.height - side) / 2;
    Ok(imageops::crop_imm(&image, x, y, side, side).to_image())
}

fn l2_normalize(raw: Vec<f32>) -> Vec<f32> {
    let norm: f32 = raw.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        raw.iter().map(|x| x / norm).collect()
    } else {
        raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(width: u32, height: u32, value: u8) -> Frame {
        Frame::new(vec![value; (width * height * 3) as usize], width, height, 1).unwrap()
    }

    #[test]
    fn test_preprocess_output_shape() {
        let tensor = FaceRecognizer::preprocess(&frame(640, 480, 128)).unwrap();
        assert_eq!(tensor.shape(), &[1, 3, ARCFACE_INPUT_SIZE, ARCFACE_INPUT_SIZE]);
    }

    #[test]
    fn test_preprocess_normalization() {
        let tensor = FaceRecognizer::preprocess(&frame(224, 224, 128)).unwrap();
        let expected = (128.0 - ARCFACE_MEAN) / ARCFACE_STD;
        let val = tensor[[0, 2, 50, 50]];
        assert!((val - expected).abs() < 1e-6, "got {val}, expected {expected}");
    }

    #[test]
    fn test_center_crop_is_square_and_centred() {
        // Left third red, middle third green, right third blue.
        let (w, h) = (6u32, 2u32);
        let mut data = Vec::new();
        for _ in 0..h {
            for x in 0..w {
                data.extend_from_slice(match x {
                    0 | 1 => &[255, 0, 0],
                    2 | 3 => &[0, 255, 0],
                    _ => &[0, 0, 255],
                });
            }
        }
        let frame = Frame::new(data, w, h, 1).unwrap();
        let crop = center_crop(&frame).unwrap();
        assert_eq!(crop.dimensions(), (2, 2));
        assert!(crop.pixels().all(|p| p.0 == [0, 255, 0]));
    }

    #[test]
    fn test_l2_normalize() {
        let values = l2_normalize(vec![3.0, 4.0]);
        assert!((values[0] - 0.6).abs() < 1e-6);
        assert!((values[1] - 0.8).abs() < 1e-6);
        assert_eq!(l2_normalize(vec![0.0, 0.0]), vec![0.0, 0.0]);
    }

    #[test]
    fn test_load_missing_model() {
        let err = FaceRecognizer::load(Path::new("/nonexistent/w600k_r50.onnx"))
            .err()
            .unwrap();
        assert!(matches!(err, RecognizerError::ModelNotFound(_)));
    }
}
