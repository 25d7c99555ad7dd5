//! facegate-core — Face embeddings, matching, and registered identities.
//!
//! Embeddings come from an ArcFace model run through ONNX Runtime; identities
//! are stored on disk as a reference JPEG plus a JSON embedding sidecar.

pub mod recognizer;
pub mod store;
pub mod types;

pub use recognizer::{FaceEmbedder, FaceRecognizer, RecognizerError};
pub use store::{IdentityStore, StoreError};
pub use types::{CosineMatcher, Embedding, IdentityRecord, MatchResult, Matcher};

use std::path::PathBuf;

/// Default location of the ArcFace model file.
pub fn default_model_path() -> PathBuf {
    data_dir().join("models").join(recognizer::ARCFACE_MODEL_FILE)
}

/// Default directory for registered faces.
pub fn default_store_dir() -> PathBuf {
    data_dir().join("faces")
}

fn data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("facegate")
}
