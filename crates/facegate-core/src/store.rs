//! On-disk identity store.
//!
//! One registered identity = `<name>.jpg` (the reference face) plus
//! `<name>.json` (the [`IdentityRecord`] with the embedding extracted at
//! registration). Matching reads the JSON sidecars only.

use crate::types::{Embedding, IdentityRecord};
use facegate_hw::Frame;
use image::{ImageFormat, RgbImage};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("invalid name: {0}")]
    InvalidName(String),
    #[error("invalid image: {0}")]
    InvalidImage(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("image encode failed: {0}")]
    Image(#[from] image::ImageError),
    #[error("record encode failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Directory of registered faces.
#[derive(Debug, Clone)]
pub struct IdentityStore {
    dir: PathBuf,
}

impl IdentityStore {
    /// Open (creating if needed) the store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        tracing::info!(dir = %dir.display(), "identity store opened");
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Trim and check a user-supplied name. Names become file stems, so
    /// path separators, `.`-prefixed names and control characters are
    /// refused.
    pub fn validate_name(name: &str) -> Result<&str, StoreError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StoreError::InvalidName("name is empty".into()));
        }
        if name.starts_with('.')
            || name.chars().any(|c| c == '/' || c == '\\' || c.is_control())
        {
            return Err(StoreError::InvalidName(format!(
                "{name:?} contains characters not allowed in a name"
            )));
        }
        Ok(name)
    }

    pub fn image_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.jpg"))
    }

    fn record_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.record_path(name).exists()
    }

    /// Persist `frame` as the reference image for `name` together with its
    /// embedding. An existing registration under the same name is replaced.
    ///
    /// Both files are written to temporary paths first and renamed into
    /// place only once both writes succeeded; a failed save leaves any
    /// earlier registration under `name` as it was.
    pub fn save(
        &self,
        name: &str,
        frame: &Frame,
        embedding: &Embedding,
    ) -> Result<IdentityRecord, StoreError> {
        let name = Self::validate_name(name)?;
        if self.contains(name) {
            tracing::warn!(name, "overwriting existing registration");
        }

        let image = RgbImage::from_raw(frame.width, frame.height, frame.data().to_vec())
            .ok_or_else(|| StoreError::InvalidImage("pixel buffer size mismatch".into()))?;
        let record = IdentityRecord {
            name: name.to_string(),
            embedding: embedding.clone(),
            created_at: chrono::Utc::now().to_rfc3339(),
        };

        let image_path = self.image_path(name);
        let record_path = self.record_path(name);
        let image_tmp = image_path.with_extension("jpg.tmp");
        let record_tmp = record_path.with_extension("json.tmp");

        let staged = Self::stage(&image, &image_tmp, &record, &record_tmp)
            .and_then(|()| fs::rename(&image_tmp, &image_path).map_err(StoreError::from));
        if let Err(e) = staged {
            tracing::error!(name, error = %e, "save failed; previous registration kept");
            let _ = fs::remove_file(&image_tmp);
            let _ = fs::remove_file(&record_tmp);
            return Err(e);
        }
        if let Err(e) = fs::rename(&record_tmp, &record_path) {
            tracing::error!(name, error = %e, "record rename failed");
            let _ = fs::remove_file(&record_tmp);
            return Err(e.into());
        }

        tracing::info!(name, path = %image_path.display(), "identity saved");
        Ok(record)
    }

    fn stage(
        image: &RgbImage,
        image_tmp: &Path,
        record: &IdentityRecord,
        record_tmp: &Path,
    ) -> Result<(), StoreError> {
        image.save_with_format(image_tmp, ImageFormat::Jpeg)?;
        fs::write(record_tmp, serde_json::to_string_pretty(record)?)?;
        Ok(())
    }

    /// All registered identities with a reference image on disk.
    ///
    /// Unreadable records are skipped with a warning.
    pub fn gallery(&self) -> Result<Vec<IdentityRecord>, StoreError> {
        let mut records = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let record = match fs::read_to_string(&path)
                .map_err(StoreError::from)
                .and_then(|s| serde_json::from_str::<IdentityRecord>(&s).map_err(StoreError::from))
            {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable record");
                    continue;
                }
            };
            if !self.image_path(&record.name).exists() {
                tracing::warn!(name = %record.name, "record has no reference image; skipping");
                continue;
            }
            records.push(record);
        }
        records.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(records)
    }
}
