use serde::{Deserialize, Serialize};

/// ArcFace output vector (512 values), L2-normalised by the embedder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
    /// Model file stem that produced the vector, e.g. "w600k_r50".
    pub model_version: Option<String>,
}

impl Embedding {
    /// Cosine similarity in [-1, 1]; 0 when either vector has zero norm.
    pub fn similarity(&self, other: &Embedding) -> f32 {
        let (dot, aa, bb) = self
            .values
            .iter()
            .zip(&other.values)
            .fold((0.0f32, 0.0f32, 0.0f32), |(dot, aa, bb), (a, b)| {
                (dot + a * b, aa + a * a, bb + b * b)
            });
        let norm = (aa * bb).sqrt();
        if norm > 0.0 {
            dot / norm
        } else {
            0.0
        }
    }
}

/// A registered identity: a unique name, its reference image on disk,
/// and the embedding extracted from that image at registration time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub name: String,
    pub embedding: Embedding,
    /// RFC 3339 registration time.
    pub created_at: String,
}

/// Outcome of scoring one probe against the gallery.
#[derive(Debug, Clone)]
pub struct MatchResult {
    pub matched: bool,
    /// Cosine similarity of the best candidate [-1, 1].
    pub similarity: f32,
    /// Name of the matched identity (if any).
    pub identity: Option<String>,
}

/// Scores a probe embedding against registered identities.
pub trait Matcher {
    fn compare(&self, probe: &Embedding, gallery: &[IdentityRecord], threshold: f32) -> MatchResult;
}

/// Picks the most similar registered identity and accepts it if it
/// clears the threshold. Every gallery entry is scored.
pub struct CosineMatcher;

impl Matcher for CosineMatcher {
    fn compare(&self, probe: &Embedding, gallery: &[IdentityRecord], threshold: f32) -> MatchResult {
        let best = gallery
            .iter()
            .map(|record| (record, probe.similarity(&record.embedding)))
            .max_by(|(_, a), (_, b)| a.total_cmp(b));

        match best {
            Some((record, similarity)) if similarity >= threshold => MatchResult {
                matched: true,
                similarity,
                identity: Some(record.name.clone()),
            },
            Some((_, similarity)) => MatchResult {
                matched: false,
                similarity,
                identity: None,
            },
            None => MatchResult {
                matched: false,
                similarity: 0.0,
                identity: None,
            },
        }
    }
}
