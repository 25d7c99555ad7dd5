//! Recognition worker.
//!
//! Embedding extraction and matching take hundreds of milliseconds, so they
//! run on a dedicated OS thread. The UI side submits requests without
//! blocking and receives the reply on a oneshot channel.

use facegate_core::{
    CosineMatcher, FaceEmbedder, IdentityRecord, IdentityStore, MatchResult, Matcher,
    RecognizerError, StoreError,
};
use facegate_hw::Frame;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("{0}")]
    Embedding(#[from] RecognizerError),
    #[error("identity store: {0}")]
    Store(#[from] StoreError),
    #[error("recognition worker is busy")]
    Busy,
    #[error("recognition worker exited")]
    ChannelClosed,
}

pub type EnrollReply = oneshot::Receiver<Result<IdentityRecord, EngineError>>;
pub type IdentifyReply = oneshot::Receiver<Result<MatchResult, EngineError>>;

/// Messages sent from presenters to the worker thread.
enum EngineRequest {
    Enroll {
        name: String,
        frame: Frame,
        reply: oneshot::Sender<Result<IdentityRecord, EngineError>>,
    },
    Identify {
        frame: Frame,
        reply: oneshot::Sender<Result<MatchResult, EngineError>>,
    },
}

/// Clone-safe handle to the worker thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    /// Queue a registration: extract an embedding from `frame`, then
    /// persist frame and embedding under `name`.
    pub fn enroll(&self, name: &str, frame: Frame) -> Result<EnrollReply, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.submit(EngineRequest::Enroll {
            name: name.to_string(),
            frame,
            reply,
        })?;
        Ok(rx)
    }

    /// Queue a recognition attempt against every registered identity.
    pub fn identify(&self, frame: Frame) -> Result<IdentifyReply, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.submit(EngineRequest::Identify { frame, reply })?;
        Ok(rx)
    }

    fn submit(&self, request: EngineRequest) -> Result<(), EngineError> {
        self.tx.try_send(request).map_err(|e| match e {
            TrySendError::Full(_) => EngineError::Busy,
            TrySendError::Closed(_) => EngineError::ChannelClosed,
        })
    }
}

/// Spawn the recognition worker on a dedicated OS thread.
///
/// The thread exits once every [`EngineHandle`] has been dropped.
pub fn spawn_engine(
    mut embedder: Box<dyn FaceEmbedder>,
    store: IdentityStore,
    threshold: f32,
) -> EngineHandle {
    let (tx, mut rx) = mpsc::channel::<EngineRequest>(4);

    std::thread::Builder::new()
        .name("facegate-engine".into())
        .spawn(move || {
            tracing::info!(threshold, store = %store.dir().display(), "engine thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    EngineRequest::Enroll { name, frame, reply } => {
                        let result = run_enroll(embedder.as_mut(), &store, &name, &frame);
                        let _ = reply.send(result);
                    }
                    EngineRequest::Identify { frame, reply } => {
                        let result = run_identify(embedder.as_mut(), &store, &frame, threshold);
                        let _ = reply.send(result);
                    }
                }
            }
            tracing::info!("engine thread exiting");
        })
        .expect("failed to spawn engine thread");

    EngineHandle { tx }
}

/// Extract first, persist second: a frame without a usable embedding never
/// reaches the store.
fn run_enroll(
    embedder: &mut dyn FaceEmbedder,
    store: &IdentityStore,
    name: &str,
    frame: &Frame,
) -> Result<IdentityRecord, EngineError> {
    let started = Instant::now();
    let embedding = embedder.extract(frame)?;
    let record = store.save(name, frame, &embedding)?;
    tracing::info!(
        name,
        sequence = frame.sequence,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "enroll: identity registered"
    );
    Ok(record)
}

fn run_identify(
    embedder: &mut dyn FaceEmbedder,
    store: &IdentityStore,
    frame: &Frame,
    threshold: f32,
) -> Result<MatchResult, EngineError> {
    let started = Instant::now();
    let gallery = store.gallery()?;
    let probe = embedder.extract(frame)?;
    let result = CosineMatcher.compare(&probe, &gallery, threshold);
    tracing::info!(
        matched = result.matched,
        similarity = result.similarity,
        identity = ?result.identity,
        gallery = gallery.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "identify: attempt finished"
    );
    Ok(result)
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use facegate_core::Embedding;

    fn frame() -> Frame {
        Frame::new(vec![100; 4 * 4 * 3], 4, 4, 1).unwrap()
    }

    #[tokio::test]
    async fn test_enroll_persists_record() {
        let store = temp_store();
        let engine = spawn_engine(Box::new(ScriptedEmbedder::returning(&[1.0, 0.0])), store.clone(), 0.5);

        let record = engine.enroll("agent7", frame()).unwrap().await.unwrap().unwrap();
        assert_eq!(record.name, "agent7");
        assert!(store.image_path("agent7").exists());
        std::fs::remove_dir_all(store.dir()).unwrap();
    }

    #[tokio::test]
    async fn test_enroll_embedding_failure_writes_nothing() {
        let store = temp_store();
        let engine = spawn_engine(Box::new(ScriptedEmbedder::failing()), store.clone(), 0.5);

        let err = engine.enroll("agent7", frame()).unwrap().await.unwrap().unwrap_err();
        assert!(matches!(err, EngineError::Embedding(_)));
        assert_eq!(std::fs::read_dir(store.dir()).unwrap().count(), 0);
        std::fs::remove_dir_all(store.dir()).unwrap();
    }

    #[tokio::test]
    async fn test_identify_matches_registered_identity() {
        let store = temp_store();
        let embedding = Embedding { values: vec![0.0, 1.0], model_version: None };
        store.save("agent7", &frame(), &embedding).unwrap();
        store
            .save("decoy", &frame(), &Embedding { values: vec![1.0, 0.0], model_version: None })
            .unwrap();

        let embedder = ScriptedEmbedder::returning(&[0.1, 0.9]);
        let engine = spawn_engine(Box::new(embedder.clone()), store.clone(), 0.5);

        let result = engine.identify(frame()).unwrap().await.unwrap().unwrap();
        assert!(result.matched);
        assert_eq!(result.identity.as_deref(), Some("agent7"));
        assert_eq!(embedder.calls(), 1);
        std::fs::remove_dir_all(store.dir()).unwrap();
    }

    #[tokio::test]
    async fn test_identify_with_empty_store_is_denied() {
        let store = temp_store();
        let engine = spawn_engine(Box::new(ScriptedEmbedder::returning(&[1.0])), store.clone(), 0.5);

        let result = engine.identify(frame()).unwrap().await.unwrap().unwrap();
        assert!(!result.matched);
        std::fs::remove_dir_all(store.dir()).unwrap();
    }
}
