use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use crate::error::SourceError;
use crate::source::{EmbeddingSource, FaceModel, LandmarkSource};
use crate::types::{Descriptor, Frame, LandmarkSet};

/// Default number of requests that may queue for the model thread.
pub const DEFAULT_QUEUE_DEPTH: usize = 4;

/// Messages sent from async callers to the model thread.
enum WorkerRequest {
    Landmarks {
        frame: Frame,
        reply: oneshot::Sender<Result<Option<LandmarkSet>, SourceError>>,
    },
    Embedding {
        frame: Frame,
        reply: oneshot::Sender<Result<Option<Descriptor>, SourceError>>,
    },
}

/// Clone-safe handle to a face model running on its own thread.
///
/// Implements both source traits, so one handle can be passed to the
/// verifier as landmark and embedding source.
#[derive(Clone)]
pub struct WorkerHandle {
    tx: mpsc::Sender<WorkerRequest>,
}

impl WorkerHandle {
    async fn request<T: Send>(
        &self,
        make: impl FnOnce(oneshot::Sender<Result<T, SourceError>>) -> WorkerRequest + Send,
    ) -> Result<T, SourceError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(make(reply_tx))
            .await
            .map_err(|_| SourceError::WorkerClosed)?;
        reply_rx.await.map_err(|_| SourceError::WorkerClosed)?
    }
}

#[async_trait]
impl LandmarkSource for WorkerHandle {
    async fn landmarks(&self, frame: &Frame) -> Result<Option<LandmarkSet>, SourceError> {
        let frame = frame.clone();
        self.request(|reply| WorkerRequest::Landmarks { frame, reply })
            .await
    }
}

#[async_trait]
impl EmbeddingSource for WorkerHandle {
    async fn embedding(&self, frame: &Frame) -> Result<Option<Descriptor>, SourceError> {
        let frame = frame.clone();
        self.request(|reply| WorkerRequest::Embedding { frame, reply })
            .await
    }
}

/// Move `model` onto a dedicated OS thread and serve requests in order.
///
/// The model is used by one request at a time; at most `queue_depth`
/// requests wait behind it before callers are backpressured. The thread
/// exits once every handle is dropped. A caller that stops waiting (for
/// example a cancelled verification) only discards its reply.
pub fn spawn_worker<M: FaceModel>(
    mut model: M,
    queue_depth: usize,
) -> std::io::Result<WorkerHandle> {
    let (tx, mut rx) = mpsc::channel::<WorkerRequest>(queue_depth.max(1));

    std::thread::Builder::new()
        .name("livegate-worker".into())
        .spawn(move || {
            tracing::info!("worker thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    WorkerRequest::Landmarks { frame, reply } => {
                        let result = model.landmarks(&frame);
                        if let Err(e) = &result {
                            tracing::warn!(frame = %frame.id, error = %e, "landmark extraction failed");
                        }
                        let _ = reply.send(result);
                    }
                    WorkerRequest::Embedding { frame, reply } => {
                        let result = model.embedding(&frame);
                        if let Err(e) = &result {
                            tracing::warn!(frame = %frame.id, error = %e, "embedding extraction failed");
                        }
                        let _ = reply.send(result);
                    }
                }
            }
            tracing::info!("worker thread exiting");
        })?;

    Ok(WorkerHandle { tx })
}
