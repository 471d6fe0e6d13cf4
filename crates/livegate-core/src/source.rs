//! Capabilities the core consumes but does not implement.
//!
//! Face detection, landmark regression and embedding extraction live behind
//! these traits so the core has no dependency on a particular model. `Ok(None)`
//! means the frame contains no detectable face; `Err` means the capability
//! itself failed.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::SourceError;
use crate::types::{Descriptor, Frame, LandmarkSet};

#[async_trait]
pub trait LandmarkSource: Send + Sync {
    async fn landmarks(&self, frame: &Frame) -> Result<Option<LandmarkSet>, SourceError>;
}

#[async_trait]
pub trait EmbeddingSource: Send + Sync {
    async fn embedding(&self, frame: &Frame) -> Result<Option<Descriptor>, SourceError>;
}

#[async_trait]
impl<T: LandmarkSource + ?Sized> LandmarkSource for Arc<T> {
    async fn landmarks(&self, frame: &Frame) -> Result<Option<LandmarkSet>, SourceError> {
        (**self).landmarks(frame).await
    }
}

#[async_trait]
impl<T: EmbeddingSource + ?Sized> EmbeddingSource for Arc<T> {
    async fn embedding(&self, frame: &Frame) -> Result<Option<Descriptor>, SourceError> {
        (**self).embedding(frame).await
    }
}

/// A blocking face model that produces both landmarks and descriptors.
///
/// Inference sessions typically need exclusive access, hence `&mut self`.
/// Wrap an implementation in [`crate::worker::spawn_worker`] to use it as an
/// async [`LandmarkSource`] and [`EmbeddingSource`].
pub trait FaceModel: Send + 'static {
    fn landmarks(&mut self, frame: &Frame) -> Result<Option<LandmarkSet>, SourceError>;
    fn embedding(&mut self, frame: &Frame) -> Result<Option<Descriptor>, SourceError>;
}
