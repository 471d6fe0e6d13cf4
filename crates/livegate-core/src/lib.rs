//! Livegate verification core.
//!
//! Gates face matching behind a single-frame liveness check:
//! captured frame -> landmarks + descriptor -> liveness -> nearest gallery
//! identity -> acceptance threshold -> verdict. Landmark and embedding
//! extraction are injected through [`LandmarkSource`] and [`EmbeddingSource`].

pub mod config;
pub mod error;
pub mod gallery;
pub mod liveness;
pub mod matcher;
pub mod pipeline;
pub mod source;
pub mod types;
pub mod worker;

pub use config::{LivenessConfig, VerifierConfig};
pub use error::{Error, Result, SourceError};
pub use gallery::{Gallery, GalleryEntry, GalleryHandle};
pub use liveness::{LivenessEvaluator, LivenessVerdict};
pub use matcher::{EuclideanMatcher, MatchResult, Matcher};
pub use pipeline::{RejectReason, Stage, VerificationVerdict, Verifier};
pub use source::{EmbeddingSource, FaceModel, LandmarkSource};
pub use types::{Descriptor, Frame, LandmarkSet, Point3, LANDMARK_COUNT};
pub use worker::{spawn_worker, WorkerHandle};
