//! Per-attempt verification: features -> liveness gate -> match -> verdict.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tracing::Instrument;

use crate::config::VerifierConfig;
use crate::error::{Error, Result};
use crate::gallery::{Gallery, GalleryHandle};
use crate::liveness::{LivenessEvaluator, LivenessVerdict};
use crate::matcher::{EuclideanMatcher, Matcher};
use crate::source::{EmbeddingSource, LandmarkSource};
use crate::types::Frame;

/// Why an attempt was turned down. These are outcomes, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    NoFaceDetected,
    LivenessFailed,
    NoMatch,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RejectReason::NoFaceDetected => "no face detected",
            RejectReason::LivenessFailed => "liveness check failed",
            RejectReason::NoMatch => "no matching identity",
        })
    }
}

/// Final outcome of one verification attempt.
///
/// Only the matched label and distance leave the core; landmarks and
/// descriptors never do.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum VerificationVerdict {
    Accepted {
        label: String,
        distance: f32,
    },
    Rejected {
        reason: RejectReason,
        /// Best distance found, present only for `NoMatch`.
        distance: Option<f32>,
    },
}

impl VerificationVerdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, VerificationVerdict::Accepted { .. })
    }

    pub fn reject_reason(&self) -> Option<RejectReason> {
        match self {
            VerificationVerdict::Accepted { .. } => None,
            VerificationVerdict::Rejected { reason, .. } => Some(*reason),
        }
    }

    fn rejected(reason: RejectReason) -> Self {
        VerificationVerdict::Rejected {
            reason,
            distance: None,
        }
    }
}

/// Stages of a single attempt, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Idle,
    Capturing,
    ExtractingFeatures,
    CheckingLiveness,
    Matching,
    Decided,
}

/// Stage tracker for one attempt. Dropped when the attempt is decided.
struct Attempt {
    stage: Stage,
}

impl Attempt {
    fn new() -> Self {
        Self { stage: Stage::Idle }
    }

    fn advance(&mut self, next: Stage) {
        debug_assert!(next > self.stage, "stage {next:?} after {:?}", self.stage);
        tracing::debug!(from = ?self.stage, to = ?next, "stage transition");
        self.stage = next;
    }

    fn decide(mut self, verdict: VerificationVerdict) -> VerificationVerdict {
        self.advance(Stage::Decided);
        match &verdict {
            VerificationVerdict::Accepted { label, distance } => {
                tracing::info!(label = %label, distance, "verification accepted");
            }
            VerificationVerdict::Rejected { reason, distance } => {
                tracing::info!(reason = %reason, distance = ?distance, "verification rejected");
            }
        }
        verdict
    }
}

/// Verification pipeline over injected sources and a shared gallery.
///
/// Cheap to clone; clones share the sources and the gallery handle, so
/// attempts may run concurrently from any number of tasks. Dropping the
/// future returned by [`Verifier::verify`] abandons the attempt; nothing
/// shared is modified before a verdict exists.
#[derive(Clone)]
pub struct Verifier {
    landmarks: Arc<dyn LandmarkSource>,
    embeddings: Arc<dyn EmbeddingSource>,
    liveness: LivenessEvaluator,
    matcher: Arc<dyn Matcher>,
    gallery: GalleryHandle,
    next_attempt: Arc<AtomicU64>,
}

impl Verifier {
    /// Wire the pipeline with the default Euclidean matcher.
    pub fn new(
        config: VerifierConfig,
        landmarks: Arc<dyn LandmarkSource>,
        embeddings: Arc<dyn EmbeddingSource>,
        gallery: GalleryHandle,
    ) -> Result<Self> {
        config.validate()?;
        let matcher = EuclideanMatcher::new(config.acceptance_threshold)?;
        Ok(Self {
            landmarks,
            embeddings,
            liveness: LivenessEvaluator::new(config.liveness),
            matcher: Arc::new(matcher),
            gallery,
            next_attempt: Arc::new(AtomicU64::new(1)),
        })
    }

    /// Replace the matcher, keeping everything else.
    pub fn with_matcher(mut self, matcher: Arc<dyn Matcher>) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn gallery(&self) -> &GalleryHandle {
        &self.gallery
    }

    /// Publish a rebuilt gallery. In-flight attempts keep the one they
    /// started matching against.
    pub fn reload(&self, gallery: Gallery) -> Arc<Gallery> {
        self.gallery.replace(gallery)
    }

    /// Run one attempt on a captured frame.
    ///
    /// Source failures, degenerate landmarks and gallery-state problems
    /// (`EmptyGallery`, `DimensionMismatch`) are errors and abort the attempt;
    /// they are not retried here.
    ///
    /// "No face" from either source takes precedence over a failure of the
    /// other: such an attempt is `Rejected(NoFaceDetected)`, not an error.
    pub async fn verify(&self, frame: &Frame) -> Result<VerificationVerdict> {
        let attempt = self.next_attempt.fetch_add(1, Ordering::Relaxed);
        let span = tracing::info_span!("verify", attempt, frame = %frame.id);
        self.run_attempt(frame).instrument(span).await
    }

    async fn run_attempt(&self, frame: &Frame) -> Result<VerificationVerdict> {
        let mut attempt = Attempt::new();
        attempt.advance(Stage::Capturing);

        attempt.advance(Stage::ExtractingFeatures);
        let (landmarks, embedding) = tokio::join!(
            self.landmarks.landmarks(frame),
            self.embeddings.embedding(frame)
        );
        let (landmarks, query) = match (landmarks, embedding) {
            (Ok(None), _) | (_, Ok(None)) => {
                return Ok(attempt.decide(VerificationVerdict::rejected(
                    RejectReason::NoFaceDetected,
                )));
            }
            (Ok(Some(landmarks)), Ok(Some(query))) => (landmarks, query),
            (Err(e), _) | (_, Err(e)) => return Err(e.into()),
        };

        attempt.advance(Stage::CheckingLiveness);
        let liveness = self.liveness.evaluate(&landmarks)?;
        if !liveness.is_live {
            return Ok(attempt.decide(VerificationVerdict::rejected(
                RejectReason::LivenessFailed,
            )));
        }

        attempt.advance(Stage::Matching);
        let gallery = self.gallery.snapshot();
        let result = self.matcher.best_match(&query, &gallery)?;

        let verdict = if result.accepted {
            VerificationVerdict::Accepted {
                label: result.label,
                distance: result.distance,
            }
        } else {
            VerificationVerdict::Rejected {
                reason: RejectReason::NoMatch,
                distance: Some(result.distance),
            }
        };
        Ok(attempt.decide(verdict))
    }

    /// Liveness verdict for one frame without matching.
    pub async fn check_liveness(&self, frame: &Frame) -> Result<LivenessVerdict> {
        let landmarks = self
            .landmarks
            .landmarks(frame)
            .await?
            .ok_or(Error::NoFaceFound)?;
        self.liveness.evaluate(&landmarks)
    }

    /// Extract a descriptor from `frame` and publish a gallery that includes
    /// it under `label`.
    pub async fn enroll(&self, label: &str, frame: &Frame) -> Result<Arc<Gallery>> {
        let descriptor = self
            .embeddings
            .embedding(frame)
            .await?
            .ok_or(Error::NoFaceFound)?;
        self.gallery.enroll(label, descriptor)
    }
}
