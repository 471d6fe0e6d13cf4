//! Nearest-neighbour search over the gallery.
//!
//! Search is an exhaustive linear scan. At the expected gallery sizes (tens
//! to low thousands of identities) a scan over a few hundred floats per
//! descriptor is well under a millisecond, and it keeps results exact and
//! reproducible without an index to maintain across gallery rebuilds.

use serde::Serialize;

use crate::config::check_threshold;
use crate::error::{Error, Result};
use crate::gallery::Gallery;
use crate::types::Descriptor;

/// Closest gallery identity for one query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    pub label: String,
    /// Euclidean distance to the closest descriptor of `label`.
    pub distance: f32,
    /// `distance <= acceptance_threshold`.
    pub accepted: bool,
}

/// Finds the closest enrolled identity for a query descriptor.
pub trait Matcher: Send + Sync {
    fn best_match(&self, query: &Descriptor, gallery: &Gallery) -> Result<MatchResult>;
}

/// Euclidean nearest neighbour with a fixed acceptance threshold.
///
/// An identity's distance is the minimum over its reference descriptors.
/// Ties go to the first identity in lexicographic label order.
#[derive(Debug, Clone, Copy)]
pub struct EuclideanMatcher {
    acceptance_threshold: f32,
}

impl EuclideanMatcher {
    pub fn new(acceptance_threshold: f32) -> Result<Self> {
        check_threshold("acceptance_threshold", acceptance_threshold)?;
        Ok(Self {
            acceptance_threshold,
        })
    }

    pub fn acceptance_threshold(&self) -> f32 {
        self.acceptance_threshold
    }
}

impl Matcher for EuclideanMatcher {
    fn best_match(&self, query: &Descriptor, gallery: &Gallery) -> Result<MatchResult> {
        let expected = gallery.dimension().ok_or(Error::EmptyGallery)?;
        if query.dimension() != expected {
            return Err(Error::DimensionMismatch {
                expected,
                actual: query.dimension(),
            });
        }

        let mut best: Option<(&str, f32)> = None;
        for entry in gallery.entries() {
            let mut entry_distance = f32::INFINITY;
            for reference in entry.descriptors() {
                entry_distance = entry_distance.min(query.distance(reference)?);
            }
            // Strict comparison keeps the earliest label on ties.
            let is_better = match best {
                None => true,
                Some((_, d)) => entry_distance < d,
            };
            if is_better {
                best = Some((entry.label(), entry_distance));
            }
        }

        let (label, distance) = best.ok_or(Error::EmptyGallery)?;
        Ok(MatchResult {
            label: label.to_string(),
            distance,
            accepted: distance <= self.acceptance_threshold,
        })
    }
}
