use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default eye aspect ratio above which an eye counts as open.
pub const DEFAULT_EYE_OPENNESS_THRESHOLD: f32 = 0.2;

/// Default maximum nose offset, as a fraction of inter-eye distance, for a
/// face to count as frontal.
pub const DEFAULT_FRONTAL_OFFSET_RATIO: f32 = 0.2;

/// Thresholds for the landmark-geometry liveness gate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LivenessConfig {
    #[serde(default = "default_eye_openness_threshold")]
    pub eye_openness_threshold: f32,
    #[serde(default = "default_frontal_offset_ratio")]
    pub frontal_offset_ratio: f32,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            eye_openness_threshold: DEFAULT_EYE_OPENNESS_THRESHOLD,
            frontal_offset_ratio: DEFAULT_FRONTAL_OFFSET_RATIO,
        }
    }
}

fn default_eye_openness_threshold() -> f32 {
    DEFAULT_EYE_OPENNESS_THRESHOLD
}

fn default_frontal_offset_ratio() -> f32 {
    DEFAULT_FRONTAL_OFFSET_RATIO
}

/// Everything the verification pipeline needs to decide a verdict.
///
/// There is deliberately no `Default`: the acceptance threshold depends on
/// the distance scale of the embedding model in use and must be supplied.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VerifierConfig {
    #[serde(flatten)]
    pub liveness: LivenessConfig,
    /// Maximum Euclidean distance at which a query matches a gallery entry.
    pub acceptance_threshold: f32,
}

impl VerifierConfig {
    pub fn new(acceptance_threshold: f32) -> Self {
        Self {
            liveness: LivenessConfig::default(),
            acceptance_threshold,
        }
    }

    pub fn with_liveness(mut self, liveness: LivenessConfig) -> Self {
        self.liveness = liveness;
        self
    }

    pub fn validate(&self) -> Result<()> {
        check_threshold("acceptance_threshold", self.acceptance_threshold)?;
        check_threshold(
            "eye_openness_threshold",
            self.liveness.eye_openness_threshold,
        )?;
        check_threshold("frontal_offset_ratio", self.liveness.frontal_offset_ratio)
    }
}

pub(crate) fn check_threshold(name: &str, value: f32) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(Error::InvalidInput(format!(
            "{name} must be a finite non-negative number, got {value}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_liveness_defaults() {
        let cfg = LivenessConfig::default();
        assert_eq!(cfg.eye_openness_threshold, 0.2);
        assert_eq!(cfg.frontal_offset_ratio, 0.2);
    }

    #[test]
    fn test_validate_rejects_negative_and_nan() {
        assert!(VerifierConfig::new(-1.0).validate().is_err());
        assert!(VerifierConfig::new(f32::NAN).validate().is_err());
        assert!(VerifierConfig::new(0.6).validate().is_ok());
    }

    #[test]
    fn test_deserialize_requires_acceptance_threshold() {
        let err = serde_json::from_str::<VerifierConfig>(r#"{"eye_openness_threshold": 0.3}"#);
        assert!(err.is_err());

        let cfg: VerifierConfig =
            serde_json::from_str(r#"{"acceptance_threshold": 0.6}"#).unwrap();
        assert_eq!(cfg.acceptance_threshold, 0.6);
        assert_eq!(cfg.liveness, LivenessConfig::default());
    }
}
