//! Single-frame liveness gate via facial landmark geometry.
//!
//! A printed photo held up to the camera is usually either caught mid-blink,
//! shot from an angle, or tilted to avoid glare. This module checks two
//! signals on the face-mesh landmarks of one captured frame:
//!
//! - **Eye openness**: the eye aspect ratio (EAR) of each eye, i.e. eyelid
//!   separation relative to eye width. Both numerator and denominator scale
//!   with distance from the camera, so the ratio is dimensionless.
//! - **Orientation**: the horizontal offset of the nose tip from the midpoint
//!   of the outer eye corners, relative to inter-eye distance. Strong profile
//!   or tilted poses are rejected.
//!
//! The verdict is a hard AND of both signals; there is no scoring.
//!
//! # Threat Coverage
//!
//! - **Blocks:** photos with closed or half-closed eyes, photos held at an
//!   angle, non-frontal captures where embedding quality degrades.
//! - **Does not block:** a frontal photo with open eyes, video replay, masks.

use serde::Serialize;

use crate::config::LivenessConfig;
use crate::error::{Error, Result};
use crate::types::{LandmarkSet, Point3};

/// Face-mesh indices for the left eye as `[p0, p1, p2, p3, p4, p5]`:
/// p0/p3 are the horizontal corners, p1-p5 and p2-p4 the vertical chords.
pub const LEFT_EYE: [usize; 6] = [33, 160, 158, 133, 153, 144];
/// Face-mesh indices for the right eye, same layout as [`LEFT_EYE`].
pub const RIGHT_EYE: [usize; 6] = [362, 385, 387, 263, 373, 380];

pub const NOSE_TIP: usize = 1;
pub const LEFT_EYE_OUTER: usize = 33;
pub const RIGHT_EYE_OUTER: usize = 263;

/// Result of a single-frame liveness check.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LivenessVerdict {
    /// Both eyes open and the face is frontal.
    pub is_live: bool,
    /// Eye aspect ratio of the left eye.
    pub left_eye_openness: f32,
    /// Eye aspect ratio of the right eye.
    pub right_eye_openness: f32,
    pub is_frontal: bool,
    /// Horizontal distance between the nose tip and the eye-corner midpoint.
    pub nose_offset: f32,
    /// Distance between the outer eye corners.
    pub inter_eye_distance: f32,
}

/// Eye aspect ratio: `(|p1-p5| + |p2-p4|) / (2 * |p0-p3|)`.
///
/// Returns `InvalidInput` when the eye has no width or a point is not finite.
pub fn eye_aspect_ratio(landmarks: &LandmarkSet, eye: &[usize; 6]) -> Result<f32> {
    let p: [&Point3; 6] = eye.map(|i| landmarks.point(i));
    if let Some(bad) = eye.iter().zip(p).find(|(_, pt)| !pt.is_finite()) {
        return Err(Error::InvalidInput(format!(
            "landmark {} is not finite",
            bad.0
        )));
    }

    let vertical1 = p[1].distance(p[5]);
    let vertical2 = p[2].distance(p[4]);
    let horizontal = p[0].distance(p[3]);
    if horizontal <= f32::EPSILON {
        return Err(Error::InvalidInput(format!(
            "eye corners {} and {} coincide",
            eye[0], eye[3]
        )));
    }

    Ok((vertical1 + vertical2) / (2.0 * horizontal))
}

/// Evaluates captured landmark sets against fixed geometric thresholds.
#[derive(Debug, Clone, Copy, Default)]
pub struct LivenessEvaluator {
    config: LivenessConfig,
}

impl LivenessEvaluator {
    pub fn new(config: LivenessConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LivenessConfig {
        &self.config
    }

    /// Compute eye openness and orientation and combine them into a verdict.
    ///
    /// The landmark count is guaranteed by [`LandmarkSet`]; degenerate
    /// geometry (coincident eye corners, non-finite points) is `InvalidInput`.
    pub fn evaluate(&self, landmarks: &LandmarkSet) -> Result<LivenessVerdict> {
        let left_ear = eye_aspect_ratio(landmarks, &LEFT_EYE)?;
        let right_ear = eye_aspect_ratio(landmarks, &RIGHT_EYE)?;

        let threshold = self.config.eye_openness_threshold;
        let eyes_open = left_ear > threshold && right_ear > threshold;

        let nose = landmarks.point(NOSE_TIP);
        let left = landmarks.point(LEFT_EYE_OUTER);
        let right = landmarks.point(RIGHT_EYE_OUTER);
        if !nose.is_finite() {
            return Err(Error::InvalidInput("nose tip is not finite".to_string()));
        }

        let inter_eye_distance = left.distance(right);
        if inter_eye_distance <= f32::EPSILON {
            return Err(Error::InvalidInput(
                "outer eye corners coincide".to_string(),
            ));
        }
        let nose_offset = (nose.x - (left.x + right.x) / 2.0).abs();
        let is_frontal = nose_offset < self.config.frontal_offset_ratio * inter_eye_distance;

        let verdict = LivenessVerdict {
            is_live: eyes_open && is_frontal,
            left_eye_openness: left_ear,
            right_eye_openness: right_ear,
            is_frontal,
            nose_offset,
            inter_eye_distance,
        };

        tracing::debug!(
            is_live = verdict.is_live,
            left_ear,
            right_ear,
            nose_offset,
            inter_eye_distance,
            "liveness evaluated"
        );

        Ok(verdict)
    }
}
