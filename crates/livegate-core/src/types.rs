//! Value types exchanged between the sources, the liveness gate and the matcher.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Number of points in a face-mesh landmark set.
///
/// The liveness heuristics address points by their face-mesh index
/// (1 = nose tip, 33/133 and 362/263 = eye corners).
pub const LANDMARK_COUNT: usize = 468;

/// A single 3-D landmark.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Point3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance to `other`.
    pub fn distance(&self, other: &Point3) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl From<[f32; 3]> for Point3 {
    fn from([x, y, z]: [f32; 3]) -> Self {
        Self { x, y, z }
    }
}

/// Exactly [`LANDMARK_COUNT`] landmarks from one detected face.
///
/// A face that was not found has no `LandmarkSet` at all; sources report it
/// as `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkSet {
    points: Vec<Point3>,
}

impl LandmarkSet {
    pub fn new(points: Vec<Point3>) -> Result<Self> {
        if points.len() != LANDMARK_COUNT {
            return Err(Error::InvalidInput(format!(
                "landmark set has {} points (expected {LANDMARK_COUNT})",
                points.len()
            )));
        }
        Ok(Self { points })
    }

    pub fn points(&self) -> &[Point3] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Point at a face-mesh index, or `None` past [`LANDMARK_COUNT`].
    pub fn get(&self, index: usize) -> Option<&Point3> {
        self.points.get(index)
    }

    /// Point at one of the crate's face-mesh index constants, all of which are
    /// below [`LANDMARK_COUNT`].
    pub(crate) fn point(&self, index: usize) -> &Point3 {
        &self.points[index]
    }
}

impl TryFrom<Vec<Point3>> for LandmarkSet {
    type Error = Error;

    fn try_from(points: Vec<Point3>) -> Result<Self> {
        Self::new(points)
    }
}

/// A face embedding produced by the external embedding model.
#[derive(Debug, Clone, PartialEq)]
pub struct Descriptor {
    values: Vec<f32>,
}

impl Descriptor {
    pub fn new(values: Vec<f32>) -> Result<Self> {
        if values.is_empty() {
            return Err(Error::InvalidInput("descriptor is empty".to_string()));
        }
        if let Some(i) = values.iter().position(|v| !v.is_finite()) {
            return Err(Error::InvalidInput(format!(
                "descriptor component {i} is not finite"
            )));
        }
        Ok(Self { values })
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn dimension(&self) -> usize {
        self.values.len()
    }

    /// Euclidean distance to `other`. Both descriptors must have the same
    /// dimensionality.
    pub fn distance(&self, other: &Descriptor) -> Result<f32> {
        if self.dimension() != other.dimension() {
            return Err(Error::DimensionMismatch {
                expected: other.dimension(),
                actual: self.dimension(),
            });
        }
        let sum: f32 = self
            .values
            .iter()
            .zip(&other.values)
            .map(|(a, b)| (a - b) * (a - b))
            .sum();
        Ok(sum.sqrt())
    }
}

impl TryFrom<Vec<f32>> for Descriptor {
    type Error = Error;

    fn try_from(values: Vec<f32>) -> Result<Self> {
        Self::new(values)
    }
}

/// A captured image as handed to the landmark and embedding sources.
///
/// The core never reads the pixel data; `id` names the capture (usually the
/// file name) for logging and for sources that key on it.
#[derive(Debug, Clone)]
pub struct Frame {
    pub id: String,
    pub width: u32,
    pub height: u32,
    /// Packed RGB8, row-major.
    pub data: Vec<u8>,
}

impl Frame {
    pub fn new(id: impl Into<String>, width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            id: id.into(),
            width,
            height,
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_landmark_set_rejects_wrong_length() {
        let err = LandmarkSet::new(vec![Point3::default(); 68]).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(LandmarkSet::new(vec![Point3::default(); LANDMARK_COUNT]).is_ok());
    }

    #[test]
    fn test_landmark_get_out_of_range_is_none() {
        let mut points = vec![Point3::default(); LANDMARK_COUNT];
        points[LANDMARK_COUNT - 1] = Point3::new(1.0, 2.0, 3.0);
        let lm = LandmarkSet::new(points).unwrap();
        assert_eq!(lm.get(LANDMARK_COUNT - 1), Some(&Point3::new(1.0, 2.0, 3.0)));
        assert_eq!(lm.get(LANDMARK_COUNT), None);
        assert_eq!(lm.get(usize::MAX), None);
    }

    #[test]
    fn test_descriptor_rejects_empty_and_nan() {
        assert!(matches!(
            Descriptor::new(vec![]),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            Descriptor::new(vec![0.0, f32::NAN]),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_descriptor_distance() {
        let a = Descriptor::new(vec![0.0, 0.0]).unwrap();
        let b = Descriptor::new(vec![3.0, 4.0]).unwrap();
        assert!((a.distance(&b).unwrap() - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_descriptor_distance_dimension_mismatch() {
        let a = Descriptor::new(vec![0.0, 0.0]).unwrap();
        let b = Descriptor::new(vec![0.0, 0.0, 0.0]).unwrap();
        assert_eq!(
            a.distance(&b).unwrap_err(),
            Error::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        );
    }

    #[test]
    fn test_point_distance_is_3d() {
        let a = Point3::new(0.0, 0.0, 0.0);
        let b = Point3::new(1.0, 2.0, 2.0);
        assert!((a.distance(&b) - 3.0).abs() < 1e-6);
    }
}
