//! Face model backed by precomputed sidecar files.
//!
//! Next to every image `photo.jpg` sits `photo.json` with whatever an
//! external detector produced for it:
//!
//! ```json
//! { "landmarks": [[x, y, z], ...], "descriptor": [0.12, -0.03, ...] }
//! ```
//!
//! A missing key means the detector found no face.

use std::path::{Path, PathBuf};

use livegate_core::{Descriptor, FaceModel, Frame, LandmarkSet, Point3, SourceError};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
struct Sidecar {
    #[serde(default)]
    landmarks: Option<Vec<[f32; 3]>>,
    #[serde(default)]
    descriptor: Option<Vec<f32>>,
}

/// Reads the sidecar for a frame whose id is the image path.
pub struct FixtureModel;

impl FixtureModel {
    pub fn sidecar_path(image: &Path) -> PathBuf {
        image.with_extension("json")
    }

    fn load(frame: &Frame) -> Result<Sidecar, SourceError> {
        let path = Self::sidecar_path(Path::new(&frame.id));
        let text = std::fs::read_to_string(&path).map_err(|e| {
            SourceError::Model(format!("failed to read {}: {e}", path.display()))
        })?;
        serde_json::from_str(&text)
            .map_err(|e| SourceError::Model(format!("failed to parse {}: {e}", path.display())))
    }
}

impl FaceModel for FixtureModel {
    fn landmarks(&mut self, frame: &Frame) -> Result<Option<LandmarkSet>, SourceError> {
        let Some(points) = Self::load(frame)?.landmarks else {
            return Ok(None);
        };
        let points = points.into_iter().map(Point3::from).collect();
        LandmarkSet::new(points)
            .map(Some)
            .map_err(|e| SourceError::Model(format!("{}: {e}", frame.id)))
    }

    fn embedding(&mut self, frame: &Frame) -> Result<Option<Descriptor>, SourceError> {
        let Some(values) = Self::load(frame)?.descriptor else {
            return Ok(None);
        };
        Descriptor::new(values)
            .map(Some)
            .map_err(|e| SourceError::Model(format!("{}: {e}", frame.id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use livegate_core::LANDMARK_COUNT;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "livegate-fixture-{tag}-{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn frame_for(path: &Path) -> Frame {
        Frame::new(path.to_string_lossy(), 1, 1, vec![0, 0, 0])
    }

    #[test]
    fn test_reads_landmarks_and_descriptor() {
        let dir = temp_dir("full");
        let image = dir.join("alice.jpg");
        let landmarks = vec![[0.0f32, 1.0, 2.0]; LANDMARK_COUNT];
        let body = serde_json::json!({ "landmarks": landmarks, "descriptor": [0.5, -0.5] });
        std::fs::write(FixtureModel::sidecar_path(&image), body.to_string()).unwrap();

        let mut model = FixtureModel;
        let frame = frame_for(&image);
        let lm = model.landmarks(&frame).unwrap().unwrap();
        assert_eq!(lm.get(10), Some(&Point3::new(0.0, 1.0, 2.0)));
        let d = model.embedding(&frame).unwrap().unwrap();
        assert_eq!(d.values(), [0.5f32, -0.5].as_slice());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_missing_keys_mean_no_face() {
        let dir = temp_dir("empty");
        let image = dir.join("blank.png");
        std::fs::write(FixtureModel::sidecar_path(&image), "{}").unwrap();

        let mut model = FixtureModel;
        let frame = frame_for(&image);
        assert!(model.landmarks(&frame).unwrap().is_none());
        assert!(model.embedding(&frame).unwrap().is_none());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_bad_sidecars_are_model_errors() {
        let dir = temp_dir("bad");
        let short = dir.join("short.jpg");
        std::fs::write(
            FixtureModel::sidecar_path(&short),
            r#"{"landmarks": [[0, 0, 0]], "descriptor": []}"#,
        )
        .unwrap();

        let mut model = FixtureModel;
        assert!(matches!(
            model.landmarks(&frame_for(&short)),
            Err(SourceError::Model(_))
        ));
        assert!(matches!(
            model.embedding(&frame_for(&short)),
            Err(SourceError::Model(_))
        ));
        assert!(matches!(
            model.embedding(&frame_for(&dir.join("absent.jpg"))),
            Err(SourceError::Model(_))
        ));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
