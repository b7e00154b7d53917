use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;

use image::GrayImage;
use tracing::debug;

use crate::errors::{AppError, AppResult};
use crate::faces::detector::{Candidate, DetectionPolicy, FaceLocator};

const SCORE_PER_NEIGHBOR: f64 = 0.4;
const SLIDE_WINDOW_STEP: u32 = 4;

/// Locator backed by the SeetaFace funnel-structured cascade (`rustface`).
pub struct SeetaFaceLocator {
    model: rustface::Model,
}

impl SeetaFaceLocator {
    pub fn load(path: &Path) -> AppResult<Self> {
        debug!(path = %path.display(), "loading detection model");
        let metadata = fs::metadata(path).map_err(|err| AppError::ModelLoad {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        if metadata.len() == 0 {
            return Err(AppError::ModelLoad {
                path: path.to_path_buf(),
                message: "model file is empty".into(),
            });
        }

        let file = File::open(path).map_err(|err| AppError::ModelLoad {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        let model =
            rustface::read_model(BufReader::new(file)).map_err(|err| AppError::ModelLoad {
                path: path.to_path_buf(),
                message: err.to_string(),
            })?;
        Ok(Self { model })
    }
}

/// Map the cascade policy onto SeetaFace's knobs: the pyramid shrinks by the
/// inverse of the scale factor, and the neighbour floor becomes a score floor.
fn pyramid_scale(policy: &DetectionPolicy) -> f32 {
    (1.0 / policy.scale_factor) as f32
}

fn score_threshold(policy: &DetectionPolicy) -> f64 {
    f64::from(policy.min_neighbors) * SCORE_PER_NEIGHBOR
}

impl FaceLocator for SeetaFaceLocator {
    fn locate(&self, gray: &GrayImage, policy: &DetectionPolicy) -> Vec<Candidate> {
        let mut detector = rustface::create_detector_with_model(self.model.clone());
        detector.set_min_face_size(policy.min_size);
        detector.set_score_thresh(score_threshold(policy));
        detector.set_pyramid_scale_factor(pyramid_scale(policy));
        detector.set_slide_window_step(SLIDE_WINDOW_STEP, SLIDE_WINDOW_STEP);

        let image = rustface::ImageData::new(gray.as_raw(), gray.width(), gray.height());
        detector
            .detect(&image)
            .iter()
            .map(|face| {
                let bbox = face.bbox();
                Candidate {
                    x: bbox.x() as i64,
                    y: bbox.y() as i64,
                    width: bbox.width() as i64,
                    height: bbox.height() as i64,
                }
            })
            .collect()
    }
}
