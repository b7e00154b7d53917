use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::{imageops, GrayImage};
use once_cell::sync::{Lazy, OnceCell};
use serde::Serialize;
use tracing::debug;

use crate::decode::RasterImage;
use crate::errors::{AppError, AppResult};
use crate::faces::seeta::SeetaFaceLocator;

pub const DETECTION_MODEL_ENV: &str = "FACEMATCH_DETECTION_MODEL";
pub const DEFAULT_DETECTION_MODEL: &str = "models/seeta_fd_frontal_v1.0.bin";

pub const SCALE_FACTOR: f64 = 1.1;
pub const MIN_NEIGHBORS: u32 = 5;
pub const MIN_FACE_SIZE: u32 = 30;

/// Sensitivity of the multi-scale scan. Fixed policy, not a caller tunable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionPolicy {
    pub scale_factor: f64,
    pub min_neighbors: u32,
    pub min_size: u32,
}

impl DetectionPolicy {
    pub const STANDARD: DetectionPolicy = DetectionPolicy {
        scale_factor: SCALE_FACTOR,
        min_neighbors: MIN_NEIGHBORS,
        min_size: MIN_FACE_SIZE,
    };
}

/// Candidate box as reported by a locator, in source pixel coordinates.
/// May extend past the image edges.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FaceBounds {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl FaceBounds {
    /// Intersection of `candidate` with a `width` x `height` image, if non-empty.
    pub fn clip(candidate: &Candidate, width: u32, height: u32) -> Option<Self> {
        let left = candidate.x.max(0);
        let top = candidate.y.max(0);
        let right = (candidate.x + candidate.width).min(i64::from(width));
        let bottom = (candidate.y + candidate.height).min(i64::from(height));
        if right <= left || bottom <= top {
            return None;
        }
        Some(Self {
            x: left as u32,
            y: top as u32,
            width: (right - left) as u32,
            height: (bottom - top) as u32,
        })
    }
}

#[derive(Debug, Clone)]
pub struct FaceRegion {
    pub bounds: FaceBounds,
    pub face: RasterImage,
}

/// Pluggable cascade backend. Implementations must be deterministic for a
/// given image and report candidates in their own scan order.
pub trait FaceLocator: Send + Sync {
    fn locate(&self, gray: &GrayImage, policy: &DetectionPolicy) -> Vec<Candidate>;
}

pub trait ModelPathResolver {
    fn resolve(&self, explicit: Option<&Path>) -> PathBuf;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EnvModelPathResolver;

impl ModelPathResolver for EnvModelPathResolver {
    fn resolve(&self, explicit: Option<&Path>) -> PathBuf {
        explicit
            .map(Path::to_path_buf)
            .or_else(|| env::var(DETECTION_MODEL_ENV).ok().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DETECTION_MODEL))
    }
}

static SHARED: Lazy<Arc<FaceDetector>> = Lazy::new(|| Arc::new(FaceDetector::new()));

/// Face detector holding a load-once, read-only detection model.
pub struct FaceDetector {
    model: OnceCell<Arc<dyn FaceLocator>>,
    policy: DetectionPolicy,
}

impl FaceDetector {
    pub const fn new() -> Self {
        Self {
            model: OnceCell::new(),
            policy: DetectionPolicy::STANDARD,
        }
    }

    /// The process-wide detector.
    pub fn shared() -> Arc<FaceDetector> {
        Arc::clone(&SHARED)
    }

    pub fn policy(&self) -> &DetectionPolicy {
        &self.policy
    }

    pub fn is_initialized(&self) -> bool {
        self.model.get().is_some()
    }

    /// Load the SeetaFace model on first use. Later calls are no-ops, whatever
    /// path they name.
    pub fn initialize(&self, model_path: Option<&Path>) -> AppResult<()> {
        self.initialize_with_resolver(model_path, &EnvModelPathResolver)
    }

    pub fn initialize_with_resolver<R: ModelPathResolver>(
        &self,
        model_path: Option<&Path>,
        resolver: &R,
    ) -> AppResult<()> {
        if self.is_initialized() {
            debug!("detection model already loaded");
            return Ok(());
        }
        self.model.get_or_try_init(|| {
            let path = resolver.resolve(model_path);
            let locator = SeetaFaceLocator::load(&path)?;
            Ok::<_, AppError>(Arc::new(locator) as Arc<dyn FaceLocator>)
        })?;
        Ok(())
    }

    /// Install an already-built locator. Returns `false` when a model was
    /// loaded earlier, in which case `locator` is dropped.
    pub fn initialize_with(&self, locator: Arc<dyn FaceLocator>) -> bool {
        self.model.set(locator).is_ok()
    }

    pub fn detect(&self, image: &RasterImage) -> AppResult<FaceRegion> {
        let locator = self.model.get().ok_or(AppError::DetectorNotInitialized)?;

        let rgb = image.as_rgb();
        let gray = imageops::grayscale(rgb);
        let candidates = locator.locate(&gray, &self.policy);
        debug!(candidates = candidates.len(), "face scan finished");

        let bounds = candidates
            .iter()
            .find_map(|candidate| FaceBounds::clip(candidate, rgb.width(), rgb.height()))
            .ok_or(AppError::NoFaceDetected {
                width: rgb.width(),
                height: rgb.height(),
            })?;

        let face = imageops::crop_imm(rgb, bounds.x, bounds.y, bounds.width, bounds.height)
            .to_image();
        debug!(
            x = bounds.x,
            y = bounds.y,
            w = bounds.width,
            h = bounds.height,
            "selected face region"
        );
        Ok(FaceRegion {
            bounds,
            face: RasterImage::from_rgb(face)?,
        })
    }
}

impl Default for FaceDetector {
    fn default() -> Self {
        Self::new()
    }
}
