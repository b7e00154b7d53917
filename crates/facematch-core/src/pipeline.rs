use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, info_span};
use uuid::Uuid;

use crate::decode::{self, EncodedImage};
use crate::errors::{AppError, AppResult};
use crate::faces::{FaceBounds, FaceDetector};
use crate::staging::{Stager, DEFAULT_STAGING_DIR};
use crate::verify::{
    CommandVerifier, VerificationGate, DEFAULT_VERIFIER_PROGRAM, DEFAULT_VERIFIER_TIMEOUT,
};

pub const DEFAULT_THRESHOLD: f64 = 0.6;
pub const DEFAULT_BACKEND: &str = "retinaface";
pub const DEFAULT_MODEL_NAME: &str = "ArcFace";

#[derive(Debug, Clone)]
pub struct CompareRequest {
    pub image1: EncodedImage,
    pub image2: EncodedImage,
    pub threshold: f64,
    pub backend: String,
    pub model_name: String,
}

impl CompareRequest {
    pub fn new(image1: impl Into<EncodedImage>, image2: impl Into<EncodedImage>) -> Self {
        Self {
            image1: image1.into(),
            image2: image2.into(),
            threshold: DEFAULT_THRESHOLD,
            backend: DEFAULT_BACKEND.to_string(),
            model_name: DEFAULT_MODEL_NAME.to_string(),
        }
    }

    pub fn threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn backend(mut self, backend: impl Into<String>) -> Self {
        self.backend = backend.into();
        self
    }

    pub fn model_name(mut self, model_name: impl Into<String>) -> Self {
        self.model_name = model_name.into();
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchOutcome {
    pub matched: bool,
    pub distance: f64,
    pub threshold: f64,
    pub backend: String,
    pub model_name: String,
    pub faces: [FaceBounds; 2],
}

/// Everything needed to build a [`FaceMatcher`] wired to the SeetaFace
/// detector and the command verifier.
#[derive(Debug, Clone)]
pub struct MatcherSettings {
    pub detection_model: Option<PathBuf>,
    pub staging_dir: PathBuf,
    pub verifier_program: String,
    pub verifier_args: Vec<String>,
    pub verifier_timeout: Duration,
}

impl Default for MatcherSettings {
    fn default() -> Self {
        Self {
            detection_model: None,
            staging_dir: PathBuf::from(DEFAULT_STAGING_DIR),
            verifier_program: DEFAULT_VERIFIER_PROGRAM.to_string(),
            verifier_args: Vec::new(),
            verifier_timeout: DEFAULT_VERIFIER_TIMEOUT,
        }
    }
}

/// Decode → detect → stage → verify → clean up, for two encoded images.
///
/// Clones share the detector and the verification gate. Verifications stay
/// strictly sequential across every matcher in the process.
#[derive(Clone)]
pub struct FaceMatcher {
    detector: Arc<FaceDetector>,
    stager: Stager,
    gate: Arc<VerificationGate>,
}

impl FaceMatcher {
    pub fn new(detector: Arc<FaceDetector>, stager: Stager, gate: Arc<VerificationGate>) -> Self {
        Self {
            detector,
            stager,
            gate,
        }
    }

    /// Build a matcher on the process-wide detector, loading its model if
    /// this is the first use.
    pub fn from_settings(settings: &MatcherSettings) -> AppResult<Self> {
        let detector = FaceDetector::shared();
        detector.initialize(settings.detection_model.as_deref())?;
        let verifier = CommandVerifier::new(settings.verifier_program.clone())
            .with_args(settings.verifier_args.iter().cloned())
            .with_timeout(settings.verifier_timeout);
        Ok(Self::new(
            detector,
            Stager::new(settings.staging_dir.clone()),
            Arc::new(VerificationGate::new(verifier)),
        ))
    }

    pub fn compare(
        &self,
        image1: &str,
        image2: &str,
        threshold: f64,
        backend: &str,
    ) -> AppResult<bool> {
        let request = CompareRequest::new(image1, image2)
            .threshold(threshold)
            .backend(backend);
        self.evaluate(&request).map(|outcome| outcome.matched)
    }

    pub fn evaluate(&self, request: &CompareRequest) -> AppResult<MatchOutcome> {
        if !request.threshold.is_finite() {
            return Err(AppError::InvalidThreshold(request.threshold));
        }

        let call_id = Uuid::new_v4();
        let span = info_span!("compare", %call_id, backend = %request.backend);
        let _entered = span.enter();

        debug!(stage = "decoding");
        let raster1 = decode::decode(request.image1.as_str())?;
        let raster2 = decode::decode(request.image2.as_str())?;

        debug!(stage = "detecting");
        let face1 = self.detector.detect(&raster1)?;
        let face2 = self.detector.detect(&raster2)?;

        debug!(stage = "staging");
        let staged1 = self.stager.stage(&face1.face)?;
        let staged2 = self.stager.stage(&face2.face)?;

        debug!(stage = "verifying");
        let verified = self.gate.verify(
            staged1.path(),
            staged2.path(),
            &request.backend,
            &request.model_name,
        );

        debug!(stage = "cleanup");
        // Warnings were already logged by the release itself.
        let _ = staged1.release();
        let _ = staged2.release();

        let outcome = verified?;
        let matched = outcome.matches(request.threshold);
        info!(
            matched,
            distance = outcome.distance,
            threshold = request.threshold,
            "face comparison finished"
        );
        Ok(MatchOutcome {
            matched,
            distance: outcome.distance,
            threshold: request.threshold,
            backend: request.backend.clone(),
            model_name: request.model_name.clone(),
            faces: [face1.bounds, face2.bounds],
        })
    }
}
