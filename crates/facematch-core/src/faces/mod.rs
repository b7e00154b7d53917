pub mod detector;
pub mod seeta;

pub use detector::{
    Candidate, DetectionPolicy, EnvModelPathResolver, FaceBounds, FaceDetector, FaceLocator,
    FaceRegion, ModelPathResolver, DEFAULT_DETECTION_MODEL, DETECTION_MODEL_ENV, MIN_FACE_SIZE,
    MIN_NEIGHBORS, SCALE_FACTOR,
};
pub use seeta::SeetaFaceLocator;
