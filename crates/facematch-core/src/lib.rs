//! Face-match pipeline: two base64 images in, one match decision out.

pub mod decode;
pub mod errors;
pub mod faces;
pub mod pipeline;
pub mod staging;
pub mod verify;

pub use decode::{EncodedImage, RasterImage};
pub use errors::{AppError, AppResult, CleanupWarning, ErrorKind};
pub use pipeline::{
    CompareRequest, FaceMatcher, MatchOutcome, MatcherSettings, DEFAULT_BACKEND,
    DEFAULT_MODEL_NAME, DEFAULT_THRESHOLD,
};
