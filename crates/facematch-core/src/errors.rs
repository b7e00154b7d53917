use std::fmt;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use image::ImageError;
use serde::Serialize;
use thiserror::Error;

use crate::verify::VerificationFailure;

/// Discriminant shared by every failure the pipeline can surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Decode,
    ModelLoad,
    NotInitialized,
    NoFaceDetected,
    Staging,
    Verification,
    Cleanup,
    InvalidRequest,
    Config,
    Io,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Decode => "decode_error",
            ErrorKind::ModelLoad => "model_load_error",
            ErrorKind::NotInitialized => "not_initialized_error",
            ErrorKind::NoFaceDetected => "no_face_detected_error",
            ErrorKind::Staging => "staging_error",
            ErrorKind::Verification => "verification_error",
            ErrorKind::Cleanup => "cleanup_warning",
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::Config => "config_error",
            ErrorKind::Io => "io_error",
        }
    }

    /// Message safe to hand to remote callers; never includes paths or causes.
    pub fn public_message(&self) -> &'static str {
        match self {
            ErrorKind::Decode => "Failed to convert base64 to image",
            ErrorKind::ModelLoad => "Face detection model could not be loaded",
            ErrorKind::NotInitialized => "Face detection model is not initialized",
            ErrorKind::NoFaceDetected => "No face detected",
            ErrorKind::Staging => "Failed to prepare images for comparison",
            ErrorKind::Verification => "Failed to compare faces",
            ErrorKind::Cleanup => "Failed to remove temporary files",
            ErrorKind::InvalidRequest => "Invalid comparison request",
            ErrorKind::Config => "Invalid configuration",
            ErrorKind::Io => "Failed to read input",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("image payload is empty")]
    EmptyPayload,

    #[error("image payload is not valid base64: {source}")]
    InvalidEncoding {
        #[source]
        source: base64::DecodeError,
    },

    #[error("failed to decode image payload: {source}")]
    ImageDecode {
        #[source]
        source: ImageError,
    },

    #[error("decoded image has zero dimensions ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },

    #[error("failed to load detection model {path}: {message}")]
    ModelLoad { path: PathBuf, message: String },

    #[error("face detector is not initialized; load a detection model first")]
    DetectorNotInitialized,

    #[error("no face detected in {width}x{height} image")]
    NoFaceDetected { width: u32, height: u32 },

    #[error("failed to write staged image {path}: {source}")]
    StageWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to encode staged image {path}: {source}")]
    StageEncode {
        path: PathBuf,
        #[source]
        source: ImageError,
    },

    #[error("face verification failed (backend {backend}): {source}")]
    Verification {
        backend: String,
        #[source]
        source: VerificationFailure,
    },

    #[error("threshold must be a finite number, got {0}")]
    InvalidThreshold(f64),

    #[error("input file not found or unreadable: {path}: {source}")]
    InputRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write output {path}: {message}")]
    OutputWrite { path: PathBuf, message: String },

    #[error("failed to read configuration file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid configuration file {path}: {message}")]
    ConfigParse { path: PathBuf, message: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::EmptyPayload
            | AppError::InvalidEncoding { .. }
            | AppError::ImageDecode { .. }
            | AppError::EmptyImage { .. } => ErrorKind::Decode,
            AppError::ModelLoad { .. } => ErrorKind::ModelLoad,
            AppError::DetectorNotInitialized => ErrorKind::NotInitialized,
            AppError::NoFaceDetected { .. } => ErrorKind::NoFaceDetected,
            AppError::StageWrite { .. } | AppError::StageEncode { .. } => ErrorKind::Staging,
            AppError::Verification { .. } => ErrorKind::Verification,
            AppError::InvalidThreshold(_) => ErrorKind::InvalidRequest,
            AppError::ConfigRead { .. } | AppError::ConfigParse { .. } => ErrorKind::Config,
            AppError::InputRead { .. }
            | AppError::OutputWrite { .. }
            | AppError::Serialization(_)
            | AppError::Io(_) => ErrorKind::Io,
        }
    }

    /// Exit status for command-line callers. `1` is reserved for "no match".
    pub fn exit_code(&self) -> ExitCode {
        match self.kind() {
            ErrorKind::Decode
            | ErrorKind::InvalidRequest
            | ErrorKind::Config
            | ErrorKind::Io
            | ErrorKind::Cleanup => ExitCode::from(2),
            ErrorKind::NoFaceDetected => ExitCode::from(3),
            ErrorKind::ModelLoad | ErrorKind::NotInitialized => ExitCode::from(4),
            ErrorKind::Staging => ExitCode::from(5),
            ErrorKind::Verification => ExitCode::from(6),
        }
    }

    pub fn human_message(&self) -> String {
        self.to_string()
    }

    pub fn public_message(&self) -> &'static str {
        self.kind().public_message()
    }
}

pub type AppResult<T> = Result<T, AppError>;

/// A staged file that could not be removed. Logged, never returned as a failure.
#[derive(Debug, Error)]
#[error("failed to remove staged file {path}: {source}")]
pub struct CleanupWarning {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

impl CleanupWarning {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Cleanup
    }
}
