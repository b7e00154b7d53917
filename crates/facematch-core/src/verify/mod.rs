pub mod command;

use std::path::Path;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use once_cell::sync::Lazy;
use thiserror::Error;
use tracing::{debug, info};

use crate::errors::{AppError, AppResult};

pub use command::{CommandVerifier, DEFAULT_VERIFIER_PROGRAM, DEFAULT_VERIFIER_TIMEOUT};

/// What went wrong inside the external verification capability.
#[derive(Debug, Error)]
pub enum VerificationFailure {
    #[error("failed to launch verifier {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("verifier exited with {status}: {stderr}")]
    Exited { status: String, stderr: String },

    #[error("verifier did not finish within {0:?}")]
    Timeout(Duration),

    #[error("verifier output could not be parsed: {0}")]
    Output(#[from] serde_json::Error),

    #[error("verifier returned an unusable distance {0}")]
    InvalidDistance(f64),

    #[error("{0}")]
    Backend(String),
}

#[derive(Debug, Clone, Copy)]
pub struct VerificationRequest<'a> {
    pub first: &'a Path,
    pub second: &'a Path,
    pub backend: &'a str,
    pub model_name: &'a str,
}

/// The external face-verification capability. Returns the embedding distance
/// between the two images; lower is more similar.
pub trait Verifier: Send + Sync {
    fn distance(&self, request: &VerificationRequest<'_>) -> Result<f64, VerificationFailure>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VerificationOutcome {
    pub distance: f64,
}

impl VerificationOutcome {
    /// Strict comparison: a distance equal to the threshold is not a match.
    pub fn matches(&self, threshold: f64) -> bool {
        self.distance < threshold
    }
}

/// One verification at a time per process, across every gate.
static VERIFICATION_TURN: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

/// Serializes every call into the wrapped verifier. The turn is held
/// process-wide, so independently built gates never overlap either.
pub struct VerificationGate {
    verifier: Box<dyn Verifier>,
}

impl VerificationGate {
    pub fn new(verifier: impl Verifier + 'static) -> Self {
        Self::from_boxed(Box::new(verifier))
    }

    pub fn from_boxed(verifier: Box<dyn Verifier>) -> Self {
        Self { verifier }
    }

    pub fn verify(
        &self,
        first: &Path,
        second: &Path,
        backend: &str,
        model_name: &str,
    ) -> AppResult<VerificationOutcome> {
        let request = VerificationRequest {
            first,
            second,
            backend,
            model_name,
        };

        // A verifier that panicked leaves nothing behind worth protecting.
        let _turn = VERIFICATION_TURN
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        debug!(backend, model = model_name, "verifier acquired");
        let distance = self
            .verifier
            .distance(&request)
            .and_then(|distance| {
                if distance.is_finite() && distance >= 0.0 {
                    Ok(distance)
                } else {
                    Err(VerificationFailure::InvalidDistance(distance))
                }
            })
            .map_err(|source| AppError::Verification {
                backend: backend.to_string(),
                source,
            })?;
        info!(backend, model = model_name, distance, "face verification finished");
        Ok(VerificationOutcome { distance })
    }
}
