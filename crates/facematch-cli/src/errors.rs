pub use facematch_core::errors::{AppError, AppResult, ErrorKind};
