use std::io;
use std::path::{Path, PathBuf};

use facematch_config::{self, ConfigError, ResolvedConfigWithSource};

use crate::errors::{AppError, AppResult};

/// Load configuration from `explicit` when given (it must exist), otherwise
/// from the first system location that exists, falling back to defaults.
pub fn load_settings(explicit: Option<&Path>) -> AppResult<ResolvedConfigWithSource> {
    match explicit {
        Some(path) => load_explicit(path),
        None => facematch_config::load_resolved_config().map_err(config_error),
    }
}

fn load_explicit(path: &Path) -> AppResult<ResolvedConfigWithSource> {
    let paths = [path.to_path_buf()];
    let resolved = facematch_config::load_resolved_from_paths(&paths).map_err(config_error)?;
    if resolved.source.is_none() {
        return Err(AppError::ConfigRead {
            path: path.to_path_buf(),
            source: io::Error::new(io::ErrorKind::NotFound, "configuration file not found"),
        });
    }
    Ok(resolved)
}

pub fn config_error(err: ConfigError) -> AppError {
    match err {
        ConfigError::Read { path, source } => AppError::ConfigRead { path, source },
        ConfigError::Parse { path, message } => AppError::ConfigParse { path, message },
    }
}

pub fn describe_source(source: Option<&PathBuf>) -> String {
    source
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "built-in defaults".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn explicit_file_is_loaded() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(&path, "similarity_threshold = 0.35\nbackend = \"mtcnn\"\n").unwrap();

        let loaded = load_settings(Some(&path)).unwrap();
        assert_eq!(loaded.source.as_deref(), Some(path.as_path()));
        assert!((loaded.resolved.similarity_threshold - 0.35).abs() < f64::EPSILON);
        assert_eq!(loaded.resolved.backend, "mtcnn");
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("absent.toml");
        let err = load_settings(Some(&path)).unwrap_err();
        match err {
            AppError::ConfigRead { path: reported, .. } => assert_eq!(reported, path),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn parse_failure_keeps_the_path() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(&path, "similarity_threshold = \"high\"").unwrap();
        let err = load_settings(Some(&path)).unwrap_err();
        assert!(matches!(err, AppError::ConfigParse { .. }));
        assert_eq!(err.exit_code(), std::process::ExitCode::from(2));
    }

    #[test]
    fn defaults_are_described() {
        assert_eq!(describe_source(None), "built-in defaults");
    }
}
