use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

pub const PRIMARY_CONFIG_PATH: &str = "/etc/facematch/config.toml";
pub const SECONDARY_CONFIG_PATH: &str = "/usr/local/etc/facematch/config.toml";
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.6;
pub const DEFAULT_BACKEND: &str = "retinaface";
pub const DEFAULT_MODEL_NAME: &str = "ArcFace";
pub const DEFAULT_STAGING_DIR: &str = "temp";
pub const DEFAULT_VERIFIER_PROGRAM: &str = "facematch-verify";
pub const DEFAULT_VERIFIER_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ConfigFile {
    pub similarity_threshold: Option<f64>,
    pub backend: Option<String>,
    pub model_name: Option<String>,
    pub detection_model: Option<PathBuf>,
    pub staging_dir: Option<PathBuf>,
    pub verifier_program: Option<String>,
    pub verifier_args: Option<Vec<String>>,
    pub verifier_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub similarity_threshold: f64,
    pub backend: String,
    pub model_name: String,
    pub detection_model: Option<PathBuf>,
    pub staging_dir: PathBuf,
    pub verifier_program: String,
    pub verifier_args: Vec<String>,
    pub verifier_timeout: Duration,
}

impl ResolvedConfig {
    pub fn from_raw(raw: ConfigFile) -> Self {
        Self {
            similarity_threshold: raw
                .similarity_threshold
                .unwrap_or(DEFAULT_SIMILARITY_THRESHOLD),
            backend: raw.backend.unwrap_or_else(|| DEFAULT_BACKEND.to_string()),
            model_name: raw
                .model_name
                .unwrap_or_else(|| DEFAULT_MODEL_NAME.to_string()),
            detection_model: raw.detection_model,
            staging_dir: raw
                .staging_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STAGING_DIR)),
            verifier_program: raw
                .verifier_program
                .unwrap_or_else(|| DEFAULT_VERIFIER_PROGRAM.to_string()),
            verifier_args: raw.verifier_args.unwrap_or_default(),
            verifier_timeout: Duration::from_secs(
                raw.verifier_timeout_secs
                    .unwrap_or(DEFAULT_VERIFIER_TIMEOUT_SECS)
                    .max(1),
            ),
        }
    }
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self::from_raw(ConfigFile::default())
    }
}

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub contents: ConfigFile,
    pub source: PathBuf,
}

impl LoadedConfig {
    pub fn new(contents: ConfigFile, source: PathBuf) -> Self {
        Self { contents, source }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedConfigWithSource {
    pub resolved: ResolvedConfig,
    pub source: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

pub fn default_config_paths() -> Vec<PathBuf> {
    vec![
        PathBuf::from(PRIMARY_CONFIG_PATH),
        PathBuf::from(SECONDARY_CONFIG_PATH),
    ]
}

pub fn load_resolved_config() -> Result<ResolvedConfigWithSource, ConfigError> {
    load_resolved_from_paths(&default_config_paths())
}

pub fn load_from_paths(paths: &[PathBuf]) -> Result<Option<LoadedConfig>, ConfigError> {
    for path in paths {
        match fs::read_to_string(path) {
            Ok(contents) => {
                let parsed =
                    toml::from_str::<ConfigFile>(&contents).map_err(|err| ConfigError::Parse {
                        path: path.clone(),
                        message: err.to_string(),
                    })?;
                return Ok(Some(LoadedConfig::new(parsed, path.clone())));
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
            Err(err) => {
                return Err(ConfigError::Read {
                    path: path.clone(),
                    source: err,
                })
            }
        }
    }

    Ok(None)
}

pub fn load_resolved_from_paths(
    paths: &[PathBuf],
) -> Result<ResolvedConfigWithSource, ConfigError> {
    match load_from_paths(paths)? {
        Some(entry) => {
            let path = entry.source.clone();
            Ok(ResolvedConfigWithSource {
                resolved: ResolvedConfig::from_raw(entry.contents),
                source: Some(path),
            })
        }
        None => Ok(ResolvedConfigWithSource {
            resolved: ResolvedConfig::default(),
            source: None,
        }),
    }
}
