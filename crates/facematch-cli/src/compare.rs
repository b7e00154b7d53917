use std::any::Any;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use facematch_config::ResolvedConfig;
use facematch_core::pipeline::{CompareRequest, FaceMatcher, MatchOutcome, MatcherSettings};
use facematch_core::EncodedImage;
use tracing::info;

use crate::cli::{CompareArgs, OutputMode};
use crate::commands::CommandHandler;
use crate::config;
use crate::errors::{AppError, AppResult};
use crate::output::render_compare;

type ConfigLoader = dyn Fn(Option<&Path>) -> AppResult<ResolvedConfig> + Send + Sync;
type CompareRunner = dyn Fn(&CompareConfig) -> AppResult<MatchOutcome> + Send + Sync;
type CompareRenderer = dyn Fn(&MatchOutcome, OutputMode) -> AppResult<()> + Send + Sync;

#[derive(Debug, Clone)]
pub struct CompareConfig {
    pub image1: PathBuf,
    pub image2: PathBuf,
    pub encoded: bool,
    pub threshold: f64,
    pub backend: String,
    pub model_name: String,
    pub settings: MatcherSettings,
}

pub fn build_compare_config(args: &CompareArgs, defaults: &ResolvedConfig) -> CompareConfig {
    CompareConfig {
        image1: args.image1.clone(),
        image2: args.image2.clone(),
        encoded: args.encoded,
        threshold: args.threshold.unwrap_or(defaults.similarity_threshold),
        backend: args
            .backend
            .clone()
            .unwrap_or_else(|| defaults.backend.clone()),
        model_name: args
            .model_name
            .clone()
            .unwrap_or_else(|| defaults.model_name.clone()),
        settings: MatcherSettings {
            detection_model: args
                .detection_model
                .clone()
                .or_else(|| defaults.detection_model.clone()),
            staging_dir: args
                .staging_dir
                .clone()
                .unwrap_or_else(|| defaults.staging_dir.clone()),
            verifier_program: defaults.verifier_program.clone(),
            verifier_args: defaults.verifier_args.clone(),
            verifier_timeout: defaults.verifier_timeout,
        },
    }
}

/// Read an input file as an image payload: raw image bytes are base64
/// encoded, `encoded` files are taken as the payload text itself.
pub fn read_payload(path: &Path, encoded: bool) -> AppResult<EncodedImage> {
    let read_error = |source| AppError::InputRead {
        path: path.to_path_buf(),
        source,
    };
    if encoded {
        fs::read_to_string(path)
            .map(EncodedImage::new)
            .map_err(read_error)
    } else {
        fs::read(path)
            .map(|bytes| EncodedImage::from_bytes(&bytes))
            .map_err(read_error)
    }
}

pub fn run_compare(config: &CompareConfig) -> AppResult<MatchOutcome> {
    let image1 = read_payload(&config.image1, config.encoded)?;
    let image2 = read_payload(&config.image2, config.encoded)?;
    let matcher = FaceMatcher::from_settings(&config.settings)?;
    let request = CompareRequest::new(image1, image2)
        .threshold(config.threshold)
        .backend(config.backend.clone())
        .model_name(config.model_name.clone());
    matcher.evaluate(&request)
}

fn load_resolved(path: Option<&Path>) -> AppResult<ResolvedConfig> {
    let loaded = config::load_settings(path)?;
    info!(
        target: "compare.defaults",
        "using configuration from {}",
        config::describe_source(loaded.source.as_ref())
    );
    Ok(loaded.resolved)
}

pub struct CompareHandler {
    args: CompareArgs,
    config_path: Option<PathBuf>,
    load_config: Box<ConfigLoader>,
    run_compare: Box<CompareRunner>,
    render: Box<CompareRenderer>,
}

impl CompareHandler {
    pub fn new(args: CompareArgs) -> Self {
        Self::with_dependencies(args, load_resolved, run_compare, render_compare)
    }

    pub fn with_dependencies(
        args: CompareArgs,
        load_config: impl Fn(Option<&Path>) -> AppResult<ResolvedConfig> + Send + Sync + 'static,
        run_compare: impl Fn(&CompareConfig) -> AppResult<MatchOutcome> + Send + Sync + 'static,
        render: impl Fn(&MatchOutcome, OutputMode) -> AppResult<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            args,
            config_path: None,
            load_config: Box::new(load_config),
            run_compare: Box::new(run_compare),
            render: Box::new(render),
        }
    }

    pub fn with_config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }
}

impl CommandHandler for CompareHandler {
    fn execute(&self, mode: OutputMode, _verbose: bool) -> AppResult<ExitCode> {
        let defaults = (self.load_config)(self.config_path.as_deref())?;
        let config = build_compare_config(&self.args, &defaults);
        let outcome = (self.run_compare)(&config)?;
        (self.render)(&outcome, mode)?;
        let exit = if outcome.matched {
            ExitCode::SUCCESS
        } else {
            ExitCode::from(1)
        };
        Ok(exit)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
