use std::any::Any;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::Utc;
use facematch_config::ResolvedConfig;
use facematch_core::decode;
use facematch_core::faces::{FaceBounds, FaceDetector};
use serde::Serialize;

use crate::cli::{DetectArgs, OutputMode};
use crate::commands::CommandHandler;
use crate::compare::read_payload;
use crate::config;
use crate::errors::{AppError, AppResult};
use crate::output::render_detect;

type ConfigLoader = dyn Fn(Option<&Path>) -> AppResult<ResolvedConfig> + Send + Sync;
type DetectRunner = dyn Fn(&DetectConfig) -> AppResult<DetectOutcome> + Send + Sync;
type DetectRenderer = dyn Fn(&DetectOutcome, OutputMode) -> AppResult<()> + Send + Sync;

#[derive(Debug, Clone)]
pub struct DetectConfig {
    pub image: PathBuf,
    pub encoded: bool,
    pub detection_model: Option<PathBuf>,
    pub output: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct DetectOutcome {
    pub success: bool,
    pub image_path: String,
    pub output_path: String,
    pub image_width: u32,
    pub image_height: u32,
    pub face: FaceBounds,
}

pub fn default_output_path() -> PathBuf {
    let filename = format!("face-{}.jpg", Utc::now().format("%Y%m%dT%H%M%S%.3fZ"));
    PathBuf::from("faces").join(filename)
}

pub fn build_detect_config(args: &DetectArgs, defaults: &ResolvedConfig) -> DetectConfig {
    DetectConfig {
        image: args.image.clone(),
        encoded: args.encoded,
        detection_model: args
            .detection_model
            .clone()
            .or_else(|| defaults.detection_model.clone()),
        output: args.output.clone().unwrap_or_else(default_output_path),
    }
}

pub fn run_detect(config: &DetectConfig) -> AppResult<DetectOutcome> {
    let detector = FaceDetector::shared();
    detector.initialize(config.detection_model.as_deref())?;
    detect_with(&detector, config)
}

pub fn detect_with(detector: &FaceDetector, config: &DetectConfig) -> AppResult<DetectOutcome> {
    let payload = read_payload(&config.image, config.encoded)?;
    let raster = decode::decode(payload.as_str())?;
    let region = detector.detect(&raster)?;
    write_crop(&config.output, region.face.as_rgb())?;

    Ok(DetectOutcome {
        success: true,
        image_path: config.image.display().to_string(),
        output_path: config.output.display().to_string(),
        image_width: raster.width(),
        image_height: raster.height(),
        face: region.bounds,
    })
}

fn write_crop(path: &Path, face: &image::RgbImage) -> AppResult<()> {
    let output_error = |message: String| AppError::OutputWrite {
        path: path.to_path_buf(),
        message,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|err| output_error(err.to_string()))?;
    }
    face.save(path).map_err(|err| output_error(err.to_string()))
}

fn load_resolved(path: Option<&Path>) -> AppResult<ResolvedConfig> {
    Ok(config::load_settings(path)?.resolved)
}

pub struct DetectHandler {
    args: DetectArgs,
    config_path: Option<PathBuf>,
    load_config: Box<ConfigLoader>,
    run_detect: Box<DetectRunner>,
    render: Box<DetectRenderer>,
}

impl DetectHandler {
    pub fn new(args: DetectArgs) -> Self {
        Self::with_dependencies(args, load_resolved, run_detect, render_detect)
    }

    pub fn with_dependencies(
        args: DetectArgs,
        load_config: impl Fn(Option<&Path>) -> AppResult<ResolvedConfig> + Send + Sync + 'static,
        run_detect: impl Fn(&DetectConfig) -> AppResult<DetectOutcome> + Send + Sync + 'static,
        render: impl Fn(&DetectOutcome, OutputMode) -> AppResult<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            args,
            config_path: None,
            load_config: Box::new(load_config),
            run_detect: Box::new(run_detect),
            render: Box::new(render),
        }
    }

    pub fn with_config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }
}

impl CommandHandler for DetectHandler {
    fn execute(&self, mode: OutputMode, _verbose: bool) -> AppResult<ExitCode> {
        let defaults = (self.load_config)(self.config_path.as_deref())?;
        let config = build_detect_config(&self.args, &defaults);
        let outcome = (self.run_detect)(&config)?;
        (self.render)(&outcome, mode)?;
        Ok(ExitCode::SUCCESS)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facematch_core::faces::{Candidate, DetectionPolicy, FaceLocator};
    use image::{GrayImage, ImageFormat, Rgb, RgbImage};
    use std::sync::Arc;
    use tempfile::TempDir;

    struct Fixed;

    impl FaceLocator for Fixed {
        fn locate(&self, _gray: &GrayImage, _policy: &DetectionPolicy) -> Vec<Candidate> {
            vec![Candidate {
                x: 4,
                y: 6,
                width: 12,
                height: 10,
            }]
        }
    }

    #[test]
    fn default_output_lands_under_faces() {
        let path = default_output_path();
        assert!(path.starts_with("faces"));
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("face-") && name.ends_with("Z.jpg"));
    }

    #[test]
    fn cli_model_overrides_config() {
        let args = DetectArgs {
            image: PathBuf::from("in.png"),
            encoded: false,
            detection_model: Some(PathBuf::from("cli.bin")),
            output: Some(PathBuf::from("out.jpg")),
        };
        let mut defaults = ResolvedConfig::default();
        defaults.detection_model = Some(PathBuf::from("config.bin"));
        let config = build_detect_config(&args, &defaults);
        assert_eq!(config.detection_model, Some(PathBuf::from("cli.bin")));
        assert_eq!(config.output, PathBuf::from("out.jpg"));
    }

    #[test]
    fn crop_is_written_to_output() {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("in.png");
        RgbImage::from_pixel(32, 32, Rgb([90, 60, 30]))
            .save_with_format(&input, ImageFormat::Png)
            .unwrap();
        let output = tmp.path().join("nested/crop.jpg");

        let detector = FaceDetector::new();
        detector.initialize_with(Arc::new(Fixed));
        let outcome = detect_with(
            &detector,
            &DetectConfig {
                image: input,
                encoded: false,
                detection_model: None,
                output: output.clone(),
            },
        )
        .unwrap();

        assert_eq!((outcome.face.x, outcome.face.y), (4, 6));
        assert_eq!((outcome.image_width, outcome.image_height), (32, 32));
        let written = image::open(&output).unwrap();
        assert_eq!((written.width(), written.height()), (12, 10));
    }
}
