use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, Mutex};

use facematch_cli::cli::{CompareArgs, OutputMode};
use facematch_cli::commands::CommandHandler;
use facematch_cli::compare::{CompareConfig, CompareHandler};
use facematch_cli::errors::{AppError, ErrorKind};
use facematch_config::ResolvedConfig;
use facematch_core::faces::FaceBounds;
use facematch_core::pipeline::MatchOutcome;

fn args() -> CompareArgs {
    CompareArgs {
        image1: PathBuf::from("left.jpg"),
        image2: PathBuf::from("right.jpg"),
        encoded: false,
        threshold: Some(0.5),
        backend: None,
        model_name: None,
        detection_model: None,
        staging_dir: None,
    }
}

fn outcome(matched: bool, config: &CompareConfig) -> MatchOutcome {
    let face = FaceBounds {
        x: 1,
        y: 2,
        width: 30,
        height: 40,
    };
    MatchOutcome {
        matched,
        distance: if matched { 0.3 } else { 0.9 },
        threshold: config.threshold,
        backend: config.backend.clone(),
        model_name: config.model_name.clone(),
        faces: [face, face],
    }
}

#[test]
fn compare_handler_match_exits_zero_and_renders() {
    let renders = Arc::new(Mutex::new(Vec::new()));
    let handler = CompareHandler::with_dependencies(
        args(),
        |_path| Ok(ResolvedConfig::default()),
        |config| Ok(outcome(true, config)),
        {
            let renders = Arc::clone(&renders);
            move |outcome, mode| {
                renders.lock().unwrap().push((outcome.matched, mode));
                Ok(())
            }
        },
    );

    let code = handler.execute(OutputMode::Json, false).unwrap();
    assert_eq!(code, ExitCode::SUCCESS);
    assert_eq!(*renders.lock().unwrap(), vec![(true, OutputMode::Json)]);
}

#[test]
fn compare_handler_no_match_exits_one() {
    let handler = CompareHandler::with_dependencies(
        args(),
        |_path| Ok(ResolvedConfig::default()),
        |config| Ok(outcome(false, config)),
        |_outcome, _mode| Ok(()),
    );

    let code = handler.execute(OutputMode::Human, false).unwrap();
    assert_eq!(code, ExitCode::from(1));
}

#[test]
fn compare_handler_merges_flags_over_config() {
    let seen = Arc::new(Mutex::new(None));
    let handler = CompareHandler::with_dependencies(
        args(),
        |_path| {
            Ok(ResolvedConfig {
                similarity_threshold: 0.8,
                backend: "mtcnn".into(),
                ..ResolvedConfig::default()
            })
        },
        {
            let seen = Arc::clone(&seen);
            move |config: &CompareConfig| {
                *seen.lock().unwrap() = Some((config.threshold, config.backend.clone()));
                Ok(outcome(true, config))
            }
        },
        |_outcome, _mode| Ok(()),
    );

    handler.execute(OutputMode::Human, false).unwrap();
    let (threshold, backend) = seen.lock().unwrap().clone().unwrap();
    assert!((threshold - 0.5).abs() < f64::EPSILON);
    assert_eq!(backend, "mtcnn");
}

#[test]
fn compare_handler_passes_explicit_config_path() {
    let seen = Arc::new(Mutex::new(None));
    let handler = CompareHandler::with_dependencies(
        args(),
        {
            let seen = Arc::clone(&seen);
            move |path: Option<&Path>| {
                *seen.lock().unwrap() = path.map(Path::to_path_buf);
                Ok(ResolvedConfig::default())
            }
        },
        |config| Ok(outcome(true, config)),
        |_outcome, _mode| Ok(()),
    )
    .with_config_path(Some(PathBuf::from("/srv/facematch.toml")));

    handler.execute(OutputMode::Human, false).unwrap();
    assert_eq!(
        *seen.lock().unwrap(),
        Some(PathBuf::from("/srv/facematch.toml"))
    );
}

#[test]
fn compare_handler_propagates_pipeline_errors_without_rendering() {
    let handler = CompareHandler::with_dependencies(
        args(),
        |_path| Ok(ResolvedConfig::default()),
        |_config| {
            Err(AppError::NoFaceDetected {
                width: 10,
                height: 10,
            })
        },
        |_outcome, _mode| panic!("render should not run"),
    );

    let err = handler.execute(OutputMode::Json, false).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoFaceDetected);
    assert_eq!(err.exit_code(), ExitCode::from(3));
}

#[test]
fn compare_handler_stops_on_config_errors() {
    let handler = CompareHandler::with_dependencies(
        args(),
        |_path| {
            Err(AppError::ConfigParse {
                path: PathBuf::from("/etc/facematch/config.toml"),
                message: "expected a number".into(),
            })
        },
        |_config| panic!("pipeline should not run"),
        |_outcome, _mode| Ok(()),
    );

    let err = handler.execute(OutputMode::Human, false).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
}
