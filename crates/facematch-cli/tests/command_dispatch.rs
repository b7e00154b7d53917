use std::path::PathBuf;

use facematch_cli::cli::{CompareArgs, Commands, DetectArgs};
use facematch_cli::commands::{handler_for, CommandHandler, DoctorHandler};
use facematch_cli::compare::CompareHandler;
use facematch_cli::detect::DetectHandler;

fn sample_compare_args() -> CompareArgs {
    CompareArgs {
        image1: PathBuf::from("a.jpg"),
        image2: PathBuf::from("b.jpg"),
        encoded: false,
        threshold: None,
        backend: None,
        model_name: None,
        detection_model: None,
        staging_dir: None,
    }
}

fn sample_detect_args() -> DetectArgs {
    DetectArgs {
        image: PathBuf::from("face.png"),
        encoded: false,
        detection_model: None,
        output: None,
    }
}

fn assert_dispatch<T: 'static>(command: Commands)
where
    T: CommandHandler,
{
    let handler: Box<dyn CommandHandler> = command.into();
    assert!(handler.as_any().is::<T>());
}

#[test]
fn compare_command_dispatches_compare_handler() {
    assert_dispatch::<CompareHandler>(Commands::Compare(sample_compare_args()));
}

#[test]
fn detect_command_dispatches_detect_handler() {
    assert_dispatch::<DetectHandler>(Commands::Detect(sample_detect_args()));
}

#[test]
fn doctor_command_dispatches_doctor_handler() {
    assert_dispatch::<DoctorHandler>(Commands::Doctor);
}

#[test]
fn explicit_config_keeps_the_same_handler() {
    let handler = handler_for(
        Commands::Compare(sample_compare_args()),
        Some(PathBuf::from("/tmp/facematch.toml")),
    );
    assert!(handler.as_any().is::<CompareHandler>());
}
