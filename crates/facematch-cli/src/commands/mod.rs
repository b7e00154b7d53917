use std::any::Any;
use std::path::PathBuf;
use std::process::ExitCode;

use crate::cli::{Commands, OutputMode};
use crate::compare::CompareHandler;
use crate::detect::DetectHandler;
use crate::errors::AppResult;

pub trait CommandHandler: Send + Sync {
    fn execute(&self, mode: OutputMode, verbose: bool) -> AppResult<ExitCode>;
    fn as_any(&self) -> &dyn Any;
}

mod doctor;

pub use doctor::DoctorHandler;

/// Build the handler for `command`, reading configuration from `config`
/// when given instead of the system locations.
pub fn handler_for(command: Commands, config: Option<PathBuf>) -> Box<dyn CommandHandler> {
    match command {
        Commands::Compare(args) => Box::new(CompareHandler::new(args).with_config_path(config)),
        Commands::Detect(args) => Box::new(DetectHandler::new(args).with_config_path(config)),
        Commands::Doctor => Box::new(DoctorHandler::new().with_config_path(config)),
    }
}

impl From<Commands> for Box<dyn CommandHandler> {
    fn from(command: Commands) -> Self {
        handler_for(command, None)
    }
}
