use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "facematch",
    about = "Decide whether two images show the same person",
    version
)]
pub struct Cli {
    /// Emit structured JSON to stdout instead of human-readable output
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase verbosity (may be used multiple times)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Read configuration from this file instead of the system locations
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn output_mode(&self) -> OutputMode {
        OutputMode::from(self.json)
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Compare the faces found in two images
    Compare(CompareArgs),
    /// Locate the face in one image and write the crop
    Detect(DetectArgs),
    /// Check configuration, models, staging directory and verifier
    Doctor,
}

#[derive(Debug, Args, Clone)]
pub struct CompareArgs {
    /// First image file
    pub image1: PathBuf,

    /// Second image file
    pub image2: PathBuf,

    /// Treat the inputs as files holding base64 text (data URLs accepted)
    #[arg(long)]
    pub encoded: bool,

    /// Distance below which the faces are considered a match
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Face detector backend used by the verifier (e.g. retinaface, mtcnn)
    #[arg(long)]
    pub backend: Option<String>,

    /// Recognition model used by the verifier (e.g. ArcFace, Facenet)
    #[arg(long)]
    pub model_name: Option<String>,

    /// SeetaFace detection model (overrides config and FACEMATCH_DETECTION_MODEL)
    #[arg(long)]
    pub detection_model: Option<PathBuf>,

    /// Directory for the short-lived face crops handed to the verifier
    #[arg(long)]
    pub staging_dir: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct DetectArgs {
    /// Image file to scan
    pub image: PathBuf,

    /// Treat the input as a file holding base64 text (data URLs accepted)
    #[arg(long)]
    pub encoded: bool,

    /// SeetaFace detection model (overrides config and FACEMATCH_DETECTION_MODEL)
    #[arg(long)]
    pub detection_model: Option<PathBuf>,

    /// Where to write the face crop (defaults to faces/face-<timestamp>.jpg)
    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

impl From<bool> for OutputMode {
    fn from(json: bool) -> Self {
        if json {
            OutputMode::Json
        } else {
            OutputMode::Human
        }
    }
}
