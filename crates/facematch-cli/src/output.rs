use std::error::Error;
use std::io::{self, Write};

use facematch_core::pipeline::MatchOutcome;
use serde::Serialize;
use serde_json::json;

use crate::cli::OutputMode;
use crate::detect::DetectOutcome;
use crate::doctor::{CheckStatus, DoctorOutcome};
use crate::errors::{AppError, AppResult};

fn write_json<T: Serialize>(value: &T) -> AppResult<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    let payload = serde_json::to_string(value)?;
    handle.write_all(payload.as_bytes())?;
    handle.write_all(b"\n")?;
    Ok(())
}

pub fn render_compare(outcome: &MatchOutcome, mode: OutputMode) -> AppResult<()> {
    match mode {
        OutputMode::Human => {
            let verdict = if outcome.matched { "match" } else { "no match" };
            println!(
                "{verdict}: distance {:.4} (threshold {}, backend {}, model {})",
                outcome.distance, outcome.threshold, outcome.backend, outcome.model_name
            );
        }
        OutputMode::Json => write_json(outcome)?,
    }
    Ok(())
}

pub fn render_detect(outcome: &DetectOutcome, mode: OutputMode) -> AppResult<()> {
    match mode {
        OutputMode::Human => {
            let face = &outcome.face;
            println!(
                "Face found at x={} y={} ({}x{}) in {}; crop written to {}",
                face.x, face.y, face.width, face.height, outcome.image_path, outcome.output_path
            );
        }
        OutputMode::Json => write_json(outcome)?,
    }
    Ok(())
}

pub fn render_doctor(outcome: &DoctorOutcome, mode: OutputMode) -> AppResult<()> {
    match mode {
        OutputMode::Human => {
            for check in &outcome.checks {
                let label = match check.status {
                    CheckStatus::Pass => "PASS",
                    CheckStatus::Warn => "WARN",
                    CheckStatus::Fail => "FAIL",
                };
                println!("[{label}] {}: {}", check.name, check.message);
            }
            if outcome.ok {
                println!("All checks passed");
            } else {
                println!("Some checks failed");
            }
        }
        OutputMode::Json => write_json(outcome)?,
    }
    Ok(())
}

pub fn render_error(err: &AppError, mode: OutputMode) {
    match mode {
        OutputMode::Human => {
            eprintln!("error: {}", err.human_message());
            if let Some(source) = err.source() {
                eprintln!("cause: {source}");
            }
        }
        OutputMode::Json => {
            let payload = json!({
                "success": false,
                "kind": err.kind(),
                "message": err.public_message(),
                "error": err.human_message(),
            });
            if let Ok(json) = serde_json::to_string(&payload) {
                println!("{json}");
            }
        }
    }
}
