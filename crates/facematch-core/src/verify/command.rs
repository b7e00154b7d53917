use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tracing::{debug, warn};

use crate::verify::{VerificationFailure, VerificationRequest, Verifier};

pub const DEFAULT_VERIFIER_PROGRAM: &str = "facematch-verify";
pub const DEFAULT_VERIFIER_TIMEOUT: Duration = Duration::from_secs(120);

const POLL_INTERVAL: Duration = Duration::from_millis(20);
const STDERR_TAIL: usize = 512;

#[derive(Debug, Deserialize)]
struct VerifierReport {
    distance: f64,
}

/// Runs an external verification program once per request:
///
/// ```text
/// <program> [args...] --img1 <a> --img2 <b> --backend <backend> --model <model>
/// ```
///
/// The program prints a JSON object carrying a numeric `distance` on its last
/// JSON line of stdout. It is killed once `timeout` elapses.
#[derive(Debug, Clone)]
pub struct CommandVerifier {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandVerifier {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: DEFAULT_VERIFIER_TIMEOUT,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn command(&self, request: &VerificationRequest<'_>) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg("--img1")
            .arg(request.first)
            .arg("--img2")
            .arg(request.second)
            .arg("--backend")
            .arg(request.backend)
            .arg("--model")
            .arg(request.model_name)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        command
    }
}

impl Default for CommandVerifier {
    fn default() -> Self {
        Self::new(DEFAULT_VERIFIER_PROGRAM)
    }
}

impl Verifier for CommandVerifier {
    fn distance(&self, request: &VerificationRequest<'_>) -> Result<f64, VerificationFailure> {
        debug!(program = %self.program, "launching verifier");
        let mut child = self
            .command(request)
            .spawn()
            .map_err(|source| VerificationFailure::Launch {
                program: self.program.clone(),
                source,
            })?;

        // Pipes are drained on their own threads so a chatty child cannot
        // block on a full buffer while we wait for it.
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let stdout_reader = thread::spawn(move || drain(stdout));
        let stderr_reader = thread::spawn(move || drain(stderr));

        let status = wait_with_deadline(&mut child, self.timeout)?;
        let stdout = stdout_reader.join().unwrap_or_default();
        let stderr = stderr_reader.join().unwrap_or_default();

        if !status.success() {
            return Err(VerificationFailure::Exited {
                status: status.to_string(),
                stderr: tail(stderr.trim(), STDERR_TAIL),
            });
        }
        parse_report(&stdout)
    }
}

fn drain<R: Read>(pipe: Option<R>) -> String {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        let _ = pipe.read_to_end(&mut buf);
    }
    String::from_utf8_lossy(&buf).into_owned()
}

fn wait_with_deadline(
    child: &mut Child,
    timeout: Duration,
) -> Result<ExitStatus, VerificationFailure> {
    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) if Instant::now() >= deadline => {
                warn!(?timeout, "verifier timed out; killing it");
                let _ = child.kill();
                let _ = child.wait();
                return Err(VerificationFailure::Timeout(timeout));
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(err) => {
                let _ = child.kill();
                return Err(VerificationFailure::Backend(format!(
                    "failed waiting for verifier: {err}"
                )));
            }
        }
    }
}

fn parse_report(stdout: &str) -> Result<f64, VerificationFailure> {
    let line = stdout
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| line.starts_with('{'))
        .unwrap_or_else(|| stdout.trim());
    let report: VerifierReport = serde_json::from_str(line)?;
    Ok(report.distance)
}

fn tail(text: &str, max: usize) -> String {
    let count = text.chars().count();
    if count <= max {
        return text.to_string();
    }
    text.chars().skip(count - max).collect()
}
