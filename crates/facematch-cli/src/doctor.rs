use std::fs;
use std::path::{Path, PathBuf};

use facematch_config::{self, ConfigError, ResolvedConfig, ResolvedConfigWithSource};
use facematch_core::faces::{EnvModelPathResolver, ModelPathResolver, SeetaFaceLocator};
use serde::Serialize;

use crate::errors::AppResult;

const CHECK_CONFIG: &str = "config";
const CHECK_DETECTION_MODEL: &str = "detection_model";
const CHECK_STAGING_DIR: &str = "staging_dir";
const CHECK_VERIFIER: &str = "verifier_program";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

#[derive(Debug, Clone, Serialize)]
pub struct DoctorCheck {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl DoctorCheck {
    fn new(name: &str, status: CheckStatus, message: String, path: Option<&Path>) -> Self {
        Self {
            name: name.into(),
            status,
            message,
            path: path.map(|p| p.display().to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DoctorOutcome {
    pub ok: bool,
    pub checks: Vec<DoctorCheck>,
}

/// Finds the verifier executable the way the shell would.
pub trait ProgramLocator {
    fn locate(&self, program: &str) -> Result<PathBuf, String>;
}

#[derive(Clone, Copy)]
pub struct PathProgramLocator;

impl ProgramLocator for PathProgramLocator {
    fn locate(&self, program: &str) -> Result<PathBuf, String> {
        which::which(program).map_err(|err| err.to_string())
    }
}

/// Confirms a detection model can actually be loaded.
pub trait ModelProbe {
    fn probe(&self, path: &Path) -> Result<(), String>;
}

#[derive(Clone, Copy)]
pub struct SeetaModelProbe;

impl ModelProbe for SeetaModelProbe {
    fn probe(&self, path: &Path) -> Result<(), String> {
        SeetaFaceLocator::load(path)
            .map(|_| ())
            .map_err(|err| err.human_message())
    }
}

pub struct DoctorContext<L, M> {
    pub config_paths: Vec<PathBuf>,
    pub program_locator: L,
    pub model_probe: M,
    pub fallback_config: ResolvedConfig,
}

impl Default for DoctorContext<PathProgramLocator, SeetaModelProbe> {
    fn default() -> Self {
        Self {
            config_paths: facematch_config::default_config_paths(),
            program_locator: PathProgramLocator,
            model_probe: SeetaModelProbe,
            fallback_config: ResolvedConfig::default(),
        }
    }
}

impl DoctorContext<PathProgramLocator, SeetaModelProbe> {
    /// Check `explicit` instead of the system config locations.
    pub fn for_config(explicit: Option<PathBuf>) -> Self {
        let mut ctx = Self::default();
        if let Some(path) = explicit {
            ctx.config_paths = vec![path];
        }
        ctx
    }
}

pub fn run_doctor(config_path: Option<&Path>) -> AppResult<DoctorOutcome> {
    let ctx = DoctorContext::for_config(config_path.map(Path::to_path_buf));
    run_doctor_with(&ctx)
}

pub fn run_doctor_with<L, M>(ctx: &DoctorContext<L, M>) -> AppResult<DoctorOutcome>
where
    L: ProgramLocator,
    M: ModelProbe,
{
    let (config_check, resolved) = check_config(&ctx.config_paths, &ctx.fallback_config);

    let checks = vec![
        config_check,
        check_detection_model(&resolved.resolved, &ctx.model_probe),
        check_staging_dir(&resolved.resolved.staging_dir),
        check_verifier(&resolved.resolved.verifier_program, &ctx.program_locator),
    ];

    let ok = checks.iter().all(|c| c.status != CheckStatus::Fail);

    Ok(DoctorOutcome { ok, checks })
}

fn check_config(
    paths: &[PathBuf],
    fallback: &ResolvedConfig,
) -> (DoctorCheck, ResolvedConfigWithSource) {
    let fallback_resolved = || ResolvedConfigWithSource {
        resolved: fallback.clone(),
        source: None,
    };

    match facematch_config::load_from_paths(paths) {
        Ok(Some(entry)) => {
            let existing = paths.iter().filter(|p| p.exists()).count();
            let status = if existing > 1 {
                CheckStatus::Warn
            } else {
                CheckStatus::Pass
            };
            let message = if existing > 1 {
                format!(
                    "Several config files exist; using {}",
                    entry.source.display()
                )
            } else {
                format!("Loaded config from {}", entry.source.display())
            };
            let check = DoctorCheck::new(CHECK_CONFIG, status, message, Some(entry.source()));
            let resolved = ResolvedConfigWithSource {
                resolved: ResolvedConfig::from_raw(entry.contents.clone()),
                source: Some(entry.source.clone()),
            };
            (check, resolved)
        }
        Ok(None) => (
            DoctorCheck::new(
                CHECK_CONFIG,
                CheckStatus::Warn,
                format!(
                    "No config file found (tried {}); using built-in defaults",
                    display_paths(paths)
                ),
                None,
            ),
            fallback_resolved(),
        ),
        Err(ConfigError::Parse { path, message }) => (
            DoctorCheck::new(
                CHECK_CONFIG,
                CheckStatus::Fail,
                format!("Failed to parse {}: {}", path.display(), message),
                Some(path.as_path()),
            ),
            fallback_resolved(),
        ),
        Err(ConfigError::Read { path, source }) => (
            DoctorCheck::new(
                CHECK_CONFIG,
                CheckStatus::Fail,
                format!("Failed to read {}: {}", path.display(), source),
                Some(path.as_path()),
            ),
            fallback_resolved(),
        ),
    }
}

fn check_detection_model<M: ModelProbe>(cfg: &ResolvedConfig, probe: &M) -> DoctorCheck {
    let path = EnvModelPathResolver.resolve(cfg.detection_model.as_deref());
    if !path.is_file() {
        return DoctorCheck::new(
            CHECK_DETECTION_MODEL,
            CheckStatus::Fail,
            format!("Detection model {} not found", path.display()),
            Some(path.as_path()),
        );
    }
    match probe.probe(&path) {
        Ok(()) => DoctorCheck::new(
            CHECK_DETECTION_MODEL,
            CheckStatus::Pass,
            format!("Detection model {} loads", path.display()),
            Some(path.as_path()),
        ),
        Err(message) => DoctorCheck::new(
            CHECK_DETECTION_MODEL,
            CheckStatus::Fail,
            message,
            Some(path.as_path()),
        ),
    }
}

fn check_staging_dir(path: &Path) -> DoctorCheck {
    if path.exists() && !path.is_dir() {
        return DoctorCheck::new(
            CHECK_STAGING_DIR,
            CheckStatus::Fail,
            format!("Staging path {} is not a directory", path.display()),
            Some(path),
        );
    }
    if !path.exists() {
        return match nearest_existing_ancestor(path) {
            Some(ancestor) if is_writeable_dir(&ancestor) => DoctorCheck::new(
                CHECK_STAGING_DIR,
                CheckStatus::Pass,
                format!(
                    "Staging directory {} will be created on first use",
                    path.display()
                ),
                Some(path),
            ),
            _ => DoctorCheck::new(
                CHECK_STAGING_DIR,
                CheckStatus::Fail,
                format!("Staging directory {} cannot be created", path.display()),
                Some(path),
            ),
        };
    }
    if is_writeable_dir(path) {
        DoctorCheck::new(
            CHECK_STAGING_DIR,
            CheckStatus::Pass,
            format!("Staging directory {} is writable", path.display()),
            Some(path),
        )
    } else {
        DoctorCheck::new(
            CHECK_STAGING_DIR,
            CheckStatus::Fail,
            format!("Staging directory {} is not writable", path.display()),
            Some(path),
        )
    }
}

fn check_verifier<L: ProgramLocator>(program: &str, locator: &L) -> DoctorCheck {
    match locator.locate(program) {
        Ok(found) => DoctorCheck::new(
            CHECK_VERIFIER,
            CheckStatus::Pass,
            format!("Verifier {program} resolves to {}", found.display()),
            Some(found.as_path()),
        ),
        Err(message) => DoctorCheck::new(
            CHECK_VERIFIER,
            CheckStatus::Fail,
            format!("Verifier {program} not found: {message}"),
            None,
        ),
    }
}

fn nearest_existing_ancestor(path: &Path) -> Option<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().ok()?.join(path)
    };
    absolute
        .ancestors()
        .find(|candidate| candidate.is_dir())
        .map(Path::to_path_buf)
}

fn is_writeable_dir(path: &Path) -> bool {
    let probe = path.join(format!(".facematch-doctor-{}", std::process::id()));
    match fs::File::create(&probe) {
        Ok(_) => {
            let _ = fs::remove_file(&probe);
            true
        }
        Err(_) => false,
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct FoundAt(PathBuf);

    impl ProgramLocator for FoundAt {
        fn locate(&self, _program: &str) -> Result<PathBuf, String> {
            Ok(self.0.clone())
        }
    }

    struct Missing;

    impl ProgramLocator for Missing {
        fn locate(&self, _program: &str) -> Result<PathBuf, String> {
            Err("cannot find binary path".into())
        }
    }

    struct LoadsFine;

    impl ModelProbe for LoadsFine {
        fn probe(&self, _path: &Path) -> Result<(), String> {
            Ok(())
        }
    }

    fn write_config(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("config.toml");
        fs::write(&path, body).unwrap();
        path
    }

    fn healthy_config(tmp: &TempDir) -> PathBuf {
        let model = tmp.path().join("seeta.bin");
        fs::write(&model, b"model bytes").unwrap();
        let staging = tmp.path().join("temp");
        write_config(
            tmp.path(),
            &format!(
                "detection_model = \"{}\"\nstaging_dir = \"{}\"\n",
                model.display(),
                staging.display()
            ),
        )
    }

    fn status_of(outcome: &DoctorOutcome, name: &str) -> CheckStatus {
        outcome
            .checks
            .iter()
            .find(|check| check.name == name)
            .map(|check| check.status)
            .unwrap()
    }

    #[test]
    fn default_context_checks_the_shared_config_locations() {
        let context = DoctorContext::default();
        assert_eq!(context.config_paths, facematch_config::default_config_paths());
    }

    #[test]
    fn healthy_setup_passes() {
        let tmp = TempDir::new().unwrap();
        let ctx = DoctorContext {
            config_paths: vec![healthy_config(&tmp)],
            program_locator: FoundAt(PathBuf::from("/usr/bin/facematch-verify")),
            model_probe: LoadsFine,
            fallback_config: ResolvedConfig::default(),
        };

        let outcome = run_doctor_with(&ctx).unwrap();
        assert!(outcome.ok, "{:?}", outcome.checks);
        assert_eq!(status_of(&outcome, CHECK_CONFIG), CheckStatus::Pass);
        assert_eq!(status_of(&outcome, CHECK_STAGING_DIR), CheckStatus::Pass);
    }

    #[test]
    fn missing_verifier_fails() {
        let tmp = TempDir::new().unwrap();
        let ctx = DoctorContext {
            config_paths: vec![healthy_config(&tmp)],
            program_locator: Missing,
            model_probe: LoadsFine,
            fallback_config: ResolvedConfig::default(),
        };

        let outcome = run_doctor_with(&ctx).unwrap();
        assert!(!outcome.ok);
        assert_eq!(status_of(&outcome, CHECK_VERIFIER), CheckStatus::Fail);
    }

    #[test]
    fn unparsable_config_fails_but_other_checks_run() {
        let tmp = TempDir::new().unwrap();
        let ctx = DoctorContext {
            config_paths: vec![write_config(tmp.path(), "staging_dir = [")],
            program_locator: FoundAt(PathBuf::from("/bin/true")),
            model_probe: LoadsFine,
            fallback_config: ResolvedConfig::default(),
        };

        let outcome = run_doctor_with(&ctx).unwrap();
        assert!(!outcome.ok);
        assert_eq!(status_of(&outcome, CHECK_CONFIG), CheckStatus::Fail);
        assert_eq!(outcome.checks.len(), 4);
    }

    #[test]
    fn missing_config_falls_back_with_warning() {
        let tmp = TempDir::new().unwrap();
        let (check, resolved) =
            check_config(&[tmp.path().join("absent.toml")], &ResolvedConfig::default());
        assert_eq!(check.status, CheckStatus::Warn);
        assert!(resolved.source.is_none());
    }

    #[test]
    fn missing_model_fails_without_probing() {
        struct NeverCalled;
        impl ModelProbe for NeverCalled {
            fn probe(&self, _path: &Path) -> Result<(), String> {
                panic!("probe should not run for a missing file");
            }
        }

        let tmp = TempDir::new().unwrap();
        let cfg = ResolvedConfig {
            detection_model: Some(tmp.path().join("absent.bin")),
            ..ResolvedConfig::default()
        };
        let check = check_detection_model(&cfg, &NeverCalled);
        assert_eq!(check.status, CheckStatus::Fail);
    }

    #[test]
    fn staging_path_that_is_a_file_fails() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("temp");
        fs::write(&file, b"").unwrap();
        assert_eq!(check_staging_dir(&file).status, CheckStatus::Fail);
        assert_eq!(
            check_staging_dir(&tmp.path().join("new/dir")).status,
            CheckStatus::Pass
        );
    }
}
