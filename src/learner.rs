//! External learner collaborator
//!
//! Training and reference classification are delegated to the SVM-perf
//! executables (`svm_perf_learn`, `svm_perf_classify`). The [`Learner`] trait
//! hides the process behind two text-in/text-out operations so the rest of the
//! crate, and its tests, never depend on the executables being installed.

use crate::core::{Result, SvmPerfError};
use log::{debug, warn};
use std::ffi::OsString;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// Default bound on a single learner invocation
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Text-level interface to an SVM-perf style learner
pub trait Learner: Send + Sync {
    /// Train on `training_data` (SVM-light lines) and return the model text
    fn learn(&self, args: &str, training_data: &str) -> Result<String>;

    /// Classify `sample_text` with `model_text` and return the raw predictions output
    fn classify(&self, args: &str, sample_text: &str, model_text: &str) -> Result<String>;
}

/// Parse the score written by the classifier (first token of its output)
pub fn parse_score(text: &str) -> Result<f64> {
    text.split_whitespace()
        .next()
        .and_then(|token| token.parse::<f64>().ok())
        .ok_or_else(|| SvmPerfError::ParseError(format!("Cannot parse score from '{}'", text.trim())))
}

/// Whether `command` can be started at all
pub fn is_installed(command: &str) -> bool {
    Command::new(command)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map(|mut child| {
            let _ = child.kill();
            let _ = child.wait();
        })
        .is_ok()
}

/// Configuration for the process-backed learner
#[derive(Debug, Clone)]
pub struct LearnerConfig {
    /// Training executable
    pub learn_command: String,
    /// Classification executable
    pub classify_command: String,
    /// Maximum time a single invocation may run before it is killed
    pub timeout: Duration,
    /// Keep work files at `<prefix>.learn`, `<prefix>.model`, ... instead of
    /// a temporary directory
    pub file_prefix: Option<PathBuf>,
}

impl Default for LearnerConfig {
    fn default() -> Self {
        Self {
            learn_command: "svm_perf_learn".to_string(),
            classify_command: "svm_perf_classify".to_string(),
            timeout: DEFAULT_TIMEOUT,
            file_prefix: None,
        }
    }
}

/// [`Learner`] backed by the SVM-perf executables
#[derive(Debug, Clone, Default)]
pub struct SvmPerfCommand {
    config: LearnerConfig,
}

impl SvmPerfCommand {
    /// Use `svm_perf_learn` / `svm_perf_classify` from the `PATH`
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: LearnerConfig) -> Self {
        Self { config }
    }

    pub fn with_learn_command(mut self, command: impl Into<String>) -> Self {
        self.config.learn_command = command.into();
        self
    }

    pub fn with_classify_command(mut self, command: impl Into<String>) -> Self {
        self.config.classify_command = command.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn with_file_prefix(mut self, prefix: impl Into<PathBuf>) -> Self {
        self.config.file_prefix = Some(prefix.into());
        self
    }

    pub fn config(&self) -> &LearnerConfig {
        &self.config
    }

    fn work_dir(&self) -> Result<WorkDir> {
        match &self.config.file_prefix {
            Some(prefix) => Ok(WorkDir {
                _temp: None,
                base: prefix.clone(),
            }),
            None => {
                let temp = tempfile::Builder::new().prefix("svmperf-").tempdir()?;
                let base = temp.path().join("svmperf");
                Ok(WorkDir {
                    _temp: Some(temp),
                    base,
                })
            }
        }
    }

    /// Run `command <args> <files>` with output redirected into the work dir,
    /// killing it once the timeout expires.
    fn run(&self, command: &str, args: &str, files: &[&Path], work: &WorkDir) -> Result<()> {
        let stdout_path = work.path(".stdout");
        let stderr_path = work.path(".stderr");

        debug!("Running {command} {args} {files:?}");
        let mut child = Command::new(command)
            .args(args.split_whitespace())
            .args(files)
            .stdin(Stdio::null())
            .stdout(File::create(&stdout_path)?)
            .stderr(File::create(&stderr_path)?)
            .spawn()
            .map_err(|e| SvmPerfError::LearnerFailed(format!("cannot execute {command}: {e}")))?;

        match wait_with_timeout(&mut child, self.config.timeout)? {
            Some(status) if status.success() => Ok(()),
            Some(status) => {
                let stderr = fs::read_to_string(&stderr_path).unwrap_or_default();
                Err(SvmPerfError::LearnerFailed(format!(
                    "{command} exited with {status}: {}",
                    stderr.trim()
                )))
            }
            None => {
                warn!(
                    "{command} still running after {:?}, killing it",
                    self.config.timeout
                );
                let _ = child.kill();
                let _ = child.wait();
                Err(SvmPerfError::Timeout {
                    command: command.to_string(),
                    timeout: self.config.timeout,
                })
            }
        }
    }
}

impl Learner for SvmPerfCommand {
    fn learn(&self, args: &str, training_data: &str) -> Result<String> {
        let work = self.work_dir()?;
        let train_path = work.path(".learn");
        let model_path = work.path(".model");

        fs::write(&train_path, training_data)?;
        let command = &self.config.learn_command;
        self.run(command, args, &[train_path.as_path(), model_path.as_path()], &work)?;

        let model = fs::read_to_string(&model_path).map_err(|e| {
            SvmPerfError::LearnerFailed(format!("{command} wrote no model file: {e}"))
        })?;
        Ok(model.replace("\r\n", "\n"))
    }

    fn classify(&self, args: &str, sample_text: &str, model_text: &str) -> Result<String> {
        let work = self.work_dir()?;
        let sample_path = work.path(".classify");
        let model_path = work.path(".model");
        let predictions_path = work.path(".predictions");

        let mut samples = sample_text.to_string();
        if !samples.ends_with('\n') {
            samples.push('\n');
        }
        fs::write(&sample_path, samples)?;
        fs::write(&model_path, model_text)?;

        let command = &self.config.classify_command;
        self.run(
            command,
            args,
            &[
                sample_path.as_path(),
                model_path.as_path(),
                predictions_path.as_path(),
            ],
            &work,
        )?;

        fs::read_to_string(&predictions_path).map_err(|e| {
            SvmPerfError::LearnerFailed(format!("{command} wrote no predictions file: {e}"))
        })
    }
}

/// Location of the files exchanged with one learner invocation
struct WorkDir {
    // Removes the directory on drop when no prefix was configured
    _temp: Option<TempDir>,
    base: PathBuf,
}

impl WorkDir {
    fn path(&self, suffix: &str) -> PathBuf {
        let mut name: OsString = self.base.clone().into_os_string();
        name.push(suffix);
        PathBuf::from(name)
    }
}

fn wait_with_timeout(child: &mut Child, timeout: Duration) -> io::Result<Option<ExitStatus>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}
