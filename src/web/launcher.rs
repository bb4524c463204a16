use anyhow::{Context, Result};
use std::ffi::OsString;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::info;

/// Starts scrape runs as detached background processes
#[derive(Debug, Clone)]
pub struct ScrapeLauncher {
    program: PathBuf,
    args: Vec<OsString>,
    log_file: PathBuf,
}

impl ScrapeLauncher {
    pub fn new(program: impl Into<PathBuf>, args: Vec<OsString>, log_file: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args,
            log_file: log_file.into(),
        }
    }

    /// Re-invoke this binary's `scrape` command against the same settings file.
    pub fn for_current_exe(env_file: &Path, log_file: impl Into<PathBuf>) -> Result<Self> {
        let program = std::env::current_exe().context("Failed to locate current executable")?;
        let args = vec![
            OsString::from("scrape"),
            OsString::from("--env-file"),
            env_file.as_os_str().to_owned(),
        ];
        Ok(Self::new(program, args, log_file))
    }

    pub fn log_file(&self) -> &Path {
        &self.log_file
    }

    /// Spawn the process with stdout and stderr appended to the log file and
    /// return its pid. The outcome of the run is not tracked.
    pub fn spawn(&self) -> Result<u32> {
        let log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_file)
            .with_context(|| format!("Failed to open log file {}", self.log_file.display()))?;
        let log_err = log.try_clone().context("Failed to duplicate log file handle")?;

        let child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err))
            .spawn()
            .with_context(|| format!("Failed to start {}", self.program.display()))?;

        let pid = child
            .id()
            .context("Process exited before its pid could be read")?;
        info!("Started scraper process {} (log: {})", pid, self.log_file.display());
        Ok(pid)
    }
}
