use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{Result, ScreenError};
use crate::screen_config::{EngineCommand, ExecutionConfig};

/// Captured output of a successful engine invocation.
#[derive(Debug, Clone)]
pub struct EngineOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Runs external engines under a timeout, inside per-ligand scratch directories.
///
/// Each scratch directory is a [`TempDir`]: it is removed when dropped, so
/// success, error and cancellation of the owning future all clean up.
#[derive(Debug, Clone)]
pub struct ProcessSandbox {
    timeout: Duration,
    max_retries: u32,
    work_root: Option<PathBuf>,
}

impl ProcessSandbox {
    /// `work_root` defaults to the system temp dir.
    pub fn new(timeout: Duration, max_retries: u32, work_root: Option<PathBuf>) -> Self {
        Self {
            timeout,
            max_retries,
            work_root,
        }
    }

    /// Sandbox with the configured timeout, retries and work root.
    pub fn from_config(cfg: &ExecutionConfig) -> Self {
        Self::new(
            Duration::from_secs(cfg.timeout_secs),
            cfg.max_retries,
            cfg.work_dir.clone(),
        )
    }

    /// Checks whether the engine's program can be launched: an existing path,
    /// or a bare name found on `PATH`.
    pub fn is_available(cmd: &EngineCommand) -> bool {
        let program = Path::new(&cmd.program);
        if program.components().count() > 1 {
            return program.is_file();
        }
        std::env::var_os("PATH")
            .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join(program).is_file()))
            .unwrap_or(false)
    }

    /// Creates a scratch directory for one ligand or complex.
    pub fn scoped_dir(&self, label: &str) -> Result<TempDir> {
        let safe: String = label
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .take(48)
            .collect();
        let prefix = format!("ferroscreen-{safe}-");
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix);
        let dir = match &self.work_root {
            Some(root) => {
                std::fs::create_dir_all(root)?;
                builder.tempdir_in(root)?
            }
            None => builder.tempdir()?,
        };
        Ok(dir)
    }

    /// Runs `cmd` with `args` appended, in `cwd`, retrying up to `max_retries` times.
    pub async fn run<I, S>(
        &self,
        engine: &str,
        cmd: &EngineCommand,
        args: I,
        cwd: &Path,
    ) -> Result<EngineOutput>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let args: Vec<std::ffi::OsString> = args.into_iter().map(|a| a.as_ref().to_os_string()).collect();
        let mut attempt = 0;
        loop {
            match self.run_once(engine, cmd, &args, cwd).await {
                Ok(out) => return Ok(out),
                Err(e) if attempt < self.max_retries => {
                    attempt += 1;
                    warn!("{} failed ({}); retry {}/{}", engine, e, attempt, self.max_retries);
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn run_once(
        &self,
        engine: &str,
        cmd: &EngineCommand,
        args: &[std::ffi::OsString],
        cwd: &Path,
    ) -> Result<EngineOutput> {
        debug!("Running {} ({}) in {:?}", engine, cmd.program, cwd);

        let child = Command::new(&cmd.program)
            .args(&cmd.args)
            .args(args)
            .current_dir(cwd)
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, child).await {
            Ok(res) => res.map_err(|e| ScreenError::invocation(engine, e.to_string()))?,
            Err(_) => {
                return Err(ScreenError::EngineTimeout {
                    engine: engine.to_string(),
                    secs: self.timeout.as_secs(),
                })
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            let tail: String = stderr.chars().take(200).collect();
            return Err(ScreenError::invocation(
                engine,
                format!("exit status {}: {}", output.status, tail.trim()),
            ));
        }

        Ok(EngineOutput { stdout, stderr })
    }
}

impl Default for ProcessSandbox {
    fn default() -> Self {
        Self::from_config(&ExecutionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_binary_is_unavailable() {
        assert!(!ProcessSandbox::is_available(&EngineCommand::new("definitely-not-a-real-engine-xyz")));
        assert!(!ProcessSandbox::is_available(&EngineCommand::new("/nonexistent/dir/vina")));
    }

    #[test]
    fn test_scoped_dir_is_removed_on_drop() {
        let root = tempfile::tempdir().unwrap();
        let sandbox = ProcessSandbox::new(Duration::from_secs(5), 0, Some(root.path().to_path_buf()));
        let path = {
            let dir = sandbox.scoped_dir("LIG/1 weird").unwrap();
            assert!(dir.path().starts_with(root.path()));
            dir.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_captures_stdout_and_failure() {
        let dir = tempfile::tempdir().unwrap();
        let sandbox = ProcessSandbox::default();
        let sh = EngineCommand::with_args("sh", &["-c"]);

        let out = sandbox.run("echo", &sh, ["echo hello"], dir.path()).await.unwrap();
        assert_eq!(out.stdout.trim(), "hello");

        let err = sandbox.run("fail", &sh, ["echo boom >&2; exit 3"], dir.path()).await.unwrap_err();
        match err {
            ScreenError::EngineInvocation { engine, reason } => {
                assert_eq!(engine, "fail");
                assert!(reason.contains("boom"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let sandbox = ProcessSandbox::new(Duration::from_millis(200), 0, None);
        let sh = EngineCommand::with_args("sh", &["-c"]);
        let err = sandbox.run("sleepy", &sh, ["sleep 5"], dir.path()).await.unwrap_err();
        assert!(matches!(err, ScreenError::EngineTimeout { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_retries_until_success() {
        let dir = tempfile::tempdir().unwrap();
        let sandbox = ProcessSandbox::new(Duration::from_secs(5), 2, None);
        let sh = EngineCommand::with_args("sh", &["-c"]);
        // fails on first call, succeeds once the marker exists
        let script = "if [ -f marker ]; then echo ok; else touch marker; exit 1; fi";
        let out = sandbox.run("flaky", &sh, [script], dir.path()).await.unwrap();
        assert_eq!(out.stdout.trim(), "ok");
    }
}
