//! Child-process execution behind a narrow trait so the exchange can be
//! driven by a fake in tests.

use std::fs::File;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Duration;

use tracing::debug;
use wait_timeout::ChildExt;

use crate::error::{AppError, Stage};

/// Log file (stdout and stderr) left next to the exchange files.
pub const SOLVER_LOG: &str = "solver.log";

pub trait ProcessRunner {
    /// Run `program` with `args` inside `cwd` and return its exit code.
    fn run(&self, program: &Path, args: &[&str], cwd: &Path) -> Result<i32, AppError>;
}

/// Runs the real solver, optionally bounded by a timeout.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner {
    timeout: Option<Duration>,
}

impl SystemRunner {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

impl ProcessRunner for SystemRunner {
    fn run(&self, program: &Path, args: &[&str], cwd: &Path) -> Result<i32, AppError> {
        let log_path = cwd.join(SOLVER_LOG);
        let log_out = File::create(&log_path).map_err(|e| AppError::io(&log_path, e))?;
        let log_err = log_out.try_clone().map_err(|e| AppError::io(&log_path, e))?;

        debug!(program = %program.display(), ?args, cwd = %cwd.display(), "spawning solver");
        let mut child = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log_out))
            .stderr(Stdio::from(log_err))
            .spawn()
            .map_err(|e| {
                AppError::config(format!("Failed to start solver '{}': {e}", program.display()))
            })?;

        let status = match self.timeout {
            Some(limit) => match child.wait_timeout(limit).map_err(|e| AppError::io(program, e))? {
                Some(status) => status,
                None => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(AppError::protocol(
                        Stage::Invoke,
                        format!("solver timed out after {limit:?}"),
                    ));
                }
            },
            None => child.wait().map_err(|e| AppError::io(program, e))?,
        };

        // Killed by a signal: no exit code.
        Ok(status.code().unwrap_or(-1))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn script(dir: &Path, body: &str) -> std::path::PathBuf {
        let path = dir.join("fake.sh");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn exit_code_is_returned() {
        let dir = tempfile::tempdir().unwrap();
        let program = script(dir.path(), "echo \"$1 $2\" > args.txt\nexit 3");
        let code = SystemRunner::new(None)
            .run(&program, &["a.dat", "b.dat"], dir.path())
            .unwrap();
        assert_eq!(code, 3);
        let args = std::fs::read_to_string(dir.path().join("args.txt")).unwrap();
        assert_eq!(args.trim(), "a.dat b.dat");
        assert!(dir.path().join(SOLVER_LOG).exists());
    }

    #[test]
    fn timeout_kills_the_child() {
        let dir = tempfile::tempdir().unwrap();
        let program = script(dir.path(), "sleep 5");
        let err = SystemRunner::new(Some(Duration::from_millis(100)))
            .run(&program, &[], dir.path())
            .unwrap_err();
        assert!(matches!(err, AppError::Protocol { stage: Stage::Invoke, .. }));
    }
}
