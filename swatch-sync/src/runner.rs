//! Running a rendered script variant.
//!
//! [`ScriptRunner`] is the seam between dispatch decisions and process
//! execution; [`ProcessRunner`] is the real implementation. Output is
//! captured to files next to the script so a chatty script can never block
//! on a full pipe.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::cancel::CancelToken;
use crate::variant::ScriptVariant;

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Everything needed to run one rendered script.
#[derive(Debug)]
pub struct Invocation<'a> {
    pub variant: &'a ScriptVariant,
    /// Rendered script on disk.
    pub script_path: &'a Path,
    pub working_dir: &'a Path,
    pub env: &'a [(&'static str, String)],
    /// Trigger content, fed to the script's stdin.
    pub stdin: &'a str,
    pub timeout: Duration,
    pub cancel: &'a CancelToken,
}

/// Captured result of a script that exited successfully.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Why a script did not complete successfully.
#[derive(Debug, Error)]
pub enum RunFailure {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("exited with {}: {}", exit_label(.code), .stderr.trim())]
    Exit { code: Option<i32>, stderr: String },

    #[error("timed out after {0:?}")]
    TimedOut(Duration),

    #[error("cancelled")]
    Cancelled,

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "signal".to_owned(),
    }
}

pub trait ScriptRunner: Send + Sync {
    fn run(&self, invocation: &Invocation<'_>) -> Result<RunOutput, RunFailure>;
}

/// Runs scripts as child processes through their interpreter.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

fn sidecar(script: &Path, suffix: &str) -> PathBuf {
    PathBuf::from(format!("{}.{suffix}", script.display()))
}

fn io_failure(path: &Path) -> impl FnOnce(std::io::Error) -> RunFailure {
    let path = path.to_path_buf();
    move |source| RunFailure::Io { path, source }
}

/// Kill and reap, so no zombie is left behind.
fn stop(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn read_capture(path: &Path) -> Result<String, RunFailure> {
    let mut buf = Vec::new();
    File::open(path)
        .and_then(|mut file| file.read_to_end(&mut buf))
        .map_err(io_failure(path))?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

impl ScriptRunner for ProcessRunner {
    fn run(&self, inv: &Invocation<'_>) -> Result<RunOutput, RunFailure> {
        let stdin_path = sidecar(inv.script_path, "stdin");
        let stdout_path = sidecar(inv.script_path, "stdout");
        let stderr_path = sidecar(inv.script_path, "stderr");
        std::fs::write(&stdin_path, inv.stdin).map_err(io_failure(&stdin_path))?;
        let stdin = File::open(&stdin_path).map_err(io_failure(&stdin_path))?;
        let stdout = File::create(&stdout_path).map_err(io_failure(&stdout_path))?;
        let stderr = File::create(&stderr_path).map_err(io_failure(&stderr_path))?;

        let (program, args) = inv.variant.interpreter.command();
        let mut command = Command::new(program);
        command
            .args(args)
            .arg(inv.script_path)
            .current_dir(inv.working_dir)
            .stdin(Stdio::from(stdin))
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr));
        for (key, value) in inv.env {
            command.env(key, value);
        }

        let mut child = command.spawn().map_err(|source| RunFailure::Spawn {
            program: program.to_owned(),
            source,
        })?;

        let started = Instant::now();
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {
                    let failure = if inv.cancel.is_cancelled() {
                        Some(RunFailure::Cancelled)
                    } else if started.elapsed() >= inv.timeout {
                        Some(RunFailure::TimedOut(inv.timeout))
                    } else {
                        None
                    };
                    if let Some(failure) = failure {
                        stop(&mut child);
                        return Err(failure);
                    }
                    thread::sleep(POLL_INTERVAL);
                }
                Err(source) => {
                    stop(&mut child);
                    return Err(RunFailure::Io { path: inv.script_path.to_path_buf(), source });
                }
            }
        };

        let output = RunOutput {
            stdout: read_capture(&stdout_path)?,
            stderr: read_capture(&stderr_path)?,
        };
        if status.success() {
            Ok(output)
        } else {
            Err(RunFailure::Exit { code: status.code(), stderr: output.stderr })
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::variant::Interpreter;
    use swatch_core::OsName;
    use tempfile::TempDir;

    fn variant() -> ScriptVariant {
        ScriptVariant {
            source: "run_apply.sh.tmpl".into(),
            file_name: "apply.sh".into(),
            os: OsName::linux(),
            interpreter: Interpreter::Sh,
        }
    }

    fn run_script(
        dir: &Path,
        body: &str,
        timeout: Duration,
        cancel: &CancelToken,
    ) -> Result<RunOutput, RunFailure> {
        let script = dir.join("apply.sh");
        std::fs::write(&script, body).unwrap();
        let env = [("SWATCH_FINGERPRINT", "abc123".to_string())];
        let v = variant();
        ProcessRunner.run(&Invocation {
            variant: &v,
            script_path: &script,
            working_dir: dir,
            env: &env,
            stdin: "current_theme=nord\n",
            timeout,
            cancel,
        })
    }

    #[test]
    fn success_captures_output_stdin_and_env() {
        let tmp = TempDir::new().unwrap();
        let out = run_script(
            tmp.path(),
            "cat\necho \"fp=$SWATCH_FINGERPRINT\"\necho warn >&2\n",
            Duration::from_secs(10),
            &CancelToken::new(),
        )
        .unwrap();
        assert_eq!(out.stdout, "current_theme=nord\nfp=abc123\n");
        assert_eq!(out.stderr, "warn\n");
    }

    #[test]
    fn non_zero_exit_is_a_failure() {
        let tmp = TempDir::new().unwrap();
        let err = run_script(tmp.path(), "echo boom >&2\nexit 3\n", Duration::from_secs(10), &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, RunFailure::Exit { code: Some(3), .. }));
        assert_eq!(err.to_string(), "exited with status 3: boom");
    }

    #[test]
    fn timeout_kills_the_script() {
        let tmp = TempDir::new().unwrap();
        let started = Instant::now();
        let err = run_script(tmp.path(), "sleep 30\n", Duration::from_millis(200), &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, RunFailure::TimedOut(_)));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn cancellation_kills_the_script() {
        let tmp = TempDir::new().unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = run_script(tmp.path(), "sleep 30\n", Duration::from_secs(30), &cancel).unwrap_err();
        assert_eq!(err.to_string(), "cancelled");
    }

    #[test]
    fn stop_kills_and_reaps_the_child() {
        let mut child = Command::new("sleep").arg("30").spawn().unwrap();
        stop(&mut child);
        assert!(child.try_wait().unwrap().is_some());
    }
}
