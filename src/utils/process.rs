use crate::error::{DockcheckError, Result};
use std::io::Read;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Captured result of an external command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Runs `program` with `args`, killing it once `timeout` elapses.
///
/// A missing binary surfaces as `DockcheckError::Io` with `ErrorKind::NotFound`
/// so callers can tell "tool not installed" apart from "tool failed".
pub fn run(program: &str, args: &[&str], timeout: Option<Duration>) -> Result<CommandOutput> {
    let shown = describe(program, args);
    debug!(command = %shown, "executing");

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    // Drain both pipes on their own threads so a chatty child can't block on a full pipe.
    let stdout_reader = child.stdout.take().map(spawn_reader);
    let stderr_reader = child.stderr.take().map(spawn_reader);

    let started = Instant::now();
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if let Some(limit) = timeout {
            if started.elapsed() >= limit {
                let _ = child.kill();
                let _ = child.wait();
                return Err(DockcheckError::CommandTimeout {
                    command: shown,
                    seconds: limit.as_secs(),
                });
            }
        }
        thread::sleep(POLL_INTERVAL);
    };

    let stdout = stdout_reader.map(join_reader).unwrap_or_default();
    let stderr = stderr_reader.map(join_reader).unwrap_or_default();

    Ok(CommandOutput {
        success: status.success(),
        code: status.code(),
        stdout,
        stderr,
    })
}

/// Runs a command and turns a non-zero exit into `CommandFailed`.
pub fn run_checked(program: &str, args: &[&str], timeout: Option<Duration>) -> Result<String> {
    let output = run(program, args, timeout)?;
    ensure_success(&output, &describe(program, args))?;
    Ok(output.stdout)
}

pub fn ensure_success(output: &CommandOutput, command: &str) -> Result<()> {
    if output.success {
        return Ok(());
    }

    let stderr = output.stderr.trim();
    Err(DockcheckError::CommandFailed {
        command: command.to_string(),
        stderr: if stderr.is_empty() {
            format!("exit code {}", output.code.unwrap_or(-1))
        } else {
            stderr.to_string()
        },
    })
}

pub fn describe(program: &str, args: &[&str]) -> String {
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{} {}", program, args.join(" "))
    }
}

fn spawn_reader<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn join_reader(handle: thread::JoinHandle<String>) -> String {
    handle.join().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_binary_is_not_found() {
        let err = run("dockcheck-no-such-binary", &[], None).unwrap_err();
        match err {
            DockcheckError::Io(e) => assert_eq!(e.kind(), std::io::ErrorKind::NotFound),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn captures_stdout_and_status() {
        let out = run("sh", &["-c", "echo hello; echo oops >&2; exit 3"], None).unwrap();
        assert!(!out.success);
        assert_eq!(out.code, Some(3));
        assert_eq!(out.stdout.trim(), "hello");
        assert_eq!(out.stderr.trim(), "oops");
    }

    #[cfg(unix)]
    #[test]
    fn kills_command_after_timeout() {
        let err = run("sleep", &["5"], Some(Duration::from_millis(200))).unwrap_err();
        match err {
            DockcheckError::CommandTimeout { command, .. } => assert_eq!(command, "sleep 5"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn run_checked_reports_stderr() {
        let err = run_checked("sh", &["-c", "echo broken >&2; exit 1"], None).unwrap_err();
        match err {
            DockcheckError::CommandFailed { stderr, .. } => assert_eq!(stderr, "broken"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
