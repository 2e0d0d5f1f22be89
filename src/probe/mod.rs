//! Runs `<compiler> --version` with a bounded wait.
//!
//! Stdout and stderr are drained on helper threads while the calling thread
//! polls the child, so a compiler that prints a lot cannot stall on a full
//! pipe. The child's exit and both pipe reads share one deadline. On timeout
//! the child is killed and reaped, and any reader still blocked is abandoned.

use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use crate::config::ProbeConfig;
use crate::extractor::ExtractError;

/// Flag appended to the compiler command.
pub const VERSION_FLAG: &str = "--version";

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Captured result of a finished probe.
#[derive(Debug, Clone)]
pub struct ProbeOutput {
    /// Exit code, `None` if the process was terminated by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProbeOutput {
    /// Stdout followed by stderr. Some compilers print their banner on stderr.
    pub fn combined(&self) -> String {
        let mut out = String::with_capacity(self.stdout.len() + self.stderr.len());
        out.push_str(&self.stdout);
        out.push_str(&self.stderr);
        out
    }
}

/// The command line that will be run, for display.
pub fn display_command(compiler: &str) -> String {
    format!("{} {VERSION_FLAG}", compiler.trim())
}

/// Build the probe command for `compiler`.
///
/// Without `shell`, the command is split on whitespace so wrappers such as
/// `ccache xtensa-esp32-elf-gcc` work; the first word is the program.
fn build_command(compiler: &str, shell: bool) -> Result<Command, ExtractError> {
    let compiler = compiler.trim();
    if compiler.is_empty() {
        return Err(ExtractError::NotFound {
            command: String::new(),
            reason: "no compiler command configured".to_string(),
        });
    }

    let cmd = if shell {
        let line = display_command(compiler);
        let mut cmd = if cfg!(windows) {
            Command::new("cmd")
        } else {
            Command::new("sh")
        };
        cmd.arg(if cfg!(windows) { "/C" } else { "-c" }).arg(line);
        cmd
    } else {
        let mut words = compiler.split_whitespace();
        // Non-empty after trim, so there is at least one word.
        let program = words.next().unwrap_or(compiler);
        let mut cmd = Command::new(program);
        cmd.args(words).arg(VERSION_FLAG);
        cmd
    };
    Ok(cmd)
}

/// Run the version probe using the timeout and shell mode from `cfg`.
pub fn run(compiler: &str, cfg: &ProbeConfig) -> Result<ProbeOutput, ExtractError> {
    run_with_timeout(compiler, cfg.shell, cfg.timeout())
}

pub fn run_with_timeout(
    compiler: &str,
    shell: bool,
    timeout: Duration,
) -> Result<ProbeOutput, ExtractError> {
    let mut cmd = build_command(compiler, shell)?;
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let deadline = Instant::now() + timeout;
    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e)
            if matches!(
                e.kind(),
                std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied
            ) =>
        {
            return Err(ExtractError::NotFound {
                command: compiler.trim().to_string(),
                reason: e.to_string(),
            });
        }
        Err(e) => {
            return Err(anyhow::Error::new(e)
                .context(format!("failed to run {}", display_command(compiler)))
                .into());
        }
    };

    let (tx, rx) = mpsc::channel();
    let mut pipes = 0;
    if let Some(out) = child.stdout.take() {
        drain(out, Pipe::Stdout, tx.clone());
        pipes += 1;
    }
    if let Some(err) = child.stderr.take() {
        drain(err, Pipe::Stderr, tx.clone());
        pipes += 1;
    }
    drop(tx);

    let timed_out = || ExtractError::Timeout {
        command: display_command(compiler),
        timeout,
    };

    let status = wait_until(&mut child, deadline).map_err(|e| match e {
        WaitError::Elapsed => timed_out(),
        WaitError::Io(e) => ExtractError::Other(
            anyhow::Error::new(e).context(format!("failed to wait for {}", display_command(compiler))),
        ),
    })?;

    // A descendant of the compiler may still hold the pipes open after it exits.
    let (stdout, stderr) = collect(&rx, pipes, deadline).ok_or_else(timed_out)?;

    let output = ProbeOutput {
        code: status.code(),
        stdout,
        stderr,
    };

    // The shell reports a missing or non-executable program through its exit code.
    if shell && matches!(output.code, Some(126 | 127)) {
        return Err(ExtractError::NotFound {
            command: compiler.trim().to_string(),
            reason: output.stderr.trim().to_string(),
        });
    }

    Ok(output)
}

enum WaitError {
    Elapsed,
    Io(std::io::Error),
}

#[derive(Debug, Clone, Copy)]
enum Pipe {
    Stdout,
    Stderr,
}

fn wait_until(child: &mut Child, deadline: Instant) -> Result<ExitStatus, WaitError> {
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) => {}
            Err(e) => {
                kill(child);
                return Err(WaitError::Io(e));
            }
        }

        if Instant::now() >= deadline {
            kill(child);
            return Err(WaitError::Elapsed);
        }

        thread::sleep(POLL_INTERVAL);
    }
}

fn kill(child: &mut Child) {
    if let Err(e) = child.kill() {
        tracing::debug!("failed to kill compiler probe: {}", e);
    }
    let _ = child.wait();
}

/// Read `pipe` to the end on its own thread and send the bytes to `tx`.
/// The thread is never joined; a reader stuck past the deadline is abandoned.
fn drain<R: Read + Send + 'static>(mut pipe: R, which: Pipe, tx: Sender<(Pipe, Vec<u8>)>) {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        let _ = tx.send((which, buf));
    });
}

/// Wait for `pipes` readers to finish. `None` if the deadline passes first.
fn collect(
    rx: &Receiver<(Pipe, Vec<u8>)>,
    pipes: usize,
    deadline: Instant,
) -> Option<(String, String)> {
    let mut stdout = String::new();
    let mut stderr = String::new();
    for _ in 0..pipes {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let (which, bytes) = match rx.recv_timeout(remaining) {
            Ok(msg) => msg,
            Err(RecvTimeoutError::Timeout) => return None,
            // Every sender is gone; nothing more will arrive.
            Err(RecvTimeoutError::Disconnected) => break,
        };
        let text = String::from_utf8_lossy(&bytes).into_owned();
        match which {
            Pipe::Stdout => stdout = text,
            Pipe::Stderr => stderr = text,
        }
    }
    Some((stdout, stderr))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    const SHORT: Duration = Duration::from_secs(5);

    #[test]
    fn captures_stdout_with_leading_args() {
        let out = run_with_timeout("echo xtensa-esp32-elf-gcc 8.4.0", false, SHORT).unwrap();
        assert_eq!(out.code, Some(0));
        assert_eq!(out.stdout.trim(), "xtensa-esp32-elf-gcc 8.4.0 --version");
        assert!(out.stderr.is_empty());
    }

    #[test]
    fn combines_stdout_then_stderr() {
        let out = run_with_timeout("printf out; printf err >&2; true", true, SHORT).unwrap();
        assert_eq!(out.stdout, "out");
        assert_eq!(out.stderr, "err");
        assert_eq!(out.combined(), "outerr");
    }

    #[test]
    fn nonzero_exit_still_returns_output() {
        let out = run_with_timeout("echo gcc 9.1.0; exit 3; true", true, SHORT).unwrap();
        assert_eq!(out.code, Some(3));
        assert!(out.stdout.contains("9.1.0"));
    }

    #[test]
    fn missing_program_is_not_found() {
        let err = run_with_timeout("ccversion-no-such-compiler-xyz", false, SHORT).unwrap_err();
        assert!(matches!(err, ExtractError::NotFound { .. }), "{err:?}");
    }

    #[test]
    fn missing_program_through_shell_is_not_found() {
        let err = run_with_timeout("ccversion-no-such-compiler-xyz", true, SHORT).unwrap_err();
        assert!(matches!(err, ExtractError::NotFound { .. }), "{err:?}");
    }

    #[test]
    fn empty_command_is_not_found() {
        let err = run_with_timeout("   ", false, SHORT).unwrap_err();
        assert!(matches!(err, ExtractError::NotFound { .. }));
    }

    #[test]
    fn slow_compiler_times_out() {
        let start = Instant::now();
        let err = run_with_timeout("sleep 5 #", true, Duration::from_millis(200)).unwrap_err();
        assert!(matches!(err, ExtractError::Timeout { .. }), "{err:?}");
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn lingering_descendant_holding_pipes_times_out() {
        let start = Instant::now();
        let err = run_with_timeout(
            "(sleep 6 &) ; echo gcc 8.4.0 ; true",
            true,
            Duration::from_secs(1),
        )
        .unwrap_err();
        assert!(matches!(err, ExtractError::Timeout { .. }), "{err:?}");
        assert!(start.elapsed() < Duration::from_secs(3));
    }

    #[test]
    fn pipe_reads_finish_within_deadline() {
        let (tx, rx) = mpsc::channel();
        tx.send((Pipe::Stderr, b"err".to_vec())).unwrap();
        tx.send((Pipe::Stdout, b"out".to_vec())).unwrap();
        let deadline = Instant::now() + SHORT;
        assert_eq!(
            collect(&rx, 2, deadline),
            Some(("out".to_string(), "err".to_string()))
        );
    }

    #[test]
    fn pipe_reads_past_deadline_give_up() {
        let (tx, rx) = mpsc::channel::<(Pipe, Vec<u8>)>();
        let deadline = Instant::now() + Duration::from_millis(50);
        assert_eq!(collect(&rx, 1, deadline), None);
        drop(tx);
    }

    #[test]
    fn display_command_appends_flag() {
        assert_eq!(
            display_command(" xtensa-esp32-elf-gcc "),
            "xtensa-esp32-elf-gcc --version"
        );
    }
}
