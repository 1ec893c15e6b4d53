//! Helpers for running child processes with timeouts, cancellation and
//! bounded output.

use std::io::{Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow, bail};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

use crate::cancel::CancelToken;

/// How often the wait loop checks the cancel token.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How long the readers may keep draining once the child has been reaped.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Captured child process output.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub stdout_truncated: usize,
    pub stderr_truncated: usize,
    pub timed_out: bool,
    pub cancelled: bool,
    pub duration: Duration,
}

impl CommandOutput {
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    /// Exit code, or `None` when the child was killed or died from a signal.
    pub fn exit_code(&self) -> Option<i32> {
        if self.timed_out || self.cancelled {
            return None;
        }
        self.status.code()
    }
}

/// Run a command with a timeout and capture stdout/stderr without risking pipe deadlocks.
///
/// Output is read concurrently while the child runs. `output_limit_bytes` bounds the amount of
/// stdout/stderr stored in memory (bytes beyond this are discarded while still draining the pipe).
/// The child runs in its own process group; on timeout or cancellation the whole group is killed
/// and reaped before this function returns. Output still arriving after that is drained for at
/// most [`DRAIN_GRACE`], so a process that escaped the group cannot hold the call open.
#[instrument(skip_all, fields(timeout_secs = timeout.as_secs(), output_limit_bytes))]
pub fn run_command(
    mut cmd: Command,
    stdin: Option<Vec<u8>>,
    timeout: Duration,
    output_limit_bytes: usize,
    cancel: &CancelToken,
) -> Result<CommandOutput> {
    if stdin.is_some() {
        cmd.stdin(Stdio::piped());
    } else {
        cmd.stdin(Stdio::null());
    }
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    isolate_process_group(&mut cmd);

    debug!("spawning child process");
    let started = Instant::now();
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, "failed to spawn command");
            return Err(e).context("spawn command");
        }
    };

    let stdin_handle = match stdin {
        Some(input) => {
            let mut child_stdin = child
                .stdin
                .take()
                .ok_or_else(|| anyhow!("stdin was not piped"))?;
            Some(thread::spawn(move || {
                // A child that exits without reading its input closes the pipe early.
                if let Err(e) = child_stdin.write_all(&input) {
                    debug!(err = %e, "stdin closed before input was written");
                }
            }))
        }
        None => None,
    };

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    let (done_tx, done_rx) = mpsc::channel();
    let stdout_capture = spawn_reader(stdout, output_limit_bytes, done_tx.clone());
    let stderr_capture = spawn_reader(stderr, output_limit_bytes, done_tx);

    let deadline = started + timeout;
    let mut timed_out = false;
    let mut cancelled = false;
    let status = loop {
        if cancel.is_cancelled() {
            warn!("command cancelled, killing");
            cancelled = true;
            break terminate(&mut child)?;
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            warn!(
                timeout_secs = timeout.as_secs(),
                "command timed out, killing"
            );
            timed_out = true;
            break terminate(&mut child)?;
        }
        if let Some(status) = child
            .wait_timeout(remaining.min(POLL_INTERVAL))
            .context("wait for command")?
        {
            // Background processes left behind would keep the pipes open.
            kill_group(&child);
            break status;
        }
    };
    let duration = started.elapsed();

    drain_readers(&done_rx, 2)?;
    let (stdout, stdout_truncated) = take_capture(&stdout_capture);
    let (stderr, stderr_truncated) = take_capture(&stderr_capture);
    if let Some(handle) = stdin_handle {
        if !handle.is_finished() {
            // An escaped process may still hold the read end; leave the writer behind.
            debug!("stdin writer still blocked, detaching");
        } else if handle.join().is_err() {
            warn!("stdin writer thread panicked");
        }
    }

    if stdout_truncated > 0 || stderr_truncated > 0 {
        warn!(stdout_truncated, stderr_truncated, "output truncated");
    }

    debug!(exit_code = ?status.code(), timed_out, cancelled, "command finished");
    Ok(CommandOutput {
        status,
        stdout,
        stderr,
        stdout_truncated,
        stderr_truncated,
        timed_out,
        cancelled,
        duration,
    })
}

#[cfg(unix)]
fn isolate_process_group(cmd: &mut Command) {
    use std::os::unix::process::CommandExt;
    cmd.process_group(0);
}

#[cfg(not(unix))]
fn isolate_process_group(_cmd: &mut Command) {}

/// Kill the child (and on unix its whole process group) and reap it.
fn terminate(child: &mut Child) -> Result<ExitStatus> {
    kill_group(child);
    if let Err(e) = child.kill() {
        // Already exited between the last poll and the kill.
        debug!(err = %e, "kill after group kill");
    }
    child.wait().context("wait command after kill")
}

#[cfg(unix)]
fn kill_group(child: &Child) {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let Ok(pid) = i32::try_from(child.id()) else {
        return;
    };
    if let Err(e) = killpg(Pid::from_raw(pid), Signal::SIGKILL) {
        debug!(err = %e, "killpg failed");
    }
}

#[cfg(not(unix))]
fn kill_group(_child: &Child) {}

#[derive(Debug, Default)]
struct Captured {
    bytes: Vec<u8>,
    truncated: usize,
}

type SharedCapture = Arc<Mutex<Captured>>;

/// Read `reader` on its own thread into a shared buffer; EOF or a read error
/// is reported on `done`.
fn spawn_reader<R: Read + Send + 'static>(
    reader: R,
    limit: usize,
    done: mpsc::Sender<Result<()>>,
) -> SharedCapture {
    let capture = SharedCapture::default();
    let sink = Arc::clone(&capture);
    thread::spawn(move || {
        // The receiver is gone once the drain was abandoned.
        let _ = done.send(read_stream_limited(reader, limit, &sink));
    });
    capture
}

/// Wait for `readers` reader threads to reach EOF, for at most [`DRAIN_GRACE`].
///
/// A process that left the child's process group (`setsid`) inherits the
/// pipes and can keep them open indefinitely. Such readers are abandoned and
/// whatever they captured so far is kept.
fn drain_readers(done: &mpsc::Receiver<Result<()>>, readers: usize) -> Result<()> {
    let deadline = Instant::now() + DRAIN_GRACE;
    for _ in 0..readers {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match done.recv_timeout(remaining) {
            Ok(result) => result?,
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    grace_ms = DRAIN_GRACE.as_millis(),
                    "output pipes still open after the child exited, abandoning readers"
                );
                return Ok(());
            }
            Err(RecvTimeoutError::Disconnected) => bail!("output reader thread panicked"),
        }
    }
    Ok(())
}

fn take_capture(capture: &SharedCapture) -> (Vec<u8>, usize) {
    let mut captured = capture.lock().unwrap_or_else(PoisonError::into_inner);
    (std::mem::take(&mut captured.bytes), captured.truncated)
}

fn read_stream_limited<R: Read>(
    mut reader: R,
    limit: usize,
    capture: &Mutex<Captured>,
) -> Result<()> {
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            return Ok(());
        }
        let mut captured = capture.lock().unwrap_or_else(PoisonError::into_inner);
        let keep = n.min(limit.saturating_sub(captured.bytes.len()));
        captured.bytes.extend_from_slice(&chunk[..keep]);
        captured.truncated += n - keep;
    }
}
