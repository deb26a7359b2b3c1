//! sox-backed mixer

use std::ffi::OsString;
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::Stdio;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt, ReadBuf};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use super::error::MixError;
use super::{AudioMixer, MixGains, MixRejected};
use crate::media::ProgramStream;

/// Default bound on the wait for a mix's first output
pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(2);

/// Size of the first output read, and of each program chunk fed to the engine
const PIPE_CHUNK: usize = 8192;

/// Mixes with `sox -m`, reading the program from stdin and writing to stdout
#[derive(Debug, Clone)]
pub struct SoxMixer {
    program: PathBuf,
    format: String,
    startup_timeout: Duration,
}

impl SoxMixer {
    /// Create a mixer running `program` on streams of type `format` (e.g. "mp3")
    pub fn new(program: impl Into<PathBuf>, format: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            format: format.into(),
            startup_timeout: DEFAULT_STARTUP_TIMEOUT,
        }
    }

    /// Set how long a new mix may take to produce its first bytes
    pub fn startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }

    /// Command-line arguments for one mix
    ///
    /// `-t <fmt> -v <program gain> -m - -t <fmt> -v <effect gain> <effect> -t <fmt> -`
    pub fn args(&self, effect: &Path, gains: MixGains) -> Vec<OsString> {
        vec![
            "-t".into(),
            self.format.clone().into(),
            "-v".into(),
            gains.program.to_string().into(),
            "-m".into(),
            "-".into(),
            "-t".into(),
            self.format.clone().into(),
            "-v".into(),
            gains.effect.to_string().into(),
            effect.as_os_str().to_owned(),
            "-t".into(),
            self.format.clone().into(),
            "-".into(),
        ]
    }
}

impl AudioMixer for SoxMixer {
    async fn mix(
        &self,
        program: ProgramStream,
        effect: &Path,
        gains: MixGains,
    ) -> Result<ProgramStream, MixRejected> {
        let mut cmd = Command::new(&self.program);
        cmd.args(self.args(effect, gains));

        let mixed = MixedStream::spawn(cmd, program, effect, self.startup_timeout).await?;
        Ok(Box::new(mixed))
    }
}

/// Output of a running mix
///
/// Reads come straight from the engine's stdout. The stream owns the child
/// and the task feeding its stdin: dropping it aborts the feed (which drops
/// the upstream program) and kills the child.
pub struct MixedStream {
    head: Bytes,
    stdout: ChildStdout,
    child: Child,
    feed: JoinHandle<Option<ProgramStream>>,
    // Held for the life of the stream; dropping it halts the feed
    _halt: oneshot::Sender<()>,
    effect: PathBuf,
}

impl MixedStream {
    /// Launch `cmd` with piped stdio, start feeding `program` into it, and
    /// wait for its first output
    ///
    /// An engine that exits or stays silent for `startup` is treated like a
    /// failed launch: it is killed and the unfed rest of the program comes
    /// back in the [`MixRejected`]. Bytes already in the engine's stdin pipe
    /// are lost.
    pub async fn spawn(
        mut cmd: Command,
        program: ProgramStream,
        effect: &Path,
        startup: Duration,
    ) -> Result<Self, MixRejected> {
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => return Err(MixRejected::new(program, MixError::Launch(e))),
        };

        // `child` is dropped (and killed) on the error paths below
        let stdin = match child.stdin.take() {
            Some(stdin) => stdin,
            None => return Err(MixRejected::new(program, MixError::MissingPipe("stdin"))),
        };
        let mut stdout = match child.stdout.take() {
            Some(stdout) => stdout,
            None => return Err(MixRejected::new(program, MixError::MissingPipe("stdout"))),
        };

        let pid = child.id();
        let effect = effect.to_path_buf();
        tracing::info!(pid = ?pid, effect = %effect.display(), "Mixer started");

        let (halt_tx, halt_rx) = oneshot::channel();
        let feed = tokio::spawn(feed(program, stdin, halt_rx, pid));

        let mut head = vec![0u8; PIPE_CHUNK];
        let error = match tokio::time::timeout(startup, stdout.read(&mut head)).await {
            Ok(Ok(n)) if n > 0 => {
                head.truncate(n);
                return Ok(Self {
                    head: Bytes::from(head),
                    stdout,
                    child,
                    feed,
                    _halt: halt_tx,
                    effect,
                });
            }
            Ok(Ok(_)) => None,
            Ok(Err(e)) => Some(MixError::Output(e)),
            Err(_) => Some(MixError::Stalled(startup)),
        };

        let _ = child.start_kill();
        let status = child.wait().await.ok();
        let error = error.unwrap_or(MixError::Exited(status.and_then(|s| s.code())));

        // Halt the feed and take back whatever it had not yet written
        let _ = halt_tx.send(());
        let program: ProgramStream = match feed.await {
            Ok(Some(program)) => program,
            _ => Box::new(tokio::io::empty()),
        };

        tracing::warn!(pid = ?pid, effect = %effect.display(), error = %error, "Mixer failed to start");
        Err(MixRejected::new(program, error))
    }

    /// OS process id of the engine, if still running
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// Effect asset being mixed in
    pub fn effect(&self) -> &Path {
        &self.effect
    }
}

/// Copy the program into the engine until it ends or the feed is halted
///
/// Returns the unfed remainder when halted or when the engine stops reading.
async fn feed(
    mut program: ProgramStream,
    mut stdin: ChildStdin,
    mut halt: oneshot::Receiver<()>,
    pid: Option<u32>,
) -> Option<ProgramStream> {
    let mut buf = vec![0u8; PIPE_CHUNK];
    let mut fed: u64 = 0;

    loop {
        let n = tokio::select! {
            biased;
            _ = &mut halt => return Some(program),
            read = program.read(&mut buf) => match read {
                Ok(0) => {
                    // Closing stdin lets the engine flush and exit
                    let _ = stdin.shutdown().await;
                    tracing::debug!(pid = ?pid, bytes = fed, "Program fully fed to mixer");
                    return None;
                }
                Ok(n) => n,
                Err(e) => {
                    tracing::debug!(pid = ?pid, error = %e, "Program read failed, mixer feed ended");
                    return None;
                }
            },
        };

        let chunk = Bytes::copy_from_slice(&buf[..n]);
        let written = tokio::select! {
            biased;
            _ = &mut halt => false,
            res = stdin.write_all(&chunk) => match res {
                Ok(()) => true,
                Err(e) => {
                    tracing::debug!(pid = ?pid, error = %e, "Mixer stopped reading");
                    false
                }
            },
        };

        if !written {
            return Some(Box::new(Cursor::new(chunk).chain(program)));
        }
        fed += n as u64;
    }
}

impl AsyncRead for MixedStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();

        if !this.head.is_empty() {
            let n = this.head.len().min(buf.remaining());
            buf.put_slice(&this.head.split_to(n));
            return Poll::Ready(Ok(()));
        }

        let before = buf.filled().len();
        let poll = Pin::new(&mut this.stdout).poll_read(cx, buf);

        if let Poll::Ready(Ok(())) = poll {
            if buf.filled().len() == before && buf.remaining() > 0 {
                // EOF: reap the engine now rather than leaving it to drop
                match this.child.try_wait() {
                    Ok(Some(status)) => {
                        tracing::debug!(status = %status, effect = %this.effect.display(), "Mixer exited")
                    }
                    Ok(None) => {}
                    Err(e) => tracing::debug!(error = %e, "Failed to reap mixer"),
                }
            }
        }

        poll
    }
}

impl Drop for MixedStream {
    fn drop(&mut self) {
        self.feed.abort();
        // kill_on_drop handles the child itself; this only makes it prompt
        let _ = self.child.start_kill();
    }
}

impl std::fmt::Debug for MixedStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MixedStream")
            .field("pid", &self.child.id())
            .field("effect", &self.effect)
            .finish_non_exhaustive()
    }
}
