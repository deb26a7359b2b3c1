//! Throttled pump implementation

use std::io::Cursor;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::AsyncReadExt;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::config::PumpConfig;
use crate::media::ProgramStream;
use crate::registry::ClientRegistry;

static NEXT_PUMP_ID: AtomicU64 = AtomicU64::new(1);

/// Unique pump identifier, strictly increasing in creation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PumpId(u64);

impl PumpId {
    fn next() -> Self {
        PumpId(NEXT_PUMP_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for PumpId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "pump-{}", self.0)
    }
}

/// How a pump's task ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpExit {
    /// Stopped on request (or its handle was dropped)
    Stopped,
    /// Upstream handed back by `quiesce()`
    Quiesced,
    /// Upstream reached end-of-data
    Drained,
    /// Upstream read failed
    Failed,
    /// Inlet dropped before an upstream was connected
    Disconnected,
    /// Task was aborted or panicked
    Aborted,
}

/// Upstream handed back by [`ThrottledPump::quiesce`]
pub struct Quiesced {
    /// Stream positioned at the first byte not yet broadcast
    pub upstream: ProgramStream,
    /// When that byte was due; a successor resumes pacing from here
    pub resume_at: Instant,
}

impl std::fmt::Debug for Quiesced {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Quiesced")
            .field("resume_at", &self.resume_at)
            .finish_non_exhaustive()
    }
}

enum PumpControl {
    Quiesce(oneshot::Sender<Quiesced>),
    Stop,
}

struct Upstream {
    source: ProgramStream,
    resume_at: Option<Instant>,
}

/// Connects an upstream to a pump created with [`ThrottledPump::pending`]
pub struct PumpInlet {
    tx: oneshot::Sender<Upstream>,
}

impl PumpInlet {
    /// Attach the upstream; pacing starts from this moment
    ///
    /// Returns the stream back if the pump is already gone.
    pub fn connect(self, source: ProgramStream) -> std::result::Result<(), ProgramStream> {
        self.send(source, None)
    }

    /// Attach the upstream, continuing a predecessor's pacing clock
    ///
    /// Nothing is released before `resume_at`. A deadline already in the past
    /// behaves like [`connect`](Self::connect).
    pub fn resume(
        self,
        source: ProgramStream,
        resume_at: Instant,
    ) -> std::result::Result<(), ProgramStream> {
        self.send(source, Some(resume_at))
    }

    fn send(
        self,
        source: ProgramStream,
        resume_at: Option<Instant>,
    ) -> std::result::Result<(), ProgramStream> {
        self.tx
            .send(Upstream { source, resume_at })
            .map_err(|upstream| upstream.source)
    }
}

/// Paces an upstream into the listener registry
///
/// Cumulative bytes broadcast never exceed `rate × elapsed` by more than one
/// chunk. Dropping the handle aborts the task, which drops (and so closes) the
/// upstream.
pub struct ThrottledPump {
    id: PumpId,
    bitrate_bps: u64,
    control: mpsc::Sender<PumpControl>,
    task: Option<JoinHandle<PumpExit>>,
}

impl ThrottledPump {
    /// Start pumping `source` at `bitrate_bps`
    ///
    /// A zero bitrate uses the configured fallback.
    pub fn spawn(
        source: ProgramStream,
        bitrate_bps: u64,
        config: &PumpConfig,
        registry: Arc<ClientRegistry>,
    ) -> Self {
        let (pump, inlet) = Self::pending(bitrate_bps, config, registry);
        // The receiving task is only gone once the handle is dropped or stopped
        if inlet.connect(source).is_err() {
            tracing::error!(pump = %pump.id, "Pump task gone before its upstream arrived");
        }
        pump
    }

    /// Create a pump whose upstream is connected later through the inlet
    pub fn pending(
        bitrate_bps: u64,
        config: &PumpConfig,
        registry: Arc<ClientRegistry>,
    ) -> (Self, PumpInlet) {
        let id = PumpId::next();
        let bytes_per_sec = config.byte_rate(bitrate_bps);
        let chunk_size = config.chunk_size(bytes_per_sec);

        let (control_tx, control_rx) = mpsc::channel(4);
        let (inlet_tx, inlet_rx) = oneshot::channel();

        let task = PumpTask {
            id,
            bytes_per_sec,
            chunk_size,
            control: control_rx,
            inlet: inlet_rx,
            registry,
        };

        tracing::debug!(
            pump = %id,
            bitrate = bitrate_bps,
            bytes_per_sec = bytes_per_sec,
            chunk_size = chunk_size,
            "Pump created"
        );

        let pump = Self {
            id,
            bitrate_bps,
            control: control_tx,
            task: Some(tokio::spawn(task.run())),
        };

        (pump, PumpInlet { tx: inlet_tx })
    }

    /// Identity of this pump
    pub fn id(&self) -> PumpId {
        self.id
    }

    /// Bitrate this pump was created with (before fallback substitution)
    pub fn bitrate(&self) -> u64 {
        self.bitrate_bps
    }

    /// Whether the pump's task has ended
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |t| t.is_finished())
    }

    /// Pause forward progress and take back the upstream
    ///
    /// Any chunk already read but not yet broadcast is put back in front of
    /// the returned stream, so nothing is skipped. An upstream that was
    /// connected but never read comes back whole. Returns `None` if the pump
    /// already ended (drained, failed, stopped) or was never connected.
    pub async fn quiesce(&mut self) -> Option<Quiesced> {
        let (tx, rx) = oneshot::channel();
        if self.control.send(PumpControl::Quiesce(tx)).await.is_err() {
            return None;
        }
        rx.await.ok()
    }

    /// End output and wait for the task to finish
    ///
    /// Once this returns the pump will never broadcast again.
    pub async fn stop(mut self) -> PumpExit {
        // Fails only if the task already ended, which is fine
        let _ = self.control.try_send(PumpControl::Stop);
        self.join().await
    }

    /// Wait for a pump that has already been quiesced or drained to finish
    pub async fn close(self) -> PumpExit {
        self.stop().await
    }

    async fn join(&mut self) -> PumpExit {
        match self.task.take() {
            Some(task) => task.await.unwrap_or(PumpExit::Aborted),
            None => PumpExit::Aborted,
        }
    }
}

impl Drop for ThrottledPump {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl std::fmt::Debug for ThrottledPump {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThrottledPump")
            .field("id", &self.id)
            .field("bitrate_bps", &self.bitrate_bps)
            .field("finished", &self.is_finished())
            .finish()
    }
}

struct PumpTask {
    id: PumpId,
    bytes_per_sec: u64,
    chunk_size: usize,
    control: mpsc::Receiver<PumpControl>,
    inlet: oneshot::Receiver<Upstream>,
    registry: Arc<ClientRegistry>,
}

impl PumpTask {
    async fn run(mut self) -> PumpExit {
        // An upstream that is already waiting wins over a control request
        let upstream = tokio::select! {
            biased;
            upstream = &mut self.inlet => match upstream {
                Ok(upstream) => upstream,
                Err(_) => return PumpExit::Disconnected,
            },
            cmd = self.control.recv() => {
                // The connect may have landed after the inlet was polled
                let upstream = self.inlet.try_recv().ok();
                return self.close_unconnected(cmd, upstream);
            }
        };

        self.pump(upstream.source, upstream.resume_at).await
    }

    fn close_unconnected(&self, cmd: Option<PumpControl>, upstream: Option<Upstream>) -> PumpExit {
        match (cmd, upstream) {
            (Some(PumpControl::Quiesce(reply)), Some(upstream)) => {
                let quiesced = Quiesced {
                    upstream: upstream.source,
                    resume_at: upstream.resume_at.unwrap_or_else(Instant::now),
                };
                if reply.send(quiesced).is_err() {
                    tracing::debug!(pump = %self.id, "Quiesce requester went away");
                }
                tracing::debug!(pump = %self.id, "Pump quiesced before first read");
                PumpExit::Quiesced
            }
            (Some(PumpControl::Quiesce(_)), None) => {
                // Nothing to hand back; dropping the reply yields `None`
                tracing::debug!(pump = %self.id, "Pump quiesced before upstream connected");
                PumpExit::Quiesced
            }
            _ => {
                tracing::debug!(pump = %self.id, "Pump stopped before first read");
                PumpExit::Stopped
            }
        }
    }

    async fn pump(&mut self, mut source: ProgramStream, resume_at: Option<Instant>) -> PumpExit {
        let now = Instant::now();
        let started = resume_at.map_or(now, |at| at.max(now));
        let mut sent: u64 = 0;
        let mut buf = vec![0u8; self.chunk_size];

        tracing::info!(pump = %self.id, bytes_per_sec = self.bytes_per_sec, "Pump started");

        loop {
            // Release the next chunk once the bytes already sent are due
            let due = started + Duration::from_secs_f64(sent as f64 / self.bytes_per_sec as f64);

            let chunk = tokio::select! {
                biased;
                cmd = self.control.recv() => return self.finish(cmd, source, None, due),
                read = source.read(&mut buf) => match read {
                    Ok(0) => {
                        tracing::info!(pump = %self.id, bytes = sent, "Upstream drained");
                        return PumpExit::Drained;
                    }
                    Ok(n) => Bytes::copy_from_slice(&buf[..n]),
                    Err(e) => {
                        tracing::warn!(pump = %self.id, error = %e, "Upstream read failed");
                        return PumpExit::Failed;
                    }
                },
            };

            tokio::select! {
                biased;
                cmd = self.control.recv() => return self.finish(cmd, source, Some(chunk), due),
                _ = tokio::time::sleep_until(due) => {}
            }

            sent += chunk.len() as u64;
            self.registry.broadcast(chunk).await;
        }
    }

    fn finish(
        &self,
        cmd: Option<PumpControl>,
        source: ProgramStream,
        pending: Option<Bytes>,
        due: Instant,
    ) -> PumpExit {
        match cmd {
            Some(PumpControl::Quiesce(reply)) => {
                let upstream: ProgramStream = match pending {
                    Some(chunk) => Box::new(Cursor::new(chunk).chain(source)),
                    None => source,
                };
                let quiesced = Quiesced {
                    upstream,
                    resume_at: due,
                };
                if reply.send(quiesced).is_err() {
                    tracing::debug!(pump = %self.id, "Quiesce requester went away");
                }
                tracing::debug!(pump = %self.id, "Pump quiesced");
                PumpExit::Quiesced
            }
            Some(PumpControl::Stop) | None => {
                tracing::info!(pump = %self.id, "Pump stopped");
                PumpExit::Stopped
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use tokio::sync::mpsc::error::TryRecvError;

    use super::*;
    use crate::registry::Listener;

    /// 80 kbit/s = 10 kB/s, so 1000 byte chunks at the default 100ms tick
    const TEST_BITRATE: u64 = 80_000;

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    fn source(data: Vec<u8>) -> ProgramStream {
        Box::new(Cursor::new(data))
    }

    fn drain(listener: &mut Listener) -> Vec<u8> {
        let mut out = Vec::new();
        while let Ok(chunk) = listener.try_recv() {
            out.extend_from_slice(&chunk);
        }
        out
    }

    #[test]
    fn test_pump_ids_increase() {
        let a = PumpId::next();
        let b = PumpId::next();
        assert!(b > a);
        assert_eq!(a.to_string(), format!("pump-{}", a.as_u64()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pump_paces_at_bitrate() {
        let registry = Arc::new(ClientRegistry::new());
        let mut listener = registry.register().await;
        let data = pattern(5_000);

        let started = Instant::now();
        let pump = ThrottledPump::spawn(
            source(data.clone()),
            TEST_BITRATE,
            &PumpConfig::default(),
            Arc::clone(&registry),
        );

        let mut received = Vec::new();
        while received.len() < data.len() {
            let chunk = listener.recv().await.unwrap();
            assert!(chunk.len() <= 1_000);

            // Never ahead of real time by more than one chunk
            let allowed = 10_000.0 * started.elapsed().as_secs_f64() + 1_000.0;
            received.extend_from_slice(&chunk);
            assert!(received.len() as f64 <= allowed + 1.0);
        }

        // Five chunks: the first goes out immediately, the last after 400ms
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(400));
        assert!(elapsed < Duration::from_millis(500));
        assert_eq!(received, data);

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(pump.is_finished());
        assert_eq!(pump.close().await, PumpExit::Drained);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_bitrate_uses_fallback() {
        let registry = Arc::new(ClientRegistry::new());
        let mut listener = registry.register().await;
        let config = PumpConfig::default().fallback_bitrate(TEST_BITRATE);

        let pump = ThrottledPump::spawn(source(pattern(10_000)), 0, &config, Arc::clone(&registry));

        let chunk = listener.recv().await.unwrap();
        assert_eq!(chunk.len(), 1_000);
        assert_eq!(pump.bitrate(), 0);
        pump.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_ends_output() {
        let registry = Arc::new(ClientRegistry::new());
        let mut listener = registry.register().await;

        let pump = ThrottledPump::spawn(
            source(pattern(1_000_000)),
            TEST_BITRATE,
            &PumpConfig::default(),
            Arc::clone(&registry),
        );

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(pump.stop().await, PumpExit::Stopped);

        let before = drain(&mut listener);
        assert!(!before.is_empty());
        assert!(before.len() <= 4_000);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(matches!(listener.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_quiesce_returns_remaining_bytes() {
        let registry = Arc::new(ClientRegistry::new());
        let mut listener = registry.register().await;
        let data = pattern(10_000);

        let mut pump = ThrottledPump::spawn(
            source(data.clone()),
            TEST_BITRATE,
            &PumpConfig::default(),
            Arc::clone(&registry),
        );

        listener.recv().await.unwrap();
        listener.recv().await.unwrap();

        let mut upstream = pump.quiesce().await.unwrap().upstream;
        assert_eq!(pump.close().await, PumpExit::Quiesced);

        let mut rest = Vec::new();
        upstream.read_to_end(&mut rest).await.unwrap();

        let mut received = drain(&mut listener);
        received.extend_from_slice(&rest);
        assert_eq!(received, data);
    }

    #[tokio::test(start_paused = true)]
    async fn test_quiesce_after_drain() {
        let registry = Arc::new(ClientRegistry::new());
        let mut pump = ThrottledPump::spawn(
            source(pattern(10)),
            TEST_BITRATE,
            &PumpConfig::default(),
            Arc::clone(&registry),
        );

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(pump.is_finished());
        assert!(pump.quiesce().await.is_none());
        assert_eq!(pump.close().await, PumpExit::Drained);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_pump_starts_on_connect() {
        let registry = Arc::new(ClientRegistry::new());
        let mut listener = registry.register().await;

        let (pump, inlet) =
            ThrottledPump::pending(TEST_BITRATE, &PumpConfig::default(), Arc::clone(&registry));

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(matches!(listener.try_recv(), Err(TryRecvError::Empty)));
        assert!(!pump.is_finished());

        assert!(inlet.connect(source(b"late upstream".to_vec())).is_ok());
        assert_eq!(listener.recv().await.unwrap(), Bytes::from_static(b"late upstream"));

        pump.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_pump_quiesce_before_connect() {
        let registry = Arc::new(ClientRegistry::new());
        let (mut pump, inlet) =
            ThrottledPump::pending(TEST_BITRATE, &PumpConfig::default(), Arc::clone(&registry));

        assert!(pump.quiesce().await.is_none());
        assert_eq!(pump.close().await, PumpExit::Quiesced);
        assert!(inlet.connect(source(vec![1, 2, 3])).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_quiesce_before_first_read() {
        let registry = Arc::new(ClientRegistry::new());
        let mut listener = registry.register().await;
        let data = pattern(3_000);

        // Connected but never polled: the upstream must come back whole
        let mut pump = ThrottledPump::spawn(
            source(data.clone()),
            TEST_BITRATE,
            &PumpConfig::default(),
            Arc::clone(&registry),
        );
        let quiesced = pump.quiesce().await.unwrap();
        assert_eq!(pump.close().await, PumpExit::Quiesced);

        let mut rest = Vec::new();
        let mut upstream = quiesced.upstream;
        upstream.read_to_end(&mut rest).await.unwrap();
        assert_eq!(rest, data);
        assert!(matches!(listener.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_continues_pacing_clock() {
        let registry = Arc::new(ClientRegistry::new());
        let mut listener = registry.register().await;
        let data = pattern(10_000);
        let config = PumpConfig::default();

        let started = Instant::now();
        let mut first =
            ThrottledPump::spawn(source(data.clone()), TEST_BITRATE, &config, Arc::clone(&registry));
        assert_eq!(listener.recv().await.unwrap().len(), 1_000);

        tokio::time::sleep(Duration::from_millis(10)).await;
        let quiesced = first.quiesce().await.unwrap();
        let lead = quiesced.resume_at - started;
        assert!(lead > Duration::from_millis(99) && lead <= Duration::from_millis(100));
        first.close().await;

        let (second, inlet) = ThrottledPump::pending(TEST_BITRATE, &config, Arc::clone(&registry));
        assert!(inlet.resume(quiesced.upstream, quiesced.resume_at).is_ok());

        // The first pump's lead is honoured: nothing more before 100ms
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(matches!(listener.try_recv(), Err(TryRecvError::Empty)));

        listener.recv().await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(100));

        tokio::time::sleep(Duration::from_millis(250)).await;
        let received = 2_000 + drain(&mut listener).len();
        let allowed = 10_000.0 * started.elapsed().as_secs_f64() + 1_000.0;
        assert!(received as f64 <= allowed);

        second.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_in_the_past_starts_now() {
        let registry = Arc::new(ClientRegistry::new());
        let mut listener = registry.register().await;
        let then = Instant::now();
        tokio::time::sleep(Duration::from_secs(5)).await;

        let (pump, inlet) =
            ThrottledPump::pending(TEST_BITRATE, &PumpConfig::default(), Arc::clone(&registry));
        assert!(inlet.resume(source(pattern(10_000)), then).is_ok());

        // No catch-up burst for the time before the resume
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(drain(&mut listener).len(), 2_000);
        pump.stop().await;
    }

    #[tokio::test]
    async fn test_connect_after_pump_gone_returns_stream() {
        let registry = Arc::new(ClientRegistry::new());
        let (pump, inlet) =
            ThrottledPump::pending(TEST_BITRATE, &PumpConfig::default(), Arc::clone(&registry));
        assert_eq!(pump.stop().await, PumpExit::Stopped);

        let mut back = match inlet.connect(source(b"keep me".to_vec())) {
            Ok(()) => panic!("connect to a stopped pump succeeded"),
            Err(stream) => stream,
        };
        let mut buf = Vec::new();
        back.read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf, b"keep me");
    }

    #[tokio::test]
    async fn test_dropped_inlet_disconnects() {
        let registry = Arc::new(ClientRegistry::new());
        let (pump, inlet) =
            ThrottledPump::pending(TEST_BITRATE, &PumpConfig::default(), Arc::clone(&registry));

        drop(inlet);
        assert_eq!(pump.close().await, PumpExit::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_error_fails_pump() {
        let registry = Arc::new(ClientRegistry::new());
        let mut listener = registry.register().await;

        let mock = tokio_test::io::Builder::new()
            .read(b"abc")
            .read_error(io::Error::new(io::ErrorKind::BrokenPipe, "mixer died"))
            .build();

        let pump = ThrottledPump::spawn(
            Box::new(mock),
            TEST_BITRATE,
            &PumpConfig::default(),
            Arc::clone(&registry),
        );

        assert_eq!(listener.recv().await.unwrap(), Bytes::from_static(b"abc"));

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(pump.is_finished());
        assert_eq!(pump.close().await, PumpExit::Failed);
    }
}
