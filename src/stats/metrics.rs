//! Statistics and metrics for the broadcast pipeline

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Live counters shared between the registry and the session
///
/// All counters are monotonic and updated with relaxed atomics; read them
/// through [`BroadcastStats::snapshot`].
#[derive(Debug)]
pub struct BroadcastStats {
    started_at: Instant,
    bytes_broadcast: AtomicU64,
    chunks_broadcast: AtomicU64,
    listeners_joined: AtomicU64,
    listeners_dropped: AtomicU64,
    splices: AtomicU64,
    mix_failures: AtomicU64,
}

impl BroadcastStats {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            bytes_broadcast: AtomicU64::new(0),
            chunks_broadcast: AtomicU64::new(0),
            listeners_joined: AtomicU64::new(0),
            listeners_dropped: AtomicU64::new(0),
            splices: AtomicU64::new(0),
            mix_failures: AtomicU64::new(0),
        }
    }

    pub(crate) fn record_chunk(&self, len: usize) {
        self.chunks_broadcast.fetch_add(1, Ordering::Relaxed);
        self.bytes_broadcast.fetch_add(len as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_join(&self) {
        self.listeners_joined.fetch_add(1, Ordering::Relaxed);
    }

    /// A listener was removed because its channel closed or overflowed
    pub(crate) fn record_drop(&self) {
        self.listeners_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_splice(&self) {
        self.splices.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_mix_failure(&self) {
        self.mix_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a point-in-time copy of all counters
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            uptime: self.started_at.elapsed(),
            bytes_broadcast: self.bytes_broadcast.load(Ordering::Relaxed),
            chunks_broadcast: self.chunks_broadcast.load(Ordering::Relaxed),
            listeners_joined: self.listeners_joined.load(Ordering::Relaxed),
            listeners_dropped: self.listeners_dropped.load(Ordering::Relaxed),
            splices: self.splices.load(Ordering::Relaxed),
            mix_failures: self.mix_failures.load(Ordering::Relaxed),
        }
    }
}

impl Default for BroadcastStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time view of [`BroadcastStats`]
#[derive(Debug, Clone, Default)]
pub struct StatsSnapshot {
    /// Time since the stats were created
    pub uptime: Duration,
    /// Total bytes handed to the fan-out
    pub bytes_broadcast: u64,
    /// Total chunks handed to the fan-out
    pub chunks_broadcast: u64,
    /// Listeners ever registered
    pub listeners_joined: u64,
    /// Listeners removed because they closed or fell behind
    pub listeners_dropped: u64,
    /// Completed effect splices
    pub splices: u64,
    /// Effect injections that failed to launch the mixer
    pub mix_failures: u64,
}

impl StatsSnapshot {
    /// Average outgoing bitrate (bits/sec) since creation
    pub fn bitrate(&self) -> u64 {
        let secs = self.uptime.as_secs();
        if secs > 0 {
            (self.bytes_broadcast * 8) / secs
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_new() {
        let snap = BroadcastStats::new().snapshot();
        assert_eq!(snap.bytes_broadcast, 0);
        assert_eq!(snap.chunks_broadcast, 0);
        assert_eq!(snap.listeners_joined, 0);
        assert_eq!(snap.listeners_dropped, 0);
        assert_eq!(snap.splices, 0);
        assert_eq!(snap.mix_failures, 0);
    }

    #[test]
    fn test_record_chunk() {
        let stats = BroadcastStats::new();
        stats.record_chunk(1600);
        stats.record_chunk(400);

        let snap = stats.snapshot();
        assert_eq!(snap.chunks_broadcast, 2);
        assert_eq!(snap.bytes_broadcast, 2000);
    }

    #[test]
    fn test_snapshot_bitrate() {
        let snap = StatsSnapshot {
            uptime: Duration::from_secs(10),
            bytes_broadcast: 1_000_000,
            ..Default::default()
        };

        // 1,000,000 bytes * 8 bits / 10 seconds = 800,000 bps
        assert_eq!(snap.bitrate(), 800_000);
    }

    #[test]
    fn test_snapshot_bitrate_zero_uptime() {
        let snap = StatsSnapshot {
            bytes_broadcast: 1_000_000,
            ..Default::default()
        };
        assert_eq!(snap.bitrate(), 0);
    }
}
