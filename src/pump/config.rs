//! Pump pacing configuration

use std::time::Duration;

/// Default bitrate when none could be measured (bits/sec)
pub const DEFAULT_FALLBACK_BITRATE: u64 = 128_000;

/// Bits per byte, used to turn a bitrate into a byte rate
pub const DEFAULT_BITRATE_DIVISOR: u64 = 8;

/// Default pacing granularity
pub const DEFAULT_PACING_TICK: Duration = Duration::from_millis(100);

/// Pacing parameters for a [`ThrottledPump`](super::ThrottledPump)
#[derive(Debug, Clone)]
pub struct PumpConfig {
    /// Pacing granularity; one chunk is one tick's worth of bytes
    pub tick: Duration,

    /// Bitrate used when a pump is created with a zero bitrate
    pub fallback_bitrate: u64,

    /// Divisor from bits/sec to bytes/sec
    pub bitrate_divisor: u64,
}

impl Default for PumpConfig {
    fn default() -> Self {
        Self {
            tick: DEFAULT_PACING_TICK,
            fallback_bitrate: DEFAULT_FALLBACK_BITRATE,
            bitrate_divisor: DEFAULT_BITRATE_DIVISOR,
        }
    }
}

impl PumpConfig {
    /// Set the pacing tick (minimum 1ms)
    pub fn tick(mut self, tick: Duration) -> Self {
        self.tick = tick.max(Duration::from_millis(1));
        self
    }

    /// Set the fallback bitrate
    pub fn fallback_bitrate(mut self, bps: u64) -> Self {
        self.fallback_bitrate = bps;
        self
    }

    /// Bytes per second for a bitrate, substituting the fallback for zero
    pub fn byte_rate(&self, bitrate_bps: u64) -> u64 {
        let bps = if bitrate_bps == 0 {
            self.fallback_bitrate
        } else {
            bitrate_bps
        };
        (bps / self.bitrate_divisor.max(1)).max(1)
    }

    /// Chunk size for a byte rate: one tick's worth, at least one byte
    pub fn chunk_size(&self, bytes_per_sec: u64) -> usize {
        let bytes = bytes_per_sec as u128 * self.tick.as_millis() / 1000;
        (bytes as usize).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PumpConfig::default();
        assert_eq!(config.tick, Duration::from_millis(100));
        assert_eq!(config.fallback_bitrate, 128_000);
        assert_eq!(config.bitrate_divisor, 8);
    }

    #[test]
    fn test_byte_rate() {
        let config = PumpConfig::default();
        assert_eq!(config.byte_rate(128_000), 16_000);
        assert_eq!(config.byte_rate(64_000), 8_000);
    }

    #[test]
    fn test_byte_rate_zero_uses_fallback() {
        let config = PumpConfig::default().fallback_bitrate(256_000);
        assert_eq!(config.byte_rate(0), 32_000);
    }

    #[test]
    fn test_chunk_size() {
        let config = PumpConfig::default();
        // 16 kB/s at 100ms ticks
        assert_eq!(config.chunk_size(16_000), 1_600);
        assert_eq!(config.chunk_size(1), 1);
    }

    #[test]
    fn test_tick_floor() {
        let config = PumpConfig::default().tick(Duration::ZERO);
        assert_eq!(config.tick, Duration::from_millis(1));
    }
}
