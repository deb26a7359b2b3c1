//! Session configuration

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::mixer::sox::DEFAULT_STARTUP_TIMEOUT;
use crate::mixer::MixGains;
use crate::pump::PumpConfig;
use crate::registry::RegistryConfig;

/// Broadcast configuration options
#[derive(Debug, Clone)]
pub struct BroadcastConfig {
    /// Program asset broadcast by `start()`
    pub program: PathBuf,

    /// Directory holding effect assets
    pub fx_dir: PathBuf,

    /// Program and effect volumes used when mixing
    pub gains: MixGains,

    /// Pacing (tick, fallback bitrate, divisor)
    pub pump: PumpConfig,

    /// Listener buffering
    pub registry: RegistryConfig,

    /// Path of the external audio tool used for probing and mixing
    pub sox_program: PathBuf,

    /// Audio type tag passed to the mixer for every stream
    pub audio_format: String,

    /// Upper bound on a single bitrate probe
    pub probe_timeout: Duration,

    /// How long a new mix may take to produce its first bytes
    pub mix_startup_timeout: Duration,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self::from_audio_dir("audio")
    }
}

impl BroadcastConfig {
    /// Layout rooted at an audio directory: `songs/conversation.mp3` and `fx/`
    pub fn from_audio_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            program: dir.join("songs").join("conversation.mp3"),
            fx_dir: dir.join("fx"),
            gains: MixGains::default(),
            pump: PumpConfig::default(),
            registry: RegistryConfig::default(),
            sox_program: PathBuf::from("sox"),
            audio_format: "mp3".to_string(),
            probe_timeout: Duration::from_secs(5),
            mix_startup_timeout: DEFAULT_STARTUP_TIMEOUT,
        }
    }

    /// Set the program asset
    pub fn program(mut self, path: impl Into<PathBuf>) -> Self {
        self.program = path.into();
        self
    }

    /// Set the effects directory
    pub fn fx_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.fx_dir = dir.into();
        self
    }

    /// Set the program gain (clamped to 0.0..=1.0)
    pub fn program_gain(mut self, gain: f32) -> Self {
        self.gains.program = gain.clamp(0.0, 1.0);
        self
    }

    /// Set the effect gain (clamped to 0.0..=1.0)
    pub fn effect_gain(mut self, gain: f32) -> Self {
        self.gains.effect = gain.clamp(0.0, 1.0);
        self
    }

    /// Set the bitrate used when probing fails
    pub fn fallback_bitrate(mut self, bps: u64) -> Self {
        self.pump = self.pump.fallback_bitrate(bps);
        self
    }

    /// Set the pacing tick
    pub fn pacing_tick(mut self, tick: Duration) -> Self {
        self.pump = self.pump.tick(tick);
        self
    }

    /// Set the per-listener buffer, in chunks
    pub fn listener_buffer(mut self, chunks: usize) -> Self {
        self.registry = self.registry.listener_buffer(chunks);
        self
    }

    /// Set the external audio tool
    pub fn sox_program(mut self, path: impl Into<PathBuf>) -> Self {
        self.sox_program = path.into();
        self
    }

    /// Set the audio type tag
    pub fn audio_format(mut self, format: impl Into<String>) -> Self {
        self.audio_format = format.into();
        self
    }

    /// Set the probe timeout
    pub fn probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Set the mixer startup timeout
    pub fn mix_startup_timeout(mut self, timeout: Duration) -> Self {
        self.mix_startup_timeout = timeout;
        self
    }
}
