//! Bitrate probing
//!
//! The pump needs the program's real bitrate to pace it. Probing goes through
//! an external tool and is treated as unreliable: [`resolve_bitrate`] turns any
//! failure into the configured fallback and a warning, so callers always get a
//! usable rate.

pub mod bitrate;
pub mod sox;

use std::future::Future;
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub use bitrate::parse_bitrate;
pub use sox::SoxProbe;

/// Measures the approximate bitrate of an asset
pub trait BitrateProbe: Send + Sync + 'static {
    /// Probe `asset`, returning bits/second
    fn probe(&self, asset: &Path) -> impl Future<Output = Result<u64, ProbeError>> + Send;
}

impl<T: BitrateProbe> BitrateProbe for Arc<T> {
    async fn probe(&self, asset: &Path) -> Result<u64, ProbeError> {
        (**self).probe(asset).await
    }
}

/// Why a probe produced no bitrate
#[derive(Debug)]
pub enum ProbeError {
    /// The prober could not be started
    Launch(io::Error),
    /// The prober did not finish in time
    Timeout(Duration),
    /// The prober wrote to its error channel
    Reported(String),
    /// The prober exited unsuccessfully
    Exit(Option<i32>),
    /// Output did not look like a bitrate
    Unparseable(String),
}

impl std::fmt::Display for ProbeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeError::Launch(e) => write!(f, "failed to launch prober: {}", e),
            ProbeError::Timeout(d) => write!(f, "prober timed out after {:?}", d),
            ProbeError::Reported(msg) => write!(f, "prober error: {}", msg),
            ProbeError::Exit(Some(code)) => write!(f, "prober exited with status {}", code),
            ProbeError::Exit(None) => write!(f, "prober killed by signal"),
            ProbeError::Unparseable(out) => write!(f, "unparseable bitrate: {:?}", out),
        }
    }
}

impl std::error::Error for ProbeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProbeError::Launch(e) => Some(e),
            _ => None,
        }
    }
}

/// Probe an asset, falling back to `fallback_bps` on any failure
pub async fn resolve_bitrate<P: BitrateProbe>(probe: &P, asset: &Path, fallback_bps: u64) -> u64 {
    match probe.probe(asset).await {
        Ok(bps) if bps > 0 => {
            tracing::debug!(asset = %asset.display(), bitrate = bps, "Bitrate probed");
            bps
        }
        Ok(_) => {
            tracing::warn!(
                asset = %asset.display(),
                fallback = fallback_bps,
                "Prober reported zero bitrate, using fallback"
            );
            fallback_bps
        }
        Err(e) => {
            tracing::warn!(
                asset = %asset.display(),
                error = %e,
                fallback = fallback_bps,
                "Bitrate probe failed, using fallback"
            );
            fallback_bps
        }
    }
}
