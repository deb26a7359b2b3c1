//! Sound-effect mixing
//!
//! Mixing is delegated to an external audio engine. The program stream is
//! written into the engine's stdin by a dedicated task while the engine's
//! stdout is read by the downstream pump:
//!
//! ```text
//!   program ──feed task──► [sox -m - effect.mp3 -] ──stdout──► ThrottledPump
//!                                     ▲
//!                               effect asset
//! ```
//!
//! The two legs progress independently. Servicing only one side of a
//! subprocess would stall as soon as the OS pipe buffer on the other side
//! filled up.
//!
//! A mix only counts as started once the engine has produced output. An
//! engine that exits or stays silent is rejected like a failed launch, with
//! the program handed back.

pub mod error;
pub mod sox;

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

pub use error::MixError;
pub use sox::{MixedStream, SoxMixer};

use crate::media::ProgramStream;

/// Default gain applied to the program
pub const DEFAULT_PROGRAM_GAIN: f32 = 0.99;

/// Default gain applied to the effect
pub const DEFAULT_EFFECT_GAIN: f32 = 0.1;

/// Per-input gains for a mix
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MixGains {
    /// Volume of the running program
    pub program: f32,
    /// Volume of the injected effect
    pub effect: f32,
}

impl Default for MixGains {
    fn default() -> Self {
        Self {
            program: DEFAULT_PROGRAM_GAIN,
            effect: DEFAULT_EFFECT_GAIN,
        }
    }
}

/// Blends an effect asset into a running program stream
pub trait AudioMixer: Send + Sync + 'static {
    /// Produce the combined stream
    ///
    /// On failure the untouched program stream comes back inside
    /// [`MixRejected`] so the caller can keep broadcasting it.
    fn mix(
        &self,
        program: ProgramStream,
        effect: &Path,
        gains: MixGains,
    ) -> impl Future<Output = Result<ProgramStream, MixRejected>> + Send;
}

impl<T: AudioMixer> AudioMixer for Arc<T> {
    async fn mix(
        &self,
        program: ProgramStream,
        effect: &Path,
        gains: MixGains,
    ) -> Result<ProgramStream, MixRejected> {
        (**self).mix(program, effect, gains).await
    }
}

/// A mix that could not be started, with the program handed back
pub struct MixRejected {
    /// The program stream from the first byte the mixer did not take
    pub program: ProgramStream,
    /// Why the mixer could not start
    pub error: MixError,
}

impl MixRejected {
    pub fn new(program: ProgramStream, error: MixError) -> Self {
        Self { program, error }
    }

    /// Split into the recovered program and the error
    pub fn into_parts(self) -> (ProgramStream, MixError) {
        (self.program, self.error)
    }
}

impl std::fmt::Debug for MixRejected {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MixRejected")
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}
