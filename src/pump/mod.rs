//! Real-time pacing of a byte stream
//!
//! A [`ThrottledPump`] owns an upstream [`ProgramStream`](crate::media::ProgramStream)
//! and releases it into the [`ClientRegistry`](crate::registry::ClientRegistry)
//! no faster than the stream's playback bitrate.
//!
//! # Lifecycle
//!
//! ```text
//!   pending ──connect()──► running ──┬── stop()     ──► Stopped
//!                                    ├── quiesce()  ──► Quiesced (upstream and pacing clock handed back)
//!                                    ├── EOF        ──► Drained
//!                                    └── read error ──► Failed
//! ```
//!
//! Control requests race both the source read and the pacing sleep, so they
//! take effect within one tick.

pub mod config;
pub mod throttle;

pub use config::PumpConfig;
pub use throttle::{PumpExit, PumpId, PumpInlet, Quiesced, ThrottledPump};
