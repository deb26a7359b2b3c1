//! fx-radio: live audio broadcast with real-time sound effects
//!
//! One program stream is paced out to any number of listeners at its own
//! bitrate. While it plays, named sound effects can be mixed into it without
//! listeners seeing a gap or a reconnect.
//!
//! # Example
//!
//! ```no_run
//! use fx_radio::{BroadcastConfig, SoxSession};
//!
//! #[tokio::main]
//! async fn main() -> fx_radio::Result<()> {
//!     let session = SoxSession::from_config(BroadcastConfig::from_audio_dir("audio"));
//!     let mut listener = session.new_listener().await;
//!
//!     session.start().await?;
//!     session.inject_effect("applause").await?;
//!
//!     while let Some(chunk) = listener.recv().await {
//!         // write chunk to the client
//!         let _ = chunk;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Layout
//!
//! - [`registry`]: listener channels and fan-out
//! - [`pump`]: paces a stream into the registry
//! - [`mixer`]: external engine that blends an effect into a stream
//! - [`probe`]: bitrate detection
//! - [`session`]: the orchestrator and its command surface

pub mod error;
pub mod media;
pub mod mixer;
pub mod probe;
pub mod pump;
pub mod registry;
pub mod session;
pub mod stats;

#[cfg(test)]
pub(crate) mod test_util;

pub use error::{Error, Result};
pub use media::{AssetStore, FileStore, ProgramStream};
pub use mixer::{AudioMixer, MixGains, SoxMixer};
pub use probe::{BitrateProbe, SoxProbe};
pub use registry::{ClientRegistry, Listener, ListenerId};
pub use session::{
    BroadcastConfig, BroadcastSession, Command, CommandReply, CommandStatus, PipelineState,
    SoxSession,
};
pub use stats::StatsSnapshot;
