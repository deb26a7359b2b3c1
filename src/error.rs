//! Error types
//!
//! Failures that can reach a command caller. Probe failures and listener
//! delivery failures are recovered where they happen and never show up here.

use std::io;
use std::path::PathBuf;

use crate::mixer::MixError;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug)]
pub enum Error {
    /// The program asset could not be opened, or the active stream has run dry
    SourceUnavailable {
        /// Asset that was requested
        asset: PathBuf,
        /// Underlying I/O error, if any
        source: Option<io::Error>,
    },
    /// Effect lookup found no asset matching the name
    EffectNotFound(String),
    /// Command matched neither a transport command nor an effect
    UnknownCommand(String),
    /// Effect is valid but nothing is being broadcast
    NotBroadcasting,
    /// The external mixer could not be started
    Mix(MixError),
    /// Other I/O error (effect directory listing etc.)
    Io(io::Error),
}

impl Error {
    /// Create a source-unavailable error for an asset
    pub fn source_unavailable(asset: impl Into<PathBuf>, source: Option<io::Error>) -> Self {
        Error::SourceUnavailable {
            asset: asset.into(),
            source,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::SourceUnavailable { asset, source } => match source {
                Some(e) => write!(f, "Source unavailable: {} ({})", asset.display(), e),
                None => write!(f, "Source unavailable: {}", asset.display()),
            },
            Error::EffectNotFound(name) => write!(f, "the effect {} wasn't found", name),
            Error::UnknownCommand(cmd) => write!(f, "Unknown command: {:?}", cmd),
            Error::NotBroadcasting => write!(f, "Broadcast is not running"),
            Error::Mix(e) => write!(f, "Mix failure: {}", e),
            Error::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::SourceUnavailable {
                source: Some(e), ..
            } => Some(e),
            Error::Mix(e) => Some(e),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<MixError> for Error {
    fn from(e: MixError) -> Self {
        Error::Mix(e)
    }
}
