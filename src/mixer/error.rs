//! Mixer error types

use std::io;
use std::time::Duration;

/// Why a mix could not be put on air
#[derive(Debug)]
pub enum MixError {
    /// The mixing engine could not be spawned
    Launch(io::Error),
    /// The engine started without the expected pipe
    MissingPipe(&'static str),
    /// The engine exited before producing any output
    Exited(Option<i32>),
    /// The engine produced no output within the startup window
    Stalled(Duration),
    /// Reading the engine's first output failed
    Output(io::Error),
}

impl std::fmt::Display for MixError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MixError::Launch(e) => write!(f, "failed to launch mixer: {}", e),
            MixError::MissingPipe(pipe) => write!(f, "mixer has no {} pipe", pipe),
            MixError::Exited(Some(code)) => {
                write!(f, "mixer exited with status {} before producing output", code)
            }
            MixError::Exited(None) => write!(f, "mixer was killed before producing output"),
            MixError::Stalled(d) => write!(f, "mixer produced no output within {:?}", d),
            MixError::Output(e) => write!(f, "failed to read mixer output: {}", e),
        }
    }
}

impl std::error::Error for MixError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MixError::Launch(e) | MixError::Output(e) => Some(e),
            _ => None,
        }
    }
}
