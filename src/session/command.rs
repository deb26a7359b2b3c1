//! Listener commands and their replies

use crate::error::{Error, Result};

/// A decoded listener command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Start the broadcast
    Start,
    /// Stop the broadcast
    Stop,
    /// Mix the named effect into the broadcast
    Effect(String),
}

impl Command {
    /// Interpret free-form command text
    ///
    /// Anything mentioning "start" or "stop" (any case) is a transport
    /// command; any other non-blank text names an effect.
    pub fn parse(text: &str) -> Result<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(Error::UnknownCommand(text.to_string()));
        }

        let lower = trimmed.to_lowercase();
        if lower.contains("start") {
            Ok(Command::Start)
        } else if lower.contains("stop") {
            Ok(Command::Stop)
        } else {
            Ok(Command::Effect(trimmed.to_string()))
        }
    }
}

/// Outcome class of a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus {
    Ok,
    UnknownCommand,
    EffectNotFound,
    NotBroadcasting,
    SourceUnavailable,
    MixFailure,
    Failed,
}

impl CommandStatus {
    fn of(error: &Error) -> Self {
        match error {
            Error::UnknownCommand(_) => CommandStatus::UnknownCommand,
            Error::EffectNotFound(_) => CommandStatus::EffectNotFound,
            Error::NotBroadcasting => CommandStatus::NotBroadcasting,
            Error::SourceUnavailable { .. } => CommandStatus::SourceUnavailable,
            Error::Mix(_) => CommandStatus::MixFailure,
            Error::Io(_) => CommandStatus::Failed,
        }
    }
}

/// Structured result of `handle_command`, serialized by the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandReply {
    pub status: CommandStatus,
    pub message: String,
}

impl CommandReply {
    /// Successful reply echoing the command
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            status: CommandStatus::Ok,
            message: message.into(),
        }
    }

    /// Whether the command succeeded
    pub fn is_ok(&self) -> bool {
        self.status == CommandStatus::Ok
    }
}

impl From<&Error> for CommandReply {
    fn from(error: &Error) -> Self {
        Self {
            status: CommandStatus::of(error),
            message: error.to_string(),
        }
    }
}

impl From<Error> for CommandReply {
    fn from(error: Error) -> Self {
        CommandReply::from(&error)
    }
}
