use std::{io, path::StripPrefixError};

use regex::Error as RegexError;
use serde::{Deserialize, Serialize};
use serde_json::Error as JsonError;
use thiserror::Error;
use tokio::sync::{mpsc::error::SendError as TokioSendError, oneshot::error::RecvError};

use crate::event::{GraphEvent, NoteEvent};

/// Fatal errors. Per-file findings never surface here; they travel as
/// [`NoteDiagnostic`](crate::codec::NoteDiagnostic)s alongside the record they concern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
pub enum ZettelError {
    #[error("Aggregator channel error: {0}")]
    Channel(String),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Custom error: {0}")]
    Custom(String),
    #[error("Invalid note path: {0}")]
    InvalidPath(String),
    #[error("File System error: {0}")]
    Io(String),
    #[error("Item Not Found: {0}")]
    NotFound(String),
    #[error("You do not have permission to access this resource")]
    PermissionDenied,
    #[error("(De)Serialization error: {0}")]
    Serialization(String),
    #[error("Not a source note (unhandled file type): {0}")]
    UnhandledFiletype(String),
}

impl From<StripPrefixError> for ZettelError {
    fn from(src: StripPrefixError) -> ZettelError {
        ZettelError::InvalidPath(format!("Strip prefix failed for path. Error: {src}"))
    }
}

impl From<toml::de::Error> for ZettelError {
    fn from(src: toml::de::Error) -> ZettelError {
        ZettelError::Serialization(format!("Toml deserialization error: {src}"))
    }
}

impl From<toml::ser::Error> for ZettelError {
    fn from(src: toml::ser::Error) -> ZettelError {
        ZettelError::Serialization(format!("Toml serialization error: {src}"))
    }
}

impl From<JsonError> for ZettelError {
    fn from(src: JsonError) -> ZettelError {
        ZettelError::Serialization(format!("JSON (de)serialization error: {src}"))
    }
}

impl From<io::Error> for ZettelError {
    fn from(x: io::Error) -> Self {
        match x.kind() {
            io::ErrorKind::NotFound => ZettelError::NotFound(format!("{x}")),
            io::ErrorKind::PermissionDenied => ZettelError::PermissionDenied,
            _ => ZettelError::Io(format!("IOError: {}", x.kind())),
        }
    }
}

impl From<RegexError> for ZettelError {
    fn from(x: RegexError) -> Self {
        ZettelError::Serialization(format!("Regex parse failed: {x}"))
    }
}

impl From<TokioSendError<GraphEvent>> for ZettelError {
    fn from(x: TokioSendError<GraphEvent>) -> Self {
        ZettelError::Channel(format!(
            "Aggregator is gone, could not transmit graph event {}",
            x.0
        ))
    }
}

impl From<TokioSendError<NoteEvent>> for ZettelError {
    fn from(x: TokioSendError<NoteEvent>) -> Self {
        ZettelError::Channel(format!(
            "Event subscriber is gone, could not transmit note event {:?}",
            x.0
        ))
    }
}

impl From<RecvError> for ZettelError {
    fn from(x: RecvError) -> Self {
        ZettelError::Channel(format!("Aggregator dropped a flush request: {x}"))
    }
}
