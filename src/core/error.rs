use std::error::Error as StdError;
use std::path::Path;
use thiserror::Error;

use crate::media::SourceType;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("unsupported source type: {0}")]
    UnsupportedSourceType(SourceType),
    #[error("write_packet called with empty packet")]
    EmptyPayload,
    #[error("segment writer init called more than once")]
    AlreadyInitialized,
    #[error("segment writer used after close")]
    AlreadyClosed,
    #[error("write_packet called before init")]
    NotInitialized,
    #[error("failed to initialize segment muxer")]
    EncoderInitFailed,
    #[error("failed to write packet")]
    WriteFailed,
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Shorthand for an I/O failure on a specific path.
    pub fn io_at(op: &str, path: &Path, source: std::io::Error) -> Self {
        Self::io(format!("{} {}", op, path.display()), source)
    }

    /// Caller bugs in the arguments: bad geometry, empty payload, bad settings.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument(_) | Self::UnsupportedSourceType(_) | Self::EmptyPayload
        )
    }

    /// Lifecycle misuse.
    pub fn is_invalid_state(&self) -> bool {
        matches!(
            self,
            Self::AlreadyInitialized | Self::AlreadyClosed | Self::NotInitialized
        )
    }

    pub fn is_native(&self) -> bool {
        matches!(self, Self::EncoderInitFailed | Self::WriteFailed)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{message}")]
    Message { message: String },
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl ConfigError {
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }

    pub fn with_context<E>(context: impl Into<String>, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Context {
            context: context.into(),
            source: Box::new(source),
        }
    }
}
