//! Error taxonomies shared by the name server and storage server.
//!
//! Each enum mirrors a closed set of outcomes a handler can produce; at the
//! RPC boundary these collapse to the wire [`crate::wire::ErrorCode`].

use thiserror::Error;

use crate::wire::ErrorCode;

/// Errors produced by name server handlers before a wire reply is built.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NsError {
    #[error("file not found")]
    FileNotFound,
    #[error("file already exists")]
    FileExists,
    #[error("access denied")]
    AccessDenied,
    #[error("not the file owner")]
    NotOwner,
    #[error("user not found")]
    UserNotFound,
    #[error("storage server not found")]
    SsNotFound,
    #[error("storage server unreachable")]
    ConnectionFailed,
    #[error("invalid command: {0}")]
    InvalidCommand(String),
    #[error("internal server error: {0}")]
    ServerError(String),
}

impl NsError {
    pub fn code(&self) -> ErrorCode {
        match self {
            NsError::FileNotFound => ErrorCode::FileNotFound,
            NsError::FileExists => ErrorCode::FileExists,
            NsError::AccessDenied => ErrorCode::AccessDenied,
            NsError::NotOwner => ErrorCode::NotOwner,
            NsError::UserNotFound => ErrorCode::UserNotFound,
            NsError::SsNotFound => ErrorCode::SsNotFound,
            NsError::ConnectionFailed => ErrorCode::ConnectionFailed,
            NsError::InvalidCommand(_) => ErrorCode::InvalidCommand,
            NsError::ServerError(_) => ErrorCode::ServerError,
        }
    }

    pub fn message(&self) -> String {
        self.to_string()
    }
}

/// Errors produced by storage server handlers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SsError {
    #[error("file not found")]
    FileNotFound,
    #[error("file already exists")]
    FileExists,
    #[error("access denied")]
    AccessDenied,
    #[error("sentence is locked")]
    SentenceLocked,
    #[error("invalid index: {0}")]
    InvalidIndex(String),
    #[error("no undo history available")]
    NoUndo,
    #[error("internal server error: {0}")]
    ServerError(String),
}

impl SsError {
    pub fn code(&self) -> ErrorCode {
        match self {
            SsError::FileNotFound => ErrorCode::FileNotFound,
            SsError::FileExists => ErrorCode::FileExists,
            SsError::AccessDenied => ErrorCode::AccessDenied,
            SsError::SentenceLocked => ErrorCode::SentenceLocked,
            SsError::InvalidIndex(_) => ErrorCode::InvalidIndex,
            SsError::NoUndo => ErrorCode::NoUndo,
            SsError::ServerError(_) => ErrorCode::ServerError,
        }
    }

    pub fn message(&self) -> String {
        self.to_string()
    }
}

impl From<std::io::Error> for SsError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::NotFound => SsError::FileNotFound,
            std::io::ErrorKind::AlreadyExists => SsError::FileExists,
            _ => SsError::ServerError(e.to_string()),
        }
    }
}

/// Errors from the wire framing layer (transport/decoding, not application).
#[derive(Debug, Error)]
pub enum WireError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("frame too large: {0} bytes")]
    FrameTooLarge(usize),
    #[error("malformed record: {0}")]
    Malformed(String),
    #[error("connection closed")]
    Closed,
}

impl From<WireError> for std::io::Error {
    fn from(e: WireError) -> Self {
        match e {
            WireError::Io(io) => io,
            WireError::Closed => std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "connection closed"),
            other => std::io::Error::new(std::io::ErrorKind::InvalidData, other.to_string()),
        }
    }
}
