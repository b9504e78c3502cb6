use hyper::http;
use std::{io, sync};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid url pattern \"{pattern}\": {reason}")]
    InvalidPattern { pattern: String, reason: String },
    #[error("{0}")]
    Network(String),
    #[error("Request timed out after {0} ms")]
    Timeout(u64),
    #[error("Request aborted")]
    Aborted,
    #[error("Request cancelled by breakpoint")]
    BreakpointCancelled,
    #[error("Breakpoint decision timed out")]
    BreakpointTimedOut,
    #[error("History store error: {0}")]
    History(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("IoError: {0}")]
    IoError(#[from] io::Error),
    #[error("Json error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Hyper error: {0}")]
    HyperError(#[from] hyper::Error),
    #[error("Http Error: {0}")]
    HttpError(#[from] http::Error),
    #[error("Invalid header name")]
    InvalidHeaderName,
    #[error("Invalid header value")]
    InvalidHeaderValue,
    #[error("Invalid URI: {0}")]
    InvalidUri(String),
    #[error("The lock was poisoned")]
    PoisonedLock,
}

impl Error {
    /// Whether the error ended a call without any response from the remote side.
    pub fn is_transport_failure(&self) -> bool {
        matches!(
            self,
            Error::Network(_) | Error::HyperError(_) | Error::Timeout(_) | Error::Aborted
        )
    }

    /// Whether the error stems from a breakpoint rather than the network.
    pub fn is_breakpoint_cancellation(&self) -> bool {
        matches!(self, Error::BreakpointCancelled | Error::BreakpointTimedOut)
    }
}

impl<T> From<sync::PoisonError<T>> for Error {
    fn from(_: sync::PoisonError<T>) -> Self {
        Error::PoisonedLock
    }
}

impl From<hyper::header::InvalidHeaderName> for Error {
    fn from(_: hyper::header::InvalidHeaderName) -> Self {
        Error::InvalidHeaderName
    }
}

impl From<hyper::header::InvalidHeaderValue> for Error {
    fn from(_: hyper::header::InvalidHeaderValue) -> Self {
        Error::InvalidHeaderValue
    }
}

impl From<http::uri::InvalidUri> for Error {
    fn from(e: http::uri::InvalidUri) -> Self {
        Error::InvalidUri(e.to_string())
    }
}
