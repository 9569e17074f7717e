use std::fmt;
use std::path::PathBuf;

use grabber_core::{
    JobId, JobRecord, RequestToken, StreamEvent, SubscriptionId, VideoMetadata,
};
use thiserror::Error;

/// Results flowing back from the engine thread to the host.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Extracted {
        token: RequestToken,
        result: Result<VideoMetadata, ApiError>,
    },
    DownloadStarted {
        token: RequestToken,
        result: Result<JobRecord, ApiError>,
    },
    JobFetched {
        issued_at: u64,
        result: Result<JobRecord, ApiError>,
    },
    Stream {
        subscription: SubscriptionId,
        event: StreamEvent,
    },
    FileSaved {
        job_id: JobId,
        result: Result<PathBuf, ApiError>,
    },
}

/// A failed backend call. `message` is always fit for display.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ApiError {
    pub kind: FailureKind,
    pub message: String,
}

impl ApiError {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    Network,
    Decode,
    Persist,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Network => write!(f, "network error"),
            FailureKind::Decode => write!(f, "malformed response"),
            FailureKind::Persist => write!(f, "could not write file"),
        }
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("backend configuration: {0}")]
    Backend(#[from] ApiError),
    #[error("failed to start engine runtime: {0}")]
    Runtime(#[from] std::io::Error),
}
