//! Grabber engine: backend client, progress streams and effect execution.
mod client;
mod engine;
mod filename;
mod persist;
mod sse;
mod subscription;
mod types;

pub use client::{
    error_message, Backend, BackendSettings, ReqwestBackend, EXTRACT_FALLBACK, FETCH_JOB_FALLBACK,
    FILE_FALLBACK, START_FALLBACK,
};
pub use engine::EngineHandle;
pub use filename::{filename_from_disposition, local_filename, sanitize_filename};
pub use persist::{ensure_output_dir, AtomicFileWriter, PendingFile, PersistError};
pub use sse::{SseDecoder, SseFrame};
pub use subscription::{decode_frame, ChannelEventSink, EventSink, ProgressSubscription};
pub use types::{ApiError, EngineError, EngineEvent, FailureKind};
