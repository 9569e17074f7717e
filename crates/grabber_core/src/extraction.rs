use engine_logging::engine_debug;

use crate::VideoMetadata;

/// Shown when the backend failure carried no usable message.
pub const EXTRACT_FAILED_MESSAGE: &str = "Failed to extract video info";

/// Identifies one issued request. Only the latest token of a slot is trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestToken(u64);

impl RequestToken {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

/// Loading/result/error bookkeeping around the metadata extraction request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExtractionController {
    generation: u64,
    pending: Option<RequestToken>,
    metadata: Option<VideoMetadata>,
    error: Option<String>,
}

impl ExtractionController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new extraction, superseding any in-flight one.
    pub fn begin(&mut self) -> RequestToken {
        self.generation += 1;
        let token = RequestToken(self.generation);
        self.pending = Some(token);
        self.metadata = None;
        self.error = None;
        token
    }

    /// Commits a result if `token` is still the latest request.
    ///
    /// Returns `false` when the result is stale and was dropped.
    pub fn settle(&mut self, token: RequestToken, result: Result<VideoMetadata, String>) -> bool {
        if self.pending != Some(token) {
            engine_debug!(
                "Dropping stale extraction result token={} pending={:?}",
                token.get(),
                self.pending.map(RequestToken::get)
            );
            return false;
        }
        self.pending = None;
        match result {
            Ok(metadata) => {
                self.metadata = Some(metadata);
                self.error = None;
            }
            Err(message) => {
                self.metadata = None;
                let message = message.trim();
                self.error = Some(if message.is_empty() {
                    EXTRACT_FAILED_MESSAGE.to_string()
                } else {
                    message.to_string()
                });
            }
        }
        true
    }

    /// Clears metadata and error. In-flight results become stale.
    pub fn reset(&mut self) {
        self.pending = None;
        self.metadata = None;
        self.error = None;
    }

    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    pub fn metadata(&self) -> Option<&VideoMetadata> {
        self.metadata.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}
