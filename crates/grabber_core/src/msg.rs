use crate::{JobRecord, RequestToken, StreamEvent, SubscriptionId, VideoMetadata};

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// User submitted a video URL.
    UrlSubmitted(String),
    /// Engine answered an extraction request.
    ExtractionSettled {
        token: RequestToken,
        result: Result<VideoMetadata, String>,
    },
    /// User picked a format from the list.
    FormatSelected(String),
    /// User clicked Download.
    DownloadConfirmed,
    /// Engine answered a start-download request.
    DownloadStartSettled {
        token: RequestToken,
        result: Result<JobRecord, String>,
    },
    /// Engine delivered an event on a progress subscription.
    Stream {
        subscription: SubscriptionId,
        event: StreamEvent,
    },
    /// User asked to re-read the job record from the backend.
    RefreshRequested,
    /// Engine answered a job refresh issued at sequence number `issued_at`.
    JobFetched {
        issued_at: u64,
        result: Result<JobRecord, String>,
    },
    /// User clicked Save on a finished job.
    SaveClicked,
    /// User asked to start over.
    ResetClicked,
    /// Host is tearing down; release the subscription.
    Shutdown,
    /// UI/render tick.
    Tick,
}
