use crate::{JobId, RequestToken, StreamCommand, SubscriptionId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    ExtractMetadata {
        token: RequestToken,
        url: String,
    },
    StartDownload {
        token: RequestToken,
        url: String,
        format_id: String,
    },
    FetchJob {
        issued_at: u64,
        job_id: JobId,
    },
    OpenProgressStream {
        subscription: SubscriptionId,
        job_id: JobId,
    },
    CloseProgressStream {
        subscription: SubscriptionId,
    },
    /// Host download action for a finished job's file.
    SaveFile {
        job_id: JobId,
        filename: Option<String>,
    },
}

impl From<StreamCommand> for Effect {
    fn from(command: StreamCommand) -> Self {
        match command {
            StreamCommand::Open {
                subscription,
                job_id,
            } => Effect::OpenProgressStream {
                subscription,
                job_id,
            },
            StreamCommand::Close { subscription } => Effect::CloseProgressStream { subscription },
        }
    }
}
