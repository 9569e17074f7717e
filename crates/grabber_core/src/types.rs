use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Opaque job identifier issued by the backend when a download is created.
pub type JobId = String;

/// Backend lifecycle status of a download job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Downloading,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    /// `completed` and `failed` end a job; no progress follows them.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Downloading => "downloading",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single downloadable format/quality option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatOption {
    pub format_id: String,
    pub ext: String,
    pub quality_label: String,
    /// Video height in pixels, 0 for audio-only formats.
    #[serde(default)]
    pub height: u32,
    #[serde(default, deserialize_with = "byte_count")]
    pub filesize_approx: Option<u64>,
    pub has_video: bool,
    pub has_audio: bool,
    #[serde(default)]
    pub note: String,
}

/// Metadata returned by the extraction endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub thumbnail: Option<String>,
    /// Duration in seconds.
    #[serde(default)]
    pub duration: Option<u64>,
    #[serde(default)]
    pub uploader: Option<String>,
    pub formats: Vec<FormatOption>,
}

impl VideoMetadata {
    pub fn format(&self, format_id: &str) -> Option<&FormatOption> {
        self.formats.iter().find(|f| f.format_id == format_id)
    }
}

/// Job state as returned by the create and fetch endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub format_id: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default, deserialize_with = "byte_count")]
    pub filesize: Option<u64>,
    pub status: JobStatus,
    /// Percentage in `0..=100`.
    pub progress: f64,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// One live update pushed on the progress stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub status: JobStatus,
    pub progress: f64,
    #[serde(default, deserialize_with = "byte_count")]
    pub downloaded_bytes: Option<u64>,
    #[serde(default, deserialize_with = "byte_count")]
    pub total_bytes: Option<u64>,
    /// Bytes per second.
    #[serde(default)]
    pub speed: Option<f64>,
    /// Estimated seconds remaining.
    #[serde(default)]
    pub eta: Option<f64>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
}

/// yt-dlp reports some sizes as estimates with a fractional part.
#[derive(Deserialize)]
#[serde(untagged)]
enum ByteCount {
    Whole(u64),
    Estimate(f64),
}

fn byte_count<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(
        Option::<ByteCount>::deserialize(deserializer)?.map(|count| match count {
            ByteCount::Whole(n) => n,
            ByteCount::Estimate(f) => f.max(0.0).round() as u64,
        }),
    )
}
