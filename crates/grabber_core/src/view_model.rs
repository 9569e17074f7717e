use crate::{AppState, FormatOption, JobId, JobStatus, Phase, VideoMetadata};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppViewModel {
    pub phase: Phase,
    /// URL input is shown in idle, extracting and selecting.
    pub url_input_enabled: bool,
    pub extracting: bool,
    pub extraction_error: Option<String>,
    pub error: Option<String>,
    pub selection: Option<SelectionView>,
    pub job: Option<JobView>,
    pub dirty: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionView {
    pub metadata: VideoMetadata,
    pub selected_format: Option<String>,
    pub can_confirm: bool,
    pub starting: bool,
}

impl SelectionView {
    pub fn formats(&self) -> &[FormatOption] {
        &self.metadata.formats
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobView {
    pub job_id: JobId,
    pub title: Option<String>,
    pub status: JobStatus,
    pub progress: f64,
    pub downloaded_bytes: Option<u64>,
    pub total_bytes: Option<u64>,
    pub speed: Option<f64>,
    pub eta: Option<f64>,
    pub error: Option<String>,
    pub filename: Option<String>,
    pub can_save: bool,
}

impl JobView {
    pub fn is_active(&self) -> bool {
        matches!(
            self.status,
            JobStatus::Pending | JobStatus::Downloading | JobStatus::Processing
        )
    }
}

impl AppState {
    pub fn view(&self) -> AppViewModel {
        let phase = self.phase();
        let selection = match (phase, self.extraction.metadata()) {
            (Phase::Selecting, Some(metadata)) => Some(SelectionView {
                metadata: metadata.clone(),
                selected_format: self.selected_format().map(ToOwned::to_owned),
                can_confirm: self.selected_format().is_some() && !self.is_starting(),
                starting: self.is_starting(),
            }),
            _ => None,
        };

        let job = match (phase, self.active_job()) {
            (Phase::Downloading | Phase::Done, Some(record)) => {
                let signal = self.status.effective();
                let status = signal.map_or(record.status, |s| s.status);
                Some(JobView {
                    job_id: record.id.clone(),
                    title: record.title.clone(),
                    status,
                    progress: signal.map_or(record.progress, |s| s.progress).clamp(0.0, 100.0),
                    downloaded_bytes: signal.and_then(|s| s.downloaded_bytes),
                    total_bytes: signal.and_then(|s| s.total_bytes).or(record.filesize),
                    speed: signal.and_then(|s| s.speed),
                    eta: signal.and_then(|s| s.eta),
                    error: signal
                        .and_then(|s| s.error.clone())
                        .or_else(|| record.error_message.clone()),
                    filename: signal
                        .and_then(|s| s.filename.clone())
                        .or_else(|| record.filename.clone()),
                    can_save: phase == Phase::Done && status == JobStatus::Completed,
                })
            }
            _ => None,
        };

        AppViewModel {
            phase,
            url_input_enabled: phase.accepts_url(),
            extracting: self.extraction.is_loading(),
            extraction_error: self.extraction.error().map(ToOwned::to_owned),
            error: self.error().map(ToOwned::to_owned),
            selection,
            job,
            dirty: self.is_dirty(),
        }
    }
}

/// `512 KB/s`, `1.5 MB/s`; empty for unknown or zero speed.
pub fn format_speed(bytes_per_sec: Option<f64>) -> String {
    match bytes_per_sec {
        Some(speed) if speed > 0.0 => {
            if speed < 1024.0 * 1024.0 {
                format!("{:.0} KB/s", speed / 1024.0)
            } else {
                format!("{:.1} MB/s", speed / (1024.0 * 1024.0))
            }
        }
        _ => String::new(),
    }
}

/// `42s`, `3m 7s`, `1h 5m`; empty for unknown or zero.
pub fn format_eta(seconds: Option<f64>) -> String {
    match seconds {
        Some(secs) if secs > 0.0 => {
            if secs < 60.0 {
                format!("{}s", secs.round() as u64)
            } else if secs < 3600.0 {
                let whole = secs as u64;
                format!("{}m {}s", whole / 60, (secs % 60.0).round() as u64)
            } else {
                let whole = secs as u64;
                format!("{}h {}m", whole / 3600, (whole % 3600) / 60)
            }
        }
        _ => String::new(),
    }
}

/// Human size with binary units, e.g. `12.3 MB`.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
