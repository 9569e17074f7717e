use grabber_core::{
    format_eta, format_size, format_speed, FormatOption, JobStatus, JobView, SelectionView,
};

/// One line per offered format, numbered from 1.
pub fn format_lines(selection: &SelectionView) -> Vec<String> {
    let mut lines = vec![selection.metadata.title.clone()];
    if let Some(uploader) = &selection.metadata.uploader {
        lines[0].push_str(&format!(" ({uploader})"));
    }
    for (index, format) in selection.formats().iter().enumerate() {
        lines.push(format!("  {:>2}. {}", index + 1, describe_format(format)));
    }
    lines
}

fn describe_format(format: &FormatOption) -> String {
    let kind = match (format.has_video, format.has_audio) {
        (true, true) => "video+audio",
        (true, false) => "video only",
        (false, true) => "audio only",
        (false, false) => "unknown",
    };
    let mut text = format!(
        "[{}] {} {} {}",
        format.format_id, format.quality_label, format.ext, kind
    );
    if let Some(size) = format.filesize_approx {
        text.push_str(&format!(" ~{}", format_size(size)));
    }
    if !format.note.is_empty() {
        text.push_str(&format!(" ({})", format.note));
    }
    text
}

/// Resolves user input to a format id: a list number or a literal id.
pub fn pick_format(selection: &SelectionView, input: &str) -> Option<String> {
    let input = input.trim();
    if let Ok(number) = input.parse::<usize>() {
        if let Some(format) = number
            .checked_sub(1)
            .and_then(|index| selection.formats().get(index))
        {
            return Some(format.format_id.clone());
        }
    }
    selection
        .formats()
        .iter()
        .find(|format| format.format_id == input)
        .map(|format| format.format_id.clone())
}

/// Single status line for a job, e.g.
/// `downloading   42.0%  12.0 MB / 30.0 MB  1.5 MB/s  ETA 12s`.
pub fn job_line(job: &JobView) -> String {
    let mut parts = vec![format!("{:<11}", job.status.as_str()), format!("{:5.1}%", job.progress)];
    match (job.downloaded_bytes, job.total_bytes) {
        (Some(done), Some(total)) => {
            parts.push(format!("{} / {}", format_size(done), format_size(total)))
        }
        (Some(done), None) => parts.push(format_size(done)),
        (None, Some(total)) => parts.push(format_size(total)),
        (None, None) => {}
    }
    let speed = format_speed(job.speed);
    if !speed.is_empty() {
        parts.push(speed);
    }
    let eta = format_eta(job.eta);
    if !eta.is_empty() && job.is_active() {
        parts.push(format!("ETA {eta}"));
    }
    if job.status == JobStatus::Failed {
        if let Some(error) = &job.error {
            parts.push(error.clone());
        }
    }
    parts.join("  ")
}
