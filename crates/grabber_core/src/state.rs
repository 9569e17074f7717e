use std::fmt;

use engine_logging::engine_info;

use crate::extraction::{ExtractionController, RequestToken};
use crate::status::StatusReducer;
use crate::stream::ProgressStream;
use crate::{Effect, JobRecord, JobStatus};

/// Shown when a start-download failure carried no usable message.
pub const START_FAILED_MESSAGE: &str = "Failed to start download";

/// Workflow stage. Owned exclusively by [`AppState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Phase {
    #[default]
    Idle,
    Extracting,
    Selecting,
    Downloading,
    Done,
}

impl Phase {
    /// Phases in which a new URL may be submitted.
    pub fn accepts_url(self) -> bool {
        matches!(self, Phase::Idle | Phase::Extracting | Phase::Selecting)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::Extracting => "extracting",
            Phase::Selecting => "selecting",
            Phase::Downloading => "downloading",
            Phase::Done => "done",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppState {
    phase: Phase,
    pub(crate) extraction: ExtractionController,
    selected_format: Option<String>,
    active_job: Option<JobRecord>,
    start_generation: u64,
    starting: Option<RequestToken>,
    error: Option<String>,
    pub(crate) stream: ProgressStream,
    pub(crate) status: StatusReducer,
    last_acted_status: Option<JobStatus>,
    pending_refresh: Option<u64>,
    disposed: bool,
    dirty: bool,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn selected_format(&self) -> Option<&str> {
        self.selected_format.as_deref()
    }

    pub fn active_job(&self) -> Option<&JobRecord> {
        self.active_job.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_starting(&self) -> bool {
        self.starting.is_some()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Returns whether anything changed since the last call, and clears the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn set_phase(&mut self, phase: Phase) {
        if self.phase != phase {
            engine_info!("Phase {} -> {}", self.phase, phase);
            self.phase = phase;
        }
        self.mark_dirty();
    }

    pub(crate) fn clear_job(&mut self) {
        self.active_job = None;
        self.status.clear();
        self.last_acted_status = None;
        self.pending_refresh = None;
    }

    pub(crate) fn begin_submit(&mut self) -> RequestToken {
        self.selected_format = None;
        self.starting = None;
        self.clear_job();
        self.error = None;
        self.set_phase(Phase::Extracting);
        self.extraction.begin()
    }

    pub(crate) fn select_format(&mut self, format_id: String) {
        self.selected_format = Some(format_id);
        self.mark_dirty();
    }

    pub(crate) fn begin_start(&mut self) -> RequestToken {
        self.start_generation += 1;
        let token = RequestToken::new(self.start_generation);
        self.starting = Some(token);
        self.error = None;
        self.mark_dirty();
        token
    }

    /// Clears the starting indicator if `token` is the request in flight.
    pub(crate) fn finish_start(&mut self, token: RequestToken) -> bool {
        if self.starting != Some(token) {
            return false;
        }
        self.starting = None;
        self.mark_dirty();
        true
    }

    pub(crate) fn activate_job(&mut self, record: JobRecord) {
        self.clear_job();
        self.status.observe_record(&record);
        self.active_job = Some(record);
        self.set_phase(Phase::Downloading);
    }

    pub(crate) fn replace_job_record(&mut self, record: JobRecord) {
        self.active_job = Some(record);
        self.mark_dirty();
    }

    pub(crate) fn set_error(&mut self, message: String) {
        self.error = Some(message);
        self.mark_dirty();
    }

    pub(crate) fn begin_refresh(&mut self) -> u64 {
        let issued_at = self.status.reserve();
        self.pending_refresh = Some(issued_at);
        issued_at
    }

    pub(crate) fn finish_refresh(&mut self, issued_at: u64) -> bool {
        if self.pending_refresh != Some(issued_at) {
            return false;
        }
        self.pending_refresh = None;
        true
    }

    /// Acts on the reduced status if it differs from the last one acted on.
    ///
    /// Returns `true` when this call moved the phase to `Done`.
    pub(crate) fn act_on_status(&mut self) -> bool {
        let Some(status) = self.status.effective().map(|signal| signal.status) else {
            return false;
        };
        self.mark_dirty();
        if self.last_acted_status == Some(status) {
            return false;
        }
        self.last_acted_status = Some(status);
        if status.is_terminal() && self.phase == Phase::Downloading {
            engine_info!("Job reached terminal status {}", status);
            self.set_phase(Phase::Done);
            return true;
        }
        false
    }

    pub(crate) fn reset(&mut self) {
        self.extraction.reset();
        self.selected_format = None;
        self.starting = None;
        self.clear_job();
        self.error = None;
        self.set_phase(Phase::Idle);
    }

    pub(crate) fn dispose(&mut self) -> Vec<Effect> {
        self.disposed = true;
        self.mark_dirty();
        self.stream.dispose().into_iter().map(Effect::from).collect()
    }

    /// Reconciles the progress subscription with the current phase and job.
    pub(crate) fn sync_stream(&mut self) -> Vec<Effect> {
        if self.disposed {
            return Vec::new();
        }
        let target = match (&self.phase, &self.active_job) {
            (Phase::Downloading, Some(job)) => Some(job.id.clone()),
            _ => None,
        };
        self.stream
            .retarget(target.as_ref())
            .into_iter()
            .map(Effect::from)
            .collect()
    }
}
