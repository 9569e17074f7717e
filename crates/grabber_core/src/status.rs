//! Reconciles the job record and the progress stream into one status.

use crate::{JobRecord, JobStatus, ProgressEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalSource {
    JobRecord,
    Stream,
}

/// The most recent status information, whichever source it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusSignal {
    pub source: SignalSource,
    pub seq: u64,
    pub status: JobStatus,
    pub progress: f64,
    pub downloaded_bytes: Option<u64>,
    pub total_bytes: Option<u64>,
    pub speed: Option<f64>,
    pub eta: Option<f64>,
    pub error: Option<String>,
    pub filename: Option<String>,
}

impl StatusSignal {
    fn from_record(record: &JobRecord, seq: u64) -> Self {
        Self {
            source: SignalSource::JobRecord,
            seq,
            status: record.status,
            progress: record.progress,
            downloaded_bytes: None,
            total_bytes: record.filesize,
            speed: None,
            eta: None,
            error: record.error_message.clone(),
            filename: record.filename.clone(),
        }
    }

    fn from_event(event: &ProgressEvent, seq: u64) -> Self {
        Self {
            source: SignalSource::Stream,
            seq,
            status: event.status,
            progress: event.progress,
            downloaded_bytes: event.downloaded_bytes,
            total_bytes: event.total_bytes,
            speed: event.speed,
            eta: event.eta,
            error: event.error.clone(),
            filename: event.filename.clone(),
        }
    }
}

/// Keeps the newest signal by sequence number.
///
/// Sequence numbers are handed out in arrival order. A request that is
/// answered later (a job refresh) reserves its number when it is issued, so a
/// stream event observed in the meantime is not overwritten by the older
/// answer.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StatusReducer {
    next_seq: u64,
    current: Option<StatusSignal>,
}

impl StatusReducer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves a sequence number for a signal that will arrive later.
    pub fn reserve(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    /// Records a job record received now.
    pub fn observe_record(&mut self, record: &JobRecord) -> bool {
        let seq = self.reserve();
        self.apply(StatusSignal::from_record(record, seq))
    }

    /// Records a job record answering a request issued at `seq`.
    pub fn observe_record_at(&mut self, record: &JobRecord, seq: u64) -> bool {
        self.apply(StatusSignal::from_record(record, seq))
    }

    pub fn observe_event(&mut self, event: &ProgressEvent) -> bool {
        let seq = self.reserve();
        self.apply(StatusSignal::from_event(event, seq))
    }

    /// Returns `false` when `signal` is older than the current one.
    pub fn apply(&mut self, signal: StatusSignal) -> bool {
        if let Some(current) = &self.current {
            if signal.seq <= current.seq {
                return false;
            }
        }
        self.next_seq = self.next_seq.max(signal.seq);
        self.current = Some(signal);
        true
    }

    pub fn effective(&self) -> Option<&StatusSignal> {
        self.current.as_ref()
    }

    pub fn clear(&mut self) {
        self.current = None;
    }
}
