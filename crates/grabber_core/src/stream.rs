//! Subscription bookkeeping for the live progress feed of one job.
//!
//! The transport lives in the engine; this side decides when a subscription
//! is opened or closed and which delivered events are still relevant.

use engine_logging::{engine_debug, engine_trace, engine_warn};

use crate::{JobId, ProgressEvent};

/// Identifies one opened subscription. Never reused within a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

/// Named events delivered by a subscription transport.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Progress(ProgressEvent),
    Heartbeat,
    /// Transport or decode failure. Observed, never surfaced.
    TransportError(String),
    /// The remote side ended the stream.
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamCommand {
    Open {
        subscription: SubscriptionId,
        job_id: JobId,
    },
    Close {
        subscription: SubscriptionId,
    },
}

/// A progress event accepted from the open subscription.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivered {
    pub event: ProgressEvent,
    /// Set when the event was terminal and the client closed itself.
    pub close: Option<StreamCommand>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProgressStream {
    next_id: u64,
    target: Option<JobId>,
    open: Option<SubscriptionId>,
    latest: Option<ProgressEvent>,
}

impl ProgressStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Points the client at `job_id`.
    ///
    /// Changing the target releases the current subscription before acquiring
    /// a new one. Setting the same target again does nothing.
    pub fn retarget(&mut self, job_id: Option<&JobId>) -> Vec<StreamCommand> {
        if self.target.as_ref() == job_id {
            return Vec::new();
        }

        let mut commands = Vec::with_capacity(2);
        commands.extend(self.close());
        self.latest = None;
        self.target = job_id.cloned();

        if let Some(job_id) = job_id {
            self.next_id += 1;
            let subscription = SubscriptionId(self.next_id);
            engine_debug!(
                "Opening progress subscription {} for job {}",
                subscription.get(),
                job_id
            );
            self.open = Some(subscription);
            commands.push(StreamCommand::Open {
                subscription,
                job_id: job_id.clone(),
            });
        }
        commands
    }

    /// Releases everything. Safe to call repeatedly.
    pub fn dispose(&mut self) -> Option<StreamCommand> {
        self.target = None;
        self.latest = None;
        self.close()
    }

    fn close(&mut self) -> Option<StreamCommand> {
        let subscription = self.open.take()?;
        engine_debug!("Closing progress subscription {}", subscription.get());
        Some(StreamCommand::Close { subscription })
    }

    /// Applies an event delivered on `subscription`.
    ///
    /// Events for anything but the currently open subscription are dropped.
    pub fn receive(&mut self, subscription: SubscriptionId, event: StreamEvent) -> Option<Delivered> {
        if self.open != Some(subscription) {
            engine_trace!(
                "Ignoring event for inactive subscription {}",
                subscription.get()
            );
            return None;
        }

        match event {
            StreamEvent::Progress(event) => {
                self.latest = Some(event.clone());
                let close = if event.status.is_terminal() {
                    self.close()
                } else {
                    None
                };
                Some(Delivered { event, close })
            }
            StreamEvent::Heartbeat => None,
            StreamEvent::TransportError(reason) => {
                engine_warn!(
                    "Progress subscription {} transport error (ignored): {}",
                    subscription.get(),
                    reason
                );
                None
            }
            StreamEvent::Closed => {
                engine_debug!("Progress subscription {} ended remotely", subscription.get());
                self.open = None;
                None
            }
        }
    }

    pub fn target(&self) -> Option<&JobId> {
        self.target.as_ref()
    }

    pub fn latest(&self) -> Option<&ProgressEvent> {
        self.latest.as_ref()
    }

    pub fn open_subscription(&self) -> Option<SubscriptionId> {
        self.open
    }
}
