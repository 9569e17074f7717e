use std::sync::mpsc;
use std::sync::Arc;

use engine_logging::{engine_debug, engine_trace};
use futures_util::StreamExt;
use grabber_core::{JobId, ProgressEvent, StreamEvent, SubscriptionId};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::client::ReqwestBackend;
use crate::sse::{SseDecoder, SseFrame};
use crate::EngineEvent;

pub trait EventSink: Send + Sync {
    fn emit(&self, event: EngineEvent);
}

pub struct ChannelEventSink {
    tx: mpsc::Sender<EngineEvent>,
}

impl ChannelEventSink {
    pub fn new(tx: mpsc::Sender<EngineEvent>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelEventSink {
    fn emit(&self, event: EngineEvent) {
        let _ = self.tx.send(event);
    }
}

/// One live progress stream for a job.
///
/// Reading stops on its own after a terminal `progress` event. `close` stops
/// it early; closing more than once is a no-op, and dropping the handle closes.
pub struct ProgressSubscription {
    id: SubscriptionId,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl ProgressSubscription {
    pub fn spawn(
        runtime: &Handle,
        backend: Arc<ReqwestBackend>,
        id: SubscriptionId,
        job_id: JobId,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let cancel = CancellationToken::new();
        let task = runtime.spawn(run_subscription(
            backend,
            id,
            job_id,
            sink,
            cancel.clone(),
        ));
        Self { id, cancel, task }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn close(&self) {
        if self.cancel.is_cancelled() {
            return;
        }
        engine_debug!("Closing progress stream {}", self.id.get());
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// The reader task has ended, by closing or because the stream did.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for ProgressSubscription {
    fn drop(&mut self) {
        self.close();
    }
}

async fn run_subscription(
    backend: Arc<ReqwestBackend>,
    id: SubscriptionId,
    job_id: JobId,
    sink: Arc<dyn EventSink>,
    cancel: CancellationToken,
) {
    let emit = |event: StreamEvent| {
        sink.emit(EngineEvent::Stream {
            subscription: id,
            event,
        })
    };

    let opened = tokio::select! {
        _ = cancel.cancelled() => return,
        opened = backend.open_progress(&job_id) => opened,
    };
    let response = match opened {
        Ok(response) => response,
        Err(err) => {
            emit(StreamEvent::TransportError(err.to_string()));
            emit(StreamEvent::Closed);
            return;
        }
    };
    engine_debug!("Progress stream {} open for job {}", id.get(), job_id);

    let mut decoder = SseDecoder::new();
    let mut body = response.bytes_stream();
    loop {
        let chunk = tokio::select! {
            _ = cancel.cancelled() => return,
            chunk = body.next() => chunk,
        };
        match chunk {
            Some(Ok(bytes)) => {
                for frame in decoder.feed(&bytes) {
                    let Some(event) = decode_frame(&frame) else {
                        continue;
                    };
                    let terminal =
                        matches!(&event, StreamEvent::Progress(p) if p.status.is_terminal());
                    emit(event);
                    if terminal {
                        engine_debug!("Progress stream {} reached terminal status", id.get());
                        return;
                    }
                }
            }
            Some(Err(err)) => {
                emit(StreamEvent::TransportError(err.to_string()));
                emit(StreamEvent::Closed);
                return;
            }
            None => {
                emit(StreamEvent::Closed);
                return;
            }
        }
    }
}

/// Maps a raw frame to a stream event; unknown event names are skipped.
pub fn decode_frame(frame: &SseFrame) -> Option<StreamEvent> {
    match frame.event.as_str() {
        "progress" => Some(match serde_json::from_str::<ProgressEvent>(&frame.data) {
            Ok(event) => StreamEvent::Progress(event),
            Err(err) => StreamEvent::TransportError(format!("undecodable progress event: {err}")),
        }),
        "heartbeat" => Some(StreamEvent::Heartbeat),
        other => {
            engine_trace!("Skipping stream event {:?}", other);
            None
        }
    }
}
