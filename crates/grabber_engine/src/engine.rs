use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use engine_logging::{engine_debug, engine_info};
use grabber_core::{JobId, RequestToken, SubscriptionId};

use crate::client::{Backend, BackendSettings, ReqwestBackend};
use crate::subscription::{ChannelEventSink, EventSink, ProgressSubscription};
use crate::{EngineError, EngineEvent};

enum EngineCommand {
    Extract {
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
    Subscribe {
        subscription: SubscriptionId,
        job_id: JobId,
    },
    Unsubscribe {
        subscription: SubscriptionId,
    },
    SaveFile {
        job_id: JobId,
        filename: Option<String>,
        dir: PathBuf,
    },
}

/// Runs backend calls on a dedicated tokio runtime thread.
///
/// Commands are fire-and-forget; every outcome comes back as an
/// [`EngineEvent`]. Dropping the handle stops the thread and closes any open
/// progress streams.
pub struct EngineHandle {
    cmd_tx: mpsc::Sender<EngineCommand>,
    event_rx: mpsc::Receiver<EngineEvent>,
}

impl EngineHandle {
    pub fn new(settings: BackendSettings) -> Result<Self, EngineError> {
        let backend = Arc::new(ReqwestBackend::new(settings)?);
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()?;

        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let sink: Arc<dyn EventSink> = Arc::new(ChannelEventSink::new(event_tx));

        thread::Builder::new()
            .name("grabber-engine".to_string())
            .spawn(move || {
                let mut subscriptions: HashMap<SubscriptionId, ProgressSubscription> =
                    HashMap::new();
                while let Ok(command) = cmd_rx.recv() {
                    subscriptions.retain(|_, sub| !sub.is_finished());
                    match command {
                        EngineCommand::Subscribe {
                            subscription,
                            job_id,
                        } => {
                            let sub = ProgressSubscription::spawn(
                                runtime.handle(),
                                backend.clone(),
                                subscription,
                                job_id,
                                sink.clone(),
                            );
                            if let Some(previous) = subscriptions.insert(subscription, sub) {
                                previous.close();
                            }
                        }
                        EngineCommand::Unsubscribe { subscription } => {
                            if let Some(sub) = subscriptions.remove(&subscription) {
                                sub.close();
                            }
                        }
                        request => {
                            let backend = backend.clone();
                            let sink = sink.clone();
                            runtime.spawn(async move {
                                handle_request(backend.as_ref(), request, sink.as_ref()).await;
                            });
                        }
                    }
                }
                for (_, sub) in subscriptions.drain() {
                    sub.close();
                }
                engine_info!("Engine thread stopped");
            })?;

        Ok(Self { cmd_tx, event_rx })
    }

    pub fn extract(&self, token: RequestToken, url: impl Into<String>) {
        self.send(EngineCommand::Extract {
            token,
            url: url.into(),
        });
    }

    pub fn start_download(
        &self,
        token: RequestToken,
        url: impl Into<String>,
        format_id: impl Into<String>,
    ) {
        self.send(EngineCommand::StartDownload {
            token,
            url: url.into(),
            format_id: format_id.into(),
        });
    }

    pub fn fetch_job(&self, issued_at: u64, job_id: impl Into<JobId>) {
        self.send(EngineCommand::FetchJob {
            issued_at,
            job_id: job_id.into(),
        });
    }

    pub fn subscribe(&self, subscription: SubscriptionId, job_id: impl Into<JobId>) {
        self.send(EngineCommand::Subscribe {
            subscription,
            job_id: job_id.into(),
        });
    }

    pub fn unsubscribe(&self, subscription: SubscriptionId) {
        self.send(EngineCommand::Unsubscribe { subscription });
    }

    pub fn save_file(&self, job_id: impl Into<JobId>, filename: Option<String>, dir: PathBuf) {
        self.send(EngineCommand::SaveFile {
            job_id: job_id.into(),
            filename,
            dir,
        });
    }

    pub fn try_recv(&self) -> Option<EngineEvent> {
        self.event_rx.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<EngineEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }

    fn send(&self, command: EngineCommand) {
        if self.cmd_tx.send(command).is_err() {
            engine_debug!("Engine thread gone; command dropped");
        }
    }
}

async fn handle_request(backend: &dyn Backend, command: EngineCommand, sink: &dyn EventSink) {
    let event = match command {
        EngineCommand::Extract { token, url } => EngineEvent::Extracted {
            token,
            result: backend.extract_metadata(&url).await,
        },
        EngineCommand::StartDownload {
            token,
            url,
            format_id,
        } => EngineEvent::DownloadStarted {
            token,
            result: backend.start_download(&url, &format_id).await,
        },
        EngineCommand::FetchJob { issued_at, job_id } => EngineEvent::JobFetched {
            issued_at,
            result: backend.fetch_job(&job_id).await,
        },
        EngineCommand::SaveFile {
            job_id,
            filename,
            dir,
        } => {
            let result = backend.save_file(&job_id, filename.as_deref(), &dir).await;
            EngineEvent::FileSaved { job_id, result }
        }
        EngineCommand::Subscribe { .. } | EngineCommand::Unsubscribe { .. } => return,
    };
    sink.emit(event);
}
