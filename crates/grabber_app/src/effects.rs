use std::path::PathBuf;
use std::time::Duration;

use engine_logging::{engine_info, engine_warn};
use grabber_core::{Effect, JobId, Msg};
use grabber_engine::{ApiError, EngineEvent, EngineHandle};

/// What the engine reported back, in the terms the front-end acts on.
#[derive(Debug)]
pub enum Inbound {
    Msg(Msg),
    FileSaved {
        job_id: JobId,
        result: Result<PathBuf, ApiError>,
    },
}

/// Executes core effects on the engine and translates its events back.
pub struct EffectRunner {
    engine: EngineHandle,
    output_dir: PathBuf,
}

impl EffectRunner {
    pub fn new(engine: EngineHandle, output_dir: PathBuf) -> Self {
        Self { engine, output_dir }
    }

    pub fn enqueue(&self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::ExtractMetadata { token, url } => {
                    engine_info!("Extract token={} url={}", token.get(), url);
                    self.engine.extract(token, url);
                }
                Effect::StartDownload {
                    token,
                    url,
                    format_id,
                } => {
                    engine_info!(
                        "StartDownload token={} format={} url={}",
                        token.get(),
                        format_id,
                        url
                    );
                    self.engine.start_download(token, url, format_id);
                }
                Effect::FetchJob { issued_at, job_id } => {
                    self.engine.fetch_job(issued_at, job_id);
                }
                Effect::OpenProgressStream {
                    subscription,
                    job_id,
                } => {
                    engine_info!("Subscribe {} to job {}", subscription.get(), job_id);
                    self.engine.subscribe(subscription, job_id);
                }
                Effect::CloseProgressStream { subscription } => {
                    engine_info!("Unsubscribe {}", subscription.get());
                    self.engine.unsubscribe(subscription);
                }
                Effect::SaveFile { job_id, filename } => {
                    engine_info!("Save job {} into {:?}", job_id, self.output_dir);
                    self.engine
                        .save_file(job_id, filename, self.output_dir.clone());
                }
            }
        }
    }

    /// Waits up to `timeout` for the next engine event.
    pub fn next_event(&self, timeout: Duration) -> Option<Inbound> {
        self.engine.recv_timeout(timeout).map(translate)
    }
}

fn translate(event: EngineEvent) -> Inbound {
    match event {
        EngineEvent::Extracted { token, result } => Inbound::Msg(Msg::ExtractionSettled {
            token,
            result: result.map_err(into_message),
        }),
        EngineEvent::DownloadStarted { token, result } => Inbound::Msg(Msg::DownloadStartSettled {
            token,
            result: result.map_err(into_message),
        }),
        EngineEvent::JobFetched { issued_at, result } => Inbound::Msg(Msg::JobFetched {
            issued_at,
            result: result.map_err(into_message),
        }),
        EngineEvent::Stream {
            subscription,
            event,
        } => Inbound::Msg(Msg::Stream {
            subscription,
            event,
        }),
        EngineEvent::FileSaved { job_id, result } => Inbound::FileSaved { job_id, result },
    }
}

fn into_message(err: ApiError) -> String {
    engine_warn!("Backend call failed ({}): {}", err.kind, err.message);
    err.message
}
