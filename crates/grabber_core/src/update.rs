use engine_logging::{engine_debug, engine_warn};

use crate::state::START_FAILED_MESSAGE;
use crate::{AppState, Effect, JobStatus, Msg, Phase};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    if state.is_disposed() {
        return (state, Vec::new());
    }

    let mut effects = match msg {
        Msg::UrlSubmitted(raw) => {
            let url = raw.trim();
            if url.is_empty() || !state.phase().accepts_url() {
                return (state, Vec::new());
            }
            let token = state.begin_submit();
            vec![Effect::ExtractMetadata {
                token,
                url: url.to_string(),
            }]
        }
        Msg::ExtractionSettled { token, result } => {
            if let Err(message) = &result {
                engine_debug!("Extraction {} failed: {}", token.get(), message);
            }
            if state.extraction.settle(token, result) && state.phase() == Phase::Extracting {
                state.set_phase(Phase::Selecting);
            }
            Vec::new()
        }
        Msg::FormatSelected(format_id) => {
            if state.phase() != Phase::Selecting {
                return (state, Vec::new());
            }
            let known = state
                .extraction
                .metadata()
                .is_some_and(|metadata| metadata.format(&format_id).is_some());
            if known {
                state.select_format(format_id);
            } else {
                engine_warn!("Ignoring unknown format id {}", format_id);
            }
            Vec::new()
        }
        Msg::DownloadConfirmed => {
            if state.phase() != Phase::Selecting || state.is_starting() {
                return (state, Vec::new());
            }
            let request = match (state.extraction.metadata(), state.selected_format()) {
                (Some(metadata), Some(format_id)) => {
                    Some((metadata.url.clone(), format_id.to_string()))
                }
                _ => None,
            };
            match request {
                Some((url, format_id)) => {
                    let token = state.begin_start();
                    vec![Effect::StartDownload {
                        token,
                        url,
                        format_id,
                    }]
                }
                None => Vec::new(),
            }
        }
        Msg::DownloadStartSettled { token, result } => {
            if !state.finish_start(token) {
                engine_debug!("Dropping stale start-download result {}", token.get());
                return (state, Vec::new());
            }
            match result {
                Ok(record) => {
                    state.activate_job(record);
                    state.act_on_status();
                }
                Err(message) => {
                    let message = message.trim();
                    state.set_error(if message.is_empty() {
                        START_FAILED_MESSAGE.to_string()
                    } else {
                        message.to_string()
                    });
                }
            }
            Vec::new()
        }
        Msg::Stream {
            subscription,
            event,
        } => match state.stream.receive(subscription, event) {
            Some(delivered) => {
                let effects = delivered.close.into_iter().map(Effect::from).collect();
                state.status.observe_event(&delivered.event);
                state.act_on_status();
                effects
            }
            None => Vec::new(),
        },
        Msg::RefreshRequested => {
            let job_id = match (state.phase(), state.active_job()) {
                (Phase::Downloading | Phase::Done, Some(job)) => job.id.clone(),
                _ => return (state, Vec::new()),
            };
            let issued_at = state.begin_refresh();
            vec![Effect::FetchJob { issued_at, job_id }]
        }
        Msg::JobFetched { issued_at, result } => {
            if !state.finish_refresh(issued_at) {
                return (state, Vec::new());
            }
            match result {
                Ok(record) => {
                    let same_job = state.active_job().is_some_and(|job| job.id == record.id);
                    if same_job {
                        let newer = state.status.observe_record_at(&record, issued_at);
                        state.replace_job_record(record);
                        if newer {
                            state.act_on_status();
                        }
                    }
                }
                Err(message) => {
                    engine_warn!("Job refresh failed: {}", message);
                    state.set_error(message);
                }
            }
            Vec::new()
        }
        Msg::SaveClicked => {
            let saveable = state.phase() == Phase::Done
                && state
                    .status
                    .effective()
                    .is_some_and(|signal| signal.status == JobStatus::Completed);
            let effect = match (saveable, state.active_job()) {
                (true, Some(job)) => Effect::SaveFile {
                    job_id: job.id.clone(),
                    filename: state
                        .status
                        .effective()
                        .and_then(|signal| signal.filename.clone())
                        .or_else(|| job.filename.clone()),
                },
                _ => return (state, Vec::new()),
            };
            state.reset();
            vec![effect]
        }
        Msg::ResetClicked => {
            state.reset();
            Vec::new()
        }
        Msg::Shutdown => {
            let effects = state.dispose();
            return (state, effects);
        }
        Msg::Tick => Vec::new(),
    };

    effects.extend(state.sync_stream());
    (state, effects)
}
