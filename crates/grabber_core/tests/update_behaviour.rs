use std::sync::Once;

use grabber_core::{
    update, AppState, Effect, FormatOption, JobRecord, JobStatus, Msg, Phase, RequestToken,
    VideoMetadata, EXTRACT_FAILED_MESSAGE, START_FAILED_MESSAGE,
};
use pretty_assertions::assert_eq;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(engine_logging::initialize_for_tests);
}

fn format(id: &str, has_video: bool, has_audio: bool) -> FormatOption {
    FormatOption {
        format_id: id.to_string(),
        ext: "mp4".to_string(),
        quality_label: if has_video { "720p" } else { "audio only" }.to_string(),
        height: if has_video { 720 } else { 0 },
        filesize_approx: Some(1_000_000),
        has_video,
        has_audio,
        note: String::new(),
    }
}

fn metadata(url: &str) -> VideoMetadata {
    VideoMetadata {
        url: url.to_string(),
        title: format!("Video at {url}"),
        thumbnail: None,
        duration: Some(212),
        uploader: Some("someone".to_string()),
        formats: vec![format("a", true, false), format("b", false, true)],
    }
}

fn job(id: &str, url: &str) -> JobRecord {
    JobRecord {
        id: id.to_string(),
        url: url.to_string(),
        title: None,
        format_id: Some("a".to_string()),
        filename: None,
        filesize: None,
        status: JobStatus::Pending,
        progress: 0.0,
        error_message: None,
    }
}

fn submit(state: AppState, url: &str) -> (AppState, RequestToken) {
    let (state, effects) = update(state, Msg::UrlSubmitted(url.to_string()));
    let token = effects
        .iter()
        .find_map(|effect| match effect {
            Effect::ExtractMetadata { token, .. } => Some(*token),
            _ => None,
        })
        .expect("extract effect");
    (state, token)
}

fn selecting(url: &str) -> AppState {
    let (state, token) = submit(AppState::new(), url);
    let (state, _) = update(
        state,
        Msg::ExtractionSettled {
            token,
            result: Ok(metadata(url)),
        },
    );
    state
}

fn confirm(state: AppState, format_id: &str) -> (AppState, RequestToken) {
    let (state, _) = update(state, Msg::FormatSelected(format_id.to_string()));
    let (state, effects) = update(state, Msg::DownloadConfirmed);
    let token = effects
        .iter()
        .find_map(|effect| match effect {
            Effect::StartDownload { token, .. } => Some(*token),
            _ => None,
        })
        .expect("start effect");
    (state, token)
}

#[test]
fn submit_moves_to_extracting_and_emits_request() {
    init_logging();
    let (mut state, effects) = update(
        AppState::new(),
        Msg::UrlSubmitted("  https://video.example/watch?v=1 \n".to_string()),
    );

    assert_eq!(state.phase(), Phase::Extracting);
    assert!(state.view().extracting);
    assert!(state.consume_dirty());
    assert!(matches!(
        effects.as_slice(),
        [Effect::ExtractMetadata { url, .. }] if url == "https://video.example/watch?v=1"
    ));
}

#[test]
fn blank_submit_is_ignored() {
    init_logging();
    let (state, effects) = update(AppState::new(), Msg::UrlSubmitted("   ".to_string()));
    assert_eq!(state.phase(), Phase::Idle);
    assert!(effects.is_empty());
}

#[test]
fn extraction_success_moves_to_selecting_with_metadata() {
    init_logging();
    let state = selecting("u1");
    let view = state.view();

    assert_eq!(view.phase, Phase::Selecting);
    assert!(!view.extracting);
    let selection = view.selection.expect("selection view");
    assert_eq!(selection.metadata, metadata("u1"));
    assert_eq!(selection.selected_format, None);
    assert!(!selection.can_confirm);
}

#[test]
fn extraction_failure_still_moves_to_selecting() {
    init_logging();
    let (state, token) = submit(AppState::new(), "bad");
    let (state, _) = update(
        state,
        Msg::ExtractionSettled {
            token,
            result: Err("Unsupported URL: bad".to_string()),
        },
    );
    let view = state.view();

    assert_eq!(view.phase, Phase::Selecting);
    assert!(view.url_input_enabled);
    assert_eq!(view.extraction_error.as_deref(), Some("Unsupported URL: bad"));
    assert!(view.selection.is_none());
}

#[test]
fn extraction_failure_without_message_uses_fallback() {
    init_logging();
    let (state, token) = submit(AppState::new(), "bad");
    let (state, _) = update(
        state,
        Msg::ExtractionSettled {
            token,
            result: Err(String::new()),
        },
    );
    assert_eq!(
        state.view().extraction_error.as_deref(),
        Some(EXTRACT_FAILED_MESSAGE)
    );
}

#[test]
fn superseded_extraction_never_reaches_state() {
    init_logging();
    let (state, first) = submit(AppState::new(), "u1");
    let (state, second) = submit(state, "u2");

    // Newer answer first, older one afterwards.
    let (state, _) = update(
        state,
        Msg::ExtractionSettled {
            token: second,
            result: Ok(metadata("u2")),
        },
    );
    let (state, _) = update(
        state,
        Msg::ExtractionSettled {
            token: first,
            result: Ok(metadata("u1")),
        },
    );
    assert_eq!(state.view().selection.unwrap().metadata.url, "u2");

    // Older answer first: it must not move the phase either.
    let (state, first) = submit(AppState::new(), "u1");
    let (state, second) = submit(state, "u2");
    let (state, _) = update(
        state,
        Msg::ExtractionSettled {
            token: first,
            result: Ok(metadata("u1")),
        },
    );
    assert_eq!(state.phase(), Phase::Extracting);
    assert!(state.view().selection.is_none());
    let (state, _) = update(
        state,
        Msg::ExtractionSettled {
            token: second,
            result: Ok(metadata("u2")),
        },
    );
    assert_eq!(state.phase(), Phase::Selecting);
    assert_eq!(state.view().selection.unwrap().metadata.url, "u2");
}

#[test]
fn format_selection_is_last_write_wins_without_phase_change() {
    init_logging();
    let state = selecting("u1");
    let (state, effects) = update(state, Msg::FormatSelected("a".to_string()));
    assert!(effects.is_empty());
    let (state, effects) = update(state, Msg::FormatSelected("b".to_string()));
    assert!(effects.is_empty());

    assert_eq!(state.phase(), Phase::Selecting);
    assert_eq!(state.selected_format(), Some("b"));
    assert!(state.view().selection.unwrap().can_confirm);
}

#[test]
fn format_selection_outside_selecting_is_ignored() {
    init_logging();
    let (state, _) = update(AppState::new(), Msg::FormatSelected("a".to_string()));
    assert_eq!(state.selected_format(), None);

    let state = selecting("u1");
    let (state, _) = update(state, Msg::FormatSelected("zzz".to_string()));
    assert_eq!(state.selected_format(), None);
}

#[test]
fn confirm_without_format_is_noop() {
    init_logging();
    let state = selecting("u1");
    let before = state.clone();
    let (state, effects) = update(state, Msg::DownloadConfirmed);

    assert_eq!(state, before);
    assert_eq!(state.phase(), Phase::Selecting);
    assert!(effects.is_empty());
}

#[test]
fn confirm_emits_start_and_success_moves_to_downloading() {
    init_logging();
    let state = selecting("u1");
    let (state, _) = update(state, Msg::FormatSelected("a".to_string()));
    let (state, effects) = update(state, Msg::DownloadConfirmed);

    let token = match effects.as_slice() {
        [Effect::StartDownload {
            token,
            url,
            format_id,
        }] => {
            assert_eq!(url, "u1");
            assert_eq!(format_id, "a");
            *token
        }
        other => panic!("unexpected effects {other:?}"),
    };
    assert!(state.is_starting());
    assert!(state.view().selection.unwrap().starting);

    // A second click while the request is in flight does nothing.
    let (state, effects) = update(state, Msg::DownloadConfirmed);
    assert!(effects.is_empty());

    let (state, effects) = update(
        state,
        Msg::DownloadStartSettled {
            token,
            result: Ok(job("job-1", "u1")),
        },
    );

    assert_eq!(state.phase(), Phase::Downloading);
    assert!(!state.is_starting());
    assert_eq!(state.active_job().unwrap().id, "job-1");
    assert!(matches!(
        effects.as_slice(),
        [Effect::OpenProgressStream { job_id, .. }] if job_id == "job-1"
    ));
}

#[test]
fn start_failure_stays_selecting_with_error() {
    init_logging();
    let (state, token) = confirm(selecting("u1"), "a");
    let (state, effects) = update(
        state,
        Msg::DownloadStartSettled {
            token,
            result: Err("Requested format is not available".to_string()),
        },
    );

    assert!(effects.is_empty());
    assert_eq!(state.phase(), Phase::Selecting);
    assert!(!state.is_starting());
    assert!(state.active_job().is_none());
    assert_eq!(
        state.view().error.as_deref(),
        Some("Requested format is not available")
    );

    let (state, token) = confirm(state, "a");
    assert_eq!(state.view().error, None);
    let (state, _) = update(
        state,
        Msg::DownloadStartSettled {
            token,
            result: Err(" ".to_string()),
        },
    );
    assert_eq!(state.view().error.as_deref(), Some(START_FAILED_MESSAGE));
}

#[test]
fn start_result_after_resubmit_is_dropped() {
    init_logging();
    let (state, token) = confirm(selecting("u1"), "a");
    let (state, _) = submit(state, "u2");
    let (state, effects) = update(
        state,
        Msg::DownloadStartSettled {
            token,
            result: Ok(job("job-1", "u1")),
        },
    );

    assert!(effects.is_empty());
    assert_eq!(state.phase(), Phase::Extracting);
    assert!(state.active_job().is_none());
}

#[test]
fn submit_clears_format_job_and_error() {
    init_logging();
    let (state, token) = confirm(selecting("u1"), "a");
    let (state, _) = update(
        state,
        Msg::DownloadStartSettled {
            token,
            result: Err("nope".to_string()),
        },
    );
    let (state, _) = submit(state, "u2");

    assert_eq!(state.selected_format(), None);
    assert_eq!(state.error(), None);
    assert!(state.active_job().is_none());
}

#[test]
fn reset_from_every_phase_returns_to_clean_idle() {
    init_logging();
    let idle = AppState::new();
    let (extracting, _) = submit(AppState::new(), "u1");
    let selecting_state = {
        let (state, _) = update(selecting("u1"), Msg::FormatSelected("a".to_string()));
        state
    };
    let (downloading, _) = {
        let (state, token) = confirm(selecting("u1"), "a");
        update(
            state,
            Msg::DownloadStartSettled {
                token,
                result: Ok(job("job-1", "u1")),
            },
        )
    };

    for state in [idle, extracting, selecting_state, downloading] {
        let (state, _) = update(state, Msg::ResetClicked);
        let view = state.view();
        assert_eq!(view.phase, Phase::Idle);
        assert_eq!(view.extraction_error, None);
        assert_eq!(view.error, None);
        assert!(view.selection.is_none());
        assert!(view.job.is_none());
        assert_eq!(state.selected_format(), None);
        assert!(state.active_job().is_none());
        assert!(!state.is_starting());
    }
}

#[test]
fn reset_during_extraction_drops_the_late_result() {
    init_logging();
    let (state, token) = submit(AppState::new(), "u1");
    let (state, _) = update(state, Msg::ResetClicked);
    let (state, _) = update(
        state,
        Msg::ExtractionSettled {
            token,
            result: Ok(metadata("u1")),
        },
    );

    assert_eq!(state.phase(), Phase::Idle);
    assert!(state.view().selection.is_none());
}

#[test]
fn at_most_one_request_in_flight() {
    init_logging();
    let (state, _) = submit(AppState::new(), "u1");
    let (state, effects) = update(state, Msg::DownloadConfirmed);
    assert!(effects.is_empty());
    assert!(state.view().extracting);
    assert!(!state.is_starting());

    let (state, _) = confirm(selecting("u1"), "a");
    assert!(state.is_starting());
    assert!(!state.view().extracting);
}
