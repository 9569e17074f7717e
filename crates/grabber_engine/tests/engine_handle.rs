use std::time::{Duration, Instant};

use grabber_core::{RequestToken, StreamEvent, SubscriptionId};
use grabber_engine::{BackendSettings, EngineEvent, EngineHandle, FailureKind};
use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn engine_for(server: &MockServer) -> EngineHandle {
    EngineHandle::new(BackendSettings {
        base_url: server.uri(),
        ..BackendSettings::default()
    })
    .expect("engine")
}

/// Collects engine events until `done` accepts one or five seconds pass.
fn collect_until(engine: &EngineHandle, done: impl Fn(&EngineEvent) -> bool) -> Vec<EngineEvent> {
    tokio::task::block_in_place(|| {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut seen = Vec::new();
        while Instant::now() < deadline {
            if let Some(event) = engine.recv_timeout(Duration::from_millis(50)) {
                let finished = done(&event);
                seen.push(event);
                if finished {
                    return seen;
                }
            }
        }
        panic!("engine events never completed: {seen:?}");
    })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn extraction_result_carries_its_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/extract"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"detail": "Unsupported URL"})))
        .mount(&server)
        .await;

    let engine = engine_for(&server);
    engine.extract(RequestToken::new(9), "https://nope");
    let events = collect_until(&engine, |_| true);

    match &events[0] {
        EngineEvent::Extracted { token, result } => {
            assert_eq!(*token, RequestToken::new(9));
            let err = result.as_ref().unwrap_err();
            assert_eq!(err.kind, FailureKind::HttpStatus(400));
            assert_eq!(err.message, "Unsupported URL");
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn subscription_streams_until_completion_then_file_saves() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/downloads/7c1e/progress"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            concat!(
                "event: progress\ndata: {\"status\": \"downloading\", \"progress\": 40.0}\n\n",
                "event: progress\ndata: {\"status\": \"completed\", \"progress\": 100.0, \"filename\": \"clip.mp4\"}\n\n",
            )
            .as_bytes()
            .to_vec(),
            "text/event-stream",
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/downloads/7c1e/file"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(b"data".to_vec(), "video/mp4"))
        .mount(&server)
        .await;

    let engine = engine_for(&server);
    let id = SubscriptionId::new(1);
    engine.subscribe(id, "7c1e");
    let events = collect_until(&engine, |event| {
        matches!(event, EngineEvent::Stream { event: StreamEvent::Progress(p), .. } if p.status.is_terminal())
    });
    assert_eq!(events.len(), 2);
    assert!(events
        .iter()
        .all(|event| matches!(event, EngineEvent::Stream { subscription, .. } if *subscription == id)));

    let out = TempDir::new().unwrap();
    engine.save_file("7c1e", Some("clip.mp4".to_string()), out.path().to_path_buf());
    let events = collect_until(&engine, |event| matches!(event, EngineEvent::FileSaved { .. }));
    match events.last() {
        Some(EngineEvent::FileSaved { job_id, result }) => {
            assert_eq!(job_id, "7c1e");
            assert_eq!(result.as_ref().unwrap(), &out.path().join("clip.mp4"));
        }
        other => panic!("unexpected event {other:?}"),
    }
    assert_eq!(std::fs::read(out.path().join("clip.mp4")).unwrap(), b"data");
}
