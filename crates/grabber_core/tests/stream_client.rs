use grabber_core::{JobStatus, ProgressEvent, ProgressStream, StreamCommand, StreamEvent};

fn event(status: JobStatus, progress: f64) -> ProgressEvent {
    ProgressEvent {
        status,
        progress,
        downloaded_bytes: Some(1024),
        total_bytes: Some(4096),
        speed: None,
        eta: None,
        error: None,
        filename: None,
    }
}

fn open_id(commands: &[StreamCommand]) -> grabber_core::SubscriptionId {
    commands
        .iter()
        .find_map(|command| match command {
            StreamCommand::Open { subscription, .. } => Some(*subscription),
            StreamCommand::Close { .. } => None,
        })
        .expect("open command")
}

#[test]
fn null_target_opens_nothing() {
    let mut stream = ProgressStream::new();
    assert!(stream.retarget(None).is_empty());
    assert!(stream.open_subscription().is_none());
    assert!(stream.latest().is_none());
}

#[test]
fn same_target_does_not_reopen() {
    let mut stream = ProgressStream::new();
    let job = "job-1".to_string();
    let commands = stream.retarget(Some(&job));
    assert_eq!(commands.len(), 1);
    assert!(stream.retarget(Some(&job)).is_empty());
}

#[test]
fn retarget_releases_before_acquiring_and_discards_event() {
    let mut stream = ProgressStream::new();
    let first_job = "job-1".to_string();
    let first = open_id(&stream.retarget(Some(&first_job)));
    stream.receive(first, StreamEvent::Progress(event(JobStatus::Downloading, 25.0)));
    assert!(stream.latest().is_some());

    let second_job = "job-2".to_string();
    let commands = stream.retarget(Some(&second_job));
    let second = open_id(&commands);
    assert_eq!(
        commands,
        vec![
            StreamCommand::Close {
                subscription: first
            },
            StreamCommand::Open {
                subscription: second,
                job_id: second_job.clone(),
            },
        ]
    );
    assert!(stream.latest().is_none());
    assert_eq!(stream.target(), Some(&second_job));

    // Late events from the released subscription are not delivered.
    assert!(stream
        .receive(first, StreamEvent::Progress(event(JobStatus::Completed, 100.0)))
        .is_none());
    assert!(stream.latest().is_none());
}

#[test]
fn progress_overwrites_latest_and_heartbeat_does_not() {
    let mut stream = ProgressStream::new();
    let job = "job-1".to_string();
    let sub = open_id(&stream.retarget(Some(&job)));

    let delivered = stream
        .receive(sub, StreamEvent::Progress(event(JobStatus::Downloading, 10.0)))
        .expect("delivered");
    assert_eq!(delivered.close, None);
    stream.receive(sub, StreamEvent::Progress(event(JobStatus::Downloading, 20.0)));
    assert_eq!(stream.latest().unwrap().progress, 20.0);

    assert!(stream.receive(sub, StreamEvent::Heartbeat).is_none());
    assert!(stream
        .receive(sub, StreamEvent::TransportError("eof".to_string()))
        .is_none());
    assert_eq!(stream.latest().unwrap().progress, 20.0);
    assert_eq!(stream.open_subscription(), Some(sub));
}

#[test]
fn terminal_event_is_surfaced_and_closes_itself() {
    let mut stream = ProgressStream::new();
    let job = "job-1".to_string();
    let sub = open_id(&stream.retarget(Some(&job)));

    let delivered = stream
        .receive(sub, StreamEvent::Progress(event(JobStatus::Failed, 0.0)))
        .expect("delivered");
    assert_eq!(delivered.event.status, JobStatus::Failed);
    assert_eq!(
        delivered.close,
        Some(StreamCommand::Close { subscription: sub })
    );
    assert!(stream.open_subscription().is_none());
    assert_eq!(stream.latest().unwrap().status, JobStatus::Failed);

    // Teardown after the self-close emits nothing further.
    assert!(stream.retarget(None).is_empty());
}

#[test]
fn dispose_twice_is_a_noop() {
    let mut stream = ProgressStream::new();
    let job = "job-1".to_string();
    let sub = open_id(&stream.retarget(Some(&job)));

    assert_eq!(
        stream.dispose(),
        Some(StreamCommand::Close { subscription: sub })
    );
    assert_eq!(stream.dispose(), None);
    assert!(stream.target().is_none());
    assert!(stream.latest().is_none());
}
