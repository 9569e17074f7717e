use std::collections::VecDeque;
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::mpsc::{self, TryRecvError};
use std::thread;
use std::time::Duration;

use engine_logging::{engine_info, engine_warn};
use grabber_core::{update, AppState, AppViewModel, Effect, JobId, JobStatus, Msg, Phase};
use grabber_engine::ApiError;

use crate::effects::{EffectRunner, Inbound};
use crate::render;

const TICK: Duration = Duration::from_millis(100);
const PROMPT: &str = "Choose a format (number or id), paste another URL, or q to quit:";
const RETRY_PROMPT: &str = "Paste another URL, or q to quit:";

pub struct Options {
    pub url: String,
    /// Preselected format id; disables the interactive prompt.
    pub format: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Saved(PathBuf),
    Failed(String),
    Cancelled,
}

impl Outcome {
    pub fn report(self) -> ExitCode {
        match self {
            Outcome::Saved(path) => {
                println!("Saved {}", path.display());
                ExitCode::SUCCESS
            }
            Outcome::Failed(message) => {
                eprintln!("Error: {message}");
                ExitCode::FAILURE
            }
            Outcome::Cancelled => {
                eprintln!("Cancelled");
                ExitCode::from(130)
            }
        }
    }
}

/// Drives one download from URL to saved file.
pub fn run(runner: EffectRunner, options: Options) -> Outcome {
    let input = spawn_stdin_reader();
    let mut session = Session::new(options);
    session.start();

    let outcome = loop {
        runner.enqueue(session.drain());
        for line in session.take_output() {
            println!("{line}");
        }
        if let Some(outcome) = session.outcome.take() {
            break outcome;
        }

        match runner.next_event(TICK) {
            Some(Inbound::Msg(msg)) => session.push(msg),
            Some(Inbound::FileSaved { job_id, result }) => session.file_saved(&job_id, result),
            None => session.push(Msg::Tick),
        }
        loop {
            match input.try_recv() {
                Ok(line) => session.input(&line),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    session.input_closed();
                    break;
                }
            }
        }
    };

    runner.enqueue(session.shutdown());
    outcome
}

fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else {
                break;
            };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Front-end bookkeeping around the core state: what was already shown,
/// which answers were automatic, and how the run ends.
struct Session {
    state: AppState,
    options: Options,
    queue: VecDeque<Msg>,
    output: Vec<String>,
    listed: bool,
    reported_error: Option<String>,
    last_job_line: Option<String>,
    saving: Option<JobId>,
    input_open: bool,
    awaiting_choice: bool,
    /// A URL was typed at the prompt, so extraction failures are retryable.
    resubmitted: bool,
    outcome: Option<Outcome>,
}

impl Session {
    fn new(options: Options) -> Self {
        Self {
            state: AppState::new(),
            options,
            queue: VecDeque::new(),
            output: Vec::new(),
            listed: false,
            reported_error: None,
            last_job_line: None,
            saving: None,
            input_open: true,
            awaiting_choice: false,
            resubmitted: false,
            outcome: None,
        }
    }

    fn start(&mut self) {
        self.output.push(format!("Fetching formats for {}", self.options.url));
        self.push(Msg::UrlSubmitted(self.options.url.clone()));
    }

    fn push(&mut self, msg: Msg) {
        self.queue.push_back(msg);
    }

    /// Applies every queued message and returns the effects to execute.
    fn drain(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        while let Some(msg) = self.queue.pop_front() {
            let state = std::mem::take(&mut self.state);
            let (state, produced) = update(state, msg);
            self.state = state;
            effects.extend(produced);
            if self.state.consume_dirty() {
                let view = self.state.view();
                self.react(&view);
            }
        }
        effects
    }

    fn take_output(&mut self) -> Vec<String> {
        std::mem::take(&mut self.output)
    }

    fn react(&mut self, view: &AppViewModel) {
        match view.phase {
            Phase::Idle | Phase::Extracting => {}
            Phase::Selecting => self.react_selecting(view),
            Phase::Downloading => self.show_job(view),
            Phase::Done => self.react_done(view),
        }
    }

    fn react_selecting(&mut self, view: &AppViewModel) {
        if let Some(error) = &view.extraction_error {
            if self.options.format.is_some() || !self.resubmitted {
                self.finish(Outcome::Failed(error.clone()));
            } else if self.reported_error.as_ref() != Some(error) {
                self.reported_error = Some(error.clone());
                self.output.push(format!("Error: {error}"));
                self.prompt(RETRY_PROMPT);
            }
            return;
        }
        let Some(selection) = &view.selection else {
            return;
        };

        if !self.listed {
            self.listed = true;
            self.output.extend(render::format_lines(selection));
            match self.options.format.clone() {
                Some(wanted) => match render::pick_format(selection, &wanted) {
                    Some(format_id) => self.choose(format_id),
                    None => self.finish(Outcome::Failed(format!(
                        "Format {wanted} is not offered for this video"
                    ))),
                },
                None => self.prompt(PROMPT),
            }
            return;
        }

        if selection.starting {
            return;
        }
        if let Some(error) = view.error.as_ref().filter(|e| self.reported_error.as_ref() != Some(*e))
        {
            self.reported_error = Some(error.clone());
            if self.options.format.is_some() {
                self.finish(Outcome::Failed(error.clone()));
            } else {
                self.output.push(format!("Error: {error}"));
                self.prompt(PROMPT);
            }
        }
    }

    fn react_done(&mut self, view: &AppViewModel) {
        self.show_job(view);
        let Some(job) = &view.job else {
            return;
        };
        match job.status {
            JobStatus::Completed if self.saving.is_none() => {
                self.saving = Some(job.job_id.clone());
                self.output.push("Saving file...".to_string());
                self.push(Msg::SaveClicked);
            }
            JobStatus::Failed => {
                let message = job
                    .error
                    .clone()
                    .unwrap_or_else(|| "Download failed".to_string());
                self.finish(Outcome::Failed(message));
            }
            _ => {}
        }
    }

    fn show_job(&mut self, view: &AppViewModel) {
        if let Some(job) = &view.job {
            let line = render::job_line(job);
            if self.last_job_line.as_ref() != Some(&line) {
                self.output.push(line.clone());
                self.last_job_line = Some(line);
            }
        }
        if let Some(error) = view.error.as_ref().filter(|e| self.reported_error.as_ref() != Some(*e))
        {
            self.reported_error = Some(error.clone());
            self.output.push(format!("Warning: {error}"));
        }
    }

    fn choose(&mut self, format_id: String) {
        engine_info!("Format {} chosen", format_id);
        self.awaiting_choice = false;
        self.reported_error = None;
        self.output.push(format!("Starting download of format {format_id}"));
        self.push(Msg::FormatSelected(format_id));
        self.push(Msg::DownloadConfirmed);
    }

    fn prompt(&mut self, text: &str) {
        if !self.input_open {
            self.finish(Outcome::Failed("No format chosen before input closed".to_string()));
            return;
        }
        self.awaiting_choice = true;
        self.output.push(text.to_string());
    }

    /// Sends `url` back through extraction. The backend judges whether it is
    /// a URL at all.
    fn resubmit(&mut self, url: &str) {
        self.listed = false;
        self.reported_error = None;
        self.awaiting_choice = false;
        self.resubmitted = true;
        self.output.push(format!("Fetching formats for {url}"));
        self.push(Msg::UrlSubmitted(url.to_string()));
    }

    fn input(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        if matches!(line, "q" | "quit") {
            self.push(Msg::ResetClicked);
            self.finish(Outcome::Cancelled);
            return;
        }
        match self.state.phase() {
            Phase::Selecting if self.awaiting_choice => {
                let selection = self.state.view().selection;
                let picked = selection
                    .as_ref()
                    .and_then(|selection| render::pick_format(selection, line));
                match picked {
                    Some(format_id) => self.choose(format_id),
                    None if selection.is_some() && line.parse::<usize>().is_ok() => self
                        .output
                        .push(format!("No format {line:?}; enter a number from the list")),
                    None => self.resubmit(line),
                }
            }
            Phase::Downloading | Phase::Done if line == "r" => self.push(Msg::RefreshRequested),
            _ => {}
        }
    }

    fn input_closed(&mut self) {
        if !self.input_open {
            return;
        }
        self.input_open = false;
        if self.awaiting_choice {
            self.finish(Outcome::Failed("No format chosen before input closed".to_string()));
        }
    }

    fn file_saved(&mut self, job_id: &str, result: Result<PathBuf, ApiError>) {
        if self.saving.as_deref() != Some(job_id) {
            engine_warn!("Ignoring save result for job {}", job_id);
            return;
        }
        match result {
            Ok(path) => self.finish(Outcome::Saved(path)),
            Err(err) => self.finish(Outcome::Failed(format!(
                "Could not save file: {}",
                err.message
            ))),
        }
    }

    fn finish(&mut self, outcome: Outcome) {
        if self.outcome.is_none() {
            self.outcome = Some(outcome);
        }
    }

    fn shutdown(&mut self) -> Vec<Effect> {
        self.push(Msg::Shutdown);
        self.drain()
    }
}
