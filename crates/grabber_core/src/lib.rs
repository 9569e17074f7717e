//! Grabber core: pure workflow state machine and view-model helpers.
mod effect;
mod extraction;
mod msg;
mod state;
mod status;
mod stream;
mod types;
mod update;
mod view_model;

pub use effect::Effect;
pub use extraction::{ExtractionController, RequestToken, EXTRACT_FAILED_MESSAGE};
pub use msg::Msg;
pub use state::{AppState, Phase, START_FAILED_MESSAGE};
pub use status::{SignalSource, StatusReducer, StatusSignal};
pub use stream::{Delivered, ProgressStream, StreamCommand, StreamEvent, SubscriptionId};
pub use types::{FormatOption, JobId, JobRecord, JobStatus, ProgressEvent, VideoMetadata};
pub use update::update;
pub use view_model::{
    format_eta, format_size, format_speed, AppViewModel, JobView, SelectionView,
};
