//! Live-model ownership and the text/graph editing loop.

pub mod controller;
pub mod edit;
pub mod load;
pub mod merge;
pub mod session;

pub use controller::{EditState, ParseFn, PollOutcome, SyncController, SyncStatus};
pub use edit::{Edit, EditError, apply_edit};
pub use load::{LoadedSession, load_session};
pub use merge::{Attribute, MergeSummary, merge_models};
pub use session::{Command, Notice, SessionHandle, Snapshot, spawn_session};

use crate::client::BackendError;
use crate::layout::LayoutError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    /// Fetching the structural or layout record failed.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// The automatic layout pass at load time failed.
    #[error(transparent)]
    Layout(#[from] LayoutError),

    /// The session task has stopped and no longer accepts commands.
    #[error("sync session is closed")]
    SessionClosed,
}
