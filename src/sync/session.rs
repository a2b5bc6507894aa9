use super::SyncError;
use super::controller::{EditState, PollOutcome, SyncController, SyncStatus};
use super::edit::Edit;
use crate::client::Backend;
use crate::ir::Model;
use crate::layout::LayoutEngine;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug)]
pub enum Command {
    ApplyText(String),
    Edit(Edit),
    EditorFocus(bool),
    AutoLayout,
    Save,
    Snapshot(oneshot::Sender<Snapshot>),
    Shutdown,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub model: Model,
    pub text: String,
    pub status: SyncStatus,
    pub edit_state: EditState,
    pub stale: bool,
}

/// Outcomes the session reports back to its owner.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    TextRegenerated(String),
    ParseFailed(String),
    EditRejected(String),
    LayoutFailed(String),
    Saved,
    SaveFailed(String),
}

pub struct SessionHandle {
    commands: mpsc::UnboundedSender<Command>,
    pub notices: mpsc::UnboundedReceiver<Notice>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    pub fn send(&self, command: Command) -> Result<(), SyncError> {
        self.commands
            .send(command)
            .map_err(|_| SyncError::SessionClosed)
    }

    pub fn apply_text(&self, text: impl Into<String>) -> Result<(), SyncError> {
        self.send(Command::ApplyText(text.into()))
    }

    pub fn edit(&self, edit: Edit) -> Result<(), SyncError> {
        self.send(Command::Edit(edit))
    }

    pub fn set_editor_focus(&self, focused: bool) -> Result<(), SyncError> {
        self.send(Command::EditorFocus(focused))
    }

    /// Requests a layout save; the outcome arrives as `Notice::Saved` or `Notice::SaveFailed`.
    pub fn save(&self) -> Result<(), SyncError> {
        self.send(Command::Save)
    }

    pub async fn snapshot(&self) -> Result<Snapshot, SyncError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Snapshot(tx))?;
        rx.await.map_err(|_| SyncError::SessionClosed)
    }

    pub async fn shutdown(self) {
        let _ = self.commands.send(Command::Shutdown);
        let _ = self.task.await;
    }
}

/// Spawns the task that owns `controller`. It is the only mutator of the live model.
pub fn spawn_session(
    controller: SyncController,
    backend: Arc<dyn Backend>,
    engine: Arc<dyn LayoutEngine>,
) -> SessionHandle {
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (notice_tx, notice_rx) = mpsc::unbounded_channel();
    let session = Session {
        controller,
        backend,
        engine,
        notices: notice_tx,
    };
    let task = tokio::spawn(session.run(command_rx));
    SessionHandle {
        commands: command_tx,
        notices: notice_rx,
        task,
    }
}

struct Session {
    controller: SyncController,
    backend: Arc<dyn Backend>,
    engine: Arc<dyn LayoutEngine>,
    notices: mpsc::UnboundedSender<Notice>,
}

impl Session {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        info!("sync session started");
        loop {
            let deadline = self.controller.deadline();
            tokio::select! {
                maybe_command = commands.recv() => {
                    match maybe_command {
                        Some(Command::Shutdown) | None => break,
                        Some(command) => self.handle(command),
                    }
                }
                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.on_deadline();
                }
            }
        }
        info!("sync session stopped");
    }

    fn handle(&mut self, command: Command) {
        let now = Instant::now();
        match command {
            Command::ApplyText(text) => {
                if let Err(err) = self.controller.apply_text(&text) {
                    self.notify(Notice::ParseFailed(err.to_string()));
                }
            }
            Command::Edit(edit) => {
                if let Err(err) = self.controller.apply_edit(edit, now) {
                    debug!(error = %err, "graph edit rejected");
                    self.notify(Notice::EditRejected(err.to_string()));
                }
            }
            Command::EditorFocus(focused) => self.controller.set_editor_focus(focused, now),
            Command::AutoLayout => {
                if let Err(err) = self.controller.auto_layout(self.engine.as_ref(), now) {
                    warn!(error = %err, "automatic layout failed");
                    self.notify(Notice::LayoutFailed(err.to_string()));
                }
            }
            Command::Save => self.save(),
            Command::Snapshot(reply) => {
                let _ = reply.send(Snapshot {
                    model: self.controller.model().clone(),
                    text: self.controller.text().to_string(),
                    status: self.controller.status(),
                    edit_state: self.controller.edit_state(),
                    stale: self.controller.is_stale(),
                });
            }
            Command::Shutdown => {}
        }
    }

    fn on_deadline(&mut self) {
        if self.controller.poll(Instant::now()) == PollOutcome::Regenerated {
            self.notify(Notice::TextRegenerated(self.controller.text().to_string()));
        }
    }

    /// Fire-and-forget save; the result arrives later as a notice.
    fn save(&self) {
        let record = self.controller.layout_record();
        debug!(elements = record.positions.len(), "saving layout record");
        let backend = Arc::clone(&self.backend);
        let notices = self.notices.clone();
        tokio::spawn(async move {
            let notice = match backend.save_layout(&record).await {
                Ok(()) => Notice::Saved,
                Err(err) => {
                    warn!(error = %err, "layout save failed");
                    Notice::SaveFailed(err.to_string())
                }
            };
            let _ = notices.send(notice);
        });
    }

    fn notify(&self, notice: Notice) {
        let _ = self.notices.send(notice);
    }
}
