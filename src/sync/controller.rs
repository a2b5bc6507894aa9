use super::edit::{Edit, EditError, apply_edit};
use super::merge::merge_models;
use crate::config::{Config, LayoutConfig};
use crate::generator::generate_aml;
use crate::ir::Model;
use crate::layout::{LayoutEngine, LayoutError, apply_auto_layout};
use crate::layout_record::LayoutRecord;
use crate::parser::{ParseError, ParsedAml, parse_aml};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Text-to-model parse step. Swappable so failures can be forced in tests.
pub type ParseFn = fn(&str) -> Result<ParsedAml, ParseError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    Synced,
    Syncing,
    Error,
}

/// Who is currently allowed to drive the text pane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditState {
    Idle,
    ApplyingFromText,
    UserEditingText,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// No deadline, or it has not passed yet.
    Pending,
    /// The deadline passed while text was being edited; marked stale.
    Deferred,
    /// The text already described the model.
    Unchanged,
    Regenerated,
}

pub struct SyncController {
    model: Model,
    text: String,
    status: SyncStatus,
    state: EditState,
    deadline: Option<Instant>,
    stale: bool,
    /// Set by edits outside the visual attribute set; cleared once text is checked.
    structural_edits: bool,
    last_error: Option<String>,
    debounce: Duration,
    layout: LayoutConfig,
    parse_fn: ParseFn,
}

impl SyncController {
    pub fn new(model: Model, config: &Config) -> Self {
        let text = generate_aml(&model);
        Self {
            model,
            text,
            status: SyncStatus::Synced,
            state: EditState::Idle,
            deadline: None,
            stale: false,
            structural_edits: false,
            last_error: None,
            debounce: config.sync.debounce(),
            layout: config.layout.clone(),
            parse_fn: parse_aml,
        }
    }

    pub fn with_parser(mut self, parse_fn: ParseFn) -> Self {
        self.parse_fn = parse_fn;
        self
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn status(&self) -> SyncStatus {
        self.status
    }

    pub fn edit_state(&self) -> EditState {
        self.state
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn layout_record(&self) -> LayoutRecord {
        LayoutRecord::from_model(&self.model)
    }

    /// Takes `text` as the new text pane content and merges it into the model.
    ///
    /// A parse failure sets [`SyncStatus::Error`] and leaves the model as it was.
    pub fn apply_text(&mut self, text: &str) -> Result<(), ParseError> {
        self.text = text.to_string();
        self.status = SyncStatus::Syncing;
        let previous = self.state;
        self.state = EditState::ApplyingFromText;

        let result = (self.parse_fn)(text);
        let outcome = match result {
            Ok(parsed) => {
                if !parsed.duplicates.is_empty() {
                    warn!(names = ?parsed.duplicates, "duplicate declarations; last one kept");
                }
                merge_models(&mut self.model, parsed.into_model());
                self.status = SyncStatus::Synced;
                self.last_error = None;
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "text rejected; keeping last good model");
                self.status = SyncStatus::Error;
                self.last_error = Some(err.to_string());
                Err(err)
            }
        };

        self.state = previous;
        outcome
    }

    /// Applies a graph edit and restarts the regeneration debounce.
    pub fn apply_edit(&mut self, edit: Edit, now: Instant) -> Result<(), EditError> {
        debug!(?edit, attribute = ?edit.attribute(), "applying graph edit");
        let visual = edit.is_visual();
        apply_edit(&mut self.model, edit, &self.layout)?;
        self.structural_edits |= !visual;
        self.schedule(now);
        Ok(())
    }

    pub fn auto_layout(&mut self, engine: &dyn LayoutEngine, now: Instant) -> Result<(), LayoutError> {
        apply_auto_layout(&mut self.model, engine, &self.layout)?;
        self.schedule(now);
        Ok(())
    }

    fn schedule(&mut self, now: Instant) {
        if self.state == EditState::ApplyingFromText {
            return;
        }
        self.deadline = Some(now + self.debounce);
    }

    /// Runs a due regeneration. Call whenever the deadline may have passed.
    pub fn poll(&mut self, now: Instant) -> PollOutcome {
        let Some(deadline) = self.deadline else {
            return PollOutcome::Pending;
        };
        if now < deadline {
            return PollOutcome::Pending;
        }
        self.deadline = None;

        if self.state != EditState::Idle {
            debug!(state = ?self.state, "regeneration deferred until the editor is released");
            self.stale = true;
            return PollOutcome::Deferred;
        }
        self.stale = false;

        // Visual edits cannot change the text unless it is currently unparsable.
        let check = self.structural_edits || self.status == SyncStatus::Error;
        self.structural_edits = false;
        if !check {
            return PollOutcome::Unchanged;
        }

        let structure = self.model.structure();
        let current = (self.parse_fn)(&self.text).map(|parsed| parsed.into_model().structure());
        if current.as_ref().is_ok_and(|existing| *existing == structure) {
            return PollOutcome::Unchanged;
        }

        self.text = generate_aml(&self.model);
        self.status = SyncStatus::Synced;
        self.last_error = None;
        info!(bytes = self.text.len(), "text regenerated from graph");
        PollOutcome::Regenerated
    }

    pub fn set_editor_focus(&mut self, focused: bool, now: Instant) {
        match (focused, self.state) {
            (true, EditState::Idle) => self.state = EditState::UserEditingText,
            (false, EditState::UserEditingText) => {
                self.state = EditState::Idle;
                if self.stale {
                    self.schedule(now);
                }
            }
            _ => {}
        }
    }
}
