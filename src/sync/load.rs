use super::SyncError;
use super::controller::SyncController;
use crate::client::Backend;
use crate::config::Config;
use crate::layout::{LayoutEngine, apply_auto_layout};
use crate::source::model_from_records;
use tracing::info;

pub struct LoadedSession {
    pub controller: SyncController,
    /// True when no persisted positions existed and the engine placed everything.
    pub auto_laid_out: bool,
}

/// Fetches structure and layout concurrently and builds the initial controller.
pub async fn load_session(
    backend: &dyn Backend,
    engine: &dyn LayoutEngine,
    config: &Config,
) -> Result<LoadedSession, SyncError> {
    let (records, layout) = tokio::join!(backend.fetch_model(), backend.fetch_layout());
    let records = records?;
    let layout = layout?;

    let mut model = model_from_records(&records);
    let applied = layout.apply_to(&mut model);
    let auto_laid_out = !layout.has_positions();
    if auto_laid_out {
        apply_auto_layout(&mut model, engine, &config.layout)?;
    }

    info!(
        classes = model.nodes.len(),
        packages = model.packages.len(),
        edges = model.edges.len(),
        restored = applied,
        auto_laid_out,
        "session loaded"
    );

    Ok(LoadedSession {
        controller: SyncController::new(model, config),
        auto_laid_out,
    })
}
