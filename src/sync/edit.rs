use super::merge::Attribute;
use crate::config::LayoutConfig;
use crate::ir::{FontSizes, Model, Point, RelationKind, Relationship, Size};
use crate::layout::handles::{is_source_handle, is_target_handle};
use thiserror::Error;

/// A change made on the graph side.
#[derive(Debug, Clone, PartialEq)]
pub enum Edit {
    /// Moves a class node or a package (`pkg-*` id).
    MoveNode { id: String, position: Point },
    ResizePackage { id: String, size: Size },
    /// Recolours a class node or a package. `None` restores the default.
    Recolor { id: String, color: Option<String> },
    /// For packages only `header` is used.
    SetFont { id: String, font: FontSizes },
    AddWaypoint { edge: String, index: usize, point: Point },
    MoveWaypoint { edge: String, index: usize, point: Point },
    RemoveWaypoint { edge: String, index: usize },
    SetHandles {
        edge: String,
        source_handle: Option<String>,
        target_handle: Option<String>,
    },
    Connect { source: String, target: String, kind: RelationKind },
    Disconnect { edge: String },
    /// Moves a class node into the named package, or to top level.
    Reparent { id: String, package: Option<String> },
}

impl Edit {
    pub fn attribute(&self) -> Attribute {
        match self {
            Self::MoveNode { .. } => Attribute::Position,
            Self::ResizePackage { .. } => Attribute::Size,
            Self::Recolor { .. } => Attribute::Color,
            Self::SetFont { .. } => Attribute::FontSize,
            Self::AddWaypoint { .. } | Self::MoveWaypoint { .. } | Self::RemoveWaypoint { .. } => {
                Attribute::Waypoints
            }
            Self::SetHandles { .. } => Attribute::Handles,
            Self::Connect { .. } | Self::Disconnect { .. } => Attribute::Endpoints,
            Self::Reparent { .. } => Attribute::Package,
        }
    }

    pub fn is_visual(&self) -> bool {
        self.attribute().is_visual()
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum EditError {
    #[error("no class node or package with id `{0}`")]
    UnknownElement(String),

    #[error("no class node with id `{0}`")]
    UnknownNode(String),

    #[error("no package with id or name `{0}`")]
    UnknownPackage(String),

    #[error("no edge with id `{0}`")]
    UnknownEdge(String),

    #[error("waypoint {index} out of range for edge `{edge}` ({len} waypoints)")]
    WaypointOutOfRange { edge: String, index: usize, len: usize },

    #[error("`{0}` is not a valid handle for this end of the edge")]
    InvalidHandle(String),
}

/// Applies one graph edit. On error the model is left unchanged.
pub fn apply_edit(model: &mut Model, edit: Edit, config: &LayoutConfig) -> Result<(), EditError> {
    match edit {
        Edit::MoveNode { id, position } => {
            if let Some(pkg) = model.package_mut(&id) {
                pkg.position = position;
            } else if let Some(node) = model.node_mut(&id) {
                node.position = position;
            } else {
                return Err(EditError::UnknownElement(id));
            }
        }
        Edit::ResizePackage { id, size } => {
            let pkg = model
                .package_mut(&id)
                .ok_or_else(|| EditError::UnknownPackage(id.clone()))?;
            pkg.size = size.clamp_min(config.package_min_size);
        }
        Edit::Recolor { id, color } => {
            if let Some(pkg) = model.package_mut(&id) {
                pkg.color = color;
            } else if let Some(node) = model.node_mut(&id) {
                node.color = color;
            } else {
                return Err(EditError::UnknownElement(id));
            }
        }
        Edit::SetFont { id, font } => {
            if let Some(pkg) = model.package_mut(&id) {
                pkg.font_size = font.header;
            } else if let Some(node) = model.node_mut(&id) {
                node.font = font;
            } else {
                return Err(EditError::UnknownElement(id));
            }
        }
        Edit::AddWaypoint { edge, index, point } => {
            let rel = find_edge(model, &edge)?;
            if index > rel.waypoints.len() {
                return Err(out_of_range(edge, index, rel.waypoints.len()));
            }
            rel.waypoints.insert(index, point);
        }
        Edit::MoveWaypoint { edge, index, point } => {
            let rel = find_edge(model, &edge)?;
            let len = rel.waypoints.len();
            match rel.waypoints.get_mut(index) {
                Some(slot) => *slot = point,
                None => return Err(out_of_range(edge, index, len)),
            }
        }
        Edit::RemoveWaypoint { edge, index } => {
            let rel = find_edge(model, &edge)?;
            if index >= rel.waypoints.len() {
                return Err(out_of_range(edge, index, rel.waypoints.len()));
            }
            rel.waypoints.remove(index);
        }
        Edit::SetHandles {
            edge,
            source_handle,
            target_handle,
        } => {
            if let Some(handle) = source_handle.as_deref().filter(|h| !is_source_handle(h)) {
                return Err(EditError::InvalidHandle(handle.to_string()));
            }
            if let Some(handle) = target_handle.as_deref().filter(|h| !is_target_handle(h)) {
                return Err(EditError::InvalidHandle(handle.to_string()));
            }
            let rel = find_edge(model, &edge)?;
            rel.source_handle = source_handle;
            rel.target_handle = target_handle;
        }
        Edit::Connect { source, target, kind } => {
            for id in [&source, &target] {
                if model.node(id).is_none() {
                    return Err(EditError::UnknownNode(id.clone()));
                }
            }
            model.edges.push(Relationship::new(&source, &target, kind));
            model.renumber_edges();
        }
        Edit::Disconnect { edge } => {
            let idx = model
                .edges
                .iter()
                .position(|rel| rel.id == edge)
                .ok_or(EditError::UnknownEdge(edge))?;
            model.edges.remove(idx);
            model.renumber_edges();
        }
        Edit::Reparent { id, package } => {
            if let Some(name) = package.as_deref() {
                if model.package_named(name).is_none() {
                    return Err(EditError::UnknownPackage(name.to_string()));
                }
            }
            let node = model
                .node_mut(&id)
                .ok_or_else(|| EditError::UnknownNode(id.clone()))?;
            if node.package != package {
                node.package = package;
                node.position = config.default_node_position;
            }
        }
    }
    Ok(())
}

fn find_edge<'a>(model: &'a mut Model, id: &str) -> Result<&'a mut Relationship, EditError> {
    model
        .edge_mut(id)
        .ok_or_else(|| EditError::UnknownEdge(id.to_string()))
}

fn out_of_range(edge: String, index: usize, len: usize) -> EditError {
    EditError::WaypointOutOfRange { edge, index, len }
}
