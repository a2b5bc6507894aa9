pub mod dagre;
pub mod handles;

use crate::config::LayoutConfig;
use crate::ir::{Model, Point, Size};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

pub use dagre::DagreEngine;
pub use handles::{HandlePair, select_handles};

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutNodeSpec {
    pub id: String,
    pub width: f32,
    pub height: f32,
    pub parent: Option<String>,
    /// Compound nodes are sized by the engine to enclose their children.
    pub compound: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LayoutEdgeSpec {
    pub source: String,
    pub target: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayoutRequest {
    pub nodes: Vec<LayoutNodeSpec>,
    pub edges: Vec<LayoutEdgeSpec>,
}

/// Where the engine put a node: absolute centre and effective size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodePlacement {
    pub center: Point,
    pub size: Size,
}

impl NodePlacement {
    pub fn top_left(&self) -> Point {
        self.center - self.size.half()
    }
}

pub type Placements = HashMap<String, NodePlacement>;

#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("layout engine returned no placement for `{0}`")]
    MissingPlacement(String),
    #[error("layout engine failed: {0}")]
    Engine(String),
}

/// A hierarchical graph layout algorithm treated as a black box.
pub trait LayoutEngine: Send + Sync {
    fn compute_layout(&self, request: &LayoutRequest) -> Result<Placements, LayoutError>;
}

pub fn build_request(model: &Model, config: &LayoutConfig) -> LayoutRequest {
    let mut request = LayoutRequest::default();
    let populated: HashSet<String> = model.nodes.iter().filter_map(|node| node.package_id()).collect();

    for pkg in &model.packages {
        let compound = populated.contains(&pkg.id);
        request.nodes.push(LayoutNodeSpec {
            id: pkg.id.clone(),
            width: pkg.size.width,
            height: pkg.size.height,
            parent: None,
            compound,
        });
    }

    for node in &model.nodes {
        let parent = node
            .package_id()
            .filter(|pkg_id| model.package(pkg_id).is_some());
        request.nodes.push(LayoutNodeSpec {
            id: node.id.clone(),
            width: config.node_width,
            height: config.node_height,
            parent,
            compound: false,
        });
    }

    let mut seen: HashSet<LayoutEdgeSpec> = HashSet::new();
    for edge in model.resolved_edges() {
        let spec = LayoutEdgeSpec {
            source: edge.source.clone(),
            target: edge.target.clone(),
        };
        if seen.insert(spec.clone()) {
            request.edges.push(spec);
        }
    }

    request
}

/// Runs `engine` over the model and writes back positions, package sizes and edge handles.
///
/// Children of a package receive coordinates local to the package's top-left corner.
/// Package sizes are replaced by the engine's bounding sizes. The model is left
/// untouched if any node lacks a placement.
pub fn apply_auto_layout(
    model: &mut Model,
    engine: &dyn LayoutEngine,
    config: &LayoutConfig,
) -> Result<(), LayoutError> {
    let request = build_request(model, config);
    let placements = engine.compute_layout(&request)?;

    for spec in &request.nodes {
        if !placements.contains_key(&spec.id) {
            return Err(LayoutError::MissingPlacement(spec.id.clone()));
        }
    }
    let placement = |id: &str| placements[id];

    for pkg in &mut model.packages {
        let placed = placement(&pkg.id);
        pkg.position = placed.top_left();
        pkg.size = placed.size;
    }

    let parents: HashMap<&str, Option<&str>> = request
        .nodes
        .iter()
        .map(|spec| (spec.id.as_str(), spec.parent.as_deref()))
        .collect();
    for node in &mut model.nodes {
        let own = placement(&node.id).top_left();
        node.position = match parents.get(node.id.as_str()).copied().flatten() {
            Some(parent_id) => own - placement(parent_id).top_left(),
            None => own,
        };
    }

    let class_ids: HashSet<&str> = model.nodes.iter().map(|node| node.id.as_str()).collect();
    let mut assignments: Vec<(usize, HandlePair)> = Vec::new();
    for (idx, edge) in model.edges.iter().enumerate() {
        if !class_ids.contains(edge.source.as_str()) || !class_ids.contains(edge.target.as_str()) {
            continue;
        }
        let pair = select_handles(placement(&edge.source).center, placement(&edge.target).center);
        assignments.push((idx, pair));
    }
    for (idx, pair) in assignments {
        let edge = &mut model.edges[idx];
        edge.source_handle = Some(pair.source_handle().to_string());
        edge.target_handle = Some(pair.target_handle().to_string());
    }

    Ok(())
}
