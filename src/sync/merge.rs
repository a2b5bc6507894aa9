use crate::ir::{ClassNode, Model, PackageNode, Relationship};
use std::collections::HashMap;
use tracing::debug;

/// Every attribute an edit or a merge can touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    Position,
    Size,
    Color,
    FontSize,
    Waypoints,
    Handles,
    Kind,
    Abstract,
    Members,
    Package,
    Endpoints,
}

impl Attribute {
    pub const NODE: [Attribute; 7] = [
        Self::Kind,
        Self::Abstract,
        Self::Members,
        Self::Package,
        Self::Position,
        Self::Color,
        Self::FontSize,
    ];
    pub const PACKAGE: [Attribute; 4] = [Self::Position, Self::Size, Self::Color, Self::FontSize];
    pub const EDGE: [Attribute; 3] = [Self::Endpoints, Self::Waypoints, Self::Handles];

    /// Visual attributes live only in the graph; text never overwrites them.
    pub fn is_visual(self) -> bool {
        match self {
            Self::Position
            | Self::Size
            | Self::Color
            | Self::FontSize
            | Self::Waypoints
            | Self::Handles => true,
            Self::Kind | Self::Abstract | Self::Members | Self::Package | Self::Endpoints => false,
        }
    }
}

fn carry_node(attr: Attribute, from: &ClassNode, to: &mut ClassNode) {
    match attr {
        Attribute::Position => to.position = from.position,
        Attribute::Color => to.color = from.color.clone(),
        Attribute::FontSize => to.font = from.font,
        Attribute::Kind => to.kind = from.kind,
        Attribute::Abstract => to.is_abstract = from.is_abstract,
        Attribute::Members => {
            to.fields = from.fields.clone();
            to.methods = from.methods.clone();
        }
        Attribute::Package => to.package = from.package.clone(),
        Attribute::Size | Attribute::Waypoints | Attribute::Handles | Attribute::Endpoints => {}
    }
}

fn carry_package(attr: Attribute, from: &PackageNode, to: &mut PackageNode) {
    match attr {
        Attribute::Position => to.position = from.position,
        Attribute::Size => to.size = from.size,
        Attribute::Color => to.color = from.color.clone(),
        Attribute::FontSize => to.font_size = from.font_size,
        _ => {}
    }
}

fn carry_edge(attr: Attribute, from: &Relationship, to: &mut Relationship) {
    match attr {
        Attribute::Waypoints => to.waypoints = from.waypoints.clone(),
        Attribute::Handles => {
            to.source_handle = from.source_handle.clone();
            to.target_handle = from.target_handle.clone();
        }
        Attribute::Endpoints => {
            to.source = from.source.clone();
            to.target = from.target.clone();
            to.kind = from.kind;
        }
        _ => {}
    }
}

fn visual_only(attrs: &[Attribute]) -> Vec<Attribute> {
    attrs.iter().copied().filter(|attr| attr.is_visual()).collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub added: usize,
    pub removed: usize,
    pub kept: usize,
}

/// Reconciles `live` with a freshly parsed model.
///
/// Structure comes from `parsed`; visual attributes of elements present in
/// both survive. Elements missing from `parsed` are dropped. A node that moved
/// to another package takes the parsed default position.
pub fn merge_models(live: &mut Model, parsed: Model) -> MergeSummary {
    let mut summary = MergeSummary::default();
    let node_visual = visual_only(&Attribute::NODE);
    let package_visual = visual_only(&Attribute::PACKAGE);
    let edge_visual = visual_only(&Attribute::EDGE);

    let mut old_packages: HashMap<String, PackageNode> = live
        .packages
        .drain(..)
        .map(|pkg| (pkg.id.clone(), pkg))
        .collect();
    for mut pkg in parsed.packages {
        match old_packages.remove(&pkg.id) {
            Some(old) => {
                for attr in &package_visual {
                    carry_package(*attr, &old, &mut pkg);
                }
                summary.kept += 1;
            }
            None => summary.added += 1,
        }
        live.packages.push(pkg);
    }
    summary.removed += old_packages.len();

    let mut old_nodes: HashMap<String, ClassNode> = live
        .nodes
        .drain(..)
        .map(|node| (node.id.clone(), node))
        .collect();
    for mut node in parsed.nodes {
        match old_nodes.remove(&node.id) {
            Some(old) => {
                let parsed_position = node.position;
                for attr in &node_visual {
                    carry_node(*attr, &old, &mut node);
                }
                if old.package != node.package {
                    debug!(id = %node.id, from = ?old.package, to = ?node.package, "node changed package; position reset");
                    node.position = parsed_position;
                }
                summary.kept += 1;
            }
            None => summary.added += 1,
        }
        live.nodes.push(node);
    }
    summary.removed += old_nodes.len();

    let mut old_edges: HashMap<String, Relationship> = live
        .edges
        .drain(..)
        .map(|edge| (edge.id.clone(), edge))
        .collect();
    for mut edge in parsed.edges {
        match old_edges.remove(&edge.id) {
            Some(old) => {
                for attr in &edge_visual {
                    carry_edge(*attr, &old, &mut edge);
                }
                summary.kept += 1;
            }
            None => summary.added += 1,
        }
        live.edges.push(edge);
    }
    summary.removed += old_edges.len();

    debug!(
        added = summary.added,
        removed = summary.removed,
        kept = summary.kept,
        "merged parsed model into live model"
    );
    summary
}
