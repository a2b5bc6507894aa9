use super::{LayoutEdgeSpec, LayoutEngine, LayoutError, LayoutRequest, NodePlacement, Placements};
use crate::config::LayoutConfig;
use crate::ir::{Point, Size};
use dagre_rust::{
    GraphConfig as DagreConfig, GraphEdge as DagreEdge, GraphNode as DagreNode,
    layout as dagre_layout,
};
use graphlib_rust::{Graph as DagreGraph, GraphOption};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::panic::{self, AssertUnwindSafe};
use tracing::debug;

/// Layered layout through `dagre_rust`.
///
/// Packages are never handed to dagre as clusters. Each package's members are
/// laid out on their own, the package is sized to their bounding box plus the
/// configured margins, and the packages then take part in the top-level pass
/// as ordinary sized nodes.
#[derive(Debug, Clone, Default)]
pub struct DagreEngine {
    config: LayoutConfig,
}

/// One flat dagre pass: centres keyed by node id.
type Centers = HashMap<String, Point>;

impl DagreEngine {
    pub fn new(config: LayoutConfig) -> Self {
        Self { config }
    }

    fn graph_config(&self) -> DagreConfig {
        let mut graph_config = DagreConfig::default();
        graph_config.rankdir = Some(self.config.direction.rankdir().to_string());
        graph_config.nodesep = Some(self.config.node_spacing);
        graph_config.ranksep = Some(self.config.rank_spacing);
        graph_config.marginx = Some(self.config.margin_x);
        graph_config.marginy = Some(self.config.margin_y);
        graph_config
    }

    fn run_flat(&self, nodes: &[(String, Size)], edges: &[(String, String)]) -> Result<Centers, LayoutError> {
        let mut dagre_graph: DagreGraph<DagreConfig, DagreNode, DagreEdge> =
            DagreGraph::new(Some(GraphOption {
                directed: Some(true),
                multigraph: Some(false),
                compound: Some(false),
            }));
        dagre_graph.set_graph(self.graph_config());

        for (id, size) in nodes {
            let mut node = DagreNode::default();
            node.width = size.width;
            node.height = size.height;
            dagre_graph.set_node(id.clone(), Some(node));
        }

        let mut edge_set: HashSet<(&String, &String)> = HashSet::new();
        for (from, to) in edges {
            if from == to || !edge_set.insert((from, to)) {
                continue;
            }
            let _ = dagre_graph.set_edge(from, to, Some(DagreEdge::default()), None);
        }

        panic::catch_unwind(AssertUnwindSafe(|| dagre_layout::run_layout(&mut dagre_graph)))
            .map_err(|cause| LayoutError::Engine(panic_message(cause.as_ref())))?;

        let mut centers = Centers::new();
        for (id, _) in nodes {
            let Some(dagre_node) = dagre_graph.node(id) else {
                return Err(LayoutError::MissingPlacement(id.clone()));
            };
            centers.insert(id.clone(), Point::new(dagre_node.x, dagre_node.y));
        }
        Ok(centers)
    }
}

impl LayoutEngine for DagreEngine {
    fn compute_layout(&self, request: &LayoutRequest) -> Result<Placements, LayoutError> {
        let mut placements = Placements::new();
        if request.nodes.is_empty() {
            return Ok(placements);
        }

        let compound_ids: HashSet<&str> = request
            .nodes
            .iter()
            .filter(|spec| spec.compound)
            .map(|spec| spec.id.as_str())
            .collect();
        let mut members: BTreeMap<String, Vec<(String, Size)>> = BTreeMap::new();
        let mut owner: HashMap<String, String> = HashMap::new();
        for spec in &request.nodes {
            let Some(parent) = spec.parent.as_deref() else {
                continue;
            };
            if compound_ids.contains(parent) {
                members
                    .entry(parent.to_string())
                    .or_default()
                    .push((spec.id.clone(), Size::new(spec.width, spec.height)));
                owner.insert(spec.id.clone(), parent.to_string());
            }
        }

        // Member offsets from their package's top-left corner.
        let mut local: HashMap<String, Point> = HashMap::new();
        let mut package_sizes: HashMap<String, Size> = HashMap::new();
        for (package_id, children) in &members {
            let inner = inner_edges(&request.edges, &owner, package_id);
            let centers = self.run_flat(children, &inner)?;

            let mut min = Point::new(f32::MAX, f32::MAX);
            let mut max = Point::new(f32::MIN, f32::MIN);
            for (id, size) in children {
                let top_left = centers[id] - size.half();
                min.x = min.x.min(top_left.x);
                min.y = min.y.min(top_left.y);
                max.x = max.x.max(top_left.x + size.width);
                max.y = max.y.max(top_left.y + size.height);
            }
            let padding = Point::new(self.config.margin_x, self.config.margin_y);
            for (id, size) in children {
                local.insert(id.clone(), centers[id] - size.half() - min + padding);
            }
            let bounds = Size::new(
                (max.x - min.x + 2.0 * padding.x).max(self.config.package_min_size.width),
                (max.y - min.y + 2.0 * padding.y).max(self.config.package_min_size.height),
            );
            package_sizes.insert(package_id.clone(), bounds);
        }

        let top_nodes: Vec<(String, Size)> = request
            .nodes
            .iter()
            .filter(|spec| !owner.contains_key(&spec.id))
            .map(|spec| {
                let size = package_sizes
                    .get(&spec.id)
                    .copied()
                    .unwrap_or_else(|| Size::new(spec.width, spec.height));
                (spec.id.clone(), size)
            })
            .collect();
        // Edges crossing a package boundary pull the whole package.
        let lift = |id: &String| owner.get(id).unwrap_or(id).clone();
        let top_edges: Vec<(String, String)> = request
            .edges
            .iter()
            .map(|edge| (lift(&edge.source), lift(&edge.target)))
            .filter(|(from, to)| from != to)
            .collect();
        let centers = self.run_flat(&top_nodes, &top_edges)?;

        for (id, size) in &top_nodes {
            placements.insert(
                id.clone(),
                NodePlacement {
                    center: centers[id],
                    size: *size,
                },
            );
        }
        for spec in &request.nodes {
            let (Some(package_id), Some(&offset)) = (owner.get(&spec.id), local.get(&spec.id)) else {
                continue;
            };
            let Some(package) = placements.get(package_id).copied() else {
                return Err(LayoutError::MissingPlacement(package_id.clone()));
            };
            let size = Size::new(spec.width, spec.height);
            placements.insert(
                spec.id.clone(),
                NodePlacement {
                    center: package.top_left() + offset + size.half(),
                    size,
                },
            );
        }

        debug!(
            nodes = request.nodes.len(),
            edges = request.edges.len(),
            packages = members.len(),
            rankdir = self.config.direction.rankdir(),
            "dagre layout complete"
        );
        Ok(placements)
    }
}

fn inner_edges(
    edges: &[LayoutEdgeSpec],
    owner: &HashMap<String, String>,
    package_id: &str,
) -> Vec<(String, String)> {
    let inside = |id: &String| owner.get(id).is_some_and(|owner_id| owner_id == package_id);
    edges
        .iter()
        .filter(|edge| inside(&edge.source) && inside(&edge.target))
        .map(|edge| (edge.source.clone(), edge.target.clone()))
        .collect()
}

fn panic_message(cause: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = cause.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = cause.downcast_ref::<String>() {
        message.clone()
    } else {
        "dagre layout panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Direction;
    use crate::layout::LayoutNodeSpec;

    fn leaf(id: &str, parent: Option<&str>) -> LayoutNodeSpec {
        LayoutNodeSpec {
            id: id.to_string(),
            width: 420.0,
            height: 500.0,
            parent: parent.map(str::to_string),
            compound: false,
        }
    }

    fn package(id: &str) -> LayoutNodeSpec {
        LayoutNodeSpec {
            id: id.to_string(),
            width: 500.0,
            height: 400.0,
            parent: None,
            compound: true,
        }
    }

    fn edge(source: &str, target: &str) -> LayoutEdgeSpec {
        LayoutEdgeSpec {
            source: source.to_string(),
            target: target.to_string(),
        }
    }

    fn contains(outer: &NodePlacement, inner: &NodePlacement) -> bool {
        let o = outer.top_left();
        let i = inner.top_left();
        i.x >= o.x
            && i.y >= o.y
            && i.x + inner.size.width <= o.x + outer.size.width + 0.01
            && i.y + inner.size.height <= o.y + outer.size.height + 0.01
    }

    #[test]
    fn every_node_gets_a_placement() {
        let request = LayoutRequest {
            nodes: vec![leaf("A", None), leaf("B", None), leaf("C", None)],
            edges: vec![edge("A", "B"), edge("A", "C")],
        };
        let placements = DagreEngine::default().compute_layout(&request).unwrap();
        assert_eq!(placements.len(), 3);
        let a = placements["A"];
        let b = placements["B"];
        assert_eq!(a.size, Size::new(420.0, 500.0));
        // top-down ranks: the target sits below its source
        assert!(b.center.y > a.center.y);
    }

    #[test]
    fn left_right_ranks_along_x() {
        let config = LayoutConfig {
            direction: Direction::LeftRight,
            ..LayoutConfig::default()
        };
        let request = LayoutRequest {
            nodes: vec![leaf("A", None), leaf("B", None)],
            edges: vec![edge("A", "B")],
        };
        let placements = DagreEngine::new(config).compute_layout(&request).unwrap();
        assert!(placements["B"].center.x > placements["A"].center.x);
    }

    #[test]
    fn empty_request_yields_no_placements() {
        let placements = DagreEngine::default()
            .compute_layout(&LayoutRequest::default())
            .unwrap();
        assert!(placements.is_empty());
    }

    #[test]
    fn single_member_package_encloses_its_class() {
        let request = LayoutRequest {
            nodes: vec![package("pkg-a"), leaf("A", Some("pkg-a"))],
            edges: Vec::new(),
        };
        let placements = DagreEngine::default().compute_layout(&request).unwrap();
        let pkg = placements["pkg-a"];
        // 420x500 member plus 100 margin on each side
        assert_eq!(pkg.size, Size::new(620.0, 700.0));
        assert!(contains(&pkg, &placements["A"]));
    }

    #[test]
    fn packages_enclose_members_and_do_not_overlap() {
        let request = LayoutRequest {
            nodes: vec![
                package("pkg-shop"),
                package("pkg-billing"),
                leaf("Order", Some("pkg-shop")),
                leaf("Customer", Some("pkg-shop")),
                leaf("Invoice", Some("pkg-billing")),
                leaf("Audit", None),
            ],
            edges: vec![
                edge("Order", "Customer"),
                edge("Invoice", "Order"),
                edge("Audit", "Invoice"),
            ],
        };
        let placements = DagreEngine::default().compute_layout(&request).unwrap();
        assert_eq!(placements.len(), 6);

        let shop = placements["pkg-shop"];
        let billing = placements["pkg-billing"];
        assert!(contains(&shop, &placements["Order"]));
        assert!(contains(&shop, &placements["Customer"]));
        assert!(contains(&billing, &placements["Invoice"]));
        assert!(!contains(&shop, &placements["Audit"]));

        let (s, b) = (shop.top_left(), billing.top_left());
        let apart = s.x + shop.size.width <= b.x
            || b.x + billing.size.width <= s.x
            || s.y + shop.size.height <= b.y
            || b.y + billing.size.height <= s.y;
        assert!(apart, "packages overlap: {shop:?} {billing:?}");
    }
}
