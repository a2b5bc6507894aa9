use crate::ir::{Model, Point, Size};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Persisted visual state, keyed by package, node or edge id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayoutRecord {
    #[serde(default)]
    pub positions: BTreeMap<String, ElementLayout>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementLayout {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Point>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<Size>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Header size for class nodes, title size for packages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_font_size: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method_font_size: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vertices: Option<Vec<Point>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
}

impl LayoutRecord {
    pub fn from_model(model: &Model) -> Self {
        let mut positions = BTreeMap::new();

        for pkg in &model.packages {
            positions.insert(
                pkg.id.clone(),
                ElementLayout {
                    position: Some(pkg.position),
                    size: Some(pkg.size),
                    color: pkg.color.clone(),
                    font_size: pkg.font_size,
                    ..ElementLayout::default()
                },
            );
        }

        for node in &model.nodes {
            positions.insert(
                node.id.clone(),
                ElementLayout {
                    position: Some(node.position),
                    color: node.color.clone(),
                    font_size: node.font.header,
                    field_font_size: node.font.fields,
                    method_font_size: node.font.methods,
                    ..ElementLayout::default()
                },
            );
        }

        for edge in &model.edges {
            let has_visuals = !edge.waypoints.is_empty()
                || edge.source_handle.is_some()
                || edge.target_handle.is_some();
            if !has_visuals {
                continue;
            }
            positions.insert(
                edge.id.clone(),
                ElementLayout {
                    vertices: (!edge.waypoints.is_empty()).then(|| edge.waypoints.clone()),
                    source_handle: edge.source_handle.clone(),
                    target_handle: edge.target_handle.clone(),
                    ..ElementLayout::default()
                },
            );
        }

        Self { positions }
    }

    /// Copies recorded visual attributes onto matching elements. Unknown ids are ignored.
    pub fn apply_to(&self, model: &mut Model) -> usize {
        let mut applied = 0;

        for pkg in &mut model.packages {
            let Some(entry) = self.positions.get(&pkg.id) else {
                continue;
            };
            if let Some(position) = entry.position {
                pkg.position = position;
            }
            if let Some(size) = entry.size {
                pkg.size = size;
            }
            if entry.color.is_some() {
                pkg.color = entry.color.clone();
            }
            if entry.font_size.is_some() {
                pkg.font_size = entry.font_size;
            }
            applied += 1;
        }

        for node in &mut model.nodes {
            let Some(entry) = self.positions.get(&node.id) else {
                continue;
            };
            if let Some(position) = entry.position {
                node.position = position;
            }
            if entry.color.is_some() {
                node.color = entry.color.clone();
            }
            if entry.font_size.is_some() {
                node.font.header = entry.font_size;
            }
            if entry.field_font_size.is_some() {
                node.font.fields = entry.field_font_size;
            }
            if entry.method_font_size.is_some() {
                node.font.methods = entry.method_font_size;
            }
            applied += 1;
        }

        for edge in &mut model.edges {
            let Some(entry) = self.positions.get(&edge.id) else {
                continue;
            };
            if let Some(vertices) = &entry.vertices {
                edge.waypoints = vertices.clone();
            }
            if entry.source_handle.is_some() {
                edge.source_handle = entry.source_handle.clone();
            }
            if entry.target_handle.is_some() {
                edge.target_handle = entry.target_handle.clone();
            }
            applied += 1;
        }

        applied
    }

    pub fn has_positions(&self) -> bool {
        self.positions.values().any(|entry| entry.position.is_some())
    }
}

pub fn read_layout_record(path: &Path) -> anyhow::Result<LayoutRecord> {
    let file = File::open(path)?;
    let record = serde_json::from_reader(BufReader::new(file))?;
    Ok(record)
}

pub fn write_layout_record(path: &Path, record: &LayoutRecord) -> anyhow::Result<()> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, record)?;
    Ok(())
}
