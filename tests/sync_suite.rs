use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use aml_sync::client::{Backend, BackendError};
use aml_sync::config::Config;
use aml_sync::ir::{Point, RelationKind, Size};
use aml_sync::layout::{
    DagreEngine, LayoutEngine, LayoutError, LayoutRequest, NodePlacement, Placements,
    apply_auto_layout, select_handles,
};
use aml_sync::layout_record::{ElementLayout, LayoutRecord};
use aml_sync::parser::{ParseError, ParsedAml};
use aml_sync::source::ClassRecord;
use aml_sync::sync::{Edit, Notice, SyncController, SyncError, SyncStatus, load_session, spawn_session};
use aml_sync::{generate_aml, parse};

fn fixture_paths() -> Vec<std::path::PathBuf> {
    let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures");
    let mut paths: Vec<_> = std::fs::read_dir(&root)
        .expect("fixture dir missing")
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "aml"))
        .collect();
    paths.sort();
    assert!(!paths.is_empty(), "no .aml fixtures found");
    paths
}

#[test]
fn fixtures_round_trip() {
    for path in fixture_paths() {
        let name = path.display().to_string();
        let input = std::fs::read_to_string(&path).expect("fixture read failed");
        let first = parse(&input).unwrap_or_else(|e| panic!("{name}: {e}"));
        let text = generate_aml(&first);
        let second = parse(&text).unwrap_or_else(|e| panic!("{name}: {e}"));
        assert_eq!(first.structure(), second.structure(), "{name}: structure drifted");
        assert_eq!(generate_aml(&second), text, "{name}: generator not idempotent");
    }
}

#[test]
fn fleet_fixture_resolution() {
    let input = std::fs::read_to_string(
        Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/fleet.aml"),
    )
    .unwrap();
    let model = parse(&input).unwrap();
    assert_eq!(model.packages.len(), 3);
    assert!(model.package("pkg-fleet.empty").is_some());
    assert_eq!(
        model.node("FleetManager").unwrap().fields[0].type_name,
        "Map<String, Starship>"
    );
    // SpaceStation -> Ghost is dropped; the inheritance alias duplicates an extends edge
    assert!(model.edges.iter().all(|e| e.target != "Ghost"));
    let extends: Vec<&str> = model
        .edges
        .iter()
        .filter(|e| e.kind == RelationKind::Extends)
        .map(|e| e.id.as_str())
        .collect();
    assert_eq!(extends, vec!["e-Starship-extends-Vessel-0", "e-Starship-extends-Vessel-1"]);
    assert_eq!(model.structure().edges.len(), 3);
}

#[test]
fn shop_scenario_resolves_once_customer_exists() {
    let model = parse("namespace shop { class Order { total: Number } }\nOrder -> Customer\n").unwrap();
    assert_eq!(model.packages.len(), 1);
    assert_eq!(model.packages[0].id, "pkg-shop");
    assert_eq!(model.nodes.len(), 1);
    let order = model.node("Order").unwrap();
    assert_eq!(order.fields[0].name, "total");
    assert_eq!(order.fields[0].type_name, "Number");
    assert!(model.edges.is_empty());

    let model = parse(
        "namespace shop { class Order { total: Number } }\nclass Customer {}\nOrder -> Customer\n",
    )
    .unwrap();
    assert_eq!(model.edges.len(), 1);
    assert_eq!(model.edges[0].kind, RelationKind::Association);
    assert_eq!(model.edges[0].source, "Order");
    assert_eq!(model.edges[0].target, "Customer");
}

#[test]
fn text_edit_after_layout_keeps_positions() {
    let mut model = parse(
        "namespace shop {\n    class Order {\n    }\n}\nclass Customer {\n}\nOrder -> Customer\n",
    )
    .unwrap();
    apply_auto_layout(&mut model, &GridEngine, &Config::default().layout).unwrap();
    let laid_out = model.node("Customer").unwrap().position;

    let mut ctl = SyncController::new(model, &Config::default());
    ctl.apply_text(
        "namespace shop {\n    class Order {\n        total: Number\n    }\n}\nclass Customer {\n}\nOrder -> Customer\n",
    )
    .unwrap();
    assert_eq!(ctl.status(), SyncStatus::Synced);
    assert_eq!(ctl.model().node("Customer").unwrap().position, laid_out);
    assert_eq!(ctl.model().node("Order").unwrap().fields.len(), 1);
    assert_eq!(ctl.model().edges[0].source_handle.as_deref(), Some("r2"));
}

fn dagre_layout(source: &str) -> aml_sync::ir::Model {
    let config = Config::default().layout;
    let mut model = parse(source).unwrap();
    apply_auto_layout(&mut model, &DagreEngine::new(config.clone()), &config)
        .unwrap_or_else(|e| panic!("layout failed: {e}"));
    model
}

fn absolute_center(model: &aml_sync::ir::Model, id: &str) -> Point {
    let node = model.node(id).unwrap();
    let origin = node
        .package_id()
        .and_then(|pkg_id| model.package(&pkg_id).map(|pkg| pkg.position))
        .unwrap_or_default();
    let config = Config::default().layout;
    origin + node.position + Size::new(config.node_width, config.node_height).half()
}

#[test]
fn dagre_lays_out_packaged_models() {
    let sources = [
        "namespace a { class A {} }\n",
        "namespace a { class A {} class B {} }\nA -> B\n",
        "namespace a { class A {} }\nclass B {}\nA -> B\n",
        "namespace a { class A {} }\nnamespace b { class B {} }\nB --|> A\n",
        "namespace shop { class Order { total: Number } }\nclass Customer {}\nOrder -> Customer\n",
    ];
    let config = Config::default().layout;
    for source in sources {
        let model = dagre_layout(source);
        for node in &model.nodes {
            let Some(pkg_id) = node.package_id() else {
                continue;
            };
            let pkg = model.package(&pkg_id).unwrap();
            let local = node.position;
            assert!(local.x >= 0.0 && local.y >= 0.0, "{source}: {} outside {pkg_id}", node.id);
            assert!(
                local.x + config.node_width <= pkg.size.width + 0.01
                    && local.y + config.node_height <= pkg.size.height + 0.01,
                "{source}: {} overflows {pkg_id} {:?}",
                node.id,
                pkg.size
            );
        }
        for edge in &model.edges {
            let pair = select_handles(
                absolute_center(&model, &edge.source),
                absolute_center(&model, &edge.target),
            );
            assert_eq!(edge.source_handle.as_deref(), Some(pair.source_handle()), "{source}");
            assert_eq!(edge.target_handle.as_deref(), Some(pair.target_handle()), "{source}");
        }
    }
}

#[test]
fn dagre_package_size_is_member_bounds_plus_margins() {
    let model = dagre_layout("namespace a { class A {} }\n");
    let config = Config::default().layout;
    let pkg = model.package("pkg-a").unwrap();
    assert_eq!(
        pkg.size,
        Size::new(
            config.node_width + 2.0 * config.margin_x,
            config.node_height + 2.0 * config.margin_y
        )
    );
    assert_eq!(model.node("A").unwrap().position, Point::new(config.margin_x, config.margin_y));
}

/// Places nodes left to right on one row; packages enclose nothing in particular.
struct GridEngine;

impl LayoutEngine for GridEngine {
    fn compute_layout(&self, request: &LayoutRequest) -> Result<Placements, LayoutError> {
        Ok(request
            .nodes
            .iter()
            .enumerate()
            .map(|(idx, spec)| {
                let size = if spec.compound {
                    Size::new(600.0, 700.0)
                } else {
                    Size::new(spec.width, spec.height)
                };
                let placement = NodePlacement {
                    center: Point::new(400.0 + idx as f32 * 700.0, 400.0),
                    size,
                };
                (spec.id.clone(), placement)
            })
            .collect())
    }
}

struct MockBackend {
    records: Vec<ClassRecord>,
    layout: Result<LayoutRecord, u16>,
    save_status: Option<u16>,
    saved: Mutex<Vec<LayoutRecord>>,
}

impl MockBackend {
    fn new(records: Vec<ClassRecord>) -> Self {
        Self {
            records,
            layout: Ok(LayoutRecord::default()),
            save_status: None,
            saved: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait::async_trait]
impl Backend for MockBackend {
    async fn fetch_model(&self) -> Result<Vec<ClassRecord>, BackendError> {
        Ok(self.records.clone())
    }

    async fn fetch_layout(&self) -> Result<LayoutRecord, BackendError> {
        self.layout.clone().map_err(|status| BackendError::Status {
            status,
            body: "unavailable".to_string(),
        })
    }

    async fn save_layout(&self, record: &LayoutRecord) -> Result<(), BackendError> {
        if let Some(status) = self.save_status {
            return Err(BackendError::Status {
                status,
                body: "disk full".to_string(),
            });
        }
        self.saved.lock().unwrap().push(record.clone());
        Ok(())
    }
}

fn shop_records() -> Vec<ClassRecord> {
    serde_json::from_str(
        r#"[
            {"name": "Order", "type": "class", "package": "shop", "associations": ["Customer"]},
            {"name": "Customer", "type": "class"}
        ]"#,
    )
    .unwrap()
}

#[tokio::test]
async fn load_runs_auto_layout_without_saved_positions() {
    let backend = MockBackend::new(shop_records());
    let loaded = load_session(&backend, &GridEngine, &Config::default()).await.unwrap();
    assert!(loaded.auto_laid_out);
    let model = loaded.controller.model();
    assert_eq!(model.package("pkg-shop").unwrap().size, Size::new(600.0, 700.0));
    assert!(model.edges[0].source_handle.is_some());
    assert!(loaded.controller.text().contains("Order -> Customer"));
}

#[tokio::test]
async fn load_restores_saved_positions() {
    let mut backend = MockBackend::new(shop_records());
    let mut record = LayoutRecord::default();
    record.positions.insert(
        "Customer".to_string(),
        ElementLayout {
            position: Some(Point::new(1234.0, 56.0)),
            ..ElementLayout::default()
        },
    );
    backend.layout = Ok(record);
    let loaded = load_session(&backend, &GridEngine, &Config::default()).await.unwrap();
    assert!(!loaded.auto_laid_out);
    assert_eq!(
        loaded.controller.model().node("Customer").unwrap().position,
        Point::new(1234.0, 56.0)
    );
}

#[tokio::test]
async fn load_fails_when_layout_fetch_fails() {
    let mut backend = MockBackend::new(shop_records());
    backend.layout = Err(503);
    let err = load_session(&backend, &GridEngine, &Config::default())
        .await
        .err()
        .unwrap();
    assert!(matches!(err, SyncError::Backend(BackendError::Status { status: 503, .. })));
}

async fn loaded_controller(backend: &MockBackend) -> SyncController {
    load_session(backend, &GridEngine, &Config::default())
        .await
        .unwrap()
        .controller
}

#[tokio::test(start_paused = true)]
async fn session_regenerates_after_debounce_and_saves_on_request() {
    let backend = Arc::new(MockBackend::new(shop_records()));
    let controller = loaded_controller(&backend).await;
    let mut handle = spawn_session(controller, backend.clone(), Arc::new(GridEngine));

    handle
        .edit(Edit::Connect {
            source: "Customer".to_string(),
            target: "Order".to_string(),
            kind: RelationKind::Dependency,
        })
        .unwrap();
    handle
        .edit(Edit::MoveNode {
            id: "Order".to_string(),
            position: Point::new(80.0, 90.0),
        })
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!handle.snapshot().await.unwrap().text.contains("Customer ..> Order"));

    tokio::time::sleep(Duration::from_millis(400)).await;
    match handle.notices.recv().await {
        Some(Notice::TextRegenerated(text)) => assert!(text.contains("Customer ..> Order")),
        other => panic!("unexpected notice {other:?}"),
    }
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(backend.saved.lock().unwrap().is_empty(), "nothing is persisted before a save request");

    handle.save().unwrap();
    assert_eq!(handle.notices.recv().await, Some(Notice::Saved));
    let saved = backend.saved.lock().unwrap();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].positions["Order"].position, Some(Point::new(80.0, 90.0)));
    drop(saved);
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn session_defers_regeneration_while_typing() {
    let backend = Arc::new(MockBackend::new(shop_records()));
    let controller = loaded_controller(&backend).await;
    let handle = spawn_session(controller, backend.clone(), Arc::new(GridEngine));
    let before = handle.snapshot().await.unwrap().text;

    handle.set_editor_focus(true).unwrap();
    handle
        .edit(Edit::Disconnect {
            edge: "e-Order-association-Customer-0".to_string(),
        })
        .unwrap();
    tokio::time::sleep(Duration::from_millis(700)).await;
    let snapshot = handle.snapshot().await.unwrap();
    assert!(snapshot.stale);
    assert_eq!(snapshot.text, before);

    handle.set_editor_focus(false).unwrap();
    tokio::time::sleep(Duration::from_millis(700)).await;
    let snapshot = handle.snapshot().await.unwrap();
    assert!(!snapshot.stale);
    assert!(!snapshot.text.contains("Order -> Customer"));
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn save_failure_is_reported_once() {
    let mut backend = MockBackend::new(shop_records());
    backend.save_status = Some(500);
    let backend = Arc::new(backend);
    let controller = loaded_controller(&backend).await;
    let mut handle = spawn_session(controller, backend.clone(), Arc::new(GridEngine));

    handle
        .edit(Edit::MoveNode {
            id: "Customer".to_string(),
            position: Point::new(10.0, 10.0),
        })
        .unwrap();
    handle.save().unwrap();
    match handle.notices.recv().await {
        Some(Notice::SaveFailed(message)) => assert!(message.contains("500")),
        other => panic!("unexpected notice {other:?}"),
    }
    let next = tokio::time::timeout(Duration::from_secs(5), handle.notices.recv()).await;
    assert!(next.is_err(), "save must not be retried");
    handle.shutdown().await;
}

fn reject_everything(_: &str) -> Result<ParsedAml, ParseError> {
    Err(ParseError::DanglingPackage {
        class: "Order".to_string(),
        package: "gone".to_string(),
    })
}

#[tokio::test(start_paused = true)]
async fn parse_failure_is_contained() {
    let backend = Arc::new(MockBackend::new(shop_records()));
    let controller = loaded_controller(&backend).await.with_parser(reject_everything);
    let mut handle = spawn_session(controller, backend, Arc::new(GridEngine));
    let before = handle.snapshot().await.unwrap().model;

    handle.apply_text("class {").unwrap();
    assert!(matches!(handle.notices.recv().await, Some(Notice::ParseFailed(_))));
    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.status, SyncStatus::Error);
    assert_eq!(snapshot.model, before);
    assert_eq!(snapshot.text, "class {");
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn session_survives_auto_layout_of_packages() {
    let backend = Arc::new(MockBackend::new(shop_records()));
    let controller = loaded_controller(&backend).await;
    let engine = Arc::new(DagreEngine::new(Config::default().layout));
    let handle = spawn_session(controller, backend, engine);

    handle.send(aml_sync::sync::Command::AutoLayout).unwrap();
    let snapshot = handle.snapshot().await.unwrap();
    let pkg = snapshot.model.package("pkg-shop").unwrap();
    assert_eq!(pkg.size, Size::new(620.0, 700.0));
    assert_eq!(snapshot.model.node("Order").unwrap().position, Point::new(100.0, 100.0));
    handle.shutdown().await;
}
