use super::*;
use super::engine::EngineError;
use async_trait::async_trait;

use crate::graph::{GraphEdge, GraphLabel, ShapeRef};

fn sample() -> GraphNode {
    let mut root = GraphNode::named("root");
    let mut a = GraphNode::named("a");
    a.labels.push(GraphLabel::new("alpha"));
    root.children.push(a);
    let mut b = GraphNode::named("b");
    b.bounds.width = 50.0;
    b.bounds.height = 40.0;
    root.children.push(b);
    root.edges
        .push(GraphEdge::new(vec![ShapeRef::node(vec![0])], vec![ShapeRef::node(vec![1])]));
    root
}

fn harness() -> LayoutHarness {
    LayoutHarness::new(Arc::new(VersionRegistry::empty()))
}

/// Polls its token until cancelled; never finishes by itself.
struct Stalling;

impl LayoutEngine for Stalling {
    fn layout(&self, _graph: &mut GraphNode, cancel: &CancelToken) -> Result<(), EngineError> {
        loop {
            cancel.check()?;
            std::thread::sleep(Duration::from_millis(5));
        }
    }
}

struct Panicking;

impl LayoutEngine for Panicking {
    fn layout(&self, _graph: &mut GraphNode, _cancel: &CancelToken) -> Result<(), EngineError> {
        panic!("engine bug");
    }
}

struct Refusing;

#[async_trait]
impl VersionModule for Refusing {
    async fn layout(&self, _graph: &GraphNode) -> Option<GraphNode> {
        None
    }
}

struct Identity;

#[async_trait]
impl VersionModule for Identity {
    async fn layout(&self, graph: &GraphNode) -> Option<GraphNode> {
        Some(graph.clone())
    }
}

struct Hanging;

#[async_trait]
impl VersionModule for Hanging {
    async fn layout(&self, _graph: &GraphNode) -> Option<GraphNode> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        None
    }
}

fn with_module(label: &str, module: Arc<dyn VersionModule>) -> LayoutHarness {
    LayoutHarness::new(Arc::new(VersionRegistry::from_modules([(label.to_owned(), module)])))
}

#[tokio::test]
async fn original_graph_is_not_mutated() {
    let graph = sample();
    let before = graph.clone();
    let diagram = harness().generate(&graph, CURRENT_ENGINE).await.unwrap();
    assert_eq!(graph, before);
    assert!(diagram.find("root.a").is_some());
}

#[tokio::test]
async fn defaults_apply_only_to_unsized_elements() {
    let diagram = harness().generate(&sample(), CURRENT_ENGINE).await.unwrap();

    let a = diagram.find("root.a").unwrap();
    let size = a.size.unwrap();
    assert_eq!((size.width, size.height), (30.0, 30.0));

    let b = diagram.find("root.b").unwrap();
    let size = b.size.unwrap();
    assert_eq!((size.width, size.height), (50.0, 40.0));

    let label = diagram.find("root.a.labels#0").unwrap();
    assert_eq!(label.size.unwrap().width, 5.0 * 9.0);
    assert_eq!(label.size.unwrap().height, 16.0);
}

#[tokio::test]
async fn hyperedge_fans_out_into_every_pair() {
    let mut root = GraphNode::named("root");
    for id in ["s1", "s2", "t1", "t2", "t3"] {
        root.children.push(GraphNode::named(id));
    }
    let mut edge = GraphEdge::new(
        vec![ShapeRef::node(vec![0]), ShapeRef::node(vec![1])],
        vec![ShapeRef::node(vec![2]), ShapeRef::node(vec![3]), ShapeRef::node(vec![4])],
    );
    edge.identifier = Some("h".into());
    root.edges.push(edge);

    let diagram = harness().generate(&root, CURRENT_ENGINE).await.unwrap();
    let edges: Vec<&DiagramElement> =
        diagram.children().iter().filter(|e| e.kind == ElementKind::Edge).collect();
    assert_eq!(edges.len(), 6);

    let mut ids: Vec<&str> = edges.iter().map(|e| e.id.as_str()).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 6);
    assert!(ids.contains(&"root.h_root.s1_root.t1"));
}

#[tokio::test]
async fn unknown_version_is_a_configuration_error() {
    let err = harness().generate(&sample(), "nonexistent-version").await.unwrap_err();
    assert!(matches!(err, LayoutError::UnsupportedConfiguration(_)));
    assert_eq!(err.to_string(), "Unknown layouter version: nonexistent-version.");
    assert_eq!(err.error_code(), "E_UNSUPPORTED_CONFIGURATION");
}

#[tokio::test]
async fn timeout_carries_the_prepared_graph() {
    let harness = harness()
        .with_engine(Arc::new(Stalling))
        .with_timeout(Duration::from_millis(200));
    let graph = sample();

    let err = harness.layout(&graph, CURRENT_ENGINE).await.unwrap_err();
    let LayoutError::Timeout { snapshot, .. } = &err else {
        panic!("expected timeout, got {err:?}");
    };
    assert_eq!(snapshot.tag, TIMEOUT_TAG);

    let mut prepared = graph.clone();
    defaults::apply_defaults(&mut prepared);
    assert_eq!(snapshot.restore().unwrap(), prepared);

    assert!(err.to_string().starts_with("Layout timed out after 200 milliseconds.\nGraph input: {"));
    assert!(err.retryable());
}

#[test]
fn timeout_message_names_seconds() {
    let snapshot = LoggedGraph::capture(&GraphNode::default(), TIMEOUT_TAG).unwrap();
    let err = LayoutError::Timeout { timeout: LAYOUT_TIMEOUT, snapshot };
    assert!(err.to_string().starts_with("Layout timed out after 5 seconds.\nGraph input: "));
}

#[tokio::test]
async fn timeout_becomes_an_error_diagram() {
    let harness = harness()
        .with_engine(Arc::new(Stalling))
        .with_timeout(Duration::from_millis(100));
    let diagram = harness.generate(&sample(), CURRENT_ENGINE).await.unwrap();
    let label = diagram.find(ERROR_LABEL_ID).unwrap();
    assert!(label.text.as_deref().unwrap().starts_with("E_LAYOUT_TIMEOUT: Layout timed out"));
}

#[tokio::test]
async fn engine_panic_is_a_layout_failure() {
    let harness = harness().with_engine(Arc::new(Panicking));
    let err = harness.layout(&sample(), CURRENT_ENGINE).await.unwrap_err();
    assert_eq!(err.error_code(), "E_LAYOUT_FAILED");
}

#[tokio::test]
async fn engine_rejection_is_a_layout_failure() {
    let mut graph = sample();
    graph.properties.insert(
        "org.eclipse.elk.direction".into(),
        crate::graph::properties::PropertyValue::Text("LEFT".into()),
    );
    let err = harness().layout(&graph, CURRENT_ENGINE).await.unwrap_err();
    assert!(matches!(err, LayoutError::Failed(_)));
}

#[tokio::test]
async fn absent_module_result_becomes_an_error_diagram() {
    let harness = with_module("0.9.0", Arc::new(Refusing));
    let diagram = harness.generate(&sample(), "0.9.0").await.unwrap();

    assert_eq!(diagram.id, "root");
    assert_eq!(diagram.children().len(), 1);
    let label = &diagram.children()[0];
    assert_eq!(label.text.as_deref(), Some("E_LAYOUT_FAILED: Layout failed for version 0.9.0."));
}

#[tokio::test]
async fn module_result_is_projected() {
    let harness = with_module("0.9.0", Arc::new(Identity));
    let diagram = harness.generate(&sample(), "0.9.0").await.unwrap();
    let a = diagram.find("root.a").unwrap();
    assert_eq!(a.size.unwrap().width, 30.0);
}

#[tokio::test]
async fn hanging_module_times_out() {
    let harness = with_module("slow", Arc::new(Hanging)).with_timeout(Duration::from_millis(50));
    let err = harness.layout(&sample(), "slow").await.unwrap_err();
    assert_eq!(err.error_code(), "E_LAYOUT_TIMEOUT");
}

#[test]
fn error_diagram_shape() {
    let diagram = error_diagram("graph", &LayoutError::Failed("boom".into()));
    assert_eq!(diagram.kind, ElementKind::Graph);
    assert_eq!(diagram.id, "graph");

    let label = &diagram.children()[0];
    assert_eq!(label.kind, ElementKind::Label);
    assert_eq!(label.id, ERROR_LABEL_ID);
    assert_eq!(label.position, Some(Point::new(20.0, 20.0)));
    assert_eq!(label.text.as_deref(), Some("E_LAYOUT_FAILED: boom"));
}

#[test]
fn selectors_list_current_first() {
    let harness = with_module("0.9.0", Arc::new(Identity));
    assert_eq!(harness.selectors(), vec!["current".to_owned(), "0.9.0".to_owned()]);
}

#[test]
fn check_selector_accepts_current_and_registered_versions() {
    let harness = with_module("0.9.0", Arc::new(Identity));
    assert!(harness.check_selector(CURRENT_ENGINE).is_ok());
    assert!(harness.check_selector("0.9.0").is_ok());
    let err = harness.check_selector("0.8.0").unwrap_err();
    assert_eq!(err.error_code(), "E_UNSUPPORTED_CONFIGURATION");
}
