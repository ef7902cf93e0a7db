use super::*;

#[test]
fn children_list_is_created_lazily() {
    let mut graph = DiagramElement::new(ElementKind::Graph, "graph");
    assert!(graph.children.is_none());
    assert!(graph.children().is_empty());
    graph.add_child(DiagramElement::new(ElementKind::Node, "graph.a"));
    assert_eq!(graph.children().len(), 1);
}

#[test]
fn serializes_camel_case_and_skips_absent_fields() {
    let mut edge = DiagramElement::edge("graph.e", "graph.a".into(), "graph.b".into());
    edge.routing_points = Some(vec![Point::new(1.0, 2.0)]);
    let value = serde_json::to_value(&edge).unwrap();
    assert_eq!(
        value,
        serde_json::json!({
            "type": "edge",
            "id": "graph.e",
            "sourceId": "graph.a",
            "targetId": "graph.b",
            "routingPoints": [ { "x": 1.0, "y": 2.0 } ]
        })
    );
}

#[test]
fn empty_children_list_is_kept_distinct_from_absent() {
    let mut node = DiagramElement::new(ElementKind::Node, "n");
    node.children = Some(Vec::new());
    let value = serde_json::to_value(&node).unwrap();
    assert_eq!(value["children"], serde_json::json!([]));
}

#[test]
fn find_walks_the_tree() {
    let mut graph = DiagramElement::new(ElementKind::Graph, "graph");
    let mut node = DiagramElement::new(ElementKind::Node, "graph.a");
    node.add_child(DiagramElement::label("graph.a.labels#0", "hello"));
    graph.add_child(node);
    assert_eq!(graph.find("graph.a.labels#0").and_then(|e| e.text.as_deref()), Some("hello"));
    assert!(graph.find("missing").is_none());
}
