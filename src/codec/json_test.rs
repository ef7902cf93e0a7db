use super::*;
use crate::error::ErrorCode;

const SAMPLE: &str = r#"{
  "id": "root",
  "layoutOptions": { "elk.direction": "DOWN", "spacing": 20, "ratio": 1.5, "flag": true },
  "children": [
    { "id": "n1", "width": 30, "height": 30,
      "labels": [ { "text": "first" } ],
      "ports": [ { "id": "p1", "width": 5, "height": 5 } ] },
    { "id": "n2", "children": [ { "id": "inner" } ] }
  ],
  "edges": [
    { "id": "e1", "sources": [ "p1" ], "targets": [ "inner" ],
      "sections": [ { "id": "s1", "startPoint": { "x": 35, "y": 15 }, "endPoint": { "x": 80, "y": 15 },
                      "bendPoints": [ { "x": 50, "y": 15 } ] } ],
      "junctionPoints": [ { "x": 50, "y": 15 } ] }
  ]
}"#;

fn import_message(err: &CodecError) -> String {
    err.cause_messages().last().cloned().unwrap_or_default()
}

#[test]
fn decodes_tree_options_and_references() {
    let root = decode(SAMPLE).unwrap();
    assert_eq!(root.identifier.as_deref(), Some("root"));
    assert_eq!(root.properties["elk.direction"], PropertyValue::Text("DOWN".into()));
    assert_eq!(root.properties["spacing"], PropertyValue::Int(20));
    assert_eq!(root.properties["ratio"], PropertyValue::Float(1.5));
    assert_eq!(root.properties["flag"], PropertyValue::Bool(true));

    assert_eq!(root.children[0].labels[0].text, "first");
    let edge = &root.edges[0];
    assert_eq!(edge.sources, vec![ShapeRef::port(vec![0], 0)]);
    assert_eq!(edge.targets, vec![ShapeRef::node(vec![1, 0])]);
    assert_eq!(edge.sections[0].end, Point::new(80.0, 15.0));
}

#[test]
fn top_level_junction_points_use_canonical_key() {
    let root = decode(SAMPLE).unwrap();
    assert_eq!(
        root.edges[0].properties[properties::JUNCTION_POINTS],
        PropertyValue::Points(vec![Point::new(50.0, 15.0)])
    );

    let value: Value = serde_json::from_str(&encode(&root).unwrap()).unwrap();
    let edge = &value["edges"][0];
    assert_eq!(edge["junctionPoints"], json!([{ "x": 50.0, "y": 15.0 }]));
    assert!(edge.get("layoutOptions").is_none(), "{edge}");
    assert_eq!(decode(&value.to_string()).unwrap(), root);
}

#[test]
fn junction_points_under_short_key_are_written_as_edge_field() {
    let mut root = GraphNode::default();
    root.children.push(GraphNode::named("a"));
    let mut edge = GraphEdge::new(vec![ShapeRef::node(vec![0])], vec![ShapeRef::node(vec![0])]);
    edge.properties
        .insert("junctionPoints".into(), PropertyValue::Points(vec![Point::new(1.0, 2.0)]));
    edge.properties.insert("elk.edgeLabels.inline".into(), PropertyValue::Bool(true));
    root.edges.push(edge);

    let value: Value = serde_json::from_str(&encode(&root).unwrap()).unwrap();
    let edge = &value["edges"][0];
    assert_eq!(edge["junctionPoints"], json!([{ "x": 1.0, "y": 2.0 }]));
    assert_eq!(edge["layoutOptions"], json!({ "elk.edgeLabels.inline": true }));
}

#[test]
fn primitive_edge_form_is_accepted() {
    let text = r#"{ "children": [ { "id": "a", "ports": [ { "id": "a1" } ] }, { "id": "b" } ],
                    "edges": [ { "id": "e", "source": "a", "sourcePort": "a1", "target": "b" } ] }"#;
    let root = decode(text).unwrap();
    assert_eq!(root.identifier, None);
    assert_eq!(root.edges[0].sources, vec![ShapeRef::port(vec![0], 0)]);
    assert_eq!(root.edges[0].targets, vec![ShapeRef::node(vec![1])]);
}

#[test]
fn missing_id_is_rejected() {
    let err = decode(r#"{ "children": [ { "width": 10 } ] }"#).unwrap_err();
    assert_eq!(import_message(&err), "JsonImportError: An element is missing an id.");
}

#[test]
fn duplicate_id_is_rejected() {
    let err = decode(r#"{ "children": [ { "id": "a" }, { "id": "a" } ] }"#).unwrap_err();
    assert_eq!(import_message(&err), "JsonImportError: Duplicate id: a.");

    let err = decode(r#"{ "children": [ { "id": "a" } ], "edges": [ { "id": "a", "sources": ["a"], "targets": ["a"] } ] }"#)
        .unwrap_err();
    assert_eq!(import_message(&err), "JsonImportError: Duplicate id: a.");
}

#[test]
fn unresolved_reference_is_rejected() {
    let err = decode(r#"{ "children": [ { "id": "a" } ], "edges": [ { "id": "e", "sources": ["a"], "targets": ["zz"] } ] }"#)
        .unwrap_err();
    assert_eq!(import_message(&err), "JsonImportError: Couldn't resolve reference 'zz'.");
}

#[test]
fn syntax_error_chain_is_innermost_first() {
    let err = decode("{ \"id\": ").unwrap_err();
    let causes = err.cause_messages();
    assert_eq!(causes.len(), 2);
    assert!(causes[0].starts_with("EofError: "));
    assert_eq!(causes[1], "JsonImportError: Input is not valid JSON.");
    assert_eq!(err.diagnostics().len(), 1);
}

#[test]
fn wrong_shape_is_data_error() {
    let err = decode(r#"{ "children": 3 }"#).unwrap_err();
    assert_eq!(import_message(&err), "JsonImportError: Expected 'children' to be an array.");
    assert!(decode("[1, 2]").is_err());
}

#[test]
fn encode_then_decode_preserves_graph() {
    let original = decode(SAMPLE).unwrap();
    let text = encode(&original).unwrap();
    assert_eq!(decode(&text).unwrap(), original);
}

#[test]
fn encode_derives_ids_for_anonymous_elements() {
    let mut root = GraphNode::default();
    let mut a = GraphNode::default();
    a.ports.push(GraphPort::default());
    root.children.push(a);
    root.children.push(GraphNode::named("b"));
    root.edges
        .push(GraphEdge::new(vec![ShapeRef::port(vec![0], 0)], vec![ShapeRef::node(vec![1])]));

    let value: Value = serde_json::from_str(&encode(&root).unwrap()).unwrap();
    assert_eq!(value["id"], "graph");
    assert_eq!(value["children"][0]["id"], "graph.children#0");
    assert_eq!(value["children"][0]["ports"][0]["id"], "graph.children#0.ports#0");
    assert_eq!(value["edges"][0]["id"], "graph.containedEdges#0");
    assert_eq!(value["edges"][0]["sources"][0], "graph.children#0.ports#0");
    assert_eq!(value["edges"][0]["targets"][0], "b");

    let back = decode(&value.to_string()).unwrap();
    assert_eq!(back.edges[0].sources, root.edges[0].sources);
}

#[test]
fn encode_rejects_non_finite_numbers() {
    let mut root = GraphNode::default();
    root.properties.insert("x".into(), PropertyValue::Float(f64::NAN));
    let err = encode(&root).unwrap_err();
    assert_eq!(err.error_code(), "E_CODEC_INTERNAL");
}
