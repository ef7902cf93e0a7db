use super::*;

const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<elkgraph:ElkNode xmlns:xmi="http://www.omg.org/XMI" xmlns:elkgraph="http://www.eclipse.org/elk/ElkGraph" identifier="root">
  <properties key="org.eclipse.elk.algorithm" value="layered"/>
  <children identifier="n1" width="30" height="30">
    <labels text="first &amp; only"/>
    <ports identifier="p1" width="5" height="5"/>
  </children>
  <children identifier="n2"/>
  <containedEdges identifier="e1" sources="//@children.0/@ports.0" targets="//@children.1">
    <properties key="org.eclipse.elk.junctionPoints" type="points" value="(15.0,2.0)"/>
    <sections startX="35" startY="15" endX="60" endY="15">
      <bendPoints x="45" y="15"/>
    </sections>
  </containedEdges>
</elkgraph:ElkNode>
"#;

#[test]
fn decodes_tree_and_references() {
    let root = decode(SAMPLE).unwrap();
    assert_eq!(root.identifier.as_deref(), Some("root"));
    assert_eq!(root.children.len(), 2);
    assert_eq!(root.children[0].bounds, Bounds::new(0.0, 0.0, 30.0, 30.0));
    assert_eq!(root.children[0].labels[0].text, "first & only");
    assert_eq!(root.children[0].ports[0].identifier.as_deref(), Some("p1"));

    let edge = &root.edges[0];
    assert_eq!(edge.sources, vec![ShapeRef::port(vec![0], 0)]);
    assert_eq!(edge.targets, vec![ShapeRef::node(vec![1])]);
    assert_eq!(edge.sections[0].bend_points, vec![Point::new(45.0, 15.0)]);
}

#[test]
fn typed_and_untyped_options() {
    let root = decode(SAMPLE).unwrap();
    assert_eq!(
        root.properties["org.eclipse.elk.algorithm"],
        PropertyValue::Text("layered".into())
    );
    assert_eq!(
        root.edges[0].properties["org.eclipse.elk.junctionPoints"],
        PropertyValue::Points(vec![Point::new(15.0, 2.0)])
    );
    assert_eq!(infer_value("12"), PropertyValue::Int(12));
    assert_eq!(infer_value("1.5"), PropertyValue::Float(1.5));
    assert_eq!(infer_value("false"), PropertyValue::Bool(false));
}

#[test]
fn encode_then_decode_preserves_graph() {
    let original = decode(SAMPLE).unwrap();
    let xml = encode(&original).unwrap();
    assert_eq!(decode(&xml).unwrap(), original);
}

#[test]
fn encode_writes_typed_options_and_path_references() {
    let xml = encode(&decode(SAMPLE).unwrap()).unwrap();
    assert!(xml.contains(r#"sources="//@children.0/@ports.0""#));
    assert!(xml.contains(r#"key="org.eclipse.elk.algorithm" type="string" value="layered""#));
    assert!(xml.contains("first &amp; only"));
}

#[test]
fn root_reference_round_trips() {
    assert_eq!(parse_reference("/"), Some(ShapeRef::node(Vec::new())));
    assert_eq!(reference(&ShapeRef::node(Vec::new())), "/");
    assert_eq!(parse_reference("//@children.2/@children.0"), Some(ShapeRef::node(vec![2, 0])));
    assert_eq!(parse_reference("//@ports.0/@children.1"), None);
    assert_eq!(parse_reference("children.0"), None);
}

#[test]
fn xml_syntax_error_has_position() {
    let err = decode("<elkgraph:ElkNode").unwrap_err();
    let d = &err.diagnostics()[0];
    assert!(d.line >= 1);
    assert!(d.end_line.is_none());
}

#[test]
fn dangling_reference_is_malformed() {
    let xml = r#"<ElkNode><children/><containedEdges sources="//@children.0" targets="//@children.4"/></ElkNode>"#;
    let err = decode(xml).unwrap_err();
    assert!(err.diagnostics()[0].message.contains("//@children.4"));
}

#[test]
fn unknown_elements_and_bad_numbers_are_collected() {
    let xml = r#"<ElkNode><widgets/><children x="left"/></ElkNode>"#;
    let err = decode(xml).unwrap_err();
    assert_eq!(err.diagnostics().len(), 2);
}

#[test]
fn wrong_root_element_is_rejected() {
    let err = decode("<graph/>").unwrap_err();
    assert!(err.diagnostics()[0].message.contains("ElkNode"));
}

#[test]
fn invalid_typed_value_is_reported() {
    let xml = r#"<ElkNode><properties key="k" type="int" value="many"/></ElkNode>"#;
    assert!(decode(xml).is_err());
}

fn nested_children(depth: usize) -> String {
    format!(
        r#"<elkgraph:ElkNode xmlns:elkgraph="http://www.eclipse.org/elk/ElkGraph">{}{}</elkgraph:ElkNode>"#,
        r#"<children identifier="n">"#.repeat(depth),
        "</children>".repeat(depth)
    )
}

#[test]
fn deep_nesting_is_rejected_before_parsing() {
    let err = decode(&nested_children(5000)).unwrap_err();
    let diagnostics = err.diagnostics();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].message, format!("Elements are nested deeper than {MAX_ELEMENT_DEPTH} levels."));
    assert_eq!(diagnostics[0].line, 1);
}

#[test]
fn node_nesting_is_limited_by_the_reader() {
    let root = decode(&nested_children(MAX_NESTING)).unwrap();
    assert_eq!(root.descendant_count(), MAX_NESTING);

    let err = decode(&nested_children(MAX_NESTING + 2)).unwrap_err();
    let diagnostics = err.diagnostics();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].message, format!("Elements are nested deeper than {MAX_NESTING} levels."));
}

#[test]
fn nesting_scan_ignores_comments_and_self_closing_tags() {
    let text = format!("<!-- {} --><a>{}<b x=\"/>\"/></a>", "<c>".repeat(500), "<d/>".repeat(500));
    assert_eq!(too_deep(&text, 2), None);
    assert_eq!(too_deep("<a><b><c>", 2), Some(6));
}
