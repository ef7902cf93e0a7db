use super::*;
use crate::graph::{EdgeSection, GraphPort};

fn junctions(points: &[(f64, f64)]) -> PropertyValue {
    PropertyValue::Points(points.iter().map(|&(x, y)| Point::new(x, y)).collect())
}

fn sample() -> GraphNode {
    let mut root = GraphNode::named("root");

    let mut a = GraphNode::named("a");
    a.bounds = Bounds::new(10.0, 20.0, 30.0, 40.0);
    let mut port = GraphPort { bounds: Bounds::new(1.0, 2.0, 0.0, 0.0), ..GraphPort::default() };
    port.labels.push(GraphLabel::new("in"));
    a.ports.push(port);
    root.children.push(a);

    let mut b = GraphNode::named("b");
    b.bounds.x = 50.0;
    root.children.push(b);

    let mut e = GraphEdge::new(vec![ShapeRef::node(vec![0])], vec![ShapeRef::node(vec![1])]);
    e.identifier = Some("e".into());
    e.sections.push(EdgeSection {
        start: Point::new(1.0, 1.0),
        bend_points: vec![Point::new(2.0, 2.0)],
        end: Point::new(3.0, 3.0),
        ..EdgeSection::default()
    });
    e.sections.push(EdgeSection { start: Point::new(4.0, 4.0), end: Point::new(5.0, 5.0), ..EdgeSection::default() });
    e.properties
        .insert(properties::JUNCTION_POINTS.into(), junctions(&[(7.0, 8.0), (9.0, 10.0)]));
    e.labels.push(GraphLabel::new("weight"));
    root.edges.push(e);

    let mut h = GraphEdge::new(
        vec![ShapeRef::node(vec![0]), ShapeRef::node(vec![1])],
        vec![ShapeRef::port(vec![0], 0)],
    );
    h.identifier = Some("h".into());
    h.properties.insert("junctionPoints".into(), junctions(&[(6.0, 6.0)]));
    root.edges.push(h);
    root
}

fn ids(elements: &[DiagramElement]) -> Vec<&str> {
    elements.iter().map(|e| e.id.as_str()).collect()
}

#[test]
fn containers_list_ports_nodes_then_edges() {
    let diagram = project(&sample(), "root").unwrap();
    assert_eq!(diagram.kind, ElementKind::Graph);
    assert_eq!(diagram.position, None);
    assert_eq!(
        ids(diagram.children()),
        ["root.a", "root.b", "root.e", "root.h_root.a_root.a.ports#0", "root.h_root.b_root.a.ports#0"]
    );
}

#[test]
fn size_is_only_set_when_non_zero() {
    let diagram = project(&sample(), "root").unwrap();
    let a = diagram.find("root.a").unwrap();
    assert_eq!(a.position, Some(Point::new(10.0, 20.0)));
    assert_eq!(a.size, Some(Dimension { width: 30.0, height: 40.0 }));

    let b = diagram.find("root.b").unwrap();
    assert_eq!(b.position, Some(Point::new(50.0, 0.0)));
    assert_eq!(b.size, None);
}

#[test]
fn ports_and_labels_get_derived_ids() {
    let diagram = project(&sample(), "root").unwrap();
    let port = diagram.find("root.a.ports#0").unwrap();
    assert_eq!(port.kind, ElementKind::Port);
    assert_eq!(port.position, Some(Point::new(1.0, 2.0)));
    assert_eq!(port.size, None);

    let label = &port.children()[0];
    assert_eq!(label.kind, ElementKind::Label);
    assert_eq!(label.id, "root.a.ports#0.labels#0");
    assert_eq!(label.text.as_deref(), Some("in"));
}

#[test]
fn routing_points_follow_sections_in_order() {
    let diagram = project(&sample(), "root").unwrap();
    let edge = diagram.find("root.e").unwrap();
    assert_eq!(edge.source_id.as_deref(), Some("root.a"));
    assert_eq!(edge.target_id.as_deref(), Some("root.b"));
    let expected: Vec<Point> = (1..=5).map(|i| Point::new(f64::from(i), f64::from(i))).collect();
    assert_eq!(edge.routing_points.as_deref(), Some(expected.as_slice()));
}

#[test]
fn junction_points_become_junction_elements() {
    let diagram = project(&sample(), "root").unwrap();
    let edge = diagram.find("root.e").unwrap();
    assert_eq!(ids(edge.children()), ["root.e_j0", "root.e_j1", "root.e.labels#0"]);
    assert_eq!(edge.children()[0].kind, ElementKind::Junction);
    assert_eq!(edge.children()[0].position, Some(Point::new(7.0, 8.0)));
    assert_eq!(edge.children()[1].position, Some(Point::new(9.0, 10.0)));
}

#[test]
fn fanned_out_edges_keep_the_edge_junction_ids() {
    let diagram = project(&sample(), "root").unwrap();
    for id in ["root.h_root.a_root.a.ports#0", "root.h_root.b_root.a.ports#0"] {
        let edge = diagram.find(id).unwrap();
        assert_eq!(edge.target_id.as_deref(), Some("root.a.ports#0"));
        assert_eq!(ids(edge.children()), ["root.h_j0"]);
        assert_eq!(edge.children()[0].position, Some(Point::new(6.0, 6.0)));
    }
}

#[test]
fn unresolved_endpoint_is_an_error() {
    let mut graph = GraphNode::named("root");
    graph.edges.push(GraphEdge::new(vec![ShapeRef::node(vec![3])], vec![ShapeRef::default()]));
    let err = project(&graph, "root").unwrap_err();
    assert_eq!(err.edge, "root.containedEdges#0");
}
