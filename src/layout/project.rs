//! Projection of a laid-out graph into the diagram model.
//!
//! Per container the order is ports, child nodes, then edges; labels follow
//! the element they belong to. Hyperedges fan out into one edge element per
//! (source, target) pair, and every fanned-out element carries the routing
//! points of all sections.

use crate::diagram::{Dimension, DiagramElement, ElementKind};
use crate::graph::identity::{Feature, child_id, shape_id};
use crate::graph::properties::{self, PropertyValue, lookup};
use crate::graph::{Bounds, GraphEdge, GraphLabel, GraphNode, Point, ShapeRef};

/// Separator between the parts of a fanned-out edge id.
pub const FAN_OUT_SEPARATOR: &str = "_";
/// Marker between an edge id and a junction ordinal.
pub const JUNCTION_MARKER: &str = "_j";

#[derive(Debug, thiserror::Error)]
#[error("edge '{edge}' has an endpoint that does not resolve")]
pub struct ProjectionError {
    pub edge: String,
}

/// Build the diagram for `graph`. The graph element itself gets `root_id` and
/// no geometry.
///
/// # Errors
///
/// Returns `ProjectionError` when an edge endpoint does not resolve.
pub fn project(graph: &GraphNode, root_id: &str) -> Result<DiagramElement, ProjectionError> {
    let mut element = DiagramElement::new(ElementKind::Graph, root_id);
    content(graph, graph, root_id, &mut element)?;
    Ok(element)
}

fn transfer_bounds(bounds: &Bounds, element: &mut DiagramElement) {
    element.position = Some(Point::new(bounds.x, bounds.y));
    if bounds.has_size() {
        element.size = Some(Dimension { width: bounds.width, height: bounds.height });
    }
}

fn content(root: &GraphNode, parent: &GraphNode, parent_id: &str, container: &mut DiagramElement) -> Result<(), ProjectionError> {
    for (index, port) in parent.ports.iter().enumerate() {
        let id = child_id(parent_id, port.identifier.as_deref(), Feature::Ports, index);
        let mut element = DiagramElement::new(ElementKind::Port, id.clone());
        transfer_bounds(&port.bounds, &mut element);
        labels(&port.labels, &id, &mut element);
        container.add_child(element);
    }

    for (index, node) in parent.children.iter().enumerate() {
        let id = child_id(parent_id, node.identifier.as_deref(), Feature::Children, index);
        let mut element = DiagramElement::new(ElementKind::Node, id.clone());
        transfer_bounds(&node.bounds, &mut element);
        labels(&node.labels, &id, &mut element);
        content(root, node, &id, &mut element)?;
        container.add_child(element);
    }

    for (index, edge) in parent.edges.iter().enumerate() {
        let id = child_id(parent_id, edge.identifier.as_deref(), Feature::ContainedEdges, index);
        let endpoint = |shape: &ShapeRef| {
            shape_id(root, shape).ok_or_else(|| ProjectionError { edge: id.clone() })
        };
        if edge.is_simple() {
            let mut element = DiagramElement::edge(id.clone(), endpoint(&edge.sources[0])?, endpoint(&edge.targets[0])?);
            edge_layout(edge, &id, &mut element);
            labels(&edge.labels, &id, &mut element);
            container.add_child(element);
            continue;
        }
        for source in &edge.sources {
            for target in &edge.targets {
                let (source_id, target_id) = (endpoint(source)?, endpoint(target)?);
                let fanned = [id.as_str(), source_id.as_str(), target_id.as_str()].join(FAN_OUT_SEPARATOR);
                let mut element = DiagramElement::edge(fanned, source_id, target_id);
                edge_layout(edge, &id, &mut element);
                labels(&edge.labels, &id, &mut element);
                container.add_child(element);
            }
        }
    }
    Ok(())
}

/// Routing points from every section, then one junction element per junction point.
fn edge_layout(edge: &GraphEdge, edge_id: &str, element: &mut DiagramElement) {
    let points = element.routing_points.get_or_insert_with(Vec::new);
    for section in &edge.sections {
        points.push(section.start);
        points.extend(section.bend_points.iter().copied());
        points.push(section.end);
    }
    if let Some(PropertyValue::Points(junctions)) = lookup(&edge.properties, properties::JUNCTION_POINTS) {
        for (index, point) in junctions.iter().enumerate() {
            let mut junction = DiagramElement::new(ElementKind::Junction, format!("{edge_id}{JUNCTION_MARKER}{index}"));
            junction.position = Some(*point);
            element.add_child(junction);
        }
    }
}

fn labels(list: &[GraphLabel], owner_id: &str, container: &mut DiagramElement) {
    for (index, label) in list.iter().enumerate() {
        let id = child_id(owner_id, label.identifier.as_deref(), Feature::Labels, index);
        let mut element = DiagramElement::label(id.clone(), label.text.clone());
        transfer_bounds(&label.bounds, &mut element);
        labels(&label.labels, &id, &mut element);
        container.add_child(element);
    }
}

#[cfg(test)]
#[path = "project_test.rs"]
mod tests;
