//! `json`: the JSON graph notation.
//!
//! ```json
//! { "id": "root",
//!   "layoutOptions": { "elk.direction": "DOWN" },
//!   "children": [ { "id": "n1", "width": 30, "height": 30 }, { "id": "n2" } ],
//!   "edges": [ { "id": "e1", "sources": [ "n1" ], "targets": [ "n2" ] } ] }
//! ```
//!
//! DESIGN
//! ======
//! Nodes, ports and edges must carry an id, unique across the document. Edge
//! endpoints name node or port ids and may point anywhere in the tree, so they
//! are resolved after the whole document is read. Failures are reported as a
//! cause chain, innermost first: the JSON parser's own classification (when
//! the text is not JSON at all) followed by the import failure.
//!
//! The encoder writes derived identifiers for anonymous elements so that its
//! output always reads back. Junction points are an edge field of their own
//! (`junctionPoints`) rather than a layout option.

use std::collections::{HashMap, HashSet};

use serde_json::{Map, Value, json};

use super::{Cause, CodecError, Diagnostic, GraphFormat};
use crate::graph::identity::{self, Feature, child_id};
use crate::graph::properties::{self, PropertyValue, key_matches};
use crate::graph::{Bounds, EdgeSection, GraphEdge, GraphLabel, GraphNode, GraphPort, Point, Properties, ShapeRef};

const IMPORT_ERROR: &str = "JsonImportError";
const EXPORT_ERROR: &str = "JsonExportError";

// =============================================================================
// READER
// =============================================================================

/// Import failure with its message; converted into the cause chain at the edge.
#[derive(Debug)]
struct ImportError(String);

type ImportResult<T> = Result<T, ImportError>;

struct PendingEdge {
    container: Vec<usize>,
    index: usize,
    sources: Vec<String>,
    targets: Vec<String>,
}

#[derive(Default)]
struct Importer {
    shapes: HashMap<String, ShapeRef>,
    edge_ids: HashSet<String>,
    pending: Vec<PendingEdge>,
}

/// Decode JSON graph text.
///
/// # Errors
///
/// Returns `CodecError::Malformed` with a cause chain. Syntax errors also
/// carry a positioned diagnostic.
pub fn decode(text: &str) -> Result<GraphNode, CodecError> {
    let value: Value = serde_json::from_str(text).map_err(|e| {
        let tag = match e.classify() {
            serde_json::error::Category::Io => "IoError",
            serde_json::error::Category::Syntax => "SyntaxError",
            serde_json::error::Category::Data => "DataError",
            serde_json::error::Category::Eof => "EofError",
        };
        let line = u32::try_from(e.line()).unwrap_or(u32::MAX);
        let column = u32::try_from(e.column()).unwrap_or(u32::MAX);
        CodecError::Malformed {
            format: GraphFormat::Json,
            diagnostics: vec![Diagnostic::at(e.to_string(), line, column)],
            causes: vec![
                Cause::new(tag, e.to_string()),
                Cause::new(IMPORT_ERROR, "Input is not valid JSON."),
            ],
        }
    })?;

    let mut importer = Importer::default();
    importer
        .import(&value)
        .map_err(|ImportError(message)| CodecError::with_causes(GraphFormat::Json, vec![Cause::new(IMPORT_ERROR, message)]))
}

fn object<'v>(value: &'v Value, what: &str) -> ImportResult<&'v Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| ImportError(format!("Expected {what} to be an object.")))
}

fn array<'v>(obj: &'v Map<String, Value>, key: &str) -> ImportResult<&'v [Value]> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(&[]),
        Some(Value::Array(items)) => Ok(items),
        Some(_) => Err(ImportError(format!("Expected '{key}' to be an array."))),
    }
}

fn number(obj: &Map<String, Value>, key: &str) -> ImportResult<f64> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(0.0),
        Some(value) => value
            .as_f64()
            .ok_or_else(|| ImportError(format!("Expected '{key}' to be a number."))),
    }
}

fn point(value: &Value) -> ImportResult<Point> {
    let obj = object(value, "a point")?;
    Ok(Point::new(number(obj, "x")?, number(obj, "y")?))
}

/// Ids may be strings or numbers.
fn id_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn optional_id(obj: &Map<String, Value>) -> Option<String> {
    obj.get("id").and_then(id_of)
}

fn required_id(obj: &Map<String, Value>) -> ImportResult<String> {
    optional_id(obj).ok_or_else(|| ImportError("An element is missing an id.".into()))
}

fn bounds(obj: &Map<String, Value>) -> ImportResult<Bounds> {
    Ok(Bounds::new(
        number(obj, "x")?,
        number(obj, "y")?,
        number(obj, "width")?,
        number(obj, "height")?,
    ))
}

fn option_value(key: &str, value: &Value) -> ImportResult<PropertyValue> {
    Ok(match value {
        Value::Bool(b) => PropertyValue::Bool(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => PropertyValue::Int(i),
            None => PropertyValue::Float(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => PropertyValue::Text(s.clone()),
        Value::Array(items) => PropertyValue::Points(items.iter().map(point).collect::<ImportResult<_>>()?),
        Value::Null | Value::Object(_) => {
            return Err(ImportError(format!("Unsupported value for option '{key}'.")));
        }
    })
}

/// `layoutOptions`, with `properties` accepted as an alias.
fn options(obj: &Map<String, Value>) -> ImportResult<Properties> {
    let mut props = Properties::new();
    for key in ["properties", "layoutOptions"] {
        let Some(value) = obj.get(key) else {
            continue;
        };
        for (name, value) in object(value, &format!("'{key}'"))? {
            props.insert(name.clone(), option_value(name, value)?);
        }
    }
    Ok(props)
}

fn references(obj: &Map<String, Value>, many: &str, single: &str, port: &str) -> ImportResult<Vec<String>> {
    if obj.contains_key(many) {
        return array(obj, many)?
            .iter()
            .map(|v| id_of(v).ok_or_else(|| ImportError(format!("Expected '{many}' to list ids."))))
            .collect();
    }
    // Primitive edge form: `source` plus optional `sourcePort`.
    let named = obj.get(port).or_else(|| obj.get(single));
    Ok(named.and_then(id_of).into_iter().collect())
}

impl Importer {
    fn import(&mut self, value: &Value) -> ImportResult<GraphNode> {
        let obj = object(value, "the graph")?;
        let mut root = self.node(obj, &[], true)?;
        self.resolve(&mut root)?;
        Ok(root)
    }

    fn register(&mut self, id: &str, shape: ShapeRef) -> ImportResult<()> {
        if self.shapes.insert(id.to_owned(), shape).is_some() || self.edge_ids.contains(id) {
            return Err(ImportError(format!("Duplicate id: {id}.")));
        }
        Ok(())
    }

    fn node(&mut self, obj: &Map<String, Value>, path: &[usize], is_root: bool) -> ImportResult<GraphNode> {
        let identifier = if is_root { optional_id(obj) } else { Some(required_id(obj)?) };
        if let Some(id) = &identifier {
            self.register(id, ShapeRef::node(path))?;
        }
        let mut node = GraphNode {
            identifier,
            bounds: bounds(obj)?,
            properties: options(obj)?,
            labels: labels(obj)?,
            ..GraphNode::default()
        };

        for (index, port) in array(obj, "ports")?.iter().enumerate() {
            let port = object(port, "a port")?;
            let id = required_id(port)?;
            self.register(&id, ShapeRef::port(path, index))?;
            node.ports.push(GraphPort {
                identifier: Some(id),
                bounds: bounds(port)?,
                properties: options(port)?,
                labels: labels(port)?,
            });
        }

        for (index, child) in array(obj, "children")?.iter().enumerate() {
            let mut child_path = path.to_vec();
            child_path.push(index);
            let child = self.node(object(child, "a node")?, &child_path, false)?;
            node.children.push(child);
        }

        for (index, edge) in array(obj, "edges")?.iter().enumerate() {
            let edge = object(edge, "an edge")?;
            node.edges.push(self.edge(edge, path, index)?);
        }
        Ok(node)
    }

    fn edge(&mut self, obj: &Map<String, Value>, container: &[usize], index: usize) -> ImportResult<GraphEdge> {
        let id = required_id(obj)?;
        if self.shapes.contains_key(&id) || !self.edge_ids.insert(id.clone()) {
            return Err(ImportError(format!("Duplicate id: {id}.")));
        }
        let mut properties = options(obj)?;
        if obj.contains_key("junctionPoints") {
            let points = array(obj, "junctionPoints")?
                .iter()
                .map(point)
                .collect::<ImportResult<Vec<_>>>()?;
            properties.insert(properties::JUNCTION_POINTS.to_owned(), PropertyValue::Points(points));
        }
        let mut sections = Vec::new();
        for section in array(obj, "sections")? {
            let section = object(section, "an edge section")?;
            sections.push(EdgeSection {
                identifier: optional_id(section),
                start: section.get("startPoint").map(point).transpose()?.unwrap_or_default(),
                end: section.get("endPoint").map(point).transpose()?.unwrap_or_default(),
                bend_points: array(section, "bendPoints")?
                    .iter()
                    .map(point)
                    .collect::<ImportResult<_>>()?,
            });
        }
        self.pending.push(PendingEdge {
            container: container.to_vec(),
            index,
            sources: references(obj, "sources", "source", "sourcePort")?,
            targets: references(obj, "targets", "target", "targetPort")?,
        });
        Ok(GraphEdge {
            identifier: Some(id),
            sources: Vec::new(),
            targets: Vec::new(),
            sections,
            properties,
            labels: labels(obj)?,
        })
    }

    fn resolve(&mut self, root: &mut GraphNode) -> ImportResult<()> {
        for pending in std::mem::take(&mut self.pending) {
            let lookup = |ids: &[String]| -> ImportResult<Vec<ShapeRef>> {
                ids.iter()
                    .map(|id| {
                        self.shapes
                            .get(id)
                            .cloned()
                            .ok_or_else(|| ImportError(format!("Couldn't resolve reference '{id}'.")))
                    })
                    .collect()
            };
            let sources = lookup(&pending.sources)?;
            let targets = lookup(&pending.targets)?;
            if let Some(edge) = root
                .node_at_mut(&pending.container)
                .and_then(|n| n.edges.get_mut(pending.index))
            {
                edge.sources = sources;
                edge.targets = targets;
            }
        }
        Ok(())
    }
}

fn labels(obj: &Map<String, Value>) -> ImportResult<Vec<GraphLabel>> {
    array(obj, "labels")?
        .iter()
        .map(|value| {
            let label = object(value, "a label")?;
            Ok(GraphLabel {
                identifier: optional_id(label),
                text: label
                    .get("text")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_owned(),
                bounds: bounds(label)?,
                properties: options(label)?,
                labels: labels(label)?,
            })
        })
        .collect()
}

// =============================================================================
// WRITER
// =============================================================================

/// Encode a graph as pretty-printed JSON.
///
/// # Errors
///
/// Returns `CodecError::Internal` when an edge endpoint does not resolve or a
/// float option is not finite.
pub fn encode(root: &GraphNode) -> Result<String, CodecError> {
    let root_id = identity::root_id(root);
    let value = export_node(root, root, &[], &root_id)?;
    serde_json::to_string_pretty(&value).map_err(|e| {
        CodecError::Internal {
            format: GraphFormat::Json,
            message: e.to_string(),
            causes: vec![Cause::new("EncodeError", e.to_string()), Cause::new(EXPORT_ERROR, "Failed to write JSON.")],
        }
    })
}

fn export_error(message: impl Into<String>) -> CodecError {
    let message = message.into();
    CodecError::Internal {
        format: GraphFormat::Json,
        causes: vec![Cause::new(EXPORT_ERROR, message.clone())],
        message,
    }
}

fn float(value: f64) -> Result<Value, CodecError> {
    serde_json::Number::from_f64(value)
        .map(Value::Number)
        .ok_or_else(|| export_error(format!("Non-finite number {value} cannot be written.")))
}

fn put_bounds(obj: &mut Map<String, Value>, bounds: &Bounds) -> Result<(), CodecError> {
    for (key, value) in [("x", bounds.x), ("y", bounds.y), ("width", bounds.width), ("height", bounds.height)] {
        if value != 0.0 {
            obj.insert(key.to_owned(), float(value)?);
        }
    }
    Ok(())
}

fn export_point(p: Point) -> Result<Value, CodecError> {
    Ok(json!({ "x": float(p.x)?, "y": float(p.y)? }))
}

fn put_options(obj: &mut Map<String, Value>, props: &Properties) -> Result<(), CodecError> {
    if props.is_empty() {
        return Ok(());
    }
    let mut options = Map::new();
    for (key, value) in props {
        let value = match value {
            PropertyValue::Bool(b) => Value::Bool(*b),
            PropertyValue::Int(i) => Value::from(*i),
            PropertyValue::Float(f) => float(*f)?,
            PropertyValue::Text(s) => Value::String(s.clone()),
            PropertyValue::Points(points) => {
                Value::Array(points.iter().map(|p| export_point(*p)).collect::<Result<_, _>>()?)
            }
        };
        options.insert(key.clone(), value);
    }
    obj.insert("layoutOptions".into(), Value::Object(options));
    Ok(())
}

fn export_labels(labels: &[GraphLabel]) -> Result<Vec<Value>, CodecError> {
    labels
        .iter()
        .map(|label| {
            let mut obj = Map::new();
            if let Some(id) = &label.identifier {
                obj.insert("id".into(), Value::String(id.clone()));
            }
            obj.insert("text".into(), Value::String(label.text.clone()));
            put_bounds(&mut obj, &label.bounds)?;
            put_options(&mut obj, &label.properties)?;
            put_list(&mut obj, "labels", export_labels(&label.labels)?);
            Ok(Value::Object(obj))
        })
        .collect()
}

fn put_list(obj: &mut Map<String, Value>, key: &str, items: Vec<Value>) {
    if !items.is_empty() {
        obj.insert(key.to_owned(), Value::Array(items));
    }
}

/// Written id of the node or port an endpoint names: its own identifier, or
/// the derived identifier when anonymous.
fn endpoint_id(root: &GraphNode, shape: &ShapeRef) -> Result<String, CodecError> {
    let node = root
        .node_at(&shape.node)
        .ok_or_else(|| export_error("Edge endpoint does not resolve."))?;
    let explicit = match shape.port {
        Some(port) => node
            .ports
            .get(port)
            .ok_or_else(|| export_error("Edge endpoint does not resolve."))?
            .identifier
            .clone(),
        None => node.identifier.clone(),
    };
    match explicit {
        Some(id) => Ok(id),
        None => identity::shape_id(root, shape).ok_or_else(|| export_error("Edge endpoint does not resolve.")),
    }
}

fn export_node(root: &GraphNode, node: &GraphNode, path: &[usize], node_id: &str) -> Result<Value, CodecError> {
    let mut obj = Map::new();
    obj.insert("id".into(), Value::String(node.identifier.clone().unwrap_or_else(|| node_id.to_owned())));
    put_bounds(&mut obj, &node.bounds)?;
    put_options(&mut obj, &node.properties)?;
    put_list(&mut obj, "labels", export_labels(&node.labels)?);

    let mut ports = Vec::new();
    for (index, port) in node.ports.iter().enumerate() {
        let mut p = Map::new();
        let id = endpoint_id(root, &ShapeRef::port(path, index))?;
        p.insert("id".into(), Value::String(id));
        put_bounds(&mut p, &port.bounds)?;
        put_options(&mut p, &port.properties)?;
        put_list(&mut p, "labels", export_labels(&port.labels)?);
        ports.push(Value::Object(p));
    }
    put_list(&mut obj, "ports", ports);

    let mut children = Vec::new();
    for (index, child) in node.children.iter().enumerate() {
        let mut child_path = path.to_vec();
        child_path.push(index);
        let id = child_id(node_id, child.identifier.as_deref(), Feature::Children, index);
        children.push(export_node(root, child, &child_path, &id)?);
    }
    put_list(&mut obj, "children", children);

    let mut edges = Vec::new();
    for (index, edge) in node.edges.iter().enumerate() {
        let derived = child_id(node_id, None, Feature::ContainedEdges, index);
        edges.push(export_edge(root, edge, edge.identifier.clone().unwrap_or(derived))?);
    }
    put_list(&mut obj, "edges", edges);
    Ok(Value::Object(obj))
}

fn export_edge(root: &GraphNode, edge: &GraphEdge, id: String) -> Result<Value, CodecError> {
    let ids = |shapes: &[ShapeRef]| -> Result<Vec<Value>, CodecError> {
        shapes.iter().map(|s| endpoint_id(root, s).map(Value::String)).collect()
    };
    let mut obj = Map::new();
    obj.insert("id".into(), Value::String(id));
    obj.insert("sources".into(), Value::Array(ids(&edge.sources)?));
    obj.insert("targets".into(), Value::Array(ids(&edge.targets)?));

    let mut sections = Vec::new();
    for section in &edge.sections {
        let mut s = Map::new();
        if let Some(id) = &section.identifier {
            s.insert("id".into(), Value::String(id.clone()));
        }
        s.insert("startPoint".into(), export_point(section.start)?);
        s.insert("endPoint".into(), export_point(section.end)?);
        let bends = section
            .bend_points
            .iter()
            .map(|p| export_point(*p))
            .collect::<Result<Vec<_>, _>>()?;
        put_list(&mut s, "bendPoints", bends);
        sections.push(Value::Object(s));
    }
    put_list(&mut obj, "sections", sections);

    let mut options = edge.properties.clone();
    let mut junctions = None;
    options.retain(|key, value| match value {
        PropertyValue::Points(points) if junctions.is_none() && key_matches(key, properties::JUNCTION_POINTS) => {
            junctions = Some(points.clone());
            false
        }
        _ => true,
    });
    if let Some(points) = junctions {
        let points = points.into_iter().map(export_point).collect::<Result<Vec<_>, _>>()?;
        obj.insert("junctionPoints".into(), Value::Array(points));
    }
    put_options(&mut obj, &options)?;
    put_list(&mut obj, "labels", export_labels(&edge.labels)?);
    Ok(Value::Object(obj))
}

#[cfg(test)]
#[path = "json_test.rs"]
mod tests;
