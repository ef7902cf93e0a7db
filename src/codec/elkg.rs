//! `elkg`: the XML tree serialization of the graph model.
//!
//! DESIGN
//! ======
//! One element per model object, named after the containing collection
//! (`children`, `ports`, `labels`, `containedEdges`, `sections`,
//! `bendPoints`, `properties`). Edge endpoints are written as path
//! references (`//@children.0/@ports.1`), several separated by spaces.
//! Option values carry a `type` attribute so that they read back with the
//! same variant they were written with.
//!
//! Reading is done with `roxmltree`; problems are collected as diagnostics
//! positioned at the offending element. `roxmltree` recurses per element, so
//! the tag nesting is measured with a flat scan before the document is
//! handed to it.

use std::fmt::Write as _;

use roxmltree::{Document, Node};

use super::{CodecError, Diagnostic, GraphFormat, MAX_NESTING};
use crate::graph::properties::{PropertyValue, format_float, parse_points};
use crate::graph::{Bounds, EdgeSection, GraphEdge, GraphLabel, GraphNode, GraphPort, Point, Properties, ShapeRef};

const ROOT_ELEMENT: &str = "ElkNode";
const GRAPH_NAMESPACE: &str = "http://www.eclipse.org/elk/ElkGraph";
const XMI_NAMESPACE: &str = "http://www.omg.org/XMI";

/// Element nesting allowed in the document: graph nesting plus the root
/// element and the edge, section and bend point levels below a node.
const MAX_ELEMENT_DEPTH: usize = MAX_NESTING + 4;

// =============================================================================
// READER
// =============================================================================

struct Reader<'a, 'input> {
    doc: &'a Document<'input>,
    errors: Vec<Diagnostic>,
    depth: usize,
}

/// Decode `elkg` XML.
///
/// # Errors
///
/// Returns `CodecError::Malformed` for XML syntax errors, unknown elements,
/// invalid attribute values and unresolved edge references.
pub fn decode(text: &str) -> Result<GraphNode, CodecError> {
    if let Some(offset) = too_deep(text, MAX_ELEMENT_DEPTH) {
        let (line, column) = text_pos(text, offset);
        let message = format!("Elements are nested deeper than {MAX_ELEMENT_DEPTH} levels.");
        return Err(CodecError::with_diagnostics(GraphFormat::Elkg, vec![Diagnostic::at(message, line, column)]));
    }
    let doc = Document::parse(text).map_err(|e| {
        let pos = e.pos();
        CodecError::with_diagnostics(GraphFormat::Elkg, vec![Diagnostic::at(e.to_string(), pos.row, pos.col)])
    })?;

    let mut reader = Reader { doc: &doc, errors: Vec::new(), depth: 0 };
    let element = doc.root_element();
    let mut root = GraphNode::default();
    if element.tag_name().name() == ROOT_ELEMENT {
        root = reader.node(element);
    } else {
        reader.error(element, format!("Expected root element '{ROOT_ELEMENT}', found '{}'.", element.tag_name().name()));
    }

    let mut errors = reader.errors;
    if errors.is_empty() {
        check_references(&root, &mut errors);
    }
    if errors.is_empty() {
        Ok(root)
    } else {
        Err(CodecError::with_diagnostics(GraphFormat::Elkg, errors))
    }
}

impl Reader<'_, '_> {
    fn error(&mut self, node: Node<'_, '_>, message: impl Into<String>) {
        let pos = self.doc.text_pos_at(node.range().start);
        self.errors.push(Diagnostic::at(message, pos.row, pos.col));
    }

    fn number(&mut self, node: Node<'_, '_>, name: &str) -> f64 {
        match node.attribute(name) {
            None => 0.0,
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                self.error(node, format!("Value '{raw}' of attribute '{name}' is not a number."));
                0.0
            }),
        }
    }

    fn bounds(&mut self, node: Node<'_, '_>) -> Bounds {
        Bounds::new(
            self.number(node, "x"),
            self.number(node, "y"),
            self.number(node, "width"),
            self.number(node, "height"),
        )
    }

    fn identifier(node: Node<'_, '_>) -> Option<String> {
        node.attribute("identifier").map(str::to_owned)
    }

    /// Read a nested node or label one level down. Past the nesting limit the
    /// element is reported and left out.
    fn nested<T>(&mut self, element: Node<'_, '_>, read: impl FnOnce(&mut Self) -> T) -> Option<T> {
        if self.depth >= MAX_NESTING {
            self.error(element, format!("Elements are nested deeper than {MAX_NESTING} levels."));
            return None;
        }
        self.depth += 1;
        let value = read(self);
        self.depth -= 1;
        Some(value)
    }

    fn unknown(&mut self, child: Node<'_, '_>, parent: &str) {
        self.error(child, format!("Unknown element '{}' in {parent}.", child.tag_name().name()));
    }

    fn node(&mut self, element: Node<'_, '_>) -> GraphNode {
        let mut node = GraphNode {
            identifier: Self::identifier(element),
            bounds: self.bounds(element),
            ..GraphNode::default()
        };
        for child in element.children().filter(Node::is_element) {
            match child.tag_name().name() {
                "properties" => self.property(child, &mut node.properties),
                "labels" => node.labels.extend(self.nested(child, |r| r.label(child))),
                "ports" => node.ports.push(self.port(child)),
                "children" => node.children.extend(self.nested(child, |r| r.node(child))),
                "containedEdges" => node.edges.push(self.edge(child)),
                _ => self.unknown(child, "node"),
            }
        }
        node
    }

    fn port(&mut self, element: Node<'_, '_>) -> GraphPort {
        let mut port = GraphPort {
            identifier: Self::identifier(element),
            bounds: self.bounds(element),
            ..GraphPort::default()
        };
        for child in element.children().filter(Node::is_element) {
            match child.tag_name().name() {
                "properties" => self.property(child, &mut port.properties),
                "labels" => port.labels.extend(self.nested(child, |r| r.label(child))),
                _ => self.unknown(child, "port"),
            }
        }
        port
    }

    fn label(&mut self, element: Node<'_, '_>) -> GraphLabel {
        let mut label = GraphLabel {
            identifier: Self::identifier(element),
            text: element.attribute("text").unwrap_or_default().to_owned(),
            bounds: self.bounds(element),
            ..GraphLabel::default()
        };
        for child in element.children().filter(Node::is_element) {
            match child.tag_name().name() {
                "properties" => self.property(child, &mut label.properties),
                "labels" => label.labels.extend(self.nested(child, |r| r.label(child))),
                _ => self.unknown(child, "label"),
            }
        }
        label
    }

    fn edge(&mut self, element: Node<'_, '_>) -> GraphEdge {
        let mut edge = GraphEdge {
            identifier: Self::identifier(element),
            sources: self.references(element, "sources"),
            targets: self.references(element, "targets"),
            ..GraphEdge::default()
        };
        for child in element.children().filter(Node::is_element) {
            match child.tag_name().name() {
                "properties" => self.property(child, &mut edge.properties),
                "labels" => edge.labels.extend(self.nested(child, |r| r.label(child))),
                "sections" => edge.sections.push(self.section(child)),
                _ => self.unknown(child, "edge"),
            }
        }
        edge
    }

    fn section(&mut self, element: Node<'_, '_>) -> EdgeSection {
        let mut section = EdgeSection {
            identifier: Self::identifier(element),
            start: Point::new(self.number(element, "startX"), self.number(element, "startY")),
            end: Point::new(self.number(element, "endX"), self.number(element, "endY")),
            bend_points: Vec::new(),
        };
        for child in element.children().filter(Node::is_element) {
            match child.tag_name().name() {
                "bendPoints" => {
                    let p = Point::new(self.number(child, "x"), self.number(child, "y"));
                    section.bend_points.push(p);
                }
                "properties" => {}
                _ => self.unknown(child, "section"),
            }
        }
        section
    }

    fn property(&mut self, element: Node<'_, '_>, props: &mut Properties) {
        let Some(key) = element.attribute("key") else {
            self.error(element, "Option entry is missing its 'key'.");
            return;
        };
        let raw = element.attribute("value").unwrap_or_default();
        let value = match element.attribute("type") {
            Some(tag) => match PropertyValue::parse_typed(tag, raw) {
                Some(value) => value,
                None => {
                    self.error(element, format!("Value '{raw}' of option '{key}' is not a valid {tag}."));
                    return;
                }
            },
            None => infer_value(raw),
        };
        props.insert(key.to_owned(), value);
    }

    fn references(&mut self, element: Node<'_, '_>, name: &str) -> Vec<ShapeRef> {
        let Some(raw) = element.attribute(name) else {
            return Vec::new();
        };
        raw.split_whitespace()
            .filter_map(|reference| {
                let parsed = parse_reference(reference);
                if parsed.is_none() {
                    self.error(element, format!("Couldn't resolve reference '{reference}'."));
                }
                parsed
            })
            .collect()
    }
}

/// Untyped option values: booleans, integers, floats, point chains, then text.
fn infer_value(raw: &str) -> PropertyValue {
    if let Ok(b) = raw.parse() {
        return PropertyValue::Bool(b);
    }
    if let Ok(i) = raw.parse() {
        return PropertyValue::Int(i);
    }
    if let Ok(f) = raw.parse() {
        return PropertyValue::Float(f);
    }
    if raw.trim_start().starts_with('(') {
        if let Some(points) = parse_points(raw) {
            return PropertyValue::Points(points);
        }
    }
    PropertyValue::Text(raw.to_owned())
}

/// `/` is the root; `//@children.0/@children.2/@ports.1` walks down from it.
fn parse_reference(reference: &str) -> Option<ShapeRef> {
    if reference == "/" {
        return Some(ShapeRef::node(Vec::new()));
    }
    let rest = reference.strip_prefix("//")?;
    let mut shape = ShapeRef::default();
    for segment in rest.split('/').filter(|s| !s.is_empty()) {
        let (feature, index) = segment.strip_prefix('@')?.split_once('.')?;
        let index: usize = index.parse().ok()?;
        match feature {
            "children" if shape.port.is_none() => shape.node.push(index),
            "ports" if shape.port.is_none() => shape.port = Some(index),
            _ => return None,
        }
    }
    Some(shape)
}

fn check_references(root: &GraphNode, errors: &mut Vec<Diagnostic>) {
    fn walk(root: &GraphNode, node: &GraphNode, errors: &mut Vec<Diagnostic>) {
        for edge in &node.edges {
            for shape in edge.sources.iter().chain(&edge.targets) {
                if root.shape_bounds(shape).is_none() {
                    errors.push(Diagnostic::at(
                        format!("Couldn't resolve reference '{}'.", reference(shape)),
                        1,
                        1,
                    ));
                }
            }
        }
        for child in &node.children {
            walk(root, child, errors);
        }
    }
    walk(root, root, errors);
}

/// Byte offset of the first start tag nested deeper than `limit`. Only the
/// tag structure is followed; well-formedness is left to the parser.
fn too_deep(text: &str, limit: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut i = 0;
    while let Some(found) = text[i..].find('<') {
        let start = i + found;
        let rest = &text[start..];
        let skip_past = |end: &str| rest.find(end).map_or(text.len(), |p| start + p + end.len());
        if rest.starts_with("<!--") {
            i = skip_past("-->");
        } else if rest.starts_with("<![CDATA[") {
            i = skip_past("]]>");
        } else if rest.starts_with("<?") {
            i = skip_past("?>");
        } else {
            let end = tag_end(text.as_bytes(), start);
            if rest.starts_with("</") {
                depth = depth.saturating_sub(1);
            } else if !rest.starts_with("<!") && !text[..end].ends_with("/>") {
                depth += 1;
                if depth > limit {
                    return Some(start);
                }
            }
            i = end;
        }
    }
    None
}

/// Offset just past the `>` closing the tag at `start`, ignoring quoted `>`.
fn tag_end(bytes: &[u8], start: usize) -> usize {
    let mut quote = None;
    for (offset, &b) in bytes[start..].iter().enumerate() {
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if b == b'"' || b == b'\'' => quote = Some(b),
            None if b == b'>' => return start + offset + 1,
            None => {}
        }
    }
    bytes.len()
}

/// 1-based line and column of a byte offset.
fn text_pos(text: &str, offset: usize) -> (u32, u32) {
    let before = &text[..offset];
    let line = before.matches('\n').count() + 1;
    let column = before.rsplit('\n').next().map_or(0, |l| l.chars().count()) + 1;
    (u32::try_from(line).unwrap_or(u32::MAX), u32::try_from(column).unwrap_or(u32::MAX))
}

// =============================================================================
// WRITER
// =============================================================================

/// Encode a graph as `elkg` XML.
///
/// # Errors
///
/// Never fails for a well-formed model; the signature matches the other codecs.
pub fn encode(root: &GraphNode) -> Result<String, CodecError> {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    let _ = write!(
        out,
        "<elkgraph:{ROOT_ELEMENT} xmlns:xmi=\"{XMI_NAMESPACE}\" xmlns:elkgraph=\"{GRAPH_NAMESPACE}\""
    );
    write_node_body(&mut out, root, 0, &format!("elkgraph:{ROOT_ELEMENT}"));
    Ok(out)
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str("  ");
    }
}

fn attr(out: &mut String, name: &str, value: &str) {
    let _ = write!(out, " {name}=\"{}\"", escape(value));
}

fn identifier_attr(out: &mut String, identifier: Option<&String>) {
    if let Some(id) = identifier {
        attr(out, "identifier", id);
    }
}

fn number_attr(out: &mut String, name: &str, value: f64) {
    if value != 0.0 {
        attr(out, name, &format_float(value));
    }
}

fn bounds_attrs(out: &mut String, bounds: &Bounds) {
    number_attr(out, "x", bounds.x);
    number_attr(out, "y", bounds.y);
    number_attr(out, "width", bounds.width);
    number_attr(out, "height", bounds.height);
}

/// Finish an opened start tag: attributes, then nested content or `/>`.
fn write_node_body(out: &mut String, node: &GraphNode, depth: usize, tag: &str) {
    identifier_attr(out, node.identifier.as_ref());
    bounds_attrs(out, &node.bounds);
    let empty = node.properties.is_empty()
        && node.labels.is_empty()
        && node.ports.is_empty()
        && node.children.is_empty()
        && node.edges.is_empty();
    if empty {
        out.push_str("/>\n");
        return;
    }
    out.push_str(">\n");
    write_properties(out, &node.properties, depth + 1);
    for label in &node.labels {
        write_label(out, label, depth + 1);
    }
    for port in &node.ports {
        indent(out, depth + 1);
        out.push_str("<ports");
        identifier_attr(out, port.identifier.as_ref());
        bounds_attrs(out, &port.bounds);
        write_shape_content(out, &port.properties, &port.labels, depth + 1, "ports");
    }
    for child in &node.children {
        indent(out, depth + 1);
        out.push_str("<children");
        write_node_body(out, child, depth + 1, "children");
    }
    for edge in &node.edges {
        write_edge(out, edge, depth + 1);
    }
    indent(out, depth);
    let _ = writeln!(out, "</{tag}>");
}

fn write_shape_content(out: &mut String, props: &Properties, labels: &[GraphLabel], depth: usize, tag: &str) {
    if props.is_empty() && labels.is_empty() {
        out.push_str("/>\n");
        return;
    }
    out.push_str(">\n");
    write_properties(out, props, depth + 1);
    for label in labels {
        write_label(out, label, depth + 1);
    }
    indent(out, depth);
    let _ = writeln!(out, "</{tag}>");
}

fn write_label(out: &mut String, label: &GraphLabel, depth: usize) {
    indent(out, depth);
    out.push_str("<labels");
    identifier_attr(out, label.identifier.as_ref());
    attr(out, "text", &label.text);
    bounds_attrs(out, &label.bounds);
    write_shape_content(out, &label.properties, &label.labels, depth, "labels");
}

fn write_properties(out: &mut String, props: &Properties, depth: usize) {
    for (key, value) in props {
        indent(out, depth);
        out.push_str("<properties");
        attr(out, "key", key);
        attr(out, "type", value.type_tag());
        attr(out, "value", &value.to_raw());
        out.push_str("/>\n");
    }
}

fn write_edge(out: &mut String, edge: &GraphEdge, depth: usize) {
    indent(out, depth);
    out.push_str("<containedEdges");
    identifier_attr(out, edge.identifier.as_ref());
    let refs = |shapes: &[ShapeRef]| shapes.iter().map(reference).collect::<Vec<_>>().join(" ");
    if !edge.sources.is_empty() {
        attr(out, "sources", &refs(&edge.sources));
    }
    if !edge.targets.is_empty() {
        attr(out, "targets", &refs(&edge.targets));
    }
    if edge.properties.is_empty() && edge.labels.is_empty() && edge.sections.is_empty() {
        out.push_str("/>\n");
        return;
    }
    out.push_str(">\n");
    write_properties(out, &edge.properties, depth + 1);
    for label in &edge.labels {
        write_label(out, label, depth + 1);
    }
    for section in &edge.sections {
        indent(out, depth + 1);
        out.push_str("<sections");
        identifier_attr(out, section.identifier.as_ref());
        number_attr(out, "startX", section.start.x);
        number_attr(out, "startY", section.start.y);
        number_attr(out, "endX", section.end.x);
        number_attr(out, "endY", section.end.y);
        if section.bend_points.is_empty() {
            out.push_str("/>\n");
            continue;
        }
        out.push_str(">\n");
        for p in &section.bend_points {
            indent(out, depth + 2);
            out.push_str("<bendPoints");
            number_attr(out, "x", p.x);
            number_attr(out, "y", p.y);
            out.push_str("/>\n");
        }
        indent(out, depth + 1);
        out.push_str("</sections>\n");
    }
    indent(out, depth);
    out.push_str("</containedEdges>\n");
}

fn reference(shape: &ShapeRef) -> String {
    if shape.node.is_empty() && shape.port.is_none() {
        return "/".to_owned();
    }
    let mut segments: Vec<String> = shape.node.iter().map(|i| format!("@children.{i}")).collect();
    if let Some(port) = shape.port {
        segments.push(format!("@ports.{port}"));
    }
    format!("//{}", segments.join("/"))
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\n' => out.push_str("&#10;"),
            '\r' => out.push_str("&#13;"),
            '\t' => out.push_str("&#9;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
#[path = "elkg_test.rs"]
mod tests;
