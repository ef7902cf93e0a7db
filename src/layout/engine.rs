//! Built-in layout engine, selected as `"current"`.
//!
//! DESIGN
//! ======
//! A small layered placement run bottom-up over the containment tree:
//!
//! 1. Every node's children are laid out first, so compound children already
//!    have their final size when their parent arranges them.
//! 2. Children are assigned to layers by longest path over the edges whose
//!    endpoints fall under distinct children, then stacked layer by layer along
//!    the layout direction (`RIGHT` or `DOWN`). Compound nodes grow to fit.
//! 3. Once every position is final, each edge gets one orthogonal section per
//!    (source, target) pair in the coordinate system of its containing node.
//!    The points where a hyperedge branches become junction points.
//!
//! The cancel token is checked once per node and once per routed container,
//! which keeps cancellation latency proportional to a single node's work.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::ErrorCode;
use crate::graph::properties::{self, PropertyValue, key_matches, lookup};
use crate::graph::{EdgeSection, GraphNode, Point, Properties, ShapeRef};

const DEFAULT_SPACING: f64 = 20.0;
const DEFAULT_PADDING: f64 = 12.0;
const LABEL_GAP: f64 = 2.0;

// =============================================================================
// CONTRACT
// =============================================================================

/// Cooperative cancellation flag shared between the harness and an engine run.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// # Errors
    ///
    /// Returns `EngineError::Cancelled` once the token has been cancelled.
    pub fn check(&self) -> Result<(), EngineError> {
        if self.is_cancelled() { Err(EngineError::Cancelled) } else { Ok(()) }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("layout was cancelled")]
    Cancelled,
    #[error("{0}")]
    Invalid(String),
}

impl ErrorCode for EngineError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Cancelled => "E_ENGINE_CANCELLED",
            Self::Invalid(_) => "E_ENGINE_INVALID",
        }
    }
}

/// Graph in, laid-out graph out. Implementations mutate the graph in place and
/// run synchronously on the harness's dedicated thread.
pub trait LayoutEngine: Send + Sync {
    /// # Errors
    ///
    /// Returns an `EngineError` when the graph's options cannot be honored or
    /// the run was cancelled.
    fn layout(&self, graph: &mut GraphNode, cancel: &CancelToken) -> Result<(), EngineError>;
}

// =============================================================================
// OPTIONS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Right,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Padding {
    top: f64,
    left: f64,
    bottom: f64,
    right: f64,
}

impl Padding {
    fn uniform(value: f64) -> Self {
        Self { top: value, left: value, bottom: value, right: value }
    }
}

#[derive(Debug, Clone, Copy)]
struct Settings {
    direction: Direction,
    spacing: f64,
    padding: Padding,
}

impl Settings {
    fn read(props: &Properties) -> Result<Self, EngineError> {
        if let Some(algorithm) = lookup(props, properties::ALGORITHM) {
            let name = algorithm.to_raw();
            if !matches!(name.as_str(), "layered" | "org.eclipse.elk.layered") {
                return Err(EngineError::Invalid(format!("Unsupported layout algorithm '{name}'.")));
            }
        }
        let direction = match lookup(props, properties::DIRECTION) {
            None => Direction::Right,
            Some(value) => parse_direction(&value.to_raw())?,
        };
        let spacing = match lookup(props, properties::SPACING_NODE_NODE) {
            None => DEFAULT_SPACING,
            Some(value) => non_negative(value, "node spacing")?,
        };
        let padding = match lookup(props, properties::PADDING) {
            None => Padding::uniform(DEFAULT_PADDING),
            Some(value) => parse_padding(value)?,
        };
        Ok(Self { direction, spacing, padding })
    }
}

fn parse_direction(raw: &str) -> Result<Direction, EngineError> {
    let name = raw.rsplit('.').next().unwrap_or(raw);
    match name.to_ascii_uppercase().as_str() {
        "RIGHT" | "UNDEFINED" => Ok(Direction::Right),
        "DOWN" => Ok(Direction::Down),
        _ => Err(EngineError::Invalid(format!("Unsupported layout direction '{raw}'."))),
    }
}

fn non_negative(value: &PropertyValue, what: &str) -> Result<f64, EngineError> {
    match value.as_f64() {
        Some(v) if v.is_finite() && v >= 0.0 => Ok(v),
        _ => Err(EngineError::Invalid(format!("Invalid {what} '{}'.", value.to_raw()))),
    }
}

/// A single number, or `[top=12,left=12,bottom=12,right=12]`.
fn parse_padding(value: &PropertyValue) -> Result<Padding, EngineError> {
    if let Some(v) = value.as_f64() {
        return non_negative(value, "padding").map(|_| Padding::uniform(v));
    }
    let raw = value.to_raw();
    let invalid = || EngineError::Invalid(format!("Invalid padding '{raw}'."));
    let inner = raw
        .trim()
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .ok_or_else(invalid)?;
    let mut padding = Padding::uniform(DEFAULT_PADDING);
    for part in inner.split(',').filter(|p| !p.trim().is_empty()) {
        let (side, amount) = part.split_once('=').ok_or_else(invalid)?;
        let amount: f64 = amount.trim().parse().map_err(|_| invalid())?;
        if !amount.is_finite() || amount < 0.0 {
            return Err(invalid());
        }
        match side.trim() {
            "top" => padding.top = amount,
            "left" => padding.left = amount,
            "bottom" => padding.bottom = amount,
            "right" => padding.right = amount,
            _ => return Err(invalid()),
        }
    }
    Ok(padding)
}

// =============================================================================
// ENGINE
// =============================================================================

/// The layered engine backing the `"current"` selector.
#[derive(Debug, Clone, Copy, Default)]
pub struct LayeredEngine;

/// Edge endpoints gathered once for the whole tree.
struct Connectivity {
    /// (source node path, target node path) for every endpoint pair.
    pairs: Vec<(Vec<usize>, Vec<usize>)>,
    /// Port → (incoming, outgoing) edge count.
    port_degrees: HashMap<ShapeRef, (usize, usize)>,
}

impl Connectivity {
    fn collect(root: &GraphNode) -> Self {
        fn walk(node: &GraphNode, out: &mut Connectivity) {
            for edge in &node.edges {
                for source in &edge.sources {
                    if source.port.is_some() {
                        out.port_degrees.entry(source.clone()).or_default().1 += 1;
                    }
                    for target in &edge.targets {
                        out.pairs.push((source.node.clone(), target.node.clone()));
                    }
                }
                for target in edge.targets.iter().filter(|t| t.port.is_some()) {
                    out.port_degrees.entry(target.clone()).or_default().0 += 1;
                }
            }
            for child in &node.children {
                walk(child, out);
            }
        }
        let mut out = Self { pairs: Vec::new(), port_degrees: HashMap::new() };
        walk(root, &mut out);
        out
    }
}

impl LayoutEngine for LayeredEngine {
    fn layout(&self, graph: &mut GraphNode, cancel: &CancelToken) -> Result<(), EngineError> {
        let connectivity = Connectivity::collect(graph);
        let mut path = Vec::new();
        place(graph, &mut path, &connectivity, cancel)?;
        route(graph, cancel)
    }
}

fn place(
    node: &mut GraphNode,
    path: &mut Vec<usize>,
    connectivity: &Connectivity,
    cancel: &CancelToken,
) -> Result<(), EngineError> {
    cancel.check()?;
    let settings = Settings::read(&node.properties)?;

    for index in 0..node.children.len() {
        path.push(index);
        place(&mut node.children[index], path, connectivity, cancel)?;
        place_ports(&mut node.children[index], path, settings.direction, connectivity);
        path.pop();
    }

    if !node.children.is_empty() {
        let layers = assign_layers(node.children.len(), path, &connectivity.pairs);
        arrange(node, &layers, &settings);
    }
    place_node_labels(node);
    Ok(())
}

/// Longest-path layering of the children of the node at `path`. Cycles are
/// bounded by capping layers at the child count.
fn assign_layers(count: usize, path: &[usize], pairs: &[(Vec<usize>, Vec<usize>)]) -> Vec<usize> {
    let depth = path.len();
    let local = |node: &[usize]| (node.len() > depth && node[..depth] == *path).then(|| node[depth]);

    let mut local_pairs: Vec<(usize, usize)> = pairs
        .iter()
        .filter_map(|(s, t)| Some((local(s.as_slice())?, local(t.as_slice())?)))
        .filter(|(u, v)| u != v)
        .collect();
    local_pairs.sort_unstable();
    local_pairs.dedup();

    let mut layer = vec![0; count];
    for _ in 0..count {
        let mut changed = false;
        for &(u, v) in &local_pairs {
            let candidate = layer[u] + 1;
            if candidate > layer[v] && candidate < count {
                layer[v] = candidate;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
    layer
}

fn label_block_height(node: &GraphNode) -> f64 {
    if node.labels.is_empty() {
        return 0.0;
    }
    node.labels.iter().map(|l| l.bounds.height).sum::<f64>() + LABEL_GAP
}

/// Stack children layer by layer and grow the node to fit them.
fn arrange(node: &mut GraphNode, layers: &[usize], settings: &Settings) {
    let layer_count = layers.iter().copied().max().map_or(0, |m| m + 1);
    let mut groups: Vec<Vec<usize>> = vec![Vec::new(); layer_count];
    for (index, &layer) in layers.iter().enumerate() {
        groups[layer].push(index);
    }

    let padding = settings.padding;
    let top = padding.top + label_block_height(node);
    let mut main = match settings.direction {
        Direction::Right => padding.left,
        Direction::Down => top,
    };
    for group in &groups {
        let mut cross = match settings.direction {
            Direction::Right => top,
            Direction::Down => padding.left,
        };
        let mut thickness: f64 = 0.0;
        for &index in group {
            let bounds = &mut node.children[index].bounds;
            match settings.direction {
                Direction::Right => {
                    bounds.x = main;
                    bounds.y = cross;
                    cross += bounds.height + settings.spacing;
                    thickness = thickness.max(bounds.width);
                }
                Direction::Down => {
                    bounds.x = cross;
                    bounds.y = main;
                    cross += bounds.width + settings.spacing;
                    thickness = thickness.max(bounds.height);
                }
            }
        }
        main += thickness + settings.spacing;
    }

    let max_x = node.children.iter().map(|c| c.bounds.x + c.bounds.width).fold(0.0, f64::max);
    let max_y = node.children.iter().map(|c| c.bounds.y + c.bounds.height).fold(0.0, f64::max);
    let widest_label = node.labels.iter().map(|l| l.bounds.width).fold(0.0, f64::max);
    node.bounds.width = (max_x + padding.right).max(widest_label + padding.left + padding.right);
    node.bounds.height = max_y + padding.bottom;
}

/// Ports mostly receiving edges go on the incoming side, the rest on the
/// outgoing side, spread evenly along it.
fn place_ports(node: &mut GraphNode, path: &[usize], direction: Direction, connectivity: &Connectivity) {
    let (mut incoming, mut outgoing) = (Vec::new(), Vec::new());
    for index in 0..node.ports.len() {
        let key = ShapeRef::port(path, index);
        let (ins, outs) = connectivity.port_degrees.get(&key).copied().unwrap_or_default();
        if ins > outs {
            incoming.push(index);
        } else {
            outgoing.push(index);
        }
    }

    let (width, height) = (node.bounds.width, node.bounds.height);
    for (side, indices) in [(true, incoming), (false, outgoing)] {
        #[allow(clippy::cast_precision_loss)]
        let slots = (indices.len() + 1) as f64;
        for (slot, &index) in indices.iter().enumerate() {
            #[allow(clippy::cast_precision_loss)]
            let fraction = (slot + 1) as f64 / slots;
            let port = &mut node.ports[index];
            let b = &mut port.bounds;
            match direction {
                Direction::Right => {
                    b.x = if side { -b.width } else { width };
                    b.y = height * fraction - b.height / 2.0;
                }
                Direction::Down => {
                    b.x = width * fraction - b.width / 2.0;
                    b.y = if side { -b.height } else { height };
                }
            }
            let mut y = b.height + LABEL_GAP;
            for label in &mut port.labels {
                label.bounds.x = 0.0;
                label.bounds.y = y;
                y += label.bounds.height;
            }
        }
    }
}

/// Leaf labels are centered; compound labels sit in the reserved top band.
fn place_node_labels(node: &mut GraphNode) {
    let width = node.bounds.width;
    let mut y = if node.children.is_empty() {
        let total: f64 = node.labels.iter().map(|l| l.bounds.height).sum();
        (node.bounds.height - total) / 2.0
    } else {
        LABEL_GAP
    };
    for label in &mut node.labels {
        label.bounds.x = (width - label.bounds.width) / 2.0;
        label.bounds.y = y;
        y += label.bounds.height;
    }
}

// =============================================================================
// ROUTING
// =============================================================================

/// Top-left corner of the node at `path` in root coordinates.
fn origin(root: &GraphNode, path: &[usize]) -> Point {
    let mut point = Point::default();
    let mut node = root;
    for &index in path {
        let Some(child) = node.children.get(index) else {
            break;
        };
        point.x += child.bounds.x;
        point.y += child.bounds.y;
        node = child;
    }
    point
}

fn anchor(root: &GraphNode, shape: &ShapeRef, direction: Direction, outgoing: bool) -> Option<Point> {
    let node = root.node_at(&shape.node)?;
    let o = origin(root, &shape.node);
    if let Some(index) = shape.port {
        let b = node.ports.get(index)?.bounds;
        return Some(Point::new(o.x + b.x + b.width / 2.0, o.y + b.y + b.height / 2.0));
    }
    let b = node.bounds;
    Some(match (direction, outgoing) {
        (Direction::Right, true) => Point::new(o.x + b.width, o.y + b.height / 2.0),
        (Direction::Right, false) => Point::new(o.x, o.y + b.height / 2.0),
        (Direction::Down, true) => Point::new(o.x + b.width / 2.0, o.y + b.height),
        (Direction::Down, false) => Point::new(o.x + b.width / 2.0, o.y),
    })
}

fn containers(node: &GraphNode, path: &mut Vec<usize>, out: &mut Vec<Vec<usize>>) {
    if !node.edges.is_empty() {
        out.push(path.clone());
    }
    for (index, child) in node.children.iter().enumerate() {
        path.push(index);
        containers(child, path, out);
        path.pop();
    }
}

fn route(root: &mut GraphNode, cancel: &CancelToken) -> Result<(), EngineError> {
    let mut paths = Vec::new();
    containers(root, &mut Vec::new(), &mut paths);

    for path in paths {
        cancel.check()?;
        let Some(container) = root.node_at(&path) else {
            continue;
        };
        let direction = Settings::read(&container.properties)?.direction;
        let offset = origin(root, &path);

        let mut routed = Vec::with_capacity(container.edges.len());
        for edge in &container.edges {
            let mut starts = Vec::new();
            for source in &edge.sources {
                let p = anchor(root, source, direction, true).ok_or_else(dangling)?;
                starts.push(Point::new(p.x - offset.x, p.y - offset.y));
            }
            let mut ends = Vec::new();
            for target in &edge.targets {
                let p = anchor(root, target, direction, false).ok_or_else(dangling)?;
                ends.push(Point::new(p.x - offset.x, p.y - offset.y));
            }
            routed.push(orthogonal_sections(&starts, &ends, direction));
        }

        let Some(container) = root.node_at_mut(&path) else {
            continue;
        };
        for (edge, (sections, junctions)) in container.edges.iter_mut().zip(routed) {
            edge.properties
                .retain(|key, _| !key_matches(key, properties::JUNCTION_POINTS));
            if !junctions.is_empty() {
                edge.properties
                    .insert(properties::JUNCTION_POINTS.to_owned(), PropertyValue::Points(junctions));
            }
            if let Some(first) = sections.first() {
                let mid = Point::new((first.start.x + first.end.x) / 2.0, (first.start.y + first.end.y) / 2.0);
                let mut y = mid.y - LABEL_GAP;
                for label in &mut edge.labels {
                    y -= label.bounds.height;
                    label.bounds.x = mid.x - label.bounds.width / 2.0;
                    label.bounds.y = y;
                }
            }
            edge.sections = sections;
        }
    }
    Ok(())
}

fn dangling() -> EngineError {
    EngineError::Invalid("Edge endpoint does not resolve.".into())
}

/// One section per (start, end) pair. Sections of a hyperedge share the same
/// turning coordinate, so a fan-out branches at a common point; those
/// branching points are returned as junction points.
fn orthogonal_sections(starts: &[Point], ends: &[Point], direction: Direction) -> (Vec<EdgeSection>, Vec<Point>) {
    let main = |p: &Point| match direction {
        Direction::Right => p.x,
        Direction::Down => p.y,
    };
    let cross = |p: &Point| match direction {
        Direction::Right => p.y,
        Direction::Down => p.x,
    };
    let at = |turn: f64, across: f64| match direction {
        Direction::Right => Point::new(turn, across),
        Direction::Down => Point::new(across, turn),
    };
    let shared_turn = (starts.len() > 1 || ends.len() > 1).then(|| {
        let from = starts.iter().map(main).fold(f64::MIN, f64::max);
        let to = ends.iter().map(main).fold(f64::MAX, f64::min);
        (from + to) / 2.0
    });

    let mut sections = Vec::with_capacity(starts.len() * ends.len());
    for start in starts {
        for end in ends {
            let turn = shared_turn.unwrap_or_else(|| (main(start) + main(end)) / 2.0);
            let bend_points = if cross(start) == cross(end) {
                Vec::new()
            } else {
                vec![at(turn, cross(start)), at(turn, cross(end))]
            };
            sections.push(EdgeSection { identifier: None, start: *start, bend_points, end: *end });
        }
    }

    let mut junctions = Vec::new();
    if let Some(turn) = shared_turn {
        let branches = |from: &Point, others: &[Point]| {
            others.iter().any(|o| cross(o) != cross(from)) && others.len() > 1
        };
        let points = starts
            .iter()
            .filter(|s| branches(*s, ends))
            .chain(ends.iter().filter(|e| branches(*e, starts)))
            .map(|p| at(turn, cross(p)));
        for point in points {
            if !junctions.contains(&point) {
                junctions.push(point);
            }
        }
    }
    (sections, junctions)
}

#[cfg(test)]
#[path = "engine_test.rs"]
mod tests;
