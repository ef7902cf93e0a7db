//! Typed layout options attached to every graph element.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use super::Point;

/// Option key → value. Ordered so that every codec writes options deterministically.
pub type Properties = BTreeMap<String, PropertyValue>;

pub const ALGORITHM: &str = "org.eclipse.elk.algorithm";
pub const DIRECTION: &str = "org.eclipse.elk.direction";
pub const JUNCTION_POINTS: &str = "org.eclipse.elk.junctionPoints";
pub const PADDING: &str = "org.eclipse.elk.padding";
pub const SPACING_NODE_NODE: &str = "org.eclipse.elk.spacing.nodeNode";

/// A typed option value.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// An ordered coordinate sequence, e.g. junction points.
    Points(Vec<Point>),
}

impl PropertyValue {
    /// Type tag written by the tree serialization so values round-trip exactly.
    #[must_use]
    pub fn type_tag(&self) -> &'static str {
        match self {
            Self::Bool(_) => "boolean",
            Self::Int(_) => "int",
            Self::Float(_) => "double",
            Self::Text(_) => "string",
            Self::Points(_) => "points",
        }
    }

    /// Parse a raw value written under the given type tag.
    #[must_use]
    pub fn parse_typed(tag: &str, raw: &str) -> Option<Self> {
        match tag {
            "boolean" => raw.parse().ok().map(Self::Bool),
            "int" => raw.parse().ok().map(Self::Int),
            "double" => raw.parse().ok().map(Self::Float),
            "string" => Some(Self::Text(raw.to_owned())),
            "points" => parse_points(raw).map(Self::Points),
            _ => None,
        }
    }

    /// Raw string form, the inverse of [`PropertyValue::parse_typed`].
    #[must_use]
    pub fn to_raw(&self) -> String {
        match self {
            Self::Bool(b) => b.to_string(),
            Self::Int(i) => i.to_string(),
            Self::Float(f) => format_float(*f),
            Self::Text(s) => s.clone(),
            Self::Points(points) => format_points(points),
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            #[allow(clippy::cast_precision_loss)]
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_points(&self) -> Option<&[Point]> {
        match self {
            Self::Points(points) => Some(points),
            _ => None,
        }
    }
}

/// `true` when `key` names the option `full_id`, either verbatim or by a
/// dotted suffix (`junctionPoints`, `elk.junctionPoints`).
#[must_use]
pub fn key_matches(key: &str, full_id: &str) -> bool {
    key == full_id
        || full_id
            .strip_suffix(key)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

/// Look up an option by its full identifier, accepting suffix spellings.
#[must_use]
pub fn lookup<'a>(properties: &'a Properties, full_id: &str) -> Option<&'a PropertyValue> {
    properties.get(full_id).or_else(|| {
        properties
            .iter()
            .find(|(key, _)| key_matches(key, full_id))
            .map(|(_, value)| value)
    })
}

/// Float formatting that always reads back as a float (`30` → `30.0`).
#[must_use]
pub fn format_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}

/// `(x,y; x,y)`: the vector-chain notation.
#[must_use]
pub fn format_points(points: &[Point]) -> String {
    let mut out = String::from("(");
    for (i, p) in points.iter().enumerate() {
        if i > 0 {
            out.push_str("; ");
        }
        let _ = write!(out, "{},{}", format_float(p.x), format_float(p.y));
    }
    out.push(')');
    out
}

/// Parse the vector-chain notation. Surrounding parentheses are optional.
#[must_use]
pub fn parse_points(raw: &str) -> Option<Vec<Point>> {
    let trimmed = raw.trim();
    let inner = trimmed
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .unwrap_or(trimmed)
        .trim();
    if inner.is_empty() {
        return Some(Vec::new());
    }
    inner
        .split(';')
        .map(|pair| {
            let (x, y) = pair.split_once(',')?;
            Some(Point::new(x.trim().parse().ok()?, y.trim().parse().ok()?))
        })
        .collect()
}
