//! `elkt`: the keyword-based textual graph notation.
//!
//! ```text
//! graph root
//! algorithm: layered
//! node n1 {
//!     layout [ position: 0, 0 size: 30, 30 ]
//!     label "first"
//!     port p1
//! }
//! node n2
//! edge e1: n1.p1 -> n2 {
//!     layout [ section s1 [ start: 30, 15 end: 60, 15 bends: 45, 15 ] ]
//! }
//! ```
//!
//! DESIGN
//! ======
//! Hand-written lexer and recursive descent parser. The parser recovers from
//! errors by skipping the offending token, so a single decode reports every
//! problem it finds. Blocks nested deeper than `MAX_NESTING` are reported and
//! skipped without descending into them.
//!
//! Edge references are qualified identifiers resolved after the whole
//! document is read: relative to the node containing the edge first, then
//! each enclosing node up to the root. Unresolved names are reported with the
//! span of the reference. The writer emits the shortest name that resolves
//! back to the same element.

use std::fmt::Write as _;

use super::{CodecError, Diagnostic, GraphFormat, MAX_NESTING};
use crate::graph::identity;
use crate::graph::properties::{self, PropertyValue, format_float, format_points, key_matches, parse_points};
use crate::graph::{Bounds, EdgeSection, GraphEdge, GraphLabel, GraphNode, GraphPort, Point, Properties, ShapeRef};

const INDENT: &str = "    ";
const KEYWORDS: &[&str] = &["graph", "node", "port", "label", "edge", "layout"];

// =============================================================================
// LEXER
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Ident(String),
    Number(String),
    Str(String),
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Colon,
    Comma,
    Dot,
    Arrow,
    Pipe,
    Eof,
}

impl TokenKind {
    fn describe(&self) -> String {
        match self {
            Self::Ident(s) | Self::Number(s) => format!("'{s}'"),
            Self::Str(s) => format!("'\"{s}\"'"),
            Self::LBrace => "'{'".into(),
            Self::RBrace => "'}'".into(),
            Self::LBracket => "'['".into(),
            Self::RBracket => "']'".into(),
            Self::Colon => "':'".into(),
            Self::Comma => "','".into(),
            Self::Dot => "'.'".into(),
            Self::Arrow => "'->'".into(),
            Self::Pipe => "'|'".into(),
            Self::Eof => "end of input".into(),
        }
    }
}

/// 1-based line and column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Pos {
    line: u32,
    column: u32,
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    start: Pos,
    end: Pos,
}

struct Lexer {
    chars: Vec<char>,
    idx: usize,
    line: u32,
    column: u32,
}

impl Lexer {
    fn new(input: &str) -> Self {
        Self { chars: input.chars().collect(), idx: 0, line: 1, column: 1 }
    }

    fn pos(&self) -> Pos {
        Pos { line: self.line, column: self.column }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.idx).copied()
    }

    fn peek_next(&self) -> Option<char> {
        self.chars.get(self.idx + 1).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.idx += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn tokenize(mut self, errors: &mut Vec<Diagnostic>) -> Vec<Token> {
        let mut tokens = Vec::new();
        while let Some(c) = self.peek() {
            let start = self.pos();
            if c.is_whitespace() {
                self.bump();
                continue;
            }
            if c == '/' && self.peek_next() == Some('/') {
                while self.peek().is_some_and(|c| c != '\n') {
                    self.bump();
                }
                continue;
            }
            if c == '/' && self.peek_next() == Some('*') {
                self.skip_block_comment(start, errors);
                continue;
            }
            let kind = match c {
                '{' => self.single(TokenKind::LBrace),
                '}' => self.single(TokenKind::RBrace),
                '[' => self.single(TokenKind::LBracket),
                ']' => self.single(TokenKind::RBracket),
                ':' => self.single(TokenKind::Colon),
                ',' => self.single(TokenKind::Comma),
                '.' => self.single(TokenKind::Dot),
                '|' => self.single(TokenKind::Pipe),
                '-' if self.peek_next() == Some('>') => {
                    self.bump();
                    self.bump();
                    TokenKind::Arrow
                }
                '-' if self.peek_next().is_some_and(|n| n.is_ascii_digit()) => self.number(),
                '"' => match self.string() {
                    Some(s) => TokenKind::Str(s),
                    None => {
                        errors.push(span_diag("unterminated string literal", start, self.pos()));
                        continue;
                    }
                },
                c if c.is_ascii_digit() => self.number(),
                c if c.is_ascii_alphabetic() || c == '_' => self.ident(),
                other => {
                    self.bump();
                    errors.push(span_diag(format!("unexpected character '{other}'"), start, self.pos()));
                    continue;
                }
            };
            tokens.push(Token { kind, start, end: self.pos() });
        }
        let end = self.pos();
        tokens.push(Token { kind: TokenKind::Eof, start: end, end });
        tokens
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.bump();
        kind
    }

    fn skip_block_comment(&mut self, start: Pos, errors: &mut Vec<Diagnostic>) {
        self.bump();
        self.bump();
        loop {
            match self.bump() {
                Some('*') if self.peek() == Some('/') => {
                    self.bump();
                    return;
                }
                Some(_) => {}
                None => {
                    errors.push(span_diag("unterminated comment", start, self.pos()));
                    return;
                }
            }
        }
    }

    fn number(&mut self) -> TokenKind {
        let mut text = String::new();
        if self.peek() == Some('-') {
            text.push('-');
            self.bump();
        }
        while let Some(c) = self.peek() {
            let exponent_sign = (c == '+' || c == '-') && text.ends_with(['e', 'E']);
            if c.is_ascii_digit() || c == '.' || c == 'e' || c == 'E' || exponent_sign {
                // `1.` followed by a non-digit is a number followed by a dot.
                if c == '.' && !self.peek_next().is_some_and(|n| n.is_ascii_digit()) {
                    break;
                }
                text.push(c);
                self.bump();
            } else {
                break;
            }
        }
        TokenKind::Number(text)
    }

    fn ident(&mut self) -> TokenKind {
        let mut text = String::new();
        while let Some(c) = self.peek() {
            let hyphen = c == '-' && self.peek_next().is_some_and(|n| n.is_ascii_alphanumeric() || n == '_');
            if c.is_ascii_alphanumeric() || c == '_' || hyphen {
                text.push(c);
                self.bump();
            } else {
                break;
            }
        }
        TokenKind::Ident(text)
    }

    fn string(&mut self) -> Option<String> {
        self.bump();
        let mut out = String::new();
        loop {
            match self.bump()? {
                '"' => return Some(out),
                '\\' => match self.bump()? {
                    'n' => out.push('\n'),
                    't' => out.push('\t'),
                    'r' => out.push('\r'),
                    other => out.push(other),
                },
                c => out.push(c),
            }
        }
    }
}

fn span_diag(message: impl Into<String>, start: Pos, end: Pos) -> Diagnostic {
    Diagnostic::spanning(message, (start.line, start.column), (end.line, end.column))
}

// =============================================================================
// PARSER
// =============================================================================

struct PendingRef {
    name: Vec<String>,
    start: Pos,
    end: Pos,
}

/// An edge whose endpoints are resolved once the whole document is known.
struct PendingEdge {
    container: Vec<usize>,
    index: usize,
    sources: Vec<PendingRef>,
    targets: Vec<PendingRef>,
}

struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
    errors: Vec<Diagnostic>,
    pending: Vec<PendingEdge>,
    depth: usize,
}

/// Decode `elkt` text.
///
/// # Errors
///
/// Returns `CodecError::Malformed` carrying one ranged diagnostic per lexical,
/// syntactic or reference error.
pub fn decode(text: &str) -> Result<GraphNode, CodecError> {
    let mut errors = Vec::new();
    let tokens = Lexer::new(text).tokenize(&mut errors);

    let mut parser = Parser { tokens: &tokens, pos: 0, errors, pending: Vec::new(), depth: 0 };
    let mut root = GraphNode::default();
    parser.parse_document(&mut root);

    let Parser { mut errors, pending, .. } = parser;
    resolve_edges(&mut root, pending, &mut errors);

    if errors.is_empty() {
        Ok(root)
    } else {
        Err(CodecError::with_diagnostics(GraphFormat::Elkt, errors))
    }
}

impl<'t> Parser<'t> {
    fn peek(&self) -> &'t Token {
        let last = self.tokens.len() - 1;
        &self.tokens[self.pos.min(last)]
    }

    fn peek_at(&self, offset: usize) -> &'t Token {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.pos + offset).min(last)]
    }

    fn advance(&mut self) -> &'t Token {
        let token = self.peek();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn error_at(&mut self, token: &Token, message: impl Into<String>) {
        self.errors.push(span_diag(message, token.start, token.end));
    }

    fn unexpected(&mut self, expected: &str) {
        let token = self.peek();
        self.error_at(token, format!("mismatched input {} expecting {expected}", token.kind.describe()));
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if &self.peek().kind == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> bool {
        if self.eat(kind) {
            true
        } else {
            self.unexpected(&kind.describe());
            false
        }
    }

    /// Enter a `{ ... }` block whose brace `open` was just consumed. Past the
    /// nesting limit the block is reported and skipped; the caller must not
    /// parse its contents.
    fn enter_block(&mut self, open: &Token) -> bool {
        if self.depth >= MAX_NESTING {
            self.error_at(open, format!("Elements are nested deeper than {MAX_NESTING} levels."));
            self.skip_block();
            return false;
        }
        self.depth += 1;
        true
    }

    fn leave_block(&mut self) {
        self.depth -= 1;
    }

    /// Skip to the brace closing the current block.
    fn skip_block(&mut self) {
        let mut open = 1usize;
        loop {
            match &self.advance().kind {
                TokenKind::LBrace => open += 1,
                TokenKind::RBrace => {
                    open -= 1;
                    if open == 0 {
                        return;
                    }
                }
                TokenKind::Eof => return,
                _ => {}
            }
        }
    }

    fn peek_ident(&self) -> Option<&'t str> {
        match &self.peek().kind {
            TokenKind::Ident(s) => Some(s),
            _ => None,
        }
    }

    /// A keyword only introduces an element when it is not the start of an
    /// option key (`label: ...`, `port.side: ...`).
    fn at_keyword(&self, keyword: &str) -> bool {
        self.peek_ident() == Some(keyword)
            && !matches!(self.peek_at(1).kind, TokenKind::Colon | TokenKind::Dot)
    }

    /// An identifier followed by `:`, the optional `<id>:` prefix of labels and edges.
    fn take_labelled_id(&mut self) -> Option<String> {
        if let (TokenKind::Ident(id), TokenKind::Colon) = (&self.peek().kind, &self.peek_at(1).kind) {
            self.advance();
            self.advance();
            return Some(id.clone());
        }
        None
    }

    /// A bare identifier that is neither the next element's keyword nor the
    /// start of an option key.
    fn take_optional_id(&mut self) -> Option<String> {
        let id = self.peek_ident()?.to_owned();
        if KEYWORDS.iter().any(|k| self.at_keyword(k))
            || matches!(self.peek_at(1).kind, TokenKind::Colon | TokenKind::Dot)
        {
            return None;
        }
        self.advance();
        Some(id)
    }

    fn qualified_name(&mut self) -> Option<PendingRef> {
        let first = self.peek();
        let TokenKind::Ident(head) = &first.kind else {
            self.unexpected("an identifier");
            return None;
        };
        self.advance();
        let mut name = vec![head.clone()];
        let mut end = first.end;
        while self.peek().kind == TokenKind::Dot {
            self.advance();
            let segment = self.peek();
            let TokenKind::Ident(s) = &segment.kind else {
                self.unexpected("an identifier");
                return None;
            };
            self.advance();
            name.push(s.clone());
            end = segment.end;
        }
        Some(PendingRef { name, start: first.start, end })
    }

    fn number(&mut self) -> Option<f64> {
        let token = self.peek();
        if let TokenKind::Number(text) = &token.kind {
            self.advance();
            if let Ok(value) = text.parse::<f64>() {
                return Some(value);
            }
            self.error_at(token, format!("invalid number '{text}'"));
            return None;
        }
        self.unexpected("a number");
        None
    }

    fn pair(&mut self) -> Option<Point> {
        let x = self.number()?;
        if !self.expect(&TokenKind::Comma) {
            return None;
        }
        let y = self.number()?;
        Some(Point::new(x, y))
    }

    // -------------------------------------------------------------------------
    // Documents and nodes
    // -------------------------------------------------------------------------

    fn parse_document(&mut self, root: &mut GraphNode) {
        if self.at_keyword("graph") {
            self.advance();
            root.identifier = self.take_optional_id();
        }
        self.parse_node_items(root, &[], false);
    }

    fn parse_node_items(&mut self, node: &mut GraphNode, path: &[usize], braced: bool) {
        loop {
            match &self.peek().kind {
                TokenKind::Eof => {
                    if braced {
                        self.unexpected("'}'");
                    }
                    return;
                }
                TokenKind::RBrace if braced => {
                    self.advance();
                    return;
                }
                TokenKind::Ident(_) => {
                    if self.at_keyword("node") {
                        self.parse_node(node, path);
                    } else if self.at_keyword("port") {
                        let port = self.parse_port();
                        node.ports.push(port);
                    } else if self.at_keyword("label") {
                        let label = self.parse_label();
                        node.labels.push(label);
                    } else if self.at_keyword("edge") {
                        self.parse_edge(node, path);
                    } else if self.at_keyword("layout") {
                        self.parse_shape_layout(&mut node.bounds);
                    } else {
                        self.parse_property(&mut node.properties);
                    }
                }
                _ => {
                    self.unexpected("a graph element or option");
                    self.advance();
                }
            }
        }
    }

    fn parse_node(&mut self, parent: &mut GraphNode, parent_path: &[usize]) {
        self.advance();
        let mut node = GraphNode { identifier: self.take_optional_id(), ..GraphNode::default() };
        let mut path = parent_path.to_vec();
        path.push(parent.children.len());
        let open = self.peek();
        if self.eat(&TokenKind::LBrace) && self.enter_block(open) {
            self.parse_node_items(&mut node, &path, true);
            self.leave_block();
        }
        parent.children.push(node);
    }

    fn parse_port(&mut self) -> GraphPort {
        self.advance();
        let mut port = GraphPort { identifier: self.take_optional_id(), ..GraphPort::default() };
        self.parse_shape_body(&mut port.bounds, &mut port.properties, &mut port.labels);
        port
    }

    fn parse_label(&mut self) -> GraphLabel {
        self.advance();
        let mut label = GraphLabel { identifier: self.take_labelled_id(), ..GraphLabel::default() };
        match &self.peek().kind {
            TokenKind::Str(text) => {
                label.text.clone_from(text);
                self.advance();
            }
            _ => self.unexpected("a label text"),
        }
        self.parse_shape_body(&mut label.bounds, &mut label.properties, &mut label.labels);
        label
    }

    /// Optional `{ ... }` body of ports and labels.
    fn parse_shape_body(&mut self, bounds: &mut Bounds, props: &mut Properties, labels: &mut Vec<GraphLabel>) {
        let open = self.peek();
        if !self.eat(&TokenKind::LBrace) || !self.enter_block(open) {
            return;
        }
        loop {
            match &self.peek().kind {
                TokenKind::RBrace => {
                    self.advance();
                    break;
                }
                TokenKind::Eof => {
                    self.unexpected("'}'");
                    break;
                }
                TokenKind::Ident(_) => {
                    if self.at_keyword("layout") {
                        self.parse_shape_layout(bounds);
                    } else if self.at_keyword("label") {
                        labels.push(self.parse_label());
                    } else {
                        self.parse_property(props);
                    }
                }
                _ => {
                    self.unexpected("a label, layout or option");
                    self.advance();
                }
            }
        }
        self.leave_block();
    }

    /// `layout [ position: x, y size: w, h ]`
    fn parse_shape_layout(&mut self, bounds: &mut Bounds) {
        self.advance();
        if !self.expect(&TokenKind::LBracket) {
            return;
        }
        loop {
            match self.peek_ident() {
                Some("position") => {
                    self.advance();
                    self.expect(&TokenKind::Colon);
                    if let Some(p) = self.pair() {
                        bounds.x = p.x;
                        bounds.y = p.y;
                    }
                }
                Some("size") => {
                    self.advance();
                    self.expect(&TokenKind::Colon);
                    if let Some(p) = self.pair() {
                        bounds.width = p.x;
                        bounds.height = p.y;
                    }
                }
                _ => {
                    if self.eat(&TokenKind::RBracket) {
                        return;
                    }
                    self.unexpected("'position', 'size' or ']'");
                    if self.peek().kind == TokenKind::Eof {
                        return;
                    }
                    self.advance();
                }
            }
        }
    }

    fn parse_property(&mut self, props: &mut Properties) {
        let Some(key) = self.qualified_name() else {
            self.advance();
            return;
        };
        if !self.expect(&TokenKind::Colon) {
            return;
        }
        let key = key.name.join(".");
        let token = self.peek();
        let value = match &token.kind {
            TokenKind::Number(text) => {
                self.advance();
                number_value(text)
            }
            TokenKind::Str(text) => {
                self.advance();
                Some(PropertyValue::Text(text.clone()))
            }
            TokenKind::Ident(word) if word == "true" || word == "false" => {
                self.advance();
                Some(PropertyValue::Bool(word == "true"))
            }
            TokenKind::Ident(_) => self
                .qualified_name()
                .map(|name| PropertyValue::Text(name.name.join("."))),
            _ => {
                self.unexpected("an option value");
                None
            }
        };
        let Some(value) = value else {
            return;
        };
        let value = match value {
            PropertyValue::Text(raw) if key_matches(&key, properties::JUNCTION_POINTS) => {
                parse_points(&raw).map_or(PropertyValue::Text(raw), PropertyValue::Points)
            }
            other => other,
        };
        props.insert(key, value);
    }

    // -------------------------------------------------------------------------
    // Edges
    // -------------------------------------------------------------------------

    fn parse_edge(&mut self, container: &mut GraphNode, path: &[usize]) {
        self.advance();
        let mut edge = GraphEdge { identifier: self.take_labelled_id(), ..GraphEdge::default() };
        let sources = self.reference_list();
        self.expect(&TokenKind::Arrow);
        let targets = self.reference_list();

        if self.eat(&TokenKind::LBrace) {
            loop {
                match &self.peek().kind {
                    TokenKind::RBrace => {
                        self.advance();
                        break;
                    }
                    TokenKind::Eof => {
                        self.unexpected("'}'");
                        break;
                    }
                    TokenKind::Ident(_) => {
                        if self.at_keyword("layout") {
                            self.parse_edge_layout(&mut edge.sections);
                        } else if self.at_keyword("label") {
                            let label = self.parse_label();
                            edge.labels.push(label);
                        } else {
                            self.parse_property(&mut edge.properties);
                        }
                    }
                    _ => {
                        self.unexpected("a label, layout or option");
                        self.advance();
                    }
                }
            }
        }

        self.pending.push(PendingEdge {
            container: path.to_vec(),
            index: container.edges.len(),
            sources,
            targets,
        });
        container.edges.push(edge);
    }

    fn reference_list(&mut self) -> Vec<PendingRef> {
        let mut refs = Vec::new();
        if let Some(first) = self.qualified_name() {
            refs.push(first);
        }
        while self.eat(&TokenKind::Comma) {
            if let Some(next) = self.qualified_name() {
                refs.push(next);
            }
        }
        refs
    }

    /// `layout [ section <id>? [ ... ] ... ]`
    fn parse_edge_layout(&mut self, sections: &mut Vec<EdgeSection>) {
        self.advance();
        if !self.expect(&TokenKind::LBracket) {
            return;
        }
        loop {
            if self.eat(&TokenKind::RBracket) {
                return;
            }
            if self.peek_ident() == Some("section") {
                self.advance();
                sections.push(self.parse_section());
                continue;
            }
            self.unexpected("'section' or ']'");
            if self.peek().kind == TokenKind::Eof {
                return;
            }
            self.advance();
        }
    }

    fn parse_section(&mut self) -> EdgeSection {
        let mut section = EdgeSection::default();
        if self.peek().kind != TokenKind::LBracket {
            section.identifier = self.take_optional_id();
        }
        if !self.expect(&TokenKind::LBracket) {
            return section;
        }
        loop {
            match self.peek_ident() {
                Some(word @ ("start" | "end")) => {
                    self.advance();
                    self.expect(&TokenKind::Colon);
                    if let Some(p) = self.pair() {
                        if word == "start" {
                            section.start = p;
                        } else {
                            section.end = p;
                        }
                    }
                }
                Some("bends") => {
                    self.advance();
                    self.expect(&TokenKind::Colon);
                    section.bend_points.extend(self.pair());
                    while self.eat(&TokenKind::Pipe) {
                        section.bend_points.extend(self.pair());
                    }
                }
                Some("incoming" | "outgoing") => {
                    // Section connectivity is derived from the edge's endpoints.
                    self.advance();
                    self.expect(&TokenKind::Colon);
                    let _ = self.qualified_name();
                }
                _ => {
                    if self.eat(&TokenKind::RBracket) {
                        return section;
                    }
                    self.unexpected("'start', 'end', 'bends' or ']'");
                    if self.peek().kind == TokenKind::Eof {
                        return section;
                    }
                    self.advance();
                }
            }
        }
    }
}

fn number_value(text: &str) -> Option<PropertyValue> {
    if !text.contains(['.', 'e', 'E']) {
        if let Ok(i) = text.parse::<i64>() {
            return Some(PropertyValue::Int(i));
        }
    }
    text.parse::<f64>().ok().map(PropertyValue::Float)
}

fn resolve_edges(root: &mut GraphNode, pending: Vec<PendingEdge>, errors: &mut Vec<Diagnostic>) {
    for edge in pending {
        let mut resolve_all = |refs: &[PendingRef]| -> Vec<ShapeRef> {
            refs.iter()
                .filter_map(|r| {
                    let resolved = resolve_scoped(root, &edge.container, &r.name);
                    if resolved.is_none() {
                        errors.push(span_diag(
                            format!("Couldn't resolve reference to '{}'.", r.name.join(".")),
                            r.start,
                            r.end,
                        ));
                    }
                    resolved
                })
                .collect()
        };
        let sources = resolve_all(&edge.sources);
        let targets = resolve_all(&edge.targets);
        if let Some(target) = root
            .node_at_mut(&edge.container)
            .and_then(|n| n.edges.get_mut(edge.index))
        {
            target.sources = sources;
            target.targets = targets;
        }
    }
}

/// Resolve a name as seen from an edge in `container`: below the container
/// itself first, then below each enclosing node up to the root.
fn resolve_scoped<S: AsRef<str>>(root: &GraphNode, container: &[usize], name: &[S]) -> Option<ShapeRef> {
    (0..=container.len())
        .rev()
        .find_map(|depth| resolve_name(root, &container[..depth], name))
}

/// Resolve a qualified name below `scope`: node identifiers down the tree,
/// with the last segment optionally naming a port.
fn resolve_name<S: AsRef<str>>(root: &GraphNode, scope: &[usize], name: &[S]) -> Option<ShapeRef> {
    let mut path = scope.to_vec();
    let mut node = root.node_at(scope)?;
    for (i, segment) in name.iter().enumerate() {
        let segment = segment.as_ref();
        if let Some(index) = node
            .children
            .iter()
            .position(|c| c.identifier.as_deref() == Some(segment))
        {
            path.push(index);
            node = &node.children[index];
            continue;
        }
        if i + 1 == name.len() {
            let port = node
                .ports
                .iter()
                .position(|p| p.identifier.as_deref() == Some(segment))?;
            return Some(ShapeRef::port(path, port));
        }
        return None;
    }
    Some(ShapeRef::node(path))
}

// =============================================================================
// WRITER
// =============================================================================

/// Encode a graph as `elkt` text.
///
/// # Errors
///
/// Returns `CodecError::Internal` when an identifier or option key cannot be
/// written as an `elkt` identifier, or an edge references an element that has
/// no identifier chain.
pub fn encode(root: &GraphNode) -> Result<String, CodecError> {
    let mut writer = Writer { root, out: String::new() };
    // The default root id is implied by an anonymous root.
    if let Some(id) = root.identifier.as_deref().filter(|id| *id != identity::ROOT_ID) {
        writer.line(0, &format!("graph {}", ident(id)?));
    }
    writer.node_items(root, &[], 0)?;
    Ok(writer.out)
}

struct Writer<'g> {
    root: &'g GraphNode,
    out: String,
}

impl Writer<'_> {
    fn line(&mut self, depth: usize, text: &str) {
        for _ in 0..depth {
            self.out.push_str(INDENT);
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn node_items(&mut self, node: &GraphNode, path: &[usize], depth: usize) -> Result<(), CodecError> {
        self.layout(&node.bounds, depth);
        self.properties(&node.properties, depth)?;
        for label in &node.labels {
            self.label(label, depth)?;
        }
        for port in &node.ports {
            let head = match &port.identifier {
                Some(id) => format!("port {}", ident(id)?),
                None => "port".to_owned(),
            };
            self.shape_block(&head, &port.bounds, &port.properties, &port.labels, depth)?;
        }
        for (index, child) in node.children.iter().enumerate() {
            let head = match &child.identifier {
                Some(id) => format!("node {}", ident(id)?),
                None => "node".to_owned(),
            };
            if is_empty_node(child) {
                self.line(depth, &head);
            } else {
                self.line(depth, &format!("{head} {{"));
                let mut child_path = path.to_vec();
                child_path.push(index);
                self.node_items(child, &child_path, depth + 1)?;
                self.line(depth, "}");
            }
        }
        for edge in &node.edges {
            self.edge(edge, path, depth)?;
        }
        Ok(())
    }

    fn layout(&mut self, bounds: &Bounds, depth: usize) {
        let mut parts = Vec::new();
        if bounds.x != 0.0 || bounds.y != 0.0 {
            parts.push(format!("position: {}, {}", format_float(bounds.x), format_float(bounds.y)));
        }
        if bounds.width != 0.0 || bounds.height != 0.0 {
            parts.push(format!("size: {}, {}", format_float(bounds.width), format_float(bounds.height)));
        }
        if !parts.is_empty() {
            self.line(depth, &format!("layout [ {} ]", parts.join(" ")));
        }
    }

    fn properties(&mut self, props: &Properties, depth: usize) -> Result<(), CodecError> {
        for (key, value) in props {
            let key = qualified(key)?;
            let value = match value {
                PropertyValue::Bool(b) => b.to_string(),
                PropertyValue::Int(i) => i.to_string(),
                PropertyValue::Float(f) => format_float(*f),
                PropertyValue::Text(s) => quote(s),
                PropertyValue::Points(points) => quote(&format_points(points)),
            };
            self.line(depth, &format!("{key}: {value}"));
        }
        Ok(())
    }

    fn label(&mut self, label: &GraphLabel, depth: usize) -> Result<(), CodecError> {
        let head = match &label.identifier {
            Some(id) => format!("label {}: {}", ident(id)?, quote(&label.text)),
            None => format!("label {}", quote(&label.text)),
        };
        self.shape_block(&head, &label.bounds, &label.properties, &label.labels, depth)
    }

    fn shape_block(
        &mut self,
        head: &str,
        bounds: &Bounds,
        props: &Properties,
        labels: &[GraphLabel],
        depth: usize,
    ) -> Result<(), CodecError> {
        if *bounds == Bounds::default() && props.is_empty() && labels.is_empty() {
            self.line(depth, head);
            return Ok(());
        }
        self.line(depth, &format!("{head} {{"));
        self.layout(bounds, depth + 1);
        self.properties(props, depth + 1)?;
        for label in labels {
            self.label(label, depth + 1)?;
        }
        self.line(depth, "}");
        Ok(())
    }

    fn edge(&mut self, edge: &GraphEdge, container: &[usize], depth: usize) -> Result<(), CodecError> {
        let names = |refs: &[ShapeRef]| -> Result<String, CodecError> {
            refs.iter()
                .map(|r| reference_name(self.root, container, r))
                .collect::<Result<Vec<_>, _>>()
                .map(|names| names.join(", "))
        };
        let sources = names(&edge.sources)?;
        let targets = names(&edge.targets)?;
        let mut head = String::from("edge ");
        if let Some(id) = &edge.identifier {
            let _ = write!(head, "{}: ", ident(id)?);
        }
        let _ = write!(head, "{sources} -> {targets}");

        if edge.sections.is_empty() && edge.properties.is_empty() && edge.labels.is_empty() {
            self.line(depth, &head);
            return Ok(());
        }
        self.line(depth, &format!("{head} {{"));
        if !edge.sections.is_empty() {
            self.line(depth + 1, "layout [");
            for section in &edge.sections {
                let open = match &section.identifier {
                    Some(id) => format!("section {} [", ident(id)?),
                    None => "section [".to_owned(),
                };
                self.line(depth + 2, &open);
                self.line(depth + 3, &format!("start: {}", point(section.start)));
                self.line(depth + 3, &format!("end: {}", point(section.end)));
                if !section.bend_points.is_empty() {
                    let bends: Vec<String> = section.bend_points.iter().map(|p| point(*p)).collect();
                    self.line(depth + 3, &format!("bends: {}", bends.join(" | ")));
                }
                self.line(depth + 2, "]");
            }
            self.line(depth + 1, "]");
        }
        self.properties(&edge.properties, depth + 1)?;
        for label in &edge.labels {
            self.label(label, depth + 1)?;
        }
        self.line(depth, "}");
        Ok(())
    }
}

fn is_empty_node(node: &GraphNode) -> bool {
    node.bounds == Bounds::default()
        && node.properties.is_empty()
        && node.labels.is_empty()
        && node.ports.is_empty()
        && node.children.is_empty()
        && node.edges.is_empty()
}

fn point(p: Point) -> String {
    format!("{}, {}", format_float(p.x), format_float(p.y))
}

fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn is_ident(text: &str) -> bool {
    let mut chars = text.chars().peekable();
    let Some(first) = chars.next() else {
        return false;
    };
    if !(first.is_ascii_alphabetic() || first == '_') {
        return false;
    }
    while let Some(c) = chars.next() {
        let ok = c.is_ascii_alphanumeric()
            || c == '_'
            || (c == '-' && chars.peek().is_some_and(|n| n.is_ascii_alphanumeric() || *n == '_'));
        if !ok {
            return false;
        }
    }
    !matches!(text, "true" | "false")
}

fn ident(text: &str) -> Result<&str, CodecError> {
    if is_ident(text) && !KEYWORDS.contains(&text) {
        Ok(text)
    } else {
        Err(CodecError::internal(
            GraphFormat::Elkt,
            format!("identifier '{text}' cannot be written in elkt"),
        ))
    }
}

fn qualified(key: &str) -> Result<&str, CodecError> {
    if key.split('.').all(is_ident) {
        Ok(key)
    } else {
        Err(CodecError::internal(GraphFormat::Elkt, format!("option key '{key}' cannot be written in elkt")))
    }
}

/// Shortest qualified name of an endpoint that resolves back to it from an
/// edge in `container`.
fn reference_name(root: &GraphNode, container: &[usize], shape: &ShapeRef) -> Result<String, CodecError> {
    for depth in (0..=container.len()).rev() {
        let scope = &container[..depth];
        let Some(below) = shape.node.strip_prefix(scope) else {
            continue;
        };
        let Some(segments) = name_below(root, scope, below, shape.port)? else {
            continue;
        };
        if resolve_scoped(root, container, &segments).as_ref() == Some(shape) {
            return Ok(segments.join("."));
        }
    }
    Err(CodecError::internal(
        GraphFormat::Elkt,
        "edge references an element that has no unambiguous name from its edge",
    ))
}

/// Identifier segments leading from `scope` down `below` to a node or one of
/// its ports, or `None` when an element on the way is anonymous.
fn name_below<'g>(
    root: &'g GraphNode,
    scope: &[usize],
    below: &[usize],
    port: Option<usize>,
) -> Result<Option<Vec<&'g str>>, CodecError> {
    let Some(mut node) = root.node_at(scope) else {
        return Ok(None);
    };
    let mut segments = Vec::new();
    for &index in below {
        let Some(child) = node.children.get(index) else {
            return Ok(None);
        };
        let Some(id) = child.identifier.as_deref() else {
            return Ok(None);
        };
        segments.push(ident(id)?);
        node = child;
    }
    if let Some(index) = port {
        let Some(id) = node.ports.get(index).and_then(|p| p.identifier.as_deref()) else {
            return Ok(None);
        };
        segments.push(ident(id)?);
    }
    Ok((!segments.is_empty()).then_some(segments))
}

#[cfg(test)]
#[path = "elkt_test.rs"]
mod tests;
