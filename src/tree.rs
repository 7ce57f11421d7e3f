/*
    Parse trees over discontinuous spans
*/

use std::fmt::Display;
use std::str::FromStr;

use thiserror::Error;

use crate::grammar::{render_spans, RuleElementInstance, Span};

#[derive(Debug, PartialEq, Error)]
pub enum TreeFormatError {
    #[error("No tree nodes found")]
    Empty,
    // Not `symbol (spans: [...])` with an even indent and a `--` marker
    #[error("Line {0} is not a tree node")]
    MalformedNode(usize),
    #[error("Line {0} is indented past its parent")]
    MissingParent(usize),
    #[error("Line {0} starts a second root")]
    SecondRoot(usize),
}

/// A node of a parse tree: a symbol, the spans it covers and its children.
/// Leaves come from lexical rules. Equality and hashing are structural.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParseTree {
    symbol: String,
    spans: Vec<Span>,
    children: Vec<ParseTree>,
}

impl ParseTree {
    pub fn new(symbol: impl Into<String>, spans: Vec<Span>, children: Vec<ParseTree>) -> Self {
        ParseTree { symbol: symbol.into(), spans, children }
    }

    pub fn leaf(symbol: impl Into<String>, spans: Vec<Span>) -> Self {
        ParseTree::new(symbol, spans, Vec::new())
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    pub fn children(&self) -> &[ParseTree] {
        &self.children
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn instance(&self) -> RuleElementInstance {
        RuleElementInstance::new(self.symbol.clone(), self.spans.clone())
    }

    /// Every node, parents before their children.
    pub fn nodes(&self) -> Box<dyn Iterator<Item = &ParseTree> + '_> {
        Box::new(std::iter::once(self).chain(self.children.iter().flat_map(ParseTree::nodes)))
    }

    /// One node per line as `symbol (spans: [...])`, each child two spaces
    /// deeper than its parent and marked with `--`.
    pub fn to_canonical_string(&self) -> String {
        let mut text = String::new();
        self.write_lines(0, &mut text);
        text
    }

    fn write_lines(&self, depth: usize, text: &mut String) {
        if depth > 0 {
            text.push_str(&" ".repeat(depth * 2));
            text.push_str("--");
        }
        text.push_str(&format!("{} (spans: {})\n", self.symbol, render_spans(&self.spans)));
        for child in &self.children {
            child.write_lines(depth + 1, text);
        }
    }
}

// Depth, symbol and spans of one line of a canonical string
fn parse_node(line: &str) -> Option<(usize, &str, Vec<Span>)> {
    let rest = line.trim_start_matches(' ');
    let indent = line.len() - rest.len();
    let (depth, rest) = match indent {
        0 => (0, rest),
        _ if indent % 2 == 0 => (indent / 2, rest.strip_prefix("--")?),
        _ => return None,
    };

    let (symbol, spans) = rest.trim_end().split_once(" (spans: [")?;
    let spans = spans.strip_suffix("])")?;
    if symbol.is_empty() {
        return None;
    }
    if spans.is_empty() {
        return Some((depth, symbol, Vec::new()));
    }

    let spans = spans.strip_prefix('(')?
        .strip_suffix(')')?
        .split("), (")
        .map(|pair| {
            let (start, end) = pair.split_once(", ")?;
            let (start, end) = (start.parse::<usize>().ok()?, end.parse::<usize>().ok()?);
            (start <= end).then(|| Span::new(start, end))
        })
        .collect::<Option<Vec<_>>>()?;
    Some((depth, symbol, spans))
}

// Attaches the finished nodes deeper than `depth` to their parents
fn close(open: &mut Vec<ParseTree>, depth: usize) -> Option<ParseTree> {
    while open.len() > depth {
        let node = open.pop()?;
        match open.last_mut() {
            Some(parent) => parent.children.push(node),
            None => return Some(node),
        }
    }
    None
}

/// Reads a tree back from its canonical string.
impl FromStr for ParseTree {
    type Err = TreeFormatError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let mut open: Vec<ParseTree> = Vec::new();
        let mut root = None;

        for (num, line) in text.lines().enumerate().filter(|(_, line)| !line.trim().is_empty()) {
            let (depth, symbol, spans) = parse_node(line).ok_or(TreeFormatError::MalformedNode(num + 1))?;
            if depth == 0 && (root.is_some() || !open.is_empty()) {
                return Err(TreeFormatError::SecondRoot(num + 1));
            }
            if depth > open.len() {
                return Err(TreeFormatError::MissingParent(num + 1));
            }
            root = root.or(close(&mut open, depth));
            open.push(ParseTree::leaf(symbol, spans));
        }

        root.or(close(&mut open, 0)).ok_or(TreeFormatError::Empty)
    }
}

impl Display for ParseTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_canonical_string())
    }
}
