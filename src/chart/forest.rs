use std::iter;

use super::{Chart, EntryId, ParseError};
use crate::tree::ParseTree;

/// A finished chart that reached the goal, holding every parse at once.
#[derive(Debug)]
pub struct Forest<'g> {
    chart: Chart<'g>,
    goal: EntryId,
}

impl<'g> Forest<'g> {
    pub fn new(chart: Chart<'g>) -> Result<Self, ParseError> {
        let goal = chart.goal().ok_or(ParseError::NoParse { length: chart.input_len() })?;
        Ok(Forest { chart, goal })
    }

    pub fn chart(&self) -> &Chart<'g> {
        &self.chart
    }

    pub fn goal(&self) -> EntryId {
        self.goal
    }

    /// The tree made of every entry's first derivation.
    pub fn first_tree(&self) -> ParseTree {
        first_tree(&self.chart, self.goal)
    }

    /// Every tree in the forest, built one at a time. Derivations leading
    /// back to an entry already on the way down are skipped, so the
    /// sequence is finite even for grammars with unary cycles.
    pub fn trees(&self) -> Trees<'_> {
        Trees { inner: entry_trees(&self.chart, self.goal, Vec::new()) }
    }
}

impl<'a, 'g> IntoIterator for &'a Forest<'g> {
    type Item = ParseTree;
    type IntoIter = Trees<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.trees()
    }
}

pub struct Trees<'a> {
    inner: Box<dyn Iterator<Item = ParseTree> + 'a>,
}

impl Iterator for Trees<'_> {
    type Item = ParseTree;

    fn next(&mut self) -> Option<ParseTree> {
        self.inner.next()
    }
}

// First derivations only point at older entries, so this always bottoms out
fn first_tree(chart: &Chart<'_>, id: EntryId) -> ParseTree {
    let entry = chart.entry(id);
    let children = entry.derivations()
        .first()
        .map(|derivation| derivation.children().iter().map(|child| first_tree(chart, *child)).collect())
        .unwrap_or_default();
    ParseTree::new(entry.symbol(), entry.spans().to_vec(), children)
}

fn entry_trees<'a, 'g: 'a>(chart: &'a Chart<'g>, id: EntryId, mut path: Vec<EntryId>) -> Box<dyn Iterator<Item = ParseTree> + 'a> {
    let entry = chart.entry(id);
    path.push(id);
    let blocked = path.clone();

    Box::new(entry.derivations()
        .iter()
        .filter(move |derivation| derivation.children().iter().all(|child| !blocked.contains(child)))
        .flat_map(move |derivation| {
            child_trees(chart, derivation.children(), path.clone())
                .map(move |children| ParseTree::new(entry.symbol(), entry.spans().to_vec(), children))
        }))
}

// The product of the children's trees, restarting the later children's
// sequences for every tree of the first
fn child_trees<'a, 'g: 'a>(chart: &'a Chart<'g>, children: &'a [EntryId], path: Vec<EntryId>) -> Box<dyn Iterator<Item = Vec<ParseTree>> + 'a> {
    match children.split_first() {
        None => Box::new(iter::once(Vec::new())),
        Some((first, rest)) => Box::new(entry_trees(chart, *first, path.clone()).flat_map(move |head| {
            child_trees(chart, rest, path.clone()).map(move |mut tail| {
                tail.insert(0, head.clone());
                tail
            })
        })),
    }
}
