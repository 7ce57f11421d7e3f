/*
    This module fills charts bottom up from an agenda of new entries
*/

mod forest;

use std::collections::hash_map;
use std::collections::{HashMap, VecDeque};

use itertools::Itertools;
use thiserror::Error;
use tracing::{debug, trace};

use crate::grammar::*;
use crate::tree::ParseTree;
pub use forest::*;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ParseError {
    // The grammar and input are fine, they just do not fit together
    #[error("No parse found for the {length} input tokens")]
    NoParse { length: usize },
    // The caller's cap on agenda steps ran out before the chart was complete
    #[error("Gave up after {limit} agenda steps")]
    StepLimitExceeded { limit: usize },
}

/// Position of an entry inside its chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(pub usize);

/// One way of building an entry: a rule and the entries filling its right
/// side, in order. Lexical derivations have no children.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Derivation {
    rule: RuleId,
    children: Vec<EntryId>,
}

impl Derivation {
    pub fn rule(&self) -> RuleId {
        self.rule
    }

    pub fn children(&self) -> &[EntryId] {
        &self.children
    }
}

#[derive(Debug)]
pub struct Entry<'g> {
    symbol: &'g str,
    spans: Vec<Span>,
    derivations: Vec<Derivation>,
}

impl<'g> Entry<'g> {
    pub fn symbol(&self) -> &'g str {
        self.symbol
    }

    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    /// Every way this entry was built, in the order they were found. The
    /// first one only refers to entries created before this one.
    pub fn derivations(&self) -> &[Derivation] {
        &self.derivations
    }

    pub fn instance(&self) -> RuleElementInstance {
        RuleElementInstance::new(self.symbol, self.spans.clone())
    }
}

/// Every entry found for one input, keyed by symbol and spans.
#[derive(Debug)]
pub struct Chart<'g> {
    grammar: &'g Grammar,
    length: usize,
    entries: Vec<Entry<'g>>,
    keys: HashMap<(&'g str, Vec<Span>), EntryId>,
    // Entries taken off the agenda, by symbol
    propagated: HashMap<&'g str, Vec<EntryId>>,
    agenda: VecDeque<EntryId>,
    steps: usize,
}

impl<'g> Chart<'g> {
    fn new(grammar: &'g Grammar, length: usize) -> Self {
        Chart {
            grammar,
            length,
            entries: Vec::new(),
            keys: HashMap::new(),
            propagated: HashMap::new(),
            agenda: VecDeque::new(),
            steps: 0,
        }
    }

    pub fn grammar(&self) -> &'g Grammar {
        self.grammar
    }

    /// Number of input tokens the chart was built for.
    pub fn input_len(&self) -> usize {
        self.length
    }

    pub fn entries(&self) -> &[Entry<'g>] {
        &self.entries
    }

    pub fn entry(&self, id: EntryId) -> &Entry<'g> {
        &self.entries[id.0]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Agenda entries processed while filling the chart.
    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn find(&self, symbol: &str, spans: &[Span]) -> Option<EntryId> {
        let keys: &HashMap<(&str, Vec<Span>), EntryId> = &self.keys;
        keys.get(&(symbol, spans.to_vec())).copied()
    }

    /// The start symbol spanning the whole input, if it was found.
    pub fn goal(&self) -> Option<EntryId> {
        self.find(self.grammar.start_symbol(), &[Span::new(0, self.length)])
    }

    // Adds a derivation, creating and queueing its entry if it is new
    fn add(&mut self, symbol: &'g str, spans: Vec<Span>, derivation: Derivation) {
        match self.keys.entry((symbol, spans)) {
            hash_map::Entry::Occupied(found) => {
                self.entries[found.get().0].derivations.push(derivation);
            }
            hash_map::Entry::Vacant(slot) => {
                let id = EntryId(self.entries.len());
                let spans = slot.key().1.clone();
                trace!(symbol, spans = %render_spans(&spans), "new chart entry");
                slot.insert(id);
                self.entries.push(Entry { symbol, spans, derivations: vec![derivation] });
                self.agenda.push_back(id);
            }
        }
    }

    fn seed<T: AsRef<str>>(&mut self, tokens: &[T]) {
        let grammar = self.grammar;
        for (position, token) in tokens.iter().enumerate() {
            for &rule_id in grammar.lexical_rule_ids(token.as_ref()) {
                let rule = grammar.rule(rule_id);
                for spans in lexical_matches(rule.tokens(), tokens, position) {
                    self.add(rule.left_symbol(), spans, Derivation { rule: rule_id, children: Vec::new() });
                }
            }
        }
    }

    // Tries every rule using this entry's symbol, filling the other right
    // side positions with entries that were propagated already
    fn propagate(&mut self, id: EntryId) {
        let grammar = self.grammar;
        let symbol = self.entries[id.0].symbol;
        self.propagated.entry(symbol).or_default().push(id);

        let mut found = Vec::new();
        for &rule_id in grammar.right_side_rule_ids(symbol) {
            let rule = grammar.rule(rule_id);
            let right_side = rule.right_side();

            for position in right_side.iter().positions(|element| element.symbol() == symbol) {
                // Earlier positions never hold this entry, so a combination
                // is only built from the first position it takes
                let candidates = right_side.iter().enumerate()
                    .map(|(k, element)| {
                        if k == position {
                            return vec![id];
                        }
                        let ready = self.propagated.get(element.symbol()).map_or(&[][..], Vec::as_slice);
                        ready.iter().copied().filter(|&other| k > position || other != id).collect_vec()
                    })
                    .collect_vec();

                for children in candidates.into_iter().multi_cartesian_product() {
                    let spans = rule.instantiate_spans(children.iter().map(|child| self.entries[child.0].spans.as_slice()));
                    if let Some(spans) = spans {
                        found.push((rule.left_symbol(), spans, Derivation { rule: rule_id, children }));
                    }
                }
            }
        }

        for (symbol, spans, derivation) in found {
            self.add(symbol, spans, derivation);
        }
    }

    fn complete(&mut self, step_limit: Option<usize>) -> Result<(), ParseError> {
        while let Some(id) = self.agenda.pop_front() {
            if let Some(limit) = step_limit {
                if self.steps >= limit {
                    debug!(limit, entries = self.entries.len(), "agenda step limit reached");
                    return Err(ParseError::StepLimitExceeded { limit });
                }
            }
            self.steps += 1;
            self.propagate(id);
        }

        debug!(
            tokens = self.length,
            entries = self.entries.len(),
            steps = self.steps,
            "chart complete"
        );
        Ok(())
    }
}

// Every way of finding `rule_tokens` at increasing positions, with the first
// one at `position`
fn lexical_matches<T: AsRef<str>>(rule_tokens: &[String], tokens: &[T], position: usize) -> Vec<Vec<Span>> {
    let mut matches = vec![vec![Span::token(position)]];
    for rule_token in rule_tokens.iter().skip(1) {
        matches = matches.into_iter()
            .flat_map(|spans| {
                let after = spans.last().map_or(0, |span| span.end);
                (after..tokens.len())
                    .filter(|&i| tokens[i].as_ref() == rule_token.as_str())
                    .map(move |i| {
                        let mut extended = spans.clone();
                        extended.push(Span::token(i));
                        extended
                    })
            })
            .collect();
    }
    matches
}

/// Parses with one grammar, optionally giving up after a number of agenda
/// steps. Each call builds its own chart, so one parser (or grammar) can be
/// shared between threads.
#[derive(Debug, Clone, Copy)]
pub struct ChartParser<'g> {
    grammar: &'g Grammar,
    step_limit: Option<usize>,
}

impl<'g> ChartParser<'g> {
    pub fn new(grammar: &'g Grammar) -> Self {
        ChartParser { grammar, step_limit: None }
    }

    pub fn with_step_limit(mut self, limit: usize) -> Self {
        self.step_limit = Some(limit);
        self
    }

    /// Fills a chart for `tokens`. Only fails when the step limit runs out.
    pub fn chart<T: AsRef<str>>(&self, tokens: &[T]) -> Result<Chart<'g>, ParseError> {
        let mut chart = Chart::new(self.grammar, tokens.len());
        chart.seed(tokens);
        chart.complete(self.step_limit)?;
        Ok(chart)
    }

    pub fn recognize<T: AsRef<str>>(&self, tokens: &[T]) -> Result<bool, ParseError> {
        Ok(self.chart(tokens)?.goal().is_some())
    }

    pub fn parse<T: AsRef<str>>(&self, tokens: &[T]) -> Result<ParseTree, ParseError> {
        Ok(self.parse_all(tokens)?.first_tree())
    }

    /// Every parse of `tokens`, extracted lazily from the chart.
    pub fn parse_all<T: AsRef<str>>(&self, tokens: &[T]) -> Result<Forest<'g>, ParseError> {
        Forest::new(self.chart(tokens)?)
    }
}

pub fn recognize<T: AsRef<str>>(grammar: &Grammar, tokens: &[T]) -> bool {
    ChartParser::new(grammar).recognize(tokens).unwrap_or(false)
}

pub fn parse<T: AsRef<str>>(grammar: &Grammar, tokens: &[T]) -> Result<ParseTree, ParseError> {
    ChartParser::new(grammar).parse(tokens)
}

pub fn parse_all<'g, T: AsRef<str>>(grammar: &'g Grammar, tokens: &[T]) -> Result<Forest<'g>, ParseError> {
    ChartParser::new(grammar).parse_all(tokens)
}
