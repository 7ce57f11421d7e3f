/*
    This module is for storing and indexing grammars
*/

mod rule;

use std::collections::HashMap;

use itertools::Itertools;
use thiserror::Error;
use tracing::{debug, warn};

use crate::error_handling::*;
pub use rule::*;

#[derive(Debug, Error)]
pub enum GrammarErrorType {
    // A rule does not start with a symbol
    #[error("Expected a symbol")]
    MissingSymbol,
    // A symbol is not followed by its components
    #[error("Expected `(` after `{0}`")]
    MissingOpenParen(String),
    #[error("Unclosed `(` after `{0}`")]
    UnclosedParen(String),
    // There is an unclosed quote
    #[error("Unmatched quotes")]
    UnmatchedQuote,
    #[error("Unexpected `{0}`")]
    UnexpectedToken(String),
    // An arrow with nothing after it
    #[error("No right side for `{0}`")]
    MissingRightSide(String),
    #[error("Empty component in `{0}`")]
    EmptyComponent(String),
    #[error("Right side components of `{0}` must be a single variable")]
    CompoundRightComponent(String),
    #[error("Components of lexical rule `{0}` must be a single token")]
    CompoundToken(String),
    // A left side component splits into right side variables in several ways
    #[error("Component `{0}` can be split into variables in more than one way")]
    AmbiguousComponent(String),
    #[error("Variable `{0}` is used more than once")]
    DuplicatedVariable(String),
    #[error("Variable `{0}` is not bound on the right side")]
    UnboundVariable(String),
    #[error("Variable `{0}` is never used on the left side")]
    DeadVariable(String),
    #[error("Lexical rule for `{0}` has no tokens")]
    EmptyLexicalRule(String),
    #[error("Grammar has no rules")]
    EmptyGrammar,
    #[error("No rule defines the start symbol `{0}`")]
    UndefinedStartSymbol(String),
    #[error("Start symbol `{symbol}` has arity {arity}, expected 1")]
    StartSymbolArity { symbol: String, arity: usize },
    #[error("`{symbol}` is used with arity {found}, but elsewhere with arity {expected}")]
    ArityMismatch { symbol: String, expected: usize, found: usize },
    // There was an issue with reading a file
    #[error("File error: {0}")]
    FileError(std::io::Error),
}

impl ErrorType for GrammarErrorType {}

impl PartialEq for GrammarErrorType {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (GrammarErrorType::FileError(a), GrammarErrorType::FileError(b)) => a.kind() == b.kind(),
            _ => std::mem::discriminant(self) == std::mem::discriminant(other)
                && self.to_string() == other.to_string(),
        }
    }
}

pub type GrammarError = Error<GrammarErrorType>;
pub type GrammarErrors = Errors<GrammarErrorType>;

/// Position of a rule inside its grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleId(pub usize);

/// Records the arity of every symbol `rule` mentions, failing on the first
/// symbol that disagrees with what was recorded before.
pub(crate) fn record_arities(rule: &Rule, arities: &mut HashMap<String, usize>) -> Result<(), GrammarErrorType> {
    let uses = std::iter::once((rule.left_symbol(), rule.arity()))
        .chain(rule.right_side().iter().map(|element| (element.symbol(), element.arity())));

    for (symbol, found) in uses {
        let expected = *arities.entry(symbol.to_string()).or_insert(found);
        if expected != found {
            return Err(GrammarErrorType::ArityMismatch { symbol: symbol.to_string(), expected, found });
        }
    }
    Ok(())
}

/// A validated set of rules plus a start symbol. Immutable once built, so
/// one grammar can back any number of parses at once.
#[derive(Debug, Clone)]
pub struct Grammar {
    start_symbol: String,
    rules: Vec<Rule>,
    arities: HashMap<String, usize>,
    by_left_symbol: HashMap<String, Vec<RuleId>>,
    by_right_symbol: HashMap<String, Vec<RuleId>>,
    by_first_token: HashMap<String, Vec<RuleId>>,
}

impl Grammar {
    pub fn new(rules: Vec<Rule>, start_symbol: impl Into<String>) -> Result<Grammar, GrammarError> {
        let start_symbol = start_symbol.into();
        if rules.is_empty() {
            return Err(GrammarError::new(GrammarErrorType::EmptyGrammar, ""));
        }

        let rules = rules.into_iter().unique().collect_vec();

        let mut arities = HashMap::new();
        for rule in &rules {
            record_arities(rule, &mut arities)
                .map_err(|error| GrammarError::new(error, rule.to_string()))?;
        }

        if !rules.iter().any(|rule| rule.left_symbol() == start_symbol) {
            return Err(GrammarError::new(GrammarErrorType::UndefinedStartSymbol(start_symbol), ""));
        }
        match arities.get(&start_symbol) {
            Some(1) => {}
            arity => {
                let arity = arity.copied().unwrap_or_default();
                return Err(GrammarError::new(GrammarErrorType::StartSymbolArity { symbol: start_symbol, arity }, ""));
            }
        }

        let mut by_left_symbol: HashMap<String, Vec<RuleId>> = HashMap::new();
        let mut by_right_symbol: HashMap<String, Vec<RuleId>> = HashMap::new();
        let mut by_first_token: HashMap<String, Vec<RuleId>> = HashMap::new();
        for (index, rule) in rules.iter().enumerate() {
            let id = RuleId(index);
            by_left_symbol.entry(rule.left_symbol().to_string()).or_default().push(id);
            for symbol in rule.right_side().iter().map(RuleElement::symbol).unique() {
                by_right_symbol.entry(symbol.to_string()).or_default().push(id);
            }
            if let Some(token) = rule.tokens().first() {
                by_first_token.entry(token.clone()).or_default().push(id);
            }
        }

        for symbol in by_right_symbol.keys().filter(|s| !by_left_symbol.contains_key(*s)).sorted() {
            warn!(symbol = %symbol, "symbol is used but never defined, rules using it will never fire");
        }
        debug!(rules = rules.len(), symbols = arities.len(), start = %start_symbol, "built grammar");

        Ok(Grammar {
            start_symbol,
            rules,
            arities,
            by_left_symbol,
            by_right_symbol,
            by_first_token,
        })
    }

    pub fn start_symbol(&self) -> &str {
        &self.start_symbol
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn rule(&self, id: RuleId) -> &Rule {
        &self.rules[id.0]
    }

    pub fn arity(&self, symbol: &str) -> Option<usize> {
        self.arities.get(symbol).copied()
    }

    /// Rules mentioning `symbol` on their right side, in declaration order.
    pub fn rules_with_right_side_symbol(&self, symbol: &str) -> impl Iterator<Item = &Rule> + '_ {
        self.right_side_rule_ids(symbol).iter().map(|id| self.rule(*id))
    }

    pub fn rules_with_left_side_symbol(&self, symbol: &str) -> impl Iterator<Item = &Rule> + '_ {
        self.left_side_rule_ids(symbol).iter().map(|id| self.rule(*id))
    }

    /// Lexical rules whose first component is the literal `token`. For the
    /// usual single-token lexical rules, these are the rules matching `token`.
    pub fn lexical_rules_for_token(&self, token: &str) -> impl Iterator<Item = &Rule> + '_ {
        self.lexical_rule_ids(token).iter().map(|id| self.rule(*id))
    }

    pub(crate) fn right_side_rule_ids(&self, symbol: &str) -> &[RuleId] {
        self.by_right_symbol.get(symbol).map_or(&[][..], Vec::as_slice)
    }

    pub(crate) fn left_side_rule_ids(&self, symbol: &str) -> &[RuleId] {
        self.by_left_symbol.get(symbol).map_or(&[][..], Vec::as_slice)
    }

    pub(crate) fn lexical_rule_ids(&self, token: &str) -> &[RuleId] {
        self.by_first_token.get(token).map_or(&[][..], Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use std::iter::zip;

    use super::*;

    fn rules(lines: &[&str]) -> Vec<Rule> {
        lines.iter().map(|line| line.parse().unwrap()).collect()
    }

    #[test]
    fn build_grammar() {
        let grammar = Grammar::new(rules(&[
            "S(uv) -> NP(u) VP(v)",
            "VP(uv) -> V(u) NP(v)",
            "NP(the)",
            "V(saw)"
        ]), "S").unwrap();

        assert_eq!(grammar.start_symbol(), "S");
        assert_eq!(grammar.rules().len(), 4);
        assert_eq!(grammar.arity("VP"), Some(1));
        assert_eq!(grammar.arity("Nope"), None);
    }

    #[test]
    fn lookup_by_symbol_and_token() {
        let grammar = Grammar::new(rules(&[
            "S(uv) -> NP(u) VP(v)",
            "VP(uv) -> V(u) NP(v)",
            "S(u) -> VP(u)",
            "NP(the)",
            "V(saw)",
            "NP(saw)"
        ]), "S").unwrap();

        let with_np = grammar.rules_with_right_side_symbol("NP").map(Rule::to_string).collect_vec();
        assert_eq!(with_np, vec!["S(uv) -> NP(u) VP(v)", "VP(uv) -> V(u) NP(v)"]);

        let with_vp = grammar.rules_with_right_side_symbol("VP").map(Rule::to_string).collect_vec();
        assert_eq!(with_vp, vec!["S(uv) -> NP(u) VP(v)", "S(u) -> VP(u)"]);

        let for_saw = grammar.lexical_rules_for_token("saw").map(Rule::to_string).collect_vec();
        assert_eq!(for_saw, vec!["V(saw)", "NP(saw)"]);

        assert_eq!(grammar.lexical_rules_for_token("dog").count(), 0);
        assert_eq!(grammar.rules_with_left_side_symbol("S").count(), 2);
    }

    #[test]
    fn repeated_symbol_is_indexed_once() {
        let grammar = Grammar::new(rules(&["S(uv) -> A(u) A(v)", "A(a)"]), "S").unwrap();
        assert_eq!(grammar.rules_with_right_side_symbol("A").count(), 1);
    }

    #[test]
    fn duplicate_rules_collapse() {
        let grammar = Grammar::new(rules(&[
            "S(uv) -> NP(u) VP(v)",
            "NP(the)",
            "S(xy) -> NP(x) VP(y)"
        ]), "S").unwrap();
        assert_eq!(grammar.rules().len(), 2);
    }

    #[test]
    fn malformed_grammars() {
        let grammars = vec![
            (rules(&[]), "S"),
            (rules(&["S(uv) -> NP(u) VP(v)", "NP(the)"]), "T"),
            (rules(&["S(u, v) -> NP(u) VP(v)", "NP(the)"]), "S"),
            (rules(&["S(uv) -> NP(u) VP(v)", "NP(the, dog)"]), "S")
        ];
        let answers = vec![
            GrammarErrorType::EmptyGrammar,
            GrammarErrorType::UndefinedStartSymbol("T".to_string()),
            GrammarErrorType::StartSymbolArity { symbol: "S".to_string(), arity: 2 },
            GrammarErrorType::ArityMismatch { symbol: "NP".to_string(), expected: 1, found: 2 }
        ];

        for ((rules, start), answer) in zip(grammars, answers) {
            assert_eq!(Grammar::new(rules, start).unwrap_err().error, answer);
        }
    }

    #[test]
    fn arity_errors_name_the_rule() {
        let error = Grammar::new(rules(&["S(uv) -> NP(u) VP(v)", "NP(the, dog)"]), "S").unwrap_err();
        assert_eq!(error.context, "NP(the, dog)");
    }
}
