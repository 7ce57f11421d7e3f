/*
    This module generates sentences
*/

use std::collections::HashMap;

use itertools::Itertools;
use rand::prelude::*;
use thiserror::Error;

use crate::error_handling::*;
use crate::grammar::*;

#[derive(Debug, PartialEq, Error)]
pub enum GenerateErrorType {
    // An undefined symbol was used
    #[error("No definition for symbol `{0}`")]
    UndefinedSymbol(String),
    // Every rule for the symbol loops back into itself or an undefined symbol
    #[error("`{0}` never derives a finite sentence")]
    UnproductiveSymbol(String),
}

impl ErrorType for GenerateErrorType {}

pub type GenerateError = Error<GenerateErrorType>;
pub type GenResult<T> = Result<T, GenerateError>;

// One token sequence per component of a symbol
pub type Yield = Vec<Vec<String>>;

const DEFAULT_MAX_DEPTH: usize = 12;

/// Generates random sentences from a grammar. Past the depth limit it only
/// picks the rules closest to a lexical rule, so generation always stops.
pub struct Generator<'g> {
    grammar: &'g Grammar,
    // Smallest derivation height of each rule, None when it never finishes
    rule_heights: Vec<Option<usize>>,
    max_depth: usize,
}

impl<'g> Generator<'g> {
    pub fn new(grammar: &'g Grammar) -> Self {
        Generator {
            grammar,
            rule_heights: rule_heights(grammar),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// A random sentence of the start symbol.
    pub fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> GenResult<Vec<String>> {
        let mut components = self.generate_symbol(self.grammar.start_symbol(), 0, rng)?;
        Ok(components.swap_remove(0))
    }

    /// A random yield of any symbol, one token sequence per component.
    pub fn generate_from<R: Rng + ?Sized>(&self, symbol: &str, rng: &mut R) -> GenResult<Yield> {
        self.generate_symbol(symbol, 0, rng)
    }

    fn generate_symbol<R: Rng + ?Sized>(&self, symbol: &str, depth: usize, rng: &mut R) -> GenResult<Yield> {
        let rule_ids = self.grammar.left_side_rule_ids(symbol);
        if rule_ids.is_empty() {
            return Err(GenerateError::new(GenerateErrorType::UndefinedSymbol(symbol.to_string()), symbol));
        }

        let productive = rule_ids.iter()
            .filter_map(|id| self.rule_heights[id.0].map(|height| (*id, height)))
            .collect_vec();

        let choice = if depth >= self.max_depth {
            productive.iter().min_by_key(|(_, height)| *height)
        } else {
            productive.choose(rng)
        };
        let (rule_id, _) = choice.ok_or_else(|| {
            GenerateError::new(GenerateErrorType::UnproductiveSymbol(symbol.to_string()), symbol)
        })?;

        self.generate_rule(self.grammar.rule(*rule_id), depth, rng)
    }

    fn generate_rule<R: Rng + ?Sized>(&self, rule: &Rule, depth: usize, rng: &mut R) -> GenResult<Yield> {
        let Some(left_side) = rule.left_side() else {
            return Ok(rule.tokens().iter().map(|token| vec![token.clone()]).collect());
        };

        // Right side variables are numbered in order, one per component
        let mut bound = Vec::new();
        for element in rule.right_side() {
            bound.extend(self.generate_symbol(element.symbol(), depth + 1, rng)?);
        }

        Ok(left_side.components()
            .iter()
            .map(|component| component.iter().flat_map(|variable| bound[variable.0].iter().cloned()).collect())
            .collect())
    }
}

// Lexical rules have height 1 and a composite rule is one taller than its
// tallest child, repeated until nothing gets shorter
fn rule_heights(grammar: &Grammar) -> Vec<Option<usize>> {
    let mut symbol_heights: HashMap<&str, usize> = HashMap::new();
    let mut heights = vec![None; grammar.rules().len()];

    let mut changed = true;
    while changed {
        changed = false;
        for (index, rule) in grammar.rules().iter().enumerate() {
            let height = rule.right_side()
                .iter()
                .map(|element| symbol_heights.get(element.symbol()).copied())
                .fold(Some(0), |tallest, child| Some(tallest?.max(child?)))
                .map(|tallest| tallest + 1);

            let Some(height) = height else { continue };
            if heights[index].map_or(true, |old| height < old) {
                heights[index] = Some(height);
                changed = true;
            }
            let best = symbol_heights.entry(rule.left_symbol()).or_insert(height);
            if height < *best {
                *best = height;
                changed = true;
            }
        }
    }

    heights
}

pub fn generate<R: Rng + ?Sized>(grammar: &Grammar, rng: &mut R) -> GenResult<Vec<String>> {
    Generator::new(grammar).generate(rng)
}

pub fn generate_from<R: Rng + ?Sized>(grammar: &Grammar, symbol: &str, rng: &mut R) -> GenResult<Yield> {
    Generator::new(grammar).generate_from(symbol, rng)
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;

    use super::*;
    use crate::chart::recognize;
    use crate::parser::parse_grammar;

    const CROSS_SERIAL: &str = "\
        S(xyzw) -> X(x, z) Y(y, w)\n\
        X(ux, vz) -> A(u) X(x, z) C(v)\n\
        X(u, v) -> A(u) C(v)\n\
        Y(uy, vw) -> B(u) Y(y, w) D(v)\n\
        Y(u, v) -> B(u) D(v)\n\
        A(a)\nB(b)\nC(c)\nD(d)";

    #[test]
    fn generate_only_sentence() {
        let grammar = parse_grammar("S(uv) -> NP(u) VP(v)\nNP(the)\nVP(barks)", None).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(generate(&grammar, &mut rng).unwrap(), vec!["the", "barks"]);
    }

    #[test]
    fn generated_sentences_parse() {
        let grammar = parse_grammar(CROSS_SERIAL, None).unwrap();
        let generator = Generator::new(&grammar).with_max_depth(6);
        let mut rng = StdRng::seed_from_u64(42);

        for _ in 0..20 {
            let sentence = generator.generate(&mut rng).unwrap();
            assert!(recognize(&grammar, &sentence), "{:?}", sentence);
        }
    }

    #[test]
    fn depth_limit_picks_shortest_rules() {
        let grammar = parse_grammar(CROSS_SERIAL, None).unwrap();
        let generator = Generator::new(&grammar).with_max_depth(0);
        let mut rng = StdRng::seed_from_u64(1);

        assert_eq!(generator.generate(&mut rng).unwrap(), vec!["a", "b", "c", "d"]);
        assert_eq!(
            generator.generate_from("X", &mut rng).unwrap(),
            vec![vec!["a".to_string()], vec!["c".to_string()]]
        );
    }

    #[test]
    fn recursive_only_symbols_are_unproductive() {
        let grammar = parse_grammar("S(uv) -> A(u) B(v)\nS(u) -> L(u)\nL(uv) -> L(u) L(v)\nA(a)", None).unwrap();
        let generator = Generator::new(&grammar);
        let mut rng = StdRng::seed_from_u64(3);

        let error = generator.generate(&mut rng).unwrap_err();
        assert_eq!(error.error, GenerateErrorType::UnproductiveSymbol("S".to_string()));

        let error = generator.generate_from("Q", &mut rng).unwrap_err();
        assert_eq!(error.error, GenerateErrorType::UndefinedSymbol("Q".to_string()));
    }
}
