/*
    This module parses rule text and grammar files
*/

mod lexer;
mod verifier;

use std::fs::File;
use std::io::BufRead;
use std::path::{Path, PathBuf};

use itertools::Itertools;
use tracing::debug;

use crate::error_handling::*;
use crate::grammar::*;
use lexer::Token;
use verifier::verify_rules;

pub type Result<T> = std::result::Result<T, GrammarErrorType>;
pub type LineResult<T> = std::result::Result<T, GrammarError>;
pub type FileResult<T> = std::result::Result<T, GrammarErrors>;

// One piece of a component, before we know whether it is a variable run or
// a literal token
#[derive(PartialEq, Debug)]
enum Piece {
    Name(String),
    Quoted(String)
}

#[derive(PartialEq, Debug)]
struct RawElement {
    symbol: String,
    components: Vec<Vec<Piece>>
}

fn io_error(error: std::io::Error, file: &Path) -> GrammarError {
    GrammarError::new(GrammarErrorType::FileError(error), "")
        .at(Location::in_file(file.to_path_buf(), 0))
}

// Parses `Symbol(piece piece, piece, ...)` off the front of `tokens`
fn parse_element<'a>(tokens: &mut impl Iterator<Item = &'a Token>) -> Result<RawElement> {
    let symbol = match tokens.next() {
        Some(Token::Name(s)) => s.clone(),
        Some(Token::Quoted(s)) => return Err(GrammarErrorType::UnexpectedToken(format!("\"{}\"", s))),
        _ => return Err(GrammarErrorType::MissingSymbol)
    };

    if tokens.next() != Some(&Token::OpenParen) {
        return Err(GrammarErrorType::MissingOpenParen(symbol));
    }

    let mut components = Vec::new();
    let mut current = Vec::new();
    loop {
        match tokens.next() {
            Some(Token::Name(s)) => current.push(Piece::Name(s.clone())),
            Some(Token::Quoted(s)) => current.push(Piece::Quoted(s.clone())),
            Some(Token::Comma) => components.push(std::mem::take(&mut current)),
            Some(Token::CloseParen) => {
                // `Symbol()` has no components at all rather than one empty one
                if !current.is_empty() || !components.is_empty() {
                    components.push(current);
                }
                break;
            }
            Some(Token::OpenParen) => return Err(GrammarErrorType::UnexpectedToken("(".to_string())),
            Some(Token::Arrow) | None => return Err(GrammarErrorType::UnclosedParen(symbol))
        }
    }

    Ok(RawElement { symbol, components })
}

fn lexical_rule(element: RawElement) -> Result<Rule> {
    if element.components.is_empty() {
        return Err(GrammarErrorType::EmptyLexicalRule(element.symbol));
    }

    let tokens = element.components.into_iter()
        .map(|component| match <[Piece; 1]>::try_from(component) {
            Ok([Piece::Name(t)]) | Ok([Piece::Quoted(t)]) if !t.is_empty() => Ok(t),
            Ok(_) => Err(GrammarErrorType::EmptyComponent(element.symbol.clone())),
            Err(pieces) if pieces.is_empty() => Err(GrammarErrorType::EmptyComponent(element.symbol.clone())),
            Err(_) => Err(GrammarErrorType::CompoundToken(element.symbol.clone()))
        })
        .collect::<Result<Vec<_>>>()?;

    Rule::lexical(element.symbol, tokens).map_err(|e| e.error)
}

// Splits a run of concatenated variable names like `w1u` into variables,
// insisting on exactly one way of doing so
pub(crate) fn segment(text: &str, names: &[String]) -> Result<Vec<Variable>> {
    let length = text.len();
    // ways[i] counts (up to 2) the splits of text[i..], next[i] is the first
    // variable of one of them
    let mut ways = vec![0u8; length + 1];
    let mut next = vec![None; length + 1];
    ways[length] = 1;

    for start in (0..length).rev().filter(|&i| text.is_char_boundary(i)) {
        for (index, name) in names.iter().enumerate() {
            if !text[start..].starts_with(name.as_str()) {
                continue;
            }
            let end = start + name.len();
            if ways[end] > 0 {
                next[start].get_or_insert((Variable(index), end));
                ways[start] = (ways[start] + ways[end]).min(2);
            }
        }
    }

    match ways[0] {
        0 => Err(GrammarErrorType::UnboundVariable(unsplittable_rest(text, names).to_string())),
        1 => {
            let mut variables = Vec::new();
            let mut position = 0;
            while let Some((variable, end)) = next[position] {
                variables.push(variable);
                position = end;
            }
            Ok(variables)
        }
        _ => Err(GrammarErrorType::AmbiguousComponent(text.to_string()))
    }
}

// The text after the longest prefix that still splits into variables
fn unsplittable_rest<'a>(text: &'a str, names: &[String]) -> &'a str {
    let mut reachable = vec![false; text.len() + 1];
    reachable[0] = true;

    for start in 0..text.len() {
        if !reachable[start] {
            continue;
        }
        for name in names.iter().filter(|name| text[start..].starts_with(name.as_str())) {
            reachable[start + name.len()] = true;
        }
    }

    let stuck = (0..text.len()).rev().find(|&i| reachable[i]).unwrap_or(0);
    &text[stuck..]
}

fn composite_rule(left: RawElement, right: Vec<RawElement>) -> Result<Rule> {
    if right.is_empty() {
        return Err(GrammarErrorType::MissingRightSide(left.symbol));
    }

    // Right side variables are numbered in the order they appear
    let mut names: Vec<String> = Vec::new();
    let mut right_side = Vec::new();
    for element in right {
        let mut components = Vec::new();
        for component in element.components {
            let name = match <[Piece; 1]>::try_from(component) {
                Ok([Piece::Name(name)]) => name,
                Ok([Piece::Quoted(token)]) => return Err(GrammarErrorType::UnexpectedToken(format!("\"{}\"", token))),
                Err(pieces) if pieces.is_empty() => return Err(GrammarErrorType::EmptyComponent(element.symbol)),
                Err(_) => return Err(GrammarErrorType::CompoundRightComponent(element.symbol))
            };
            if names.contains(&name) {
                return Err(GrammarErrorType::DuplicatedVariable(name));
            }
            components.push(vec![Variable(names.len())]);
            names.push(name);
        }
        right_side.push(RuleElement::new(element.symbol, components));
    }

    let mut left_components = Vec::new();
    for component in left.components {
        if component.is_empty() {
            return Err(GrammarErrorType::EmptyComponent(left.symbol));
        }
        let mut variables = Vec::new();
        for piece in component {
            match piece {
                Piece::Name(text) => variables.extend(segment(&text, &names)?),
                Piece::Quoted(token) => return Err(GrammarErrorType::UnexpectedToken(format!("\"{}\"", token)))
            }
        }
        left_components.push(variables);
    }

    Rule::with_names(RuleElement::new(left.symbol, left_components), right_side, names)
        .map_err(|e| e.error)
}

fn parse_line(tokens: &[Token]) -> Result<Rule> {
    let mut tokens = tokens.iter().peekable();
    let left = parse_element(&mut tokens)?;

    match tokens.next() {
        None => lexical_rule(left),
        Some(Token::Arrow) => {
            let mut right = Vec::new();
            while tokens.peek().is_some() {
                right.push(parse_element(&mut tokens)?);
            }
            composite_rule(left, right)
        }
        Some(Token::Name(s)) | Some(Token::Quoted(s)) => Err(GrammarErrorType::UnexpectedToken(s.clone())),
        Some(Token::Comma) => Err(GrammarErrorType::UnexpectedToken(",".to_string())),
        Some(Token::OpenParen) => Err(GrammarErrorType::UnexpectedToken("(".to_string())),
        Some(Token::CloseParen) => Err(GrammarErrorType::UnexpectedToken(")".to_string()))
    }
}

/// Parses a single rule, keeping the text around in the error.
pub fn parse_rule(text: &str) -> LineResult<Rule> {
    lexer::lex_line(text)
        .and_then(|lexed_line| parse_line(&lexed_line))
        .map_err(|error| GrammarError::new(error, text.trim()))
}

fn is_rule_line(line: &String) -> bool {
    let line = line.trim();
    !line.is_empty() && !line.starts_with(';') && !line.starts_with('#')
}

// Returns an iterator over the lines of a file, with the io errors wrapped
// in GrammarError and enumerated
fn file_line_nums<'a>(file: File, path: &'a Path) -> impl Iterator<Item = (usize, LineResult<String>)> + 'a {
    std::io::BufReader::new(file)
        .lines()
        .map(move |line| line.map_err(|e| io_error(e, path)))
        .enumerate()
        .filter(|(_, line)| line.as_ref().is_ok_and(is_rule_line) || line.is_err())
        .map(|(num, line)| (num + 1, line))
}

fn grammar_from_rules(rule_list: Vec<(Rule, Location)>, start: Option<&str>, file: &Path) -> FileResult<Grammar> {
    verify_rules(&rule_list)?;

    let start_symbol = match (start, rule_list.first()) {
        (Some(start), _) => start.to_string(),
        (None, Some((rule, _))) => rule.left_symbol().to_string(),
        (None, None) => String::new()
    };

    let rules = rule_list.into_iter().map(|(rule, _)| rule).collect_vec();
    Grammar::new(rules, start_symbol)
        .map_err(|error| vec![error.at(Location::in_file(file.to_path_buf(), 0))])
}

fn parse_lines(lines: impl Iterator<Item = (usize, LineResult<String>)>, start: Option<&str>, file: &Path) -> FileResult<Grammar> {
    let parsed_lines = lines.map(|(num, line_res)| {
        let location = Location::in_file(file.to_path_buf(), num);
        line_res.and_then(|line| parse_rule(&line).map_err(|error| error.at(location.clone())))
            .map(|rule| (rule, location))
    });

    let (rules, errors): (Vec<_>, Vec<_>) = parsed_lines.partition_result();
    if !errors.is_empty() {
        return Err(errors);
    }
    debug!(file = %file.display(), rules = rules.len(), "parsed grammar rules");

    grammar_from_rules(rules, start, file)
}

/// Builds a grammar out of rule text, one rule per line. The start symbol
/// defaults to the left side of the first rule.
pub fn parse_grammar(text: &str, start: Option<&str>) -> FileResult<Grammar> {
    let lines = text.lines()
        .map(str::to_string)
        .enumerate()
        .filter(|(_, line)| is_rule_line(line))
        .map(|(num, line)| (num + 1, Ok(line)));

    parse_lines(lines, start, Path::new(""))
}

pub fn parse_file(path: &PathBuf, start: Option<&str>) -> FileResult<Grammar> {
    let file = File::open(path).map_err(|e| vec![io_error(e, path)])?;
    parse_lines(file_line_nums(file, path), start, path)
}

#[cfg(test)]
mod tests {
    use std::iter::zip;

    use super::*;

    fn parse_text(text: &str) -> Result<Rule> {
        parse_rule(text).map_err(|e| e.error)
    }

    fn name(text: &str) -> Piece {
        Piece::Name(text.to_string())
    }

    #[test]
    fn parse_normal_element() {
        let lines = vec!["NP(u)", "B(w1, x1)", "S(w1 u, x1v)", "Pair(\",\", b)"];
        let answers = vec![
            RawElement { symbol: "NP".to_string(), components: vec![vec![name("u")]] },
            RawElement { symbol: "B".to_string(), components: vec![vec![name("w1")], vec![name("x1")]] },
            RawElement { symbol: "S".to_string(), components: vec![vec![name("w1"), name("u")], vec![name("x1v")]] },
            RawElement {
                symbol: "Pair".to_string(),
                components: vec![vec![Piece::Quoted(",".to_string())], vec![name("b")]]
            }
        ];

        for (line, answer) in zip(lines, answers) {
            let lexed = lexer::lex_line(line).unwrap();
            assert_eq!(parse_element(&mut lexed.iter()).unwrap(), answer);
        }
    }

    #[test]
    fn parse_normal_rules() {
        let lines = vec![
            "S(uv) -> NP(u) VP(v)",
            "S(uv)->NP(u) VP(v)",
            "  A(w1u, x1v) -> B(w1, x1) C(u, v)  ",
            "A(w1 u, x1 v) -> B(w1, x1) C(u, v)",
            "NP(the)"
        ];
        let answers = vec![
            "S(uv) -> NP(u) VP(v)",
            "S(uv) -> NP(u) VP(v)",
            "A(w1u, x1v) -> B(w1, x1) C(u, v)",
            "A(w1u, x1v) -> B(w1, x1) C(u, v)",
            "NP(the)"
        ];

        for (line, answer) in zip(lines, answers) {
            assert_eq!(parse_text(line).unwrap().to_string(), answer);
        }
    }

    #[test]
    fn segment_components() {
        let names = vec!["w1".to_string(), "u".to_string(), "w".to_string(), "1u".to_string()];

        assert_eq!(segment("uw1", &names[..2]), Ok(vec![Variable(1), Variable(0)]));
        assert_eq!(segment("w1u", &names), Err(GrammarErrorType::AmbiguousComponent("w1u".to_string())));
        assert_eq!(segment("x", &names), Err(GrammarErrorType::UnboundVariable("x".to_string())));
        assert_eq!(segment("w1uxw", &names), Err(GrammarErrorType::UnboundVariable("xw".to_string())));
        assert_eq!(segment("uw1v", &names), Err(GrammarErrorType::UnboundVariable("v".to_string())));
    }

    #[test]
    fn parse_malformed_rules() {
        let lines = vec![
            "(u) -> A(u)",
            "S uv -> A(u)",
            "S(u -> A(u)",
            "S(u) ->",
            "S(u) A(u)",
            "S(u) -> A(u) A(u)",
            "S(uv) -> A(u)",
            "S(u) -> A(u) B(v)",
            "S(uv) -> A(u v)",
            "S(u) -> A(\"u\")",
            "S(,u) -> A(u)",
            "NP()",
            "NP(the dog)",
            "NP(\"the)",
            "S(uvw) -> A(u) B(v) C(uv) D(w)",
            "S(uu) -> A(u)"
        ];
        let answers = vec![
            GrammarErrorType::MissingSymbol,
            GrammarErrorType::MissingOpenParen("S".to_string()),
            GrammarErrorType::UnclosedParen("S".to_string()),
            GrammarErrorType::MissingRightSide("S".to_string()),
            GrammarErrorType::UnexpectedToken("A".to_string()),
            GrammarErrorType::DuplicatedVariable("u".to_string()),
            GrammarErrorType::UnboundVariable("v".to_string()),
            GrammarErrorType::DeadVariable("v".to_string()),
            GrammarErrorType::CompoundRightComponent("A".to_string()),
            GrammarErrorType::UnexpectedToken("\"u\"".to_string()),
            GrammarErrorType::EmptyComponent("S".to_string()),
            GrammarErrorType::EmptyLexicalRule("NP".to_string()),
            GrammarErrorType::CompoundToken("NP".to_string()),
            GrammarErrorType::UnmatchedQuote,
            GrammarErrorType::AmbiguousComponent("uvw".to_string()),
            GrammarErrorType::DuplicatedVariable("u".to_string())
        ];

        for (line, answer) in zip(lines, answers) {
            assert_eq!(parse_text(line), Err(answer), "{}", line);
        }
    }

    #[test]
    fn errors_keep_rule_text() {
        let error = parse_rule(" S(u) -> A(u) B(v) ").unwrap_err();
        assert_eq!(error.context, "S(u) -> A(u) B(v)");
        assert_eq!(error.to_string(), "[<rule>]  Variable `v` is never used on the left side in `S(u) -> A(u) B(v)`");
    }

    #[test]
    fn parse_normal_text() {
        let grammar = parse_grammar("\
            ; a tiny grammar\n\
            S(uv) -> NP(u) VP(v)\n\
            \n\
            NP(the)\n\
            # comments either way\n\
            VP(barks)\n", None).unwrap();

        assert_eq!(grammar.start_symbol(), "S");
        assert_eq!(grammar.rules().iter().map(Rule::to_string).collect_vec(), vec![
            "S(uv) -> NP(u) VP(v)",
            "NP(the)",
            "VP(barks)"
        ]);
    }

    #[test]
    fn parse_text_with_start_override() {
        let grammar = parse_grammar("NP(the)\nS(uv) -> NP(u) VP(v)\nVP(barks)", Some("S")).unwrap();
        assert_eq!(grammar.start_symbol(), "S");
    }

    #[test]
    fn parse_normal_file() {
        let example_path = PathBuf::from("grammars/english.mcfg");
        let grammar = parse_file(&example_path, None).unwrap();

        assert_eq!(grammar.start_symbol(), "S");
        assert_eq!(grammar.arity("NP"), Some(1));
        assert_eq!(grammar.arity("VPwh"), Some(2));
        assert_eq!(grammar.lexical_rules_for_token("greyhound").map(Rule::to_string).collect_vec(), vec!["N(greyhound)"]);
    }

    #[test]
    fn parse_malformed_file() {
        let example_path = PathBuf::from("grammars/malformed.mcfg");
        let errors = parse_file(&example_path, None).unwrap_err();

        assert_eq!(errors, vec![
            GrammarError {
                location: Location::in_file(example_path.clone(), 3),
                context: "S(uv) -> NP(u) NP(u)".to_string(),
                error: GrammarErrorType::DuplicatedVariable("u".to_string())
            },
            GrammarError {
                location: Location::in_file(example_path, 6),
                context: "VP(u v".to_string(),
                error: GrammarErrorType::UnclosedParen("VP".to_string())
            }
        ]);
    }

    #[test]
    fn inconsistent_arities_point_at_lines() {
        let errors = parse_grammar("S(uv) -> A(u) B(v)\nA(a)\nB(b, c)\nA(x, y)", None).unwrap_err();

        assert_eq!(errors.iter().map(|e| e.location.line).collect_vec(), vec![3, 4]);
        assert_eq!(errors[0].error, GrammarErrorType::ArityMismatch { symbol: "B".to_string(), expected: 1, found: 2 });
    }

    #[test]
    fn missing_file() {
        let errors = parse_file(&PathBuf::from("grammars/does_not_exist.mcfg"), None).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].error, GrammarErrorType::FileError(std::io::ErrorKind::NotFound.into()));
    }

    #[test]
    fn empty_grammar_text() {
        let errors = parse_grammar("; nothing here\n", None).unwrap_err();
        assert_eq!(errors[0].error, GrammarErrorType::EmptyGrammar);
    }
}
