/*
    Rules, the patterns they are made of and the span tuples they build
*/

use std::fmt::Display;
use std::hash::{Hash, Hasher};
use std::iter::zip;
use std::str::FromStr;

use itertools::Itertools;

use super::{GrammarError, GrammarErrorType};
use crate::parser;

/// A half-open range `[start, end)` of input positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        assert!(start <= end, "span start {} is past its end {}", start, end);
        Span { start, end }
    }

    /// The span covering the single token at `position`.
    pub fn token(position: usize) -> Self {
        Span { start: position, end: position + 1 }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Concatenates two spans, which only works if `other` starts where
    /// `self` ends.
    pub fn concat(self, other: Span) -> Option<Span> {
        (self.end == other.start).then_some(Span { start: self.start, end: other.end })
    }
}

impl From<(usize, usize)> for Span {
    fn from((start, end): (usize, usize)) -> Self {
        Span::new(start, end)
    }
}

impl Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.start, self.end)
    }
}

pub(crate) fn render_spans(spans: &[Span]) -> String {
    format!("[{}]", spans.iter().join(", "))
}

// A string variable, numbered by its position on the right side of its rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Variable(pub usize);

/// The variables concatenated into one component of a symbol.
pub type ComponentPattern = Vec<Variable>;

/// One occurrence of a nonterminal inside a rule, laid out as variables.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RuleElement {
    symbol: String,
    components: Vec<ComponentPattern>,
}

impl RuleElement {
    pub fn new(symbol: impl Into<String>, components: Vec<ComponentPattern>) -> Self {
        RuleElement { symbol: symbol.into(), components }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn components(&self) -> &[ComponentPattern] {
        &self.components
    }

    pub fn arity(&self) -> usize {
        self.components.len()
    }

    pub fn variables(&self) -> impl Iterator<Item = Variable> + '_ {
        self.components.iter().flatten().copied()
    }

    // `names` holds the name of every variable of the rule. Components whose
    // glued names would split differently are written with spaces instead
    fn render(&self, names: &[String], separator: &str) -> String {
        let components = self.components.iter()
            .map(|component| {
                let glued = component.iter().map(|v| variable_name(names, *v)).join("");
                if component.len() < 2 || parser::segment(&glued, names).as_ref() == Ok(component) {
                    glued
                } else {
                    component.iter().map(|v| variable_name(names, *v)).join(" ")
                }
            })
            .join(separator);
        format!("{}({})", self.symbol, components)
    }

    fn renumbered(&self, order: &[Variable]) -> RuleElement {
        let position = |v: &Variable| Variable(order.iter().position(|o| o == v).unwrap_or(v.0));
        RuleElement {
            symbol: self.symbol.clone(),
            components: self.components.iter()
                .map(|component| component.iter().map(position).collect())
                .collect(),
        }
    }
}

/// A symbol together with the concrete spans of each of its components.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RuleElementInstance {
    symbol: String,
    spans: Vec<Span>,
}

impl RuleElementInstance {
    pub fn new(symbol: impl Into<String>, spans: Vec<Span>) -> Self {
        RuleElementInstance { symbol: symbol.into(), spans }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    pub fn arity(&self) -> usize {
        self.spans.len()
    }
}

impl Display for RuleElementInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.symbol, self.spans.iter().join(", "))
    }
}

// Tokens that would not lex back as a single bare name are written in quotes
fn render_token(token: &str) -> String {
    let bare = !token.is_empty()
        && !token.starts_with("->")
        && !token.chars().any(|c| c.is_whitespace() || matches!(c, '(' | ')' | ',' | '"'));
    if bare { token.to_string() } else { format!("\"{}\"", token) }
}

fn variable_name(names: &[String], variable: Variable) -> String {
    names.get(variable.0).cloned().unwrap_or_else(|| default_variable_name(variable))
}

fn default_variable_name(variable: Variable) -> String {
    match variable.0 {
        n @ 0..=25 => char::from(b'a' + n as u8).to_string(),
        n => format!("v{}", n),
    }
}

/// A grammar rule. Lexical rules recognize literal tokens; composite rules
/// build their left side out of the spans of their right side.
#[derive(Debug, Clone)]
pub enum Rule {
    Lexical {
        symbol: String,
        tokens: Vec<String>,
    },
    Composite {
        left_side: RuleElement,
        right_side: Vec<RuleElement>,
        // Display names of the variables, indexed by `Variable`
        names: Vec<String>,
    },
}

impl Rule {
    /// Builds a lexical rule with one literal token per component.
    pub fn lexical(symbol: impl Into<String>, tokens: Vec<String>) -> Result<Rule, GrammarError> {
        let symbol = symbol.into();
        if tokens.is_empty() {
            let context = format!("{}()", symbol);
            return Err(GrammarError::new(GrammarErrorType::EmptyLexicalRule(symbol), context));
        }
        Ok(Rule::Lexical { symbol, tokens })
    }

    /// Builds a composite rule out of variable patterns. Variables are
    /// renumbered in the order they appear on the right side.
    pub fn new(left_side: RuleElement, right_side: Vec<RuleElement>) -> Result<Rule, GrammarError> {
        Rule::with_names(left_side, right_side, Vec::new())
    }

    pub(crate) fn with_names(left_side: RuleElement, right_side: Vec<RuleElement>, names: Vec<String>) -> Result<Rule, GrammarError> {
        let context = || {
            let count = std::iter::once(&left_side).chain(&right_side)
                .flat_map(RuleElement::variables)
                .map(|v| v.0 + 1)
                .max()
                .unwrap_or(0);
            let shown = (0..count).map(|i| variable_name(&names, Variable(i))).collect_vec();
            let right = right_side.iter().map(|element| element.render(&shown, ", ")).join(" ");
            format!("{} -> {}", left_side.render(&shown, ", "), right)
        };
        if right_side.is_empty() {
            return Err(GrammarError::new(GrammarErrorType::MissingRightSide(left_side.symbol.clone()), context()));
        }
        check_linearity(&left_side, &right_side, &names)
            .map_err(|error| GrammarError::new(error, context()))?;

        let order = right_side.iter().flat_map(RuleElement::variables).collect_vec();
        let names = order.iter().map(|v| variable_name(&names, *v)).collect();
        Ok(Rule::Composite {
            left_side: left_side.renumbered(&order),
            right_side: right_side.iter().map(|element| element.renumbered(&order)).collect(),
            names,
        })
    }

    /// Parses a rule written as `S(uv) -> NP(u) VP(v)` or, for lexical
    /// rules, `NP(the)`.
    pub fn parse_from_text(text: &str) -> Result<Rule, GrammarError> {
        text.parse()
    }

    pub fn left_symbol(&self) -> &str {
        match self {
            Rule::Lexical { symbol, .. } => symbol,
            Rule::Composite { left_side, .. } => &left_side.symbol,
        }
    }

    /// The arity of the symbol this rule defines.
    pub fn arity(&self) -> usize {
        match self {
            Rule::Lexical { tokens, .. } => tokens.len(),
            Rule::Composite { left_side, .. } => left_side.arity(),
        }
    }

    pub fn is_lexical(&self) -> bool {
        matches!(self, Rule::Lexical { .. })
    }

    pub fn left_side(&self) -> Option<&RuleElement> {
        match self {
            Rule::Lexical { .. } => None,
            Rule::Composite { left_side, .. } => Some(left_side),
        }
    }

    pub fn right_side(&self) -> &[RuleElement] {
        match self {
            Rule::Lexical { .. } => &[],
            Rule::Composite { right_side, .. } => right_side,
        }
    }

    pub fn tokens(&self) -> &[String] {
        match self {
            Rule::Lexical { tokens, .. } => tokens,
            Rule::Composite { .. } => &[],
        }
    }

    /// Builds the left side instance out of one instance per right side
    /// element, or `None` if the child spans do not line up.
    ///
    /// Panics if the children do not match the right side's symbols and
    /// arities, since that is a mistake on the caller's side.
    pub fn instantiate_left_side(&self, children: &[RuleElementInstance]) -> Option<RuleElementInstance> {
        for (pattern, child) in zip(self.right_side(), children) {
            assert_eq!(
                pattern.symbol, child.symbol,
                "instance `{}` does not match right side element `{}` of `{}`", child, pattern.symbol, self
            );
        }
        self.instantiate_spans(children.iter().map(RuleElementInstance::spans))
            .map(|spans| RuleElementInstance::new(self.left_symbol(), spans))
    }

    /// Binds every right side variable to the span of its component, then
    /// concatenates the bound spans of each left side component.
    pub fn instantiate_spans<'a>(&self, children: impl IntoIterator<Item = &'a [Span]>) -> Option<Vec<Span>> {
        let Rule::Composite { left_side, right_side, names } = self else {
            panic!("lexical rule `{}` has no right side to instantiate", self);
        };

        let mut bound = vec![Span::default(); names.len()];
        let mut children = children.into_iter();
        for pattern in right_side {
            let Some(spans) = children.next() else {
                panic!("`{}` needs {} children", self, right_side.len());
            };
            assert_eq!(
                pattern.arity(), spans.len(),
                "spans {} do not fit the arity of `{}` in `{}`", render_spans(spans), pattern.symbol, self
            );
            for (component, span) in zip(&pattern.components, spans) {
                for variable in component {
                    bound[variable.0] = *span;
                }
            }
        }
        assert!(children.next().is_none(), "`{}` needs {} children, got more", self, right_side.len());

        left_side.components.iter()
            .map(|component| {
                let (first, rest) = component.split_first()?;
                rest.iter().try_fold(bound[first.0], |span, variable| span.concat(bound[variable.0]))
            })
            .collect()
    }
}

// Every variable shows up exactly once on each side
fn check_linearity(left_side: &RuleElement, right_side: &[RuleElement], names: &[String]) -> Result<(), GrammarErrorType> {
    let name = |v: Variable| variable_name(names, v);

    for element in std::iter::once(left_side).chain(right_side) {
        if element.components.is_empty() || element.components.iter().any(Vec::is_empty) {
            return Err(GrammarErrorType::EmptyComponent(element.symbol.clone()));
        }
    }
    if let Some(element) = right_side.iter().find(|e| e.components.iter().any(|c| c.len() > 1)) {
        return Err(GrammarErrorType::CompoundRightComponent(element.symbol.clone()));
    }

    let right_variables = right_side.iter().flat_map(RuleElement::variables).collect_vec();
    if let Some(duplicate) = right_variables.iter().duplicates().next() {
        return Err(GrammarErrorType::DuplicatedVariable(name(*duplicate)));
    }
    let left_variables = left_side.variables().collect_vec();
    if let Some(duplicate) = left_variables.iter().duplicates().next() {
        return Err(GrammarErrorType::DuplicatedVariable(name(*duplicate)));
    }
    if let Some(unbound) = left_variables.iter().find(|v| !right_variables.contains(v)) {
        return Err(GrammarErrorType::UnboundVariable(name(*unbound)));
    }
    if let Some(dead) = right_variables.iter().find(|v| !left_variables.contains(v)) {
        return Err(GrammarErrorType::DeadVariable(name(*dead)));
    }
    Ok(())
}

impl PartialEq for Rule {
    // Variable names do not matter, only the shape of the rule
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Rule::Lexical { symbol: a, tokens: x }, Rule::Lexical { symbol: b, tokens: y }) => a == b && x == y,
            (
                Rule::Composite { left_side: l1, right_side: r1, .. },
                Rule::Composite { left_side: l2, right_side: r2, .. },
            ) => l1 == l2 && r1 == r2,
            _ => false,
        }
    }
}

impl Eq for Rule {}

impl Hash for Rule {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Rule::Lexical { symbol, tokens } => {
                symbol.hash(state);
                tokens.hash(state);
            }
            Rule::Composite { left_side, right_side, .. } => {
                left_side.hash(state);
                right_side.hash(state);
            }
        }
    }
}

impl Display for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rule::Lexical { symbol, tokens } => write!(f, "{}({})", symbol, tokens.iter().map(|t| render_token(t)).join(", ")),
            Rule::Composite { left_side, right_side, names } => {
                let right = right_side.iter().map(|element| element.render(names, ", ")).join(" ");
                write!(f, "{} -> {}", left_side.render(names, ", "), right)
            }
        }
    }
}

impl FromStr for Rule {
    type Err = GrammarError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        parser::parse_rule(text)
    }
}
