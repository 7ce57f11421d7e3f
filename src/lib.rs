//! Parsing with multiple context-free grammars, whose symbols may cover
//! several separate spans of the input at once.

pub mod chart;
pub mod error_handling;
pub mod generator;
pub mod grammar;
pub mod parser;
pub mod tree;

pub use chart::{parse, parse_all, recognize, ChartParser, Forest, ParseError};
pub use grammar::{Grammar, Rule, Span};
pub use tree::ParseTree;
