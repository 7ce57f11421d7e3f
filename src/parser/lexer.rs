use itertools::{Itertools, PeekingNext};

use super::{GrammarErrorType, Result};

#[derive(PartialEq, Debug)]
pub enum Token {
    OpenParen,
    CloseParen,
    Comma,
    Arrow,
    // A symbol, a run of variables or a bare literal token
    Name(String),
    // A literal token written in quotes, so it may hold any character
    Quoted(String)
}

// Characters that end a bare name
fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || matches!(c, '(' | ')' | ',' | '"')
}

pub fn lex_quoted(line: &mut impl PeekingNext<Item = char>) -> Result<Token> {
    line.next(); // Consume open quote
    let token_text = line.peeking_take_while(|&c| c != '\"').collect();

    // Check if there is a close quote and consume it if there is
    if line.next() != Some('\"') {
        return Err(GrammarErrorType::UnmatchedQuote);
    }

    Ok(Token::Quoted(token_text))
}

pub fn lex_name(first: char, line: &mut impl PeekingNext<Item = char>) -> Token {
    let mut name = String::from(first);
    name.extend(line.peeking_take_while(|&c| !is_delimiter(c)));
    Token::Name(name)
}

pub fn lex_line(line: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();

    let mut line_chars = line.chars().peekable();

    while let Some(&c) = line_chars.peek() {
        match c {
            '(' => {
                line_chars.next();
                tokens.push(Token::OpenParen);
            }
            ')' => {
                line_chars.next();
                tokens.push(Token::CloseParen);
            }
            ',' => {
                line_chars.next();
                tokens.push(Token::Comma);
            }
            '\"' => tokens.push(lex_quoted(&mut line_chars)?),
            c if c.is_whitespace() => {
                line_chars.next();
            }
            '-' => {
                line_chars.next();
                if line_chars.next_if_eq(&'>').is_some() {
                    tokens.push(Token::Arrow);
                } else {
                    tokens.push(lex_name('-', &mut line_chars));
                }
            }
            _ => {
                line_chars.next();
                tokens.push(lex_name(c, &mut line_chars));
            }
        }
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use std::iter::zip;

    use super::*;

    fn name(text: &str) -> Token {
        Token::Name(text.to_string())
    }

    #[test]
    fn lex_normal_quoted() {
        let lines = vec![
            "\"alpha\" bravo",
            "\",\")",
            "\"\""
        ];
        // (result from the function, rest of the iterator)
        let answers = vec![
            (Token::Quoted("alpha".to_string()), " bravo"),
            (Token::Quoted(",".to_string()), ")"),
            (Token::Quoted("".to_string()), "")
        ];

        for (line, (answer_token, answer_rest)) in zip(lines, answers) {
            let mut chars = line.chars().peekable();
            assert_eq!(lex_quoted(&mut chars).unwrap(), answer_token);
            assert_eq!(chars.collect::<String>(), answer_rest);
        }
    }

    #[test]
    fn lex_mismatched_quoted() {
        for line in ["\"welcome", "\"alpha, bravo)"] {
            let mut chars = line.chars().peekable();
            assert_eq!(lex_quoted(&mut chars).unwrap_err(), GrammarErrorType::UnmatchedQuote);
        }
    }

    #[test]
    fn lex_normal_name() {
        let lines = vec![
            ("w1u, x1v)", 'A'),
            ("P(u)", 'V'),
            ("ark", 'b')
        ];
        let answers = vec![
            (name("Aw1u"), ", x1v)"),
            (name("VP"), "(u)"),
            (name("bark"), "")
        ];

        for ((line, first), (answer_token, answer_rest)) in zip(lines, answers) {
            let mut chars = line.chars().peekable();
            assert_eq!(lex_name(first, &mut chars), answer_token);
            assert_eq!(chars.collect::<String>(), answer_rest);
        }
    }

    #[test]
    fn lex_normal_line() {
        let lines = vec![
            "S(uv) -> NP(u) VP(v)",
            "S(uv)->NP(u) VP(v)",
            "Punct(\",\", -)"
        ];
        let answers = vec![
            vec![
                name("S"), Token::OpenParen, name("uv"), Token::CloseParen,
                Token::Arrow,
                name("NP"), Token::OpenParen, name("u"), Token::CloseParen,
                name("VP"), Token::OpenParen, name("v"), Token::CloseParen
            ],
            vec![
                name("S"), Token::OpenParen, name("uv"), Token::CloseParen,
                Token::Arrow,
                name("NP"), Token::OpenParen, name("u"), Token::CloseParen,
                name("VP"), Token::OpenParen, name("v"), Token::CloseParen
            ],
            vec![
                name("Punct"), Token::OpenParen,
                Token::Quoted(",".to_string()), Token::Comma, name("-"),
                Token::CloseParen
            ]
        ];

        for (line, answer) in zip(lines, answers) {
            assert_eq!(lex_line(line).unwrap(), answer)
        }
    }
}
