//! A small boolean-expression parser over terms with an optional
//! `field:term` prefix. Produces an AST that is evaluated against posting
//! lists directly: there is no text ever handed to an interpreter, so
//! there is nothing to inject.

use thiserror::Error;

use crate::analysis::stem;
use crate::document::Field;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    Term { field: Option<Field>, term: String },
    And(Vec<Query>),
    Or(Vec<Query>),
    Not(Box<Query>),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("empty query")]
    Empty,
    #[error("unexpected token: {0}")]
    UnexpectedToken(String),
    #[error("dangling NOT with no following term")]
    DanglingNot,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Term(Option<Field>, String),
    And,
    Or,
    Not,
}

fn lex(input: &str) -> Vec<Token> {
    input
        .split_whitespace()
        .filter_map(|word| match word.to_uppercase().as_str() {
            "AND" => Some(Token::And),
            "OR" => Some(Token::Or),
            "NOT" => Some(Token::Not),
            _ => {
                let (field, term) = split_field_prefix(word);
                if term.is_empty() {
                    None
                } else {
                    Some(Token::Term(field, stem(&term.to_lowercase())))
                }
            }
        })
        .collect()
}

fn split_field_prefix(word: &str) -> (Option<Field>, &str) {
    if let Some(rest) = word.strip_prefix("title:") {
        (Some(Field::Title), rest)
    } else if let Some(rest) = word.strip_prefix("body:") {
        (Some(Field::Body), rest)
    } else {
        (None, word)
    }
}

/// Parse a query string into a boolean AST. Bare terms separated by
/// whitespace are implicitly ANDed, matching the default "all these words"
/// expectation; explicit `AND`/`OR`/`NOT` tokens override that.
pub fn parse_query(input: &str) -> Result<Query, QueryError> {
    let tokens = lex(input);
    if tokens.is_empty() {
        return Err(QueryError::Empty);
    }
    let mut pos = 0;
    let expr = parse_or(&tokens, &mut pos)?;
    if pos != tokens.len() {
        return Err(QueryError::UnexpectedToken(format!("{:?}", tokens[pos])));
    }
    Ok(expr)
}

fn parse_or(tokens: &[Token], pos: &mut usize) -> Result<Query, QueryError> {
    let mut terms = vec![parse_and(tokens, pos)?];
    while matches!(tokens.get(*pos), Some(Token::Or)) {
        *pos += 1;
        terms.push(parse_and(tokens, pos)?);
    }
    Ok(if terms.len() == 1 {
        terms.remove(0)
    } else {
        Query::Or(terms)
    })
}

fn parse_and(tokens: &[Token], pos: &mut usize) -> Result<Query, QueryError> {
    let mut terms = vec![parse_unary(tokens, pos)?];
    loop {
        match tokens.get(*pos) {
            Some(Token::And) => {
                *pos += 1;
                terms.push(parse_unary(tokens, pos)?);
            }
            Some(Token::Term(..)) | Some(Token::Not) => {
                // implicit AND between adjacent terms
                terms.push(parse_unary(tokens, pos)?);
            }
            _ => break,
        }
    }
    Ok(if terms.len() == 1 {
        terms.remove(0)
    } else {
        Query::And(terms)
    })
}

fn parse_unary(tokens: &[Token], pos: &mut usize) -> Result<Query, QueryError> {
    match tokens.get(*pos) {
        Some(Token::Not) => {
            *pos += 1;
            let inner = parse_unary(tokens, pos).map_err(|_| QueryError::DanglingNot)?;
            Ok(Query::Not(Box::new(inner)))
        }
        Some(Token::Term(field, term)) => {
            *pos += 1;
            Ok(Query::Term {
                field: *field,
                term: term.clone(),
            })
        }
        other => Err(QueryError::UnexpectedToken(format!("{other:?}"))),
    }
}
