//! Pest parser for the attribute micro-syntaxes (`d`, `points`, `transform`)

use glam::{DVec2, dvec2};
use pest::iterators::Pair;
use pest_derive::Parser;
use thiserror::Error;

#[derive(Parser)]
#[grammar = "drawing/svg.pest"]
pub struct SvgAttrParser;

/// An attribute value that does not follow its micro-syntax
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SyntaxError {
    #[error("{0}")]
    Grammar(String),

    #[error("`{command}` expects arguments in groups of {arity}, got {count}")]
    ArgumentCount {
        command: char,
        arity: usize,
        count: usize,
    },

    #[error("{name}() takes {expected} arguments, got {count}")]
    TransformArity {
        name: String,
        expected: &'static str,
        count: usize,
    },

    #[error("number out of range: {0}")]
    Number(String),
}

impl From<pest::error::Error<Rule>> for SyntaxError {
    fn from(err: pest::error::Error<Rule>) -> Self {
        // pest renders a multi-line excerpt; the first line is enough inside a
        // miette report that already points at the element.
        let message = err.to_string();
        let line = message
            .lines()
            .rev()
            .find(|l| l.trim_start().starts_with('='))
            .map(|l| l.trim_start().trim_start_matches('=').trim().to_string())
            .unwrap_or(message);
        SyntaxError::Grammar(line)
    }
}

pub(super) fn number(pair: Pair<Rule>) -> Result<f64, SyntaxError> {
    let text = pair.as_str();
    match text.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(SyntaxError::Number(text.to_string())),
    }
}

pub(super) fn point(pair: Pair<Rule>) -> Result<DVec2, SyntaxError> {
    let mut inner = pair.into_inner();
    let (Some(x), Some(y)) = (inner.next(), inner.next()) else {
        return Err(SyntaxError::Grammar("coordinate pair is incomplete".into()));
    };
    Ok(dvec2(number(x)?, number(y)?))
}
