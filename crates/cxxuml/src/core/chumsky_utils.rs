//! Shared chumsky parser utilities
//!
//! Small combinators used by the comment decorator parser.

use chumsky::prelude::*;

/// Parse inline whitespace only (spaces and tabs, no newlines).
///
/// Uses explicit character matching to avoid the "repeated combinator making no progress"
/// issue that can occur with `chumsky::text::whitespace().repeated()`.
pub fn inline_whitespace<'src>() -> impl Parser<'src, &'src str, ()> + Clone {
    one_of(" \t").repeated().ignored()
}

/// Parse optional whitespace including newlines.
pub fn optional_whitespace<'src>() -> impl Parser<'src, &'src str, ()> + Clone {
    one_of(" \t\n\r").repeated().ignored()
}

/// Parse text between `[` and `]`, trimmed. Brackets do not nest.
pub fn bracketed<'src>() -> impl Parser<'src, &'src str, String> + Clone {
    none_of("]")
        .repeated()
        .to_slice()
        .map(|s: &str| s.trim().to_string())
        .delimited_by(just('['), just(']'))
}

/// Parse a comma separated list of names, e.g. `seq_a, seq_b`
///
/// Names stop at whitespace, `,`, `[`, `]` and `}`.
pub fn name_list<'src>() -> impl Parser<'src, &'src str, Vec<String>> + Clone {
    none_of(" \t\n\r,[]{}")
        .repeated()
        .at_least(1)
        .to_slice()
        .map(|s: &str| s.to_string())
        .padded_by(inline_whitespace())
        .separated_by(just(','))
        .at_least(1)
        .collect::<Vec<_>>()
}

/// Parse the remaining input as trimmed free text
pub fn rest_text<'src>() -> impl Parser<'src, &'src str, String> + Clone {
    any()
        .repeated()
        .to_slice()
        .map(|s: &str| s.trim().to_string())
}
