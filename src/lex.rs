use pest::{Parser, Span};

use crate::parse::ParseResult;

#[derive(pest_derive::Parser)]
#[grammar = "grammar.pest"]
struct LineParser;

/// A whitespace-delimited word, or a double-quoted string
#[derive(Debug, Clone)]
pub struct Token<'a> {
    pub span: Span<'a>,
    pub quoted: bool,
}

impl<'a> Token<'a> {
    /// The token's text, without quotes for a quoted token
    pub fn text(&self) -> &'a str {
        let s = self.span.as_str();
        if self.quoted {
            &s[1..s.len() - 1]
        } else {
            s
        }
    }
}

pub fn tokenize(line: &str) -> ParseResult<Vec<Token>> {
    let pairs = LineParser::parse(Rule::line, line)?;
    Ok(pairs
        .flat_map(|pair| pair.into_inner())
        .filter_map(|pair| match pair.as_rule() {
            Rule::quoted => Some(Token {
                span: pair.as_span(),
                quoted: true,
            }),
            Rule::bare => Some(Token {
                span: pair.as_span(),
                quoted: false,
            }),
            _ => None,
        })
        .collect())
}
