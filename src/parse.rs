use std::fmt;

use pest::{
    error::{Error as PestError, ErrorVariant},
    Span,
};

use crate::{ast::*, lex::*};

pub type ParseResult<T> = Result<T, ParseError>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseErrorKind {
    #[error("`{opener}` is never closed by `{closer}`")]
    Unclosed {
        opener: &'static str,
        closer: &'static str,
    },
    #[error("`{0}` does not close anything")]
    Stray(String),
    #[error("Expected `{expected}` but found `{found}`")]
    Mismatched {
        expected: &'static str,
        found: String,
    },
    #[error("Unreadable input")]
    Lex,
}

impl ParseErrorKind {
    pub fn span(self, span: Span) -> ParseError {
        let rendered = PestError::new_from_span(
            ErrorVariant::CustomError {
                message: self.to_string(),
            },
            span,
        );
        ParseError {
            kind: self,
            rendered,
        }
    }
}

#[derive(Debug)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    rendered: PestError<Rule>,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.rendered)
    }
}

impl std::error::Error for ParseError {}

impl From<PestError<Rule>> for ParseError {
    fn from(rendered: PestError<Rule>) -> Self {
        ParseError {
            kind: ParseErrorKind::Lex,
            rendered,
        }
    }
}

/// Parse `tokens` on top of `chain`
pub fn parse<'a, I>(tokens: I, chain: Chain) -> ParseResult<Chain>
where
    I: IntoIterator<Item = Token<'a>>,
{
    let mut tokens = tokens.into_iter();
    let block = parse_block(&mut tokens, chain)?;
    match block.closer {
        Some(closer) => Err(ParseErrorKind::Stray(closer.text().into()).span(closer.span)),
        None => Ok(block.chain),
    }
}

/// A run of tokens ending at a closing keyword or at the end of input
struct Block<'a> {
    chain: Chain,
    closer: Option<Token<'a>>,
}

fn parse_block<'a, I>(tokens: &mut I, mut chain: Chain) -> ParseResult<Block<'a>>
where
    I: Iterator<Item = Token<'a>>,
{
    while let Some(token) = tokens.next() {
        if token.quoted {
            chain.push_literal(Literal::String(token.text().into()));
            continue;
        }
        match token.text() {
            "then" | "else" | "as" => {
                return Ok(Block {
                    chain,
                    closer: Some(token),
                })
            }
            "if" => chain = parse_conditional(tokens, chain, token)?,
            "dec" => chain = parse_definition(tokens, chain, token)?,
            "true" => chain.push_literal(Literal::Bool(true)),
            "false" => chain.push_literal(Literal::Bool(false)),
            text => chain.push(parse_word(text)),
        }
    }
    Ok(Block {
        chain,
        closer: None,
    })
}

fn parse_word(text: &str) -> Node {
    if let Some(op) = Op::from_token(text) {
        Node::operator(op)
    } else if text.parse::<f64>().is_ok() {
        Node::literal(Literal::Number(text.into()))
    } else {
        Node::reference(text)
    }
}

fn parse_conditional<'a, I>(tokens: &mut I, mut chain: Chain, opener: Token<'a>) -> ParseResult<Chain>
where
    I: Iterator<Item = Token<'a>>,
{
    let unclosed = || {
        ParseErrorKind::Unclosed {
            opener: "if",
            closer: "then",
        }
        .span(opener.span.clone())
    };
    let first = parse_block(tokens, Chain::new())?;
    let (branch, otherwise) = match first.closer {
        Some(closer) if closer.text() == "then" => (first.chain, None),
        Some(closer) if closer.text() == "else" => {
            let second = parse_block(tokens, Chain::new())?;
            match second.closer {
                Some(closer) if closer.text() == "then" => (first.chain, Some(second.chain)),
                Some(closer) => return Err(mismatched("then", closer)),
                None => return Err(unclosed()),
            }
        }
        Some(closer) => return Err(mismatched("then", closer)),
        None => return Err(unclosed()),
    };
    chain.push(Node::new(Kind::Control(Control::Conditional {
        branch,
        otherwise,
    })));
    chain.push(Node::operator(Op::Then));
    Ok(chain)
}

fn parse_definition<'a, I>(tokens: &mut I, mut chain: Chain, opener: Token<'a>) -> ParseResult<Chain>
where
    I: Iterator<Item = Token<'a>>,
{
    let block = parse_block(tokens, Chain::new())?;
    match block.closer {
        Some(closer) if closer.text() == "as" => {}
        Some(closer) => return Err(mismatched("as", closer)),
        None => {
            return Err(ParseErrorKind::Unclosed {
                opener: "dec",
                closer: "as",
            }
            .span(opener.span))
        }
    }
    chain.push(Node::new(Kind::Control(Control::Definition { body: block.chain })));
    chain.push(Node::operator(Op::As));
    Ok(chain)
}

fn mismatched(expected: &'static str, found: Token) -> ParseError {
    ParseErrorKind::Mismatched {
        expected,
        found: found.text().into(),
    }
    .span(found.span)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_str(line: &str) -> ParseResult<Chain> {
        parse(tokenize(line)?, Chain::new())
    }

    fn kind_of(line: &str) -> ParseErrorKind {
        parse_str(line).unwrap_err().kind
    }

    #[test]
    fn words_are_classified() {
        let chain = parse_str(r#"1 -2.5 true false "s p" + dup square"#).unwrap();
        let kinds: Vec<Kind> = chain.iter().map(|node| node.kind.clone()).collect();
        assert_eq!(
            kinds,
            vec![
                Kind::Reference("square".into()),
                Kind::Operator(Op::Dup),
                Kind::Operator(Op::Add),
                Kind::Literal(Literal::String("s p".into())),
                Kind::Literal(Literal::Bool(false)),
                Kind::Literal(Literal::Bool(true)),
                Kind::Literal(Literal::Number("-2.5".into())),
                Kind::Literal(Literal::Number("1".into())),
            ]
        );
    }

    #[test]
    fn conditional_keeps_the_preceding_code_beneath_it() {
        let chain = parse_str("1 2 < if 5 then 7").unwrap();
        assert_eq!(chain.to_string(), "1 2 < if 5 then 7");
        let then = chain.iter().nth(1).unwrap();
        assert_eq!(then.kind, Kind::Operator(Op::Then));
        let conditional = then.previous().peek().unwrap();
        match &conditional.kind {
            Kind::Control(Control::Conditional { branch, otherwise }) => {
                assert_eq!(branch.to_string(), "5");
                assert!(otherwise.is_none());
            }
            kind => panic!("expected a conditional, found {:?}", kind),
        }
        assert_eq!(conditional.previous().to_string(), "1 2 <");
    }

    #[test]
    fn else_splits_the_branches() {
        let chain = parse_str("x if 1 2 else 3 then").unwrap();
        assert_eq!(chain.to_string(), "x if 1 2 else 3 then");
        let conditional = chain.iter().nth(1).unwrap();
        match &conditional.kind {
            Kind::Control(Control::Conditional {
                branch,
                otherwise: Some(otherwise),
            }) => {
                assert_eq!(branch.len(), 2);
                assert_eq!(otherwise.to_string(), "3");
            }
            kind => panic!("expected if/else, found {:?}", kind),
        }
    }

    #[test]
    fn definition_body_has_the_name_on_top() {
        let chain = parse_str("dec dup * square as 4 square").unwrap();
        assert_eq!(chain.to_string(), "dec dup * square as 4 square");
        let definition = chain.iter().nth(3).unwrap();
        match &definition.kind {
            Kind::Control(Control::Definition { body }) => {
                assert_eq!(body.peek().unwrap().kind, Kind::Reference("square".into()));
                assert_eq!(body.len(), 3);
            }
            kind => panic!("expected a definition, found {:?}", kind),
        }
    }

    #[test]
    fn nested_forms() {
        let chain = parse_str("dec dup 0 < if 1 - countdown then countdown as").unwrap();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain.to_string(), "dec dup 0 < if 1 - countdown then countdown as");
    }

    #[test]
    fn parses_on_top_of_an_existing_chain() {
        let base = parse_str("1 2").unwrap();
        let chain = parse(tokenize("+").unwrap(), base).unwrap();
        assert_eq!(chain.to_string(), "1 2 +");
        let same = parse(tokenize("").unwrap(), chain.clone()).unwrap();
        assert_eq!(same, chain);
    }

    #[test]
    fn unclosed_forms_are_errors() {
        assert_eq!(
            kind_of("true if 1"),
            ParseErrorKind::Unclosed {
                opener: "if",
                closer: "then"
            }
        );
        assert_eq!(
            kind_of("true if 1 else 2"),
            ParseErrorKind::Unclosed {
                opener: "if",
                closer: "then"
            }
        );
        assert_eq!(
            kind_of("dec dup"),
            ParseErrorKind::Unclosed {
                opener: "dec",
                closer: "as"
            }
        );
    }

    #[test]
    fn stray_and_mismatched_closers_are_errors() {
        assert_eq!(kind_of("1 then 2"), ParseErrorKind::Stray("then".into()));
        assert_eq!(kind_of("else"), ParseErrorKind::Stray("else".into()));
        assert_eq!(
            kind_of("true if 1 as"),
            ParseErrorKind::Mismatched {
                expected: "then",
                found: "as".into()
            }
        );
        assert_eq!(
            kind_of("dec 1 one then"),
            ParseErrorKind::Mismatched {
                expected: "as",
                found: "then".into()
            }
        );
        assert_eq!(
            kind_of("true if 1 else 2 else 3 then"),
            ParseErrorKind::Mismatched {
                expected: "then",
                found: "else".into()
            }
        );
    }

    #[test]
    fn errors_point_at_the_token() {
        let error = parse_str("1 2 then").unwrap_err();
        let rendered = error.to_string();
        assert!(rendered.contains("1:5"), "{}", rendered);
        assert!(rendered.contains("`then` does not close anything"), "{}", rendered);
    }
}
