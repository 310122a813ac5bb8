pub mod ast;
pub mod eval;
pub mod lex;
pub mod pane;
pub mod parse;
pub mod resolve;
pub mod session;
pub mod value;

pub use crate::{
    ast::{Chain, Kind, Node, Op},
    eval::{evaluate, EvalError, Evaluation, Event},
    lex::tokenize,
    parse::{parse, ParseError, ParseErrorKind},
    resolve::Namespace,
    session::Session,
    value::Literal,
};
