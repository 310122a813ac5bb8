use std::mem;

use crate::{
    ast::Chain,
    eval::{evaluate, Event},
    lex::tokenize,
    parse::{parse, ParseResult},
    resolve::Namespace,
};

/// A stack and the top-level namespace it was evaluated in
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub stack: Chain,
    pub namespace: Namespace<'static>,
}

impl Session {
    pub fn new() -> Self {
        Session::default()
    }
    /// Stack `line` on top of the current stack and evaluate everything.
    /// On a parse error the session is left as it was.
    pub fn commit(&mut self, line: &str) -> ParseResult<Vec<Event>> {
        let tokens = tokenize(line)?;
        let mut program = parse(tokens, Chain::new())?;
        #[cfg(feature = "debug")]
        println!("{:#?}", program);
        program.append(mem::take(&mut self.stack));
        let evaluation = evaluate(program, &mut self.namespace);
        self.stack = evaluation.stack;
        Ok(evaluation.events)
    }
    /// Empty the stack, keeping definitions
    pub fn clear(&mut self) {
        self.stack = Chain::new();
    }
}
