use std::fmt;

/// A final value on the stack
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// The lexeme is kept so `==` compares what was written
    Number(String),
    Bool(bool),
    String(String),
}

impl Literal {
    pub fn number(n: f64) -> Self {
        Literal::Number(n.to_string())
    }
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Literal::Number(lexeme) => lexeme.parse().ok(),
            _ => None,
        }
    }
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Literal::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Literal::Number(lexeme) => write!(f, "{}", lexeme),
            Literal::Bool(b) => write!(f, "{}", b),
            Literal::String(s) => write!(f, "\"{}\"", s),
        }
    }
}
