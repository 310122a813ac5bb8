use std::{fmt, iter::FromIterator, mem};

use derive_more::Display;
use itertools::Itertools;

pub use crate::value::Literal;

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    #[display(fmt = "+")]
    Add,
    #[display(fmt = "-")]
    Sub,
    #[display(fmt = "*")]
    Mul,
    #[display(fmt = "/")]
    Div,
    #[display(fmt = "==")]
    Eq,
    #[display(fmt = "<")]
    Less,
    #[display(fmt = ">")]
    Greater,
    #[display(fmt = "!")]
    Not,
    #[display(fmt = ".")]
    Peek,
    #[display(fmt = "dup")]
    Dup,
    #[display(fmt = "drop")]
    Drop,
    #[display(fmt = "swap")]
    Swap,
    #[display(fmt = "then")]
    Then,
    #[display(fmt = "as")]
    As,
}

impl Op {
    /// Operators a user can write directly. `then` and `as` are only ever
    /// pushed by the parser when it closes a form.
    pub fn from_token(token: &str) -> Option<Op> {
        Some(match token {
            "+" => Op::Add,
            "-" => Op::Sub,
            "*" => Op::Mul,
            "/" => Op::Div,
            "==" => Op::Eq,
            "<" => Op::Less,
            ">" => Op::Greater,
            "!" => Op::Not,
            "." => Op::Peek,
            "dup" => Op::Dup,
            "drop" => Op::Drop,
            "swap" => Op::Swap,
            _ => return None,
        })
    }
    pub fn arity(self) -> usize {
        match self {
            Op::Add | Op::Sub | Op::Mul | Op::Div => 2,
            Op::Eq | Op::Less | Op::Greater | Op::Swap => 2,
            Op::Not | Op::Dup | Op::Drop => 1,
            Op::Peek | Op::Then | Op::As => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Control {
    /// `if <branch> [else <otherwise>] then`
    Conditional {
        branch: Chain,
        otherwise: Option<Chain>,
    },
    /// `dec <body> <name> as`, the name being the top of `body`
    Definition { body: Chain },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Kind {
    Literal(Literal),
    Operator(Op),
    Control(Control),
    Reference(String),
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Kind::Literal(lit) => write!(f, "{}", lit),
            Kind::Operator(op) => write!(f, "{}", op),
            Kind::Reference(name) => write!(f, "{}", name),
            Kind::Control(Control::Conditional { branch, otherwise }) => {
                write!(f, "if")?;
                if !branch.is_empty() {
                    write!(f, " {}", branch)?;
                }
                if let Some(otherwise) = otherwise {
                    write!(f, " else")?;
                    if !otherwise.is_empty() {
                        write!(f, " {}", otherwise)?;
                    }
                }
                Ok(())
            }
            Kind::Control(Control::Definition { body }) => {
                write!(f, "dec")?;
                if !body.is_empty() {
                    write!(f, " {}", body)?;
                }
                Ok(())
            }
        }
    }
}

/// One entry of a chain. It owns everything pushed before it.
#[derive(Debug)]
pub struct Node {
    pub kind: Kind,
    previous: Chain,
    settled: bool,
}

impl Node {
    pub fn new(kind: Kind) -> Self {
        Node {
            kind,
            previous: Chain::new(),
            settled: false,
        }
    }
    /// A node that already failed to reduce. Nothing can ever be pushed
    /// beneath it, so evaluation passes over it without trying again.
    pub fn unresolved(kind: Kind) -> Self {
        Node {
            settled: true,
            ..Node::new(kind)
        }
    }
    pub fn literal(lit: Literal) -> Self {
        Node::new(Kind::Literal(lit))
    }
    pub fn operator(op: Op) -> Self {
        Node::new(Kind::Operator(op))
    }
    pub fn reference<N>(name: N) -> Self
    where
        N: Into<String>,
    {
        Node::new(Kind::Reference(name.into()))
    }
    pub fn previous(&self) -> &Chain {
        &self.previous
    }
    pub fn is_value(&self) -> bool {
        matches!(self.kind, Kind::Literal(_))
    }
    pub fn is_settled(&self) -> bool {
        self.settled
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

/// A singly linked list of nodes, top first. The same type holds a parsed
/// program and the stack of values it evaluates to.
///
/// `Clone` is the deep copy: the result shares no node with the original.
#[derive(Default)]
pub struct Chain(Option<Box<Node>>);

impl Chain {
    pub fn new() -> Self {
        Chain(None)
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }
    pub fn len(&self) -> usize {
        self.iter().count()
    }
    pub fn peek(&self) -> Option<&Node> {
        self.0.as_deref()
    }
    pub fn push(&mut self, mut node: Node) {
        node.previous = mem::take(self);
        self.0 = Some(Box::new(node));
    }
    pub fn push_literal(&mut self, lit: Literal) {
        self.push(Node::literal(lit))
    }
    /// Detach the top node. The returned node has no `previous`.
    pub fn pop(&mut self) -> Option<Node> {
        let mut node = self.0.take()?;
        *self = mem::take(&mut node.previous);
        Some(*node)
    }
    /// Pop the top node only if it is a literal
    pub fn pop_literal(&mut self) -> Option<Literal> {
        if !self.peek()?.is_value() {
            return None;
        }
        match self.pop()?.kind {
            Kind::Literal(lit) => Some(lit),
            _ => None,
        }
    }
    /// Attach `tail` beneath the bottom-most node
    pub fn append(&mut self, mut tail: Chain) {
        let mut cursor = &mut self.0;
        while let Some(node) = cursor {
            cursor = &mut node.previous.0;
        }
        *cursor = tail.0.take();
    }
    /// Iterate from the top down
    pub fn iter(&self) -> Iter {
        Iter {
            next: self.0.as_deref(),
        }
    }
}

impl Clone for Chain {
    fn clone(&self) -> Self {
        let nodes: Vec<&Node> = self.iter().collect();
        nodes
            .into_iter()
            .rev()
            .map(|node| Node {
                settled: node.settled,
                ..Node::new(node.kind.clone())
            })
            .collect()
    }
}

impl Drop for Chain {
    fn drop(&mut self) {
        let mut next = self.0.take();
        while let Some(mut node) = next {
            next = node.previous.0.take();
        }
    }
}

impl PartialEq for Chain {
    fn eq(&self, other: &Self) -> bool {
        self.iter()
            .map(|node| &node.kind)
            .eq(other.iter().map(|node| &node.kind))
    }
}

/// Builds a chain from nodes in push order
impl FromIterator<Node> for Chain {
    fn from_iter<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = Node>,
    {
        let mut chain = Chain::new();
        for node in iter {
            chain.push(node);
        }
        chain
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let nodes: Vec<&Node> = self.iter().collect();
        write!(f, "{}", nodes.into_iter().rev().join(" "))
    }
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let nodes: Vec<&Node> = self.iter().collect();
        f.debug_list()
            .entries(nodes.into_iter().rev().map(|node| &node.kind))
            .finish()
    }
}

pub struct Iter<'a> {
    next: Option<&'a Node>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a Node;
    fn next(&mut self) -> Option<Self::Item> {
        let node = self.next?;
        self.next = node.previous.0.as_deref();
        Some(node)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn num(n: &str) -> Node {
        Node::literal(Literal::Number(n.into()))
    }

    fn addresses(chain: &Chain, into: &mut HashSet<*const Node>) {
        for node in chain.iter() {
            into.insert(node as *const Node);
            if let Kind::Control(control) = &node.kind {
                match control {
                    Control::Conditional { branch, otherwise } => {
                        addresses(branch, into);
                        if let Some(otherwise) = otherwise {
                            addresses(otherwise, into);
                        }
                    }
                    Control::Definition { body } => addresses(body, into),
                }
            }
        }
    }

    #[test]
    fn push_pop_top_first() {
        let mut chain: Chain = vec![num("1"), num("2"), Node::operator(Op::Add)]
            .into_iter()
            .collect();
        assert_eq!(chain.to_string(), "1 2 +");
        assert_eq!(chain.len(), 3);
        assert_eq!(chain.pop().map(|node| node.kind), Some(Kind::Operator(Op::Add)));
        assert_eq!(chain.pop_literal(), Some(Literal::Number("2".into())));
        assert_eq!(chain.to_string(), "1");
    }

    #[test]
    fn pop_literal_leaves_non_values() {
        let mut chain: Chain = vec![num("1"), Node::reference("f")].into_iter().collect();
        assert_eq!(chain.pop_literal(), None);
        assert_eq!(chain.to_string(), "1 f");
    }

    #[test]
    fn append_attaches_at_the_bottom() {
        let mut top: Chain = vec![Node::operator(Op::Dup), Node::operator(Op::Mul)]
            .into_iter()
            .collect();
        let bottom: Chain = vec![num("3")].into_iter().collect();
        top.append(bottom);
        assert_eq!(top.to_string(), "3 dup *");

        let mut empty = Chain::new();
        empty.append(top.clone());
        assert_eq!(empty, top);
    }

    #[test]
    fn control_nodes_render_their_sub_chains() {
        let branch: Chain = vec![num("1")].into_iter().collect();
        let otherwise: Chain = vec![num("2")].into_iter().collect();
        let body: Chain = vec![Node::operator(Op::Dup), Node::reference("twice")]
            .into_iter()
            .collect();
        let chain: Chain = vec![
            Node::literal(Literal::Bool(true)),
            Node::new(Kind::Control(Control::Conditional {
                branch,
                otherwise: Some(otherwise),
            })),
            Node::operator(Op::Then),
            Node::new(Kind::Control(Control::Definition { body })),
            Node::operator(Op::As),
        ]
        .into_iter()
        .collect();
        assert_eq!(chain.to_string(), "true if 1 else 2 then dec dup twice as");
    }

    #[test]
    fn copy_shares_no_nodes() {
        let branch: Chain = vec![num("7"), Node::reference("f")].into_iter().collect();
        let original: Chain = vec![
            num("1"),
            Node::new(Kind::Control(Control::Conditional {
                branch,
                otherwise: None,
            })),
            Node::operator(Op::Then),
        ]
        .into_iter()
        .collect();
        let mut copy = original.clone();
        assert_eq!(copy.to_string(), original.to_string());

        let mut mine = HashSet::new();
        let mut theirs = HashSet::new();
        addresses(&original, &mut mine);
        addresses(&copy, &mut theirs);
        assert_eq!(mine.len(), 5);
        assert!(mine.is_disjoint(&theirs));

        copy.append(vec![num("0")].into_iter().collect());
        assert_eq!(copy.to_string(), "0 1 if 7 f then");
        assert_eq!(original.to_string(), "1 if 7 f then");
    }

    #[test]
    fn copies_keep_unresolved_marks() {
        let chain: Chain = vec![num("1"), Node::unresolved(Kind::Operator(Op::Add)), num("2")]
            .into_iter()
            .collect();
        let copy = chain.clone();
        let settled: Vec<bool> = copy.iter().map(Node::is_settled).collect();
        assert_eq!(settled, vec![false, true, false]);
    }

    #[test]
    fn long_chains_copy_and_drop_without_recursing() {
        let chain: Chain = (0..200_000).map(|i| num(&i.to_string())).collect();
        let copy = chain.clone();
        assert_eq!(copy.len(), 200_000);
        assert!(copy == chain);
    }
}
