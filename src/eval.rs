use std::fmt;

use tracing::{debug, trace, warn};

use crate::{ast::*, resolve::Namespace};

/// Grow the stack when less than this remains
const RED_ZONE: usize = 100 * 1024;
/// Size of each new stack segment
const STACK_PER_RECURSION: usize = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    #[error("Couldn't find a function named {0}")]
    UnknownFunction(String),
    #[error("Malformed definition `{0}`: the last word must name the function")]
    MalformedDefinition(String),
    #[error("`{op}` needs {needed} operand(s) but found {found}")]
    Starved {
        op: String,
        needed: usize,
        found: usize,
    },
    #[error("`{op}` expected a number but found `{found}`")]
    NotANumber { op: String, found: String },
    #[error("`{op}` expected a boolean but found `{found}`")]
    NotABool { op: String, found: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Before,
    After,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Emitted by `.`: the chain from the `.` down before evaluation, then
    /// the stack beneath it afterwards
    Trace { phase: Phase, stack: String },
    Fault(EvalError),
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Event::Trace {
                phase: Phase::Before,
                stack,
            } => write!(f, "before `.`: {}", stack),
            Event::Trace {
                phase: Phase::After,
                stack,
            } => write!(f, "after `.`: {}", stack),
            Event::Fault(error) => write!(f, "{}", error),
        }
    }
}

#[derive(Debug)]
pub struct Evaluation {
    pub stack: Chain,
    pub events: Vec<Event>,
}

impl Evaluation {
    pub fn faults(&self) -> impl Iterator<Item = &EvalError> {
        self.events.iter().filter_map(|event| match event {
            Event::Fault(error) => Some(error),
            Event::Trace { .. } => None,
        })
    }
}

/// Reduce `chain` to a stack of values, defining functions in `namespace`
/// along the way. Errors never stop evaluation; they are collected as events.
pub fn evaluate(chain: Chain, namespace: &mut Namespace) -> Evaluation {
    let mut evaluator = Evaluator::default();
    let stack = evaluator.eval(chain, namespace);
    Evaluation {
        stack,
        events: evaluator.events,
    }
}

#[derive(Default)]
struct Evaluator {
    events: Vec<Event>,
}

impl Evaluator {
    fn fault(&mut self, error: EvalError) {
        warn!("{}", error);
        self.events.push(Event::Fault(error));
    }
    fn eval(&mut self, chain: Chain, ns: &mut Namespace) -> Chain {
        stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, || self.step(chain, ns))
    }
    /// Take the top node off and dispatch on it. Everything beneath the top
    /// is reduced before the top consumes it.
    fn step(&mut self, mut chain: Chain, ns: &mut Namespace) -> Chain {
        let node = match chain.pop() {
            Some(node) => node,
            None => return chain,
        };
        if node.is_settled() {
            let mut stack = self.eval(chain, ns);
            stack.push(node);
            return stack;
        }
        match node.kind {
            Kind::Literal(lit) => {
                let mut stack = self.eval(chain, ns);
                stack.push_literal(lit);
                stack
            }
            Kind::Reference(name) => self.call(name, chain, ns),
            Kind::Control(Control::Conditional { branch, otherwise }) => {
                self.branch(branch, otherwise, chain, ns)
            }
            Kind::Control(Control::Definition { body }) => {
                let stack = self.eval(chain, ns);
                self.define(body, ns);
                stack
            }
            Kind::Operator(Op::Then) | Kind::Operator(Op::As) => self.eval(chain, ns),
            Kind::Operator(Op::Peek) => {
                let before = if chain.is_empty() {
                    Op::Peek.to_string()
                } else {
                    format!("{} {}", chain, Op::Peek)
                };
                self.trace(Phase::Before, before);
                let stack = self.eval(chain, ns);
                self.trace(Phase::After, stack.to_string());
                stack
            }
            Kind::Operator(op) => {
                let stack = self.eval(chain, ns);
                self.apply(op, stack)
            }
        }
    }
    fn trace(&mut self, phase: Phase, stack: String) {
        trace!(?phase, %stack, "peek");
        self.events.push(Event::Trace { phase, stack });
    }
    /// Inline a copy of the function body on top of the reduced remainder
    fn call(&mut self, name: String, rest: Chain, ns: &mut Namespace) -> Chain {
        let stack = self.eval(rest, ns);
        match ns.resolve(&name) {
            Some(mut body) => {
                debug!(%name, depth = ns.depth(), "call");
                body.append(stack);
                self.eval(body, ns)
            }
            None => {
                self.fault(EvalError::UnknownFunction(name));
                stack
            }
        }
    }
    fn branch(
        &mut self,
        branch: Chain,
        otherwise: Option<Chain>,
        rest: Chain,
        ns: &mut Namespace,
    ) -> Chain {
        let mut stack = self.eval(rest, ns);
        let condition = match stack.peek().map(|node| &node.kind) {
            Some(Kind::Literal(lit)) => lit.as_bool().ok_or_else(|| EvalError::NotABool {
                op: "if".into(),
                found: lit.to_string(),
            }),
            _ => Err(EvalError::Starved {
                op: "if".into(),
                needed: 1,
                found: 0,
            }),
        };
        match condition {
            Ok(taken) => {
                stack.pop();
                debug!(taken, depth = ns.depth(), "branch");
                let mut code = if taken {
                    branch
                } else {
                    otherwise.unwrap_or_default()
                };
                code.append(stack);
                let mut scope = ns.child();
                self.eval(code, &mut scope)
            }
            Err(error) => {
                self.fault(error);
                stack.push(Node::unresolved(Kind::Control(Control::Conditional {
                    branch,
                    otherwise,
                })));
                stack.push(Node::unresolved(Kind::Operator(Op::Then)));
                stack
            }
        }
    }
    fn define(&mut self, mut body: Chain, ns: &mut Namespace) {
        match body.pop().map(|node| node.kind) {
            Some(Kind::Reference(name)) => {
                debug!(%name, depth = ns.depth(), "define");
                ns.define(name, body);
            }
            top => {
                if let Some(kind) = top {
                    body.push(Node::new(kind));
                }
                let shown = Kind::Control(Control::Definition { body }).to_string();
                self.fault(EvalError::MalformedDefinition(shown));
            }
        }
    }
    fn apply(&mut self, op: Op, mut stack: Chain) -> Chain {
        let needed = op.arity();
        // Top first
        let mut operands = Vec::with_capacity(needed);
        while operands.len() < needed {
            match stack.pop_literal() {
                Some(lit) => operands.push(lit),
                None => break,
            }
        }
        if operands.len() < needed {
            self.fault(EvalError::Starved {
                op: op.to_string(),
                needed,
                found: operands.len(),
            });
            return unresolved(op, operands, stack);
        }
        let reduced = match operands.as_slice() {
            [top] => unary(op, top),
            [top, next] => binary(op, top, next),
            operands => unreachable!("{} applied to {} operands", op, operands.len()),
        };
        match reduced {
            Ok(results) => {
                for lit in results {
                    stack.push_literal(lit);
                }
                stack
            }
            Err(error) => {
                self.fault(error);
                unresolved(op, operands, stack)
            }
        }
    }
}

/// Put the operands back and leave the operator on top
fn unresolved(op: Op, operands: Vec<Literal>, mut stack: Chain) -> Chain {
    for lit in operands.into_iter().rev() {
        stack.push_literal(lit);
    }
    stack.push(Node::unresolved(Kind::Operator(op)));
    stack
}

/// Results are in push order
fn unary(op: Op, top: &Literal) -> Result<Vec<Literal>, EvalError> {
    match op {
        Op::Dup => Ok(vec![top.clone(), top.clone()]),
        Op::Drop => Ok(Vec::new()),
        Op::Not => match top.as_bool() {
            Some(b) => Ok(vec![Literal::Bool(!b)]),
            None => Err(EvalError::NotABool {
                op: op.to_string(),
                found: top.to_string(),
            }),
        },
        op => unreachable!("{} is not a unary operator", op),
    }
}

fn binary(op: Op, top: &Literal, next: &Literal) -> Result<Vec<Literal>, EvalError> {
    match op {
        Op::Swap => return Ok(vec![top.clone(), next.clone()]),
        Op::Eq => return Ok(vec![Literal::Bool(next.to_string() == top.to_string())]),
        _ => {}
    }
    let a = number(op, next)?;
    let b = number(op, top)?;
    Ok(vec![match op {
        Op::Add => Literal::number(a + b),
        Op::Sub => Literal::number(a - b),
        Op::Mul => Literal::number(a * b),
        Op::Div => Literal::number(a / b),
        // Comparisons put the top value on the left
        Op::Less => Literal::Bool(b < a),
        Op::Greater => Literal::Bool(b > a),
        op => unreachable!("{} is not a binary operator", op),
    }])
}

fn number(op: Op, lit: &Literal) -> Result<f64, EvalError> {
    lit.as_number().ok_or_else(|| EvalError::NotANumber {
        op: op.to_string(),
        found: lit.to_string(),
    })
}
