use std::collections::BTreeSet;

use rpds::RedBlackTreeMapSync;

use crate::ast::Chain;

/// A scope of function definitions.
///
/// Bodies are stored as templates: [`Namespace::resolve`] always hands out a
/// copy, so splicing a continuation onto a call never touches the definition.
/// The parent is only ever read through a child.
#[derive(Debug, Clone, Default)]
pub struct Namespace<'p> {
    parent: Option<&'p Namespace<'p>>,
    bindings: RedBlackTreeMapSync<String, Chain>,
}

impl<'p> Namespace<'p> {
    pub fn new() -> Self {
        Namespace::default()
    }
    pub fn child(&self) -> Namespace {
        Namespace {
            parent: Some(self),
            bindings: RedBlackTreeMapSync::default(),
        }
    }
    pub fn define<N>(&mut self, name: N, body: Chain)
    where
        N: Into<String>,
    {
        self.bindings.insert_mut(name.into(), body);
    }
    pub fn resolve(&self, name: &str) -> Option<Chain> {
        let mut scope = Some(self);
        while let Some(ns) = scope {
            if let Some(body) = ns.bindings.get(name) {
                return Some(body.clone());
            }
            scope = ns.parent;
        }
        None
    }
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut scope = self.parent;
        while let Some(ns) = scope {
            depth += 1;
            scope = ns.parent;
        }
        depth
    }
    /// Every name visible from this scope
    pub fn names(&self) -> BTreeSet<&str> {
        let mut names = BTreeSet::new();
        let mut scope = Some(self);
        while let Some(ns) = scope {
            names.extend(ns.bindings.keys().map(String::as_str));
            scope = ns.parent;
        }
        names
    }
}
