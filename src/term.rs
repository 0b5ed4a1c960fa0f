//! Logic terms: variables, atoms and cons cells.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// A numeric identifier for a single logic variable.
pub type VarId = u32;

/// A logic variable: a process-unique id plus a human-readable name.
///
/// Variables are compared and hashed by id only; the name exists for
/// diagnostics. Ids are allocated from the counter carried inside the store,
/// so forking a store forks the id supply.
#[derive(Debug, Clone)]
pub struct LVar {
    id: VarId,
    name: Arc<str>,
}

impl LVar {
    pub(crate) fn new(id: VarId, name: &str) -> Self {
        Self {
            id,
            name: Arc::from(name),
        }
    }

    pub fn id(&self) -> VarId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl PartialEq for LVar {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for LVar {}

impl std::hash::Hash for LVar {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for LVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "?{}.{}", self.name, self.id)
    }
}

/// An atom payload: a primitive scalar compared by equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Value {
    Int(i64),
    Bool(bool),
    Str(String),
}

impl Value {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

/// A logic term: a variable, an atom, a cons cell, or the empty list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Term {
    Var(LVar),
    Atom(Value),
    Pair(Arc<Term>, Arc<Term>),
    Nil,
}

impl Term {
    pub fn var(&self) -> Option<&LVar> {
        match self {
            Term::Var(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Term::Atom(v) => v.as_int(),
            _ => None,
        }
    }

    pub fn cons(head: Term, tail: Term) -> Term {
        Term::Pair(Arc::new(head), Arc::new(tail))
    }

    /// Builds a proper cons list from the given items.
    pub fn list(items: impl IntoIterator<Item = Term>) -> Term {
        let items: Vec<Term> = items.into_iter().collect();
        items
            .into_iter()
            .rev()
            .fold(Term::Nil, |tail, head| Term::cons(head, tail))
    }
}

impl From<LVar> for Term {
    fn from(v: LVar) -> Self {
        Term::Var(v)
    }
}

impl From<&LVar> for Term {
    fn from(v: &LVar) -> Self {
        Term::Var(v.clone())
    }
}

impl From<Value> for Term {
    fn from(v: Value) -> Self {
        Term::Atom(v)
    }
}

impl From<i64> for Term {
    fn from(i: i64) -> Self {
        Term::Atom(Value::Int(i))
    }
}

impl From<bool> for Term {
    fn from(b: bool) -> Self {
        Term::Atom(Value::Bool(b))
    }
}

impl From<&str> for Term {
    fn from(s: &str) -> Self {
        Term::Atom(Value::Str(s.to_string()))
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Var(v) => write!(f, "{}", v),
            Term::Atom(Value::Int(i)) => write!(f, "{}", i),
            Term::Atom(Value::Bool(b)) => write!(f, "{}", b),
            Term::Atom(Value::Str(s)) => write!(f, "{:?}", s),
            Term::Nil => write!(f, "()"),
            Term::Pair(head, tail) => {
                write!(f, "({}", head)?;
                let mut rest: &Term = tail;
                loop {
                    match rest {
                        Term::Pair(h, t) => {
                            write!(f, " {}", h)?;
                            rest = t;
                        }
                        Term::Nil => break,
                        other => {
                            write!(f, " . {}", other)?;
                            break;
                        }
                    }
                }
                write!(f, ")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lvar_compares_by_id_only() {
        let a = LVar::new(7, "a");
        let b = LVar::new(7, "b");
        let c = LVar::new(8, "a");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn list_builds_proper_cons_chain() {
        let l = Term::list([Term::from(1), Term::from(2)]);
        assert_eq!(
            l,
            Term::cons(Term::from(1), Term::cons(Term::from(2), Term::Nil))
        );
        assert_eq!(format!("{}", l), "(1 2)");
    }
}
