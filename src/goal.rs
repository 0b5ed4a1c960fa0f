//! Goals: relations over stores.
//!
//! A goal consumes a store and contributes successor stores to the search.
//! Goals are closed values; the search driver in [`crate::search`] interprets
//! them, so a goal can be shipped to a worker thread with its branch.

use std::fmt;
use std::sync::Arc;

use crate::{solver::constraint::Constraint, solver::domain::Domain, term::Term};

/// The body of a `fresh`: given the newly allocated variables, produce the
/// inner goal.
pub struct FreshBody {
    pub(crate) names: Vec<String>,
    pub(crate) body: Box<dyn Fn(&[Term]) -> Goal + Send + Sync>,
}

/// A relation over stores.
#[derive(Clone)]
pub enum Goal {
    /// Always succeeds, contributing the store unchanged.
    Succeed,
    /// Always fails.
    Fail,
    /// Unify two terms.
    Unify(Term, Term),
    /// Attach (intersect) an FD domain to a variable.
    Dom(Term, Domain),
    /// Post a constraint.
    Post(Constraint),
    /// Register a relational/FD variable pairing in the hybrid registry.
    Link(Term, Term),
    /// Allocate fresh variables and run the body.
    Fresh(Arc<FreshBody>),
    /// Conjunction, left to right.
    All(Arc<[Goal]>),
    /// Disjunction: one branch per alternative, explorable in parallel.
    Any(Arc<[Goal]>),
    /// Ground FD variables by branching over their domains.
    Label(Arc<[Term]>),
    /// Delay goal construction; the driver expands it on demand, so
    /// recursive relations terminate at construction time.
    Defer(Arc<dyn Fn() -> Goal + Send + Sync>),
}

impl fmt::Debug for Goal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Goal::Succeed => write!(f, "Succeed"),
            Goal::Fail => write!(f, "Fail"),
            Goal::Unify(a, b) => write!(f, "Unify({}, {})", a, b),
            Goal::Dom(t, d) => write!(f, "Dom({}, {:?})", t, d),
            Goal::Post(c) => write!(f, "Post({:?})", c),
            Goal::Link(r, x) => write!(f, "Link({}, {})", r, x),
            Goal::Fresh(fresh) => write!(f, "Fresh({:?})", fresh.names),
            Goal::All(gs) => f.debug_tuple("All").field(&gs.len()).finish(),
            Goal::Any(gs) => f.debug_tuple("Any").field(&gs.len()).finish(),
            Goal::Label(vs) => f.debug_tuple("Label").field(&vs.len()).finish(),
            Goal::Defer(_) => write!(f, "Defer"),
        }
    }
}

/// The trivially successful goal.
pub fn succeed() -> Goal {
    Goal::Succeed
}

/// The trivially failing goal.
pub fn fail() -> Goal {
    Goal::Fail
}

/// Unification: `a == b`.
pub fn eq(a: impl Into<Term>, b: impl Into<Term>) -> Goal {
    Goal::Unify(a.into(), b.into())
}

/// Attach an FD domain to a variable (intersecting any existing domain).
pub fn dom(v: impl Into<Term>, d: Domain) -> Goal {
    Goal::Dom(v.into(), d)
}

/// Post a constraint into the store.
pub fn posts(c: Constraint) -> Goal {
    Goal::Post(c)
}

/// Register `rel` and `fd` as a hybrid pair.
pub fn link(rel: impl Into<Term>, fd: impl Into<Term>) -> Goal {
    Goal::Link(rel.into(), fd.into())
}

/// Allocate fresh logic variables, one per name, and run the goal the body
/// builds from them.
pub fn fresh<F>(names: &[&str], body: F) -> Goal
where
    F: Fn(&[Term]) -> Goal + Send + Sync + 'static,
{
    Goal::Fresh(Arc::new(FreshBody {
        names: names.iter().map(|n| n.to_string()).collect(),
        body: Box::new(body),
    }))
}

/// Conjunction of goals, run left to right.
pub fn all(goals: Vec<Goal>) -> Goal {
    Goal::All(goals.into())
}

/// Disjunction of conjunctions: each line is tried as its own branch.
pub fn conde(lines: Vec<Vec<Goal>>) -> Goal {
    let branches: Vec<Goal> = lines.into_iter().map(all).collect();
    Goal::Any(branches.into())
}

/// Ground the given FD variables by branching over their remaining domain
/// values.
pub fn label(vars: Vec<Term>) -> Goal {
    Goal::Label(vars.into())
}

/// Delay construction of a goal until the driver reaches it. Needed for
/// recursive relations.
pub fn defer<F>(f: F) -> Goal
where
    F: Fn() -> Goal + Send + Sync + 'static,
{
    Goal::Defer(Arc::new(f))
}
