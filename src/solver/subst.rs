//! The substitution map: relational bindings from variable ids to terms.

use im::HashMap;

use crate::term::{Term, VarId};

/// Where a chain of variable bindings ends.
#[derive(Debug)]
pub(crate) enum WalkEnd<'a> {
    /// The chain ends in an unbound variable (the root representative).
    Free(VarId),
    /// The chain ends in a non-variable term.
    Bound(&'a Term),
}

/// A persistent mapping from variable id to term.
///
/// Keys are unique and walk-idempotent: walking any bound variable ends in a
/// non-variable term or an unbound variable, never in a cycle (the occur
/// check is off and terms are trees).
#[derive(Clone, Debug, Default)]
pub struct Subst {
    map: HashMap<VarId, Term>,
}

impl Subst {
    pub fn new() -> Subst {
        Subst::default()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn get(&self, v: VarId) -> Option<&Term> {
        self.map.get(&v)
    }

    pub(crate) fn extend(&self, v: VarId, t: Term) -> Subst {
        Subst {
            map: self.map.update(v, t),
        }
    }

    /// Chases variable bindings until a non-variable or unbound variable is
    /// reached. Walks the spine only; see [`Subst::walk_star`] for the deep
    /// form.
    pub fn walk<'a>(&'a self, term: &'a Term) -> &'a Term {
        let mut cur = term;
        while let Term::Var(v) = cur {
            match self.map.get(&v.id()) {
                Some(next) => cur = next,
                None => break,
            }
        }
        cur
    }

    pub(crate) fn walk_id(&self, v: VarId) -> WalkEnd<'_> {
        let mut cur = v;
        loop {
            match self.map.get(&cur) {
                None => return WalkEnd::Free(cur),
                Some(Term::Var(next)) => cur = next.id(),
                Some(t) => return WalkEnd::Bound(t),
            }
        }
    }

    /// Deep-walks a term, substituting bound variables recursively.
    pub fn walk_star(&self, term: &Term) -> Term {
        let walked = self.walk(term);
        match walked {
            Term::Pair(head, tail) => Term::cons(self.walk_star(head), self.walk_star(tail)),
            other => other.clone(),
        }
    }

    /// Standard first-order unification without occur check.
    ///
    /// On success the extended substitution is returned and the ids of every
    /// newly bound variable are appended to `log`, so the caller can schedule
    /// watchers and fire the hybrid cross-propagation hooks.
    pub fn unify(&self, a: &Term, b: &Term, log: &mut Vec<VarId>) -> Option<Subst> {
        let a = self.walk(a).clone();
        let b = self.walk(b).clone();
        match (a, b) {
            (Term::Var(x), Term::Var(y)) if x == y => Some(self.clone()),
            (Term::Var(x), t) => {
                log.push(x.id());
                Some(self.extend(x.id(), t))
            }
            (t, Term::Var(y)) => {
                log.push(y.id());
                Some(self.extend(y.id(), t))
            }
            (Term::Atom(u), Term::Atom(v)) if u == v => Some(self.clone()),
            (Term::Nil, Term::Nil) => Some(self.clone()),
            (Term::Pair(a1, a2), Term::Pair(b1, b2)) => self
                .unify(&a1, &b1, log)
                .and_then(|s| s.unify(&a2, &b2, log)),
            _ => None,
        }
    }
}
