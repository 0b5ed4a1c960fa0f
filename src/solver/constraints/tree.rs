//! Relational constraints over terms: disequality, absence and type checks.
//!
//! These pend on the frontier variables of their terms and re-anchor their
//! watch sets as unification grounds them.

use std::sync::Arc;

use crate::{
    error::Result,
    solver::{
        constraint::{ConstraintDescriptor, Outcome, Propagator, TypeKind},
        store::Store,
        subst::Subst,
    },
    term::{Term, Value, VarId},
};

/// Enforces that `lhs` and `rhs` never unify.
///
/// Each examination re-attempts unification under the current substitution:
/// an impossible unification entails the constraint, a trivial one fails the
/// store, and anything else pends on the variables the unification would
/// bind.
#[derive(Debug, Clone)]
pub(crate) struct DisequalPropagator {
    lhs: Term,
    rhs: Term,
    vars: Vec<VarId>,
}

impl DisequalPropagator {
    pub(crate) fn new(lhs: Term, rhs: Term, vars: Vec<VarId>) -> Self {
        Self { lhs, rhs, vars }
    }
}

impl Propagator for DisequalPropagator {
    fn variables(&self) -> &[VarId] {
        &self.vars
    }

    fn descriptor(&self) -> ConstraintDescriptor {
        ConstraintDescriptor {
            name: "DisequalConstraint".to_string(),
            description: format!("{} =/= {}", self.lhs, self.rhs),
        }
    }

    fn propagate(&self, store: &Store) -> Result<Outcome> {
        let mut log = Vec::new();
        match store.subst().unify(&self.lhs, &self.rhs, &mut log) {
            None => Ok(Outcome::Entailed),
            Some(_) if log.is_empty() => Ok(Outcome::Failed),
            Some(_) => {
                log.sort_unstable();
                log.dedup();
                if log == self.vars {
                    Ok(Outcome::Quiet)
                } else {
                    Ok(Outcome::Rewritten {
                        replacement: Arc::new(DisequalPropagator::new(
                            self.lhs.clone(),
                            self.rhs.clone(),
                            log,
                        )),
                    })
                }
            }
        }
    }
}

/// The result of scanning a term for a forbidden atom.
#[derive(Debug)]
pub(crate) enum Scan {
    /// The atom occurs in the walked term.
    Violated,
    /// The term is ground and the atom is absent.
    Ground,
    /// Free variables could still introduce the atom.
    Pending(Vec<VarId>),
}

pub(crate) fn scan_absent(subst: &Subst, atom: &Value, term: &Term) -> Scan {
    fn go(subst: &Subst, atom: &Value, term: &Term, free: &mut Vec<VarId>) -> bool {
        match subst.walk(term) {
            Term::Var(v) => {
                free.push(v.id());
                false
            }
            Term::Atom(a) => a == atom,
            Term::Nil => false,
            Term::Pair(head, tail) => {
                let (head, tail) = (head.clone(), tail.clone());
                go(subst, atom, &head, free) || go(subst, atom, &tail, free)
            }
        }
    }
    let mut free = Vec::new();
    if go(subst, atom, term, &mut free) {
        Scan::Violated
    } else if free.is_empty() {
        Scan::Ground
    } else {
        free.sort_unstable();
        free.dedup();
        Scan::Pending(free)
    }
}

/// Enforces that `atom` occurs nowhere in the walked form of `term`.
#[derive(Debug, Clone)]
pub(crate) struct AbsentPropagator {
    atom: Value,
    term: Term,
    vars: Vec<VarId>,
}

impl AbsentPropagator {
    pub(crate) fn new(atom: Value, term: Term, vars: Vec<VarId>) -> Self {
        Self { atom, term, vars }
    }
}

impl Propagator for AbsentPropagator {
    fn variables(&self) -> &[VarId] {
        &self.vars
    }

    fn descriptor(&self) -> ConstraintDescriptor {
        ConstraintDescriptor {
            name: "AbsentConstraint".to_string(),
            description: format!("{:?} absent from {}", self.atom, self.term),
        }
    }

    fn propagate(&self, store: &Store) -> Result<Outcome> {
        match scan_absent(store.subst(), &self.atom, &self.term) {
            Scan::Violated => Ok(Outcome::Failed),
            Scan::Ground => Ok(Outcome::Entailed),
            Scan::Pending(free) => {
                if free == self.vars {
                    Ok(Outcome::Quiet)
                } else {
                    Ok(Outcome::Rewritten {
                        replacement: Arc::new(AbsentPropagator::new(
                            self.atom.clone(),
                            self.term.clone(),
                            free,
                        )),
                    })
                }
            }
        }
    }
}

/// Enforces that `term` resolves to an atom of a given shape.
#[derive(Debug, Clone)]
pub(crate) struct TypeOfPropagator {
    term: Term,
    kind: TypeKind,
    vars: Vec<VarId>,
}

impl TypeOfPropagator {
    pub(crate) fn new(term: Term, kind: TypeKind, vars: Vec<VarId>) -> Self {
        Self { term, kind, vars }
    }

    pub(crate) fn matches(term: &Term, kind: TypeKind) -> bool {
        matches!(
            (term, kind),
            (Term::Atom(Value::Int(_)), TypeKind::Number)
                | (Term::Atom(Value::Bool(_)), TypeKind::Boolean)
                | (Term::Atom(Value::Str(_)), TypeKind::Text)
        )
    }
}

impl Propagator for TypeOfPropagator {
    fn variables(&self) -> &[VarId] {
        &self.vars
    }

    fn descriptor(&self) -> ConstraintDescriptor {
        ConstraintDescriptor {
            name: "TypeOfConstraint".to_string(),
            description: format!("{} : {:?}", self.term, self.kind),
        }
    }

    fn propagate(&self, store: &Store) -> Result<Outcome> {
        let walked = store.walk(&self.term).clone();
        match &walked {
            Term::Var(v) => {
                let watch = vec![v.id()];
                if watch == self.vars {
                    Ok(Outcome::Quiet)
                } else {
                    Ok(Outcome::Rewritten {
                        replacement: Arc::new(TypeOfPropagator::new(
                            self.term.clone(),
                            self.kind,
                            watch,
                        )),
                    })
                }
            }
            _ => {
                if Self::matches(&walked, self.kind) {
                    Ok(Outcome::Entailed)
                } else {
                    Ok(Outcome::Failed)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::constraint;

    #[test]
    fn disequal_fails_once_terms_become_equal() {
        let (s, x) = Store::empty().fresh("x");
        let s = s
            .add_constraint(
                &constraint::disequal(Term::Var(x.clone()), Term::from(5)).unwrap(),
            )
            .unwrap()
            .unwrap();
        // binding x to 5 violates the disequality
        assert!(s.bind(&x, &Term::from(5)).unwrap().is_none());
        // binding x to 6 satisfies it and the constraint dissolves
        let s6 = s.bind(&x, &Term::from(6)).unwrap().unwrap();
        assert!(s6.active_constraints().is_empty());
    }

    #[test]
    fn disequal_over_pairs_watches_the_frontier() {
        let (s, x) = Store::empty().fresh("x");
        let (s, y) = s.fresh("y");
        let lhs = Term::list([Term::Var(x.clone()), Term::Var(y.clone())]);
        let rhs = Term::list([Term::from(1), Term::from(2)]);
        let s = s
            .add_constraint(&constraint::disequal(lhs, rhs).unwrap())
            .unwrap()
            .unwrap();
        // x = 1 alone keeps the disequality pending on y
        let s = s.bind(&x, &Term::from(1)).unwrap().unwrap();
        assert_eq!(s.active_constraints().len(), 1);
        // y = 2 completes the equality: failure
        assert!(s.bind(&y, &Term::from(2)).unwrap().is_none());
        // y = 3 discharges it
        let s3 = s.bind(&y, &Term::from(3)).unwrap().unwrap();
        assert!(s3.active_constraints().is_empty());
    }

    #[test]
    fn absent_rejects_the_atom_anywhere_in_the_tree() {
        let (s, x) = Store::empty().fresh("x");
        let tree = Term::list([Term::from(1), Term::Var(x.clone())]);
        let s = s
            .add_constraint(&constraint::absent(Value::from("bad"), tree).unwrap())
            .unwrap()
            .unwrap();
        assert!(s
            .bind(&x, &Term::list([Term::from(2), Term::from("bad")]))
            .unwrap()
            .is_none());
        let ok = s
            .bind(&x, &Term::list([Term::from(2), Term::from("good")]))
            .unwrap()
            .unwrap();
        assert!(ok.active_constraints().is_empty());
    }

    #[test]
    fn type_of_checks_ground_shapes() {
        let (s, x) = Store::empty().fresh("x");
        let s = s
            .add_constraint(
                &constraint::type_of(Term::Var(x.clone()), TypeKind::Number).unwrap(),
            )
            .unwrap()
            .unwrap();
        assert!(s.bind(&x, &Term::from("text")).unwrap().is_none());
        assert!(s.bind(&x, &Term::from(3)).unwrap().is_some());
    }
}
