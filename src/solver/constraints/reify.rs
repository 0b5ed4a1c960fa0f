//! Reified constraints: booleans tracking equality and set membership.

use crate::{
    error::Result,
    solver::{
        constraint::{ConstraintDescriptor, Outcome, Propagator},
        constraints::{is_false, is_true, FALSE, TRUE},
        domain::Domain,
        store::{Revision, Shrink, Store},
    },
    term::VarId,
};

/// Enforces `b <=> (x == y)` in both directions: a decided boolean imposes
/// equality or disequality, and decided domains settle the boolean.
#[derive(Debug, Clone)]
pub(crate) struct EqualityReifiedPropagator {
    x: VarId,
    y: VarId,
    b: VarId,
    vars: [VarId; 3],
}

impl EqualityReifiedPropagator {
    pub(crate) fn new(x: VarId, y: VarId, b: VarId) -> Self {
        Self {
            x,
            y,
            b,
            vars: [b, x, y],
        }
    }
}

impl Propagator for EqualityReifiedPropagator {
    fn variables(&self) -> &[VarId] {
        &self.vars
    }

    fn descriptor(&self) -> ConstraintDescriptor {
        ConstraintDescriptor {
            name: "EqualityReifiedConstraint".to_string(),
            description: format!("?{} <==> (?{} == ?{})", self.b, self.x, self.y),
        }
    }

    fn propagate(&self, store: &Store) -> Result<Outcome> {
        let mut rev = Revision::new(store);
        let db = rev.view(self.b);
        let dx = rev.view(self.x);
        let dy = rev.view(self.y);
        if db.is_empty() || dx.is_empty() || dy.is_empty() {
            return Ok(Outcome::Failed);
        }

        if is_true(&db) {
            let meet = dx.intersect(&dy);
            if meet.is_empty() {
                return Ok(Outcome::Failed);
            }
            if rev.narrow(self.x, &meet) == Shrink::Empty {
                return Ok(Outcome::Failed);
            }
            if rev.narrow(self.y, &meet) == Shrink::Empty {
                return Ok(Outcome::Failed);
            }
            let vx = rev.view(self.x).value();
            let entailed = vx.is_some() && vx == rev.view(self.y).value();
            return Ok(rev.into_outcome(entailed));
        }

        if is_false(&db) {
            if let (Some(a), Some(c)) = (dx.value(), dy.value()) {
                if a == c {
                    return Ok(Outcome::Failed);
                }
            }
            if let Some(a) = dx.value() {
                if rev.narrow(self.y, &dy.remove(a)) == Shrink::Empty {
                    return Ok(Outcome::Failed);
                }
            } else if let Some(c) = dy.value() {
                if rev.narrow(self.x, &dx.remove(c)) == Shrink::Empty {
                    return Ok(Outcome::Failed);
                }
            }
            let entailed = rev.view(self.x).is_disjoint(&rev.view(self.y));
            return Ok(rev.into_outcome(entailed));
        }

        if dx.is_disjoint(&dy) {
            if rev.narrow(self.b, &Domain::singleton(FALSE)) == Shrink::Empty {
                return Ok(Outcome::Failed);
            }
            return Ok(rev.into_outcome(true));
        }
        if let (Some(a), Some(c)) = (dx.value(), dy.value()) {
            if a == c {
                if rev.narrow(self.b, &Domain::singleton(TRUE)) == Shrink::Empty {
                    return Ok(Outcome::Failed);
                }
                return Ok(rev.into_outcome(true));
            }
        }
        Ok(rev.into_outcome(false))
    }
}

/// Enforces `b <=> (v in set)`.
///
/// Decided membership settles the boolean; a decided boolean intersects the
/// variable with the set or with its complement.
#[derive(Debug, Clone)]
pub(crate) struct InSetReifiedPropagator {
    v: VarId,
    set: Domain,
    b: VarId,
    vars: [VarId; 2],
}

impl InSetReifiedPropagator {
    pub(crate) fn new(v: VarId, set: Domain, b: VarId) -> Self {
        Self {
            v,
            set,
            b,
            vars: [b, v],
        }
    }
}

impl Propagator for InSetReifiedPropagator {
    fn variables(&self) -> &[VarId] {
        &self.vars
    }

    fn descriptor(&self) -> ConstraintDescriptor {
        ConstraintDescriptor {
            name: "InSetReifiedConstraint".to_string(),
            description: format!("?{} <==> (?{} in {:?})", self.b, self.v, self.set),
        }
    }

    fn propagate(&self, store: &Store) -> Result<Outcome> {
        let mut rev = Revision::new(store);
        let db = rev.view(self.b);
        let dv = rev.view(self.v);
        if db.is_empty() || dv.is_empty() {
            return Ok(Outcome::Failed);
        }

        if dv.is_disjoint(&self.set) {
            if rev.narrow(self.b, &Domain::singleton(FALSE)) == Shrink::Empty {
                return Ok(Outcome::Failed);
            }
            return Ok(rev.into_outcome(true));
        }
        if dv.is_subset(&self.set) {
            if rev.narrow(self.b, &Domain::singleton(TRUE)) == Shrink::Empty {
                return Ok(Outcome::Failed);
            }
            return Ok(rev.into_outcome(true));
        }

        if is_true(&db) {
            if rev.narrow(self.v, &self.set) == Shrink::Empty {
                return Ok(Outcome::Failed);
            }
            return Ok(rev.into_outcome(true));
        }
        if is_false(&db) {
            if rev.narrow(self.v, &dv.difference(&self.set)) == Shrink::Empty {
                return Ok(Outcome::Failed);
            }
            return Ok(rev.into_outcome(true));
        }
        Ok(rev.into_outcome(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        solver::{constraint, store::Store},
        term::Term,
    };
    use pretty_assertions::assert_eq;

    fn fd(store: Store, lo: u32, hi: u32) -> (Store, crate::term::LVar) {
        let (s, v) = store.fresh("v");
        let s = s.set_domain(&v, &Domain::range(lo, hi)).unwrap().unwrap();
        (s, v)
    }

    #[test]
    fn true_boolean_imposes_equality() {
        let (s, x) = fd(Store::empty(), 1, 5);
        let (s, y) = fd(s, 4, 9);
        let (s, b) = fd(s, 2, 2);
        let s = s
            .add_constraint(
                &constraint::equality_reified(Term::from(&x), Term::from(&y), Term::from(&b))
                    .unwrap(),
            )
            .unwrap()
            .unwrap();
        assert_eq!(s.get_domain(&x), Some(Domain::range(4, 5)));
        assert_eq!(s.get_domain(&y), Some(Domain::range(4, 5)));
    }

    #[test]
    fn disjoint_domains_clear_the_boolean() {
        let (s, x) = fd(Store::empty(), 1, 3);
        let (s, y) = fd(s, 4, 6);
        let (s, b) = fd(s, 1, 2);
        let s = s
            .add_constraint(
                &constraint::equality_reified(Term::from(&x), Term::from(&y), Term::from(&b))
                    .unwrap(),
            )
            .unwrap()
            .unwrap();
        assert_eq!(s.get_domain(&b), Some(Domain::singleton(FALSE)));
    }

    #[test]
    fn equal_singletons_set_the_boolean() {
        let (s, x) = fd(Store::empty(), 3, 3);
        let (s, y) = fd(s, 3, 3);
        let (s, b) = fd(s, 1, 2);
        let s = s
            .add_constraint(
                &constraint::equality_reified(Term::from(&x), Term::from(&y), Term::from(&b))
                    .unwrap(),
            )
            .unwrap()
            .unwrap();
        assert_eq!(s.get_domain(&b), Some(Domain::singleton(TRUE)));
    }

    #[test]
    fn membership_settles_the_boolean_both_ways() {
        // subset: b := true
        let (s, v) = fd(Store::empty(), 2, 3);
        let (s, b) = fd(s, 1, 2);
        let s = s
            .add_constraint(
                &constraint::in_set_reified(
                    Term::from(&v),
                    Domain::range(1, 5),
                    Term::from(&b),
                )
                .unwrap(),
            )
            .unwrap()
            .unwrap();
        assert_eq!(s.get_domain(&b), Some(Domain::singleton(TRUE)));

        // disjoint: b := false
        let (s, v) = fd(Store::empty(), 6, 9);
        let (s, b) = fd(s, 1, 2);
        let s = s
            .add_constraint(
                &constraint::in_set_reified(
                    Term::from(&v),
                    Domain::range(1, 5),
                    Term::from(&b),
                )
                .unwrap(),
            )
            .unwrap()
            .unwrap();
        assert_eq!(s.get_domain(&b), Some(Domain::singleton(FALSE)));
    }

    #[test]
    fn decided_boolean_carves_the_domain() {
        let (s, v) = fd(Store::empty(), 1, 9);
        let (s, b) = fd(s, 1, 1);
        let s = s
            .add_constraint(
                &constraint::in_set_reified(
                    Term::from(&v),
                    Domain::range(3, 5),
                    Term::from(&b),
                )
                .unwrap(),
            )
            .unwrap()
            .unwrap();
        assert_eq!(
            s.get_domain(&v),
            Some(Domain::from_values([1, 2, 6, 7, 8, 9]))
        );
    }
}
