//! Disequality primitives over FD variables.

use crate::{
    error::Result,
    solver::{
        constraint::{ConstraintDescriptor, Outcome, Propagator},
        store::{Revision, Shrink, Store},
    },
    term::VarId,
};

/// Enforces `x != y` by pruning a decided value out of the other domain.
#[derive(Debug, Clone)]
pub(crate) struct NotEqualPropagator {
    vars: [VarId; 2],
}

impl NotEqualPropagator {
    pub(crate) fn new(x: VarId, y: VarId) -> Self {
        Self { vars: [x, y] }
    }
}

impl Propagator for NotEqualPropagator {
    fn variables(&self) -> &[VarId] {
        &self.vars
    }

    fn descriptor(&self) -> ConstraintDescriptor {
        ConstraintDescriptor {
            name: "NotEqualConstraint".to_string(),
            description: format!("?{} != ?{}", self.vars[0], self.vars[1]),
        }
    }

    fn propagate(&self, store: &Store) -> Result<Outcome> {
        let [x, y] = self.vars;
        let mut rev = Revision::new(store);
        let dx = rev.view(x);
        let dy = rev.view(y);
        if dx.is_empty() || dy.is_empty() {
            return Ok(Outcome::Failed);
        }
        if let (Some(a), Some(b)) = (dx.value(), dy.value()) {
            return if a == b {
                Ok(Outcome::Failed)
            } else {
                Ok(Outcome::Entailed)
            };
        }
        if let Some(a) = dx.value() {
            if rev.narrow(y, &dy.remove(a)) == Shrink::Empty {
                return Ok(Outcome::Failed);
            }
        } else if let Some(b) = dy.value() {
            if rev.narrow(x, &dx.remove(b)) == Shrink::Empty {
                return Ok(Outcome::Failed);
            }
        }
        let entailed = rev.view(x).is_disjoint(&rev.view(y));
        Ok(rev.into_outcome(entailed))
    }
}

/// Enforces `|x - y| != c`. When one side is decided at `v`, the values
/// `v - c` and `v + c` leave the other domain.
#[derive(Debug, Clone)]
pub(crate) struct AbsDiffNotEqualPropagator {
    vars: [VarId; 2],
    c: u32,
}

impl AbsDiffNotEqualPropagator {
    pub(crate) fn new(x: VarId, y: VarId, c: u32) -> Self {
        Self { vars: [x, y], c }
    }
}

impl Propagator for AbsDiffNotEqualPropagator {
    fn variables(&self) -> &[VarId] {
        &self.vars
    }

    fn descriptor(&self) -> ConstraintDescriptor {
        ConstraintDescriptor {
            name: "AbsDiffNotEqualConstraint".to_string(),
            description: format!("abs(?{} - ?{}) != {}", self.vars[0], self.vars[1], self.c),
        }
    }

    fn propagate(&self, store: &Store) -> Result<Outcome> {
        let [x, y] = self.vars;
        let mut rev = Revision::new(store);
        let dx = rev.view(x);
        let dy = rev.view(y);
        if dx.is_empty() || dy.is_empty() {
            return Ok(Outcome::Failed);
        }
        if let (Some(a), Some(b)) = (dx.value(), dy.value()) {
            return if a.abs_diff(b) == self.c {
                Ok(Outcome::Failed)
            } else {
                Ok(Outcome::Entailed)
            };
        }
        if let Some(a) = dx.value() {
            let mut pruned = dy.remove(a + self.c);
            if a > self.c {
                pruned = pruned.remove(a - self.c);
            }
            if rev.narrow(y, &pruned) == Shrink::Empty {
                return Ok(Outcome::Failed);
            }
        } else if let Some(b) = dy.value() {
            let mut pruned = dx.remove(b + self.c);
            if b > self.c {
                pruned = pruned.remove(b - self.c);
            }
            if rev.narrow(x, &pruned) == Shrink::Empty {
                return Ok(Outcome::Failed);
            }
        }
        Ok(rev.into_outcome(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        solver::{constraint, domain::Domain, store::Store},
        term::Term,
    };
    use pretty_assertions::assert_eq;

    #[test]
    fn decided_value_leaves_the_peer_domain() {
        let (s, x) = Store::empty().fresh("x");
        let (s, y) = s.fresh("y");
        let s = s.set_domain(&x, &Domain::range(1, 3)).unwrap().unwrap();
        let s = s.set_domain(&y, &Domain::singleton(2)).unwrap().unwrap();
        let s = s
            .add_constraint(&constraint::not_equal(Term::from(&x), Term::from(&y)).unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(s.get_domain(&x), Some(Domain::from_values([1, 3])));
    }

    #[test]
    fn equal_singletons_fail() {
        let (s, x) = Store::empty().fresh("x");
        let (s, y) = s.fresh("y");
        let s = s.set_domain(&x, &Domain::singleton(2)).unwrap().unwrap();
        let s = s.set_domain(&y, &Domain::singleton(2)).unwrap().unwrap();
        assert!(s
            .add_constraint(&constraint::not_equal(Term::from(&x), Term::from(&y)).unwrap())
            .unwrap()
            .is_none());
    }

    #[test]
    fn abs_diff_prunes_both_offsets() {
        let (s, x) = Store::empty().fresh("x");
        let (s, y) = s.fresh("y");
        let s = s.set_domain(&x, &Domain::singleton(3)).unwrap().unwrap();
        let s = s.set_domain(&y, &Domain::range(1, 6)).unwrap().unwrap();
        let s = s
            .add_constraint(
                &constraint::abs_diff_not_equal(Term::from(&x), Term::from(&y), 2).unwrap(),
            )
            .unwrap()
            .unwrap();
        assert_eq!(s.get_domain(&y), Some(Domain::from_values([2, 3, 4, 6])));
    }
}
