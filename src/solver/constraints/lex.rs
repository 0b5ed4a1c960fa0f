//! Lexicographic ordering over tuples of FD variables.

use crate::{
    error::Result,
    solver::{
        constraint::{ConstraintDescriptor, Outcome, Propagator},
        constraints::bounds,
        store::{Revision, Shrink, Store},
    },
    term::VarId,
};

/// Enforces `xs <lex ys` (strict) or `xs <=lex ys`.
///
/// The scan walks positions while the prefix is forced equal (both sides
/// decided to the same value). At the frontier position it enforces
/// `x_i <= y_i` by bounds; when `max(x_i) < min(y_i)` the ordering is
/// decided there and the constraint dissolves. A strict ordering over a
/// fully equal pair of tuples is inconsistent.
#[derive(Debug, Clone)]
pub(crate) struct LexPropagator {
    xs: Vec<VarId>,
    ys: Vec<VarId>,
    strict: bool,
    vars: Vec<VarId>,
}

impl LexPropagator {
    pub(crate) fn new(xs: Vec<VarId>, ys: Vec<VarId>, strict: bool) -> Self {
        let mut vars = xs.clone();
        vars.extend(&ys);
        Self {
            xs,
            ys,
            strict,
            vars,
        }
    }
}

impl Propagator for LexPropagator {
    fn variables(&self) -> &[VarId] {
        &self.vars
    }

    fn descriptor(&self) -> ConstraintDescriptor {
        let op = if self.strict { "<lex" } else { "<=lex" };
        ConstraintDescriptor {
            name: "LexConstraint".to_string(),
            description: format!("{}-tuple {} {}-tuple", self.xs.len(), op, self.ys.len()),
        }
    }

    fn propagate(&self, store: &Store) -> Result<Outcome> {
        let mut rev = Revision::new(store);
        for i in 0..self.xs.len() {
            let (x, y) = (self.xs[i], self.ys[i]);
            if bounds(&rev.view(x)).is_none() || bounds(&rev.view(y)).is_none() {
                return Ok(Outcome::Failed);
            }
            // With the prefix forced equal, x_i must not exceed y_i.
            let (_, yh) = bounds(&rev.view(y)).unwrap();
            if rev.narrow_bounds(x, 1, yh) == Shrink::Empty {
                return Ok(Outcome::Failed);
            }
            let (xl, _) = bounds(&rev.view(x)).unwrap();
            if rev.narrow_bounds(y, xl, rev.max_value() as i64) == Shrink::Empty {
                return Ok(Outcome::Failed);
            }
            let dx = rev.view(x);
            let dy = rev.view(y);
            if dx.max().unwrap() < dy.min().unwrap() {
                // Strictly smaller at the frontier: decided.
                return Ok(rev.into_outcome(true));
            }
            let forced_equal = dx.value().is_some() && dx.value() == dy.value();
            if !forced_equal {
                return Ok(rev.into_outcome(false));
            }
        }
        // Every position is pinned equal.
        if self.strict {
            Ok(Outcome::Failed)
        } else {
            Ok(rev.into_outcome(true))
        }
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

    fn tuple(store: Store, doms: &[(u32, u32)]) -> (Store, Vec<crate::term::LVar>) {
        let mut store = store;
        let mut out = Vec::new();
        for (lo, hi) in doms {
            let (s, v) = store.fresh("t");
            store = s.set_domain(&v, &Domain::range(*lo, *hi)).unwrap().unwrap();
            out.push(v);
        }
        (store, out)
    }

    #[test]
    fn frontier_position_is_bounded() {
        let (s, xs) = tuple(Store::empty(), &[(3, 3), (1, 9)]);
        let (s, ys) = tuple(s, &[(3, 3), (2, 5)]);
        let s = s
            .add_constraint(
                &constraint::lex_less_eq(
                    xs.iter().map(Term::from).collect(),
                    ys.iter().map(Term::from).collect(),
                )
                .unwrap(),
            )
            .unwrap()
            .unwrap();
        // prefix (3) == (3) is pinned, so x2 <= max(y2) = 5
        assert_eq!(s.get_domain(&xs[1]), Some(Domain::range(1, 5)));
    }

    #[test]
    fn decided_frontier_dissolves_the_constraint() {
        let (s, xs) = tuple(Store::empty(), &[(1, 2), (1, 9)]);
        let (s, ys) = tuple(s, &[(5, 9), (1, 9)]);
        let s = s
            .add_constraint(
                &constraint::lex_less(
                    xs.iter().map(Term::from).collect(),
                    ys.iter().map(Term::from).collect(),
                )
                .unwrap(),
            )
            .unwrap()
            .unwrap();
        assert!(s.active_constraints().is_empty());
        // no pruning beyond the frontier
        assert_eq!(s.get_domain(&xs[1]), Some(Domain::range(1, 9)));
    }

    #[test]
    fn fully_equal_singleton_tuples_fail_the_strict_order() {
        let (s, xs) = tuple(Store::empty(), &[(2, 2), (4, 4)]);
        let (s, ys) = tuple(s, &[(2, 2), (4, 4)]);
        let strict = s
            .add_constraint(
                &constraint::lex_less(
                    xs.iter().map(Term::from).collect(),
                    ys.iter().map(Term::from).collect(),
                )
                .unwrap(),
            )
            .unwrap();
        assert!(strict.is_none());
        let weak = s
            .add_constraint(
                &constraint::lex_less_eq(
                    xs.iter().map(Term::from).collect(),
                    ys.iter().map(Term::from).collect(),
                )
                .unwrap(),
            )
            .unwrap();
        assert!(weak.is_some());
    }

    #[test]
    fn greater_head_fails_immediately() {
        let (s, xs) = tuple(Store::empty(), &[(7, 7), (1, 9)]);
        let (s, ys) = tuple(s, &[(2, 2), (1, 9)]);
        let result = s
            .add_constraint(
                &constraint::lex_less(
                    xs.iter().map(Term::from).collect(),
                    ys.iter().map(Term::from).collect(),
                )
                .unwrap(),
            )
            .unwrap();
        assert!(result.is_none());
    }
}
