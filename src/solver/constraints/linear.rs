//! The weighted linear sum primitive.

use crate::{
    error::Result,
    solver::{
        constraint::{ConstraintDescriptor, Outcome, Propagator},
        constraints::{bounds, div_ceil, div_floor},
        store::{Revision, Shrink, Store},
    },
    term::VarId,
};

/// Enforces `sum(weights[i] * xs[i]) + constant = total`, bounds-consistent
/// in every operand.
#[derive(Debug, Clone)]
pub(crate) struct LinearSumPropagator {
    weights: Vec<i64>,
    xs: Vec<VarId>,
    constant: i64,
    total: VarId,
    vars: Vec<VarId>,
}

impl LinearSumPropagator {
    pub(crate) fn new(weights: Vec<i64>, xs: Vec<VarId>, constant: i64, total: VarId) -> Self {
        let mut vars = xs.clone();
        vars.push(total);
        Self {
            weights,
            xs,
            constant,
            total,
            vars,
        }
    }

    /// `(lo, hi)` of `weights[i] * xs[i]` for each term, from the current
    /// views.
    fn term_bounds(&self, rev: &Revision) -> Option<Vec<(i64, i64)>> {
        self.xs
            .iter()
            .zip(self.weights.iter())
            .map(|(x, w)| {
                let (l, h) = bounds(&rev.view(*x))?;
                if *w >= 0 {
                    Some((w * l, w * h))
                } else {
                    Some((w * h, w * l))
                }
            })
            .collect()
    }
}

impl Propagator for LinearSumPropagator {
    fn variables(&self) -> &[VarId] {
        &self.vars
    }

    fn descriptor(&self) -> ConstraintDescriptor {
        let terms = self
            .weights
            .iter()
            .zip(self.xs.iter())
            .map(|(w, x)| format!("{}*?{}", w, x))
            .collect::<Vec<_>>()
            .join(" + ");
        ConstraintDescriptor {
            name: "LinearSumConstraint".to_string(),
            description: format!("{} + {} = ?{}", terms, self.constant, self.total),
        }
    }

    fn propagate(&self, store: &Store) -> Result<Outcome> {
        let mut rev = Revision::new(store);
        let Some(terms) = self.term_bounds(&rev) else {
            return Ok(Outcome::Failed);
        };
        if bounds(&rev.view(self.total)).is_none() {
            return Ok(Outcome::Failed);
        }
        let lo: i64 = self.constant + terms.iter().map(|(l, _)| l).sum::<i64>();
        let hi: i64 = self.constant + terms.iter().map(|(_, h)| h).sum::<i64>();
        if rev.narrow_bounds(self.total, lo, hi) == Shrink::Empty {
            return Ok(Outcome::Failed);
        }

        for i in 0..self.xs.len() {
            let (tl, th) = bounds(&rev.view(self.total)).unwrap();
            let Some(terms) = self.term_bounds(&rev) else {
                return Ok(Outcome::Failed);
            };
            let others_lo: i64 = self.constant
                + terms
                    .iter()
                    .enumerate()
                    .filter(|(j, _)| *j != i)
                    .map(|(_, (l, _))| l)
                    .sum::<i64>();
            let others_hi: i64 = self.constant
                + terms
                    .iter()
                    .enumerate()
                    .filter(|(j, _)| *j != i)
                    .map(|(_, (_, h))| h)
                    .sum::<i64>();
            // weights[i] * xs[i] must lie in [a, b]
            let a = tl - others_hi;
            let b = th - others_lo;
            let w = self.weights[i];
            if w == 0 {
                if a > 0 || b < 0 {
                    return Ok(Outcome::Failed);
                }
                continue;
            }
            let (lo_i, hi_i) = if w > 0 {
                (div_ceil(a, w), div_floor(b, w))
            } else {
                (div_ceil(b, w), div_floor(a, w))
            };
            if rev.narrow_bounds(self.xs[i], lo_i, hi_i) == Shrink::Empty {
                return Ok(Outcome::Failed);
            }
        }

        let entailed = rev.view(self.total).is_singleton()
            && self.xs.iter().all(|x| rev.view(*x).is_singleton());
        Ok(rev.into_outcome(entailed))
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

    fn fd(store: Store, lo: u32, hi: u32) -> (Store, crate::term::LVar) {
        let (s, v) = store.fresh("v");
        let s = s.set_domain(&v, &Domain::range(lo, hi)).unwrap().unwrap();
        (s, v)
    }

    #[test]
    fn total_follows_the_weighted_terms() {
        let (s, a) = fd(Store::empty(), 1, 3);
        let (s, b) = fd(s, 2, 2);
        let (s, t) = fd(s, 1, 100);
        // 2a + 3b + 0 = t, a in [1..3], b = 2  =>  t in [8..12]
        let s = s
            .add_constraint(
                &constraint::linear_sum(
                    vec![2, 3],
                    vec![Term::from(&a), Term::from(&b)],
                    0,
                    Term::from(&t),
                )
                .unwrap(),
            )
            .unwrap()
            .unwrap();
        assert_eq!(s.get_domain(&t), Some(Domain::range(8, 12)));
    }

    #[test]
    fn terms_follow_a_fixed_total() {
        let (s, a) = fd(Store::empty(), 1, 10);
        let (s, t) = fd(s, 7, 7);
        // 2a + 1 = 7 => a = 3
        let s = s
            .add_constraint(
                &constraint::linear_sum(vec![2], vec![Term::from(&a)], 1, Term::from(&t)).unwrap(),
            )
            .unwrap()
            .unwrap();
        assert_eq!(s.get_domain(&a), Some(Domain::singleton(3)));
    }

    #[test]
    fn rounding_is_tight_for_fractional_quotients() {
        let (s, a) = fd(Store::empty(), 1, 10);
        let (s, t) = fd(s, 8, 9);
        // 3a = t in [8..9] => a = 3 (9/3), since 8 is not divisible by 3
        let s = s
            .add_constraint(
                &constraint::linear_sum(vec![3], vec![Term::from(&a)], 0, Term::from(&t)).unwrap(),
            )
            .unwrap()
            .unwrap();
        assert_eq!(s.get_domain(&a), Some(Domain::singleton(3)));
        assert_eq!(s.get_domain(&t), Some(Domain::singleton(9)));
    }
}
