//! Min and Max over a set of FD variables.

use crate::{
    error::Result,
    solver::{
        constraint::{ConstraintDescriptor, Outcome, Propagator},
        constraints::bounds,
        store::{Revision, Shrink, Store},
    },
    term::VarId,
};

/// Enforces `result = min(vars)`: the result ranges between the smallest
/// lower bound and the smallest upper bound, and no variable may go below
/// the result's lower bound.
#[derive(Debug, Clone)]
pub(crate) struct MinPropagator {
    xs: Vec<VarId>,
    result: VarId,
    vars: Vec<VarId>,
}

impl MinPropagator {
    pub(crate) fn new(xs: Vec<VarId>, result: VarId) -> Self {
        let mut vars = xs.clone();
        vars.push(result);
        Self { xs, result, vars }
    }
}

impl Propagator for MinPropagator {
    fn variables(&self) -> &[VarId] {
        &self.vars
    }

    fn descriptor(&self) -> ConstraintDescriptor {
        ConstraintDescriptor {
            name: "MinConstraint".to_string(),
            description: format!("?{} = min({} vars)", self.result, self.xs.len()),
        }
    }

    fn propagate(&self, store: &Store) -> Result<Outcome> {
        let mut rev = Revision::new(store);
        let mut lo = i64::MAX;
        let mut hi = i64::MAX;
        for x in &self.xs {
            let Some((l, h)) = bounds(&rev.view(*x)) else {
                return Ok(Outcome::Failed);
            };
            lo = lo.min(l);
            hi = hi.min(h);
        }
        if rev.narrow_bounds(self.result, lo, hi) == Shrink::Empty {
            return Ok(Outcome::Failed);
        }
        let (rl, _) = bounds(&rev.view(self.result)).unwrap();
        for x in &self.xs {
            if rev.narrow_bounds(*x, rl, rev.max_value() as i64) == Shrink::Empty {
                return Ok(Outcome::Failed);
            }
        }
        let entailed = rev.view(self.result).is_singleton()
            && self.xs.iter().all(|x| rev.view(*x).is_singleton());
        Ok(rev.into_outcome(entailed))
    }
}

/// Enforces `result = max(vars)`, symmetric to [`MinPropagator`].
#[derive(Debug, Clone)]
pub(crate) struct MaxPropagator {
    xs: Vec<VarId>,
    result: VarId,
    vars: Vec<VarId>,
}

impl MaxPropagator {
    pub(crate) fn new(xs: Vec<VarId>, result: VarId) -> Self {
        let mut vars = xs.clone();
        vars.push(result);
        Self { xs, result, vars }
    }
}

impl Propagator for MaxPropagator {
    fn variables(&self) -> &[VarId] {
        &self.vars
    }

    fn descriptor(&self) -> ConstraintDescriptor {
        ConstraintDescriptor {
            name: "MaxConstraint".to_string(),
            description: format!("?{} = max({} vars)", self.result, self.xs.len()),
        }
    }

    fn propagate(&self, store: &Store) -> Result<Outcome> {
        let mut rev = Revision::new(store);
        let mut lo = i64::MIN;
        let mut hi = i64::MIN;
        for x in &self.xs {
            let Some((l, h)) = bounds(&rev.view(*x)) else {
                return Ok(Outcome::Failed);
            };
            lo = lo.max(l);
            hi = hi.max(h);
        }
        if rev.narrow_bounds(self.result, lo, hi) == Shrink::Empty {
            return Ok(Outcome::Failed);
        }
        let (_, rh) = bounds(&rev.view(self.result)).unwrap();
        for x in &self.xs {
            if rev.narrow_bounds(*x, 1, rh) == Shrink::Empty {
                return Ok(Outcome::Failed);
            }
        }
        let entailed = rev.view(self.result).is_singleton()
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
    fn min_bounds_follow_the_smallest_bounds() {
        let (s, a) = fd(Store::empty(), 3, 8);
        let (s, b) = fd(s, 5, 6);
        let (s, r) = fd(s, 1, 20);
        let s = s
            .add_constraint(
                &constraint::min_of(vec![Term::from(&a), Term::from(&b)], Term::from(&r))
                    .unwrap(),
            )
            .unwrap()
            .unwrap();
        // r in [min(3,5) .. min(8,6)] = [3..6]
        assert_eq!(s.get_domain(&r), Some(Domain::range(3, 6)));
    }

    #[test]
    fn min_lower_bound_lifts_every_variable() {
        let (s, a) = fd(Store::empty(), 1, 8);
        let (s, b) = fd(s, 1, 6);
        let (s, r) = fd(s, 4, 20);
        let s = s
            .add_constraint(
                &constraint::min_of(vec![Term::from(&a), Term::from(&b)], Term::from(&r))
                    .unwrap(),
            )
            .unwrap()
            .unwrap();
        assert_eq!(s.get_domain(&a), Some(Domain::range(4, 8)));
        assert_eq!(s.get_domain(&b), Some(Domain::range(4, 6)));
    }

    #[test]
    fn max_caps_every_variable() {
        let (s, a) = fd(Store::empty(), 1, 9);
        let (s, b) = fd(s, 2, 9);
        let (s, r) = fd(s, 1, 5);
        let s = s
            .add_constraint(
                &constraint::max_of(vec![Term::from(&a), Term::from(&b)], Term::from(&r))
                    .unwrap(),
            )
            .unwrap()
            .unwrap();
        assert_eq!(s.get_domain(&a), Some(Domain::range(1, 5)));
        assert_eq!(s.get_domain(&b), Some(Domain::range(2, 5)));
    }
}
