//! The global cardinality constraint.

use crate::{
    error::Result,
    solver::{
        constraint::{ConstraintDescriptor, Outcome, Propagator},
        store::{Revision, Shrink, Store},
    },
    term::VarId,
};

/// Bounds the occurrence count of each value `v` in `1..=counts.len()`:
/// at least `min_counts[v-1]` and at most `max_counts[v-1]` of the
/// variables take it. A value at its maximum leaves every undecided domain.
///
/// With min 0 / max 1 per value this is AllDifferent.
#[derive(Debug, Clone)]
pub(crate) struct GccPropagator {
    xs: Vec<VarId>,
    min_counts: Vec<u32>,
    max_counts: Vec<u32>,
}

impl GccPropagator {
    pub(crate) fn new(xs: Vec<VarId>, min_counts: Vec<u32>, max_counts: Vec<u32>) -> Self {
        Self {
            xs,
            min_counts,
            max_counts,
        }
    }
}

impl Propagator for GccPropagator {
    fn variables(&self) -> &[VarId] {
        &self.xs
    }

    fn descriptor(&self) -> ConstraintDescriptor {
        ConstraintDescriptor {
            name: "GccConstraint".to_string(),
            description: format!(
                "gcc({} vars over 1..={})",
                self.xs.len(),
                self.min_counts.len()
            ),
        }
    }

    fn propagate(&self, store: &Store) -> Result<Outcome> {
        let mut rev = Revision::new(store);
        for x in &self.xs {
            if rev.view(*x).is_empty() {
                return Ok(Outcome::Failed);
            }
        }
        for value in 1..=self.min_counts.len() as u32 {
            let mut fixed = 0u32;
            let mut possible = 0u32;
            for x in &self.xs {
                let dx = rev.view(*x);
                if dx.contains(value) {
                    possible += 1;
                    if dx.value() == Some(value) {
                        fixed += 1;
                    }
                }
            }
            let (lo, hi) = (
                self.min_counts[value as usize - 1],
                self.max_counts[value as usize - 1],
            );
            if fixed > hi || possible < lo {
                return Ok(Outcome::Failed);
            }
            if fixed == hi {
                for x in &self.xs {
                    let dx = rev.view(*x);
                    if dx.contains(value) && dx.value() != Some(value) {
                        if rev.narrow(*x, &dx.remove(value)) == Shrink::Empty {
                            return Ok(Outcome::Failed);
                        }
                    }
                }
            }
        }
        let entailed = self.xs.iter().all(|x| rev.view(*x).is_singleton());
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

    fn fd(store: Store, dom: Domain) -> (Store, crate::term::LVar) {
        let (s, v) = store.fresh("v");
        let s = s.set_domain(&v, &dom).unwrap().unwrap();
        (s, v)
    }

    #[test]
    fn saturated_value_leaves_undecided_domains() {
        // AllDifferent-style: max one occurrence per value.
        let (s, a) = fd(Store::empty(), Domain::singleton(2));
        let (s, b) = fd(s, Domain::range(1, 3));
        let (s, c) = fd(s, Domain::range(1, 3));
        let s = s
            .add_constraint(
                &constraint::gcc(
                    vec![Term::from(&a), Term::from(&b), Term::from(&c)],
                    vec![0, 0, 0],
                    vec![1, 1, 1],
                )
                .unwrap(),
            )
            .unwrap()
            .unwrap();
        assert_eq!(s.get_domain(&b), Some(Domain::from_values([1, 3])));
        assert_eq!(s.get_domain(&c), Some(Domain::from_values([1, 3])));
    }

    #[test]
    fn overfull_value_fails() {
        let (s, a) = fd(Store::empty(), Domain::singleton(1));
        let (s, b) = fd(s, Domain::singleton(1));
        let result = s
            .add_constraint(
                &constraint::gcc(
                    vec![Term::from(&a), Term::from(&b)],
                    vec![0, 0],
                    vec![1, 2],
                )
                .unwrap(),
            )
            .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn unreachable_minimum_fails() {
        let (s, a) = fd(Store::empty(), Domain::range(2, 3));
        let (s, b) = fd(s, Domain::range(2, 3));
        // value 1 needs at least one occurrence but no domain contains it
        let result = s
            .add_constraint(
                &constraint::gcc(
                    vec![Term::from(&a), Term::from(&b)],
                    vec![1, 0, 0],
                    vec![2, 2, 2],
                )
                .unwrap(),
            )
            .unwrap();
        assert!(result.is_none());
    }
}
