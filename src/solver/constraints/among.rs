//! The Among global constraint.

use crate::{
    error::Result,
    solver::{
        constraint::{ConstraintDescriptor, Outcome, Propagator},
        domain::Domain,
        store::{Revision, Shrink, Store},
    },
    term::VarId,
};

/// Enforces `count - 1 = |{ i : vars[i] in set }|`.
///
/// Variables are classified as mandatory (domain inside the set), disjoint,
/// or possible. The classification brackets the count; a tight count forces
/// the possible variables into or out of the set.
#[derive(Debug, Clone)]
pub(crate) struct AmongPropagator {
    xs: Vec<VarId>,
    set: Domain,
    count: VarId,
    vars: Vec<VarId>,
}

impl AmongPropagator {
    pub(crate) fn new(xs: Vec<VarId>, set: Domain, count: VarId) -> Self {
        let mut vars = xs.clone();
        vars.push(count);
        Self {
            xs,
            set,
            count,
            vars,
        }
    }
}

impl Propagator for AmongPropagator {
    fn variables(&self) -> &[VarId] {
        &self.vars
    }

    fn descriptor(&self) -> ConstraintDescriptor {
        ConstraintDescriptor {
            name: "AmongConstraint".to_string(),
            description: format!("among({} vars, {:?}) = ?{} - 1", self.xs.len(), self.set, self.count),
        }
    }

    fn propagate(&self, store: &Store) -> Result<Outcome> {
        let mut rev = Revision::new(store);
        let mut mandatory = 0i64;
        let mut possible = Vec::new();
        for x in &self.xs {
            let dx = rev.view(*x);
            if dx.is_empty() {
                return Ok(Outcome::Failed);
            }
            if dx.is_subset(&self.set) {
                mandatory += 1;
            } else if !dx.is_disjoint(&self.set) {
                possible.push(*x);
            }
        }
        let reach = mandatory + possible.len() as i64;
        if rev.narrow_bounds(self.count, mandatory + 1, reach + 1) == Shrink::Empty {
            return Ok(Outcome::Failed);
        }
        let dk = rev.view(self.count);
        let (kl, kh) = (dk.min().unwrap() as i64, dk.max().unwrap() as i64);
        if kh - 1 == mandatory {
            // No possible variable may enter the set.
            for x in &possible {
                let dx = rev.view(*x);
                if rev.narrow(*x, &dx.difference(&self.set)) == Shrink::Empty {
                    return Ok(Outcome::Failed);
                }
            }
        } else if kl - 1 == reach {
            // Every possible variable must land in the set.
            for x in &possible {
                if rev.narrow(*x, &self.set) == Shrink::Empty {
                    return Ok(Outcome::Failed);
                }
            }
        }
        let entailed = rev.view(self.count).is_singleton()
            && self.xs.iter().all(|x| {
                let d = rev.view(*x);
                d.is_subset(&self.set) || d.is_disjoint(&self.set)
            });
        Ok(rev.into_outcome(entailed))
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

    fn fd(store: Store, dom: Domain) -> (Store, crate::term::LVar) {
        let (s, v) = store.fresh("v");
        let s = s.set_domain(&v, &dom).unwrap().unwrap();
        (s, v)
    }

    #[test]
    fn classification_brackets_the_count() {
        let set = Domain::range(1, 3);
        let (s, a) = fd(Store::empty(), Domain::range(1, 2)); // mandatory
        let (s, b) = fd(s, Domain::range(5, 6)); // disjoint
        let (s, c) = fd(s, Domain::range(2, 5)); // possible
        let (s, k) = fd(s, Domain::range(1, 9));
        let s = s
            .add_constraint(
                &constraint::among(
                    vec![Term::from(&a), Term::from(&b), Term::from(&c)],
                    set,
                    Term::from(&k),
                )
                .unwrap(),
            )
            .unwrap()
            .unwrap();
        // one mandatory, one possible: count in [1..2], encoded [2..3]
        assert_eq!(s.get_domain(&k), Some(Domain::range(2, 3)));
    }

    #[test]
    fn tight_count_forces_possible_variables_out() {
        let set = Domain::range(1, 3);
        let (s, a) = fd(Store::empty(), Domain::range(1, 2)); // mandatory
        let (s, c) = fd(s, Domain::range(2, 5)); // possible
        let (s, k) = fd(s, Domain::singleton(2)); // exactly one inside
        let s = s
            .add_constraint(
                &constraint::among(vec![Term::from(&a), Term::from(&c)], set, Term::from(&k))
                    .unwrap(),
            )
            .unwrap()
            .unwrap();
        assert_eq!(s.get_domain(&c), Some(Domain::range(4, 5)));
    }

    #[test]
    fn tight_count_pulls_possible_variables_in() {
        let set = Domain::range(1, 3);
        let (s, a) = fd(Store::empty(), Domain::range(2, 5));
        let (s, b) = fd(s, Domain::range(3, 7));
        let (s, k) = fd(s, Domain::singleton(3)); // both inside
        let s = s
            .add_constraint(
                &constraint::among(vec![Term::from(&a), Term::from(&b)], set, Term::from(&k))
                    .unwrap(),
            )
            .unwrap()
            .unwrap();
        assert_eq!(s.get_domain(&a), Some(Domain::range(2, 3)));
        assert_eq!(s.get_domain(&b), Some(Domain::singleton(3)));
    }
}
