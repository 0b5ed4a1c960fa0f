//! Element over a fixed value table.

use crate::{
    error::Result,
    solver::{
        constraint::{ConstraintDescriptor, Outcome, Propagator},
        domain::Domain,
        store::{Revision, Shrink, Store},
    },
    term::VarId,
};

/// Enforces `result = values[index - 1]`, arc-consistent over the finite
/// table: the result ranges over the images of the live indices, and the
/// index ranges over the positions whose value is still possible.
#[derive(Debug, Clone)]
pub(crate) struct ElementPropagator {
    index: VarId,
    values: Vec<u32>,
    result: VarId,
    vars: [VarId; 2],
}

impl ElementPropagator {
    pub(crate) fn new(index: VarId, values: Vec<u32>, result: VarId) -> Self {
        Self {
            index,
            values,
            result,
            vars: [index, result],
        }
    }
}

impl Propagator for ElementPropagator {
    fn variables(&self) -> &[VarId] {
        &self.vars
    }

    fn descriptor(&self) -> ConstraintDescriptor {
        ConstraintDescriptor {
            name: "ElementConstraint".to_string(),
            description: format!("?{} = {:?}[?{} - 1]", self.result, self.values, self.index),
        }
    }

    fn propagate(&self, store: &Store) -> Result<Outcome> {
        let mut rev = Revision::new(store);
        if rev.narrow_bounds(self.index, 1, self.values.len() as i64) == Shrink::Empty {
            return Ok(Outcome::Failed);
        }
        let di = rev.view(self.index);
        let image = Domain::from_values(di.iter().map(|i| self.values[i as usize - 1]));
        if rev.narrow(self.result, &image) == Shrink::Empty {
            return Ok(Outcome::Failed);
        }
        let dr = rev.view(self.result);
        let support = Domain::from_values(
            di.iter()
                .filter(|i| dr.contains(self.values[*i as usize - 1])),
        );
        if rev.narrow(self.index, &support) == Shrink::Empty {
            return Ok(Outcome::Failed);
        }
        let entailed = rev.view(self.index).is_singleton() && rev.view(self.result).is_singleton();
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

    #[test]
    fn index_clamps_to_the_table_and_result_to_its_image() {
        let (s, i) = Store::empty().fresh("i");
        let (s, r) = s.fresh("r");
        let s = s.set_domain(&i, &Domain::range(1, 50)).unwrap().unwrap();
        let s = s.set_domain(&r, &Domain::range(1, 50)).unwrap().unwrap();
        let s = s
            .add_constraint(
                &constraint::element(Term::from(&i), vec![5, 7, 5, 9], Term::from(&r)).unwrap(),
            )
            .unwrap()
            .unwrap();
        assert_eq!(s.get_domain(&i), Some(Domain::range(1, 4)));
        assert_eq!(s.get_domain(&r), Some(Domain::from_values([5, 7, 9])));
    }

    #[test]
    fn result_restriction_prunes_unsupported_indices() {
        let (s, i) = Store::empty().fresh("i");
        let (s, r) = s.fresh("r");
        let s = s.set_domain(&i, &Domain::range(1, 4)).unwrap().unwrap();
        let s = s.set_domain(&r, &Domain::singleton(5)).unwrap().unwrap();
        let s = s
            .add_constraint(
                &constraint::element(Term::from(&i), vec![5, 7, 5, 9], Term::from(&r)).unwrap(),
            )
            .unwrap()
            .unwrap();
        assert_eq!(s.get_domain(&i), Some(Domain::from_values([1, 3])));
    }

    #[test]
    fn fixed_index_fixes_the_result() {
        let (s, i) = Store::empty().fresh("i");
        let (s, r) = s.fresh("r");
        let s = s.set_domain(&i, &Domain::singleton(2)).unwrap().unwrap();
        let s = s.set_domain(&r, &Domain::range(1, 20)).unwrap().unwrap();
        let s = s
            .add_constraint(
                &constraint::element(Term::from(&i), vec![5, 7, 5, 9], Term::from(&r)).unwrap(),
            )
            .unwrap()
            .unwrap();
        assert_eq!(s.get_domain(&r), Some(Domain::singleton(7)));
    }
}
