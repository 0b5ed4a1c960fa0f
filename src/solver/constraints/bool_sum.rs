//! Counting over reified booleans: `total` encodes (number of true
//! variables) + 1.

use crate::{
    error::Result,
    solver::{
        constraint::{ConstraintDescriptor, Outcome, Propagator},
        constraints::{bounds, is_false, is_true, FALSE, TRUE},
        domain::Domain,
        store::{Revision, Shrink, Store},
    },
    term::VarId,
};

/// Enforces `total - 1 = |{ i : bs[i] = true }|` over {1 = false, 2 = true}
/// booleans, arc-consistent: the census of decided booleans brackets the
/// total, and a tight total forces the undecided booleans.
#[derive(Debug, Clone)]
pub(crate) struct BoolSumPropagator {
    bs: Vec<VarId>,
    total: VarId,
    vars: Vec<VarId>,
}

impl BoolSumPropagator {
    pub(crate) fn new(bs: Vec<VarId>, total: VarId) -> Self {
        let mut vars = bs.clone();
        vars.push(total);
        Self { bs, total, vars }
    }
}

impl Propagator for BoolSumPropagator {
    fn variables(&self) -> &[VarId] {
        &self.vars
    }

    fn descriptor(&self) -> ConstraintDescriptor {
        let vars_str = self
            .bs
            .iter()
            .map(|v| format!("?{}", v))
            .collect::<Vec<_>>()
            .join(" + ");
        ConstraintDescriptor {
            name: "BoolSumConstraint".to_string(),
            description: format!("{} = ?{} - 1", vars_str, self.total),
        }
    }

    fn propagate(&self, store: &Store) -> Result<Outcome> {
        let mut rev = Revision::new(store);
        let mut known_true = 0i64;
        let mut undecided = Vec::new();
        for b in &self.bs {
            let db = rev.view(*b);
            if db.is_empty() {
                return Ok(Outcome::Failed);
            }
            if is_true(&db) {
                known_true += 1;
            } else if !is_false(&db) {
                undecided.push(*b);
            }
        }
        let open = undecided.len() as i64;
        if rev.narrow_bounds(self.total, known_true + 1, known_true + open + 1) == Shrink::Empty {
            return Ok(Outcome::Failed);
        }
        let Some((tl, th)) = bounds(&rev.view(self.total)) else {
            return Ok(Outcome::Failed);
        };
        if !undecided.is_empty() {
            if th - 1 == known_true {
                for b in &undecided {
                    if rev.narrow(*b, &Domain::singleton(FALSE)) == Shrink::Empty {
                        return Ok(Outcome::Failed);
                    }
                }
            } else if tl - 1 == known_true + open {
                for b in &undecided {
                    if rev.narrow(*b, &Domain::singleton(TRUE)) == Shrink::Empty {
                        return Ok(Outcome::Failed);
                    }
                }
            }
        }
        let entailed = rev.view(self.total).is_singleton()
            && self.bs.iter().all(|b| rev.view(*b).is_singleton());
        Ok(rev.into_outcome(entailed))
    }
}
