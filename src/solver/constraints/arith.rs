//! Arithmetic primitives: `x + y = z`, the offset inequality, its
//! reification, and the reified successor used by Circuit.

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

/// Enforces `x + y = z`, bounds-consistent in all three operands.
#[derive(Debug, Clone)]
pub(crate) struct PlusPropagator {
    x: VarId,
    y: VarId,
    z: VarId,
    vars: [VarId; 3],
}

impl PlusPropagator {
    pub(crate) fn new(x: VarId, y: VarId, z: VarId) -> Self {
        Self {
            x,
            y,
            z,
            vars: [x, y, z],
        }
    }
}

impl Propagator for PlusPropagator {
    fn variables(&self) -> &[VarId] {
        &self.vars
    }

    fn descriptor(&self) -> ConstraintDescriptor {
        ConstraintDescriptor {
            name: "PlusConstraint".to_string(),
            description: format!("?{} + ?{} = ?{}", self.x, self.y, self.z),
        }
    }

    fn propagate(&self, store: &Store) -> Result<Outcome> {
        let mut rev = Revision::new(store);
        let Some((xl, xh)) = bounds(&rev.view(self.x)) else {
            return Ok(Outcome::Failed);
        };
        let Some((yl, yh)) = bounds(&rev.view(self.y)) else {
            return Ok(Outcome::Failed);
        };
        if bounds(&rev.view(self.z)).is_none() {
            return Ok(Outcome::Failed);
        }
        if rev.narrow_bounds(self.z, xl + yl, xh + yh) == Shrink::Empty {
            return Ok(Outcome::Failed);
        }
        let (zl, zh) = bounds(&rev.view(self.z)).unwrap();
        if rev.narrow_bounds(self.x, zl - yh, zh - yl) == Shrink::Empty {
            return Ok(Outcome::Failed);
        }
        let (xl, xh) = bounds(&rev.view(self.x)).unwrap();
        if rev.narrow_bounds(self.y, zl - xh, zh - xl) == Shrink::Empty {
            return Ok(Outcome::Failed);
        }
        let entailed = [self.x, self.y, self.z]
            .iter()
            .all(|v| rev.view(*v).is_singleton());
        Ok(rev.into_outcome(entailed))
    }
}

/// Enforces `x + offset <= y`, bounds-consistent.
#[derive(Debug, Clone)]
pub(crate) struct LeqPropagator {
    x: VarId,
    offset: i64,
    y: VarId,
    vars: [VarId; 2],
}

impl LeqPropagator {
    pub(crate) fn new(x: VarId, offset: i64, y: VarId) -> Self {
        Self {
            x,
            offset,
            y,
            vars: [x, y],
        }
    }
}

impl Propagator for LeqPropagator {
    fn variables(&self) -> &[VarId] {
        &self.vars
    }

    fn descriptor(&self) -> ConstraintDescriptor {
        ConstraintDescriptor {
            name: "LeqConstraint".to_string(),
            description: format!("?{} + {} <= ?{}", self.x, self.offset, self.y),
        }
    }

    fn propagate(&self, store: &Store) -> Result<Outcome> {
        let mut rev = Revision::new(store);
        let Some((xl, _)) = bounds(&rev.view(self.x)) else {
            return Ok(Outcome::Failed);
        };
        let Some((_, yh)) = bounds(&rev.view(self.y)) else {
            return Ok(Outcome::Failed);
        };
        if rev.narrow_bounds(self.x, 1, yh - self.offset) == Shrink::Empty {
            return Ok(Outcome::Failed);
        }
        if rev.narrow_bounds(self.y, xl + self.offset, rev.max_value() as i64) == Shrink::Empty {
            return Ok(Outcome::Failed);
        }
        let (_, xh) = bounds(&rev.view(self.x)).unwrap();
        let (yl, _) = bounds(&rev.view(self.y)).unwrap();
        let entailed = xh + self.offset <= yl;
        Ok(rev.into_outcome(entailed))
    }
}

/// Enforces `b <=> (x + offset <= y)`.
#[derive(Debug, Clone)]
pub(crate) struct LeqReifiedPropagator {
    b: VarId,
    x: VarId,
    offset: i64,
    y: VarId,
    vars: [VarId; 3],
}

impl LeqReifiedPropagator {
    pub(crate) fn new(b: VarId, x: VarId, offset: i64, y: VarId) -> Self {
        Self {
            b,
            x,
            offset,
            y,
            vars: [b, x, y],
        }
    }
}

impl Propagator for LeqReifiedPropagator {
    fn variables(&self) -> &[VarId] {
        &self.vars
    }

    fn descriptor(&self) -> ConstraintDescriptor {
        ConstraintDescriptor {
            name: "LeqReifiedConstraint".to_string(),
            description: format!(
                "?{} <==> (?{} + {} <= ?{})",
                self.b, self.x, self.offset, self.y
            ),
        }
    }

    fn propagate(&self, store: &Store) -> Result<Outcome> {
        let mut rev = Revision::new(store);
        let db = rev.view(self.b);
        let Some((xl, xh)) = bounds(&rev.view(self.x)) else {
            return Ok(Outcome::Failed);
        };
        let Some((yl, yh)) = bounds(&rev.view(self.y)) else {
            return Ok(Outcome::Failed);
        };
        if db.is_empty() {
            return Ok(Outcome::Failed);
        }

        if is_true(&db) {
            if rev.narrow_bounds(self.x, 1, yh - self.offset) == Shrink::Empty {
                return Ok(Outcome::Failed);
            }
            if rev.narrow_bounds(self.y, xl + self.offset, rev.max_value() as i64) == Shrink::Empty
            {
                return Ok(Outcome::Failed);
            }
            let (_, xh) = bounds(&rev.view(self.x)).unwrap();
            let (yl, _) = bounds(&rev.view(self.y)).unwrap();
            return Ok(rev.into_outcome(xh + self.offset <= yl));
        }

        if is_false(&db) {
            // not(x + offset <= y)  <=>  y <= x + offset - 1
            if rev.narrow_bounds(self.y, 1, xh + self.offset - 1) == Shrink::Empty {
                return Ok(Outcome::Failed);
            }
            if rev.narrow_bounds(self.x, yl - self.offset + 1, rev.max_value() as i64)
                == Shrink::Empty
            {
                return Ok(Outcome::Failed);
            }
            let (xl, _) = bounds(&rev.view(self.x)).unwrap();
            let (_, yh) = bounds(&rev.view(self.y)).unwrap();
            return Ok(rev.into_outcome(xl + self.offset > yh));
        }

        if xh + self.offset <= yl {
            if rev.narrow(self.b, &Domain::singleton(TRUE)) == Shrink::Empty {
                return Ok(Outcome::Failed);
            }
            return Ok(rev.into_outcome(true));
        }
        if xl + self.offset > yh {
            if rev.narrow(self.b, &Domain::singleton(FALSE)) == Shrink::Empty {
                return Ok(Outcome::Failed);
            }
            return Ok(rev.into_outcome(true));
        }
        Ok(rev.into_outcome(false))
    }
}

/// Half-reified successor: `b => (y = x + 1)`, with the contrapositive
/// `(y = x + 1 impossible) => b = false`. Circuit posts one per arc not
/// leading back to the start node.
#[derive(Debug, Clone)]
pub(crate) struct SuccessorReifiedPropagator {
    b: VarId,
    x: VarId,
    y: VarId,
    vars: [VarId; 3],
}

impl SuccessorReifiedPropagator {
    pub(crate) fn new(b: VarId, x: VarId, y: VarId) -> Self {
        Self {
            b,
            x,
            y,
            vars: [b, x, y],
        }
    }
}

impl Propagator for SuccessorReifiedPropagator {
    fn variables(&self) -> &[VarId] {
        &self.vars
    }

    fn descriptor(&self) -> ConstraintDescriptor {
        ConstraintDescriptor {
            name: "SuccessorReifiedConstraint".to_string(),
            description: format!("?{} ==> (?{} = ?{} + 1)", self.b, self.y, self.x),
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

        if is_false(&db) {
            return Ok(Outcome::Entailed);
        }

        if is_true(&db) {
            if rev.narrow(self.y, &dx.shifted(1)) == Shrink::Empty {
                return Ok(Outcome::Failed);
            }
            let dy = rev.view(self.y);
            if rev.narrow(self.x, &dy.shifted(-1)) == Shrink::Empty {
                return Ok(Outcome::Failed);
            }
            let entailed = rev.view(self.x).is_singleton() && rev.view(self.y).is_singleton();
            return Ok(rev.into_outcome(entailed));
        }

        if dy.intersect(&dx.shifted(1)).is_empty() {
            if rev.narrow(self.b, &Domain::singleton(FALSE)) == Shrink::Empty {
                return Ok(Outcome::Failed);
            }
            return Ok(rev.into_outcome(true));
        }
        Ok(rev.into_outcome(false))
    }
}
