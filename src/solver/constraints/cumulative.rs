//! Cumulative scheduling with time-table filtering.

use crate::{
    error::Result,
    solver::{
        constraint::{ConstraintDescriptor, Outcome, Propagator},
        domain::Domain,
        store::{Revision, Shrink, Store},
    },
    term::VarId,
};

/// Enforces that tasks running at `starts[i]` for `durations[i]` time units
/// with demand `demands[i]` never exceed `capacity` at any discrete time
/// point. Intervals are inclusive: a task starting at `s` occupies
/// `[s .. s + dur - 1]`.
///
/// Filtering is time-table based: the compulsory parts (the interval
/// `[lst .. est + dur - 1]` a task covers under every start) build a demand
/// profile; the profile rejects overloaded stores and start values that
/// would overload any point, after subtracting the task's own compulsory
/// contribution there.
#[derive(Debug, Clone)]
pub(crate) struct CumulativePropagator {
    starts: Vec<VarId>,
    durations: Vec<u32>,
    demands: Vec<u32>,
    capacity: u32,
}

impl CumulativePropagator {
    pub(crate) fn new(
        starts: Vec<VarId>,
        durations: Vec<u32>,
        demands: Vec<u32>,
        capacity: u32,
    ) -> Self {
        Self {
            starts,
            durations,
            demands,
            capacity,
        }
    }

    fn compulsory(est: u32, lst: u32, dur: u32) -> Option<(u32, u32)> {
        let end = est + dur - 1;
        if lst <= end {
            Some((lst, end))
        } else {
            None
        }
    }
}

impl Propagator for CumulativePropagator {
    fn variables(&self) -> &[VarId] {
        &self.starts
    }

    fn descriptor(&self) -> ConstraintDescriptor {
        ConstraintDescriptor {
            name: "CumulativeConstraint".to_string(),
            description: format!(
                "cumulative({} tasks, capacity {})",
                self.starts.len(),
                self.capacity
            ),
        }
    }

    fn propagate(&self, store: &Store) -> Result<Outcome> {
        let mut rev = Revision::new(store);
        let n = self.starts.len();
        let mut views = Vec::with_capacity(n);
        for s in &self.starts {
            let d = rev.view(*s);
            if d.is_empty() {
                return Ok(Outcome::Failed);
            }
            views.push(d);
        }

        // Demand profile over the horizon, from the compulsory parts.
        let horizon_lo = views.iter().map(|d| d.min().unwrap()).min().unwrap();
        let horizon_hi = (0..n)
            .map(|i| views[i].max().unwrap() + self.durations[i] - 1)
            .max()
            .unwrap();
        let width = (horizon_hi - horizon_lo + 1) as usize;
        let mut profile = vec![0u32; width];
        let mut compulsory = vec![None; n];
        for i in 0..n {
            let est = views[i].min().unwrap();
            let lst = views[i].max().unwrap();
            if let Some((a, b)) = Self::compulsory(est, lst, self.durations[i]) {
                compulsory[i] = Some((a, b));
                for t in a..=b {
                    profile[(t - horizon_lo) as usize] += self.demands[i];
                }
            }
        }
        if profile.iter().any(|load| *load > self.capacity) {
            return Ok(Outcome::Failed);
        }

        // Drop start values that would overload some time point, net of the
        // task's own compulsory contribution.
        for i in 0..n {
            let keep: Vec<u32> = views[i]
                .iter()
                .filter(|s| {
                    (*s..*s + self.durations[i]).all(|t| {
                        let own = match compulsory[i] {
                            Some((a, b)) if t >= a && t <= b => self.demands[i],
                            _ => 0,
                        };
                        let load = profile[(t - horizon_lo) as usize];
                        load - own + self.demands[i] <= self.capacity
                    })
                })
                .collect();
            if keep.len() < views[i].size() {
                if rev.narrow(self.starts[i], &Domain::from_values(keep)) == Shrink::Empty {
                    return Ok(Outcome::Failed);
                }
            }
        }

        let entailed = self.starts.iter().all(|s| rev.view(*s).is_singleton());
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

    fn tasks(doms: &[(u32, u32)]) -> (Store, Vec<crate::term::LVar>) {
        let mut store = Store::empty();
        let mut out = Vec::new();
        for (lo, hi) in doms {
            let (s, v) = store.fresh("start");
            store = s.set_domain(&v, &Domain::range(*lo, *hi)).unwrap().unwrap();
            out.push(v);
        }
        (store, out)
    }

    #[test]
    fn overloaded_compulsory_profile_fails() {
        // Two fixed tasks of demand 1 overlap at t=2 with capacity 1.
        let (store, starts) = tasks(&[(1, 1), (2, 2)]);
        let result = store
            .add_constraint(
                &constraint::cumulative(
                    starts.iter().map(Term::from).collect(),
                    vec![2, 2],
                    vec![1, 1],
                    1,
                )
                .unwrap(),
            )
            .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn start_values_conflicting_with_a_fixed_task_are_pruned() {
        // Task 0 fixed at [2..3] with demand 2 saturating the resource;
        // task 1 (duration 2) cannot touch t=2 or t=3.
        let (store, starts) = tasks(&[(2, 2), (1, 5)]);
        let store = store
            .add_constraint(
                &constraint::cumulative(
                    starts.iter().map(Term::from).collect(),
                    vec![2, 2],
                    vec![2, 1],
                    2,
                )
                .unwrap(),
            )
            .unwrap()
            .unwrap();
        assert_eq!(store.get_domain(&starts[1]), Some(Domain::from_values([4, 5])));
    }

    #[test]
    fn unit_demand_capacity_one_is_no_overlap() {
        let (store, starts) = tasks(&[(1, 1), (1, 3)]);
        let store = store
            .add_constraint(
                &constraint::no_overlap(starts.iter().map(Term::from).collect(), vec![2, 2])
                    .unwrap(),
            )
            .unwrap()
            .unwrap();
        assert_eq!(store.get_domain(&starts[1]), Some(Domain::singleton(3)));
    }
}
