//! The fixed-point propagation engine.
//!
//! The engine drains a FIFO worklist of constraint ids. Each propagator may
//! stay quiet, narrow domains, become entailed, fail the store, or rewrite
//! itself. After a pruning step every constraint watching a changed variable
//! is rescheduled; the loop terminates because every action strictly narrows
//! a finite domain or binds a variable.

use tracing::{debug, trace};

use crate::{
    error::Result,
    solver::{
        constraint::{ConstraintId, Outcome},
        store::Store,
        work_list::WorkList,
    },
    term::VarId,
};

/// Runs the constraints watching `changed` to quiescence.
pub(crate) fn fixpoint(store: Store, changed: Vec<VarId>) -> Result<Option<Store>> {
    fixpoint_seeded(store, Vec::new(), changed)
}

/// Runs to quiescence starting from explicit constraint seeds plus the
/// watchers of `changed`.
pub(crate) fn fixpoint_seeded(
    store: Store,
    seeds: Vec<ConstraintId>,
    changed: Vec<VarId>,
) -> Result<Option<Store>> {
    let mut store = store;
    let mut worklist = WorkList::new();
    for id in seeds {
        worklist.push_back(id);
    }
    for v in &changed {
        for id in store.watchers_of(*v) {
            worklist.push_back(id);
        }
    }

    while let Some(id) = worklist.pop_front() {
        // Entailed constraints may still be queued; skip them.
        let Some(propagator) = store.constraint(id).cloned() else {
            continue;
        };
        match propagator.propagate(&store)? {
            Outcome::Quiet => {}
            Outcome::Failed => {
                trace!(
                    constraint = %propagator.descriptor().description,
                    "constraint failed the store"
                );
                return Ok(None);
            }
            Outcome::Entailed => {
                store = store.remove_constraint_entry(id);
            }
            Outcome::Rewritten { replacement } => {
                store = store.replace_constraint_entry(id, replacement);
            }
            Outcome::Pruned {
                store: pruned,
                changed,
                entailed,
            } => {
                trace!(
                    constraint = %propagator.descriptor().description,
                    pruned_vars = changed.len(),
                    "constraint pruned"
                );
                store = if entailed {
                    pruned.remove_constraint_entry(id)
                } else {
                    pruned
                };
                for v in changed {
                    for watcher in store.watchers_of(v) {
                        worklist.push_back(watcher);
                    }
                }
            }
        }
    }

    debug!("propagation reached a fixed point");
    Ok(Some(store))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        solver::{
            constraint::{self, Constraint},
            domain::Domain,
        },
        term::{LVar, Term},
    };
    use pretty_assertions::assert_eq;

    fn fd_store(domains: &[(u32, u32)]) -> (Store, Vec<LVar>) {
        let mut store = Store::empty();
        let mut vars = Vec::new();
        for (i, (lo, hi)) in domains.iter().enumerate() {
            let (s, v) = store.fresh(&format!("v{}", i));
            store = s
                .set_domain(&v, &Domain::range(*lo, *hi))
                .unwrap()
                .unwrap();
            vars.push(v);
        }
        (store, vars)
    }

    fn add(store: &Store, c: Constraint) -> Store {
        store.add_constraint(&c).unwrap().unwrap()
    }

    #[test]
    fn chained_constraints_reach_a_joint_fixed_point() {
        // x + y = z with x in [1..9], y in [4..9], z in [1..6]
        let (store, vars) = fd_store(&[(1, 9), (4, 9), (1, 6)]);
        let store = add(
            &store,
            constraint::plus(
                Term::from(&vars[0]),
                Term::from(&vars[1]),
                Term::from(&vars[2]),
            )
            .unwrap(),
        );
        assert_eq!(store.get_domain(&vars[0]), Some(Domain::range(1, 2)));
        assert_eq!(store.get_domain(&vars[1]), Some(Domain::range(4, 5)));
        assert_eq!(store.get_domain(&vars[2]), Some(Domain::range(5, 6)));
    }

    #[test]
    fn propagation_is_idempotent_at_the_fixed_point() {
        let (store, vars) = fd_store(&[(1, 9), (4, 9), (1, 6)]);
        let store = add(
            &store,
            constraint::plus(
                Term::from(&vars[0]),
                Term::from(&vars[1]),
                Term::from(&vars[2]),
            )
            .unwrap(),
        );
        let ids: Vec<ConstraintId> = (0..store.next_constraint_id()).collect();
        let again = fixpoint_seeded(store.clone(), ids, Vec::new())
            .unwrap()
            .unwrap();
        for v in &vars {
            assert_eq!(store.get_domain(v), again.get_domain(v));
        }
    }

    #[test]
    fn failure_is_reported_as_branch_inconsistency() {
        let (store, vars) = fd_store(&[(1, 2), (1, 2), (5, 6)]);
        // max(x + y) = 4 < 5 = min(z)
        let result = store
            .add_constraint(
                &constraint::plus(
                    Term::from(&vars[0]),
                    Term::from(&vars[1]),
                    Term::from(&vars[2]),
                )
                .unwrap(),
            )
            .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn entailed_constraints_are_removed() {
        let (store, vars) = fd_store(&[(1, 2), (5, 6)]);
        let store = add(
            &store,
            constraint::not_equal(Term::from(&vars[0]), Term::from(&vars[1])).unwrap(),
        );
        assert!(store.active_constraints().is_empty());
    }
}
