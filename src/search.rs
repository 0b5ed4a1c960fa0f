//! The search driver: explores goal disjunctions over immutable stores,
//! sequentially or with a bounded worker pool.
//!
//! A branch is a store snapshot plus the remaining conjunction of goals.
//! Branches are independent (stores share structure but never mutate), so
//! workers need no locks beyond the shared branch queue; solutions flow to
//! the consumer over a bounded channel and cancellation is a single atomic
//! flag polled between branches.

use std::collections::VecDeque;
use std::sync::{
    atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    Arc, Condvar, Mutex,
};
use std::thread::JoinHandle;

use crossbeam_channel::{bounded, Receiver, Sender};
use rand::seq::SliceRandom;
use rand_core::SeedableRng;
use tracing::debug;

use crate::{
    error::{capacity, usage, Error, Result},
    goal::Goal,
    solver::{domain::Domain, store::Store},
    term::{Term, VarId},
};

/// The order in which `label` tries the values of a domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelOrder {
    /// Ascending domain order; deterministic.
    Ascending,
    /// Seeded pseudo-random order, stable per (seed, variable).
    Shuffled(u64),
}

/// Tuning knobs for a search run.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Worker threads. `1` selects the deterministic sequential driver.
    pub workers: usize,
    /// Branch depth guard; exceeding it is a capacity error that aborts the
    /// run.
    pub max_depth: u32,
    /// Capacity of the bounded solution channel between workers and the
    /// consumer.
    pub channel_capacity: usize,
    pub label_order: LabelOrder,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            max_depth: 4096,
            channel_capacity: 64,
            label_order: LabelOrder::Ascending,
        }
    }
}

impl SearchConfig {
    /// The deterministic single-threaded configuration used by tests.
    pub fn sequential() -> Self {
        SearchConfig {
            workers: 1,
            ..SearchConfig::default()
        }
    }
}

/// Counters for one search run.
#[derive(Debug, Default, Clone, Copy)]
pub struct SearchStats {
    /// Branch steps taken.
    pub branches: u64,
    /// Branches discarded as inconsistent.
    pub failures: u64,
    /// Solutions produced.
    pub solutions: u64,
}

/// One pending branch: a store plus the remaining conjunction (popped from
/// the back).
struct Branch {
    store: Store,
    stack: Vec<Goal>,
    depth: u32,
}

enum Step {
    Solution(Store),
    Fork(Vec<Branch>),
    Dead,
}

fn ordered_values(dom: &Domain, var: VarId, order: LabelOrder) -> Vec<u32> {
    let mut values: Vec<u32> = dom.iter().collect();
    if let LabelOrder::Shuffled(seed) = order {
        let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(seed ^ ((var as u64) << 20));
        values.shuffle(&mut rng);
    }
    values
}

/// Advances a branch by one goal.
fn step(branch: Branch, cfg: &SearchConfig) -> Result<Step> {
    let Branch {
        store,
        mut stack,
        depth,
    } = branch;
    let Some(goal) = stack.pop() else {
        return Ok(Step::Solution(store));
    };
    let deeper = |d: u32| -> Result<u32> {
        if d + 1 > cfg.max_depth {
            Err(capacity(format!("branch depth exceeds guard {}", cfg.max_depth)))
        } else {
            Ok(d + 1)
        }
    };
    match goal {
        Goal::Succeed => Ok(Step::Fork(vec![Branch { store, stack, depth }])),
        Goal::Fail => Ok(Step::Dead),
        Goal::Unify(a, b) => match store.unify(&a, &b)? {
            Some(next) => Ok(Step::Fork(vec![Branch {
                store: next,
                stack,
                depth,
            }])),
            None => Ok(Step::Dead),
        },
        Goal::Dom(term, dom) => {
            let walked = store.walk(&term).clone();
            match &walked {
                Term::Var(v) => match store.set_domain(v, &dom)? {
                    Some(next) => Ok(Step::Fork(vec![Branch {
                        store: next,
                        stack,
                        depth,
                    }])),
                    None => Ok(Step::Dead),
                },
                _ => match walked.as_int() {
                    Some(k) if k >= 1 && dom.contains(k as u32) => {
                        Ok(Step::Fork(vec![Branch { store, stack, depth }]))
                    }
                    _ => Ok(Step::Dead),
                },
            }
        }
        Goal::Post(c) => match store.add_constraint(&c)? {
            Some(next) => Ok(Step::Fork(vec![Branch {
                store: next,
                stack,
                depth,
            }])),
            None => Ok(Step::Dead),
        },
        Goal::Link(rel, fd) => {
            let (rel, fd) = (store.walk(&rel).clone(), store.walk(&fd).clone());
            let (Term::Var(rel), Term::Var(fd)) = (&rel, &fd) else {
                return Err(usage("link requires two variables"));
            };
            match store.link(rel, fd)? {
                Some(next) => Ok(Step::Fork(vec![Branch {
                    store: next,
                    stack,
                    depth,
                }])),
                None => Ok(Step::Dead),
            }
        }
        Goal::Fresh(body) => {
            let depth = deeper(depth)?;
            let mut store = store;
            let mut vars = Vec::with_capacity(body.names.len());
            for name in &body.names {
                let (next, v) = store.fresh(name);
                store = next;
                vars.push(Term::Var(v));
            }
            stack.push((body.body)(&vars));
            Ok(Step::Fork(vec![Branch { store, stack, depth }]))
        }
        Goal::All(goals) => {
            for g in goals.iter().rev() {
                stack.push(g.clone());
            }
            Ok(Step::Fork(vec![Branch { store, stack, depth }]))
        }
        Goal::Any(alternatives) => {
            let depth = deeper(depth)?;
            let children = alternatives
                .iter()
                .map(|g| {
                    let mut stack = stack.clone();
                    stack.push(g.clone());
                    Branch {
                        store: store.clone(),
                        stack,
                        depth,
                    }
                })
                .collect();
            Ok(Step::Fork(children))
        }
        Goal::Label(vars) => {
            let target = vars.iter().find_map(|t| match store.walk(t) {
                Term::Var(v) => store
                    .get_domain(v)
                    .filter(|d| !d.is_singleton())
                    .map(|d| (v.clone(), d)),
                _ => None,
            });
            let Some((var, dom)) = target else {
                // every variable is ground; labeling is done
                return Ok(Step::Fork(vec![Branch { store, stack, depth }]));
            };
            let depth = deeper(depth)?;
            let mut children = Vec::new();
            for value in ordered_values(&dom, var.id(), cfg.label_order) {
                if let Some(next) = store.set_domain(&var, &Domain::singleton(value))? {
                    let mut stack = stack.clone();
                    stack.push(Goal::Label(vars.clone()));
                    children.push(Branch {
                        store: next,
                        stack,
                        depth,
                    });
                }
            }
            Ok(Step::Fork(children))
        }
        Goal::Defer(build) => {
            let depth = deeper(depth)?;
            stack.push(build());
            Ok(Step::Fork(vec![Branch { store, stack, depth }]))
        }
    }
}

struct SeqEngine {
    cfg: SearchConfig,
    queue: VecDeque<Branch>,
    stats: SearchStats,
}

impl SeqEngine {
    fn next_solution(&mut self) -> Option<Result<Store>> {
        while let Some(branch) = self.queue.pop_front() {
            self.stats.branches += 1;
            match step(branch, &self.cfg) {
                Ok(Step::Solution(store)) => {
                    self.stats.solutions += 1;
                    return Some(Ok(store));
                }
                Ok(Step::Fork(children)) => {
                    if children.is_empty() {
                        self.stats.failures += 1;
                    }
                    self.queue.extend(children);
                }
                Ok(Step::Dead) => self.stats.failures += 1,
                Err(e) => {
                    self.queue.clear();
                    return Some(Err(e));
                }
            }
        }
        None
    }
}

struct ParShared {
    queue: Mutex<VecDeque<Branch>>,
    work_ready: Condvar,
    active: AtomicUsize,
    stop: AtomicBool,
    error: Mutex<Option<Error>>,
    branches: AtomicU64,
    failures: AtomicU64,
    solutions: AtomicU64,
}

fn worker(shared: Arc<ParShared>, cfg: SearchConfig, tx: Sender<Store>) {
    loop {
        let branch = {
            let mut queue = shared.queue.lock().unwrap();
            loop {
                if shared.stop.load(Ordering::Relaxed) {
                    return;
                }
                if let Some(b) = queue.pop_front() {
                    shared.active.fetch_add(1, Ordering::SeqCst);
                    break b;
                }
                if shared.active.load(Ordering::SeqCst) == 0 {
                    // nothing queued, nobody working: the search space is
                    // exhausted
                    shared.work_ready.notify_all();
                    return;
                }
                queue = shared.work_ready.wait(queue).unwrap();
            }
        };
        shared.branches.fetch_add(1, Ordering::Relaxed);
        match step(branch, &cfg) {
            Ok(Step::Solution(store)) => {
                shared.solutions.fetch_add(1, Ordering::Relaxed);
                if tx.send(store).is_err() {
                    // consumer hung up: cancel the whole pool
                    shared.stop.store(true, Ordering::Relaxed);
                }
            }
            Ok(Step::Fork(children)) => {
                if children.is_empty() {
                    shared.failures.fetch_add(1, Ordering::Relaxed);
                } else {
                    let mut queue = shared.queue.lock().unwrap();
                    queue.extend(children);
                }
            }
            Ok(Step::Dead) => {
                shared.failures.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                *shared.error.lock().unwrap() = Some(e);
                shared.stop.store(true, Ordering::Relaxed);
            }
        }
        shared.active.fetch_sub(1, Ordering::SeqCst);
        shared.work_ready.notify_all();
    }
}

struct ParEngine {
    shared: Arc<ParShared>,
    rx: Option<Receiver<Store>>,
    handles: Vec<JoinHandle<()>>,
}

impl ParEngine {
    fn next_solution(&mut self) -> Option<Result<Store>> {
        let rx = self.rx.as_ref()?;
        match rx.recv() {
            Ok(store) => Some(Ok(store)),
            Err(_) => {
                // all workers exited; surface a deferred error once
                self.rx = None;
                for handle in self.handles.drain(..) {
                    let _ = handle.join();
                }
                self.shared.error.lock().unwrap().take().map(Err)
            }
        }
    }

    fn shutdown(&mut self) {
        self.shared.stop.store(true, Ordering::Relaxed);
        self.rx = None;
        self.shared.work_ready.notify_all();
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for ParEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

enum SolutionsInner {
    Sequential(SeqEngine),
    Parallel(ParEngine),
}

/// A pull stream of solution stores.
///
/// `next` yields solution stores in discovery order. Under the parallel
/// driver that order is unspecified; the sequential driver (`workers: 1`)
/// replays deterministically. Dropping the stream cancels pending workers.
pub struct Solutions {
    inner: SolutionsInner,
}

impl Solutions {
    pub fn next(&mut self) -> Option<Result<Store>> {
        match &mut self.inner {
            SolutionsInner::Sequential(engine) => engine.next_solution(),
            SolutionsInner::Parallel(engine) => engine.next_solution(),
        }
    }

    pub fn stats(&self) -> SearchStats {
        match &self.inner {
            SolutionsInner::Sequential(engine) => engine.stats,
            SolutionsInner::Parallel(engine) => SearchStats {
                branches: engine.shared.branches.load(Ordering::Relaxed),
                failures: engine.shared.failures.load(Ordering::Relaxed),
                solutions: engine.shared.solutions.load(Ordering::Relaxed),
            },
        }
    }
}

/// Starts a search of `goal` from `store` and returns the solution stream.
pub fn solutions(cfg: &SearchConfig, store: Store, goal: Goal) -> Solutions {
    let root = Branch {
        store,
        stack: vec![goal],
        depth: 0,
    };
    if cfg.workers <= 1 {
        debug!("starting sequential search");
        let mut queue = VecDeque::new();
        queue.push_back(root);
        return Solutions {
            inner: SolutionsInner::Sequential(SeqEngine {
                cfg: cfg.clone(),
                queue,
                stats: SearchStats::default(),
            }),
        };
    }
    debug!(workers = cfg.workers, "starting parallel search");
    let shared = Arc::new(ParShared {
        queue: Mutex::new(VecDeque::from([root])),
        work_ready: Condvar::new(),
        active: AtomicUsize::new(0),
        stop: AtomicBool::new(false),
        error: Mutex::new(None),
        branches: AtomicU64::new(0),
        failures: AtomicU64::new(0),
        solutions: AtomicU64::new(0),
    });
    let (tx, rx) = bounded(cfg.channel_capacity.max(1));
    let handles = (0..cfg.workers)
        .map(|_| {
            let shared = shared.clone();
            let cfg = cfg.clone();
            let tx = tx.clone();
            std::thread::spawn(move || worker(shared, cfg, tx))
        })
        .collect();
    drop(tx);
    Solutions {
        inner: SolutionsInner::Parallel(ParEngine {
            shared,
            rx: Some(rx),
            handles,
        }),
    }
}

/// Collects up to `limit` solution stores (all of them when `limit` is
/// `None`).
pub fn solve_with(
    cfg: &SearchConfig,
    limit: Option<usize>,
    store: Store,
    goal: Goal,
) -> Result<Vec<Store>> {
    let mut stream = solutions(cfg, store, goal);
    let mut out = Vec::new();
    while limit.map_or(true, |n| out.len() < n) {
        match stream.next() {
            Some(Ok(store)) => out.push(store),
            Some(Err(e)) => return Err(e),
            None => break,
        }
    }
    Ok(out)
}

/// Runs a query: allocates one variable per name, drives the goal the body
/// builds, and deep-walks the query variables in each solution store.
pub fn run_with(
    cfg: &SearchConfig,
    limit: Option<usize>,
    names: &[&str],
    body: impl FnOnce(&[Term]) -> Goal,
) -> Result<Vec<Vec<Term>>> {
    let mut store = Store::empty();
    let mut vars = Vec::with_capacity(names.len());
    for name in names {
        let (next, v) = store.fresh(name);
        store = next;
        vars.push(Term::Var(v));
    }
    let goal = body(&vars);
    let stores = solve_with(cfg, limit, store, goal)?;
    Ok(stores
        .iter()
        .map(|s| vars.iter().map(|v| s.walk_star(v)).collect())
        .collect())
}

/// Up to `n` solutions under the default configuration.
pub fn run(
    n: usize,
    names: &[&str],
    body: impl FnOnce(&[Term]) -> Goal,
) -> Result<Vec<Vec<Term>>> {
    run_with(&SearchConfig::default(), Some(n), names, body)
}

/// Every solution under the default configuration.
pub fn run_all(names: &[&str], body: impl FnOnce(&[Term]) -> Goal) -> Result<Vec<Vec<Term>>> {
    run_with(&SearchConfig::default(), None, names, body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::goal;
    use pretty_assertions::assert_eq;

    #[test]
    fn conde_explores_every_line() {
        let cfg = SearchConfig::sequential();
        let mut results = run_with(&cfg, None, &["q"], |q| {
            let q = q[0].clone();
            goal::conde(vec![
                vec![goal::eq(q.clone(), 1)],
                vec![goal::eq(q.clone(), 2)],
                vec![goal::eq(q.clone(), 3)],
            ])
        })
        .unwrap();
        results.sort_by_key(|r| r[0].as_int());
        assert_eq!(
            results,
            vec![
                vec![Term::from(1)],
                vec![Term::from(2)],
                vec![Term::from(3)]
            ]
        );
    }

    #[test]
    fn run_limit_stops_early() {
        let cfg = SearchConfig::sequential();
        let results = run_with(&cfg, Some(2), &["q"], |q| {
            let q = q[0].clone();
            goal::conde(vec![
                vec![goal::eq(q.clone(), 1)],
                vec![goal::eq(q.clone(), 2)],
                vec![goal::eq(q.clone(), 3)],
            ])
        })
        .unwrap();
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn failing_lines_are_discarded_silently() {
        let cfg = SearchConfig::sequential();
        let results = run_with(&cfg, None, &["q"], |q| {
            let q = q[0].clone();
            goal::all(vec![
                goal::eq(q.clone(), 7),
                goal::conde(vec![
                    vec![goal::eq(q.clone(), 8)], // inconsistent
                    vec![goal::eq(q.clone(), 7)],
                ]),
            ])
        })
        .unwrap();
        assert_eq!(results, vec![vec![Term::from(7)]]);
    }

    #[test]
    fn label_enumerates_domains_in_order() {
        let cfg = SearchConfig::sequential();
        let results = run_with(&cfg, None, &["q"], |q| {
            let q = q[0].clone();
            goal::all(vec![
                goal::dom(q.clone(), Domain::from_values([2, 5, 9])),
                goal::label(vec![q.clone()]),
            ])
        })
        .unwrap();
        let got: Vec<i64> = results.iter().map(|r| r[0].as_int().unwrap()).collect();
        assert_eq!(got, vec![2, 5, 9]);
    }

    #[test]
    fn defer_supports_recursive_relations() {
        fn count_down(q: Term, n: i64) -> Goal {
            if n == 0 {
                goal::eq(q, 0)
            } else {
                let q2 = q.clone();
                goal::conde(vec![
                    vec![goal::eq(q2.clone(), n)],
                    vec![goal::defer(move || count_down(q2.clone(), n - 1))],
                ])
            }
        }
        let cfg = SearchConfig::sequential();
        let mut results = run_with(&cfg, None, &["q"], |q| count_down(q[0].clone(), 3)).unwrap();
        results.sort_by_key(|r| r[0].as_int());
        let got: Vec<i64> = results.iter().map(|r| r[0].as_int().unwrap()).collect();
        assert_eq!(got, vec![0, 1, 2, 3]);
    }

    #[test]
    fn depth_guard_aborts_runaway_recursion() {
        fn forever(q: Term) -> Goal {
            goal::defer(move || forever(q.clone()))
        }
        let cfg = SearchConfig {
            max_depth: 64,
            ..SearchConfig::sequential()
        };
        let err = run_with(&cfg, None, &["q"], |q| forever(q[0].clone())).unwrap_err();
        assert!(err.is_capacity());
    }

    #[test]
    fn parallel_and_sequential_agree_on_the_solution_multiset() {
        let build = |q: &[Term]| {
            let q0 = q[0].clone();
            goal::all(vec![
                goal::dom(q0.clone(), Domain::range(1, 6)),
                goal::posts(
                    crate::solver::constraint::not_equal(q0.clone(), Term::from(3)).unwrap(),
                ),
                goal::label(vec![q0.clone()]),
            ])
        };
        let seq = run_with(&SearchConfig::sequential(), None, &["q"], build).unwrap();
        let cfg = SearchConfig {
            workers: 4,
            ..SearchConfig::default()
        };
        let par = run_with(&cfg, None, &["q"], build).unwrap();
        let mut seq: Vec<i64> = seq.iter().map(|r| r[0].as_int().unwrap()).collect();
        let mut par: Vec<i64> = par.iter().map(|r| r[0].as_int().unwrap()).collect();
        seq.sort_unstable();
        par.sort_unstable();
        assert_eq!(seq, par);
    }
}
