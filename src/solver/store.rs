//! The unified store: one immutable snapshot of relational bindings, FD
//! domains and the active constraint set.

use std::sync::Arc;

use im::{HashMap, OrdSet};
use tracing::trace;

use crate::{
    error::{capacity, Result},
    solver::{
        constraint::{Constraint, ConstraintDescriptor, ConstraintId, Outcome, Propagator},
        domain::{Domain, DEFAULT_MAX_VALUE},
        plugin::PluginSet,
        propagation,
        registry::HybridRegistry,
        subst::{Subst, WalkEnd},
    },
    term::{LVar, Term, Value, VarId},
};

/// A single, immutable state of one branch of search.
///
/// A store holds the substitution `S`, the FD binding table `D`, the active
/// constraint set `C`, the inverse watch index, the hybrid registry, the
/// variable-id counter and the plugin table. Because every component is a
/// persistent structure, cloning a store is O(1) and branches share
/// structure instead of copying it.
///
/// All mutators follow one convention: `Err` is a usage or capacity error
/// that aborts the run, `Ok(None)` is branch inconsistency, and `Ok(Some)`
/// is a new snapshot that has already been propagated to a fixed point.
#[derive(Clone, Debug)]
pub struct Store {
    subst: Subst,
    domains: HashMap<VarId, Domain>,
    constraints: HashMap<ConstraintId, Arc<dyn Propagator>>,
    watchers: HashMap<VarId, OrdSet<ConstraintId>>,
    registry: HybridRegistry,
    counter: VarId,
    next_constraint: ConstraintId,
    max_value: u32,
    plugins: Arc<PluginSet>,
}

impl Store {
    /// An empty store with the default MaxValue of 1024.
    pub fn empty() -> Store {
        Store::with_max_value(DEFAULT_MAX_VALUE)
    }

    /// An empty store whose FD subsystem accepts values in `[1 ..
    /// max_value]`.
    pub fn with_max_value(max_value: u32) -> Store {
        Store {
            subst: Subst::new(),
            domains: HashMap::new(),
            constraints: HashMap::new(),
            watchers: HashMap::new(),
            registry: HybridRegistry::new(),
            counter: 0,
            next_constraint: 0,
            max_value: max_value.max(1),
            plugins: Arc::new(PluginSet::standard()),
        }
    }

    pub fn max_value(&self) -> u32 {
        self.max_value
    }

    /// Allocates a fresh variable. The id counter lives inside the store, so
    /// forked branches allocate independently.
    pub fn fresh(&self, name: &str) -> (Store, LVar) {
        let var = LVar::new(self.counter, name);
        let mut next = self.clone();
        next.counter += 1;
        (next, var)
    }

    pub fn walk<'a>(&'a self, term: &'a Term) -> &'a Term {
        self.subst.walk(term)
    }

    pub fn walk_star(&self, term: &Term) -> Term {
        self.subst.walk_star(term)
    }

    pub(crate) fn subst(&self) -> &Subst {
        &self.subst
    }

    pub fn registry(&self) -> &HybridRegistry {
        &self.registry
    }

    /// The current FD domain of `v`, resolved through the substitution.
    pub fn get_domain(&self, v: &LVar) -> Option<Domain> {
        match self.subst.walk_id(v.id()) {
            WalkEnd::Free(root) => self
                .domains
                .get(&root)
                .or_else(|| self.domains.get(&v.id()))
                .cloned(),
            WalkEnd::Bound(_) => self.domains.get(&v.id()).cloned(),
        }
    }

    /// The domain a propagator sees for `v`: the tracked domain of its root,
    /// or the singleton of its ground integer value. A variable ground to a
    /// non-integer (or an out-of-range integer) reads as the empty domain.
    pub(crate) fn fd_view(&self, v: VarId) -> Domain {
        match self.subst.walk_id(v) {
            WalkEnd::Free(root) => self
                .domains
                .get(&root)
                .cloned()
                .unwrap_or_else(|| Domain::range(1, self.max_value)),
            WalkEnd::Bound(t) => match t.as_int() {
                Some(k) if k >= 1 && k <= self.max_value as i64 => Domain::singleton(k as u32),
                _ => Domain::empty(),
            },
        }
    }

    /// Unifies two terms, cross-propagates with the FD side, and runs the
    /// constraints watching any newly bound variable to a fixed point.
    pub fn unify(&self, a: &Term, b: &Term) -> Result<Option<Store>> {
        let mut log = Vec::new();
        let Some(subst) = self.subst.unify(a, b, &mut log) else {
            return Ok(None);
        };
        if log.is_empty() {
            return Ok(Some(self.clone()));
        }
        let mut store = self.clone();
        store.subst = subst;
        let mut rev = Revision::started(store);
        for v in &log {
            rev.record(*v);
            if rev.bound_hooks(*v) == Shrink::Empty {
                return Ok(None);
            }
        }
        let (store, changed) = rev.finish();
        propagation::fixpoint(store, changed)
    }

    /// Binds a variable to a term via unification.
    pub fn bind(&self, v: &LVar, term: &Term) -> Result<Option<Store>> {
        self.unify(&Term::Var(v.clone()), term)
    }

    /// Narrows the domain of `v` to its intersection with `dom` and
    /// propagates. Monotone: the stored domain never grows. Constraints
    /// watching `v` are only scheduled when the domain actually shrank.
    pub fn set_domain(&self, v: &LVar, dom: &Domain) -> Result<Option<Store>> {
        if let Some(mx) = dom.max() {
            if mx > self.max_value {
                return Err(capacity(format!(
                    "domain value {} exceeds MaxValue {}",
                    mx, self.max_value
                )));
            }
        }
        let mut rev = Revision::started(self.clone());
        match rev.narrow(v.id(), dom) {
            Shrink::Empty => Ok(None),
            Shrink::Kept => Ok(Some(self.clone())),
            Shrink::Shrunk => {
                let (store, changed) = rev.finish();
                propagation::fixpoint(store, changed)
            }
        }
    }

    /// Installs a constraint through the plugin dispatcher and propagates to
    /// a fixed point.
    pub fn add_constraint(&self, c: &Constraint) -> Result<Option<Store>> {
        let plugins = self.plugins.clone();
        let plugin = plugins.for_kind(c.kind());
        let first = self.next_constraint;
        let Some((store, changed)) = plugin.install(self.clone(), c)? else {
            return Ok(None);
        };
        let fresh_ids: Vec<ConstraintId> = (first..store.next_constraint).collect();
        propagation::fixpoint_seeded(store, fresh_ids, changed)
    }

    /// Registers a relational/FD variable pairing and cross-propagates any
    /// ground end immediately.
    pub fn link(&self, rel: &LVar, fd: &LVar) -> Result<Option<Store>> {
        let mut store = self.clone();
        store.registry = store.registry.register(rel, fd);
        let mut rev = Revision::started(store);
        for (a, b) in [(rel, fd), (fd, rel)] {
            if let Some(t) = rev.subst_end(a.id()) {
                let Some(k) = t.as_int().filter(|k| *k >= 1) else {
                    return Ok(None);
                };
                if rev.narrow(b.id(), &Domain::singleton(k as u32)) == Shrink::Empty {
                    return Ok(None);
                }
            }
        }
        if let Some(d) = rev.store.domains.get(&fd.id()).cloned() {
            if let Some(k) = d.value() {
                if rev.narrow(rel.id(), &Domain::singleton(k)) == Shrink::Empty {
                    return Ok(None);
                }
            }
        }
        let (store, changed) = rev.finish();
        propagation::fixpoint(store, changed)
    }

    /// Descriptors of the constraints still active in this store. Entailed
    /// constraints have been removed.
    pub fn active_constraints(&self) -> Vec<ConstraintDescriptor> {
        let mut ids: Vec<ConstraintId> = self.constraints.keys().copied().collect();
        ids.sort_unstable();
        ids.iter()
            .map(|id| self.constraints[id].descriptor())
            .collect()
    }

    pub(crate) fn constraint(&self, id: ConstraintId) -> Option<&Arc<dyn Propagator>> {
        self.constraints.get(&id)
    }

    pub(crate) fn watchers_of(&self, v: VarId) -> impl Iterator<Item = ConstraintId> + '_ {
        self.watchers.get(&v).into_iter().flatten().copied()
    }

    pub(crate) fn next_constraint_id(&self) -> ConstraintId {
        self.next_constraint
    }

    /// Registers a propagator, indexing it under each watched variable and
    /// that variable's current root.
    pub(crate) fn install_propagator(&self, p: Arc<dyn Propagator>) -> Store {
        let id = self.next_constraint;
        trace!(constraint = %p.descriptor().description, id, "installing constraint");
        let mut next = self.clone();
        next.constraints = next.constraints.update(id, p.clone());
        next.next_constraint += 1;
        next.index_watches(id, p.variables());
        next
    }

    /// Indexes a constraint under each watched variable and that variable's
    /// current root.
    fn index_watches(&mut self, id: ConstraintId, watched: &[VarId]) {
        for v in watched {
            let root = match self.subst.walk_id(*v) {
                WalkEnd::Free(root) => Some(root),
                WalkEnd::Bound(_) => None,
            };
            let mut keys = vec![*v];
            if let Some(root) = root {
                if root != *v {
                    keys.push(root);
                }
            }
            for key in keys {
                let set = self.watchers.get(&key).cloned().unwrap_or_default();
                self.watchers = self.watchers.update(key, set.update(id));
            }
        }
    }

    pub(crate) fn remove_constraint_entry(&self, id: ConstraintId) -> Store {
        let mut next = self.clone();
        if let Some(p) = next.constraints.get(&id).cloned() {
            for v in p.variables() {
                if let Some(set) = next.watchers.get(v) {
                    next.watchers = next.watchers.update(*v, set.without(&id));
                }
            }
        }
        next.constraints = next.constraints.without(&id);
        next
    }

    pub(crate) fn replace_constraint_entry(&self, id: ConstraintId, p: Arc<dyn Propagator>) -> Store {
        let mut next = self.remove_constraint_entry(id);
        next.constraints = next.constraints.update(id, p.clone());
        next.index_watches(id, p.variables());
        next
    }

    /// Assigns a domain to a freshly allocated variable, with the MaxValue
    /// capacity check. For auxiliary variables created during constraint
    /// decomposition.
    pub(crate) fn with_raw_domain(&self, v: &LVar, dom: Domain) -> Result<Store> {
        if let Some(mx) = dom.max() {
            if mx > self.max_value {
                return Err(capacity(format!(
                    "domain value {} exceeds MaxValue {}",
                    mx, self.max_value
                )));
            }
        }
        let mut next = self.clone();
        next.domains = next.domains.update(v.id(), dom);
        Ok(next)
    }

    /// Marks `v` as FD-tracked, giving it the full `[1 .. MaxValue]` domain
    /// if it has none.
    pub(crate) fn ensure_fd(&self, v: VarId) -> Store {
        match self.subst.walk_id(v) {
            WalkEnd::Free(root) => {
                if self.domains.contains_key(&root) {
                    self.clone()
                } else {
                    let mut next = self.clone();
                    next.domains = next
                        .domains
                        .update(root, Domain::range(1, self.max_value));
                    next
                }
            }
            WalkEnd::Bound(_) => self.clone(),
        }
    }
}

/// How a narrowing request turned out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Shrink {
    /// No change: the domain already satisfied the request.
    Kept,
    /// The domain shrank (or a variable was bound).
    Shrunk,
    /// The request emptied a domain or contradicted a binding.
    Empty,
}

/// An in-flight revision of a store: the one mutable context in the crate.
///
/// Propagators and the hybrid hooks funnel every domain change through
/// [`Revision::narrow`], which performs root resolution, monotone
/// intersection, the singleton-to-binding sync and the registry
/// cross-propagation, and records each changed variable for the engine's
/// scheduler.
pub(crate) struct Revision {
    store: Store,
    changed: Vec<VarId>,
}

impl Revision {
    pub(crate) fn new(store: &Store) -> Revision {
        Revision::started(store.clone())
    }

    pub(crate) fn started(store: Store) -> Revision {
        Revision {
            store,
            changed: Vec::new(),
        }
    }

    pub(crate) fn max_value(&self) -> u32 {
        self.store.max_value
    }

    /// The current domain view of `v`, reflecting narrows made by this
    /// revision.
    pub(crate) fn view(&self, v: VarId) -> Domain {
        self.store.fd_view(v)
    }

    pub(crate) fn record(&mut self, v: VarId) {
        if !self.changed.contains(&v) {
            self.changed.push(v);
        }
    }

    /// Intersects `v`'s domain with `dom`. Handles ground variables
    /// (membership check), binds the variable when the result is a
    /// singleton, and keeps registered hybrid partners in sync.
    pub(crate) fn narrow(&mut self, v: VarId, dom: &Domain) -> Shrink {
        let root = match self.store.subst.walk_id(v) {
            WalkEnd::Bound(t) => {
                return match t.as_int() {
                    Some(k) if k >= 1 && dom.contains(k as u32) => Shrink::Kept,
                    _ => Shrink::Empty,
                };
            }
            WalkEnd::Free(root) => root,
        };
        let tracked = self.store.domains.get(&root).cloned();
        let base = tracked
            .clone()
            .unwrap_or_else(|| Domain::range(1, self.store.max_value));
        let next = base.intersect(dom);
        if next.is_empty() {
            return Shrink::Empty;
        }
        if next == base && tracked.is_some() {
            return Shrink::Kept;
        }
        self.store.domains = self.store.domains.update(root, next);
        self.record(root);
        self.narrowed_hooks(root)
    }

    /// Narrows `v` to the (clamped) inclusive range `[lo .. hi]`.
    pub(crate) fn narrow_bounds(&mut self, v: VarId, lo: i64, hi: i64) -> Shrink {
        if hi < 1 || lo > self.store.max_value as i64 || hi < lo {
            return Shrink::Empty;
        }
        let lo = lo.clamp(1, self.store.max_value as i64) as u32;
        let hi = hi.clamp(1, self.store.max_value as i64) as u32;
        self.narrow(v, &Domain::range(lo, hi))
    }

    /// Binds the free root `v` to the integer `k` in the substitution and
    /// fires the bound hooks.
    pub(crate) fn bind_int(&mut self, v: VarId, k: u32) -> Shrink {
        self.store.subst = self.store.subst.extend(v, Term::Atom(Value::Int(k as i64)));
        self.record(v);
        self.bound_hooks(v)
    }

    fn narrowed_hooks(&mut self, v: VarId) -> Shrink {
        let plugins = self.store.plugins.clone();
        for plugin in plugins.all() {
            if plugin.on_narrowed(self, v) == Shrink::Empty {
                return Shrink::Empty;
            }
        }
        Shrink::Shrunk
    }

    pub(crate) fn bound_hooks(&mut self, v: VarId) -> Shrink {
        let plugins = self.store.plugins.clone();
        for plugin in plugins.all() {
            if plugin.on_bound(self, v) == Shrink::Empty {
                return Shrink::Empty;
            }
        }
        Shrink::Shrunk
    }

    pub(crate) fn domain_entry(&self, v: VarId) -> Option<Domain> {
        self.store.domains.get(&v).cloned()
    }

    pub(crate) fn set_domain_entry(&mut self, v: VarId, dom: Domain) {
        self.store.domains = self.store.domains.update(v, dom);
        self.record(v);
    }

    pub(crate) fn take_domain_entry(&mut self, v: VarId) -> Option<Domain> {
        let d = self.store.domains.get(&v).cloned();
        if d.is_some() {
            self.store.domains = self.store.domains.without(&v);
        }
        d
    }

    pub(crate) fn partners(&self, v: VarId) -> Vec<VarId> {
        self.store.registry.partners(v)
    }

    pub(crate) fn subst_end(&self, v: VarId) -> Option<Term> {
        match self.store.subst.walk_id(v) {
            WalkEnd::Free(_) => None,
            WalkEnd::Bound(t) => Some(t.clone()),
        }
    }

    pub(crate) fn alias_root(&self, v: VarId) -> Option<VarId> {
        match self.store.subst.walk_id(v) {
            WalkEnd::Free(root) if root != v => Some(root),
            _ => None,
        }
    }

    /// Folds `from`'s watcher set into `to`'s, so constraints registered on
    /// an aliased variable wake up when the new root changes.
    pub(crate) fn merge_watchers(&mut self, from: VarId, to: VarId) {
        let Some(source) = self.store.watchers.get(&from).cloned() else {
            return;
        };
        let target = self.store.watchers.get(&to).cloned().unwrap_or_default();
        self.store.watchers = self.store.watchers.update(to, target.union(source));
    }

    pub(crate) fn inherit_partners(&mut self, from: VarId, to: VarId) {
        self.store.registry = self.store.registry.inherit(from, to);
    }

    pub(crate) fn finish(self) -> (Store, Vec<VarId>) {
        (self.store, self.changed)
    }

    /// Converts the accumulated changes into a propagator outcome.
    pub(crate) fn into_outcome(self, entailed: bool) -> Outcome {
        if self.changed.is_empty() {
            if entailed {
                Outcome::Entailed
            } else {
                Outcome::Quiet
            }
        } else {
            Outcome::Pruned {
                store: self.store,
                changed: self.changed,
                entailed,
            }
        }
    }
}
