//! The plugin dispatcher: routes constraints to the finite-domain or
//! relational plugin and cross-propagates bindings between the two sides.

use std::sync::Arc;

use crate::{
    error::{capacity, usage, Result},
    solver::{
        constraint::{Constraint, PluginKind, Propagator},
        constraints::{
            among::AmongPropagator,
            arith::{LeqPropagator, LeqReifiedPropagator, PlusPropagator, SuccessorReifiedPropagator},
            bool_sum::BoolSumPropagator,
            cumulative::CumulativePropagator,
            element::ElementPropagator,
            gcc::GccPropagator,
            lex::LexPropagator,
            linear::LinearSumPropagator,
            min_max::{MaxPropagator, MinPropagator},
            not_equal::{AbsDiffNotEqualPropagator, NotEqualPropagator},
            reify::{EqualityReifiedPropagator, InSetReifiedPropagator},
            tree::{scan_absent, AbsentPropagator, DisequalPropagator, Scan, TypeOfPropagator},
        },
        domain::Domain,
        store::{Revision, Shrink, Store},
    },
    term::{Term, VarId},
};

/// One side of the hybrid engine. After any mutation both plugins are
/// offered a chance to react through the `on_bound` / `on_narrowed` hooks.
pub(crate) trait ConstraintPlugin: std::fmt::Debug + Send + Sync {
    fn kind(&self) -> PluginKind;

    /// Turns a declarative constraint into registered propagators, possibly
    /// allocating auxiliary variables and narrowing initial domains.
    /// Returns the extended store plus the variables changed during
    /// installation.
    fn install(&self, store: Store, c: &Constraint) -> Result<Option<(Store, Vec<VarId>)>>;

    /// A relational unification just bound `v`.
    fn on_bound(&self, rev: &mut Revision, v: VarId) -> Shrink;

    /// The FD domain of `v` just shrank.
    fn on_narrowed(&self, rev: &mut Revision, v: VarId) -> Shrink;
}

/// The closed plugin table carried by every store.
#[derive(Debug)]
pub(crate) struct PluginSet {
    fd: FdPlugin,
    relational: RelationalPlugin,
}

impl PluginSet {
    pub(crate) fn standard() -> PluginSet {
        PluginSet {
            fd: FdPlugin,
            relational: RelationalPlugin,
        }
    }

    pub(crate) fn for_kind(&self, kind: PluginKind) -> &dyn ConstraintPlugin {
        match kind {
            PluginKind::FiniteDomain => &self.fd,
            PluginKind::Relational => &self.relational,
        }
    }

    pub(crate) fn all(&self) -> [&dyn ConstraintPlugin; 2] {
        [&self.fd, &self.relational]
    }
}

/// The finite-domain plugin: installs the FD constraint library (expanding
/// composites into primitive propagators) and keeps the FD table consistent
/// with the substitution.
#[derive(Debug)]
pub(crate) struct FdPlugin;

/// The relational plugin: disequality, absence and type checks over terms.
#[derive(Debug)]
pub(crate) struct RelationalPlugin;

impl ConstraintPlugin for FdPlugin {
    fn kind(&self) -> PluginKind {
        PluginKind::FiniteDomain
    }

    fn install(&self, store: Store, c: &Constraint) -> Result<Option<(Store, Vec<VarId>)>> {
        let mut inst = Installer::new(store);
        match c {
            Constraint::Plus { x, y, z } => {
                let (x, y, z) = (inst.resolve(x)?, inst.resolve(y)?, inst.resolve(z)?);
                inst.add(Arc::new(PlusPropagator::new(x, y, z)));
            }
            Constraint::Leq { x, offset, y } => {
                let (x, y) = (inst.resolve(x)?, inst.resolve(y)?);
                inst.add(Arc::new(LeqPropagator::new(x, *offset, y)));
            }
            Constraint::LeqReified { b, x, offset, y } => {
                let (b, x, y) = (inst.resolve_bool(b)?, inst.resolve(x)?, inst.resolve(y)?);
                inst.add(Arc::new(LeqReifiedPropagator::new(b, x, *offset, y)));
            }
            Constraint::SuccessorReified { b, x, y } => {
                let (b, x, y) = (inst.resolve_bool(b)?, inst.resolve(x)?, inst.resolve(y)?);
                inst.add(Arc::new(SuccessorReifiedPropagator::new(b, x, y)));
            }
            Constraint::LinearSum {
                weights,
                vars,
                constant,
                total,
            } => {
                let xs = inst.resolve_all(vars)?;
                let total = inst.resolve(total)?;
                inst.add(Arc::new(LinearSumPropagator::new(
                    weights.clone(),
                    xs,
                    *constant,
                    total,
                )));
            }
            Constraint::BoolSum { vars, total } => {
                let bs = inst.resolve_bools(vars)?;
                let total = inst.resolve(total)?;
                inst.add(Arc::new(BoolSumPropagator::new(bs, total)));
            }
            Constraint::NotEqual { x, y } => {
                let (x, y) = (inst.resolve(x)?, inst.resolve(y)?);
                inst.add(Arc::new(NotEqualPropagator::new(x, y)));
            }
            Constraint::AbsDiffNotEqual { x, y, c } => {
                let (x, y) = (inst.resolve(x)?, inst.resolve(y)?);
                inst.add(Arc::new(AbsDiffNotEqualPropagator::new(x, y, *c)));
            }
            Constraint::EqualityReified { x, y, b } => {
                let (x, y, b) = (inst.resolve(x)?, inst.resolve(y)?, inst.resolve_bool(b)?);
                inst.add(Arc::new(EqualityReifiedPropagator::new(x, y, b)));
            }
            Constraint::InSetReified { var, set, b } => {
                inst.check_capacity(set)?;
                let (v, b) = (inst.resolve(var)?, inst.resolve_bool(b)?);
                inst.add(Arc::new(InSetReifiedPropagator::new(v, set.clone(), b)));
            }
            Constraint::Among { vars, set, count } => {
                inst.check_capacity(set)?;
                let xs = inst.resolve_all(vars)?;
                let count = inst.resolve(count)?;
                inst.add(Arc::new(AmongPropagator::new(xs, set.clone(), count)));
            }
            Constraint::Element {
                index,
                values,
                result,
            } => {
                inst.check_capacity(&Domain::from_values(values.iter().copied()))?;
                let (index, result) = (inst.resolve(index)?, inst.resolve(result)?);
                inst.add(Arc::new(ElementPropagator::new(
                    index,
                    values.clone(),
                    result,
                )));
            }
            Constraint::Gcc {
                vars,
                min_counts,
                max_counts,
            } => {
                let xs = inst.resolve_all(vars)?;
                inst.add(Arc::new(GccPropagator::new(
                    xs,
                    min_counts.clone(),
                    max_counts.clone(),
                )));
            }
            Constraint::LexLess { xs, ys } => {
                let xs = inst.resolve_all(xs)?;
                let ys = inst.resolve_all(ys)?;
                inst.add(Arc::new(LexPropagator::new(xs, ys, true)));
            }
            Constraint::LexLessEq { xs, ys } => {
                let xs = inst.resolve_all(xs)?;
                let ys = inst.resolve_all(ys)?;
                inst.add(Arc::new(LexPropagator::new(xs, ys, false)));
            }
            Constraint::Min { vars, result } => {
                let xs = inst.resolve_all(vars)?;
                let result = inst.resolve(result)?;
                inst.add(Arc::new(MinPropagator::new(xs, result)));
            }
            Constraint::Max { vars, result } => {
                let xs = inst.resolve_all(vars)?;
                let result = inst.resolve(result)?;
                inst.add(Arc::new(MaxPropagator::new(xs, result)));
            }
            Constraint::Cumulative {
                starts,
                durations,
                demands,
                capacity,
            } => {
                let xs = inst.resolve_all(starts)?;
                inst.add(Arc::new(CumulativePropagator::new(
                    xs,
                    durations.clone(),
                    demands.clone(),
                    *capacity,
                )));
            }
            Constraint::NoOverlap { starts, durations } => {
                // Unary resource = cumulative with unit demands, capacity 1.
                let xs = inst.resolve_all(starts)?;
                let demands = vec![1; xs.len()];
                inst.add(Arc::new(CumulativePropagator::new(
                    xs,
                    durations.clone(),
                    demands,
                    1,
                )));
            }
            Constraint::Count { vars, value, count } => {
                if !inst.install_count(vars, *value, count)? {
                    return Ok(None);
                }
            }
            Constraint::DistinctCount { vars, count } => {
                if !inst.install_distinct_count(vars, count)? {
                    return Ok(None);
                }
            }
            Constraint::BinPacking {
                items,
                sizes,
                capacities,
            } => {
                if !inst.install_bin_packing(items, sizes, capacities)? {
                    return Ok(None);
                }
            }
            Constraint::Circuit { succ, start } => {
                if !inst.install_circuit(succ, *start)? {
                    return Ok(None);
                }
            }
            Constraint::Diffn {
                xs,
                ys,
                widths,
                heights,
            } => {
                if !inst.install_diffn(xs, ys, widths, heights)? {
                    return Ok(None);
                }
            }
            Constraint::Disequal { .. } | Constraint::Absent { .. } | Constraint::TypeOf { .. } => {
                return Err(usage("relational constraint routed to the FD plugin"));
            }
        }
        if inst.failed {
            return Ok(None);
        }
        Ok(Some(inst.finish()))
    }

    fn on_bound(&self, rev: &mut Revision, v: VarId) -> Shrink {
        if let Some(root) = rev.alias_root(v) {
            // v became an alias of another free variable: fold its domain,
            // watchers and registry pairings onto the new root.
            if let Some(dom) = rev.take_domain_entry(v) {
                if rev.narrow(root, &dom) == Shrink::Empty {
                    return Shrink::Empty;
                }
            }
            rev.merge_watchers(v, root);
            rev.inherit_partners(v, root);
            return Shrink::Shrunk;
        }
        let Some(end) = rev.subst_end(v) else {
            return Shrink::Kept;
        };
        match end.as_int() {
            Some(k) if k >= 1 && k <= rev.max_value() as i64 => {
                let k = k as u32;
                if let Some(dom) = rev.domain_entry(v) {
                    if !dom.contains(k) {
                        return Shrink::Empty;
                    }
                    if !dom.is_singleton() {
                        rev.set_domain_entry(v, Domain::singleton(k));
                    }
                }
                for partner in rev.partners(v) {
                    if rev.narrow(partner, &Domain::singleton(k)) == Shrink::Empty {
                        return Shrink::Empty;
                    }
                }
                Shrink::Shrunk
            }
            _ => {
                // Ground to a non-integer (or an out-of-range integer): an
                // FD-tracked or registry-linked variable cannot accept it.
                if rev.domain_entry(v).is_some() || !rev.partners(v).is_empty() {
                    Shrink::Empty
                } else {
                    Shrink::Kept
                }
            }
        }
    }

    fn on_narrowed(&self, rev: &mut Revision, v: VarId) -> Shrink {
        let Some(dom) = rev.domain_entry(v) else {
            return Shrink::Kept;
        };
        if let Some(k) = dom.value() {
            if rev.subst_end(v).is_none() && rev.alias_root(v).is_none() {
                return rev.bind_int(v, k);
            }
        }
        Shrink::Kept
    }
}

impl ConstraintPlugin for RelationalPlugin {
    fn kind(&self) -> PluginKind {
        PluginKind::Relational
    }

    fn install(&self, store: Store, c: &Constraint) -> Result<Option<(Store, Vec<VarId>)>> {
        match c {
            Constraint::Disequal { lhs, rhs } => {
                let mut log = Vec::new();
                match store.subst().unify(lhs, rhs, &mut log) {
                    // The terms can never unify: the disequality already
                    // holds in every completion.
                    None => Ok(Some((store, Vec::new()))),
                    Some(_) if log.is_empty() => Ok(None),
                    Some(_) => {
                        log.sort_unstable();
                        log.dedup();
                        let p = DisequalPropagator::new(lhs.clone(), rhs.clone(), log);
                        Ok(Some((store.install_propagator(Arc::new(p)), Vec::new())))
                    }
                }
            }
            Constraint::Absent { atom, term } => match scan_absent(store.subst(), atom, term) {
                Scan::Violated => Ok(None),
                Scan::Ground => Ok(Some((store, Vec::new()))),
                Scan::Pending(watch) => {
                    let p = AbsentPropagator::new(atom.clone(), term.clone(), watch);
                    Ok(Some((store.install_propagator(Arc::new(p)), Vec::new())))
                }
            },
            Constraint::TypeOf { term, kind } => {
                let walked = store.walk(term).clone();
                match &walked {
                    Term::Var(v) => {
                        let watch = vec![v.id()];
                        let p = TypeOfPropagator::new(term.clone(), *kind, watch);
                        Ok(Some((store.install_propagator(Arc::new(p)), Vec::new())))
                    }
                    _ => {
                        if TypeOfPropagator::matches(&walked, *kind) {
                            Ok(Some((store, Vec::new())))
                        } else {
                            Ok(None)
                        }
                    }
                }
            }
            _ => Err(usage("FD constraint routed to the relational plugin")),
        }
    }

    fn on_bound(&self, _rev: &mut Revision, _v: VarId) -> Shrink {
        Shrink::Kept
    }

    fn on_narrowed(&self, _rev: &mut Revision, _v: VarId) -> Shrink {
        Shrink::Kept
    }
}

/// Installation context for the FD plugin: resolves terms to variable ids,
/// allocates auxiliary variables and accumulates initial narrowing.
struct Installer {
    store: Store,
    changed: Vec<VarId>,
    aux: u32,
    failed: bool,
}

impl Installer {
    fn new(store: Store) -> Installer {
        Installer {
            store,
            changed: Vec::new(),
            aux: 0,
            failed: false,
        }
    }

    fn finish(self) -> (Store, Vec<VarId>) {
        (self.store, self.changed)
    }

    fn check_capacity(&self, set: &Domain) -> Result<()> {
        if let Some(mx) = set.max() {
            if mx > self.store.max_value() {
                return Err(capacity(format!(
                    "domain value {} exceeds MaxValue {}",
                    mx,
                    self.store.max_value()
                )));
            }
        }
        Ok(())
    }

    /// Resolves a term to an FD variable id. Variables become FD-tracked;
    /// ground integers get a hidden singleton-domain variable.
    fn resolve(&mut self, term: &Term) -> Result<VarId> {
        // walk stops at a non-variable or an unbound variable, so the Var
        // arm is always a free variable.
        let walked = self.store.walk(term).clone();
        match &walked {
            Term::Var(v) => {
                self.store = self.store.ensure_fd(v.id());
                Ok(v.id())
            }
            _ => self.resolve_ground(&walked),
        }
    }

    fn resolve_ground(&mut self, term: &Term) -> Result<VarId> {
        match term.as_int() {
            Some(k) if k >= 1 => {
                if k > self.store.max_value() as i64 {
                    return Err(capacity(format!(
                        "value {} exceeds MaxValue {}",
                        k,
                        self.store.max_value()
                    )));
                }
                let (store, var) = self.store.fresh(&format!("lit{}", k));
                self.store = store.with_raw_domain(&var, Domain::singleton(k as u32))?;
                Ok(var.id())
            }
            _ => Err(usage(format!(
                "FD constraint requires a variable or positive integer, got {}",
                term
            ))),
        }
    }

    fn resolve_all(&mut self, terms: &[Term]) -> Result<Vec<VarId>> {
        terms.iter().map(|t| self.resolve(t)).collect()
    }

    /// Resolves a boolean operand, constraining it to the {1 = false,
    /// 2 = true} encoding.
    fn resolve_bool(&mut self, term: &Term) -> Result<VarId> {
        let v = self.resolve(term)?;
        if !self.narrow_init(v, &Domain::range(1, 2)) {
            self.failed = true;
        }
        Ok(v)
    }

    fn resolve_bools(&mut self, terms: &[Term]) -> Result<Vec<VarId>> {
        terms.iter().map(|t| self.resolve_bool(t)).collect()
    }

    fn fresh_ranged(&mut self, name: &str, lo: u32, hi: u32) -> Result<VarId> {
        self.aux += 1;
        let (store, var) = self.store.fresh(&format!("{}{}", name, self.aux));
        self.store = store.with_raw_domain(&var, Domain::range(lo, hi))?;
        Ok(var.id())
    }

    fn fresh_bool(&mut self, name: &str) -> Result<VarId> {
        self.fresh_ranged(name, 1, 2)
    }

    fn add(&mut self, p: Arc<dyn Propagator>) {
        self.store = self.store.install_propagator(p);
    }

    /// Initial narrowing during installation. Returns false when the
    /// narrowing empties a domain; callers then abort the install as a
    /// branch failure.
    fn narrow_init(&mut self, v: VarId, dom: &Domain) -> bool {
        let mut rev = Revision::started(self.store.clone());
        match rev.narrow(v, dom) {
            Shrink::Empty => false,
            _ => {
                let (store, changed) = rev.finish();
                self.store = store;
                self.changed.extend(changed);
                true
            }
        }
    }

    fn install_count(&mut self, vars: &[Term], value: u32, count: &Term) -> Result<bool> {
        if value > self.store.max_value() {
            return Err(capacity(format!(
                "value {} exceeds MaxValue {}",
                value,
                self.store.max_value()
            )));
        }
        let xs = self.resolve_all(vars)?;
        let total = self.resolve(count)?;
        let mut bs = Vec::with_capacity(xs.len());
        for x in xs {
            let b = self.fresh_bool("cnt_b")?;
            self.add(Arc::new(InSetReifiedPropagator::new(
                x,
                Domain::singleton(value),
                b,
            )));
            bs.push(b);
        }
        self.add(Arc::new(BoolSumPropagator::new(bs, total)));
        Ok(true)
    }

    fn install_distinct_count(&mut self, vars: &[Term], count: &Term) -> Result<bool> {
        let xs = self.resolve_all(vars)?;
        let total = self.resolve(count)?;
        let n = xs.len() as u32;
        let candidates = xs
            .iter()
            .fold(Domain::empty(), |acc, x| acc.union(&self.store.fd_view(*x)));
        let mut used = Vec::new();
        for v in candidates.iter() {
            let mut bs = Vec::with_capacity(xs.len());
            for x in &xs {
                let b = self.fresh_bool("dc_b")?;
                self.add(Arc::new(InSetReifiedPropagator::new(
                    *x,
                    Domain::singleton(v),
                    b,
                )));
                bs.push(b);
            }
            let tally = self.fresh_ranged("dc_t", 1, n + 1)?;
            self.add(Arc::new(BoolSumPropagator::new(bs, tally)));
            // used_v <=> (tally >= 2), via reify(tally = 1) XOR used_v.
            let zero = self.fresh_bool("dc_z")?;
            self.add(Arc::new(InSetReifiedPropagator::new(
                tally,
                Domain::singleton(1),
                zero,
            )));
            let used_v = self.fresh_bool("dc_u")?;
            self.add(Arc::new(NotEqualPropagator::new(zero, used_v)));
            used.push(used_v);
        }
        self.add(Arc::new(BoolSumPropagator::new(used, total)));
        Ok(true)
    }

    fn install_bin_packing(
        &mut self,
        items: &[Term],
        sizes: &[u32],
        capacities: &[u32],
    ) -> Result<bool> {
        let xs = self.resolve_all(items)?;
        let bins = capacities.len() as u32;
        for x in &xs {
            if !self.narrow_init(*x, &Domain::range(1, bins)) {
                return Ok(false);
            }
        }
        let total_size: i64 = sizes.iter().map(|s| *s as i64).sum();
        for (k, cap) in capacities.iter().enumerate() {
            let bin = k as u32 + 1;
            let load = self.fresh_ranged("load", 1, cap + 1)?;
            let mut bs = Vec::with_capacity(xs.len());
            for x in &xs {
                let b = self.fresh_bool("bp_b")?;
                self.add(Arc::new(InSetReifiedPropagator::new(
                    *x,
                    Domain::singleton(bin),
                    b,
                )));
                bs.push(b);
            }
            let weights: Vec<i64> = sizes.iter().map(|s| *s as i64).collect();
            self.add(Arc::new(LinearSumPropagator::new(
                weights,
                bs,
                1 - total_size,
                load,
            )));
        }
        Ok(true)
    }

    fn install_circuit(&mut self, succ: &[Term], start: usize) -> Result<bool> {
        let n = succ.len();
        let xs = self.resolve_all(succ)?;
        for x in &xs {
            if !self.narrow_init(*x, &Domain::range(1, n as u32)) {
                return Ok(false);
            }
        }
        // Arc booleans: arcs[i][j] <=> succ[i] = j+1; self-loops pinned
        // false.
        let mut arcs = vec![vec![0 as VarId; n]; n];
        for i in 0..n {
            for j in 0..n {
                let b = if i == j {
                    self.fresh_ranged("arc_self", 1, 1)?
                } else {
                    self.fresh_bool("arc")?
                };
                self.add(Arc::new(InSetReifiedPropagator::new(
                    xs[i],
                    Domain::singleton(j as u32 + 1),
                    b,
                )));
                arcs[i][j] = b;
            }
        }
        // Exactly one outgoing and one incoming arc per node.
        for i in 0..n {
            let row = arcs[i].clone();
            let one = self.fresh_ranged("deg_out", 2, 2)?;
            self.add(Arc::new(BoolSumPropagator::new(row, one)));
        }
        for j in 0..n {
            let col: Vec<VarId> = (0..n).map(|i| arcs[i][j]).collect();
            let one = self.fresh_ranged("deg_in", 2, 2)?;
            self.add(Arc::new(BoolSumPropagator::new(col, one)));
        }
        // Visit-order variables break subtours; arcs back into the start
        // node deliberately carry no order constraint.
        let mut order = Vec::with_capacity(n);
        for i in 0..n {
            let u = if i + 1 == start {
                self.fresh_ranged("ord", 1, 1)?
            } else {
                self.fresh_ranged("ord", 2, n as u32)?
            };
            order.push(u);
        }
        for i in 0..n {
            for j in 0..n {
                if j + 1 == start || i == j {
                    continue;
                }
                self.add(Arc::new(SuccessorReifiedPropagator::new(
                    arcs[i][j], order[i], order[j],
                )));
            }
        }
        Ok(true)
    }

    fn install_diffn(
        &mut self,
        xs: &[Term],
        ys: &[Term],
        widths: &[u32],
        heights: &[u32],
    ) -> Result<bool> {
        let rx = self.resolve_all(xs)?;
        let ry = self.resolve_all(ys)?;
        for i in 0..rx.len() {
            for j in (i + 1)..rx.len() {
                let left = self.fresh_bool("sep_l")?;
                self.add(Arc::new(LeqReifiedPropagator::new(
                    left,
                    rx[i],
                    widths[i] as i64,
                    rx[j],
                )));
                let right = self.fresh_bool("sep_r")?;
                self.add(Arc::new(LeqReifiedPropagator::new(
                    right,
                    rx[j],
                    widths[j] as i64,
                    rx[i],
                )));
                let below = self.fresh_bool("sep_b")?;
                self.add(Arc::new(LeqReifiedPropagator::new(
                    below,
                    ry[i],
                    heights[i] as i64,
                    ry[j],
                )));
                let above = self.fresh_bool("sep_a")?;
                self.add(Arc::new(LeqReifiedPropagator::new(
                    above,
                    ry[j],
                    heights[j] as i64,
                    ry[i],
                )));
                // At least one separation must hold: true count in [1..4].
                let sep = self.fresh_ranged("sep_n", 2, 5)?;
                self.add(Arc::new(BoolSumPropagator::new(
                    vec![left, right, below, above],
                    sep,
                )));
            }
        }
        Ok(true)
    }
}
