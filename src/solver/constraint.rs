//! The propagator contract and the closed set of constraint constructors.

use std::sync::Arc;

use crate::{
    error::{usage, Result},
    solver::{domain::Domain, store::Store},
    term::{Term, Value, VarId},
};

/// A numeric identifier for a single constraint in a store.
pub type ConstraintId = usize;

/// Human-readable identification of a constraint, for diagnostics and
/// tracing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintDescriptor {
    pub name: String,
    pub description: String,
}

/// What a propagator reports back to the fixed-point engine.
#[derive(Debug)]
pub enum Outcome {
    /// Nothing to do: already satisfied for now, or not enough information.
    Quiet,
    /// Domains were narrowed (and possibly variables bound). `changed` lists
    /// every variable whose domain or binding changed; `entailed` marks the
    /// constraint as satisfied by every completion of the new store.
    Pruned {
        store: Store,
        changed: Vec<VarId>,
        entailed: bool,
    },
    /// Satisfied by every completion of the current store; remove from the
    /// constraint set.
    Entailed,
    /// The store cannot be extended to satisfy this constraint.
    Failed,
    /// The constraint re-anchored itself (relational constraints update
    /// their watch set as bindings accrue). The engine swaps it in place.
    Rewritten { replacement: Arc<dyn Propagator> },
}

/// A propagator: the runnable form of a constraint.
///
/// `propagate` must be idempotent and monotone: re-running it on its own
/// output changes nothing, and its output domains are always subsets of its
/// input domains.
pub trait Propagator: std::fmt::Debug + Send + Sync {
    /// The variables whose change causes this constraint to be re-examined.
    fn variables(&self) -> &[VarId];

    fn descriptor(&self) -> ConstraintDescriptor;

    fn propagate(&self, store: &Store) -> Result<Outcome>;
}

/// Which plugin a constraint is dispatched to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginKind {
    FiniteDomain,
    Relational,
}

/// The atom shapes checkable by [`type_of`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Number,
    Boolean,
    Text,
}

/// A constraint value: the declarative form handed to
/// [`Store::add_constraint`](crate::solver::store::Store::add_constraint),
/// where the plugin dispatcher turns it into one or more propagators.
///
/// The set is closed; use the constructor functions below, which validate
/// their inputs synchronously (usage errors surface before any propagation).
#[derive(Debug, Clone)]
pub enum Constraint {
    Among {
        vars: Vec<Term>,
        set: Domain,
        count: Term,
    },
    BinPacking {
        items: Vec<Term>,
        sizes: Vec<u32>,
        capacities: Vec<u32>,
    },
    Circuit {
        succ: Vec<Term>,
        start: usize,
    },
    Count {
        vars: Vec<Term>,
        value: u32,
        count: Term,
    },
    Cumulative {
        starts: Vec<Term>,
        durations: Vec<u32>,
        demands: Vec<u32>,
        capacity: u32,
    },
    Diffn {
        xs: Vec<Term>,
        ys: Vec<Term>,
        widths: Vec<u32>,
        heights: Vec<u32>,
    },
    DistinctCount {
        vars: Vec<Term>,
        count: Term,
    },
    Element {
        index: Term,
        values: Vec<u32>,
        result: Term,
    },
    EqualityReified {
        x: Term,
        y: Term,
        b: Term,
    },
    Gcc {
        vars: Vec<Term>,
        min_counts: Vec<u32>,
        max_counts: Vec<u32>,
    },
    InSetReified {
        var: Term,
        set: Domain,
        b: Term,
    },
    LexLess {
        xs: Vec<Term>,
        ys: Vec<Term>,
    },
    LexLessEq {
        xs: Vec<Term>,
        ys: Vec<Term>,
    },
    Max {
        vars: Vec<Term>,
        result: Term,
    },
    Min {
        vars: Vec<Term>,
        result: Term,
    },
    NoOverlap {
        starts: Vec<Term>,
        durations: Vec<u32>,
    },
    Plus {
        x: Term,
        y: Term,
        z: Term,
    },
    Leq {
        x: Term,
        offset: i64,
        y: Term,
    },
    LeqReified {
        b: Term,
        x: Term,
        offset: i64,
        y: Term,
    },
    LinearSum {
        weights: Vec<i64>,
        vars: Vec<Term>,
        constant: i64,
        total: Term,
    },
    BoolSum {
        vars: Vec<Term>,
        total: Term,
    },
    NotEqual {
        x: Term,
        y: Term,
    },
    AbsDiffNotEqual {
        x: Term,
        y: Term,
        c: u32,
    },
    SuccessorReified {
        b: Term,
        x: Term,
        y: Term,
    },
    Disequal {
        lhs: Term,
        rhs: Term,
    },
    Absent {
        atom: Value,
        term: Term,
    },
    TypeOf {
        term: Term,
        kind: TypeKind,
    },
}

impl Constraint {
    pub fn kind(&self) -> PluginKind {
        match self {
            Constraint::Disequal { .. } | Constraint::Absent { .. } | Constraint::TypeOf { .. } => {
                PluginKind::Relational
            }
            _ => PluginKind::FiniteDomain,
        }
    }
}

fn require(cond: bool, msg: &str) -> Result<()> {
    if cond {
        Ok(())
    } else {
        Err(usage(msg))
    }
}

/// Among: the number of `vars` taking a value in `set` is `count - 1`.
pub fn among(vars: Vec<Term>, set: Domain, count: Term) -> Result<Constraint> {
    require(!vars.is_empty(), "among: vars must be non-empty")?;
    Ok(Constraint::Among { vars, set, count })
}

/// BinPacking: `items[i]` is the bin of item i; each bin's load stays within
/// its capacity.
pub fn bin_packing(items: Vec<Term>, sizes: Vec<u32>, capacities: Vec<u32>) -> Result<Constraint> {
    require(!items.is_empty(), "bin_packing: items must be non-empty")?;
    require(
        items.len() == sizes.len(),
        "bin_packing: items and sizes must have the same length",
    )?;
    require(
        !capacities.is_empty(),
        "bin_packing: capacities must be non-empty",
    )?;
    Ok(Constraint::BinPacking {
        items,
        sizes,
        capacities,
    })
}

/// Circuit: `succ` is a Hamiltonian cycle through all indices, visiting
/// `start` first. `start` is 1-based.
pub fn circuit(succ: Vec<Term>, start: usize) -> Result<Constraint> {
    require(succ.len() >= 2, "circuit: needs at least two nodes")?;
    require(
        (1..=succ.len()).contains(&start),
        "circuit: start index out of range",
    )?;
    Ok(Constraint::Circuit { succ, start })
}

/// Count: the number of `vars` equal to `value` is `count - 1`.
pub fn count(vars: Vec<Term>, value: u32, count: Term) -> Result<Constraint> {
    require(!vars.is_empty(), "count: vars must be non-empty")?;
    require(value >= 1, "count: value must be positive")?;
    Ok(Constraint::Count { vars, value, count })
}

/// Cumulative: tasks at `starts` with the given durations and demands never
/// exceed `capacity` at any time point.
pub fn cumulative(
    starts: Vec<Term>,
    durations: Vec<u32>,
    demands: Vec<u32>,
    capacity: u32,
) -> Result<Constraint> {
    require(!starts.is_empty(), "cumulative: starts must be non-empty")?;
    require(
        starts.len() == durations.len() && starts.len() == demands.len(),
        "cumulative: starts, durations and demands must have the same length",
    )?;
    require(
        durations.iter().all(|d| *d >= 1),
        "cumulative: durations must be positive",
    )?;
    require(capacity >= 1, "cumulative: capacity must be positive")?;
    Ok(Constraint::Cumulative {
        starts,
        durations,
        demands,
        capacity,
    })
}

/// Diffn: axis-aligned rectangles `(xs[i], ys[i], widths[i], heights[i])` do
/// not overlap pairwise.
pub fn diffn(
    xs: Vec<Term>,
    ys: Vec<Term>,
    widths: Vec<u32>,
    heights: Vec<u32>,
) -> Result<Constraint> {
    require(!xs.is_empty(), "diffn: rectangles must be non-empty")?;
    require(
        xs.len() == ys.len() && xs.len() == widths.len() && xs.len() == heights.len(),
        "diffn: xs, ys, widths and heights must have the same length",
    )?;
    require(
        widths.iter().chain(heights.iter()).all(|d| *d >= 1),
        "diffn: widths and heights must be positive",
    )?;
    Ok(Constraint::Diffn {
        xs,
        ys,
        widths,
        heights,
    })
}

/// DistinctCount: the number of distinct values taken by `vars` is
/// `count - 1`.
pub fn distinct_count(vars: Vec<Term>, count: Term) -> Result<Constraint> {
    require(!vars.is_empty(), "distinct_count: vars must be non-empty")?;
    Ok(Constraint::DistinctCount { vars, count })
}

/// Element: `result = values[index - 1]`, arc-consistent over the table.
pub fn element(index: Term, values: Vec<u32>, result: Term) -> Result<Constraint> {
    require(!values.is_empty(), "element: values must be non-empty")?;
    require(
        values.iter().all(|v| *v >= 1),
        "element: values must be positive",
    )?;
    Ok(Constraint::Element {
        index,
        values,
        result,
    })
}

/// EqualityReified: `b <=> (x == y)`, with booleans encoded {1 = false,
/// 2 = true}.
pub fn equality_reified(x: Term, y: Term, b: Term) -> Result<Constraint> {
    Ok(Constraint::EqualityReified { x, y, b })
}

/// Global cardinality: value `v` (1-based index into the count slices) is
/// taken by at least `min_counts[v-1]` and at most `max_counts[v-1]` of the
/// variables.
pub fn gcc(vars: Vec<Term>, min_counts: Vec<u32>, max_counts: Vec<u32>) -> Result<Constraint> {
    require(!vars.is_empty(), "gcc: vars must be non-empty")?;
    require(
        min_counts.len() == max_counts.len(),
        "gcc: min_counts and max_counts must have the same length",
    )?;
    require(!min_counts.is_empty(), "gcc: counts must be non-empty")?;
    require(
        min_counts
            .iter()
            .zip(max_counts.iter())
            .all(|(lo, hi)| lo <= hi),
        "gcc: min_counts must not exceed max_counts",
    )?;
    Ok(Constraint::Gcc {
        vars,
        min_counts,
        max_counts,
    })
}

/// InSetReified: `b <=> (var in set)`.
pub fn in_set_reified(var: Term, set: Domain, b: Term) -> Result<Constraint> {
    Ok(Constraint::InSetReified { var, set, b })
}

/// LexLess: `xs` is strictly lexicographically smaller than `ys`.
pub fn lex_less(xs: Vec<Term>, ys: Vec<Term>) -> Result<Constraint> {
    require(!xs.is_empty(), "lex_less: tuples must be non-empty")?;
    require(
        xs.len() == ys.len(),
        "lex_less: tuples must have the same length",
    )?;
    Ok(Constraint::LexLess { xs, ys })
}

/// LexLessEq: `xs` is lexicographically smaller than or equal to `ys`.
pub fn lex_less_eq(xs: Vec<Term>, ys: Vec<Term>) -> Result<Constraint> {
    require(!xs.is_empty(), "lex_less_eq: tuples must be non-empty")?;
    require(
        xs.len() == ys.len(),
        "lex_less_eq: tuples must have the same length",
    )?;
    Ok(Constraint::LexLessEq { xs, ys })
}

/// Max: `result` is the maximum of `vars`, bounds-consistent.
pub fn max_of(vars: Vec<Term>, result: Term) -> Result<Constraint> {
    require(!vars.is_empty(), "max_of: vars must be non-empty")?;
    Ok(Constraint::Max { vars, result })
}

/// Min: `result` is the minimum of `vars`, bounds-consistent.
pub fn min_of(vars: Vec<Term>, result: Term) -> Result<Constraint> {
    require(!vars.is_empty(), "min_of: vars must be non-empty")?;
    Ok(Constraint::Min { vars, result })
}

/// NoOverlap: unary-resource scheduling; delegates to Cumulative with unit
/// demands and capacity 1.
pub fn no_overlap(starts: Vec<Term>, durations: Vec<u32>) -> Result<Constraint> {
    require(!starts.is_empty(), "no_overlap: starts must be non-empty")?;
    require(
        starts.len() == durations.len(),
        "no_overlap: starts and durations must have the same length",
    )?;
    require(
        durations.iter().all(|d| *d >= 1),
        "no_overlap: durations must be positive",
    )?;
    Ok(Constraint::NoOverlap { starts, durations })
}

/// Plus: `x + y = z`, bounds-consistent.
pub fn plus(x: Term, y: Term, z: Term) -> Result<Constraint> {
    Ok(Constraint::Plus { x, y, z })
}

/// Leq: `x + offset <= y`, bounds-consistent.
pub fn leq(x: Term, offset: i64, y: Term) -> Result<Constraint> {
    Ok(Constraint::Leq { x, offset, y })
}

/// LeqReified: `b <=> (x + offset <= y)`.
pub fn leq_reified(b: Term, x: Term, offset: i64, y: Term) -> Result<Constraint> {
    Ok(Constraint::LeqReified { b, x, offset, y })
}

/// LinearSum: `sum(weights[i] * vars[i]) + constant = total`.
pub fn linear_sum(
    weights: Vec<i64>,
    vars: Vec<Term>,
    constant: i64,
    total: Term,
) -> Result<Constraint> {
    require(!vars.is_empty(), "linear_sum: vars must be non-empty")?;
    require(
        weights.len() == vars.len(),
        "linear_sum: weights and vars must have the same length",
    )?;
    Ok(Constraint::LinearSum {
        weights,
        vars,
        constant,
        total,
    })
}

/// BoolSum: `total` encodes (number of true booleans in `vars`) + 1.
pub fn bool_sum(vars: Vec<Term>, total: Term) -> Result<Constraint> {
    require(!vars.is_empty(), "bool_sum: vars must be non-empty")?;
    Ok(Constraint::BoolSum { vars, total })
}

/// NotEqual: `x != y`.
pub fn not_equal(x: Term, y: Term) -> Result<Constraint> {
    Ok(Constraint::NotEqual { x, y })
}

/// AbsDiffNotEqual: `|x - y| != c`.
pub fn abs_diff_not_equal(x: Term, y: Term, c: u32) -> Result<Constraint> {
    require(c >= 1, "abs_diff_not_equal: c must be positive")?;
    Ok(Constraint::AbsDiffNotEqual { x, y, c })
}

/// SuccessorReified: `b => (y = x + 1)`, with the contrapositive
/// `(y = x + 1 impossible) => b = false`.
pub fn successor_reified(b: Term, x: Term, y: Term) -> Result<Constraint> {
    Ok(Constraint::SuccessorReified { b, x, y })
}

/// Disequal: the two terms never unify.
pub fn disequal(lhs: Term, rhs: Term) -> Result<Constraint> {
    Ok(Constraint::Disequal { lhs, rhs })
}

/// Absent: `atom` occurs nowhere in the (walked) term.
pub fn absent(atom: Value, term: Term) -> Result<Constraint> {
    Ok(Constraint::Absent { atom, term })
}

/// TypeOf: the term is an atom of the given shape.
pub fn type_of(term: Term, kind: TypeKind) -> Result<Constraint> {
    Ok(Constraint::TypeOf { term, kind })
}
