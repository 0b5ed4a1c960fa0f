//! Ligo is a hybrid constraint-logic programming engine: a miniKanren-style
//! relational solver coupled with a finite-domain (FD) propagation engine,
//! unified by an immutable copy-on-write store that supports parallel
//! backtracking search.
//!
//! # Core Concepts
//!
//! - **[`Store`]**: one immutable snapshot of a search branch, holding the
//!   substitution, the FD domains and the active constraints. Mutators
//!   return new snapshots; `Ok(None)` means the branch is inconsistent.
//! - **[`Domain`]**: an immutable bitset of positive integers with full set
//!   algebra.
//! - **[`constraint`]**: constructors for the constraint library (Among,
//!   BinPacking, Circuit, Cumulative, Diffn, Element, GCC, Lex, Min/Max,
//!   NoOverlap, DistinctCount, Count, the reified constraints and the
//!   arithmetic primitives, plus relational disequality/absence/type
//!   checks).
//! - **[`goal`]**: relational goals (`eq`, `fresh`, `conde`, `posts`,
//!   `label`, ...) interpreted by the search driver.
//! - **[`run`] / [`run_all`]**: query entry points returning the deep-walked
//!   query variables per solution.
//!
//! # Example: a two-variable FD query
//!
//! `x` ranges over `[1..2]`, `y` is pinned to `1`, and the two must differ,
//! so the only solution binds `x = 2`.
//!
//! ```
//! use ligo::{constraint, goal, Domain, SearchConfig, Term};
//!
//! let solutions = ligo::run_with(&SearchConfig::sequential(), None, &["x", "y"], |q| {
//!     let (x, y) = (q[0].clone(), q[1].clone());
//!     goal::all(vec![
//!         goal::dom(x.clone(), Domain::range(1, 2)),
//!         goal::dom(y.clone(), Domain::singleton(1)),
//!         goal::posts(constraint::not_equal(x.clone(), y.clone()).unwrap()),
//!         goal::label(vec![x, y]),
//!     ])
//! })
//! .unwrap();
//!
//! assert_eq!(solutions, vec![vec![Term::from(2), Term::from(1)]]);
//! ```

pub mod error;
pub mod goal;
pub mod search;
pub mod solver;
pub mod term;

pub use error::{Error, Result, SolverError};
pub use search::{
    run, run_all, run_with, solutions, solve_with, LabelOrder, SearchConfig, SearchStats,
    Solutions,
};
pub use solver::constraint::{
    self, Constraint, ConstraintDescriptor, ConstraintId, Outcome, PluginKind, Propagator,
    TypeKind,
};
pub use solver::domain::{Domain, DEFAULT_MAX_VALUE};
pub use solver::registry::HybridRegistry;
pub use solver::store::Store;
pub use solver::subst::Subst;
pub use term::{LVar, Term, Value, VarId};
