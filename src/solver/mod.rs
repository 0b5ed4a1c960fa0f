//! The solver core: domains, the unified store, the propagation engine and
//! the constraint library.

pub mod constraint;
pub mod constraints;
pub mod domain;
pub(crate) mod plugin;
pub(crate) mod propagation;
pub mod registry;
pub mod store;
pub mod subst;
pub(crate) mod work_list;
