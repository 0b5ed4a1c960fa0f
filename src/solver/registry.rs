//! The hybrid registry: a bidirectional mapping between relational and
//! finite-domain variables.

use im::HashMap;

use crate::term::{LVar, VarId};

/// An immutable bidirectional variable mapping. Registering returns a new
/// instance, preserving the store's copy-on-write semantics.
#[derive(Clone, Debug, Default)]
pub struct HybridRegistry {
    rel_to_fd: HashMap<VarId, VarId>,
    fd_to_rel: HashMap<VarId, VarId>,
}

impl HybridRegistry {
    pub fn new() -> HybridRegistry {
        HybridRegistry::default()
    }

    pub fn register(&self, rel: &LVar, fd: &LVar) -> HybridRegistry {
        HybridRegistry {
            rel_to_fd: self.rel_to_fd.update(rel.id(), fd.id()),
            fd_to_rel: self.fd_to_rel.update(fd.id(), rel.id()),
        }
    }

    pub fn rel_to_fd(&self, rel: &LVar) -> Option<VarId> {
        self.rel_to_fd.get(&rel.id()).copied()
    }

    pub fn fd_to_rel(&self, fd: &LVar) -> Option<VarId> {
        self.fd_to_rel.get(&fd.id()).copied()
    }

    /// Every variable paired with `v`, in either direction.
    pub(crate) fn partners(&self, v: VarId) -> Vec<VarId> {
        let mut out = Vec::new();
        if let Some(fd) = self.rel_to_fd.get(&v) {
            out.push(*fd);
        }
        if let Some(rel) = self.fd_to_rel.get(&v) {
            out.push(*rel);
        }
        out
    }

    /// Copies `from`'s pairings onto `to`. Used when unification aliases a
    /// registered variable to a new root.
    pub(crate) fn inherit(&self, from: VarId, to: VarId) -> HybridRegistry {
        let mut next = self.clone();
        if let Some(fd) = self.rel_to_fd.get(&from) {
            next.rel_to_fd = next.rel_to_fd.update(to, *fd);
        }
        if let Some(rel) = self.fd_to_rel.get(&from) {
            next.fd_to_rel = next.fd_to_rel.update(to, *rel);
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_is_bidirectional_and_persistent() {
        let rel = LVar::new(0, "q");
        let fd = LVar::new(1, "x");
        let empty = HybridRegistry::new();
        let reg = empty.register(&rel, &fd);
        assert_eq!(empty.rel_to_fd(&rel), None);
        assert_eq!(reg.rel_to_fd(&rel), Some(1));
        assert_eq!(reg.fd_to_rel(&fd), Some(0));
        assert_eq!(reg.partners(0), vec![1]);
        assert_eq!(reg.partners(1), vec![0]);
    }
}
