//! Finite domains: immutable sets of positive integers backed by a bitset.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The default upper bound for finite-domain values. Stores built with
/// [`crate::solver::store::Store::empty`] enforce it; see
/// [`crate::solver::store::Store::with_max_value`] for other bounds.
pub const DEFAULT_MAX_VALUE: u32 = 1024;

const WORD_BITS: u32 = 64;

/// An immutable set of positive integers, stored value `v` at bit `v - 1`.
///
/// Every operation is total and pure: it returns a fresh domain and never
/// mutates the receiver. An empty domain is an ordinary value; the
/// propagation engine is what interprets it as failure.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    words: Vec<u64>,
}

impl Domain {
    /// The empty domain.
    pub fn empty() -> Domain {
        Domain { words: Vec::new() }
    }

    /// The inclusive range `[lo .. hi]`, clamped to positive values.
    /// Returns the empty domain when `hi < lo` or `hi < 1`.
    pub fn range(lo: u32, hi: u32) -> Domain {
        let lo = lo.max(1);
        if hi < lo {
            return Domain::empty();
        }
        let nwords = (hi as usize).div_ceil(WORD_BITS as usize);
        let mut words = vec![0u64; nwords];
        for v in lo..=hi {
            let bit = v - 1;
            words[(bit / WORD_BITS) as usize] |= 1u64 << (bit % WORD_BITS);
        }
        Domain { words }
    }

    /// A domain holding exactly the given values; non-positive entries are
    /// ignored.
    pub fn from_values(values: impl IntoIterator<Item = u32>) -> Domain {
        let mut words: Vec<u64> = Vec::new();
        for v in values {
            if v == 0 {
                continue;
            }
            let bit = v - 1;
            let idx = (bit / WORD_BITS) as usize;
            if idx >= words.len() {
                words.resize(idx + 1, 0);
            }
            words[idx] |= 1u64 << (bit % WORD_BITS);
        }
        Domain { words }.normalized()
    }

    /// The single-value domain `{v}`.
    pub fn singleton(v: u32) -> Domain {
        Domain::from_values([v])
    }

    fn normalized(mut self) -> Domain {
        while self.words.last() == Some(&0) {
            self.words.pop();
        }
        self
    }

    pub fn contains(&self, v: u32) -> bool {
        if v == 0 {
            return false;
        }
        let bit = v - 1;
        let idx = (bit / WORD_BITS) as usize;
        idx < self.words.len() && self.words[idx] & (1u64 << (bit % WORD_BITS)) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    /// The number of values in the domain.
    pub fn size(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn is_singleton(&self) -> bool {
        self.size() == 1
    }

    /// If the domain is a singleton, its value.
    pub fn value(&self) -> Option<u32> {
        if self.is_singleton() {
            self.min()
        } else {
            None
        }
    }

    pub fn min(&self) -> Option<u32> {
        for (i, w) in self.words.iter().enumerate() {
            if *w != 0 {
                return Some(i as u32 * WORD_BITS + w.trailing_zeros() + 1);
            }
        }
        None
    }

    pub fn max(&self) -> Option<u32> {
        for (i, w) in self.words.iter().enumerate().rev() {
            if *w != 0 {
                return Some(i as u32 * WORD_BITS + (WORD_BITS - 1 - w.leading_zeros()) + 1);
            }
        }
        None
    }

    pub fn intersect(&self, other: &Domain) -> Domain {
        let n = self.words.len().min(other.words.len());
        let words = (0..n).map(|i| self.words[i] & other.words[i]).collect();
        Domain { words }.normalized()
    }

    pub fn union(&self, other: &Domain) -> Domain {
        let n = self.words.len().max(other.words.len());
        let words = (0..n)
            .map(|i| {
                self.words.get(i).copied().unwrap_or(0) | other.words.get(i).copied().unwrap_or(0)
            })
            .collect();
        Domain { words }
    }

    /// Values in `self` but not in `other`.
    pub fn difference(&self, other: &Domain) -> Domain {
        let words = self
            .words
            .iter()
            .enumerate()
            .map(|(i, w)| w & !other.words.get(i).copied().unwrap_or(0))
            .collect();
        Domain { words }.normalized()
    }

    pub fn remove(&self, v: u32) -> Domain {
        self.difference(&Domain::singleton(v))
    }

    /// Keeps only values `>= v`.
    pub fn remove_below(&self, v: u32) -> Domain {
        if v <= 1 {
            return self.clone();
        }
        self.intersect(&Domain::range(v, self.max().unwrap_or(0)))
    }

    /// Keeps only values `<= v`.
    pub fn remove_above(&self, v: u32) -> Domain {
        self.intersect(&Domain::range(1, v))
    }

    /// Translates every value by `delta`, dropping values that leave `[1..]`.
    pub fn shifted(&self, delta: i64) -> Domain {
        Domain::from_values(self.iter().filter_map(|v| {
            let moved = v as i64 + delta;
            u32::try_from(moved).ok()
        }))
    }

    pub fn is_subset(&self, other: &Domain) -> bool {
        self.words
            .iter()
            .enumerate()
            .all(|(i, w)| w & !other.words.get(i).copied().unwrap_or(0) == 0)
    }

    pub fn is_disjoint(&self, other: &Domain) -> bool {
        self.intersect(other).is_empty()
    }

    /// Iterates the values in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.words.iter().enumerate().flat_map(|(i, w)| {
            (0..WORD_BITS)
                .filter(move |b| w & (1u64 << b) != 0)
                .map(move |b| i as u32 * WORD_BITS + b + 1)
        })
    }
}

impl fmt::Debug for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn range_endpoints_are_inclusive() {
        let d = Domain::range(3, 70);
        assert_eq!(d.min(), Some(3));
        assert_eq!(d.max(), Some(70));
        assert_eq!(d.size(), 68);
        assert!(d.contains(64));
        assert!(d.contains(65));
        assert!(!d.contains(2));
        assert!(!d.contains(71));
    }

    #[test]
    fn range_clamps_to_positive_values() {
        assert_eq!(Domain::range(0, 2), Domain::range(1, 2));
        assert!(Domain::range(5, 4).is_empty());
    }

    #[test]
    fn singleton_reports_its_value() {
        let d = Domain::singleton(9);
        assert!(d.is_singleton());
        assert_eq!(d.value(), Some(9));
        assert_eq!(d.size(), 1);
    }

    #[test]
    fn intersect_and_union_are_set_algebra() {
        let a = Domain::from_values([1, 3, 5, 100]);
        let b = Domain::range(3, 99);
        assert_eq!(a.intersect(&b), Domain::from_values([3, 5]));
        assert_eq!(a.union(&b).size(), 97 + 2);
        assert_eq!(a.difference(&b), Domain::from_values([1, 100]));
    }

    #[test]
    fn intersection_is_canonical_across_word_counts() {
        let narrow = Domain::range(1, 4);
        let wide = Domain::range(1, 200);
        assert_eq!(wide.intersect(&narrow), narrow);
        assert_eq!(narrow.intersect(&wide), narrow);
    }

    #[test]
    fn bound_removal() {
        let d = Domain::range(1, 10);
        assert_eq!(d.remove_below(4), Domain::range(4, 10));
        assert_eq!(d.remove_above(6), Domain::range(1, 6));
        assert_eq!(d.remove(5).size(), 9);
        assert!(!d.remove(5).contains(5));
    }

    #[test]
    fn shift_drops_values_leaving_the_positive_range() {
        let d = Domain::from_values([1, 2, 10]);
        assert_eq!(d.shifted(1), Domain::from_values([2, 3, 11]));
        assert_eq!(d.shifted(-1), Domain::from_values([1, 9]));
    }

    #[test]
    fn subset_and_disjoint() {
        let small = Domain::from_values([2, 4]);
        let big = Domain::range(1, 5);
        assert!(small.is_subset(&big));
        assert!(!big.is_subset(&small));
        assert!(small.is_disjoint(&Domain::from_values([1, 3, 5])));
    }

    #[test]
    fn iter_is_ascending() {
        let d = Domain::from_values([65, 2, 130, 7]);
        assert_eq!(d.iter().collect::<Vec<_>>(), vec![2, 7, 65, 130]);
    }
}
