use crate::SymValue;
use im::OrdMap;

/// Persistent forward map recording which symbolic values were merged.
///
/// Each redirected value points at a value it was proven equal to,
/// always an older one, so [`find`](UnionFind::find) terminates and
/// the representative of a class is its oldest member.
/// Clones share structure with the original.
#[derive(Debug, Clone, Default)]
pub(crate) struct UnionFind {
    forward: OrdMap<SymValue, SymValue>,
}

impl UnionFind {
    /// Returns the representative of the class `current` belongs to
    pub fn find(&self, mut current: SymValue) -> SymValue {
        while let Some(&next) = self.forward.get(&current) {
            current = next;
        }
        current
    }

    /// Given two representatives, merges `newer` into `older`.
    pub fn union(&mut self, older: SymValue, newer: SymValue) -> SymValue {
        debug_assert_eq!(self.find(older), older);
        debug_assert_eq!(self.find(newer), newer);
        assert!(
            older < newer,
            "union must redirect the newer value: {} into {}",
            newer,
            older
        );
        self.forward.insert(newer, older);
        older
    }
}
