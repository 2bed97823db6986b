use std::rc::Rc;

use crate::{BlockId, FrozenEGraph, FunctionSymbol, Lattice, Snapshot, SymValue};

/// A mutation recorded on an [`EGraph`](crate::EGraph) so that a later
/// join can replay it instead of walking the whole graph.
///
/// Updates are only recorded for symbolic values that already existed
/// in the parent snapshot: values minted afterwards cannot be shared
/// with another branch, and the join reaches them through the edges of
/// older values anyway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Update<F> {
    /// An edge `function(from)` was added or redirected.
    Edge {
        /// Source of the edge.
        from: SymValue,
        /// Label of the edge.
        function: F,
    },
    /// The abstract value of `sv` changed.
    Value {
        /// The representative whose value changed.
        sv: SymValue,
    },
    /// `a` and `b` were asserted equal.
    Equality {
        /// First representative.
        a: SymValue,
        /// Second representative.
        b: SymValue,
    },
    /// The edge `function(from)` was removed.
    EliminateEdge {
        /// Source of the edge.
        from: SymValue,
        /// Label of the edge.
        function: F,
    },
}

/// Where a snapshot sits in its history tree.
pub(crate) struct Lineage<F: FunctionSymbol, L: Lattice> {
    pub parent: Option<FrozenEGraph<F, L>>,
    /// Oldest ancestor, `None` when this snapshot is the root itself
    pub root: Option<FrozenEGraph<F, L>>,
    pub history_size: usize,
    pub block: Option<BlockId>,
    /// Updates recorded while this snapshot was mutable, oldest first
    pub updates: Vec<Update<F>>,
    /// Inherited values merged into an older class while this snapshot
    /// was mutable, including merges found by congruence
    pub merged: Vec<SymValue>,
}

impl<F: FunctionSymbol, L: Lattice> Lineage<F, L> {
    pub fn root(block: Option<BlockId>) -> Self {
        Lineage {
            parent: None,
            root: None,
            history_size: 1,
            block,
            updates: vec![],
            merged: vec![],
        }
    }

    pub fn child_of(parent: &FrozenEGraph<F, L>, block: BlockId) -> Self {
        Lineage {
            parent: Some(parent.clone()),
            root: Some(parent.absolute_root()),
            history_size: parent.history_size() + 1,
            block: Some(block),
            updates: vec![],
            merged: vec![],
        }
    }
}

impl<F: FunctionSymbol, L: Lattice> Drop for Lineage<F, L> {
    // unlink long chains iteratively so dropping them can't overflow the stack
    fn drop(&mut self) {
        let mut next = self.parent.take();
        while let Some(FrozenEGraph(rc)) = next {
            next = match Rc::try_unwrap(rc) {
                Ok(mut snapshot) => snapshot.lineage.parent.take(),
                Err(_) => None,
            };
        }
    }
}

/// Iterator over a snapshot and its ancestors, newest first.
pub struct Ancestors<'a, F: FunctionSymbol, L: Lattice> {
    next: Option<&'a Snapshot<F, L>>,
}

impl<'a, F: FunctionSymbol, L: Lattice> Iterator for Ancestors<'a, F, L> {
    type Item = &'a Snapshot<F, L>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.lineage.parent.as_deref();
        Some(current)
    }
}

impl<F: FunctionSymbol, L: Lattice> Snapshot<F, L> {
    /// Iterates over this snapshot and its ancestors, newest first.
    pub fn lineage(&self) -> Ancestors<'_, F, L> {
        Ancestors { next: Some(self) }
    }

    /// The blocks recorded along [`lineage`](Snapshot::lineage), newest first.
    pub fn blocks(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.lineage().filter_map(|s| s.block())
    }

    /// Number of snapshots in this lineage, counting this one.
    pub fn history_size(&self) -> usize {
        self.lineage.history_size
    }

    /// The block this snapshot was branched or joined at.
    pub fn block(&self) -> Option<BlockId> {
        self.lineage.block
    }

    /// The snapshot this one was branched from.
    pub fn parent(&self) -> Option<&FrozenEGraph<F, L>> {
        self.lineage.parent.as_ref()
    }

    /// Updates recorded on this snapshot since it was branched.
    pub fn updates(&self) -> &[Update<F>] {
        &self.lineage.updates
    }

    /// Up to `length` distinct blocks along the lineage, newest first.
    ///
    /// This is the path a diagnostic can point at to explain how the
    /// analysis reached the current state.
    pub fn block_trace(&self, length: usize) -> Vec<BlockId> {
        let mut trace: Vec<BlockId> = Vec::with_capacity(length);
        for block in self.blocks() {
            if trace.len() == length {
                break;
            }
            if trace.last() != Some(&block) {
                trace.push(block);
            }
        }
        trace
    }

    /// All updates recorded between `ancestor` (exclusive) and `self`
    /// (inclusive), oldest first.
    pub(crate) fn updates_since<'a>(&'a self, ancestor: &Snapshot<F, L>) -> Vec<&'a Update<F>> {
        let chunks: Vec<&'a [Update<F>]> = self
            .lineage()
            .take_while(|s| !std::ptr::eq(*s, ancestor))
            .map(|s| s.updates())
            .collect();
        chunks.into_iter().rev().flatten().collect()
    }

    /// Values redirected between `ancestor` (exclusive) and `self`
    /// (inclusive) that `ancestor` already had.
    pub(crate) fn merged_since(&self, ancestor: &Snapshot<F, L>) -> Vec<SymValue> {
        self.lineage()
            .take_while(|s| !std::ptr::eq(*s, ancestor))
            .flat_map(|s| s.lineage.merged.iter().copied())
            .filter(|sv| sv.0 <= ancestor.last_id)
            .collect()
    }
}
