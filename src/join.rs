use log::*;

use crate::{
    util::IndexMap, BlockId, EGraph, FrozenEGraph, FunctionSymbol, Lattice, Snapshot, SymValue,
    Update,
};

/// How a join computed its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinStrategy {
    /// Both graphs were walked from their constant roots.
    Full,
    /// Only the updates since the common ancestor were replayed on top
    /// of it.
    Replay,
}

/** What a join did, returned by [`FrozenEGraph::join`].

The mapping relates the symbolic values of the two inputs to the
result: `get(v1, v2) == Some(r)` means the pair `(v1, v2)` became `r`.
A client analysis uses it to carry its own per-value facts across the
join.
*/
#[derive(Debug, Clone)]
pub struct MergeInfo {
    strategy: JoinStrategy,
    changed: bool,
    update_size: usize,
    last_common: u32,
    map: IndexMap<SymValue, IndexMap<SymValue, SymValue>>,
}

impl MergeInfo {
    /// `true` if the result is less precise than, or shaped differently
    /// from, the first input.
    pub fn changed(&self) -> bool {
        self.changed
    }

    /// The strategy the join picked.
    pub fn strategy(&self) -> JoinStrategy {
        self.strategy
    }

    /// Number of snapshots on both sides since the common ancestor.
    pub fn update_size(&self) -> usize {
        self.update_size
    }

    /// Symbolic values of the first input that were mapped.
    pub fn keys1(&self) -> impl Iterator<Item = SymValue> + '_ {
        self.map.keys().copied()
    }

    /// Symbolic values of the second input mapped together with `key1`.
    pub fn keys2(&self, key1: SymValue) -> impl Iterator<Item = SymValue> + '_ {
        self.map
            .get(&key1)
            .into_iter()
            .flat_map(|inner| inner.keys().copied())
    }

    /// The result value for the pair `(key1, key2)`.
    pub fn get(&self, key1: SymValue, key2: SymValue) -> Option<SymValue> {
        self.map.get(&key1)?.get(&key2).copied()
    }

    /// Was `sv` minted before the join, i.e. is it shared by both inputs
    /// and the result?
    pub fn is_common(&self, sv: SymValue) -> bool {
        sv.0 <= self.last_common
    }
}

struct MergeState<'a, F: FunctionSymbol, L: Lattice> {
    result: EGraph<F, L>,
    g1: &'a Snapshot<F, L>,
    g2: &'a Snapshot<F, L>,
    map: IndexMap<SymValue, IndexMap<SymValue, SymValue>>,
    changed: bool,
    last_common: u32,
}

impl<'a, F: FunctionSymbol, L: Lattice> MergeState<'a, F, L> {
    fn new(result: EGraph<F, L>, g1: &'a Snapshot<F, L>, g2: &'a Snapshot<F, L>) -> Self {
        // symbols minted from here on belong to the result only
        let last_common = result.last_id;
        MergeState {
            result,
            g1,
            g2,
            map: Default::default(),
            changed: false,
            last_common,
        }
    }

    fn debug(&self) -> bool {
        self.result.config().debug
    }

    fn is_common(&self, sv: SymValue) -> bool {
        sv.0 <= self.last_common
    }

    fn add_mapping(&mut self, v1: SymValue, v2: SymValue, result: SymValue) {
        self.map.entry(v1).or_default().insert(v2, result);
    }

    fn mapping(&self, v1: SymValue, v2: SymValue) -> Option<SymValue> {
        self.map.get(&v1)?.get(&v2).copied()
    }

    /// Joins everything reachable from `v1` in the first graph and `v2`
    /// in the second into the result below `r`.
    fn join_symbolic_value(&mut self, v1: SymValue, v2: SymValue, r: SymValue) {
        let (g1, g2) = (self.g1, self.g2);
        let mut todo = vec![(v1, v2, r)];
        while let Some((v1, v2, r)) = todo.pop() {
            if self.debug() {
                debug!("JoinSymbolicValue: [{},{}] -> {}", v1, v2, r);
            }
            let functions: Vec<&'a F> = if g1.terms.out_degree(v1) <= g2.terms.out_degree(v2) {
                g1.terms.functions(v1).collect()
            } else {
                // the result has fewer edges than g1
                self.changed = true;
                g2.terms.functions(v2).collect()
            };

            for function in functions {
                let v1t = match g1.lookup_edge(v1, function) {
                    Some(t) => t,
                    None => continue,
                };
                let v2t = match g2.lookup_edge(v2, function) {
                    Some(t) => t,
                    None => {
                        // a missing edge means top
                        self.changed |= !g1.lattice().is_top(&g1.value(v1t));
                        continue;
                    }
                };
                if let Some(rt) = self.add_joint_edge(v1t, v2t, function, r) {
                    todo.push((v1t, v2t, rt));
                }
            }
        }
    }

    /// Adds the edge `function(result_root)` for the pair `(v1t, v2t)`.
    ///
    /// Returns the result target if the pair was seen for the first time,
    /// meaning its own edges still have to be joined.
    fn add_joint_edge(
        &mut self,
        v1t: SymValue,
        v2t: SymValue,
        function: &F,
        result_root: SymValue,
    ) -> Option<SymValue> {
        let (g1, g2) = (self.g1, self.g2);
        let (rt, fresh) = match self.mapping(v1t, v2t) {
            None => {
                // v1t pairing up with a second value breaks isomorphism with g1
                if self.map.contains_key(&v1t) {
                    self.changed = true;
                }
                let rt = if self.is_common(v1t) && v1t == v2t {
                    v1t
                } else {
                    self.result.fresh_symbol()
                };
                self.add_mapping(v1t, v2t, rt);
                (rt, true)
            }
            Some(rt) => {
                if self.result.lookup_edge(result_root, function) == Some(rt) {
                    return None;
                }
                (rt, false)
            }
        };
        self.result.set_edge(result_root, function.clone(), rt);

        let lattice = g1.lattice();
        let v1_value = g1.value(v1t);
        let joined = lattice.join(&v1_value, &g2.value(v2t));
        if !lattice.lower_than_or_equal(&joined, &v1_value) {
            self.changed = true;
        }
        self.result.set_value(rt, joined);

        if self.debug() {
            debug!(
                "AddJointEdge: {} -{}-> [{},{},{}]",
                result_root, function, v1t, v2t, rt
            );
        }
        if fresh {
            Some(rt)
        } else {
            None
        }
    }

    /// Whether redirecting `function(from)` from the common value `v1t` to
    /// `v2t` separates it from another term that still evaluates to `v1t`
    /// in the first graph but not to `v2t` in the second.
    fn splits_common(&self, from: SymValue, function: &F, v1t: SymValue, v2t: SymValue) -> bool {
        let (g1, g2) = (self.g1, self.g2);
        if !self.is_common(v1t) || v1t == v2t {
            return false;
        }
        let from = g1.find(from);
        g1.eq_terms(v1t).iter().any(|term| {
            let arg = term.arg.unwrap_or_else(|| g1.const_root());
            if arg == from && term.function == *function {
                return false;
            }
            // terms over values the first graph minted get paired up by the walk
            self.is_common(arg) && g2.lookup_edge(arg, &term.function) != Some(v2t)
        })
    }

    fn replay(&mut self, common: &Snapshot<F, L>) {
        let (g1, g2) = (self.g1, self.g2);
        let updates = g1.updates_since(common);
        let more = g2.updates_since(common);
        trace!(
            "Replaying {} + {} updates since the common ancestor",
            updates.len(),
            more.len()
        );
        for update in updates.into_iter().chain(more) {
            update.replay(self);
        }

        // updates on a merged class are logged against its representative
        // only, so classes merged on one side are joined again as a whole
        let mut reps: Vec<SymValue> = g1
            .merged_since(common)
            .into_iter()
            .chain(g2.merged_since(common))
            .map(|sv| self.result.find(sv))
            .collect();
        reps.sort();
        reps.dedup();
        for r in reps {
            let (p1, p2) = (g1.find(r), g2.find(r));
            if p1 != r || p2 != r {
                self.rejoin(r, p1, p2);
            }
        }
    }

    /// Recomputes the value and edges of the common value `r`, which
    /// stands for class `p1` of the first graph and `p2` of the second.
    fn rejoin(&mut self, r: SymValue, p1: SymValue, p2: SymValue) {
        let (g1, g2) = (self.g1, self.g2);
        if self.debug() {
            debug!("Rejoin: [{},{}] -> {}", p1, p2, r);
        }
        if self.mapping(p1, p2).is_none() {
            self.add_mapping(p1, p2, r);
        }

        let lattice = g1.lattice();
        let v1_value = g1.value(p1);
        let joined = lattice.join(&v1_value, &g2.value(p2));
        if !lattice.lower_than_or_equal(&joined, &v1_value) {
            self.changed = true;
        }
        if joined != self.result.value(r) {
            self.result.set_value(r, joined);
        }

        let mut functions: Vec<F> = g1
            .functions(p1)
            .chain(g2.functions(p2))
            .chain(self.result.functions(r))
            .cloned()
            .collect();
        functions.sort();
        functions.dedup();
        for function in functions {
            match (g1.lookup_edge(p1, &function), g2.lookup_edge(p2, &function)) {
                (Some(v1t), Some(v2t)) => {
                    if let Some(rt) = self.add_joint_edge(v1t, v2t, &function, r) {
                        if !self.is_common(rt) {
                            self.join_symbolic_value(v1t, v2t, rt);
                        }
                    }
                }
                (v1t, _) => {
                    if let Some(v1t) = v1t {
                        self.changed |= !lattice.is_top(&g1.value(v1t));
                    }
                    if self.result.lookup_edge(r, &function).is_some() {
                        self.result.eliminate_edge(r, &function);
                    }
                }
            }
        }
    }

    fn finish(self, strategy: JoinStrategy, update_size: usize) -> (EGraph<F, L>, MergeInfo) {
        let info = MergeInfo {
            strategy,
            changed: self.changed,
            update_size,
            last_common: self.last_common,
            map: self.map,
        };
        (self.result, info)
    }
}

impl<F: FunctionSymbol> Update<F> {
    fn replay<L: Lattice>(&self, merge: &mut MergeState<'_, F, L>) {
        let (g1, g2) = (merge.g1, merge.g2);
        match self {
            Update::Edge { from, function } => {
                let from = *from;
                if !merge.is_common(from) {
                    return;
                }
                let targets = (
                    g1.lookup_edge(from, function),
                    g2.lookup_edge(from, function),
                );
                let (v1t, v2t) = match targets {
                    (Some(v1t), Some(v2t)) => (v1t, v2t),
                    (v1t, _) => {
                        // one side lacks the edge, so the result does too
                        merge.changed |= v1t.is_some();
                        if merge.result.lookup_edge(from, function).is_some() {
                            merge.result.eliminate_edge(from, function);
                        }
                        return;
                    }
                };
                if merge.splits_common(from, function, v1t, v2t) {
                    merge.changed = true;
                }
                if let Some(rt) = merge.add_joint_edge(v1t, v2t, function, from) {
                    if !merge.is_common(rt) {
                        merge.join_symbolic_value(v1t, v2t, rt);
                    }
                }
            }
            Update::Value { sv } => {
                let sv = *sv;
                if !merge.is_common(sv) {
                    return;
                }
                let lattice = g1.lattice();
                let v1_value = g1.value(sv);
                let joined = lattice.join(&v1_value, &g2.value(sv));
                if joined != v1_value && lattice.lower_than_or_equal(&v1_value, &joined) {
                    merge.changed = true;
                }
                if joined != merge.result.value(sv) {
                    merge.result.set_value(sv, joined);
                }
            }
            Update::Equality { a, b } => {
                let (a, b) = (*a, *b);
                if !merge.is_common(a) || !merge.is_common(b) || !g1.is_equal(a, b) {
                    return;
                }
                if merge.result.is_equal(a, b) {
                    return;
                }
                if g2.is_equal(a, b) {
                    merge.result.assume_equal(a, b);
                } else {
                    merge.changed = true;
                }
            }
            Update::EliminateEdge { from, function } => {
                let from = *from;
                if !merge.is_common(from) {
                    return;
                }
                let in_g1 = g1.lookup_edge(from, function).is_some();
                let in_g2 = g2.lookup_edge(from, function).is_some();
                if in_g1 && in_g2 {
                    // re-added since
                    return;
                }
                if in_g1 {
                    merge.changed = true;
                }
                if merge.result.lookup_edge(from, function).is_some() {
                    merge.result.eliminate_edge(from, function);
                }
            }
        }
    }
}

/// Finds the most recent snapshot both `g1` and `g2` descend from,
/// along with the number of snapshots between it and the two inputs.
fn common_tail<F: FunctionSymbol, L: Lattice>(
    g1: &FrozenEGraph<F, L>,
    g2: &FrozenEGraph<F, L>,
    short: usize,
    long: usize,
) -> (Option<FrozenEGraph<F, L>>, usize) {
    let (h1, h2) = (g1.history_size(), g2.history_size());

    // walking a long history to meet a short one costs more than it saves
    if (h1 <= short && h2 > long) || (h2 <= short && h1 > long) {
        let (r1, r2) = (g1.absolute_root(), g2.absolute_root());
        let common = if r1.ptr_eq(&r2) { Some(r1) } else { None };
        return (common, h1 + h2);
    }

    let mut c1 = Some(g1.clone());
    let mut c2 = Some(g2.clone());
    let common = loop {
        let (a, b) = match (c1, c2) {
            (Some(a), Some(b)) => (a, b),
            _ => break None,
        };
        if a.ptr_eq(&b) {
            break Some(a);
        }
        let (ha, hb) = (a.history_size(), b.history_size());
        if ha > hb {
            c1 = a.parent().cloned();
            c2 = Some(b);
        } else if hb > ha {
            c1 = Some(a);
            c2 = b.parent().cloned();
        } else {
            c1 = a.parent().cloned();
            c2 = b.parent().cloned();
        }
    };
    let tail = common.as_ref().map_or(0, |c| c.history_size());
    (common, h1 + h2 - 2 * tail)
}

impl<F: FunctionSymbol, L: Lattice> FrozenEGraph<F, L> {
    /** Joins two states at the control flow merge `at`.

    The result over-approximates both inputs: an edge survives only if
    both sides have it, abstract values are joined, and two values stay
    equal only if they are equal on both sides.

    If both inputs descend from a common snapshot that isn't the root of
    the whole lineage, and both have a long enough history, only the
    updates since that snapshot are replayed on top of it. Otherwise
    both graphs are walked in full. Either way the result is a child of
    the common snapshot when there is one, so later joins can replay
    against it.

    See [`Config::short_history`](crate::Config::short_history) and
    [`Config::long_history`](crate::Config::long_history) for the knobs.
    */
    pub fn join(&self, other: &FrozenEGraph<F, L>, at: BlockId) -> (EGraph<F, L>, MergeInfo) {
        let config = self.config();
        let (common, update_size) =
            common_tail(self, other, config.short_history, config.long_history);

        let result = match &common {
            Some(common) => common.branch(at),
            None => EGraph::from_shared(self.shared.clone(), Some(at)),
        };
        if config.debug {
            debug!("Last common symbol: {}", result.last_symbol());
        }
        if config.statistics {
            info!(
                "G1:{} G2:{} Tail:{} UpdateSize:{}",
                self.history_size(),
                other.history_size(),
                result.history_size(),
                update_size
            );
        }

        let replay_from = common.as_ref().filter(|common| {
            !common.ptr_eq(&self.absolute_root())
                && self.history_size() > config.short_history
                && other.history_size() > config.short_history
        });

        let mut merge = MergeState::new(result, self, other);
        let strategy = match replay_from {
            Some(common) => {
                merge.replay(common);
                JoinStrategy::Replay
            }
            None => {
                if common.is_some() {
                    merge.result.forget_all();
                }
                let root = merge.result.const_root();
                merge.add_mapping(self.const_root(), other.const_root(), root);
                merge.join_symbolic_value(self.const_root(), other.const_root(), root);
                JoinStrategy::Full
            }
        };
        let (result, info) = merge.finish(strategy, update_size);
        debug!(
            "Joined at {} with {:?}, changed: {}",
            at,
            info.strategy(),
            info.changed()
        );
        (result, info)
    }

    /// Like [`join`](FrozenEGraph::join), only reporting whether the
    /// result changed with respect to `self`.
    pub fn join_changed(&self, other: &FrozenEGraph<F, L>, at: BlockId) -> (EGraph<F, L>, bool) {
        let (result, info) = self.join(other, at);
        (result, info.changed())
    }
}
