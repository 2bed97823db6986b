use std::fmt::{self, Debug, Formatter};

use log::*;

use crate::{
    util::{DisplayAsDebug, Duration, IndexMap, Instant, UniqueQueue},
    BlockId, Config, EGraph, FrozenEGraph, FunctionSymbol, JoinStrategy, Lattice,
};

/// A control flow graph the [`Analyzer`] can walk.
pub trait ControlFlow {
    /// The block analysis starts at.
    fn entry(&self) -> BlockId;

    /// The blocks control may flow to after `block`.
    fn successors(&self, block: BlockId) -> &[BlockId];
}

/// A control flow graph given by its edges.
///
/// ```
/// use egraph_dataflow::*;
///
/// let b = BlockId::from;
/// let cfg = Cfg::new(b(0)).with_edge(b(0), b(1)).with_edge(b(1), b(0));
/// assert_eq!(cfg.successors(b(0)), &[b(1)]);
/// assert_eq!(cfg.successors(b(2)), &[]);
/// ```
#[derive(Debug, Clone)]
pub struct Cfg {
    entry: BlockId,
    edges: IndexMap<BlockId, Vec<BlockId>>,
}

impl Cfg {
    /// A graph with just the entry block.
    pub fn new(entry: BlockId) -> Self {
        let mut edges = IndexMap::default();
        edges.insert(entry, vec![]);
        Cfg { entry, edges }
    }

    /// Adds the edge `from -> to`.
    pub fn add_edge(&mut self, from: BlockId, to: BlockId) {
        let successors = self.edges.entry(from).or_default();
        if !successors.contains(&to) {
            successors.push(to);
        }
        self.edges.entry(to).or_default();
    }

    /// Builder style [`add_edge`](Cfg::add_edge).
    pub fn with_edge(mut self, from: BlockId, to: BlockId) -> Self {
        self.add_edge(from, to);
        self
    }

    /// Every block mentioned so far, in insertion order.
    pub fn blocks(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.edges.keys().copied()
    }
}

impl ControlFlow for Cfg {
    fn entry(&self) -> BlockId {
        self.entry
    }

    fn successors(&self, block: BlockId) -> &[BlockId] {
        match self.edges.get(&block) {
            Some(successors) => successors.as_slice(),
            None => &[],
        }
    }
}

/// The effect of a block on the abstract state.
///
/// Closures `FnMut(BlockId, &mut EGraph<F, L>)` implement this.
pub trait Transfer<F: FunctionSymbol, L: Lattice> {
    /// Updates `state` from the block's entry state to its exit state.
    fn transfer(&mut self, block: BlockId, state: &mut EGraph<F, L>);
}

impl<F, L, T> Transfer<F, L> for T
where
    F: FunctionSymbol,
    L: Lattice,
    T: FnMut(BlockId, &mut EGraph<F, L>),
{
    fn transfer(&mut self, block: BlockId, state: &mut EGraph<F, L>) {
        self(block, state)
    }
}

/// Why the [`Analyzer`] stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// No join changed any more, the states are a fixpoint.
    Converged,
    /// The iteration limit was hit. The data is the iteration limit.
    IterationLimit(usize),
}

/// Counts of the joins an analysis did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JoinStats {
    /// Joins computed by walking both graphs.
    pub full: usize,
    /// Joins computed by replaying updates.
    pub replay: usize,
    /// Joins whose result was dropped because nothing changed.
    pub unchanged: usize,
}

/// The result of [`Analyzer::run`].
pub struct Solution<F: FunctionSymbol, L: Lattice> {
    entries: IndexMap<BlockId, FrozenEGraph<F, L>>,
    exits: IndexMap<BlockId, FrozenEGraph<F, L>>,
    /// Why the analysis stopped.
    pub stop_reason: StopReason,
    /// Number of block visits.
    pub visits: usize,
    /// What the joins did.
    pub joins: JoinStats,
    /// Wall clock time spent.
    pub elapsed: Duration,
}

impl<F: FunctionSymbol, L: Lattice> Solution<F, L> {
    /// The state on entry to `block`, if it was reached.
    pub fn entry_state(&self, block: BlockId) -> Option<&FrozenEGraph<F, L>> {
        self.entries.get(&block)
    }

    /// The state on exit from `block`, if it was visited.
    pub fn exit_state(&self, block: BlockId) -> Option<&FrozenEGraph<F, L>> {
        self.exits.get(&block)
    }

    /// Prints some information about the analysis.
    pub fn print_report(&self) {
        let edges: usize = self.exits.values().map(|s| s.total_edges()).sum();
        println!("Analyzer report");
        println!("===============");
        println!("  Stop reason: {:?}", self.stop_reason);
        println!("  Blocks reached: {}", self.entries.len());
        println!("  Visits: {}", self.visits);
        println!("  Edges at exits: {}", edges);
        println!(
            "  Joins: {} full, {} replayed, {} unchanged",
            self.joins.full, self.joins.replay, self.joins.unchanged
        );
        println!("  Total time: {}", self.elapsed.as_secs_f64());
    }
}

impl<F: FunctionSymbol, L: Lattice> Debug for Solution<F, L> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let exits: IndexMap<BlockId, _> = self
            .exits
            .iter()
            .map(|(block, state)| (*block, DisplayAsDebug(state.dump())))
            .collect();
        f.debug_struct("Solution")
            .field("stop_reason", &self.stop_reason)
            .field("visits", &self.visits)
            .field("joins", &self.joins)
            .field("exits", &exits)
            .finish()
    }
}

/** A forward worklist fixpoint over e-graph states.

Each reached block has a frozen entry state. Visiting a block branches
its entry state, applies the [`Transfer`] and freezes the result as the
exit state, which then flows to every successor: a successor reached for
the first time takes it as is, otherwise it is joined into the
successor's entry state, and the successor is revisited only if the join
reports a change.

# Example
```
use egraph_dataflow::*;

let b = BlockId::from;
// 0 -> 1 -> 2, with a back edge 1 -> 1
let cfg = Cfg::new(b(0))
    .with_edge(b(0), b(1))
    .with_edge(b(1), b(1))
    .with_edge(b(1), b(2));

let x: Symbol = "x".into();
let mut transfer = |block: BlockId, g: &mut EGraph<Symbol, NonNullLattice>| {
    if block == b(0) || block == b(1) {
        // x = new object
        let fresh = g.fresh_symbol();
        g.set(x, &[], fresh);
        g.set_value(fresh, Nullness::NonNull);
    }
};

let initial = EGraph::new(NonNullLattice).freeze();
let solution = Analyzer::default().run(&cfg, initial, &mut transfer);
assert_eq!(solution.stop_reason, StopReason::Converged);

let exit = solution.entry_state(b(2)).unwrap();
let value = exit.try_lookup(&x, &[]).unwrap();
assert_eq!(exit.value(value), Nullness::NonNull);
```
*/
#[derive(Debug, Clone, Default)]
pub struct Analyzer {
    config: Config,
}

impl Analyzer {
    /// An analyzer using the limits and logging flags of `config`.
    ///
    /// The join heuristics come from the [`Config`] of the initial state.
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Runs to a fixpoint or until the iteration limit.
    pub fn run<F, L, C, T>(
        &self,
        cfg: &C,
        initial: FrozenEGraph<F, L>,
        transfer: &mut T,
    ) -> Solution<F, L>
    where
        F: FunctionSymbol,
        L: Lattice,
        C: ControlFlow + ?Sized,
        T: Transfer<F, L> + ?Sized,
    {
        let start = Instant::now();
        let mut entries: IndexMap<BlockId, FrozenEGraph<F, L>> = Default::default();
        let mut exits: IndexMap<BlockId, FrozenEGraph<F, L>> = Default::default();
        let mut joins = JoinStats::default();
        let mut queue = UniqueQueue::default();
        let mut visits = 0;
        let mut stop_reason = StopReason::Converged;

        entries.insert(cfg.entry(), initial);
        queue.insert(cfg.entry());

        while let Some(block) = queue.pop() {
            if visits >= self.config.iter_limit {
                stop_reason = StopReason::IterationLimit(self.config.iter_limit);
                break;
            }
            visits += 1;

            let entry = match entries.get(&block) {
                Some(entry) => entry.clone(),
                None => continue,
            };
            if self.config.debug_dfa {
                debug!(
                    "Visiting {} (history {}, {} queued)",
                    block,
                    entry.history_size(),
                    queue.len()
                );
            }

            let mut state = entry.branch(block);
            transfer.transfer(block, &mut state);
            let exit = state.freeze();

            for &succ in cfg.successors(block) {
                let joined = match entries.get(&succ) {
                    None => Some(exit.clone()),
                    Some(old) => {
                        let (joined, info) = old.join(&exit, succ);
                        match info.strategy() {
                            JoinStrategy::Full => joins.full += 1,
                            JoinStrategy::Replay => joins.replay += 1,
                        }
                        if info.changed() {
                            Some(joined.freeze())
                        } else {
                            joins.unchanged += 1;
                            None
                        }
                    }
                };
                if let Some(state) = joined {
                    if self.config.debug_dfa {
                        debug!("New entry state for {} from {}", succ, block);
                    }
                    entries.insert(succ, state);
                    queue.insert(succ);
                }
            }
            exits.insert(block, exit);
        }

        let elapsed = start.elapsed();
        info!(
            "Analysis stopped after {} visits in {:.3}s: {:?}",
            visits,
            elapsed.as_secs_f64(),
            stop_reason
        );
        Solution {
            entries,
            exits,
            stop_reason,
            visits,
            joins,
            elapsed,
        }
    }
}
