#![warn(missing_docs)]
/*!

`egraph-dataflow` is an e-graph abstract domain for intraprocedural
dataflow analysis.

An [`EGraph`] tracks which program expressions denote the same value:
symbolic values are nodes, and labeled edges `f(x) = y` record that
applying the unary function `f` to `x` yields `y`. Every symbolic value
also carries an element of a user supplied [`Lattice`].

States are persistent. A block's state is [`freeze`](EGraph::freeze)d
before it is shared, and each successor [`branch`](FrozenEGraph::branch)es
its own mutable copy, sharing structure with the parent. Because every
snapshot remembers its parent and the updates made on top of it,
[`join`](FrozenEGraph::join) at a control flow merge can either walk both
graphs in full or just replay what changed since their common ancestor.

[`Analyzer`] runs a forward worklist fixpoint over a [`ControlFlow`]
graph with these states.

## Logging

Many parts of `egraph-dataflow` dump useful logging info using the
[`log`](https://docs.rs/log/) crate. The easiest way to see this info is
to use the [`env_logger`](https://docs.rs/env_logger/) crate in your
binary or test. The simplest way to enable `env_logger` is to put the
following line near the top of your `main`: `env_logger::init();`.
Then, set the environment variable `RUST_LOG=egraph_dataflow=info`, or
use `debug` for more logging. Join statistics and per-edge join
decisions are only emitted when the corresponding [`Config`] flags are
set.

## Simple Example

```
use egraph_dataflow::*;

let mut g: EGraph<Symbol, NonNullLattice> = EGraph::new(NonNullLattice);
let x = g.constant("x".into());
let y = g.constant("y".into());
g.set_value(x, Nullness::NonNull);
g.assume_equal(x, y);
assert!(g.is_equal(x, y));
assert_eq!(g.value(y), Nullness::NonNull);
```
*/

mod config;
mod dataflow;
mod dot;
mod egraph;
mod history;
mod join;
mod lattice;
mod lattices;
mod term;
mod unionfind;
mod util;

use std::fmt::{self, Debug, Display, Formatter};
use std::hash::Hash;

/// A node of the [`EGraph`].
///
/// Fresh symbolic values get increasing ids, so comparing two of them
/// tells which one is older.
#[derive(Clone, Copy, Default, Ord, PartialOrd, Eq, PartialEq, Hash)]
pub struct SymValue(u32);

impl SymValue {
    /// The numeric id.
    pub fn id(self) -> u32 {
        self.0
    }
}

/// # Panics
///
/// Panics if `n` does not fit in a `u32`.
impl From<usize> for SymValue {
    fn from(n: usize) -> SymValue {
        let id = u32::try_from(n)
            .unwrap_or_else(|_| panic!("{} does not fit a symbolic value id", n));
        SymValue(id)
    }
}

impl From<SymValue> for usize {
    fn from(sv: SymValue) -> usize {
        sv.0 as usize
    }
}

impl Debug for SymValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "sv{}", self.0)
    }
}

impl Display for SymValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "sv{}", self.0)
    }
}

/// Names a block of the control flow graph being analyzed.
#[derive(Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Hash)]
pub struct BlockId(u32);

/// # Panics
///
/// Panics if `n` does not fit in a `u32`.
impl From<usize> for BlockId {
    fn from(n: usize) -> BlockId {
        let id =
            u32::try_from(n).unwrap_or_else(|_| panic!("{} does not fit a block id", n));
        BlockId(id)
    }
}

impl From<BlockId> for usize {
    fn from(block: BlockId) -> usize {
        block.0 as usize
    }
}

impl Debug for BlockId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "b{}", self.0)
    }
}

impl Display for BlockId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "b{}", self.0)
    }
}

/// A key labeling the edges of an [`EGraph`].
///
/// Anything ordered and printable qualifies; [`Symbol`] is the usual
/// choice. The ordering only has to be consistent, it is used to keep
/// iteration over edges deterministic.
pub trait FunctionSymbol: Clone + Ord + Hash + Debug + Display {}

impl<T> FunctionSymbol for T where T: Clone + Ord + Hash + Debug + Display {}

pub(crate) use {
    term::{EqTermMap, TermMap},
    unionfind::UnionFind,
};

pub use {
    config::{Config, ConfigError},
    dataflow::{Analyzer, Cfg, ControlFlow, JoinStats, Solution, StopReason, Transfer},
    dot::Dot,
    egraph::{Dump, EGraph, FrozenEGraph, Snapshot},
    history::{Ancestors, Update},
    join::{JoinStrategy, MergeInfo},
    lattice::{check_lattice_laws, Lattice},
    lattices::*,
    term::EGraphTerm,
    util::Symbol,
};

#[cfg(test)]
fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip_through_usize() {
        assert_eq!(usize::from(SymValue::from(7)), 7);
        assert_eq!(BlockId::from(u32::MAX as usize), BlockId(u32::MAX));
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    #[should_panic(expected = "does not fit a symbolic value id")]
    fn oversized_symbolic_value() {
        SymValue::from(u32::MAX as usize + 1);
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    #[should_panic(expected = "does not fit a block id")]
    fn oversized_block() {
        BlockId::from(u32::MAX as usize + 1);
    }
}
