/*!
EGraph visualization with [GraphViz]

Use the [`Dot`] struct to visualize a [`Snapshot`](crate::Snapshot).

[GraphViz]: https://graphviz.gitlab.io/
!*/

use std::fmt::{self, Debug, Display, Formatter};

use crate::{util::IndexSet, FunctionSymbol, Lattice, Snapshot, SymValue};

/**
A wrapper for a [`Snapshot`] that can output [GraphViz] for
visualization.

The [`EGraph::dot`](Snapshot::dot) method creates `Dot`s.
Each symbolic value reachable from an edge is a node labeled with its
abstract value unless that is top; each edge is labeled with its
function symbol.

# Example

```
use egraph_dataflow::*;

let mut g: EGraph<Symbol, NonNullLattice> = EGraph::new(NonNullLattice);
let x = g.constant("x".into());
g.set_value(x, Nullness::NonNull);
let dot = g.dot().to_string();
assert!(dot.contains("sv1 -> sv2 [label = \"x\"]"));
assert!(dot.contains("sv2 [label = \"sv2\\nNonNull\"]"));
```

[GraphViz]: https://graphviz.gitlab.io/
**/
pub struct Dot<'a, F: FunctionSymbol, L: Lattice> {
    snapshot: &'a Snapshot<F, L>,
}

impl<'a, F: FunctionSymbol, L: Lattice> Dot<'a, F, L> {
    pub(crate) fn new(snapshot: &'a Snapshot<F, L>) -> Self {
        Dot { snapshot }
    }

    fn nodes(&self) -> IndexSet<SymValue> {
        let g = self.snapshot;
        let mut nodes = IndexSet::default();
        nodes.insert(g.const_root());
        for sv in g.symbolic_values() {
            nodes.insert(sv);
            nodes.extend(g.edges(sv).map(|(_, to)| to));
        }
        nodes
    }
}

impl<'a, F: FunctionSymbol, L: Lattice> Debug for Dot<'a, F, L> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Dot").field(self.snapshot).finish()
    }
}

impl<'a, F: FunctionSymbol, L: Lattice> Display for Dot<'a, F, L> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let g = self.snapshot;
        writeln!(f, "digraph egraph {{")?;
        writeln!(f, "  rankdir=LR")?;

        for sv in self.nodes() {
            if sv == g.const_root() {
                writeln!(f, "  {} [label = \"root\", shape = box]", sv)?;
                continue;
            }
            let value = g.value(sv);
            if g.lattice().is_top(&value) {
                writeln!(f, "  {}", sv)?;
            } else {
                let value = format!("{:?}", value).replace('"', "\\\"");
                writeln!(f, "  {} [label = \"{}\\n{}\"]", sv, sv, value)?;
            }
        }

        for from in g.symbolic_values() {
            for (function, to) in g.edges(from) {
                let label = function.to_string().replace('"', "\\\"");
                writeln!(f, "  {} -> {} [label = \"{}\"]", from, to, label)?;
            }
        }

        write!(f, "}}")
    }
}
