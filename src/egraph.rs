use std::collections::VecDeque;
use std::fmt::{self, Debug, Display, Formatter};
use std::ops::Deref;
use std::rc::Rc;

use im::OrdMap;
use log::*;

use crate::{
    history::Lineage, util::HashSet, BlockId, Config, Dot, EGraphTerm, EqTermMap, FunctionSymbol,
    Lattice, SymValue, TermMap, UnionFind, Update,
};

/// State shared by every snapshot of a lineage.
pub(crate) struct Shared<L> {
    pub lattice: L,
    pub config: Config,
}

/** A read-only view of an e-graph state.

Both [`EGraph`] and [`FrozenEGraph`] dereference to a [`Snapshot`], so
every query below is available on either.

A snapshot maps terms to symbolic values: `f(x) = y` means the term
`f(x)` evaluates to the [`SymValue`] `y`, and a constant `c = y` is an
edge out of the [`const_root`](Snapshot::const_root). Symbolic values
that were proven equal are merged; queries always answer with the
representative of a class, which is its oldest member.

Each representative also has an abstract value from the lattice `L`.
Values that were never constrained are top, and top is never stored.
*/
pub struct Snapshot<F: FunctionSymbol, L: Lattice> {
    pub(crate) shared: Rc<Shared<L>>,
    pub(crate) terms: TermMap<F>,
    pub(crate) eq_terms: EqTermMap<F>,
    pub(crate) unionfind: UnionFind,
    pub(crate) values: OrdMap<SymValue, L::Element>,
    pub(crate) const_root: SymValue,
    pub(crate) last_id: u32,
    pub(crate) lineage: Lineage<F, L>,
}

impl<F: FunctionSymbol, L: Lattice> Debug for Snapshot<F, L> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("block", &self.block())
            .field("history_size", &self.history_size())
            .field("last_symbol", &self.last_symbol())
            .field("terms", &self.terms)
            .field("values", &self.values)
            .field("unionfind", &self.unionfind)
            .finish()
    }
}

impl<F: FunctionSymbol, L: Lattice> Snapshot<F, L> {
    /// The lattice abstract values come from.
    pub fn lattice(&self) -> &L {
        &self.shared.lattice
    }

    /// The configuration shared by this lineage.
    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    /// The source of every constant edge.
    pub fn const_root(&self) -> SymValue {
        self.const_root
    }

    /// The most recently minted symbolic value.
    pub fn last_symbol(&self) -> SymValue {
        SymValue(self.last_id)
    }

    /// Returns the representative of the class `sv` belongs to.
    pub fn find(&self, sv: SymValue) -> SymValue {
        self.unionfind.find(sv)
    }

    /// Returns `true` if `a` and `b` are known to be equal.
    pub fn is_equal(&self, a: SymValue, b: SymValue) -> bool {
        self.find(a) == self.find(b)
    }

    pub(crate) fn source(&self, args: &[SymValue]) -> SymValue {
        match args {
            [] => self.const_root,
            [arg] => self.find(*arg),
            _ => panic!(
                "e-graph terms are nullary or unary, got {} arguments",
                args.len()
            ),
        }
    }

    /// Looks up `function(args)` without creating anything.
    ///
    /// # Panics
    /// Panics if `args` has more than one element.
    pub fn try_lookup(&self, function: &F, args: &[SymValue]) -> Option<SymValue> {
        self.lookup_edge(self.source(args), function)
    }

    pub(crate) fn lookup_edge(&self, from: SymValue, function: &F) -> Option<SymValue> {
        self.terms
            .get(self.find(from), function)
            .map(|to| self.find(to))
    }

    /// The abstract value of `sv`, top if it was never constrained.
    pub fn value(&self, sv: SymValue) -> L::Element {
        match self.values.get(&self.find(sv)) {
            Some(value) => value.clone(),
            None => self.lattice().top(),
        }
    }

    /// Functions with a constant edge, in order.
    pub fn constants(&self) -> impl Iterator<Item = &F> + '_ {
        self.terms.functions(self.const_root)
    }

    /// Functions with an edge out of `sv`, in order.
    pub fn functions(&self, sv: SymValue) -> impl Iterator<Item = &F> + '_ {
        self.terms.functions(self.find(sv))
    }

    /// The edges out of `sv` with their targets' representatives.
    pub fn edges(&self, sv: SymValue) -> impl Iterator<Item = (&F, SymValue)> + '_ {
        self.terms
            .edges(self.find(sv))
            .map(move |(f, to)| (f, self.find(to)))
    }

    /// Every symbolic value with at least one outgoing edge.
    pub fn symbolic_values(&self) -> impl Iterator<Item = SymValue> + '_ {
        self.terms.sources()
    }

    /// Total number of edges.
    pub fn total_edges(&self) -> usize {
        self.terms.len()
    }

    /// The terms currently known to evaluate to `sv`.
    ///
    /// Terms whose edge was since removed or redirected are skipped,
    /// and arguments are given as representatives.
    pub fn eq_terms(&self, sv: SymValue) -> Vec<EGraphTerm<F>> {
        let sv = self.find(sv);
        let mut terms: Vec<EGraphTerm<F>> = self
            .eq_terms
            .get(sv)
            .filter(|t| self.try_lookup(&t.function, t.args()) == Some(sv))
            .map(|t| EGraphTerm {
                function: t.function.clone(),
                arg: t.arg.map(|arg| self.find(arg)),
            })
            .collect();
        terms.sort();
        terms.dedup();
        terms
    }

    /// Renders the reachable part of this snapshot as text.
    ///
    /// ```
    /// use egraph_dataflow::*;
    ///
    /// let mut g: EGraph<Symbol, NonNullLattice> = EGraph::new(NonNullLattice);
    /// let x = g.constant("x".into());
    /// let _ = g.apply("f".into(), x);
    /// g.set_value(x, Nullness::NonNull);
    /// assert_eq!(
    ///     g.dump().to_string(),
    ///     "LastSymbolId:3\nx = sv2\nf(sv2) = sv3\n**Abstract value map\nsv2 -> NonNull\n"
    /// );
    /// ```
    pub fn dump(&self) -> Dump<'_, F, L> {
        Dump { snapshot: self }
    }

    /// Renders the term graph for Graphviz.
    pub fn dot(&self) -> Dot<'_, F, L> {
        Dot::new(self)
    }

    /// Was `sv` already minted when the parent was frozen?
    pub(crate) fn is_old(&self, sv: SymValue) -> bool {
        match &self.lineage.parent {
            Some(parent) => sv.0 <= parent.last_id,
            None => false,
        }
    }
}

/// Text rendering of a [`Snapshot`], see [`Snapshot::dump`].
pub struct Dump<'a, F: FunctionSymbol, L: Lattice> {
    snapshot: &'a Snapshot<F, L>,
}

impl<'a, F: FunctionSymbol, L: Lattice> Display for Dump<'a, F, L> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let g = self.snapshot;
        let mut seen: HashSet<SymValue> = Default::default();
        let mut order: Vec<SymValue> = vec![];
        let mut worklist: VecDeque<SymValue> = Default::default();

        writeln!(f, "LastSymbolId:{}", g.last_id)?;
        for (function, target) in g.edges(g.const_root) {
            writeln!(f, "{} = {}", function, target)?;
            worklist.push_back(target);
        }

        while let Some(v) = worklist.pop_front() {
            if !seen.insert(v) {
                continue;
            }
            order.push(v);
            for (function, target) in g.edges(v) {
                writeln!(f, "{}({}) = {}", function, v, target)?;
                worklist.push_back(target);
            }
        }

        writeln!(f, "**Abstract value map")?;
        for v in order {
            let value = g.value(v);
            if !g.lattice().is_top(&value) {
                writeln!(f, "{} -> {:?}", v, value)?;
            }
        }
        Ok(())
    }
}

/** The mutable leaf of an e-graph lineage.

There is exactly one owner of an [`EGraph`]. To share its state, for
example as the entry state of several successor blocks, [`freeze`] it
and [`branch`] the frozen handle as often as needed. Branches share
structure with their parent and record, for the symbolic values they
inherited, every [`Update`] made to them. That log is what lets a later
[`join`] skip the parts both sides left untouched.

All queries come from [`Snapshot`], which an [`EGraph`] dereferences to.

[`freeze`]: EGraph::freeze
[`branch`]: FrozenEGraph::branch
[`join`]: FrozenEGraph::join

# Example
```
use egraph_dataflow::*;

let mut g: EGraph<Symbol, NonNullLattice> = EGraph::new(NonNullLattice);
let x = g.constant("x".into());
let f_x = g.apply("f".into(), x);
assert_eq!(g.try_lookup(&"f".into(), &[x]), Some(f_x));

let frozen = g.freeze();
let mut branch = frozen.branch(BlockId::from(1));
branch.set_value(f_x, Nullness::NonNull);
assert_eq!(branch.updates(), &[Update::Value { sv: f_x }]);
assert_eq!(frozen.value(f_x), Nullness::MaybeNull);
```
*/
pub struct EGraph<F: FunctionSymbol, L: Lattice> {
    snapshot: Snapshot<F, L>,
}

impl<F: FunctionSymbol, L: Lattice> Deref for EGraph<F, L> {
    type Target = Snapshot<F, L>;

    fn deref(&self) -> &Snapshot<F, L> {
        &self.snapshot
    }
}

impl<F: FunctionSymbol, L: Lattice> Debug for EGraph<F, L> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(&self.snapshot, f)
    }
}

impl<F: FunctionSymbol, L: Lattice> EGraph<F, L> {
    /// Creates an empty root e-graph with the default [`Config`].
    pub fn new(lattice: L) -> Self {
        Self::with_config(lattice, Config::default())
    }

    /// Creates an empty root e-graph.
    pub fn with_config(lattice: L, config: Config) -> Self {
        Self::from_shared(Rc::new(Shared { lattice, config }), None)
    }

    pub(crate) fn from_shared(shared: Rc<Shared<L>>, block: Option<BlockId>) -> Self {
        let mut egraph = EGraph {
            snapshot: Snapshot {
                shared,
                terms: Default::default(),
                eq_terms: Default::default(),
                unionfind: Default::default(),
                values: OrdMap::new(),
                const_root: SymValue(0),
                last_id: 0,
                lineage: Lineage::root(block),
            },
        };
        egraph.snapshot.const_root = egraph.fresh_symbol();
        egraph
    }

    /// Ends mutation, turning this e-graph into a shareable snapshot.
    pub fn freeze(self) -> FrozenEGraph<F, L> {
        FrozenEGraph(Rc::new(self.snapshot))
    }

    /// Freezes this e-graph and starts a mutable child of it at `block`.
    pub fn branch(self, block: BlockId) -> (FrozenEGraph<F, L>, EGraph<F, L>) {
        let frozen = self.freeze();
        let child = frozen.branch(block);
        (frozen, child)
    }

    fn record(&mut self, update: Update<F>) {
        self.snapshot.lineage.updates.push(update);
    }

    /// Mints a symbolic value newer than every existing one.
    ///
    /// # Panics
    /// Panics once all `u32` ids are used up.
    pub fn fresh_symbol(&mut self) -> SymValue {
        self.snapshot.last_id = self
            .snapshot
            .last_id
            .checked_add(1)
            .unwrap_or_else(|| panic!("ran out of symbolic value ids"));
        SymValue(self.snapshot.last_id)
    }

    /// Looks up `function(args)`, creating a fresh symbolic value for it
    /// if the term was unknown.
    ///
    /// # Panics
    /// Panics if `args` has more than one element.
    pub fn get(&mut self, function: &F, args: &[SymValue]) -> SymValue {
        let from = self.source(args);
        self.get_edge(from, function)
    }

    /// The value of the constant `function`, see [`get`](EGraph::get).
    pub fn constant(&mut self, function: F) -> SymValue {
        let root = self.const_root;
        self.get_edge(root, &function)
    }

    /// The value of `function(arg)`, see [`get`](EGraph::get).
    pub fn apply(&mut self, function: F, arg: SymValue) -> SymValue {
        self.get_edge(arg, &function)
    }

    pub(crate) fn get_edge(&mut self, from: SymValue, function: &F) -> SymValue {
        let from = self.find(from);
        match self.terms.get(from, function) {
            Some(to) => self.find(to),
            None => {
                let to = self.fresh_symbol();
                self.set_edge(from, function.clone(), to);
                to
            }
        }
    }

    /// Makes `function(args)` evaluate to `value`, replacing any previous
    /// target of that term.
    ///
    /// # Panics
    /// Panics if `args` has more than one element.
    pub fn set(&mut self, function: F, args: &[SymValue], value: SymValue) {
        let from = self.source(args);
        self.set_edge(from, function, value);
    }

    pub(crate) fn set_edge(&mut self, from: SymValue, function: F, to: SymValue) {
        let from = self.find(from);
        let to = self.find(to);
        let arg = if from == self.const_root {
            None
        } else {
            Some(from)
        };
        self.snapshot.eq_terms.add(
            to,
            EGraphTerm {
                function: function.clone(),
                arg,
            },
        );
        if self.is_old(from) {
            self.record(Update::Edge {
                from,
                function: function.clone(),
            });
        }
        self.snapshot.terms.insert(from, function, to);
    }

    /// Removes the edge for `function(args)`, if there is one.
    ///
    /// # Panics
    /// Panics if `args` has more than one element.
    pub fn eliminate(&mut self, function: &F, args: &[SymValue]) {
        let from = self.source(args);
        self.eliminate_edge(from, function);
    }

    pub(crate) fn eliminate_edge(&mut self, from: SymValue, function: &F) {
        let from = self.find(from);
        if self.is_old(from) {
            self.record(Update::EliminateEdge {
                from,
                function: function.clone(),
            });
        }
        self.snapshot.terms.remove(from, function);
    }

    /// Removes every edge out of `sv`.
    pub fn eliminate_all(&mut self, sv: SymValue) {
        let from = self.find(sv);
        if self.is_old(from) {
            let functions: Vec<F> = self.terms.functions(from).cloned().collect();
            for function in functions {
                self.record(Update::EliminateEdge { from, function });
            }
        }
        self.snapshot.terms.remove_all(from);
    }

    /// Sets the abstract value of `sv`.
    ///
    /// Nothing is recorded if the value doesn't change.
    pub fn set_value(&mut self, sv: SymValue, value: L::Element) {
        let sv = self.find(sv);
        if self.value(sv) == value {
            return;
        }
        if self.is_old(sv) {
            self.record(Update::Value { sv });
        }
        if self.lattice().is_top(&value) {
            self.snapshot.values.remove(&sv);
        } else {
            self.snapshot.values.insert(sv, value);
        }
    }

    /** Asserts that `a` and `b` denote the same value.

    Merges their classes and closes the graph under congruence: if both
    sides have an edge for the same function, the targets are merged
    too, and edges only one side has are carried over. The merged class
    keeps the older representative and the meet of both abstract values.
    */
    pub fn assume_equal(&mut self, a: SymValue, b: SymValue) {
        let (a, b) = (self.find(a), self.find(b));
        if a == b {
            return;
        }
        if self.is_old(a) && self.is_old(b) {
            self.record(Update::Equality { a, b });
        }

        let mut worklist = vec![(a, b)];
        while let Some((a, b)) = worklist.pop() {
            let (a, b) = (self.find(a), self.find(b));
            if a == b {
                continue;
            }
            let (older, newer) = if a < b { (a, b) } else { (b, a) };
            trace!("Merging {} into {}", newer, older);

            let moved: Vec<(F, SymValue)> = self
                .terms
                .edges(newer)
                .map(|(f, to)| (f.clone(), to))
                .collect();
            for (function, target) in moved {
                match self.lookup_edge(older, &function) {
                    None => self.set_edge(older, function, target),
                    Some(existing) => worklist.push((target, existing)),
                }
            }
            self.snapshot.terms.remove_all(newer);

            let (newer_value, older_value) = (self.value(newer), self.value(older));
            self.snapshot.eq_terms.merge(newer, older);
            self.snapshot.unionfind.union(older, newer);
            if self.is_old(newer) {
                self.snapshot.lineage.merged.push(newer);
            }
            self.snapshot.values.remove(&newer);
            let met = self.lattice().meet(&newer_value, &older_value);
            self.set_value(older, met);
        }
    }

    /// Drops every edge and abstract value, logging the removals so a
    /// replay still sees them.
    pub(crate) fn forget_all(&mut self) {
        let sources: Vec<SymValue> = self.terms.sources().collect();
        for sv in sources {
            self.eliminate_all(sv);
        }
        let valued: Vec<SymValue> = self.values.keys().copied().collect();
        let top = self.lattice().top();
        for sv in valued {
            self.set_value(sv, top.clone());
        }
        self.snapshot.eq_terms.clear();
    }
}

/// A frozen, shareable [`Snapshot`].
///
/// Cloning is cheap. Use [`branch`](FrozenEGraph::branch) to get a
/// mutable continuation and [`join`](FrozenEGraph::join) to merge two
/// states at a control flow merge.
pub struct FrozenEGraph<F: FunctionSymbol, L: Lattice>(pub(crate) Rc<Snapshot<F, L>>);

impl<F: FunctionSymbol, L: Lattice> Clone for FrozenEGraph<F, L> {
    fn clone(&self) -> Self {
        FrozenEGraph(self.0.clone())
    }
}

impl<F: FunctionSymbol, L: Lattice> Deref for FrozenEGraph<F, L> {
    type Target = Snapshot<F, L>;

    fn deref(&self) -> &Snapshot<F, L> {
        &self.0
    }
}

impl<F: FunctionSymbol, L: Lattice> Debug for FrozenEGraph<F, L> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(&*self.0, f)
    }
}

impl<F: FunctionSymbol, L: Lattice> FrozenEGraph<F, L> {
    /// Returns `true` if both handles refer to the same snapshot.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// The oldest ancestor of this snapshot, possibly itself.
    pub fn absolute_root(&self) -> FrozenEGraph<F, L> {
        match &self.lineage.root {
            Some(root) => root.clone(),
            None => self.clone(),
        }
    }

    /// Starts a mutable child of this snapshot at `block`.
    ///
    /// The child shares all state with `self` and records the updates
    /// made to symbolic values it inherited.
    pub fn branch(&self, block: BlockId) -> EGraph<F, L> {
        trace!(
            "Branching at {} from history of size {}",
            block,
            self.history_size()
        );
        let parent = &self.0;
        EGraph {
            snapshot: Snapshot {
                shared: parent.shared.clone(),
                terms: parent.terms.clone(),
                eq_terms: parent.eq_terms.clone(),
                unionfind: parent.unionfind.clone(),
                values: parent.values.clone(),
                const_root: parent.const_root,
                last_id: parent.last_id,
                lineage: Lineage::child_of(self, block),
            },
        }
    }
}
