use std::fmt::{self, Display, Formatter};

use im::{OrdMap, OrdSet};

use crate::{FunctionSymbol, SymValue};

/// A term `function(arg)`, or the constant `function` when `arg` is `None`.
///
/// Returned by [`Snapshot::eq_terms`](crate::Snapshot::eq_terms).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EGraphTerm<F> {
    /// The applied function symbol.
    pub function: F,
    /// The argument, absent for constants.
    pub arg: Option<SymValue>,
}

impl<F> EGraphTerm<F> {
    /// The arguments of this term, as passed to
    /// [`try_lookup`](crate::Snapshot::try_lookup).
    pub fn args(&self) -> &[SymValue] {
        match &self.arg {
            Some(arg) => std::slice::from_ref(arg),
            None => &[],
        }
    }
}

impl<F: Display> Display for EGraphTerm<F> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.arg {
            Some(arg) => write!(f, "{}({})", self.function, arg),
            None => write!(f, "{}", self.function),
        }
    }
}

/// Persistent map from `(source, function)` to target.
///
/// Sources without outgoing edges have no entry, so
/// [`sources`](TermMap::sources) yields exactly the values with edges.
#[derive(Debug, Clone)]
pub(crate) struct TermMap<F: FunctionSymbol> {
    edges: OrdMap<SymValue, OrdMap<F, SymValue>>,
}

impl<F: FunctionSymbol> Default for TermMap<F> {
    fn default() -> Self {
        TermMap {
            edges: OrdMap::new(),
        }
    }
}

impl<F: FunctionSymbol> TermMap<F> {
    pub fn get(&self, from: SymValue, function: &F) -> Option<SymValue> {
        self.edges.get(&from)?.get(function).copied()
    }

    pub fn insert(&mut self, from: SymValue, function: F, to: SymValue) {
        let mut out = self.edges.get(&from).cloned().unwrap_or_default();
        out.insert(function, to);
        self.edges.insert(from, out);
    }

    pub fn remove(&mut self, from: SymValue, function: &F) -> Option<SymValue> {
        let out = self.edges.get_mut(&from)?;
        let removed = out.remove(function);
        if out.is_empty() {
            self.edges.remove(&from);
        }
        removed
    }

    pub fn remove_all(&mut self, from: SymValue) {
        self.edges.remove(&from);
    }

    /// Labels of the edges out of `from`, in order.
    pub fn functions(&self, from: SymValue) -> impl Iterator<Item = &F> + '_ {
        self.edges.get(&from).into_iter().flat_map(|out| out.keys())
    }

    /// Edges out of `from`, in label order.
    pub fn edges(&self, from: SymValue) -> impl Iterator<Item = (&F, SymValue)> + '_ {
        self.edges
            .get(&from)
            .into_iter()
            .flat_map(|out| out.iter().map(|(f, &to)| (f, to)))
    }

    pub fn out_degree(&self, from: SymValue) -> usize {
        self.edges.get(&from).map_or(0, |out| out.len())
    }

    pub fn sources(&self) -> impl Iterator<Item = SymValue> + '_ {
        self.edges.keys().copied()
    }

    /// Total number of edges
    pub fn len(&self) -> usize {
        self.edges.values().map(|out| out.len()).sum()
    }
}

/// Persistent index from a value to the terms asserted equal to it.
///
/// Entries go stale when edges are removed or overwritten, so readers
/// must re-check each term against the [`TermMap`].
#[derive(Debug, Clone)]
pub(crate) struct EqTermMap<F: FunctionSymbol> {
    terms: OrdMap<SymValue, OrdSet<EGraphTerm<F>>>,
}

impl<F: FunctionSymbol> Default for EqTermMap<F> {
    fn default() -> Self {
        EqTermMap {
            terms: OrdMap::new(),
        }
    }
}

impl<F: FunctionSymbol> EqTermMap<F> {
    pub fn add(&mut self, value: SymValue, term: EGraphTerm<F>) {
        let mut set = self.terms.get(&value).cloned().unwrap_or_default();
        set.insert(term);
        self.terms.insert(value, set);
    }

    /// Moves every term recorded for `from` over to `to`.
    pub fn merge(&mut self, from: SymValue, to: SymValue) {
        if let Some(moved) = self.terms.remove(&from) {
            let into = self.terms.get(&to).cloned().unwrap_or_default();
            self.terms.insert(to, into.union(moved));
        }
    }

    pub fn get(&self, value: SymValue) -> impl Iterator<Item = &EGraphTerm<F>> + '_ {
        self.terms.get(&value).into_iter().flat_map(|set| set.iter())
    }

    pub fn clear(&mut self) {
        self.terms = OrdMap::new();
    }
}
