//! Lattices used by the analyses built on the e-graph.

use std::fmt::{self, Debug, Display, Formatter};
use std::marker::PhantomData;

use crate::{Lattice, Symbol};

/// Nullness of a value.
///
/// `NonNull` is the bottom of [`NonNullLattice`] and `MaybeNull` its top,
/// so an unconstrained value is `MaybeNull`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Nullness {
    /// Definitely not null.
    NonNull,
    /// Might be null.
    MaybeNull,
}

impl Display for Nullness {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Nullness::NonNull => write!(f, "NonNull"),
            Nullness::MaybeNull => write!(f, "MaybeNull"),
        }
    }
}

/// The two point lattice `NonNull < MaybeNull`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NonNullLattice;

impl Lattice for NonNullLattice {
    type Element = Nullness;

    fn top(&self) -> Nullness {
        Nullness::MaybeNull
    }

    fn bottom(&self) -> Nullness {
        Nullness::NonNull
    }

    fn is_top(&self, e: &Nullness) -> bool {
        *e == Nullness::MaybeNull
    }

    fn is_bottom(&self, e: &Nullness) -> bool {
        *e == Nullness::NonNull
    }

    fn at_most(&self, a: &Nullness, b: &Nullness) -> bool {
        *a == Nullness::NonNull || *b == Nullness::MaybeNull
    }

    fn nontrivial_join(&self, a: &Nullness, b: &Nullness) -> Nullness {
        if *a == Nullness::NonNull && *b == Nullness::NonNull {
            Nullness::NonNull
        } else {
            Nullness::MaybeNull
        }
    }

    fn nontrivial_meet(&self, a: &Nullness, b: &Nullness) -> Nullness {
        if *a == Nullness::NonNull || *b == Nullness::NonNull {
            Nullness::NonNull
        } else {
            Nullness::MaybeNull
        }
    }
}

/// Whether an object's invariant may currently be broken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Consistency {
    /// The object invariant holds.
    Consistent,
    /// The object may be mid-update.
    MaybeInconsistent,
}

impl Display for Consistency {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Consistency::Consistent => write!(f, "Consistent"),
            Consistency::MaybeInconsistent => write!(f, "MaybeInconsistent"),
        }
    }
}

/// The two point lattice `Consistent < MaybeInconsistent`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsistencyLattice;

impl Lattice for ConsistencyLattice {
    type Element = Consistency;

    fn top(&self) -> Consistency {
        Consistency::MaybeInconsistent
    }

    fn bottom(&self) -> Consistency {
        Consistency::Consistent
    }

    fn is_top(&self, e: &Consistency) -> bool {
        *e == Consistency::MaybeInconsistent
    }

    fn is_bottom(&self, e: &Consistency) -> bool {
        *e == Consistency::Consistent
    }

    fn at_most(&self, a: &Consistency, b: &Consistency) -> bool {
        *a == Consistency::Consistent || *b == Consistency::MaybeInconsistent
    }

    fn nontrivial_join(&self, a: &Consistency, b: &Consistency) -> Consistency {
        if *a == Consistency::Consistent && *b == Consistency::Consistent {
            Consistency::Consistent
        } else {
            Consistency::MaybeInconsistent
        }
    }

    fn nontrivial_meet(&self, a: &Consistency, b: &Consistency) -> Consistency {
        if *a == Consistency::Consistent || *b == Consistency::Consistent {
            Consistency::Consistent
        } else {
            Consistency::MaybeInconsistent
        }
    }
}

/// An element of a [`FlatLattice`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Flat<T> {
    /// Infeasible.
    Bottom,
    /// Exactly this value.
    Value(T),
    /// Unknown.
    Top,
}

impl<T: Display> Display for Flat<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Flat::Bottom => write!(f, "infeasible"),
            Flat::Value(t) => Display::fmt(t, f),
            Flat::Top => write!(f, "don't know"),
        }
    }
}

/// Lifts any set of pairwise incomparable values into a lattice
/// by adding a bottom and a top.
pub struct FlatLattice<T>(PhantomData<fn() -> T>);

impl<T> FlatLattice<T> {
    /// Create a new flat lattice.
    pub fn new() -> Self {
        FlatLattice(PhantomData)
    }
}

impl<T> Default for FlatLattice<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for FlatLattice<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> Debug for FlatLattice<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("FlatLattice")
    }
}

impl<T: Clone + Eq + Debug> Lattice for FlatLattice<T> {
    type Element = Flat<T>;

    fn top(&self) -> Flat<T> {
        Flat::Top
    }

    fn bottom(&self) -> Flat<T> {
        Flat::Bottom
    }

    fn is_top(&self, e: &Flat<T>) -> bool {
        matches!(e, Flat::Top)
    }

    fn is_bottom(&self, e: &Flat<T>) -> bool {
        matches!(e, Flat::Bottom)
    }

    fn at_most(&self, a: &Flat<T>, b: &Flat<T>) -> bool {
        a == b
    }

    fn nontrivial_join(&self, a: &Flat<T>, b: &Flat<T>) -> Flat<T> {
        if a == b {
            a.clone()
        } else {
            Flat::Top
        }
    }

    fn nontrivial_meet(&self, a: &Flat<T>, b: &Flat<T>) -> Flat<T> {
        if a == b {
            a.clone()
        } else {
            Flat::Bottom
        }
    }
}

/// Exposure state of an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Exposure {
    /// The object is exposed: its invariant may be broken.
    Exposed,
    /// The object is packed.
    NotExposed,
    /// The object is exposed for the frames between `lower` and `upper`
    /// in its type hierarchy.
    Frame {
        /// The most derived exposed frame.
        lower: Symbol,
        /// The least derived exposed frame.
        upper: Symbol,
    },
}

impl Display for Exposure {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Exposure::Exposed => write!(f, "exposed"),
            Exposure::NotExposed => write!(f, "not exposed"),
            Exposure::Frame { lower, upper } => write!(f, "[{}..{}]", lower, upper),
        }
    }
}

/// Exposure analysis lattice: distinct exposure states join to top.
pub type ExposureLattice = FlatLattice<Exposure>;
