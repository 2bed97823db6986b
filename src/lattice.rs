use std::fmt::Debug;

/** A bounded lattice of abstract values.

Every symbolic value in an [`EGraph`](crate::EGraph) carries an element
of some [`Lattice`]. The lattice is what makes the e-graph an analysis:
a non-null checker plugs in [`NonNullLattice`](crate::NonNullLattice),
an exposure checker plugs in [`ExposureLattice`](crate::ExposureLattice),
and so on.

Lower elements carry more information. [`top`](Lattice::top) is "nothing
known", and it is the value of every symbolic value that was never
constrained. [`bottom`](Lattice::bottom) is "infeasible".

Implementors only provide the nontrivial cases.
The provided methods handle top and bottom before delegating, so
[`at_most`](Lattice::at_most), [`nontrivial_join`](Lattice::nontrivial_join)
and [`nontrivial_meet`](Lattice::nontrivial_meet) are never called with
a top or bottom operand.

Join and meet must be associative, commutative and idempotent, and
[`lower_than_or_equal`](Lattice::lower_than_or_equal) must be a partial
order. Nothing checks this at runtime beyond [`validate`](Lattice::validate).
The lattice should also have finite height: the e-graph never widens on
its own, so an infinite ascending chain will keep a fixpoint from
terminating.

# Example

```
use egraph_dataflow::*;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Parity { Bottom, Even, Odd, Top }

struct ParityLattice;

impl Lattice for ParityLattice {
    type Element = Parity;

    fn top(&self) -> Parity { Parity::Top }
    fn bottom(&self) -> Parity { Parity::Bottom }
    fn is_top(&self, e: &Parity) -> bool { *e == Parity::Top }
    fn is_bottom(&self, e: &Parity) -> bool { *e == Parity::Bottom }

    fn at_most(&self, a: &Parity, b: &Parity) -> bool { a == b }
    fn nontrivial_join(&self, a: &Parity, b: &Parity) -> Parity {
        if a == b { *a } else { Parity::Top }
    }
    fn nontrivial_meet(&self, a: &Parity, b: &Parity) -> Parity {
        if a == b { *a } else { Parity::Bottom }
    }
}

let l = ParityLattice;
l.validate();
assert_eq!(l.join(&Parity::Even, &Parity::Odd), Parity::Top);
assert_eq!(l.meet(&Parity::Top, &Parity::Odd), Parity::Odd);
assert!(l.lower_than_or_equal(&Parity::Bottom, &Parity::Even));
```
*/
pub trait Lattice {
    /// The abstract values of this lattice.
    type Element: Clone + PartialEq + Debug;

    /// The element carrying no information.
    fn top(&self) -> Self::Element;

    /// The infeasible element.
    fn bottom(&self) -> Self::Element;

    /// Returns `true` if `e` is top.
    fn is_top(&self, e: &Self::Element) -> bool;

    /// Returns `true` if `e` is bottom.
    fn is_bottom(&self, e: &Self::Element) -> bool;

    /// The partial order on elements that are neither top nor bottom:
    /// `true` if `a` carries at least the information of `b`.
    fn at_most(&self, a: &Self::Element, b: &Self::Element) -> bool;

    /// Least upper bound of two elements that are neither top nor bottom.
    fn nontrivial_join(&self, a: &Self::Element, b: &Self::Element) -> Self::Element;

    /// Greatest lower bound of two elements that are neither top nor bottom.
    fn nontrivial_meet(&self, a: &Self::Element, b: &Self::Element) -> Self::Element;

    /// Is `a` better (or equal) information than `b`?
    fn lower_than_or_equal(&self, a: &Self::Element, b: &Self::Element) -> bool {
        if self.is_bottom(a) || self.is_top(b) {
            return true;
        }
        if self.is_top(a) || self.is_bottom(b) {
            return false;
        }
        self.at_most(a, b)
    }

    /// Is `a` worse (or equal) information than `b`?
    fn higher_than_or_equal(&self, a: &Self::Element, b: &Self::Element) -> bool {
        self.lower_than_or_equal(b, a)
    }

    /// Do `a` and `b` carry the same information?
    fn equivalent(&self, a: &Self::Element, b: &Self::Element) -> bool {
        self.lower_than_or_equal(a, b) && self.lower_than_or_equal(b, a)
    }

    /// Least upper bound. Top absorbs, bottom is the identity.
    fn join(&self, a: &Self::Element, b: &Self::Element) -> Self::Element {
        if self.is_top(a) || self.is_bottom(b) {
            return a.clone();
        }
        if self.is_top(b) || self.is_bottom(a) {
            return b.clone();
        }
        self.nontrivial_join(a, b)
    }

    /// Greatest lower bound. Bottom absorbs, top is the identity.
    fn meet(&self, a: &Self::Element, b: &Self::Element) -> Self::Element {
        if self.is_top(a) || self.is_bottom(b) {
            return b.clone();
        }
        if self.is_top(b) || self.is_bottom(a) {
            return a.clone();
        }
        self.nontrivial_meet(a, b)
    }

    /// Widening. Defaults to [`join`](Lattice::join), which is enough
    /// for finite-height lattices.
    fn widen(&self, a: &Self::Element, b: &Self::Element) -> Self::Element {
        self.join(a, b)
    }

    /// Panics if top and bottom don't behave like top and bottom.
    fn validate(&self) {
        let (top, bottom) = (self.top(), self.bottom());
        assert!(self.is_top(&top), "top is not top");
        assert!(self.is_bottom(&bottom), "bottom is not bottom");
        assert!(!self.is_bottom(&top), "top is bottom");
        assert!(!self.is_top(&bottom), "bottom is top");

        assert!(self.lower_than_or_equal(&top, &top));
        assert!(self.lower_than_or_equal(&bottom, &top));
        assert!(self.lower_than_or_equal(&bottom, &bottom));

        assert!(self.is_top(&self.join(&top, &top)));
        assert!(self.is_bottom(&self.join(&bottom, &bottom)));
    }
}

/// Asserts the lattice laws over every combination of `samples`.
///
/// Meant for tests of [`Lattice`] implementations; samples should include
/// top and bottom.
pub fn check_lattice_laws<L: Lattice>(lattice: &L, samples: &[L::Element]) {
    lattice.validate();
    let eq = |a: &L::Element, b: &L::Element| lattice.equivalent(a, b);

    for a in samples {
        assert!(lattice.lower_than_or_equal(a, a), "<= not reflexive on {:?}", a);
        assert!(eq(&lattice.join(a, a), a), "join not idempotent on {:?}", a);
        assert!(eq(&lattice.meet(a, a), a), "meet not idempotent on {:?}", a);
        assert!(lattice.is_top(&lattice.join(&lattice.top(), a)));
        assert!(eq(&lattice.join(&lattice.bottom(), a), a));
        assert!(lattice.is_bottom(&lattice.meet(&lattice.bottom(), a)));
        assert!(eq(&lattice.meet(&lattice.top(), a), a));

        for b in samples {
            let ab = lattice.join(a, b);
            assert!(eq(&ab, &lattice.join(b, a)), "join not commutative");
            assert!(lattice.lower_than_or_equal(a, &ab), "join not an upper bound");
            assert!(lattice.lower_than_or_equal(b, &ab), "join not an upper bound");

            let ab = lattice.meet(a, b);
            assert!(eq(&ab, &lattice.meet(b, a)), "meet not commutative");
            assert!(lattice.lower_than_or_equal(&ab, a), "meet not a lower bound");
            assert!(lattice.lower_than_or_equal(&ab, b), "meet not a lower bound");

            if lattice.lower_than_or_equal(a, b) && lattice.lower_than_or_equal(b, a) {
                assert_eq!(a, b, "<= not antisymmetric");
            }

            for c in samples {
                let l = lattice.join(&lattice.join(a, b), c);
                let r = lattice.join(a, &lattice.join(b, c));
                assert!(eq(&l, &r), "join not associative");

                let l = lattice.meet(&lattice.meet(a, b), c);
                let r = lattice.meet(a, &lattice.meet(b, c));
                assert!(eq(&l, &r), "meet not associative");

                if lattice.lower_than_or_equal(a, b) && lattice.lower_than_or_equal(b, c) {
                    assert!(lattice.lower_than_or_equal(a, c), "<= not transitive");
                }
            }
        }
    }
}
