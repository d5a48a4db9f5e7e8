use std::fmt::{Display, Formatter};
use std::ops::Neg;

/// A handle to a function stored in the [`Bdd`][crate::bdd::Bdd] manager.
///
/// The lowest bit is the complement flag, the remaining bits are the node index.
/// Handles are canonical: two handles obtained from the same manager compare
/// equal if and only if they denote the same Boolean function. This makes `Ref`
/// usable directly as a hash key for symbolic state deduplication.
///
/// A handle stays valid until the manager is rebuilt by
/// [`reorder`][crate::bdd::Bdd::reorder] or
/// [`collect_garbage`][crate::bdd::Bdd::collect_garbage], which remap the roots
/// they are given and invalidate everything else.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(transparent)]
pub struct Ref(u32);

impl Ref {
    /// Sentinel for "no function".
    pub const INVALID: Self = Self(u32::MAX);

    pub const fn new(index: u32, negated: bool) -> Self {
        Self((index << 1) | negated as u32)
    }

    pub const fn positive(index: u32) -> Self {
        Self::new(index, false)
    }

    /// Index of the node in the manager storage.
    #[inline]
    pub const fn index(self) -> usize {
        (self.0 >> 1) as usize
    }

    #[inline]
    pub const fn is_negated(self) -> bool {
        (self.0 & 1) != 0
    }

    /// The same node without the complement flag.
    #[inline]
    pub const fn regular(self) -> Self {
        Self(self.0 & !1)
    }

    /// Return the internal representation of the reference.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl Default for Ref {
    fn default() -> Self {
        Self::INVALID
    }
}

impl Neg for Ref {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self(self.0 ^ 1)
    }
}

impl Display for Ref {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}@{}",
            if self.is_negated() { "~" } else { "" },
            self.index()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negation_roundtrip() {
        let r = Ref::positive(42);
        assert_eq!(r.index(), 42);
        assert!(!r.is_negated());

        let n = -r;
        assert_eq!(n.index(), 42);
        assert!(n.is_negated());
        assert_eq!(n.regular(), r);
        assert_eq!(-n, r);
    }

    #[test]
    fn test_display() {
        assert_eq!(Ref::positive(7).to_string(), "@7");
        assert_eq!((-Ref::positive(7)).to_string(), "~@7");
    }
}
