//! Define mark algebra and registration-variant precedence.
//!
//! Marks accumulate on suites, test methods, and individual parameter entries. At lowering
//! time a mark set collapses into a registration variant, and the precedence rule differs
//! between the two levels:
//!
//! - **Tests**: pending or skip wins over only, only wins over plain.
//! - **Suites**: only wins over skip or pending.
//!
//! Both rules are inherited from the system this engine registers into and must not drift.

/// Represent the mark carried by a single parameter entry of a parameterized test.
///
/// Parameter marks are independent of the owning method's marks and are combined with them
/// using OR semantics (see [`MarkSet::union`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mark {
    #[default]
    Normal,
    Skip,
    Only,
    Pending,
}

impl Mark {
    /// Expand this mark into a mark set so it can be ORed with method-level marks.
    pub fn as_set(self) -> MarkSet {
        match self {
            Mark::Normal => MarkSet::default(),
            Mark::Skip => MarkSet {
                skip: true,
                ..MarkSet::default()
            },
            Mark::Only => MarkSet {
                only: true,
                ..MarkSet::default()
            },
            Mark::Pending => MarkSet {
                pending: true,
                ..MarkSet::default()
            },
        }
    }
}

/// Name one of the three settable marks, for execution-modifier declarators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkKind {
    Skip,
    Only,
    Pending,
}

/// Accumulate the skip/only/pending marks attached to a suite class or test method.
///
/// Marks are additive and idempotent: setting a mark twice is the same as setting it once,
/// and no declarator ever clears a mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MarkSet {
    pub skip: bool,
    pub only: bool,
    pub pending: bool,
}

impl MarkSet {
    /// Set a single mark in place.
    pub fn set(&mut self, kind: MarkKind) {
        match kind {
            MarkKind::Skip => self.skip = true,
            MarkKind::Only => self.only = true,
            MarkKind::Pending => self.pending = true,
        }
    }

    /// Combine two mark sets with OR semantics.
    pub fn union(self, other: MarkSet) -> MarkSet {
        MarkSet {
            skip: self.skip || other.skip,
            only: self.only || other.only,
            pending: self.pending || other.pending,
        }
    }

    /// Return true when no mark is set.
    pub fn is_empty(self) -> bool {
        !(self.skip || self.only || self.pending)
    }

    /// Collapse into the registration variant for a test.
    ///
    /// Precedence: (pending | skip) > only > plain.
    pub fn test_variant(self) -> Variant {
        if self.pending || self.skip {
            Variant::Skip
        } else if self.only {
            Variant::Only
        } else {
            Variant::Normal
        }
    }

    /// Collapse into the registration variant for a suite.
    ///
    /// Precedence: only > (skip | pending) > plain.
    pub fn suite_variant(self) -> Variant {
        if self.only {
            Variant::Only
        } else if self.skip || self.pending {
            Variant::Skip
        } else {
            Variant::Normal
        }
    }
}

/// Represent the lowered registration variant a runner understands.
///
/// Pending collapses into `Skip` at this level: a pending test registers as a skipped test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Variant {
    #[default]
    Normal,
    Skip,
    Only,
}
