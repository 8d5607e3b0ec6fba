//! Discrete time model.
//!
//! Time is a monotonically increasing `Tick` counter advanced once per
//! coordination pass.  Reservations hold a lane for a half-open
//! [`TickWindow`] `[enter, exit)`, so two windows that merely touch
//! (`a.exit == b.enter`) do not conflict.

use std::fmt;

// ── Tick ─────────────────────────────────────────────────────────────────────

/// An absolute simulation tick counter.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tick(pub u64);

impl Tick {
    pub const ZERO: Tick = Tick(0);

    /// Return the tick `n` steps after `self`.
    #[inline]
    pub fn offset(self, n: u64) -> Tick {
        Tick(self.0 + n)
    }

    /// Ticks elapsed from `earlier` to `self`, saturating at zero.
    #[inline]
    pub fn since(self, earlier: Tick) -> u64 {
        self.0.saturating_sub(earlier.0)
    }

    /// The following tick.
    #[inline]
    pub fn next(self) -> Tick {
        Tick(self.0 + 1)
    }
}

impl std::ops::Add<u64> for Tick {
    type Output = Tick;
    #[inline]
    fn add(self, rhs: u64) -> Tick {
        Tick(self.0 + rhs)
    }
}

impl std::ops::Sub for Tick {
    type Output = u64;
    #[inline]
    fn sub(self, rhs: Tick) -> u64 {
        self.0 - rhs.0
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

// ── TickWindow ────────────────────────────────────────────────────────────────

/// Half-open interval of ticks `[enter, exit)`.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TickWindow {
    pub enter: Tick,
    pub exit:  Tick,
}

impl TickWindow {
    /// Window starting at `enter` and lasting `len` ticks (at least one).
    #[inline]
    pub fn starting(enter: Tick, len: u64) -> Self {
        Self { enter, exit: enter + len.max(1) }
    }

    /// `true` if the two windows share at least one tick.
    #[inline]
    pub fn overlaps(&self, other: &TickWindow) -> bool {
        self.enter.max(other.enter) < self.exit.min(other.exit)
    }

    /// `true` if `tick` falls inside the window.
    #[inline]
    pub fn contains(&self, tick: Tick) -> bool {
        self.enter <= tick && tick < self.exit
    }

    #[inline]
    pub fn len(&self) -> u64 {
        self.exit.since(self.enter)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.exit <= self.enter
    }
}

impl fmt::Display for TickWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.enter, self.exit)
    }
}
