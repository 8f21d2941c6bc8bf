//! Travel limits: the raw servo positions of the two gate extremes.

use super::{LimitKind, Target};

/// Open and closed raw positions.  The two are never equal, so the
/// neutral middle always lies strictly between distinct extremes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TravelLimits {
    open: i32,
    closed: i32,
}

impl TravelLimits {
    /// `None` when `open == closed`.
    pub fn new(open: i32, closed: i32) -> Option<Self> {
        (open != closed).then_some(Self { open, closed })
    }

    pub fn open(&self) -> i32 {
        self.open
    }

    pub fn closed(&self) -> i32 {
        self.closed
    }

    /// Integer mean of the extremes.
    pub fn middle(&self) -> i32 {
        (self.open + self.closed) / 2
    }

    pub fn raw_for(&self, target: Target) -> i32 {
        match target {
            Target::Open => self.open,
            Target::Close => self.closed,
            Target::Middle => self.middle(),
        }
    }

    /// Copy with one extreme replaced; `None` if that would collapse the range.
    pub fn with_limit(&self, kind: LimitKind, value: i32) -> Option<Self> {
        match kind {
            LimitKind::Open => Self::new(value, self.closed),
            LimitKind::Closed => Self::new(self.open, value),
        }
    }
}
