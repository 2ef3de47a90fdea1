//! Numeric intervals used as comparison levels.
//!
//! Comparing a scalar against an interval asks which side of the interval's
//! boundary the scalar sits on, not whether the two overlap:
//!
//! - `x > I` when `x` is above the interval (past `right`, or at `right` if
//!   the interval is open there)
//! - `x < I` when `x` is below the interval (symmetrically on `left`)
//! - `x >= I` / `x <= I` are the negations of `x < I` / `x > I`
//! - `x == I` when `x` is inside, `x != I` when outside
//!
//! A missing (`NaN`) scalar is on no side at all.

use crate::domain::error::ConditionError;
use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Closed {
    Both,
    Left,
    Right,
    Neither,
}

impl Closed {
    pub fn left_closed(self) -> bool {
        matches!(self, Closed::Both | Closed::Left)
    }

    pub fn right_closed(self) -> bool {
        matches!(self, Closed::Both | Closed::Right)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    left: f64,
    right: f64,
    closed: Closed,
}

impl Interval {
    pub fn new(left: f64, right: f64, closed: Closed) -> Result<Self, ConditionError> {
        if !left.is_finite() || !right.is_finite() {
            return Err(ConditionError::InvalidInterval {
                left,
                right,
                reason: "bounds must be finite".into(),
            });
        }
        if left > right {
            return Err(ConditionError::InvalidInterval {
                left,
                right,
                reason: "left bound exceeds right bound".into(),
            });
        }
        if left == right && closed != Closed::Both {
            return Err(ConditionError::InvalidInterval {
                left,
                right,
                reason: "a single-point interval must be closed on both sides".into(),
            });
        }
        // -0.0 and 0.0 must intern to the same level.
        Ok(Self {
            left: left + 0.0,
            right: right + 0.0,
            closed,
        })
    }

    /// `[left, right]`
    pub fn closed(left: f64, right: f64) -> Result<Self, ConditionError> {
        Self::new(left, right, Closed::Both)
    }

    pub fn left(&self) -> f64 {
        self.left
    }

    pub fn right(&self) -> f64 {
        self.right
    }

    pub fn closedness(&self) -> Closed {
        self.closed
    }

    pub fn is_above(&self, x: f64) -> bool {
        if x.is_nan() {
            return false;
        }
        if self.closed.right_closed() {
            x > self.right
        } else {
            x >= self.right
        }
    }

    pub fn is_below(&self, x: f64) -> bool {
        if x.is_nan() {
            return false;
        }
        if self.closed.left_closed() {
            x < self.left
        } else {
            x <= self.left
        }
    }

    pub fn contains(&self, x: f64) -> bool {
        !x.is_nan() && !self.is_above(x) && !self.is_below(x)
    }

    pub(crate) fn total_cmp(&self, other: &Self) -> Ordering {
        self.left
            .total_cmp(&other.left)
            .then(self.right.total_cmp(&other.right))
            .then(self.closed.cmp(&other.closed))
    }

    pub(crate) fn key(&self) -> (u64, u64, Closed) {
        (self.left.to_bits(), self.right.to_bits(), self.closed)
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let open = if self.closed.left_closed() { '[' } else { '(' };
        let close = if self.closed.right_closed() { ']' } else { ')' };
        write!(f, "{}{}, {}{}", open, self.left, self.right, close)
    }
}
