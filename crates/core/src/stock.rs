//! Inventory ledger arithmetic for a single variant.
//!
//! A [`StockLevel`] is the `(on_hand, reserved)` pair stored per variant.
//! These methods are pure: callers must hold the variant's row lock for the
//! whole enclosing transaction, read the level under that lock, apply one of
//! these operations, and write the result back before committing.
//!
//! Every operation preserves `0 <= reserved <= on_hand` given a valid input.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from ledger operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StockError {
    /// Not enough unreserved units to satisfy a reservation.
    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: i32, available: i32 },

    /// An on-hand adjustment would leave fewer units than are on hand or reserved.
    #[error("adjustment by {delta} would leave on_hand at {resulting} (reserved {reserved})")]
    NegativeStock {
        delta: i32,
        resulting: i64,
        reserved: i32,
    },

    /// Quantities must be positive.
    #[error("quantity must be positive (got {0})")]
    InvalidQuantity(i32),

    /// Counter arithmetic overflowed.
    #[error("stock counter overflow")]
    Overflow,
}

/// On-hand and reserved counters for one variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct StockLevel {
    /// Units physically in stock.
    pub on_hand: i32,
    /// Units held for checked-out orders awaiting settlement.
    pub reserved: i32,
}

impl StockLevel {
    /// Create a level.
    #[must_use]
    pub const fn new(on_hand: i32, reserved: i32) -> Self {
        Self { on_hand, reserved }
    }

    /// Units that can still be sold: `on_hand - reserved`.
    #[must_use]
    pub const fn available(self) -> i32 {
        self.on_hand.saturating_sub(self.reserved)
    }

    /// Whether `0 <= reserved <= on_hand` holds.
    #[must_use]
    pub const fn is_consistent(self) -> bool {
        self.reserved >= 0 && self.reserved <= self.on_hand
    }

    /// Hold `quantity` units for an order.
    ///
    /// # Errors
    ///
    /// Returns `StockError::InsufficientStock` if fewer than `quantity` units
    /// are available, `StockError::InvalidQuantity` for non-positive input.
    pub const fn reserve(self, quantity: i32) -> Result<Self, StockError> {
        if quantity <= 0 {
            return Err(StockError::InvalidQuantity(quantity));
        }
        let available = self.available();
        if available < quantity {
            return Err(StockError::InsufficientStock {
                requested: quantity,
                available,
            });
        }
        Ok(Self {
            on_hand: self.on_hand,
            reserved: self.reserved + quantity,
        })
    }

    /// Return `quantity` reserved units to the available pool.
    ///
    /// `reserved` is floored at zero so a repeated release cannot underflow.
    #[must_use]
    pub const fn release(self, quantity: i32) -> Self {
        Self {
            on_hand: self.on_hand,
            reserved: floor_zero(self.reserved.saturating_sub(quantity)),
        }
    }

    /// Permanently remove `quantity` sold units and drop their reservation.
    ///
    /// `reserved` is floored at zero.
    #[must_use]
    pub const fn consume(self, quantity: i32) -> Self {
        Self {
            on_hand: self.on_hand.saturating_sub(quantity),
            reserved: floor_zero(self.reserved.saturating_sub(quantity)),
        }
    }

    /// Change `on_hand` by `delta` without touching `reserved`.
    ///
    /// # Errors
    ///
    /// Returns `StockError::NegativeStock` if the result would be negative or
    /// below the reserved count.
    pub fn adjust_on_hand(self, delta: i32) -> Result<Self, StockError> {
        let resulting = i64::from(self.on_hand) + i64::from(delta);
        if resulting < 0 || resulting < i64::from(self.reserved) {
            return Err(StockError::NegativeStock {
                delta,
                resulting,
                reserved: self.reserved,
            });
        }
        let on_hand = i32::try_from(resulting).map_err(|_| StockError::Overflow)?;
        Ok(Self {
            on_hand,
            reserved: self.reserved,
        })
    }
}

const fn floor_zero(value: i32) -> i32 {
    if value < 0 { 0 } else { value }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_reserve_within_availability() {
        let level = StockLevel::new(5, 1).reserve(3).unwrap();
        assert_eq!(level, StockLevel::new(5, 4));
        assert_eq!(level.available(), 1);
    }

    #[test]
    fn test_reserve_exact_availability() {
        let level = StockLevel::new(3, 0).reserve(3).unwrap();
        assert_eq!(level.available(), 0);
    }

    #[test]
    fn test_reserve_beyond_availability() {
        let err = StockLevel::new(5, 3).reserve(3).unwrap_err();
        assert_eq!(
            err,
            StockError::InsufficientStock {
                requested: 3,
                available: 2
            }
        );
    }

    #[test]
    fn test_reserve_rejects_zero() {
        assert_eq!(
            StockLevel::new(5, 0).reserve(0),
            Err(StockError::InvalidQuantity(0))
        );
    }

    #[test]
    fn test_release_floors_at_zero() {
        let level = StockLevel::new(4, 2).release(3);
        assert_eq!(level, StockLevel::new(4, 0));
        // Releasing again is harmless
        assert_eq!(level.release(2), StockLevel::new(4, 0));
    }

    #[test]
    fn test_consume_decrements_both() {
        let level = StockLevel::new(2, 2).consume(2);
        assert_eq!(level, StockLevel::new(0, 0));
    }

    #[test]
    fn test_consume_floors_reserved() {
        let level = StockLevel::new(5, 1).consume(2);
        assert_eq!(level, StockLevel::new(3, 0));
    }

    #[test]
    fn test_adjust_receiving_stock() {
        let level = StockLevel::new(2, 1).adjust_on_hand(10).unwrap();
        assert_eq!(level, StockLevel::new(12, 1));
    }

    #[test]
    fn test_adjust_rejects_negative() {
        let err = StockLevel::new(2, 0).adjust_on_hand(-5).unwrap_err();
        assert!(matches!(err, StockError::NegativeStock { resulting: -3, .. }));
    }

    #[test]
    fn test_adjust_rejects_below_reserved() {
        let err = StockLevel::new(4, 3).adjust_on_hand(-2).unwrap_err();
        assert!(matches!(err, StockError::NegativeStock { reserved: 3, .. }));
    }

    #[test]
    fn test_operations_keep_consistency() {
        let start = StockLevel::new(10, 0);
        let reserved = start.reserve(4).unwrap();
        let consumed = reserved.consume(2);
        let released = consumed.release(2);
        for level in [start, reserved, consumed, released] {
            assert!(level.is_consistent(), "{level:?}");
        }
        assert_eq!(released, StockLevel::new(8, 0));
    }
}
