//! Payment settlement transition table.
//!
//! Provider events move a payment along
//! `created -> authorized -> captured` or `created | authorized -> failed`.
//! Once a payment is captured or failed, every later event is a no-op so
//! that at-least-once delivery never applies an effect twice.

use serde::{Deserialize, Serialize};

use crate::stock::StockLevel;
use crate::types::{OrderStatus, PaymentStatus};

/// A payment outcome reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentEvent {
    Authorized,
    Captured,
    Failed,
}

impl PaymentEvent {
    /// The payment status this event moves to.
    #[must_use]
    pub const fn target(self) -> PaymentStatus {
        match self {
            Self::Authorized => PaymentStatus::Authorized,
            Self::Captured => PaymentStatus::Captured,
            Self::Failed => PaymentStatus::Failed,
        }
    }

    /// The order status a pending order settles to, if any.
    #[must_use]
    pub const fn order_outcome(self) -> Option<OrderStatus> {
        match self {
            Self::Authorized => None,
            Self::Captured => Some(OrderStatus::Paid),
            Self::Failed => Some(OrderStatus::Failed),
        }
    }

    /// What happens to the order's reserved stock.
    #[must_use]
    pub const fn stock_effect(self) -> Option<StockEffect> {
        match self {
            Self::Authorized => None,
            Self::Captured => Some(StockEffect::Consume),
            Self::Failed => Some(StockEffect::Release),
        }
    }
}

impl std::fmt::Display for PaymentEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Authorized => "authorized",
            Self::Captured => "captured",
            Self::Failed => "failed",
        })
    }
}

/// Inventory effect of a settled payment on each order line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StockEffect {
    /// Sold: decrement `on_hand` and `reserved`.
    Consume,
    /// Not sold: return the reservation to the available pool.
    Release,
}

impl StockEffect {
    /// Apply the effect for `quantity` units.
    #[must_use]
    pub const fn apply(self, level: StockLevel, quantity: i32) -> StockLevel {
        match self {
            Self::Consume => level.consume(quantity),
            Self::Release => level.release(quantity),
        }
    }
}

/// Result of feeding an event to a payment in a given state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Move the payment to `to` and apply the event's effects.
    Apply { to: PaymentStatus },
    /// The payment is already settled; nothing changes.
    AlreadySettled { current: PaymentStatus },
}

/// Decide what `event` does to a payment currently in `current`.
#[must_use]
pub const fn transition(current: PaymentStatus, event: PaymentEvent) -> Transition {
    if current.is_terminal() {
        return Transition::AlreadySettled { current };
    }
    Transition::Apply {
        to: event.target(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_EVENTS: [PaymentEvent; 3] = [
        PaymentEvent::Authorized,
        PaymentEvent::Captured,
        PaymentEvent::Failed,
    ];

    #[test]
    fn test_open_payments_follow_event() {
        for current in [PaymentStatus::Created, PaymentStatus::Authorized] {
            for event in ALL_EVENTS {
                assert_eq!(
                    transition(current, event),
                    Transition::Apply { to: event.target() }
                );
            }
        }
    }

    #[test]
    fn test_settled_payments_ignore_everything() {
        for current in [PaymentStatus::Captured, PaymentStatus::Failed] {
            for event in ALL_EVENTS {
                assert_eq!(
                    transition(current, event),
                    Transition::AlreadySettled { current }
                );
            }
        }
    }

    #[test]
    fn test_failure_after_capture_is_noop() {
        assert_eq!(
            transition(PaymentStatus::Captured, PaymentEvent::Failed),
            Transition::AlreadySettled {
                current: PaymentStatus::Captured
            }
        );
    }

    #[test]
    fn test_effects() {
        assert_eq!(PaymentEvent::Authorized.stock_effect(), None);
        assert_eq!(PaymentEvent::Authorized.order_outcome(), None);
        assert_eq!(
            PaymentEvent::Captured.order_outcome(),
            Some(OrderStatus::Paid)
        );

        let level = StockLevel::new(2, 2);
        assert_eq!(StockEffect::Consume.apply(level, 2), StockLevel::new(0, 0));
        assert_eq!(StockEffect::Release.apply(level, 2), StockLevel::new(2, 0));
    }
}
