//! Status enums for carts, orders, and payments.

use serde::{Deserialize, Serialize};

/// Lifecycle of a shopping cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "shop.cart_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum CartStatus {
    /// Items may be added, changed, or removed.
    #[default]
    Open,
    /// An order was placed from this cart; it is now immutable.
    CheckedOut,
}

/// Lifecycle of an order.
///
/// `PendingPayment -> Paid | Failed`. Both outcomes are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "shop.order_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    PendingPayment,
    Paid,
    Failed,
}

impl OrderStatus {
    /// Whether no further transition is allowed.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Paid | Self::Failed)
    }
}

/// Lifecycle of a payment with the provider.
///
/// `Created -> Authorized -> Captured`, or `Created | Authorized -> Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "shop.payment_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Created,
    Authorized,
    Captured,
    Failed,
}

impl PaymentStatus {
    /// Whether the payment is settled (captured or failed).
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Captured | Self::Failed)
    }
}

macro_rules! impl_status_text {
    ($ty:ty, $label:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            /// The canonical `snake_case` name, as stored and serialized.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(format!(concat!("invalid ", $label, ": {}"), s)),
                }
            }
        }
    };
}

impl_status_text!(CartStatus, "cart status", {
    Open => "open",
    CheckedOut => "checked_out",
});

impl_status_text!(OrderStatus, "order status", {
    PendingPayment => "pending_payment",
    Paid => "paid",
    Failed => "failed",
});

impl_status_text!(PaymentStatus, "payment status", {
    Created => "created",
    Authorized => "authorized",
    Captured => "captured",
    Failed => "failed",
});
