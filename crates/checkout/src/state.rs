//! Checkout state machine.

use serde::{Deserialize, Serialize};

/// The state of a checkout in its lifecycle.
///
/// State transitions:
/// ```text
/// Start ──► Priced ──► Authorized ──► Committed
///   │         │            │
///   └─────────┴────────────┴──► Aborted
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CheckoutState {
    /// Nothing has been read yet.
    #[default]
    Start,

    /// The cart was read and a total computed.
    Priced,

    /// The gateway approved the total.
    Authorized,

    /// Stock, order and cart changes are durable (terminal state).
    Committed,

    /// The checkout failed and no local change was kept (terminal state).
    Aborted,
}

impl CheckoutState {
    /// Returns true if moving from `self` to `next` is a legal step.
    pub fn can_transition_to(&self, next: CheckoutState) -> bool {
        use CheckoutState::*;

        matches!(
            (self, next),
            (Start, Priced)
                | (Priced, Authorized)
                | (Authorized, Committed)
                | (Start | Priced | Authorized, Aborted)
        )
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, CheckoutState::Committed | CheckoutState::Aborted)
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutState::Start => "Start",
            CheckoutState::Priced => "Priced",
            CheckoutState::Authorized => "Authorized",
            CheckoutState::Committed => "Committed",
            CheckoutState::Aborted => "Aborted",
        }
    }
}

impl std::fmt::Display for CheckoutState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
