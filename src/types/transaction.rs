//! Transaction-related types for the balance checker
//!
//! This module defines the account activity lines scraped from the card
//! service's transaction history page.

use rust_decimal::Decimal;
use std::fmt;

/// Classification of one line of account activity
///
/// Only cashback and override lines are summed into the card totals; every
/// other label is kept verbatim so it can still be reported.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TransactionKind {
    /// Cashback credited to the card
    Cashback,

    /// Manual balance override applied by the issuer
    Override,

    /// Any other activity, keeping the label shown on the page
    Other(String),
}

impl TransactionKind {
    /// Classify a type label as shown on the transaction page
    ///
    /// Matching ignores case and surrounding whitespace. Unknown labels map to
    /// [`TransactionKind::Other`].
    pub fn from_label(label: &str) -> Self {
        let label = label.trim();
        match label.to_ascii_lowercase().as_str() {
            "cashback" | "cash back" => TransactionKind::Cashback,
            "override" => TransactionKind::Override,
            _ => TransactionKind::Other(label.to_string()),
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionKind::Cashback => write!(f, "Cashback"),
            TransactionKind::Override => write!(f, "Override"),
            TransactionKind::Other(label) => write!(f, "{}", label),
        }
    }
}

/// One finalized line of account activity
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRecord {
    /// What kind of activity this is
    pub kind: TransactionKind,

    /// Free-text description (merchant, memo)
    pub description: String,

    /// Amount with the sign the page shows; not assumed non-negative
    pub amount: Decimal,

    /// Date as printed on the page, not parsed further
    pub date_label: String,
}
