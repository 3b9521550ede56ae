//! Card-related types for the balance checker
//!
//! This module defines the `CardRecord` built from one input row, its
//! validation rules, and the balance snapshot filled in by a lookup.

use super::error::{CheckerError, ValidationError};
use super::request::{CardInfo, DEFAULT_POSTAL_CODE};
use super::transaction::{TransactionKind, TransactionRecord};
use rust_decimal::Decimal;
use std::fmt;

/// Balance figures for one card
///
/// All fields are zero until a lookup succeeds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BalanceSnapshot {
    /// Amount loaded on the card at activation
    pub initial_balance: Decimal,

    /// Amount currently spendable
    pub available_balance: Decimal,

    /// Sum of all cashback transactions
    pub cashback_total: Decimal,

    /// Sum of all override transactions
    pub override_total: Decimal,
}

impl BalanceSnapshot {
    /// Build a snapshot from the two page balances and the activity lines
    pub fn from_transactions(
        initial_balance: Decimal,
        available_balance: Decimal,
        transactions: &[TransactionRecord],
    ) -> Self {
        let mut snapshot = BalanceSnapshot {
            initial_balance,
            available_balance,
            ..Default::default()
        };

        for transaction in transactions {
            match transaction.kind {
                TransactionKind::Cashback => snapshot.cashback_total += transaction.amount,
                TransactionKind::Override => snapshot.override_total += transaction.amount,
                TransactionKind::Other(_) => {}
            }
        }

        snapshot
    }
}

/// One prepaid Visa gift card and the result of checking it
///
/// A record is always constructed, even from a bad row, so that its last four
/// digits and the failure reason can be reported. A record that failed
/// validation never becomes valid again.
#[derive(Debug, Clone, PartialEq)]
pub struct CardRecord {
    /// 16-digit card number starting with `4`
    pub card_number: String,

    /// Two-digit month, zero-padded
    pub expiration_month: String,

    /// Two-digit year in 16..=99
    pub expiration_year: String,

    /// Security code in 0..=999
    pub cvv: String,

    /// Five-character postal code, `00000` when none was given
    pub postal_code: String,

    /// Balances from the last successful lookup
    pub balance: BalanceSnapshot,

    /// Activity lines from the last successful lookup, in page order
    pub transactions: Vec<TransactionRecord>,

    /// Set iff the card is invalid
    error: Option<CheckerError>,

    /// Validation failures are permanent; lookup failures are not
    rejected_locally: bool,
}

impl CardRecord {
    /// Build a record from raw row fields, validating it on the way
    ///
    /// Never fails: a record that does not validate is marked invalid and
    /// carries the reason.
    pub fn new(
        card_number: &str,
        expiration_month: &str,
        expiration_year: &str,
        cvv: &str,
        postal_code: &str,
    ) -> Self {
        let mut card = CardRecord {
            card_number: card_number.trim().to_string(),
            expiration_month: expiration_month.trim().to_string(),
            expiration_year: expiration_year.trim().to_string(),
            cvv: cvv.trim().to_string(),
            postal_code: postal_code.trim().to_string(),
            balance: BalanceSnapshot::default(),
            transactions: Vec::new(),
            error: None,
            rejected_locally: false,
        };

        if let Err(e) = card.normalize_and_check() {
            card.error = Some(e.into());
            card.rejected_locally = true;
        }

        card
    }

    /// Validate raw fields, returning the record only if it is usable
    pub fn validate(
        card_number: &str,
        expiration_month: &str,
        expiration_year: &str,
        cvv: &str,
        postal_code: &str,
    ) -> Result<CardRecord, ValidationError> {
        let card = CardRecord::new(
            card_number,
            expiration_month,
            expiration_year,
            cvv,
            postal_code,
        );
        match card.error {
            Some(CheckerError::Validation(e)) => Err(e),
            _ => Ok(card),
        }
    }

    // Checks run in a fixed order and stop at the first failure. Month and
    // postal code are normalized in place before their check.
    fn normalize_and_check(&mut self) -> Result<(), ValidationError> {
        if self.card_number.len() != 16 || !is_all_digits(&self.card_number) {
            return Err(ValidationError::InvalidCardNumber);
        }

        if !self.card_number.starts_with('4') {
            return Err(ValidationError::NotVisaGiftCard);
        }

        if self.expiration_month.chars().count() == 1 {
            self.expiration_month.insert(0, '0');
        }
        if !matches!(parse_bounded(&self.expiration_month, 2), Some(1..=12)) {
            return Err(ValidationError::InvalidExpirationMonth {
                month: self.expiration_month.clone(),
            });
        }

        if !matches!(parse_bounded(&self.expiration_year, 2), Some(16..=99)) {
            return Err(ValidationError::InvalidExpirationYear {
                year: self.expiration_year.clone(),
            });
        }

        if !matches!(digit_value(&self.cvv), Some(0..=999)) {
            return Err(ValidationError::InvalidCvv {
                cvv: self.cvv.clone(),
            });
        }

        if self.postal_code.is_empty() {
            self.postal_code = DEFAULT_POSTAL_CODE.to_string();
        }
        if self.postal_code.chars().count() != 5 {
            return Err(ValidationError::InvalidPostalCode {
                postal: self.postal_code.clone(),
            });
        }

        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.error.is_none()
    }

    /// Whether the record was rejected before any request was made
    pub fn is_rejected_locally(&self) -> bool {
        self.rejected_locally
    }

    pub fn error(&self) -> Option<&CheckerError> {
        self.error.as_ref()
    }

    /// Human-readable failure reason, present iff the card is invalid
    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(|e| e.to_string())
    }

    /// Last four characters of the card number
    pub fn last_four(&self) -> &str {
        let start = self
            .card_number
            .char_indices()
            .rev()
            .nth(3)
            .map(|(i, _)| i)
            .unwrap_or(0);
        &self.card_number[start..]
    }

    /// Canonical request payload; the default postal sentinel is omitted
    pub fn card_info(&self) -> CardInfo {
        CardInfo {
            card_number: self.card_number.clone(),
            expiration_month: self.expiration_month.clone(),
            expiration_year: self.expiration_year.clone(),
            security_code: self.cvv.clone(),
            postal_code: (self.postal_code != DEFAULT_POSTAL_CODE)
                .then(|| self.postal_code.clone()),
        }
    }

    /// Clear everything a lookup fills in
    ///
    /// A previous lookup failure is cleared too; a validation failure is not.
    pub fn reset(&mut self) {
        self.balance = BalanceSnapshot::default();
        self.transactions.clear();
        if !self.rejected_locally {
            self.error = None;
        }
    }

    /// Store a successful lookup result
    pub fn apply_balance(
        &mut self,
        initial_balance: Decimal,
        available_balance: Decimal,
        transactions: Vec<TransactionRecord>,
    ) {
        self.balance =
            BalanceSnapshot::from_transactions(initial_balance, available_balance, &transactions);
        self.transactions = transactions;
        self.error = None;
    }

    /// Mark the card invalid with the given reason
    pub fn mark_invalid(&mut self, error: CheckerError) {
        self.error = Some(error);
    }
}

impl fmt::Display for CardRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Card {} {}/{} {}/{}",
            self.last_four(),
            self.expiration_month,
            self.expiration_year,
            self.balance.available_balance,
            self.balance.initial_balance
        )
    }
}

fn is_all_digits(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|c| c.is_ascii_digit())
}

// Parses a short, digits-only field
fn parse_bounded(value: &str, max_len: usize) -> Option<u32> {
    if value.len() > max_len || !is_all_digits(value) {
        return None;
    }
    value.parse().ok()
}

// Numeric value of a digits-only field of any length; leading zeros are ignored
fn digit_value(value: &str) -> Option<u64> {
    if !is_all_digits(value) {
        return None;
    }
    match value.trim_start_matches('0') {
        "" => Some(0),
        significant if significant.len() > 19 => None,
        significant => significant.parse().ok(),
    }
}
