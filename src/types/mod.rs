//! Types module
//!
//! Contains core data structures used throughout the application.
//! This module organizes types into logical submodules:
//! - `card`: The card record, its validation and balance snapshot
//! - `transaction`: Account activity lines scraped from the service
//! - `request`: Request payloads for the card service
//! - `error`: Error types for the balance checker

pub mod card;
pub mod error;
pub mod request;
pub mod transaction;

pub use card::{BalanceSnapshot, CardRecord};
pub use error::{CheckerError, ValidationError};
pub use request::{CardInfo, ContactInfo, FormFields, PinCode, ProtocolRequest};
pub use transaction::{TransactionKind, TransactionRecord};
