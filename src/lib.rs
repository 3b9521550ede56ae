//! Visa Gift Card Balance Checker Library
//! # Overview
//!
//! This library checks balances of prepaid Visa gift cards against the card
//! issuer's web portal, many cards at a time.
//!
//! # Architecture
//!
//! The system is organized into several key components:
//!
//! - [`types`] - Core data types (CardRecord, CheckerError, protocol requests)
//! - [`cli`] - CLI arguments parsing
//! - [`core`] - Business logic components:
//!   - [`core::client`] - Protocol client for the card portal
//!   - [`core::parser`] - Streaming parser for the balance page
//!   - [`core::lookup`] - Balance lookup, registration and PIN setting for one card
//!   - [`core::orchestrator`] - Bounded concurrent retrieval over many cards
//! - [`io`] - Card file reading and results writing
//! - [`runner`] - The complete file-to-file run
//!
//! # Card Lifecycle
//!
//! Each card row is validated when it is read. A card that fails validation
//! is reported with its reason and never sent to the portal. A valid card is
//! looked up by one independent task, which leaves it in one of two states:
//!
//! - **Valid**: available and initial balance, transactions, and the
//!   cashback and override totals derived from them
//! - **Invalid**: an error reason such as `card not found` or a network failure

// Module declarations
pub mod cli;
pub mod core;
pub mod io;
pub mod runner;
pub mod types;

pub use core::{CardService, CheckerConfig, ClientConfig, GiftCardClient, Orchestrator};
pub use io::write_results_csv;
pub use runner::{BalanceRunner, RunSummary};
pub use types::{
    BalanceSnapshot, CardRecord, CheckerError, TransactionKind, TransactionRecord,
    ValidationError,
};
