//! Core business logic module
//!
//! This module contains the balance retrieval components:
//! - `traits` - Trait abstractions over the card service and HTTP sessions
//! - `client` - Protocol client for the gift card site
//! - `parser` - Streaming parser for the balance page
//! - `lookup` - Per-card operations built on the client and parser
//! - `orchestrator` - Concurrent retrieval over many cards

pub mod client;
pub mod lookup;
pub mod orchestrator;
pub mod parser;
pub mod traits;

pub use client::{extract_card_id, ClientConfig, GiftCardClient, HttpSessionFactory};
pub use lookup::{check_balance, register_card, set_pin};
pub use orchestrator::{CardOutcome, CheckerConfig, Orchestrator, RunReport};
pub use parser::{parse_balance_page, BalancePage, PageEvent, PageParser};
pub use traits::{CardService, HttpSession, PostReply, SessionFactory, SessionKind};
