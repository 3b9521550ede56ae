//! Balance page parser
//!
//! A single-pass state machine over a stream of page events (start tags and
//! text). It only ever looks at the *current* tag name and class; end tags are
//! not tracked, so text following a closed element is still attributed to the
//! last opened one, as in the service's own page layout.
//!
//! The machine is independent of any HTML engine: [`PageParser::feed`] takes
//! synthetic [`PageEvent`]s, and [`parse_balance_page`] produces them from a
//! real document with `scraper`.
//!
//! # Page layout
//!
//! ```text
//! div.name  "Available Balance"      label
//! div.value "$12.34"                 value for the preceding label
//! *.panel-heading                    transaction starts
//!   div."col-xs-5ths transaction-type"    kind label
//!   div."col-xs-5ths transaction-desc"    description
//!   div."col-xs-5ths transaction-amount"  amount
//!   span."glyphicon glyphicon-plus"       date label (text after the icon)
//! *."panel-collapse collapse"        transaction ends
//! ```
//!
//! Both balance labels are required. A page without them is the service's
//! "no such card" answer and yields [`CheckerError::RecordNotFound`]; this
//! relies on the label strings staying exactly as they are today.

use std::str::FromStr;

use rust_decimal::Decimal;
use scraper::{Html, Node};

use crate::types::{CheckerError, TransactionKind, TransactionRecord};

const AVAILABLE_BALANCE_LABEL: &str = "Available Balance";
const INITIAL_BALANCE_LABEL: &str = "Initial Balance";

const LABEL_CLASS: &str = "name";
const VALUE_CLASS: &str = "value";
const TRANSACTION_START_CLASS: &str = "panel-heading";
const TRANSACTION_END_CLASS: &str = "panel-collapse collapse";
const TRANSACTION_FIELD_PREFIX: &str = "col-xs-5ths transaction-";
const DATE_TAG: &str = "span";
const DATE_CLASS: &str = "glyphicon glyphicon-plus";

/// One event of the page stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageEvent<'a> {
    /// An element was opened
    StartTag {
        name: &'a str,
        class: Option<&'a str>,
    },
    /// A run of character data
    Text(&'a str),
}

/// Everything a successful balance page yields
#[derive(Debug, Clone, PartialEq)]
pub struct BalancePage {
    pub initial_balance: Decimal,
    pub available_balance: Decimal,
    /// Transactions in document order
    pub transactions: Vec<TransactionRecord>,
}

// Fields of a transaction collected between its start and end markers
#[derive(Debug, Default)]
struct PendingTransaction {
    kind: Option<TransactionKind>,
    description: Option<String>,
    amount: Option<Decimal>,
    date_label: Option<String>,
}

impl PendingTransaction {
    fn is_empty(&self) -> bool {
        self.kind.is_none()
            && self.description.is_none()
            && self.amount.is_none()
            && self.date_label.is_none()
    }

    fn finalize(self) -> Result<TransactionRecord, CheckerError> {
        let kind = self
            .kind
            .ok_or_else(|| CheckerError::parse("transaction block has no type"))?;
        let amount = self
            .amount
            .ok_or_else(|| CheckerError::parse("transaction block has no amount"))?;

        Ok(TransactionRecord {
            kind,
            description: self.description.unwrap_or_default(),
            amount,
            date_label: self.date_label.unwrap_or_default(),
        })
    }
}

/// Streaming state machine extracting balances and transactions
#[derive(Debug, Default)]
pub struct PageParser {
    current_tag: Option<String>,
    current_class: Option<String>,
    current_label: Option<String>,
    in_progress: Option<PendingTransaction>,
    available_balance: Option<Decimal>,
    initial_balance: Option<Decimal>,
    transactions: Vec<TransactionRecord>,
}

impl PageParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the machine by one event
    ///
    /// # Errors
    ///
    /// Returns `CheckerError::Parse` for unparseable money text and for
    /// transaction markers that are not properly paired.
    pub fn feed(&mut self, event: PageEvent<'_>) -> Result<(), CheckerError> {
        match event {
            PageEvent::StartTag { name, class } => self.start_tag(name, class),
            PageEvent::Text(text) => self.text(text),
        }
    }

    fn start_tag(&mut self, name: &str, class: Option<&str>) -> Result<(), CheckerError> {
        self.current_tag = Some(name.to_string());
        self.current_class = class.map(str::to_string);

        match class {
            Some(TRANSACTION_START_CLASS) => {
                // A heading that collected nothing (e.g. a non-transaction
                // panel) may be replaced; a half-filled one may not.
                if let Some(pending) = &self.in_progress {
                    if !pending.is_empty() {
                        return Err(CheckerError::parse(
                            "transaction started before the previous one ended",
                        ));
                    }
                }
                self.in_progress = Some(PendingTransaction::default());
            }
            Some(TRANSACTION_END_CLASS) => {
                let pending = self.in_progress.take().ok_or_else(|| {
                    CheckerError::parse("transaction end marker without a start marker")
                })?;
                self.transactions.push(pending.finalize()?);
            }
            _ => {}
        }

        Ok(())
    }

    fn text(&mut self, text: &str) -> Result<(), CheckerError> {
        let content = text.trim();
        if content.is_empty() {
            return Ok(());
        }

        let tag = self.current_tag.as_deref();
        let class = self.current_class.as_deref();

        match (tag, class) {
            (Some("div"), Some(LABEL_CLASS)) => {
                self.current_label = Some(content.to_string());
            }
            (Some("div"), Some(VALUE_CLASS)) => {
                match self.current_label.take().as_deref() {
                    Some(AVAILABLE_BALANCE_LABEL) => {
                        self.available_balance = Some(parse_money(content)?);
                    }
                    Some(INITIAL_BALANCE_LABEL) => {
                        self.initial_balance = Some(parse_money(content)?);
                    }
                    _ => {}
                }
            }
            (Some("div"), Some(class)) if class.starts_with(TRANSACTION_FIELD_PREFIX) => {
                let field = class[TRANSACTION_FIELD_PREFIX.len()..].to_string();
                self.transaction_field(&field, content)?;
            }
            (Some(DATE_TAG), Some(DATE_CLASS)) => {
                self.pending()?.date_label = Some(content.to_string());
            }
            _ => {}
        }

        Ok(())
    }

    fn transaction_field(&mut self, field: &str, content: &str) -> Result<(), CheckerError> {
        match field {
            "type" => self.pending()?.kind = Some(TransactionKind::from_label(content)),
            "desc" => self.pending()?.description = Some(content.to_string()),
            "amount" => {
                let amount = parse_money(content)?;
                self.pending()?.amount = Some(amount);
            }
            _ => {}
        }
        Ok(())
    }

    fn pending(&mut self) -> Result<&mut PendingTransaction, CheckerError> {
        self.in_progress
            .as_mut()
            .ok_or_else(|| CheckerError::parse("transaction field outside a transaction block"))
    }

    /// End of document: check post-conditions and hand back the result
    ///
    /// # Errors
    ///
    /// - `CheckerError::RecordNotFound` if either balance is missing
    /// - `CheckerError::Parse` if a transaction with data was never closed
    pub fn finish(self) -> Result<BalancePage, CheckerError> {
        if let Some(pending) = &self.in_progress {
            if !pending.is_empty() {
                return Err(CheckerError::parse("transaction block was never closed"));
            }
        }

        match (self.initial_balance, self.available_balance) {
            (Some(initial_balance), Some(available_balance)) => Ok(BalancePage {
                initial_balance,
                available_balance,
                transactions: self.transactions,
            }),
            _ => Err(CheckerError::RecordNotFound),
        }
    }
}

/// Parse a monetary amount as printed on the page, e.g. `$1,234.50` or `-$2.00`
pub fn parse_money(text: &str) -> Result<Decimal, CheckerError> {
    let cleaned: String = text
        .trim()
        .chars()
        .filter(|c| *c != '$' && *c != ',')
        .collect();

    Decimal::from_str(cleaned.trim())
        .map_err(|_| CheckerError::parse(format!("invalid amount '{}'", text.trim())))
}

/// Parse a full balance page
///
/// The document is walked in document order; every element start and text node
/// becomes one [`PageEvent`].
pub fn parse_balance_page(html: &str) -> Result<BalancePage, CheckerError> {
    let document = Html::parse_document(html);
    let mut parser = PageParser::new();

    for node in document.tree.root().descendants() {
        match node.value() {
            Node::Element(element) => parser.feed(PageEvent::StartTag {
                name: element.name(),
                class: element.attr("class"),
            })?,
            Node::Text(text) => parser.feed(PageEvent::Text(&**text))?,
            _ => {}
        }
    }

    parser.finish()
}
