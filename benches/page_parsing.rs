//! Benchmark suite for balance page parsing and result formatting
//!
//! Uses the divan benchmarking framework.
//!
//! # Running Benchmarks
//!
//! ```bash
//! # Run all benchmarks
//! cargo bench
//! ```
//!
//! Pages are generated in memory with a varying number of transaction
//! blocks, from an empty history to a long-lived card.

use visa_balance_checker::core::parse_balance_page;
use visa_balance_checker::io::console_line;
use visa_balance_checker::CardRecord;

fn main() {
    divan::main();
}

fn balance_page(transactions: usize) -> String {
    let mut page = String::from(
        r#"<html><body>
<div class="row"><div class="name">Available Balance</div><div class="value">$1,234.56</div></div>
<div class="row"><div class="name">Initial Balance</div><div class="value">$2,000.00</div></div>
<div class="panel-group">"#,
    );

    for i in 0..transactions {
        let kind = match i % 3 {
            0 => "Cashback",
            1 => "Override",
            _ => "Purchase",
        };
        page.push_str(&format!(
            r#"<div class="panel-heading"><span class="glyphicon glyphicon-plus"></span> 01/{:02}/2024
<div class="col-xs-5ths transaction-type">{}</div>
<div class="col-xs-5ths transaction-desc">Entry {}</div>
<div class="col-xs-5ths transaction-amount">${}.{:02}</div></div>
<div class="panel-collapse collapse"><div class="panel-body">details</div></div>
"#,
            i % 28 + 1,
            kind,
            i,
            i % 100,
            i % 97
        ));
    }

    page.push_str("</div></body></html>");
    page
}

/// Parse a balance page with the given number of transactions
#[divan::bench(args = [0, 10, 100, 1000])]
fn parse_page(bencher: divan::Bencher, transactions: usize) {
    let page = balance_page(transactions);

    bencher.bench(|| parse_balance_page(divan::black_box(&page)).expect("Parsing failed"));
}

/// Validate a card row and format its console line
#[divan::bench]
fn validate_and_format() -> String {
    let card = CardRecord::new(
        divan::black_box("4111111111111234"),
        "1",
        "27",
        "123",
        "",
    );
    console_line(&card)
}
