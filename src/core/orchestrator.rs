//! Retrieval orchestrator: one independent lookup task per card
//!
//! This module provides the `Orchestrator`, which fans card lookups out over a
//! bounded set of concurrent tasks and collects their outcomes as they finish.
//!
//! # Design
//!
//! ```text
//! cards ──▶ submission (≤ workers in flight) ──▶ JoinSet ──▶ single collector
//!              │                                               │
//!              └── locally rejected cards ─────────────────────┘
//! ```
//!
//! - Each task owns exactly one `CardRecord`; tasks share nothing but the
//!   read-only service handle.
//! - The `JoinSet` is the completion queue, so outcomes arrive in completion
//!   order, not input order. Every outcome carries its input row index.
//! - A failing or panicking task produces an error outcome for its own card and
//!   never stops the others.
//! - Cancellation stops submission, including when it happened before the run
//!   started. In graceful mode in-flight tasks finish; in immediate mode they
//!   are aborted and their cards count as abandoned.
//! - The abort token aborts in-flight tasks in either mode, so a graceful
//!   drain can still be cut short.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::lookup::check_balance;
use super::traits::CardService;
use crate::cli::ShutdownMode;
use crate::types::{BalanceSnapshot, CardRecord, CheckerError};

/// Configuration for the orchestrator
#[derive(Clone, Debug)]
pub struct CheckerConfig {
    /// Maximum number of lookups in flight at once
    pub workers: usize,
    /// What to do with in-flight lookups when interrupted
    pub shutdown: ShutdownMode,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            workers: num_cpus::get(),
            shutdown: ShutdownMode::Graceful,
        }
    }
}

impl CheckerConfig {
    /// Create a new CheckerConfig with custom values
    pub fn new(workers: usize, shutdown: ShutdownMode) -> Self {
        let default = Self::default();

        let workers = if workers == 0 {
            warn!(
                "invalid worker count ({}), using default ({})",
                workers, default.workers
            );
            default.workers
        } else {
            workers
        };

        Self { workers, shutdown }
    }
}

/// A finished card together with its input row index
#[derive(Debug, Clone, PartialEq)]
pub struct CardOutcome {
    /// 1-based data row of the card in the input
    pub row: usize,
    pub card: CardRecord,
}

impl CardOutcome {
    /// The balance on success, the reason on failure
    pub fn result(&self) -> Result<&BalanceSnapshot, &CheckerError> {
        match self.card.error() {
            Some(e) => Err(e),
            None => Ok(&self.card.balance),
        }
    }
}

/// Everything a run produced
#[derive(Debug, Default)]
pub struct RunReport {
    /// Completed cards, in completion order
    pub outcomes: Vec<CardOutcome>,
    /// Whether the run was cut short by cancellation
    pub interrupted: bool,
    /// Cards never started, plus in-flight cards aborted by an immediate shutdown
    pub abandoned: usize,
}

/// Dispatches one lookup per card and gathers the outcomes
pub struct Orchestrator<S: ?Sized> {
    service: Arc<S>,
    config: CheckerConfig,
    cancel: CancellationToken,
    abort: CancellationToken,
}

impl<S> Orchestrator<S>
where
    S: CardService + ?Sized + 'static,
{
    pub fn new(service: Arc<S>, config: CheckerConfig) -> Self {
        Self {
            service,
            config,
            cancel: CancellationToken::new(),
            abort: CancellationToken::new(),
        }
    }

    /// Use an externally owned token for interruption
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Use an externally owned token for aborting in-flight lookups
    pub fn with_abort(mut self, abort: CancellationToken) -> Self {
        self.abort = abort;
        self
    }

    /// Token that interrupts the run when cancelled
    ///
    /// Submission stops; in-flight lookups are handled per the shutdown mode.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Token that stops submission and aborts in-flight lookups whatever
    /// the shutdown mode
    pub fn abort_token(&self) -> CancellationToken {
        self.abort.clone()
    }

    fn stop_requested(&self) -> bool {
        self.cancel.is_cancelled() || self.abort.is_cancelled()
    }

    /// Run all cards and return their outcomes in completion order
    pub async fn run(&self, cards: Vec<(usize, CardRecord)>) -> RunReport {
        self.run_with(cards, |_| {}).await
    }

    /// Like [`Orchestrator::run`], calling `on_outcome` as each card completes
    pub async fn run_with<F>(
        &self,
        cards: Vec<(usize, CardRecord)>,
        mut on_outcome: F,
    ) -> RunReport
    where
        F: FnMut(&CardOutcome),
    {
        let workers = self.config.workers.max(1);
        let mut pending = cards.into_iter();
        let mut in_flight: JoinSet<CardOutcome> = JoinSet::new();
        let mut report = RunReport::default();
        let mut aborting = false;
        let mut aborted = 0;

        let mut collect = |report: &mut RunReport, outcome: CardOutcome| {
            on_outcome(&outcome);
            report.outcomes.push(outcome);
        };

        loop {
            if !report.interrupted && self.stop_requested() {
                report.interrupted = true;
                match self.config.shutdown {
                    ShutdownMode::Graceful => {
                        info!(
                            in_flight = in_flight.len(),
                            "interrupted, waiting for in-flight cards"
                        );
                    }
                    ShutdownMode::Immediate => {
                        info!(
                            in_flight = in_flight.len(),
                            "interrupted, aborting in-flight cards"
                        );
                        aborting = true;
                    }
                }
            }

            if !aborting && self.abort.is_cancelled() {
                info!(
                    in_flight = in_flight.len(),
                    "abort requested, aborting in-flight cards"
                );
                aborting = true;
            }

            if aborting {
                in_flight.abort_all();
            }

            // Fill free worker slots
            while !self.stop_requested() && in_flight.len() < workers {
                let Some((row, card)) = pending.next() else {
                    break;
                };

                if card.is_rejected_locally() {
                    collect(&mut report, CardOutcome { row, card });
                    continue;
                }

                in_flight.spawn(retrieve(Arc::clone(&self.service), row, card));
            }

            if in_flight.is_empty() {
                break;
            }

            // Cancellation branches only wake the loop; the checks above act on them
            tokio::select! {
                biased;

                _ = self.abort.cancelled(), if !aborting => {}

                _ = self.cancel.cancelled(), if !report.interrupted => {}

                joined = in_flight.join_next() => match joined {
                    Some(Ok(outcome)) => collect(&mut report, outcome),
                    Some(Err(e)) if e.is_cancelled() => aborted += 1,
                    Some(Err(e)) => error!("lookup task failed to join: {}", e),
                    None => break,
                },
            }
        }

        if self.stop_requested() && !pending.as_slice().is_empty() {
            report.interrupted = true;
        }
        report.abandoned = pending.len() + aborted;
        report
    }
}

// One card's whole lookup. Panics are contained here so the card still gets
// exactly one outcome.
async fn retrieve<S>(service: Arc<S>, row: usize, mut card: CardRecord) -> CardOutcome
where
    S: CardService + ?Sized,
{
    let fallback = card.clone();

    let finished = AssertUnwindSafe(async move {
        if let Err(e) = check_balance(&*service, &mut card).await {
            warn!(row, card = card.last_four(), error = %e, "card lookup failed");
        }
        card
    })
    .catch_unwind()
    .await;

    match finished {
        Ok(card) => CardOutcome { row, card },
        Err(_) => {
            error!(row, card = fallback.last_four(), "card lookup panicked");
            let mut card = fallback;
            card.mark_invalid(CheckerError::runtime("lookup task panicked"));
            CardOutcome { row, card }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProtocolRequest;
    use async_trait::async_trait;
    use rstest::rstest;
    use rust_decimal::Decimal;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Answers by card number: numbers ending in `0000` are unknown, `9999`
    /// fail in transport, `6666` panic. Every call sleeps `delay`, except
    /// numbers ending in `1111`, which answer at once.
    struct ScriptedService {
        delay: Duration,
        calls: AtomicUsize,
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    impl ScriptedService {
        fn new(delay: Duration) -> Self {
            Self {
                delay,
                calls: AtomicUsize::new(0),
                active: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }
    }

    const PAGE: &str = r#"<div class="name">Available Balance</div><div class="value">$12.34</div>
<div class="name">Initial Balance</div><div class="value">$50.00</div>"#;

    #[async_trait]
    impl CardService for ScriptedService {
        async fn send(&self, request: &ProtocolRequest) -> Result<String, CheckerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            let number = request.card().card_number.clone();
            if !number.ends_with("1111") {
                tokio::time::sleep(self.delay).await;
            }
            self.active.fetch_sub(1, Ordering::SeqCst);

            if number.ends_with("6666") {
                panic!("scripted panic");
            }
            if number.ends_with("9999") {
                return Err(CheckerError::network("connection reset"));
            }
            if number.ends_with("0000") {
                return Ok("<html>no card</html>".to_string());
            }
            Ok(PAGE.to_string())
        }
    }

    fn card(last_four: &str) -> CardRecord {
        CardRecord::new(&format!("411111111111{}", last_four), "01", "27", "123", "")
    }

    fn indexed(cards: Vec<CardRecord>) -> Vec<(usize, CardRecord)> {
        cards.into_iter().enumerate().map(|(i, c)| (i + 1, c)).collect()
    }

    fn orchestrator(
        service: Arc<ScriptedService>,
        workers: usize,
        shutdown: ShutdownMode,
    ) -> Orchestrator<ScriptedService> {
        Orchestrator::new(service, CheckerConfig::new(workers, shutdown))
    }

    #[rstest]
    #[case::single_worker(1)]
    #[case::two_workers(2)]
    #[case::many_workers(16)]
    #[tokio::test(start_paused = true)]
    async fn test_every_card_reported_exactly_once(#[case] workers: usize) {
        let service = Arc::new(ScriptedService::new(Duration::from_millis(20)));
        let cards = indexed(vec![
            card("1234"),
            card("0000"),
            card("9999"),
            CardRecord::new("5111111111111111", "01", "27", "123", ""),
            card("5678"),
            card("1111"),
        ]);

        let report = orchestrator(Arc::clone(&service), workers, ShutdownMode::Graceful)
            .run(cards)
            .await;

        assert_eq!(report.outcomes.len(), 6);
        assert!(!report.interrupted);
        assert_eq!(report.abandoned, 0);
        let rows: HashSet<usize> = report.outcomes.iter().map(|o| o.row).collect();
        assert_eq!(rows, (1..=6).collect());

        let by_row = |row: usize| report.outcomes.iter().find(|o| o.row == row).unwrap();
        assert_eq!(
            by_row(1).card.balance.available_balance,
            Decimal::new(1234, 2)
        );
        assert_eq!(by_row(2).result(), Err(&CheckerError::RecordNotFound));
        assert_eq!(
            by_row(3).card.error_message().as_deref(),
            Some("network error: connection reset")
        );
        assert_eq!(
            by_row(4).card.error_message().as_deref(),
            Some("not a VISA gift card")
        );

        // The locally rejected card never reached the service
        assert_eq!(service.calls.load(Ordering::SeqCst), 5);
        assert!(service.peak.load(Ordering::SeqCst) <= workers);
    }

    #[tokio::test(start_paused = true)]
    async fn test_outcomes_arrive_in_completion_order() {
        let service = Arc::new(ScriptedService::new(Duration::from_millis(50)));
        let cards = indexed(vec![card("1234"), card("1111")]);

        let report = orchestrator(service, 2, ShutdownMode::Graceful)
            .run(cards)
            .await;

        let rows: Vec<usize> = report.outcomes.iter().map(|o| o.row).collect();
        assert_eq!(rows, vec![2, 1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_card_is_isolated() {
        let service = Arc::new(ScriptedService::new(Duration::from_millis(5)));
        let cards = indexed(vec![card("1234"), card("6666"), card("5678")]);

        let report = orchestrator(service, 3, ShutdownMode::Graceful)
            .run(cards)
            .await;

        assert_eq!(report.outcomes.len(), 3);
        let panicked = report.outcomes.iter().find(|o| o.row == 2).unwrap();
        assert_eq!(
            panicked.card.error_message().as_deref(),
            Some("runtime error: lookup task panicked")
        );
        assert_eq!(
            report.outcomes.iter().filter(|o| o.card.is_valid()).count(),
            2
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_cards_reported_without_workers() {
        let service = Arc::new(ScriptedService::new(Duration::from_millis(5)));
        let cards = indexed(vec![
            CardRecord::new("4111", "01", "27", "123", ""),
            CardRecord::new("4111111111111111", "13", "27", "123", ""),
        ]);

        let report = orchestrator(Arc::clone(&service), 1, ShutdownMode::Graceful)
            .run(cards)
            .await;

        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(service.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_graceful_cancel_waits_for_in_flight() {
        let service = Arc::new(ScriptedService::new(Duration::from_millis(100)));
        let orchestrator = orchestrator(service, 1, ShutdownMode::Graceful);
        let token = orchestrator.cancellation_token();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(150)).await;
            token.cancel();
        });

        let cards = indexed((0..5).map(|i| card(&format!("200{}", i))).collect());
        let report = orchestrator.run(cards).await;

        // Card 1 finished at 100ms, card 2 was in flight at 150ms and finishes
        assert!(report.interrupted);
        assert_eq!(report.outcomes.len(), 2);
        assert!(report.outcomes.iter().all(|o| o.card.is_valid()));
        assert_eq!(report.abandoned, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_cancel_aborts_in_flight() {
        let service = Arc::new(ScriptedService::new(Duration::from_millis(100)));
        let orchestrator = orchestrator(Arc::clone(&service), 2, ShutdownMode::Immediate);
        let token = orchestrator.cancellation_token();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            token.cancel();
        });

        let cards = indexed((0..4).map(|i| card(&format!("300{}", i))).collect());
        let report = orchestrator.run(cards).await;

        // Two lookups were in flight at 50ms and never finished
        assert!(report.interrupted);
        assert!(report.outcomes.is_empty());
        assert_eq!(report.abandoned, 4);
        assert_eq!(service.calls.load(Ordering::SeqCst), 2);
    }

    #[rstest]
    #[case::graceful(ShutdownMode::Graceful)]
    #[case::immediate(ShutdownMode::Immediate)]
    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_start_submits_nothing(#[case] shutdown: ShutdownMode) {
        let service = Arc::new(ScriptedService::new(Duration::from_millis(100)));
        let orchestrator = orchestrator(Arc::clone(&service), 4, shutdown);
        orchestrator.cancellation_token().cancel();

        let cards = indexed((0..6).map(|i| card(&format!("400{}", i))).collect());
        let report = orchestrator.run(cards).await;

        assert!(report.interrupted);
        assert!(report.outcomes.is_empty());
        assert_eq!(report.abandoned, 6);
        assert_eq!(service.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abort_cuts_graceful_drain_short() {
        let service = Arc::new(ScriptedService::new(Duration::from_millis(100)));
        let orchestrator = orchestrator(Arc::clone(&service), 2, ShutdownMode::Graceful);
        let cancel = orchestrator.cancellation_token();
        let abort = orchestrator.abort_token();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel.cancel();
            tokio::time::sleep(Duration::from_millis(30)).await;
            abort.cancel();
        });

        let cards = indexed((0..5).map(|i| card(&format!("500{}", i))).collect());
        let report = orchestrator.run(cards).await;

        // The drain started at 50ms was aborted at 80ms, before any lookup ended
        assert!(report.interrupted);
        assert!(report.outcomes.is_empty());
        assert_eq!(report.abandoned, 5);
        assert_eq!(service.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let service = Arc::new(ScriptedService::new(Duration::ZERO));
        let report = orchestrator(service, 4, ShutdownMode::Graceful)
            .run(Vec::new())
            .await;
        assert!(report.outcomes.is_empty());
        assert_eq!(report.abandoned, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_with_reports_progress() {
        let service = Arc::new(ScriptedService::new(Duration::from_millis(5)));
        let cards = indexed(vec![card("1234"), card("5678")]);
        let mut seen = Vec::new();

        let report = orchestrator(service, 2, ShutdownMode::Graceful)
            .run_with(cards, |outcome| seen.push(outcome.row))
            .await;

        assert_eq!(seen.len(), report.outcomes.len());
    }

    #[rstest]
    #[case::custom(4, 4)]
    #[case::zero_falls_back(0, num_cpus::get())]
    fn test_config_workers(#[case] workers: usize, #[case] expected: usize) {
        let config = CheckerConfig::new(workers, ShutdownMode::Graceful);
        assert_eq!(config.workers, expected);
    }
}
