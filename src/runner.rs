//! End-to-end balance run: card file in, results file out
//!
//! ```text
//! CardReader ──▶ Orchestrator ──▶ console lines (as cards complete)
//!                    ▲        └──▶ results file (atomic, sorted by row)
//!                    │
//!        Ctrl+C / SIGTERM → cancel token (first signal)
//!                         → abort token (second signal)
//! ```

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::core::{CardService, CheckerConfig, ClientConfig, GiftCardClient, Orchestrator};
use crate::io::{console_header, console_line, write_results_file, CardReader};
use crate::types::CheckerError;

/// Counts describing a finished run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Cards read from the input
    pub total: usize,
    /// Cards with a retrieved balance
    pub succeeded: usize,
    /// Cards that were rejected or whose lookup failed
    pub failed: usize,
    /// Cards never completed because the run was interrupted
    pub abandoned: usize,
    pub interrupted: bool,
}

/// Reads cards, checks them concurrently and writes the results
pub struct BalanceRunner<S: ?Sized> {
    service: Arc<S>,
    config: CheckerConfig,
    cancel: CancellationToken,
    abort: CancellationToken,
}

impl BalanceRunner<GiftCardClient> {
    /// Runner talking to the real card service
    pub fn from_config(
        client_config: ClientConfig,
        config: CheckerConfig,
    ) -> Result<Self, CheckerError> {
        let client = GiftCardClient::new(client_config)?;
        Ok(Self::new(Arc::new(client), config))
    }
}

impl<S> BalanceRunner<S>
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

    /// Token that interrupts the run when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Token that aborts in-flight lookups, even during a graceful drain
    pub fn abort_token(&self) -> CancellationToken {
        self.abort.clone()
    }

    /// Run on a dedicated multi-threaded runtime, interrupted by Ctrl+C or SIGTERM
    ///
    /// The first signal interrupts the run in the configured shutdown mode.
    /// A second signal aborts whatever is still in flight.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The runtime cannot be created
    /// - The input file cannot be opened or read
    /// - The results file cannot be written
    ///
    /// Individual card failures never fail the run; they are reported as
    /// error rows.
    pub fn process(
        &self,
        input_path: &Path,
        output_path: &Path,
        console: &mut dyn Write,
    ) -> Result<RunSummary, CheckerError> {
        // One runtime worker per concurrent lookup
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.config.workers.max(1))
            .enable_all()
            .build()
            .map_err(|e| CheckerError::runtime(format!("failed to create tokio runtime: {}", e)))?;

        runtime.block_on(async {
            let cancel = self.cancellation_token();
            let abort = self.abort_token();
            let signals = tokio::spawn(async move {
                shutdown_signal_handler().await;
                warn!("interrupt received, stopping (interrupt again to abort)");
                cancel.cancel();

                shutdown_signal_handler().await;
                warn!("second interrupt received, aborting in-flight cards");
                abort.cancel();
            });

            let result = self.process_async(input_path, output_path, console).await;
            signals.abort();
            result
        })
    }

    /// Run on the current runtime
    ///
    /// Interruption only happens through [`BalanceRunner::cancellation_token`]
    /// and [`BalanceRunner::abort_token`].
    pub async fn process_async(
        &self,
        input_path: &Path,
        output_path: &Path,
        console: &mut dyn Write,
    ) -> Result<RunSummary, CheckerError> {
        let cards = CardReader::open(input_path).await?.read_all().await?;
        let total = cards.len();
        info!(cards = total, workers = self.config.workers, "starting balance checks");

        let (header, underline) = console_header();
        writeln!(console, "{}", header)?;
        writeln!(console, "{}", underline)?;

        let orchestrator = Orchestrator::new(Arc::clone(&self.service), self.config.clone())
            .with_cancellation(self.cancel.clone())
            .with_abort(self.abort.clone());

        let report = orchestrator
            .run_with(cards, |outcome| {
                if let Err(e) = writeln!(console, "{}", console_line(&outcome.card)) {
                    warn!("failed to print result: {}", e);
                }
            })
            .await;

        write_results_file(output_path, &report.outcomes)?;

        let succeeded = report.outcomes.iter().filter(|o| o.card.is_valid()).count();
        let summary = RunSummary {
            total,
            succeeded,
            failed: report.outcomes.len() - succeeded,
            abandoned: report.abandoned,
            interrupted: report.interrupted,
        };

        if summary.interrupted {
            warn!(
                completed = report.outcomes.len(),
                abandoned = summary.abandoned,
                "run interrupted"
            );
        } else {
            info!(
                succeeded = summary.succeeded,
                failed = summary.failed,
                "run complete"
            );
        }

        Ok(summary)
    }
}

async fn shutdown_signal_handler() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::ShutdownMode;
    use crate::types::ProtocolRequest;
    use async_trait::async_trait;
    use std::io::Write as _;
    use tempfile::NamedTempFile;

    struct FixedService;

    #[async_trait]
    impl CardService for FixedService {
        async fn send(&self, _request: &ProtocolRequest) -> Result<String, CheckerError> {
            Ok(r#"<div class="name">Available Balance</div><div class="value">$5.00</div>
<div class="name">Initial Balance</div><div class="value">$20.00</div>"#
                .to_string())
        }
    }

    /// Helper function to create a temporary CSV file for testing
    fn create_temp_csv(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        file.write_all(content.as_bytes())
            .expect("Failed to write to temp file");
        file.flush().expect("Failed to flush temp file");
        file
    }

    fn runner(workers: usize) -> BalanceRunner<FixedService> {
        BalanceRunner::new(
            Arc::new(FixedService),
            CheckerConfig::new(workers, ShutdownMode::Graceful),
        )
    }

    #[test]
    fn test_process_writes_console_and_file() {
        let input = create_temp_csv(
            "number,month,year,cvv,postal\n4111111111111234,1,27,123,\n4111111111115678,13,27,123,\n",
        );
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("valid_cards.csv");
        let mut console = Vec::new();

        let summary = runner(2)
            .process(input.path(), &output, &mut console)
            .unwrap();

        assert_eq!(
            summary,
            RunSummary {
                total: 2,
                succeeded: 1,
                failed: 1,
                abandoned: 0,
                interrupted: false,
            }
        );

        let console = String::from_utf8(console).unwrap();
        let mut lines = console.lines();
        assert_eq!(lines.next(), Some("Last 4  Available  Initial  Cashback  Override"));
        assert!(lines.next().unwrap().starts_with("====="));
        let rest: Vec<&str> = lines.collect();
        assert_eq!(rest.len(), 2);
        assert!(rest.contains(&"1234  5.00  20.00  0.00  0.00"));
        assert!(rest.contains(&"5678  ERROR: invalid month 13"));

        let written = std::fs::read_to_string(&output).unwrap();
        assert_eq!(
            written,
            "Last 4,Available,Initial,Cashback,Override\n1234,5.00,20.00,0.00,0.00\n5678,ERROR: invalid month 13\n"
        );
    }

    #[test]
    fn test_missing_input_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.csv");

        let result = runner(1).process(&dir.path().join("cards.csv"), &output, &mut Vec::new());

        assert!(matches!(result, Err(CheckerError::FileNotFound { .. })));
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn test_cancelled_run_still_writes_file() {
        let input = create_temp_csv("number,month,year,cvv,postal\n4111111111111234,1,27,123,\n");
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.csv");

        let runner = runner(1);
        runner.cancellation_token().cancel();
        let summary = runner
            .process_async(input.path(), &output, &mut Vec::new())
            .await
            .unwrap();

        assert_eq!(
            summary,
            RunSummary {
                total: 1,
                succeeded: 0,
                failed: 0,
                abandoned: 1,
                interrupted: true,
            }
        );
        let written = std::fs::read_to_string(&output).unwrap();
        assert_eq!(written, "Last 4,Available,Initial,Cashback,Override\n");
    }

    #[tokio::test]
    async fn test_aborted_run_writes_header_only() {
        let input = create_temp_csv(
            "number,month,year,cvv,postal\n4111111111111234,1,27,123,\n4111111111115678,1,27,123,\n",
        );
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.csv");

        let runner = runner(2);
        runner.cancellation_token().cancel();
        runner.abort_token().cancel();
        let mut console = Vec::new();
        let summary = runner
            .process_async(input.path(), &output, &mut console)
            .await
            .unwrap();

        assert!(summary.interrupted);
        assert_eq!(summary.abandoned, 2);
        assert_eq!(String::from_utf8(console).unwrap().lines().count(), 2);
        let written = std::fs::read_to_string(&output).unwrap();
        assert_eq!(written, "Last 4,Available,Initial,Cashback,Override\n");
    }
}
