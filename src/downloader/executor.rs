//! Backfill driver
//!
//! Single sequential loop over windows:
//! - error: cool down, then retry the same window (`WaitingAfterError`)
//! - empty: skip past the window, abort once too many come in a row
//! - data: append, advance the cursor, checkpoint periodically, pause
//!
//! The buffer is written once more when the loop ends, however it ends. A
//! shutdown request ends the run as `Done` with an incomplete status.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn, Instrument};

use crate::downloader::config::{BackfillConfig, PermanentErrorPolicy};
use crate::downloader::job::{
    BackfillJob, BackfillReport, BackfillState, CompletionStatus, DriverState,
};
use crate::downloader::progress::ProgressState;
use crate::downloader::DownloadError;
use crate::fetcher::retry_formatter::format_timestamp;
use crate::fetcher::KlineSource;
use crate::metrics::{self, BackfillMetrics};
use crate::output::{CheckpointSink, OutputResult};
use crate::shutdown::SharedShutdown;
use crate::{Candle, FetchWindow};

/// Drives one symbol/interval from its start time to its end time
pub struct BackfillDriver {
    source: Arc<dyn KlineSource>,
    sink: Box<dyn CheckpointSink>,
    config: BackfillConfig,
    shutdown: Option<SharedShutdown>,
}

impl BackfillDriver {
    /// Create a driver reading from `source` and checkpointing into `sink`
    pub fn new(
        source: Arc<dyn KlineSource>,
        sink: Box<dyn CheckpointSink>,
        config: BackfillConfig,
    ) -> Self {
        Self {
            source,
            sink,
            config,
            shutdown: None,
        }
    }

    /// Attach a shared shutdown handle for graceful cancellation.
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Run `job` to completion, abort or cancellation.
    ///
    /// Fetch failures are handled inside the loop; the only errors returned are
    /// an invalid job and a failed final checkpoint.
    pub async fn run(&mut self, job: BackfillJob) -> Result<BackfillReport, DownloadError> {
        let span = tracing::info_span!(
            "backfill",
            symbol = %job.symbol,
            interval = %job.interval
        );
        self.execute(job).instrument(span).await
    }

    async fn execute(&mut self, job: BackfillJob) -> Result<BackfillReport, DownloadError> {
        job.validate().map_err(DownloadError::ValidationError)?;

        let BackfillJob {
            symbol,
            interval,
            start_time,
            end_time,
            existing,
        } = job;
        let interval_ms = interval.to_milliseconds();
        let end_time = end_time.unwrap_or_else(|| Utc::now().timestamp_millis());
        let run_metrics = BackfillMetrics::start(symbol.as_str(), interval.as_str());

        info!(
            start = %format_timestamp(start_time),
            end = %format_timestamp(end_time),
            "Starting backfill"
        );

        let mut cursor = start_time;
        if let Some(last) = existing.last() {
            let resume_at = last.open_time + interval_ms;
            if resume_at > cursor {
                info!(
                    records = existing.len(),
                    resume_at = %format_timestamp(resume_at),
                    "Resuming after existing series"
                );
                cursor = resume_at;
            }
        }
        // Nothing left to fetch means nothing to probe either
        if self.config.probe_first_trade && cursor < end_time && !self.shutdown_requested() {
            if let Some(first) = self.source.first_open_time(&symbol, interval).await {
                if first > cursor {
                    info!(
                        requested = %format_timestamp(cursor),
                        first_trade = %format_timestamp(first),
                        "Moving start to first trading timestamp"
                    );
                }
                cursor = cursor.max(first);
            }
        }

        let mut state = BackfillState::new(cursor, existing);
        let mut progress = ProgressState::new((cursor, end_time), state.buffer.len());
        let mut driver_state = DriverState::Running;
        let mut cancelled = false;
        let source = Arc::clone(&self.source);
        let limit = source.limit();

        while state.cursor < end_time {
            if self.shutdown_requested() {
                info!("Shutdown requested - saving progress before exiting");
                cancelled = true;
                driver_state = DriverState::Done;
                break;
            }

            let window = FetchWindow::next(state.cursor, limit, interval_ms, end_time);
            debug!(
                from = %format_timestamp(window.start_time),
                to = %format_timestamp(window.end_time),
                "Fetching window"
            );

            match source.fetch_range(&symbol, interval, window).await {
                Err(e) => {
                    state.window_failures += 1;
                    error!(
                        start_time = window.start_time,
                        end_time = window.end_time,
                        failures = state.window_failures,
                        error = %e,
                        "Failed to get data for range"
                    );

                    if e.is_permanent()
                        && self.config.permanent_error_policy == PermanentErrorPolicy::Abort
                    {
                        error!("Non-retryable error, aborting run");
                        driver_state = DriverState::Aborted;
                        break;
                    }
                    if let Some(max) = self.config.max_window_failures {
                        if state.window_failures >= max {
                            error!(max_window_failures = max, "Window failed too often, aborting run");
                            driver_state = DriverState::Aborted;
                            break;
                        }
                    }

                    driver_state = DriverState::WaitingAfterError;
                    info!(
                        state = ?driver_state,
                        cooldown_secs = self.config.error_cooldown.as_secs_f64(),
                        "Waiting before continuing"
                    );
                    if !self.pause(self.config.error_cooldown).await {
                        info!("Shutdown requested during cooldown");
                        cancelled = true;
                        driver_state = DriverState::Done;
                        break;
                    }
                    driver_state = DriverState::Running;
                }
                Ok(batch) if batch.is_empty() => {
                    state.window_failures = 0;
                    state.consecutive_empty += 1;
                    metrics::record_empty_window();
                    info!(
                        consecutive_empty = state.consecutive_empty,
                        "No data returned, moving to next time range"
                    );
                    state.cursor = window.end_time + 1;

                    if state.consecutive_empty > self.config.max_empty_windows {
                        warn!(
                            max_empty_windows = self.config.max_empty_windows,
                            "Too many consecutive empty windows, aborting run"
                        );
                        driver_state = DriverState::Aborted;
                        break;
                    }
                }
                Ok(batch) => {
                    state.window_failures = 0;
                    state.consecutive_empty = 0;
                    let received = batch.len();
                    let appended = state.append(batch, interval_ms);
                    state.advance(interval_ms, window.end_time);
                    state.request_count += 1;
                    debug!(received, appended, cursor = state.cursor, "Window processed");

                    let every = self.config.checkpoint_every;
                    if every > 0 && state.request_count % every == 0 {
                        match self.checkpoint(&state.buffer) {
                            Ok(()) => {
                                progress.update(&state.buffer, state.request_count);
                                info!("{}", progress.format_progress());
                            }
                            Err(e) => warn!(error = %e, "Failed to save progress"),
                        }
                    }

                    if state.cursor < end_time && !self.pause(self.config.request_delay).await {
                        info!("Shutdown requested - saving progress before exiting");
                        cancelled = true;
                        driver_state = DriverState::Done;
                        break;
                    }
                }
            }
        }

        if driver_state != DriverState::Aborted {
            driver_state = DriverState::Done;
        }
        let status = if state.cursor >= end_time {
            CompletionStatus::Completed
        } else {
            CompletionStatus::Incomplete
        };

        if let Err(e) = self.checkpoint(&state.buffer) {
            error!(error = %e, "Final save failed");
            run_metrics.record_finished("failed", state.buffer.len());
            return Err(e.into());
        }

        let first_open_time = state.buffer.first().map(|c| c.open_time);
        let last_open_time = state.buffer.last().map(|c| c.open_time);
        info!(records = state.buffer.len(), "Final save");
        match status {
            CompletionStatus::Completed => info!("Download completed successfully"),
            CompletionStatus::Incomplete => warn!(
                cursor = %format_timestamp(state.cursor),
                last_record = ?last_open_time.map(format_timestamp),
                "Download incomplete"
            ),
        }
        info!(total_requests = state.request_count, "Total requests made");
        info!(output = %self.sink.destination().display(), "Data saved");

        run_metrics.record_finished(&status.to_string(), state.buffer.len());

        Ok(BackfillReport {
            state: driver_state,
            status,
            cancelled,
            cursor: state.cursor,
            end_time,
            total_requests: state.request_count,
            records: state.buffer.len(),
            first_open_time,
            last_open_time,
        })
    }

    fn checkpoint(&mut self, buffer: &[Candle]) -> OutputResult<()> {
        self.sink.write_checkpoint(buffer)?;
        metrics::record_checkpoint(buffer.len());
        Ok(())
    }

    /// Sleep unless shutdown is requested first; `false` means stop.
    async fn pause(&self, duration: Duration) -> bool {
        match &self.shutdown {
            Some(shutdown) => shutdown.sleep_or_shutdown(duration).await,
            None => {
                tokio::time::sleep(duration).await;
                true
            }
        }
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown
            .as_ref()
            .map(|s| s.is_shutdown_requested())
            .unwrap_or(false)
    }
}
