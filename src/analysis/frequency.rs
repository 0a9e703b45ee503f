//! Frequency analysis of percentage changes

use super::changes::PriceChange;
use crate::fetcher::retry_formatter::format_timestamp;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Entries shown in the most/least frequent report sections
pub const REPORT_TOP_FREQUENCIES: usize = 50;

/// Entries shown in the largest positive/negative sections
pub const REPORT_TOP_EXTREMES: usize = 10;

/// Report lines echoed to the console
pub const CONSOLE_PREVIEW_LINES: usize = 55;

/// One distinct change value and how often it occurred.
///
/// Serialized as `[value, count]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrequencyEntry(
    /// Change value in percent
    #[serde(with = "rust_decimal::serde::float")]
    pub Decimal,
    /// Occurrences
    pub u64,
);

/// Counts and extremes over a change series
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrequencyAnalysis {
    /// Distinct values by count descending; ties keep first-occurrence order
    pub frequencies: Vec<FrequencyEntry>,
    /// Largest changes, largest first
    pub top_positive: Vec<PriceChange>,
    /// Smallest changes, smallest first
    pub top_negative: Vec<PriceChange>,
    /// Number of changes analyzed
    pub total: usize,
}

impl FrequencyAnalysis {
    /// Count identical values and pick the extremes
    pub fn analyze(changes: &[PriceChange]) -> Self {
        let mut counts: HashMap<Decimal, (u64, usize)> = HashMap::new();
        for (i, change) in changes.iter().enumerate() {
            counts.entry(change.change()).or_insert((0, i)).0 += 1;
        }

        let mut ranked: Vec<(Decimal, u64, usize)> = counts
            .into_iter()
            .map(|(value, (count, first))| (value, count, first))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
        let frequencies = ranked
            .into_iter()
            .map(|(value, count, _)| FrequencyEntry(value, count))
            .collect();

        let mut by_value = changes.to_vec();
        by_value.sort_by(|a, b| a.change().cmp(&b.change()));
        let top_negative = by_value.iter().take(REPORT_TOP_EXTREMES).copied().collect();
        let top_positive = by_value.iter().rev().take(REPORT_TOP_EXTREMES).copied().collect();

        Self {
            frequencies,
            top_positive,
            top_negative,
            total: changes.len(),
        }
    }

    /// Number of distinct values
    pub fn unique(&self) -> usize {
        self.frequencies.len()
    }

    /// Report entries; a section heading carries its own leading blank line.
    pub fn report_lines(&self, symbol: &str, interval: &str) -> Vec<String> {
        let mut report = vec![
            format!("Analysis for {symbol} (interval: {interval})"),
            format!("{:^25} | {:^12}", "Percentage change", "Count"),
            "-".repeat(40),
        ];

        report.push(format!(
            "\nMost frequent changes (top {REPORT_TOP_FREQUENCIES}):"
        ));
        for entry in self.frequencies.iter().take(REPORT_TOP_FREQUENCIES) {
            report.push(frequency_line(entry));
        }

        report.push(format!(
            "\nLeast frequent changes (top {REPORT_TOP_FREQUENCIES}):"
        ));
        let skip = self.frequencies.len().saturating_sub(REPORT_TOP_FREQUENCIES);
        for entry in self.frequencies.iter().skip(skip) {
            report.push(frequency_line(entry));
        }

        report.push("\nLargest positive changes:".to_string());
        for change in &self.top_positive {
            report.push(extreme_line(change));
        }

        report.push("\nLargest negative changes:".to_string());
        for change in &self.top_negative {
            report.push(extreme_line(change));
        }

        report.push("\nSummary:".to_string());
        report.push(format!(
            "Total changes: {}",
            group_thousands(self.total as u64)
        ));
        report.push(format!("Unique values: {}", group_thousands(self.unique() as u64)));
        report
    }
}

fn frequency_line(entry: &FrequencyEntry) -> String {
    format!(
        "{:>24}% | {:>11}",
        format!("{:.10}", entry.0),
        group_thousands(entry.1)
    )
}

fn extreme_line(change: &PriceChange) -> String {
    format!(
        "{} | {:>24}%",
        format_timestamp(change.open_time()),
        format!("{:.10}", change.change())
    )
}

/// `1234567` -> `1,234,567`
pub fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}
