//! Enhanced logging utilities for formatted output.
//!
//! This module provides consistent, user-friendly logging utilities for counts,
//! operation timing, and the end-of-run duplicate marking summary.

use std::time::{Duration, Instant};

use crate::metrics::DedupMetrics;

/// Formats a count with thousands separators.
///
/// # Examples
///
/// ```
/// use fgdedup_lib::logging::format_count;
///
/// assert_eq!(format_count(1234567), "1,234,567");
/// assert_eq!(format_count(123), "123");
/// ```
#[must_use]
pub fn format_count(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Formats a percentage with specified decimal places.
///
/// # Examples
///
/// ```
/// use fgdedup_lib::logging::format_percent;
///
/// assert_eq!(format_percent(0.9543, 2), "95.43%");
/// assert_eq!(format_percent(1.0, 0), "100%");
/// ```
#[must_use]
pub fn format_percent(value: f64, decimals: usize) -> String {
    format!("{:.decimals$}%", value * 100.0, decimals = decimals)
}

/// Formats a duration in human-readable form (e.g., "2m 15s", "1h 30m", "45s").
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        let mins = secs / 60;
        let remaining_secs = secs % 60;
        if remaining_secs == 0 { format!("{mins}m") } else { format!("{mins}m {remaining_secs}s") }
    } else {
        let hours = secs / 3600;
        let mins = (secs % 3600) / 60;
        if mins == 0 { format!("{hours}h") } else { format!("{hours}h {mins}m") }
    }
}

/// Formats a rate (items per second) with appropriate units.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn format_rate(count: u64, duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs < 0.001 {
        return format!("{} items/s", format_count(count));
    }

    let rate = count as f64 / secs;
    if rate >= 1.0 {
        format!("{} items/s", format_count(rate as u64))
    } else {
        let items_per_min = count as f64 / (secs / 60.0);
        format!("{items_per_min:.1} items/min")
    }
}

/// Logs a formatted summary of duplicate marking metrics.
pub fn log_dedup_summary(metrics: &DedupMetrics) {
    log::info!("Duplicate Marking Summary:");
    log::info!("  Templates: {}", format_count(metrics.total_templates));
    log::info!("  Unique templates: {}", format_count(metrics.unique_templates));
    log::info!("  Primary templates: {}", format_count(metrics.primary_templates));
    log::info!("  Duplicate templates: {}", format_count(metrics.duplicate_templates));

    if metrics.total_templates > 0 {
        log::info!("  Duplicate rate: {}", format_percent(metrics.duplicate_rate(), 2));
    }

    log::info!("  Reads: {}", format_count(metrics.total_reads));
    log::info!("  Duplicate reads: {}", format_count(metrics.duplicate_reads));
    if metrics.supplementary_reads > 0 {
        log::info!("  Supplementary reads: {}", format_count(metrics.supplementary_reads));
    }
    if metrics.unresolved_fragments > 0 {
        log::warn!(
            "  Unresolved fragments marked unique: {}",
            format_count(metrics.unresolved_fragments)
        );
    }
}

/// Operation timing and summary helper.
///
/// # Examples
///
/// ```no_run
/// use fgdedup_lib::logging::OperationTimer;
///
/// let timer = OperationTimer::new("Marking duplicates");
///
/// // ... do work ...
///
/// timer.log_completion(10_000);
/// ```
pub struct OperationTimer {
    operation: String,
    start_time: Instant,
}

impl OperationTimer {
    /// Creates a new operation timer and logs the start.
    #[must_use]
    pub fn new(operation: &str) -> Self {
        log::info!("{operation} ...");
        Self { operation: operation.to_string(), start_time: Instant::now() }
    }

    /// Logs the completion with item count and rate.
    pub fn log_completion(&self, count: u64) {
        let duration = self.start_time.elapsed();
        log::info!(
            "{} completed: {} in {} ({})",
            self.operation,
            format_count(count),
            format_duration(duration),
            format_rate(count, duration)
        );
    }
}
