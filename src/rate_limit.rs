// Detection cadence for continuous streams

/// True when at least `min_interval_ms` has passed since the last detection.
///
/// `last_processed_at` of `None` means nothing has run yet for this source.
pub fn should_process(now: i64, last_processed_at: Option<i64>, min_interval_ms: i64) -> bool {
    match last_processed_at {
        None => true,
        Some(last) => now.saturating_sub(last) >= min_interval_ms,
    }
}
