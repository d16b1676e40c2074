/// Returns the current Unix timestamp in milliseconds.
pub fn current_unix_timestamp_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}

/// Returns the current Unix timestamp in seconds.
pub fn current_unix_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Returns true when at least `cooldown_ms` have passed since `last_unix_ms`,
/// or when no prior timestamp exists.
pub fn cooldown_elapsed(last_unix_ms: Option<u64>, cooldown_ms: u64, now_unix_ms: u64) -> bool {
    match last_unix_ms {
        Some(last) => now_unix_ms.saturating_sub(last) >= cooldown_ms,
        None => true,
    }
}
