/// Returns the current wall-clock time as Unix epoch seconds.
/// Every outbound envelope carries this in its `timestamp` field.
pub fn timestamp_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
