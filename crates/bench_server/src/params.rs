/// Effective row count for the multi-row workloads.
///
/// Only plain ASCII digits count. Missing, non-numeric, signed, padded and
/// zero inputs all count as 1; anything above `max` is clamped down to it.
pub fn queries_param(raw: Option<&str>, max: usize) -> usize {
    let requested = raw
        .filter(|value| !value.starts_with('+'))
        .and_then(|value| value.parse::<usize>().ok())
        .unwrap_or(0);
    requested.clamp(1, max.max(1))
}
