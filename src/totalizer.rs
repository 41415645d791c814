/// Running sum of inter-event durations into absolute instants.
///
/// The result is only non-decreasing when every duration is non-negative.
pub fn totalize(durations: &[i64]) -> Vec<i64> {
    durations
        .iter()
        .scan(0i64, |total, &duration| {
            *total = total.saturating_add(duration);
            Some(*total)
        })
        .collect()
}
