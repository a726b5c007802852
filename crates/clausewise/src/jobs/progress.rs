/// Percentage of processed units, floored and capped at 100.
///
/// Returns 0 when `total` is 0.
pub fn percent(processed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let pct = (processed.min(total) as u128 * 100) / total as u128;
    pct as u8
}
