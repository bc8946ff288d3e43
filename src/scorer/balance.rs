/// Money-balance score of a combination in [0, 100].
///
/// `avgs` are the members' average stake per covered number. The score is
/// `100 * min / max`, and 0 when the largest average is 0 (no stake recorded).
/// Exactly 100 only when every average is identical; near-equal averages
/// whose ratio rounds to 100 are held just below it.
pub fn similarity(avgs: &[f64]) -> f64 {
    let Some(max) = avgs.iter().copied().reduce(f64::max) else {
        return 0.0;
    };
    if max <= 0.0 {
        return 0.0;
    }
    let min = avgs.iter().copied().fold(max, f64::min).max(0.0);
    if min == max {
        return 100.0;
    }

    let below_full = f64::from_bits(100.0f64.to_bits() - 1);
    (100.0 * min / max).clamp(0.0, below_full)
}
