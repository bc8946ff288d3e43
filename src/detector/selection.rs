use std::cmp::Ordering;

use crate::types::Combination;

/// Pool pairs then triples and order them best first:
/// fewer accounts first, then higher similarity. The sort is stable, so
/// remaining ties keep enumeration order.
pub fn rank(pairs: &[Combination], triples: &[Combination]) -> Vec<Combination> {
    let mut pooled: Vec<Combination> = pairs.iter().chain(triples.iter()).cloned().collect();
    pooled.sort_by(compare);
    pooled
}

/// First combination under `rank`'s ordering, without cloning the pool.
pub fn select_best<'a>(pairs: &'a [Combination], triples: &'a [Combination]) -> Option<&'a Combination> {
    // min_by returns the first of equal elements, matching a stable sort.
    pairs.iter().chain(triples.iter()).min_by(|a, b| compare(a, b))
}

fn compare(a: &Combination, b: &Combination) -> Ordering {
    a.account_count
        .cmp(&b.account_count)
        .then_with(|| b.similarity.total_cmp(&a.similarity))
}
