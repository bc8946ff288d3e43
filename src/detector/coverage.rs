use crate::config::NUMBER_DOMAIN;
use crate::scorer::similarity;
use crate::types::{AccountBreakdown, AccountProfile, Combination, NumberSet, SimilarityBand};

/// Retained combinations of one group plus how many subsets were examined.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchOutcome {
    /// 2-account combinations in enumeration order.
    pub pairs: Vec<Combination>,
    /// 3-account combinations in enumeration order.
    pub triples: Vec<Combination>,
    pub pairs_evaluated: usize,
    pub triples_evaluated: usize,
}

/// Enumerate every pair and triple of `profiles` (i < j < k) and keep those
/// whose number sets together cover the whole 1..=49 domain.
///
/// Members may overlap; only the union matters. The search is exhaustive:
/// exactly C(n,2) pairs and C(n,3) triples are evaluated.
pub fn search(profiles: &[AccountProfile]) -> SearchOutcome {
    let n = profiles.len();
    let mut outcome = SearchOutcome::default();

    for i in 0..n {
        for j in (i + 1)..n {
            outcome.pairs_evaluated += 1;
            let union = profiles[i].numbers | profiles[j].numbers;
            if union.is_full() {
                outcome.pairs.push(build_combination(&[&profiles[i], &profiles[j]]));
            }
        }
    }

    for i in 0..n {
        for j in (i + 1)..n {
            let pair_union = profiles[i].numbers | profiles[j].numbers;
            for k in (j + 1)..n {
                outcome.triples_evaluated += 1;
                let union = pair_union | profiles[k].numbers;
                if union.is_full() {
                    outcome
                        .triples
                        .push(build_combination(&[&profiles[i], &profiles[j], &profiles[k]]));
                }
            }
        }
    }

    outcome
}

/// Metrics and per-account breakdown for a covering subset.
pub fn build_combination(members: &[&AccountProfile]) -> Combination {
    let combined_numbers = members
        .iter()
        .fold(NumberSet::EMPTY, |acc, p| acc | p.numbers);
    let account_count = members.len();
    let total_amount: f64 = members.iter().map(|p| p.total_stake).sum();
    let avgs: Vec<f64> = members.iter().map(|p| p.avg_per_number()).collect();
    let similarity = similarity(&avgs);

    let breakdown = members
        .iter()
        .map(|p| AccountBreakdown {
            account_id: p.account_id.clone(),
            number_count: p.numbers.len(),
            bet_count: p.bet_count,
            total_stake: p.total_stake,
            avg_per_bet: p.avg_per_bet(),
            avg_per_number: p.avg_per_number(),
            numbers: p.numbers.format_list(),
        })
        .collect();

    Combination {
        accounts: members.iter().map(|p| p.account_id.clone()).collect(),
        combined_numbers,
        account_count,
        efficiency: NUMBER_DOMAIN as f64 / account_count as f64,
        total_amount,
        avg_amount_per_number: total_amount / NUMBER_DOMAIN as f64,
        similarity,
        band: SimilarityBand::from_similarity(similarity),
        breakdown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(id: &str, numbers: impl IntoIterator<Item = u32>, stake: f64) -> AccountProfile {
        AccountProfile {
            account_id: id.to_string(),
            numbers: numbers.into_iter().collect(),
            total_stake: stake,
            bet_count: 1,
        }
    }

    fn ids(c: &Combination) -> Vec<&str> {
        c.accounts.iter().map(String::as_str).collect()
    }

    #[test]
    fn overlapping_scenario_retains_all_covering_subsets() {
        let profiles = vec![
            profile("A", 1..=30, 300.0),
            profile("B", 25..=49, 250.0),
            profile("C", 1..=49, 600.0),
        ];
        let out = search(&profiles);

        let pairs: Vec<_> = out.pairs.iter().map(ids).collect();
        assert_eq!(pairs, vec![vec!["A", "B"], vec!["A", "C"], vec!["B", "C"]]);
        assert_eq!(out.triples.len(), 1);
        assert_eq!(ids(&out.triples[0]), vec!["A", "B", "C"]);

        let ab = &out.pairs[0];
        assert_eq!(ab.similarity, 100.0);
        assert_eq!(ab.band, SimilarityBand::High);
        assert_eq!(ab.total_amount, 550.0);
        assert_eq!(ab.avg_amount_per_number, 550.0 / 49.0);
        assert_eq!(ab.efficiency, 24.5);
        assert_eq!(ab.breakdown[0].number_count, 30);
        assert_eq!(ab.breakdown[1].avg_per_number, 10.0);
    }

    #[test]
    fn every_retained_combination_covers_domain() {
        let profiles = vec![
            profile("A", 1..=20, 10.0),
            profile("B", 15..=35, 10.0),
            profile("C", 30..=49, 10.0),
            profile("D", (1..=49).filter(|n| n % 2 == 0), 10.0),
            profile("E", (1..=49).filter(|n| n % 2 == 1), 10.0),
        ];
        let out = search(&profiles);
        assert!(!out.pairs.is_empty());
        for c in out.pairs.iter().chain(out.triples.iter()) {
            assert_eq!(c.combined_numbers.len(), 49);
            assert!((1..=49).all(|n| c.combined_numbers.contains(n)));
        }
        assert_eq!(ids(&out.pairs[0]), vec!["D", "E"]);
        assert!(out.triples.iter().any(|c| ids(c) == vec!["A", "B", "C"]));
    }

    #[test]
    fn near_miss_is_not_retained() {
        let profiles = vec![profile("A", 1..=24, 1.0), profile("B", 26..=49, 1.0)];
        let out = search(&profiles);
        assert!(out.pairs.is_empty() && out.triples.is_empty());
        assert_eq!(out.pairs_evaluated, 1);
        assert_eq!(out.triples_evaluated, 0);
    }

    #[test]
    fn search_is_exhaustive() {
        for n in 0..8usize {
            let profiles: Vec<_> = (0..n)
                .map(|i| profile(&format!("acct{i}"), 1..=12, 1.0))
                .collect();
            let out = search(&profiles);
            let pairs = if n >= 2 { n * (n - 1) / 2 } else { 0 };
            let triples = if n >= 3 { n * (n - 1) * (n - 2) / 6 } else { 0 };
            assert_eq!(out.pairs_evaluated, pairs);
            assert_eq!(out.triples_evaluated, triples);
        }
    }

    #[test]
    fn zero_stakes_give_zero_similarity() {
        let profiles = vec![profile("A", 1..=25, 0.0), profile("B", 25..=49, 0.0)];
        let out = search(&profiles);
        assert_eq!(out.pairs.len(), 1);
        assert_eq!(out.pairs[0].similarity, 0.0);
        assert_eq!(out.pairs[0].band, SimilarityBand::Low);
        assert_eq!(out.pairs[0].total_amount, 0.0);
    }
}
