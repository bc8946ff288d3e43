use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::NUMBER_DOMAIN;

// ---------------------------------------------------------------------------
// Input records
// ---------------------------------------------------------------------------

/// One normalised wagering row. Produced upstream, never mutated here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WagerRecord {
    pub account_id: String,
    pub lottery_type: String,
    pub period_id: String,
    #[serde(default)]
    pub bet_category: String,
    #[serde(default)]
    pub content: String,
    /// None when the source sheet had no amount column.
    #[serde(default)]
    pub stake_amount: Option<f64>,
}

/// (period, lottery) pair that scopes every derived structure.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupKey {
    pub period_id: String,
    pub lottery_type: String,
}

impl GroupKey {
    pub fn new(period_id: impl Into<String>, lottery_type: impl Into<String>) -> Self {
        Self {
            period_id: period_id.into(),
            lottery_type: lottery_type.into(),
        }
    }

    /// Surrounding whitespace is not part of the key, matching the lottery allow-list check.
    pub fn of(record: &WagerRecord) -> Self {
        Self::new(record.period_id.trim(), record.lottery_type.trim())
    }
}

impl std::fmt::Display for GroupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.period_id, self.lottery_type)
    }
}

// ---------------------------------------------------------------------------
// NumberSet
// ---------------------------------------------------------------------------

/// Set of special numbers in 1..=49, stored as a bitmask: bit `n` set means `n` is present.
/// Bit 0 and bits above 49 are always clear, so union is a single OR and
/// full coverage is an equality check against `NumberSet::FULL`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "Vec<u32>", from = "Vec<u32>")]
pub struct NumberSet(u64);

impl NumberSet {
    pub const EMPTY: NumberSet = NumberSet(0);
    pub const FULL: NumberSet = NumberSet(((1u64 << NUMBER_DOMAIN) - 1) << 1);

    /// Insert `n`. Out-of-range values are ignored. Returns true if `n` was newly added.
    pub fn insert(&mut self, n: u32) -> bool {
        if !(1..=NUMBER_DOMAIN).contains(&n) {
            return false;
        }
        let bit = 1u64 << n;
        let added = self.0 & bit == 0;
        self.0 |= bit;
        added
    }

    pub fn contains(&self, n: u32) -> bool {
        (1..=NUMBER_DOMAIN).contains(&n) && self.0 & (1u64 << n) != 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn union(self, other: NumberSet) -> NumberSet {
        NumberSet(self.0 | other.0)
    }

    /// True when every number of the domain is present.
    pub fn is_full(&self) -> bool {
        *self == Self::FULL
    }

    /// Ascending iteration.
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        (1..=NUMBER_DOMAIN).filter(move |&n| self.contains(n))
    }

    /// Zero-padded, comma-separated, ascending: "01,07,49".
    pub fn format_list(&self) -> String {
        self.iter()
            .map(|n| format!("{n:02}"))
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl FromIterator<u32> for NumberSet {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        let mut set = NumberSet::EMPTY;
        for n in iter {
            set.insert(n);
        }
        set
    }
}

impl From<Vec<u32>> for NumberSet {
    fn from(v: Vec<u32>) -> Self {
        v.into_iter().collect()
    }
}

impl From<NumberSet> for Vec<u32> {
    fn from(set: NumberSet) -> Self {
        set.iter().collect()
    }
}

impl std::ops::BitOr for NumberSet {
    type Output = NumberSet;

    fn bitor(self, rhs: NumberSet) -> NumberSet {
        self.union(rhs)
    }
}

// ---------------------------------------------------------------------------
// Account profile
// ---------------------------------------------------------------------------

/// Everything one account wagered within a single (period, lottery) group.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountProfile {
    pub account_id: String,
    pub numbers: NumberSet,
    /// 0 when the dataset carries no amounts.
    pub total_stake: f64,
    pub bet_count: usize,
}

impl AccountProfile {
    pub fn avg_per_bet(&self) -> f64 {
        if self.bet_count == 0 {
            return 0.0;
        }
        self.total_stake / self.bet_count as f64
    }

    pub fn avg_per_number(&self) -> f64 {
        if self.numbers.is_empty() {
            return 0.0;
        }
        self.total_stake / self.numbers.len() as f64
    }
}

// ---------------------------------------------------------------------------
// Similarity banding
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SimilarityBand {
    /// >= 90
    High,
    /// 80..90
    MediumHigh,
    /// 70..80
    MediumLow,
    /// < 70
    Low,
}

impl SimilarityBand {
    pub fn from_similarity(similarity: f64) -> Self {
        use crate::config::similarity_bands::*;
        if similarity >= HIGH_MIN {
            SimilarityBand::High
        } else if similarity >= MEDIUM_HIGH_MIN {
            SimilarityBand::MediumHigh
        } else if similarity >= MEDIUM_LOW_MIN {
            SimilarityBand::MediumLow
        } else {
            SimilarityBand::Low
        }
    }
}

impl std::fmt::Display for SimilarityBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SimilarityBand::High => "high",
            SimilarityBand::MediumHigh => "medium-high",
            SimilarityBand::MediumLow => "medium-low",
            SimilarityBand::Low => "low",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Combinations and group results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountBreakdown {
    pub account_id: String,
    pub number_count: usize,
    pub bet_count: usize,
    pub total_stake: f64,
    pub avg_per_bet: f64,
    pub avg_per_number: f64,
    /// See `NumberSet::format_list`.
    pub numbers: String,
}

/// A 2- or 3-account subset whose number sets jointly cover the whole domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Combination {
    /// Member ids in enumeration order.
    pub accounts: Vec<String>,
    pub combined_numbers: NumberSet,
    pub account_count: usize,
    /// Numbers covered per participant.
    pub efficiency: f64,
    pub total_amount: f64,
    pub avg_amount_per_number: f64,
    /// Balance score in [0, 100].
    pub similarity: f64,
    pub band: SimilarityBand,
    pub breakdown: Vec<AccountBreakdown>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupResult {
    pub period_id: String,
    pub lottery_type: String,
    /// Accounts with at least one valid pick, before the activity filter.
    pub total_accounts: usize,
    pub filtered_accounts: usize,
    pub pairs: Vec<Combination>,
    pub triples: Vec<Combination>,
    pub best: Combination,
    /// False when no record in the batch carried a stake amount.
    pub amounts_available: bool,
}

impl GroupResult {
    pub fn key(&self) -> GroupKey {
        GroupKey::new(self.period_id.clone(), self.lottery_type.clone())
    }

    pub fn combination_count(&self) -> usize {
        self.pairs.len() + self.triples.len()
    }
}

// ---------------------------------------------------------------------------
// Per-group outcome and progress
// ---------------------------------------------------------------------------

/// What a single group run ended with. Only `Failed` is an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum GroupOutcome {
    Found { pairs: usize, triples: usize },
    InsufficientCandidates { filtered_accounts: usize },
    NoCoverage { filtered_accounts: usize },
    Failed { reason: String },
}

impl std::fmt::Display for GroupOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GroupOutcome::Found { pairs, triples } => {
                write!(f, "found ({pairs} pairs, {triples} triples)")
            }
            GroupOutcome::InsufficientCandidates { filtered_accounts } => {
                write!(f, "insufficient_candidates ({filtered_accounts} accounts)")
            }
            GroupOutcome::NoCoverage { filtered_accounts } => {
                write!(f, "no_coverage ({filtered_accounts} accounts)")
            }
            GroupOutcome::Failed { reason } => write!(f, "failed: {reason}"),
        }
    }
}

/// Passed to the progress callback after each group completes.
#[derive(Debug, Clone)]
pub struct GroupProgress {
    pub key: GroupKey,
    pub completed: usize,
    pub total: usize,
    pub outcome: GroupOutcome,
    /// Wall time spent aggregating and searching this group.
    pub elapsed: Duration,
}

// ---------------------------------------------------------------------------
// Batch report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    /// Distinct (period, lottery) pairs in the input.
    pub groups_total: usize,
    /// Groups with enough raw records to be analysed.
    pub groups_eligible: usize,
    pub groups_processed: usize,
    /// Groups that produced a GroupResult.
    pub groups_valid: usize,
    pub groups_failed: usize,
    pub insufficient_candidates: usize,
    pub no_coverage: usize,
    /// Records whose content yielded no valid number.
    pub malformed_records: usize,
    pub amounts_available: bool,
    /// Set when the batch stopped early on request.
    pub cancelled: bool,
    /// Sorted by (period, lottery).
    pub results: Vec<GroupResult>,
}
