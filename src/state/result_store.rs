use std::sync::{Arc, RwLock};

use dashmap::DashMap;
use serde::Serialize;

use crate::types::{BatchReport, GroupKey, GroupResult, SimilarityBand};

/// Batch counters without the result payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchSummary {
    pub groups_total: usize,
    pub groups_eligible: usize,
    pub groups_processed: usize,
    pub groups_valid: usize,
    pub groups_failed: usize,
    pub insufficient_candidates: usize,
    pub no_coverage: usize,
    pub malformed_records: usize,
    pub amounts_available: bool,
    pub cancelled: bool,
}

impl From<&BatchReport> for BatchSummary {
    fn from(r: &BatchReport) -> Self {
        Self {
            groups_total: r.groups_total,
            groups_eligible: r.groups_eligible,
            groups_processed: r.groups_processed,
            groups_valid: r.groups_valid,
            groups_failed: r.groups_failed,
            insufficient_candidates: r.insufficient_candidates,
            no_coverage: r.no_coverage,
            malformed_records: r.malformed_records,
            amounts_available: r.amounts_available,
            cancelled: r.cancelled,
        }
    }
}

/// One line per group for listings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSummary {
    pub period_id: String,
    pub lottery_type: String,
    pub total_accounts: usize,
    pub filtered_accounts: usize,
    pub pairs: usize,
    pub triples: usize,
    pub best_accounts: Vec<String>,
    pub best_similarity: f64,
    pub best_band: SimilarityBand,
}

impl From<&GroupResult> for GroupSummary {
    fn from(r: &GroupResult) -> Self {
        Self {
            period_id: r.period_id.clone(),
            lottery_type: r.lottery_type.clone(),
            total_accounts: r.total_accounts,
            filtered_accounts: r.filtered_accounts,
            pairs: r.pairs.len(),
            triples: r.triples.len(),
            best_accounts: r.best.accounts.clone(),
            best_similarity: r.best.similarity,
            best_band: r.best.band,
        }
    }
}

/// Latest batch results keyed by (period, lottery).
pub struct ResultStore {
    groups: DashMap<GroupKey, GroupResult>,
    summary: RwLock<Option<BatchSummary>>,
}

impl ResultStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            groups: DashMap::new(),
            summary: RwLock::new(None),
        })
    }

    /// Swap in a finished batch; results from earlier batches are dropped.
    pub fn replace(&self, report: &BatchReport) {
        self.groups.clear();
        for result in &report.results {
            self.groups.insert(result.key(), result.clone());
        }
        if let Ok(mut summary) = self.summary.write() {
            *summary = Some(BatchSummary::from(report));
        }
    }

    pub fn get(&self, key: &GroupKey) -> Option<GroupResult> {
        self.groups.get(key).map(|r| r.value().clone())
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Group summaries sorted by (period, lottery).
    pub fn summaries(&self) -> Vec<GroupSummary> {
        let mut out: Vec<GroupSummary> = self
            .groups
            .iter()
            .map(|entry| GroupSummary::from(entry.value()))
            .collect();
        out.sort_by(|a, b| (&a.period_id, &a.lottery_type).cmp(&(&b.period_id, &b.lottery_type)));
        out
    }

    pub fn summary(&self) -> Option<BatchSummary> {
        self.summary.read().ok().and_then(|s| s.clone())
    }
}
