use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::{Config, MIN_ACCOUNT_NUMBERS, MIN_GROUP_RECORDS};
use crate::detector::{aggregate_accounts, filter_active, search, select_best};
use crate::error::Result;
use crate::types::{BatchReport, GroupKey, GroupOutcome, GroupProgress, GroupResult, WagerRecord};

/// Thresholds applied per group.
#[derive(Debug, Clone, Copy)]
pub struct AnalysisParams {
    pub min_group_records: usize,
    pub min_account_numbers: usize,
}

impl Default for AnalysisParams {
    fn default() -> Self {
        Self {
            min_group_records: MIN_GROUP_RECORDS,
            min_account_numbers: MIN_ACCOUNT_NUMBERS,
        }
    }
}

impl From<&Config> for AnalysisParams {
    fn from(cfg: &Config) -> Self {
        Self {
            min_group_records: cfg.min_group_records,
            min_account_numbers: cfg.min_account_numbers,
        }
    }
}

/// Cooperative cancellation, checked between groups only.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Invoked once per finished group, always from the merging side.
pub type ProgressFn = Arc<dyn Fn(&GroupProgress) + Send + Sync>;

/// Everything learned from one group run.
#[derive(Debug, Clone)]
pub struct GroupAnalysis {
    pub key: GroupKey,
    pub outcome: GroupOutcome,
    pub result: Option<GroupResult>,
    pub malformed_records: usize,
    pub pairs_evaluated: usize,
    pub triples_evaluated: usize,
    pub elapsed: Duration,
}

impl GroupAnalysis {
    fn failed(key: &GroupKey, reason: String, elapsed: Duration) -> Self {
        Self {
            key: key.clone(),
            outcome: GroupOutcome::Failed { reason },
            result: None,
            malformed_records: 0,
            pairs_evaluated: 0,
            triples_evaluated: 0,
            elapsed,
        }
    }
}

/// Records bucketed by group, with the groups too small to analyse removed.
struct BatchPlan {
    groups_total: usize,
    eligible: Vec<(GroupKey, Vec<WagerRecord>)>,
    amounts_available: bool,
}

fn plan_batch(records: Vec<WagerRecord>, params: &AnalysisParams) -> BatchPlan {
    let amounts_available = records.iter().any(|r| r.stake_amount.is_some());
    if !amounts_available && !records.is_empty() {
        warn!("No stake amounts in input: amount metrics and similarity will be reported as 0");
    }

    let mut groups: BTreeMap<GroupKey, Vec<WagerRecord>> = BTreeMap::new();
    for record in records {
        groups.entry(GroupKey::of(&record)).or_default().push(record);
    }
    let groups_total = groups.len();

    let eligible: Vec<_> = groups
        .into_iter()
        .filter(|(_, records)| records.len() >= params.min_group_records)
        .collect();

    BatchPlan {
        groups_total,
        eligible,
        amounts_available,
    }
}

/// Aggregate, filter, search and select for a single group. Never panics on
/// bad data: a structural failure becomes `GroupOutcome::Failed`.
pub fn analyze_group(
    key: &GroupKey,
    records: &[WagerRecord],
    params: &AnalysisParams,
    amounts_available: bool,
) -> GroupAnalysis {
    let started = Instant::now();

    let aggregation = match aggregate_accounts(key, records) {
        Ok(a) => a,
        Err(e) => {
            warn!(group = %key, "Group failed: {e}");
            return GroupAnalysis::failed(key, e.to_string(), started.elapsed());
        }
    };

    let total_accounts = aggregation.profiles.len();
    let candidates = filter_active(aggregation.profiles, params.min_account_numbers);
    let filtered_accounts = candidates.len();

    let mut analysis = GroupAnalysis {
        key: key.clone(),
        outcome: GroupOutcome::InsufficientCandidates { filtered_accounts },
        result: None,
        malformed_records: aggregation.malformed_records,
        pairs_evaluated: 0,
        triples_evaluated: 0,
        elapsed: Duration::ZERO,
    };

    if filtered_accounts < 2 {
        debug!(group = %key, total_accounts, filtered_accounts, "insufficient candidates");
        analysis.elapsed = started.elapsed();
        return analysis;
    }

    let found = search(&candidates);
    analysis.pairs_evaluated = found.pairs_evaluated;
    analysis.triples_evaluated = found.triples_evaluated;

    let Some(best) = select_best(&found.pairs, &found.triples).cloned() else {
        debug!(group = %key, filtered_accounts, "no covering combination");
        analysis.outcome = GroupOutcome::NoCoverage { filtered_accounts };
        analysis.elapsed = started.elapsed();
        return analysis;
    };

    debug!(
        group = %key,
        pairs = found.pairs.len(),
        triples = found.triples.len(),
        best_similarity = best.similarity,
        "covering combinations found"
    );

    analysis.outcome = GroupOutcome::Found {
        pairs: found.pairs.len(),
        triples: found.triples.len(),
    };
    analysis.result = Some(GroupResult {
        period_id: key.period_id.clone(),
        lottery_type: key.lottery_type.clone(),
        total_accounts,
        filtered_accounts,
        pairs: found.pairs,
        triples: found.triples,
        best,
        amounts_available,
    });
    analysis.elapsed = started.elapsed();
    analysis
}

/// Run one group's analysis, turning a panic into a failed outcome for that group.
fn contain_panic(key: &GroupKey, analyze: impl FnOnce() -> GroupAnalysis) -> GroupAnalysis {
    let started = Instant::now();
    match std::panic::catch_unwind(AssertUnwindSafe(analyze)) {
        Ok(analysis) => analysis,
        Err(payload) => {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            warn!(group = %key, "Group worker panicked: {reason}");
            GroupAnalysis::failed(key, format!("worker panicked: {reason}"), started.elapsed())
        }
    }
}

impl BatchReport {
    fn absorb(&mut self, analysis: GroupAnalysis) {
        self.groups_processed += 1;
        self.malformed_records += analysis.malformed_records;
        match analysis.outcome {
            GroupOutcome::Found { .. } => self.groups_valid += 1,
            GroupOutcome::InsufficientCandidates { .. } => self.insufficient_candidates += 1,
            GroupOutcome::NoCoverage { .. } => self.no_coverage += 1,
            GroupOutcome::Failed { .. } => self.groups_failed += 1,
        }
        if let Some(result) = analysis.result {
            self.results.push(result);
        }
    }

    fn finish(&mut self) {
        self.results
            .sort_by(|a, b| (&a.period_id, &a.lottery_type).cmp(&(&b.period_id, &b.lottery_type)));
        info!(
            groups_total = self.groups_total,
            eligible = self.groups_eligible,
            processed = self.groups_processed,
            valid = self.groups_valid,
            failed = self.groups_failed,
            cancelled = self.cancelled,
            "Batch complete: {}/{} eligible groups processed, {} with covering combinations",
            self.groups_processed,
            self.groups_eligible,
            self.groups_valid,
        );
    }
}

fn notify(progress: &Option<ProgressFn>, analysis: &GroupAnalysis, completed: usize, total: usize) {
    if let Some(callback) = progress {
        callback(&GroupProgress {
            key: analysis.key.clone(),
            completed,
            total,
            outcome: analysis.outcome.clone(),
            elapsed: analysis.elapsed,
        });
    }
}

/// Process every eligible group on the calling thread.
pub fn run_sequential(
    records: Vec<WagerRecord>,
    params: AnalysisParams,
    cancel: &CancelFlag,
    progress: Option<ProgressFn>,
) -> BatchReport {
    let plan = plan_batch(records, &params);
    let total = plan.eligible.len();
    let mut report = BatchReport {
        groups_total: plan.groups_total,
        groups_eligible: total,
        amounts_available: plan.amounts_available,
        ..BatchReport::default()
    };

    for (completed, (key, group)) in plan.eligible.iter().enumerate() {
        if cancel.is_cancelled() {
            report.cancelled = true;
            break;
        }
        let analysis = contain_panic(key, || analyze_group(key, group, &params, plan.amounts_available));
        notify(&progress, &analysis, completed + 1, total);
        report.absorb(analysis);
    }

    report.finish();
    report
}

/// Process eligible groups on blocking workers, at most `workers` at a time.
/// Cancellation stops new groups from starting; running groups finish.
pub async fn run_parallel(
    records: Vec<WagerRecord>,
    params: AnalysisParams,
    workers: usize,
    cancel: CancelFlag,
    progress: Option<ProgressFn>,
) -> Result<BatchReport> {
    let plan = plan_batch(records, &params);
    let total = plan.eligible.len();
    let amounts_available = plan.amounts_available;
    let workers = workers.max(1);
    let mut report = BatchReport {
        groups_total: plan.groups_total,
        groups_eligible: total,
        amounts_available,
        ..BatchReport::default()
    };

    info!("Analysing {total} eligible groups ({} total) with {workers} workers", plan.groups_total);

    let mut pending = plan.eligible.into_iter();
    let mut tasks: JoinSet<GroupAnalysis> = JoinSet::new();
    let mut completed = 0;

    loop {
        while tasks.len() < workers && pending.len() > 0 {
            if cancel.is_cancelled() {
                if !report.cancelled {
                    warn!("Cancellation requested: {} groups not started", pending.len());
                }
                report.cancelled = true;
                break;
            }
            let Some((key, group)) = pending.next() else {
                break;
            };
            tasks.spawn_blocking(move || {
                contain_panic(&key, || analyze_group(&key, &group, &params, amounts_available))
            });
        }

        let Some(joined) = tasks.join_next().await else {
            break;
        };
        completed += 1;
        let analysis = match joined {
            Ok(analysis) => analysis,
            Err(e) => {
                // Panics are contained inside the worker; this is an aborted task.
                warn!("Group worker did not finish: {e}");
                report.groups_processed += 1;
                report.groups_failed += 1;
                continue;
            }
        };
        notify(&progress, &analysis, completed, total);
        report.absorb(analysis);
    }

    report.finish();
    Ok(report)
}
