use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::health::ProgressState;
use crate::api::latency::{LatencySnapshot, SearchLatency};
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::ingest::{filter_records, RecordFilter};
use crate::orchestrator::{run_parallel, run_sequential, AnalysisParams, CancelFlag, ProgressFn};
use crate::state::{BatchSummary, GroupSummary, ResultStore};
use crate::types::{BatchReport, GroupKey, GroupProgress, GroupResult, WagerRecord};

/// Shared by the CLI batch and the HTTP handlers.
#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<ResultStore>,
    pub progress: Arc<ProgressState>,
    pub latency: Arc<SearchLatency>,
    pub filter: RecordFilter,
    pub params: AnalysisParams,
    pub workers: usize,
    pub cancel: CancelFlag,
}

impl ApiState {
    pub fn new(cfg: &Config, cancel: CancelFlag) -> Self {
        Self {
            store: ResultStore::new(),
            progress: Arc::new(ProgressState::new()),
            latency: Arc::new(SearchLatency::new()),
            filter: RecordFilter::from(cfg),
            params: AnalysisParams::from(cfg),
            workers: cfg.workers,
            cancel,
        }
    }

    /// Filter, analyse and publish one batch. Only one batch runs at a time.
    pub async fn run_batch(&self, records: Vec<WagerRecord>) -> Result<BatchReport> {
        let _batch = self.progress.start_batch().ok_or(AppError::Busy)?;
        let (records, _) = filter_records(records, &self.filter);
        self.latency.reset();

        let progress = Arc::clone(&self.progress);
        let latency = Arc::clone(&self.latency);
        let callback: ProgressFn = Arc::new(move |p: &GroupProgress| {
            progress.record(p);
            latency.record(p.elapsed);
            debug!(
                group = %p.key,
                completed = p.completed,
                total = p.total,
                elapsed_us = p.elapsed.as_micros() as u64,
                "[GROUP] {}",
                p.outcome,
            );
        });

        let outcome = if self.workers <= 1 {
            let params = self.params;
            let cancel = self.cancel.clone();
            tokio::task::spawn_blocking(move || run_sequential(records, params, &cancel, Some(callback)))
                .await
                .map_err(AppError::from)
        } else {
            run_parallel(
                records,
                self.params,
                self.workers,
                self.cancel.clone(),
                Some(callback),
            )
            .await
        };

        let report = outcome?;
        self.store.replace(&report);
        Ok(report)
    }
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(get_health))
        .route("/groups", get(get_groups))
        .route("/groups/:period/:lottery", get(get_group))
        .route("/analyze", post(post_analyze))
        .route("/stats/summary", get(get_stats_summary))
        .route("/stats/latency", get(get_stats_latency))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Query params and responses
// ---------------------------------------------------------------------------

#[derive(Deserialize, Default)]
pub struct GroupsQuery {
    pub lottery: Option<String>,
    pub min_similarity: Option<f64>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub running: bool,
    pub groups_completed: u64,
    pub groups_total: u64,
    pub batches_finished: u64,
    pub groups_stored: usize,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn get_health(State(state): State<ApiState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        running: state.progress.running(),
        groups_completed: state.progress.groups_completed(),
        groups_total: state.progress.groups_total(),
        batches_finished: state.progress.batches_finished(),
        groups_stored: state.store.group_count(),
    })
}

async fn get_groups(
    State(state): State<ApiState>,
    Query(params): Query<GroupsQuery>,
) -> Json<Vec<GroupSummary>> {
    let min_similarity = params.min_similarity.unwrap_or(0.0);
    let groups = state
        .store
        .summaries()
        .into_iter()
        .filter(|g| params.lottery.as_ref().map_or(true, |l| &g.lottery_type == l))
        .filter(|g| g.best_similarity >= min_similarity)
        .collect();
    Json(groups)
}

async fn get_group(
    State(state): State<ApiState>,
    Path((period, lottery)): Path<(String, String)>,
) -> std::result::Result<Json<GroupResult>, AppError> {
    let key = GroupKey::new(period, lottery);
    state
        .store
        .get(&key)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("group {key}")))
}

async fn post_analyze(
    State(state): State<ApiState>,
    Json(records): Json<Vec<WagerRecord>>,
) -> std::result::Result<Json<BatchReport>, AppError> {
    let report = state.run_batch(records).await?;
    Ok(Json(report))
}

async fn get_stats_summary(
    State(state): State<ApiState>,
) -> std::result::Result<Json<BatchSummary>, AppError> {
    state
        .store
        .summary()
        .map(Json)
        .ok_or_else(|| AppError::NotFound("no batch has been analysed yet".to_string()))
}

async fn get_stats_latency(State(state): State<ApiState>) -> Json<LatencySnapshot> {
    Json(state.latency.snapshot())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> ApiState {
        ApiState {
            store: ResultStore::new(),
            progress: Arc::new(ProgressState::new()),
            latency: Arc::new(SearchLatency::new()),
            filter: RecordFilter {
                special_category: "特码".to_string(),
                lottery_allow_list: Vec::new(),
            },
            params: AnalysisParams::default(),
            workers: 2,
            cancel: CancelFlag::new(),
        }
    }

    fn record(period: &str, account: &str, content: String, amount: f64) -> WagerRecord {
        WagerRecord {
            account_id: account.to_string(),
            lottery_type: "香港六合彩".to_string(),
            period_id: period.to_string(),
            bet_category: "特码".to_string(),
            content,
            stake_amount: Some(amount),
        }
    }

    fn joined(lo: u32, hi: u32) -> String {
        (lo..=hi).map(|n| n.to_string()).collect::<Vec<_>>().join(" ")
    }

    /// Two accounts that split 1..49 evenly at 10 per number, padded to 10 records.
    fn covering_batch(period: &str) -> Vec<WagerRecord> {
        let mut records = Vec::new();
        for i in 0..5u32 {
            let lo = i * 5 + 1;
            records.push(record(period, "east", joined(lo, lo + 4), 50.0));
        }
        for i in 0..4u32 {
            let lo = 26 + i * 6;
            records.push(record(period, "west", joined(lo, lo + 5), 60.0));
        }
        records.push(record(period, "west", "特码 平码".to_string(), 0.0));
        records
    }

    #[tokio::test]
    async fn analyze_then_query_group() {
        let state = state();
        let Json(report) = post_analyze(State(state.clone()), Json(covering_batch("2024050")))
            .await
            .unwrap();
        assert_eq!(report.groups_valid, 1);
        assert_eq!(report.malformed_records, 1);

        let Json(group) = get_group(
            State(state.clone()),
            Path(("2024050".to_string(), "香港六合彩".to_string())),
        )
        .await
        .unwrap();
        assert_eq!(group.best.accounts, vec!["east", "west"]);
        assert_eq!(group.best.similarity, 100.0);

        let Json(health) = get_health(State(state.clone())).await;
        assert!(!health.running);
        assert_eq!(health.groups_completed, 1);
        assert_eq!(health.groups_stored, 1);

        let Json(latency) = get_stats_latency(State(state)).await;
        assert_eq!(latency.samples, 1);
    }

    #[tokio::test]
    async fn unknown_group_is_not_found() {
        let err = get_group(State(state()), Path(("x".to_string(), "y".to_string())))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn summary_missing_before_first_batch() {
        assert!(get_stats_summary(State(state())).await.is_err());
    }

    #[tokio::test]
    async fn groups_filter_by_similarity_and_lottery() {
        let state = state();
        state.run_batch(covering_batch("1")).await.unwrap();

        let Json(all) = get_groups(State(state.clone()), Query(GroupsQuery::default())).await;
        assert_eq!(all.len(), 1);

        let strict = GroupsQuery {
            lottery: None,
            min_similarity: Some(100.1),
        };
        let Json(none) = get_groups(State(state.clone()), Query(strict)).await;
        assert!(none.is_empty());

        let other = GroupsQuery {
            lottery: Some("澳门六合彩".to_string()),
            min_similarity: None,
        };
        let Json(none) = get_groups(State(state), Query(other)).await;
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn single_worker_runs_sequentially() {
        let state = ApiState {
            workers: 1,
            ..state()
        };
        let mut records = covering_batch("1");
        records.extend(covering_batch("2"));
        let report = state.run_batch(records).await.unwrap();
        assert_eq!(report.groups_valid, 2);
        assert_eq!(state.progress.groups_completed(), 2);
    }

    #[tokio::test]
    async fn abandoned_batch_releases_running_flag() {
        let state = state();
        let mut records = Vec::new();
        for period in 0..20 {
            records.extend(covering_batch(&period.to_string()));
        }
        // A client disconnect drops the handler future at its next await point.
        let _ = tokio::time::timeout(std::time::Duration::ZERO, state.run_batch(records)).await;
        assert!(!state.progress.running());

        let report = state.run_batch(covering_batch("next")).await.unwrap();
        assert_eq!(report.groups_valid, 1);
    }

    #[tokio::test]
    async fn concurrent_batch_is_rejected() {
        let state = state();
        let _held = state.progress.start_batch().unwrap();
        let err = state.run_batch(covering_batch("1")).await.unwrap_err();
        assert!(matches!(err, AppError::Busy));
    }
}
