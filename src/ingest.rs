use std::path::Path;

use tracing::{debug, info};

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::types::WagerRecord;

/// Which rows belong to the special-number analysis.
#[derive(Debug, Clone)]
pub struct RecordFilter {
    /// Substring that marks a special-number bet category.
    pub special_category: String,
    /// Accepted lottery products. Empty accepts all.
    pub lottery_allow_list: Vec<String>,
}

impl From<&Config> for RecordFilter {
    fn from(cfg: &Config) -> Self {
        Self {
            special_category: cfg.special_category.clone(),
            lottery_allow_list: cfg.lottery_allow_list.clone(),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct IngestStats {
    pub total: usize,
    pub rejected_category: usize,
    pub rejected_lottery: usize,
    pub accepted: usize,
    pub with_amount: usize,
}

enum Rejection {
    Category,
    Lottery,
}

/// Read records from a JSON array or a JSON Lines file.
pub fn load_records(path: impl AsRef<Path>) -> Result<Vec<WagerRecord>> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    let records = parse_records(&text)?;
    info!("Loaded {} records from {}", records.len(), path.display());
    Ok(records)
}

/// Parse either a JSON array of records or one record per line.
pub fn parse_records(text: &str) -> Result<Vec<WagerRecord>> {
    let trimmed = text.trim_start();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    if trimmed.starts_with('[') {
        return Ok(serde_json::from_str(trimmed)?);
    }

    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str::<WagerRecord>(line)
                .map_err(|e| AppError::Input(format!("line {}: {e}", i + 1)))
        })
        .collect()
}

/// Keep special-number bets on allowed lotteries, counting every rejection.
pub fn filter_records(records: Vec<WagerRecord>, filter: &RecordFilter) -> (Vec<WagerRecord>, IngestStats) {
    let mut stats = IngestStats {
        total: records.len(),
        ..IngestStats::default()
    };

    let accepted: Vec<WagerRecord> = records
        .into_iter()
        .filter(|record| match check(record, filter) {
            Ok(()) => true,
            Err(Rejection::Category) => {
                stats.rejected_category += 1;
                false
            }
            Err(Rejection::Lottery) => {
                stats.rejected_lottery += 1;
                debug!(lottery = %record.lottery_type, "[INGEST] lottery not in allow-list");
                false
            }
        })
        .collect();

    stats.accepted = accepted.len();
    stats.with_amount = accepted.iter().filter(|r| r.stake_amount.is_some()).count();

    info!(
        "[INGEST] accepted {}/{} records | rejected: category={} lottery={} | with_amount={}",
        stats.accepted, stats.total, stats.rejected_category, stats.rejected_lottery, stats.with_amount,
    );

    (accepted, stats)
}

fn check(record: &WagerRecord, filter: &RecordFilter) -> std::result::Result<(), Rejection> {
    if !record.bet_category.contains(filter.special_category.as_str()) {
        return Err(Rejection::Category);
    }
    if !filter.lottery_allow_list.is_empty()
        && !filter
            .lottery_allow_list
            .iter()
            .any(|l| l == record.lottery_type.trim())
    {
        return Err(Rejection::Lottery);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> RecordFilter {
        RecordFilter {
            special_category: "特码".to_string(),
            lottery_allow_list: vec!["香港六合彩".to_string()],
        }
    }

    fn record(category: &str, lottery: &str) -> WagerRecord {
        WagerRecord {
            account_id: "a".to_string(),
            lottery_type: lottery.to_string(),
            period_id: "1".to_string(),
            bet_category: category.to_string(),
            content: "1".to_string(),
            stake_amount: None,
        }
    }

    #[test]
    fn parses_json_array() {
        let text = r#"[{"account_id":"a","lottery_type":"L","period_id":"1","content":"1,2","stake_amount":5.0}]"#;
        let records = parse_records(text).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].stake_amount, Some(5.0));
        assert_eq!(records[0].bet_category, "");
    }

    #[test]
    fn parses_json_lines() {
        let text = "{\"account_id\":\"a\",\"lottery_type\":\"L\",\"period_id\":\"1\"}\n\n{\"account_id\":\"b\",\"lottery_type\":\"L\",\"period_id\":\"2\",\"stake_amount\":null}\n";
        let records = parse_records(text).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].account_id, "b");
        assert!(records[1].stake_amount.is_none());
    }

    #[test]
    fn bad_line_reports_line_number() {
        let text = "{\"account_id\":\"a\",\"lottery_type\":\"L\",\"period_id\":\"1\"}\nnot json\n";
        let err = parse_records(text).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn empty_input_is_empty() {
        assert!(parse_records("  \n").unwrap().is_empty());
    }

    #[test]
    fn filter_counts_rejections() {
        let records = vec![
            record("特码直选", "香港六合彩"),
            record("平码", "香港六合彩"),
            record("特码", "其他彩种"),
        ];
        let (kept, stats) = filter_records(records, &filter());
        assert_eq!(kept.len(), 1);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.rejected_category, 1);
        assert_eq!(stats.rejected_lottery, 1);
        assert_eq!(stats.accepted, 1);
        assert_eq!(stats.with_amount, 0);
    }

    #[test]
    fn empty_allow_list_accepts_any_lottery() {
        let open = RecordFilter {
            lottery_allow_list: Vec::new(),
            ..filter()
        };
        let (kept, _) = filter_records(vec![record("特码", "任意彩种")], &open);
        assert_eq!(kept.len(), 1);
    }
}
