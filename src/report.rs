use std::path::Path;

use tracing::{debug, info, warn};

use crate::detector::rank;
use crate::error::Result;
use crate::types::{BatchReport, Combination, GroupResult};

/// Log the batch counters and the best combination of every valid group.
pub fn log_report(report: &BatchReport) {
    info!(
        event = "BATCH_SUMMARY",
        groups_total = report.groups_total,
        eligible = report.groups_eligible,
        processed = report.groups_processed,
        valid = report.groups_valid,
        "BATCH | groups: {} | eligible: {} | processed: {} | valid: {} | insufficient: {} | no_coverage: {} | failed: {} | malformed records: {}",
        report.groups_total,
        report.groups_eligible,
        report.groups_processed,
        report.groups_valid,
        report.insufficient_candidates,
        report.no_coverage,
        report.groups_failed,
        report.malformed_records,
    );
    if !report.amounts_available {
        warn!("Amount unavailable: stake metrics below are reported as 0");
    }
    if report.cancelled {
        warn!("Batch was cancelled before every eligible group was processed");
    }

    for result in &report.results {
        log_group(result);
    }
}

fn log_group(result: &GroupResult) {
    let best = &result.best;
    info!(
        event = "COVERAGE_FOUND",
        period = %result.period_id,
        lottery = %result.lottery_type,
        accounts = result.total_accounts,
        filtered = result.filtered_accounts,
        pairs = result.pairs.len(),
        triples = result.triples.len(),
        combinations = result.combination_count(),
        similarity = best.similarity,
        band = %best.band,
        "COVERAGE | {} {} | accounts: {} -> {} | pairs: {} triples: {} | best: {} | similarity: {:.1}% ({})",
        result.period_id,
        result.lottery_type,
        result.total_accounts,
        result.filtered_accounts,
        result.pairs.len(),
        result.triples.len(),
        best.accounts.join(" + "),
        best.similarity,
        best.band,
    );
    log_breakdown(best);

    for (i, c) in rank(&result.pairs, &result.triples).iter().enumerate().skip(1) {
        debug!(
            "         #{} {} | similarity: {:.1}% ({})",
            i + 1,
            c.accounts.join(" + "),
            c.similarity,
            c.band,
        );
    }
}

fn log_breakdown(combination: &Combination) {
    info!(
        "         total: {:.2} | per number: {:.2} | efficiency: {:.1} numbers/account",
        combination.total_amount, combination.avg_amount_per_number, combination.efficiency,
    );
    for member in &combination.breakdown {
        info!(
            "         {} | {} numbers | {} bets | stake {:.2} | {:.2}/bet | {:.2}/number | {}",
            member.account_id,
            member.number_count,
            member.bet_count,
            member.total_stake,
            member.avg_per_bet,
            member.avg_per_number,
            member.numbers,
        );
    }
}

/// Write the full report as pretty JSON.
pub fn write_report(report: &BatchReport, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json)?;
    info!("Report written to {}", path.display());
    Ok(())
}
