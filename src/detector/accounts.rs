use std::collections::BTreeMap;
use tracing::trace;

use crate::detector::numbers::extract_numbers;
use crate::error::{AppError, Result};
use crate::types::{AccountProfile, GroupKey, NumberSet, WagerRecord};

/// Output of folding one group's records into per-account profiles.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation {
    /// Sorted by account id, so enumeration order does not depend on record order.
    pub profiles: Vec<AccountProfile>,
    /// Records whose content held no valid number.
    pub malformed_records: usize,
}

#[derive(Default)]
struct Accumulator {
    numbers: NumberSet,
    stakes: Vec<f64>,
    bet_count: usize,
}

/// Fold a group's records into one profile per account.
///
/// Accounts whose picks never produced a valid number are left out. A record
/// with a blank account id fails the whole group.
pub fn aggregate_accounts(key: &GroupKey, records: &[WagerRecord]) -> Result<Aggregation> {
    let mut by_account: BTreeMap<&str, Accumulator> = BTreeMap::new();
    let mut malformed_records = 0;

    for (index, record) in records.iter().enumerate() {
        let account_id = record.account_id.trim();
        if account_id.is_empty() {
            return Err(AppError::MissingAccountId {
                period: key.period_id.clone(),
                lottery: key.lottery_type.clone(),
                index,
            });
        }

        let picks = extract_numbers(&record.content);
        trace!(
            group = %key,
            account = account_id,
            content = %record.content,
            picks = %picks.format_list(),
            "extracted numbers"
        );
        if picks.is_empty() {
            malformed_records += 1;
        }

        let acc = by_account.entry(account_id).or_default();
        acc.numbers = acc.numbers | picks;
        if let Some(amount) = record.stake_amount {
            acc.stakes.push(amount);
        }
        acc.bet_count += 1;
    }

    let profiles = by_account
        .into_iter()
        .filter(|(_, acc)| !acc.numbers.is_empty())
        .map(|(account_id, mut acc)| {
            // Sum in a fixed order so totals are identical for any record order.
            acc.stakes.sort_by(f64::total_cmp);
            AccountProfile {
                account_id: account_id.to_string(),
                numbers: acc.numbers,
                total_stake: acc.stakes.iter().sum(),
                bet_count: acc.bet_count,
            }
        })
        .collect();

    Ok(Aggregation {
        profiles,
        malformed_records,
    })
}

/// Keep only accounts that picked more than `min_numbers` distinct numbers.
pub fn filter_active(profiles: Vec<AccountProfile>, min_numbers: usize) -> Vec<AccountProfile> {
    profiles
        .into_iter()
        .filter(|p| p.numbers.len() > min_numbers)
        .collect()
}
