use crate::error::{AppError, Result};

/// Size of the special-number universe: every pick lies in 1..=NUMBER_DOMAIN.
pub const NUMBER_DOMAIN: u32 = 49;

/// A (period, lottery) group needs at least this many raw records to be analysed.
pub const MIN_GROUP_RECORDS: usize = 10;

/// Accounts with this many distinct numbers or fewer are dropped before the search.
pub const MIN_ACCOUNT_NUMBERS: usize = 11;

/// Bet category designator for special-number wagers.
pub const SPECIAL_CATEGORY: &str = "特码";

/// Lottery products accepted when LOTTERY_ALLOW_LIST is not set.
pub const DEFAULT_LOTTERIES: &[&str] = &[
    "新澳门六合彩",
    "澳门六合彩",
    "香港六合彩",
    "一分六合彩",
    "五分六合彩",
    "三分六合彩",
    "香港⑥合彩",
    "分分六合彩",
];

/// Similarity band thresholds (percent).
pub mod similarity_bands {
    pub const HIGH_MIN: f64 = 90.0;
    pub const MEDIUM_HIGH_MIN: f64 = 80.0;
    pub const MEDIUM_LOW_MIN: f64 = 70.0;
}

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    /// JSON array or JSON Lines file of wager records (INPUT_PATH)
    pub input_path: String,
    /// Where to write the batch report as JSON (OUTPUT_PATH). Not written when unset.
    pub output_path: Option<String>,
    /// Max groups searched concurrently (WORKERS)
    pub workers: usize,
    pub min_group_records: usize,
    pub min_account_numbers: usize,
    pub special_category: String,
    /// Accepted lottery products (LOTTERY_ALLOW_LIST, comma-separated).
    /// Empty accepts every lottery.
    pub lottery_allow_list: Vec<String>,
    /// Keep serving results over HTTP after the batch finishes (SERVE_API)
    pub serve_api: bool,
    pub api_port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let default_workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);

        let lottery_allow_list = match std::env::var("LOTTERY_ALLOW_LIST") {
            Ok(list) => split_list(&list),
            Err(_) => DEFAULT_LOTTERIES.iter().map(|s| s.to_string()).collect(),
        };

        Ok(Self {
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            input_path: std::env::var("INPUT_PATH").unwrap_or_else(|_| "records.json".to_string()),
            output_path: std::env::var("OUTPUT_PATH").ok().filter(|s| !s.trim().is_empty()),
            workers: std::env::var("WORKERS")
                .ok()
                .and_then(|s| s.parse::<usize>().ok())
                .filter(|&n| n > 0)
                .unwrap_or(default_workers),
            min_group_records: std::env::var("MIN_GROUP_RECORDS")
                .unwrap_or_else(|_| MIN_GROUP_RECORDS.to_string())
                .parse::<usize>()
                .map_err(|_| AppError::Config("MIN_GROUP_RECORDS must be a non-negative integer".to_string()))?,
            min_account_numbers: std::env::var("MIN_ACCOUNT_NUMBERS")
                .unwrap_or_else(|_| MIN_ACCOUNT_NUMBERS.to_string())
                .parse::<usize>()
                .map_err(|_| AppError::Config("MIN_ACCOUNT_NUMBERS must be a non-negative integer".to_string()))?,
            special_category: std::env::var("SPECIAL_CATEGORY")
                .unwrap_or_else(|_| SPECIAL_CATEGORY.to_string()),
            lottery_allow_list,
            serve_api: std::env::var("SERVE_API")
                .map(|s| matches!(s.trim(), "1" | "true" | "yes"))
                .unwrap_or(false),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
        })
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
