pub mod accounts;
pub mod coverage;
pub mod numbers;
pub mod selection;

pub use accounts::{aggregate_accounts, filter_active};
pub use coverage::search;
pub use selection::{rank, select_best};
