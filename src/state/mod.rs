pub mod result_store;

pub use result_store::{BatchSummary, GroupSummary, ResultStore};
