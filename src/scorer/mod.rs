pub mod balance;

pub use balance::similarity;
