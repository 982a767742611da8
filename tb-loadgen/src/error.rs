use std::io;

use thiserror::Error;

use crate::client::{CreateAccountResult, CreateTransferResult};

#[derive(Error, Debug)]
pub enum LoadgenError {
    #[error("I/O Error")]
    IoError(#[from] io::Error),
    #[error("JSON Error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Error parsing line {line} '{content}': {reason}")]
    Parse {
        line: usize,
        content: String,
        reason: String,
    },
    #[error("Expected {expected} accounts, got {actual}")]
    AccountCount { expected: usize, actual: usize },
    #[error("Balance correction stalled with a discrepancy of {discrepancy}")]
    CorrectionStalled { discrepancy: i64 },
    #[error("Validation failed: balances {balances:?} do not match expected values")]
    BalanceValidationFailed { balances: Vec<f64> },
    #[error("Batch of {size} records exceeds the client limit of {limit}")]
    BatchTooLarge { size: usize, limit: usize },
    #[error("Error creating account {id} (index {index}): {result}")]
    AccountRejected {
        index: usize,
        id: u128,
        result: CreateAccountResult,
    },
    #[error("Error creating transfer {id} (index {index}): {result}")]
    TransferRejected {
        index: usize,
        id: u128,
        result: CreateTransferResult,
    },
    #[error("Could not fetch accounts: expected {expected}, got {actual}")]
    MissingAccounts { expected: usize, actual: usize },
}
