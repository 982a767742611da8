use crate::error::LoadgenError;

/// Hard per-call limit enforced by the ledger client on `create_transfers`
pub const MAX_BATCH_SIZE: usize = 8190;

pub const DEFAULT_TOTAL_FUNDS: u64 = 1_000_000;
pub const DEFAULT_NUM_ACCOUNTS: usize = 4;
pub const DEFAULT_TRANSACTION_COUNT: usize = 5_000_000;
pub const DEFAULT_OUTPUT_FILE: &str = "transfers.txt";

/// What the generator does when the transfer ceiling is below one whole unit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FloorPolicy {
    /// Always move at least one unit, even if that pushes the destination past its ceiling
    #[default]
    ForceMinimum,
    /// Never cross the ceiling; a ceiling below one unit produces a zero-amount transfer
    ClampToCeiling,
}

/// The shape of a generated workload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadgenConfig {
    /// Sum of all account balances, conserved by every transfer
    pub total_funds: u64,
    pub num_accounts: usize,
    pub transaction_count: usize,
    pub ledger: u32,
    pub code: u16,
    pub batch_size: usize,
    pub floor_policy: FloorPolicy,
}

impl Default for LoadgenConfig {
    fn default() -> Self {
        LoadgenConfig {
            total_funds: DEFAULT_TOTAL_FUNDS,
            num_accounts: DEFAULT_NUM_ACCOUNTS,
            transaction_count: DEFAULT_TRANSACTION_COUNT,
            ledger: 1,
            code: 1,
            batch_size: MAX_BATCH_SIZE,
            floor_policy: FloorPolicy::default(),
        }
    }
}

impl LoadgenConfig {
    /// The balance every account must hold once the workload is settled.
    /// Doubles as the per-account ceiling during generation.
    ///
    /// # Errors
    /// Errors when there are no accounts to split the funds across
    pub fn target_balance(&self) -> Result<u64, LoadgenError> {
        self.total_funds
            .checked_div(self.num_accounts as u64)
            .ok_or_else(|| LoadgenError::InvalidConfig("no accounts configured".to_string()))
    }

    /// # Errors
    /// Errors when the accounts cannot be split into equal whole shares of at least one
    /// unit, or the batch size is outside `1..=MAX_BATCH_SIZE`
    pub fn validate(&self) -> Result<(), LoadgenError> {
        if self.num_accounts < 2 {
            return Err(LoadgenError::InvalidConfig(format!(
                "at least 2 accounts are required, got {}",
                self.num_accounts
            )));
        }
        if self.total_funds < self.num_accounts as u64 {
            return Err(LoadgenError::InvalidConfig(format!(
                "total funds {} leave less than one unit for each of {} accounts",
                self.total_funds, self.num_accounts
            )));
        }
        if self.total_funds % self.num_accounts as u64 != 0 {
            return Err(LoadgenError::InvalidConfig(format!(
                "total funds {} cannot be split evenly across {} accounts",
                self.total_funds, self.num_accounts
            )));
        }
        if self.batch_size == 0 || self.batch_size > MAX_BATCH_SIZE {
            return Err(LoadgenError::InvalidConfig(format!(
                "batch size must be between 1 and {}, got {}",
                MAX_BATCH_SIZE, self.batch_size
            )));
        }
        if self.ledger == 0 || self.code == 0 {
            return Err(LoadgenError::InvalidConfig(
                "ledger and code must not be zero".to_string(),
            ));
        }
        Ok(())
    }
}
