//! The boundary to the accounting database the workload is replayed against.
//!
//! Record shapes and result codes follow the database's own account/transfer model.
//! Only the parts the workload needs are modelled.

use std::fmt;

use crate::error::LoadgenError;
use crate::transaction::Transfer;

const FLAG_DEBITS_MUST_NOT_EXCEED_CREDITS: u16 = 1 << 1;
const FLAG_CREDITS_MUST_NOT_EXCEED_DEBITS: u16 = 1 << 2;

/// Balance constraints enforced by the ledger on every transfer touching the account
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AccountFlags {
    pub debits_must_not_exceed_credits: bool,
    pub credits_must_not_exceed_debits: bool,
}

impl AccountFlags {
    #[must_use]
    pub fn to_u16(self) -> u16 {
        let mut flags = 0;
        if self.debits_must_not_exceed_credits {
            flags |= FLAG_DEBITS_MUST_NOT_EXCEED_CREDITS;
        }
        if self.credits_must_not_exceed_debits {
            flags |= FLAG_CREDITS_MUST_NOT_EXCEED_DEBITS;
        }
        flags
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRecord {
    pub id: u128,
    pub ledger: u32,
    pub code: u16,
    pub flags: AccountFlags,
}

/// Posted totals of an account as returned by a lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountSnapshot {
    pub id: u128,
    pub ledger: u32,
    pub code: u16,
    pub debits_posted: u128,
    pub credits_posted: u128,
}

impl AccountSnapshot {
    /// Net credit balance: `credits_posted - debits_posted`
    #[allow(clippy::cast_possible_wrap)]
    #[must_use]
    pub fn balance(&self) -> i128 {
        self.credits_posted as i128 - self.debits_posted as i128
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateAccountResult {
    IdMustNotBeZero,
    IdMustNotBeIntMax,
    FlagsAreMutuallyExclusive,
    LedgerMustNotBeZero,
    CodeMustNotBeZero,
    Exists,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateTransferResult {
    IdMustNotBeZero,
    IdMustNotBeIntMax,
    AccountsMustBeDifferent,
    LedgerMustNotBeZero,
    CodeMustNotBeZero,
    DebitAccountNotFound,
    CreditAccountNotFound,
    TransferMustHaveTheSameLedgerAsAccounts,
    AccountsMustHaveTheSameLedger,
    Exists,
    OverflowsDebits,
    OverflowsCredits,
    ExceedsCredits,
    ExceedsDebits,
}

impl fmt::Display for CreateAccountResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl fmt::Display for CreateTransferResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A rejected record: `index` is its position within the submitted batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateAccountFailure {
    pub index: usize,
    pub result: CreateAccountResult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateTransferFailure {
    pub index: usize,
    pub result: CreateTransferResult,
}

/// A connection to the ledger. Calls block until the ledger acknowledges the batch.
/// Only failed records are reported back; an empty result means everything was accepted.
pub trait LedgerClient {
    /// Largest number of records accepted by a single call
    fn max_batch_size(&self) -> usize;

    /// # Errors
    /// Errors when the call itself fails (e.g., the batch is above [`LedgerClient::max_batch_size`])
    fn create_accounts(
        &mut self,
        accounts: &[AccountRecord],
    ) -> Result<Vec<CreateAccountFailure>, LoadgenError>;

    /// # Errors
    /// Errors when the call itself fails (e.g., the batch is above [`LedgerClient::max_batch_size`])
    fn create_transfers(
        &mut self,
        transfers: &[Transfer],
    ) -> Result<Vec<CreateTransferFailure>, LoadgenError>;

    /// Unknown ids are left out of the result
    ///
    /// # Errors
    /// Errors when the call itself fails
    fn lookup_accounts(&mut self, ids: &[u128]) -> Result<Vec<AccountSnapshot>, LoadgenError>;
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_account_flags_bits() {
        let flags = AccountFlags {
            debits_must_not_exceed_credits: true,
            credits_must_not_exceed_debits: false,
        };
        assert_eq!(flags.to_u16(), 0b010);

        let flags = AccountFlags {
            debits_must_not_exceed_credits: false,
            credits_must_not_exceed_debits: true,
        };
        assert_eq!(flags.to_u16(), 0b100);
        assert_eq!(AccountFlags::default().to_u16(), 0);
    }

    #[test]
    fn test_snapshot_balance() {
        let snapshot = AccountSnapshot {
            id: 1,
            ledger: 1,
            code: 1,
            debits_posted: 300,
            credits_posted: 200,
        };
        assert_eq!(snapshot.balance(), -100);
    }
}
