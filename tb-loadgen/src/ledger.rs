use std::collections::{HashMap, HashSet};

use log::debug;

use crate::account::LedgerAccount;
use crate::client::{
    AccountRecord, AccountSnapshot, CreateAccountFailure, CreateAccountResult,
    CreateTransferFailure, CreateTransferResult, LedgerClient,
};
use crate::config::MAX_BATCH_SIZE;
use crate::error::LoadgenError;
use crate::transaction::Transfer;

/// An in-process stand-in for the accounting database.
///
/// Records are validated and applied one at a time in batch order, the way the database
/// applies them; a rejected record does not affect the rest of its batch.
#[derive(Debug)]
pub struct Ledger {
    pub(crate) accounts: HashMap<u128, LedgerAccount>,
    pub(crate) transfer_ids: HashSet<u128>,
    /// Ids of accepted transfers in the order they were applied
    pub(crate) applied: Vec<u128>,
    /// Size of every `create_transfers` call, in call order
    pub(crate) batch_sizes: Vec<usize>,
    max_batch_size: usize,
}

impl Default for Ledger {
    fn default() -> Self {
        Ledger::with_max_batch_size(MAX_BATCH_SIZE)
    }
}

impl Ledger {
    #[must_use]
    pub fn with_max_batch_size(max_batch_size: usize) -> Self {
        Ledger {
            accounts: HashMap::new(),
            transfer_ids: HashSet::new(),
            applied: Vec::new(),
            batch_sizes: Vec::new(),
            max_batch_size,
        }
    }

    #[must_use]
    pub fn applied_transfer_ids(&self) -> &Vec<u128> {
        &self.applied
    }

    #[must_use]
    pub fn batch_sizes(&self) -> &Vec<usize> {
        &self.batch_sizes
    }

    fn check_batch(&self, size: usize) -> Result<(), LoadgenError> {
        if size > self.max_batch_size {
            return Err(LoadgenError::BatchTooLarge {
                size,
                limit: self.max_batch_size,
            });
        }
        Ok(())
    }

    fn add_account(&mut self, record: &AccountRecord) -> Result<(), CreateAccountResult> {
        if record.id == 0 {
            return Err(CreateAccountResult::IdMustNotBeZero);
        }
        if record.id == u128::MAX {
            return Err(CreateAccountResult::IdMustNotBeIntMax);
        }
        if record.flags.debits_must_not_exceed_credits
            && record.flags.credits_must_not_exceed_debits
        {
            return Err(CreateAccountResult::FlagsAreMutuallyExclusive);
        }
        if record.ledger == 0 {
            return Err(CreateAccountResult::LedgerMustNotBeZero);
        }
        if record.code == 0 {
            return Err(CreateAccountResult::CodeMustNotBeZero);
        }
        if self.accounts.contains_key(&record.id) {
            return Err(CreateAccountResult::Exists);
        }
        self.accounts.insert(record.id, LedgerAccount::new(record));
        Ok(())
    }

    /// # Errors
    /// Errors with the result code of the first rule `transfer` breaks. Nothing is applied then.
    fn add_transfer(&mut self, transfer: &Transfer) -> Result<(), CreateTransferResult> {
        if transfer.id == 0 {
            return Err(CreateTransferResult::IdMustNotBeZero);
        }
        if transfer.id == u128::MAX {
            return Err(CreateTransferResult::IdMustNotBeIntMax);
        }
        if transfer.debit_account_id == transfer.credit_account_id {
            return Err(CreateTransferResult::AccountsMustBeDifferent);
        }
        if transfer.ledger == 0 {
            return Err(CreateTransferResult::LedgerMustNotBeZero);
        }
        if transfer.code == 0 {
            return Err(CreateTransferResult::CodeMustNotBeZero);
        }
        let debit_account = self
            .accounts
            .get(&transfer.debit_account_id)
            .ok_or(CreateTransferResult::DebitAccountNotFound)?;
        let credit_account = self
            .accounts
            .get(&transfer.credit_account_id)
            .ok_or(CreateTransferResult::CreditAccountNotFound)?;
        if debit_account.ledger != credit_account.ledger {
            return Err(CreateTransferResult::AccountsMustHaveTheSameLedger);
        }
        if transfer.ledger != debit_account.ledger {
            return Err(CreateTransferResult::TransferMustHaveTheSameLedgerAsAccounts);
        }
        if self.transfer_ids.contains(&transfer.id) {
            return Err(CreateTransferResult::Exists);
        }

        let debits = debit_account.can_debit(transfer.amount)?;
        let credits = credit_account.can_credit(transfer.amount)?;

        if let Some(account) = self.accounts.get_mut(&transfer.debit_account_id) {
            account.set_debits_posted(debits);
        }
        if let Some(account) = self.accounts.get_mut(&transfer.credit_account_id) {
            account.set_credits_posted(credits);
        }
        self.transfer_ids.insert(transfer.id);
        self.applied.push(transfer.id);
        Ok(())
    }
}

impl LedgerClient for Ledger {
    fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    fn create_accounts(
        &mut self,
        accounts: &[AccountRecord],
    ) -> Result<Vec<CreateAccountFailure>, LoadgenError> {
        self.check_batch(accounts.len())?;
        let failures = accounts
            .iter()
            .enumerate()
            .filter_map(|(index, record)| {
                self.add_account(record)
                    .err()
                    .map(|result| CreateAccountFailure { index, result })
            })
            .collect();
        Ok(failures)
    }

    fn create_transfers(
        &mut self,
        transfers: &[Transfer],
    ) -> Result<Vec<CreateTransferFailure>, LoadgenError> {
        self.check_batch(transfers.len())?;
        self.batch_sizes.push(transfers.len());
        let failures: Vec<_> = transfers
            .iter()
            .enumerate()
            .filter_map(|(index, transfer)| {
                self.add_transfer(transfer)
                    .err()
                    .map(|result| CreateTransferFailure { index, result })
            })
            .collect();
        debug!(
            "Applied batch of {} transfers, {} rejected",
            transfers.len(),
            failures.len()
        );
        Ok(failures)
    }

    fn lookup_accounts(&mut self, ids: &[u128]) -> Result<Vec<AccountSnapshot>, LoadgenError> {
        self.check_batch(ids.len())?;
        Ok(ids
            .iter()
            .filter_map(|id| self.accounts.get(id))
            .map(LedgerAccount::snapshot)
            .collect())
    }
}
