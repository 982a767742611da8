use crate::client::{AccountFlags, AccountRecord, AccountSnapshot, CreateTransferResult};
use crate::config::LoadgenConfig;

/// A workload account as seen by the generator. The balance is a real number so the
/// corrector can deal with fractional drift, but the generator only ever moves whole units.
#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    pub id: u128,
    pub balance: f64,
}

impl Account {
    #[must_use]
    pub fn new(id: u128, balance: f64) -> Self {
        Account { id, balance }
    }
}

/// The skewed starting point: the first half of the accounts share the total funds,
/// the rest start empty. Any remainder of the split lands on the first account.
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn initial_accounts(config: &LoadgenConfig) -> Vec<Account> {
    let funded = (config.num_accounts / 2).max(1);
    let share = config.total_funds / funded as u64;
    let remainder = config.total_funds % funded as u64;
    (0..config.num_accounts)
        .map(|i| {
            let balance = match i {
                0 => share + remainder,
                i if i < funded => share,
                _ => 0,
            };
            Account::new(i as u128 + 1, balance as f64)
        })
        .collect()
}

/// An account held by the in-memory [Ledger](crate::ledger::Ledger).
/// The balance is derived: `credits_posted - debits_posted`.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct LedgerAccount {
    pub(crate) id: u128,
    pub(crate) ledger: u32,
    pub(crate) code: u16,
    pub(crate) flags: AccountFlags,
    debits_posted: u128,
    credits_posted: u128,
}

impl LedgerAccount {
    pub(crate) fn new(record: &AccountRecord) -> Self {
        LedgerAccount {
            id: record.id,
            ledger: record.ledger,
            code: record.code,
            flags: record.flags,
            ..LedgerAccount::default()
        }
    }

    /// Checks that `amount` can be debited without breaking the account's flags
    pub(crate) fn can_debit(&self, amount: u128) -> Result<u128, CreateTransferResult> {
        let debits = self
            .debits_posted
            .checked_add(amount)
            .ok_or(CreateTransferResult::OverflowsDebits)?;
        if self.flags.debits_must_not_exceed_credits && debits > self.credits_posted {
            return Err(CreateTransferResult::ExceedsCredits);
        }
        Ok(debits)
    }

    /// Checks that `amount` can be credited without breaking the account's flags
    pub(crate) fn can_credit(&self, amount: u128) -> Result<u128, CreateTransferResult> {
        let credits = self
            .credits_posted
            .checked_add(amount)
            .ok_or(CreateTransferResult::OverflowsCredits)?;
        if self.flags.credits_must_not_exceed_debits && credits > self.debits_posted {
            return Err(CreateTransferResult::ExceedsDebits);
        }
        Ok(credits)
    }

    pub(crate) fn set_debits_posted(&mut self, debits: u128) {
        self.debits_posted = debits;
    }

    pub(crate) fn set_credits_posted(&mut self, credits: u128) {
        self.credits_posted = credits;
    }

    pub(crate) fn snapshot(&self) -> AccountSnapshot {
        AccountSnapshot {
            id: self.id,
            ledger: self.ledger,
            code: self.code,
            debits_posted: self.debits_posted,
            credits_posted: self.credits_posted,
        }
    }
}
