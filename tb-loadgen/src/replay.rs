//! Replays a transfer log against a [`LedgerClient`] in fixed-size batches.
//!
//! Submission is strictly sequential: a batch is only sent once the previous one has been
//! acknowledged, and the first rejected record aborts the run. There is no retry.

use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::account::Account;
use crate::client::{AccountFlags, AccountRecord, AccountSnapshot, LedgerClient};
use crate::config::LoadgenConfig;
use crate::error::LoadgenError;
use crate::transaction::Transfer;

/// Unconstrained account the initial balances are paid out of
pub const OPERATOR_ACCOUNT_ID: u128 = 7_000_000;

/// Funding transfers are numbered from here so they never collide with workload ids
pub const FUNDING_TRANSFER_ID_BASE: u128 = 1 << 64;

/// Workload accounts `1..=n`, which may never be overdrawn, plus the operator account
#[must_use]
pub fn benchmark_accounts(config: &LoadgenConfig) -> Vec<AccountRecord> {
    let no_overdraft = AccountFlags {
        debits_must_not_exceed_credits: true,
        ..AccountFlags::default()
    };
    (1..=config.num_accounts as u128)
        .map(|id| AccountRecord {
            id,
            ledger: config.ledger,
            code: config.code,
            flags: no_overdraft,
        })
        .chain(std::iter::once(AccountRecord {
            id: OPERATOR_ACCOUNT_ID,
            ledger: config.ledger,
            code: config.code,
            flags: AccountFlags::default(),
        }))
        .collect()
}

/// One transfer from the operator per funded account
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
#[must_use]
pub fn funding_transfers(initial: &[Account], config: &LoadgenConfig) -> Vec<Transfer> {
    initial
        .iter()
        .filter(|account| account.balance >= 1.0)
        .zip(FUNDING_TRANSFER_ID_BASE..)
        .map(|(account, id)| Transfer {
            id,
            debit_account_id: OPERATOR_ACCOUNT_ID,
            credit_account_id: account.id,
            amount: account.balance.round() as u128,
            ledger: config.ledger,
            code: config.code,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReplayReport {
    pub transfers: usize,
    pub batches: usize,
    pub elapsed: Duration,
}

impl ReplayReport {
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn transfers_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.transfers as f64 / secs
        } else {
            0.0
        }
    }
}

/// Account state around a replay, plus the replay timing
#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkReport {
    pub before: Vec<AccountSnapshot>,
    pub after: Vec<AccountSnapshot>,
    pub replay: ReplayReport,
}

pub struct Replayer<'a, C: LedgerClient> {
    client: &'a mut C,
    batch_size: usize,
}

impl<'a, C: LedgerClient> Replayer<'a, C> {
    /// The batch size is capped at what the client accepts per call
    ///
    /// # Errors
    /// Errors when the resulting batch size is zero
    pub fn new(client: &'a mut C, batch_size: usize) -> Result<Self, LoadgenError> {
        let batch_size = batch_size.min(client.max_batch_size());
        if batch_size == 0 {
            return Err(LoadgenError::InvalidConfig(
                "batch size must not be zero".to_string(),
            ));
        }
        Ok(Replayer { client, batch_size })
    }

    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// # Errors
    /// Errors on the first account the ledger rejects
    pub fn create_accounts(&mut self, records: &[AccountRecord]) -> Result<(), LoadgenError> {
        for record in records {
            debug!(
                "Creating account {} with flags {:#06b}",
                record.id,
                record.flags.to_u16()
            );
        }
        for (chunk_index, chunk) in records.chunks(self.batch_size).enumerate() {
            let failures = self.client.create_accounts(chunk)?;
            if let Some(failure) = failures.first() {
                let index = chunk_index * self.batch_size + failure.index;
                return Err(LoadgenError::AccountRejected {
                    index,
                    id: records[index].id,
                    result: failure.result,
                });
            }
        }
        info!("Created {} accounts", records.len());
        Ok(())
    }

    /// Submits `transfers` in order, one batch at a time.
    ///
    /// # Errors
    /// Errors on the first failed call or rejected transfer. Batches before it stay applied.
    pub fn replay(&mut self, transfers: &[Transfer]) -> Result<ReplayReport, LoadgenError> {
        let start = Instant::now();
        let mut batches = 0;
        for (chunk_index, chunk) in transfers.chunks(self.batch_size).enumerate() {
            let failures = self.client.create_transfers(chunk)?;
            batches += 1;
            if let Some(failure) = failures.first() {
                let index = chunk_index * self.batch_size + failure.index;
                warn!(
                    "Aborting replay after {} batches: {} transfers rejected in the last one",
                    batches,
                    failures.len()
                );
                return Err(LoadgenError::TransferRejected {
                    index,
                    id: transfers[index].id,
                    result: failure.result,
                });
            }
        }
        let report = ReplayReport {
            transfers: transfers.len(),
            batches,
            elapsed: start.elapsed(),
        };
        info!(
            "Replayed {} transfers in {} batches in {:.2?}",
            report.transfers, report.batches, report.elapsed
        );
        Ok(report)
    }

    /// # Errors
    /// Errors when the lookup fails or any of `ids` is unknown to the ledger
    pub fn lookup_accounts(&mut self, ids: &[u128]) -> Result<Vec<AccountSnapshot>, LoadgenError> {
        let mut snapshots = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(self.batch_size) {
            snapshots.extend(self.client.lookup_accounts(chunk)?);
        }
        if snapshots.len() != ids.len() {
            return Err(LoadgenError::MissingAccounts {
                expected: ids.len(),
                actual: snapshots.len(),
            });
        }
        Ok(snapshots)
    }
}

/// Sets up the benchmark accounts, funds them to `initial`, then times the replay of
/// `transfers` and snapshots the workload accounts before and after.
///
/// # Errors
/// Errors on any rejected account or transfer, or a failed client call
pub fn run_benchmark<C: LedgerClient>(
    client: &mut C,
    config: &LoadgenConfig,
    initial: &[Account],
    transfers: &[Transfer],
) -> Result<BenchmarkReport, LoadgenError> {
    config.validate()?;
    let mut replayer = Replayer::new(client, config.batch_size)?;

    replayer.create_accounts(&benchmark_accounts(config))?;
    let funding = funding_transfers(initial, config);
    replayer.replay(&funding)?;

    let ids: Vec<u128> = (1..=config.num_accounts as u128).collect();
    let before = replayer.lookup_accounts(&ids)?;
    info!("Accounts before replay: {:?}", balances(&before));

    let replay = replayer.replay(transfers)?;

    let after = replayer.lookup_accounts(&ids)?;
    info!("Accounts after replay: {:?}", balances(&after));

    Ok(BenchmarkReport {
        before,
        after,
        replay,
    })
}

fn balances(snapshots: &[AccountSnapshot]) -> Vec<(u128, i128)> {
    snapshots.iter().map(|s| (s.id, s.balance())).collect()
}
