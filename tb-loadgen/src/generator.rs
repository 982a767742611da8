//! Synthesizes a balance-conserving workload.
//!
//! The generator walks the accounts towards an equal split with random transfers,
//! the corrector removes whatever drift is left and the validator checks the result.

use log::{debug, info, warn};
use rand::Rng;

use crate::account::{initial_accounts, Account};
use crate::config::{FloorPolicy, LoadgenConfig};
use crate::error::LoadgenError;
use crate::transaction::{to_transfers, Transaction, Transfer};

/// A fully generated, settled and numbered workload
#[derive(Debug, Clone)]
pub struct Plan {
    /// Balances the ledger has to hold before the first transfer is replayed
    pub initial_accounts: Vec<Account>,
    /// Balances after every transfer has been applied, ordered by id
    pub final_accounts: Vec<Account>,
    pub transfers: Vec<Transfer>,
    /// How many of the transfers were appended by the corrector
    pub settlements: usize,
}

/// Generates and applies `count` transactions.
///
/// Every iteration the richest account pays a uniformly chosen other account. The amount
/// is a uniform draw below the smallest of: half of what the pair holds above the target,
/// the source balance, and the room left under the destination's ceiling. Draws are
/// floored to whole units with a minimum of one unit, see [`FloorPolicy`] for the case
/// where the ceiling itself is below one unit.
///
/// # Errors
/// Errors when `accounts` does not hold exactly `config.num_accounts` accounts, or fewer
/// than two
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn generate_transactions<R: Rng + ?Sized>(
    accounts: &mut [Account],
    count: usize,
    config: &LoadgenConfig,
    rng: &mut R,
) -> Result<Vec<Transaction>, LoadgenError> {
    if accounts.len() != config.num_accounts || accounts.len() < 2 {
        return Err(LoadgenError::AccountCount {
            expected: config.num_accounts,
            actual: accounts.len(),
        });
    }
    let target = config.target_balance()? as f64;
    let mut transactions = Vec::with_capacity(count);

    for _ in 0..count {
        // stable, so ties keep their previous relative order
        accounts.sort_by(|a, b| b.balance.total_cmp(&a.balance));

        let to_index = rng.gen_range(1..accounts.len());
        let source = accounts[0].balance;
        let destination = accounts[to_index].balance;

        let ceiling = ((source + destination - target) / 2.0)
            .min(source)
            .min(target - destination);
        let draw = rng.gen::<f64>() * ceiling;
        let amount = floor_amount(draw, ceiling, config.floor_policy);

        accounts[0].balance -= amount as f64;
        accounts[to_index].balance += amount as f64;
        transactions.push(Transaction::new(
            accounts[0].id,
            accounts[to_index].id,
            amount as u64,
        ));
    }

    Ok(transactions)
}

fn floor_amount(draw: f64, ceiling: f64, policy: FloorPolicy) -> f64 {
    match policy {
        FloorPolicy::ClampToCeiling if ceiling < 1.0 => 0.0,
        FloorPolicy::ClampToCeiling | FloorPolicy::ForceMinimum => draw.floor().max(1.0),
    }
}

/// Rounds every balance (half away from zero), removes the rounding discrepancy one unit
/// at a time, then settles the accounts onto the equal split.
///
/// The discrepancy pass only moves an account towards the target: up while the total is
/// short, down while it is over. Settlement moves whole units from accounts above the
/// target to accounts below it and returns those moves so they can be appended to the log.
/// An already settled set is left untouched and yields no transactions.
///
/// # Errors
/// Errors with [`LoadgenError::CorrectionStalled`] when a full pass over the accounts
/// cannot reduce the discrepancy, which happens when `config.total_funds` is not
/// `num_accounts` times the target balance, and with [`LoadgenError::InvalidConfig`]
/// when `config` has no accounts
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap
)]
pub fn correct_balances(
    accounts: &mut [Account],
    config: &LoadgenConfig,
) -> Result<Vec<Transaction>, LoadgenError> {
    let target = config.target_balance()? as f64;

    let mut total = 0.0;
    for account in accounts.iter_mut() {
        account.balance = account.balance.round();
        total += account.balance;
    }

    let mut discrepancy = config.total_funds as i64 - total as i64;
    if discrepancy != 0 {
        warn!("Correcting a rounding discrepancy of {} units", discrepancy);
    }
    while discrepancy != 0 {
        let mut adjusted = false;
        for account in accounts.iter_mut() {
            if discrepancy > 0 && account.balance < target {
                account.balance += 1.0;
                discrepancy -= 1;
                adjusted = true;
            } else if discrepancy < 0 && account.balance > target {
                account.balance -= 1.0;
                discrepancy += 1;
                adjusted = true;
            }

            if discrepancy == 0 {
                break;
            }
        }
        if !adjusted {
            return Err(LoadgenError::CorrectionStalled { discrepancy });
        }
    }

    Ok(settle(accounts, target))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn settle(accounts: &mut [Account], target: f64) -> Vec<Transaction> {
    let mut settlements = Vec::new();
    loop {
        let surplus = accounts.iter().position(|a| a.balance > target);
        let deficit = accounts.iter().position(|a| a.balance < target);
        let (from, to) = match (surplus, deficit) {
            (Some(from), Some(to)) => (from, to),
            _ => break,
        };

        let amount = (accounts[from].balance - target).min(target - accounts[to].balance);
        accounts[from].balance -= amount;
        accounts[to].balance += amount;
        debug!(
            "Settling {} units from account {} to account {}",
            amount, accounts[from].id, accounts[to].id
        );
        settlements.push(Transaction::new(
            accounts[from].id,
            accounts[to].id,
            amount as u64,
        ));
    }
    settlements
}

/// True when every account holds exactly the target balance. A config without
/// accounts has no target, so nothing validates against it.
#[allow(clippy::cast_precision_loss, clippy::float_cmp)]
#[must_use]
pub fn validate_balances(accounts: &[Account], config: &LoadgenConfig) -> bool {
    match config.target_balance() {
        Ok(target) => accounts
            .iter()
            .all(|account| account.balance == target as f64),
        Err(_) => false,
    }
}

/// Builds the complete workload described by `config`.
///
/// # Errors
/// Errors on an invalid configuration, a stalled correction, or balances that do not
/// validate after correction ([`LoadgenError::BalanceValidationFailed`])
pub fn plan<R: Rng + ?Sized>(config: &LoadgenConfig, rng: &mut R) -> Result<Plan, LoadgenError> {
    config.validate()?;

    let mut accounts = initial_accounts(config);
    let initial = accounts.clone();

    info!(
        "Generating {} transactions across {} accounts",
        config.transaction_count, config.num_accounts
    );
    let mut transactions =
        generate_transactions(&mut accounts, config.transaction_count, config, rng)?;
    let settlements = correct_balances(&mut accounts, config)?;
    info!(
        "Corrected balances with {} settlement transfers",
        settlements.len()
    );

    accounts.sort_by_key(|a| a.id);
    if !validate_balances(&accounts, config) {
        return Err(LoadgenError::BalanceValidationFailed {
            balances: accounts.iter().map(|a| a.balance).collect(),
        });
    }

    let settlement_count = settlements.len();
    transactions.extend(settlements);

    Ok(Plan {
        initial_accounts: initial,
        final_accounts: accounts,
        transfers: to_transfers(&transactions, config.ledger, config.code),
        settlements: settlement_count,
    })
}
