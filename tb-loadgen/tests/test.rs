use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tempfile::tempdir;

use tb_loadgen::account::initial_accounts;
use tb_loadgen::config::{FloorPolicy, LoadgenConfig};
use tb_loadgen::error::LoadgenError;
use tb_loadgen::format::{load_transfers, write_transfers, Format};
use tb_loadgen::generator::{
    correct_balances, generate_transactions, plan, validate_balances,
};
use tb_loadgen::ledger::Ledger;
use tb_loadgen::replay::run_benchmark;
use tb_loadgen::transaction::Transfer;

fn make_simple_transfers() -> Vec<Transfer> {
    [
        (1, 1, 3, 120_000),
        (2, 2, 4, 200_000),
        (3, 1, 4, 50_000),
        (4, 2, 3, 100_000),
        (5, 1, 3, 30_000),
        (6, 1, 2, 50_000),
    ]
    .into_iter()
    .map(|(id, debit, credit, amount)| Transfer {
        id,
        debit_account_id: debit,
        credit_account_id: credit,
        amount,
        ledger: 1,
        code: 1,
    })
    .collect()
}

#[test]
fn test_five_million_transfers_settle_exactly() {
    let config = LoadgenConfig::default();
    let mut rng = StdRng::seed_from_u64(2024);
    let mut accounts = initial_accounts(&config);

    let txs = generate_transactions(&mut accounts, 5_000_000, &config, &mut rng).unwrap();
    assert_eq!(txs.len(), 5_000_000);
    let total: f64 = accounts.iter().map(|a| a.balance).sum();
    assert_eq!(total, 1_000_000.0);

    let settlements = correct_balances(&mut accounts, &config).unwrap();
    assert!(settlements.len() < 4);
    for account in &accounts {
        assert_eq!(account.balance, 250_000.0);
    }
    assert!(validate_balances(&accounts, &config));
}

#[test]
fn test_simple_transfers() {
    let transfers = load_transfers("../resources/input/transfers.txt", Format::Text).unwrap();
    assert_eq!(transfers, make_simple_transfers());

    let transfers = load_transfers("../resources/input/transfers.json", Format::Json).unwrap();
    assert_eq!(transfers, make_simple_transfers()[..2].to_vec());
}

#[test]
fn test_legacy_amounts() {
    let transfers =
        load_transfers("../resources/input/legacy-amounts.txt", Format::Text).unwrap();
    let amounts: Vec<u128> = transfers.iter().map(|t| t.amount).collect();
    assert_eq!(amounts, vec![120_000, 200_000, 1]);
}

#[test]
fn test_unknown_field() {
    let res = load_transfers("../resources/input/unknown-field.txt", Format::Text);
    match res {
        Err(LoadgenError::Parse { line, reason, .. }) => {
            assert_eq!(line, 2);
            assert_eq!(reason, "unknown field: timestamp");
        }
        other => panic!("expected a parse error, got {other:?}"),
    }
}

#[test]
fn test_invalid_record() {
    let res = load_transfers("../resources/input/bad-record.txt", Format::Text);
    assert!(matches!(res, Err(LoadgenError::Parse { line: 3, .. })));
}

#[test]
fn test_missing_file() {
    let res = load_transfers("../resources/input/does-not-exist.txt", Format::Text);
    assert!(matches!(res, Err(LoadgenError::IoError(_))));
}

#[test]
fn test_round_trip_generated_plan() {
    let config = LoadgenConfig {
        transaction_count: 20_000,
        ..LoadgenConfig::default()
    };
    let plan = plan(&config, &mut StdRng::seed_from_u64(8)).unwrap();
    let dir = tempdir().unwrap();

    for (name, format) in [("transfers.txt", Format::Text), ("transfers.json", Format::Json)] {
        let path = dir.path().join(name);
        write_transfers(&path, &plan.transfers, format).unwrap();
        let loaded = load_transfers(&path, Format::from_path(&path)).unwrap();
        assert_eq!(loaded, plan.transfers);
    }
}

#[test]
fn test_zero_transactions() {
    let config = LoadgenConfig::default();
    let mut accounts = initial_accounts(&config);
    let txs = generate_transactions(
        &mut accounts,
        0,
        &config,
        &mut StdRng::seed_from_u64(0),
    )
    .unwrap();
    assert!(txs.is_empty());
    assert_eq!(accounts, initial_accounts(&config));

    let dir = tempdir().unwrap();
    let path = dir.path().join("transfers.txt");
    write_transfers(&path, &[], Format::Text).unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    assert!(load_transfers(&path, Format::Text).unwrap().is_empty());
}

#[test]
fn test_replay_fixture() {
    let config = LoadgenConfig::default();
    let transfers = load_transfers("../resources/input/transfers.txt", Format::Text).unwrap();
    let mut ledger = Ledger::default();
    let report =
        run_benchmark(&mut ledger, &config, &initial_accounts(&config), &transfers).unwrap();

    let before: Vec<i128> = report.before.iter().map(|a| a.balance()).collect();
    assert_eq!(before, vec![500_000, 500_000, 0, 0]);
    let after: Vec<i128> = report.after.iter().map(|a| a.balance()).collect();
    assert_eq!(after, vec![250_000; 4]);
    assert_eq!(report.replay.transfers, 6);
    assert_eq!(report.replay.batches, 1);
}

#[test]
fn test_replay_generated_plan() {
    let config = LoadgenConfig {
        transaction_count: 50_000,
        ..LoadgenConfig::default()
    };
    let plan = plan(&config, &mut StdRng::seed_from_u64(77)).unwrap();
    let mut ledger = Ledger::default();
    let report =
        run_benchmark(&mut ledger, &config, &plan.initial_accounts, &plan.transfers).unwrap();

    let expected_batches = (plan.transfers.len() + 8189) / 8190;
    assert_eq!(report.replay.batches, expected_batches);
    for account in &report.after {
        assert_eq!(account.balance(), 250_000);
    }

    // funding batch first, then the log in order
    let generated: Vec<u128> = plan.transfers.iter().map(|t| t.id).collect();
    assert_eq!(&ledger.applied_transfer_ids()[2..], generated.as_slice());
    assert!(ledger.batch_sizes()[1..].iter().all(|&size| size <= 8190));
}

#[test]
fn test_replay_rejects_unfunded_start() {
    let config = LoadgenConfig::default();
    let transfers = make_simple_transfers();
    let mut ledger = Ledger::default();
    let mut empty = initial_accounts(&config);
    for account in &mut empty {
        account.balance = 0.0;
    }
    let res = run_benchmark(&mut ledger, &config, &empty, &transfers);
    assert!(matches!(
        res,
        Err(LoadgenError::TransferRejected { index: 0, id: 1, .. })
    ));
}

#[test]
fn test_unfunded_workload_is_rejected() {
    let config = LoadgenConfig {
        total_funds: 0,
        transaction_count: 3,
        ..LoadgenConfig::default()
    };
    let res = plan(&config, &mut StdRng::seed_from_u64(5));
    assert!(matches!(res, Err(LoadgenError::InvalidConfig(_))));

    let mut ledger = Ledger::default();
    let res = run_benchmark(&mut ledger, &config, &initial_accounts(&config), &[]);
    assert!(matches!(res, Err(LoadgenError::InvalidConfig(_))));
}

#[test]
fn test_plan_with_clamp_policy() {
    let config = LoadgenConfig {
        transaction_count: 10_000,
        floor_policy: FloorPolicy::ClampToCeiling,
        ..LoadgenConfig::default()
    };
    let plan = plan(&config, &mut StdRng::seed_from_u64(3)).unwrap();
    assert_eq!(plan.settlements, 0);
    assert!(plan.final_accounts.iter().all(|a| a.balance == 250_000.0));
}

#[test]
fn test_plan_other_shapes() {
    let config = LoadgenConfig {
        total_funds: 600,
        num_accounts: 6,
        transaction_count: 1_000,
        ..LoadgenConfig::default()
    };
    let plan = plan(&config, &mut StdRng::seed_from_u64(12)).unwrap();
    assert_eq!(plan.final_accounts.len(), 6);
    assert!(plan.final_accounts.iter().all(|a| a.balance == 100.0));

    let mut ledger = Ledger::default();
    let report =
        run_benchmark(&mut ledger, &config, &plan.initial_accounts, &plan.transfers).unwrap();
    assert!(report.after.iter().all(|a| a.balance() == 100));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_generation_conserves_total(seed in any::<u64>(), count in 0_usize..2_000) {
        let config = LoadgenConfig::default();
        let mut accounts = initial_accounts(&config);
        let txs = generate_transactions(
            &mut accounts,
            count,
            &config,
            &mut StdRng::seed_from_u64(seed),
        )
        .unwrap();
        prop_assert_eq!(txs.len(), count);
        let total: f64 = accounts.iter().map(|a| a.balance).sum();
        prop_assert_eq!(total, 1_000_000.0);
        prop_assert!(accounts.iter().all(|a| a.balance >= 0.0));
    }

    #[test]
    fn prop_plan_always_settles(seed in any::<u64>(), count in 0_usize..2_000) {
        let config = LoadgenConfig {
            transaction_count: count,
            ..LoadgenConfig::default()
        };
        let plan = plan(&config, &mut StdRng::seed_from_u64(seed)).unwrap();
        prop_assert!(validate_balances(&plan.final_accounts, &config));

        let mut accounts = plan.final_accounts.clone();
        let settlements = correct_balances(&mut accounts, &config).unwrap();
        prop_assert!(settlements.is_empty());
        prop_assert_eq!(accounts, plan.final_accounts);
    }

    #[test]
    fn prop_text_round_trip(
        records in prop::collection::vec(
            (any::<u128>(), any::<u128>(), any::<u128>(), any::<u128>(), any::<u32>(), any::<u16>()),
            0..50,
        )
    ) {
        let transfers: Vec<Transfer> = records
            .into_iter()
            .map(|(id, debit_account_id, credit_account_id, amount, ledger, code)| Transfer {
                id,
                debit_account_id,
                credit_account_id,
                amount,
                ledger,
                code,
            })
            .collect();
        let mut out = Vec::new();
        Format::Text.codec().encode(&transfers, &mut out).unwrap();
        let decoded = Format::Text.codec().decode(&mut out.as_slice()).unwrap();
        prop_assert_eq!(decoded, transfers);
    }
}
