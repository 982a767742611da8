use std::error::Error;
use std::path::{Path, PathBuf};

use clap::{ArgEnum, Args, Parser, Subcommand};
use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;

use tb_loadgen::account::initial_accounts;
use tb_loadgen::config::{self, FloorPolicy, LoadgenConfig};
use tb_loadgen::format::{load_transfers, write_transfers, Format};
use tb_loadgen::generator::plan;
use tb_loadgen::ledger::Ledger;
use tb_loadgen::replay::{run_benchmark, BenchmarkReport};

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a settled transfer log and write it to a file
    Generate {
        #[clap(flatten)]
        workload: WorkloadArgs,
        #[clap(flatten)]
        generation: GenerationArgs,
        /// The output file of transfers
        #[clap(short, long, default_value = config::DEFAULT_OUTPUT_FILE)]
        output: PathBuf,
        #[clap(long, arg_enum)]
        format: Option<FormatArg>,
    },
    /// Replay a transfer log against an in-memory ledger and report throughput
    Replay {
        #[clap(flatten)]
        workload: WorkloadArgs,
        /// The input file of transfers
        #[clap(short, long, default_value = config::DEFAULT_OUTPUT_FILE)]
        input: PathBuf,
        #[clap(long, arg_enum)]
        format: Option<FormatArg>,
    },
    /// Generate a transfer log and replay it straight away, without touching the disk
    Run {
        #[clap(flatten)]
        workload: WorkloadArgs,
        #[clap(flatten)]
        generation: GenerationArgs,
    },
}

#[derive(Args)]
struct WorkloadArgs {
    /// Sum of all account balances
    #[clap(long, default_value_t = config::DEFAULT_TOTAL_FUNDS)]
    total_funds: u64,
    /// Number of accounts the funds are spread over
    #[clap(long, default_value_t = config::DEFAULT_NUM_ACCOUNTS)]
    accounts: usize,
    #[clap(long, default_value_t = 1)]
    ledger: u32,
    #[clap(long, default_value_t = 1)]
    code: u16,
    /// Transfers per client call
    #[clap(long, default_value_t = config::MAX_BATCH_SIZE)]
    batch_size: usize,
}

#[derive(Args)]
struct GenerationArgs {
    /// Number of random transfers to generate
    #[clap(short = 'n', long, default_value_t = config::DEFAULT_TRANSACTION_COUNT)]
    count: usize,
    /// Seed for the random number generator; a random seed is used and logged if omitted
    #[clap(long)]
    seed: Option<u64>,
    /// What to do when a transfer cannot move a whole unit without crossing the ceiling
    #[clap(long, arg_enum, default_value = "force-minimum")]
    floor_policy: FloorPolicyArg,
}

#[derive(ArgEnum, Clone, Copy)]
enum FormatArg {
    Text,
    Json,
}

#[derive(ArgEnum, Clone, Copy)]
enum FloorPolicyArg {
    ForceMinimum,
    Clamp,
}

impl WorkloadArgs {
    fn config(&self) -> LoadgenConfig {
        LoadgenConfig {
            total_funds: self.total_funds,
            num_accounts: self.accounts,
            ledger: self.ledger,
            code: self.code,
            batch_size: self.batch_size,
            ..LoadgenConfig::default()
        }
    }
}

impl GenerationArgs {
    fn apply(&self, config: LoadgenConfig) -> LoadgenConfig {
        LoadgenConfig {
            transaction_count: self.count,
            floor_policy: match self.floor_policy {
                FloorPolicyArg::ForceMinimum => FloorPolicy::ForceMinimum,
                FloorPolicyArg::Clamp => FloorPolicy::ClampToCeiling,
            },
            ..config
        }
    }

    fn rng(&self) -> StdRng {
        let seed = self.seed.unwrap_or_else(rand::random);
        info!("Using seed {}", seed);
        StdRng::seed_from_u64(seed)
    }
}

fn resolve_format(format: Option<FormatArg>, path: &Path) -> Format {
    match format {
        Some(FormatArg::Text) => Format::Text,
        Some(FormatArg::Json) => Format::Json,
        None => Format::from_path(path),
    }
}

fn print_report(report: &BenchmarkReport) {
    println!("Accounts before replay:");
    for account in &report.before {
        println!("  account {}: balance {}", account.id, account.balance());
    }
    println!(
        "Replayed {} transfers in {} batches",
        report.replay.transfers, report.replay.batches
    );
    println!("Time taken: {:.2?}", report.replay.elapsed);
    println!(
        "Throughput: {:.0} transfers/s",
        report.replay.transfers_per_second()
    );
    println!("Accounts after replay:");
    for account in &report.after {
        println!("  account {}: balance {}", account.id, account.balance());
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Generate {
            workload,
            generation,
            output,
            format,
        } => {
            let config = generation.apply(workload.config());
            let plan = plan(&config, &mut generation.rng())?;
            write_transfers(&output, &plan.transfers, resolve_format(format, &output))?;
            println!(
                "Wrote {} transfers ({} settlements) to {}",
                plan.transfers.len(),
                plan.settlements,
                output.display()
            );
        }
        Command::Replay {
            workload,
            input,
            format,
        } => {
            let config = workload.config();
            let transfers = load_transfers(&input, resolve_format(format, &input))?;
            let mut ledger = Ledger::default();
            let report = run_benchmark(
                &mut ledger,
                &config,
                &initial_accounts(&config),
                &transfers,
            )?;
            print_report(&report);
        }
        Command::Run {
            workload,
            generation,
        } => {
            let config = generation.apply(workload.config());
            let plan = plan(&config, &mut generation.rng())?;
            let mut ledger = Ledger::default();
            let report = run_benchmark(
                &mut ledger,
                &config,
                &plan.initial_accounts,
                &plan.transfers,
            )?;
            print_report(&report);
        }
    }

    Ok(())
}
