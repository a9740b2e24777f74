use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use frostpss::commands;
use frostpss::{CommandResult, DkgConfig, SchemeKind};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "frostpss")]
#[command(about = "FROST-style threshold DKG with proactive share refresh", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Run parameters shared by every command
#[derive(Args)]
struct RunArgs {
    /// Threshold (minimum shares needed to reconstruct)
    #[arg(long, required_unless_present = "config")]
    threshold: Option<u32>,

    /// Total number of parties
    #[arg(long, required_unless_present = "config")]
    n_parties: Option<u32>,

    /// Commitment scheme
    #[arg(long, value_enum, default_value = "feldman")]
    scheme: SchemeArg,

    /// Run each round on one worker thread per party
    #[arg(long, default_value = "false")]
    parallel: bool,

    /// Seed for a reproducible run
    #[arg(long)]
    seed: Option<u64>,

    /// JSON config file (overrides threshold, n-parties, scheme and parallel)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum SchemeArg {
    Feldman,
    Pedersen,
}

impl From<SchemeArg> for SchemeKind {
    fn from(arg: SchemeArg) -> Self {
        match arg {
            SchemeArg::Feldman => SchemeKind::Feldman,
            SchemeArg::Pedersen => SchemeKind::Pedersen,
        }
    }
}

impl RunArgs {
    fn dkg_config(&self) -> Result<DkgConfig> {
        if let Some(path) = &self.config {
            return DkgConfig::from_json_file(path);
        }

        let config = DkgConfig::new(self.threshold.unwrap_or(0), self.n_parties.unwrap_or(0))
            .with_scheme(self.scheme.into())
            .with_parallel(self.parallel);
        config.validate()?;
        Ok(config)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run the distributed key generation
    Keygen {
        #[command(flatten)]
        run: RunArgs,
    },

    /// Run keygen, then rotate every share for a number of epochs
    Refresh {
        #[command(flatten)]
        run: RunArgs,

        /// Number of refresh epochs
        #[arg(long, default_value = "1")]
        epochs: u64,
    },

    /// Corrupt one party's broadcast commitment in flight and watch the run abort
    Tamper {
        #[command(flatten)]
        run: RunArgs,

        /// Party whose commitments are corrupted
        #[arg(long, default_value = "1")]
        party: u32,

        /// Index of the corrupted commitment
        #[arg(long, default_value = "1")]
        coefficient: usize,
    },
}

fn print_result(cmd_result: CommandResult) {
    println!("{}", cmd_result.output);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("📋 Result JSON:");
    println!("{}", cmd_result.result);
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let cmd_result = match cli.command {
        Commands::Keygen { run } => commands::keygen_core(run.dkg_config()?, run.seed)?,
        Commands::Refresh { run, epochs } => {
            commands::refresh_core(run.dkg_config()?, epochs, run.seed)?
        }
        Commands::Tamper {
            run,
            party,
            coefficient,
        } => commands::tamper_core(run.dkg_config()?, party, coefficient, run.seed)?,
    };

    print_result(cmd_result);
    Ok(())
}
