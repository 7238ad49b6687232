use std::path::PathBuf;

use clap::builder::RangedU64ValueParser;
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "lookalike",
    version,
    about = "Screen ballot candidate name pairs for voter confusion"
)]
pub struct Cli {
    /// Also append logs to this file (no color).
    #[arg(long, global = true, env = "LOOKALIKE_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Judge every pair not yet in the output file
    Run(RunArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Judge a seeded random sample of this many pairs
    #[arg(long, value_name = "N", conflicts_with = "full")]
    pub sample: Option<usize>,

    /// Judge the full dataset
    #[arg(long)]
    pub full: bool,

    /// Input CSV with Ref_Candidate, Dummy_Candidate, State_Name columns
    #[arg(long, short)]
    pub input: Option<PathBuf>,

    /// Output CSV (default: name_transliterations_{sample,full}.csv in the output dir)
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// Config file (default: $LOOKALIKE_CONFIG, then the user config dir)
    #[arg(long, env = "LOOKALIKE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Pairs per checkpoint flush
    #[arg(long, value_parser = RangedU64ValueParser::<usize>::new().range(1..))]
    pub batch_size: Option<usize>,

    /// Attempts per pair before it is skipped
    #[arg(long, value_parser = RangedU64ValueParser::<u32>::new().range(1..))]
    pub max_attempts: Option<u32>,

    /// Seed for --sample
    #[arg(long)]
    pub seed: Option<u64>,

    /// Load and filter, then report the plan without calling the service
    #[arg(long)]
    pub dry_run: bool,
}
