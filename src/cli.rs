use std::path::PathBuf;

use clap::Parser;

#[derive(Parser)]
#[command(version, about)]
pub struct Cli {
    /// File containing the grammar, one rule per line
    pub file: PathBuf,

    /// Sentence to parse (default: every line of standard input)
    pub tokens: Vec<String>,

    /// Start symbol (default: left side of the first rule in the file)
    #[arg(short, long, value_name = "SYMBOL")]
    pub start: Option<String>,

    /// Print every parse instead of only the first
    #[arg(short, long)]
    pub all: bool,

    /// Most parses to print with --all (default: no limit)
    #[arg(short, long, value_name = "AMOUNT")]
    pub limit: Option<usize>,

    /// Give up on a sentence after this many agenda steps
    #[arg(long, value_name = "STEPS")]
    pub max_steps: Option<usize>,

    /// Generate this many sentences instead of parsing
    #[arg(short, long, value_name = "AMOUNT")]
    pub generate: Option<u32>,

    /// Seed for generating sentences (default: random)
    #[arg(long, value_name = "SEED")]
    pub seed: Option<u64>
}
