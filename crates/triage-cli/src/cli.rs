use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "triage")]
#[command(
    author,
    version,
    about = "Classify support tickets into Low, Medium or High priority"
)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file path (YAML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// API key for the classification service
    #[arg(long, env = "TRIAGE_API_KEY", global = true, hide_env_values = true)]
    pub api_key: Option<String>,

    /// Print Prometheus metrics to stderr on exit
    #[arg(long, global = true)]
    pub metrics: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Classify a single issue and print the result as JSON
    Classify {
        /// Issue text
        text: String,

        /// Customer name
        #[arg(long)]
        name: Option<String>,

        /// Customer email
        #[arg(long)]
        email: Option<String>,
    },

    /// Classify one issue per line, printing JSON lines
    Batch {
        /// Input file (reads stdin when omitted)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Maximum classifications in flight
        #[arg(long, default_value = "4", value_parser = clap::value_parser!(u16).range(1..))]
        concurrency: u16,
    },

    /// Print the effective configuration with secrets redacted
    Config,
}
