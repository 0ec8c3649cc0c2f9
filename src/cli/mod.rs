//! Command-line argument parsing
//!
//! Clap-based CLI with subcommands for ingestion, querying, and diagnostics.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// PartScout - hybrid graph and vector search over equipment part catalogs
#[derive(Parser, Debug)]
#[command(name = "partscout")]
#[command(version)]
#[command(about = "Answer questions about equipment parts from catalogs and manuals", long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Verbosity level: default (normal), -v (verbose)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load a catalog CSV into the graph store and process its manuals
    Ingest {
        /// Path to the catalog CSV file
        #[arg(value_name = "CSV")]
        csv: PathBuf,

        /// Load entities only, skip downloading and indexing manuals
        #[arg(long)]
        skip_documents: bool,
    },

    /// Ask a question about a part or model
    Query {
        /// The question text
        #[arg(value_name = "QUESTION", required = true)]
        text: Vec<String>,

        /// Print the assembled context instead of generating an answer
        #[arg(long)]
        context_only: bool,
    },

    /// Check connectivity to the graph store, vector store, and generator
    Doctor,

    /// Display current configuration
    Config,
}
