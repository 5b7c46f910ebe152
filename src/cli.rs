use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// hitl — governance rules and approval workflows
#[derive(Parser)]
#[command(name = "hitl", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check whether a request needs approval under a rule file
    Evaluate {
        /// Rule file (.yaml, .yml or .json)
        #[arg(long)]
        rules: PathBuf,
        /// Request type, e.g. activation, platform_config
        #[arg(long = "type")]
        request_type: String,
        /// Request metadata as a JSON object
        #[arg(long, default_value = "{}")]
        metadata: String,
        /// Only consider rules of this tenant
        #[arg(long)]
        tenant: Option<String>,
    },

    /// Report rules that cannot behave as written
    Lint {
        #[arg(long)]
        rules: PathBuf,
    },

    /// Run a scripted approval scenario in memory and print the results
    Demo {
        /// Tenant id used for the scenario
        #[arg(long, default_value = "demo")]
        tenant: String,
    },
}
