use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "flowbot", version, about = "Launch remote bot workflows and collect their results")]
pub struct Cli {
    /// Path to config file (overrides ./flowbot.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Base URL of the remote bot API
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one workflow and print its consolidated report
    Run {
        /// Bot to launch (defaults to the configured bot)
        #[arg(short, long)]
        bot_id: Option<String>,

        /// Launch payload as JSON (defaults to the configured payload)
        #[arg(short, long)]
        payload: Option<String>,

        /// Bearer token (defaults to the configured token)
        #[arg(long)]
        token: Option<String>,

        /// Maximum number of status checks
        #[arg(long)]
        max_attempts: Option<u32>,

        /// Seconds between status checks
        #[arg(long)]
        interval: Option<u64>,
    },
    /// Dispatch a single tool call and print its result
    Tool {
        /// Tool name (see `flowbot tools`)
        name: String,

        /// Tool arguments as a JSON object
        #[arg(short, long, default_value = "{}")]
        args: String,
    },
    /// Print the tool schemas as JSON
    Tools,
    /// Serve JSON-lines tool calls from stdin until EOF
    Session,
}
