pub mod init;
pub mod migrate;
pub mod serve;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "wishlist")]
#[command(version)]
#[command(about = "A media wishlist service with hardened attachment uploads", long_about = None)]
pub struct Cli {
    #[arg(short, long, env = "WISHLIST_CONFIG", default_value = "wishlist.toml")]
    pub config: PathBuf,

    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a default config and create the data directories
    Init {
        #[arg(default_value = ".")]
        path: PathBuf,
    },
    /// Apply pending schema migrations
    Migrate {
        #[command(subcommand)]
        command: Option<MigrateCommand>,
    },
    /// Open the database and serve the HTTP API
    Serve {
        #[arg(short = 'H', long)]
        host: Option<String>,
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[derive(Subcommand)]
pub enum MigrateCommand {
    /// Show applied and pending migrations
    Status,
}
