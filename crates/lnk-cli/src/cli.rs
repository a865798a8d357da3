use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

pub const DEFAULT_MASTER: &str = "127.0.0.1:8081";

#[derive(Parser)]
#[command(name = "lnk", about = "Lnk: a short-link store with replicas", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run a primary, or a replica when --master is given
    Serve(ServeArgs),
    /// Store a URL on a primary and print its short key
    Put(PutArgs),
    /// Look up the URL behind a short key
    Get(GetArgs),
}

#[derive(Args)]
pub struct ServeArgs {
    /// HTTP listen address
    #[arg(long)]
    pub http: Option<SocketAddr>,
    /// RPC listen address
    #[arg(long, conflicts_with = "no_rpc")]
    pub rpc: Option<SocketAddr>,
    /// Do not expose the store over RPC
    #[arg(long)]
    pub no_rpc: bool,
    /// Log file of the primary store
    #[arg(long)]
    pub file: Option<PathBuf>,
    /// Host name used in returned short links
    #[arg(long)]
    pub host: Option<String>,
    /// RPC address of the primary; makes this process a replica
    #[arg(long)]
    pub master: Option<String>,
    /// TOML configuration file; flags override its values
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Args)]
pub struct PutArgs {
    pub url: String,
    #[arg(long, default_value = DEFAULT_MASTER)]
    pub master: String,
}

#[derive(Args)]
pub struct GetArgs {
    pub key: String,
    #[arg(long, default_value = DEFAULT_MASTER)]
    pub master: String,
}
