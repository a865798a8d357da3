use anyhow::Context;
use colored::Colorize;
use lnk_protocol::{ClientConfig, RpcClient};
use lnk_server::{LnkServer, ServerConfig};
use lnk_store::{Store, StoreError};

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Serve(args) => cmd_serve(args).await,
        Command::Put(args) => cmd_put(args).await,
        Command::Get(args) => cmd_get(args).await,
    }
}

/// Load the config file, if any, then apply command-line overrides.
fn server_config(args: ServeArgs) -> anyhow::Result<ServerConfig> {
    let mut config = match &args.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    if let Some(http) = args.http {
        config.http_addr = http;
    }
    if args.no_rpc {
        config.rpc_addr = None;
    } else if let Some(rpc) = args.rpc {
        config.rpc_addr = Some(rpc);
    }
    if let Some(file) = args.file {
        config.log_path = file;
    }
    if let Some(host) = args.host {
        config.hostname = host;
    }
    if args.master.is_some() {
        config.master = args.master;
    }
    Ok(config)
}

async fn cmd_serve(args: ServeArgs) -> anyhow::Result<()> {
    let config = server_config(args)?;
    println!(
        "{} Lnk {} on {}",
        "✓".green().bold(),
        config.role().cyan(),
        config.http_addr.to_string().bold()
    );
    match &config.master {
        Some(master) => println!("  Primary: {}", master.yellow()),
        None => println!("  Log: {}", config.log_path.display()),
    }
    if let Some(rpc) = config.rpc_addr {
        println!("  RPC: {}", rpc.to_string().bold());
    }

    LnkServer::new(config)
        .serve(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
            }
        })
        .await?;
    println!("{} Stopped.", "✓".green());
    Ok(())
}

async fn cmd_put(args: PutArgs) -> anyhow::Result<()> {
    let client = RpcClient::new(args.master, ClientConfig::default());
    let key = client
        .put(args.url.clone())
        .await
        .with_context(|| format!("storing {} on {}", args.url, client.addr()))?;
    println!("{} {} → {}", "✓".green().bold(), key.yellow().bold(), args.url);
    Ok(())
}

async fn cmd_get(args: GetArgs) -> anyhow::Result<()> {
    let client = RpcClient::new(args.master, ClientConfig::default());
    match client.get(&args.key).await {
        Ok(url) => {
            println!("{}", url);
            Ok(())
        }
        Err(StoreError::NotFound(key)) => {
            println!("{} no URL for key {}", "✗".red().bold(), key.yellow());
            std::process::exit(1);
        }
        Err(e) => Err(e).with_context(|| format!("looking up {} on {}", args.key, client.addr())),
    }
}
