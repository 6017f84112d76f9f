//! # sync-commands
//!
//! Reconcile a directory of command definitions with Discord, or delete a
//! single registered command.
//!
//! Usage: `cargo run --bin sync-commands -- deploy ./commands`

use anyhow::{bail, Context as _, Result};
use clap::{Args, Parser, Subcommand};
use dotenvy::dotenv;
use log::{error, info, warn};
use serenity::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use command_sync::deploy::{
    delete_command, delete_command_by_name, CommandApi, GatewayMembership, GuildMembership,
    RestClient, RestMembership,
};
use command_sync::{Config, Deployer, DirectoryLoader};

#[derive(Parser, Debug)]
#[command(name = "sync-commands", version, about = "Sync Discord application commands")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Deploy every definition file in a directory
    Deploy(DeployArgs),
    /// Delete one registered command
    Delete(DeleteArgs),
}

#[derive(Args, Debug)]
struct DeployArgs {
    /// Definition directory (defaults to COMMANDS_DIR)
    dir: Option<PathBuf>,
    /// Deploy global definitions into this guild instead
    #[arg(long)]
    guild: Option<String>,
    /// Definition file extension, e.g. `.yaml`
    #[arg(long)]
    extension: Option<String>,
    /// Learn guild membership from a gateway session instead of REST
    #[arg(long)]
    gateway: bool,
    /// Post guild commands without checking membership
    #[arg(long)]
    skip_membership: bool,
    /// Silence progress logs
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Args, Debug)]
struct DeleteArgs {
    /// Command id, or name with `--by-name`
    target: String,
    /// Delete from this guild instead of globally
    #[arg(long)]
    guild: Option<String>,
    /// Treat the target as a command name
    #[arg(long)]
    by_name: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env()?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_level))
        .init();

    match cli.command {
        Commands::Deploy(args) => deploy(&config, args).await,
        Commands::Delete(args) => delete(&config, args).await,
    }
}

async fn deploy(config: &Config, args: DeployArgs) -> Result<()> {
    let mut options = config.to_deploy_options();
    if args.guild.is_some() {
        options.guild_id = args.guild;
    }
    if let Some(extension) = args.extension {
        options.file_extension = extension;
    }
    if args.quiet {
        options.logs = false.into();
    }
    options.check_membership = !args.skip_membership;

    let dir = args.dir.unwrap_or_else(|| config.commands_dir.clone());
    let api: Arc<dyn CommandApi> = Arc::new(RestClient::with_base_url(
        &options.app_token,
        &options.app_id,
        &options.api_base,
        options.http_timeout,
    )?);

    let cancel = CancellationToken::new();
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("⚠️ Interrupted, cancelling deploy...");
            ctrl_c_cancel.cancel();
        }
    });

    let mut gateway_client = None;
    let membership: Arc<dyn GuildMembership> = if args.gateway {
        let (membership, handler) = GatewayMembership::channel();
        let mut client = Client::builder(&config.discord_token, GatewayIntents::GUILDS)
            .event_handler(handler)
            .await
            .context("Failed to create gateway client")?;
        let shard_manager = client.shard_manager.clone();
        tokio::spawn(async move {
            if let Err(why) = client.start().await {
                error!("Gateway connection failed: {why:?}");
            }
        });
        info!("🔁 Waiting for gateway READY to learn guild membership...");
        gateway_client = Some(shard_manager);
        Arc::new(membership)
    } else {
        Arc::new(RestMembership::new(api.clone()))
    };

    let loader = DirectoryLoader::new(&dir).with_extension(&options.file_extension);
    let report = Deployer::new(api, options)
        .with_membership(membership)
        .with_cancellation(cancel)
        .deploy(&loader)
        .await;

    if let Some(shard_manager) = gateway_client {
        shard_manager.lock().await.shutdown_all().await;
    }

    for failure in report.guild_failures() {
        warn!(
            "⚠️ Guild {} skipped '{}': {}",
            failure.guild_id, failure.command_name, failure.reason
        );
    }
    if !report.load_errors.is_empty() {
        warn!("⚠️ {} definition file(s) were skipped", report.load_errors.len());
    }

    if !report.success() {
        bail!(
            "deploy failed: {}",
            report.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}

async fn delete(config: &Config, args: DeleteArgs) -> Result<()> {
    let mut options = config.to_delete_options();
    if args.guild.is_some() {
        options.guild_id = args.guild;
    }

    if args.by_name {
        delete_command_by_name(&args.target, &options).await?;
    } else {
        delete_command(&args.target, &options).await?;
    }
    Ok(())
}
