use std::path::PathBuf;

use anyhow::Context;
use artpool_core::config::{self, ConfigSource};
use artpool_core::{Orchestrator, PoolManager, RunContext};
use artpool_model::{ItemId, PoolConfig};
use clap::{Args as ClapArgs, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod output;

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "artpool")]
#[command(about = "Keeps a pool of alternative artwork per media item and rotates the displayed one")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(ClapArgs, Debug, Clone)]
struct GlobalArgs {
    /// Config file (TOML or JSON); overrides ARTPOOL_CONFIG_PATH discovery
    #[arg(long, short, global = true, env = "ARTPOOL_CONFIG")]
    config: Option<PathBuf>,

    /// Debug logging unless RUST_LOG is set
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    /// Print results as JSON instead of text
    #[arg(long, global = true, default_value_t = false)]
    json: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Top up and rotate every eligible item once
    Run,
    /// Inspect and curate pools
    #[command(subcommand)]
    Pools(PoolsCommand),
    /// Promote a pool member now, ignoring the cooldown
    Promote {
        /// Catalog item id
        item: String,
        /// Member file name; the rotation policy picks when omitted
        #[arg(long)]
        member: Option<String>,
    },
    /// Delete every pool directory and the rotation state
    Purge {
        /// Required; purging cannot be undone
        #[arg(long, default_value_t = false)]
        yes: bool,
    },
}

#[derive(Debug, Subcommand)]
enum PoolsCommand {
    /// List items that have a pool
    List,
    /// Show one pool's members in rotation order
    Show {
        item: String,
    },
    /// Add an image file to a pool
    Add {
        item: String,
        file: PathBuf,
        /// Language tag recorded for the member
        #[arg(long)]
        language: Option<String>,
    },
    /// Remove a member from a pool
    Remove {
        item: String,
        member: String,
    },
    /// Save a custom rotation order
    Reorder {
        item: String,
        /// Member file names, first to last
        #[arg(required = true)]
        members: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.global.verbose);

    let pool_config = load_config(&cli.global)?;
    let cancel = CancellationToken::new();
    let ctx = RunContext::from_config(pool_config)
        .context("failed to build run context")?
        .with_cancellation(cancel.clone());

    match cli.command {
        Command::Run => run(ctx, cancel, cli.global.json).await,
        Command::Pools(command) => pools(PoolManager::new(ctx), command, cli.global.json).await,
        Command::Promote { item, member } => {
            let promotion = PoolManager::new(ctx)
                .force_promote(&ItemId::new(item), member.as_deref())
                .await
                .context("promotion failed")?;
            output::promotion(&promotion, cli.global.json)
        }
        Command::Purge { yes } => {
            if !yes {
                anyhow::bail!("refusing to purge without --yes");
            }
            let report = PoolManager::new(ctx)
                .purge_all()
                .await
                .context("purge failed")?;
            output::purge(&report, cli.global.json)
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "debug,reqwest=info,hyper_util=info"
    } else {
        "info,artpool_core=info,reqwest=warn"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config(args: &GlobalArgs) -> anyhow::Result<PoolConfig> {
    let (pool_config, source) = match &args.config {
        Some(path) => config::load_path(path)?,
        None => config::load_from_env().context("failed to load configuration")?,
    };

    match &source {
        ConfigSource::Default => warn!("no configuration found; using defaults"),
        ConfigSource::EnvPath(path) => {
            info!(path = %path.display(), "configuration loaded from env path")
        }
        ConfigSource::EnvInline => info!("configuration loaded from inline environment json"),
        ConfigSource::File(path) => info!(path = %path.display(), "configuration loaded from file"),
    }
    if pool_config.libraries.is_empty() {
        warn!("no libraries configured; nothing will be rotated");
    }
    if pool_config.tmdb.api_key.is_none() {
        warn!("TMDB_API_KEY not set; pools can only be seeded from existing artwork");
    }
    Ok(pool_config)
}

async fn run(ctx: RunContext, cancel: CancellationToken, json: bool) -> anyhow::Result<()> {
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; finishing the current item");
            signal_cancel.cancel();
        }
    });

    let summary = Orchestrator::new(ctx)
        .run()
        .await
        .context("rotation run failed")?;
    output::summary(&summary, json)?;

    if summary.errored > 0 {
        anyhow::bail!("{} item(s) failed", summary.errored);
    }
    Ok(())
}

async fn pools(manager: PoolManager, command: PoolsCommand, json: bool) -> anyhow::Result<()> {
    match command {
        PoolsCommand::List => {
            let pools = manager.list_pools().await.context("failed to list pools")?;
            output::pool_list(&pools, json)
        }
        PoolsCommand::Show { item } => {
            let details = manager
                .pool_details(&ItemId::new(item))
                .await
                .context("failed to read pool")?;
            output::pool_details(&details, json)
        }
        PoolsCommand::Add {
            item,
            file,
            language,
        } => {
            let bytes = tokio::fs::read(&file)
                .await
                .with_context(|| format!("failed to read {}", file.display()))?;
            let name = manager
                .add_member(&ItemId::new(item), &bytes, language.as_deref())
                .await
                .context("failed to add member")?;
            output::line(&name, json)
        }
        PoolsCommand::Remove { item, member } => {
            manager
                .remove_member(&ItemId::new(item), &member)
                .await
                .context("failed to remove member")?;
            output::line(&member, json)
        }
        PoolsCommand::Reorder { item, members } => {
            manager
                .reorder(&ItemId::new(item), members)
                .await
                .context("failed to save order")?;
            output::line("order saved", json)
        }
    }
}
