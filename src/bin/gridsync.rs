// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use gridsync::{http, path::default_config_path, GridService, Settings};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::{fs::read_to_string, io::ErrorKind, net::SocketAddr, path::PathBuf, process::exit, sync::Arc};
use tracing::{debug, error};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "gridsync [options] <gridsync-command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, global = true, value_name = "path")]
    pub config: Option<PathBuf>,

    /// Path to git working copy holding the canonical file.
    #[arg(short, long, global = true, value_name = "path")]
    pub repo: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    async fn run(self) -> Result<()> {
        let mut settings = resolve_settings(self.config)?;
        if let Some(repo) = self.repo {
            settings.repo_path = repo;
        }

        match self.command {
            Command::Serve(opts) => run_serve(settings, opts).await,
            Command::Show => run_show(settings).await,
            Command::Sync => run_sync(settings).await,
            Command::Config => run_config(settings),
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Serve interactive grid page over HTTP.
    #[command(override_usage = "gridsync serve [options]")]
    Serve(ServeOptions),

    /// Pull, then print current grid.
    #[command(override_usage = "gridsync show [options]")]
    Show,

    /// Pull latest grid from remote.
    #[command(override_usage = "gridsync sync [options]")]
    Sync,

    /// Print resolved configuration.
    #[command(override_usage = "gridsync config [options]")]
    Config,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct ServeOptions {
    /// Address to serve HTTP on.
    #[arg(short, long, value_name = "addr")]
    pub bind: Option<SocketAddr>,
}

#[tokio::main]
async fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .with_timer(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = run().await {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

async fn run() -> Result<()> {
    Cli::parse().run().await
}

/// Resolve settings from defaults, configuration file, then environment.
///
/// An explicitly given configuration file must exist. The default one is
/// optional.
fn resolve_settings(explicit: Option<PathBuf>) -> Result<Settings> {
    let (path, required) = match explicit {
        Some(path) => (path, true),
        None => (default_config_path()?, false),
    };

    let settings = match read_to_string(&path) {
        Ok(data) => data
            .parse::<Settings>()
            .with_context(|| format!("invalid configuration file {path:?}"))?,
        Err(err) if err.kind() == ErrorKind::NotFound && !required => {
            debug!("no configuration file at {path:?}, using defaults");
            Settings::default()
        }
        Err(err) => return Err(anyhow!(err).context(format!("cannot read {path:?}"))),
    };

    Ok(settings.with_env()?)
}

async fn run_serve(mut settings: Settings, opts: ServeOptions) -> Result<()> {
    if let Some(bind) = opts.bind {
        settings.bind = bind;
    }
    settings.validate()?;

    let service = Arc::new(GridService::from_settings(&settings));
    http::serve(settings.bind, service).await?;

    Ok(())
}

async fn run_show(settings: Settings) -> Result<()> {
    settings.validate()?;

    let service = GridService::from_settings(&settings);
    let grid = service.fetch_grid().await;

    println!("\t{}", settings.people.join("\t"));
    for (day, cells) in grid.rows() {
        let cells = cells.iter().map(|cell| cell.as_str()).collect::<Vec<_>>();
        println!("{day}\t{}", cells.join("\t"));
    }

    Ok(())
}

async fn run_sync(settings: Settings) -> Result<()> {
    settings.validate()?;

    let verdict = GridService::from_settings(&settings).sync().await;
    if verdict.success {
        println!("{}", verdict.message);
        Ok(())
    } else {
        Err(anyhow!(verdict.message))
    }
}

fn run_config(settings: Settings) -> Result<()> {
    settings.validate()?;
    print!("{settings}");

    Ok(())
}
