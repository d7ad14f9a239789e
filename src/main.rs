mod cli;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use log::{error, info};
use mxt_plugin_release::{GitHubClient, Outcome, Paths, Pipeline, Plugins, RunOptions, git};

fn main() {
    let args = cli::Args::parse();
    init_logging(args.verbose);

    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("FATAL: Failed to create Tokio runtime: {e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = rt.block_on(run(args)) {
        error!("{e:#}");
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .format(|buf, record| {
            use std::io::Write;
            writeln!(
                buf,
                "[{} {} {}:{}] {}",
                buf.timestamp_millis(),
                record.level(),
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .filter_level(level)
        .parse_default_env()
        .init();
}

async fn run(args: cli::Args) -> Result<()> {
    let plugins = Plugins::load(&args.config)?;
    let plugin = plugins.get(&args.plugin).ok_or_else(|| {
        anyhow!(
            "plugin {} not found in {} (configured: {})",
            args.plugin,
            args.config.display(),
            plugins.names().collect::<Vec<_>>().join(", ")
        )
    })?;

    if !args.ignore_branch {
        git::ensure_branch(&plugin.branch)?;
    }

    let publish = if args.publish {
        Some(git::origin_repository().context("Failed to determine publish target")?)
    } else {
        None
    };

    let client = GitHubClient::with_api_url(&args.api_url, args.token.clone())
        .context("Failed to build GitHub client")?;
    let pipeline = Pipeline::new(
        &client,
        Paths {
            output_dir: args.output_dir.clone(),
            state_dir: args.state_dir.clone(),
            scratch_root: args.scratch_dir.clone(),
        },
    );
    let options = RunOptions {
        force: args.force,
        publish,
    };

    match pipeline
        .run(plugin, &options)
        .await
        .with_context(|| format!("Failed to process plugin {}", plugin.name))?
    {
        Outcome::Skipped { version } => {
            info!("Nothing to do: {} {} is up to date", plugin.name, version);
        }
        Outcome::Packaged(state) => {
            for (arch, package) in &state.assets {
                info!("{arch}: {}", package.display());
            }
        }
    }
    Ok(())
}
