use std::io::Write;
use std::process::ExitCode;

use anyhow::{Context, bail};
use clap::Parser;
use sass_watcher::cli::Cli;
use sass_watcher::{Runner, Settings, WatchNotification, WatcherControllerBuilder, logging};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut settings = load_settings(&cli)?;

    if let Some(level) = logging::level_for_verbosity(cli.verbose) {
        settings.logging.default = level.to_string();
    }
    logging::init_with_config(&settings.logging);

    let sass_path = std::env::var("SASS_PATH").ok();
    cli.apply_to(&mut settings.watch, sass_path.as_deref());

    let input = cli.input_path();
    let runner = Runner::new(&input)
        .with_output(cli.output_path())
        .with_command(cli.command.clone());

    let (mut controller, mut notifications) = WatcherControllerBuilder::from_config(&settings.watch)
        .entry(&input)
        .spawn()
        .context("Failed to start watcher")?;

    sass_watcher::log_event!("cli", "watching", "{}", input.display());

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                sass_watcher::log_event!("cli", "interrupted");
                break;
            }
            notification = notifications.recv() => match notification {
                Some(WatchNotification::Init) | Some(WatchNotification::Update) => {
                    process_update(&runner, cli.verbose).await;
                }
                Some(WatchNotification::Error(e)) => {
                    tracing::error!("[watcher] {e}");
                }
                None => break,
            }
        }
    }

    controller.shutdown().await;
    Ok(())
}

fn load_settings(cli: &Cli) -> anyhow::Result<Settings> {
    match &cli.config {
        Some(path) => {
            if !path.is_file() {
                bail!("Configuration file not found: {}", path.display());
            }
            Settings::load_from(path)
                .map_err(|e| anyhow::anyhow!("{e}"))
                .with_context(|| format!("Invalid configuration in {}", path.display()))
        }
        None => Settings::load()
            .map_err(|e| anyhow::anyhow!("{e}"))
            .context("Invalid configuration"),
    }
}

async fn process_update(runner: &Runner, verbosity: u8) {
    if let Err(e) = runner.run().await {
        tracing::error!("[runner] {e}");
    }

    if verbosity == 1 {
        let mut stderr = std::io::stderr();
        let _ = write!(stderr, ".");
        let _ = stderr.flush();
    }
}
