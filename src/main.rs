use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;

use hound::cli::args::{Cli, Commands};
use hound::cli::commands;
use hound::config::{Config, Paths};
use hound::logging;

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {:#}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let format = cli.output;

    let paths = Paths::new()?;
    let config = match &cli.config {
        Some(path) => Config::load_from_path(path)
            .with_context(|| format!("using --config {}", path.display()))?,
        None => Config::load()?,
    };

    logging::init(&config.logging.level, cli.verbose);
    tracing::debug!(root = %paths.root.display(), "configuration loaded");

    let output = match &cli.command {
        Commands::Plan(args) => commands::plan(args, &config, format)?,
        Commands::Train(args) => commands::train(args, &config, &paths, format)?,
        Commands::History(args) => commands::history(args, &config, &paths, format)?,
        Commands::Stats(args) => commands::stats(args, &config, &paths, format)?,
        Commands::Completions { shell } => commands::completions(*shell)?,
    };

    if !output.is_empty() {
        println!("{output}");
    }
    Ok(())
}
