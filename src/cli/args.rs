use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use serde::{Deserialize, Serialize};

use crate::domain::parse_duration;
use crate::error::HoundError;
use crate::storage::SuccessLevel;

#[derive(Parser)]
#[command(name = "hound")]
#[command(about = "Interval training sessions with pausable steps and live progress")]
#[command(long_about = "hound - interval training from the terminal

A session is a few short warmup steps followed by one step of your target
length. Steps run one after another with a live progress bar; press Enter
to pause or resume, q + Enter to abandon.

QUICK START:
  hound plan 5m             Preview the steps for a five minute target
  hound train 5m            Run a session and save the result
  hound history --days 7    Sessions from the last week
  hound stats               Totals and success rate

TARGETS:
  300, 90s, 5m, 1h30m       Bare numbers are seconds

OUTPUT FORMATS:
  --output pretty    Human-readable colored output (default)
  --output json      Machine-readable JSON for scripting")]
#[command(version, propagate_version = true)]
pub struct Cli {
    /// Output format for command results
    #[arg(short, long, value_enum, default_value = "pretty", global = true)]
    pub output: OutputFormat,

    /// Config file to use instead of ~/.hound/config.yaml
    #[arg(short, long, global = true, env = "HOUND_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log debug diagnostics to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format for command results.
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable colored output.
    #[default]
    Pretty,
    /// Machine-readable JSON output.
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Preview the step plan for a target
    ///
    /// # Examples
    ///
    ///   hound plan 300
    ///   hound plan 5m --seed 7 -o json
    #[command(alias = "p")]
    Plan(PlanArgs),

    /// Run a training session
    ///
    /// Steps start one after another. While a step runs:
    ///
    ///   Enter        pause / resume the current step
    ///   q + Enter    abandon the session (nothing is saved)
    ///   Ctrl-C       abandon the session
    ///
    /// # Examples
    ///
    ///   hound train 2m
    ///   hound train 90s --success great --comment "felt easy"
    #[command(alias = "t")]
    Train(TrainArgs),

    /// List finished sessions, newest first
    #[command(alias = "h")]
    History(HistoryArgs),

    /// Show aggregate statistics
    Stats(StatsArgs),

    /// Generate shell completions
    ///
    /// # Examples
    ///
    ///   hound completions zsh > ~/.zsh/completions/_hound
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args)]
pub struct PlanArgs {
    /// Target duration (e.g. 300, 90s, 5m, 1h30m)
    pub target: String,

    /// Seed for a reproducible plan
    #[arg(long)]
    pub seed: Option<u64>,
}

#[derive(Args)]
pub struct TrainArgs {
    /// Target duration (e.g. 300, 90s, 5m, 1h30m)
    pub target: String,

    /// User to record the session for
    #[arg(short, long)]
    pub user: Option<String>,

    /// Session id (random when omitted)
    #[arg(long)]
    pub id: Option<String>,

    /// How the session went
    #[arg(short, long, default_value = "ok")]
    pub success: SuccessLevel,

    /// Free-form note stored with the session
    #[arg(long, default_value = "")]
    pub comment: String,

    /// Seed for a reproducible plan
    #[arg(long)]
    pub seed: Option<u64>,

    /// Do not store the finished session
    #[arg(long)]
    pub no_save: bool,
}

#[derive(Args)]
pub struct HistoryArgs {
    /// User whose sessions to show
    #[arg(short, long)]
    pub user: Option<String>,

    /// Only sessions finished in the last N days
    #[arg(short, long)]
    pub days: Option<u32>,

    /// Maximum number of sessions to show
    #[arg(short = 'n', long, default_value = "20")]
    pub limit: usize,
}

#[derive(Args)]
pub struct StatsArgs {
    /// User whose sessions to summarise
    #[arg(short, long)]
    pub user: Option<String>,
}

/// Parse a target duration argument into seconds.
///
/// # Errors
///
/// Returns [`HoundError::InvalidDuration`] for zero or negative numbers and
/// [`HoundError::InvalidArgument`] for anything else that is not a duration.
pub fn parse_target(input: &str) -> Result<i64, HoundError> {
    if let Ok(seconds) = input.trim().parse::<i64>() {
        return if seconds > 0 {
            Ok(seconds)
        } else {
            Err(HoundError::InvalidDuration(seconds))
        };
    }

    parse_duration(input)
        .and_then(|s| i64::try_from(s).ok())
        .ok_or_else(|| {
            HoundError::InvalidArgument(format!(
                "'{input}' is not a duration (try 300, 90s, 5m or 1h30m)"
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_target() {
        assert_eq!(parse_target("300").unwrap(), 300);
        assert_eq!(parse_target("5m").unwrap(), 300);
        assert_eq!(parse_target("1h30m").unwrap(), 5400);
        assert!(matches!(parse_target("0"), Err(HoundError::InvalidDuration(0))));
        assert!(matches!(parse_target("-5"), Err(HoundError::InvalidDuration(-5))));
        assert!(matches!(parse_target("soon"), Err(HoundError::InvalidArgument(_))));
    }

    #[test]
    fn test_train_args() {
        let cli = Cli::try_parse_from([
            "hound", "train", "90s", "--success", "great", "--no-save", "-o", "json",
        ])
        .unwrap();

        assert_eq!(cli.output, OutputFormat::Json);
        match cli.command {
            Commands::Train(args) => {
                assert_eq!(args.target, "90s");
                assert_eq!(args.success, SuccessLevel::Great);
                assert!(args.no_save);
                assert!(args.user.is_none());
            }
            _ => panic!("expected train"),
        }
    }

    #[test]
    fn test_bad_success_level_rejected() {
        assert!(Cli::try_parse_from(["hound", "train", "60", "--success", "meh"]).is_err());
    }
}
