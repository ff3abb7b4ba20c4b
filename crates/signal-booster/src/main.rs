//! signal-booster - session-oriented network optimizer.
//!
//! `start` applies the optimization stages and keeps them active until
//! the user stops the session, at which point everything is rolled
//! back. `test` and `info` are read-only.

mod commands;
mod logging;
mod monitor_view;
mod output;

use booster_common::{BoostError, OptimizationLevel};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "signal-booster")]
#[command(about = "Network optimizer with staged, fully reversible tuning", long_about = None)]
#[command(version = booster_common::VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an optimization session (Ctrl+C stops it and rolls back)
    Start {
        /// Target download speed in Mbps, shown in the monitor view
        #[arg(long = "target-speed", value_name = "MBPS")]
        target_speed: Option<f64>,

        /// Optimization level: light, standard, aggressive or extreme
        #[arg(long, value_name = "LEVEL")]
        level: Option<OptimizationLevel>,

        /// Shorthand for --level aggressive
        #[arg(long)]
        aggressive: bool,

        /// Show the live monitor view while the session is active
        #[arg(long)]
        monitor: bool,
    },

    /// Run read-only diagnostics and print a report
    Test,

    /// Print a system and network snapshot
    Info,
}

#[tokio::main]
async fn main() {
    logging::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Start {
            target_speed,
            level,
            aggressive,
            monitor,
        } => {
            commands::start::run(commands::start::StartArgs {
                target_speed,
                level,
                aggressive,
                monitor,
            })
            .await
        }
        Commands::Test => commands::test::run(),
        Commands::Info => commands::info::run(),
    };

    if let Err(err) = result {
        let code = err
            .downcast_ref::<BoostError>()
            .map(|e| e.exit_code())
            .unwrap_or(1);
        eprintln!("error: {:#}", err);
        std::process::exit(code);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_flags_parse() {
        let cli = Cli::try_parse_from([
            "signal-booster",
            "start",
            "--target-speed",
            "100",
            "--aggressive",
            "--monitor",
        ])
        .unwrap();
        match cli.command {
            Commands::Start {
                target_speed,
                level,
                aggressive,
                monitor,
            } => {
                assert_eq!(target_speed, Some(100.0));
                assert!(level.is_none());
                assert!(aggressive);
                assert!(monitor);
            }
            _ => panic!("expected start"),
        }
    }

    #[test]
    fn test_level_flag_parses_named_levels() {
        let cli =
            Cli::try_parse_from(["signal-booster", "start", "--level", "extreme"]).unwrap();
        match cli.command {
            Commands::Start { level, .. } => assert_eq!(level, Some(OptimizationLevel::Extreme)),
            _ => panic!("expected start"),
        }
    }

    #[test]
    fn test_unknown_level_is_rejected_at_parse_time() {
        assert!(Cli::try_parse_from(["signal-booster", "start", "--level", "turbo"]).is_err());
    }

    #[test]
    fn test_bare_subcommands_parse() {
        assert!(Cli::try_parse_from(["signal-booster", "test"]).is_ok());
        assert!(Cli::try_parse_from(["signal-booster", "info"]).is_ok());
        assert!(Cli::try_parse_from(["signal-booster"]).is_err());
    }
}
