use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use provcheck::harness_config::{parse_duration, parse_var};

mod cmd;

#[derive(Parser)]
#[command(name = "provcheck")]
#[command(
    version,
    about = "Provision infrastructure, verify it, and always tear it down"
)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Directory containing `.provcheck/` (defaults to the current directory)
    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Apply, verify under a deadline, then tear down
    Run {
        /// Terraform definition directory, relative to the project directory
        #[arg(long)]
        terraform_dir: Option<PathBuf>,

        /// Input variable passed to apply and destroy (repeatable)
        #[arg(long = "var", value_name = "KEY=VALUE", value_parser = parse_var)]
        vars: Vec<(String, String)>,

        /// Deadline for apply + verify (e.g. "900", "15m", "1h")
        #[arg(long, value_parser = parse_duration)]
        deadline: Option<Duration>,

        /// Maximum destroy attempts
        #[arg(long)]
        max_attempts: Option<u32>,

        /// Pause between destroy attempts (e.g. "30s")
        #[arg(long, value_parser = parse_duration)]
        retry_interval: Option<Duration>,

        /// Subscription to verify against. Overrides ARM_SUBSCRIPTION_ID.
        #[arg(long)]
        subscription: Option<String>,

        /// Skip the verification suite; apply success alone counts as a pass
        #[arg(long)]
        no_verify: bool,
    },
    /// Tear down the configured deployment without applying
    Destroy {
        /// Skip confirmation prompt
        #[arg(long)]
        yes: bool,

        /// Terraform definition directory, relative to the project directory
        #[arg(long)]
        terraform_dir: Option<PathBuf>,

        /// Input variable passed to destroy (repeatable)
        #[arg(long = "var", value_name = "KEY=VALUE", value_parser = parse_var)]
        vars: Vec<(String, String)>,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
    /// List recorded runs, or show one
    Report {
        /// Run id to show (lists all runs when omitted)
        run_id: Option<String>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Initialize a default provcheck.toml file
    Init,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    provcheck::logging::init(cli.verbose);

    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    match &cli.command {
        Commands::Run {
            terraform_dir,
            vars,
            deadline,
            max_attempts,
            retry_interval,
            subscription,
            no_verify,
        } => {
            let overrides = provcheck::harness_config::CliOverrides {
                terraform_dir: terraform_dir.clone(),
                vars: vars.clone(),
                deadline: *deadline,
                max_attempts: *max_attempts,
                retry_interval: *retry_interval,
                subscription_id: subscription.clone(),
                no_verify: *no_verify,
            };
            let verdict = cmd::cmd_run(&cli, project_dir, overrides).await?;
            return Ok(ExitCode::from(verdict.exit_code()));
        }
        Commands::Destroy {
            yes,
            terraform_dir,
            vars,
        } => {
            let overrides = provcheck::harness_config::CliOverrides {
                terraform_dir: terraform_dir.clone(),
                vars: vars.clone(),
                ..Default::default()
            };
            let verdict = cmd::cmd_destroy(&cli, project_dir, overrides, *yes).await?;
            return Ok(ExitCode::from(verdict.exit_code()));
        }
        Commands::Config { command } => cmd::cmd_config(&project_dir, command.clone())?,
        Commands::Report { run_id } => cmd::cmd_report(&project_dir, run_id.as_deref())?,
    }

    Ok(ExitCode::SUCCESS)
}
