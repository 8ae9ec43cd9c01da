//! Configuration view and validation commands: `provcheck config`.

use anyhow::Result;

use super::super::ConfigCommands;

pub fn cmd_config(project_dir: &std::path::Path, command: Option<ConfigCommands>) -> Result<()> {
    use provcheck::config::get_harness_dir;
    use provcheck::harness_config::{CONFIG_FILE, CliOverrides, HarnessConfig, HarnessToml};

    let harness_dir = get_harness_dir(project_dir);
    let config_path = harness_dir.join(CONFIG_FILE);

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("provcheck Configuration");
            println!("=======================");
            println!();

            let toml = if config_path.exists() {
                println!("Config file: {}", config_path.display());
                HarnessToml::load(&config_path)?
            } else {
                println!("No provcheck.toml found at {}", config_path.display());
                println!("Using default configuration.");
                HarnessToml::default()
            };
            println!();

            println!("[provisioning]");
            println!(
                "  terraform_dir = \"{}\"",
                toml.provisioning.terraform_dir.display()
            );
            if let Some(cmd) = &toml.provisioning.terraform_cmd {
                println!("  terraform_cmd = \"{}\"", cmd);
            }
            for (key, value) in &toml.provisioning.vars {
                println!("  vars.{} = \"{}\"", key, value);
            }
            println!();

            println!("[run]");
            println!("  deadline_secs = {}", toml.run.deadline_secs);
            println!("  cancel_grace_secs = {}", toml.run.cancel_grace_secs);
            println!();

            println!("[teardown]");
            println!("  max_attempts = {}", toml.teardown.max_attempts);
            println!("  interval_secs = {}", toml.teardown.interval_secs);
            println!();

            println!("[verification]");
            println!("  enabled = {}", toml.verification.enabled);
            println!(
                "  expected_os_version = \"{}\"",
                toml.verification.expected_os_version
            );
            println!();

            // Effective values include env overrides
            println!("Effective values (with env overrides):");
            let config =
                HarnessConfig::new(project_dir.to_path_buf(), toml, CliOverrides::default());
            println!("  terraform_cmd = \"{}\"", config.terraform_cmd());
            println!("  az_cmd = \"{}\"", config.az_cmd());
            println!("  terraform_dir = \"{}\"", config.terraform_dir().display());
            let subscription = config.subscription_id();
            if subscription.is_empty() {
                println!("  subscription_id = (az default)");
            } else {
                println!("  subscription_id = \"{}\"", subscription);
            }
            println!();

            if !config_path.exists() {
                println!("Run 'provcheck config init' to create a provcheck.toml file.");
                println!();
            }
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            if !config_path.exists() {
                println!("No provcheck.toml found. Using defaults (valid).");
                return Ok(());
            }

            let toml = HarnessToml::load(&config_path)?;
            let warnings = toml.validate();

            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("provcheck.toml already exists at {}", config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            if !harness_dir.exists() {
                std::fs::create_dir_all(&harness_dir)?;
            }

            let toml = HarnessToml::default();
            toml.save(&config_path)?;

            println!("Created provcheck.toml at {}", config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - [provisioning] terraform_dir, terraform_cmd, vars");
            println!("  - [run] deadline_secs, cancel_grace_secs");
            println!("  - [teardown] max_attempts, interval_secs");
            println!("  - [azure] subscription_id, az_cmd");
            println!();
        }
    }

    Ok(())
}
