//! Teardown only: `provcheck destroy`.

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;

use provcheck::harness_config::CliOverrides;
use provcheck::lifecycle::Verdict;

use super::super::Cli;

pub async fn cmd_destroy(
    cli: &Cli,
    project_dir: PathBuf,
    overrides: CliOverrides,
    yes: bool,
) -> Result<Verdict> {
    use console::style;
    use dialoguer::Confirm;
    use provcheck::config::Config;
    use provcheck::engine::TerraformCli;
    use provcheck::lifecycle::RetryingTeardown;
    use provcheck::ui::icons::{BROOM, CROSS};

    let config = Config::new(project_dir, cli.verbose, overrides)?;
    let harness_config = config.harness();
    let policy = harness_config.retry_policy()?;
    let options = harness_config.provisioning_options();

    if !yes {
        let confirm = Confirm::new()
            .with_prompt(format!(
                "Destroy everything managed by {}?",
                options.working_dir.display()
            ))
            .default(false)
            .interact()
            .unwrap_or(false);

        if !confirm {
            println!("Destroy cancelled");
            return Ok(Verdict::Passed);
        }
    }

    let teardown = RetryingTeardown::new(Arc::new(TerraformCli::new(
        harness_config.terraform_cmd(),
    )));
    let result = teardown.teardown(&options, &policy).await;

    if result.succeeded {
        println!(
            "{}Destroy succeeded on attempt {}",
            BROOM, result.attempts_used
        );
        return Ok(Verdict::Passed);
    }

    if let Err(e) = result.into_result() {
        eprintln!("{}{}", CROSS, style(e).red().bold());
    }
    Ok(Verdict::TeardownFatal)
}
