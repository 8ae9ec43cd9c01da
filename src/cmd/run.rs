//! One full test run: `provcheck run`.

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use provcheck::harness_config::CliOverrides;
use provcheck::lifecycle::Verdict;

use super::super::Cli;

pub async fn cmd_run(cli: &Cli, project_dir: PathBuf, overrides: CliOverrides) -> Result<Verdict> {
    use chrono::Utc;
    use provcheck::config::Config;
    use provcheck::engine::TerraformCli;
    use provcheck::lifecycle::{Harness, TestRun};
    use provcheck::report::{ReportLogger, RunReport};
    use provcheck::ui::HarnessUI;
    use provcheck::verify::{AzureCli, VerificationSuite};

    let config = Config::new(project_dir, cli.verbose, overrides)?;
    config.ensure_directories()?;
    let harness_config = config.harness();

    let settings = harness_config.settings()?;
    let suite = if harness_config.verification_enabled() {
        VerificationSuite::linux_vm(&harness_config.toml.verification.expected_os_version)
    } else {
        VerificationSuite::new()
    };

    let engine = Arc::new(
        TerraformCli::new(harness_config.terraform_cmd())
            .with_interrupt_grace(settings.cancel_grace),
    );
    let api = Arc::new(AzureCli::new(harness_config.az_cmd()));
    let harness = Harness::new(engine, api, suite, settings);

    let mut run = TestRun::new(
        harness_config.provisioning_options(),
        harness_config.subscription_id(),
    );

    let ui = Arc::new(HarnessUI::new(cli.verbose));
    ui.start(
        &run.id().to_string(),
        &run.options().working_dir,
        settings.deadline,
    );
    if !harness_config.verification_enabled() {
        ui.log_step("verification disabled, apply success alone counts as a pass");
    }

    let ticker = {
        let ui = Arc::clone(&ui);
        tokio::spawn(async move {
            let started = tokio::time::Instant::now();
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            loop {
                interval.tick().await;
                ui.update_elapsed(started.elapsed());
            }
        })
    };

    let started_at = Utc::now();
    let result = harness.execute(&mut run).await;
    ticker.abort();
    let report = result?;

    let logger = ReportLogger::new(&config.runs_dir);
    let report_path = match logger.save(&RunReport::new(&run, &report, started_at)) {
        Ok(path) => Some(path),
        Err(e) => {
            tracing::warn!(error = %e, "could not write run report");
            eprintln!("Warning: could not write run report: {:#}", e);
            None
        }
    };

    ui.summary(&report, report_path.as_deref());
    Ok(report.verdict())
}
