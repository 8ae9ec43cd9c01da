//! Recorded run reports: `provcheck report`.

use anyhow::{Context, Result};
use std::path::Path;

pub fn cmd_report(project_dir: &Path, run_id: Option<&str>) -> Result<()> {
    use provcheck::config::get_harness_dir;
    use provcheck::lifecycle::Verdict;
    use provcheck::report::ReportLogger;
    use uuid::Uuid;

    let logger = ReportLogger::new(&get_harness_dir(project_dir).join("runs"));

    let Some(run_id) = run_id else {
        let reports = logger.list()?;
        println!();
        if reports.is_empty() {
            println!("No runs recorded yet. Run 'provcheck run' first.");
            println!();
            return Ok(());
        }

        println!("{:<38} {:<20} {:<15} Outcome", "Run", "Started", "Verdict");
        println!(
            "{:<38} {:<20} {:<15} -------",
            "------------------------------------", "-------------------", "-------------"
        );
        for report in &reports {
            let verdict = match report.verdict {
                Verdict::Passed => console::style("passed").green(),
                Verdict::PhaseFailed => console::style("failed").red(),
                Verdict::TeardownFatal => console::style("teardown_fatal").red().bold(),
            };
            println!(
                "{:<38} {:<20} {:<15} {}",
                report.run_id,
                report.started_at.format("%Y-%m-%d %H:%M:%S"),
                verdict,
                report.outcome.label()
            );
        }
        println!();
        return Ok(());
    };

    let id = Uuid::parse_str(run_id).with_context(|| format!("Invalid run id '{}'", run_id))?;
    let report = logger.load(id)?;

    println!();
    println!("Run {}", report.run_id);
    println!("  Started:      {}", report.started_at.to_rfc3339());
    println!("  Ended:        {}", report.ended_at.to_rfc3339());
    println!("  Directory:    {}", report.options.working_dir.display());
    for (key, value) in &report.options.vars {
        println!("  Var:          {}={}", key, value);
    }
    if !report.subscription_id.is_empty() {
        println!("  Subscription: {}", report.subscription_id);
    }
    println!("  Final state:  {}", report.final_state);
    println!("  Outcome:      {}", report.outcome);
    println!("  Phase:        {:.1}s", report.phase_duration_secs);
    println!(
        "  Teardown:     {} after {} attempt(s) in {:.1}s",
        if report.teardown.succeeded { "succeeded" } else { "FAILED" },
        report.teardown.attempts_used,
        report.teardown_duration_secs
    );
    if let Some(err) = &report.teardown.last_error {
        println!("  Last error:   {}", err);
    }
    for line in &report.diagnostics {
        println!("  {}", console::style(line).yellow());
    }
    println!();
    Ok(())
}
