use crate::lifecycle::{HarnessReport, Outcome, Verdict};
use crate::ui::icons::{BROOM, CHECK, CLOCK, CROSS, REPORT, ROCKET, WARN};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;

/// Terminal UI for a harness run, rendered via an `indicatif` spinner.
///
/// The spinner shows elapsed wall-clock time while the lifecycle executes; the
/// summary is printed once the run (including teardown) has finished.
pub struct HarnessUI {
    spinner: ProgressBar,
    verbose: bool,
}

impl HarnessUI {
    pub fn new(verbose: bool) -> Self {
        let spinner_style = ProgressStyle::default_spinner()
            .template("{prefix:.bold.dim} {spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());

        let spinner = ProgressBar::new_spinner();
        spinner.set_style(spinner_style);
        spinner.set_prefix("  Run");

        Self { spinner, verbose }
    }

    /// Print a line without tearing the spinner, falling back to `eprintln!`.
    fn print_line(&self, msg: impl AsRef<str>) {
        if self.spinner.is_hidden() {
            eprintln!("{}", msg.as_ref());
        } else {
            self.spinner.println(msg.as_ref());
        }
    }

    /// Announce the run and start the spinner.
    pub fn start(&self, run_id: &str, working_dir: &Path, deadline: Duration) {
        self.print_line(format!(
            "{}Run {} in {} (deadline {})",
            ROCKET,
            style(run_id).cyan(),
            style(working_dir.display()).bold(),
            format_elapsed(deadline)
        ));
        // Verbose mode streams tracing output; a spinner would interleave with it.
        if !self.verbose {
            self.spinner
                .set_message("apply, verify and teardown in progress".to_string());
            self.spinner.enable_steady_tick(Duration::from_millis(100));
        }
    }

    /// Refresh the spinner with elapsed time. Called from a periodic timer task.
    pub fn update_elapsed(&self, elapsed: Duration) {
        if self.verbose {
            return;
        }
        self.spinner.set_message(format!(
            "apply, verify and teardown in progress {}",
            style(format!("({})", format_elapsed(elapsed))).dim()
        ));
    }

    pub fn log_step(&self, msg: &str) {
        if self.verbose {
            self.print_line(format!("    {} {}", style("→").dim(), style(msg).dim()));
        }
    }

    /// Stop the spinner and print the outcome, teardown result and any diagnostics.
    pub fn summary(&self, report: &HarnessReport, report_path: Option<&Path>) {
        self.spinner.finish_and_clear();

        let phase_time = format_elapsed(report.phase_duration);
        match &report.outcome {
            Outcome::Success => self.print_line(format!(
                "{}Apply and verification passed {}",
                CHECK,
                style(format!("({})", phase_time)).dim()
            )),
            Outcome::Timeout => self.print_line(format!(
                "{}Deadline reached after {}, deployment or verification took too long",
                CLOCK,
                phase_time
            )),
            other => self.print_line(format!("{}{}", CROSS, style(other).red())),
        }

        let teardown = &report.teardown;
        if teardown.succeeded {
            self.print_line(format!(
                "{}Destroy succeeded on attempt {} {}",
                BROOM,
                teardown.attempts_used,
                style(format!("({})", format_elapsed(report.teardown_duration))).dim()
            ));
        } else {
            self.print_line(format!(
                "{}{}",
                CROSS,
                style(format!(
                    "Destroy failed after {} attempts: {}",
                    teardown.attempts_used,
                    teardown.last_error.as_deref().unwrap_or("unknown error")
                ))
                .red()
                .bold()
            ));
        }

        for line in report.diagnostics() {
            self.print_line(format!("{}{}", WARN, style(line).yellow()));
        }

        if let Some(path) = report_path {
            self.print_line(format!(
                "{}Report: {}",
                REPORT,
                style(path.display()).dim()
            ));
        }

        let verdict = match report.verdict() {
            Verdict::Passed => style("PASSED").green().bold(),
            Verdict::PhaseFailed => style("FAILED").red().bold(),
            Verdict::TeardownFatal => style("FATAL: infrastructure may be leaked").red().bold(),
        };
        self.print_line(format!("\n{}", verdict));
    }
}

/// Formats as `Xs` or `Xm Ys` when >= 60 seconds.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}s", secs)
    }
}
