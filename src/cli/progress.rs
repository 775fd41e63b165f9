//! Progress bar and summary reporting for CLI downloads.

use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::{
    CollectedReports, FileStats, SyncSummary, TransferProgress, format_bytes, format_duration,
};

const SEPARATOR: &str = "────────────────────────────────────────────────────────────";

/// Resolution of the batch bar; one step is a tenth of a percent.
const BAR_STEPS: u64 = 1000;

/// Batch progress bar driven by [`TransferProgress`] events.
pub struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    /// Creates a bar for a batch of `files` downloads.
    pub fn new(files: usize) -> Self {
        let bar = ProgressBar::new(BAR_STEPS);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} [{bar:40.green/white}] {percent:>3}% ({prefix}) - {msg}",
            )
            .expect("progress template is valid")
            .progress_chars("━━╌"),
        );
        bar.set_prefix(format!("{files} file(s)"));
        Self { bar }
    }

    /// Removes the bar from the terminal.
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl TransferProgress for CliProgress {
    fn on_file_start(&self, name: &str) {
        self.bar.set_message(name.to_string());
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn on_batch_progress(&self, percent: f64) {
        self.bar.set_position((percent * 10.0).round() as u64);
    }

    fn on_file_complete(&self, name: &str, stats: &FileStats) {
        self.bar.println(format!(
            "  {} {name} - {} in {} ({}/s)",
            style("✓").green(),
            format_bytes(stats.size),
            format_duration(stats.elapsed),
            format_bytes(stats.average_speed),
        ));
    }

    fn on_error(&self, name: &str, error: &str) {
        self.bar
            .println(format!("  {} {name}: {error}", style("✗").red()));
    }
}

/// Prints the reports about to be downloaded.
pub fn print_report_list(collected: &CollectedReports, window: &str) {
    let skipped = collected.skipped.len();
    if collected.to_download.is_empty() && skipped == 0 {
        println!("No reports found {window}.");
        return;
    }

    println!("\n{SEPARATOR}");
    println!("Reports {window}:");
    println!("{SEPARATOR}");

    for entry in &collected.to_download {
        println!("  {}", entry.name);
    }

    println!("{SEPARATOR}");
    println!("  {} report(s) to download", collected.to_download.len());
    if skipped > 0 {
        println!("  {skipped} report(s) skipped (already downloaded in past)");
    }
    println!("{SEPARATOR}\n");
}

/// Prints the end-of-run summary, listing every failure.
pub fn print_summary(summary: &SyncSummary) {
    println!("\n{SEPARATOR}");
    println!("Download Summary");
    println!("{SEPARATOR}");

    println!("  Downloaded:        {}", summary.downloaded());
    if summary.downloaded() > 0 {
        println!("  Total size:        {}", format_bytes(summary.total_bytes()));
        println!("  Total time:        {}", format_duration(summary.elapsed));
        println!(
            "  Average speed:     {}/s",
            format_bytes(summary.average_speed())
        );
    }
    println!("  Skipped:           {}", summary.skipped.len());

    if summary.failed() > 0 {
        println!(
            "  {}",
            style(format!("Failed:            {}", summary.failed())).red()
        );
        for failure in summary.failures() {
            println!(
                "    {}: {}",
                failure.name,
                failure.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    println!("  Saved to:          {}", summary.destination.display());
    println!("{SEPARATOR}");
}
