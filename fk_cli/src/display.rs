//! Display utilities for progress rendering and error output.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use console::style;
use indicatif::{HumanBytes, MultiProgress, ProgressBar, ProgressStyle};

use fk_core::Error;
use fk_io::executor::Phase;
use fk_io::progress::{BuildProgress, ProgressCallback};

/// Progress styles used during install runs.
pub struct ProgressStyles {
    pub spinner: ProgressStyle,
    pub done: ProgressStyle,
}

impl Default for ProgressStyles {
    fn default() -> Self {
        Self {
            spinner: ProgressStyle::default_spinner()
                .template("    {prefix:<16} {spinner:.cyan} {msg}")
                .unwrap()
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
            done: ProgressStyle::default_spinner()
                .template("    {prefix:<16} {msg}")
                .unwrap(),
        }
    }
}

/// One spinner per formula, driven by executor events.
pub fn create_progress_callback(
    multi: MultiProgress,
    styles: ProgressStyles,
) -> Arc<ProgressCallback> {
    let bars: Arc<Mutex<HashMap<String, ProgressBar>>> = Arc::new(Mutex::new(HashMap::new()));
    let spinner_style = styles.spinner;
    let done_style = styles.done;

    Arc::new(move |event| {
        let mut bars = bars.lock().unwrap();
        match event {
            BuildProgress::Planned { count } => {
                let noun = if count == 1 { "formula" } else { "formulas" };
                multi
                    .println(format!(
                        "{} Building {} {}",
                        style("==>").cyan().bold(),
                        count,
                        noun
                    ))
                    .ok();
            }
            BuildProgress::PhaseChanged { formula, phase } => {
                let pb = bars.entry(formula.clone()).or_insert_with(|| {
                    let pb = multi.add(ProgressBar::new_spinner());
                    pb.set_style(spinner_style.clone());
                    pb.set_prefix(formula.clone());
                    pb.enable_steady_tick(std::time::Duration::from_millis(80));
                    pb
                });
                match phase {
                    Phase::Done => {
                        pb.set_style(done_style.clone());
                        pb.set_message(format!("{} installed", style("✓").green()));
                        pb.finish();
                    }
                    Phase::Failed => {
                        pb.set_style(done_style.clone());
                        pb.set_message(format!("{} failed", style("✗").red()));
                        pb.finish();
                    }
                    other => pb.set_message(format!("{other}...")),
                }
            }
            BuildProgress::DownloadStarted { formula, url, .. } => {
                if let Some(pb) = bars.get(&formula) {
                    pb.set_message(format!("downloading {}", short_url(&url)));
                }
            }
            BuildProgress::DownloadProgress {
                formula,
                downloaded,
                total_bytes,
            } => {
                if let Some(pb) = bars.get(&formula) {
                    let msg = match total_bytes {
                        Some(total) => format!(
                            "downloading {} / {}",
                            HumanBytes(downloaded),
                            HumanBytes(total)
                        ),
                        None => format!("downloading {}", HumanBytes(downloaded)),
                    };
                    pb.set_message(msg);
                }
            }
            BuildProgress::DownloadCompleted { formula, .. } => {
                if let Some(pb) = bars.get(&formula) {
                    pb.set_message("downloaded");
                }
            }
            BuildProgress::CacheHit { formula } => {
                if let Some(pb) = bars.get(&formula) {
                    pb.set_message("cached");
                }
            }
            BuildProgress::StepStarted { formula, step } => {
                if let Some(pb) = bars.get(&formula) {
                    pb.set_message(truncate(&step, 60));
                }
            }
            BuildProgress::StepFinished { .. } => {}
            BuildProgress::AlreadyInstalled { formula } => {
                multi
                    .println(format!(
                        "    {:<16} {} already installed",
                        formula,
                        style("✓").green()
                    ))
                    .ok();
            }
            BuildProgress::Installed { .. } => {}
            BuildProgress::TestPassed { formula } => {
                if let Some(pb) = bars.get(&formula) {
                    pb.set_message("test passed");
                }
            }
        }
    })
}

fn short_url(url: &str) -> String {
    url.rsplit('/').next().unwrap_or(url).to_string()
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max).collect();
        format!("{cut}…")
    }
}

pub fn print_error(error: &Error) {
    eprintln!("{} {}", style("Error:").red().bold(), error);
}
