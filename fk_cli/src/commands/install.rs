//! Install command implementation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use console::style;
use indicatif::MultiProgress;

use fk_core::{Error, TargetPlatform, Toolchain, resolve};
use fk_io::catalog::{load_catalog, load_formula_file};
use fk_io::executor::{Executor, ExecutorConfig, InstallReport};

use crate::display::{ProgressStyles, create_progress_callback};

pub struct InstallRequest {
    pub prefix: PathBuf,
    pub formula_dir: PathBuf,
    /// Formula name in the catalog, or a path to a `.rb` file.
    pub formula: String,
    pub target: TargetPlatform,
    pub jobs: usize,
    pub step_timeout: Option<Duration>,
    pub run_tests: bool,
    pub cc: Option<String>,
    pub cxx: Option<String>,
}

pub async fn run_install(request: InstallRequest) -> Result<(), Error> {
    let mut catalog = load_catalog(&request.formula_dir)?;

    // A path argument installs a formula file directly, still resolving its
    // dependencies against the catalog.
    let root = if request.formula.ends_with(".rb") && Path::new(&request.formula).exists() {
        let spec = load_formula_file(Path::new(&request.formula))?;
        let name = spec.name.clone();
        catalog.insert(name.clone(), spec);
        name
    } else {
        request.formula.clone()
    };

    let mut resolution = resolve(&root, &catalog, &request.target)?;
    if request.cc.is_some() || request.cxx.is_some() {
        let base = resolution.toolchain.clone().unwrap_or_default();
        resolution.toolchain = Some(Toolchain {
            cc: request.cc.clone().unwrap_or(base.cc),
            cxx: request.cxx.clone().unwrap_or(base.cxx),
        });
    }

    let multi = MultiProgress::new();
    let callback = create_progress_callback(multi, ProgressStyles::default());

    let executor = Executor::with_progress(
        ExecutorConfig {
            prefix: request.prefix.clone(),
            target: request.target.clone(),
            jobs: request.jobs,
            step_timeout: request.step_timeout,
            run_tests: request.run_tests,
        },
        callback,
    )
    .map_err(|e| Error::BuildStepFailure {
        step: "initialize install tree".to_string(),
        exit_code: None,
        output: format!("{}: {}", request.prefix.display(), e),
    })?;

    let report = executor.install_plan(&root, &resolution, &catalog).await?;
    println!("{}", format_summary(&report));
    Ok(())
}

/// One-line run summary printed after all spinners finish.
pub fn format_summary(report: &InstallReport) -> String {
    match (report.installed.len(), report.already_installed.len()) {
        (0, 0) => format!("{} nothing to do", style("==>").cyan().bold()),
        (0, skipped) => format!(
            "{} {} already installed, nothing to do",
            style("==>").cyan().bold(),
            skipped
        ),
        (built, 0) => format!("{} installed {} formulas", style("==>").cyan().bold(), built),
        (built, skipped) => format!(
            "{} installed {} formulas ({} already present)",
            style("==>").cyan().bold(),
            built,
            skipped
        ),
    }
}
