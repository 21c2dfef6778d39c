//! Sequential build executor.
//!
//! Runs one resolved install plan to completion, formula by formula. Each
//! formula moves through a linear phase sequence; the first failing phase
//! aborts the run and surfaces as a typed error. There is no retry and no
//! parallelism across formulas: build output interleaving is not worth the
//! complexity for source builds that are dominated by compiler time.
//!
//! Phase sequence for a two-pass (shared + static) library build:
//!
//! ```text
//! Fetching -> Verifying -> ConfiguringShared -> BuildingShared
//!          -> ConfiguringStatic -> BuildingStatic -> Installing
//!          -> Testing -> Done
//! ```
//!
//! Single-pass formulas simply never enter the static phases. A failure in
//! any phase leaves already-produced artifacts in place for inspection; a
//! failure in `Testing` specifically leaves the installed keg intact, since
//! the library itself built and installed fine.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

use fk_core::{
    BuildStep, Error, FormulaSpec, Resolution, TargetPlatform, TestSpec, Toolchain, resolve,
};

use crate::cache::SourceCache;
use crate::environment::BuildEnvironment;
use crate::expand::ExpansionContext;
use crate::extract::extract_archive;
use crate::fetch::{Fetcher, verify};
use crate::progress::{BuildProgress, ProgressCallback, null_progress};

/// The linear state machine one formula build moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Fetching,
    Verifying,
    ConfiguringShared,
    BuildingShared,
    ConfiguringStatic,
    BuildingStatic,
    Installing,
    Testing,
    Done,
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Fetching => "fetching",
            Phase::Verifying => "verifying",
            Phase::ConfiguringShared => "configuring (shared)",
            Phase::BuildingShared => "building (shared)",
            Phase::ConfiguringStatic => "configuring (static)",
            Phase::BuildingStatic => "building (static)",
            Phase::Installing => "installing",
            Phase::Testing => "testing",
            Phase::Done => "done",
            Phase::Failed => "failed",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Root of the install tree: `Cellar/`, `opt/`, `cache/`, and `build/`
    /// all live under it.
    pub prefix: PathBuf,
    pub target: TargetPlatform,
    pub jobs: usize,
    /// Kill any single build step that runs longer than this.
    pub step_timeout: Option<Duration>,
    /// Run `test do` probes after installing.
    pub run_tests: bool,
}

/// What an install run produced.
#[derive(Debug, Default)]
pub struct InstallReport {
    /// Formulas built in this run, as (name, version) pairs.
    pub installed: Vec<(String, String)>,
    /// Formulas that were already present and skipped.
    pub already_installed: Vec<String>,
}

pub struct Executor {
    config: ExecutorConfig,
    cache: SourceCache,
    fetcher: Fetcher,
    progress: Arc<ProgressCallback>,
}

impl Executor {
    pub fn new(config: ExecutorConfig) -> std::io::Result<Self> {
        Self::with_progress(config, null_progress())
    }

    pub fn with_progress(
        config: ExecutorConfig,
        progress: Arc<ProgressCallback>,
    ) -> std::io::Result<Self> {
        let cache = SourceCache::new(&config.prefix.join("cache"))?;
        Ok(Self {
            config,
            cache,
            fetcher: Fetcher::new(),
            progress,
        })
    }

    fn emit(&self, event: BuildProgress) {
        (self.progress)(event);
    }

    fn set_phase(&self, formula: &str, phase: Phase) {
        self.emit(BuildProgress::PhaseChanged {
            formula: formula.to_string(),
            phase,
        });
    }

    pub fn keg_path(&self, name: &str, version: &str) -> PathBuf {
        self.config.prefix.join("Cellar").join(name).join(version)
    }

    pub fn opt_path(&self, name: &str) -> PathBuf {
        self.config.prefix.join("opt").join(name)
    }

    pub fn is_installed(&self, name: &str) -> bool {
        self.opt_path(name).exists()
    }

    /// Resolve and build a formula with all of its dependencies.
    pub async fn install(
        &self,
        root: &str,
        catalog: &BTreeMap<String, FormulaSpec>,
    ) -> Result<InstallReport, Error> {
        let resolution = resolve(root, catalog, &self.config.target)?;
        self.install_plan(root, &resolution, catalog).await
    }

    /// Build an already-resolved plan in order.
    pub async fn install_plan(
        &self,
        root: &str,
        resolution: &Resolution,
        catalog: &BTreeMap<String, FormulaSpec>,
    ) -> Result<InstallReport, Error> {
        self.emit(BuildProgress::Planned {
            count: resolution.order.len(),
        });

        let mut report = InstallReport::default();

        for node in &resolution.order {
            let Some(spec) = catalog.get(&node.name) else {
                continue;
            };

            if self.is_installed(&node.name) {
                self.emit(BuildProgress::AlreadyInstalled {
                    formula: node.name.clone(),
                });
                report.already_installed.push(node.name.clone());
                continue;
            }

            // Only the root formula's rules substitute the toolchain;
            // dependencies resolve their own when installed standalone.
            let toolchain = if node.name == root {
                resolution.toolchain.clone().unwrap_or_default()
            } else {
                Toolchain::default()
            };

            match self.build_one(spec, &toolchain).await {
                Ok(()) => {
                    report
                        .installed
                        .push((spec.name.clone(), spec.version.clone()));
                }
                Err(e) => {
                    self.set_phase(&spec.name, Phase::Failed);
                    return Err(e);
                }
            }
        }

        Ok(report)
    }

    /// Fetch, verify, build, install, and test a single formula.
    async fn build_one(&self, spec: &FormulaSpec, toolchain: &Toolchain) -> Result<(), Error> {
        // Fetching: byte progress is emitted by the fetcher as chunks arrive.
        self.set_phase(&spec.name, Phase::Fetching);
        let (archive, cached) = self
            .fetcher
            .fetch(spec, &self.cache, &*self.progress)
            .await?;
        if cached {
            self.emit(BuildProgress::CacheHit {
                formula: spec.name.clone(),
            });
        }

        // Verifying: always, even on a cache hit.
        self.set_phase(&spec.name, Phase::Verifying);
        verify(spec, &self.cache, &archive)?;

        // Build directory persists on failure for inspection.
        let build_dir = self
            .config
            .prefix
            .join("build")
            .join(format!("{}-{}", spec.name, spec.version));
        if build_dir.exists() {
            fs::remove_dir_all(&build_dir).map_err(|e| step_error(spec, "clean build dir", e))?;
        }
        let source_root = extract_archive(&archive, &build_dir)?;

        let keg = self.keg_path(&spec.name, &spec.version);
        fs::create_dir_all(&keg).map_err(|e| step_error(spec, "create keg", e))?;

        let deps = spec.effective_dependencies(&self.config.target);
        let opt_dir = self.config.prefix.join("opt");
        let env = BuildEnvironment::new(toolchain, &deps, &opt_dir, self.config.jobs);
        let ctx = ExpansionContext {
            prefix: keg.clone(),
            opt_prefix: self.opt_path(&spec.name),
            testpath: None,
            toolchain: toolchain.clone(),
            arch: self.config.target.arch.clone(),
            jobs: self.config.jobs,
        };

        let phases = classify_steps(&spec.build_steps);
        let mut current = Phase::Verifying;
        for (step, phase) in spec.build_steps.iter().zip(phases.iter()) {
            if *phase != current {
                self.set_phase(&spec.name, *phase);
                current = *phase;
            }
            self.run_build_step(spec, step, &source_root, &keg, &env, &ctx)?;
        }

        // Materialize the stable opt path last, so an interrupted build never
        // looks installed.
        if current != Phase::Installing {
            self.set_phase(&spec.name, Phase::Installing);
        }
        self.link_opt(&spec.name, &keg)
            .map_err(|e| step_error(spec, "link opt path", e))?;

        // The build succeeded; its scratch tree is no longer interesting.
        let _ = fs::remove_dir_all(&build_dir);

        self.emit(BuildProgress::Installed {
            formula: spec.name.clone(),
            version: spec.version.clone(),
        });

        // Testing: a failure here leaves the keg and opt link in place.
        if self.config.run_tests
            && let Some(test) = &spec.test
        {
            self.set_phase(&spec.name, Phase::Testing);
            self.run_test(spec, test, &keg, &deps, &opt_dir)?;
            self.emit(BuildProgress::TestPassed {
                formula: spec.name.clone(),
            });
        }

        self.set_phase(&spec.name, Phase::Done);
        Ok(())
    }

    fn run_build_step(
        &self,
        spec: &FormulaSpec,
        step: &BuildStep,
        source_root: &Path,
        keg: &Path,
        env: &BuildEnvironment,
        ctx: &ExpansionContext,
    ) -> Result<(), Error> {
        let description = step.describe();
        self.emit(BuildProgress::StepStarted {
            formula: spec.name.clone(),
            step: description.clone(),
        });

        match step {
            BuildStep::Run { program, args } => {
                let program = ctx
                    .expand(program)
                    .into_iter()
                    .next()
                    .unwrap_or_else(|| program.clone());
                let args = ctx.expand_all(args);

                let mut command = Command::new(&program);
                command.args(&args).current_dir(source_root);
                env.apply(&mut command);

                run_command(command, &description, self.config.step_timeout, false)?;
            }
            BuildStep::InstallArtifacts { dest, sources } => {
                let dest_dir = keg.join(dest.dir_name());
                fs::create_dir_all(&dest_dir).map_err(|e| Error::BuildStepFailure {
                    step: description.clone(),
                    exit_code: None,
                    output: format!("failed to create {}: {}", dest_dir.display(), e),
                })?;

                for source in sources {
                    let from = source_root.join(ctx.expand(source).remove(0));
                    let file_name = from.file_name().ok_or_else(|| Error::BuildStepFailure {
                        step: description.clone(),
                        exit_code: None,
                        output: format!("artifact path has no file name: {}", from.display()),
                    })?;
                    fs::copy(&from, dest_dir.join(file_name)).map_err(|e| {
                        Error::BuildStepFailure {
                            step: description.clone(),
                            exit_code: None,
                            output: format!("failed to copy {}: {}", from.display(), e),
                        }
                    })?;
                }
            }
        }

        self.emit(BuildProgress::StepFinished {
            formula: spec.name.clone(),
            step: description,
        });
        Ok(())
    }

    /// Write probe sources into a scratch directory and run the probe steps.
    /// Probes always run with the stock toolchain: they check what a user of
    /// the installed library sees, not the build's substituted compiler.
    fn run_test(
        &self,
        spec: &FormulaSpec,
        test: &TestSpec,
        keg: &Path,
        deps: &[String],
        opt_dir: &Path,
    ) -> Result<(), Error> {
        let scratch = tempfile::TempDir::new().map_err(|e| Error::TestFailure {
            step: "create test directory".to_string(),
            exit_code: None,
            output: e.to_string(),
        })?;

        let ctx = ExpansionContext {
            prefix: keg.to_path_buf(),
            opt_prefix: self.opt_path(&spec.name),
            testpath: Some(scratch.path().to_path_buf()),
            toolchain: Toolchain::default(),
            arch: self.config.target.arch.clone(),
            jobs: self.config.jobs,
        };

        for file in &test.files {
            let path = scratch.path().join(&file.path);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(|e| Error::TestFailure {
                    step: format!("write {}", file.path),
                    exit_code: None,
                    output: e.to_string(),
                })?;
            }
            fs::write(&path, &file.contents).map_err(|e| Error::TestFailure {
                step: format!("write {}", file.path),
                exit_code: None,
                output: e.to_string(),
            })?;
        }

        let mut test_deps = deps.to_vec();
        test_deps.push(spec.name.clone());
        let env = BuildEnvironment::new(&ctx.toolchain, &test_deps, opt_dir, self.config.jobs);

        for step in &test.steps {
            let BuildStep::Run { program, args } = step else {
                continue;
            };
            let description = step.describe();
            self.emit(BuildProgress::StepStarted {
                formula: spec.name.clone(),
                step: description.clone(),
            });

            let program = ctx
                .expand(program)
                .into_iter()
                .next()
                .unwrap_or_else(|| program.clone());
            let args = ctx.expand_all(args);

            let mut command = Command::new(&program);
            command.args(&args).current_dir(scratch.path());
            env.apply(&mut command);

            run_command(command, &description, self.config.step_timeout, true)?;

            self.emit(BuildProgress::StepFinished {
                formula: spec.name.clone(),
                step: description,
            });
        }

        Ok(())
    }

    fn link_opt(&self, name: &str, keg: &Path) -> std::io::Result<()> {
        let opt_dir = self.config.prefix.join("opt");
        fs::create_dir_all(&opt_dir)?;

        let link = opt_dir.join(name);
        if link.exists() || link.symlink_metadata().is_ok() {
            let _ = fs::remove_file(&link);
        }
        std::os::unix::fs::symlink(keg, &link)
    }
}

fn step_error(spec: &FormulaSpec, step: &str, e: impl std::fmt::Display) -> Error {
    Error::BuildStepFailure {
        step: format!("{} ({})", step, spec.name),
        exit_code: None,
        output: e.to_string(),
    }
}

/// Assign a phase to every build step.
///
/// The first configure-style step belongs to the shared pass, later ones to
/// the static pass; an explicit `-DBUILD_SHARED_LIBS=` argument overrides the
/// positional rule. Non-configure steps inherit the current pass, and
/// install-style steps (including artifact copies) are `Installing`.
pub fn classify_steps(steps: &[BuildStep]) -> Vec<Phase> {
    let mut static_pass = false;
    let mut seen_configure = false;

    steps
        .iter()
        .map(|step| match step {
            BuildStep::InstallArtifacts { .. } => Phase::Installing,
            BuildStep::Run { program, args } => {
                if is_configure_step(program, args) {
                    if args.iter().any(|a| a == "-DBUILD_SHARED_LIBS=OFF") {
                        static_pass = true;
                    } else if args.iter().any(|a| a == "-DBUILD_SHARED_LIBS=ON") {
                        static_pass = false;
                    } else if seen_configure {
                        static_pass = true;
                    }
                    seen_configure = true;
                    if static_pass {
                        Phase::ConfiguringStatic
                    } else {
                        Phase::ConfiguringShared
                    }
                } else if is_install_step(program, args) {
                    Phase::Installing
                } else if static_pass {
                    Phase::BuildingStatic
                } else {
                    Phase::BuildingShared
                }
            }
        })
        .collect()
}

fn is_configure_step(program: &str, args: &[String]) -> bool {
    if program.ends_with("configure") {
        return true;
    }
    if program == "cmake" {
        return args.iter().any(|a| a == "-S" || a.starts_with("-S"))
            && !args.iter().any(|a| a == "--build" || a == "--install");
    }
    if program == "meson" {
        return args.first().map(String::as_str) == Some("setup");
    }
    false
}

fn is_install_step(program: &str, args: &[String]) -> bool {
    match program {
        "cmake" => args.iter().any(|a| a == "--install"),
        "make" | "ninja" => args.iter().any(|a| a == "install"),
        _ => false,
    }
}

/// Run an external command, capturing combined output. With a timeout the
/// child is spawned with piped output, polled, and killed on the deadline;
/// without one it just blocks until exit.
fn run_command(
    mut command: Command,
    step: &str,
    timeout: Option<Duration>,
    is_test: bool,
) -> Result<String, Error> {
    let fail = |exit_code: Option<i32>, output: String| {
        if is_test {
            Error::TestFailure {
                step: step.to_string(),
                exit_code,
                output,
            }
        } else {
            Error::BuildStepFailure {
                step: step.to_string(),
                exit_code,
                output,
            }
        }
    };

    let Some(limit) = timeout else {
        let output = command
            .output()
            .map_err(|e| fail(None, format!("failed to spawn: {e}")))?;
        let combined = format!(
            "{}{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        if !output.status.success() {
            return Err(fail(output.status.code(), combined));
        }
        return Ok(combined);
    };

    command.stdout(Stdio::piped()).stderr(Stdio::piped());
    let mut child = command
        .spawn()
        .map_err(|e| fail(None, format!("failed to spawn: {e}")))?;

    let mut stdout = child.stdout.take();
    let mut stderr = child.stderr.take();
    let out_reader = std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(pipe) = stdout.as_mut() {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    });
    let err_reader = std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(pipe) = stderr.as_mut() {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    });

    let started = Instant::now();
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break Some(status),
            Ok(None) => {
                if started.elapsed() > limit {
                    let _ = child.kill();
                    let _ = child.wait();
                    break None;
                }
                std::thread::sleep(Duration::from_millis(25));
            }
            Err(e) => return Err(fail(None, format!("failed to wait: {e}"))),
        }
    };

    let out = out_reader.join().unwrap_or_default();
    let err = err_reader.join().unwrap_or_default();
    let combined = format!(
        "{}{}",
        String::from_utf8_lossy(&out),
        String::from_utf8_lossy(&err)
    );

    match status {
        Some(status) if status.success() => Ok(combined),
        Some(status) => Err(fail(status.code(), combined)),
        None => Err(fail(
            None,
            format!(
                "timed out after {}s\n{}",
                limit.as_secs(),
                combined.trim_end()
            ),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fk_core::ArtifactDir;

    fn run(program: &str, args: &[&str]) -> BuildStep {
        BuildStep::Run {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    #[test]
    fn two_pass_cmake_build_classifies_shared_then_static() {
        let steps = vec![
            run("cmake", &["-S", ".", "-B", "build/shared", "-DBUILD_SHARED_LIBS=ON"]),
            run("cmake", &["--build", "build/shared"]),
            run("cmake", &["--install", "build/shared"]),
            run("cmake", &["-S", ".", "-B", "build/static", "-DBUILD_SHARED_LIBS=OFF"]),
            run("cmake", &["--build", "build/static"]),
            BuildStep::InstallArtifacts {
                dest: ArtifactDir::Lib,
                sources: vec!["build/static/libfolly.a".to_string()],
            },
        ];

        assert_eq!(
            classify_steps(&steps),
            vec![
                Phase::ConfiguringShared,
                Phase::BuildingShared,
                Phase::Installing,
                Phase::ConfiguringStatic,
                Phase::BuildingStatic,
                Phase::Installing,
            ]
        );
    }

    #[test]
    fn second_configure_without_flags_starts_static_pass() {
        let steps = vec![
            run("./configure", &["--prefix=/x"]),
            run("make", &[]),
            run("./configure", &["--enable-static"]),
            run("make", &[]),
            run("make", &["install"]),
        ];

        assert_eq!(
            classify_steps(&steps),
            vec![
                Phase::ConfiguringShared,
                Phase::BuildingShared,
                Phase::ConfiguringStatic,
                Phase::BuildingStatic,
                Phase::Installing,
            ]
        );
    }

    #[test]
    fn single_pass_build_never_enters_static_phases() {
        let steps = vec![
            run("./configure", &["--prefix=/x"]),
            run("make", &[]),
            run("make", &["install"]),
        ];

        let phases = classify_steps(&steps);
        assert!(!phases.contains(&Phase::ConfiguringStatic));
        assert!(!phases.contains(&Phase::BuildingStatic));
        assert_eq!(phases.last(), Some(&Phase::Installing));
    }

    #[test]
    fn meson_setup_is_a_configure_step() {
        assert!(is_configure_step(
            "meson",
            &["setup".to_string(), "build".to_string()]
        ));
        assert!(!is_configure_step("meson", &["compile".to_string()]));
    }

    #[test]
    fn cmake_build_is_not_a_configure_step() {
        assert!(!is_configure_step(
            "cmake",
            &["--build".to_string(), "build".to_string()]
        ));
        assert!(is_configure_step(
            "cmake",
            &["-S".to_string(), ".".to_string(), "-B".to_string(), "b".to_string()]
        ));
    }

    #[test]
    fn run_command_captures_output() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "echo out; echo err >&2"]);
        let output = run_command(cmd, "echo", None, false).unwrap();
        assert!(output.contains("out"));
        assert!(output.contains("err"));
    }

    #[test]
    fn run_command_reports_exit_code() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "echo broken; exit 3"]);
        let err = run_command(cmd, "sh -c exit 3", None, false).unwrap_err();
        match err {
            Error::BuildStepFailure {
                exit_code, output, ..
            } => {
                assert_eq!(exit_code, Some(3));
                assert!(output.contains("broken"));
            }
            other => panic!("expected BuildStepFailure, got {:?}", other),
        }
    }

    #[test]
    fn run_command_test_flag_yields_test_failure() {
        let cmd = Command::new("false");
        let err = run_command(cmd, "./test", None, true).unwrap_err();
        assert!(matches!(err, Error::TestFailure { .. }));
    }

    #[test]
    fn run_command_kills_on_timeout() {
        let mut cmd = Command::new("sleep");
        cmd.arg("30");
        let err = run_command(cmd, "sleep 30", Some(Duration::from_millis(100)), false)
            .unwrap_err();
        match err {
            Error::BuildStepFailure {
                exit_code, output, ..
            } => {
                assert_eq!(exit_code, None);
                assert!(output.contains("timed out"));
            }
            other => panic!("expected BuildStepFailure, got {:?}", other),
        }
    }
}
