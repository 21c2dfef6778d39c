use serde::{Deserialize, Serialize};

use crate::platform::{PlatformRule, TargetPlatform, effective_dependencies};

/// In-memory record of one parsed formula file.
///
/// Constructed once per install invocation by the parser, consumed by the
/// resolver and executor, and discarded afterwards; nothing is persisted
/// across runs beyond the installed artifacts themselves.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct FormulaSpec {
    pub name: String,
    #[serde(default)]
    pub desc: Option<String>,
    #[serde(default)]
    pub homepage: Option<String>,
    #[serde(default)]
    pub license: Option<String>,
    /// Source archive URL.
    pub url: String,
    /// Declared SHA-256 hex digest of the source archive.
    pub sha256: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub build_dependencies: Vec<String>,
    /// Platform-conditional rules in declaration order.
    #[serde(default)]
    pub platform_rules: Vec<PlatformRule>,
    /// Build steps from the `install` block, in order.
    #[serde(default)]
    pub build_steps: Vec<BuildStep>,
    /// Optional post-install probe from the `test do` block.
    #[serde(default)]
    pub test: Option<TestSpec>,
}

/// One external invocation (or artifact copy) from the `install` block.
///
/// `Run` argument tokens are kept as written in the formula: they may contain
/// `#{...}` interpolations, `*std_cmake_args`-style splats, and `ENV.cc` /
/// `ENV.cxx` compiler references. Expansion happens in the executor, against
/// an explicit toolchain and prefix.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BuildStep {
    Run {
        program: String,
        args: Vec<String>,
    },
    /// `lib.install "a", "b"` and friends: copy build outputs into a
    /// directory under the install prefix.
    InstallArtifacts {
        dest: ArtifactDir,
        sources: Vec<String>,
    },
}

impl BuildStep {
    /// Short rendering used in error messages and progress output.
    pub fn describe(&self) -> String {
        match self {
            BuildStep::Run { program, args } => {
                let mut parts = vec![program.clone()];
                parts.extend(args.iter().cloned());
                parts.join(" ")
            }
            BuildStep::InstallArtifacts { dest, sources } => {
                format!("install {} -> {}/", sources.join(" "), dest.dir_name())
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactDir {
    Bin,
    Lib,
    Include,
}

impl ArtifactDir {
    pub fn dir_name(&self) -> &'static str {
        match self {
            ArtifactDir::Bin => "bin",
            ArtifactDir::Lib => "lib",
            ArtifactDir::Include => "include",
        }
    }
}

/// The `test do` block: probe sources to write, then steps to run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct TestSpec {
    #[serde(default)]
    pub files: Vec<TestFile>,
    #[serde(default)]
    pub steps: Vec<BuildStep>,
}

/// A `(testpath/"name").write <<~EOS ... EOS` probe file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TestFile {
    pub path: String,
    pub contents: String,
}

impl FormulaSpec {
    /// Dependencies (runtime + build) after applying platform rules for the
    /// given target, in declaration order with rule-added entries first.
    pub fn effective_dependencies(&self, target: &TargetPlatform) -> Vec<String> {
        let mut declared = self.dependencies.clone();
        for dep in &self.build_dependencies {
            if !declared.contains(dep) {
                declared.push(dep.clone());
            }
        }
        effective_dependencies(&declared, &self.platform_rules, target)
    }

    /// True if the dependency is build-time only.
    pub fn is_build_dependency(&self, name: &str) -> bool {
        self.build_dependencies.iter().any(|d| d == name)
            && !self.dependencies.iter().any(|d| d == name)
    }

    /// File name of the source archive, derived from the URL.
    pub fn archive_file_name(&self) -> String {
        self.url
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or("source.tar.gz")
            .to_string()
    }
}
