//! Platform descriptors and declarative platform rules.
//!
//! Formulas express platform constraints inline (`fails_with :clang do ... end`,
//! `on_macos do depends_on ... end`, `ENV.llvm_clang if ...`). The parser turns
//! all of them into an ordered list of `{predicate, effect}` rules, evaluated
//! against an explicit `TargetPlatform` value. The active compiler is likewise
//! an explicit `Toolchain` value threaded through the executor, never
//! process-wide state.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Os {
    Macos,
    Linux,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Compiler {
    Clang,
    Gcc,
}

impl Compiler {
    /// Build number assumed for a current toolchain when none was given:
    /// clang build numbers are in the Xcode 15 range, gcc uses the major.
    pub fn default_build(self) -> u32 {
        match self {
            Compiler::Clang => 1500,
            Compiler::Gcc => 13,
        }
    }
}

/// The machine a formula is being built for.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TargetPlatform {
    pub os: Os,
    pub arch: String,
    pub compiler: Compiler,
    /// Compiler build number (`DevelopmentTools.clang_build_version` style)
    /// or major version for gcc.
    pub compiler_build: u32,
}

impl TargetPlatform {
    /// Describe the host machine with the stock compiler for its OS. Callers
    /// override individual fields for cross-checks or explicit flags.
    pub fn host() -> Self {
        let os = if cfg!(target_os = "macos") {
            Os::Macos
        } else {
            Os::Linux
        };
        let compiler = match os {
            Os::Macos => Compiler::Clang,
            Os::Linux => Compiler::Gcc,
        };
        Self {
            os,
            arch: std::env::consts::ARCH.to_string(),
            compiler,
            compiler_build: compiler.default_build(),
        }
    }
}

/// The active C/C++ toolchain for a build.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Toolchain {
    pub cc: String,
    pub cxx: String,
}

impl Default for Toolchain {
    fn default() -> Self {
        Self {
            cc: "cc".to_string(),
            cxx: "c++".to_string(),
        }
    }
}

/// Predicate over a target platform. Matches when every present field matches.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Predicate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<Os>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compiler: Option<Compiler>,
    /// Matches compiler builds less than or equal to this number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_build: Option<u32>,
}

impl Predicate {
    pub fn matches(&self, target: &TargetPlatform) -> bool {
        if let Some(os) = self.os
            && os != target.os
        {
            return false;
        }
        if let Some(compiler) = self.compiler
            && compiler != target.compiler
        {
            return false;
        }
        if let Some(max) = self.max_build
            && target.compiler_build > max
        {
            return false;
        }
        true
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    /// The formula cannot be built on matching targets.
    FailsWith { cause: String },
    /// Rewrite the active toolchain before any build step runs.
    SubstituteToolchain { cc: String, cxx: String },
    /// Drop a declared dependency on matching targets.
    SkipDependency { name: String },
    /// Add a dependency on matching targets (conditional `depends_on`).
    AddDependency { name: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlatformRule {
    pub predicate: Predicate,
    pub effect: Effect,
}

impl PlatformRule {
    pub fn matches(&self, target: &TargetPlatform) -> bool {
        self.predicate.matches(target)
    }
}

/// First matching `FailsWith` rule, in declaration order.
pub fn first_failure<'a>(rules: &'a [PlatformRule], target: &TargetPlatform) -> Option<&'a str> {
    rules.iter().find_map(|rule| match &rule.effect {
        Effect::FailsWith { cause } if rule.matches(target) => Some(cause.as_str()),
        _ => None,
    })
}

/// First matching toolchain substitution, in declaration order.
pub fn toolchain_override(rules: &[PlatformRule], target: &TargetPlatform) -> Option<Toolchain> {
    rules.iter().find_map(|rule| match &rule.effect {
        Effect::SubstituteToolchain { cc, cxx } if rule.matches(target) => Some(Toolchain {
            cc: cc.clone(),
            cxx: cxx.clone(),
        }),
        _ => None,
    })
}

/// Apply skip/add dependency effects to a declared dependency list.
/// Rules are evaluated in declaration order; the first rule naming a given
/// dependency wins.
pub fn effective_dependencies(
    declared: &[String],
    rules: &[PlatformRule],
    target: &TargetPlatform,
) -> Vec<String> {
    let mut decided: Vec<&str> = Vec::new();
    let mut deps: Vec<String> = Vec::new();

    for rule in rules {
        let (name, keep) = match &rule.effect {
            Effect::SkipDependency { name } => (name, false),
            Effect::AddDependency { name } => (name, true),
            _ => continue,
        };
        if decided.contains(&name.as_str()) {
            continue;
        }
        decided.push(name);
        if keep && rule.matches(target) && !declared.contains(name) {
            deps.push(name.clone());
        }
        // A matching SkipDependency removes the declared entry below.
    }

    for dep in declared {
        let skipped = rules.iter().any(|rule| {
            matches!(&rule.effect, Effect::SkipDependency { name } if name == dep)
                && rule.matches(target)
        });
        if !skipped && !deps.contains(dep) {
            deps.push(dep.clone());
        }
    }

    deps
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linux_gcc(build: u32) -> TargetPlatform {
        TargetPlatform {
            os: Os::Linux,
            arch: "x86_64".to_string(),
            compiler: Compiler::Gcc,
            compiler_build: build,
        }
    }

    fn macos_clang(build: u32) -> TargetPlatform {
        TargetPlatform {
            os: Os::Macos,
            arch: "arm64".to_string(),
            compiler: Compiler::Clang,
            compiler_build: build,
        }
    }

    #[test]
    fn host_target_matches_compiled_os() {
        let host = TargetPlatform::host();
        if cfg!(target_os = "macos") {
            assert_eq!(host.os, Os::Macos);
            assert_eq!(host.compiler, Compiler::Clang);
        } else {
            assert_eq!(host.os, Os::Linux);
            assert_eq!(host.compiler, Compiler::Gcc);
        }
        assert_eq!(host.compiler_build, host.compiler.default_build());
        assert!(!host.arch.is_empty());
    }

    #[test]
    fn empty_predicate_matches_everything() {
        let predicate = Predicate::default();
        assert!(predicate.matches(&linux_gcc(12)));
        assert!(predicate.matches(&macos_clang(1500)));
    }

    #[test]
    fn max_build_bound_is_inclusive() {
        let predicate = Predicate {
            compiler: Some(Compiler::Clang),
            max_build: Some(1100),
            ..Default::default()
        };

        assert!(predicate.matches(&macos_clang(1100)));
        assert!(predicate.matches(&macos_clang(900)));
        assert!(!predicate.matches(&macos_clang(1403)));
        // Wrong compiler never matches, regardless of build number.
        assert!(!predicate.matches(&linux_gcc(5)));
    }

    #[test]
    fn first_failure_respects_declaration_order() {
        let rules = vec![
            PlatformRule {
                predicate: Predicate {
                    compiler: Some(Compiler::Clang),
                    max_build: Some(1100),
                    ..Default::default()
                },
                effect: Effect::FailsWith {
                    cause: "old clang".to_string(),
                },
            },
            PlatformRule {
                predicate: Predicate::default(),
                effect: Effect::FailsWith {
                    cause: "catch-all".to_string(),
                },
            },
        ];

        assert_eq!(first_failure(&rules, &macos_clang(1000)), Some("old clang"));
        assert_eq!(first_failure(&rules, &macos_clang(1500)), Some("catch-all"));
    }

    #[test]
    fn no_matching_failure_returns_none() {
        let rules = vec![PlatformRule {
            predicate: Predicate {
                compiler: Some(Compiler::Gcc),
                max_build: Some(5),
                ..Default::default()
            },
            effect: Effect::FailsWith {
                cause: "gcc 5 miscompiles".to_string(),
            },
        }];

        assert_eq!(first_failure(&rules, &linux_gcc(12)), None);
        assert_eq!(first_failure(&rules, &linux_gcc(5)), Some("gcc 5 miscompiles"));
    }

    #[test]
    fn toolchain_override_only_on_match() {
        let rules = vec![PlatformRule {
            predicate: Predicate {
                os: Some(Os::Macos),
                compiler: Some(Compiler::Clang),
                max_build: Some(1100),
            },
            effect: Effect::SubstituteToolchain {
                cc: "clang".to_string(),
                cxx: "clang++".to_string(),
            },
        }];

        assert!(toolchain_override(&rules, &macos_clang(1100)).is_some());
        assert!(toolchain_override(&rules, &macos_clang(1500)).is_none());
        assert!(toolchain_override(&rules, &linux_gcc(12)).is_none());
    }

    #[test]
    fn conditional_dependency_added_only_on_match() {
        let declared = vec!["boost".to_string()];
        let rules = vec![PlatformRule {
            predicate: Predicate {
                os: Some(Os::Macos),
                compiler: Some(Compiler::Clang),
                max_build: Some(1100),
            },
            effect: Effect::AddDependency {
                name: "llvm".to_string(),
            },
        }];

        let on_old_mac = effective_dependencies(&declared, &rules, &macos_clang(1000));
        assert!(on_old_mac.contains(&"llvm".to_string()));
        assert!(on_old_mac.contains(&"boost".to_string()));

        let on_linux = effective_dependencies(&declared, &rules, &linux_gcc(12));
        assert_eq!(on_linux, vec!["boost"]);
    }

    #[test]
    fn skip_dependency_removes_declared_entry() {
        let declared = vec!["openssl".to_string(), "zlib".to_string()];
        let rules = vec![PlatformRule {
            predicate: Predicate {
                os: Some(Os::Macos),
                ..Default::default()
            },
            effect: Effect::SkipDependency {
                name: "zlib".to_string(),
            },
        }];

        let on_mac = effective_dependencies(&declared, &rules, &macos_clang(1500));
        assert_eq!(on_mac, vec!["openssl"]);

        let on_linux = effective_dependencies(&declared, &rules, &linux_gcc(12));
        assert_eq!(on_linux, vec!["openssl", "zlib"]);
    }
}
