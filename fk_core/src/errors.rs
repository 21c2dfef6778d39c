use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    MalformedSpec {
        name: String,
        message: String,
    },
    MissingFormula {
        name: String,
    },
    DependencyCycle {
        cycle: Vec<String>,
    },
    UnsupportedPlatform {
        name: String,
        cause: String,
    },
    ChecksumMismatch {
        expected: String,
        actual: String,
        file_name: Option<String>,
    },
    NetworkFailure {
        message: String,
    },
    /// Local read/write failure in the source cache, as opposed to a
    /// network problem reaching the archive server.
    CacheFailure {
        message: String,
    },
    BuildStepFailure {
        step: String,
        exit_code: Option<i32>,
        output: String,
    },
    TestFailure {
        step: String,
        exit_code: Option<i32>,
        output: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::MalformedSpec { name, message } => {
                write!(f, "malformed formula '{}': {}", name, message)?;
                write!(
                    f,
                    "\n  hint: check the formula file for missing or misspelled fields"
                )
            }
            Error::MissingFormula { name } => {
                write!(
                    f,
                    "formula '{}' not found\n  hint: check the formula directory passed with --formula-dir",
                    name
                )
            }
            Error::DependencyCycle { cycle } => {
                let rendered = cycle.join(" -> ");
                write!(
                    f,
                    "dependency cycle detected: {}\n  hint: this is likely a formula bug; please report it upstream",
                    rendered
                )
            }
            Error::UnsupportedPlatform { name, cause } => {
                write!(f, "formula '{}' cannot be built on this platform", name)?;
                if !cause.is_empty() {
                    write!(f, "\n  cause: {}", cause.trim_end())?;
                }
                write!(
                    f,
                    "\n  hint: the formula declares this target as failing; no build was attempted"
                )
            }
            Error::ChecksumMismatch {
                expected,
                actual,
                file_name,
            } => {
                write!(f, "checksum verification failed")?;
                if let Some(name) = file_name {
                    write!(f, " for '{}'", name)?;
                }
                write!(f, "\n  expected: {}\n  got:      {}", expected, actual)?;
                write!(
                    f,
                    "\n  hint: this may indicate a corrupted download or CDN issue; try again"
                )
            }
            Error::NetworkFailure { message } => {
                write!(
                    f,
                    "network error: {}\n  hint: check your internet connection and try again",
                    message
                )
            }
            Error::CacheFailure { message } => {
                write!(
                    f,
                    "source cache error: {}\n  hint: check free space and permissions under the cache directory",
                    message
                )
            }
            Error::BuildStepFailure {
                step,
                exit_code,
                output,
            } => {
                write!(f, "build step failed: {}", step)?;
                match exit_code {
                    Some(code) => write!(f, " (exit code {})", code)?,
                    None => write!(f, " (terminated without exit code)")?,
                }
                if !output.is_empty() {
                    write!(f, "\n{}", output.trim_end())?;
                }
                write!(
                    f,
                    "\n  hint: partial build artifacts are left in place for inspection"
                )
            }
            Error::TestFailure {
                step,
                exit_code,
                output,
            } => {
                write!(f, "post-install test failed: {}", step)?;
                match exit_code {
                    Some(code) => write!(f, " (exit code {})", code)?,
                    None => write!(f, " (terminated without exit code)")?,
                }
                if !output.is_empty() {
                    write!(f, "\n{}", output.trim_end())?;
                }
                write!(f, "\n  hint: the library itself was installed successfully")
            }
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_spec_display_includes_name_and_message() {
        let err = Error::MalformedSpec {
            name: "folly".to_string(),
            message: "missing required field: sha256".to_string(),
        };

        let msg = err.to_string();
        assert!(msg.contains("folly"));
        assert!(msg.contains("sha256"));
        assert!(msg.contains("hint:"));
    }

    #[test]
    fn checksum_mismatch_display_includes_both_digests() {
        let err = Error::ChecksumMismatch {
            expected: "abc123".to_string(),
            actual: "def456".to_string(),
            file_name: Some("folly-v2023.05.15.00.tar.gz".to_string()),
        };

        let msg = err.to_string();
        assert!(msg.contains("abc123"));
        assert!(msg.contains("def456"));
        assert!(msg.contains("folly-v2023.05.15.00.tar.gz"));
    }

    #[test]
    fn unsupported_platform_display_includes_cause() {
        let err = Error::UnsupportedPlatform {
            name: "folly".to_string(),
            cause: "Undefined symbols for architecture x86_64".to_string(),
        };

        let msg = err.to_string();
        assert!(msg.contains("folly"));
        assert!(msg.contains("Undefined symbols"));
        assert!(msg.contains("no build was attempted"));
    }

    #[test]
    fn dependency_cycle_display_renders_chain() {
        let err = Error::DependencyCycle {
            cycle: vec!["a".to_string(), "b".to_string(), "a".to_string()],
        };

        assert!(err.to_string().contains("a -> b -> a"));
    }

    #[test]
    fn cache_failure_display_points_at_disk_not_network() {
        let err = Error::CacheFailure {
            message: "failed to flush archive: No space left on device".to_string(),
        };

        let msg = err.to_string();
        assert!(msg.contains("source cache error"));
        assert!(msg.contains("No space left on device"));
        assert!(!msg.contains("internet connection"));
    }

    #[test]
    fn build_step_failure_display_names_step() {
        let err = Error::BuildStepFailure {
            step: "cmake --build build/shared".to_string(),
            exit_code: Some(2),
            output: "ninja: build stopped".to_string(),
        };

        let msg = err.to_string();
        assert!(msg.contains("cmake --build build/shared"));
        assert!(msg.contains("exit code 2"));
        assert!(msg.contains("ninja: build stopped"));
    }

    #[test]
    fn test_failure_display_notes_install_kept() {
        let err = Error::TestFailure {
            step: "./test".to_string(),
            exit_code: Some(1),
            output: String::new(),
        };

        let msg = err.to_string();
        assert!(msg.contains("./test"));
        assert!(msg.contains("installed successfully"));
    }
}
