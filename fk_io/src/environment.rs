//! Build environment assembly.
//!
//! Each formula builds against the `opt/` prefixes of its resolved
//! dependencies: include and library search paths, pkg-config metadata, and
//! the binaries of build tools like cmake. The compiler always comes from the
//! explicit toolchain, never from mutating the interpreter's own process
//! environment.

use std::collections::HashMap;
use std::path::Path;
use std::process::Command;

use fk_core::Toolchain;

#[derive(Debug, Clone)]
pub struct BuildEnvironment {
    pub cc: String,
    pub cxx: String,
    pub cflags: String,
    pub cxxflags: String,
    pub ldflags: String,
    pub pkg_config_path: String,
    pub path: Option<String>,
    pub jobs: usize,
}

impl BuildEnvironment {
    /// Assemble the environment for one formula build. `dep_names` are the
    /// already-installed dependencies, looked up under `opt_dir`.
    pub fn new(toolchain: &Toolchain, dep_names: &[String], opt_dir: &Path, jobs: usize) -> Self {
        let mut include_paths = Vec::new();
        let mut lib_paths = Vec::new();
        let mut pkg_config_paths = Vec::new();
        let mut bin_paths = Vec::new();

        for dep in dep_names {
            let dep_opt = opt_dir.join(dep);
            if !dep_opt.exists() {
                continue;
            }

            let dep_include = dep_opt.join("include");
            let dep_lib = dep_opt.join("lib");
            let dep_pkgconfig = dep_lib.join("pkgconfig");
            let dep_bin = dep_opt.join("bin");

            if dep_include.exists() {
                include_paths.push(format!("-I{}", dep_include.display()));
            }
            if dep_lib.exists() {
                lib_paths.push(format!("-L{}", dep_lib.display()));
            }
            if dep_pkgconfig.exists() {
                pkg_config_paths.push(dep_pkgconfig.to_string_lossy().to_string());
            }
            if dep_bin.exists() {
                bin_paths.push(dep_bin.to_string_lossy().to_string());
            }
        }

        let cflags = include_paths.join(" ");
        let cxxflags = cflags.clone();
        let ldflags = lib_paths.join(" ");
        let pkg_config_path = pkg_config_paths.join(":");

        let path = if bin_paths.is_empty() {
            None
        } else {
            let existing = std::env::var("PATH").unwrap_or_default();
            Some(format!("{}:{}", bin_paths.join(":"), existing))
        };

        Self {
            cc: toolchain.cc.clone(),
            cxx: toolchain.cxx.clone(),
            cflags,
            cxxflags,
            ldflags,
            pkg_config_path,
            path,
            jobs,
        }
    }

    /// The variable set a build step runs with.
    pub fn vars(&self) -> HashMap<String, String> {
        let mut env = HashMap::new();
        env.insert("CC".to_string(), self.cc.clone());
        env.insert("CXX".to_string(), self.cxx.clone());
        env.insert("MAKEFLAGS".to_string(), format!("-j{}", self.jobs));

        if !self.cflags.is_empty() {
            env.insert("CFLAGS".to_string(), self.cflags.clone());
        }
        if !self.cxxflags.is_empty() {
            env.insert("CXXFLAGS".to_string(), self.cxxflags.clone());
        }
        if !self.ldflags.is_empty() {
            env.insert("LDFLAGS".to_string(), self.ldflags.clone());
        }
        if !self.pkg_config_path.is_empty() {
            env.insert("PKG_CONFIG_PATH".to_string(), self.pkg_config_path.clone());
        }
        if let Some(path) = &self.path {
            env.insert("PATH".to_string(), path.clone());
        }

        env
    }

    pub fn apply(&self, command: &mut Command) {
        for (key, value) in self.vars() {
            command.env(key, value);
        }
    }
}
