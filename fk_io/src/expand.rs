//! Token expansion for build step arguments.
//!
//! The parser keeps formula argument tokens exactly as written: `#{prefix}`
//! interpolations, `*std_cmake_args` splats, and `ENV.cc`/`ENV.cxx` compiler
//! references. This module expands them against an explicit context, so the
//! same parsed spec can target any prefix and toolchain without global state.

use std::path::PathBuf;

use fk_core::Toolchain;

/// Everything a token can refer to during one formula build.
#[derive(Debug, Clone)]
pub struct ExpansionContext {
    /// Keg prefix the build installs into (`Cellar/<name>/<version>`).
    pub prefix: PathBuf,
    /// Stable `opt/<name>` path, used for rpaths that must survive upgrades.
    pub opt_prefix: PathBuf,
    /// Scratch directory for `test do` probes; unset during the build itself.
    pub testpath: Option<PathBuf>,
    pub toolchain: Toolchain,
    pub arch: String,
    pub jobs: usize,
}

impl ExpansionContext {
    /// Expand one raw token into zero or more argument strings. Splat tokens
    /// produce several arguments; everything else produces exactly one.
    pub fn expand(&self, token: &str) -> Vec<String> {
        match token {
            "*std_cmake_args" => self.std_cmake_args(),
            "*std_configure_args" => self.std_configure_args(),
            "ENV.cc" => vec![self.toolchain.cc.clone()],
            "ENV.cxx" => vec![self.toolchain.cxx.clone()],
            _ => vec![self.interpolate(token)],
        }
    }

    /// Expand a whole token list into a flat argument vector.
    pub fn expand_all(&self, tokens: &[String]) -> Vec<String> {
        tokens.iter().flat_map(|t| self.expand(t)).collect()
    }

    /// The standard cmake argument set formulas splat with `*std_cmake_args`.
    fn std_cmake_args(&self) -> Vec<String> {
        vec![
            format!("-DCMAKE_INSTALL_PREFIX={}", self.prefix.display()),
            "-DCMAKE_BUILD_TYPE=Release".to_string(),
            "-DCMAKE_FIND_FRAMEWORK=LAST".to_string(),
            "-DBUILD_TESTING=OFF".to_string(),
            "-Wno-dev".to_string(),
        ]
    }

    fn std_configure_args(&self) -> Vec<String> {
        vec![
            format!("--prefix={}", self.prefix.display()),
            "--disable-debug".to_string(),
            "--disable-dependency-tracking".to_string(),
        ]
    }

    /// Replace every `#{...}` interpolation in a token. Unknown keys are left
    /// in place so a failing step shows what the formula actually asked for.
    fn interpolate(&self, token: &str) -> String {
        let mut out = String::with_capacity(token.len());
        let mut rest = token;

        while let Some(start) = rest.find("#{") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let Some(end) = after.find('}') else {
                out.push_str(&rest[start..]);
                return out;
            };
            let key = &after[..end];
            match self.lookup(key) {
                Some(value) => out.push_str(&value),
                None => {
                    out.push_str("#{");
                    out.push_str(key);
                    out.push('}');
                }
            }
            rest = &after[end + 1..];
        }

        out.push_str(rest);
        out
    }

    fn lookup(&self, key: &str) -> Option<String> {
        let path = |p: PathBuf| Some(p.display().to_string());
        match key {
            "prefix" => path(self.prefix.clone()),
            "bin" => path(self.prefix.join("bin")),
            "lib" => path(self.prefix.join("lib")),
            "include" => path(self.prefix.join("include")),
            // rpath points at the stable opt path, not the versioned keg
            "rpath" => path(self.opt_prefix.join("lib")),
            "opt_prefix" => path(self.opt_prefix.clone()),
            "testpath" => self.testpath.clone().map(|p| p.display().to_string()),
            "Hardware::CPU.arch" => Some(self.arch.clone()),
            "ENV.make_jobs" => Some(self.jobs.to_string()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> ExpansionContext {
        ExpansionContext {
            prefix: PathBuf::from("/fk/Cellar/folly/2023.05.15.00"),
            opt_prefix: PathBuf::from("/fk/opt/folly"),
            testpath: None,
            toolchain: Toolchain::default(),
            arch: "x86_64".to_string(),
            jobs: 4,
        }
    }

    #[test]
    fn plain_token_passes_through() {
        assert_eq!(context().expand("--build"), vec!["--build"]);
    }

    #[test]
    fn prefix_interpolation_expands_to_keg() {
        assert_eq!(
            context().expand("-DCMAKE_INSTALL_RPATH=#{rpath}"),
            vec!["-DCMAKE_INSTALL_RPATH=/fk/opt/folly/lib"]
        );
        assert_eq!(
            context().expand("#{prefix}/share"),
            vec!["/fk/Cellar/folly/2023.05.15.00/share"]
        );
    }

    #[test]
    fn include_and_lib_flags_expand() {
        let ctx = context();
        assert_eq!(
            ctx.expand("-I#{include}"),
            vec!["-I/fk/Cellar/folly/2023.05.15.00/include"]
        );
        assert_eq!(
            ctx.expand("-L#{lib}"),
            vec!["-L/fk/Cellar/folly/2023.05.15.00/lib"]
        );
    }

    #[test]
    fn std_cmake_args_splat_expands_to_multiple() {
        let args = context().expand("*std_cmake_args");
        assert!(args.len() > 1);
        assert_eq!(
            args[0],
            "-DCMAKE_INSTALL_PREFIX=/fk/Cellar/folly/2023.05.15.00"
        );
        assert!(args.contains(&"-DCMAKE_BUILD_TYPE=Release".to_string()));
    }

    #[test]
    fn std_configure_args_splat_sets_prefix() {
        let args = context().expand("*std_configure_args");
        assert_eq!(args[0], "--prefix=/fk/Cellar/folly/2023.05.15.00");
    }

    #[test]
    fn compiler_references_use_toolchain() {
        let mut ctx = context();
        ctx.toolchain = Toolchain {
            cc: "clang".to_string(),
            cxx: "clang++".to_string(),
        };
        assert_eq!(ctx.expand("ENV.cc"), vec!["clang"]);
        assert_eq!(ctx.expand("ENV.cxx"), vec!["clang++"]);
    }

    #[test]
    fn testpath_expands_when_set() {
        let mut ctx = context();
        ctx.testpath = Some(PathBuf::from("/tmp/probe"));
        assert_eq!(ctx.expand("#{testpath}/test.cc"), vec!["/tmp/probe/test.cc"]);
    }

    #[test]
    fn unknown_interpolation_is_preserved() {
        assert_eq!(
            context().expand("-DARCH=#{Hardware::CPU.family}"),
            vec!["-DARCH=#{Hardware::CPU.family}"]
        );
    }

    #[test]
    fn arch_interpolation_expands() {
        assert_eq!(
            context().expand("-DCMAKE_LIBRARY_ARCHITECTURE=#{Hardware::CPU.arch}"),
            vec!["-DCMAKE_LIBRARY_ARCHITECTURE=x86_64"]
        );
    }

    #[test]
    fn expand_all_flattens_splats() {
        let tokens = vec![
            "-S".to_string(),
            ".".to_string(),
            "*std_cmake_args".to_string(),
        ];
        let args = context().expand_all(&tokens);
        assert_eq!(args[0], "-S");
        assert_eq!(args[1], ".");
        assert!(args.len() > 3);
    }
}
