//! Formula catalog loading.

use std::collections::BTreeMap;
use std::path::Path;

use walkdir::WalkDir;

use fk_core::{Error, FormulaSpec, parse_formula};

/// Load every `.rb` formula under a directory into a name-keyed map. The
/// formula name is the file stem, matching how formula directories are laid
/// out. A single malformed file fails the whole load; a half-parsed catalog
/// would make resolution results depend on which files happened to parse.
pub fn load_catalog(dir: &Path) -> Result<BTreeMap<String, FormulaSpec>, Error> {
    let mut formulas = BTreeMap::new();

    for entry in WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("rb") {
            continue;
        }

        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();

        let source = std::fs::read_to_string(path).map_err(|e| Error::MalformedSpec {
            name: name.clone(),
            message: format!("failed to read {}: {}", path.display(), e),
        })?;

        let spec = parse_formula(&source, &name).map_err(|e| e.into_error(&name))?;
        formulas.insert(name, spec);
    }

    Ok(formulas)
}

/// Load a single formula file, naming it after the file stem.
pub fn load_formula_file(path: &Path) -> Result<FormulaSpec, Error> {
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string();

    let source = std::fs::read_to_string(path).map_err(|e| Error::MalformedSpec {
        name: name.clone(),
        message: format!("failed to read {}: {}", path.display(), e),
    })?;

    parse_formula(&source, &name).map_err(|e| e.into_error(&name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_formula(dir: &Path, name: &str, deps: &[&str]) {
        let dep_lines: String = deps
            .iter()
            .map(|d| format!("  depends_on \"{}\"\n", d))
            .collect();
        let source = format!(
            r#"class X < Formula
  url "https://example.com/{name}-1.0.0.tar.gz"
  sha256 "{digest}"
{dep_lines}
  def install
    system "make", "install"
  end
end
"#,
            digest = "0".repeat(64),
        );
        fs::write(dir.join(format!("{name}.rb")), source).unwrap();
    }

    #[test]
    fn loads_all_formulas_keyed_by_file_stem() {
        let tmp = TempDir::new().unwrap();
        write_formula(tmp.path(), "folly", &["boost", "fmt"]);
        write_formula(tmp.path(), "boost", &[]);
        write_formula(tmp.path(), "fmt", &[]);
        // non-formula files are ignored
        fs::write(tmp.path().join("README.md"), "not a formula").unwrap();

        let catalog = load_catalog(tmp.path()).unwrap();
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog["folly"].dependencies, vec!["boost", "fmt"]);
    }

    #[test]
    fn malformed_formula_fails_the_load() {
        let tmp = TempDir::new().unwrap();
        write_formula(tmp.path(), "good", &[]);
        fs::write(
            tmp.path().join("bad.rb"),
            "class Bad < Formula\n  desc \"no url or sha\"\nend\n",
        )
        .unwrap();

        let err = load_catalog(tmp.path()).unwrap_err();
        assert!(matches!(err, Error::MalformedSpec { name, .. } if name == "bad"));
    }

    #[test]
    fn load_formula_file_uses_stem_as_name() {
        let tmp = TempDir::new().unwrap();
        write_formula(tmp.path(), "folly", &[]);

        let spec = load_formula_file(&tmp.path().join("folly.rb")).unwrap();
        assert_eq!(spec.name, "folly");
        assert_eq!(spec.version, "1.0.0");
    }
}
