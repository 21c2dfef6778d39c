//! Deps, info, and check command implementations.

use std::collections::BTreeMap;
use std::path::Path;

use console::style;

use fk_core::{DepKind, Error, FormulaSpec, TargetPlatform, resolve};
use fk_io::catalog::{load_catalog, load_formula_file};

// ============================================================================
// Formatting helpers (pure functions for testability)
// ============================================================================

/// Format one entry of the resolved build order.
pub fn format_dep_line(name: &str, kind: DepKind) -> String {
    match kind {
        DepKind::Build => format!("  {} {}", name, style("[build]").dim()),
        DepKind::Runtime => format!("  {}", name),
    }
}

/// Render the dependency tree of a formula, one line per entry.
pub fn render_deps_tree(
    catalog: &BTreeMap<String, FormulaSpec>,
    name: &str,
    target: &TargetPlatform,
    indent: &str,
    lines: &mut Vec<String>,
) {
    lines.push(format!("{indent}{name}"));

    let Some(spec) = catalog.get(name) else {
        return;
    };
    // A cycle would recurse forever; resolution rejects cyclic catalogs
    // before this renderer ever runs, so plain depth bounding is enough.
    if indent.len() > 40 {
        lines.push(format!("{indent}  ..."));
        return;
    }

    let child_indent = format!("{indent}  ");
    for dep in spec.effective_dependencies(target) {
        render_deps_tree(catalog, &dep, target, &child_indent, lines);
    }
}

/// Human-readable info lines for a formula.
pub fn format_info(spec: &FormulaSpec) -> Vec<String> {
    let mut lines = vec![format!(
        "{} {} {}",
        style("==>").cyan().bold(),
        style(&spec.name).bold(),
        spec.version
    )];

    if let Some(desc) = &spec.desc {
        lines.push(desc.clone());
    }
    if let Some(homepage) = &spec.homepage {
        lines.push(homepage.clone());
    }
    if let Some(license) = &spec.license {
        lines.push(format!("License: {license}"));
    }
    if !spec.dependencies.is_empty() {
        lines.push(format!("Dependencies: {}", spec.dependencies.join(", ")));
    }
    if !spec.build_dependencies.is_empty() {
        lines.push(format!(
            "Build dependencies: {}",
            spec.build_dependencies.join(", ")
        ));
    }
    lines.push(format!(
        "Build: {} steps, {} platform rules{}",
        spec.build_steps.len(),
        spec.platform_rules.len(),
        if spec.test.is_some() {
            ", has test"
        } else {
            ""
        }
    ));

    lines
}

fn kind_name(kind: DepKind) -> &'static str {
    match kind {
        DepKind::Runtime => "runtime",
        DepKind::Build => "build",
    }
}

// ============================================================================
// Command implementations
// ============================================================================

pub fn run_deps(
    formula_dir: &Path,
    formula: &str,
    target: &TargetPlatform,
    tree: bool,
    json: bool,
) -> Result<(), Error> {
    let catalog = load_catalog(formula_dir)?;
    let resolution = resolve(formula, &catalog, target)?;

    if json {
        let entries: Vec<serde_json::Value> = resolution
            .order
            .iter()
            .map(|node| {
                serde_json::json!({
                    "name": node.name,
                    "kind": kind_name(node.kind),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries).unwrap_or_default());
        return Ok(());
    }

    if tree {
        let mut lines = Vec::new();
        render_deps_tree(&catalog, formula, target, "", &mut lines);
        for line in lines {
            println!("{line}");
        }
        return Ok(());
    }

    println!(
        "{} Build order for {}:",
        style("==>").cyan().bold(),
        style(formula).bold()
    );
    for node in &resolution.order {
        println!("{}", format_dep_line(&node.name, node.kind));
    }
    Ok(())
}

pub fn run_info(formula_dir: &Path, formula: &str, json: bool) -> Result<(), Error> {
    let catalog = load_catalog(formula_dir)?;
    let spec = catalog.get(formula).ok_or_else(|| Error::MissingFormula {
        name: formula.to_string(),
    })?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(spec).unwrap_or_default()
        );
    } else {
        for line in format_info(spec) {
            println!("{line}");
        }
    }
    Ok(())
}

/// Parse formulas and resolve them against the full catalog without building
/// anything. With a formula name or `.rb` path the check is scoped to that
/// one formula; otherwise every file in the directory is checked. Prints one
/// status line per checked formula; the first failure is returned after all
/// lines are printed.
pub fn run_check(
    formula_dir: &Path,
    target: &TargetPlatform,
    only: Option<&str>,
) -> Result<(), Error> {
    let mut specs = BTreeMap::new();
    let mut failures: Vec<(String, Error)> = Vec::new();

    for path in formula_files(formula_dir) {
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        match load_formula_file(&path) {
            Ok(spec) => {
                specs.insert(name, spec);
            }
            Err(e) => failures.push((name, e)),
        }
    }

    let names: Vec<String> = match only {
        // A direct .rb path is checked against the directory catalog, even
        // if the file lives outside the formula directory.
        Some(arg) if arg.ends_with(".rb") => {
            let path = Path::new(arg);
            let name = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_string();
            match load_formula_file(path) {
                Ok(spec) => {
                    specs.insert(name.clone(), spec);
                }
                Err(e) => failures.push((name.clone(), e)),
            }
            failures.retain(|(n, _)| *n == name);
            vec![name]
        }
        Some(name) => {
            failures.retain(|(n, _)| n == name);
            if !specs.contains_key(name) && failures.is_empty() {
                return Err(Error::MissingFormula {
                    name: name.to_string(),
                });
            }
            vec![name.to_string()]
        }
        None => specs.keys().cloned().collect(),
    };

    for name in &names {
        if !specs.contains_key(name) {
            // Parse failure already recorded above.
            continue;
        }
        match resolve(name, &specs, target) {
            Ok(resolution) => {
                println!(
                    "  {} {} ({} in plan)",
                    style("✓").green(),
                    name,
                    resolution.order.len()
                );
            }
            Err(e) => failures.push((name.clone(), e)),
        }
    }

    for (name, error) in &failures {
        let first_line = error.to_string();
        let first_line = first_line.lines().next().unwrap_or_default().to_string();
        println!("  {} {}: {}", style("✗").red(), name, first_line);
    }

    match failures.into_iter().next() {
        None => {
            println!(
                "{} {} formulas ok",
                style("==>").cyan().bold(),
                names.len()
            );
            Ok(())
        }
        Some((_, error)) => Err(error),
    }
}

fn formula_files(dir: &Path) -> Vec<std::path::PathBuf> {
    let mut files = Vec::new();
    let mut stack = vec![dir.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else if path.extension().and_then(|e| e.to_str()) == Some("rb") {
                files.push(path);
            }
        }
    }
    files.sort();
    files
}
