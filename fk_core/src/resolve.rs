//! Dependency resolution using topological sort.
//!
//! This module implements Kahn's algorithm to order formula dependencies so
//! that dependencies are always built before the formulas that depend on them.
//!
//! # Algorithm Overview
//!
//! 1. **Closure computation**: Find all transitive dependencies of the root
//!    formula, applying each formula's platform rules for the target
//! 2. **Platform check**: Reject the plan if any formula in the closure
//!    declares the target as failing
//! 3. **Graph construction**: Build a directed graph where edges point from
//!    dependencies to dependents
//! 4. **Topological sort**: Process formulas with no remaining dependencies
//!    first, removing them from the graph until all formulas are ordered
//! 5. **Cycle detection**: If not all formulas can be ordered, a dependency
//!    cycle exists
//!
//! # Determinism
//!
//! The output order is deterministic: formulas at the same dependency level
//! are emitted in the order they were first discovered from the root, so the
//! plan follows the declaration order of `depends_on` lines rather than
//! sorting names alphabetically.

use std::collections::BTreeMap;

use crate::errors::Error;
use crate::formula::FormulaSpec;
use crate::platform::{TargetPlatform, Toolchain, first_failure, toolchain_override};

/// Whether a closure member is needed at runtime or only to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepKind {
    Runtime,
    Build,
}

/// One formula in the install plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyNode {
    pub name: String,
    pub kind: DepKind,
    /// Discovery index from the root, used for deterministic tie-breaking.
    pub position: usize,
}

/// The output of dependency resolution: an install order plus the toolchain
/// the root formula's rules selected for this target (if any).
#[derive(Debug, Clone)]
pub struct Resolution {
    /// Formulas in build order, dependencies before dependents. The root is
    /// always last.
    pub order: Vec<DependencyNode>,
    /// Toolchain substitution requested by the root formula, or `None` to use
    /// the platform default.
    pub toolchain: Option<Toolchain>,
}

/// Resolve the transitive dependency closure for a formula and return it in
/// build order.
///
/// Uses Kahn's algorithm for topological sorting, which naturally handles
/// cycles by detecting when not all formulas can be processed.
///
/// # Errors
/// - `MissingFormula` if the root formula is not found
/// - `UnsupportedPlatform` if any closure member declares the target as failing
/// - `DependencyCycle` if a circular dependency is detected
pub fn resolve(
    root: &str,
    formulas: &BTreeMap<String, FormulaSpec>,
    target: &TargetPlatform,
) -> Result<Resolution, Error> {
    let closure = compute_closure(root, formulas, target)?;

    for member in &closure {
        let Some(spec) = formulas.get(&member.name) else {
            continue;
        };
        if let Some(cause) = first_failure(&spec.platform_rules, target) {
            return Err(Error::UnsupportedPlatform {
                name: member.name.clone(),
                cause: cause.to_string(),
            });
        }
    }

    let order = topological_order(&closure, formulas, target)?;

    // Only the root formula's rules pick the toolchain; dependencies build
    // with whatever their own plans would select.
    let toolchain = formulas
        .get(root)
        .and_then(|spec| toolchain_override(&spec.platform_rules, target));

    Ok(Resolution { order, toolchain })
}

/// Compute the transitive closure of dependencies, breadth-first from the
/// root. Each member records the index at which it was first discovered.
///
/// The root formula must exist; missing dependencies are skipped with a note
/// (formula directories routinely omit toolchain packages that are assumed
/// present on the host).
fn compute_closure(
    root: &str,
    formulas: &BTreeMap<String, FormulaSpec>,
    target: &TargetPlatform,
) -> Result<Vec<DependencyNode>, Error> {
    let mut closure: Vec<DependencyNode> = Vec::new();
    let mut queue: std::collections::VecDeque<(String, DepKind)> =
        std::collections::VecDeque::new();
    queue.push_back((root.to_string(), DepKind::Runtime));

    while let Some((name, kind)) = queue.pop_front() {
        if let Some(existing) = closure.iter_mut().find(|node| node.name == name) {
            // A runtime path to an already-discovered build-only dependency
            // promotes it; the reverse never demotes.
            if kind == DepKind::Runtime {
                existing.kind = DepKind::Runtime;
            }
            continue;
        }

        let Some(spec) = formulas.get(&name) else {
            if name == root {
                return Err(Error::MissingFormula { name });
            }
            eprintln!("    Note: skipping unavailable dependency '{}'", name);
            continue;
        };

        closure.push(DependencyNode {
            name: name.clone(),
            kind,
            position: closure.len(),
        });

        for dep in spec.effective_dependencies(target) {
            let dep_kind = if spec.is_build_dependency(&dep) {
                DepKind::Build
            } else {
                DepKind::Runtime
            };
            queue.push_back((dep, dep_kind));
        }
    }

    Ok(closure)
}

/// Kahn's algorithm over the closure. Among formulas whose dependencies are
/// all satisfied, the one discovered earliest from the root goes first.
fn topological_order(
    closure: &[DependencyNode],
    formulas: &BTreeMap<String, FormulaSpec>,
    target: &TargetPlatform,
) -> Result<Vec<DependencyNode>, Error> {
    let in_closure = |name: &str| closure.iter().any(|node| node.name == name);

    let mut indegree: BTreeMap<&str, usize> =
        closure.iter().map(|node| (node.name.as_str(), 0)).collect();
    let mut adjacency: BTreeMap<&str, Vec<&str>> = BTreeMap::new();

    for node in closure {
        let Some(spec) = formulas.get(&node.name) else {
            continue;
        };
        for dep in spec.effective_dependencies(target) {
            if !in_closure(&dep) {
                continue;
            }
            if let Some(count) = indegree.get_mut(node.name.as_str()) {
                *count += 1;
            }
            let dep_entry = closure
                .iter()
                .find(|n| n.name == dep)
                .map(|n| n.name.as_str());
            if let Some(dep_name) = dep_entry {
                adjacency.entry(dep_name).or_default().push(&node.name);
            }
        }
    }

    let position_of = |name: &str| {
        closure
            .iter()
            .find(|node| node.name == name)
            .map(|node| node.position)
            .unwrap_or(usize::MAX)
    };

    let mut ready: Vec<&str> = indegree
        .iter()
        .filter_map(|(name, count)| (*count == 0).then_some(*name))
        .collect();

    let mut ordered = Vec::with_capacity(closure.len());
    while !ready.is_empty() {
        // Lowest discovery index first.
        let (idx, _) = ready
            .iter()
            .enumerate()
            .min_by_key(|(_, name)| position_of(name))
            .unwrap_or((0, &ready[0]));
        let name = ready.swap_remove(idx);

        if let Some(node) = closure.iter().find(|n| n.name == name) {
            ordered.push(node.clone());
        }
        if let Some(children) = adjacency.get(name) {
            for child in children {
                if let Some(count) = indegree.get_mut(child) {
                    *count -= 1;
                    if *count == 0 {
                        ready.push(child);
                    }
                }
            }
        }
    }

    if ordered.len() != closure.len() {
        let cycle: Vec<String> = closure
            .iter()
            .filter(|node| !ordered.iter().any(|o| o.name == node.name))
            .map(|node| node.name.clone())
            .collect();
        return Err(Error::DependencyCycle { cycle });
    }

    Ok(ordered)
}
