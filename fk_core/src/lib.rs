pub mod errors;
pub mod formula;
pub mod formula_parser;
pub mod platform;
pub mod resolve;

pub use errors::Error;
pub use formula::{ArtifactDir, BuildStep, FormulaSpec, TestFile, TestSpec};
pub use formula_parser::{ParseError, parse_formula};
pub use platform::{
    Compiler, Effect, Os, PlatformRule, Predicate, TargetPlatform, Toolchain,
};
pub use resolve::{DepKind, DependencyNode, Resolution, resolve};
