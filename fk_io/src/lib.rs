pub mod cache;
pub mod catalog;
pub mod environment;
pub mod executor;
pub mod expand;
pub mod extract;
pub mod fetch;
pub mod progress;

pub use cache::SourceCache;
pub use catalog::{load_catalog, load_formula_file};
pub use environment::BuildEnvironment;
pub use executor::{Executor, ExecutorConfig, InstallReport, Phase};
pub use expand::ExpansionContext;
pub use extract::extract_archive;
pub use fetch::{Fetcher, compute_sha256, verify};
pub use progress::{BuildProgress, ProgressCallback, null_progress};
