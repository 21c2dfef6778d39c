//! Command implementations for the firkin CLI.

pub mod install;
pub mod query;
