//! Command implementations for the Voxtrain CLI.

pub mod cache;
pub mod prepare;
pub mod runs;
pub mod train;

// Re-export subcommand types for convenience
pub use cache::CacheCommand;
