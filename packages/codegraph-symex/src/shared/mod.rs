//! Shared module - Common types consumed by every feature
//!
//! Holds the front-end IR contract; it depends on nothing engine-specific.

pub mod models;

// Re-exports for convenience
pub use models::*;
