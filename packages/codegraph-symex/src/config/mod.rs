//! Engine configuration
//!
//! Two levels of control:
//! - Tier preset: `SymbolicConfig::from_tier(Tier::Pro)`
//! - Field override: builder methods or a versioned YAML file
//!
//! # Examples
//!
//! ```rust,ignore
//! use codegraph_symex::config::{SymbolicConfig, Tier, Validatable};
//!
//! let config = SymbolicConfig::from_tier(Tier::Pro).max_paths(200).max_depth(Some(20));
//! config.validate()?;
//!
//! let config = SymbolicConfig::from_yaml_file("symex.yaml")?;
//! ```

pub mod error;
pub mod io;
pub mod symbolic_config;
pub mod tier;
pub mod validation;

// Re-exports
pub use error::{ConfigError, ConfigResult};
pub use io::{ConfigExportV1, ConfigOverrides};
pub use symbolic_config::{PrioritizerKind, ReportExtensions, SymbolicConfig, SymbolicTypeKind};
pub use tier::Tier;
pub use validation::Validatable;
