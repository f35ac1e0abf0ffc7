//! Tier presets
//!
//! A tier selects a complete default `SymbolicConfig`: loop bound, path
//! budget, symbolic type set and which report extensions are produced.

use super::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};

/// Analysis tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Baseline: deterministic source-order exploration
    ///
    /// - Loops unrolled 10 times, 50 paths
    /// - Int/Bool/Float/String only
    #[default]
    Community,

    /// Adds bounded collections, diversity prioritization,
    /// test inputs, type coverage, concolic hints and equivalence
    ///
    /// - Loops unrolled 100 times, 500 paths
    Pro,

    /// Adds object field maps and partitioned exploration
    ///
    /// - Loops unbounded (time/path budget still applies), 10000 paths
    Enterprise,
}

impl Tier {
    /// All tier names, lowest first
    pub const NAMES: [&'static str; 3] = ["community", "pro", "enterprise"];

    /// Parse tier from string (case-insensitive)
    pub fn parse(s: &str) -> ConfigResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "community" => Ok(Self::Community),
            "pro" => Ok(Self::Pro),
            "enterprise" => Ok(Self::Enterprise),
            _ => Err(ConfigError::unknown_tier(s, &Self::NAMES)),
        }
    }

    /// Convert to string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Community => "community",
            Self::Pro => "pro",
            Self::Enterprise => "enterprise",
        }
    }

    /// Loop unrolling bound for this tier (`None` = unbounded)
    pub fn loop_bound(&self) -> Option<usize> {
        match self {
            Self::Community => Some(10),
            Self::Pro => Some(100),
            Self::Enterprise => None,
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Tier {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_parsing() {
        assert_eq!(Tier::parse("community").unwrap(), Tier::Community);
        assert_eq!(Tier::parse("PRO").unwrap(), Tier::Pro);
        assert_eq!(Tier::parse(" Enterprise ").unwrap(), Tier::Enterprise);
        assert!(Tier::parse("platinum").is_err());
    }

    #[test]
    fn test_tier_display() {
        assert_eq!(Tier::Community.to_string(), "community");
        assert_eq!(Tier::Pro.to_string(), "pro");
        assert_eq!(Tier::Enterprise.to_string(), "enterprise");
    }

    #[test]
    fn test_loop_bounds() {
        assert_eq!(Tier::Community.loop_bound(), Some(10));
        assert_eq!(Tier::Pro.loop_bound(), Some(100));
        assert_eq!(Tier::Enterprise.loop_bound(), None);
    }

    #[test]
    fn test_default_tier() {
        assert_eq!(Tier::default(), Tier::Community);
    }
}
