//! Configuration I/O (YAML loading/export)
//!
//! Schema v1:
//!
//! ```yaml
//! version: 1
//! tier: pro
//! overrides:
//!   max_paths: 200
//!   max_depth: 20
//! ```

use super::error::{ConfigError, ConfigResult};
use super::symbolic_config::{PrioritizerKind, ReportExtensions, SymbolicConfig, SymbolicTypeKind};
use super::tier::Tier;
use super::validation::Validatable;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

/// Supported schema versions
pub const SUPPORTED_VERSIONS: [u32; 1] = [1];

/// YAML Schema v1
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigExportV1 {
    /// Schema version (always 1 for v1)
    #[serde(default)]
    pub version: Option<u32>,

    /// Base tier
    #[serde(default)]
    pub tier: Option<String>,

    /// Fine-grained overrides applied on top of the tier preset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overrides: Option<ConfigOverrides>,
}

/// Configuration overrides
///
/// `max_depth: null` means unbounded; an absent key keeps the tier value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_paths: Option<usize>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "double_option"
    )]
    pub max_depth: Option<Option<usize>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled_types: Option<BTreeSet<SymbolicTypeKind>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_string_length: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_collection_length: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub solver_timeout_ms: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_budget_ms: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub solver_available: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub prioritizer: Option<PrioritizerKind>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub distributed: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub split_depth: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_queries: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub verify_examples: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<ReportExtensions>,
}

/// Distinguishes an absent key from an explicit `null`
mod double_option {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S, T>(value: &Option<Option<T>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: Serialize,
    {
        match value {
            Some(inner) => inner.serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}

impl ConfigOverrides {
    /// Apply every present override onto `config`
    pub fn apply(self, mut config: SymbolicConfig) -> SymbolicConfig {
        if let Some(v) = self.max_paths {
            config.max_paths = v;
        }
        if let Some(v) = self.max_depth {
            config.max_depth = v;
        }
        if let Some(v) = self.enabled_types {
            config.enabled_types = v;
        }
        if let Some(v) = self.max_string_length {
            config.max_string_length = v;
        }
        if let Some(v) = self.max_collection_length {
            config.max_collection_length = v;
        }
        if let Some(v) = self.solver_timeout_ms {
            config.solver_timeout_ms = v;
        }
        if let Some(v) = self.time_budget_ms {
            config.time_budget_ms = v;
        }
        if let Some(v) = self.solver_available {
            config.solver_available = v;
        }
        if let Some(v) = self.prioritizer {
            config.prioritizer = v;
        }
        if let Some(v) = self.distributed {
            config.distributed = v;
        }
        if let Some(v) = self.workers {
            config.workers = v;
        }
        if let Some(v) = self.split_depth {
            config.split_depth = v;
        }
        if let Some(v) = self.cache_queries {
            config.cache_queries = v;
        }
        if let Some(v) = self.verify_examples {
            config.verify_examples = v;
        }
        if let Some(v) = self.report {
            config.report = v;
        }
        config
    }

    /// Overrides that turn the `tier` preset into `config`
    fn diff(tier: Tier, config: &SymbolicConfig) -> Self {
        let base = SymbolicConfig::from_tier(tier);
        fn changed<T: PartialEq + Clone>(base: &T, value: &T) -> Option<T> {
            (base != value).then(|| value.clone())
        }
        Self {
            max_paths: changed(&base.max_paths, &config.max_paths),
            max_depth: changed(&base.max_depth, &config.max_depth),
            enabled_types: changed(&base.enabled_types, &config.enabled_types),
            max_string_length: changed(&base.max_string_length, &config.max_string_length),
            max_collection_length: changed(
                &base.max_collection_length,
                &config.max_collection_length,
            ),
            solver_timeout_ms: changed(&base.solver_timeout_ms, &config.solver_timeout_ms),
            time_budget_ms: changed(&base.time_budget_ms, &config.time_budget_ms),
            solver_available: changed(&base.solver_available, &config.solver_available),
            prioritizer: changed(&base.prioritizer, &config.prioritizer),
            distributed: changed(&base.distributed, &config.distributed),
            workers: changed(&base.workers, &config.workers),
            split_depth: changed(&base.split_depth, &config.split_depth),
            cache_queries: changed(&base.cache_queries, &config.cache_queries),
            verify_examples: changed(&base.verify_examples, &config.verify_examples),
            report: changed(&base.report, &config.report),
        }
    }
}

impl SymbolicConfig {
    /// Load and validate configuration from a YAML string
    pub fn from_yaml_str(content: &str) -> ConfigResult<Self> {
        let export: ConfigExportV1 = serde_yaml::from_str(content)?;

        let version = export.version.ok_or(ConfigError::MissingVersion)?;
        if !SUPPORTED_VERSIONS.contains(&version) {
            return Err(ConfigError::UnsupportedVersion {
                found: version,
                supported: SUPPORTED_VERSIONS.to_vec(),
            });
        }

        let tier = match export.tier.as_deref() {
            Some(name) => Tier::parse(name)?,
            None => Tier::default(),
        };

        let config = match export.overrides {
            Some(overrides) => overrides.apply(Self::from_tier(tier)),
            None => Self::from_tier(tier),
        };

        config.validate()?;
        tracing::debug!(tier = %tier, max_paths = config.max_paths, "loaded symbolic config");
        Ok(config)
    }

    /// Load and validate configuration from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Export as YAML v1 (tier + overrides that differ from the tier preset)
    pub fn to_yaml(&self) -> ConfigResult<String> {
        let export = ConfigExportV1 {
            version: Some(1),
            tier: Some(self.tier.to_string()),
            overrides: Some(ConfigOverrides::diff(self.tier, self)),
        };
        serde_yaml::to_string(&export).map_err(ConfigError::Yaml)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_yaml_roundtrip() {
        let config = SymbolicConfig::from_tier(Tier::Pro)
            .max_paths(42)
            .max_depth(None);

        let yaml = config.to_yaml().unwrap();
        assert!(yaml.contains("version: 1"));
        assert!(yaml.contains("tier: pro"));
        assert!(yaml.contains("max_paths: 42"));

        let loaded = SymbolicConfig::from_yaml_str(&yaml).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_yaml_loading() {
        let yaml_content = r#"
version: 1
tier: community
overrides:
  max_paths: 20
  max_depth: 5
  enabled_types: [int, bool]
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(yaml_content.as_bytes()).unwrap();

        let config = SymbolicConfig::from_yaml_file(temp_file.path()).unwrap();
        assert_eq!(config.max_paths, 20);
        assert_eq!(config.max_depth, Some(5));
        assert!(!config.type_enabled(SymbolicTypeKind::String));
    }

    #[test]
    fn test_null_max_depth_is_unbounded() {
        let yaml = "version: 1\ntier: pro\noverrides:\n  max_depth: null\n";
        let config = SymbolicConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.max_depth, None);

        let yaml = "version: 1\ntier: pro\noverrides:\n  max_paths: 9\n";
        let config = SymbolicConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.max_depth, Some(100));
    }

    #[test]
    fn test_yaml_missing_version() {
        let result = SymbolicConfig::from_yaml_str("tier: pro\n");
        assert!(matches!(result, Err(ConfigError::MissingVersion)));
    }

    #[test]
    fn test_yaml_unsupported_version() {
        let result = SymbolicConfig::from_yaml_str("version: 2\ntier: pro\n");
        assert!(matches!(
            result,
            Err(ConfigError::UnsupportedVersion { .. })
        ));
    }

    #[test]
    fn test_yaml_unknown_field_rejected() {
        let result = SymbolicConfig::from_yaml_str("version: 1\nbogus: 3\n");
        assert!(matches!(result, Err(ConfigError::Yaml(_))));
    }

    #[test]
    fn test_yaml_override_validated() {
        let result = SymbolicConfig::from_yaml_str("version: 1\noverrides:\n  max_paths: 0\n");
        assert!(matches!(result, Err(ConfigError::Range { .. })));
    }

    #[test]
    fn test_yaml_unknown_tier() {
        let result = SymbolicConfig::from_yaml_str("version: 1\ntier: prro\n");
        match result {
            Err(ConfigError::UnknownTier { suggestion, .. }) => {
                assert!(suggestion.contains("pro"));
            }
            other => panic!("expected unknown tier, got {:?}", other),
        }
    }
}
