//! Configuration tests
//!
//! Invariants that should hold for every tier and override combination:
//! - Roundtrip: from_yaml_str(to_yaml(x)) == x
//! - Validity: presets and in-range overrides validate
//! - Concurrency: configs are shared read-only across threads

use codegraph_symex::config::*;
use proptest::prelude::*;
use std::io::Write;
use std::sync::Arc;
use std::thread;

fn any_tier() -> impl Strategy<Value = Tier> {
    prop_oneof![Just(Tier::Community), Just(Tier::Pro), Just(Tier::Enterprise)]
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #[test]
    fn prop_yaml_roundtrip(
        tier in any_tier(),
        max_paths in 1usize..=100_000,
        max_depth in prop::option::of(1usize..=10_000),
        solver_timeout_ms in 1u64..=600_000,
    ) {
        let config = SymbolicConfig::from_tier(tier)
            .max_paths(max_paths)
            .max_depth(max_depth)
            .solver_timeout_ms(solver_timeout_ms);
        let yaml = config.to_yaml().unwrap();
        let loaded = SymbolicConfig::from_yaml_str(&yaml).unwrap();
        prop_assert_eq!(loaded, config);
    }

    #[test]
    fn prop_in_range_overrides_validate(
        tier in any_tier(),
        max_paths in 1usize..=100_000,
        max_collection_length in 1usize..=64,
        workers in 2usize..=256,
    ) {
        let config = SymbolicConfig::from_tier(tier)
            .max_paths(max_paths)
            .max_collection_length(max_collection_length)
            .workers(workers);
        prop_assert!(config.validate().is_ok());
    }

    #[test]
    fn prop_out_of_range_paths_rejected(tier in any_tier(), max_paths in 100_001usize..1_000_000) {
        let config = SymbolicConfig::from_tier(tier).max_paths(max_paths);
        let err = config.validate().unwrap_err();
        prop_assert!(err.to_string().contains("max_paths"));
    }
}

// ============================================================================
// Presets
// ============================================================================

#[test]
fn test_presets_are_ordered_by_capability() {
    let community = SymbolicConfig::from_tier(Tier::Community);
    let pro = SymbolicConfig::from_tier(Tier::Pro);
    let enterprise = SymbolicConfig::from_tier(Tier::Enterprise);

    assert!(community.max_paths < pro.max_paths);
    assert!(pro.max_paths < enterprise.max_paths);
    assert!(community.enabled_types.is_subset(&pro.enabled_types));
    assert!(pro.enabled_types.is_subset(&enterprise.enabled_types));
    assert!(!community.type_enabled(SymbolicTypeKind::List));
    assert!(enterprise.type_enabled(SymbolicTypeKind::Object));
    assert!(!community.report.equivalence_result);
    assert!(pro.report.equivalence_result);
    assert!(enterprise.distributed);
}

#[test]
fn test_default_is_community() {
    assert_eq!(SymbolicConfig::default(), SymbolicConfig::from_tier(Tier::Community));
}

#[test]
fn test_tier_parse_rejects_unknown() {
    assert_eq!(Tier::parse("Enterprise").unwrap(), Tier::Enterprise);
    let err = Tier::parse("platinum").unwrap_err();
    assert!(err.to_string().contains("platinum"));
}

#[test]
fn test_distributed_stats_requires_distributed() {
    let config = SymbolicConfig::from_tier(Tier::Enterprise).distributed(false);
    assert!(matches!(config.validate(), Err(ConfigError::Conflict { .. })));
}

// ============================================================================
// YAML files
// ============================================================================

#[test]
fn test_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "version: 1\ntier: pro\noverrides:\n  max_paths: 120\n  max_depth: 25\n  prioritizer: source_order\n"
    )
    .unwrap();

    let config = SymbolicConfig::from_yaml_file(file.path()).unwrap();
    assert_eq!(config.tier, Tier::Pro);
    assert_eq!(config.max_paths, 120);
    assert_eq!(config.max_depth, Some(25));
    assert_eq!(config.prioritizer, PrioritizerKind::SourceOrder);
    // untouched fields keep the preset
    assert_eq!(config.max_collection_length, SymbolicConfig::from_tier(Tier::Pro).max_collection_length);
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = SymbolicConfig::from_yaml_file(dir.path().join("absent.yaml"));
    assert!(matches!(result, Err(ConfigError::Io(_))));
}

#[test]
fn test_file_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("symex.yaml");
    let config = SymbolicConfig::from_tier(Tier::Enterprise).workers(8).split_depth(4);
    std::fs::write(&path, config.to_yaml().unwrap()).unwrap();
    assert_eq!(SymbolicConfig::from_yaml_file(&path).unwrap(), config);
}

#[test]
fn test_version_is_required() {
    assert!(matches!(
        SymbolicConfig::from_yaml_str("tier: pro\n"),
        Err(ConfigError::MissingVersion)
    ));
    assert!(matches!(
        SymbolicConfig::from_yaml_str("version: 7\n"),
        Err(ConfigError::UnsupportedVersion { found: 7, .. })
    ));
}

// ============================================================================
// Concurrency
// ============================================================================

#[test]
fn test_concurrent_yaml_parse() {
    let yaml = Arc::new("version: 1\ntier: enterprise\noverrides:\n  workers: 6\n".to_string());
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let yaml = Arc::clone(&yaml);
            thread::spawn(move || SymbolicConfig::from_yaml_str(&yaml).unwrap())
        })
        .collect();

    let configs: Vec<SymbolicConfig> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(configs.iter().all(|c| c.workers == 6 && c == &configs[0]));
}

#[test]
fn test_shared_config_across_threads() {
    let config = Arc::new(SymbolicConfig::from_tier(Tier::Pro));
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let config = Arc::clone(&config);
            thread::spawn(move || config.validate().is_ok())
        })
        .collect();
    assert!(handles.into_iter().all(|h| h.join().unwrap()));
}
