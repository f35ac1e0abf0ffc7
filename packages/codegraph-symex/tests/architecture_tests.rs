//! Architecture Boundary Tests
//!
//! Source-level checks that keep the hexagonal layering intact:
//!
//! ```text
//! application ──▶ infrastructure ──▶ ports ──▶ domain
//!      │                                         ▲
//!      └─────────────────────────────────────────┘
//! config and shared stay leaves
//! ```

#![cfg(test)]

use std::path::{Path, PathBuf};

fn feature_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("src/features/symbolic_execution")
}

fn rust_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
            files.extend(rust_files(&path));
        } else if path.extension().is_some_and(|e| e == "rs") {
            files.push(path);
        }
    }
    files
}

/// Production lines only (stops at the first `#[cfg(test)]`)
fn production_source(path: &Path) -> String {
    let content = std::fs::read_to_string(path).unwrap();
    content
        .lines()
        .take_while(|line| !line.trim_start().starts_with("#[cfg(test)]"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn assert_no_imports(layer: &str, forbidden: &[&str]) {
    for file in rust_files(&feature_dir().join(layer)) {
        let source = production_source(&file);
        for import in forbidden {
            assert!(
                !source.contains(import),
                "{} imports {} ({})",
                layer,
                import,
                file.display()
            );
        }
    }
}

/// Domain is pure: no solver, exploration or use-case types
#[test]
fn test_domain_has_no_outward_dependencies() {
    assert_no_imports(
        "domain",
        &[
            "symbolic_execution::infrastructure",
            "symbolic_execution::application",
            "symbolic_execution::ports",
            "crate::config",
        ],
    );
}

/// Ports describe seams in domain terms only
#[test]
fn test_ports_depend_on_domain_only() {
    assert_no_imports(
        "ports",
        &["symbolic_execution::infrastructure", "symbolic_execution::application"],
    );
}

/// Infrastructure never reaches back into the use case
#[test]
fn test_infrastructure_does_not_import_application() {
    assert_no_imports("infrastructure", &["symbolic_execution::application"]);
}

/// Config is a leaf dependency
#[test]
fn test_config_is_leaf_dependency() {
    let config_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("src/config");
    for file in rust_files(&config_dir) {
        let source = production_source(&file);
        assert!(
            !source.contains("use crate::features::"),
            "config depends on features ({})",
            file.display()
        );
    }
}

/// The IR contract is shared by every layer and imports none of them
#[test]
fn test_shared_models_are_leaf() {
    let shared = Path::new(env!("CARGO_MANIFEST_DIR")).join("src/shared");
    for file in rust_files(&shared) {
        let source = production_source(&file);
        assert!(!source.contains("use crate::features::"), "{}", file.display());
        assert!(!source.contains("use crate::config::"), "{}", file.display());
    }
}

/// The engine is a pure in-process library: no network, async runtime or FFI
#[test]
fn test_no_io_runtime_dependencies() {
    let cargo_toml = Path::new(env!("CARGO_MANIFEST_DIR")).join("Cargo.toml");
    let content = std::fs::read_to_string(cargo_toml).unwrap();

    for dep in ["reqwest", "hyper", "tokio", "async-std", "pyo3", "z3"] {
        let declared = content
            .lines()
            .any(|line| line.trim_start().starts_with(&format!("{} ", dep)) || line.trim_start().starts_with(&format!("{}=", dep)));
        assert!(!declared, "unexpected dependency {}", dep);
    }
}

/// Solver access goes through the port trait
#[test]
fn test_explorer_uses_solver_port() {
    let explorer = production_source(&feature_dir().join("infrastructure/explorer.rs"));
    assert!(!explorer.contains("NativeSolver"), "explorer names a concrete solver");
}
