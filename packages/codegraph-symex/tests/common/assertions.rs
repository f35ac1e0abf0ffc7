//! Custom assertions for test verification
//!
//! Domain-specific checks over `SymbolicExecutionResult`.

use codegraph_symex::{PathReport, PathStatus, SymbolicExecutionResult};

/// Assert the invocation succeeded
pub fn assert_success(result: &SymbolicExecutionResult) {
    assert!(
        result.success,
        "Expected success, got error: {:?}",
        result.error
    );
}

/// Paths with a given status
pub fn paths_with_status(result: &SymbolicExecutionResult, status: PathStatus) -> Vec<&PathReport> {
    result.paths.iter().filter(|p| p.status == status).collect()
}

/// Path conditions as rendered strings, in result order
pub fn conditions(result: &SymbolicExecutionResult) -> Vec<Vec<String>> {
    result.paths.iter().map(|p| p.constraints.clone()).collect()
}

/// Assert every SAT path carries an example input
pub fn assert_sat_paths_have_examples(result: &SymbolicExecutionResult) {
    for path in paths_with_status(result, PathStatus::Sat) {
        assert!(
            path.example_input.is_some(),
            "SAT path {} has no example input",
            path.path_id
        );
        assert_eq!(path.reachable, Some(true), "SAT path {} not reachable", path.path_id);
    }
}

/// Assert no path mentions `needle` in its return value
pub fn assert_no_path_returns(result: &SymbolicExecutionResult, needle: &str) {
    assert!(
        result.paths.iter().all(|p| !p.return_value.contains(needle)),
        "Expected no path returning {needle}, got: {:?}",
        result.paths.iter().map(|p| &p.return_value).collect::<Vec<_>>()
    );
}
