#![no_main]

use codegraph_symex::config::{SymbolicConfig, Tier};
use codegraph_symex::FunctionIr;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(json) = std::str::from_utf8(data) else {
        return;
    };
    // Malformed IR is rejected, well-formed IR is explored; neither may panic
    if let Ok(function) = FunctionIr::from_json(json) {
        let config = SymbolicConfig::from_tier(Tier::Community)
            .max_paths(16)
            .max_depth(Some(4))
            .time_budget_ms(1_000);
        let _ = codegraph_symex::analyze(function, config);
    }
});
