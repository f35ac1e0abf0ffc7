//! Equivalence claims

use serde::Serialize;
use std::collections::BTreeMap;

use super::concrete::ConcreteValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EquivalenceVerdict {
    Equivalent,
    Different,
    Unknown,
}

/// Verdict on two functions; derived per check, never persisted
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EquivalenceClaim {
    pub function_a_id: String,
    pub function_b_id: String,
    pub result: EquivalenceVerdict,
    pub counterexample: Option<BTreeMap<String, ConcreteValue>>,
    /// Why the verdict is not EQUIVALENT/DIFFERENT outright
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_a: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_b: Option<String>,
    pub pairs_checked: usize,
}

impl EquivalenceClaim {
    pub fn new(a: impl Into<String>, b: impl Into<String>, result: EquivalenceVerdict) -> Self {
        Self {
            function_a_id: a.into(),
            function_b_id: b.into(),
            result,
            counterexample: None,
            reason: None,
            output_a: None,
            output_b: None,
            pairs_checked: 0,
        }
    }

    pub fn unknown(a: impl Into<String>, b: impl Into<String>, reason: impl Into<String>) -> Self {
        let mut claim = Self::new(a, b, EquivalenceVerdict::Unknown);
        claim.reason = Some(reason.into());
        claim
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialized_verdict() {
        let claim = EquivalenceClaim::new("f", "g", EquivalenceVerdict::Equivalent);
        let json = serde_json::to_value(&claim).unwrap();
        assert_eq!(json["result"], "EQUIVALENT");
        assert!(json["counterexample"].is_null());
        assert!(json.get("reason").is_none());
    }
}
