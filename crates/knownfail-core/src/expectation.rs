//! Judging an observed test result against the registry.
//!
//! Listed tests must fail; flaky tests are ignored either way. A listed test
//! that passes is reported so the stale entry gets removed.

use serde::{Deserialize, Serialize};

use crate::registry::{Classification, FailureRegistry};

/// Outcome of comparing one observed result with the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Unlisted and passed.
    Passed,
    /// Unlisted and failed.
    Regression,
    /// Listed as failing and failed.
    ExpectedFailure,
    /// Listed as failing but passed.
    UnexpectedPass,
    /// Listed as flaky; the result does not matter.
    FlakyIgnored,
}

impl Verdict {
    /// Whether the harness should report this result as an error.
    pub fn is_blocking(&self) -> bool {
        matches!(self, Verdict::Regression | Verdict::UnexpectedPass)
    }
}

impl FailureRegistry {
    /// Judge an observed result for `test_id`.
    pub fn judge(&self, test_id: &str, passed: bool) -> Verdict {
        match (self.classify(test_id), passed) {
            (Classification::KnownFlaky, _) => Verdict::FlakyIgnored,
            (Classification::KnownFailing, true) => Verdict::UnexpectedPass,
            (Classification::KnownFailing, false) => Verdict::ExpectedFailure,
            (Classification::NotKnown, true) => Verdict::Passed,
            (Classification::NotKnown, false) => Verdict::Regression,
        }
    }
}
