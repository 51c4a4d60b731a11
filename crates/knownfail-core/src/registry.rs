//! The normalized, queryable set of known failures.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{info, trace};

use crate::digest::sequence_digest;
use crate::fingerprint::EnvironmentFingerprint;
use crate::rules::RuleSet;

/// Tag marking an entry whose result is ignored rather than required to fail.
pub const FLAKY_PREFIX: &str = "FLAKY ";

/// One normalized registry entry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub test_id: String,
    pub flaky: bool,
}

impl RegistryEntry {
    /// Normalize a raw entry.
    ///
    /// Surrounding whitespace is trimmed and blank entries yield `None`.
    /// A leading `FLAKY ` (case-sensitive) marks the entry flaky; whitespace
    /// after the tag is not part of the identifier.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        let (test_id, flaky) = match trimmed.strip_prefix(FLAKY_PREFIX) {
            Some(rest) => (rest.trim_start(), true),
            None => (trimmed, false),
        };
        Some(Self {
            test_id: test_id.to_string(),
            flaky,
        })
    }
}

impl fmt::Display for RegistryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.flaky {
            write!(f, "{}{}", FLAKY_PREFIX, self.test_id)
        } else {
            f.write_str(&self.test_id)
        }
    }
}

/// How the registry regards a test identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    NotKnown,
    /// Expected to fail deterministically.
    KnownFailing,
    /// Result is ignored.
    KnownFlaky,
}

impl Classification {
    pub fn name(&self) -> &'static str {
        match self {
            Classification::NotKnown => "not_known",
            Classification::KnownFailing => "known_failing",
            Classification::KnownFlaky => "known_flaky",
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Classification::NotKnown)
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Immutable set of known failures for one environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FailureRegistry {
    entries: BTreeSet<RegistryEntry>,
}

impl FailureRegistry {
    /// Evaluate `rules` against `fp` and normalize the result.
    pub fn build(rules: &RuleSet, fp: &EnvironmentFingerprint) -> Self {
        let registry: Self = rules.evaluate(fp).iter().collect();
        info!(
            entries = registry.len(),
            flaky = registry.flaky().count(),
            "built known-failure registry"
        );
        registry
    }

    /// Normalize raw entries: trim, drop blanks, parse the flaky tag, dedupe.
    pub fn from_entries<I, S>(raw: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut entries = BTreeSet::new();
        for item in raw {
            match RegistryEntry::parse(item.as_ref()) {
                Some(entry) => {
                    entries.insert(entry);
                }
                None => trace!("dropping blank entry"),
            }
        }
        Self { entries }
    }

    /// Every entry, ordered by identifier then flaky tag.
    pub fn list_all(&self) -> &BTreeSet<RegistryEntry> {
        &self.entries
    }

    /// Classify `test_id`. A flaky entry takes precedence over a failing one.
    pub fn classify(&self, test_id: &str) -> Classification {
        let flaky = RegistryEntry {
            test_id: test_id.to_string(),
            flaky: true,
        };
        if self.entries.contains(&flaky) {
            return Classification::KnownFlaky;
        }
        let failing = RegistryEntry {
            flaky: false,
            ..flaky
        };
        if self.entries.contains(&failing) {
            Classification::KnownFailing
        } else {
            Classification::NotKnown
        }
    }

    pub fn contains(&self, test_id: &str) -> bool {
        self.classify(test_id).is_known()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries tagged flaky.
    pub fn flaky(&self) -> impl Iterator<Item = &RegistryEntry> {
        self.entries.iter().filter(|e| e.flaky)
    }

    /// Entries expected to fail deterministically.
    pub fn failing(&self) -> impl Iterator<Item = &RegistryEntry> {
        self.entries.iter().filter(|e| !e.flaky)
    }

    /// SHA-256 over the ordered entries in their raw form.
    pub fn digest(&self) -> String {
        sequence_digest(self.entries.iter().map(ToString::to_string))
    }
}

impl<S: AsRef<str>> FromIterator<S> for FailureRegistry {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::from_entries(iter)
    }
}
