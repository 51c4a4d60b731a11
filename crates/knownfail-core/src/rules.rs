//! Rule tables and their evaluation.
//!
//! A [`RuleSet`] is a tree of [`Rule`]s. Each rule contributes its entries
//! when its predicate holds, and its children are only considered when the
//! parent holds too. Contributions are folded by union: no rule can remove
//! what another added, so the order of rules never affects the result.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{KnownFailError, Result};
use crate::fingerprint::EnvironmentFingerprint;
use crate::predicate::Predicate;

/// A predicate gating a block of raw entries and nested rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Human-readable name, used in logs and validation errors.
    pub label: String,
    pub when: Predicate,
    /// Raw entries, optionally prefixed with `FLAKY `.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entries: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Rule>,
}

/// A rule with its ancestry folded into one compound predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatRule {
    pub label: String,
    pub when: Predicate,
    pub entries: Vec<String>,
}

impl Rule {
    pub fn new(label: impl Into<String>, when: Predicate) -> Self {
        Self {
            label: label.into(),
            when,
            entries: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_entries<I, S>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entries.extend(entries.into_iter().map(Into::into));
        self
    }

    pub fn with_child(mut self, child: Rule) -> Self {
        self.children.push(child);
        self
    }

    /// This rule and all descendants, each with a single predicate that
    /// is the conjunction of its own and its ancestors' predicates.
    pub fn flatten(&self) -> Vec<FlatRule> {
        let mut out = Vec::new();
        self.flatten_into(None, &Predicate::Always, &mut out);
        out
    }

    fn flatten_into(&self, parent_label: Option<&str>, parent: &Predicate, out: &mut Vec<FlatRule>) {
        let label = match parent_label {
            Some(p) => format!("{} / {}", p, self.label),
            None => self.label.clone(),
        };
        let when = parent.clone().and(self.when.clone());
        for child in &self.children {
            child.flatten_into(Some(&label), &when, out);
        }
        out.push(FlatRule {
            label,
            when,
            entries: self.entries.clone(),
        });
    }

    fn collect<'a>(&'a self, fp: &EnvironmentFingerprint, out: &mut Vec<&'a str>) {
        if !self.when.holds(fp) {
            return;
        }
        debug!(rule = %self.label, entries = self.entries.len(), "rule applies");
        out.extend(self.entries.iter().map(String::as_str));
        for child in &self.children {
            child.collect(fp, out);
        }
    }

    fn validate(&self, path: &str) -> Result<()> {
        let invalid = |reason: &str| KnownFailError::InvalidRule {
            label: if path.is_empty() {
                self.label.clone()
            } else {
                format!("{} / {}", path, self.label)
            },
            reason: reason.to_string(),
        };

        if self.label.trim().is_empty() {
            return Err(invalid("label must not be empty"));
        }
        if let Some(reason) = predicate_defect(&self.when) {
            return Err(invalid(reason));
        }
        for entry in &self.entries {
            if entry.trim().is_empty() {
                warn!(rule = %self.label, "rule contains a blank entry; it will be ignored");
            }
        }

        let here = if path.is_empty() {
            self.label.clone()
        } else {
            format!("{} / {}", path, self.label)
        };
        self.children.iter().try_for_each(|child| child.validate(&here))
    }
}

fn predicate_defect(predicate: &Predicate) -> Option<&'static str> {
    match predicate {
        Predicate::Platform(p) | Predicate::PlatformPrefix(p) if p.trim().is_empty() => {
            Some("platform must not be empty")
        }
        Predicate::Not(inner) => predicate_defect(inner),
        Predicate::All(members) | Predicate::Any(members) => {
            members.iter().find_map(predicate_defect)
        }
        _ => None,
    }
}

/// An ordered collection of top-level rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// The curated table shipped with this crate.
    pub fn builtin() -> Self {
        crate::table::builtin()
    }

    /// Parse and validate a JSON rule table.
    pub fn from_json(json: &str) -> Result<Self> {
        let set: RuleSet = serde_json::from_str(json)?;
        set.validate()?;
        Ok(set)
    }

    /// Load and validate a JSON rule table from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn push(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    /// Every rule in the tree as a single-predicate rule.
    pub fn flatten(&self) -> Vec<FlatRule> {
        self.rules.iter().flat_map(Rule::flatten).collect()
    }

    /// Check labels and predicates for authoring defects.
    pub fn validate(&self) -> Result<()> {
        self.rules.iter().try_for_each(|rule| rule.validate(""))
    }

    /// Raw entries contributed by every rule the fingerprint satisfies.
    ///
    /// The result may contain duplicates and blank strings; normalization
    /// is the registry's job.
    pub fn evaluate(&self, fp: &EnvironmentFingerprint) -> Vec<String> {
        let mut out = Vec::new();
        for rule in &self.rules {
            rule.collect(fp, &mut out);
        }
        out.into_iter().map(str::to_string).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::Signal;

    fn sample() -> RuleSet {
        RuleSet::new(vec![
            Rule::new("base", Predicate::Always).with_entries(["FLAKY test_a.py"]),
            Rule::new("windows", Predicate::platform("win32"))
                .with_entries(["test_b.py"])
                .with_child(
                    Rule::new("appveyor", Predicate::Signal(Signal::Appveyor))
                        .with_entries(["FLAKY test_c.py"]),
                ),
        ])
    }

    #[test]
    fn test_unsatisfied_rule_contributes_nothing() {
        let linux = EnvironmentFingerprint::builder().platform("linux").build();
        assert_eq!(sample().evaluate(&linux), vec!["FLAKY test_a.py".to_string()]);
    }

    #[test]
    fn test_child_requires_parent() {
        let ci_linux = EnvironmentFingerprint::builder()
            .platform("linux")
            .signal(Signal::Appveyor, true)
            .build();
        let entries = sample().evaluate(&ci_linux);
        assert!(!entries.contains(&"FLAKY test_c.py".to_string()));

        let ci_windows = ci_linux.to_builder().platform("win32").build();
        let entries = sample().evaluate(&ci_windows);
        assert!(entries.contains(&"FLAKY test_c.py".to_string()));
        assert!(entries.contains(&"test_b.py".to_string()));
    }

    #[test]
    fn test_flatten_composes_predicates() {
        let flat = sample().flatten();
        assert_eq!(flat.len(), 3);
        let child = flat
            .iter()
            .find(|r| r.label == "windows / appveyor")
            .expect("child flattened");
        assert_eq!(
            child.when,
            Predicate::All(vec![
                Predicate::platform("win32"),
                Predicate::Signal(Signal::Appveyor)
            ])
        );
    }

    #[test]
    fn test_validate_rejects_empty_label() {
        let set = RuleSet::new(vec![Rule::new("  ", Predicate::Always)]);
        assert!(matches!(set.validate(), Err(KnownFailError::InvalidRule { .. })));
    }

    #[test]
    fn test_validate_reports_nested_path() {
        let set = RuleSet::new(vec![Rule::new("outer", Predicate::Always)
            .with_child(Rule::new("inner", Predicate::platform("")))]);
        match set.validate() {
            Err(KnownFailError::InvalidRule { label, .. }) => assert_eq!(label, "outer / inner"),
            other => panic!("expected InvalidRule, got {:?}", other),
        }
    }

    #[test]
    fn test_from_json() {
        let json = r#"[
            { "label": "base", "when": "always", "entries": ["FLAKY test_x.py"] },
            {
                "label": "py3",
                "when": { "major_at_least": 3 },
                "children": [
                    { "label": "leak", "when": { "signal": "leak_check" }, "entries": ["test_y.py"] }
                ]
            }
        ]"#;
        let set = RuleSet::from_json(json).unwrap();
        assert_eq!(set.rules().len(), 2);

        let fp = EnvironmentFingerprint::builder()
            .version(3, 6, 0)
            .signal(Signal::LeakCheck, true)
            .build();
        assert_eq!(
            set.evaluate(&fp),
            vec!["FLAKY test_x.py".to_string(), "test_y.py".to_string()]
        );
    }

    #[test]
    fn test_from_json_rejects_non_string_entries() {
        let json = r#"[{ "label": "bad", "when": "always", "entries": [42] }]"#;
        assert!(matches!(
            RuleSet::from_json(json),
            Err(KnownFailError::Serialization(_))
        ));
    }
}
