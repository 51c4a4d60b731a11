//! Declarative conditions over an [`EnvironmentFingerprint`].
//!
//! Predicates are plain data so rule tables can be serialized, compared and
//! loaded from JSON. Evaluation is pure.

use serde::{Deserialize, Serialize};

use crate::fingerprint::{EnvironmentFingerprint, InterpreterFamily, PointerWidth};
use crate::signal::Signal;

/// A boolean condition on the environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    /// Always true.
    Always,
    /// Platform identifier equals this value.
    Platform(String),
    /// Platform identifier starts with this value (`darwin` matches `darwin19`).
    PlatformPrefix(String),
    Family(InterpreterFamily),
    PointerBits(PointerWidth),
    Signal(Signal),
    /// `major >= n`.
    MajorAtLeast(u32),
    /// `major == n`.
    MajorEquals(u32),
    /// `minor >= n`, independent of major.
    MinorAtLeast(u32),
    /// `patch >= n`, independent of major and minor.
    PatchAtLeast(u32),
    /// `(major, minor) >= (major, minor)` compared as a tuple.
    VersionAtLeast { major: u32, minor: u32 },
    Not(Box<Predicate>),
    /// True when every member holds; empty is true.
    All(Vec<Predicate>),
    /// True when any member holds; empty is false.
    Any(Vec<Predicate>),
}

impl Predicate {
    pub fn platform(platform: impl Into<String>) -> Self {
        Predicate::Platform(platform.into())
    }

    pub fn platform_prefix(prefix: impl Into<String>) -> Self {
        Predicate::PlatformPrefix(prefix.into())
    }

    pub fn version_at_least(major: u32, minor: u32) -> Self {
        Predicate::VersionAtLeast { major, minor }
    }

    /// Conjunction, flattening nested `All`s.
    pub fn and(self, other: Predicate) -> Self {
        match (self, other) {
            (Predicate::Always, p) | (p, Predicate::Always) => p,
            (Predicate::All(mut left), Predicate::All(right)) => {
                left.extend(right);
                Predicate::All(left)
            }
            (Predicate::All(mut left), p) => {
                left.push(p);
                Predicate::All(left)
            }
            (p, Predicate::All(mut right)) => {
                right.insert(0, p);
                Predicate::All(right)
            }
            (left, right) => Predicate::All(vec![left, right]),
        }
    }

    pub fn negate(self) -> Self {
        Predicate::Not(Box::new(self))
    }

    /// Whether the fingerprint satisfies this predicate.
    pub fn holds(&self, fp: &EnvironmentFingerprint) -> bool {
        let version = fp.version();
        match self {
            Predicate::Always => true,
            Predicate::Platform(platform) => fp.platform() == platform,
            Predicate::PlatformPrefix(prefix) => fp.platform().starts_with(prefix.as_str()),
            Predicate::Family(family) => fp.family() == *family,
            Predicate::PointerBits(width) => fp.pointer_bits() == *width,
            Predicate::Signal(signal) => fp.signal(*signal),
            Predicate::MajorAtLeast(n) => version.major >= *n,
            Predicate::MajorEquals(n) => version.major == *n,
            Predicate::MinorAtLeast(n) => version.minor >= *n,
            Predicate::PatchAtLeast(n) => version.patch >= *n,
            Predicate::VersionAtLeast { major, minor } => {
                (version.major, version.minor) >= (*major, *minor)
            }
            Predicate::Not(inner) => !inner.holds(fp),
            Predicate::All(members) => members.iter().all(|p| p.holds(fp)),
            Predicate::Any(members) => members.iter().any(|p| p.holds(fp)),
        }
    }
}
