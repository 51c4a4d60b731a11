//! External boolean signals read from the invoking environment.
//!
//! The set of signals is closed: each [`Signal`] names one environment
//! variable and how its value turns into a boolean. Anything missing or
//! unrecognized reads as `false`.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{KnownFailError, Result};

/// Source of environment variables.
///
/// Implemented for the real process environment and for an in-memory map so
/// fingerprints for hypothetical environments never touch process state.
pub trait EnvSource {
    /// Value of `key`, or `None` if unset or not valid unicode.
    fn var(&self, key: &str) -> Option<String>;
}

/// The current process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// In-memory environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MapEnv(BTreeMap<String, String>);

impl MapEnv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a variable.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MapEnv {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl EnvSource for MapEnv {
    fn var(&self, key: &str) -> Option<String> {
        self.0.get(key).cloned()
    }
}

/// How a variable's value becomes a boolean.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detection {
    /// Set to any non-empty value.
    NonEmpty,
    /// Set to exactly this value.
    Equals(&'static str),
}

impl Detection {
    fn matches(self, value: Option<&str>) -> bool {
        match (self, value) {
            (_, None) => false,
            (Detection::NonEmpty, Some(v)) => !v.is_empty(),
            (Detection::Equals(expected), Some(v)) => v == expected,
        }
    }
}

/// Named external flag a rule may depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    /// Running on AppVeyor CI.
    Appveyor,
    /// Running on Travis CI (any non-empty `TRAVIS`).
    Travis,
    /// `TRAVIS` is literally `true`.
    TravisExact,
    /// Leak-check test mode.
    LeakCheck,
    /// Coverage collection is enabled.
    Coverage,
    /// The libuv event backend was selected.
    Libuv,
}

impl Signal {
    pub const ALL: [Signal; 6] = [
        Signal::Appveyor,
        Signal::Travis,
        Signal::TravisExact,
        Signal::LeakCheck,
        Signal::Coverage,
        Signal::Libuv,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Signal::Appveyor => "appveyor",
            Signal::Travis => "travis",
            Signal::TravisExact => "travis_exact",
            Signal::LeakCheck => "leak_check",
            Signal::Coverage => "coverage",
            Signal::Libuv => "libuv",
        }
    }

    /// Environment variable this signal is sourced from.
    pub fn env_var(&self) -> &'static str {
        match self {
            Signal::Appveyor => "APPVEYOR",
            Signal::Travis | Signal::TravisExact => "TRAVIS",
            Signal::LeakCheck => "GEVENTTEST_LEAKCHECK",
            Signal::Coverage => "COVERAGE_PROCESS_START",
            Signal::Libuv => "GEVENT_CORE_CFFI_ONLY",
        }
    }

    pub fn detection(&self) -> Detection {
        match self {
            Signal::TravisExact => Detection::Equals("true"),
            Signal::Libuv => Detection::Equals("libuv"),
            _ => Detection::NonEmpty,
        }
    }

    /// Read this signal from `source`.
    pub fn read(&self, source: &dyn EnvSource) -> bool {
        let value = source.var(self.env_var());
        self.detection().matches(value.as_deref())
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Signal {
    type Err = KnownFailError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        Signal::ALL
            .into_iter()
            .find(|signal| signal.name() == wanted)
            .ok_or_else(|| KnownFailError::UnknownSignal(s.to_string()))
    }
}

/// Parse a `NAME=BOOL` override such as `appveyor=true` or `leak-check=0`.
///
/// A bare `NAME` means `true`.
pub fn parse_signal_assignment(s: &str) -> Result<(Signal, bool)> {
    let (name, value) = match s.split_once('=') {
        Some((name, value)) => (name, value.trim()),
        None => (s, "true"),
    };
    let signal: Signal = name.parse()?;
    let enabled = match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" | "" => false,
        _ => {
            return Err(KnownFailError::InvalidSignalValue {
                signal: signal.name().to_string(),
                value: value.to_string(),
            })
        }
    };
    Ok((signal, enabled))
}

/// Boolean value of every signal; absent entries read as `false`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignalSet(BTreeMap<Signal, bool>);

impl SignalSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read every known signal from `source`.
    pub fn detect(source: &dyn EnvSource) -> Self {
        let mut set = Self::new();
        for signal in Signal::ALL {
            let value = signal.read(source);
            debug!(signal = signal.name(), var = signal.env_var(), value, "detected signal");
            set.0.insert(signal, value);
        }
        set
    }

    pub fn with(mut self, signal: Signal, value: bool) -> Self {
        self.0.insert(signal, value);
        self
    }

    pub fn is_set(&self, signal: Signal) -> bool {
        self.0.get(&signal).copied().unwrap_or(false)
    }

    /// Signals that are currently `true`.
    pub fn active(&self) -> impl Iterator<Item = Signal> + '_ {
        self.0
            .iter()
            .filter(|(_, enabled)| **enabled)
            .map(|(signal, _)| *signal)
    }
}

impl FromIterator<(Signal, bool)> for SignalSet {
    fn from_iter<I: IntoIterator<Item = (Signal, bool)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
