//! Environment fingerprint: the immutable facts rules are evaluated against.
//!
//! A fingerprint is captured once, before any rule runs. Host facts (platform)
//! and signals come from the process; interpreter facts come from the caller
//! because the interpreter under test is not this process.

use std::fmt;
use std::process::Command;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::digest::sha256_hex;
use crate::error::{KnownFailError, Result};
use crate::signal::{EnvSource, ProcessEnv, Signal, SignalSet};

/// Interpreter implementation under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterpreterFamily {
    /// Reference implementation.
    CPython,
    /// Alternate implementation.
    PyPy,
}

impl InterpreterFamily {
    pub fn name(&self) -> &'static str {
        match self {
            InterpreterFamily::CPython => "cpython",
            InterpreterFamily::PyPy => "pypy",
        }
    }
}

impl fmt::Display for InterpreterFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for InterpreterFamily {
    type Err = KnownFailError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cpython" | "python" | "reference" => Ok(InterpreterFamily::CPython),
            "pypy" | "alternate" => Ok(InterpreterFamily::PyPy),
            _ => Err(KnownFailError::UnknownFamily(s.to_string())),
        }
    }
}

/// Language version as `major.minor.patch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LanguageVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl LanguageVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl fmt::Display for LanguageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for LanguageVersion {
    type Err = KnownFailError;

    /// Accepts `3`, `3.6` or `3.6.4`; missing components are zero.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || KnownFailError::InvalidVersion(s.to_string());
        let parts: Vec<&str> = s.trim().split('.').collect();
        if parts.is_empty() || parts.len() > 3 {
            return Err(invalid());
        }
        let mut numbers = [0u32; 3];
        for (slot, part) in numbers.iter_mut().zip(&parts) {
            *slot = part.parse().map_err(|_| invalid())?;
        }
        Ok(Self::new(numbers[0], numbers[1], numbers[2]))
    }
}

/// Native pointer width of the interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum PointerWidth {
    Bits32,
    Bits64,
}

impl PointerWidth {
    /// Width of the current process.
    pub fn host() -> Self {
        if cfg!(target_pointer_width = "64") {
            PointerWidth::Bits64
        } else {
            PointerWidth::Bits32
        }
    }

    pub fn bits(&self) -> u32 {
        match self {
            PointerWidth::Bits32 => 32,
            PointerWidth::Bits64 => 64,
        }
    }
}

impl TryFrom<u32> for PointerWidth {
    type Error = KnownFailError;

    fn try_from(bits: u32) -> Result<Self> {
        match bits {
            32 => Ok(PointerWidth::Bits32),
            64 => Ok(PointerWidth::Bits64),
            other => Err(KnownFailError::InvalidPointerWidth(other.to_string())),
        }
    }
}

impl From<PointerWidth> for u32 {
    fn from(width: PointerWidth) -> Self {
        width.bits()
    }
}

impl FromStr for PointerWidth {
    type Err = KnownFailError;

    fn from_str(s: &str) -> Result<Self> {
        let bits: u32 = s
            .trim()
            .parse()
            .map_err(|_| KnownFailError::InvalidPointerWidth(s.to_string()))?;
        PointerWidth::try_from(bits)
    }
}

/// Snippet run by [`Interpreter::probe`]; valid on every interpreter version.
const PROBE_SCRIPT: &str = "import sys, struct; \
sys.stdout.write('%s %d %d %d %d\\n' % (\
('pypy' if hasattr(sys, 'pypy_version_info') else 'cpython',) \
+ tuple(sys.version_info[:3]) + (struct.calcsize('P') * 8,)))";

/// Facts about the interpreter under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interpreter {
    pub family: InterpreterFamily,
    pub version: LanguageVersion,
    pub pointer_bits: PointerWidth,
}

impl Interpreter {
    /// Interpreter with the host's pointer width.
    pub fn new(family: InterpreterFamily, version: LanguageVersion) -> Self {
        Self {
            family,
            version,
            pointer_bits: PointerWidth::host(),
        }
    }

    /// Ask `executable` for its family, version and pointer width.
    pub fn probe(executable: &str) -> Result<Self> {
        let output = Command::new(executable)
            .args(["-c", PROBE_SCRIPT])
            .output()
            .map_err(|e| KnownFailError::Probe(format!("failed to run {}: {}", executable, e)))?;

        if !output.status.success() {
            return Err(KnownFailError::Probe(format!(
                "{} exited with {}: {}",
                executable,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let interpreter = Self::parse_probe_output(&stdout)?;
        debug!(
            executable,
            family = %interpreter.family,
            version = %interpreter.version,
            "probed interpreter"
        );
        Ok(interpreter)
    }

    /// Parse `"<family> <major> <minor> <patch> <bits>"`.
    pub fn parse_probe_output(output: &str) -> Result<Self> {
        let fields: Vec<&str> = output.split_whitespace().collect();
        let [family, major, minor, patch, bits] = fields.as_slice() else {
            return Err(KnownFailError::Probe(format!(
                "unexpected probe output: {:?}",
                output.trim()
            )));
        };
        let family: InterpreterFamily = family.parse()?;
        let version: LanguageVersion = format!("{}.{}.{}", major, minor, patch).parse()?;
        let pointer_bits: PointerWidth = bits.parse()?;
        Ok(Self {
            family,
            version,
            pointer_bits,
        })
    }
}

/// Interpreter-style platform identifier for the host OS.
pub fn host_platform() -> String {
    match std::env::consts::OS {
        "windows" => "win32".to_string(),
        "macos" => "darwin".to_string(),
        other => other.to_string(),
    }
}

/// Immutable snapshot of the environment facts rules may depend on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentFingerprint {
    platform: String,
    family: InterpreterFamily,
    version: LanguageVersion,
    pointer_bits: PointerWidth,
    signals: SignalSet,
}

impl EnvironmentFingerprint {
    /// Capture the fingerprint from the running process.
    pub fn detect(interpreter: Interpreter) -> Self {
        Self::from_source(&ProcessEnv, interpreter)
    }

    /// Capture the fingerprint reading signals from `source`.
    pub fn from_source(source: &dyn EnvSource, interpreter: Interpreter) -> Self {
        let fingerprint = Self {
            platform: host_platform(),
            family: interpreter.family,
            version: interpreter.version,
            pointer_bits: interpreter.pointer_bits,
            signals: SignalSet::detect(source),
        };
        info!(
            platform = %fingerprint.platform,
            family = %fingerprint.family,
            version = %fingerprint.version,
            bits = fingerprint.pointer_bits.bits(),
            "captured environment fingerprint"
        );
        fingerprint
    }

    /// Start a fingerprint for a hypothetical environment.
    pub fn builder() -> FingerprintBuilder {
        FingerprintBuilder::default()
    }

    /// Copy of this fingerprint with some facts replaced.
    pub fn to_builder(&self) -> FingerprintBuilder {
        FingerprintBuilder {
            platform: self.platform.clone(),
            family: self.family,
            version: self.version,
            pointer_bits: self.pointer_bits,
            signals: self.signals.clone(),
        }
    }

    pub fn platform(&self) -> &str {
        &self.platform
    }

    pub fn family(&self) -> InterpreterFamily {
        self.family
    }

    pub fn version(&self) -> LanguageVersion {
        self.version
    }

    pub fn pointer_bits(&self) -> PointerWidth {
        self.pointer_bits
    }

    pub fn signals(&self) -> &SignalSet {
        &self.signals
    }

    pub fn signal(&self, signal: Signal) -> bool {
        self.signals.is_set(signal)
    }

    /// SHA-256 of the canonical JSON encoding; stable across processes.
    pub fn digest(&self) -> Result<String> {
        let bytes = serde_json::to_vec(self)?;
        Ok(sha256_hex(&bytes))
    }
}

/// Builder for [`EnvironmentFingerprint`].
///
/// Defaults: host platform, CPython 3.0.0, host pointer width, no signals.
#[derive(Debug, Clone)]
pub struct FingerprintBuilder {
    platform: String,
    family: InterpreterFamily,
    version: LanguageVersion,
    pointer_bits: PointerWidth,
    signals: SignalSet,
}

impl Default for FingerprintBuilder {
    fn default() -> Self {
        Self {
            platform: host_platform(),
            family: InterpreterFamily::CPython,
            version: LanguageVersion::new(3, 0, 0),
            pointer_bits: PointerWidth::host(),
            signals: SignalSet::new(),
        }
    }
}

impl FingerprintBuilder {
    pub fn platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = platform.into();
        self
    }

    pub fn family(mut self, family: InterpreterFamily) -> Self {
        self.family = family;
        self
    }

    pub fn version(mut self, major: u32, minor: u32, patch: u32) -> Self {
        self.version = LanguageVersion::new(major, minor, patch);
        self
    }

    pub fn language_version(mut self, version: LanguageVersion) -> Self {
        self.version = version;
        self
    }

    pub fn pointer_bits(mut self, width: PointerWidth) -> Self {
        self.pointer_bits = width;
        self
    }

    pub fn interpreter(self, interpreter: Interpreter) -> Self {
        self.family(interpreter.family)
            .language_version(interpreter.version)
            .pointer_bits(interpreter.pointer_bits)
    }

    pub fn signal(mut self, signal: Signal, value: bool) -> Self {
        self.signals = self.signals.with(signal, value);
        self
    }

    pub fn signals(mut self, signals: SignalSet) -> Self {
        self.signals = signals;
        self
    }

    pub fn build(self) -> EnvironmentFingerprint {
        EnvironmentFingerprint {
            platform: self.platform,
            family: self.family,
            version: self.version,
            pointer_bits: self.pointer_bits,
            signals: self.signals,
        }
    }
}
