//! knownfail - known test failures for the current environment
//!
//! Computes, once per test run, which tests are expected to fail or are
//! known flaky on this environment:
//! - [`EnvironmentFingerprint`]: platform, interpreter, word size and CI signals
//! - [`RuleSet`]: a tree of predicates gating raw entries, folded by union
//! - [`FailureRegistry`]: the normalized set, queried with `classify`
//!
//! ```
//! use knownfail_core::{Classification, EnvironmentFingerprint, FailureRegistry, RuleSet};
//!
//! let fp = EnvironmentFingerprint::builder().platform("win32").version(3, 6, 0).build();
//! let registry = FailureRegistry::build(&RuleSet::builtin(), &fp);
//! assert_eq!(registry.classify("test__core_fork.py"), Classification::KnownFailing);
//! ```

pub mod digest;
pub mod error;
pub mod expectation;
pub mod fingerprint;
pub mod predicate;
pub mod registry;
pub mod rules;
pub mod signal;
mod table;
pub mod telemetry;

pub use error::{KnownFailError, Result};
pub use expectation::Verdict;
pub use fingerprint::{
    host_platform, EnvironmentFingerprint, FingerprintBuilder, Interpreter, InterpreterFamily,
    LanguageVersion, PointerWidth,
};
pub use predicate::Predicate;
pub use registry::{Classification, FailureRegistry, RegistryEntry, FLAKY_PREFIX};
pub use rules::{FlatRule, Rule, RuleSet};
pub use signal::{parse_signal_assignment, EnvSource, MapEnv, ProcessEnv, Signal, SignalSet};
pub use telemetry::init_tracing;

/// knownfail version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
