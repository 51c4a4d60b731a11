//! knownfail - inspect the known-failure registry for this environment
//!
//! ## Commands
//!
//! - `list` (default): print every known failure for the current environment
//! - `classify`: classify one or more test identifiers
//! - `fingerprint`: show the captured environment fingerprint and its digest

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use knownfail_core::{
    init_tracing, parse_signal_assignment, EnvironmentFingerprint, FailureRegistry, Interpreter,
    InterpreterFamily, LanguageVersion, PointerWidth, RuleSet, Signal,
};
use serde::Serialize;
use tracing::{debug, Level};

#[derive(Parser)]
#[command(name = "knownfail")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Known test failures for the current environment", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(flatten)]
    env: EnvArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Overrides for the detected environment.
#[derive(Args, Debug, Clone)]
struct EnvArgs {
    /// Platform identifier (win32, darwin, linux, ...); defaults to the host
    #[arg(long, global = true, env = "KNOWNFAIL_PLATFORM")]
    platform: Option<String>,

    /// Interpreter family (cpython or pypy)
    #[arg(long, global = true, env = "KNOWNFAIL_PYTHON_FAMILY")]
    family: Option<InterpreterFamily>,

    /// Interpreter version, e.g. 3.6.4; skips probing when given with --family
    #[arg(long, global = true, env = "KNOWNFAIL_PYTHON_VERSION")]
    python_version: Option<LanguageVersion>,

    /// Interpreter pointer width (32 or 64)
    #[arg(long, global = true, env = "KNOWNFAIL_POINTER_BITS")]
    pointer_bits: Option<PointerWidth>,

    /// Interpreter to probe when version facts are not given
    #[arg(long, global = true, env = "KNOWNFAIL_PYTHON", default_value = "python3")]
    python: String,

    /// Force a signal, e.g. `appveyor=true` or `leak_check=0` (repeatable)
    #[arg(long = "signal", global = true, value_parser = parse_signal_override)]
    signals: Vec<(Signal, bool)>,

    /// JSON rule table to use instead of the builtin one
    #[arg(long, global = true, env = "KNOWNFAIL_RULES")]
    rules: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print every known failure for the current environment
    List {
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Classify test identifiers
    Classify {
        /// Test identifiers, e.g. test__core_fork.py
        #[arg(required = true)]
        tests: Vec<String>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Show the captured environment fingerprint
    Fingerprint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn parse_signal_override(s: &str) -> std::result::Result<(Signal, bool), String> {
    parse_signal_assignment(s).map_err(|e| e.to_string())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };
    init_tracing(cli.json, level);

    let fingerprint = resolve_fingerprint(&cli.env)?;
    let rules = load_rules(cli.env.rules.as_deref())?;

    match cli.command.unwrap_or(Commands::List {
        format: OutputFormat::Text,
    }) {
        Commands::List { format } => cmd_list(&rules, &fingerprint, format),
        Commands::Classify { tests, format } => cmd_classify(&rules, &fingerprint, &tests, format),
        Commands::Fingerprint => cmd_fingerprint(&fingerprint),
    }
}

/// Interpreter facts from flags, probing only when the version is missing.
fn resolve_interpreter(args: &EnvArgs) -> Result<Interpreter> {
    let mut interpreter = match args.python_version {
        Some(version) => Interpreter::new(
            args.family.unwrap_or(InterpreterFamily::CPython),
            version,
        ),
        None => Interpreter::probe(&args.python).with_context(|| {
            format!(
                "Failed to probe interpreter {:?}; pass --python-version",
                args.python
            )
        })?,
    };
    if let Some(family) = args.family {
        interpreter.family = family;
    }
    if let Some(width) = args.pointer_bits {
        interpreter.pointer_bits = width;
    }
    Ok(interpreter)
}

fn resolve_fingerprint(args: &EnvArgs) -> Result<EnvironmentFingerprint> {
    let interpreter = resolve_interpreter(args)?;
    let detected = EnvironmentFingerprint::detect(interpreter);

    let mut builder = detected.to_builder();
    if let Some(platform) = &args.platform {
        builder = builder.platform(platform.clone());
    }
    for (signal, value) in &args.signals {
        debug!(signal = signal.name(), value, "signal override");
        builder = builder.signal(*signal, *value);
    }
    Ok(builder.build())
}

fn load_rules(path: Option<&Path>) -> Result<RuleSet> {
    match path {
        Some(path) => RuleSet::load(path)
            .with_context(|| format!("Failed to load rule table {:?}", path)),
        None => Ok(RuleSet::builtin()),
    }
}

fn cmd_list(rules: &RuleSet, fingerprint: &EnvironmentFingerprint, format: OutputFormat) -> Result<()> {
    let registry = FailureRegistry::build(rules, fingerprint);
    match format {
        OutputFormat::Text => print!("{}", render_list(&registry)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&registry)?),
    }
    Ok(())
}

fn render_list(registry: &FailureRegistry) -> String {
    let mut out = String::from("known_failures:\n");
    for entry in registry.list_all() {
        out.push_str("  ");
        out.push_str(&entry.to_string());
        out.push('\n');
    }
    out
}

#[derive(Serialize)]
struct ClassifyRow<'a> {
    test: &'a str,
    classification: knownfail_core::Classification,
}

fn cmd_classify(
    rules: &RuleSet,
    fingerprint: &EnvironmentFingerprint,
    tests: &[String],
    format: OutputFormat,
) -> Result<()> {
    let registry = FailureRegistry::build(rules, fingerprint);
    let rows: Vec<ClassifyRow> = tests
        .iter()
        .map(|test| ClassifyRow {
            test,
            classification: registry.classify(test),
        })
        .collect();

    match format {
        OutputFormat::Text => {
            for row in &rows {
                println!("{}\t{}", row.test, row.classification);
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
    }
    Ok(())
}

fn cmd_fingerprint(fingerprint: &EnvironmentFingerprint) -> Result<()> {
    let digest = fingerprint
        .digest()
        .context("Failed to compute fingerprint digest")?;
    println!("{}", serde_json::to_string_pretty(fingerprint)?);
    println!("digest: {}", digest);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use knownfail_core::Classification;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("knownfail").chain(args.iter().copied()))
            .expect("arguments should parse")
    }

    #[test]
    fn test_default_command_is_list() {
        let cli = parse(&["--python-version", "3.6.4"]);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_explicit_facts_skip_probe() {
        let cli = parse(&[
            "--python",
            "/nonexistent/python",
            "--python-version",
            "2.7.14",
            "--family",
            "pypy",
            "--pointer-bits",
            "32",
            "--platform",
            "win32",
        ]);
        let fp = resolve_fingerprint(&cli.env).expect("no probe needed");
        assert_eq!(fp.platform(), "win32");
        assert_eq!(fp.family(), InterpreterFamily::PyPy);
        assert_eq!(fp.version(), LanguageVersion::new(2, 7, 14));
        assert_eq!(fp.pointer_bits(), PointerWidth::Bits32);
    }

    #[test]
    fn test_missing_interpreter_is_reported() {
        let args = EnvArgs {
            platform: None,
            family: None,
            python_version: None,
            pointer_bits: None,
            python: "/nonexistent/python".to_string(),
            signals: Vec::new(),
            rules: None,
        };
        let err = resolve_fingerprint(&args).unwrap_err();
        assert!(err.to_string().contains("--python-version"));
        assert!(err.to_string().contains("/nonexistent/python"));
    }

    #[test]
    fn test_signal_overrides_apply() {
        let cli = parse(&[
            "list",
            "--python-version",
            "3.6.0",
            "--platform",
            "win32",
            "--signal",
            "appveyor=true",
            "--signal",
            "coverage",
        ]);
        let fp = resolve_fingerprint(&cli.env).unwrap();
        assert!(fp.signal(Signal::Appveyor));
        assert!(fp.signal(Signal::Coverage));

        let registry = FailureRegistry::build(&RuleSet::builtin(), &fp);
        assert_eq!(
            registry.classify("test__server_pywsgi.py"),
            Classification::KnownFlaky
        );
    }

    #[test]
    fn test_bad_signal_rejected() {
        let result = Cli::try_parse_from(["knownfail", "--signal", "jenkins=true"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_classify_requires_ids() {
        let result = Cli::try_parse_from(["knownfail", "--python-version", "3.6", "classify"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_render_list() {
        let registry = FailureRegistry::from_entries(["FLAKY test__issue6.py", "test__core_fork.py"]);
        assert_eq!(
            render_list(&registry),
            "known_failures:\n  test__core_fork.py\n  FLAKY test__issue6.py\n"
        );
    }

    #[test]
    fn test_load_rules_default_is_builtin() {
        assert_eq!(load_rules(None).unwrap(), RuleSet::builtin());
        assert!(load_rules(Some(Path::new("/nonexistent/rules.json"))).is_err());
    }
}
