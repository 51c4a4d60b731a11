//! The curated known-failure table.
//!
//! Tests listed here must fail on a matching environment, unless tagged
//! `FLAKY `, in which case their result is ignored.

use crate::fingerprint::{InterpreterFamily, PointerWidth};
use crate::predicate::Predicate;
use crate::rules::{Rule, RuleSet};
use crate::signal::Signal;

fn py3() -> Predicate {
    Predicate::MajorAtLeast(3)
}

/// `major >= 3 and minor >= 5`, component-wise like the harness always did.
fn py35() -> Predicate {
    Predicate::MajorAtLeast(3).and(Predicate::MinorAtLeast(5))
}

pub(crate) fn builtin() -> RuleSet {
    RuleSet::new(vec![
        // Interrupted subprocesses sometimes lose stderr or hit concurrent
        // close(); test__issue6 is timing dependent on every CI provider.
        Rule::new("base", Predicate::Always).with_entries([
            "FLAKY test__subprocess_interrupted.py",
            "FLAKY test__issue6.py",
        ]),
        windows(),
        leak_check(),
        pypy(),
        Rule::new("libuv on darwin", Predicate::Signal(Signal::Libuv))
            .with_child(Rule::new("darwin", Predicate::platform_prefix("darwin"))),
        py3_rules(),
        Rule::new(
            "appveyor on 3.4+",
            Predicate::version_at_least(3, 4).and(Predicate::Signal(Signal::Appveyor)),
        )
        .with_entries(["FLAKY test_selectors.py"]),
        // The concurrency plugin slows these past the default timeout.
        Rule::new("coverage", Predicate::Signal(Signal::Coverage)).with_entries([
            "FLAKY test__issue302monkey.py",
            "FLAKY test__example_portforwarder.py",
            "FLAKY test__threading_vs_settrace.py",
        ]),
    ])
}

fn windows() -> Rule {
    Rule::new("win32", Predicate::platform("win32"))
        // fork watchers are not called in multithreaded programs on windows
        .with_entries([
            "test__core_fork.py",
            "FLAKY test__greenletset.py",
            "FLAKY test___example_servers.py",
        ])
        .with_child(
            // Port reuse and slow process shutdown on the CI containers.
            Rule::new("appveyor", Predicate::Signal(Signal::Appveyor))
                .with_entries([
                    "FLAKY test__example_udp_client.py",
                    "FLAKY test__example_udp_server.py",
                    "FLAKY test__example_portforwarder.py",
                    "FLAKY test__server_pywsgi.py",
                    "FLAKY test__fileobject.py",
                ])
                .with_child(
                    Rule::new("py3", py3()).with_entries(["FLAKY test_threading.py"]),
                ),
        )
        .with_child(
            // socket.socketpair only exists from 3.5
            Rule::new("no socketpair", py35().negate()).with_entries(["test__socketpair.py"]),
        )
        .with_child(
            Rule::new("64-bit", Predicate::PointerBits(PointerWidth::Bits64))
                .with_entries(["FLAKY test_ftplib.py"]),
        )
}

fn leak_check() -> Rule {
    Rule::new("leak check", Predicate::Signal(Signal::LeakCheck))
        .with_entries(["FLAKY test__backdoor.py", "FLAKY test__socket_errors.py"])
        .with_child(
            Rule::new("travis", Predicate::Signal(Signal::TravisExact))
                .with_entries(["FLAKY test_signal.py"]),
        )
}

fn pypy() -> Rule {
    Rule::new("pypy", Predicate::Family(InterpreterFamily::PyPy))
        .with_entries(["FLAKY test__backdoor.py"])
        .with_child(
            Rule::new("py3 on travis", py3().and(Predicate::Signal(Signal::Travis))).with_entries([
                "FLAKY test_subprocess.py",
                "test_socket.py",
                "FLAKY test_ssl.py",
            ]),
        )
}

fn py3_rules() -> Rule {
    Rule::new("py3", py3())
        .with_entries(["FLAKY test__socket_dns.py"])
        .with_child(
            // refcount problems under the leak checker
            Rule::new("leak check", Predicate::Signal(Signal::LeakCheck)).with_entries([
                "FLAKY test__threadpool.py",
                "test__timeout.py",
                "FLAKY test__greenletset.py",
                "test__core.py",
                "test__systemerror.py",
                "test__exc_info.py",
                "test__api_timeout.py",
                "test__event.py",
                "test__api.py",
                "test__hub.py",
                "test__queue.py",
                "test__socket_close.py",
                "test__select.py",
                "test__greenlet.py",
                "FLAKY test__socket.py",
            ]),
        )
}
