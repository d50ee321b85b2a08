use std::sync::Arc;

use core_test_support::RecordingSink;
use core_test_support::StaticFetcher;
use core_test_support::TestRuntime;
use core_test_support::toy::ToyInterpreter;
use pretty_assertions::assert_eq;
use runlab_core::RunConfig;
use runlab_core::Settings;
use runlab_core::error_log::ErrorKind;
use runlab_core::interpreter::CapabilityTable;
use runlab_core::interpreter::same_capability;
use runlab_core::run_config::RunVisibility;
use runlab_core::sandbox::DEFAULT_RECURSION_LIMIT;
use runlab_protocol::CodeOrigin;
use runlab_protocol::RecursionLimit;

const ZERO_DIVISION_TRACE: &str = "Traceback (most recent call last):\n  File \"<exec>\", line 1, in <module>\nZeroDivisionError: division by zero";

#[tokio::test]
async fn division_by_zero_reports_only_the_user_frame() {
    let test = TestRuntime::new();
    let session = test.session(Settings::default());

    let outcome = session.run("1/0", &RunConfig::default()).await;

    assert_eq!(outcome.error_kind(), Some(ErrorKind::Runtime));
    assert_eq!(outcome.error_text(), ZERO_DIVISION_TRACE);
    assert_eq!(outcome.stdout, "");
    assert_eq!(test.sink.user_stderr(), vec![ZERO_DIVISION_TRACE.to_string()]);
    assert!(!test.interpreter.is_capturing());
}

#[tokio::test]
async fn prelude_lines_are_hidden_from_tracebacks() {
    let test = TestRuntime::new();
    let session = test.session(Settings::default());
    let config = RunConfig::builder().prelude("x = 1\ny = 2").build();

    let outcome = session.run("1/0", &config).await;

    assert_eq!(outcome.error_text(), ZERO_DIVISION_TRACE);
    assert_eq!(
        test.interpreter.async_sources(),
        vec![(CodeOrigin::Exec, "x = 1\ny = 2\n1/0".to_string())]
    );
}

#[tokio::test]
async fn secret_runs_show_only_the_headline() {
    let test = TestRuntime::new();
    let session = test.session(Settings::default());
    let config = RunConfig::builder()
        .visibility(RunVisibility::Secret)
        .build();

    let outcome = session.run("1/0", &config).await;

    assert_eq!(outcome.error_text(), "ZeroDivisionError: division by zero");
}

#[tokio::test]
async fn bare_assertions_quote_the_failing_line() {
    let test = TestRuntime::new();
    let session = test.session(Settings::default());

    let outcome = session
        .run("x = 1\nassert x == 2", &RunConfig::default())
        .await;

    assert_eq!(outcome.error_kind(), Some(ErrorKind::Assertion));
    assert_eq!(
        outcome.error_text(),
        "Traceback (most recent call last):\n  File \"<exec>\", line 2, in <module>\nAssertionError: assert x == 2"
    );
}

#[tokio::test]
async fn blank_code_is_skipped() {
    let test = TestRuntime::new();
    let session = test.session(Settings::default());

    let outcome = session.run("  \n ", &RunConfig::default()).await;

    assert!(outcome.skipped);
    assert!(outcome.is_success());
    assert_eq!(test.interpreter.async_sources(), Vec::new());
    assert_eq!(test.sink.feedback(), Vec::new());
}

#[tokio::test]
async fn long_stdout_keeps_its_head_and_tail() {
    let test = TestRuntime::new();
    let session = test.session(Settings::default());

    let outcome = session
        .run("print(\"x\" * 5000)", &RunConfig::default())
        .await;

    let expected = format!(
        "{}\n...\n[Message truncated]\n...\n{}\n",
        "x".repeat(400),
        "x".repeat(199)
    );
    assert!(outcome.is_success());
    assert_eq!(outcome.stdout, expected);
    assert_eq!(test.sink.user_stdout(), vec![expected]);
}

#[tokio::test]
async fn forbidden_methods_never_reach_the_interpreter() {
    let test = TestRuntime::new();
    let session = test.session(Settings::default());
    let config = RunConfig::builder().forbidden_methods([".sort"]).build();

    let outcome = session.run("xs = [3, 1]\nxs.sort()", &config).await;

    assert_eq!(outcome.error_kind(), Some(ErrorKind::Forbidden));
    assert_eq!(
        outcome.error_text(),
        "ExclusionError: FORBIDDEN method: sort"
    );
    assert_eq!(test.interpreter.async_sources(), Vec::new());
}

#[tokio::test]
async fn forbidden_methods_are_rejected_before_imports_are_resolved() {
    let test = TestRuntime::new();
    let session = test.session(Settings::default());
    let config = RunConfig::builder()
        .forbidden_methods(["os.system"])
        .build();

    let outcome = session.run("import numpy\nos.system('ls')", &config).await;

    assert_eq!(outcome.error_kind(), Some(ErrorKind::Forbidden));
    assert_eq!(
        outcome.error_text(),
        "ExclusionError: FORBIDDEN method: os.system"
    );
    assert_eq!(test.resolver.calls(), 0);
    assert_eq!(test.interpreter.installed(), Vec::<String>::new());
    assert_eq!(test.interpreter.async_sources(), Vec::new());

    let _unrestricted = session
        .run("import numpy\nos.getcwd()", &RunConfig::default())
        .await;
    assert!(test.resolver.calls() > 0);
}

#[tokio::test]
async fn forbidden_builtins_fail_when_called_and_come_back_afterwards() {
    let test = TestRuntime::new();
    let session = test.session(Settings::default());
    let config = RunConfig::builder().forbidden(["sorted"]).build();

    let outcome = session.run("print(1)\nsorted(xs)", &config).await;

    assert_eq!(outcome.error_kind(), Some(ErrorKind::Forbidden));
    assert_eq!(
        outcome.error_text(),
        "ExclusionError: FORBIDDEN: don't use sorted"
    );
    assert_eq!(outcome.stdout, "1\n");
    assert!(test.interpreter.table().global("sorted").is_none());

    let unrestricted = session.run("sorted(xs)", &RunConfig::default()).await;
    assert!(unrestricted.is_success());
}

#[tokio::test]
async fn forbidden_packages_cannot_be_imported() {
    let test = TestRuntime::new();
    let session = test.session(Settings::default());
    let config = RunConfig::builder().forbidden(["os"]).build();

    let outcome = session.run("import os.path", &config).await;

    assert_eq!(outcome.error_kind(), Some(ErrorKind::Forbidden));
    assert_eq!(outcome.error_text(), "ExclusionError: FORBIDDEN: don't use os");

    let unrestricted = session.run("import os", &RunConfig::default()).await;
    assert!(unrestricted.is_success());
}

#[tokio::test]
async fn rebinding_a_guard_is_an_integrity_failure() {
    let test = TestRuntime::new();
    let session = test.session(Settings::default());
    let config = RunConfig::builder().forbidden(["sorted"]).build();

    let outcome = session.run("sorted = print", &config).await;

    assert_eq!(outcome.error_kind(), Some(ErrorKind::Integrity));
    assert_eq!(
        outcome.error_text(),
        "IntegrityError: sandbox integrity violated: `sorted` was rebound during the run"
    );
    let table = test.interpreter.table();
    let bound = table.global("sorted").expect("user binding kept");
    let print = table.builtin("print").expect("print builtin");
    assert!(same_capability(&bound, &print));
}

#[tokio::test]
async fn deleting_a_guard_is_an_integrity_failure() {
    let test = TestRuntime::new();
    let session = test.session(Settings::default());
    let config = RunConfig::builder().forbidden(["eval", "exec"]).build();

    let outcome = session.run("del exec", &config).await;

    assert_eq!(outcome.error_kind(), Some(ErrorKind::Integrity));
    assert_eq!(
        outcome.error_text(),
        "IntegrityError: sandbox integrity violated: `exec` was rebound during the run"
    );
}

#[tokio::test]
async fn recursion_limit_is_pinned_for_the_run_only() {
    let test = TestRuntime::new();
    let session = test.session(Settings::default());
    let config = RunConfig::builder()
        .recursion_limit(RecursionLimit::Depth(50))
        .build();

    let outcome = session.run("setrecursionlimit(10000)", &config).await;

    assert_eq!(
        outcome.error_text(),
        "ExclusionError: FORBIDDEN: don't use setrecursionlimit"
    );
    assert_eq!(
        test.interpreter.recursion_limit_history(),
        vec![50, DEFAULT_RECURSION_LIMIT]
    );
    assert_eq!(test.interpreter.recursion_limit(), DEFAULT_RECURSION_LIMIT);
}

#[tokio::test]
async fn environment_failures_alert_on_headless_surfaces() {
    let test = TestRuntime::with_parts(
        ToyInterpreter::new(),
        RecordingSink::headless(),
        StaticFetcher::default(),
    );
    let settings = Settings::default();
    let big_fail = settings.messages.big_fail.clone();
    let session = test.session(settings);

    let outcome = session
        .run_environment(
            "print('setup')\nraise RuntimeError('boom')",
            CodeOrigin::Env,
            &RunConfig::default(),
        )
        .await;

    let expected = format!(
        "Traceback (most recent call last):\n  File \"<env>\", line 2, in <module>\nRuntimeError: boom{big_fail}"
    );
    assert_eq!(outcome.error_kind(), Some(ErrorKind::Environment));
    assert_eq!(outcome.error_text(), expected);
    assert_eq!(outcome.stdout, "setup\n");
    assert_eq!(test.sink.alerts(), vec![expected]);
    assert_eq!(test.sink.feedback(), Vec::new());
}

#[tokio::test]
async fn environment_output_goes_to_interactive_surfaces() {
    let test = TestRuntime::new();
    let session = test.session(Settings::default());

    let outcome = session
        .run_environment("print('ready')", CodeOrigin::Env, &RunConfig::default())
        .await;

    assert!(outcome.is_success());
    let environment = test.sink.environment();
    assert_eq!(environment.len(), 1);
    assert_eq!(environment[0].stdout, "ready\n");
    assert_eq!(test.sink.alerts(), Vec::<String>::new());

    let empty = session
        .run_environment("", CodeOrigin::Post, &RunConfig::default())
        .await;
    assert!(empty.skipped);
    assert_eq!(test.sink.environment().len(), 1);
}

#[tokio::test]
async fn sessions_share_one_interpreter() {
    let test = TestRuntime::new();
    let first = test.session(Settings::default());
    let second = Arc::new(runlab_core::RunSession::new(
        test.runtime(),
        Arc::new(Settings::default()),
    ));

    assert!(first.run("import math", &RunConfig::default()).await.is_success());
    assert!(second.run("print(1)", &RunConfig::default()).await.is_success());
    assert_eq!(test.interpreter.async_sources().len(), 2);
}
