use std::collections::BTreeMap;

use core_test_support::RecordingSink;
use core_test_support::StaticFetcher;
use core_test_support::TestRuntime;
use core_test_support::toy::ToyInterpreter;
use pretty_assertions::assert_eq;
use runlab_core::RunConfig;
use runlab_core::Settings;
use runlab_core::error_log::ErrorKind;
use runlab_core::modules::install_missing;
use tracing_test::traced_test;

fn with_installable(packages: &[&str]) -> TestRuntime {
    TestRuntime::with_parts(
        ToyInterpreter::new().with_installable(packages.iter().copied()),
        RecordingSink::interactive(),
        StaticFetcher::default(),
    )
}

#[tokio::test]
async fn missing_packages_are_installed_before_the_run() {
    let test = with_installable(&["numpy"]);
    let settings = Settings::default();
    let messages = settings.messages.clone();
    let session = test.session(settings);

    let outcome = session
        .run("import numpy\nprint('ok')", &RunConfig::default())
        .await;

    assert!(outcome.is_success());
    assert_eq!(test.interpreter.installed(), vec!["numpy".to_string()]);
    assert_eq!(
        test.sink.user_stdout(),
        vec![messages.install_start, messages.install_done, "ok\n".to_string()]
    );

    test.sink.clear();
    let again = session.run("import numpy", &RunConfig::default()).await;
    assert!(again.is_success());
    assert_eq!(test.interpreter.installed(), vec!["numpy".to_string()]);
    assert_eq!(test.sink.user_stdout(), Vec::<String>::new());
}

#[tokio::test]
async fn aliased_packages_are_installed_under_their_index_name() {
    let test = with_installable(&["scikit-learn"]);
    let session = test.session(Settings::default());
    let config = RunConfig::builder()
        .package_aliases(BTreeMap::from([(
            "sklearn".to_string(),
            "scikit-learn".to_string(),
        )]))
        .build();

    let outcome = session.run("import sklearn", &config).await;

    assert!(outcome.is_success(), "{}", outcome.error_text());
    assert_eq!(test.interpreter.installed(), vec!["scikit-learn".to_string()]);
    assert_eq!(
        test.interpreter.sync_sources(),
        vec!["import scikit-learn as sklearn".to_string()]
    );
}

#[tokio::test]
async fn site_libraries_come_from_archives() {
    let test = TestRuntime::with_parts(
        ToyInterpreter::new(),
        RecordingSink::interactive(),
        StaticFetcher::default()
            .with_archive("https://example.test/libs/turtle_lib.zip", b"PK".to_vec()),
    );
    let settings = Settings {
        site_libs: vec!["turtle_lib".to_string()],
        archive_base_url: "https://example.test/libs/".to_string(),
        ..Settings::default()
    };
    let session = test.session(settings);

    let outcome = session
        .run("from turtle_lib import forward", &RunConfig::default())
        .await;

    assert!(outcome.is_success(), "{}", outcome.error_text());
    assert_eq!(test.interpreter.archives(), vec!["turtle_lib".to_string()]);
    assert_eq!(test.interpreter.installed(), Vec::<String>::new());
    assert_eq!(
        test.fetcher.requests(),
        vec!["https://example.test/libs/turtle_lib.zip".to_string()]
    );
}

#[tokio::test]
#[traced_test]
async fn unavailable_archives_are_logged_and_skipped() {
    let test = TestRuntime::new();
    let settings = Settings {
        site_libs: vec!["turtle_lib".to_string()],
        archive_base_url: "https://example.test/libs".to_string(),
        ..Settings::default()
    };
    let session = test.session(settings);

    let outcome = session.run("import turtle_lib", &RunConfig::default()).await;

    assert!(logs_contain("site library unavailable"));
    assert_eq!(outcome.error_kind(), Some(ErrorKind::Runtime));
    assert!(
        outcome
            .error_text()
            .ends_with("ModuleNotFoundError: No module named 'turtle_lib'"),
        "{}",
        outcome.error_text()
    );
}

#[tokio::test]
async fn unknown_packages_fail_before_the_run() {
    let test = TestRuntime::new();
    let session = test.session(Settings::default());

    let outcome = session.run("import nothere", &RunConfig::default()).await;

    assert_eq!(outcome.error_kind(), Some(ErrorKind::Runtime));
    assert_eq!(
        outcome.error_text(),
        "ModuleNotFoundError: No module named 'nothere' (package `nothere` not found in the index)"
    );
    assert_eq!(test.interpreter.async_sources(), Vec::new());
}

#[tokio::test]
async fn forbidden_packages_are_not_installed() {
    let test = with_installable(&["requests"]);
    let session = test.session(Settings::default());
    let config = RunConfig::builder().forbidden(["requests"]).build();

    let outcome = session.run("import requests", &config).await;

    assert_eq!(outcome.error_kind(), Some(ErrorKind::Forbidden));
    assert_eq!(test.interpreter.installed(), Vec::<String>::new());
}

#[tokio::test]
async fn white_listed_modules_are_imported_up_front() {
    let test = with_installable(&["numpy"]);
    let settings = Settings::default();
    let config = RunConfig::builder().preload(["numpy"]).build();

    let report = install_missing(&test.runtime(), &settings, "print(1)", &config)
        .await
        .expect("preload succeeds");

    assert_eq!(report.installed, vec!["numpy".to_string()]);
    assert_eq!(report.pre_imports, vec!["import numpy".to_string()]);
    assert_eq!(
        test.interpreter.sync_sources(),
        vec!["import numpy".to_string()]
    );

    let second = install_missing(&test.runtime(), &settings, "print(1)", &config)
        .await
        .expect("nothing left to install");
    assert!(second.is_empty());
}
