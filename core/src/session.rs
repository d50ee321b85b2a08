//! One run of script code against the shared interpreter.
//!
//! The order of the steps is fixed: method scan, module installation,
//! capture, sandbox, evaluation, then a teardown that always runs (sandbox
//! check and restore, classification, capture drain, feedback). Callers are
//! expected to hold the execution lock.
//!
//! The capture and the sandbox window belong to a [`RunScope`]: if the run
//! future is dropped half-way, the scope still closes both before the lock
//! guard further up the stack is released.

use std::sync::Arc;

use runlab_protocol::CodeOrigin;
use runlab_protocol::Feedback;
use runlab_protocol::FeedbackPhase;
use runlab_utils_string::line_count;
use tracing::debug;
use tracing::warn;

use crate::config::Settings;
use crate::error_log;
use crate::error_log::ClassifiedError;
use crate::error_log::ErrorContext;
use crate::error::SandboxError;
use crate::error_log::ErrorKind;
use crate::interpreter::CapabilityTable;
use crate::interpreter::Interpreter;
use crate::interpreter::Runtime;
use crate::interpreter::ScriptError;
use crate::modules;
use crate::run_config::RunConfig;
use crate::run_config::RunVisibility;
use crate::sandbox::CapabilitySandbox;
use crate::sandbox::SandboxWindow;
use crate::sandbox::scan_forbidden_methods;
use crate::truncate::FeedbackFormatter;
use crate::truncate::Profile;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunOutcome {
    /// Captured stdout as shown to the user (empty when hidden).
    pub stdout: String,
    pub error: Option<ClassifiedError>,
    /// Nothing was run: the code was blank.
    pub skipped: bool,
}

impl RunOutcome {
    pub fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }

    fn failed(error: ClassifiedError) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Display text of the error, empty on success.
    pub fn error_text(&self) -> &str {
        self.error
            .as_ref()
            .map(|error| error.text.as_str())
            .unwrap_or_default()
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|error| error.kind)
    }
}

pub struct RunSession {
    runtime: Runtime,
    settings: Arc<Settings>,
    formatter: FeedbackFormatter,
    sandbox: CapabilitySandbox,
}

impl RunSession {
    pub fn new(runtime: Runtime, settings: Arc<Settings>) -> Self {
        Self {
            formatter: FeedbackFormatter::new(&settings.feedback),
            sandbox: CapabilitySandbox::new(settings.exclusion_marker.clone()),
            runtime,
            settings,
        }
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn formatter(&self) -> &FeedbackFormatter {
        &self.formatter
    }

    pub async fn run(&self, code: &str, config: &RunConfig) -> RunOutcome {
        if code.trim().is_empty() {
            return RunOutcome::skipped();
        }

        if let Err(err) = self.preflight(code, config).await {
            let ctx = ErrorContext::for_run(code, config, 0);
            let classified = error_log::classify(&err, &ctx, &self.formatter);
            self.emit_user("", Some(&classified));
            return RunOutcome::failed(classified);
        }

        let (source, prelude_lines) = compose_source(config.prelude(), code);
        let interpreter = self.runtime.interpreter.as_ref();

        let mut scope = RunScope::open(interpreter);
        if config.needs_sandbox() {
            scope.activate(&self.sandbox, config);
        }
        let result = interpreter.run_async(&source, config.origin()).await;

        let integrity = scope.deactivate();
        let error = match (integrity, result) {
            (Err(violation), _) => Some(error_log::classify_integrity(&violation)),
            (Ok(()), Err(err)) => {
                let ctx = ErrorContext::for_run(code, config, prelude_lines);
                Some(error_log::classify(&err, &ctx, &self.formatter))
            }
            (Ok(()), Ok(())) => None,
        };
        let captured = scope.end_capture();
        let stdout = if config.with_stdout() {
            self.formatter.shorten(&captured, Profile::Stdout)
        } else {
            String::new()
        };

        debug!(
            origin = %config.origin(),
            failed = error.is_some(),
            "run finished"
        );
        self.emit_user(&stdout, error.as_ref());
        RunOutcome {
            stdout,
            error,
            skipped: false,
        }
    }

    /// Run an `env` or `post` section: no sandbox, and failures go to the
    /// loudest channel available.
    pub async fn run_environment(
        &self,
        section: &str,
        origin: CodeOrigin,
        config: &RunConfig,
    ) -> RunOutcome {
        let section = section.trim();
        let interpreter = self.runtime.interpreter.as_ref();

        let mut scope = RunScope::open(interpreter);
        let mut error = None;
        if !section.is_empty() {
            let result = match modules::install_missing(
                &self.runtime,
                &self.settings,
                section,
                config,
            )
            .await
            {
                Ok(_) => interpreter.run_async(section, origin).await,
                Err(err) => Err(err),
            };
            if let Err(err) = result {
                let ctx = ErrorContext {
                    code: section,
                    origin,
                    prelude_lines: 0,
                    auto_log_assert: false,
                    visibility: RunVisibility::Public,
                };
                let mut classified = error_log::classify(&err, &ctx, &self.formatter);
                if classified.kind == ErrorKind::Environment {
                    classified.text.push_str(&self.settings.messages.big_fail);
                }
                error = Some(classified);
            }
        }
        let stdout = scope.end_capture();

        let stderr = error
            .as_ref()
            .map(|error| error.text.clone())
            .unwrap_or_default();
        let sink = &self.runtime.sink;
        let feedback = Feedback::environment(stdout.clone(), stderr);
        if sink.is_interactive() {
            if !feedback.is_empty() {
                sink.emit(&feedback);
            }
        } else if !feedback.stderr.is_empty() {
            sink.alert(&feedback.stderr);
        }
        RunOutcome {
            stdout,
            error,
            skipped: section.is_empty(),
        }
    }

    /// Bind the builtin string `name` to `text` until the returned value is
    /// dropped.
    pub fn expose_text(&self, name: &'static str, text: &str) -> ExposedText {
        ExposedText::new(self.runtime.interpreter.capabilities(), name, text)
    }

    /// Emit a plain message to the user surface.
    pub fn notify(&self, message: &str) {
        if !message.is_empty() {
            self.runtime.sink.emit(&Feedback::user(message, ""));
        }
    }

    async fn preflight(&self, code: &str, config: &RunConfig) -> Result<(), ScriptError> {
        scan_forbidden_methods(code, config.forbidden_methods(), self.sandbox.marker())?;
        modules::install_missing(&self.runtime, &self.settings, code, config).await?;
        Ok(())
    }

    fn emit_user(&self, stdout: &str, error: Option<&ClassifiedError>) {
        let stderr = error.map(|error| error.text.as_str()).unwrap_or_default();
        let feedback = Feedback {
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            phase: FeedbackPhase::UserCode,
        };
        if !feedback.is_empty() {
            self.runtime.sink.emit(&feedback);
        }
    }
}

/// Capture and sandbox window of one run. Whatever is still open when the
/// scope is dropped gets closed, output discarded.
struct RunScope<'a> {
    interpreter: &'a dyn Interpreter,
    table: Arc<dyn CapabilityTable>,
    window: Option<SandboxWindow>,
    capturing: bool,
}

impl<'a> RunScope<'a> {
    fn open(interpreter: &'a dyn Interpreter) -> Self {
        interpreter.begin_capture();
        Self {
            interpreter,
            table: interpreter.capabilities(),
            window: None,
            capturing: true,
        }
    }

    fn activate(&mut self, sandbox: &CapabilitySandbox, config: &RunConfig) {
        self.window = Some(sandbox.activate(self.table.as_ref(), config));
    }

    fn deactivate(&mut self) -> Result<(), SandboxError> {
        match self.window.take() {
            Some(window) => window.deactivate(self.table.as_ref()),
            None => Ok(()),
        }
    }

    fn end_capture(&mut self) -> String {
        self.capturing = false;
        self.interpreter.end_capture()
    }
}

impl Drop for RunScope<'_> {
    fn drop(&mut self) {
        if self.window.is_none() && !self.capturing {
            return;
        }
        warn!("run interrupted before its teardown, closing its capture and sandbox");
        if let Err(err) = self.deactivate() {
            warn!("interrupted run left the sandbox tampered: {err}");
        }
        if self.capturing {
            self.end_capture();
        }
    }
}

/// A builtin string bound through [`RunSession::expose_text`]. Emptied on
/// drop.
#[must_use]
pub struct ExposedText {
    table: Arc<dyn CapabilityTable>,
    name: &'static str,
}

impl ExposedText {
    fn new(table: Arc<dyn CapabilityTable>, name: &'static str, text: &str) -> Self {
        table.set_builtin_text(name, text);
        Self { table, name }
    }
}

impl Drop for ExposedText {
    fn drop(&mut self) {
        self.table.set_builtin_text(self.name, "");
    }
}

/// Prepend the hidden prelude, returning the source and how many lines the
/// prelude takes.
fn compose_source(prelude: Option<&str>, code: &str) -> (String, usize) {
    match prelude {
        Some(prelude) if !prelude.is_empty() => {
            let separator = if prelude.ends_with('\n') { "" } else { "\n" };
            (format!("{prelude}{separator}{code}"), line_count(prelude))
        }
        _ => (code.to_string(), 0),
    }
}
