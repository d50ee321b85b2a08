//! Turns script errors into the text shown under the editor.

use runlab_protocol::CodeOrigin;
use serde::Serialize;

use crate::error::SandboxError;
use crate::interpreter::ScriptError;
use crate::interpreter::ScriptErrorKind;
use crate::interpreter::TraceFrame;
use crate::run_config::RunConfig;
use crate::run_config::RunVisibility;
use crate::truncate::FeedbackFormatter;
use crate::truncate::Profile;

const TRACEBACK_HEADER: &str = "Traceback (most recent call last):";

/// Frames of the interpreter's own async plumbing.
const PLUMBING_FUNCTIONS: &[&str] = &["await_fut"];

const VISIBLE_FILES: [CodeOrigin; 4] = [
    CodeOrigin::Env,
    CodeOrigin::Post,
    CodeOrigin::Exec,
    CodeOrigin::Console,
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A sandbox guard or the method scan refused the code.
    Forbidden,
    /// User code tampered with the sandbox.
    Integrity,
    Assertion,
    Runtime,
    /// Setup or teardown code failed: a content or deployment bug.
    Environment,
}

impl ErrorKind {
    /// Failures caused by the user's code, as opposed to the exercise setup.
    pub fn is_user_failure(self) -> bool {
        !matches!(self, ErrorKind::Environment)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassifiedError {
    pub kind: ErrorKind,
    pub text: String,
}

/// What the classifier needs to know about the run that failed.
#[derive(Clone, Copy, Debug)]
pub struct ErrorContext<'a> {
    /// Code as shown to the user, without any prelude.
    pub code: &'a str,
    pub origin: CodeOrigin,
    pub prelude_lines: usize,
    pub auto_log_assert: bool,
    pub visibility: RunVisibility,
}

impl<'a> ErrorContext<'a> {
    pub fn for_run(code: &'a str, config: &RunConfig, prelude_lines: usize) -> Self {
        Self {
            code,
            origin: config.origin(),
            prelude_lines,
            auto_log_assert: config.auto_log_assert(),
            visibility: config.visibility(),
        }
    }
}

pub fn classify(
    error: &ScriptError,
    ctx: &ErrorContext<'_>,
    formatter: &FeedbackFormatter,
) -> ClassifiedError {
    let kind = match error.kind {
        ScriptErrorKind::Exclusion => {
            return ClassifiedError {
                kind: ErrorKind::Forbidden,
                text: error.headline(),
            };
        }
        ScriptErrorKind::Assertion => ErrorKind::Assertion,
        ScriptErrorKind::Other if ctx.origin.is_environment() => ErrorKind::Environment,
        ScriptErrorKind::Other => ErrorKind::Runtime,
    };

    let frames = visible_frames(&error.frames, ctx);
    let mut message = error.message.clone();
    if kind == ErrorKind::Assertion && message.is_empty() && ctx.auto_log_assert {
        message = failing_source_line(&frames, ctx).unwrap_or_default();
    }
    let message = formatter.shorten(&message, Profile::Error);
    let headline = if message.is_empty() {
        error.type_name.clone()
    } else {
        format!("{}: {message}", error.type_name)
    };

    if ctx.visibility == RunVisibility::Secret || frames.is_empty() {
        return ClassifiedError {
            kind,
            text: headline,
        };
    }

    let trace = frames
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n");
    ClassifiedError {
        kind,
        text: format!(
            "{TRACEBACK_HEADER}\n{}\n{headline}",
            formatter.shorten(&trace, Profile::Trace)
        ),
    }
}

pub fn classify_integrity(error: &SandboxError) -> ClassifiedError {
    ClassifiedError {
        kind: ErrorKind::Integrity,
        text: format!("IntegrityError: {error}"),
    }
}

/// Keep frames of user-visible units, drop plumbing and prelude frames, and
/// renumber the rest against the visible code.
fn visible_frames(frames: &[TraceFrame], ctx: &ErrorContext<'_>) -> Vec<TraceFrame> {
    let own_file = ctx.origin.file_name();
    frames
        .iter()
        .filter(|frame| !PLUMBING_FUNCTIONS.contains(&frame.function.as_str()))
        .filter(|frame| {
            VISIBLE_FILES
                .iter()
                .any(|origin| origin.file_name() == frame.file)
        })
        .filter_map(|frame| {
            if frame.file != own_file {
                return Some(frame.clone());
            }
            let line = frame.line.checked_sub(ctx.prelude_lines)?;
            (line > 0).then(|| TraceFrame {
                line,
                ..frame.clone()
            })
        })
        .collect()
}

fn failing_source_line(frames: &[TraceFrame], ctx: &ErrorContext<'_>) -> Option<String> {
    let own_file = ctx.origin.file_name();
    let frame = frames.iter().rev().find(|frame| frame.file == own_file)?;
    ctx.code
        .lines()
        .nth(frame.line - 1)
        .map(|line| line.trim().to_string())
}
