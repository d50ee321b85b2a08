use std::fmt;

use serde::Deserialize;
use serde::Serialize;

/// Which part of a run produced a piece of feedback.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackPhase {
    /// Setup or teardown sections written by the exercise author.
    Environment,
    #[default]
    UserCode,
}

/// Text handed to a UI surface once a run is over.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
    pub stdout: String,
    pub stderr: String,
    pub phase: FeedbackPhase,
}

impl Feedback {
    pub fn user(stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
            phase: FeedbackPhase::UserCode,
        }
    }

    pub fn environment(stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
            phase: FeedbackPhase::Environment,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.stdout.is_empty() && self.stderr.is_empty()
    }

    pub fn combined(&self) -> String {
        format!("{}{}", self.stdout, self.stderr)
    }
}

/// Where a piece of source handed to the interpreter comes from. The file
/// name shows up in tracebacks and decides which frames belong to the user.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeOrigin {
    Env,
    Post,
    #[default]
    Exec,
    Console,
}

impl CodeOrigin {
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Env => "<env>",
            Self::Post => "<post>",
            Self::Exec => "<exec>",
            Self::Console => "<console>",
        }
    }

    pub fn is_environment(self) -> bool {
        matches!(self, Self::Env | Self::Post)
    }
}

impl fmt::Display for CodeOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}
