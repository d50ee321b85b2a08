//! Interactive console attached to an exercise.
//!
//! Lines are buffered until the interpreter reports that they form a complete
//! statement. Every submitted command runs between the exercise's `env` and
//! `post` sections, like an editor run does.

use std::sync::Arc;

use runlab_async_utils::LockOutcome;
use runlab_protocol::CodeOrigin;
use runlab_protocol::ExerciseData;
use runlab_protocol::Feedback;
use tracing::debug;

use crate::coordinator::ExecutionCoordinator;
use crate::interpreter::ConsoleCheck;
use crate::run_config::RunConfig;
use crate::session::RunOutcome;
use crate::session::RunSession;

/// Builtin string holding the buffered console lines while a command runs.
pub const USER_COMMAND_TEXT: &str = "__USER_CMD__";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConsoleEvent {
    /// A complete statement was evaluated (or skipped after a failing `env`).
    Ran(RunOutcome),
    /// More lines are needed.
    Incomplete,
    SyntaxError(String),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConsoleReply {
    pub events: Vec<ConsoleEvent>,
    /// Prompt to show before the next line.
    pub prompt: String,
    pub environment_error: Option<String>,
}

pub struct ConsoleSession {
    data: ExerciseData,
    session: Arc<RunSession>,
    coordinator: Arc<ExecutionCoordinator>,
    pending: Vec<String>,
}

impl ConsoleSession {
    pub fn new(
        data: ExerciseData,
        session: Arc<RunSession>,
        coordinator: Arc<ExecutionCoordinator>,
    ) -> Self {
        Self {
            data,
            session,
            coordinator,
            pending: Vec::new(),
        }
    }

    /// Text to pre-fill the console input with.
    pub fn prefill(&self) -> &str {
        &self.data.prefill_term
    }

    pub fn prompt(&self) -> &str {
        let messages = &self.session.settings().messages;
        if self.pending.is_empty() {
            &messages.prompt_start
        } else {
            &messages.prompt_wait
        }
    }

    pub fn has_pending_lines(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Feed one command (possibly several lines) to the console.
    pub async fn submit(&mut self, command: &str) -> LockOutcome<ConsoleReply> {
        let coordinator = Arc::clone(&self.coordinator);
        coordinator
            .run_exclusive("console", move || self.submit_locked(command))
            .await
    }

    async fn submit_locked(&mut self, command: &str) -> anyhow::Result<ConsoleReply> {
        let buffered = self
            .pending
            .iter()
            .map(String::as_str)
            .chain(command.split('\n'))
            .collect::<Vec<_>>()
            .join("\n");
        let _user_command = self.session.expose_text(USER_COMMAND_TEXT, &buffered);
        let config = RunConfig::for_exercise(&self.data, self.session.settings())
            .origin(CodeOrigin::Console)
            .build();
        let env = self
            .session
            .run_environment(&self.data.env_content, CodeOrigin::Env, &config)
            .await;
        let environment_failed = !env.is_success();

        let mut events = Vec::new();
        for line in command.split('\n') {
            self.pending.push(line.to_string());
            let source = self.pending.join("\n");
            match self.session.runtime().interpreter.check_console_source(&source) {
                ConsoleCheck::Complete => {
                    self.pending.clear();
                    let outcome = if environment_failed {
                        RunOutcome::skipped()
                    } else {
                        self.session.run(&source, &config).await
                    };
                    events.push(ConsoleEvent::Ran(outcome));
                }
                ConsoleCheck::Incomplete => events.push(ConsoleEvent::Incomplete),
                ConsoleCheck::SyntaxError(message) => {
                    self.pending.clear();
                    debug!("console source rejected: {message}");
                    self.session
                        .runtime()
                        .sink
                        .emit(&Feedback::user("", message.clone()));
                    events.push(ConsoleEvent::SyntaxError(message));
                }
            }
        }

        self.session
            .run_environment(&self.data.post_content, CodeOrigin::Post, &config)
            .await;

        Ok(ConsoleReply {
            events,
            prompt: self.prompt().to_string(),
            environment_error: env.error.map(|error| error.text),
        })
    }
}
