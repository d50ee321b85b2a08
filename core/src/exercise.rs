//! Editor-driven exercise: play, validate, restart.

use std::sync::Arc;

use runlab_async_utils::LockOutcome;
use runlab_protocol::AttemptsLeft;
use runlab_protocol::CodeOrigin;
use runlab_protocol::ExerciseData;
use tracing::debug;
use tracing::error;

use crate::attempts::AttemptTracker;
use crate::attempts::RevealTrigger;
use crate::attempts::compose_reveal_message;
use crate::attempts::success_message;
use crate::coordinator::ExecutionCoordinator;
use crate::error::CoreError;
use crate::error_log::ErrorKind;
use crate::run_config::RunConfig;
use crate::run_config::RunVisibility;
use crate::session::RunOutcome;
use crate::session::RunSession;

/// Builtin string holding the editor content while an action runs.
pub const USER_CODE_TEXT: &str = "__USER_CODE__";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reveal {
    pub trigger: RevealTrigger,
    pub message: String,
    /// Decoded solution and remarks.
    pub content: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExerciseReport {
    pub success: bool,
    pub error_text: String,
    /// The `env` section failed and the user's code never ran.
    pub environment_failure: bool,
    pub attempts_left: AttemptsLeft,
    pub reveal: Option<Reveal>,
}

pub struct Exercise {
    id: String,
    data: ExerciseData,
    tracker: AttemptTracker,
    session: Arc<RunSession>,
    coordinator: Arc<ExecutionCoordinator>,
    withheld: Option<String>,
}

impl Exercise {
    pub fn new(
        id: impl Into<String>,
        data: ExerciseData,
        session: Arc<RunSession>,
        coordinator: Arc<ExecutionCoordinator>,
    ) -> Self {
        Self {
            id: id.into(),
            tracker: AttemptTracker::new(data.attempts_left, data.corr_rems_mask),
            data,
            session,
            coordinator,
            withheld: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn data(&self) -> &ExerciseData {
        &self.data
    }

    pub fn attempts_left(&self) -> AttemptsLeft {
        self.tracker.attempts_left()
    }

    pub fn is_revealed(&self) -> bool {
        self.tracker.is_revealed()
    }

    /// The solution and remarks, once revealed.
    pub fn revealed_content(&self) -> Option<&str> {
        if self.tracker.is_revealed() {
            self.withheld.as_deref()
        } else {
            None
        }
    }

    /// Reset the attempt counter and hide the withheld content again.
    pub fn restart(&mut self) {
        debug!(exercise = %self.id, "exercise restarted");
        self.tracker.restart();
    }

    /// Run the user's code with the public options. No attempt is consumed.
    pub async fn play(&mut self, code: &str) -> LockOutcome<ExerciseReport> {
        let coordinator = Arc::clone(&self.coordinator);
        coordinator
            .run_exclusive("play", move || self.play_locked(code))
            .await
    }

    /// Run the user's code, then the public and secret tests, and update the
    /// attempt counter.
    pub async fn validate(&mut self, code: &str) -> LockOutcome<ExerciseReport> {
        let coordinator = Arc::clone(&self.coordinator);
        coordinator
            .run_exclusive("validate", move || self.validate_locked(code))
            .await
    }

    fn public_config(&self) -> RunConfig {
        RunConfig::for_exercise(&self.data, self.session.settings()).build()
    }

    fn secret_config(&self, public: &RunConfig) -> RunConfig {
        let settings = self.session.settings();
        let visibility = if settings.show_only_assertion_errors_for_secrets {
            RunVisibility::Secret
        } else {
            RunVisibility::Public
        };
        public
            .to_builder()
            .with_stdout(!settings.deactivate_stdout_for_secrets)
            .visibility(visibility)
            .move_forward(true)
            .auto_log_assert(
                self.data
                    .auto_log_assert
                    .unwrap_or(settings.show_assertion_code_on_failed_test),
            )
            .build()
    }

    async fn play_locked(&mut self, code: &str) -> anyhow::Result<ExerciseReport> {
        let _user_code = self.session.expose_text(USER_CODE_TEXT, code);
        let config = self.public_config();
        let env = self.setup(&config).await;
        if let Some(report) = self.environment_failure(&env) {
            return Ok(report);
        }

        let outcome = self.session.run(code, &config).await;
        self.teardown(&config, outcome.is_success(), false).await;
        Ok(self.report(&outcome, None))
    }

    async fn validate_locked(&mut self, code: &str) -> anyhow::Result<ExerciseReport> {
        let _user_code = self.session.expose_text(USER_CODE_TEXT, code);
        let config = self.public_config();
        let counts_on_failure = self.data.decrease_attempts_on_failure.unwrap_or(
            self.session
                .settings()
                .decrease_attempts_on_user_code_failure,
        );
        let env = self.setup(&config).await;
        if let Some(mut report) = self.environment_failure(&env) {
            if env.error_kind() == Some(ErrorKind::Assertion) {
                let reveal = self.handle_outcome(false, counts_on_failure);
                self.teardown(&config, false, matches!(reveal, Ok(Some(_))))
                    .await;
                report.reveal = reveal?;
                report.attempts_left = self.attempts_left();
            }
            return Ok(report);
        }

        let mut outcome = self.session.run(code, &config).await;
        let mut counts_attempt = counts_on_failure && !outcome.is_success();

        if outcome.is_success() {
            if !self.data.has_secret_tests() {
                self.teardown(&config, true, false).await;
                return Ok(self.report(&outcome, None));
            }
            let tests = format!("{}\n\n{}", self.data.public_tests, self.data.secret_tests);
            let secret = self.secret_config(&config);
            outcome = self.session.run(tests.trim(), &secret).await;
            counts_attempt = !outcome.is_success();
        }

        let reveal = self.handle_outcome(outcome.is_success(), counts_attempt);
        self.teardown(&config, outcome.is_success(), matches!(reveal, Ok(Some(_))))
            .await;
        let reveal = reveal?;
        Ok(self.report(&outcome, reveal))
    }

    async fn setup(&self, config: &RunConfig) -> RunOutcome {
        self.session
            .run_environment(&self.data.env_content, CodeOrigin::Env, config)
            .await
    }

    async fn teardown(&self, config: &RunConfig, success: bool, got_final: bool) {
        if success && !got_final {
            self.session
                .notify(&self.session.settings().messages.success_msg);
        }
        self.session
            .run_environment(&self.data.post_content, CodeOrigin::Post, config)
            .await;
    }

    fn environment_failure(&self, env: &RunOutcome) -> Option<ExerciseReport> {
        let error = env.error.as_ref()?;
        Some(ExerciseReport {
            success: false,
            error_text: error.text.clone(),
            environment_failure: true,
            attempts_left: self.attempts_left(),
            reveal: None,
        })
    }

    fn handle_outcome(
        &mut self,
        success: bool,
        counts_attempt: bool,
    ) -> Result<Option<Reveal>, CoreError> {
        // Nothing is recorded unless the withheld content decodes.
        if self.tracker.peek_outcome(success, counts_attempt).is_some() {
            self.withheld_content()?;
        }
        let Some(trigger) = self.tracker.record_outcome(success, counts_attempt) else {
            return Ok(None);
        };
        let content = self.withheld.clone().unwrap_or_default();
        let mask = self.tracker.mask();
        let messages = &self.session.settings().messages;
        let message = match trigger {
            RevealTrigger::Success => success_message(mask, messages, &mut rand::rng()),
            RevealTrigger::AttemptsExhausted => compose_reveal_message(mask, trigger, messages),
        };
        self.session.notify(&message);
        debug!(exercise = %self.id, ?trigger, "withheld content revealed");
        Ok(Some(Reveal {
            trigger,
            message,
            content,
        }))
    }

    fn withheld_content(&mut self) -> Result<&str, CoreError> {
        if self.withheld.is_none() {
            let decoded = if self.data.solution.trim().is_empty() {
                String::new()
            } else {
                runlab_payload_codec::decode(&self.data.solution).map_err(|source| {
                    error!(exercise = %self.id, "withheld content is corrupt: {source}");
                    CoreError::WithheldContent {
                        exercise: self.id.clone(),
                        source,
                    }
                })?
            };
            self.withheld = Some(decoded);
        }
        Ok(self.withheld.as_deref().unwrap_or_default())
    }

    fn report(&self, outcome: &RunOutcome, reveal: Option<Reveal>) -> ExerciseReport {
        ExerciseReport {
            success: outcome.is_success(),
            error_text: outcome.error_text().to_string(),
            environment_failure: false,
            attempts_left: self.attempts_left(),
            reveal,
        }
    }
}
