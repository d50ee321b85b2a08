//! Runtime settings, loaded from a TOML file.
//!
//! Every field has a default, so an empty file (or no file at all) yields the
//! stock behaviour. [`Settings::load`] and [`Settings::from_toml_str`] always
//! validate what they parse.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::error::ConfigError;
use crate::truncate::DEFAULT_TRUNCATION_MARKER;
use crate::truncate::ERROR_LIMITS;
use crate::truncate::Profile;
use crate::truncate::ProfileLimits;
use crate::truncate::STDOUT_LIMITS;
use crate::truncate::TRACE_LIMITS;

pub const DEFAULT_EXCLUSION_MARKER: &str = "FORBIDDEN";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub feedback: FeedbackSettings,
    /// Whether a failing public run consumes an attempt.
    pub decrease_attempts_on_user_code_failure: bool,
    pub deactivate_stdout_for_secrets: bool,
    pub show_only_assertion_errors_for_secrets: bool,
    pub show_assertion_code_on_failed_test: bool,
    pub exclusion_marker: String,
    pub lock_poll_interval_ms: u64,
    pub ready_attempts: u32,
    pub ready_wait_ms: u64,
    /// Libraries served as zip archives next to the site rather than
    /// installed from the package index.
    pub site_libs: Vec<String>,
    pub archive_base_url: String,
    pub package_aliases: BTreeMap<String, String>,
    pub messages: Messages,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            feedback: FeedbackSettings::default(),
            decrease_attempts_on_user_code_failure: true,
            deactivate_stdout_for_secrets: true,
            show_only_assertion_errors_for_secrets: false,
            show_assertion_code_on_failed_test: true,
            exclusion_marker: DEFAULT_EXCLUSION_MARKER.to_string(),
            lock_poll_interval_ms: 100,
            ready_attempts: 80,
            ready_wait_ms: 20_000,
            site_libs: Vec::new(),
            archive_base_url: String::new(),
            package_aliases: BTreeMap::new(),
            messages: Messages::default(),
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Self::from_toml_str(&raw)?;
        tracing::debug!(path = %path.display(), "settings loaded");
        Ok(settings)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let settings: Settings = toml::from_str(raw)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for profile in Profile::ALL {
            self.feedback
                .limits(profile)
                .validate(profile, &self.feedback.marker)?;
        }
        if self.ready_attempts == 0 {
            return Err(ConfigError::Zero {
                field: "ready_attempts",
            });
        }
        if self.lock_poll_interval_ms == 0 {
            return Err(ConfigError::Zero {
                field: "lock_poll_interval_ms",
            });
        }
        Ok(())
    }

    pub fn lock_poll_interval(&self) -> Duration {
        Duration::from_millis(self.lock_poll_interval_ms)
    }

    /// Pause between two readiness checks of the interpreter.
    pub fn ready_step(&self) -> Duration {
        Duration::from_millis(self.ready_wait_ms / u64::from(self.ready_attempts.max(1)))
    }

    pub fn archive_url(&self, lib: &str) -> String {
        format!("{}/{lib}.zip", self.archive_base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackSettings {
    pub cut_feedback: bool,
    pub marker: String,
    pub stdout: ProfileLimits,
    pub trace: ProfileLimits,
    pub error: ProfileLimits,
}

impl FeedbackSettings {
    pub fn limits(&self, profile: Profile) -> ProfileLimits {
        match profile {
            Profile::Stdout => self.stdout,
            Profile::Trace => self.trace,
            Profile::Error => self.error,
        }
    }
}

impl Default for FeedbackSettings {
    fn default() -> Self {
        Self {
            cut_feedback: true,
            marker: DEFAULT_TRUNCATION_MARKER.to_string(),
            stdout: STDOUT_LIMITS,
            trace: TRACE_LIMITS,
            error: ERROR_LIMITS,
        }
    }
}

/// User-facing strings. Overridable to localize the runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Messages {
    pub success_msg: String,
    pub success_head: String,
    pub success_head_extra: String,
    pub success_tail: String,
    pub fail_head: String,
    pub reveal_corr: String,
    pub reveal_join: String,
    pub reveal_rem: String,
    pub fail_tail: String,
    pub fail_tail_plural: String,
    pub install_start: String,
    pub install_done: String,
    pub big_fail: String,
    pub prompt_start: String,
    pub prompt_wait: String,
    pub success_emojis: Vec<String>,
}

impl Default for Messages {
    fn default() -> Self {
        Self {
            success_msg: "Terminated without error.".to_string(),
            success_head: "Bravo!".to_string(),
            success_head_extra: "You passed all the tests!".to_string(),
            success_tail: "Don't forget to read".to_string(),
            fail_head: "Not quite there yet...".to_string(),
            reveal_corr: "the solution".to_string(),
            reveal_join: "and".to_string(),
            reveal_rem: "the remarks".to_string(),
            fail_tail: "is now available".to_string(),
            fail_tail_plural: "are now available".to_string(),
            install_start: "Installing Python packages. This may take some time...".to_string(),
            install_done: "Installations completed!".to_string(),
            big_fail: "\nIf you see this, there is a bug either in the website code, or in the \
                       way this exercise is configured.\nPlease contact the webmaster with \
                       information about what you were doing when this happened!"
                .to_string(),
            prompt_start: ">>> ".to_string(),
            prompt_wait: "... ".to_string(),
            success_emojis: ["🔥", "✨", "🌠", "✅", "🥇", "🎖"]
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }
}
