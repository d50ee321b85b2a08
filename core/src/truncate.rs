//! Head/tail shortening of feedback text.
//!
//! Three profiles are applied independently: captured stdout is measured in
//! chars, tracebacks and single error messages in lines.

use runlab_utils_string::char_len;
use runlab_utils_string::line_count;
use runlab_utils_string::take_chars_head;
use runlab_utils_string::take_chars_tail;
use runlab_utils_string::take_lines_head;
use runlab_utils_string::take_lines_tail;
use serde::Deserialize;
use serde::Serialize;

use crate::config::FeedbackSettings;
use crate::error::ConfigError;

pub const DEFAULT_TRUNCATION_MARKER: &str = "[Message truncated]";

const ELLIPSIS_LINE: &str = "\n...\n";

pub const STDOUT_LIMITS: ProfileLimits = ProfileLimits {
    unit: Unit::Chars,
    limit: 1000,
    head: 400,
    tail: 200,
};

pub const TRACE_LIMITS: ProfileLimits = ProfileLimits {
    unit: Unit::Lines,
    limit: 20,
    head: 5,
    tail: 5,
};

pub const ERROR_LIMITS: ProfileLimits = ProfileLimits {
    unit: Unit::Lines,
    limit: 15,
    head: 6,
    tail: 5,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    Chars,
    Lines,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileLimits {
    pub unit: Unit,
    pub limit: usize,
    pub head: usize,
    pub tail: usize,
}

impl ProfileLimits {
    /// Size of a shortened text, so that shortening it again is a no-op.
    fn shortened_size(&self, marker: &str) -> usize {
        let wrapping = match self.unit {
            Unit::Chars => char_len(marker) + 2 * char_len(ELLIPSIS_LINE),
            Unit::Lines => line_count(marker).max(1) + 2,
        };
        self.head + self.tail + wrapping
    }

    pub(crate) fn validate(&self, profile: Profile, marker: &str) -> Result<(), ConfigError> {
        let shortened = self.shortened_size(marker);
        if shortened > self.limit {
            return Err(ConfigError::ProfileTooTight {
                profile: profile.name(),
                head: self.head,
                tail: self.tail,
                marker: shortened - self.head - self.tail,
                limit: self.limit,
            });
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Profile {
    Stdout,
    Trace,
    Error,
}

impl Profile {
    pub const ALL: [Profile; 3] = [Profile::Stdout, Profile::Trace, Profile::Error];

    pub fn name(self) -> &'static str {
        match self {
            Profile::Stdout => "stdout",
            Profile::Trace => "trace",
            Profile::Error => "error",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeedbackFormatter {
    enabled: bool,
    marker: String,
    stdout: ProfileLimits,
    trace: ProfileLimits,
    error: ProfileLimits,
}

impl FeedbackFormatter {
    pub fn new(settings: &FeedbackSettings) -> Self {
        Self {
            enabled: settings.cut_feedback,
            marker: settings.marker.clone(),
            stdout: settings.stdout,
            trace: settings.trace,
            error: settings.error,
        }
    }

    pub fn limits(&self, profile: Profile) -> ProfileLimits {
        match profile {
            Profile::Stdout => self.stdout,
            Profile::Trace => self.trace,
            Profile::Error => self.error,
        }
    }

    /// Replace the middle of `text` with the truncation marker when it is
    /// longer than the profile limit.
    pub fn shorten(&self, text: &str, profile: Profile) -> String {
        if !self.enabled {
            return text.to_string();
        }
        let ProfileLimits {
            unit,
            limit,
            head,
            tail,
        } = self.limits(profile);

        let (head, tail) = match unit {
            Unit::Chars if char_len(text) > limit => {
                (take_chars_head(text, head), take_chars_tail(text, tail))
            }
            Unit::Lines if line_count(text) > limit => {
                (take_lines_head(text, head), take_lines_tail(text, tail))
            }
            _ => return text.to_string(),
        };
        format!(
            "{head}{ELLIPSIS_LINE}{marker}{ELLIPSIS_LINE}{tail}",
            marker = self.marker
        )
    }
}

impl Default for FeedbackFormatter {
    fn default() -> Self {
        Self::new(&FeedbackSettings::default())
    }
}
