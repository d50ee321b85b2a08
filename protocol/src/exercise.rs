use std::fmt;

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;

/// Word used in persisted payloads for an unbounded attempt counter.
pub const UNLIMITED_ATTEMPTS: &str = "Infinity";

/// Persisted value meaning "leave the interpreter's recursion limit alone".
pub const RECURSION_LIMIT_UNSET: i64 = -1;

/// Number of validations an exercise still accepts before its withheld
/// content is revealed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AttemptsLeft {
    #[default]
    Unlimited,
    Finite(u32),
}

impl AttemptsLeft {
    pub fn is_exhausted(self) -> bool {
        matches!(self, Self::Finite(0))
    }

    /// Counter after one consumed attempt. Never goes below zero.
    pub fn decremented(self) -> Self {
        match self {
            Self::Unlimited => Self::Unlimited,
            Self::Finite(n) => Self::Finite(n.saturating_sub(1)),
        }
    }
}

impl fmt::Display for AttemptsLeft {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unlimited => f.write_str(UNLIMITED_ATTEMPTS),
            Self::Finite(n) => write!(f, "{n}"),
        }
    }
}

impl Serialize for AttemptsLeft {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Unlimited => serializer.serialize_str(UNLIMITED_ATTEMPTS),
            Self::Finite(n) => serializer.serialize_u32(*n),
        }
    }
}

impl<'de> Deserialize<'de> for AttemptsLeft {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Count(i64),
            Word(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Word(word) if word == UNLIMITED_ATTEMPTS => Ok(Self::Unlimited),
            Raw::Word(word) => Err(serde::de::Error::custom(format!(
                "attempts_left must be a count or \"{UNLIMITED_ATTEMPTS}\", got \"{word}\""
            ))),
            Raw::Count(count) => u32::try_from(count).map(Self::Finite).map_err(|_| {
                serde::de::Error::custom(format!("attempts_left out of range: {count}"))
            }),
        }
    }
}

/// Which parts of the withheld content exist for an exercise.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct RevealMask(u8);

impl RevealMask {
    pub const SOLUTION: u8 = 0b01;
    pub const REMARKS: u8 = 0b10;

    pub const NONE: Self = Self(0);
    pub const ALL: Self = Self(Self::SOLUTION | Self::REMARKS);

    pub fn new(bits: u8) -> Option<Self> {
        (bits & !Self::ALL.0 == 0).then_some(Self(bits))
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn has_solution(self) -> bool {
        self.0 & Self::SOLUTION != 0
    }

    pub fn has_remarks(self) -> bool {
        self.0 & Self::REMARKS != 0
    }
}

impl TryFrom<u8> for RevealMask {
    type Error = String;

    fn try_from(bits: u8) -> Result<Self, Self::Error> {
        Self::new(bits).ok_or_else(|| format!("invalid corr_rems_mask {bits}"))
    }
}

impl From<RevealMask> for u8 {
    fn from(mask: RevealMask) -> Self {
        mask.0
    }
}

/// Maximum recursion depth imposed while user code runs.
///
/// Persisted as an integer where [`RECURSION_LIMIT_UNSET`] (or any value
/// below 1) means no limit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum RecursionLimit {
    #[default]
    Unlimited,
    Depth(u32),
}

impl RecursionLimit {
    pub fn is_limited(self) -> bool {
        matches!(self, Self::Depth(_))
    }
}

impl TryFrom<i64> for RecursionLimit {
    type Error = String;

    fn try_from(raw: i64) -> Result<Self, Self::Error> {
        if raw < 1 {
            return Ok(Self::Unlimited);
        }
        u32::try_from(raw)
            .map(Self::Depth)
            .map_err(|_| format!("rec_limit out of range: {raw}"))
    }
}

impl From<RecursionLimit> for i64 {
    fn from(limit: RecursionLimit) -> Self {
        match limit {
            RecursionLimit::Unlimited => RECURSION_LIMIT_UNSET,
            RecursionLimit::Depth(depth) => i64::from(depth),
        }
    }
}

/// Per-exercise data as shipped in the page payload.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExerciseData {
    pub attempts_left: AttemptsLeft,
    /// Overrides the global "count failing user code as an attempt" setting.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decrease_attempts_on_failure: Option<bool>,
    pub auto_log_assert: Option<bool>,
    pub corr_rems_mask: RevealMask,
    pub env_content: String,
    pub excluded: Vec<String>,
    pub excluded_methods: Vec<String>,
    pub has_check_btn: bool,
    pub post_content: String,
    pub prefill_term: String,
    pub public_tests: String,
    pub py_name: String,
    pub rec_limit: RecursionLimit,
    pub secret_tests: String,
    /// Compressed solution and remarks, revealed once the exercise ends.
    pub solution: String,
    pub user_content: String,
    pub white_list: Vec<String>,
}

impl ExerciseData {
    pub fn has_secret_tests(&self) -> bool {
        !self.secret_tests.trim().is_empty()
    }

    /// Whether a run of this exercise needs the capability sandbox.
    pub fn has_restrictions(&self) -> bool {
        !self.excluded.is_empty() || self.rec_limit.is_limited()
    }
}
