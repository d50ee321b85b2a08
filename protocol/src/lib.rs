//! Types shared between the page payload and the execution core.

mod catalog;
mod exercise;
mod feedback;

pub use catalog::CatalogError;
pub use catalog::ExerciseCatalog;
pub use catalog::decode_exercise_catalog;
pub use catalog::parse_exercise_catalog;
pub use exercise::AttemptsLeft;
pub use exercise::ExerciseData;
pub use exercise::RECURSION_LIMIT_UNSET;
pub use exercise::RecursionLimit;
pub use exercise::RevealMask;
pub use exercise::UNLIMITED_ATTEMPTS;
pub use feedback::CodeOrigin;
pub use feedback::Feedback;
pub use feedback::FeedbackPhase;
