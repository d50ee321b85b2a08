//! Root of the `runlab-core` library.

// Library code never writes to stdout/stderr directly: user-visible text goes
// through a `FeedbackSink`, diagnostics through `tracing`.
#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod attempts;
pub mod config;
pub mod console;
pub mod coordinator;
mod error;
pub mod error_log;
pub mod exercise;
pub mod interpreter;
pub mod modules;
pub mod run_config;
pub mod sandbox;
pub mod session;
pub mod truncate;

pub use config::Settings;
pub use console::ConsoleSession;
pub use coordinator::ExecutionCoordinator;
pub use error::ConfigError;
pub use error::CoreError;
pub use error::Result;
pub use error::SandboxError;
pub use exercise::Exercise;
pub use exercise::ExerciseReport;
pub use interpreter::Runtime;
pub use run_config::RunConfig;
pub use session::RunOutcome;
pub use session::RunSession;
