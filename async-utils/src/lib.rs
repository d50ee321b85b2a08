mod clock;
mod single_flight;

pub use clock::Clock;
pub use clock::TokioClock;
pub use single_flight::DEFAULT_POLL_INTERVAL;
pub use single_flight::LockOutcome;
pub use single_flight::SingleFlight;
