use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use async_trait::async_trait;
use runlab_async_utils::SingleFlight;
use runlab_async_utils::TokioClock;
use runlab_core::ExecutionCoordinator;
use runlab_core::RunSession;
use runlab_core::Runtime;
use runlab_core::Settings;
use runlab_core::interpreter::ArchiveFetcher;
use runlab_core::interpreter::FeedbackSink;
use runlab_core::interpreter::ModuleResolver;
use runlab_protocol::ExerciseData;
use runlab_protocol::Feedback;
use runlab_protocol::FeedbackPhase;
use serde_json::Value;


use toy::ToyInterpreter;
use toy::lock;

/// Records everything shown to the user.
#[derive(Default)]
pub struct RecordingSink {
    interactive: bool,
    feedback: Mutex<Vec<Feedback>>,
    alerts: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn interactive() -> Self {
        Self {
            interactive: true,
            ..Self::default()
        }
    }

    /// A surface without a terminal: environment failures become alerts.
    pub fn headless() -> Self {
        Self::default()
    }

    pub fn feedback(&self) -> Vec<Feedback> {
        lock(&self.feedback).clone()
    }

    pub fn user_stdout(&self) -> Vec<String> {
        self.phase(FeedbackPhase::UserCode)
            .filter(|feedback| !feedback.stdout.is_empty())
            .map(|feedback| feedback.stdout)
            .collect()
    }

    pub fn user_stderr(&self) -> Vec<String> {
        self.phase(FeedbackPhase::UserCode)
            .filter(|feedback| !feedback.stderr.is_empty())
            .map(|feedback| feedback.stderr)
            .collect()
    }

    pub fn environment(&self) -> Vec<Feedback> {
        self.phase(FeedbackPhase::Environment).collect()
    }

    pub fn alerts(&self) -> Vec<String> {
        lock(&self.alerts).clone()
    }

    pub fn clear(&self) {
        lock(&self.feedback).clear();
        lock(&self.alerts).clear();
    }

    fn phase(&self, phase: FeedbackPhase) -> impl Iterator<Item = Feedback> {
        self.feedback()
            .into_iter()
            .filter(move |feedback| feedback.phase == phase)
    }
}

impl FeedbackSink for RecordingSink {
    fn emit(&self, feedback: &Feedback) {
        lock(&self.feedback).push(feedback.clone());
    }

    fn is_interactive(&self) -> bool {
        self.interactive
    }

    fn alert(&self, message: &str) {
        lock(&self.alerts).push(message.to_string());
    }
}

/// Serves canned archives by URL and remembers what was asked for.
#[derive(Default)]
pub struct StaticFetcher {
    archives: BTreeMap<String, Vec<u8>>,
    requests: Mutex<Vec<String>>,
}

impl StaticFetcher {
    pub fn with_archive(mut self, url: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.archives.insert(url.into(), bytes.into());
        self
    }

    pub fn requests(&self) -> Vec<String> {
        lock(&self.requests).clone()
    }
}

#[async_trait]
impl ArchiveFetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> anyhow::Result<Vec<u8>> {
        lock(&self.requests).push(url.to_string());
        self.archives
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("404 Not Found: {url}"))
    }
}

/// Resolves imports through the toy interpreter and counts the lookups.
pub struct CountingResolver {
    inner: Arc<ToyInterpreter>,
    calls: AtomicUsize,
}

impl CountingResolver {
    pub fn new(inner: Arc<ToyInterpreter>) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Acquire)
    }
}

impl ModuleResolver for CountingResolver {
    fn find_imports(&self, code: &str) -> Vec<String> {
        self.calls.fetch_add(1, Ordering::AcqRel);
        self.inner.find_imports(code)
    }

    fn loaded_modules(&self) -> BTreeSet<String> {
        self.calls.fetch_add(1, Ordering::AcqRel);
        self.inner.loaded_modules()
    }
}

/// A toy interpreter wired to a recording sink.
pub struct TestRuntime {
    pub interpreter: Arc<ToyInterpreter>,
    pub resolver: Arc<CountingResolver>,
    pub sink: Arc<RecordingSink>,
    pub fetcher: Arc<StaticFetcher>,
}

impl Default for TestRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl TestRuntime {
    pub fn new() -> Self {
        Self::with_parts(
            ToyInterpreter::new(),
            RecordingSink::interactive(),
            StaticFetcher::default(),
        )
    }

    pub fn with_parts(
        interpreter: ToyInterpreter,
        sink: RecordingSink,
        fetcher: StaticFetcher,
    ) -> Self {
        let interpreter = Arc::new(interpreter);
        Self {
            resolver: Arc::new(CountingResolver::new(Arc::clone(&interpreter))),
            interpreter,
            sink: Arc::new(sink),
            fetcher: Arc::new(fetcher),
        }
    }

    pub fn runtime(&self) -> Runtime {
        Runtime {
            interpreter: self.interpreter.clone(),
            resolver: self.resolver.clone(),
            fetcher: self.fetcher.clone(),
            sink: self.sink.clone(),
        }
    }

    pub fn session(&self, settings: Settings) -> Arc<RunSession> {
        Arc::new(RunSession::new(self.runtime(), Arc::new(settings)))
    }

    /// A coordinator with its own lock, so tests never contend on the
    /// process-wide one.
    pub fn coordinator(&self, settings: &Settings) -> Arc<ExecutionCoordinator> {
        let lock = Arc::new(SingleFlight::with_clock(
            Arc::new(TokioClock),
            settings.lock_poll_interval(),
        ));
        Arc::new(ExecutionCoordinator::with_lock(
            lock,
            self.interpreter.clone(),
            settings,
        ))
    }
}

/// Settings with millisecond waits.
pub fn fast_settings() -> Settings {
    Settings {
        lock_poll_interval_ms: 1,
        ready_attempts: 5,
        ready_wait_ms: 5,
        ..Settings::default()
    }
}

/// Exercise payload from its JSON form, as found in a catalog.
pub fn exercise_data(payload: Value) -> ExerciseData {
    serde_json::from_value(payload).unwrap_or_else(|err| panic!("invalid exercise payload: {err}"))
}

/// Compressed form of `literal` that references every character once, in
/// order. Good enough for short withheld content in tests.
pub fn identity_payload(literal: &str) -> String {
    use runlab_payload_codec::ALPHABET;
    use runlab_payload_codec::SEGMENT_SEPARATOR;

    let digits: Vec<char> = ALPHABET.chars().collect();
    let base = digits.len();
    let codes: String = (0..literal.chars().count())
        .map(|idx| {
            let code = idx + 2;
            format!("{}{}", digits[code / base], digits[code % base])
        })
        .collect();
    format!(".{SEGMENT_SEPARATOR}{literal}{SEGMENT_SEPARATOR}{codes}")
}
