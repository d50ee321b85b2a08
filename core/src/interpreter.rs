//! Seams to the embedded interpreter and to the UI surface around it.
//!
//! The core never evaluates script code itself. It drives an [`Interpreter`]
//! and rewires the interpreter's global namespace through a
//! [`CapabilityTable`]. Capabilities are shared as `Arc` handles so the
//! sandbox can tell, by pointer identity, whether a binding it installed is
//! still in place.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use runlab_protocol::CodeOrigin;
use runlab_protocol::Feedback;
use serde_json::Value;

pub type CapabilityHandle = Arc<dyn Capability>;
pub type ImportHookHandle = Arc<dyn ImportHook>;

/// A callable exposed to script code (a builtin function, or a guard
/// standing in for one).
pub trait Capability: Send + Sync {
    fn call(&self, args: &[Value]) -> Result<Value, ScriptError>;
}

/// Resolves `import` statements.
pub trait ImportHook: Send + Sync {
    fn import(&self, module: &str) -> Result<(), ScriptError>;
}

/// Mutable view of the interpreter's builtins and global namespace.
pub trait CapabilityTable: Send + Sync {
    /// The builtin registered under `name`, if `name` is a builtin at all.
    fn builtin(&self, name: &str) -> Option<CapabilityHandle>;
    fn global(&self, name: &str) -> Option<CapabilityHandle>;
    fn bind_global(&self, name: &str, capability: CapabilityHandle);
    fn unbind_global(&self, name: &str);
    fn import_hook(&self) -> ImportHookHandle;
    fn set_import_hook(&self, hook: ImportHookHandle);
    fn set_recursion_limit(&self, depth: u32);
    /// Expose `text` to script code as the builtin string `name`.
    fn set_builtin_text(&self, name: &str, text: &str);
}

/// Whether two handles point at the very same capability object.
pub fn same_capability(left: &CapabilityHandle, right: &CapabilityHandle) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(left), Arc::as_ptr(right))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScriptErrorKind {
    /// Raised by a sandbox guard or the method scan.
    Exclusion,
    Assertion,
    Other,
}

/// One entry of an interpreter traceback, innermost last.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TraceFrame {
    pub file: String,
    pub line: usize,
    pub function: String,
}

impl TraceFrame {
    pub fn new(file: impl Into<String>, line: usize, function: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            line,
            function: function.into(),
        }
    }

    pub fn in_origin(origin: CodeOrigin, line: usize) -> Self {
        Self::new(origin.file_name(), line, "<module>")
    }
}

impl fmt::Display for TraceFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "  File \"{}\", line {}, in {}",
            self.file, self.line, self.function
        )
    }
}

/// An error raised by script code, as reported by the interpreter.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{type_name}: {message}")]
pub struct ScriptError {
    pub kind: ScriptErrorKind,
    pub type_name: String,
    pub message: String,
    pub frames: Vec<TraceFrame>,
}

impl ScriptError {
    pub fn new(
        kind: ScriptErrorKind,
        type_name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            type_name: type_name.into(),
            message: message.into(),
            frames: Vec::new(),
        }
    }

    pub fn exclusion(message: impl Into<String>) -> Self {
        Self::new(ScriptErrorKind::Exclusion, "ExclusionError", message)
    }

    pub fn assertion(message: impl Into<String>) -> Self {
        Self::new(ScriptErrorKind::Assertion, "AssertionError", message)
    }

    pub fn with_frames(mut self, frames: Vec<TraceFrame>) -> Self {
        self.frames = frames;
        self
    }

    /// `Type: message`, or just `Type` for an empty message.
    pub fn headline(&self) -> String {
        if self.message.is_empty() {
            self.type_name.clone()
        } else {
            format!("{}: {}", self.type_name, self.message)
        }
    }
}

/// Result of compiling the buffered lines of an interactive console.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConsoleCheck {
    Complete,
    Incomplete,
    SyntaxError(String),
}

#[async_trait]
pub trait Interpreter: Send + Sync {
    fn is_ready(&self) -> bool;

    /// Run trusted plumbing code, outside of any capture or sandbox.
    fn run_sync(&self, source: &str) -> Result<(), ScriptError>;

    async fn run_async(&self, source: &str, origin: CodeOrigin) -> Result<(), ScriptError>;

    fn capabilities(&self) -> Arc<dyn CapabilityTable>;

    /// Redirect stdout into a fresh buffer.
    fn begin_capture(&self);

    /// Restore stdout and return everything written since `begin_capture`.
    fn end_capture(&self) -> String;

    async fn install_module(&self, name: &str) -> anyhow::Result<()>;

    fn install_archive(&self, name: &str, archive: &[u8]) -> anyhow::Result<()>;

    fn check_console_source(&self, source: &str) -> ConsoleCheck;
}

/// Where feedback ends up: a terminal next to the editor, or nothing.
pub trait FeedbackSink: Send + Sync {
    fn emit(&self, feedback: &Feedback);

    fn is_interactive(&self) -> bool;

    /// Last-resort channel for environment failures when nothing is
    /// interactive.
    fn alert(&self, message: &str);
}

pub trait ModuleResolver: Send + Sync {
    /// Root package names imported by `code`.
    fn find_imports(&self, code: &str) -> Vec<String>;

    fn loaded_modules(&self) -> BTreeSet<String>;
}

#[async_trait]
pub trait ArchiveFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> anyhow::Result<Vec<u8>>;
}

/// Collaborators shared by every run on one page.
#[derive(Clone)]
pub struct Runtime {
    pub interpreter: Arc<dyn Interpreter>,
    pub resolver: Arc<dyn ModuleResolver>,
    pub fetcher: Arc<dyn ArchiveFetcher>,
    pub sink: Arc<dyn FeedbackSink>,
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("ready", &self.interpreter.is_ready())
            .field("interactive", &self.sink.is_interactive())
            .finish_non_exhaustive()
    }
}
