use std::collections::BTreeMap;
use std::collections::BTreeSet;

use runlab_protocol::CodeOrigin;
use runlab_protocol::ExerciseData;
use runlab_protocol::RecursionLimit;

use crate::config::Settings;

/// How much of a failing run the user gets to see.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RunVisibility {
    /// Full traceback.
    #[default]
    Public,
    /// Only `Type: message`.
    Secret,
}

/// Options of a single run. Built through [`RunConfig::builder`] and never
/// mutated afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunConfig {
    forbidden: BTreeSet<String>,
    forbidden_methods: BTreeSet<String>,
    recursion_limit: RecursionLimit,
    with_stdout: bool,
    visibility: RunVisibility,
    auto_log_assert: bool,
    move_forward: bool,
    package_aliases: BTreeMap<String, String>,
    preload: Vec<String>,
    origin: CodeOrigin,
    prelude: Option<String>,
}

impl RunConfig {
    pub fn builder() -> RunConfigBuilder {
        RunConfigBuilder::default()
    }

    /// Public-run options of an exercise, with the site-wide aliases.
    pub fn for_exercise(data: &ExerciseData, settings: &Settings) -> RunConfigBuilder {
        Self::builder()
            .forbidden(data.excluded.iter().cloned())
            .forbidden_methods(data.excluded_methods.iter().cloned())
            .recursion_limit(data.rec_limit)
            .preload(data.white_list.iter().cloned())
            .package_aliases(settings.package_aliases.clone())
    }

    /// A builder pre-filled with this config, to derive a variant from it.
    pub fn to_builder(&self) -> RunConfigBuilder {
        RunConfigBuilder {
            config: self.clone(),
        }
    }

    pub fn forbidden(&self) -> &BTreeSet<String> {
        &self.forbidden
    }

    pub fn forbidden_methods(&self) -> &BTreeSet<String> {
        &self.forbidden_methods
    }

    pub fn recursion_limit(&self) -> RecursionLimit {
        self.recursion_limit
    }

    pub fn with_stdout(&self) -> bool {
        self.with_stdout
    }

    pub fn visibility(&self) -> RunVisibility {
        self.visibility
    }

    pub fn auto_log_assert(&self) -> bool {
        self.auto_log_assert
    }

    /// Test code may reach the builtins the sandbox shadows.
    pub fn move_forward(&self) -> bool {
        self.move_forward
    }

    pub fn package_aliases(&self) -> &BTreeMap<String, String> {
        &self.package_aliases
    }

    pub fn preload(&self) -> &[String] {
        &self.preload
    }

    pub fn origin(&self) -> CodeOrigin {
        self.origin
    }

    pub fn prelude(&self) -> Option<&str> {
        self.prelude.as_deref()
    }

    pub fn needs_sandbox(&self) -> bool {
        !self.forbidden.is_empty() || self.recursion_limit.is_limited()
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            forbidden: BTreeSet::new(),
            forbidden_methods: BTreeSet::new(),
            recursion_limit: RecursionLimit::Unlimited,
            with_stdout: true,
            visibility: RunVisibility::Public,
            auto_log_assert: true,
            move_forward: false,
            package_aliases: BTreeMap::new(),
            preload: Vec::new(),
            origin: CodeOrigin::Exec,
            prelude: None,
        }
    }
}

#[derive(Clone, Debug, Default)]
#[must_use]
pub struct RunConfigBuilder {
    config: RunConfig,
}

impl RunConfigBuilder {
    pub fn forbidden<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.forbidden = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn forbidden_methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.forbidden_methods = methods.into_iter().map(Into::into).collect();
        self
    }

    pub fn recursion_limit(mut self, limit: RecursionLimit) -> Self {
        self.config.recursion_limit = limit;
        self
    }

    pub fn with_stdout(mut self, with_stdout: bool) -> Self {
        self.config.with_stdout = with_stdout;
        self
    }

    pub fn visibility(mut self, visibility: RunVisibility) -> Self {
        self.config.visibility = visibility;
        self
    }

    pub fn auto_log_assert(mut self, auto_log_assert: bool) -> Self {
        self.config.auto_log_assert = auto_log_assert;
        self
    }

    /// Aliases are merged into the ones already set.
    pub fn move_forward(mut self, move_forward: bool) -> Self {
        self.config.move_forward = move_forward;
        self
    }

    pub fn package_aliases(mut self, aliases: BTreeMap<String, String>) -> Self {
        self.config.package_aliases.extend(aliases);
        self
    }

    pub fn preload<I, S>(mut self, modules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.preload = modules.into_iter().map(Into::into).collect();
        self
    }

    pub fn origin(mut self, origin: CodeOrigin) -> Self {
        self.config.origin = origin;
        self
    }

    /// Hidden source run ahead of the visible code, in the same unit.
    pub fn prelude(mut self, prelude: impl Into<String>) -> Self {
        self.config.prelude = Some(prelude.into());
        self
    }

    pub fn build(self) -> RunConfig {
        self.config
    }
}
