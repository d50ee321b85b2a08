//! # Capability sandbox
//!
//! For the duration of one run, forbidden builtins are shadowed in the global
//! namespace by guards that fail when called, imports go through a guard that
//! rejects forbidden packages, and the recursion limit is pinned. Runs of test
//! code also get [`MOVE_FORWARD_CAPABILITY`], which calls the original of a
//! shadowed builtin.
//!
//! Restoration first checks that every guard is still bound to its name. If
//! user code deleted or rebound one, nothing is restored: the run is reported
//! as an integrity failure and the interpreter keeps its guards.

mod guard;
mod method_scan;

use std::collections::BTreeMap;
use std::sync::Arc;

use runlab_protocol::RecursionLimit;
use tracing::debug;
use tracing::error;

use crate::error::SandboxError;
use crate::interpreter::CapabilityHandle;
use crate::interpreter::CapabilityTable;
use crate::interpreter::ImportHookHandle;
use crate::interpreter::same_capability;
use crate::run_config::RunConfig;

pub use method_scan::scan_forbidden_methods;

use guard::ExclusionGuard;
use guard::ImportGuard;
use guard::MoveForward;

/// Recursion limit restored after a limited run.
pub const DEFAULT_RECURSION_LIMIT: u32 = 1000;

pub const RECURSION_LIMIT_CAPABILITY: &str = "setrecursionlimit";

/// Global bound for test code only, see [`RunConfig::move_forward`].
pub const MOVE_FORWARD_CAPABILITY: &str = "__move_forward__";

#[derive(Clone, Debug)]
pub struct CapabilitySandbox {
    marker: String,
}

impl CapabilitySandbox {
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
        }
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }

    pub fn activate(&self, table: &dyn CapabilityTable, config: &RunConfig) -> SandboxWindow {
        let mut ledger = BTreeMap::new();
        for name in config.forbidden() {
            ledger.insert(name.clone(), self.shadow(table, name));
        }

        let original_hook = table.import_hook();
        table.set_import_hook(Arc::new(ImportGuard::new(
            config.forbidden().clone(),
            &self.marker,
            Arc::clone(&original_hook),
        )));

        let recursion_limited = match config.recursion_limit() {
            RecursionLimit::Depth(depth) => {
                table.set_recursion_limit(depth);
                if !ledger.contains_key(RECURSION_LIMIT_CAPABILITY) {
                    let entry = self.shadow(table, RECURSION_LIMIT_CAPABILITY);
                    ledger.insert(RECURSION_LIMIT_CAPABILITY.to_string(), entry);
                }
                true
            }
            RecursionLimit::Unlimited => false,
        };

        let move_forward = config
            .move_forward()
            .then(|| Self::bind_move_forward(table, &ledger));

        debug!(
            forbidden = config.forbidden().len(),
            recursion_limited,
            move_forward = move_forward.is_some(),
            "capability sandbox activated"
        );
        SandboxWindow {
            ledger,
            move_forward,
            original_hook,
            recursion_limited,
        }
    }

    fn bind_move_forward(
        table: &dyn CapabilityTable,
        ledger: &BTreeMap<String, LedgerEntry>,
    ) -> LedgerEntry {
        let originals = ledger
            .iter()
            .filter_map(|(name, entry)| {
                let original = entry.original.as_ref()?;
                Some((name.clone(), Arc::clone(original)))
            })
            .collect();
        let capability: CapabilityHandle = Arc::new(MoveForward::new(originals));
        let entry = LedgerEntry {
            original: None,
            previous_global: table.global(MOVE_FORWARD_CAPABILITY),
            guard: Some(Arc::clone(&capability)),
        };
        table.bind_global(MOVE_FORWARD_CAPABILITY, capability);
        entry
    }

    /// Bind a guard over `name` when it is a builtin. Module names only go
    /// through the import guard.
    fn shadow(&self, table: &dyn CapabilityTable, name: &str) -> LedgerEntry {
        let original = table.builtin(name);
        let previous_global = table.global(name);
        let guard = original.as_ref().map(|_| {
            let guard: CapabilityHandle = Arc::new(ExclusionGuard::new(name, &self.marker));
            table.bind_global(name, Arc::clone(&guard));
            guard
        });
        LedgerEntry {
            original,
            previous_global,
            guard,
        }
    }
}

struct LedgerEntry {
    original: Option<CapabilityHandle>,
    previous_global: Option<CapabilityHandle>,
    guard: Option<CapabilityHandle>,
}

/// An active sandbox. Must be handed back through
/// [`SandboxWindow::deactivate`] once the run is over.
#[must_use]
pub struct SandboxWindow {
    ledger: BTreeMap<String, LedgerEntry>,
    move_forward: Option<LedgerEntry>,
    original_hook: ImportHookHandle,
    recursion_limited: bool,
}

impl SandboxWindow {
    /// Names currently shadowed by a guard.
    pub fn guarded(&self) -> Vec<&str> {
        self.ledger
            .iter()
            .filter(|(_, entry)| entry.guard.is_some())
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Forbidden names that are not builtins (module names).
    pub fn module_names(&self) -> Vec<&str> {
        self.ledger
            .iter()
            .filter(|(_, entry)| entry.original.is_none())
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn deactivate(self, table: &dyn CapabilityTable) -> Result<(), SandboxError> {
        if self.recursion_limited {
            table.set_recursion_limit(DEFAULT_RECURSION_LIMIT);
        }

        if let Some(capability) = self.tampered(table) {
            error!(capability, "sandbox guard was rebound by user code");
            return Err(SandboxError::Integrity {
                capability: capability.to_string(),
            });
        }

        table.set_import_hook(Arc::clone(&self.original_hook));
        for (name, entry) in self.entries() {
            if entry.guard.is_none() {
                continue;
            }
            match &entry.previous_global {
                Some(previous) => table.bind_global(name, Arc::clone(previous)),
                None => table.unbind_global(name),
            }
        }
        debug!(restored = self.ledger.len(), "capability sandbox deactivated");
        Ok(())
    }

    /// Every binding the window installed, forbidden names first.
    fn entries(&self) -> impl Iterator<Item = (&str, &LedgerEntry)> {
        self.ledger
            .iter()
            .map(|(name, entry)| (name.as_str(), entry))
            .chain(
                self.move_forward
                    .iter()
                    .map(|entry| (MOVE_FORWARD_CAPABILITY, entry)),
            )
    }

    fn tampered(&self, table: &dyn CapabilityTable) -> Option<&str> {
        self.entries().find_map(|(name, entry)| {
            let guard = entry.guard.as_ref()?;
            let intact = table
                .global(name)
                .is_some_and(|bound| same_capability(&bound, guard));
            (!intact).then_some(name)
        })
    }
}
