//! Installs what a piece of code imports before it runs.
//!
//! Site libraries come as zip archives next to the site; everything else is
//! installed through the interpreter's package manager, under its alias when
//! one is configured. White-listed modules are imported up front, so they
//! stay usable once the sandbox forbids further imports.

use std::collections::BTreeSet;

use runlab_protocol::Feedback;
use tracing::debug;
use tracing::warn;

use crate::config::Settings;
use crate::interpreter::Runtime;
use crate::interpreter::ScriptError;
use crate::interpreter::ScriptErrorKind;
use crate::run_config::RunConfig;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InstallReport {
    pub archives: Vec<String>,
    pub installed: Vec<String>,
    pub pre_imports: Vec<String>,
}

impl InstallReport {
    pub fn is_empty(&self) -> bool {
        self.archives.is_empty() && self.installed.is_empty() && self.pre_imports.is_empty()
    }
}

pub async fn install_missing(
    runtime: &Runtime,
    settings: &Settings,
    code: &str,
    config: &RunConfig,
) -> Result<InstallReport, ScriptError> {
    let loaded = runtime.resolver.loaded_modules();
    let wanted = runtime.resolver.find_imports(code);
    let site_libs: BTreeSet<&str> = settings.site_libs.iter().map(String::as_str).collect();

    let archives: Vec<String> = wanted
        .iter()
        .filter(|name| site_libs.contains(name.as_str()) && !loaded.contains(*name))
        .cloned()
        .collect();
    let mut missing: Vec<String> = wanted
        .iter()
        .filter(|name| {
            !loaded.contains(*name)
                && !site_libs.contains(name.as_str())
                && !config.forbidden().contains(*name)
        })
        .cloned()
        .collect();
    let preload: Vec<String> = config
        .preload()
        .iter()
        .filter(|name| !loaded.contains(*name))
        .cloned()
        .collect();
    let mut pre_imports: Vec<String> = preload.iter().map(|name| format!("import {name}")).collect();
    missing.extend(preload);

    let mut report = InstallReport::default();
    if !missing.is_empty() || !archives.is_empty() {
        let messages = &settings.messages;
        runtime
            .sink
            .emit(&Feedback::user(messages.install_start.clone(), ""));

        for lib in archives {
            let url = settings.archive_url(&lib);
            let unpacked = runtime
                .fetcher
                .fetch(&url)
                .await
                .and_then(|bytes| runtime.interpreter.install_archive(&lib, &bytes));
            match unpacked {
                Ok(()) => report.archives.push(lib),
                Err(err) => warn!(lib = %lib, url = %url, "site library unavailable: {err:#}"),
            }
        }

        for name in missing {
            let package = match config.package_aliases().get(&name) {
                Some(alias) => {
                    pre_imports.push(format!("import {alias} as {name}"));
                    alias.clone()
                }
                None => name,
            };
            debug!(package = %package, "installing package");
            runtime
                .interpreter
                .install_module(&package)
                .await
                .map_err(|err| {
                    ScriptError::new(
                        ScriptErrorKind::Other,
                        "ModuleNotFoundError",
                        format!("No module named '{package}' ({err})"),
                    )
                })?;
            report.installed.push(package);
        }

        runtime
            .sink
            .emit(&Feedback::user(messages.install_done.clone(), ""));
    }

    if !pre_imports.is_empty() {
        runtime.interpreter.run_sync(&pre_imports.join("\n"))?;
    }
    report.pre_imports = pre_imports;
    Ok(report)
}
