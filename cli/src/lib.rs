//! Offline tooling around exercise payloads: decompress them, summarize a
//! catalog, and preview how feedback text gets shortened.

use std::fs;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use runlab_core::Settings;
use runlab_core::truncate::FeedbackFormatter;
use runlab_core::truncate::Profile;
use runlab_protocol::AttemptsLeft;
use runlab_protocol::ExerciseCatalog;
use runlab_protocol::decode_exercise_catalog;
use runlab_protocol::parse_exercise_catalog;
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Parser)]
#[command(name = "runlab", version, about = "Inspect runlab exercise payloads")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Decompress a payload and print the original text.
    Decode {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Summarize an exercise catalog as JSON.
    Inspect {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// The file holds plain JSON rather than a compressed payload.
        #[arg(long, default_value_t = false)]
        raw: bool,
    },
    /// Shorten a text the way feedback is shortened before display.
    Shorten {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        #[arg(long, value_enum)]
        profile: ProfileArg,

        /// Settings file overriding the default limits and marker.
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProfileArg {
    Stdout,
    Trace,
    Error,
}

impl From<ProfileArg> for Profile {
    fn from(value: ProfileArg) -> Self {
        match value {
            ProfileArg::Stdout => Profile::Stdout,
            ProfileArg::Trace => Profile::Trace,
            ProfileArg::Error => Profile::Error,
        }
    }
}

/// One line of `runlab inspect`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExerciseSummary {
    pub id: String,
    pub py_name: String,
    pub attempts_left: AttemptsLeft,
    pub reveals_solution: bool,
    pub reveals_remarks: bool,
    pub has_secret_tests: bool,
    pub has_check_btn: bool,
    pub excluded: Vec<String>,
    pub excluded_methods: Vec<String>,
}

pub fn summarize(catalog: &ExerciseCatalog) -> Vec<ExerciseSummary> {
    catalog
        .iter()
        .map(|(id, data)| ExerciseSummary {
            id: id.clone(),
            py_name: data.py_name.clone(),
            attempts_left: data.attempts_left,
            reveals_solution: data.corr_rems_mask.has_solution(),
            reveals_remarks: data.corr_rems_mask.has_remarks(),
            has_secret_tests: data.has_secret_tests(),
            has_check_btn: data.has_check_btn,
            excluded: data.excluded.clone(),
            excluded_methods: data.excluded_methods.clone(),
        })
        .collect()
}

pub fn run(cli: Cli, out: &mut impl Write) -> Result<()> {
    match cli.command {
        Command::Decode { file } => {
            let payload = read(&file)?;
            let text = runlab_payload_codec::decode(&payload)
                .with_context(|| format!("failed to decode {}", file.display()))?;
            out.write_all(text.as_bytes())?;
        }
        Command::Inspect { file, raw } => {
            let payload = read(&file)?;
            let catalog = if raw {
                parse_exercise_catalog(&payload)
            } else {
                decode_exercise_catalog(&payload)
            }
            .with_context(|| format!("invalid exercise catalog in {}", file.display()))?;
            debug!(exercises = catalog.len(), "catalog inspected");
            serde_json::to_writer_pretty(&mut *out, &summarize(&catalog))?;
            writeln!(out)?;
        }
        Command::Shorten {
            file,
            profile,
            config,
        } => {
            let settings = match config {
                Some(path) => Settings::load(&path)?,
                None => Settings::default(),
            };
            let text = read(&file)?;
            let formatter = FeedbackFormatter::new(&settings.feedback);
            out.write_all(formatter.shorten(&text, profile.into()).as_bytes())?;
        }
    }
    Ok(())
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}
