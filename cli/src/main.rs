//! AI-On CLI - runs one analysis per invocation and prints the result.
//!
//! ```text
//! alon <mode> <text...>
//!   -> AlonConfig::load() -> EngineConfig + API key
//!   -> Engine::start(mode, text)
//!   -> next_update() until the record is terminal
//!   -> render to stdout, exit 1 on an error record
//! ```
//!
//! Logs never go to stdout; they land in `~/.alon/logs/alon.log`.

mod render;

use std::{
    fs::{self, File, OpenOptions},
    path::PathBuf,
    process::ExitCode,
    sync::{Arc, Mutex},
};

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use alon_engine::{AlonConfig, Engine, EngineConfig};
use alon_providers::gemini::GeminiOracle;
use alon_types::{AnalysisMode, AnalysisRecord, LarkStepName, RequestStatus, StepStatus};

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (log_file, init_warnings) = open_log_file();

    if let Some((log_path, file)) = log_file {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .with(env_filter)
            .init();

        tracing::info!(path = %log_path.display(), "Logging initialized");
        for warning in init_warnings {
            tracing::warn!("{warning}");
        }
        return;
    }

    // stdout carries results; no log file means no logs.
    tracing_subscriber::registry().with(env_filter).init();
}

fn open_log_file() -> (Option<(PathBuf, File)>, Vec<String>) {
    let mut warnings = Vec::new();

    for candidate in log_file_candidates() {
        if let Some(parent) = candidate.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            warnings.push(format!(
                "Failed to create log dir {}: {e}",
                parent.display()
            ));
            continue;
        }

        match OpenOptions::new()
            .create(true)
            .append(true)
            .open(&candidate)
        {
            Ok(file) => return (Some((candidate, file)), warnings),
            Err(e) => {
                warnings.push(format!(
                    "Failed to open log file {}: {e}",
                    candidate.display()
                ));
            }
        }
    }

    (None, warnings)
}

fn log_file_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    // Primary: ~/.alon/logs/alon.log
    if let Some(config_path) = AlonConfig::path()
        && let Some(config_dir) = config_path.parent()
    {
        candidates.push(config_dir.join("logs").join("alon.log"));
    }

    // Fallback: ./.alon/logs/alon.log
    candidates.push(PathBuf::from(".alon").join("logs").join("alon.log"));

    candidates
}

#[derive(Debug, Parser)]
#[command(name = "alon", version)]
#[command(about = "Hallucination, logic, knowledge-graph and fact-check analysis of text")]
#[command(
    after_help = "Configuration is read from ~/.alon/config.toml. The API key falls back to \
                  GEMINI_API_KEY; ALON_MODEL overrides the model."
)]
struct Cli {
    /// Analysis to run: hallucination (combo), logical (lark), graph (kg) or fact (fact-check)
    #[arg(value_parser = parse_mode)]
    mode: AnalysisMode,
    /// Text to analyze; multiple words are joined with spaces
    #[arg(required = true, num_args = 1.., trailing_var_arg = true, allow_hyphen_values = true)]
    text: Vec<String>,
}

impl Cli {
    fn text(&self) -> Result<String> {
        let text = self.text.join(" ");
        if text.trim().is_empty() {
            bail!("no text given for {} analysis", self.mode.as_str());
        }
        Ok(text)
    }
}

fn parse_mode(raw: &str) -> Result<AnalysisMode, String> {
    AnalysisMode::parse(raw).ok_or_else(|| {
        let known: Vec<_> = AnalysisMode::all().iter().map(|m| m.as_str()).collect();
        format!("unknown mode '{raw}' (expected one of: {})", known.join(", "))
    })
}

fn resolve_config() -> Result<(EngineConfig, String)> {
    let config = AlonConfig::load()
        .context("loading configuration")?
        .unwrap_or_default();
    let engine_config = config.engine_config()?;
    let Some(api_key) = config.google_api_key() else {
        bail!(
            "no Gemini API key: set [api_keys].google in ~/.alon/config.toml or {}",
            alon_engine::API_KEY_ENV
        );
    };
    Ok((engine_config, api_key))
}

/// Print each lark step the first time it leaves `Pending`.
struct LarkProgress {
    printed: usize,
}

impl LarkProgress {
    fn observe(&mut self, record: &AnalysisRecord) {
        let AnalysisRecord::Logical(message) = record else {
            return;
        };
        for name in &LarkStepName::ALL[self.printed..] {
            if message.step(*name).status == StepStatus::Pending {
                break;
            }
            if let Some(text) = render::lark_step(message, *name) {
                print!("{text}");
            }
            self.printed += 1;
        }
    }
}

async fn run(mode: AnalysisMode, text: String) -> Result<ExitCode> {
    let (config, api_key) = resolve_config()?;
    tracing::info!(
        mode = mode.as_str(),
        model = config.settings.model(),
        "Starting analysis"
    );
    let oracle = GeminiOracle::new(api_key)?;
    let mut engine = Engine::new(Arc::new(oracle), config);

    let id = engine.start(mode, text);
    let mut progress = LarkProgress { printed: 0 };
    while let Some(changed) = engine.next_update().await {
        if changed != id {
            continue;
        }
        if let Some(record) = engine.record(id) {
            progress.observe(record);
        }
    }

    let Some(record) = engine.record(id) else {
        bail!("request {id} vanished from the result store");
    };
    print!("{}", render::record(record));
    if record.status() == RequestStatus::Complete {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing();

    let text = cli.text()?;
    run(cli.mode, text).await
}
