//! dropkit: run an action pipeline over local files and save the bundle.
//!
//! Limits come from the DROPKIT_* environment variables (or a `.env` file).

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use dropkit_cli::{
    action_kinds, format_rows, init_tracing, load_preset, parse_conversion, progress_line,
    render_formats,
};
use dropkit_core::models::{ActionKind, IncomingFile, RunState};
use dropkit_core::PipelineConfig;
use dropkit_worker::{CancellationToken, DirectorySink, Pipeline, Session};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "dropkit", about = "Batch file conversion and bundling")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process files and write the resulting ZIP bundle
    Process {
        /// Files to process, in bundle order
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// JSON action preset
        #[arg(long)]
        preset: Option<PathBuf>,
        /// Append an action with its default options (e.g. file-renaming)
        #[arg(long = "action")]
        actions: Vec<String>,
        /// Per-file conversion, e.g. photo.png=webp
        #[arg(long = "convert", value_name = "NAME=TARGET")]
        conversions: Vec<String>,
        /// Directory the bundle is written to
        #[arg(long, default_value = ".")]
        out: PathBuf,
        /// Bundle file name (overrides DROPKIT_BUNDLE_NAME)
        #[arg(long)]
        bundle_name: Option<String>,
    },
    /// Print the conversion compatibility table
    Formats {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

async fn read_inputs(paths: &[PathBuf]) -> anyhow::Result<Vec<IncomingFile>> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .with_context(|| format!("Not a file: {}", path.display()))?;
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        files.push(IncomingFile::new(name, data));
    }
    Ok(files)
}

fn configure(
    session: &Session,
    preset: Option<PathBuf>,
    actions: &[String],
    conversions: &[String],
) -> anyhow::Result<()> {
    if let Some(path) = preset {
        let preset = load_preset(&path)?;
        session
            .load_preset(&preset)
            .with_context(|| format!("Failed to apply preset {}", path.display()))?;
    }

    for kind in actions {
        let kind: ActionKind = kind.parse().with_context(|| {
            format!(
                "Unknown action '{}' (expected one of: {})",
                kind,
                action_kinds().join(", ")
            )
        })?;
        session.add_action(kind)?;
    }

    for arg in conversions {
        let (name, target) = parse_conversion(arg)?;
        let entries = session.entries();
        let Some(entry) = entries.iter().find(|e| e.name() == name) else {
            bail!("No input file named '{}'", name);
        };
        session
            .set_conversion(entry.id(), Some(target))
            .with_context(|| format!("Cannot convert {} to {}", name, target))?;
    }
    Ok(())
}

async fn process(
    files: Vec<PathBuf>,
    preset: Option<PathBuf>,
    actions: Vec<String>,
    conversions: Vec<String>,
    out: PathBuf,
    bundle_name: Option<String>,
) -> anyhow::Result<()> {
    let mut config = PipelineConfig::from_env().context("Invalid DROPKIT_* configuration")?;
    if let Some(name) = bundle_name {
        config.bundle_name = if name.ends_with(".zip") {
            name
        } else {
            format!("{}.zip", name)
        };
        config.validate().context("Invalid --bundle-name")?;
    }

    let session = Session::new(config);
    session.add_files(read_inputs(&files).await?)?;
    configure(&session, preset, &actions, &conversions)?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, stopping after the current file");
                cancel.cancel();
            }
        });
    }

    let mut rx = session.subscribe();
    let printer = tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let snapshot = rx.borrow_and_update().clone();
            if snapshot.state.is_terminal() {
                break;
            }
            eprintln!("{}", progress_line(&snapshot));
        }
    });

    let sink = DirectorySink::new(out);
    let run = Pipeline::with_sink(Arc::new(sink.clone()))
        .run(&session, cancel)
        .await?;
    printer.abort();

    let summary = run.summary;
    match summary.state {
        RunState::Completed => {
            println!("{}", summary.describe());
            if let Some(name) = &summary.bundle_name {
                let path = sink.path_for(name);
                info!(path = %path.display(), "Bundle written");
                println!("Saved {}", path.display());
            }
            Ok(())
        }
        _ => bail!(summary.describe()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Process {
            files,
            preset,
            actions,
            conversions,
            out,
            bundle_name,
        } => process(files, preset, actions, conversions, out, bundle_name).await?,
        Commands::Formats { json } => {
            if json {
                let out = serde_json::to_string_pretty(&format_rows())
                    .context("Serialize format table")?;
                println!("{}", out);
            } else {
                print!("{}", render_formats());
            }
        }
    }

    Ok(())
}
