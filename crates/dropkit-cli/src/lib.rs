use anyhow::{bail, Context};
use dropkit_core::models::{ActionKind, ActionPreset, RunSnapshot};
use dropkit_core::{ConversionTarget, FileFormat};
use serde::Serialize;
use std::path::Path;

/// Initialize tracing for the CLI binary.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Parse a `NAME=TARGET` pair as given to `--convert`.
pub fn parse_conversion(arg: &str) -> anyhow::Result<(String, ConversionTarget)> {
    let Some((name, target)) = arg.rsplit_once('=') else {
        bail!("Expected NAME=TARGET, got '{}'", arg);
    };
    let name = name.trim();
    if name.is_empty() {
        bail!("Missing file name in '{}'", arg);
    }
    let target = target
        .parse::<ConversionTarget>()
        .with_context(|| format!("Invalid conversion target in '{}'", arg))?;
    Ok((name.to_string(), target))
}

/// Read an action preset from a JSON file.
pub fn load_preset(path: &Path) -> anyhow::Result<ActionPreset> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read preset: {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid preset: {}", path.display()))
}

#[derive(Debug, Serialize)]
pub struct FormatRow {
    pub format: FileFormat,
    pub extensions: &'static [&'static str],
    pub targets: Vec<ConversionTarget>,
}

pub const FORMATS: [FileFormat; 5] = [
    FileFormat::Document,
    FileFormat::Pdf,
    FileFormat::Spreadsheet,
    FileFormat::Image,
    FileFormat::Other,
];

/// The conversion compatibility table.
pub fn format_rows() -> Vec<FormatRow> {
    FORMATS
        .iter()
        .map(|&format| FormatRow {
            format,
            extensions: match format {
                FileFormat::Document => &["docx", "doc"],
                FileFormat::Pdf => &["pdf"],
                FileFormat::Spreadsheet => &["xls", "xlsx"],
                FileFormat::Image => &["png", "jpg", "jpeg", "gif"],
                FileFormat::Other => &[],
            },
            targets: format.supported_targets().to_vec(),
        })
        .collect()
}

/// Plain-text rendering of [`format_rows`].
pub fn render_formats() -> String {
    let mut out = format!("{:<12} {:<20} {}\n", "FORMAT", "EXTENSIONS", "TARGETS");
    for row in format_rows() {
        let extensions = if row.extensions.is_empty() {
            "*".to_string()
        } else {
            row.extensions.join(", ")
        };
        let targets: Vec<String> = row.targets.iter().map(|t| t.to_string()).collect();
        out.push_str(&format!(
            "{:<12} {:<20} {}\n",
            row.format.to_string(),
            extensions,
            targets.join(", ")
        ));
    }
    out
}

pub fn action_kinds() -> Vec<String> {
    ActionKind::ALL.iter().map(|k| k.to_string()).collect()
}

/// One progress line, e.g. `[ 42%] Processing photo.png (3 of 7)`.
pub fn progress_line(snapshot: &RunSnapshot) -> String {
    format!("[{:>3}%] {}", snapshot.overall_progress, snapshot.message)
}
