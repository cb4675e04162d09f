//! CLI binary for edgequake-export.
//!
//! A thin shim over the library crate that reads a JSON manifest, maps CLI
//! flags to `ExportConfig`, and runs one export per requested format.

use anyhow::{bail, Context, Result};
use clap::Parser;
use edgequake_export::{
    load_manifest, plan_export, ExportConfig, ExportContext, ExportController, ExportKind,
    ExportProgressCallback, ExportReport, FontFiles, Notice, NoticeSink, ProgressCallback,
    TriggerOutcome,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar per export job, plus a log line per
/// placed section.
struct CliProgressCallback {
    bar: Mutex<Option<ProgressBar>>,
    section_started: Mutex<Option<Instant>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            bar: Mutex::new(None),
            section_started: Mutex::new(None),
        })
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if let Ok(guard) = self.bar.lock() {
            if let Some(bar) = guard.as_ref() {
                f(bar);
            }
        }
    }

    fn take_bar(&self) -> Option<ProgressBar> {
        self.bar.lock().ok().and_then(|mut guard| guard.take())
    }
}

impl ExportProgressCallback for CliProgressCallback {
    fn on_export_start(&self, kind: ExportKind, total_sections: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} sections  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        let bar = ProgressBar::new(total_sections as u64);
        bar.set_style(style);
        bar.set_prefix(format!("{kind}"));
        bar.enable_steady_tick(Duration::from_millis(80));
        bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Exporting {total_sections} sections as {kind}…"))
        ));
        if let Ok(mut guard) = self.bar.lock() {
            *guard = Some(bar);
        }
    }

    fn on_section_start(&self, index: usize, _total: usize) {
        if let Ok(mut started) = self.section_started.lock() {
            *started = Some(Instant::now());
        }
        self.with_bar(|bar| bar.set_message(format!("section {}", index + 1)));
    }

    fn on_section_complete(&self, index: usize, total: usize, captured_px: (u32, u32)) {
        let elapsed_ms = self
            .section_started
            .lock()
            .ok()
            .and_then(|mut s| s.take())
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0);

        self.with_bar(|bar| {
            bar.println(format!(
                "  {} Section {:>3}/{:<3}  {:<12}  {}",
                green("✓"),
                index + 1,
                total,
                dim(&format!("{}×{} px", captured_px.0, captured_px.1)),
                dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
            ));
            bar.inc(1);
        });
    }

    fn on_export_complete(&self, kind: ExportKind, bytes: usize) {
        if let Some(bar) = self.take_bar() {
            bar.finish_and_clear();
        }
        eprintln!("{} {} assembled ({} bytes)", green("✔"), bold(&kind.to_string()), bytes);
    }

    fn on_export_failed(&self, kind: ExportKind, error: &str) {
        // The notice sink owns the visible message; the detail goes to the log.
        if let Some(bar) = self.take_bar() {
            bar.finish_and_clear();
        }
        tracing::debug!("{kind} export failed: {error}");
    }
}

/// Prints the operator notice.
struct CliNotices;

impl NoticeSink for CliNotices {
    fn notify(&self, notice: Notice) {
        eprintln!("{} {}", red("✘"), bold(notice.message()));
    }
}

const AFTER_HELP: &str = r##"EXAMPLES:
  # PDF into the current directory (presentation.pdf)
  sections2doc deck.json

  # Slide deck into ./out (out/presentation.pptx)
  sections2doc --format deck -o out deck.json

  # Both formats, give up if images take longer than 30s to settle
  sections2doc --format both --readiness-timeout 30 deck.json

  # Show per-section scale and placement without exporting
  sections2doc --inspect-only --format deck deck.json

  # Machine-readable report
  sections2doc --json deck.json > report.json

MANIFEST:
  {
    "title": "Spring launch",
    "origin": "https://example.com",
    "fonts": ["fonts/Inter.ttf"],
    "sections": [
      { "width": 1600, "height": 900, "background": "#0b1d3a",
        "layers": [{ "src": "hero.png", "x": 0, "y": 0 }] }
    ]
  }

  Relative paths resolve against the manifest's directory. A section
  without a usable width/height is captured at 1600×900.

OUTPUT GEOMETRY:
  PDF    20 × 11.25 in landscape pages, image flush top-left
  Deck   10 × 5.625 in (16:9) slides, image centered, 96 px/in
"##;

/// Export ordered content sections to a PDF or a slide deck.
#[derive(Parser, Debug)]
#[command(
    name = "sections2doc",
    version,
    about = "Export ordered content sections to a PDF or a 16:9 slide deck",
    long_about = "Rasterise each section of a JSON manifest and place it on its own page \
(20 × 11.25 in PDF) or slide (16:9 PPTX). Images are loaded from local paths or \
HTTP/HTTPS URLs and must settle before capture begins.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// JSON manifest describing the sections.
    manifest: PathBuf,

    /// Output format.
    #[arg(long, env = "SECTIONS2DOC_FORMAT", value_enum, default_value = "pdf")]
    format: FormatArg,

    /// Directory the artifact is written to.
    #[arg(short, long, env = "SECTIONS2DOC_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Fail if images have not settled after this many seconds (default: wait forever).
    #[arg(long, env = "SECTIONS2DOC_READINESS_TIMEOUT")]
    readiness_timeout: Option<u64>,

    /// HTTP download timeout per image, in seconds.
    #[arg(long, env = "SECTIONS2DOC_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Long edge of a capture in pixels (256–8192).
    #[arg(long, env = "SECTIONS2DOC_MAX_EDGE", default_value_t = 1600,
          value_parser = clap::value_parser!(u32).range(256..=8192))]
    max_edge: u32,

    /// JPEG quality for PDF pages (1–100).
    #[arg(long, env = "SECTIONS2DOC_JPEG_QUALITY", default_value_t = 92,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    jpeg_quality: u8,

    /// Document title; overrides the manifest's.
    #[arg(long, env = "SECTIONS2DOC_TITLE")]
    title: Option<String>,

    /// Origin the content is served from; overrides the manifest's.
    #[arg(long, env = "SECTIONS2DOC_ORIGIN")]
    origin: Option<String>,

    /// Print the per-section export plan only, no export.
    #[arg(long)]
    inspect_only: bool,

    /// Output structured JSON instead of human-readable text.
    #[arg(long, env = "SECTIONS2DOC_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "SECTIONS2DOC_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "SECTIONS2DOC_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "SECTIONS2DOC_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Pdf,
    Deck,
    Both,
}

impl FormatArg {
    fn kinds(self) -> Vec<ExportKind> {
        match self {
            FormatArg::Pdf => vec![ExportKind::Pdf],
            FormatArg::Deck => vec![ExportKind::Deck],
            FormatArg::Both => vec![ExportKind::Pdf, ExportKind::Deck],
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.inspect_only;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    // Failures reach the operator as a notice; the controller's own failure
    // log only shows with --verbose.
    let filter = if cli.verbose {
        filter.to_string()
    } else {
        format!("{filter},edgequake_export::controller=off")
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Load manifest ────────────────────────────────────────────────────
    let manifest = load_manifest(&cli.manifest)
        .await
        .with_context(|| format!("Failed to load manifest {}", cli.manifest.display()))?;

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ExportProgressCallback>)
    } else {
        None
    };

    let title = cli.title.clone().or_else(|| manifest.title.clone());
    let origin = cli.origin.clone().or_else(|| manifest.origin.clone());
    let config = build_config(&cli, title, origin, progress_cb)?;

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        print_plans(&cli, &manifest.sections, &config)?;
        return Ok(ExitCode::SUCCESS);
    }

    // ── Run exports ──────────────────────────────────────────────────────
    let fonts = FontFiles::new(manifest.fonts.clone());
    let ctx = ExportContext::new(config)
        .context("Failed to initialise export")?
        .with_fonts(Arc::new(fonts))
        .with_notices(Arc::new(CliNotices));
    let controller = ExportController::new(ctx);

    let mut reports: Vec<ExportReport> = Vec::new();
    for kind in cli.format.kinds() {
        match controller.trigger(kind, &manifest.sections).await {
            TriggerOutcome::Saved(report) => {
                if !cli.quiet && !cli.json {
                    eprintln!(
                        "{}  {} sections  {}ms  →  {}",
                        green("✔"),
                        report.sections,
                        report.total_duration_ms,
                        bold(&report.path.display().to_string()),
                    );
                    if report.failed_images > 0 {
                        eprintln!(
                            "   {} image(s) failed to load and were left blank",
                            cyan(&report.failed_images.to_string())
                        );
                    }
                }
                reports.push(report);
            }
            TriggerOutcome::Failed(e) => {
                // Already shown as a notice.
                tracing::debug!("{kind} export failed: {e:#}");
                return Ok(ExitCode::FAILURE);
            }
            TriggerOutcome::Dropped => bail!("{kind} export dropped: another export is running"),
        }
    }

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&reports).context("Failed to serialise report")?
        );
    }

    Ok(ExitCode::SUCCESS)
}

/// Map CLI args to `ExportConfig`.
fn build_config(
    cli: &Cli,
    title: Option<String>,
    origin: Option<String>,
    progress: Option<ProgressCallback>,
) -> Result<ExportConfig> {
    let mut builder = ExportConfig::builder()
        .output_dir(&cli.output_dir)
        .max_capture_edge(cli.max_edge)
        .jpeg_quality(cli.jpeg_quality)
        .download_timeout_secs(cli.download_timeout);

    if let Some(secs) = cli.readiness_timeout {
        builder = builder.readiness_timeout(Duration::from_secs(secs));
    }
    if let Some(title) = title {
        builder = builder.title(title);
    }
    if let Some(origin) = origin {
        builder = builder.document_origin(origin);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn print_plans(
    cli: &Cli,
    sections: &[edgequake_export::ContentSection],
    config: &ExportConfig,
) -> Result<()> {
    let plans: Vec<_> = cli
        .format
        .kinds()
        .into_iter()
        .map(|kind| (kind, plan_export(kind, sections, config)))
        .collect();

    if cli.json {
        let value: serde_json::Map<String, serde_json::Value> = plans
            .iter()
            .map(|(kind, plan)| Ok((kind.extension().to_string(), serde_json::to_value(plan)?)))
            .collect::<Result<_, serde_json::Error>>()
            .context("Failed to serialise plan")?;
        println!(
            "{}",
            serde_json::to_string_pretty(&value).context("Failed to serialise plan")?
        );
        return Ok(());
    }

    println!("Manifest:     {}", cli.manifest.display());
    println!("Sections:     {}", sections.len());
    for (kind, plan) in &plans {
        println!();
        println!("{} → {}", bold(&kind.to_string()), config.file_name(*kind));
        for p in plan {
            println!(
                "  {:>3}  {:>5}×{:<5} {}  scale {:.3}  → {:>4}×{:<4} px  at ({:.2}, {:.2}) {:.2}×{:.2} in",
                p.index + 1,
                p.size.0,
                p.size.1,
                if p.fallback { dim("(fallback)") } else { "          ".to_string() },
                p.scale,
                p.capture_px.0,
                p.capture_px.1,
                p.placement.x,
                p.placement.y,
                p.placement.width,
                p.placement.height,
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn long_help_keeps_manifest_colour_literal() {
        assert!(AFTER_HELP.contains(r##""background": "#0b1d3a""##));
        assert!(AFTER_HELP.trim_end().ends_with("96 px/in"));
    }

    #[test]
    fn failed_export_closes_the_bar_without_output() {
        let cb = CliProgressCallback::new();
        if let Ok(mut guard) = cb.bar.lock() {
            *guard = Some(ProgressBar::hidden());
        }
        cb.on_export_failed(ExportKind::Pdf, "capture failed for section 2");
        assert!(cb.take_bar().is_none());
    }

    #[test]
    fn both_formats_run_pdf_then_deck() {
        assert_eq!(FormatArg::Both.kinds(), vec![ExportKind::Pdf, ExportKind::Deck]);
    }
}
