//! # CLI Module
//!
//! Command-line interface for the takeout organizer.
//!
//! ## Usage
//! ```bash
//! # Organize an export (asks for missing paths)
//! takeout-organize --source ./Takeout --output ./Output
//!
//! # Decide everything without writing
//! takeout-organize --source ./Takeout --output ./Output --dry-run
//!
//! # Only review capture dates for videos
//! takeout-organize --source ./Takeout --dates-only --only-exts .mp,.mov,.m4v
//! ```

mod prompt;

use clap::Parser;
use console::{style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use prompt::TerminalPrompt;
use std::path::PathBuf;
use std::thread;
use takeout_organizer::core::exiftool::ToolCapability;
use takeout_organizer::core::pipeline::{Organizer, OrganizerReport};
use takeout_organizer::core::prompt::Prompt;
use takeout_organizer::core::scanner::parse_extension_list;
use takeout_organizer::error::{DateError, OrganizerError, Result};
use takeout_organizer::events::{
    DateEvent, Event, EventChannel, EventReceiver, HashEvent, OutputEvent, PipelineEvent,
    ScanEvent,
};

/// Takeout Organizer - Turn a photo export into a clean library
#[derive(Parser, Debug)]
#[command(name = "takeout-organize")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Root of the exported archive (asked for when omitted)
    #[arg(long)]
    source: Option<PathBuf>,

    /// Output folder (asked for when omitted, unused with --dates-only)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Print planned operations without copying files
    #[arg(long)]
    dry_run: bool,

    /// Print progress and file details
    #[arg(short, long)]
    verbose: bool,

    /// Only analyze dates (skip hashing, dedup, albums, output)
    #[arg(long)]
    dates_only: bool,

    /// Number of parallel copy workers
    #[arg(long, default_value = "4")]
    workers: usize,

    /// Batch size for exiftool metadata writes
    #[arg(long, default_value = "25")]
    exif_batch: usize,

    /// Comma-separated extensions to include (e.g. .mp,.mov,.m4v)
    #[arg(long)]
    only_exts: Option<String>,

    /// Folder for saved date patterns and exclusions
    #[arg(long)]
    state_dir: Option<PathBuf>,

    /// Hash cache file
    #[arg(long)]
    cache: Option<PathBuf>,

    /// Include hidden files
    #[arg(long)]
    include_hidden: bool,
}

/// Run the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    takeout_organizer::init_tracing(if cli.verbose {
        "takeout_organizer=debug"
    } else {
        "warn"
    });

    let term = Term::stdout();
    term.write_line(&format!(
        "{} {}",
        style("Takeout Organizer").bold().cyan(),
        style(concat!("v", env!("CARGO_PKG_VERSION"))).dim()
    ))
    .ok();
    term.write_line("").ok();

    let progress = ProgressBar::new(0);
    progress.set_style(
        ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░"),
    );
    let mut prompt = TerminalPrompt::new(progress.clone());

    let source = match cli.source {
        Some(source) => source,
        None => PathBuf::from(prompt.ask_path("Enter path to Takeout root", "./Takeout")?),
    };
    let output = match (cli.dates_only, cli.output) {
        (true, _) => None,
        (false, Some(output)) => Some(output),
        (false, None) => Some(PathBuf::from(
            prompt.ask_path("Enter output folder", "./Output")?,
        )),
    };
    let only_extensions = cli.only_exts.as_deref().and_then(parse_extension_list);
    let filtered = only_extensions.is_some();

    let tool = ToolCapability::probe();
    if !tool.available && !cli.dates_only && !cli.dry_run {
        prompt.show(&format!(
            "{} exiftool not found; copies will not carry recovered metadata.",
            style("!").yellow().bold()
        ));
    }

    let mut builder = Organizer::builder()
        .source(&source)
        .dry_run(cli.dry_run)
        .dates_only(cli.dates_only)
        .workers(cli.workers)
        .metadata_batch(cli.exif_batch)
        .only_extensions(only_extensions)
        .include_hidden(cli.include_hidden)
        .tool(tool);
    if let Some(output) = output {
        builder = builder.output(output);
    }
    if let Some(dir) = cli.state_dir {
        builder = builder.state_dir(dir);
    }
    if let Some(cache) = cli.cache {
        builder = builder.hash_cache_path(cache);
    }
    let mut organizer = builder.build();

    // Set up event handling
    let (sender, receiver) = EventChannel::new();
    let event_thread = spawn_progress(receiver, progress.clone(), cli.verbose);

    let result = organizer.run(&mut prompt, &sender);

    // Drop sender to signal event thread to finish
    drop(sender);
    event_thread.join().ok();
    progress.finish_and_clear();

    match result {
        Ok(report) => {
            print_report(&term, &report, filtered, cli.verbose);
            Ok(())
        }
        Err(OrganizerError::Date(DateError::NotConfirmed)) => {
            term.write_line(&format!(
                "{} Cancelled. No date changes were applied and nothing was copied.",
                style("✗").red().bold()
            ))
            .ok();
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// Drive the progress bar from pipeline events until the sender is dropped
fn spawn_progress(
    receiver: EventReceiver,
    progress: ProgressBar,
    verbose: bool,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        for event in receiver.iter() {
            match event {
                Event::Pipeline(PipelineEvent::PhaseChanged { phase }) => {
                    progress.set_length(0);
                    progress.set_position(0);
                    progress.set_message(phase.to_string());
                }
                Event::Scan(ScanEvent::MediaFound { .. }) => {
                    progress.inc_length(1);
                    progress.inc(1);
                }
                Event::Scan(ScanEvent::Error { path, message }) if verbose => {
                    progress.println(format!(
                        "{} {}: {}",
                        style("!").yellow(),
                        path.display(),
                        message
                    ));
                }
                Event::Hash(HashEvent::Started { total_files }) => {
                    progress.set_length(total_files as u64);
                }
                Event::Hash(HashEvent::Progress(p)) => {
                    progress.set_position(p.completed as u64);
                    if verbose {
                        progress.set_message(format!(
                            "{} (cache: {})",
                            p.current_path.file_name().unwrap_or_default().to_string_lossy(),
                            p.cache_hits
                        ));
                    }
                }
                Event::Hash(HashEvent::Error { path, message }) => {
                    progress.println(format!(
                        "{} {}: {}",
                        style("!").yellow(),
                        path.display(),
                        message
                    ));
                }
                Event::Dates(DateEvent::Started { total_records }) => {
                    progress.set_length(total_records as u64);
                    progress.set_position(0);
                }
                Event::Dates(DateEvent::Progress { completed, .. }) => {
                    progress.set_position(completed as u64);
                }
                Event::Output(OutputEvent::Started { total_records, .. }) => {
                    progress.set_length(total_records as u64);
                }
                Event::Output(OutputEvent::Progress(p)) => {
                    progress.set_position(p.completed as u64);
                    if verbose {
                        progress.set_message(format!("{}", p.destination.display()));
                    }
                }
                Event::Output(OutputEvent::MetadataBatch { failed, .. }) if failed > 0 => {
                    progress.println(format!(
                        "{} metadata write failed for {} file(s)",
                        style("!").yellow(),
                        failed
                    ));
                }
                Event::Pipeline(PipelineEvent::Completed { .. }) => {
                    progress.finish_and_clear();
                }
                Event::Pipeline(PipelineEvent::Error { .. }) => {
                    progress.abandon();
                }
                _ => {}
            }
        }
    })
}

fn print_report(term: &Term, report: &OrganizerReport, filtered: bool, verbose: bool) {
    term.write_line("").ok();

    if report.media_files == 0 {
        let message = if filtered {
            "No media files matched the requested extensions."
        } else {
            "No media files found."
        };
        term.write_line(&format!("{} {}", style("!").yellow().bold(), message))
            .ok();
        return;
    }

    term.write_line(&format!(
        "  {} media files{}",
        style(report.media_files).cyan(),
        if filtered { " (after extension filter)" } else { "" }
    ))
    .ok();
    if !report.scan_errors.is_empty() {
        term.write_line(&format!(
            "  {} entries could not be read",
            style(report.scan_errors.len()).yellow()
        ))
        .ok();
        if verbose {
            for error in &report.scan_errors {
                term.write_line(&format!("    {}", style(error).dim())).ok();
            }
        }
    }

    let dates = &report.dates;
    term.write_line(&format!(
        "  dates: {} sidecar, {} overrides, {} filename, {} embedded, {} unknown",
        style(dates.sidecar).cyan(),
        style(dates.overrides).cyan(),
        style(dates.filename_only).cyan(),
        style(dates.embedded_only).cyan(),
        style(dates.unknown).yellow()
    ))
    .ok();
    if report.patterns_added > 0 || report.exclusions_added > 0 {
        term.write_line(&format!(
            "  {} patterns and {} exclusions saved",
            style(report.patterns_added).cyan(),
            style(report.exclusions_added).cyan()
        ))
        .ok();
    }

    if report.dates_only {
        term.write_line("").ok();
        term.write_line(&format!(
            "{} Dates-only analysis complete.",
            style("✓").green().bold()
        ))
        .ok();
        return;
    }

    if let Some(stats) = &report.registry {
        term.write_line(&format!(
            "  {} unique records ({} hashed, {} from cache)",
            style(report.records.len()).cyan(),
            stats.hashed,
            stats.cache_hits
        ))
        .ok();
        if stats.hash_failures > 0 {
            term.write_line(&format!(
                "  {} files could not be hashed and were kept as-is",
                style(stats.hash_failures).yellow()
            ))
            .ok();
        }
    }

    if !report.albums.is_empty() {
        term.write_line("").ok();
        term.write_line(&format!("{}", style("Destinations:").bold().underlined()))
            .ok();
        for (album, count) in &report.albums {
            term.write_line(&format!("  {:<30} {}", album, style(count).cyan()))
                .ok();
        }
    }

    if let Some(output) = &report.output {
        term.write_line("").ok();
        let verb = if output.dry_run { "would be copied" } else { "copied" };
        term.write_line(&format!(
            "  {} files {} in {:.1}s",
            style(output.copied).cyan(),
            verb,
            output.duration_ms as f64 / 1000.0
        ))
        .ok();
        if verbose && output.dry_run {
            for planned in &output.planned {
                term.write_line(&format!(
                    "    {} -> {}",
                    style(planned.source.display()).dim(),
                    planned.destination.display()
                ))
                .ok();
            }
        }
        if output.metadata_written > 0 {
            term.write_line(&format!(
                "  {} files received metadata",
                style(output.metadata_written).cyan()
            ))
            .ok();
        }
        for (path, message) in &output.metadata_failures {
            term.write_line(&format!(
                "  {} metadata not written to {}: {}",
                style("!").yellow(),
                path.display(),
                message
            ))
            .ok();
        }

        term.write_line("").ok();
        let done = if output.dry_run {
            "Dry run complete."
        } else {
            "Done."
        };
        term.write_line(&format!("{} {}", style("✓").green().bold(), done))
            .ok();
    }
}
