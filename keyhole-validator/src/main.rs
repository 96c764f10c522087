mod reports;

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use std::fs::{self, File};
use std::io::{BufWriter, Write, stdout};
use std::path::{Path, PathBuf};
use std::time::Instant;

use keyhole_game::{ExperienceDoc, ValidationReport, ValidatorConfig, validate_document};

const DOCUMENT_FILE: &str = "experience.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Coloured human-readable summary
    Console,
    /// Machine-readable array of reports
    Json,
    /// Markdown suitable for CI summaries
    Markdown,
}

#[derive(Debug, Parser)]
#[command(name = "keyhole-validator", version)]
#[command(about = "Offline solvability validator for Keyhole puzzle experiences")]
struct Args {
    /// Experience ids (looked up under --experiences-dir) or paths to
    /// experience documents. Defaults to every bundled experience.
    experiences: Vec<String>,

    /// Directory holding one sub-directory per experience
    #[arg(long, default_value = "experiences")]
    experiences_dir: PathBuf,

    /// List all available experiences and exit
    #[arg(long)]
    list_experiences: bool,

    /// Output report format
    #[arg(long, value_enum, default_value_t = ReportFormat::Console)]
    report: ReportFormat,

    /// Optional path to write the report output instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,

    /// Override the derived reachability pass ceiling
    #[arg(long)]
    max_passes: Option<usize>,

    /// Include info findings and access paths in console output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if maybe_list_experiences(&args)? {
        return Ok(());
    }

    if args.report == ReportFormat::Console {
        announce_banner();
    }

    let start_time = Instant::now();
    let targets = resolve_targets(&args)?;
    let config = ValidatorConfig {
        max_passes: args.max_passes,
        ..ValidatorConfig::default()
    };

    let mut results = Vec::with_capacity(targets.len());
    for path in &targets {
        let doc = load_document(path)?;
        log::info!("validating '{}' from {}", doc.id, path.display());
        let report = validate_document(&doc, &config);
        log::info!("{}", report.summary());
        results.push(report);
    }

    write_reports(&args, &results, start_time)?;

    if results.iter().any(|r| !r.is_valid) {
        std::process::exit(1);
    }

    Ok(())
}

fn maybe_list_experiences(args: &Args) -> Result<bool> {
    if !args.list_experiences {
        return Ok(false);
    }
    let mut output_target = OutputTarget::new(args.output.clone())?;
    writeln!(output_target.writer(), "Available experiences:")?;
    for path in discover_experiences(&args.experiences_dir)? {
        let label = match load_document(&path) {
            Ok(doc) => format!("{:25} - {}", doc.id, doc.name),
            Err(err) => format!("{:25} - unreadable: {err:#}", path.display()),
        };
        writeln!(output_target.writer(), "  {label}")?;
    }
    output_target.flush_inner()?;
    Ok(true)
}

fn announce_banner() {
    println!("{}", "🔑 Keyhole Experience Validator".bright_cyan().bold());
    println!("{}", "===============================".cyan());
}

/// Every `<dir>/<id>/experience.json`, sorted by id.
fn discover_experiences(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries =
        fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))?;
    let mut found = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("failed to read {}", dir.display()))?;
        let candidate = entry.path().join(DOCUMENT_FILE);
        if candidate.is_file() {
            found.push(candidate);
        }
    }
    found.sort();
    Ok(found)
}

/// Map positional arguments to document paths.
///
/// An argument naming an existing file is used as is, a directory is
/// searched for its document, anything else is an id under the
/// experiences directory.
fn resolve_targets(args: &Args) -> Result<Vec<PathBuf>> {
    if args.experiences.is_empty() {
        let found = discover_experiences(&args.experiences_dir)?;
        if found.is_empty() {
            bail!(
                "no experiences found in {}",
                args.experiences_dir.display()
            );
        }
        return Ok(found);
    }

    args.experiences
        .iter()
        .map(|arg| {
            let as_path = PathBuf::from(arg);
            let path = if as_path.is_file() {
                as_path
            } else if as_path.is_dir() {
                as_path.join(DOCUMENT_FILE)
            } else {
                args.experiences_dir.join(arg).join(DOCUMENT_FILE)
            };
            if path.is_file() {
                Ok(path)
            } else {
                bail!(
                    "experience '{arg}' not found (looked for {})",
                    path.display()
                )
            }
        })
        .collect()
}

fn load_document(path: &Path) -> Result<ExperienceDoc> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    ExperienceDoc::from_json(&json).with_context(|| format!("failed to parse {}", path.display()))
}

fn write_reports(args: &Args, results: &[ValidationReport], start_time: Instant) -> Result<()> {
    let mut output_target = OutputTarget::new(args.output.clone())?;

    match args.report {
        ReportFormat::Json => reports::generate_json_report(&mut output_target, results)?,
        ReportFormat::Markdown => {
            if results.is_empty() {
                writeln!(
                    &mut output_target,
                    "# Keyhole Validation Report\n\n_No experiences validated._"
                )?;
            } else {
                reports::generate_markdown_report(&mut output_target, results)?;
            }
        }
        ReportFormat::Console => {
            if results.is_empty() {
                writeln!(&mut output_target, "No experiences validated.")?;
            } else {
                reports::generate_console_report(
                    &mut output_target,
                    results,
                    args.verbose,
                    start_time.elapsed(),
                )?;
            }
        }
    }

    output_target.flush_inner()?;
    Ok(())
}

enum OutputTarget {
    Stdout(BufWriter<std::io::Stdout>),
    File(BufWriter<File>),
}

impl OutputTarget {
    fn new(path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = path {
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Self::File(BufWriter::new(file)))
        } else {
            Ok(Self::Stdout(BufWriter::new(stdout())))
        }
    }

    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Self::Stdout(w) => w,
            Self::File(w) => w,
        }
    }

    fn flush_inner(&mut self) -> std::io::Result<()> {
        match self {
            Self::Stdout(w) => w.flush(),
            Self::File(w) => w.flush(),
        }
    }
}

impl Write for OutputTarget {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flush_inner()
    }
}
