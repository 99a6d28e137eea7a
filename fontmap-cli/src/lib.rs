//! fontmap CLI (made by FontLab https://www.fontlab.com/)

use std::env;
use std::ffi::OsString;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueHint};
use tracing::info;
use tracing_subscriber::EnvFilter;

use fontmap_core::catalog::Catalog;
use fontmap_core::error::FamilyIssue;
use fontmap_core::mapping::MappingStore;
use fontmap_core::names::FontFileNames;
use fontmap_core::output::{
    write_json_pretty, write_ndjson, write_summary, write_validation_log,
};
use fontmap_core::pipeline::{
    build_mappings, discover_families, observe_families, polyfill_store, prevalidate,
    validate_mappings, FamilyObservation, PipelineOptions,
};
use fontmap_core::polyfill::PolyfillChange;
use fontmap_core::prevalidate::{invalid_records, write_invalid_csv, ExcludedFamilies};
use fontmap_core::validate::{ValidationResult, ValidationSummary};

pub mod server;

/// Exit status of `validate` when any family is invalid or unmatched.
pub const EXIT_INVALID: u8 = 2;

/// CLI entrypoint for fontmap.
#[derive(Debug, Parser)]
#[command(
    name = "fontmap",
    about = "Map font binaries, METADATA.pb and a webfont catalog onto each other (made by FontLab https://www.fontlab.com/)"
)]
pub struct Cli {
    #[command(flatten)]
    paths: PathArgs,

    /// Worker threads for per-family stages
    #[arg(long = "jobs", short = 'J', global = true, value_parser = parse_jobs)]
    jobs: Option<usize>,

    /// Follow symlinks while walking the fonts directory
    #[arg(long = "follow-symlinks", global = true, action = ArgAction::SetTrue)]
    follow_symlinks: bool,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short = 'v', long = "verbose", global = true, action = ArgAction::SetTrue)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct PathArgs {
    /// Catalog JSON [env: FONTMAP_CATALOG] [default: webfonts.json]
    #[arg(long = "catalog", global = true, value_hint = ValueHint::FilePath)]
    catalog: Option<PathBuf>,

    /// Root holding the family folders [env: FONTMAP_FONTS_DIR] [default: fonts]
    #[arg(long = "fonts-dir", global = true, value_hint = ValueHint::DirPath)]
    fonts_dir: Option<PathBuf>,

    /// Invalid-family list
    #[arg(long = "invalid", global = true, default_value = "invalid.csv", value_hint = ValueHint::FilePath)]
    invalid: PathBuf,

    /// Mapping artifact [env: FONTMAP_MAPPING] [default: mapping.json]
    #[arg(long = "mapping", global = true, value_hint = ValueHint::FilePath)]
    mapping: Option<PathBuf>,

    /// Validation log
    #[arg(long = "log", global = true, default_value = "validation.log", value_hint = ValueHint::FilePath)]
    log: PathBuf,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Check every family folder and write the invalid-family list
    PreValidate,
    /// Build the mapping artifact from the font binaries
    Map(MapArgs),
    /// Repair an existing mapping artifact
    Polyfill(ReportArgs),
    /// Validate the mapping artifact against the font binaries
    Validate(ReportArgs),
    /// Serve the catalog and mapping over HTTP
    Serve(ServeArgs),
}

#[derive(Debug, Args)]
struct MapArgs {
    /// Polyfill before writing the artifact
    #[arg(long = "polyfill", action = ArgAction::SetTrue)]
    polyfill: bool,
}

#[derive(Debug, Args)]
struct ReportArgs {
    /// Emit a single JSON array on stdout
    #[arg(long = "json", action = ArgAction::SetTrue, conflicts_with = "ndjson")]
    json: bool,

    /// Emit newline-delimited JSON on stdout
    #[arg(long = "ndjson", action = ArgAction::SetTrue)]
    ndjson: bool,
}

#[derive(Debug, Args)]
struct ServeArgs {
    /// Address to listen on
    #[arg(long = "bind", default_value = "127.0.0.1:8765")]
    bind: String,
}

/// Paths after applying flags, environment and defaults.
///
/// Catalog, fonts directory and mapping also read `FONTMAP_*` variables, which
/// is convenient in CI where the same paths are shared by every step. Flags
/// still win over the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ResolvedPaths {
    catalog: PathBuf,
    fonts_dir: PathBuf,
    invalid: PathBuf,
    mapping: PathBuf,
    log: PathBuf,
}

impl PathArgs {
    fn resolve(&self, var: impl Fn(&str) -> Option<OsString>) -> ResolvedPaths {
        ResolvedPaths {
            catalog: pick_path(&self.catalog, var("FONTMAP_CATALOG"), "webfonts.json"),
            fonts_dir: pick_path(&self.fonts_dir, var("FONTMAP_FONTS_DIR"), "fonts"),
            invalid: self.invalid.clone(),
            mapping: pick_path(&self.mapping, var("FONTMAP_MAPPING"), "mapping.json"),
            log: self.log.clone(),
        }
    }
}

/// Flag, then a non-empty environment value, then the default.
fn pick_path(flag: &Option<PathBuf>, env_value: Option<OsString>, default: &str) -> PathBuf {
    flag.clone()
        .or_else(|| env_value.filter(|v| !v.is_empty()).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(default))
}

fn parse_jobs(raw: &str) -> std::result::Result<usize, String> {
    match raw.parse::<usize>() {
        Ok(0) => Err("jobs must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(err) => Err(err.to_string()),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    // a second init (tests) keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

/// Parse CLI args and execute the selected command.
///
/// The usual order is `pre-validate`, then `map --polyfill`, then `validate`.
/// Each command rereads what it needs from disk, so any step can be rerun on
/// its own after fixing a family folder.
pub fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let paths = cli.paths.resolve(|key| env::var_os(key));
    let opts = PipelineOptions {
        follow_symlinks: cli.follow_symlinks,
        jobs: cli.jobs,
    };

    match cli.command {
        Command::PreValidate => run_prevalidate(&paths, &opts),
        Command::Map(args) => run_map(&paths, &opts, &args),
        Command::Polyfill(args) => run_polyfill(&paths, &opts, &args),
        Command::Validate(args) => run_validate(&paths, &opts, &args),
        Command::Serve(args) => run_serve(&paths, &args),
    }
}

fn run_prevalidate(paths: &ResolvedPaths, opts: &PipelineOptions) -> Result<ExitCode> {
    let catalog = Catalog::load(&paths.catalog)?;
    let dirs = discover_families(&paths.fonts_dir, opts)?;
    let checks = prevalidate(&dirs, &catalog, opts)?;
    let records = invalid_records(&checks);

    write_invalid_csv(&paths.invalid, &records)?;

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    if records.is_empty() {
        writeln!(handle, "All families validated successfully!")?;
    } else {
        writeln!(handle, "Validation issues found:")?;
        for check in &checks {
            for issue in &check.issues {
                writeln!(handle, "[ERROR] {}: {issue}", check.folder)?;
            }
        }
        writeln!(
            handle,
            "\n{} invalid families reported at {}",
            records.len(),
            paths.invalid.display()
        )?;
    }
    write_prevalidation_summary(checks.len(), records.len(), &mut handle)?;
    Ok(ExitCode::SUCCESS)
}

fn write_prevalidation_summary(total: usize, invalid: usize, mut w: impl Write) -> Result<()> {
    writeln!(w, "\nPre-validation Summary:")?;
    writeln!(w, "Total families: {total}")?;
    writeln!(w, "Successfully validated: {}", total - invalid)?;
    writeln!(w, "Invalid families: {invalid}")?;
    Ok(())
}

/// Catalog, exclusions and observed names shared by the mapping commands.
fn observe(
    paths: &ResolvedPaths,
    opts: &PipelineOptions,
) -> Result<(Catalog, ExcludedFamilies, Vec<FamilyObservation>)> {
    let catalog = Catalog::load(&paths.catalog)?;
    let excluded = ExcludedFamilies::load(&paths.invalid)?;
    if !excluded.is_empty() {
        info!(count = excluded.len(), "excluding invalid families");
    }
    let dirs = discover_families(&paths.fonts_dir, opts)?;
    let observations = observe_families(&dirs, &excluded, &FontFileNames, opts)?;
    Ok((catalog, excluded, observations))
}

fn run_map(paths: &ResolvedPaths, opts: &PipelineOptions, args: &MapArgs) -> Result<ExitCode> {
    let (catalog, excluded, observations) = observe(paths, opts)?;
    let mut run = build_mappings(&observations, &catalog, opts)?;

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    write_issues(&run.issues, &mut handle)?;
    for (family, names) in &run.unresolved {
        let listed: Vec<&str> = names.iter().map(String::as_str).collect();
        writeln!(handle, "[UNRESOLVED] {family}: {}", listed.join(", "))?;
    }
    if args.polyfill {
        let changes = polyfill_store(&mut run.store, &observations, &excluded);
        write_changes(&changes, &mut handle)?;
    }

    run.store.save(&paths.mapping)?;
    writeln!(
        handle,
        "Mapped {} families to {}",
        run.store.len(),
        paths.mapping.display()
    )?;
    Ok(ExitCode::SUCCESS)
}

/// `[ERROR]` for issues that drop the family, `[WARN]` for the rest.
fn write_issues(issues: &[(String, FamilyIssue)], mut w: impl Write) -> Result<()> {
    for (folder, issue) in issues {
        let level = if issue.excludes_family() {
            "ERROR"
        } else {
            "WARN"
        };
        writeln!(w, "[{level}] {folder}: {issue}")?;
    }
    Ok(())
}

fn run_polyfill(
    paths: &ResolvedPaths,
    opts: &PipelineOptions,
    args: &ReportArgs,
) -> Result<ExitCode> {
    let mut store = MappingStore::load(&paths.mapping)?;
    let (_, excluded, observations) = observe(paths, opts)?;
    let changes = polyfill_store(&mut store, &observations, &excluded);
    store.save(&paths.mapping)?;

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    if args.ndjson {
        write_ndjson(&changes, &mut handle)?;
    } else if args.json {
        write_json_pretty(&changes, &mut handle)?;
    } else {
        write_changes(&changes, &mut handle)?;
    }
    Ok(ExitCode::SUCCESS)
}

fn write_changes(changes: &[PolyfillChange], mut w: impl Write) -> Result<()> {
    for change in changes {
        writeln!(w, "[POLYFILL] {change}")?;
    }
    writeln!(w, "Polyfilled {} names", changes.len())?;
    Ok(())
}

fn run_validate(
    paths: &ResolvedPaths,
    opts: &PipelineOptions,
    args: &ReportArgs,
) -> Result<ExitCode> {
    let store = MappingStore::load(&paths.mapping)?;
    let (_, _, observations) = observe(paths, opts)?;
    let results: Vec<ValidationResult> = validate_mappings(&observations, &store, opts)?
        .into_iter()
        .map(|v| v.result)
        .collect();
    let summary = ValidationSummary::from_results(&results);

    write_log(&paths.log, &results, &summary)?;

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    if args.ndjson || args.json {
        if args.ndjson {
            write_ndjson(&results, &mut handle)?;
        } else {
            write_json_pretty(&results, &mut handle)?;
        }
        // stdout stays machine-readable
        write_summary(&summary, io::stderr().lock())?;
    } else {
        write_summary(&summary, &mut handle)?;
    }

    if summary.all_valid() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(EXIT_INVALID))
    }
}

fn write_log(path: &Path, results: &[ValidationResult], summary: &ValidationSummary) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    write_validation_log(results, summary, &mut writer)?;
    writer
        .flush()
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

fn run_serve(paths: &ResolvedPaths, args: &ServeArgs) -> Result<ExitCode> {
    let state = server::AppState::load(&paths.catalog, &paths.mapping)?;
    let runtime = tokio::runtime::Runtime::new().context("starting tokio runtime")?;
    runtime.block_on(server::serve(&args.bind, state))?;
    Ok(ExitCode::SUCCESS)
}
