use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use doc_model::{HighlightStyle, Identifier, MatchReport, Worklist};
use pdf_engine::{annotate_with, AnnotateOptions, PdfDocument};
use serde::Serialize;
use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use storage::{Profile, Storage};
use tempfile::NamedTempFile;
use worklist::{read_table_file, MalformedPolicy, Table, WorklistBuilder};

#[derive(Debug, Parser)]
#[command(name = "uan-marker")]
#[command(about = "Highlight UAN and ESI numbers from a spreadsheet in PDF registers")]
pub struct Cli {
    /// Increase log output (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    /// Profile file to use instead of the per-user one.
    #[arg(long = "profile", value_name = "FILE", env = "UAN_MARKER_PROFILE", global = true)]
    profile_path: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Highlight one column's identifiers in a PDF.
    Mark {
        #[arg(value_name = "PDF")]
        file: PathBuf,
        #[command(flatten)]
        table: TableArgs,
        /// Column holding the identifiers. Defaults to the profile's UAN column.
        #[arg(long, value_name = "NAME")]
        column: Option<String>,
        #[arg(long, value_name = "PDF")]
        output: Option<PathBuf>,
        #[command(flatten)]
        worklist: WorklistArgs,
        #[command(flatten)]
        style: StyleArgs,
        #[arg(long)]
        json: bool,
    },
    /// Highlight UAN numbers in one PDF and ESI numbers in another.
    Run {
        #[command(flatten)]
        table: TableArgs,
        #[arg(long, value_name = "PDF")]
        uan_pdf: PathBuf,
        #[arg(long, value_name = "PDF")]
        esi_pdf: PathBuf,
        #[arg(long, value_name = "NAME")]
        uan_column: Option<String>,
        #[arg(long, value_name = "NAME")]
        esi_column: Option<String>,
        /// Directory for both outputs. Defaults to each input's directory.
        #[arg(long, value_name = "DIR")]
        out_dir: Option<PathBuf>,
        #[command(flatten)]
        worklist: WorklistArgs,
        #[command(flatten)]
        style: StyleArgs,
        #[arg(long)]
        json: bool,
    },
    /// Print the header row of a table as JSON.
    Columns {
        #[command(flatten)]
        table: TableArgs,
    },
    /// Print machine-readable PDF metadata.
    Info {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Inspect or change the stored profile.
    Profile {
        #[command(subcommand)]
        command: ProfileCommand,
    },
    /// Print CLI version.
    Version,
}

#[derive(Debug, Subcommand)]
enum ProfileCommand {
    /// Print the effective profile as JSON.
    Show,
    /// Print where the profile is stored.
    Path,
    /// Update stored values.
    Set {
        #[arg(long, value_name = "NAME")]
        uan_column: Option<String>,
        #[arg(long, value_name = "NAME")]
        esi_column: Option<String>,
        #[arg(long, value_name = "N")]
        skip_rows: Option<usize>,
        #[arg(long, value_name = "TEXT")]
        exempt_marker: Option<String>,
        #[arg(long, value_enum, value_name = "POLICY")]
        malformed: Option<PolicyArg>,
        #[command(flatten)]
        style: StyleArgs,
    },
    /// Delete the stored profile so defaults apply again.
    Reset,
}

#[derive(Debug, Args)]
struct TableArgs {
    /// Spreadsheet (.xlsx, .xls, .ods) or CSV file.
    #[arg(long, value_name = "FILE")]
    table: PathBuf,
    /// Rows above the header row.
    #[arg(long, value_name = "N")]
    skip_rows: Option<usize>,
}

#[derive(Debug, Args)]
struct WorklistArgs {
    /// Cell text marking a row with no identifier (case-insensitive).
    #[arg(long, value_name = "TEXT")]
    exempt_marker: Option<String>,
    /// Fail instead of skipping rows whose identifier is not a whole number.
    #[arg(long)]
    abort_on_malformed: bool,
}

#[derive(Debug, Args)]
struct StyleArgs {
    /// Highlight colour as RRGGBB hex.
    #[arg(long, value_name = "HEX")]
    color: Option<String>,
    #[arg(long, value_name = "0..1")]
    opacity: Option<f32>,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum PolicyArg {
    Skip,
    Abort,
}

impl From<PolicyArg> for MalformedPolicy {
    fn from(value: PolicyArg) -> Self {
        match value {
            PolicyArg::Skip => MalformedPolicy::Skip,
            PolicyArg::Abort => MalformedPolicy::Abort,
        }
    }
}

#[derive(Debug, Serialize)]
struct MarkOutput {
    input: String,
    output: String,
    column: String,
    identifiers: usize,
    report: MatchReport,
}

#[derive(Debug, Serialize)]
struct RunOutput {
    uan: MarkOutput,
    esi: MarkOutput,
}

#[derive(Debug, Serialize)]
struct ColumnsOutput {
    path: String,
    headers: Vec<String>,
}

#[derive(Debug, Serialize)]
struct InfoOutput {
    path: String,
    page_count: u32,
    first_page_size_pt: Option<PageSizeOutput>,
}

#[derive(Debug, Serialize)]
struct PageSizeOutput {
    width: f32,
    height: f32,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    init_logging(cli.verbose);
    let profile_path = cli.profile_path.as_deref();

    match cli.command {
        Commands::Mark { file, table, column, output, worklist, style, json } => {
            let profile = load_profile(profile_path)?;
            let column = column.unwrap_or_else(|| profile.uan_column.clone());
            let output = output.unwrap_or_else(|| default_output(&file, None));
            run_mark(&file, &table, &column, &output, &worklist, &style, json, &profile)
        }
        Commands::Run { table, uan_pdf, esi_pdf, uan_column, esi_column, out_dir, worklist, style, json } => {
            let profile = load_profile(profile_path)?;
            let jobs = [
                Job {
                    label: "UAN",
                    pdf: uan_pdf,
                    column: uan_column.unwrap_or_else(|| profile.uan_column.clone()),
                },
                Job {
                    label: "ESI",
                    pdf: esi_pdf,
                    column: esi_column.unwrap_or_else(|| profile.esi_column.clone()),
                },
            ];
            run_both(jobs, &table, out_dir.as_deref(), &worklist, &style, json, &profile)
        }
        Commands::Columns { table } => run_columns(&table, &load_profile(profile_path)?),
        Commands::Info { file } => run_info(&file),
        Commands::Profile { command } => run_profile(command, profile_path),
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        _ => log::LevelFilter::Debug,
    };

    let _ = env_logger::Builder::new().filter_level(level).parse_default_env().try_init();
}

fn storage(profile_path: Option<&Path>) -> Result<Storage> {
    match profile_path {
        Some(path) => Ok(Storage::at_path(path)),
        None => Storage::from_default_project().context("failed to locate profile directory"),
    }
}

fn load_profile(profile_path: Option<&Path>) -> Result<Profile> {
    let storage = storage(profile_path)?;
    storage
        .load_profile()
        .with_context(|| format!("failed to load profile {}", storage.profile_path().display()))
}

#[allow(clippy::too_many_arguments)]
fn run_mark(
    file: &Path,
    table_args: &TableArgs,
    column: &str,
    output: &Path,
    worklist_args: &WorklistArgs,
    style_args: &StyleArgs,
    json: bool,
    profile: &Profile,
) -> Result<()> {
    let table = load_table(table_args, profile)?;
    let worklist = worklist_builder(worklist_args, profile).build(&table, column)?;
    let options = AnnotateOptions { style: highlight_style(style_args, profile)? };

    let result = mark_pdf(file, column, &worklist, &options, output)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_summary(column, &result);
    }

    Ok(())
}

struct Job {
    label: &'static str,
    pdf: PathBuf,
    column: String,
}

fn run_both(
    jobs: [Job; 2],
    table_args: &TableArgs,
    out_dir: Option<&Path>,
    worklist_args: &WorklistArgs,
    style_args: &StyleArgs,
    json: bool,
    profile: &Profile,
) -> Result<()> {
    let table = load_table(table_args, profile)?;
    let columns = jobs.each_ref().map(|job| job.column.as_str());
    let worklists = worklist_builder(worklist_args, profile).build_all(&table, &columns)?;
    let options = AnnotateOptions { style: highlight_style(style_args, profile)? };

    let outputs = jobs.each_ref().map(|job| default_output(&job.pdf, out_dir));
    if same_path(&outputs[0], &outputs[1]) {
        anyhow::bail!("both runs would write to {}", outputs[0].display());
    }

    let mut results = Vec::with_capacity(2);
    for ((job, worklist), output) in jobs.iter().zip(&worklists).zip(&outputs) {
        log::info!("{} run: {} identifiers from column {:?}", job.label, worklist.len(), job.column);
        results.push(mark_pdf(&job.pdf, &job.column, worklist, &options, output)?);
    }

    let mut results = results.into_iter();
    let (Some(uan), Some(esi)) = (results.next(), results.next()) else {
        anyhow::bail!("expected two run results");
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&RunOutput { uan, esi })?);
    } else {
        print_summary(&jobs[0].column, &uan);
        print_summary(&jobs[1].column, &esi);
    }

    Ok(())
}

fn mark_pdf(
    file: &Path,
    column: &str,
    worklist: &Worklist,
    options: &AnnotateOptions,
    output: &Path,
) -> Result<MarkOutput> {
    ensure_pdf_exists(file)?;
    if same_path(output, file) {
        anyhow::bail!("output would overwrite the input PDF: {}", output.display());
    }

    let bytes = fs::read(file).with_context(|| format!("failed to read {}", file.display()))?;
    let annotated = annotate_with(&bytes, worklist, options)
        .with_context(|| format!("failed to process PDF {}", file.display()))?;

    write_atomically(output, &annotated.bytes)?;

    Ok(MarkOutput {
        input: file.display().to_string(),
        output: output.display().to_string(),
        column: column.to_owned(),
        identifiers: worklist.len(),
        report: annotated.report,
    })
}

fn load_table(args: &TableArgs, profile: &Profile) -> Result<Table> {
    let skip_rows = args.skip_rows.unwrap_or(profile.skip_rows);
    read_table_file(&args.table, skip_rows)
        .with_context(|| format!("failed to read table {}", args.table.display()))
}

fn worklist_builder(args: &WorklistArgs, profile: &Profile) -> WorklistBuilder {
    let policy = if args.abort_on_malformed { MalformedPolicy::Abort } else { profile.malformed };

    WorklistBuilder::new()
        .exempt_marker(args.exempt_marker.clone().unwrap_or_else(|| profile.exempt_marker.clone()))
        .policy(policy)
}

fn highlight_style(args: &StyleArgs, profile: &Profile) -> Result<HighlightStyle> {
    apply_style(profile.style, args)
}

fn apply_style(mut style: HighlightStyle, args: &StyleArgs) -> Result<HighlightStyle> {
    if let Some(color) = &args.color {
        style = style.with_hex_color(color)?;
    }
    if let Some(opacity) = args.opacity {
        style = style.with_opacity(opacity);
    }
    Ok(style)
}

/// Write to a temporary file beside `output`, then rename it into place.
fn write_atomically(output: &Path, bytes: &[u8]) -> Result<()> {
    let parent = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let mut file = NamedTempFile::new_in(parent)
        .with_context(|| format!("failed to create temporary file in {}", parent.display()))?;
    file.write_all(bytes)?;
    file.persist(output)
        .map_err(|err| err.error)
        .with_context(|| format!("failed to write {}", output.display()))?;

    Ok(())
}

fn print_summary(column: &str, result: &MarkOutput) {
    let report = &result.report;
    println!("{} ({column})", result.input);
    println!("  Total matches found: {}", report.total_matches);
    println!("  Found: {}", join_identifiers(&report.found));
    println!("  Not found: {}", join_identifiers(&report.not_found));
    println!("  Kept {} of {} pages", report.kept_pages.len(), report.page_count);
    println!("  Output: {}", result.output);
}

fn join_identifiers(identifiers: &[Identifier]) -> String {
    if identifiers.is_empty() {
        return "(none)".to_owned();
    }
    identifiers.iter().map(Identifier::as_str).collect::<Vec<_>>().join(", ")
}

fn run_columns(args: &TableArgs, profile: &Profile) -> Result<()> {
    let table = load_table(args, profile)?;
    let payload = ColumnsOutput { path: args.table.display().to_string(), headers: table.headers().to_vec() };

    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

fn run_info(file: &Path) -> Result<()> {
    ensure_pdf_exists(file)?;

    let document = PdfDocument::open(file).context("failed to open PDF")?;
    let page_count = document.page_count();
    let size = document.page_size(0)?;

    let payload = InfoOutput {
        path: file.display().to_string(),
        page_count,
        first_page_size_pt: Some(PageSizeOutput { width: size.width_pt, height: size.height_pt }),
    };

    let json = serde_json::to_string_pretty(&payload)?;
    println!("{json}");

    Ok(())
}

fn run_profile(command: ProfileCommand, profile_path: Option<&Path>) -> Result<()> {
    let storage = storage(profile_path)?;

    match command {
        ProfileCommand::Show => {
            let profile = load_profile(profile_path)?;
            println!("{}", serde_json::to_string_pretty(&profile)?);
        }
        ProfileCommand::Path => println!("{}", storage.profile_path().display()),
        ProfileCommand::Set { uan_column, esi_column, skip_rows, exempt_marker, malformed, style } => {
            let mut profile = load_profile(profile_path)?;
            if let Some(value) = uan_column {
                profile.uan_column = value;
            }
            if let Some(value) = esi_column {
                profile.esi_column = value;
            }
            if let Some(value) = skip_rows {
                profile.skip_rows = value;
            }
            if let Some(value) = exempt_marker {
                profile.exempt_marker = value;
            }
            if let Some(value) = malformed {
                profile.malformed = value.into();
            }
            profile.style = apply_style(profile.style, &style)?;

            storage
                .save_profile(&profile)
                .with_context(|| format!("failed to save profile {}", storage.profile_path().display()))?;
            println!("{}", storage.profile_path().display());
        }
        ProfileCommand::Reset => {
            if storage.reset_profile()? {
                println!("removed {}", storage.profile_path().display());
            } else {
                println!("no profile at {}", storage.profile_path().display());
            }
        }
    }

    Ok(())
}

fn ensure_pdf_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("file does not exist: {}", path.display());
    }

    if !path.is_file() {
        anyhow::bail!("path is not a file: {}", path.display());
    }

    Ok(())
}

/// Compare paths by location, not spelling. Missing trailing components are
/// joined onto the nearest ancestor that resolves.
fn same_path(left: &Path, right: &Path) -> bool {
    resolved_path(left) == resolved_path(right)
}

fn resolved_path(path: &Path) -> PathBuf {
    if let Ok(resolved) = fs::canonicalize(path) {
        return resolved;
    }

    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) if parent.as_os_str().is_empty() => resolved_path(Path::new(".")).join(name),
        (Some(parent), Some(name)) => resolved_path(parent).join(name),
        _ => path.to_path_buf(),
    }
}

fn default_output(file: &Path, out_dir: Option<&Path>) -> PathBuf {
    let stem = file.file_stem().and_then(|name| name.to_str()).unwrap_or("output");
    let name = format!("{stem}-highlighted.pdf");

    match out_dir {
        Some(dir) => dir.join(name),
        None => file.with_file_name(name),
    }
}
