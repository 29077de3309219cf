use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use omics_db::app::{App, ProgressSinkKind};
use omics_db::config::ConfigLoader;
use omics_db::domain::SourceKind;
use omics_db::error::OmicsError;
use omics_db::ingest::{AnnotationArityPolicy, LoadOptions};
use omics_db::output::{JsonOutput, OutputMode, TextOutput};
use omics_db::query::{CannedQuery, QueryParams};
use omics_db::store::Database;

#[derive(Parser)]
#[command(name = "omics-db")]
#[command(about = "Load and query a multi-omics cohort database (SQLite)")]
#[command(version, author)]
struct Cli {
    /// Print results as JSON and suppress progress output
    #[arg(long, global = true)]
    non_interactive: bool,

    /// SQLite database file
    #[arg(long, global = true, default_value = "omics.db")]
    db: Utf8PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Create the schema if it does not exist")]
    Create,
    #[command(about = "Load all source files in one transaction")]
    Load(LoadArgs),
    #[command(about = "Run one of the canned queries (1-9)")]
    Query(QueryArgs),
    #[command(about = "List tables and row counts")]
    Tables,
}

#[derive(Args)]
struct LoadArgs {
    #[arg(long)]
    config: Option<String>,

    /// Directory the source file names are resolved against
    #[arg(long)]
    data_dir: Option<String>,

    /// Load only these sources (repeatable); defaults to all five
    #[arg(long = "only", value_enum)]
    only: Vec<SourceKind>,

    #[arg(long, value_enum)]
    annotation_arity: Option<AnnotationArityPolicy>,
}

#[derive(Args)]
struct QueryArgs {
    number: u8,

    /// Subject for queries 3 and 8
    #[arg(long)]
    subject: Option<String>,

    /// Transcript for query 8
    #[arg(long)]
    transcript: Option<String>,

    /// Peak for query 5 (repeatable)
    #[arg(long = "peak")]
    peaks: Vec<String>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<OmicsError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &OmicsError) -> u8 {
    match error {
        OmicsError::MissingConfig(_)
        | OmicsError::ConfigRead(_)
        | OmicsError::ConfigParse(_)
        | OmicsError::MissingInput(_)
        | OmicsError::UnknownQuery(_) => 2,
        OmicsError::Storage(_) => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };

    let database = Database::open(&cli.db)?;
    let app = App::new(database, cli.db.to_string());

    match cli.command {
        Commands::Create => run_create(app, output_mode),
        Commands::Load(args) => run_load(args, app, output_mode),
        Commands::Query(args) => run_query(args, app, output_mode),
        Commands::Tables => run_tables(app, output_mode),
    }
}

fn run_create(app: App, output_mode: OutputMode) -> miette::Result<()> {
    match output_mode {
        OutputMode::NonInteractive => {
            let result = app.create(&JsonOutput)?;
            JsonOutput::print_create(&result).into_diagnostic()
        }
        OutputMode::Interactive => {
            let text = TextOutput::new(ProgressSinkKind::Create);
            let result = app.create(&text)?;
            text.print_create(&result).into_diagnostic()
        }
    }
}

fn run_load(args: LoadArgs, mut app: App, output_mode: OutputMode) -> miette::Result<()> {
    let config = ConfigLoader::resolve(args.config.as_deref(), args.data_dir.as_deref())?;
    let options = LoadOptions {
        sources: if args.only.is_empty() {
            SourceKind::LOAD_ORDER.to_vec()
        } else {
            SourceKind::LOAD_ORDER
                .into_iter()
                .filter(|source| args.only.contains(source))
                .collect()
        },
        annotation_arity: args.annotation_arity.unwrap_or(config.annotation_arity),
    };
    let sources = config.file_sources();

    match output_mode {
        OutputMode::NonInteractive => {
            let result = app.load(&sources, &options, &JsonOutput)?;
            JsonOutput::print_load(&result).into_diagnostic()
        }
        OutputMode::Interactive => {
            let text = TextOutput::new(ProgressSinkKind::Load);
            let result = app.load(&sources, &options, &text)?;
            text.print_load(&result).into_diagnostic()
        }
    }
}

fn run_query(args: QueryArgs, app: App, output_mode: OutputMode) -> miette::Result<()> {
    let query = CannedQuery::try_from(args.number)?;
    let params = QueryParams {
        subject: args.subject,
        transcript: args.transcript,
        peaks: args.peaks,
    };

    match output_mode {
        OutputMode::NonInteractive => {
            let result = app.query(query, &params, &JsonOutput)?;
            JsonOutput::print_query(&result).into_diagnostic()
        }
        OutputMode::Interactive => {
            let text = TextOutput::new(ProgressSinkKind::Query);
            let result = app.query(query, &params, &text)?;
            text.print_query(&result).into_diagnostic()
        }
    }
}

fn run_tables(app: App, output_mode: OutputMode) -> miette::Result<()> {
    match output_mode {
        OutputMode::NonInteractive => {
            let result = app.tables(&JsonOutput)?;
            JsonOutput::print_tables(&result).into_diagnostic()
        }
        OutputMode::Interactive => {
            let text = TextOutput::new(ProgressSinkKind::Tables);
            let result = app.tables(&text)?;
            text.print_tables(&result).into_diagnostic()
        }
    }
}
