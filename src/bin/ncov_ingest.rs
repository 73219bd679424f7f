use std::io::Read;
use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use ncov_ingest::app::{App, NotifyRequest, ProgressSinkKind, check_annotations};
use ncov_ingest::config::{ConfigLoader, NotifyConfig, ResolvedConfig};
use ncov_ingest::error::IngestError;
use ncov_ingest::notify::SlackClient;
use ncov_ingest::output::{JsonOutput, LogSink};
use ncov_ingest::remote::{Location, RemoteFetcher};

#[derive(Parser)]
#[command(name = "ncov-ingest")]
#[command(about = "Curate GISAID SARS-CoV-2 submissions into Nextstrain metadata")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true, help = "Directory that default paths are resolved against")]
    base_dir: Option<String>,

    #[arg(
        long,
        global = true,
        help = "JSON config file (defaults to ncov-ingest.json in the base directory)",
    )]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Transform a GISAID NDJSON dump into sequences and metadata")]
    Transform(TransformArgs),
    #[command(about = "Validate a curator annotation file")]
    CheckAnnotations(CheckArgs),
    #[command(about = "Diff a previous metadata snapshot against the current one")]
    DiffMetadata(DiffArgs),
    #[command(about = "Write only the rows added since a previous snapshot")]
    AddedRows(DiffArgs),
    #[command(about = "Post a message or upload a file to Slack")]
    Notify(NotifyArgs),
}

#[derive(Args)]
struct TransformArgs {
    #[arg(long, help = "NDJSON input: local path, s3:// or http(s):// URL, optionally gzipped")]
    input: Option<String>,

    #[arg(long)]
    annotations: Option<String>,

    #[arg(long)]
    output_fasta: Option<String>,

    #[arg(long)]
    output_metadata: Option<String>,

    #[arg(long)]
    output_additional_info: Option<String>,

    #[arg(long)]
    min_length: Option<usize>,
}

#[derive(Args)]
struct CheckArgs {
    annotations: Option<String>,
}

#[derive(Args)]
struct DiffArgs {
    #[arg(long, help = "Previous snapshot: local path, s3:// or http(s):// URL")]
    previous: String,

    #[arg(long, help = "Current metadata TSV (defaults to the transform output)")]
    current: Option<String>,

    #[arg(long, help = "Column that identifies a row in both snapshots")]
    key: Option<String>,

    #[arg(long)]
    output: Option<String>,

    #[arg(long, help = "Upload the result to Slack when it is not empty")]
    notify: bool,
}

#[derive(Args)]
struct NotifyArgs {
    #[arg(
        long,
        conflicts_with = "file",
        help = "Message text; read from stdin when neither --text nor --file is given",
    )]
    text: Option<String>,

    #[arg(long)]
    file: Option<String>,

    #[arg(long, requires = "file")]
    title: Option<String>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<IngestError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &IngestError) -> u8 {
    match error {
        IngestError::MalformedAnnotation { .. }
        | IngestError::DuplicateAnnotations(_)
        | IngestError::InvalidAnnotations(_) => 2,
        IngestError::MissingTool(_)
        | IngestError::ToolFailed(_)
        | IngestError::DownloadHttp(_)
        | IngestError::DownloadStatus { .. }
        | IngestError::NotifyHttp(_)
        | IngestError::NotifyRejected(_) => 3,
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
    let base_dir = match cli.base_dir {
        Some(dir) => Utf8PathBuf::from(dir),
        None => {
            let cwd = std::env::current_dir().into_diagnostic()?;
            Utf8PathBuf::from_path_buf(cwd)
                .map_err(|_| IngestError::Filesystem("invalid working directory".to_string()))?
        }
    };
    let config = ConfigLoader::resolve(&base_dir, cli.config.as_deref())?;

    match cli.command {
        Commands::Transform(args) => run_transform(args, config),
        Commands::CheckAnnotations(args) => run_check(args, &config),
        Commands::DiffMetadata(args) => run_diff(args, &config, false),
        Commands::AddedRows(args) => run_diff(args, &config, true),
        Commands::Notify(args) => run_notify(args),
    }
}

fn rooted(config: &ResolvedConfig, value: &str) -> Utf8PathBuf {
    let path = Utf8PathBuf::from(value);
    if path.is_relative() {
        config.base_dir.join(path)
    } else {
        path
    }
}

fn notifier(enabled: bool) -> Result<Option<SlackClient>, IngestError> {
    if !enabled {
        return Ok(None);
    }
    let config = NotifyConfig::from_env()?;
    Ok(Some(SlackClient::new(&config)?))
}

fn run_transform(args: TransformArgs, mut config: ResolvedConfig) -> miette::Result<()> {
    if let Some(input) = args.input.as_deref() {
        config.paths.input = input.parse::<Location>()?.rooted_at(&config.base_dir);
    }
    if let Some(path) = args.annotations.as_deref() {
        config.paths.annotations = rooted(&config, path);
    }
    if let Some(path) = args.output_fasta.as_deref() {
        config.paths.sequences = rooted(&config, path);
    }
    if let Some(path) = args.output_metadata.as_deref() {
        config.paths.metadata = rooted(&config, path);
    }
    if let Some(path) = args.output_additional_info.as_deref() {
        config.paths.additional_info = rooted(&config, path);
    }
    if let Some(min_length) = args.min_length {
        config.min_length = min_length;
    }

    let app: App<RemoteFetcher, SlackClient> = App::new(RemoteFetcher::new()?, None);
    let result = app.transform(&config, &LogSink::new(ProgressSinkKind::Transform))?;
    JsonOutput::print_transform(&result).into_diagnostic()?;
    Ok(())
}

fn run_check(args: CheckArgs, config: &ResolvedConfig) -> miette::Result<()> {
    let path = match args.annotations.as_deref() {
        Some(path) => rooted(config, path),
        None => config.paths.annotations.clone(),
    };
    let result = check_annotations(path.as_std_path(), &LogSink::new(ProgressSinkKind::Check))?;
    JsonOutput::print_check(&result).into_diagnostic()?;
    Ok(())
}

fn run_diff(args: DiffArgs, config: &ResolvedConfig, added_only: bool) -> miette::Result<()> {
    let previous = args.previous.parse::<Location>()?.rooted_at(&config.base_dir);
    let current = match args.current.as_deref() {
        Some(path) => rooted(config, path),
        None => config.paths.metadata.clone(),
    };
    let key = args.key.unwrap_or_else(|| config.diff_key.clone());
    let app = App::new(RemoteFetcher::new()?, notifier(args.notify)?);
    let sink = LogSink::new(ProgressSinkKind::Diff);

    if added_only {
        let output = match args.output.as_deref() {
            Some(path) => rooted(config, path),
            None => config.paths.added_rows.clone(),
        };
        let result = app.added_rows(
            &previous,
            current.as_std_path(),
            &key,
            output.as_std_path(),
            args.notify,
            &sink,
        )?;
        JsonOutput::print_added_rows(&result).into_diagnostic()?;
    } else {
        let output = match args.output.as_deref() {
            Some(path) => rooted(config, path),
            None => config.paths.diff_report.clone(),
        };
        let result = app.diff(
            &previous,
            current.as_std_path(),
            &key,
            output.as_std_path(),
            args.notify,
            &sink,
        )?;
        JsonOutput::print_diff(&result).into_diagnostic()?;
    }
    Ok(())
}

fn run_notify(args: NotifyArgs) -> miette::Result<()> {
    let request = match (args.text, args.file) {
        (Some(text), _) => NotifyRequest::Message(text),
        (None, Some(path)) => NotifyRequest::File {
            path,
            title: args.title,
        },
        (None, None) => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .into_diagnostic()?;
            if text.trim().is_empty() {
                return Err(miette::Report::msg(
                    "nothing to send (pass --text, --file or pipe a message on stdin)",
                ));
            }
            NotifyRequest::Message(text)
        }
    };
    let app = App::new(RemoteFetcher::new()?, notifier(true)?);
    let result = app.notify(request, &LogSink::new(ProgressSinkKind::Notify))?;
    JsonOutput::print_notify(&result).into_diagnostic()?;
    Ok(())
}
