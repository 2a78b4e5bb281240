use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use miette::IntoDiagnostic;
use tracing::info;
use tracing_subscriber::EnvFilter;

use signal_table::config::{ConfigLoader, ResolvedConfig};
use signal_table::data_source::{ChangeKind, DEFAULT_MAX_ITEMS, DataSourceBuilder};
use signal_table::error::SignalTableError;
use signal_table::output::{JsonOutput, TableReport};
use signal_table::signal::Aggregate;
use signal_table::tracks::JsonTrackFactory;

#[derive(Parser)]
#[command(name = "signal-table")]
#[command(about = "Align genomic signal tracks over a range into one table")]
#[command(version)]
struct Cli {
    /// Track locators; when omitted they come from the config file
    tracks: Vec<String>,

    #[arg(long)]
    config: Option<String>,

    /// Location such as chr1:1000-100000
    #[arg(long)]
    location: Option<String>,

    #[arg(long)]
    relay: Option<String>,

    #[arg(long)]
    values_label: Option<String>,

    #[arg(long)]
    max_items: Option<usize>,

    #[arg(long)]
    aggregate: Option<Aggregate>,

    /// Include display boundaries from the track summaries
    #[arg(long)]
    bounds: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<SignalTableError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &SignalTableError) -> u8 {
    match error {
        SignalTableError::MissingConfig | SignalTableError::NoSources => 2,
        SignalTableError::SourceOpen { .. } | SignalTableError::Fetch { .. } => 3,
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
    let (resolved, base_dir) = resolve_settings(&cli)?;
    let location = resolved
        .location
        .clone()
        .ok_or_else(|| miette::Report::msg("location required (use --location or config)"))?;
    let factory = match base_dir {
        Some(dir) => JsonTrackFactory::with_base_dir(dir),
        None => JsonTrackFactory::new(),
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .into_diagnostic()?;

    runtime.block_on(async {
        let source = DataSourceBuilder::new(resolved.tracks.clone())
            .options(resolved.to_options())
            .subscribe(|event| match event.kind {
                ChangeKind::Changing => info!("loading tracks"),
                ChangeKind::Changed => info!(rows = ?event.source.row_count(), "table ready"),
            })
            .build(&factory)?;
        let source = source.ready().await?;

        let bounds = if cli.bounds {
            Some(source.value_bounds().await?)
        } else {
            None
        };
        let model = source
            .model()
            .ok_or_else(|| miette::Report::msg("data source settled without a model"))?;
        JsonOutput::print_table(&TableReport {
            range: &location,
            bounds,
            model: &model,
        })
        .into_diagnostic()
    })
}

fn resolve_settings(cli: &Cli) -> miette::Result<(ResolvedConfig, Option<String>)> {
    let (mut resolved, base_dir) = if cli.config.is_some() || cli.tracks.is_empty() {
        let resolved = ConfigLoader::resolve(cli.config.as_deref())?;
        let base_dir = cli
            .config
            .as_deref()
            .and_then(|path| Path::new(path).parent())
            .and_then(Path::to_str)
            .filter(|dir| !dir.is_empty())
            .map(str::to_string);
        (resolved, base_dir)
    } else {
        let resolved = ResolvedConfig {
            schema_version: 1,
            tracks: Vec::new(),
            relay: None,
            values_label: None,
            location: None,
            max_items: DEFAULT_MAX_ITEMS,
            aggregate: Aggregate::default(),
        };
        (resolved, None)
    };

    if !cli.tracks.is_empty() {
        resolved.tracks = cli.tracks.clone();
    }
    if let Some(location) = &cli.location {
        resolved.location = Some(location.parse()?);
    }
    if cli.relay.is_some() {
        resolved.relay = cli.relay.clone();
    }
    if cli.values_label.is_some() {
        resolved.values_label = cli.values_label.clone();
    }
    if let Some(max_items) = cli.max_items {
        resolved.max_items = ConfigLoader::validate_max_items(max_items)?;
    }
    if let Some(aggregate) = cli.aggregate {
        resolved.aggregate = aggregate;
    }
    Ok((resolved, base_dir))
}
