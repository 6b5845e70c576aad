use clap::{Args, Parser, Subcommand};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

use damadi::aggregate::Aggregates;
use damadi::charts::ChartId;
use damadi::config::{DashboardConfig, DEFAULT_CONFIG_PATH};
use damadi::dataset::{self, SourceLoader};
use damadi::pages::PageRouter;
use damadi::serve::{self, AppState};
use damadi::theme::{self, ThemeMode};
use damadi::utils;

#[derive(Parser, Debug)]
#[command(
    name = "damadi",
    version,
    about = "Dark matter research data dashboard"
)]
struct Cli {
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    #[arg(
        long,
        global = true,
        help = "Write the resolved dashboard config to disk before running"
    )]
    write_config: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(name = "serve")]
    Serve(ServeCommandArgs),
    /// Re-download every remote-backed table into the cache.
    #[command(name = "fetch")]
    Fetch,
    /// Write every chart figure as JSON.
    #[command(name = "export")]
    Export(ExportArgs),
    /// Print aggregate table sizes and totals.
    #[command(name = "summary")]
    Summary,
}

#[derive(Args, Debug, Clone, Default)]
struct ServeCommandArgs {
    #[arg(long = "port", help = "port to serve on (overrides PORT)")]
    port: Option<u16>,
    #[arg(long = "host", help = "address to bind")]
    host: Option<String>,
}

#[derive(Args, Debug, Clone)]
struct ExportArgs {
    #[arg(long, help = "directory receiving <chart-id>.json files")]
    out: PathBuf,
    #[arg(long, value_parser = parse_theme)]
    theme: Option<ThemeMode>,
}

type CliResult = Result<(), Box<dyn std::error::Error>>;

fn parse_theme(raw: &str) -> Result<ThemeMode, String> {
    ThemeMode::parse(raw).ok_or_else(|| format!("unknown theme {raw:?}; expected dark or light"))
}

fn build_aggregates(config: &DashboardConfig, refresh: bool) -> Result<Aggregates, damadi::error::DashboardError> {
    let loader = SourceLoader::from_config(config)?;
    let data = dataset::load_dataset(config, &loader, refresh)?;
    Ok(Aggregates::build(&data, config.top_authors))
}

fn run_serve(args: &ServeCommandArgs, mut config: DashboardConfig) -> CliResult {
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(host) = &args.host {
        config.host = host.clone();
    }
    // The blocking fetch client must live and die outside the async runtime.
    let aggregates = build_aggregates(&config, false)?;
    let state = AppState::new(config, aggregates);
    let rt = tokio::runtime::Runtime::new()
        .map_err(|err| format!("Failed to create runtime: {err}"))?;
    rt.block_on(serve::run(state))
        .map_err(|err| format!("serve failed: {err}"))?;
    Ok(())
}

fn run_fetch(config: &DashboardConfig) -> CliResult {
    let loader = SourceLoader::from_config(config)?;
    let mut refreshed = 0;
    for source in [config.papers_source(), config.category_counts_source()] {
        if source.remote_id.is_none() {
            info!(path = %source.path.display(), "no remote id configured; skipping");
            continue;
        }
        loader.read(&source, true)?;
        refreshed += 1;
    }
    info!(refreshed, "fetch complete");
    Ok(())
}

fn run_export(args: &ExportArgs, config: &DashboardConfig) -> CliResult {
    let aggregates = build_aggregates(config, false)?;
    let mode = args.theme.unwrap_or(config.default_theme);
    let theme = mode.theme();
    let palette = theme::shuffled_palette(config.palette_seed);
    fs::create_dir_all(&args.out)?;
    for chart in ChartId::ALL {
        let figure = chart.build(&aggregates, &theme, &palette);
        let path = args.out.join(format!("{}.json", chart.as_str()));
        utils::write_atomic_bytes(&path, &serde_json::to_vec_pretty(&figure)?)?;
    }
    info!(
        charts = ChartId::ALL.len(),
        theme = mode.as_str(),
        out = %args.out.display(),
        "exported figures"
    );
    Ok(())
}

fn run_summary(config: &DashboardConfig) -> CliResult {
    let aggregates = build_aggregates(config, false)?;
    let router = PageRouter::default();
    let summary = json!({
        "records": aggregates.records,
        "resolved": aggregates.resolved,
        "dropped": aggregates.dropped,
        "papers_by_year": {
            "rows": aggregates.papers_by_year.rows.len(),
            "total": aggregates.papers_by_year.total(),
        },
        "papers_by_year_focus": {
            "rows": aggregates.papers_by_year_focus.rows.len(),
            "total": aggregates.papers_by_year_focus.total(),
        },
        "citations_by_year_focus": {
            "rows": aggregates.citations_by_year_focus.rows.len(),
            "total": aggregates.citations_by_year_focus.total(),
        },
        "downloads_by_year_focus": {
            "rows": aggregates.downloads_by_year_focus.rows.len(),
            "total": aggregates.downloads_by_year_focus.total(),
        },
        "papers_by_category": {
            "rows": aggregates.papers_by_category.rows.len(),
            "total": aggregates.papers_by_category.total(),
        },
        "pages": router
            .pages()
            .iter()
            .map(|page| json!({"path": page.path, "charts": page.charts().count()}))
            .collect::<Vec<_>>(),
        "authors": aggregates.authors.len(),
        "category_counts": aggregates.category_counts.len(),
        "category_subtotals": aggregates.category_subtotals.len(),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn run_command(command: Commands, config: DashboardConfig) -> CliResult {
    match command {
        Commands::Serve(args) => run_serve(&args, config),
        Commands::Fetch => run_fetch(&config),
        Commands::Export(args) => run_export(&args, &config),
        Commands::Summary => run_summary(&config),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn write_config(path: &Path, config: &DashboardConfig) -> CliResult {
    config.write(path)?;
    info!(path = %path.display(), "wrote config");
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    init_tracing();

    let mut config = match DashboardConfig::load_file(&cli.config) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = fs::create_dir_all(&config.output_dir) {
        eprintln!(
            "Failed to create output directory {:?}: {err}",
            config.output_dir
        );
        std::process::exit(1);
    }

    // Saved before PORT is applied so a one-off override does not persist.
    if cli.write_config {
        if let Err(err) = write_config(&cli.config, &config) {
            eprintln!("{err}");
            std::process::exit(1);
        }
    }
    config.apply_env();

    let command = cli
        .command
        .unwrap_or_else(|| Commands::Serve(ServeCommandArgs::default()));

    if let Err(err) = run_command(command, config) {
        eprintln!("{err}");
        std::process::exit(1);
    }
}
