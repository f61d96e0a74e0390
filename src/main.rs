use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use route_risk::api::{self, AppState};
use route_risk::config::AppConfig;
use route_risk::model::RouteRiskRequest;
use route_risk::scoring::RouteScorer;
use route_risk::{loader, store, telemetry};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "route-risk",
    about = "Score candidate routes against street segment crime risk",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Score a saved directions response and print the result as JSON
    Score(ScoreArgs),
}

#[derive(Args, Debug, Default)]
struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    port: Option<u16>,
    /// Override the segment risk CSV
    #[arg(long)]
    segments: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ScoreArgs {
    /// JSON file holding `{ "routes": [...] }`
    #[arg(long)]
    request: PathBuf,
    /// Override the segment risk CSV
    #[arg(long)]
    segments: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    match cli.command.unwrap_or_else(|| Command::Serve(ServeArgs::default())) {
        Command::Serve(args) => {
            if let Some(host) = args.host {
                config.server.host = host;
            }
            if let Some(port) = args.port {
                config.server.port = port;
            }
            if let Some(path) = args.segments {
                config.segments.data_path = path;
            }
            serve(config).await
        }
        Command::Score(args) => {
            if let Some(path) = args.segments {
                config.segments.data_path = path;
            }
            score_file(&config, &args.request)
        }
    }
}

fn build_scorer(config: &AppConfig) -> anyhow::Result<RouteScorer> {
    let segments = &config.segments;
    let records = loader::load_path(&segments.data_path)?;
    let index = store::build_index(segments.index, segments.h3_resolution, records);
    Ok(RouteScorer::new(index, segments.search_radius_m))
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    let scorer = build_scorer(&config)?;
    info!(
        segments = scorer.store().len(),
        index = ?config.segments.index,
        radius_m = scorer.search_radius_m(),
        "segment index ready"
    );

    let app = api::router(AppState::new(scorer));

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(?config.environment, %addr, "route risk API listening");
    axum::serve(listener, app).await?;

    Ok(())
}

fn score_file(config: &AppConfig, request_path: &Path) -> anyhow::Result<()> {
    let scorer = build_scorer(config)?;
    let raw = std::fs::read_to_string(request_path)
        .with_context(|| format!("reading {}", request_path.display()))?;
    let request: RouteRiskRequest = serde_json::from_str(&raw)
        .with_context(|| format!("parsing {}", request_path.display()))?;

    let response = scorer.score(&request);
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
