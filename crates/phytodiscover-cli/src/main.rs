//! PhytoDiscover: spectral library search from the terminal.
//! Entry point for the `phytodiscover` binary.

mod render;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use phytodiscover_client::{
    DataFileRegistry, HttpDataFileSource, HttpSearchExecutor, RegistryState, SearchSession,
    SessionSettings, SessionState,
};
use phytodiscover_common::{AnalysisModule, BackendClient, SearchQuery};
use phytodiscover_config::{Config, SearchStyle};

#[derive(Debug, Parser)]
#[command(name = "phytodiscover", version, about = "Search a spectral library for a named compound")]
struct Cli {
    /// Config file; must exist. Defaults to $PHYTODISCOVER_CONFIG or ./phytodiscover.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override [backend].base_url
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Override [search].style
    #[arg(long, global = true, value_enum)]
    style: Option<StyleArg>,

    /// Log at debug level (RUST_LOG still wins when set)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Search one compound against a data file
    Search {
        /// clinical-diagnostics | food-safety | forensic-toxicology
        #[arg(short, long, default_value = "clinical-diagnostics")]
        module: AnalysisModule,

        #[arg(short, long)]
        compound: String,

        /// Data file; defaults to the backend's first listed file
        #[arg(short, long)]
        file: Option<String>,
    },
    /// List the data files offered by the backend
    Files,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StyleArg {
    JsonPost,
    QueryString,
}

impl From<StyleArg> for SearchStyle {
    fn from(arg: StyleArg) -> Self {
        match arg {
            StyleArg::JsonPost    => SearchStyle::JsonPost,
            StyleArg::QueryString => SearchStyle::QueryString,
        }
    }
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(base_url) = &cli.base_url {
        config.backend.base_url = base_url.clone();
    }
    if let Some(style) = cli.style {
        config.search.style = style.into();
    }
    Ok(config)
}

fn build_session(config: &Config) -> anyhow::Result<SearchSession> {
    let client = BackendClient::new(
        &config.backend.base_url,
        config.backend.connect_timeout(),
        config.backend.request_timeout(),
    )?;
    let executor = HttpSearchExecutor::from_config(client.clone(), config);
    info!(
        base_url = %client.base_url(),
        style = ?executor.style(),
        "Search backend configured"
    );
    let registry = DataFileRegistry::new(Arc::new(HttpDataFileSource::new(
        client,
        config.registry.path.clone(),
    )));
    Ok(SearchSession::new(
        Arc::new(executor),
        registry,
        SessionSettings::from_config(config),
    ))
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(&cli)?;
    info!("PhytoDiscover client starting");
    let mut session = build_session(&config)?;

    match cli.command {
        Command::Files => {
            session.registry_mut().load().await;
            print!("{}", render::registry(session.registry()));
            Ok(match session.registry().state() {
                RegistryState::Failed { .. } => ExitCode::FAILURE,
                _ => ExitCode::SUCCESS,
            })
        }

        Command::Search { module, compound, file } => {
            if config.registry.enabled {
                if let RegistryState::Failed { error, .. } = session.registry_mut().load().await {
                    warn!(error = %error, "Continuing without a fresh data file list");
                }
            }
            let data_file = file.or_else(|| session.registry().selected().map(str::to_string));
            let query = SearchQuery::new(module, compound, data_file);

            match session.submit(query).await {
                Ok(state) => {
                    print!("{}", render::session(state));
                    Ok(match state {
                        SessionState::Failed { .. } => ExitCode::FAILURE,
                        _ => ExitCode::SUCCESS,
                    })
                }
                Err(rejected) => {
                    eprint!("{}", render::rejected(&rejected));
                    Ok(ExitCode::from(2))
                }
            }
        }
    }
}
