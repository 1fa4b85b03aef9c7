mod config;

use std::io::Read;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use smell_probe_core::api::{self, AppState};
use smell_probe_core::llm::build_client;
use smell_probe_core::report::{render_result, OutputFormat};
use smell_probe_core::{
    BatchRunner, LibSqlConnector, ResponseNormalizer, ResultStore, SmellAnalyzer, SmellSchema,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;

#[derive(Parser, Debug)]
#[command(
    name = "smell-probe",
    author,
    version,
    about = "Ask LLMs to flag code smells and collect their answers"
)]
struct Cli {
    /// Optional config file (TOML, YAML or JSON) overriding environment settings
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the on-demand analysis API
    Serve {
        /// Port to listen on (defaults to $PORT or 3000)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Query every configured model for every stored snippet
    Batch {
        /// Stop at the first response row that cannot be written
        #[arg(long)]
        abort_on_persist_error: bool,
        /// Emit the run summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Analyze one snippet read from stdin or a file
    Analyze {
        /// Read the snippet from this file instead of stdin
        #[arg(long, value_name = "FILE")]
        file: Option<PathBuf>,
        /// Model to query
        #[arg(long)]
        model: Option<String>,
        /// Emit the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Store a snippet in the Sources table
    AddSource {
        /// File containing the snippet
        file: PathBuf,
    },
    /// List the models queried by batch runs
    ListModels {
        /// Emit the catalog as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the smell keys every report carries
    Schema,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { port } => serve(&config, port).await?,
        Commands::Batch {
            abort_on_persist_error,
            json,
        } => batch(&config, abort_on_persist_error, json).await?,
        Commands::Analyze { file, model, json } => {
            analyze(&config, file.as_deref(), model, json).await?
        }
        Commands::AddSource { file } => add_source(&config, &file).await?,
        Commands::ListModels { json } => list_models(&config, json)?,
        Commands::Schema => print_schema(),
    }
    Ok(())
}

async fn serve(config: &AppConfig, port: Option<u16>) -> Result<()> {
    let client = build_client(&config.llm)?;
    let analyzer = SmellAnalyzer::new(client)
        .with_normalizer(ResponseNormalizer::new(config.extraction))
        .with_model(config.analyze_model.clone());
    let addr = SocketAddr::from(([0, 0, 0, 0], port.unwrap_or(config.port)));
    api::serve(addr, AppState::new(analyzer)).await
}

async fn batch(config: &AppConfig, abort_on_persist_error: bool, json: bool) -> Result<()> {
    let client = build_client(&config.llm)?;
    let policy = if abort_on_persist_error {
        smell_probe_core::PersistencePolicy::Abort
    } else {
        config.persistence
    };
    let runner = BatchRunner::new(client)
        .with_models(config.models.clone())
        .with_normalizer(ResponseNormalizer::new(config.extraction))
        .with_policy(policy);
    let connector = connector(config);
    let summary = runner
        .run(&connector)
        .await
        .with_context(|| format!("batch run against {} failed", config.database.describe()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("{}", "Batch complete".green().bold());
    println!("  sources:              {}", summary.sources);
    println!("  pairs:                {}", summary.pairs);
    println!("  structured replies:   {}", summary.structured_replies);
    println!("  rows persisted:       {}", summary.persisted);
    let failures = format!("{}", summary.provider_failures);
    println!(
        "  provider failures:    {}",
        if summary.provider_failures > 0 {
            failures.yellow()
        } else {
            failures.normal()
        }
    );
    let persist_failures = format!("{}", summary.persistence_failures);
    println!(
        "  persistence failures: {}",
        if summary.persistence_failures > 0 {
            persist_failures.red()
        } else {
            persist_failures.normal()
        }
    );
    Ok(())
}

async fn analyze(
    config: &AppConfig,
    file: Option<&Path>,
    model: Option<String>,
    json: bool,
) -> Result<()> {
    let snippet = read_snippet(file)?;
    let client = build_client(&config.llm)?;
    let analyzer = SmellAnalyzer::new(client)
        .with_normalizer(ResponseNormalizer::new(config.extraction))
        .with_model(model.unwrap_or_else(|| config.analyze_model.clone()));
    let result = analyzer.analyze(&snippet).await?;

    let format = if json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };
    let rendered = render_result(&result, format)?;
    print!("{rendered}");
    if json {
        println!();
    }
    Ok(())
}

async fn add_source(config: &AppConfig, file: &Path) -> Result<()> {
    let code = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read snippet from {}", file.display()))?;
    if code.trim().is_empty() {
        bail!("{} is empty", file.display());
    }
    let mut store = connector(config).open().await?;
    let id = store.insert_source(&code).await?;
    store.close().await?;
    info!(id, database = config.database.describe(), "source stored");
    println!("{id}");
    Ok(())
}

fn list_models(config: &AppConfig, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&config.models)?);
        return Ok(());
    }
    println!("{} model(s) queried per snippet", config.models.len());
    for model in &config.models {
        println!("- {id:<40} {name}", id = model.id, name = model.display_name);
    }
    Ok(())
}

fn print_schema() {
    for key in SmellSchema::default_schema().iter() {
        println!("{key}");
    }
}

fn connector(config: &AppConfig) -> LibSqlConnector {
    LibSqlConnector::new(
        config.database.clone(),
        SmellSchema::default_schema().clone(),
    )
}

fn read_snippet(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read snippet from {}", path.display())),
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read snippet from stdin")?;
            Ok(buf)
        }
    }
}

fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tokio=warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();
}
