use clap::{Parser, builder::styling};
use owo_colors::OwoColorize;
use std::process::ExitCode;
use tabular_etl::config::{DEFAULT_CONFIG_PATH, PipelineConfig, load_dotenv};
use tabular_etl::etl::{ConfiguredPipeline, RunContext, SourceSelection};

// CLI Styling
const STYLES: styling::Styles = styling::Styles::styled()
    .header(styling::AnsiColor::BrightWhite.on_default())
    .usage(styling::AnsiColor::BrightWhite.on_default())
    .literal(styling::AnsiColor::Green.on_default())
    .placeholder(styling::AnsiColor::Cyan.on_default());

/// Tabular ETL: extract CSV files and REST APIs, clean them up and load them into a database
#[derive(Parser)]
#[command(name = "tabetl", version, styles = STYLES)]
struct Cli {
    /// Which sources to extract from
    #[arg(short, long, value_enum, default_value_t = SourceSelection::All)]
    source: SourceSelection,

    /// Pipeline configuration file (defaults apply if it does not exist)
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// The dotenv file to source credentials from
    #[arg(short, long, default_value = ".env")]
    env: String,

    /// Run identifier supplied by the scheduler (defaults to the current time)
    #[arg(long)]
    run_id: Option<String>,

    /// More verbose logging
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = match cli.debug {
        true => "debug",
        false => "info",
    };
    let env = env_logger::Env::default().filter_or("LOG_LEVEL", log_level);
    env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .init();

    load_dotenv(&cli.env);

    let config = match PipelineConfig::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            log::error!("Failed to load configuration: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    let context = cli.run_id.map(RunContext::new).unwrap_or_else(RunContext::generate);
    log::info!(
        "Tabular ETL run {} (sources: {:?}, config: {})",
        context.run_id().cyan(),
        cli.source,
        cli.config.bright_black()
    );

    let mut pipeline = match ConfiguredPipeline::from_config(&config, context, cli.source) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            log::error!("Failed to build pipeline: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    match pipeline.run().await {
        true => ExitCode::SUCCESS,
        false => ExitCode::FAILURE,
    }
}
