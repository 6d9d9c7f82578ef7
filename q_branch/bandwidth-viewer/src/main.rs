//! Bandwidth log viewer.
//!
//! `serve` publishes a logs directory with a chart page, `series` runs the
//! ingestion pipeline against any manifest (URL or path) and prints the
//! resulting rate series as JSON, `manifest` prints the manifest a logs
//! directory would be served with.

use std::net::IpAddr;
use std::path::PathBuf;

use anyhow::Context;
use bandwidth_viewer::viewer::{run_server, AppState, ServerConfig};
use bandwidth_viewer::{
    CounterMode, Fetcher, Location, MalformedRowPolicy, Manifest, Pipeline, PipelineConfig,
    Selection,
};
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "bandwidth-viewer")]
#[command(about = "Per-device bandwidth rate series from router logs")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve a logs directory with the chart page and JSON API
    Serve {
        /// Directory holding the CSV logs
        #[arg(long, env = "BANDWIDTH_VIEWER_LOGS_DIR", default_value = "logs")]
        logs_dir: PathBuf,

        /// Port for web server
        #[arg(short, long, env = "BANDWIDTH_VIEWER_PORT", default_value = "8050")]
        port: u16,

        /// Address to bind
        #[arg(long, default_value = "127.0.0.1")]
        bind: IpAddr,

        #[command(flatten)]
        pipeline: PipelineArgs,
    },

    /// Build the rate series for one manifest entry and print it as JSON
    Series {
        /// Manifest URL or path
        manifest: String,

        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,

        #[command(flatten)]
        pipeline: PipelineArgs,
    },

    /// Print the manifest generated for a logs directory
    Manifest {
        /// Directory holding the CSV logs
        logs_dir: PathBuf,
    },
}

#[derive(Args, Debug)]
struct PipelineArgs {
    /// YAML pipeline config; flags below override it
    #[arg(long, env = "BANDWIDTH_VIEWER_CONFIG")]
    config: Option<PathBuf>,

    /// Manifest entry: first, last, name:<key> or prefix:<prefix>
    #[arg(long)]
    select: Option<Selection>,

    /// Read log timestamps as UTC instead of local time
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    assume_utc: Option<bool>,

    /// Leave the first row's rates empty instead of dividing by epoch time
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    skip_first_row_rate: Option<bool>,

    /// Date rows one month late, as the old browser chart did
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    legacy_month_offset: Option<bool>,

    /// Handling of rows with unreadable cells
    #[arg(long, value_enum)]
    on_malformed: Option<MalformedRowPolicy>,

    /// Whether counter cells hold per-interval or running byte counts
    #[arg(long, value_enum)]
    counters: Option<CounterMode>,
}

impl PipelineArgs {
    fn into_config(self) -> anyhow::Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::load(path)?,
            None => PipelineConfig::default(),
        };

        if let Some(selection) = self.select {
            config.selection = selection;
        }
        if let Some(utc) = self.assume_utc {
            config.parser.assume_utc = utc;
        }
        if let Some(skip) = self.skip_first_row_rate {
            config.parser.skip_first_row_rate = skip;
        }
        if let Some(legacy) = self.legacy_month_offset {
            config.parser.legacy_month_offset = legacy;
        }
        if let Some(policy) = self.on_malformed {
            config.parser.on_malformed = policy;
        }
        if let Some(mode) = self.counters {
            config.parser.counter_mode = mode;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing - RUST_LOG takes precedence, fallback to info.
    // Logs go to stderr so JSON on stdout stays clean.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            logs_dir,
            port,
            bind,
            pipeline,
        } => {
            let config = pipeline.into_config()?;
            tracing::info!(
                logs_dir = %logs_dir.display(),
                port,
                selection = %config.selection,
                assume_utc = config.parser.assume_utc,
                "Starting bandwidth-viewer"
            );
            let state = AppState {
                logs_dir,
                pipeline: Pipeline::new(Fetcher::new()?, config),
            };
            run_server(state, ServerConfig { bind, port }).await
        }

        Command::Series {
            manifest,
            pretty,
            pipeline,
        } => {
            let location = Location::parse(&manifest)?;
            let pipeline = Pipeline::new(Fetcher::new()?, pipeline.into_config()?);
            let report = pipeline.run(&location).await?;

            let json = if pretty {
                serde_json::to_string_pretty(&report)
            } else {
                serde_json::to_string(&report)
            }
            .context("Failed to serialize series report")?;
            println!("{json}");
            Ok(())
        }

        Command::Manifest { logs_dir } => {
            let manifest = Manifest::from_logs_dir(&logs_dir)
                .with_context(|| format!("listing {}", logs_dir.display()))?;
            println!("{}", manifest.to_json_pretty());
            Ok(())
        }
    }
}
