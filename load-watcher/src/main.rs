use anyhow::Result;
use clap::builder::BoolishValueParser;
use clap::{Args, Parser, Subcommand};
use load_watcher::config::{
    INSECURE_SKIP_VERIFY_ENV, METRICS_PROVIDER_ADDRESS_ENV, METRICS_PROVIDER_NAME_ENV,
    METRICS_PROVIDER_TOKEN_ENV, PROM_CLIENT_NAME,
};
use load_watcher::{
    MetricResult, ObservedGauges, PrometheusProvider, ProviderConfig, ProviderOpts, TelemetrySink,
    Window,
};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "load-watcher")]
#[command(about = "Load Watcher - node and workload load metrics from Prometheus")]
#[command(long_about = None)]
#[command(version)]
struct Cli {
    #[command(flatten)]
    provider: ProviderArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Args)]
struct ProviderArgs {
    /// Metrics provider name
    #[arg(
        long,
        global = true,
        env = METRICS_PROVIDER_NAME_ENV,
        default_value = PROM_CLIENT_NAME
    )]
    provider_name: String,

    /// Prometheus address
    #[arg(long, global = true, env = METRICS_PROVIDER_ADDRESS_ENV)]
    address: Option<String>,

    /// Bearer token sent with every request
    #[arg(
        long,
        global = true,
        env = METRICS_PROVIDER_TOKEN_ENV,
        hide_env_values = true
    )]
    token: Option<String>,

    /// Skip TLS certificate verification
    #[arg(
        long,
        global = true,
        env = INSECURE_SKIP_VERIFY_ENV,
        value_parser = BoolishValueParser::new()
    )]
    insecure_skip_verify: bool,
}

impl From<ProviderArgs> for ProviderOpts {
    fn from(args: ProviderArgs) -> Self {
        ProviderOpts {
            name: args.provider_name,
            address: args.address,
            auth_token: args.token,
            insecure_skip_verify: args.insecure_skip_verify,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Fetch the metrics of a single host
    Fetch {
        /// Host name as exposed by the `instance` label
        #[arg(long)]
        host: String,
        /// Look-back window, e.g. 5m
        #[arg(long, default_value = "15m")]
        window: String,
    },

    /// Fetch the metrics of every host, grouped by host
    FetchAll {
        #[arg(long, default_value = "15m")]
        window: String,
    },

    /// Check that the Prometheus server is reachable
    Health,

    /// Fetch every host and print the observed gauges in text exposition format
    Export {
        #[arg(long, default_value = "15m")]
        window: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // RUST_LOG wins, then LOG_LEVEL, then info
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_from_env("LOG_LEVEL"))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = ProviderConfig::from_env(cli.provider.into())?;
    let provider = PrometheusProvider::new(config)?;

    match cli.command {
        Commands::Fetch { host, window } => {
            let res = provider
                .fetch_host_metrics(&host, &Window::new(window))
                .await;
            print_json(res)
        }
        Commands::FetchAll { window } => {
            let res = provider.fetch_all_hosts_metrics(&Window::new(window)).await;
            print_json(res)
        }
        Commands::Health => {
            let code = provider.health().await?;
            info!("Prometheus is healthy, status code {}", code);
            println!("{}", code);
            Ok(())
        }
        Commands::Export { window } => {
            let window = Window::new(window);
            let res = provider.fetch_all_hosts_metrics(&window).await;
            let snapshot = check(res)?;
            let gauges = ObservedGauges::new();
            gauges.publish(&snapshot, &window);
            print!("{}", gauges.render());
            Ok(())
        }
    }
}

fn print_json<T: Serialize>(res: MetricResult<T>) -> Result<()> {
    let data = check(res)?;
    println!("{}", serde_json::to_string_pretty(&data)?);
    Ok(())
}

/// Keep partial data, fail only when nothing could be fetched.
fn check<T>(res: MetricResult<T>) -> Result<T> {
    let (data, err) = res.into_best_effort()?;
    if let Some(err) = err {
        warn!("{}", err);
    }
    Ok(data)
}
