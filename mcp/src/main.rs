use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use erp_mcp_runtime::{ClientConfig, McpCommands, run as run_mcp};

#[derive(Parser)]
#[command(
    name = "erp-mcp",
    version,
    about = "ERP MCP server: records, workflows and analytics over stdio"
)]
struct Cli {
    /// ERP site base URL
    #[arg(long, env = "ERP_URL", default_value = "http://localhost:8000")]
    url: String,

    /// API key of the integration user
    #[arg(long, env = "ERP_API_KEY", default_value = "", hide_env_values = true)]
    api_key: String,

    /// API secret of the integration user
    #[arg(long, env = "ERP_API_SECRET", default_value = "", hide_env_values = true)]
    api_secret: String,

    /// Per-request timeout in seconds
    #[arg(long, env = "ERP_TIMEOUT_SECS", default_value_t = 30)]
    timeout_secs: u64,

    #[command(subcommand)]
    command: McpCommands,
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    // stdout carries protocol frames; logs go to stderr.
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "erp_mcp=info,erp_mcp_runtime=info".into()),
        )
        .with(fmt::layer().json().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = ClientConfig::new(cli.url, cli.api_key, cli.api_secret)
        .with_timeout(Duration::from_secs(cli.timeout_secs));

    let code = run_mcp(config, cli.command).await;
    std::process::exit(code);
}
