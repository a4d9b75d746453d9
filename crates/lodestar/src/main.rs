mod shutdown;

use clap::{Parser, ValueEnum};
use lodestar_client::{ApiClient, ClientConfig, ClusterApi, SERVICE_ACCOUNT_DIR};
use lodestar_scheduler::{SchedulerConfig, ScorePolicy, Supervisor, DEFAULT_SCHEDULER_NAME};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Parser)]
#[command(name = "lodestar", about = "Lodestar Kubernetes pod scheduler")]
struct Cli {
    /// API server URL (defaults to the in-cluster service address)
    #[arg(long, env = "LODESTAR_API_SERVER")]
    api_server: Option<String>,
    /// Bearer token file (defaults to the service account token)
    #[arg(long, env = "LODESTAR_TOKEN_FILE")]
    token_file: Option<PathBuf>,
    /// CA bundle used to verify the API server
    #[arg(long, env = "LODESTAR_CA_FILE")]
    ca_file: Option<PathBuf>,
    /// Accept any API server certificate
    #[arg(long, env = "LODESTAR_INSECURE_SKIP_TLS_VERIFY")]
    insecure_skip_tls_verify: bool,
    /// Timeout for non-watch API requests, in seconds
    #[arg(long, env = "LODESTAR_REQUEST_TIMEOUT_SECS")]
    request_timeout_secs: Option<u64>,
    /// Value of the scheduler-name annotation this scheduler owns
    #[arg(long, env = "LODESTAR_SCHEDULER_NAME", default_value = DEFAULT_SCHEDULER_NAME)]
    scheduler_name: String,
    /// Seconds between reconcile sweeps
    #[arg(long, env = "LODESTAR_RECONCILE_INTERVAL_SECS", default_value_t = 30)]
    reconcile_interval_secs: u64,
    /// Seconds to wait before scheduling a newly watched pod
    #[arg(long, env = "LODESTAR_SETTLE_DELAY_SECS", default_value_t = 2)]
    settle_delay_secs: u64,
    /// Seconds to wait before reopening a failed pod watch
    #[arg(long, env = "LODESTAR_RECONNECT_BACKOFF_SECS", default_value_t = 5)]
    reconnect_backoff_secs: u64,
    /// Node scoring policy (least-allocated, lowest-price)
    #[arg(long, env = "LODESTAR_SCORE_POLICY", default_value_t = ScorePolicy::LeastAllocated)]
    score_policy: ScorePolicy,
    /// Log output format
    #[arg(long, env = "LODESTAR_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

impl Cli {
    fn client_config(&self) -> miette::Result<ClientConfig> {
        let mut config = match &self.api_server {
            Some(url) => ClientConfig::new(url.clone()),
            None => ClientConfig::in_cluster()?,
        };

        if let Some(path) = &self.token_file {
            config = config.with_token_path(path);
        }
        if let Some(path) = &self.ca_file {
            config = config.with_ca_cert_path(path);
        }

        Ok(config
            .with_service_account_dir(SERVICE_ACCOUNT_DIR)
            .with_insecure_skip_tls_verify(self.insecure_skip_tls_verify)
            .with_request_timeout(self.request_timeout_secs.map(Duration::from_secs)))
    }

    fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            scheduler_name: self.scheduler_name.clone(),
            reconcile_interval: Duration::from_secs(self.reconcile_interval_secs.max(1)),
            settle_delay: Duration::from_secs(self.settle_delay_secs),
            reconnect_backoff: Duration::from_secs(self.reconnect_backoff_secs),
            score_policy: self.score_policy,
            ..Default::default()
        }
    }
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    match format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
    }
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let client_config = cli.client_config()?;
    let api: Arc<dyn ClusterApi> = Arc::new(ApiClient::new(&client_config)?);
    info!("Using API server {}", client_config.api_server);

    let token = shutdown::install_shutdown_handler()?;
    let supervisor = Supervisor::new(api, cli.scheduler_config());

    supervisor.run(token).await?;

    info!("Shutdown complete");
    Ok(())
}
