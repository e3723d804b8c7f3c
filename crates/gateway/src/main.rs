use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tonic::codec::CompressionEncoding;
use tonic::transport::{Certificate, Identity as TlsIdentity, Server, ServerTlsConfig};
use tracing_subscriber::EnvFilter;

use agentd_domain::config::Config;

mod auth;
mod bootstrap;
mod cli;
mod graph;
mod interceptor;
mod ratelimit;
mod rpc;
mod state;
mod status;

use cli::{Cli, Command, ConfigCommand};
use interceptor::GatewayLayer;
use rpc::{pb, AgentServiceImpl};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        // Default to serve when no subcommand is given.
        None | Some(Command::Serve) => {
            init_tracing();
            let (config, _config_path) = cli::load_config()?;
            let runtime = build_runtime(&config)?;
            runtime.block_on(run_server(config))
        }
        Some(Command::Doctor) => {
            let (config, config_path) = cli::load_config()?;
            let runtime = tokio::runtime::Runtime::new().context("building tokio runtime")?;
            let passed = runtime.block_on(cli::doctor::run(&config, &config_path))?;
            if !passed {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Validate)) => {
            let (config, config_path) = cli::load_config()?;
            if !cli::config::validate(&config, &config_path) {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Show)) => {
            let (config, _config_path) = cli::load_config()?;
            cli::config::show(&config);
            Ok(())
        }
        Some(Command::Version) => {
            println!("agentd {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Initialize structured JSON tracing (only for the `serve` command — the
/// other subcommands talk to a terminal, not a log collector).
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,agentd_gateway=debug")))
        .json()
        .init();
}

/// `server.worker_pool_size` bounds the blocking-thread pool the async
/// runtime hands synchronous tool work off to, per the ambient concurrency
/// section — a config-driven knob rather than tokio's built-in default.
fn build_runtime(config: &Config) -> anyhow::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .max_blocking_threads(config.server.worker_pool_size.max(1))
        .build()
        .context("building tokio runtime")
}

/// Start the gRPC gateway with the given configuration.
async fn run_server(config: Config) -> anyhow::Result<()> {
    tracing::info!("agentd starting");

    let bind_host = config.server.bind_host.clone();
    let bind_port = config.server.bind_port;
    let max_frame_bytes = config.server.max_frame_bytes;
    let tls = config.tls.clone();
    let enable_global_limit = config.rate_limit.enable_global_limit;
    let enable_per_user_limit = config.rate_limit.enable_per_user_limit;

    let state = bootstrap::build(config).await.context("initializing gateway state")?;
    let state = Arc::new(state);
    bootstrap::spawn_approval_sweep(&state);

    let gateway_layer = GatewayLayer {
        auth: state.auth.clone(),
        limiters: state.limiters.clone(),
        enable_global_limit,
        enable_per_user_limit,
    };

    let grpc_service = pb::agent_service_server::AgentServiceServer::new(AgentServiceImpl::new(state))
        .send_compressed(CompressionEncoding::Gzip)
        .accept_compressed(CompressionEncoding::Gzip)
        .max_decoding_message_size(max_frame_bytes)
        .max_encoding_message_size(max_frame_bytes);

    let mut builder = Server::builder();
    if tls.enabled {
        // `Config::validate` already rejects `tls.enabled` without both
        // paths set, so these are only reachable with a broken config that
        // bypassed validation.
        let cert_path = tls.cert_path.as_deref().context("tls.enabled but cert_path is unset")?;
        let key_path = tls.key_path.as_deref().context("tls.enabled but key_path is unset")?;
        let cert = std::fs::read(cert_path).with_context(|| format!("reading {cert_path}"))?;
        let key = std::fs::read(key_path).with_context(|| format!("reading {key_path}"))?;
        let mut tls_config = ServerTlsConfig::new().identity(TlsIdentity::from_pem(cert, key));
        if let Some(ca_path) = &tls.client_ca_path {
            let ca = std::fs::read(ca_path).with_context(|| format!("reading {ca_path}"))?;
            tls_config = tls_config.client_ca_root(Certificate::from_pem(ca));
        }
        builder = builder.tls_config(tls_config).context("configuring TLS")?;
        tracing::info!("TLS enabled");
    } else {
        tracing::warn!("TLS disabled — traffic is unencrypted");
    }

    let addr = format!("{bind_host}:{bind_port}").parse().context("parsing bind address")?;
    tracing::info!(%addr, "agentd gRPC gateway listening");

    builder
        .http2_keepalive_interval(Some(Duration::from_secs(30)))
        .layer(gateway_layer)
        .add_service(grpc_service)
        .serve(addr)
        .await
        .context("gRPC server error")?;

    Ok(())
}
