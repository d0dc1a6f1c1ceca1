mod output;
mod tail;
mod telemetry;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracefall_core::config::Config;
use tracefall_core::filter::ExcludeTerms;
use tracefall_relay::hub::Hub;
use tracefall_relay::publish::Publisher;
use tracefall_relay::relay::Relay;
use tracefall_relay::server::{ServerConfig, run_relay_servers};

use crate::tail::run_tail;
use crate::telemetry::{init_cli_tracing, init_run_tracing};

#[derive(Parser, Debug)]
#[command(name = "tracefall")]
#[command(about = "Relay OpenTelemetry HTTP spans to a live waterfall dashboard")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Run the trace relay until SIGTERM or ctrl-c")]
    Run(RunArgs),
    #[command(about = "Print span batches published by a running relay")]
    Tail {
        #[arg(long)]
        addr: Option<String>,
        #[arg(long, help = "Print raw JSON batches")]
        json: bool,
    },
}

#[derive(clap::Args, Debug, Default)]
struct RunArgs {
    #[arg(long)]
    ingest_addr: Option<String>,
    #[arg(long)]
    grpc_addr: Option<String>,
    #[arg(long)]
    allowed_origin: Option<String>,
    #[arg(
        long = "exclude",
        help = "Endpoint substring to drop; repeat to replace the configured set"
    )]
    exclude: Vec<String>,
    #[arg(
        long,
        conflicts_with = "exclude",
        help = "Relay every span that has an endpoint"
    )]
    no_exclude: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => run_server(args).await,
        Commands::Tail { addr, json } => {
            init_cli_tracing();
            let addr = match addr {
                Some(addr) => addr,
                None => Config::load().context("load config")?.ingest_addr,
            };
            run_tail(addr, json).await
        }
    }
}

fn apply_run_args(cfg: &mut Config, args: RunArgs) {
    if let Some(v) = args.ingest_addr {
        cfg.ingest_addr = v;
    }
    if let Some(v) = args.grpc_addr {
        cfg.grpc_addr = Some(v);
    }
    if let Some(v) = args.allowed_origin {
        cfg.allowed_origin = v;
    }
    if args.no_exclude {
        cfg.exclude_terms = ExcludeTerms::none();
    } else if !args.exclude.is_empty() {
        cfg.exclude_terms = args.exclude.iter().collect();
    }
}

async fn run_server(args: RunArgs) -> anyhow::Result<()> {
    let mut cfg = Config::load().context("load config")?;
    apply_run_args(&mut cfg, args);

    let telemetry = init_run_tracing();

    let http_addr: SocketAddr = cfg
        .ingest_addr
        .parse()
        .with_context(|| format!("bad ingest address {}", cfg.ingest_addr))?;
    let grpc_addr: Option<SocketAddr> = cfg
        .grpc_addr
        .as_deref()
        .map(str::parse)
        .transpose()
        .context("bad grpc address")?;

    eprintln!("tracefall run");
    eprintln!("  ingest http: {}", cfg.ingest_addr);
    if let Some(addr) = &cfg.grpc_addr {
        eprintln!("  ingest grpc: {addr}");
    }
    eprintln!("  push ws: ws://{}/socket", cfg.ingest_addr);
    eprintln!("  push sse: http://{}/events", cfg.ingest_addr);
    eprintln!("  allowed origin: {}", cfg.allowed_origin);
    eprintln!(
        "  excluding: {}",
        cfg.exclude_terms.iter().collect::<Vec<_>>().join(", ")
    );

    let hub = Hub::new(cfg.channel_capacity);
    let relay = Relay::new(
        cfg.exclude_terms.clone(),
        Publisher::new(Arc::new(hub.clone())),
    );
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut server = tokio::spawn(run_relay_servers(
        relay,
        hub,
        ServerConfig {
            http_addr,
            grpc_addr,
            allowed_origin: cfg.allowed_origin.clone(),
            keep_alive: cfg.keep_alive,
        },
        shutdown_rx,
    ));

    let stopped_early = tokio::select! {
        res = &mut server => Some(res),
        _ = shutdown_signal() => None,
    };
    if let Some(res) = stopped_early {
        telemetry.shutdown();
        res.context("relay task join failed")?
            .context("relay server failed")?;
        return Ok(());
    }

    tracing::info!("received shutdown signal, stopping relay");
    let _ = shutdown_tx.send(true);
    match server.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!(error = %e, "relay stopped with error"),
        Err(e) => tracing::warn!(error = %e, "relay task join failed"),
    }
    telemetry.shutdown();
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_flags_override_config() {
        let mut cfg = Config::default();
        apply_run_args(
            &mut cfg,
            RunArgs {
                ingest_addr: Some("0.0.0.0:4100".into()),
                grpc_addr: Some("0.0.0.0:4317".into()),
                allowed_origin: Some("*".into()),
                exclude: vec!["health".into()],
                no_exclude: false,
            },
        );
        assert_eq!(cfg.ingest_addr, "0.0.0.0:4100");
        assert_eq!(cfg.grpc_addr.as_deref(), Some("0.0.0.0:4317"));
        assert_eq!(cfg.allowed_origin, "*");
        assert_eq!(cfg.exclude_terms.iter().collect::<Vec<_>>(), vec!["health"]);
    }

    #[test]
    fn no_flags_keep_config() {
        let mut cfg = Config::default();
        apply_run_args(&mut cfg, RunArgs::default());
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn no_exclude_clears_terms() {
        let mut cfg = Config::default();
        apply_run_args(
            &mut cfg,
            RunArgs {
                no_exclude: true,
                ..RunArgs::default()
            },
        );
        assert!(cfg.exclude_terms.is_empty());
    }

    #[test]
    fn cli_parses_repeated_excludes() {
        let cli = Cli::parse_from(["tracefall", "run", "--exclude", "a", "--exclude", "b"]);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.exclude, vec!["a", "b"]);
    }
}
