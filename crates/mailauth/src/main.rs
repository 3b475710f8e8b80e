//! `mailauth` - nginx mail `auth_http` delegate
//!
//! Answers nginx's per-login auth requests: whitelisted users whose
//! password the IMAP server accepts are routed to the mailbox server (IMAP)
//! or the submission relay (SMTP, under a fixed relay identity).

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod config;
mod http;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use mailauth_core::AuthDecisionEngine;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::Config;

/// nginx mail auth_http delegate backed by an IMAP server.
#[derive(Debug, Parser)]
#[command(name = "mailauth", version, about)]
struct Args {
    /// Path to the TOML configuration file.
    config: PathBuf,

    /// Address to listen on, overriding `listen` in the configuration.
    #[arg(long)]
    listen: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "mailauth=info,mailauth_core=info,mailauth_imap=warn".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = Config::load(&args.config)
        .with_context(|| format!("failed to load {}", args.config.display()))?;
    let listen = args.listen.unwrap_or(config.listen);

    let engine = Arc::new(AuthDecisionEngine::new(
        config.auth_config(),
        Arc::new(config.validator()),
    ));

    let listener = TcpListener::bind(listen)
        .await
        .with_context(|| format!("failed to bind {listen}"))?;
    info!(
        %listen,
        users = config.users.len(),
        imap_host = %config.imap_host,
        smtp_host = %config.smtp_host,
        "starting mailauth"
    );

    http::serve(listener, engine, shutdown_signal()).await?;
    Ok(())
}

/// Completes on Ctrl-C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_cli_parsing() {
        let args = Args::try_parse_from(["mailauth", "/etc/mailauth.toml"]).unwrap();
        assert_eq!(args.config, PathBuf::from("/etc/mailauth.toml"));
        assert!(args.listen.is_none());

        let args =
            Args::try_parse_from(["mailauth", "--listen", "127.0.0.1:9000", "config.toml"])
                .unwrap();
        assert_eq!(args.listen, Some("127.0.0.1:9000".parse().unwrap()));

        assert!(Args::try_parse_from(["mailauth"]).is_err());
    }
}
