//! Server entry point.
//!
//! Startup order: logging, database (migrations included), security
//! settings, then the listener. Any startup failure exits non-zero.

use anyhow::{anyhow, Context};
use clap::Parser;
use libcat_core::db::{open_db, open_db_in_memory};
use libcat_core::{core_version, init_logging, SecurityHeaderPolicy};
use libcat_server::config::{load_security_settings, Args};
use libcat_server::{create_router, AppState};
use log::{info, warn};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_dir = args
        .log_dir
        .as_deref()
        .map(|dir| dir.to_str().context("log directory must be valid UTF-8"))
        .transpose()?;
    init_logging(&args.log_level, log_dir).map_err(|err| anyhow!(err))?;

    let conn = if args.uses_in_memory_db() {
        open_db_in_memory().context("failed to open in-memory database")?
    } else {
        open_db(&args.db).with_context(|| format!("failed to open database `{}`", args.db))?
    };

    let settings = load_security_settings(args.config.as_deref())?;
    let policy = SecurityHeaderPolicy::from_settings(&settings);
    let state = AppState::new(conn, &policy).map_err(|err| anyhow!(err))?;

    let listener = TcpListener::bind(args.bind)
        .await
        .with_context(|| format!("failed to bind {}", args.bind))?;
    info!(
        "event=server_started module=server status=ok version={} bind={} xss_filter={} csp={}",
        core_version(),
        args.bind,
        settings.secure_browser_xss_filter,
        policy.content_security_policy().is_some()
    );

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server terminated")?;

    info!("event=server_stopped module=server status=ok");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("event=shutdown_signal module=server status=error error={err}");
        std::future::pending::<()>().await;
    }
}
