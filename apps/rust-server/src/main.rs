// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::{io, net::SocketAddr, time::Duration};

use axum::Router;
use axum_server::{tls_rustls::RustlsConfig, Handle};
use tracing::{info, warn};

use vaultshare_server::{
    api::router,
    config::{AppConfig, TlsSettings},
    state::AppState,
    telemetry,
};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

async fn shutdown_signal(handle: Handle<SocketAddr>) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");

    tokio::select! {
        _ = sigterm.recv() => info!("Received SIGTERM, shutting down gracefully"),
        _ = sigint.recv() => info!("Received SIGINT, shutting down gracefully"),
    }
    handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
}

#[tokio::main]
async fn main() {
    // Install the ring crypto provider for rustls (must be done before any TLS operations)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    let config = AppConfig::from_env().expect("Invalid configuration");
    telemetry::init_tracing(config.log_format);
    info!(?config, "Starting vaultshare server");

    let state = AppState::from_config(&config).expect("Failed to initialize application state");
    let app = router(state);
    let addr = config.bind_addr;

    let handle = Handle::new();
    tokio::spawn(shutdown_signal(handle.clone()));

    serve(app, addr, config.tls.as_ref(), handle)
        .await
        .expect("Server failed");

    info!("Server stopped");
}

/// Serve `app` until `handle` triggers shutdown. HTTPS when `tls` is set.
async fn serve(
    app: Router,
    addr: SocketAddr,
    tls: Option<&TlsSettings>,
    handle: Handle<SocketAddr>,
) -> io::Result<()> {
    match tls {
        Some(tls) => {
            let tls_config = RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path).await?;
            info!(%addr, "Listening on https (docs at /docs)");
            axum_server::bind_rustls(addr, tls_config)
                .handle(handle)
                .serve(app.into_make_service())
                .await
        }
        None => {
            warn!("TLS_CERT_PATH and TLS_KEY_PATH are unset; serving plain HTTP");
            info!(%addr, "Listening on http (docs at /docs)");
            axum_server::bind(addr)
                .handle(handle)
                .serve(app.into_make_service())
                .await
        }
    }
}
