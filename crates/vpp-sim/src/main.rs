//! VPP simulator server.
//!
//! Listens on `VPP_SIM_PORT` (default 9001). Point a client at
//! `http://127.0.0.1:9001/` with the simulator's sToken (`VPP_SIM_TOKEN`,
//! default `sim-token`).

use std::net::SocketAddr;
use std::process::ExitCode;

use tracing_subscriber::EnvFilter;
use vpp_sim::{router, AppState, SimConfig};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let port: u16 = std::env::var("VPP_SIM_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(9001);

    let config = SimConfig::from_env();
    tracing::info!(
        page_size = config.page_size,
        assets = config.assets.len(),
        "seeding simulated VPP account"
    );
    let app = router(AppState::new(config));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(%addr, error = %e, "failed to bind listener");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!("vpp-sim listening on {addr}");

    if let Err(e) = axum::serve(listener, app.into_make_service()).await {
        tracing::error!(error = %e, "server error");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
