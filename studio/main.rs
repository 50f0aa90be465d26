/// brainscan demo
///
/// Upload a brain MRI scan, pick a model, and get the predicted class,
/// per-class probabilities, a gradient saliency overlay and (when a Gemini
/// key is configured) a short explanation. Served by a synchronous
/// tiny_http server.
///
/// Run with:
///   cargo run --bin studio --release
/// Then open http://127.0.0.1:8501

mod handlers;
mod render;
mod routes;
mod state;
mod util;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tiny_http::Server;
use tracing::{error, info};

use brainscan::config::load_config;
use brainscan::logging::{init_logging, LogConfig};

use state::DemoState;

fn main() -> Result<()> {
    init_logging(&LogConfig::default()).map_err(anyhow::Error::msg)?;

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = load_config(config_path.as_deref()).context("Failed to load configuration")?;
    std::fs::create_dir_all(&config.saliency.output_dir)
        .with_context(|| format!("Failed to create {}", config.saliency.output_dir.display()))?;

    let addr = config.studio.addr.clone();
    let server = Server::http(&addr).map_err(|e| anyhow::anyhow!("Failed to bind {}: {}", addr, e))?;
    let shared_state = Arc::new(DemoState::new(config));

    // Each request gets its own thread so a slow explanation call does not
    // stall page loads.
    let server_thread = std::thread::spawn(move || {
        for request in server.incoming_requests() {
            let state_clone = Arc::clone(&shared_state);
            std::thread::spawn(move || {
                routes::dispatch(request, state_clone);
            });
        }
    });

    info!("demo running at http://{}", addr);
    println!("Open http://{} in your browser", addr);

    if server_thread.join().is_err() {
        error!("server thread panicked");
    }
    Ok(())
}
