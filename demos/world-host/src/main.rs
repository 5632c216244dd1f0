//! A minimal world host: events and positions only, no media subsystem.
//!
//! Run with `RUST_LOG=info cargo run -p world-host`, then point clients at
//! `ws://127.0.0.1:4000`.

use atrium::{AtriumError, HostServer};
use atrium_media::NullMedia;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), AtriumError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let addr = std::env::var("ATRIUM_BIND").unwrap_or_else(|_| "127.0.0.1:4000".to_string());

    let server = HostServer::<NullMedia>::builder().bind(&addr).build(NullMedia).await?;
    tracing::info!(%addr, "world host ready");
    server.run().await
}
