//! Cardpit server daemon.
//!
//! Configuration comes from the environment: `CARDPIT_ADDR` for the
//! listen address and `RUST_LOG` for log filtering.

use cardpit::{CardpitError, CardpitServer};

#[tokio::main]
async fn main() -> Result<(), CardpitError> {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()))
        .init();

    let addr = std::env::var("CARDPIT_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());

    let server = CardpitServer::builder().bind(&addr).build().await?;
    tracing::info!(addr = %server.local_addr()?, "cardpit ready");
    server.run().await
}
