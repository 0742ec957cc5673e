//! X402 Facilitator Server
//!
//! Verifies and settles x402 payment proofs for resource servers.
//!
//! ## Storage Backends
//!
//! - **In-Memory**: default (ledger lost on restart)
//! - **Redis**: shared across instances (enable with the `redis` feature)
//!
//! ## Environment
//!
//! - `BIND_ADDRESS` (default `0.0.0.0:4020`)
//! - `STORAGE_BACKEND`: `memory` or `redis`
//! - `REDIS_URL`, `REDIS_KEY_PREFIX`

use x402_relay::{
    config::{FacilitatorServerConfig, StorageBackend},
    facilitator::local::{self, LocalFacilitator},
    facilitator_storage::InMemoryStorage,
    server, Result,
};

#[tokio::main]
async fn main() -> Result<()> {
    server::init_tracing();

    let config = FacilitatorServerConfig::from_env()?;
    let facilitator = build_facilitator(&config.storage).await?;

    tracing::info!(address = %config.bind_address, "Starting x402 facilitator");
    tracing::info!("  POST /verify");
    tracing::info!("  POST /settle");
    tracing::info!("  GET  /supported");
    tracing::info!("  GET  /health");

    server::serve(local::router(facilitator), &config.bind_address).await
}

async fn build_facilitator(storage: &StorageBackend) -> Result<LocalFacilitator> {
    match storage {
        StorageBackend::Memory => {
            tracing::info!("Using in-memory nonce storage");
            Ok(LocalFacilitator::new(InMemoryStorage::new()))
        }
        #[cfg(feature = "redis")]
        StorageBackend::Redis { url, key_prefix } => {
            use x402_relay::facilitator_storage::redis_storage::RedisStorage;

            tracing::info!(url = %url, "Using Redis nonce storage");
            let storage = RedisStorage::new(url, key_prefix.as_deref()).await?;
            Ok(LocalFacilitator::with_shared_storage(std::sync::Arc::new(
                storage,
            )))
        }
        #[cfg(not(feature = "redis"))]
        StorageBackend::Redis { .. } => Err(x402_relay::X402Error::config(
            "STORAGE_BACKEND=redis requires building with --features redis",
        )),
    }
}
