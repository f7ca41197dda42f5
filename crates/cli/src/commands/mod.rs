//! CLI subcommand implementations.

pub mod products;
pub mod seed;

use gundam_store::config::{BackendConfig, StoreConfig};
use thiserror::Error;

/// Errors shared by the commands.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The in-memory backend lives inside the server process.
    #[error("This command needs STORE_BACKEND=rest; the in-memory backend is seeded via STORE_SEED_FILE")]
    MemoryBackend,
}

/// Load the store configuration and require the REST backend.
///
/// # Errors
///
/// Returns the configuration error, or `CommandError::MemoryBackend`.
pub fn rest_config() -> Result<StoreConfig, Box<dyn std::error::Error>> {
    let config = StoreConfig::from_env()?;
    if matches!(config.backend, BackendConfig::Memory) {
        return Err(CommandError::MemoryBackend.into());
    }
    Ok(config)
}
