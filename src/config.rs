use anyhow::{Context, Result};
use std::path::PathBuf;

/// Configuration loaded from environment variables
#[derive(Debug)]
pub struct Config {
    pub library_path: PathBuf,
    pub history_path: Option<PathBuf>,
}

/// Load configuration from `.env` and environment
pub fn load_config() -> Result<Config> {
    // Load `.env` file if present
    dotenv::dotenv().ok();
    let library_path = std::env::var("CURATOR_LIBRARY")
        .map(PathBuf::from)
        .context("CURATOR_LIBRARY must point at a library snapshot")?;
    let history_path = std::env::var("CURATOR_HISTORY").ok().map(PathBuf::from);
    Ok(Config {
        library_path,
        history_path,
    })
}
