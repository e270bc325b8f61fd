pub mod config;
pub mod discovery;
pub mod exploration;
pub mod fallback;
pub mod generator;
pub mod genres;
pub mod metadata;
pub mod scoring;
pub mod selector;

#[cfg(test)]
mod config_tests;

pub use config::*;
pub use generator::*;
pub use metadata::*;
