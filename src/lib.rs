//! Discovery playlist curation from media-server play history.
//!
//! The batch side ([`playlist`]) scores previously played tracks, falls back
//! to the library when history is thin, reserves a share of slots for
//! low-history picks and selects a diverse playlist. The live side
//! ([`adaptive`]) watches skips in curated sessions and adjusts the queue.

pub mod adaptive;
pub mod config;
pub mod error;
pub mod models;
pub mod playlist;
pub mod sources;
