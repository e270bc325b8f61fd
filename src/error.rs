use thiserror::Error;

/// Errors surfaced by a playlist-generation run
#[derive(Debug, Error)]
pub enum CuratorError {
    #[error("no listening history found")]
    NoHistory,

    #[error("no music library section found")]
    NoMusicSection,

    #[error("expected exactly one music library section, found {count}")]
    AmbiguousMusicSection { count: usize },

    /// Filtering removed every candidate even though history exists
    #[error(
        "insufficient tracks for discovery playlist: {history_tracks} tracks in history, \
         {resolved} resolved in library, {too_recent} played too recently, \
         {low_signal} unrated with too few plays, {highly_rated} excluded as highly rated, \
         {below_floor} below score floor"
    )]
    InsufficientCandidates {
        history_tracks: usize,
        resolved: usize,
        too_recent: usize,
        low_signal: usize,
        highly_rated: usize,
        below_floor: usize,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Source(#[from] anyhow::Error),
}

impl CuratorError {
    /// True when discovery had nothing to offer, as opposed to a broken collaborator
    pub fn is_discovery_shortfall(&self) -> bool {
        matches!(
            self,
            CuratorError::NoHistory | CuratorError::InsufficientCandidates { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, CuratorError>;
