use super::genres::GenreConfig;
use crate::error::{CuratorError, Result};
use serde::{Deserialize, Serialize};

/// Upper bound for every adaptive interval
pub const MAX_ADAPTIVE_SECS: i64 = 365 * 24 * 60 * 60;

/// Every tunable the curation pipeline reads, loadable from JSON
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CuratorConfig {
    pub scoring: ScoringConfig,
    pub discovery: DiscoveryConfig,
    pub fallback: FallbackConfig,
    pub selection: SelectionConfig,
    pub exploration: ExplorationConfig,
    pub adaptive: AdaptiveConfig,
    pub genres: GenreConfig,
}

/// Weights and decay for the candidate scorer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub half_life_days: f64,
    pub recency_weight: f64,    // share of the final score from recency
    pub fallback_weight: f64,   // share of the final score from quality
    pub rating_weight: f64,     // share of the fallback score from rating
    pub play_count_weight: f64, // share of the fallback score from play count
    pub play_count_cap: u32,    // play counts at or above this normalize to 1.0
    pub max_rating: f64,
}

/// Discovery candidate pool parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub target_count: usize,
    pub min_days_since_played: f64,
    pub max_history_entries: usize,
    pub history_page_size: usize,
    pub include_highly_rated: bool,
    pub high_rating_threshold: f32,
    pub min_plays_unrated: u32,
    pub score_floor: f64,
    pub fetch_chunk_size: usize,
    pub forgotten_after_days: f64,
}

/// Library fallback query parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    pub fetch_multiplier: usize,
    pub sort: String,
    pub libtype: String,
}

/// Diversity caps for the selector
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    pub max_per_artist: usize,
    pub max_genre_share: f64,
    pub max_per_genre: Option<usize>, // overrides the share when set
}

/// Exploration rate policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplorationConfig {
    pub baseline: f64,
    pub step: f64,
    pub large_library_threshold: u64,
    pub high_skip_rate: f64,
    pub min_rate: f64,
    pub max_rate: f64,
    pub max_exploration_plays: u32,
}

/// Live skip-pattern detection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptiveConfig {
    pub window_secs: i64,
    pub min_genre_skips: usize,
    pub min_artist_skips: usize,
    pub cooldown_secs: i64,
    pub session_timeout_secs: i64,
    pub max_sessions: usize,
    pub backfill: bool,
    pub backfill_seed_count: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            half_life_days: 30.0,
            recency_weight: 0.7,
            fallback_weight: 0.3,
            rating_weight: 0.6,
            play_count_weight: 0.4,
            play_count_cap: 50,
            max_rating: 10.0,
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            target_count: 50,
            min_days_since_played: 30.0,
            max_history_entries: 5000,
            history_page_size: 500,
            include_highly_rated: true,
            high_rating_threshold: 8.0,
            min_plays_unrated: 3,
            score_floor: 0.1,
            fetch_chunk_size: 200,
            forgotten_after_days: 90.0,
        }
    }
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            fetch_multiplier: 5,
            sort: "userRating:desc".to_string(),
            libtype: "track".to_string(),
        }
    }
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            max_per_artist: 2,
            max_genre_share: 0.4,
            max_per_genre: None,
        }
    }
}

impl Default for ExplorationConfig {
    fn default() -> Self {
        Self {
            baseline: 0.15,
            step: 0.03,
            large_library_threshold: 10_000,
            high_skip_rate: 0.30,
            min_rate: 0.10,
            max_rate: 0.20,
            max_exploration_plays: 2,
        }
    }
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            window_secs: 600,
            min_genre_skips: 3,
            min_artist_skips: 2,
            cooldown_secs: 300,
            session_timeout_secs: 3600,
            max_sessions: 1024,
            backfill: true,
            backfill_seed_count: 3,
        }
    }
}

impl CuratorConfig {
    /// Load a configuration file; missing sections take their defaults
    pub fn load_from_file(path: &str) -> Result<CuratorConfig> {
        let content = std::fs::read_to_string(path)?;
        let config: CuratorConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make a run meaningless
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(CuratorError::Config(msg.to_string()));

        if self.scoring.half_life_days <= 0.0 {
            return invalid("scoring.half_life_days must be positive");
        }
        if self.scoring.play_count_cap == 0 {
            return invalid("scoring.play_count_cap must be at least 1");
        }
        if self.scoring.max_rating <= 0.0 {
            return invalid("scoring.max_rating must be positive");
        }
        if self.discovery.history_page_size == 0 || self.discovery.fetch_chunk_size == 0 {
            return invalid("discovery page and chunk sizes must be at least 1");
        }
        if !(self.selection.max_genre_share > 0.0 && self.selection.max_genre_share <= 1.0) {
            return invalid("selection.max_genre_share must be in (0, 1]");
        }
        if self.selection.max_per_artist == 0 {
            return invalid("selection.max_per_artist must be at least 1");
        }
        if self.fallback.fetch_multiplier == 0 {
            return invalid("fallback.fetch_multiplier must be at least 1");
        }
        if self.exploration.min_rate > self.exploration.max_rate {
            return invalid("exploration.min_rate exceeds exploration.max_rate");
        }
        let adaptive = &self.adaptive;
        if !(1..=MAX_ADAPTIVE_SECS).contains(&adaptive.window_secs) {
            return invalid("adaptive.window_secs must be between 1 second and one year");
        }
        if !(0..=MAX_ADAPTIVE_SECS).contains(&adaptive.cooldown_secs) {
            return invalid("adaptive.cooldown_secs must be between 0 and one year");
        }
        if !(1..=MAX_ADAPTIVE_SECS).contains(&adaptive.session_timeout_secs) {
            return invalid("adaptive.session_timeout_secs must be between 1 second and one year");
        }
        Ok(())
    }
}
