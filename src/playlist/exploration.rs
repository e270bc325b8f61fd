use super::config::ExplorationConfig;
use crate::sources::ExplorationSignals;
use log::{debug, warn};

/// Snapshot of the signals the exploration rate adapts to
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExplorationInputs {
    pub library_track_count: u64,
    pub recent_skip_rate: f64,
    pub discovery_playlist_enabled: bool,
}

/// Decides how much of a playlist is reserved for low-history picks
#[derive(Debug, Clone)]
pub struct ExplorationRateCalculator {
    config: ExplorationConfig,
}

impl Default for ExplorationRateCalculator {
    fn default() -> Self {
        Self::new(ExplorationConfig::default())
    }
}

impl ExplorationRateCalculator {
    pub fn new(config: ExplorationConfig) -> Self {
        Self { config }
    }

    /// Read live signals and compute the rate; any unreadable signal yields the baseline
    pub fn compute_rate(&self, signals: &dyn ExplorationSignals) -> f64 {
        match Self::read_inputs(signals) {
            Ok(inputs) => self.rate_for(&inputs),
            Err(e) => {
                warn!(
                    "Exploration signals unavailable, using baseline {:.2}: {e}",
                    self.config.baseline
                );
                self.config.baseline
            }
        }
    }

    /// Additive adjustments on the baseline, clamped to the configured range
    pub fn rate_for(&self, inputs: &ExplorationInputs) -> f64 {
        let cfg = &self.config;
        let mut rate = cfg.baseline;

        if inputs.library_track_count > cfg.large_library_threshold {
            rate += cfg.step;
        }
        if inputs.recent_skip_rate > cfg.high_skip_rate {
            rate += cfg.step;
        }
        if inputs.discovery_playlist_enabled {
            rate -= cfg.step;
        }

        let rate = rate.clamp(cfg.min_rate, cfg.max_rate);
        debug!("Exploration rate {rate:.3} from {inputs:?}");
        rate
    }

    fn read_inputs(signals: &dyn ExplorationSignals) -> anyhow::Result<ExplorationInputs> {
        Ok(ExplorationInputs {
            library_track_count: signals.library_track_count()?,
            recent_skip_rate: signals.recent_skip_rate()?,
            discovery_playlist_enabled: signals.discovery_playlist_enabled()?,
        })
    }
}
