use super::discovery::DiscoveryBuilder;
use super::exploration::ExplorationRateCalculator;
use super::fallback::FallbackBuilder;
use super::genres::GenreNormalizer;
use super::scoring::CandidateScorer;
use super::selector::{DiversitySelector, SelectionRequest};
use super::{CandidateSource, CuratorConfig, GeneratedPlaylist, PlaylistEntry, SelectionResult};
use crate::error::Result;
use crate::models::CandidateTrack;
use crate::sources::{ExplorationSignals, HistorySource, LibrarySource, TrackLookup};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use rand::Rng;
use rand::seq::SliceRandom;
use std::collections::HashSet;

/// The collaborators one generation run reads from
#[derive(Clone, Copy)]
pub struct GenerationSources<'a> {
    pub history: &'a dyn HistorySource,
    pub tracks: &'a dyn TrackLookup,
    pub library: &'a dyn LibrarySource,
    pub signals: &'a dyn ExplorationSignals,
}

/// Main playlist generator
pub struct PlaylistGenerator {
    config: CuratorConfig,
    discovery: DiscoveryBuilder,
    fallback: FallbackBuilder,
    exploration: ExplorationRateCalculator,
}

impl PlaylistGenerator {
    pub fn new(config: CuratorConfig) -> Self {
        let scorer = CandidateScorer::new(config.scoring.clone());
        let genres = GenreNormalizer::new(&config.genres);
        Self {
            discovery: DiscoveryBuilder::new(
                config.discovery.clone(),
                scorer.clone(),
                genres.clone(),
            ),
            fallback: FallbackBuilder::new(config.fallback.clone(), scorer, genres),
            exploration: ExplorationRateCalculator::new(config.exploration.clone()),
            config,
        }
    }

    pub fn discovery(&self) -> &DiscoveryBuilder {
        &self.discovery
    }

    /// Generate a playlist of up to `target_count` tracks
    ///
    /// `rng` drives the exploratory draw; everything else is deterministic.
    pub fn generate_playlist<R: Rng + ?Sized>(
        &self,
        sources: GenerationSources<'_>,
        target_count: usize,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Result<GeneratedPlaylist> {
        let rate = self.exploration.compute_rate(sources.signals);
        let exploration_slots = ((target_count as f64 * rate).round() as usize).min(target_count);

        let discovered = match self.discovery.build(sources.history, sources.tracks, now) {
            Ok(candidates) => candidates,
            Err(e) if e.is_discovery_shortfall() => {
                warn!("Discovery unavailable, using library fallback only: {e}");
                Vec::new()
            }
            Err(e) => return Err(e),
        };
        let statistics = self.discovery.statistics(&discovered, now);
        let discovered_ids: HashSet<String> = discovered.iter().map(|c| c.id.clone()).collect();

        let library_pool = if discovered.len() < target_count || exploration_slots > 0 {
            match self.fallback.build(sources.library, target_count, now) {
                Ok(candidates) => candidates,
                Err(e) if !discovered.is_empty() => {
                    warn!("Library fallback failed, continuing with discovery only: {e}");
                    Vec::new()
                }
                Err(e) => return Err(e),
            }
        } else {
            Vec::new()
        };

        let mut exploratory: Vec<CandidateTrack> = library_pool
            .iter()
            .filter(|c| c.play_count <= self.config.exploration.max_exploration_plays)
            .filter(|c| !discovered_ids.contains(&c.id))
            .cloned()
            .collect();
        exploratory.shuffle(rng);

        let explore = DiversitySelector::select(
            &exploratory,
            &SelectionRequest::new(exploration_slots, &self.config.selection),
        );
        let explore_ids = explore.selected_ids();

        // Discovery fills the exploit slots on its own; the library only covers what it cannot
        let exploit_target = target_count - explore.selected.len();
        let from_discovery = DiversitySelector::select(
            &discovered,
            &SelectionRequest::new(exploit_target, &self.config.selection)
                .excluding(explore_ids.iter().cloned()),
        );

        let mut taken: HashSet<String> = explore_ids.into_iter().collect();
        taken.extend(from_discovery.selected_ids());
        let fallback_target = exploit_target - from_discovery.selected.len();
        let from_library = if fallback_target > 0 {
            debug!("Discovery short by {fallback_target}, topping up from the library");
            DiversitySelector::select(
                &library_pool,
                &SelectionRequest::new(fallback_target, &self.config.selection)
                    .excluding(taken.iter().cloned()),
            )
        } else {
            SelectionResult::default()
        };
        taken.extend(from_library.selected_ids());

        let mut explore_entries: Vec<PlaylistEntry> = explore
            .selected
            .into_iter()
            .map(|c| PlaylistEntry::new(c, CandidateSource::Exploration))
            .collect();

        // Not enough exploit candidates: let unused exploratory picks fill the gap
        let shortfall = fallback_target - from_library.selected.len();
        if shortfall > 0 && !explore.remaining.is_empty() {
            let topup = DiversitySelector::select(
                &explore.remaining,
                &SelectionRequest::new(shortfall, &self.config.selection)
                    .excluding(taken.iter().cloned()),
            );
            explore_entries.extend(
                topup
                    .selected
                    .into_iter()
                    .map(|c| PlaylistEntry::new(c, CandidateSource::Exploration)),
            );
        }

        let exploit_entries: Vec<PlaylistEntry> = from_discovery
            .selected
            .into_iter()
            .map(|c| PlaylistEntry::new(c, CandidateSource::Discovery))
            .chain(
                from_library
                    .selected
                    .into_iter()
                    .map(|c| PlaylistEntry::new(c, CandidateSource::Fallback)),
            )
            .collect();

        let entries = Self::interleave(exploit_entries, explore_entries);
        info!(
            "Generated {} of {} tracks (exploration rate {:.2}, {} discovery candidates)",
            entries.len(),
            target_count,
            rate,
            discovered.len()
        );

        Ok(GeneratedPlaylist {
            entries,
            exploration_rate: rate,
            statistics,
        })
    }

    /// Spread exploratory picks evenly through the exploit sequence
    fn interleave(
        exploit: Vec<PlaylistEntry>,
        explore: Vec<PlaylistEntry>,
    ) -> Vec<PlaylistEntry> {
        if explore.is_empty() {
            return exploit;
        }

        let spacing = (exploit.len() / (explore.len() + 1)).max(1);
        let mut out = Vec::with_capacity(exploit.len() + explore.len());
        let mut explore = explore.into_iter();

        for (i, entry) in exploit.into_iter().enumerate() {
            out.push(entry);
            if (i + 1) % spacing == 0 {
                if let Some(pick) = explore.next() {
                    out.push(pick);
                }
            }
        }
        out.extend(explore);
        out
    }
}
