//! Discovery candidates: tracks from listening history that have aged enough to
//! be worth hearing again.

use super::config::DiscoveryConfig;
use super::genres::GenreNormalizer;
use super::metadata::DiscoveryStatistics;
use super::scoring::CandidateScorer;
use crate::error::{CuratorError, Result};
use crate::models::{CandidateTrack, HistoryEntry, HistoryEntryKind, TrackRecord, days_between};
use crate::sources::{HistorySource, TrackLookup};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::collections::HashMap;

/// Per-track aggregate of history entries
#[derive(Debug, Clone, PartialEq)]
struct PlaySummary {
    play_count: u32,
    last_played: DateTime<Utc>,
}

/// Builds the discovery candidate pool from play history
#[derive(Debug, Clone)]
pub struct DiscoveryBuilder {
    config: DiscoveryConfig,
    scorer: CandidateScorer,
    genres: GenreNormalizer,
}

impl DiscoveryBuilder {
    pub fn new(config: DiscoveryConfig, scorer: CandidateScorer, genres: GenreNormalizer) -> Self {
        Self {
            config,
            scorer,
            genres,
        }
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// Score-sorted discovery candidates as of `now`
    pub fn build(
        &self,
        history: &dyn HistorySource,
        lookup: &dyn TrackLookup,
        now: DateTime<Utc>,
    ) -> Result<Vec<CandidateTrack>> {
        let entries = self.collect_history(history)?;
        let (order, summaries) = Self::aggregate(entries);
        if order.is_empty() {
            return Err(CuratorError::NoHistory);
        }
        info!(
            "Aggregated history into {} distinct tracks (target playlist size {})",
            order.len(),
            self.config.target_count
        );

        let tracks = self.fetch_tracks(lookup, &order);

        let mut too_recent = 0;
        let mut low_signal = 0;
        let mut highly_rated = 0;
        let mut below_floor = 0;
        let mut candidates = Vec::new();

        for id in &order {
            let Some(track) = tracks.get(id) else {
                continue;
            };
            let summary = &summaries[id];

            if days_between(summary.last_played, now) <= self.config.min_days_since_played {
                too_recent += 1;
                continue;
            }
            if !track.is_rated() && summary.play_count < self.config.min_plays_unrated {
                low_signal += 1;
                continue;
            }
            if !self.config.include_highly_rated
                && track
                    .user_rating
                    .is_some_and(|r| r >= self.config.high_rating_threshold)
            {
                highly_rated += 1;
                continue;
            }

            let candidate = self.scorer.score_track(
                track,
                summary.play_count,
                Some(summary.last_played),
                now,
                &self.genres,
            );
            if candidate.final_score < self.config.score_floor {
                below_floor += 1;
                continue;
            }
            candidates.push(candidate);
        }

        debug!(
            "Discovery filters: {too_recent} too recent, {low_signal} low signal, \
             {highly_rated} highly rated, {below_floor} below floor"
        );

        if candidates.is_empty() {
            return Err(CuratorError::InsufficientCandidates {
                history_tracks: order.len(),
                resolved: tracks.len(),
                too_recent,
                low_signal,
                highly_rated,
                below_floor,
            });
        }

        CandidateScorer::sort_by_score(&mut candidates);
        info!("Built {} discovery candidates", candidates.len());
        Ok(candidates)
    }

    /// Summary figures for a candidate pool
    pub fn statistics(
        &self,
        candidates: &[CandidateTrack],
        now: DateTime<Utc>,
    ) -> DiscoveryStatistics {
        DiscoveryStatistics::from_candidates(candidates, now, self.config.forgotten_after_days)
    }

    /// Page through history until it is exhausted or the entry budget is spent
    fn collect_history(&self, history: &dyn HistorySource) -> Result<Vec<HistoryEntry>> {
        let budget = self.config.max_history_entries;
        let page_size = self.config.history_page_size.max(1);
        let mut entries = Vec::new();
        let mut offset = 0;

        while offset < budget {
            let requested = page_size.min(budget - offset);
            let page = history.history(offset, requested)?;
            let received = page.len();
            debug!("History page at offset {offset}: {received}/{requested} entries");

            offset += received;
            entries.extend(page);
            if received < requested {
                break;
            }
        }

        Ok(entries)
    }

    /// Group track entries by identifier, keeping first-seen order
    fn aggregate(entries: Vec<HistoryEntry>) -> (Vec<String>, HashMap<String, PlaySummary>) {
        let mut order = Vec::new();
        let mut summaries: HashMap<String, PlaySummary> = HashMap::new();

        for entry in entries {
            if entry.kind != HistoryEntryKind::Track {
                continue;
            }
            match summaries.get_mut(&entry.track_id) {
                Some(summary) => {
                    summary.play_count += 1;
                    if entry.played_at > summary.last_played {
                        summary.last_played = entry.played_at;
                    }
                }
                None => {
                    order.push(entry.track_id.clone());
                    summaries.insert(
                        entry.track_id,
                        PlaySummary {
                            play_count: 1,
                            last_played: entry.played_at,
                        },
                    );
                }
            }
        }

        (order, summaries)
    }

    /// Bulk lookup in chunks; a failed chunk only costs its own tracks
    fn fetch_tracks(
        &self,
        lookup: &dyn TrackLookup,
        ids: &[String],
    ) -> HashMap<String, TrackRecord> {
        let mut tracks = HashMap::with_capacity(ids.len());

        for chunk in ids.chunks(self.config.fetch_chunk_size.max(1)) {
            match lookup.fetch_tracks(chunk) {
                Ok(found) => tracks.extend(found),
                Err(e) => warn!(
                    "Dropping {} history tracks after lookup failure: {e}",
                    chunk.len()
                ),
            }
        }

        let missing = ids.len().saturating_sub(tracks.len());
        if missing > 0 {
            debug!("{missing} history tracks could not be resolved in the library");
        }
        tracks
    }
}
