use super::config::FallbackConfig;
use super::genres::GenreNormalizer;
use super::scoring::CandidateScorer;
use crate::error::{CuratorError, Result};
use crate::models::{CandidateTrack, LibrarySection, TrackQuery};
use crate::sources::LibrarySource;
use chrono::{DateTime, Utc};
use log::{debug, info};

/// Ranks library tracks directly when history cannot fill a playlist
#[derive(Debug, Clone)]
pub struct FallbackBuilder {
    config: FallbackConfig,
    scorer: CandidateScorer,
    genres: GenreNormalizer,
}

impl FallbackBuilder {
    pub fn new(config: FallbackConfig, scorer: CandidateScorer, genres: GenreNormalizer) -> Self {
        Self {
            config,
            scorer,
            genres,
        }
    }

    /// Score-sorted library candidates, fetching `target_count * fetch_multiplier` tracks
    pub fn build(
        &self,
        library: &dyn LibrarySource,
        target_count: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<CandidateTrack>> {
        let section = Self::music_section(library.sections()?)?;
        let query = TrackQuery {
            sort: self.config.sort.clone(),
            libtype: self.config.libtype.clone(),
            max_results: target_count.saturating_mul(self.config.fetch_multiplier),
        };
        debug!(
            "Querying section '{}' for up to {} tracks sorted by {}",
            section.title, query.max_results, query.sort
        );

        let tracks = library.search_tracks(&section.key, &query)?;
        let mut candidates: Vec<CandidateTrack> = tracks
            .iter()
            .map(|track| {
                self.scorer
                    .score_track(track, track.plays(), track.last_played, now, &self.genres)
            })
            .collect();

        CandidateScorer::sort_by_score(&mut candidates);
        info!("Built {} fallback candidates from the library", candidates.len());
        Ok(candidates)
    }

    /// The one audio section; none or several is an error
    fn music_section(sections: Vec<LibrarySection>) -> Result<LibrarySection> {
        let mut music: Vec<LibrarySection> =
            sections.into_iter().filter(|s| s.is_music()).collect();
        match music.len() {
            0 => Err(CuratorError::NoMusicSection),
            1 => Ok(music.remove(0)),
            count => Err(CuratorError::AmbiguousMusicSection { count }),
        }
    }
}
