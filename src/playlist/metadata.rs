use super::scoring::ScoreBreakdown;
use crate::models::CandidateTrack;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Output of the diversity-constrained selector
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectionResult {
    pub selected: Vec<CandidateTrack>, // acceptance order
    pub remaining: Vec<CandidateTrack>, // input order
}

impl SelectionResult {
    pub fn selected_ids(&self) -> Vec<String> {
        self.selected.iter().map(|c| c.id.clone()).collect()
    }
}

/// Where a playlist entry came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateSource {
    Discovery,
    Fallback,
    Exploration,
}

/// Represents a track in a generated playlist with the numbers behind its pick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistEntry {
    pub track: CandidateTrack,
    pub source: CandidateSource,
    pub breakdown: ScoreBreakdown,
}

impl PlaylistEntry {
    pub fn new(track: CandidateTrack, source: CandidateSource) -> Self {
        let breakdown = ScoreBreakdown::from(&track);
        Self {
            track,
            source,
            breakdown,
        }
    }
}

/// A finished playlist ready for persistence by the caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedPlaylist {
    pub entries: Vec<PlaylistEntry>,
    pub exploration_rate: f64,
    pub statistics: DiscoveryStatistics,
}

impl GeneratedPlaylist {
    pub fn track_ids(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.track.id.clone()).collect()
    }

    pub fn count_from(&self, source: CandidateSource) -> usize {
        self.entries.iter().filter(|e| e.source == source).count()
    }
}

/// Aggregate view over a candidate pool
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryStatistics {
    pub total: usize,
    pub never_played: usize,
    pub forgotten: usize,
    pub rated: usize,
    pub unrated: usize,
    pub mean_days_since_played: Option<f64>,
}

impl DiscoveryStatistics {
    /// `forgotten_after_days` is exclusive: a track counts once strictly older
    pub fn from_candidates(
        candidates: &[CandidateTrack],
        now: DateTime<Utc>,
        forgotten_after_days: f64,
    ) -> Self {
        let mut stats = DiscoveryStatistics {
            total: candidates.len(),
            ..Default::default()
        };
        let mut day_sum = 0.0;
        let mut dated = 0usize;

        for candidate in candidates {
            match candidate.days_since_played(now) {
                Some(days) => {
                    day_sum += days;
                    dated += 1;
                    if days > forgotten_after_days {
                        stats.forgotten += 1;
                    }
                    if candidate.play_count == 0 {
                        stats.never_played += 1;
                    }
                }
                None => stats.never_played += 1,
            }

            if candidate.rating.is_some() {
                stats.rated += 1;
            } else {
                stats.unrated += 1;
            }
        }

        if dated > 0 {
            stats.mean_days_since_played = Some(day_sum / dated as f64);
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{Duration, TimeZone};

    fn candidate(
        id: &str,
        days_ago: Option<i64>,
        rating: Option<f32>,
        plays: u32,
    ) -> CandidateTrack {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        CandidateTrack {
            id: id.to_string(),
            title: format!("Track {id}"),
            artist: "Artist".to_string(),
            album: "Album".to_string(),
            genre: None,
            rating,
            recency_weight: 0.0,
            fallback_score: 0.0,
            final_score: 0.0,
            last_played: days_ago.map(|d| now - Duration::days(d)),
            play_count: plays,
        }
    }

    #[test]
    fn test_statistics_counts() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let pool = vec![
            candidate("1", Some(10), Some(7.0), 4),
            candidate("2", Some(120), None, 3),
            candidate("3", None, None, 0),
            candidate("4", Some(90), Some(9.0), 12),
        ];
        let stats = DiscoveryStatistics::from_candidates(&pool, now, 90.0);

        assert_eq!(stats.total, 4);
        assert_eq!(stats.never_played, 1);
        // Exactly 90 days is not yet forgotten
        assert_eq!(stats.forgotten, 1);
        assert_eq!(stats.rated, 2);
        assert_eq!(stats.unrated, 2);
        assert_relative_eq!(stats.mean_days_since_played.unwrap(), (10.0 + 120.0 + 90.0) / 3.0);
    }

    #[test]
    fn test_statistics_empty_pool() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let stats = DiscoveryStatistics::from_candidates(&[], now, 90.0);

        assert_eq!(stats, DiscoveryStatistics::default());
    }

    #[test]
    fn test_entry_carries_breakdown() {
        let mut track = candidate("9", Some(1), None, 1);
        track.final_score = 0.42;
        let entry = PlaylistEntry::new(track, CandidateSource::Fallback);

        assert_eq!(entry.breakdown.final_score, 0.42);
        assert_eq!(entry.source, CandidateSource::Fallback);
    }
}
