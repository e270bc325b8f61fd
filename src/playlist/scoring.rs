use super::config::ScoringConfig;
use super::genres::GenreNormalizer;
use crate::models::{CandidateTrack, TrackRecord, days_between};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The two inputs of a final score, kept for display next to each pick
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub recency_weight: f64,
    pub fallback_score: f64,
    pub final_score: f64,
}

impl From<&CandidateTrack> for ScoreBreakdown {
    fn from(candidate: &CandidateTrack) -> Self {
        Self {
            recency_weight: candidate.recency_weight,
            fallback_score: candidate.fallback_score,
            final_score: candidate.final_score,
        }
    }
}

/// Blends recency decay with a rating/play-count quality proxy
#[derive(Debug, Clone)]
pub struct CandidateScorer {
    config: ScoringConfig,
}

impl Default for CandidateScorer {
    fn default() -> Self {
        Self::new(ScoringConfig::default())
    }
}

impl CandidateScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    /// Exponential decay `exp(-ln2 * days / half_life)`; never played decays fully
    pub fn recency_weight(&self, days_since_played: Option<f64>) -> f64 {
        match days_since_played {
            Some(days) => {
                let days = days.max(0.0);
                (-std::f64::consts::LN_2 * days / self.config.half_life_days).exp()
            }
            None => 0.0,
        }
    }

    /// Quality proxy from rating and play count, both normalized to 0-1
    pub fn fallback_score(&self, rating: Option<f32>, play_count: u32) -> f64 {
        let rating = (f64::from(rating.unwrap_or(0.0)) / self.config.max_rating).clamp(0.0, 1.0);
        let cap = self.config.play_count_cap.max(1);
        let plays = f64::from(play_count.min(cap)) / f64::from(cap);

        self.config.rating_weight * rating + self.config.play_count_weight * plays
    }

    /// Weighted blend of recency and fallback; inputs are clamped to 0-1
    pub fn score(&self, recency_weight: f64, fallback_score: f64) -> ScoreBreakdown {
        let recency_weight = recency_weight.clamp(0.0, 1.0);
        let fallback_score = fallback_score.clamp(0.0, 1.0);
        let final_score = self.config.recency_weight * recency_weight
            + self.config.fallback_weight * fallback_score;

        ScoreBreakdown {
            recency_weight,
            fallback_score,
            final_score: final_score.clamp(0.0, 1.0),
        }
    }

    /// Build a scored candidate from a library record plus aggregated play data
    pub fn score_track(
        &self,
        track: &TrackRecord,
        play_count: u32,
        last_played: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
        genres: &GenreNormalizer,
    ) -> CandidateTrack {
        let days = last_played.map(|played| days_between(played, now));
        let breakdown = self.score(
            self.recency_weight(days),
            self.fallback_score(track.user_rating, play_count),
        );

        CandidateTrack {
            id: track.id.clone(),
            title: track.title.clone(),
            artist: track.artist.clone(),
            album: track.album.clone(),
            genre: genres.primary_genre(&track.genres),
            rating: track.user_rating,
            recency_weight: breakdown.recency_weight,
            fallback_score: breakdown.fallback_score,
            final_score: breakdown.final_score,
            last_played,
            play_count,
        }
    }

    /// Stable sort, highest final score first
    pub fn sort_by_score(candidates: &mut [CandidateTrack]) {
        candidates.sort_by(|a, b| {
            b.final_score
                .partial_cmp(&a.final_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::TimeZone;

    #[test]
    fn test_recency_halves_every_half_life() {
        let scorer = CandidateScorer::default();
        assert_relative_eq!(scorer.recency_weight(Some(0.0)), 1.0);
        assert_relative_eq!(scorer.recency_weight(Some(30.0)), 0.5, epsilon = 1e-12);
        assert_relative_eq!(scorer.recency_weight(Some(60.0)), 0.25, epsilon = 1e-12);
        assert_eq!(scorer.recency_weight(None), 0.0);
    }

    #[test]
    fn test_fallback_blends_rating_and_plays() {
        let scorer = CandidateScorer::default();
        assert_relative_eq!(scorer.fallback_score(Some(10.0), 50), 1.0, epsilon = 1e-12);
        assert_relative_eq!(scorer.fallback_score(Some(5.0), 0), 0.3, epsilon = 1e-12);
        assert_relative_eq!(scorer.fallback_score(None, 25), 0.2, epsilon = 1e-12);
        // Counts past the cap do not push the score beyond 1
        assert_relative_eq!(scorer.fallback_score(Some(10.0), 500), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_final_score_weights() {
        let scorer = CandidateScorer::default();
        let breakdown = scorer.score(0.5, 1.0);

        assert_relative_eq!(breakdown.final_score, 0.65, epsilon = 1e-12);
        assert_relative_eq!(breakdown.recency_weight, 0.5);
        assert_relative_eq!(breakdown.fallback_score, 1.0);
    }

    #[test]
    fn test_final_score_bounded_and_monotonic() {
        let scorer = CandidateScorer::default();
        let steps: Vec<f64> = (0..=10).map(|i| i as f64 / 10.0).collect();

        for &f in &steps {
            let mut previous = -1.0;
            for &r in &steps {
                let score = scorer.score(r, f).final_score;
                assert!((0.0..=1.0).contains(&score));
                assert!(score >= previous, "not monotonic in r at r={r}, f={f}");
                previous = score;
            }
        }
        for &r in &steps {
            let mut previous = -1.0;
            for &f in &steps {
                let score = scorer.score(r, f).final_score;
                assert!(score >= previous, "not monotonic in f at r={r}, f={f}");
                previous = score;
            }
        }
    }

    #[test]
    fn test_score_track_builds_candidate() {
        let scorer = CandidateScorer::default();
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let track = TrackRecord {
            id: "42".to_string(),
            title: "Night Drive".to_string(),
            artist: "Kavinsky".to_string(),
            album: "OutRun".to_string(),
            genres: vec!["Electronic".to_string(), "Synth Pop".to_string()],
            user_rating: Some(8.0),
            ..TrackRecord::default()
        };

        let candidate = scorer.score_track(
            &track,
            5,
            Some(now - chrono::Duration::days(30)),
            now,
            &GenreNormalizer::default(),
        );

        assert_eq!(candidate.genre.as_deref(), Some("synth-pop"));
        assert_eq!(candidate.play_count, 5);
        assert_relative_eq!(candidate.recency_weight, 0.5, epsilon = 1e-9);
        assert_relative_eq!(candidate.fallback_score, 0.6 * 0.8 + 0.4 * 0.1, epsilon = 1e-6);
        assert_relative_eq!(
            candidate.final_score,
            0.7 * 0.5 + 0.3 * candidate.fallback_score,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_sort_by_score_is_descending_and_stable() {
        let make = |id: &str, score: f64| CandidateTrack {
            id: id.to_string(),
            title: String::new(),
            artist: String::new(),
            album: String::new(),
            genre: None,
            rating: None,
            recency_weight: 0.0,
            fallback_score: 0.0,
            final_score: score,
            last_played: None,
            play_count: 0,
        };
        let mut candidates = vec![make("a", 0.2), make("b", 0.9), make("c", 0.2)];
        CandidateScorer::sort_by_score(&mut candidates);

        let ids: Vec<&str> = candidates.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
    }
}
