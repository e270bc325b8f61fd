//! Diversity-constrained selection over a score-sorted candidate sequence.
//!
//! Selection runs in up to three left-to-right passes that relax constraints
//! monotonically: strict (artist and genre caps), genre-relaxed (artist cap
//! only) and unconstrained. An identifier accepted in one pass is never
//! reconsidered, so the result always fills the target whenever enough
//! distinct candidates exist.

use super::config::SelectionConfig;
use super::metadata::SelectionResult;
use crate::models::CandidateTrack;
use log::debug;
use std::collections::{HashMap, HashSet};

/// Constraint level of a selection pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionPass {
    Strict,
    GenreRelaxed,
    Unconstrained,
}

impl SelectionPass {
    pub const ALL: [SelectionPass; 3] = [
        SelectionPass::Strict,
        SelectionPass::GenreRelaxed,
        SelectionPass::Unconstrained,
    ];

    fn enforces_artist_cap(self) -> bool {
        self != SelectionPass::Unconstrained
    }

    fn enforces_genre_cap(self) -> bool {
        self == SelectionPass::Strict
    }
}

/// Parameters for one selection
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionRequest {
    pub target_count: usize,
    pub max_per_artist: usize,
    pub max_genre_share: f64,
    pub max_per_genre: Option<usize>,
    pub exclude: HashSet<String>,
}

impl SelectionRequest {
    pub fn new(target_count: usize, settings: &SelectionConfig) -> Self {
        Self {
            target_count,
            max_per_artist: settings.max_per_artist,
            max_genre_share: settings.max_genre_share,
            max_per_genre: settings.max_per_genre,
            exclude: HashSet::new(),
        }
    }

    pub fn excluding<I: IntoIterator<Item = String>>(mut self, ids: I) -> Self {
        self.exclude.extend(ids);
        self
    }

    /// Explicit cap, else the share of the target rounded down (at least one)
    pub fn genre_cap(&self) -> usize {
        self.max_per_genre.unwrap_or_else(|| {
            ((self.target_count as f64 * self.max_genre_share).floor() as usize).max(1)
        })
    }
}

/// Running tallies of what has been accepted so far
#[derive(Debug, Default)]
struct Tally {
    per_artist: HashMap<String, usize>,
    per_genre: HashMap<String, usize>,
}

impl Tally {
    fn artist_key(candidate: &CandidateTrack) -> String {
        candidate.artist.trim().to_lowercase()
    }

    fn admits(
        &self,
        candidate: &CandidateTrack,
        pass: SelectionPass,
        request: &SelectionRequest,
        genre_cap: usize,
    ) -> bool {
        if pass.enforces_artist_cap() {
            let count = self
                .per_artist
                .get(&Self::artist_key(candidate))
                .copied()
                .unwrap_or(0);
            if count >= request.max_per_artist {
                return false;
            }
        }
        if pass.enforces_genre_cap() {
            if let Some(genre) = &candidate.genre {
                if self.per_genre.get(genre).copied().unwrap_or(0) >= genre_cap {
                    return false;
                }
            }
        }
        true
    }

    fn record(&mut self, candidate: &CandidateTrack) {
        *self.per_artist.entry(Self::artist_key(candidate)).or_insert(0) += 1;
        if let Some(genre) = &candidate.genre {
            *self.per_genre.entry(genre.clone()).or_insert(0) += 1;
        }
    }
}

/// Picks a diverse playlist from pre-sorted candidates
pub struct DiversitySelector;

impl DiversitySelector {
    /// Select up to `target_count` candidates; the input must already be sorted by score
    pub fn select(candidates: &[CandidateTrack], request: &SelectionRequest) -> SelectionResult {
        let mut seen = HashSet::new();
        let unique: Vec<&CandidateTrack> = candidates
            .iter()
            .filter(|c| seen.insert(c.id.as_str()))
            .collect();

        let genre_cap = request.genre_cap();
        let mut accepted = vec![false; unique.len()];
        let mut selected: Vec<CandidateTrack> = Vec::with_capacity(request.target_count);
        let mut tally = Tally::default();

        for pass in SelectionPass::ALL {
            if selected.len() >= request.target_count {
                break;
            }
            let before = selected.len();

            for (index, candidate) in unique.iter().enumerate() {
                if selected.len() >= request.target_count {
                    break;
                }
                if accepted[index] || request.exclude.contains(&candidate.id) {
                    continue;
                }
                if !tally.admits(candidate, pass, request, genre_cap) {
                    continue;
                }

                tally.record(candidate);
                accepted[index] = true;
                selected.push((*candidate).clone());
            }

            debug!(
                "{:?} pass accepted {} candidates ({}/{})",
                pass,
                selected.len() - before,
                selected.len(),
                request.target_count
            );
        }

        let remaining = unique
            .iter()
            .zip(&accepted)
            .filter(|(_, taken)| !**taken)
            .map(|(candidate, _)| (*candidate).clone())
            .collect();

        SelectionResult {
            selected,
            remaining,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn candidate(id: &str, artist: &str, genre: Option<&str>, score: f64) -> CandidateTrack {
        CandidateTrack {
            id: id.to_string(),
            title: format!("Track {id}"),
            artist: artist.to_string(),
            album: "Album".to_string(),
            genre: genre.map(|g| g.to_string()),
            rating: None,
            recency_weight: score,
            fallback_score: score,
            final_score: score,
            last_played: None,
            play_count: 1,
        }
    }

    fn request(target: usize, per_artist: usize) -> SelectionRequest {
        SelectionRequest {
            target_count: target,
            max_per_artist: per_artist,
            max_genre_share: 0.4,
            max_per_genre: None,
            exclude: HashSet::new(),
        }
    }

    fn ids(tracks: &[CandidateTrack]) -> Vec<&str> {
        tracks.iter().map(|c| c.id.as_str()).collect()
    }

    fn per_artist(tracks: &[CandidateTrack]) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for track in tracks {
            *counts.entry(track.artist.clone()).or_insert(0) += 1;
        }
        counts
    }

    #[test]
    fn test_artist_cap_honored_when_feasible() {
        let pool: Vec<CandidateTrack> = (0..6)
            .map(|i| {
                let artist = ["A", "B", "C"][i / 2];
                candidate(&i.to_string(), artist, Some("jazz"), 1.0 - i as f64 / 10.0)
            })
            .collect();
        let result = DiversitySelector::select(&pool, &request(6, 2));

        assert_eq!(result.selected.len(), 6);
        assert!(per_artist(&result.selected).values().all(|&n| n == 2));
    }

    #[test]
    fn test_single_artist_relaxes_to_fill_target() {
        let pool: Vec<CandidateTrack> = (0..5)
            .map(|i| candidate(&i.to_string(), "Solo", Some("folk"), 1.0 - i as f64 / 10.0))
            .collect();
        let result = DiversitySelector::select(&pool, &request(5, 2));

        assert_eq!(ids(&result.selected), vec!["0", "1", "2", "3", "4"]);
        assert!(result.remaining.is_empty());
    }

    #[test]
    fn test_genre_cap_applies_in_strict_pass() {
        let pool = vec![
            candidate("h1", "A", Some("house"), 0.9),
            candidate("h2", "B", Some("house"), 0.8),
            candidate("h3", "C", Some("house"), 0.7),
            candidate("j1", "D", Some("jazz"), 0.6),
            candidate("f1", "E", Some("folk"), 0.5),
        ];
        // 40% of 4 rounds down to one house track in the strict pass
        let result = DiversitySelector::select(&pool, &request(4, 2));

        assert_eq!(ids(&result.selected), vec!["h1", "j1", "f1", "h2"]);
        assert_eq!(ids(&result.remaining), vec!["h3"]);
    }

    #[test]
    fn test_genre_relaxed_pass_keeps_artist_cap() {
        let pool = vec![
            candidate("a1", "A", Some("house"), 0.9),
            candidate("a2", "A", Some("house"), 0.8),
            candidate("a3", "A", Some("house"), 0.7),
            candidate("b1", "B", Some("house"), 0.6),
            candidate("c1", "C", Some("jazz"), 0.5),
        ];
        let result = DiversitySelector::select(&pool, &request(4, 2));

        // Strict: a1 (house 1 of cap 1), c1; relaxed: a2, b1
        assert_eq!(ids(&result.selected), vec!["a1", "c1", "a2", "b1"]);
        assert_eq!(ids(&result.remaining), vec!["a3"]);
    }

    #[test]
    fn test_untagged_candidates_ignore_genre_cap() {
        let pool: Vec<CandidateTrack> = (0..4)
            .map(|i| candidate(&i.to_string(), &format!("Artist {i}"), None, 0.5))
            .collect();
        let result = DiversitySelector::select(&pool, &request(4, 1));

        assert_eq!(result.selected.len(), 4);
    }

    #[test]
    fn test_exclusions_and_duplicates() {
        let pool = vec![
            candidate("x", "A", None, 0.9),
            candidate("y", "B", None, 0.8),
            candidate("y", "B", None, 0.8),
            candidate("z", "C", None, 0.7),
        ];
        let req = request(3, 2).excluding(vec!["x".to_string()]);
        let result = DiversitySelector::select(&pool, &req);

        assert_eq!(ids(&result.selected), vec!["y", "z"]);
        assert_eq!(ids(&result.remaining), vec!["x"]);
    }

    #[test]
    fn test_zero_target_selects_nothing() {
        let pool = vec![candidate("x", "A", None, 0.9)];
        let result = DiversitySelector::select(&pool, &request(0, 2));

        assert!(result.selected.is_empty());
        assert_eq!(ids(&result.remaining), vec!["x"]);
    }

    #[test]
    fn test_explicit_genre_cap_overrides_share() {
        let mut req = request(10, 2);
        assert_eq!(req.genre_cap(), 4);
        req.max_per_genre = Some(1);
        assert_eq!(req.genre_cap(), 1);
        assert_eq!(request(1, 2).genre_cap(), 1);
    }

    #[test]
    fn test_partition_invariants_on_random_pools() {
        let mut rng = StdRng::seed_from_u64(7);
        let genres = ["house", "jazz", "folk", "ambient"];

        for _ in 0..200 {
            let size = rng.gen_range(0..30);
            let mut pool: Vec<CandidateTrack> = (0..size)
                .map(|_| {
                    let id = rng.gen_range(0..20).to_string();
                    let artist = format!("Artist {}", rng.gen_range(0..5));
                    let genre = genres[rng.gen_range(0..genres.len())];
                    candidate(&id, &artist, Some(genre), rng.gen_range(0.0..1.0))
                })
                .collect();
            pool.sort_by(|a, b| b.final_score.partial_cmp(&a.final_score).unwrap());

            let target = rng.gen_range(0..15);
            let result = DiversitySelector::select(&pool, &request(target, 2));

            let distinct: HashSet<&str> = pool.iter().map(|c| c.id.as_str()).collect();
            let selected: HashSet<&str> = result.selected.iter().map(|c| c.id.as_str()).collect();
            let remaining: HashSet<&str> = result.remaining.iter().map(|c| c.id.as_str()).collect();

            assert_eq!(result.selected.len(), target.min(distinct.len()));
            assert_eq!(selected.len(), result.selected.len(), "duplicate in selected");
            assert_eq!(remaining.len(), result.remaining.len(), "duplicate in remaining");
            assert!(selected.is_disjoint(&remaining));
            assert_eq!(selected.len() + remaining.len(), distinct.len());
        }
    }
}
