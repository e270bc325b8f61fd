//! Live skip-pattern detection for curated playlists.
//!
//! One small state machine per listening session: `Idle` until the first
//! relevant event, `Tracking` while skips accumulate in a sliding window,
//! and `Cooldown` for a fixed interval after an adaptation fires. Cooldown
//! is a timestamp comparison against event time; nothing here ever blocks.

use crate::models::{PlaybackEvent, PlaybackEventKind, QueueAction, QueueCommand, TrackRecord};
use crate::playlist::config::AdaptiveConfig;
use crate::playlist::genres::{GenreConfig, GenreNormalizer};
use crate::sources::{PlaybackQueue, TrackLookup};
use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Tracking,
    Cooldown { until: DateTime<Utc> },
}

/// What a detection concluded about the listener
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Adaptation {
    GenreFatigue { genre: String },
    ArtistAversion { artist: String },
}

#[derive(Debug, Clone)]
struct SkipRecord {
    at: DateTime<Utc>,
    genre: Option<String>,
    artist: String,
}

#[derive(Debug, Clone)]
struct SessionState {
    phase: SessionPhase,
    skips: VecDeque<SkipRecord>,
    recent_plays: VecDeque<String>,
    last_activity: DateTime<Utc>,
}

impl SessionState {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            phase: SessionPhase::Idle,
            skips: VecDeque::new(),
            recent_plays: VecDeque::new(),
            last_activity: now,
        }
    }
}

fn artist_key(artist: &str) -> String {
    artist.trim().to_lowercase()
}

/// `at` shifted by `secs`, or `None` when the result is out of range
fn shifted(at: DateTime<Utc>, secs: i64) -> Option<DateTime<Utc>> {
    Duration::try_seconds(secs).and_then(|delta| at.checked_add_signed(delta))
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Watches playback events and decides when a session's queue should change
#[derive(Debug)]
pub struct SkipPatternDetector {
    config: AdaptiveConfig,
    genres: GenreNormalizer,
    managed: Mutex<HashSet<String>>,
    sessions: Mutex<HashMap<String, SessionState>>,
}

impl SkipPatternDetector {
    pub fn new(config: AdaptiveConfig, genres: &GenreConfig) -> Self {
        Self {
            config,
            genres: GenreNormalizer::new(genres),
            managed: Mutex::new(HashSet::new()),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Mark a playlist as curator-generated so its sessions are watched
    pub fn register_playlist(&self, playlist_id: &str) {
        lock(&self.managed).insert(playlist_id.to_string());
    }

    pub fn is_managed(&self, playlist_id: Option<&str>) -> bool {
        playlist_id.is_some_and(|id| lock(&self.managed).contains(id))
    }

    pub fn session_phase(&self, session_id: &str) -> Option<SessionPhase> {
        lock(&self.sessions).get(session_id).map(|s| s.phase)
    }

    pub fn active_sessions(&self) -> usize {
        lock(&self.sessions).len()
    }

    /// Drop sessions with no activity for longer than the session timeout
    pub fn evict_idle(&self, now: DateTime<Utc>) -> usize {
        let mut sessions = lock(&self.sessions);
        Self::evict_expired(&mut sessions, now, self.config.session_timeout_secs)
    }

    fn evict_expired(
        sessions: &mut HashMap<String, SessionState>,
        now: DateTime<Utc>,
        timeout_secs: i64,
    ) -> usize {
        let cutoff =
            shifted(now, timeout_secs.saturating_neg()).unwrap_or(DateTime::<Utc>::MIN_UTC);
        let before = sessions.len();
        sessions.retain(|_, state| state.last_activity >= cutoff);
        let evicted = before - sessions.len();
        if evicted > 0 {
            debug!("Evicted {evicted} idle sessions");
        }
        evicted
    }

    /// Feed one event and return the queue commands it triggers
    ///
    /// `track` is the metadata of the event's track; skips without it are not
    /// counted. `upcoming` is the session's queue after the current track.
    pub fn observe(
        &self,
        event: &PlaybackEvent,
        track: Option<&TrackRecord>,
        upcoming: &[TrackRecord],
    ) -> Vec<QueueCommand> {
        if !self.is_managed(event.playlist_id.as_deref()) {
            debug!("Ignoring event for unmanaged playlist in session {}", event.session_id);
            return Vec::new();
        }

        let now = event.timestamp;
        let mut sessions = lock(&self.sessions);
        Self::evict_expired(&mut sessions, now, self.config.session_timeout_secs);
        if !sessions.contains_key(&event.session_id) && sessions.len() >= self.config.max_sessions {
            let oldest = sessions
                .iter()
                .min_by_key(|(_, state)| state.last_activity)
                .map(|(id, _)| id.clone());
            if let Some(oldest) = oldest {
                debug!("Session limit reached, evicting {oldest}");
                sessions.remove(&oldest);
            }
        }

        let state = sessions
            .entry(event.session_id.clone())
            .or_insert_with(|| SessionState::new(now));
        state.last_activity = now;

        match state.phase {
            SessionPhase::Idle => {
                debug!("Session {} now tracking", event.session_id);
                state.phase = SessionPhase::Tracking;
            }
            SessionPhase::Cooldown { until } if now >= until => {
                info!("Session {} cooldown over, tracking again", event.session_id);
                state.phase = SessionPhase::Tracking;
            }
            _ => {}
        }

        match event.kind {
            PlaybackEventKind::Played => {
                state.recent_plays.push_front(event.track_id.clone());
                state.recent_plays.truncate(self.config.backfill_seed_count);
                Vec::new()
            }
            PlaybackEventKind::Skipped => {
                if matches!(state.phase, SessionPhase::Cooldown { .. }) {
                    return Vec::new();
                }
                let Some(track) = track else {
                    return Vec::new();
                };
                self.record_skip(state, now, track);
                self.detect(&event.session_id, state, now, upcoming)
            }
        }
    }

    fn record_skip(&self, state: &mut SessionState, now: DateTime<Utc>, track: &TrackRecord) {
        let window_start = shifted(now, self.config.window_secs.saturating_neg())
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        while state.skips.front().is_some_and(|s| s.at < window_start) {
            state.skips.pop_front();
        }
        state.skips.push_back(SkipRecord {
            at: now,
            genre: self.genres.primary_genre(&track.genres),
            artist: artist_key(&track.artist),
        });
    }

    /// Genre fatigue first, then artist aversion, both keyed on the latest skip
    fn detect(
        &self,
        session_id: &str,
        state: &mut SessionState,
        now: DateTime<Utc>,
        upcoming: &[TrackRecord],
    ) -> Vec<QueueCommand> {
        let Some(latest) = state.skips.back().cloned() else {
            return Vec::new();
        };

        let mut detections = Vec::new();
        if let Some(genre) = &latest.genre {
            let count = state
                .skips
                .iter()
                .filter(|s| s.genre.as_ref() == Some(genre))
                .count();
            if count >= self.config.min_genre_skips {
                detections.push(Adaptation::GenreFatigue { genre: genre.clone() });
            }
        }
        let artist_count = state.skips.iter().filter(|s| s.artist == latest.artist).count();
        if artist_count >= self.config.min_artist_skips {
            detections.push(Adaptation::ArtistAversion {
                artist: latest.artist.clone(),
            });
        }

        for adaptation in detections {
            let targets = self.removal_targets(&adaptation, upcoming);
            if targets.is_empty() {
                debug!("{adaptation:?} in session {session_id} matched no upcoming tracks");
                continue;
            }

            info!(
                "{adaptation:?} in session {session_id}: removing {} upcoming tracks",
                targets.len()
            );
            let mut commands = vec![QueueCommand {
                session_id: session_id.to_string(),
                action: QueueAction::Remove,
                track_ids: targets,
            }];
            if self.config.backfill && !state.recent_plays.is_empty() {
                commands.push(QueueCommand {
                    session_id: session_id.to_string(),
                    action: QueueAction::AddSimilar,
                    track_ids: state.recent_plays.iter().cloned().collect(),
                });
            }

            state.phase = SessionPhase::Cooldown {
                until: shifted(now, self.config.cooldown_secs)
                    .unwrap_or(DateTime::<Utc>::MAX_UTC),
            };
            state.skips.clear();
            return commands;
        }
        Vec::new()
    }

    fn removal_targets(&self, adaptation: &Adaptation, upcoming: &[TrackRecord]) -> Vec<String> {
        upcoming
            .iter()
            .filter(|track| match adaptation {
                Adaptation::GenreFatigue { genre } => {
                    self.genres.process(&track.genres).contains(genre)
                }
                Adaptation::ArtistAversion { artist } => artist_key(&track.artist) == *artist,
            })
            .map(|track| track.id.clone())
            .collect()
    }
}

/// Connects the detector to the live queue; failures are logged and dropped
pub struct AdaptiveQueueController<'a> {
    detector: SkipPatternDetector,
    tracks: &'a dyn TrackLookup,
    queue: &'a dyn PlaybackQueue,
}

impl<'a> AdaptiveQueueController<'a> {
    pub fn new(
        detector: SkipPatternDetector,
        tracks: &'a dyn TrackLookup,
        queue: &'a dyn PlaybackQueue,
    ) -> Self {
        Self {
            detector,
            tracks,
            queue,
        }
    }

    pub fn detector(&self) -> &SkipPatternDetector {
        &self.detector
    }

    /// Handle one event; returns the commands the queue accepted
    pub fn handle(&self, event: &PlaybackEvent) -> Vec<QueueCommand> {
        if !self.detector.is_managed(event.playlist_id.as_deref()) {
            return Vec::new();
        }

        let (track, upcoming) = match event.kind {
            PlaybackEventKind::Played => (None, Vec::new()),
            PlaybackEventKind::Skipped => {
                let track = match self.tracks.fetch_tracks(std::slice::from_ref(&event.track_id)) {
                    Ok(mut found) => found.remove(&event.track_id),
                    Err(e) => {
                        warn!("Track lookup failed for {}: {e}", event.track_id);
                        None
                    }
                };
                if track.is_none() {
                    warn!("No metadata for skipped track {}, not counting it", event.track_id);
                }
                let upcoming = self.queue.upcoming(&event.session_id).unwrap_or_else(|e| {
                    warn!("Could not read queue for session {}: {e}", event.session_id);
                    Vec::new()
                });
                (track, upcoming)
            }
        };

        let mut applied = Vec::new();
        for command in self.detector.observe(event, track.as_ref(), &upcoming) {
            match self.queue.apply(&command) {
                Ok(()) => applied.push(command),
                Err(e) => warn!(
                    "Dropping {:?} command for session {}: {e}",
                    command.action, command.session_id
                ),
            }
        }
        applied
    }
}
