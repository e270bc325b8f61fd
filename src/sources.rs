//! Seams to the media-server collaborators the curator reads from and writes to.
//!
//! The live server client lives outside this crate. [`SnapshotLibrary`] and
//! [`ReplayQueue`] back the traits with JSON snapshots for the CLI and tests.

use crate::models::{
    HistoryEntry, LibrarySection, QueueAction, QueueCommand, TrackQuery, TrackRecord,
};
use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;

#[cfg(test)]
use mockall::automock;

/// Bulk lookup of track records by identifier
#[cfg_attr(test, automock)]
pub trait TrackLookup {
    /// Unresolvable identifiers are absent from the returned map
    fn fetch_tracks(&self, ids: &[String]) -> Result<HashMap<String, TrackRecord>>;
}

/// Paginated, time-descending listening history
#[cfg_attr(test, automock)]
pub trait HistorySource {
    fn history(&self, offset: usize, page_size: usize) -> Result<Vec<HistoryEntry>>;
}

/// Library sections and their track search
#[cfg_attr(test, automock)]
pub trait LibrarySource {
    fn sections(&self) -> Result<Vec<LibrarySection>>;
    fn search_tracks(&self, section_key: &str, query: &TrackQuery) -> Result<Vec<TrackRecord>>;
}

/// Live signals the exploration rate adapts to
#[cfg_attr(test, automock)]
pub trait ExplorationSignals {
    fn library_track_count(&self) -> Result<u64>;
    fn recent_skip_rate(&self) -> Result<f64>;
    fn discovery_playlist_enabled(&self) -> Result<bool>;
}

/// A session's playback queue on the media server
#[cfg_attr(test, automock)]
pub trait PlaybackQueue {
    fn upcoming(&self, session_id: &str) -> Result<Vec<TrackRecord>>;
    fn apply(&self, command: &QueueCommand) -> Result<()>;
}

/// On-disk shape of a library snapshot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibrarySnapshot {
    #[serde(default)]
    pub sections: Vec<LibrarySection>,
    #[serde(default)]
    pub tracks: Vec<TrackRecord>,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    #[serde(default)]
    pub skip_rate: Option<f64>,
    #[serde(default)]
    pub discovery_playlist_enabled: bool,
    #[serde(default)]
    pub managed_playlists: Vec<String>,
    #[serde(default)]
    pub queues: HashMap<String, Vec<String>>,
}

/// Snapshot-backed implementation of the read-side collaborators
#[derive(Debug)]
pub struct SnapshotLibrary {
    snapshot: LibrarySnapshot,
    by_id: HashMap<String, TrackRecord>,
}

impl SnapshotLibrary {
    pub fn new(mut snapshot: LibrarySnapshot) -> Self {
        snapshot
            .history
            .sort_by(|a, b| b.played_at.cmp(&a.played_at));
        let by_id = snapshot
            .tracks
            .iter()
            .map(|track| (track.id.clone(), track.clone()))
            .collect();
        Self { snapshot, by_id }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("Failed to read snapshot '{}': {}", path.display(), e))?;
        let snapshot: LibrarySnapshot = serde_json::from_str(&content)?;
        Ok(Self::new(snapshot))
    }

    /// Replace the embedded history with entries from a separate file
    pub fn with_history_file(mut self, path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut history: Vec<HistoryEntry> = serde_json::from_str(&content)?;
        history.sort_by(|a, b| b.played_at.cmp(&a.played_at));
        self.snapshot.history = history;
        Ok(self)
    }

    pub fn snapshot(&self) -> &LibrarySnapshot {
        &self.snapshot
    }

    pub fn track(&self, id: &str) -> Option<&TrackRecord> {
        self.by_id.get(id)
    }
}

impl TrackLookup for SnapshotLibrary {
    fn fetch_tracks(&self, ids: &[String]) -> Result<HashMap<String, TrackRecord>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.by_id.get(id).map(|track| (id.clone(), track.clone())))
            .collect())
    }
}

impl HistorySource for SnapshotLibrary {
    fn history(&self, offset: usize, page_size: usize) -> Result<Vec<HistoryEntry>> {
        Ok(self
            .snapshot
            .history
            .iter()
            .skip(offset)
            .take(page_size)
            .cloned()
            .collect())
    }
}

impl LibrarySource for SnapshotLibrary {
    fn sections(&self) -> Result<Vec<LibrarySection>> {
        Ok(self.snapshot.sections.clone())
    }

    fn search_tracks(&self, _section_key: &str, query: &TrackQuery) -> Result<Vec<TrackRecord>> {
        let mut tracks = self.snapshot.tracks.clone();
        match query.sort.as_str() {
            "userRating:desc" => tracks.sort_by(|a, b| {
                b.user_rating
                    .unwrap_or(0.0)
                    .partial_cmp(&a.user_rating.unwrap_or(0.0))
                    .unwrap_or(std::cmp::Ordering::Equal)
            }),
            "viewCount:desc" => tracks.sort_by_key(|t| std::cmp::Reverse(t.plays())),
            other => return Err(anyhow!("Unsupported sort order: {other}")),
        }
        tracks.truncate(query.max_results);
        Ok(tracks)
    }
}

impl ExplorationSignals for SnapshotLibrary {
    fn library_track_count(&self) -> Result<u64> {
        Ok(self.snapshot.tracks.len() as u64)
    }

    fn recent_skip_rate(&self) -> Result<f64> {
        self.snapshot
            .skip_rate
            .ok_or_else(|| anyhow!("Skip rate not recorded in snapshot"))
    }

    fn discovery_playlist_enabled(&self) -> Result<bool> {
        Ok(self.snapshot.discovery_playlist_enabled)
    }
}

/// In-memory playback queues that apply commands the way the server would
#[derive(Debug)]
pub struct ReplayQueue<'a> {
    library: &'a SnapshotLibrary,
    queues: Mutex<HashMap<String, Vec<String>>>,
    applied: Mutex<Vec<QueueCommand>>,
}

impl<'a> ReplayQueue<'a> {
    pub fn new(library: &'a SnapshotLibrary) -> Self {
        Self {
            library,
            queues: Mutex::new(library.snapshot().queues.clone()),
            applied: Mutex::new(Vec::new()),
        }
    }

    pub fn applied(&self) -> Vec<QueueCommand> {
        self.applied.lock().map(|a| a.clone()).unwrap_or_default()
    }

    pub fn queue(&self, session_id: &str) -> Vec<String> {
        self.queues
            .lock()
            .ok()
            .and_then(|q| q.get(session_id).cloned())
            .unwrap_or_default()
    }

    /// Library tracks sharing a genre with any seed, excluding ones already queued
    fn similar_to(&self, seeds: &[String], queued: &HashSet<String>, limit: usize) -> Vec<String> {
        let seed_genres: HashSet<String> = seeds
            .iter()
            .filter_map(|id| self.library.track(id))
            .flat_map(|t| t.genres.iter().map(|g| g.to_lowercase()))
            .collect();

        self.library
            .snapshot()
            .tracks
            .iter()
            .filter(|t| !queued.contains(&t.id) && !seeds.contains(&t.id))
            .filter(|t| t.genres.iter().any(|g| seed_genres.contains(&g.to_lowercase())))
            .take(limit)
            .map(|t| t.id.clone())
            .collect()
    }
}

impl PlaybackQueue for ReplayQueue<'_> {
    fn upcoming(&self, session_id: &str) -> Result<Vec<TrackRecord>> {
        let queues = self
            .queues
            .lock()
            .map_err(|_| anyhow!("Queue state poisoned"))?;
        let ids = queues
            .get(session_id)
            .ok_or_else(|| anyhow!("No queue for session {session_id}"))?;
        Ok(ids
            .iter()
            .filter_map(|id| self.library.track(id).cloned())
            .collect())
    }

    fn apply(&self, command: &QueueCommand) -> Result<()> {
        let mut queues = self
            .queues
            .lock()
            .map_err(|_| anyhow!("Queue state poisoned"))?;
        let queue = queues
            .get_mut(&command.session_id)
            .ok_or_else(|| anyhow!("No queue for session {}", command.session_id))?;

        match command.action {
            QueueAction::Remove => queue.retain(|id| !command.track_ids.contains(id)),
            QueueAction::AddSimilar => {
                let queued: HashSet<String> = queue.iter().cloned().collect();
                let additions =
                    self.similar_to(&command.track_ids, &queued, command.track_ids.len());
                queue.extend(additions);
            }
        }

        if let Ok(mut applied) = self.applied.lock() {
            applied.push(command.clone());
        }
        Ok(())
    }
}
