use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A track as the media server's library reports it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackRecord {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(rename = "userRating", default)]
    pub user_rating: Option<f32>, // 0-10 scale
    #[serde(rename = "viewCount", default)]
    pub play_count: Option<u32>,
    #[serde(rename = "lastViewedAt", default)]
    pub last_played: Option<DateTime<Utc>>,
}

impl TrackRecord {
    /// Play count with an absent server value treated as zero
    pub fn plays(&self) -> u32 {
        self.play_count.unwrap_or(0)
    }

    pub fn is_rated(&self) -> bool {
        self.user_rating.is_some()
    }
}

impl Default for TrackRecord {
    fn default() -> Self {
        TrackRecord {
            id: String::new(),
            title: "Unknown".to_string(),
            artist: "Unknown".to_string(),
            album: "Unknown".to_string(),
            genres: Vec::new(),
            user_rating: None,
            play_count: None,
            last_played: None,
        }
    }
}

/// Kind tag on a history entry; only `Track` entries feed discovery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryEntryKind {
    Track,
    Episode,
    Movie,
    #[serde(other)]
    Other,
}

/// One play in the server's listening history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(rename = "ratingKey")]
    pub track_id: String,
    #[serde(rename = "viewedAt")]
    pub played_at: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: HistoryEntryKind,
}

impl HistoryEntry {
    pub fn track(track_id: &str, played_at: DateTime<Utc>) -> Self {
        Self {
            track_id: track_id.to_string(),
            played_at,
            kind: HistoryEntryKind::Track,
        }
    }
}

/// A library section as listed by the media server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibrarySection {
    pub key: String,
    pub title: String,
    #[serde(rename = "type")]
    pub content_type: String, // "audio" for music sections
}

impl LibrarySection {
    pub fn is_music(&self) -> bool {
        self.content_type.eq_ignore_ascii_case("audio")
    }
}

/// Query passed to a library section's track search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackQuery {
    pub sort: String,
    pub libtype: String,
    #[serde(rename = "maxresults")]
    pub max_results: usize,
}

/// A scored track derived from history or library data, immutable once built
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateTrack {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub genre: Option<String>, // primary genre after normalization
    pub rating: Option<f32>,
    pub recency_weight: f64,
    pub fallback_score: f64,
    pub final_score: f64,
    pub last_played: Option<DateTime<Utc>>,
    pub play_count: u32,
}

impl CandidateTrack {
    /// Fractional days since the last play, `None` for never-played tracks
    pub fn days_since_played(&self, now: DateTime<Utc>) -> Option<f64> {
        self.last_played.map(|played| days_between(played, now))
    }
}

/// Fractional days between two instants, never negative
pub fn days_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> f64 {
    let seconds = later.signed_duration_since(earlier).num_seconds() as f64;
    (seconds / 86_400.0).max(0.0)
}

/// Playback event kinds reported by the live player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackEventKind {
    Played,
    Skipped,
}

/// A discrete event from a listening session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackEvent {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    #[serde(rename = "trackId")]
    pub track_id: String,
    #[serde(rename = "eventType")]
    pub kind: PlaybackEventKind,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "playlistId", default)]
    pub playlist_id: Option<String>,
}

/// Mutation to apply to a session's upcoming queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QueueAction {
    Remove,
    AddSimilar,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueCommand {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    pub action: QueueAction,
    #[serde(rename = "trackIds")]
    pub track_ids: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_history_entry_parses_server_json() {
        let json = r#"[
            {"ratingKey": "101", "viewedAt": "2024-03-01T10:00:00Z", "type": "track"},
            {"ratingKey": "202", "viewedAt": "2024-03-01T09:00:00Z", "type": "clip"}
        ]"#;
        let entries: Vec<HistoryEntry> = serde_json::from_str(json).unwrap();

        assert_eq!(entries[0].kind, HistoryEntryKind::Track);
        assert_eq!(entries[0].track_id, "101");
        assert_eq!(entries[1].kind, HistoryEntryKind::Other);
    }

    #[test]
    fn test_track_record_defaults_missing_fields() {
        let json = r#"{"id": "7", "title": "Song", "artist": "A", "album": "B"}"#;
        let track: TrackRecord = serde_json::from_str(json).unwrap();

        assert_eq!(track.plays(), 0);
        assert!(!track.is_rated());
        assert!(track.genres.is_empty());
        assert!(track.last_played.is_none());
    }

    #[test]
    fn test_days_between_is_fractional_and_clamped() {
        let a = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let b = Utc.with_ymd_and_hms(2024, 1, 2, 12, 0, 0).unwrap();

        assert_eq!(days_between(a, b), 1.5);
        assert_eq!(days_between(b, a), 0.0);
    }

    #[test]
    fn test_queue_command_wire_format() {
        let command = QueueCommand {
            session_id: "s1".to_string(),
            action: QueueAction::AddSimilar,
            track_ids: vec!["1".to_string()],
        };
        let json = serde_json::to_string(&command).unwrap();

        assert_eq!(
            json,
            r#"{"sessionId":"s1","action":"addSimilar","trackIds":["1"]}"#
        );
    }
}
