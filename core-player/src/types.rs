//! # Player Domain Types
//!
//! Canonical, backend-independent vocabulary shared by drivers, the manager
//! and event consumers.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

// ============================================================================
// Track
// ============================================================================

/// A now-playing item as seen by one player.
///
/// Identity fields (`id`, `title`, `album`, `artist`, `duration`) are fixed at
/// construction. Enrichment fields (`artwork`, `lyrics`, `url`) may be filled
/// in later without the track becoming a different track.
///
/// Two tracks are equal when their ids are equal, whatever the other fields say.
#[derive(Clone, Serialize, Deserialize)]
pub struct Track {
    id: String,
    title: String,
    album: Option<String>,
    artist: Option<String>,
    /// Duration in seconds.
    duration: f64,
    #[serde(skip)]
    pub artwork: Option<Bytes>,
    #[serde(default)]
    pub lyrics: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

impl Track {
    pub fn new(id: impl Into<String>, title: impl Into<String>, duration: f64) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            album: None,
            artist: None,
            duration,
            artwork: None,
            lyrics: None,
            url: None,
        }
    }

    pub fn with_album(mut self, album: impl Into<String>) -> Self {
        self.album = Some(album.into());
        self
    }

    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = Some(artist.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn album(&self) -> Option<&str> {
        self.album.as_deref()
    }

    pub fn artist(&self) -> Option<&str> {
        self.artist.as_deref()
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Copies enrichment fields that `other` carries onto `self`.
    ///
    /// Identity fields are left alone. Returns `true` if anything changed.
    pub fn merge_enrichment(&mut self, other: &Track) -> bool {
        let mut changed = false;
        if other.url.is_some() && other.url != self.url {
            self.url = other.url.clone();
            changed = true;
        }
        if other.lyrics.is_some() && other.lyrics != self.lyrics {
            self.lyrics = other.lyrics.clone();
            changed = true;
        }
        if other.artwork.is_some() && other.artwork != self.artwork {
            self.artwork = other.artwork.clone();
            changed = true;
        }
        changed
    }
}

impl PartialEq for Track {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Track {}

impl Hash for Track {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Track")
            .field("id", &self.id)
            .field("title", &self.title)
            .field("artist", &self.artist)
            .field("duration", &self.duration)
            .field("has_artwork", &self.artwork.is_some())
            .field("has_lyrics", &self.lyrics.is_some())
            .finish()
    }
}

// ============================================================================
// Playback State
// ============================================================================

/// Canonical playback state.
///
/// `Reposition` is a transient signal for a seek. Drivers emit it in a
/// `PlaybackChanged` event but never report it from `playback_state()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    #[default]
    Stopped,
    Playing,
    Paused,
    FastForwarding,
    Rewinding,
    Reposition,
}

impl PlaybackState {
    /// Playing, fast-forwarding and rewinding count as active.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            PlaybackState::Playing | PlaybackState::FastForwarding | PlaybackState::Rewinding
        )
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, PlaybackState::Reposition)
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PlaybackState::Stopped => "stopped",
            PlaybackState::Playing => "playing",
            PlaybackState::Paused => "paused",
            PlaybackState::FastForwarding => "fast-forwarding",
            PlaybackState::Rewinding => "rewinding",
            PlaybackState::Reposition => "reposition",
        };
        f.write_str(label)
    }
}

// ============================================================================
// Modes
// ============================================================================

/// Repeat mode. Players without the concept report no mode at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepeatMode {
    #[serde(rename = "none")]
    Off,
    One,
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShuffleMode {
    Songs,
    Albums,
    Groupings,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_track_equality_is_by_id() {
        let a = Track::new("42", "Song", 200.0).with_artist("Someone");
        let b = Track::new("42", "Song (Remastered)", 201.0);
        let c = Track::new("43", "Song", 200.0);

        assert_eq!(a, b);
        assert_ne!(a, c);

        let set: HashSet<Track> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_merge_enrichment_updates_url_only() {
        let mut cached = Track::new("1", "Title", 10.0).with_url("file:///old.m4a");
        let fresh = Track::new("1", "Other Title", 99.0).with_url("file:///new.m4a");

        assert!(cached.merge_enrichment(&fresh));
        assert_eq!(cached.url.as_deref(), Some("file:///new.m4a"));
        assert_eq!(cached.title(), "Title");
        assert_eq!(cached.duration(), 10.0);
    }

    #[test]
    fn test_merge_enrichment_keeps_existing_when_absent() {
        let mut cached = Track::new("1", "Title", 10.0).with_url("file:///a.m4a");
        cached.lyrics = Some("la la".to_string());
        let fresh = Track::new("1", "Title", 10.0);

        assert!(!cached.merge_enrichment(&fresh));
        assert_eq!(cached.url.as_deref(), Some("file:///a.m4a"));
        assert_eq!(cached.lyrics.as_deref(), Some("la la"));
    }

    #[test]
    fn test_active_states() {
        assert!(PlaybackState::Playing.is_active());
        assert!(PlaybackState::FastForwarding.is_active());
        assert!(PlaybackState::Rewinding.is_active());
        assert!(!PlaybackState::Paused.is_active());
        assert!(!PlaybackState::Stopped.is_active());
        assert!(!PlaybackState::Reposition.is_active());
        assert!(PlaybackState::Reposition.is_transient());
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(
            serde_json::to_string(&PlaybackState::FastForwarding).unwrap(),
            "\"fast_forwarding\""
        );
        assert_eq!(serde_json::to_string(&RepeatMode::Off).unwrap(), "\"none\"");
        assert_eq!(
            serde_json::from_str::<ShuffleMode>("\"groupings\"").unwrap(),
            ShuffleMode::Groupings
        );
    }

    #[test]
    fn test_track_serde_skips_artwork() {
        let mut track = Track::new("7", "Seven", 7.0).with_album("Numbers");
        track.artwork = Some(Bytes::from_static(b"\x89PNG"));

        let json = serde_json::to_value(&track).unwrap();
        assert!(json.get("artwork").is_none());
        assert_eq!(json["album"], "Numbers");

        let back: Track = serde_json::from_value(json).unwrap();
        assert_eq!(back, track);
        assert!(back.artwork.is_none());
    }
}
