//! # Player Backends
//!
//! Each supported player differs from the others only in how it encodes
//! raw values, what its change notification carries, and which optional
//! features it has. Those differences live here, behind one tagged
//! [`Backend`] enum; the drift and tracking machinery in
//! [`driver`](crate::driver) is shared.

mod itunes;
mod spotify;
mod vox;

use bridge_traits::automation::{Notification, PlayerAutomation, PlayerName, RawTrack, ScriptValue};

use crate::types::{PlaybackState, RepeatMode, ShuffleMode, Track};

// ============================================================================
// Capabilities
// ============================================================================

/// Feature set of a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// The player has a repeat setting.
    pub repeat: bool,
    /// The player has a shuffle setting.
    pub shuffle: bool,
    /// The change notification reports play/pause/stop transitions.
    /// Backends without it have their state polled.
    pub state_notifications: bool,
    /// The change notification is posted on track changes.
    pub track_notifications: bool,
}

// ============================================================================
// Notification Signals
// ============================================================================

/// What a decoded change notification announces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    Playing,
    Paused,
    Stopped,
    /// Metadata changed; the playback state must be read separately.
    TrackChanged,
}

/// A well-formed change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signal {
    /// `None` when the payload names a state the core does not know.
    pub kind: Option<SignalKind>,
    /// Location of the playing item, when the payload carries one.
    pub location: Option<String>,
}

// ============================================================================
// Backend
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    ITunes,
    Spotify,
    Vox,
}

impl From<PlayerName> for Backend {
    fn from(name: PlayerName) -> Self {
        match name {
            PlayerName::ITunes => Backend::ITunes,
            PlayerName::Spotify => Backend::Spotify,
            PlayerName::Vox => Backend::Vox,
        }
    }
}

impl Backend {
    pub fn player(&self) -> PlayerName {
        match self {
            Backend::ITunes => PlayerName::ITunes,
            Backend::Spotify => PlayerName::Spotify,
            Backend::Vox => PlayerName::Vox,
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        match self {
            Backend::ITunes => itunes::CAPABILITIES,
            Backend::Spotify => spotify::CAPABILITIES,
            Backend::Vox => vox::CAPABILITIES,
        }
    }

    /// Stream name to subscribe to on the automation handle.
    pub fn notification_stream(&self) -> &'static str {
        self.player().notification_name()
    }

    pub fn decode_state(&self, raw: &ScriptValue) -> Option<PlaybackState> {
        match self {
            Backend::ITunes => itunes::decode_state(raw),
            Backend::Spotify => spotify::decode_state(raw),
            Backend::Vox => vox::decode_state(raw),
        }
    }

    pub fn decode_repeat(&self, raw: &ScriptValue) -> Option<RepeatMode> {
        match self {
            Backend::ITunes => itunes::decode_repeat(raw),
            Backend::Spotify => None,
            Backend::Vox => vox::decode_repeat(raw),
        }
    }

    pub fn encode_repeat(&self, mode: RepeatMode) -> Option<ScriptValue> {
        match self {
            Backend::ITunes => Some(itunes::encode_repeat(mode)),
            Backend::Spotify => None,
            Backend::Vox => Some(vox::encode_repeat(mode)),
        }
    }

    pub fn decode_shuffle(&self, raw: &ScriptValue) -> Option<ShuffleMode> {
        match self {
            Backend::ITunes => itunes::decode_shuffle(raw),
            Backend::Spotify | Backend::Vox => None,
        }
    }

    pub fn encode_shuffle(&self, mode: ShuffleMode) -> Option<ScriptValue> {
        match self {
            Backend::ITunes => Some(itunes::encode_shuffle(mode)),
            Backend::Spotify | Backend::Vox => None,
        }
    }

    /// Builds a canonical track, or `None` when required metadata is missing.
    pub fn decode_track(&self, raw: RawTrack) -> Option<Track> {
        match self {
            Backend::ITunes => itunes::decode_track(raw),
            Backend::Spotify => spotify::decode_track(raw),
            Backend::Vox => vox::decode_track(raw),
        }
    }

    /// Decodes a change notification. Malformed payloads yield `None`.
    pub fn decode_signal(&self, notification: &Notification) -> Option<Signal> {
        match self {
            Backend::ITunes => itunes::decode_signal(notification),
            Backend::Spotify => spotify::decode_signal(notification),
            Backend::Vox => Some(vox::decode_signal(notification)),
        }
    }

    // ------------------------------------------------------------------------
    // Transport commands
    // ------------------------------------------------------------------------

    /// Starts playback. `current` is the decoded state at the time of the call.
    pub fn play(&self, automation: &dyn PlayerAutomation, current: PlaybackState) {
        match self {
            // Only a toggle is available; sending it while playing would pause.
            Backend::ITunes => {
                if current != PlaybackState::Playing {
                    automation.play_pause();
                }
            }
            Backend::Spotify | Backend::Vox => automation.play(),
        }
    }

    pub fn stop(&self, automation: &dyn PlayerAutomation) {
        match self {
            Backend::ITunes => automation.stop(),
            Backend::Spotify | Backend::Vox => automation.pause(),
        }
    }
}

/// Copies the optional descriptive fields of a raw track onto a canonical one.
fn finish_track(mut track: Track, raw: RawTrack) -> Track {
    if let Some(album) = raw.album {
        track = track.with_album(album);
    }
    if let Some(artist) = raw.artist {
        track = track.with_artist(artist);
    }
    track.url = raw.location;
    track.artwork = raw.artwork;
    track.lyrics = raw.lyrics;
    track
}
