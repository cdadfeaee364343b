//! Player Automation Abstractions
//!
//! The host owns the native automation bridge (scripting bridge, IPC, DBus, ...)
//! that talks to an external media player. The core only sees the narrow
//! surface below: raw values in, raw values out, plus a named notification
//! stream scoped to one player process.
//!
//! Values stay in their raw form ([`ScriptValue`]); decoding
//! them into canonical playback states is the job of each backend in
//! `core-player`.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use crate::error::{BridgeError, Result};

// ============================================================================
// Player Identity
// ============================================================================

/// Closed set of external players the core knows how to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerName {
    ITunes,
    Spotify,
    Vox,
}

impl PlayerName {
    /// Every known player, in registration order.
    pub const ALL: [PlayerName; 3] = [PlayerName::ITunes, PlayerName::Spotify, PlayerName::Vox];

    /// Application bundle identifier used by the automation layer to resolve a handle.
    pub fn bundle_id(&self) -> &'static str {
        match self {
            PlayerName::ITunes => "com.apple.iTunes",
            PlayerName::Spotify => "com.spotify.client",
            PlayerName::Vox => "com.coppertino.Vox",
        }
    }

    /// Name of the distributed change-notification stream the player posts.
    pub fn notification_name(&self) -> &'static str {
        match self {
            PlayerName::ITunes => "com.apple.iTunes.playerInfo",
            PlayerName::Spotify => "com.spotify.client.PlaybackStateChanged",
            PlayerName::Vox => "com.coppertino.Vox.trackChanged",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            PlayerName::ITunes => "iTunes",
            PlayerName::Spotify => "Spotify",
            PlayerName::Vox => "Vox",
        }
    }
}

impl fmt::Display for PlayerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for PlayerName {
    type Err = BridgeError;

    /// Accepts either the display name (case-insensitive) or the bundle id.
    fn from_str(s: &str) -> Result<Self> {
        PlayerName::ALL
            .into_iter()
            .find(|name| name.display_name().eq_ignore_ascii_case(s) || name.bundle_id() == s)
            .ok_or_else(|| BridgeError::NotAvailable(format!("Unknown player: {}", s)))
    }
}

// ============================================================================
// Raw Values
// ============================================================================

/// A loosely typed value as returned by the automation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScriptValue {
    Bool(bool),
    Integer(i64),
    Real(f64),
    Text(String),
}

impl ScriptValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ScriptValue::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ScriptValue::Integer(value) => Some(*value),
            _ => None,
        }
    }

    /// Numeric view; integers widen to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ScriptValue::Real(value) => Some(*value),
            ScriptValue::Integer(value) => Some(*value as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ScriptValue::Bool(value) => Some(*value),
            _ => None,
        }
    }
}

impl From<&str> for ScriptValue {
    fn from(value: &str) -> Self {
        ScriptValue::Text(value.to_string())
    }
}

impl From<String> for ScriptValue {
    fn from(value: String) -> Self {
        ScriptValue::Text(value)
    }
}

impl From<i64> for ScriptValue {
    fn from(value: i64) -> Self {
        ScriptValue::Integer(value)
    }
}

impl From<f64> for ScriptValue {
    fn from(value: f64) -> Self {
        ScriptValue::Real(value)
    }
}

impl From<bool> for ScriptValue {
    fn from(value: bool) -> Self {
        ScriptValue::Bool(value)
    }
}

/// Now-playing metadata exactly as the player reports it. Every field is
/// optional; a backend decides which ones are required to form a track.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTrack {
    pub id: Option<String>,
    pub title: Option<String>,
    pub album: Option<String>,
    pub artist: Option<String>,
    /// Duration in seconds.
    pub duration: Option<f64>,
    /// Media kind reported by library-based players (`"music"`, `"podcast"`, ...).
    pub media_kind: Option<String>,
    /// File path or URL of the playing item.
    pub location: Option<String>,
    pub artwork: Option<Bytes>,
    pub lyrics: Option<String>,
}

impl RawTrack {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            title: Some(title.into()),
            ..Self::default()
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

    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.duration = Some(seconds);
        self
    }

    pub fn with_media_kind(mut self, kind: impl Into<String>) -> Self {
        self.media_kind = Some(kind.into());
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

// ============================================================================
// Notifications
// ============================================================================

/// A change notification posted by an external player.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Notification {
    pub name: String,
    pub user_info: HashMap<String, ScriptValue>,
}

impl Notification {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            user_info: HashMap::new(),
        }
    }

    pub fn with_info(mut self, key: impl Into<String>, value: impl Into<ScriptValue>) -> Self {
        self.user_info.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&ScriptValue> {
        self.user_info.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(ScriptValue::as_str)
    }
}

/// Handle returned by [`PlayerAutomation::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Callback invoked on the run-loop thread for every notification on a stream.
pub type NotificationHandler = Rc<dyn Fn(&Notification)>;

// ============================================================================
// Automation Capability
// ============================================================================

/// Read/write access to one external player process.
///
/// Implementations are called synchronously from the cooperative run loop and
/// may block briefly on inter-process calls. Getters return `None` when the
/// value cannot be read (player not running, property unsupported); they never
/// fail loudly.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::automation::{PlayerAutomation, ScriptValue};
///
/// fn is_playing(player: &dyn PlayerAutomation) -> bool {
///     player.is_running()
///         && player.playback_state() == Some(ScriptValue::from("kPSP"))
/// }
/// ```
pub trait PlayerAutomation {
    /// Whether the player process is currently running.
    fn is_running(&self) -> bool;

    /// Brings the player to the foreground.
    fn activate(&self);

    /// Playhead position in seconds.
    fn position(&self) -> Option<f64>;

    fn set_position(&self, seconds: f64);

    /// Raw playback state code.
    fn playback_state(&self) -> Option<ScriptValue>;

    fn repeat_mode(&self) -> Option<ScriptValue> {
        None
    }

    fn set_repeat_mode(&self, _value: ScriptValue) {}

    fn shuffle_mode(&self) -> Option<ScriptValue> {
        None
    }

    fn set_shuffle_mode(&self, _value: ScriptValue) {}

    fn current_track(&self) -> Option<RawTrack>;

    fn play(&self);

    fn pause(&self);

    fn play_pause(&self);

    fn stop(&self);

    fn next_track(&self);

    fn previous_track(&self);

    /// Subscribes `handler` to the named notification stream of this player.
    fn subscribe(&self, stream: &str, handler: NotificationHandler) -> Result<SubscriptionId>;

    /// Removes a subscription. Unknown ids are ignored.
    fn unsubscribe(&self, id: SubscriptionId);
}

/// Resolves automation handles for known players.
///
/// Returns `None` when the host cannot reach the application (not installed,
/// scripting disabled, sandbox denial). The core treats that as "player
/// unavailable".
pub trait AutomationProvider {
    fn resolve(&self, player: PlayerName) -> Option<Rc<dyn PlayerAutomation>>;
}
