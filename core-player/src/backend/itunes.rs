//! iTunes: four-character codes for every enum, full state notifications.

use bridge_traits::automation::{Notification, RawTrack, ScriptValue};

use super::{finish_track, Capabilities, Signal, SignalKind};
use crate::types::{PlaybackState, RepeatMode, ShuffleMode, Track};

pub(super) const CAPABILITIES: Capabilities = Capabilities {
    repeat: true,
    shuffle: true,
    state_notifications: true,
    track_notifications: true,
};

const STATE_KEY: &str = "Player State";
const LOCATION_KEY: &str = "Location";
const MUSIC_KIND: &str = "music";

pub(super) fn decode_state(raw: &ScriptValue) -> Option<PlaybackState> {
    match raw.as_str()? {
        "kPSP" => Some(PlaybackState::Playing),
        "kPSp" => Some(PlaybackState::Paused),
        "kPSS" => Some(PlaybackState::Stopped),
        "kPSF" => Some(PlaybackState::FastForwarding),
        "kPSR" => Some(PlaybackState::Rewinding),
        _ => None,
    }
}

pub(super) fn decode_repeat(raw: &ScriptValue) -> Option<RepeatMode> {
    match raw.as_str()? {
        "kRpO" => Some(RepeatMode::Off),
        "kRp1" => Some(RepeatMode::One),
        "kAll" => Some(RepeatMode::All),
        _ => None,
    }
}

pub(super) fn encode_repeat(mode: RepeatMode) -> ScriptValue {
    let code = match mode {
        RepeatMode::Off => "kRpO",
        RepeatMode::One => "kRp1",
        RepeatMode::All => "kAll",
    };
    ScriptValue::from(code)
}

pub(super) fn decode_shuffle(raw: &ScriptValue) -> Option<ShuffleMode> {
    match raw.as_str()? {
        "kShS" => Some(ShuffleMode::Songs),
        "kShA" => Some(ShuffleMode::Albums),
        "kShG" => Some(ShuffleMode::Groupings),
        _ => None,
    }
}

pub(super) fn encode_shuffle(mode: ShuffleMode) -> ScriptValue {
    let code = match mode {
        ShuffleMode::Songs => "kShS",
        ShuffleMode::Albums => "kShA",
        ShuffleMode::Groupings => "kShG",
    };
    ScriptValue::from(code)
}

/// Library items other than music (podcasts, videos, ...) are not tracks.
pub(super) fn decode_track(raw: RawTrack) -> Option<Track> {
    if let Some(kind) = raw.media_kind.as_deref() {
        if !kind.eq_ignore_ascii_case(MUSIC_KIND) {
            return None;
        }
    }
    let id = raw.id.clone()?;
    let title = raw.title.clone()?;
    let duration = raw.duration?;
    Some(finish_track(Track::new(id, title, duration), raw))
}

pub(super) fn decode_signal(notification: &Notification) -> Option<Signal> {
    let state = notification.get_str(STATE_KEY)?;
    let kind = match state {
        "Playing" => Some(SignalKind::Playing),
        "Paused" => Some(SignalKind::Paused),
        "Stopped" => Some(SignalKind::Stopped),
        _ => None,
    };
    Some(Signal {
        kind,
        location: notification.get_str(LOCATION_KEY).map(str::to_string),
    })
}
