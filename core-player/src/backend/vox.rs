//! Vox: integer-coded values and a notification that only says "track changed".

use bridge_traits::automation::{Notification, RawTrack, ScriptValue};

use super::{finish_track, Capabilities, Signal, SignalKind};
use crate::types::{PlaybackState, RepeatMode, Track};

pub(super) const CAPABILITIES: Capabilities = Capabilities {
    repeat: true,
    shuffle: false,
    state_notifications: false,
    track_notifications: true,
};

pub(super) fn decode_state(raw: &ScriptValue) -> Option<PlaybackState> {
    let state = match raw.as_i64()? {
        1 => PlaybackState::Playing,
        0 => PlaybackState::Paused,
        _ => PlaybackState::Stopped,
    };
    Some(state)
}

pub(super) fn decode_repeat(raw: &ScriptValue) -> Option<RepeatMode> {
    match raw.as_i64()? {
        0 => Some(RepeatMode::Off),
        1 => Some(RepeatMode::One),
        2 => Some(RepeatMode::All),
        _ => None,
    }
}

pub(super) fn encode_repeat(mode: RepeatMode) -> ScriptValue {
    let code: i64 = match mode {
        RepeatMode::Off => 0,
        RepeatMode::One => 1,
        RepeatMode::All => 2,
    };
    ScriptValue::from(code)
}

pub(super) fn decode_track(raw: RawTrack) -> Option<Track> {
    let id = raw.id.clone()?;
    let title = raw.title.clone()?;
    let duration = raw.duration?;
    Some(finish_track(Track::new(id, title, duration), raw))
}

/// Every notification on the stream means the track may have changed; the
/// payload is not inspected.
pub(super) fn decode_signal(_notification: &Notification) -> Signal {
    Signal {
        kind: Some(SignalKind::TrackChanged),
        location: None,
    }
}
