//! Spotify: state notifications only, no repeat or shuffle, no stop command.

use bridge_traits::automation::{Notification, RawTrack, ScriptValue};

use super::{finish_track, Capabilities, Signal, SignalKind};
use crate::types::{PlaybackState, Track};

pub(super) const CAPABILITIES: Capabilities = Capabilities {
    repeat: false,
    shuffle: false,
    state_notifications: true,
    track_notifications: true,
};

const STATE_KEY: &str = "Player State";

pub(super) fn decode_state(raw: &ScriptValue) -> Option<PlaybackState> {
    match raw.as_str()? {
        "kPSP" => Some(PlaybackState::Playing),
        "kPSp" => Some(PlaybackState::Paused),
        "kPSS" => Some(PlaybackState::Stopped),
        _ => None,
    }
}

pub(super) fn decode_track(raw: RawTrack) -> Option<Track> {
    let id = raw.id.clone()?;
    let title = raw.title.clone()?;
    let duration = raw.duration.unwrap_or(0.0);
    Some(finish_track(Track::new(id, title, duration), raw))
}

pub(super) fn decode_signal(notification: &Notification) -> Option<Signal> {
    let kind = match notification.get_str(STATE_KEY)? {
        "Playing" => Some(SignalKind::Playing),
        "Paused" => Some(SignalKind::Paused),
        "Stopped" => Some(SignalKind::Stopped),
        _ => None,
    };
    Some(Signal {
        kind,
        location: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_state_has_no_seek_states() {
        assert_eq!(
            decode_state(&ScriptValue::from("kPSP")),
            Some(PlaybackState::Playing)
        );
        assert_eq!(decode_state(&ScriptValue::from("kPSF")), None);
    }

    #[test]
    fn test_decode_track_defaults_duration() {
        let track = decode_track(
            RawTrack::new("spotify:track:1", "Intro").with_location("spotify:track:1"),
        )
        .unwrap();
        assert_eq!(track.duration(), 0.0);
        assert_eq!(track.url.as_deref(), Some("spotify:track:1"));

        let mut untitled = RawTrack::new("spotify:track:2", "x");
        untitled.title = None;
        assert!(decode_track(untitled).is_none());
    }

    #[test]
    fn test_decode_signal_ignores_location() {
        let notification = Notification::new("com.spotify.client.PlaybackStateChanged")
            .with_info(STATE_KEY, "Paused")
            .with_info("Location", "/tmp/x");
        let signal = decode_signal(&notification).unwrap();
        assert_eq!(signal.kind, Some(SignalKind::Paused));
        assert!(signal.location.is_none());

        assert!(decode_signal(&Notification::new("empty")).is_none());
    }
}
