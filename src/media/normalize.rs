use std::time::Instant;

use super::{
    capability::{PayloadValue, RawPayload},
    snapshot::MediaSnapshot,
};

pub struct KeyChain {
    pub primary: &'static str,
    pub alternate: &'static str,
}

pub const TITLE_KEYS: KeyChain = KeyChain {
    primary: "kMRMediaRemoteNowPlayingInfoTitle",
    alternate: "title",
};
pub const ARTIST_KEYS: KeyChain = KeyChain {
    primary: "kMRMediaRemoteNowPlayingInfoArtist",
    alternate: "artist",
};
pub const ALBUM_KEYS: KeyChain = KeyChain {
    primary: "kMRMediaRemoteNowPlayingInfoAlbum",
    alternate: "album",
};
pub const DURATION_KEYS: KeyChain = KeyChain {
    primary: "kMRMediaRemoteNowPlayingInfoDuration",
    alternate: "duration",
};
pub const ELAPSED_KEYS: KeyChain = KeyChain {
    primary: "kMRMediaRemoteNowPlayingInfoElapsedTime",
    alternate: "elapsedTime",
};
pub const ARTWORK_KEYS: KeyChain = KeyChain {
    primary: "kMRMediaRemoteNowPlayingInfoArtworkData",
    alternate: "artworkData",
};
pub const RATE_KEYS: KeyChain = KeyChain {
    primary: "kMRMediaRemoteNowPlayingInfoPlaybackRate",
    alternate: "playbackRate",
};

impl KeyChain {
    fn lookup<'a, T>(
        &self,
        payload: &'a RawPayload,
        extract: impl Fn(&'a PayloadValue) -> Option<T>,
    ) -> Option<T> {
        payload
            .get(self.primary)
            .and_then(&extract)
            .or_else(|| payload.get(self.alternate).and_then(&extract))
    }
}

fn non_empty_text(value: &PayloadValue) -> Option<String> {
    value
        .as_text()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_owned)
}

pub fn normalize(
    payload: Option<&RawPayload>,
    is_playing: Option<bool>,
    captured_at: Instant,
) -> MediaSnapshot {
    let Some(payload) = payload else {
        return MediaSnapshot::placeholder();
    };

    let Some(title) = TITLE_KEYS.lookup(payload, non_empty_text) else {
        return MediaSnapshot::placeholder();
    };

    let artist = ARTIST_KEYS
        .lookup(payload, non_empty_text)
        .unwrap_or_default();
    let album = ALBUM_KEYS.lookup(payload, non_empty_text);
    let duration = DURATION_KEYS
        .lookup(payload, PayloadValue::as_number)
        .filter(|d| *d >= 0.0)
        .unwrap_or(0.0);
    let mut elapsed = ELAPSED_KEYS
        .lookup(payload, PayloadValue::as_number)
        .unwrap_or(0.0)
        .max(0.0);
    if duration > 0.0 {
        elapsed = elapsed.min(duration);
    }
    let artwork = ARTWORK_KEYS
        .lookup(payload, |value| value.as_bytes().map(<[u8]>::to_vec))
        .filter(|bytes| !bytes.is_empty());
    let is_playing = is_playing
        .or_else(|| RATE_KEYS.lookup(payload, PayloadValue::as_bool))
        .unwrap_or(false);

    MediaSnapshot {
        title,
        artist,
        album,
        artwork,
        is_playing,
        duration,
        elapsed,
        captured_at: Some(captured_at),
    }
}
