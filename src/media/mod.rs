pub mod capability;
#[cfg(target_os = "windows")]
mod gsmtc;
pub mod monitor;
pub mod normalize;
pub mod snapshot;

pub use capability::{
    resolve_capability, CapabilityError, ChangeCallback, DisabledCapability, MediaCapability,
    MediaCommand, PayloadValue, RawPayload,
};
pub use monitor::{update_media_info, MediaSourceMonitor};
pub use snapshot::{format_timestamp, MediaSnapshot, PLACEHOLDER_TITLE};

pub const DEFAULT_CHANGE_NOTIFICATIONS: &[&str] = &[
    "kMRMediaRemoteNowPlayingInfoDidChangeNotification",
    "kMRMediaRemoteNowPlayingApplicationIsPlayingDidChangeNotification",
    "kMRMediaRemoteNowPlayingApplicationDidChangeNotification",
    "com.apple.Music.playerInfo",
    "com.apple.iTunes.playerInfo",
    "com.spotify.client.PlaybackStateChanged",
];
