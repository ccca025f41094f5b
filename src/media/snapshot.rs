use std::time::Instant;

pub const PLACEHOLDER_TITLE: &str = "No Media";

/// Normalized now-playing state. Replaced wholesale on every poll.
///
/// Equality only looks at title, artist, play state and duration. Artwork and
/// elapsed time change on every tick and would otherwise publish a new value
/// each poll.
#[derive(Clone, Debug)]
pub struct MediaSnapshot {
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    pub artwork: Option<Vec<u8>>,
    pub is_playing: bool,
    pub duration: f64,
    pub elapsed: f64,
    pub captured_at: Option<Instant>,
}

impl MediaSnapshot {
    pub fn placeholder() -> Self {
        Self {
            title: PLACEHOLDER_TITLE.to_owned(),
            artist: String::new(),
            album: None,
            artwork: None,
            is_playing: false,
            duration: 0.0,
            elapsed: 0.0,
            captured_at: None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self == &Self::placeholder()
    }

    pub fn elapsed_at(&self, now: Instant) -> f64 {
        let mut elapsed = self.elapsed.max(0.0);
        if self.is_playing {
            if let Some(captured) = self.captured_at {
                elapsed += now.saturating_duration_since(captured).as_secs_f64();
            }
        }
        if self.duration > 0.0 {
            elapsed = elapsed.min(self.duration);
        }
        elapsed
    }

    pub fn progress_at(&self, now: Instant) -> f32 {
        if self.duration <= f64::EPSILON {
            return 0.0;
        }
        (self.elapsed_at(now) / self.duration).clamp(0.0, 1.0) as f32
    }

    pub fn summary(&self) -> String {
        if self.is_placeholder() {
            return PLACEHOLDER_TITLE.to_owned();
        }
        if self.artist.is_empty() {
            self.title.clone()
        } else {
            format!("{} \u{2014} {}", self.title, self.artist)
        }
    }
}

impl Default for MediaSnapshot {
    fn default() -> Self {
        Self::placeholder()
    }
}

impl PartialEq for MediaSnapshot {
    fn eq(&self, other: &Self) -> bool {
        self.title == other.title
            && self.artist == other.artist
            && self.is_playing == other.is_playing
            && self.duration == other.duration
    }
}

pub fn format_timestamp(seconds: f64) -> String {
    let total_seconds = seconds.max(0.0).floor() as u64;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes}:{secs:02}")
    }
}
