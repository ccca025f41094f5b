use anyhow::Context;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use serde::Deserialize;
use std::{
    env, fs,
    path::{Path, PathBuf},
    sync::mpsc::{self, Receiver},
    time::Duration,
};

use crate::media::DEFAULT_CHANGE_NOTIFICATIONS;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub panel: PanelConfig,
    pub timing: TimingConfig,
    pub media: MediaConfig,
    pub drag: DragConfig,
}

impl Config {
    pub fn load() -> anyhow::Result<(Self, Option<PathBuf>)> {
        for path in candidate_paths() {
            if path.exists() {
                let config = Self::load_from(&path)?;
                return Ok((config, Some(path)));
            }
        }

        Ok((Config::default(), None))
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&data).with_context(|| format!("Failed to parse config: {}", path.display()))
    }

    pub fn parse(data: &str) -> anyhow::Result<Self> {
        let doc: ConfigDocument = toml::from_str(data)?;
        Ok(doc.into())
    }
}

fn candidate_paths() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(current_dir) = env::current_dir() {
        candidates.push(current_dir.join("config.toml"));
        candidates.push(current_dir.join("config").join("config.toml"));
        candidates.push(current_dir.join("config").join("edge_panel.toml"));
    }

    if let Ok(exe) = env::current_exe() {
        if let Some(dir) = exe.parent() {
            candidates.push(dir.join("config.toml"));
            candidates.push(dir.join("config").join("config.toml"));
            candidates.push(dir.join("config").join("edge_panel.toml"));
        }
    }

    candidates
}

#[derive(Debug, Clone, PartialEq)]
pub struct PanelConfig {
    pub expanded_width: f32,
    pub expanded_height: f32,
    pub collapsed_width_ratio: f32,
    pub peek_height: f32,
    pub collapsed_opacity: f32,
    pub trigger_height: f32,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            expanded_width: 420.0,
            expanded_height: 150.0,
            collapsed_width_ratio: 0.5,
            peek_height: 6.0,
            collapsed_opacity: 0.6,
            trigger_height: 24.0,
        }
    }
}

impl PanelConfig {
    pub fn expanded_width(&self) -> f32 {
        self.expanded_width.clamp(200.0, 1200.0)
    }

    pub fn expanded_height(&self) -> f32 {
        self.expanded_height.clamp(60.0, 600.0)
    }

    pub fn collapsed_width_ratio(&self) -> f32 {
        self.collapsed_width_ratio.clamp(0.2, 1.0)
    }

    pub fn peek_height(&self) -> f32 {
        self.peek_height.clamp(2.0, 40.0)
    }

    pub fn collapsed_opacity(&self) -> f32 {
        self.collapsed_opacity.clamp(0.1, 1.0)
    }

    pub fn trigger_height(&self) -> f32 {
        self.trigger_height.clamp(4.0, 80.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimingConfig {
    pub expand_scale_delay_ms: u64,
    pub expand_reveal_delay_ms: u64,
    pub collapse_shrink_delay_ms: u64,
    pub collapse_settle_delay_ms: u64,
    pub collapse_debounce_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            expand_scale_delay_ms: 100,
            expand_reveal_delay_ms: 250,
            collapse_shrink_delay_ms: 150,
            collapse_settle_delay_ms: 250,
            collapse_debounce_ms: 300,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MediaConfig {
    pub bundle_path: Option<PathBuf>,
    pub poll_interval_ms: u64,
    pub command_refresh_delay_ms: u64,
    pub notifications: Vec<String>,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            bundle_path: None,
            poll_interval_ms: 500,
            command_refresh_delay_ms: 300,
            notifications: DEFAULT_CHANGE_NOTIFICATIONS
                .iter()
                .map(|name| name.to_string())
                .collect(),
        }
    }
}

impl MediaConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.clamp(100, 10_000))
    }

    pub fn command_refresh_delay(&self) -> Duration {
        Duration::from_millis(self.command_refresh_delay_ms.clamp(0, 5_000))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DragConfig {
    pub poll_interval_ms: u64,
}

impl Default for DragConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
        }
    }
}

impl DragConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.clamp(16, 1_000))
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigDocument {
    #[serde(default)]
    panel: PanelSection,
    #[serde(default)]
    timing: TimingSection,
    #[serde(default)]
    media: MediaSection,
    #[serde(default)]
    drag: DragSection,
}

impl From<ConfigDocument> for Config {
    fn from(value: ConfigDocument) -> Self {
        let panel_defaults = PanelConfig::default();
        let panel = PanelConfig {
            expanded_width: value
                .panel
                .expanded_width
                .unwrap_or(panel_defaults.expanded_width),
            expanded_height: value
                .panel
                .expanded_height
                .unwrap_or(panel_defaults.expanded_height),
            collapsed_width_ratio: value
                .panel
                .collapsed_width_ratio
                .unwrap_or(panel_defaults.collapsed_width_ratio),
            peek_height: value.panel.peek_height.unwrap_or(panel_defaults.peek_height),
            collapsed_opacity: value
                .panel
                .collapsed_opacity
                .unwrap_or(panel_defaults.collapsed_opacity),
            trigger_height: value
                .panel
                .trigger_height
                .unwrap_or(panel_defaults.trigger_height),
        };

        let timing_defaults = TimingConfig::default();
        let timing = TimingConfig {
            expand_scale_delay_ms: value
                .timing
                .expand_scale_delay_ms
                .unwrap_or(timing_defaults.expand_scale_delay_ms),
            expand_reveal_delay_ms: value
                .timing
                .expand_reveal_delay_ms
                .unwrap_or(timing_defaults.expand_reveal_delay_ms),
            collapse_shrink_delay_ms: value
                .timing
                .collapse_shrink_delay_ms
                .unwrap_or(timing_defaults.collapse_shrink_delay_ms),
            collapse_settle_delay_ms: value
                .timing
                .collapse_settle_delay_ms
                .unwrap_or(timing_defaults.collapse_settle_delay_ms),
            collapse_debounce_ms: value
                .timing
                .collapse_debounce_ms
                .unwrap_or(timing_defaults.collapse_debounce_ms),
        };

        let media_defaults = MediaConfig::default();
        let media = MediaConfig {
            bundle_path: value.media.bundle_path.or(media_defaults.bundle_path),
            poll_interval_ms: value
                .media
                .poll_interval_ms
                .unwrap_or(media_defaults.poll_interval_ms),
            command_refresh_delay_ms: value
                .media
                .command_refresh_delay_ms
                .unwrap_or(media_defaults.command_refresh_delay_ms),
            notifications: value
                .media
                .notifications
                .unwrap_or(media_defaults.notifications),
        };

        let drag = DragConfig {
            poll_interval_ms: value
                .drag
                .poll_interval_ms
                .unwrap_or(DragConfig::default().poll_interval_ms),
        };

        Config {
            panel,
            timing,
            media,
            drag,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct PanelSection {
    expanded_width: Option<f32>,
    expanded_height: Option<f32>,
    collapsed_width_ratio: Option<f32>,
    peek_height: Option<f32>,
    collapsed_opacity: Option<f32>,
    trigger_height: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
struct TimingSection {
    expand_scale_delay_ms: Option<u64>,
    expand_reveal_delay_ms: Option<u64>,
    collapse_shrink_delay_ms: Option<u64>,
    collapse_settle_delay_ms: Option<u64>,
    collapse_debounce_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct MediaSection {
    bundle_path: Option<PathBuf>,
    poll_interval_ms: Option<u64>,
    command_refresh_delay_ms: Option<u64>,
    notifications: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct DragSection {
    poll_interval_ms: Option<u64>,
}

pub struct ConfigWatcher {
    path: PathBuf,
    _watcher: RecommendedWatcher,
    changes_rx: Receiver<notify::Result<notify::Event>>,
}

impl ConfigWatcher {
    pub fn watch(path: &Path) -> anyhow::Result<Self> {
        let (tx, rx) = mpsc::channel();
        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = tx.send(res);
        })
        .context("Failed to create config watcher")?;
        watcher
            .watch(path, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch config file: {}", path.display()))?;

        Ok(Self {
            path: path.to_path_buf(),
            _watcher: watcher,
            changes_rx: rx,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn poll(&self) -> Option<Config> {
        let mut touched = false;
        while let Ok(event) = self.changes_rx.try_recv() {
            match event {
                Ok(evt) => {
                    if evt.kind.is_modify() || evt.kind.is_create() {
                        touched = true;
                    }
                }
                Err(err) => tracing::warn!(error = %err, "Config watcher error"),
            }
        }

        if !touched {
            return None;
        }

        match Config::load_from(&self.path) {
            Ok(config) => {
                tracing::info!(path = %self.path.display(), "Reloaded config");
                Some(config)
            }
            Err(err) => {
                tracing::warn!(error = ?err, "Keeping previous config");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_document_yields_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let config = Config::parse(
            r#"
            [timing]
            collapse_debounce_ms = 500

            [media]
            poll_interval_ms = 1000
            notifications = ["com.example.player.changed"]
            "#,
        )
        .unwrap();

        assert_eq!(config.timing.collapse_debounce_ms, 500);
        assert_eq!(config.timing.expand_scale_delay_ms, 100);
        assert_eq!(config.media.poll_interval(), Duration::from_millis(1000));
        assert_eq!(config.media.notifications, vec!["com.example.player.changed"]);
        assert_eq!(config.panel, PanelConfig::default());
    }

    #[test]
    fn accessors_clamp_out_of_range_values() {
        let config = Config::parse(
            r#"
            [panel]
            collapsed_width_ratio = 4.0
            collapsed_opacity = 0.0

            [drag]
            poll_interval_ms = 1
            "#,
        )
        .unwrap();

        assert_eq!(config.panel.collapsed_width_ratio(), 1.0);
        assert_eq!(config.panel.collapsed_opacity(), 0.1);
        assert_eq!(config.drag.poll_interval(), Duration::from_millis(16));
    }

    #[test]
    fn load_from_reports_parse_errors_with_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[panel\nexpanded_width = ").unwrap();

        let err = Config::load_from(file.path()).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to parse config"));
    }

    #[test]
    fn load_from_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[panel]\nexpanded_width = 512.0").unwrap();

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.panel.expanded_width(), 512.0);
    }

    fn poll_until_reload(watcher: &ConfigWatcher) -> Option<Config> {
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while std::time::Instant::now() < deadline {
            if let Some(config) = watcher.poll() {
                return Some(config);
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        None
    }

    #[test]
    fn watcher_reloads_rewritten_file_and_skips_broken_edits() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[panel]\nexpanded_width = 420.0\n").unwrap();

        let watcher = ConfigWatcher::watch(&path).unwrap();
        assert_eq!(watcher.path(), path.as_path());
        assert!(watcher.poll().is_none());

        fs::write(&path, "[panel]\nexpanded_width = 512.0\n").unwrap();
        let reloaded = poll_until_reload(&watcher).expect("reload after rewrite");
        assert_eq!(reloaded.panel.expanded_width(), 512.0);

        fs::write(&path, "[panel\nexpanded_width = ").unwrap();
        let deadline = std::time::Instant::now() + Duration::from_millis(500);
        while std::time::Instant::now() < deadline {
            assert!(watcher.poll().is_none());
            std::thread::sleep(Duration::from_millis(20));
        }

        fs::write(&path, "[timing]\ncollapse_debounce_ms = 600\n").unwrap();
        let recovered = poll_until_reload(&watcher).expect("reload after fix");
        assert_eq!(recovered.timing.collapse_debounce_ms, 600);
    }
}
