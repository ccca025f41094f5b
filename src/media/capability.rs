use std::{
    collections::HashMap,
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

use thiserror::Error;

#[derive(Clone, Debug, PartialEq)]
pub enum PayloadValue {
    Text(String),
    Number(f64),
    Bool(bool),
    Bytes(Vec<u8>),
}

impl PayloadValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            PayloadValue::Text(text) => Some(text.as_str()),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            PayloadValue::Number(value) if value.is_finite() => Some(*value),
            PayloadValue::Text(text) => text.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PayloadValue::Bool(value) => Some(*value),
            PayloadValue::Number(value) => Some(*value != 0.0),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            PayloadValue::Bytes(bytes) => Some(bytes.as_slice()),
            _ => None,
        }
    }
}

impl From<&str> for PayloadValue {
    fn from(value: &str) -> Self {
        PayloadValue::Text(value.to_owned())
    }
}

impl From<String> for PayloadValue {
    fn from(value: String) -> Self {
        PayloadValue::Text(value)
    }
}

impl From<f64> for PayloadValue {
    fn from(value: f64) -> Self {
        PayloadValue::Number(value)
    }
}

impl From<bool> for PayloadValue {
    fn from(value: bool) -> Self {
        PayloadValue::Bool(value)
    }
}

impl From<Vec<u8>> for PayloadValue {
    fn from(value: Vec<u8>) -> Self {
        PayloadValue::Bytes(value)
    }
}

pub type RawPayload = HashMap<String, PayloadValue>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaCommand {
    TogglePlayPause,
    Next,
    Previous,
}

impl fmt::Display for MediaCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MediaCommand::TogglePlayPause => "toggle play/pause",
            MediaCommand::Next => "next track",
            MediaCommand::Previous => "previous track",
        };
        f.write_str(name)
    }
}

pub type ChangeCallback = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("media capability bundle not found at {}", .0.display())]
    BundleMissing(PathBuf),
    #[error("no media capability adapter for this platform")]
    Unsupported,
    #[error("media capability backend failed: {0}")]
    Backend(String),
}

pub trait MediaCapability: Send + Sync {
    fn name(&self) -> &str;

    fn is_available(&self) -> bool {
        true
    }

    fn now_playing(&self) -> Result<Option<RawPayload>, CapabilityError>;

    fn is_playing(&self) -> Result<bool, CapabilityError>;

    fn send_command(&self, command: MediaCommand) -> bool;

    fn subscribe(&self, names: &[String], on_change: ChangeCallback) -> bool;
}

#[derive(Debug)]
pub struct DisabledCapability {
    reason: String,
}

impl DisabledCapability {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl MediaCapability for DisabledCapability {
    fn name(&self) -> &str {
        "disabled"
    }

    fn is_available(&self) -> bool {
        false
    }

    fn now_playing(&self) -> Result<Option<RawPayload>, CapabilityError> {
        Ok(None)
    }

    fn is_playing(&self) -> Result<bool, CapabilityError> {
        Ok(false)
    }

    fn send_command(&self, _command: MediaCommand) -> bool {
        false
    }

    fn subscribe(&self, _names: &[String], _on_change: ChangeCallback) -> bool {
        false
    }
}

pub fn resolve_capability(bundle_path: Option<&Path>) -> Arc<dyn MediaCapability> {
    match try_resolve(bundle_path) {
        Ok(capability) => {
            tracing::info!(capability = capability.name(), "Media capability resolved");
            capability
        }
        Err(err) => {
            tracing::error!(error = %err, "Media capability unavailable; media features disabled");
            Arc::new(DisabledCapability::new(err.to_string()))
        }
    }
}

fn try_resolve(bundle_path: Option<&Path>) -> Result<Arc<dyn MediaCapability>, CapabilityError> {
    let bundle = bundle_path
        .map(Path::to_path_buf)
        .or_else(default_bundle_path);
    if let Some(bundle) = bundle {
        if !bundle.exists() {
            return Err(CapabilityError::BundleMissing(bundle));
        }
    }

    platform_capability()
}

#[cfg(target_os = "macos")]
fn default_bundle_path() -> Option<PathBuf> {
    Some(PathBuf::from(
        "/System/Library/PrivateFrameworks/MediaRemote.framework",
    ))
}

#[cfg(not(target_os = "macos"))]
fn default_bundle_path() -> Option<PathBuf> {
    None
}

#[cfg(target_os = "windows")]
fn platform_capability() -> Result<Arc<dyn MediaCapability>, CapabilityError> {
    let capability = super::gsmtc::SessionCapability::resolve()?;
    Ok(Arc::new(capability))
}

#[cfg(not(target_os = "windows"))]
fn platform_capability() -> Result<Arc<dyn MediaCapability>, CapabilityError> {
    Err(CapabilityError::Unsupported)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_parse_from_text_and_reject_nan() {
        assert_eq!(PayloadValue::from("12.5").as_number(), Some(12.5));
        assert_eq!(PayloadValue::Number(f64::NAN).as_number(), None);
        assert_eq!(PayloadValue::from("soon").as_number(), None);
        assert_eq!(PayloadValue::Bool(true).as_number(), None);
    }

    #[test]
    fn bools_accept_numeric_rates() {
        assert_eq!(PayloadValue::Number(1.0).as_bool(), Some(true));
        assert_eq!(PayloadValue::Number(0.0).as_bool(), Some(false));
        assert_eq!(PayloadValue::from("yes").as_bool(), None);
    }

    #[test]
    fn missing_bundle_yields_disabled_capability() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("Nope.framework");

        let capability = resolve_capability(Some(&missing));
        assert!(!capability.is_available());
        assert_eq!(capability.name(), "disabled");
        assert!(capability.now_playing().unwrap().is_none());
        assert!(!capability.send_command(MediaCommand::Next));
    }
}
