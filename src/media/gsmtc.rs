use std::{future::IntoFuture, sync::Mutex};

use futures::executor::block_on;
use windows::{
    core::Result as WinResult,
    Foundation::{TimeSpan, TypedEventHandler},
    Media::Control::{
        GlobalSystemMediaTransportControlsSession,
        GlobalSystemMediaTransportControlsSessionManager,
        GlobalSystemMediaTransportControlsSessionMediaProperties,
        GlobalSystemMediaTransportControlsSessionPlaybackStatus,
    },
    Storage::Streams::{DataReader, IRandomAccessStreamReference, InputStreamOptions},
    Win32::{
        Foundation::RPC_E_CHANGED_MODE,
        System::Com::{CoInitializeEx, CoUninitialize, COINIT_MULTITHREADED},
    },
};

use super::{
    capability::{CapabilityError, ChangeCallback, MediaCapability, MediaCommand, RawPayload},
    normalize::{
        ALBUM_KEYS, ARTIST_KEYS, ARTWORK_KEYS, DURATION_KEYS, ELAPSED_KEYS, TITLE_KEYS,
    },
    PayloadValue,
};

const TICKS_PER_SECOND: f64 = 10_000_000.0;

pub struct ComApartment {
    initialized: bool,
}

impl ComApartment {
    pub fn enter() -> Self {
        let hr = unsafe { CoInitializeEx(None, COINIT_MULTITHREADED) };
        let initialized = if hr.is_ok() {
            true
        } else {
            if hr != RPC_E_CHANGED_MODE {
                tracing::warn!(hresult = ?hr, "COM init failed on media worker");
            }
            false
        };
        Self { initialized }
    }
}

impl Drop for ComApartment {
    fn drop(&mut self) {
        if self.initialized {
            unsafe {
                CoUninitialize();
            }
        }
    }
}

#[derive(Default)]
struct EventTokens {
    current_session_changed: Option<i64>,
    sessions_changed: Option<i64>,
}

pub struct SessionCapability {
    manager: GlobalSystemMediaTransportControlsSessionManager,
    tokens: Mutex<EventTokens>,
}

impl SessionCapability {
    pub fn resolve() -> Result<Self, CapabilityError> {
        let _apartment = ComApartment::enter();
        let request =
            GlobalSystemMediaTransportControlsSessionManager::RequestAsync().map_err(backend)?;
        let manager = block_on_operation(request).map_err(backend)?;
        Ok(Self {
            manager,
            tokens: Mutex::new(EventTokens::default()),
        })
    }

    fn current_session(&self) -> Option<GlobalSystemMediaTransportControlsSession> {
        self.manager.GetCurrentSession().ok()
    }

    fn fetch_payload(
        &self,
        session: &GlobalSystemMediaTransportControlsSession,
    ) -> WinResult<RawPayload> {
        let props = block_on_operation(session.TryGetMediaPropertiesAsync()?)?;
        let mut payload = RawPayload::new();

        payload.insert(
            TITLE_KEYS.alternate.into(),
            PayloadValue::Text(props.Title()?.to_string_lossy()),
        );
        payload.insert(
            ARTIST_KEYS.alternate.into(),
            PayloadValue::Text(props.Artist()?.to_string_lossy()),
        );
        payload.insert(
            ALBUM_KEYS.alternate.into(),
            PayloadValue::Text(props.AlbumTitle()?.to_string_lossy()),
        );

        if let Ok(timeline) = session.GetTimelineProperties() {
            let start = time_span_to_secs(timeline.StartTime()?);
            let end = time_span_to_secs(timeline.EndTime()?);
            let position = time_span_to_secs(timeline.Position()?);
            let (start, end) = if end < start { (end, start) } else { (start, end) };
            payload.insert(
                DURATION_KEYS.alternate.into(),
                PayloadValue::Number((end - start).max(0.0)),
            );
            if position.is_finite() {
                payload.insert(
                    ELAPSED_KEYS.alternate.into(),
                    PayloadValue::Number((position - start).max(0.0)),
                );
            }
        }

        match load_thumbnail_bytes(&props) {
            Ok(Some(bytes)) => {
                payload.insert(ARTWORK_KEYS.alternate.into(), PayloadValue::Bytes(bytes));
            }
            Ok(None) => {}
            Err(err) => tracing::debug!(error = ?err, "Artwork unavailable"),
        }

        Ok(payload)
    }
}

impl MediaCapability for SessionCapability {
    fn name(&self) -> &str {
        "windows-media-session"
    }

    fn now_playing(&self) -> Result<Option<RawPayload>, CapabilityError> {
        let Some(session) = self.current_session() else {
            return Ok(None);
        };
        self.fetch_payload(&session).map(Some).map_err(backend)
    }

    fn is_playing(&self) -> Result<bool, CapabilityError> {
        let Some(session) = self.current_session() else {
            return Ok(false);
        };
        let status = session
            .GetPlaybackInfo()
            .and_then(|info| info.PlaybackStatus())
            .map_err(backend)?;
        Ok(status == GlobalSystemMediaTransportControlsSessionPlaybackStatus::Playing)
    }

    fn send_command(&self, command: MediaCommand) -> bool {
        let Some(session) = self.current_session() else {
            return false;
        };
        let result = match command {
            MediaCommand::TogglePlayPause => session
                .TryTogglePlayPauseAsync()
                .and_then(block_on_operation),
            MediaCommand::Next => session.TrySkipNextAsync().and_then(block_on_operation),
            MediaCommand::Previous => session.TrySkipPreviousAsync().and_then(block_on_operation),
        };
        match result {
            Ok(accepted) => accepted,
            Err(err) => {
                tracing::debug!(%command, error = ?err, "Media session rejected command");
                false
            }
        }
    }

    fn subscribe(&self, names: &[String], on_change: ChangeCallback) -> bool {
        tracing::debug!(
            names = names.len(),
            "Using session manager events for change notifications"
        );

        let current = on_change.clone();
        let current_handler = TypedEventHandler::new(move |_, _| {
            current();
            Ok(())
        });
        let sessions = on_change;
        let sessions_handler = TypedEventHandler::new(move |_, _| {
            sessions();
            Ok(())
        });

        let mut tokens = match self.tokens.lock() {
            Ok(tokens) => tokens,
            Err(poisoned) => poisoned.into_inner(),
        };
        match self.manager.CurrentSessionChanged(&current_handler) {
            Ok(token) => tokens.current_session_changed = Some(token),
            Err(err) => {
                tracing::warn!(error = ?err, "CurrentSessionChanged subscription failed");
                return false;
            }
        }
        match self.manager.SessionsChanged(&sessions_handler) {
            Ok(token) => tokens.sessions_changed = Some(token),
            Err(err) => tracing::warn!(error = ?err, "SessionsChanged subscription failed"),
        }
        true
    }
}

impl Drop for SessionCapability {
    fn drop(&mut self) {
        let tokens = match self.tokens.get_mut() {
            Ok(tokens) => std::mem::take(tokens),
            Err(poisoned) => std::mem::take(poisoned.into_inner()),
        };
        if let Some(token) = tokens.current_session_changed {
            let _ = self.manager.RemoveCurrentSessionChanged(token);
        }
        if let Some(token) = tokens.sessions_changed {
            let _ = self.manager.RemoveSessionsChanged(token);
        }
    }
}

fn backend(err: windows::core::Error) -> CapabilityError {
    CapabilityError::Backend(format!("{err:?}"))
}

fn time_span_to_secs(span: TimeSpan) -> f64 {
    span.Duration as f64 / TICKS_PER_SECOND
}

fn block_on_operation<O, T>(operation: O) -> WinResult<T>
where
    O: IntoFuture<Output = WinResult<T>>,
{
    block_on(operation.into_future())
}

fn load_thumbnail_bytes(
    props: &GlobalSystemMediaTransportControlsSessionMediaProperties,
) -> WinResult<Option<Vec<u8>>> {
    let reference: IRandomAccessStreamReference = match props.Thumbnail() {
        Ok(reference) => reference,
        Err(_) => return Ok(None),
    };

    let stream = block_on_operation(reference.OpenReadAsync()?)?;
    let input_stream = stream.GetInputStreamAt(0)?;
    let reader = DataReader::CreateDataReader(&input_stream)?;
    reader.SetInputStreamOptions(InputStreamOptions::Partial)?;

    let mut buffer = Vec::new();
    const CHUNK: u32 = 64 * 1024;

    loop {
        let loaded = block_on_operation(reader.LoadAsync(CHUNK)?)?;
        if loaded == 0 {
            break;
        }
        let mut chunk = vec![0u8; loaded as usize];
        reader.ReadBytes(&mut chunk)?;
        buffer.extend_from_slice(&chunk);
        if loaded < CHUNK {
            break;
        }
    }

    Ok(Some(buffer))
}
