use std::{
    sync::{
        mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use super::{
    capability::{resolve_capability, ChangeCallback, MediaCapability, MediaCommand},
    normalize::normalize,
    snapshot::MediaSnapshot,
};
use crate::{config::MediaConfig, observable::Observable, Waker};

enum WorkerRequest {
    Refresh,
    Command(MediaCommand),
    Shutdown,
}

pub struct MediaSourceMonitor {
    capability: Arc<dyn MediaCapability>,
    snapshot: Observable<MediaSnapshot>,
    requests: Option<Sender<WorkerRequest>>,
    updates: Option<Receiver<MediaSnapshot>>,
    pending_refresh: Option<Instant>,
    command_refresh_delay: Duration,
    push_enabled: bool,
}

impl MediaSourceMonitor {
    pub fn resolve_and_start(config: &MediaConfig, waker: Waker) -> Self {
        let capability = resolve_capability(config.bundle_path.as_deref());
        Self::start(capability, config, waker)
    }

    pub fn start(capability: Arc<dyn MediaCapability>, config: &MediaConfig, waker: Waker) -> Self {
        let mut monitor = Self {
            capability: capability.clone(),
            snapshot: Observable::new(MediaSnapshot::placeholder()),
            requests: None,
            updates: None,
            pending_refresh: None,
            command_refresh_delay: config.command_refresh_delay(),
            push_enabled: false,
        };

        if !capability.is_available() {
            return monitor;
        }

        let (request_tx, request_rx) = mpsc::channel();
        let (update_tx, update_rx) = mpsc::channel();
        let poll_interval = config.poll_interval();

        let worker_capability = capability.clone();
        let spawned = thread::Builder::new()
            .name("media-monitor".into())
            .spawn(move || {
                run_worker(
                    worker_capability,
                    request_rx,
                    update_tx,
                    waker,
                    poll_interval,
                )
            });
        if let Err(err) = spawned {
            tracing::error!(error = %err, "Failed to spawn media worker; media features disabled");
            return monitor;
        }

        let notifier = request_tx.clone();
        let on_change: ChangeCallback = Arc::new(move || {
            let _ = notifier.send(WorkerRequest::Refresh);
        });
        monitor.push_enabled = capability.subscribe(&config.notifications, on_change);
        tracing::info!(
            capability = capability.name(),
            push = monitor.push_enabled,
            poll_ms = poll_interval.as_millis() as u64,
            "Media monitor started"
        );

        let _ = request_tx.send(WorkerRequest::Refresh);
        monitor.requests = Some(request_tx);
        monitor.updates = Some(update_rx);
        monitor
    }

    pub fn is_degraded(&self) -> bool {
        self.requests.is_none()
    }

    pub fn capability_name(&self) -> &str {
        self.capability.name()
    }

    pub fn push_enabled(&self) -> bool {
        self.push_enabled
    }

    pub fn current_snapshot(&self) -> MediaSnapshot {
        self.snapshot.get().clone()
    }

    pub fn snapshot(&self) -> &MediaSnapshot {
        self.snapshot.get()
    }

    pub fn snapshot_version(&self) -> u64 {
        self.snapshot.version()
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&MediaSnapshot) + 'static) {
        self.snapshot.subscribe(listener);
    }

    pub fn refresh(&mut self) {
        self.send(WorkerRequest::Refresh);
    }

    pub fn toggle_play_pause(&mut self) {
        self.send_command(MediaCommand::TogglePlayPause);
    }

    pub fn next(&mut self) {
        self.send_command(MediaCommand::Next);
    }

    pub fn previous(&mut self) {
        self.send_command(MediaCommand::Previous);
    }

    fn send_command(&mut self, command: MediaCommand) {
        if self.is_degraded() {
            tracing::warn!(%command, "Media capability unavailable; command ignored");
            return;
        }
        tracing::debug!(%command, "Sending media command");
        self.send(WorkerRequest::Command(command));
        self.pending_refresh = Some(Instant::now() + self.command_refresh_delay);
    }

    fn send(&mut self, request: WorkerRequest) {
        let Some(tx) = self.requests.as_ref() else {
            return;
        };
        if tx.send(request).is_err() {
            tracing::warn!("Media worker stopped; media features disabled");
            self.requests = None;
            self.updates = None;
            self.pending_refresh = None;
        }
    }

    pub fn pump(&mut self, now: Instant) -> bool {
        let mut received = Vec::new();
        let mut disconnected = false;
        if let Some(rx) = self.updates.as_ref() {
            loop {
                match rx.try_recv() {
                    Ok(snapshot) => received.push(snapshot),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        disconnected = true;
                        break;
                    }
                }
            }
        }

        let mut changed = false;
        for snapshot in received {
            changed |= self.publish(snapshot);
        }
        if disconnected {
            tracing::warn!("Media worker exited; media features disabled");
            self.requests = None;
            self.updates = None;
            self.pending_refresh = None;
        }

        if let Some(due) = self.pending_refresh {
            if now >= due {
                self.pending_refresh = None;
                self.refresh();
            }
        }

        changed
    }

    fn publish(&mut self, snapshot: MediaSnapshot) -> bool {
        let changed = self.snapshot.replace(snapshot);
        if changed {
            let current = self.snapshot.get();
            tracing::debug!(
                title = %current.title,
                artist = %current.artist,
                playing = current.is_playing,
                "Now playing changed"
            );
        }
        changed
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending_refresh
    }

    #[cfg(test)]
    fn wait_for_publish(&mut self, timeout: Duration) -> bool {
        let Some(rx) = self.updates.as_ref() else {
            return false;
        };
        match rx.recv_timeout(timeout) {
            Ok(snapshot) => {
                self.publish(snapshot);
                true
            }
            Err(_) => false,
        }
    }
}

impl Drop for MediaSourceMonitor {
    fn drop(&mut self) {
        if let Some(tx) = self.requests.take() {
            let _ = tx.send(WorkerRequest::Shutdown);
        }
    }
}

#[derive(Debug, Default, PartialEq)]
struct WorkerBatch {
    commands: Vec<MediaCommand>,
    refresh: bool,
}

/// Waits for the next request (a timeout counts as a refresh), then takes
/// everything else already queued so a burst of notifications costs one poll.
/// `None` means the worker should stop.
fn next_batch(requests: &Receiver<WorkerRequest>, poll_interval: Duration) -> Option<WorkerBatch> {
    let first = match requests.recv_timeout(poll_interval) {
        Ok(request) => request,
        Err(RecvTimeoutError::Timeout) => WorkerRequest::Refresh,
        Err(RecvTimeoutError::Disconnected) => return None,
    };

    let mut batch = WorkerBatch::default();
    for request in std::iter::once(first).chain(requests.try_iter()) {
        match request {
            WorkerRequest::Refresh => batch.refresh = true,
            WorkerRequest::Command(command) => batch.commands.push(command),
            WorkerRequest::Shutdown => return None,
        }
    }
    Some(batch)
}

fn run_worker(
    capability: Arc<dyn MediaCapability>,
    requests: Receiver<WorkerRequest>,
    updates: Sender<MediaSnapshot>,
    waker: Waker,
    poll_interval: Duration,
) {
    #[cfg(target_os = "windows")]
    let _apartment = super::gsmtc::ComApartment::enter();

    while let Some(batch) = next_batch(&requests, poll_interval) {
        for command in batch.commands {
            if !capability.send_command(command) {
                tracing::debug!(%command, "Media command was not accepted");
            }
        }
        if !batch.refresh {
            continue;
        }

        let snapshot = update_media_info(capability.as_ref());
        if updates.send(snapshot).is_err() {
            break;
        }
        waker();
    }

    tracing::debug!("Media worker stopped");
}

pub fn update_media_info(capability: &dyn MediaCapability) -> MediaSnapshot {
    let captured_at = Instant::now();
    let payload = match capability.now_playing() {
        Ok(payload) => payload.filter(|p| !p.is_empty()),
        Err(err) => {
            tracing::debug!(error = %err, "Now-playing query failed");
            None
        }
    };

    let Some(payload) = payload else {
        tracing::trace!("No now-playing payload this tick");
        return MediaSnapshot::placeholder();
    };

    let is_playing = match capability.is_playing() {
        Ok(playing) => Some(playing),
        Err(err) => {
            tracing::debug!(error = %err, "Playback state query failed");
            None
        }
    };

    let snapshot = normalize(Some(&payload), is_playing, captured_at);
    if snapshot.is_placeholder() {
        tracing::debug!(keys = payload.len(), "Now-playing payload had no usable title");
    }
    snapshot
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::capability::{CapabilityError, DisabledCapability, PayloadValue, RawPayload};
    use crate::media::normalize::{ARTIST_KEYS, DURATION_KEYS, TITLE_KEYS};
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeCapability {
        payload: Mutex<Option<RawPayload>>,
        playing: Mutex<bool>,
        commands: Mutex<Vec<MediaCommand>>,
        subscriptions: Mutex<Vec<String>>,
        on_change: Mutex<Option<ChangeCallback>>,
    }

    impl FakeCapability {
        fn set_track(&self, title: &str, artist: &str, duration: f64) {
            let mut payload = RawPayload::new();
            payload.insert(TITLE_KEYS.primary.into(), PayloadValue::from(title));
            payload.insert(ARTIST_KEYS.primary.into(), PayloadValue::from(artist));
            payload.insert(DURATION_KEYS.primary.into(), PayloadValue::Number(duration));
            *self.payload.lock().unwrap() = Some(payload);
        }
    }

    impl MediaCapability for FakeCapability {
        fn name(&self) -> &str {
            "fake"
        }

        fn now_playing(&self) -> Result<Option<RawPayload>, CapabilityError> {
            Ok(self.payload.lock().unwrap().clone())
        }

        fn is_playing(&self) -> Result<bool, CapabilityError> {
            Ok(*self.playing.lock().unwrap())
        }

        fn send_command(&self, command: MediaCommand) -> bool {
            self.commands.lock().unwrap().push(command);
            if command == MediaCommand::TogglePlayPause {
                let mut playing = self.playing.lock().unwrap();
                *playing = !*playing;
            }
            true
        }

        fn subscribe(&self, names: &[String], on_change: ChangeCallback) -> bool {
            self.subscriptions.lock().unwrap().extend(names.iter().cloned());
            *self.on_change.lock().unwrap() = Some(on_change);
            true
        }
    }

    struct FailingCapability;

    impl MediaCapability for FailingCapability {
        fn name(&self) -> &str {
            "failing"
        }

        fn now_playing(&self) -> Result<Option<RawPayload>, CapabilityError> {
            Err(CapabilityError::Backend("session vanished".into()))
        }

        fn is_playing(&self) -> Result<bool, CapabilityError> {
            Err(CapabilityError::Backend("session vanished".into()))
        }

        fn send_command(&self, _command: MediaCommand) -> bool {
            false
        }

        fn subscribe(&self, _names: &[String], _on_change: ChangeCallback) -> bool {
            false
        }
    }

    fn no_wake() -> Waker {
        Arc::new(|| {})
    }

    fn slow_poll_config() -> MediaConfig {
        MediaConfig {
            poll_interval_ms: 10_000,
            command_refresh_delay_ms: 50,
            ..MediaConfig::default()
        }
    }

    const WAIT: Duration = Duration::from_secs(5);

    #[test]
    fn snapshot_defaults_to_placeholder() {
        let fake = Arc::new(FakeCapability::default());
        let monitor = MediaSourceMonitor::start(fake, &slow_poll_config(), no_wake());
        assert!(monitor.current_snapshot().is_placeholder());
    }

    #[test]
    fn initial_poll_publishes_track() {
        let fake = Arc::new(FakeCapability::default());
        fake.set_track("Roygbiv", "Boards of Canada", 151.0);

        let mut monitor = MediaSourceMonitor::start(fake, &slow_poll_config(), no_wake());
        assert!(monitor.wait_for_publish(WAIT));

        let snapshot = monitor.current_snapshot();
        assert_eq!(snapshot.title, "Roygbiv");
        assert_eq!(snapshot.artist, "Boards of Canada");
        assert_eq!(monitor.snapshot_version(), 1);
    }

    #[test]
    fn malformed_payload_publishes_placeholder_then_recovers() {
        let fake = Arc::new(FakeCapability::default());
        fake.set_track("Roygbiv", "Boards of Canada", 151.0);
        let mut monitor = MediaSourceMonitor::start(fake.clone(), &slow_poll_config(), no_wake());
        assert!(monitor.wait_for_publish(WAIT));

        let mut junk = RawPayload::new();
        junk.insert("unexpected".into(), PayloadValue::Bool(true));
        *fake.payload.lock().unwrap() = Some(junk);
        monitor.refresh();
        assert!(monitor.wait_for_publish(WAIT));
        assert!(monitor.current_snapshot().is_placeholder());

        fake.set_track("Roygbiv", "Boards of Canada", 151.0);
        monitor.refresh();
        assert!(monitor.wait_for_publish(WAIT));
        assert_eq!(monitor.current_snapshot().title, "Roygbiv");
    }

    #[test]
    fn backend_errors_degrade_to_placeholder() {
        assert!(update_media_info(&FailingCapability).is_placeholder());
    }

    #[test]
    fn subscribes_to_configured_notifications_and_refreshes_on_change() {
        let fake = Arc::new(FakeCapability::default());
        let config = slow_poll_config();
        let mut monitor = MediaSourceMonitor::start(fake.clone(), &config, no_wake());
        assert!(monitor.push_enabled());
        assert_eq!(*fake.subscriptions.lock().unwrap(), config.notifications);
        assert!(monitor.wait_for_publish(WAIT));

        fake.set_track("Alberto Balsalm", "Aphex Twin", 312.0);
        let callback = fake.on_change.lock().unwrap().clone().unwrap();
        callback();
        assert!(monitor.wait_for_publish(WAIT));
        assert_eq!(monitor.current_snapshot().title, "Alberto Balsalm");
    }

    #[test]
    fn commands_reach_capability_and_schedule_refresh() {
        let fake = Arc::new(FakeCapability::default());
        fake.set_track("Avril 14th", "Aphex Twin", 125.0);
        let mut monitor = MediaSourceMonitor::start(fake.clone(), &slow_poll_config(), no_wake());
        assert!(monitor.wait_for_publish(WAIT));
        assert!(!monitor.current_snapshot().is_playing);

        monitor.toggle_play_pause();
        monitor.next();
        monitor.previous();
        let due = monitor.next_deadline().expect("refresh scheduled");

        assert!(!monitor.pump(due - Duration::from_millis(40)));
        assert!(monitor.next_deadline().is_some());

        monitor.pump(due);
        assert!(monitor.next_deadline().is_none());
        assert!(monitor.wait_for_publish(WAIT));
        assert!(monitor.current_snapshot().is_playing);
        assert_eq!(
            *fake.commands.lock().unwrap(),
            vec![
                MediaCommand::TogglePlayPause,
                MediaCommand::Next,
                MediaCommand::Previous
            ]
        );
    }

    #[test]
    fn disabled_capability_is_permanently_degraded() {
        let disabled = Arc::new(DisabledCapability::new("missing framework"));
        let mut monitor = MediaSourceMonitor::start(disabled, &slow_poll_config(), no_wake());

        assert!(monitor.is_degraded());
        monitor.toggle_play_pause();
        monitor.next();
        monitor.refresh();
        assert!(monitor.next_deadline().is_none());
        assert!(!monitor.pump(Instant::now() + Duration::from_secs(1)));
        assert!(monitor.current_snapshot().is_placeholder());
    }

    #[test]
    fn missing_bundle_resolves_to_degraded_monitor() {
        let dir = tempfile::tempdir().unwrap();
        let config = MediaConfig {
            bundle_path: Some(dir.path().join("Missing.framework")),
            ..slow_poll_config()
        };
        let monitor = MediaSourceMonitor::resolve_and_start(&config, no_wake());
        assert!(monitor.is_degraded());
        assert_eq!(monitor.capability_name(), "disabled");
    }

    #[test]
    fn queued_refreshes_coalesce_into_one_poll() {
        let (tx, rx) = mpsc::channel();
        for _ in 0..5 {
            tx.send(WorkerRequest::Refresh).unwrap();
        }
        tx.send(WorkerRequest::Command(MediaCommand::Next)).unwrap();
        tx.send(WorkerRequest::Refresh).unwrap();

        let batch = next_batch(&rx, Duration::from_millis(10)).unwrap();
        assert_eq!(
            batch,
            WorkerBatch {
                commands: vec![MediaCommand::Next],
                refresh: true,
            }
        );

        let idle = next_batch(&rx, Duration::from_millis(10)).unwrap();
        assert_eq!(idle, WorkerBatch { commands: Vec::new(), refresh: true });
    }

    #[test]
    fn command_only_batch_skips_poll_and_shutdown_stops() {
        let (tx, rx) = mpsc::channel();
        tx.send(WorkerRequest::Command(MediaCommand::TogglePlayPause)).unwrap();
        let batch = next_batch(&rx, Duration::from_secs(5)).unwrap();
        assert!(!batch.refresh);

        tx.send(WorkerRequest::Refresh).unwrap();
        tx.send(WorkerRequest::Shutdown).unwrap();
        assert_eq!(next_batch(&rx, Duration::from_secs(5)), None);

        drop(tx);
        assert_eq!(next_batch(&rx, Duration::from_secs(5)), None);
    }

    #[test]
    fn pump_publishes_every_queued_snapshot() {
        let fake = Arc::new(FakeCapability::default());
        fake.set_track("Halcyon", "Orbital", 560.0);
        let mut monitor = MediaSourceMonitor::start(fake.clone(), &slow_poll_config(), no_wake());

        monitor.refresh();
        monitor.refresh();
        let deadline = Instant::now() + Duration::from_secs(5);
        while monitor.current_snapshot().is_placeholder() && Instant::now() < deadline {
            monitor.pump(Instant::now());
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(monitor.current_snapshot().title, "Halcyon");
        assert!(!monitor.is_degraded());
    }
}
