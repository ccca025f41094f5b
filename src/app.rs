use std::{
    path::PathBuf,
    sync::Arc,
    time::{Duration, Instant},
};

use eframe::egui::{
    self, Color32, CornerRadius, Id, Pos2, Rect, Stroke, StrokeKind, UiBuilder, Vec2,
};

use crate::{
    artwork::ArtworkCache,
    config::{Config, ConfigWatcher},
    drag::{platform_probe, DragEdge, DragPoller, DragSessionDetector},
    expansion::{ExpansionState, ExpansionStateMachine, PhaseTiming},
    media::{format_timestamp, MediaSnapshot, MediaSourceMonitor},
    request::{self, PanelRequest, RequestReceiver, RequestSender},
    router::{InputStrategy, PanelInputRouter},
    Waker,
};

const PANEL_FILL: Color32 = Color32::from_rgb(14, 14, 18);
const GLOW_COLOR: Color32 = Color32::from_rgb(120, 170, 255);
const ARTWORK_SIZE: f32 = 72.0;
const PLAYING_REPAINT: Duration = Duration::from_millis(250);

pub struct PanelApp {
    config: Config,
    config_watcher: Option<ConfigWatcher>,
    machine: ExpansionStateMachine,
    monitor: MediaSourceMonitor,
    router: PanelInputRouter,
    detector: DragSessionDetector,
    poller: Option<DragPoller>,
    requests: RequestReceiver,
    request_sender: RequestSender,
    artwork: ArtworkCache,
    strip_file_hover: bool,
}

impl PanelApp {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        config: Config,
        config_path: Option<PathBuf>,
    ) -> Self {
        let ctx = cc.egui_ctx.clone();
        let waker: Waker = Arc::new(move || ctx.request_repaint());

        let monitor = MediaSourceMonitor::resolve_and_start(&config.media, waker.clone());

        let (strategy, poller) = match platform_probe() {
            Some(probe) => (
                InputStrategy::GlobalProbe,
                Some(DragPoller::start(
                    probe,
                    config.drag.poll_interval(),
                    waker.clone(),
                )),
            ),
            None => {
                tracing::info!("No global pointer probe on this platform, using trigger strip");
                (InputStrategy::TriggerStrip, None)
            }
        };

        let config_watcher = config_path.as_deref().and_then(|path| {
            ConfigWatcher::watch(path)
                .map_err(|err| tracing::warn!(error = ?err, "Config hot-reload disabled"))
                .ok()
        });

        let (request_sender, requests) = request::channel(waker);

        Self {
            machine: ExpansionStateMachine::new(PhaseTiming::from_config(&config.timing)),
            monitor,
            router: PanelInputRouter::new(strategy),
            detector: DragSessionDetector::new(Rect::NOTHING),
            poller,
            requests,
            request_sender,
            artwork: ArtworkCache::default(),
            strip_file_hover: false,
            config_watcher,
            config,
        }
    }

    pub fn request_sender(&self) -> RequestSender {
        self.request_sender.clone()
    }

    fn maintain_config_watcher(&mut self) {
        let Some(config) = self.config_watcher.as_ref().and_then(ConfigWatcher::poll) else {
            return;
        };
        if config.media != self.config.media || config.drag != self.config.drag {
            tracing::info!("Media and drag settings apply on next start");
        }
        self.machine
            .set_timing(PhaseTiming::from_config(&config.timing));
        self.config = config;
    }

    fn route_pointer(&mut self, ctx: &egui::Context, now: Instant) {
        match self.router.strategy() {
            InputStrategy::GlobalProbe => self.route_probe_samples(ctx, now),
            InputStrategy::TriggerStrip => self.route_window_pointer(ctx, now),
        }

        let dropped = ctx.input(|i| i.raw.dropped_files.clone());
        if !dropped.is_empty() {
            for file in &dropped {
                let name = file
                    .path
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| file.name.clone());
                tracing::info!(file = %name, "File dropped on panel");
            }
            self.strip_file_hover = false;
            end_drag_on_drop(&mut self.detector, &mut self.machine, now);
        }
    }

    fn route_probe_samples(&mut self, ctx: &egui::Context, now: Instant) {
        let Some(poller) = self.poller.as_ref() else {
            return;
        };
        let samples = poller.drain();
        if samples.is_empty() {
            return;
        }

        let pixels_per_point = ctx
            .input(|i| i.viewport().native_pixels_per_point)
            .unwrap_or(1.0);
        for sample in samples {
            let sample = sample.to_points(pixels_per_point);
            match self.detector.observe(&sample) {
                Some(DragEdge::Entered) => self.machine.file_drag_entered(now),
                Some(DragEdge::Exited) => self.machine.file_drag_exited(now),
                None => {}
            }

            let inside = self
                .router
                .layout()
                .is_some_and(|layout| layout.hit_rect.contains(sample.mouse_location));
            self.set_hover(inside, now);
        }
    }

    fn route_window_pointer(&mut self, ctx: &egui::Context, now: Instant) {
        let (inside, files_hovering) =
            ctx.input(|i| (i.pointer.has_pointer(), !i.raw.hovered_files.is_empty()));

        if files_hovering != self.strip_file_hover {
            self.strip_file_hover = files_hovering;
            if files_hovering {
                self.machine.file_drag_entered(now);
            } else {
                self.machine.file_drag_exited(now);
            }
        }
        self.set_hover(inside, now);
    }

    fn set_hover(&mut self, inside: bool, now: Instant) {
        if inside {
            self.machine.hover_entered(now);
        } else {
            self.machine.hover_exited(now);
        }
    }

    fn handle_keys(&mut self, ctx: &egui::Context) {
        if !self.machine.state().is_open() {
            return;
        }
        let pressed = ctx.input(|i| {
            PANEL_KEYS
                .iter()
                .filter(|(key, _)| i.key_pressed(*key))
                .map(|(_, request)| *request)
                .collect::<Vec<_>>()
        });
        for request in pressed {
            self.request_sender.send(request);
        }
    }

    fn desired_repaint_after(&self, now: Instant) -> Option<Duration> {
        let deadline = [self.machine.next_deadline(), self.monitor.next_deadline()]
            .into_iter()
            .flatten()
            .min()
            .map(|due| due.saturating_duration_since(now));

        let playing = self.machine.state().is_open() && self.monitor.snapshot().is_playing;
        match (deadline, playing) {
            (Some(due), true) => Some(due.min(PLAYING_REPAINT)),
            (Some(due), false) => Some(due),
            (None, true) => Some(PLAYING_REPAINT),
            (None, false) => None,
        }
    }

    fn render(&mut self, ctx: &egui::Context, now: Instant) {
        let panel = &self.config.panel;
        let visuals = self.machine.visuals();
        let state = self.machine.state();

        let width_t = ctx.animate_bool_with_time(Id::new("edge_panel.width"), visuals.full_width, 0.15);
        let glow_t = ctx.animate_bool_with_time(Id::new("edge_panel.glow"), visuals.glow, 0.1);
        let content_t =
            ctx.animate_bool_with_time(Id::new("edge_panel.content"), visuals.content_visible, 0.15);
        let open_t = ctx.animate_bool_with_time(
            Id::new("edge_panel.open"),
            state != ExpansionState::Collapsed,
            0.2,
        );

        let screen = ctx.screen_rect();
        let full_width = panel.expanded_width().min(screen.width());
        let width = egui::lerp(full_width * panel.collapsed_width_ratio()..=full_width, width_t);
        let height = panel.expanded_height();
        let peek_offset = (height - panel.peek_height()) * (1.0 - open_t);
        let panel_rect = Rect::from_min_size(
            Pos2::new(screen.center().x - width * 0.5, screen.top() - peek_offset),
            Vec2::new(width, height),
        );
        let opacity = egui::lerp(panel.collapsed_opacity()..=1.0, open_t);

        let snapshot = self.monitor.snapshot();
        let texture = self.artwork.update(ctx, snapshot.artwork.as_deref()).cloned();
        let mut clicked: Option<PanelRequest> = None;

        let mut frame = egui::Frame::central_panel(&ctx.style());
        frame.fill = Color32::TRANSPARENT;
        frame.inner_margin = egui::Margin::ZERO;

        egui::CentralPanel::default().frame(frame).show(ctx, |ui| {
            let painter = ui.painter();
            let rounding = CornerRadius {
                nw: 0,
                ne: 0,
                sw: 18,
                se: 18,
            };
            if glow_t > 0.0 {
                painter.rect_stroke(
                    panel_rect.expand(1.0),
                    rounding,
                    Stroke::new(1.0 + 2.0 * glow_t, GLOW_COLOR.gamma_multiply(0.6 * glow_t * opacity)),
                    StrokeKind::Outside,
                );
            }
            painter.rect_filled(panel_rect, rounding, PANEL_FILL.gamma_multiply(opacity));

            if content_t <= 0.01 {
                return;
            }

            let content_rect = panel_rect.shrink2(Vec2::new(18.0, 14.0));
            let mut content = ui.new_child(
                UiBuilder::new()
                    .max_rect(content_rect)
                    .layout(egui::Layout::left_to_right(egui::Align::Center))
                    .id_salt("edge_panel.content"),
            );
            content.set_opacity(content_t);
            clicked = render_now_playing(&mut content, snapshot, texture.as_ref(), now);
        });

        if let Some(request) = clicked {
            self.request_sender.send(request);
        }
    }
}

pub const PANEL_KEYS: [(egui::Key, PanelRequest); 4] = [
    (egui::Key::Space, PanelRequest::TogglePlayPause),
    (egui::Key::ArrowRight, PanelRequest::Next),
    (egui::Key::ArrowLeft, PanelRequest::Previous),
    (egui::Key::Escape, PanelRequest::Collapse),
];

pub fn request_for_key(key: egui::Key) -> Option<PanelRequest> {
    PANEL_KEYS
        .iter()
        .find(|(bound, _)| *bound == key)
        .map(|(_, request)| *request)
}

pub fn end_drag_on_drop(
    detector: &mut DragSessionDetector,
    machine: &mut ExpansionStateMachine,
    now: Instant,
) {
    detector.finish();
    machine.file_drag_exited(now);
}

fn render_now_playing(
    ui: &mut egui::Ui,
    snapshot: &MediaSnapshot,
    texture: Option<&egui::TextureHandle>,
    now: Instant,
) -> Option<PanelRequest> {
    let mut clicked = None;
    let art_size = Vec2::splat(ARTWORK_SIZE);

    match texture {
        Some(texture) => {
            ui.add(
                egui::Image::new((texture.id(), art_size))
                    .fit_to_exact_size(art_size)
                    .corner_radius(CornerRadius::same(10)),
            );
        }
        None => {
            let (rect, _) = ui.allocate_exact_size(art_size, egui::Sense::hover());
            ui.painter()
                .rect_filled(rect, CornerRadius::same(10), Color32::from_gray(40));
        }
    }

    ui.vertical(|ui| {
        ui.spacing_mut().item_spacing.y = 4.0;
        ui.add(
            egui::Label::new(egui::RichText::new(&snapshot.title).strong().size(16.0)).truncate(),
        );
        if !snapshot.artist.is_empty() {
            ui.add(egui::Label::new(egui::RichText::new(&snapshot.artist).weak()).truncate());
        }

        if snapshot.is_placeholder() {
            return;
        }

        if snapshot.duration > 0.0 {
            ui.add(
                egui::ProgressBar::new(snapshot.progress_at(now))
                    .desired_width(f32::INFINITY)
                    .desired_height(4.0),
            );
            ui.small(format!(
                "{} / {}",
                format_timestamp(snapshot.elapsed_at(now)),
                format_timestamp(snapshot.duration)
            ));
        }

        ui.horizontal(|ui| {
            if ui.button("⏮").on_hover_text("Previous track").clicked() {
                clicked = Some(PanelRequest::Previous);
            }
            let (glyph, hint) = if snapshot.is_playing {
                ("⏸", "Pause")
            } else {
                ("▶", "Play")
            };
            if ui.button(glyph).on_hover_text(hint).clicked() {
                clicked = Some(PanelRequest::TogglePlayPause);
            }
            if ui.button("⏭").on_hover_text("Next track").clicked() {
                clicked = Some(PanelRequest::Next);
            }
        });
    });

    clicked
}

impl eframe::App for PanelApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = Instant::now();

        self.maintain_config_watcher();
        self.route_pointer(ctx, now);
        self.handle_keys(ctx);

        for request in self.requests.drain() {
            request::dispatch(request, &mut self.machine, &mut self.monitor);
        }
        self.monitor.pump(now);
        self.machine.tick(now);

        self.router.sync(
            ctx,
            self.machine.state(),
            self.machine.is_dragging_file(),
            &self.config.panel,
        );
        if let Some(layout) = self.router.layout() {
            self.detector.set_trigger_zone(layout.trigger_zone);
        }

        self.render(ctx, now);

        if let Some(after) = self.desired_repaint_after(now) {
            ctx.request_repaint_after(after);
        }
    }

    fn clear_color(&self, _visuals: &egui::Visuals) -> [f32; 4] {
        [0.0; 4]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drag::DragPollSample;

    #[test]
    fn keys_map_to_panel_requests() {
        assert_eq!(
            request_for_key(egui::Key::Space),
            Some(PanelRequest::TogglePlayPause)
        );
        assert_eq!(request_for_key(egui::Key::ArrowRight), Some(PanelRequest::Next));
        assert_eq!(request_for_key(egui::Key::ArrowLeft), Some(PanelRequest::Previous));
        assert_eq!(request_for_key(egui::Key::Escape), Some(PanelRequest::Collapse));
        assert_eq!(request_for_key(egui::Key::Enter), None);
    }

    #[test]
    fn drop_ends_drag_session_and_arms_collapse() {
        let t0 = Instant::now();
        let zone = Rect::from_min_max(Pos2::new(800.0, 0.0), Pos2::new(1120.0, 24.0));
        let mut detector = DragSessionDetector::new(zone);
        let mut machine = ExpansionStateMachine::default();

        let over_zone = DragPollSample {
            mouse_button_down: true,
            pasteboard_has_file_urls: true,
            mouse_location: Pos2::new(900.0, 10.0),
        };
        assert_eq!(detector.observe(&over_zone), Some(DragEdge::Entered));
        machine.file_drag_entered(t0);
        machine.tick(t0 + Duration::from_millis(500));
        assert_eq!(machine.state(), ExpansionState::Expanded);

        end_drag_on_drop(&mut detector, &mut machine, t0 + Duration::from_millis(600));
        assert!(!detector.is_active());
        assert!(!machine.is_dragging_file());
        assert!(machine.has_pending_debounce());

        machine.tick(t0 + Duration::from_secs(2));
        assert_eq!(machine.state(), ExpansionState::Collapsed);
    }
}
