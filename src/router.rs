use eframe::egui::{self, Pos2, Rect, Vec2, ViewportCommand};

use crate::{config::PanelConfig, expansion::ExpansionState};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputStrategy {
    GlobalProbe,
    TriggerStrip,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputMode {
    PassThrough,
    Capture,
}

impl InputMode {
    pub fn is_pass_through(self) -> bool {
        self == InputMode::PassThrough
    }
}

pub fn input_mode(strategy: InputStrategy, state: ExpansionState, dragging_file: bool) -> InputMode {
    match strategy {
        InputStrategy::TriggerStrip => InputMode::Capture,
        InputStrategy::GlobalProbe if state.is_open() || dragging_file => InputMode::Capture,
        InputStrategy::GlobalProbe => InputMode::PassThrough,
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PanelLayout {
    pub window: Rect,
    pub hit_rect: Rect,
    pub trigger_zone: Rect,
}

impl PanelLayout {
    pub fn compute(
        monitor: Vec2,
        state: ExpansionState,
        dragging_file: bool,
        strategy: InputStrategy,
        panel: &PanelConfig,
    ) -> Self {
        let full = Vec2::new(
            panel.expanded_width().min(monitor.x.max(1.0)),
            panel.expanded_height(),
        );
        let trigger_size = Vec2::new(
            full.x * panel.collapsed_width_ratio(),
            panel.trigger_height().min(full.y),
        );
        let trigger_zone = top_center(monitor, trigger_size);
        let full_rect = top_center(monitor, full);

        let engaged = state != ExpansionState::Collapsed || dragging_file;
        let window = match strategy {
            InputStrategy::TriggerStrip if !engaged => trigger_zone,
            _ => full_rect,
        };
        let hit_rect = if state.is_open() { full_rect } else { trigger_zone };

        Self {
            window,
            hit_rect,
            trigger_zone,
        }
    }
}

fn top_center(monitor: Vec2, size: Vec2) -> Rect {
    let left = ((monitor.x - size.x) * 0.5).max(0.0).round();
    Rect::from_min_size(Pos2::new(left, 0.0), size)
}

#[derive(Debug)]
pub struct PanelInputRouter {
    strategy: InputStrategy,
    last_monitor: Option<Vec2>,
    last_pass_through: Option<bool>,
    last_position: Option<Pos2>,
    last_size: Option<Vec2>,
    layout: Option<PanelLayout>,
}

impl PanelInputRouter {
    pub fn new(strategy: InputStrategy) -> Self {
        Self {
            strategy,
            last_monitor: None,
            last_pass_through: None,
            last_position: None,
            last_size: None,
            layout: None,
        }
    }

    pub fn strategy(&self) -> InputStrategy {
        self.strategy
    }

    pub fn layout(&self) -> Option<PanelLayout> {
        self.layout
    }

    pub fn is_pass_through(&self) -> bool {
        self.last_pass_through.unwrap_or(false)
    }

    pub fn plan(
        &mut self,
        monitor: Option<Vec2>,
        state: ExpansionState,
        dragging_file: bool,
        panel: &PanelConfig,
    ) -> Vec<ViewportCommand> {
        let mut commands = Vec::new();

        let pass_through = input_mode(self.strategy, state, dragging_file).is_pass_through();
        if self.last_pass_through != Some(pass_through) {
            tracing::debug!(pass_through, ?state, dragging_file, "Input routing changed");
            commands.push(ViewportCommand::MousePassthrough(pass_through));
            self.last_pass_through = Some(pass_through);
        }

        let Some(monitor) = monitor.filter(|m| m.x > 0.0 && m.y > 0.0).or(self.last_monitor)
        else {
            return commands;
        };
        if self.last_monitor != Some(monitor) {
            if let Some(previous) = self.last_monitor {
                tracing::info!(
                    from = ?previous,
                    to = ?monitor,
                    "Display geometry changed, repositioning panel"
                );
            }
            self.last_monitor = Some(monitor);
        }

        let layout = PanelLayout::compute(monitor, state, dragging_file, self.strategy, panel);
        if self.last_size != Some(layout.window.size()) {
            commands.push(ViewportCommand::InnerSize(layout.window.size()));
            self.last_size = Some(layout.window.size());
        }
        if self.last_position != Some(layout.window.min) {
            commands.push(ViewportCommand::OuterPosition(layout.window.min));
            self.last_position = Some(layout.window.min);
        }
        self.layout = Some(layout);

        commands
    }

    pub fn sync(
        &mut self,
        ctx: &egui::Context,
        state: ExpansionState,
        dragging_file: bool,
        panel: &PanelConfig,
    ) {
        let monitor = ctx.input(|i| i.viewport().monitor_size);
        for command in self.plan(monitor, state, dragging_file, panel) {
            ctx.send_viewport_cmd(command);
        }
    }
}
