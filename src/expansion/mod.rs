mod phase;

use std::time::{Duration, Instant};

use phase::DeferredSlot;

use crate::{config::TimingConfig, observable::Observable};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ExpansionState {
    #[default]
    Collapsed,
    Expanding,
    Expanded,
    Collapsing,
}

impl ExpansionState {
    pub fn is_open(self) -> bool {
        matches!(self, ExpansionState::Expanding | ExpansionState::Expanded)
    }

    pub fn is_closed(self) -> bool {
        !self.is_open()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PanelVisuals {
    pub glow: bool,
    pub full_width: bool,
    pub content_visible: bool,
}

impl PanelVisuals {
    fn open() -> Self {
        Self {
            glow: true,
            full_width: true,
            content_visible: true,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PhaseTiming {
    pub expand_scale: Duration,
    pub expand_reveal: Duration,
    pub collapse_shrink: Duration,
    pub collapse_settle: Duration,
    pub collapse_debounce: Duration,
}

impl PhaseTiming {
    pub fn from_config(config: &TimingConfig) -> Self {
        let expand_scale = config.expand_scale_delay_ms.min(5_000);
        let expand_total = config.expand_reveal_delay_ms.clamp(expand_scale, 10_000);
        let collapse_shrink = config.collapse_shrink_delay_ms.min(5_000);
        let collapse_total = config
            .collapse_settle_delay_ms
            .clamp(collapse_shrink, 10_000);

        Self {
            expand_scale: Duration::from_millis(expand_scale),
            expand_reveal: Duration::from_millis(expand_total - expand_scale),
            collapse_shrink: Duration::from_millis(collapse_shrink),
            collapse_settle: Duration::from_millis(collapse_total - collapse_shrink),
            collapse_debounce: Duration::from_millis(config.collapse_debounce_ms.min(10_000)),
        }
    }

    pub fn expand_total(&self) -> Duration {
        self.expand_scale + self.expand_reveal
    }

    pub fn collapse_total(&self) -> Duration {
        self.collapse_shrink + self.collapse_settle
    }
}

impl Default for PhaseTiming {
    fn default() -> Self {
        Self::from_config(&TimingConfig::default())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PhaseAction {
    ExpandScale,
    ExpandReveal,
    CollapseShrink,
    CollapseSettle,
    DebounceElapsed,
}

const MAX_FIRES_PER_TICK: usize = 32;

pub struct ExpansionStateMachine {
    state: Observable<ExpansionState>,
    dragging_file: bool,
    mouse_inside: bool,
    visuals: PanelVisuals,
    first_phase: DeferredSlot<PhaseAction>,
    second_phase: DeferredSlot<PhaseAction>,
    debounce: DeferredSlot<PhaseAction>,
    timing: PhaseTiming,
}

impl ExpansionStateMachine {
    pub fn new(timing: PhaseTiming) -> Self {
        Self {
            state: Observable::new(ExpansionState::Collapsed),
            dragging_file: false,
            mouse_inside: false,
            visuals: PanelVisuals::default(),
            first_phase: DeferredSlot::new(),
            second_phase: DeferredSlot::new(),
            debounce: DeferredSlot::new(),
            timing,
        }
    }

    pub fn state(&self) -> ExpansionState {
        *self.state.get()
    }

    pub fn state_version(&self) -> u64 {
        self.state.version()
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&ExpansionState) + 'static) {
        self.state.subscribe(listener);
    }

    pub fn visuals(&self) -> PanelVisuals {
        self.visuals
    }

    pub fn is_dragging_file(&self) -> bool {
        self.dragging_file
    }

    pub fn is_mouse_inside(&self) -> bool {
        self.mouse_inside
    }

    pub fn timing(&self) -> PhaseTiming {
        self.timing
    }

    pub fn set_timing(&mut self, timing: PhaseTiming) {
        self.timing = timing;
    }

    pub fn pending_phase_work(&self) -> usize {
        usize::from(self.first_phase.is_pending()) + usize::from(self.second_phase.is_pending())
    }

    pub fn has_pending_debounce(&self) -> bool {
        self.debounce.is_pending()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        [
            self.first_phase.due(),
            self.second_phase.due(),
            self.debounce.due(),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    pub fn hover_entered(&mut self, now: Instant) {
        if self.mouse_inside {
            return;
        }
        self.mouse_inside = true;
        self.debounce.cancel();
        if self.state().is_closed() {
            self.begin_expand(now);
        }
    }

    pub fn hover_exited(&mut self, now: Instant) {
        if !self.mouse_inside {
            return;
        }
        self.mouse_inside = false;
        self.arm_debounce(now);
    }

    pub fn file_drag_entered(&mut self, now: Instant) {
        if self.dragging_file {
            return;
        }
        tracing::debug!("File drag entered trigger zone");
        self.dragging_file = true;
        self.debounce.cancel();
        if self.state().is_closed() {
            self.begin_expand(now);
        }
    }

    pub fn file_drag_exited(&mut self, now: Instant) {
        if !self.dragging_file {
            return;
        }
        tracing::debug!("File drag ended");
        self.dragging_file = false;
        self.arm_debounce(now);
    }

    pub fn expand(&mut self) {
        self.cancel_all();
        self.visuals = PanelVisuals::open();
        self.set_state(ExpansionState::Expanded);
    }

    /// Jumps to Collapsed without the phase sequence, dropping any pending
    /// phase work and debounce. Ignored while a file drag is active.
    pub fn collapse(&mut self) {
        if self.dragging_file {
            tracing::debug!("Ignoring collapse request during file drag");
            return;
        }
        self.cancel_all();
        self.visuals = PanelVisuals::default();
        self.set_state(ExpansionState::Collapsed);
    }

    pub fn toggle(&mut self) {
        if self.state().is_open() {
            self.collapse();
        } else {
            self.expand();
        }
    }

    /// Runs every deferred step due at `now`, oldest first. Follow-up steps
    /// are scheduled relative to the due time of the step that scheduled
    /// them, so a late tick still walks the sequence in order. Returns `true`
    /// if the state or visuals changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        let before = (self.state(), self.visuals);

        for _ in 0..MAX_FIRES_PER_TICK {
            let Some((due, action)) = self.take_earliest_due(now) else {
                break;
            };
            self.fire(action, due);
        }

        before != (self.state(), self.visuals)
    }

    fn take_earliest_due(&mut self, now: Instant) -> Option<(Instant, PhaseAction)> {
        let slots = [&self.first_phase, &self.second_phase, &self.debounce];
        let earliest = slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.due().map(|due| (index, due)))
            .filter(|(_, due)| *due <= now)
            .min_by_key(|(_, due)| *due)
            .map(|(index, _)| index)?;

        match earliest {
            0 => self.first_phase.take_due(now),
            1 => self.second_phase.take_due(now),
            _ => self.debounce.take_due(now),
        }
    }

    fn fire(&mut self, action: PhaseAction, at: Instant) {
        let engaged = self.engaged();
        match action {
            PhaseAction::ExpandScale => {
                if engaged {
                    self.visuals.full_width = true;
                    self.second_phase
                        .schedule(at + self.timing.expand_reveal, PhaseAction::ExpandReveal);
                } else {
                    self.begin_collapse(at);
                }
            }
            PhaseAction::ExpandReveal => {
                if engaged {
                    self.visuals.content_visible = true;
                    self.set_state(ExpansionState::Expanded);
                } else {
                    self.begin_collapse(at);
                }
            }
            PhaseAction::CollapseShrink => {
                if engaged {
                    self.begin_expand(at);
                } else {
                    self.visuals.full_width = false;
                    self.second_phase
                        .schedule(at + self.timing.collapse_settle, PhaseAction::CollapseSettle);
                }
            }
            PhaseAction::CollapseSettle => {
                if engaged {
                    self.begin_expand(at);
                } else {
                    self.visuals.glow = false;
                    self.set_state(ExpansionState::Collapsed);
                }
            }
            PhaseAction::DebounceElapsed => {
                if !engaged && self.state().is_open() {
                    self.begin_collapse(at);
                }
            }
        }
    }

    fn engaged(&self) -> bool {
        self.mouse_inside || self.dragging_file
    }

    fn arm_debounce(&mut self, now: Instant) {
        if self.engaged() || self.state().is_closed() {
            return;
        }
        self.debounce
            .schedule(now + self.timing.collapse_debounce, PhaseAction::DebounceElapsed);
    }

    fn begin_expand(&mut self, now: Instant) {
        self.cancel_phase_work();
        self.set_state(ExpansionState::Expanding);
        self.visuals.glow = true;
        self.first_phase
            .schedule(now + self.timing.expand_scale, PhaseAction::ExpandScale);
    }

    fn begin_collapse(&mut self, now: Instant) {
        self.cancel_phase_work();
        self.debounce.cancel();
        self.set_state(ExpansionState::Collapsing);
        self.visuals.content_visible = false;
        self.first_phase
            .schedule(now + self.timing.collapse_shrink, PhaseAction::CollapseShrink);
    }

    fn cancel_phase_work(&mut self) {
        let cancelled =
            usize::from(self.first_phase.cancel()) + usize::from(self.second_phase.cancel());
        if cancelled > 0 {
            tracing::trace!(cancelled, "Cancelled pending phase work");
        }
    }

    fn cancel_all(&mut self) {
        self.cancel_phase_work();
        self.debounce.cancel();
    }

    fn set_state(&mut self, next: ExpansionState) {
        let previous = self.state();
        if self.state.set(next) {
            tracing::debug!(from = ?previous, to = ?next, "Panel state changed");
        }
    }
}

impl Default for ExpansionStateMachine {
    fn default() -> Self {
        Self::new(PhaseTiming::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn timing_converts_totals_into_steps() {
        let timing = PhaseTiming::default();
        assert_eq!(timing.expand_scale, ms(100));
        assert_eq!(timing.expand_reveal, ms(150));
        assert_eq!(timing.expand_total(), ms(250));
        assert_eq!(timing.collapse_shrink, ms(150));
        assert_eq!(timing.collapse_settle, ms(100));
        assert_eq!(timing.collapse_debounce, ms(300));
    }

    #[test]
    fn timing_totals_never_precede_first_step() {
        let timing = PhaseTiming::from_config(&TimingConfig {
            expand_scale_delay_ms: 200,
            expand_reveal_delay_ms: 50,
            ..TimingConfig::default()
        });
        assert_eq!(timing.expand_reveal, Duration::ZERO);
    }

    #[test]
    fn phases_fire_in_order_with_visuals() {
        let t0 = Instant::now();
        let mut machine = ExpansionStateMachine::default();

        machine.hover_entered(t0);
        assert_eq!(machine.state(), ExpansionState::Expanding);
        assert_eq!(
            machine.visuals(),
            PanelVisuals {
                glow: true,
                full_width: false,
                content_visible: false
            }
        );

        machine.tick(t0 + ms(99));
        assert!(!machine.visuals().full_width);

        machine.tick(t0 + ms(100));
        assert!(machine.visuals().full_width);
        assert!(!machine.visuals().content_visible);
        assert_eq!(machine.state(), ExpansionState::Expanding);

        machine.tick(t0 + ms(250));
        assert_eq!(machine.state(), ExpansionState::Expanded);
        assert_eq!(machine.visuals(), PanelVisuals::open());
        assert_eq!(machine.pending_phase_work(), 0);
    }

    #[test]
    fn gates_are_checked_when_phase_fires() {
        let t0 = Instant::now();
        let mut machine = ExpansionStateMachine::default();

        machine.hover_entered(t0);
        machine.tick(t0 + ms(100));
        // Leaving after the scale phase but before reveal.
        machine.hover_exited(t0 + ms(120));
        machine.tick(t0 + ms(250));

        assert_eq!(machine.state(), ExpansionState::Collapsing);
        assert!(!machine.visuals().content_visible);
        assert!(!machine.has_pending_debounce());
    }

    #[test]
    fn hover_exit_collapses_after_debounce() {
        let t0 = Instant::now();
        let mut machine = ExpansionStateMachine::default();
        machine.hover_entered(t0);
        machine.tick(t0 + ms(1_000));
        assert_eq!(machine.state(), ExpansionState::Expanded);

        let exit = t0 + ms(2_000);
        machine.hover_exited(exit);
        assert!(machine.has_pending_debounce());

        machine.tick(exit + ms(299));
        assert_eq!(machine.state(), ExpansionState::Expanded);

        machine.tick(exit + ms(300));
        assert_eq!(machine.state(), ExpansionState::Collapsing);
        assert!(!machine.visuals().content_visible);

        machine.tick(exit + ms(450));
        assert!(!machine.visuals().full_width);
        assert!(machine.visuals().glow);

        machine.tick(exit + ms(550));
        assert_eq!(machine.state(), ExpansionState::Collapsed);
        assert_eq!(machine.visuals(), PanelVisuals::default());
    }

    #[test]
    fn reentry_before_debounce_cancels_collapse() {
        let t0 = Instant::now();
        let mut machine = ExpansionStateMachine::default();
        machine.hover_entered(t0);
        machine.tick(t0 + ms(1_000));

        machine.hover_exited(t0 + ms(1_100));
        machine.hover_entered(t0 + ms(1_200));
        assert!(!machine.has_pending_debounce());

        machine.tick(t0 + ms(5_000));
        assert_eq!(machine.state(), ExpansionState::Expanded);
    }

    #[test]
    fn reentry_during_collapse_restarts_expand() {
        let t0 = Instant::now();
        let mut machine = ExpansionStateMachine::default();
        machine.hover_entered(t0);
        machine.tick(t0 + ms(1_000));
        machine.hover_exited(t0 + ms(1_000));
        machine.tick(t0 + ms(1_300));
        assert_eq!(machine.state(), ExpansionState::Collapsing);

        machine.hover_entered(t0 + ms(1_350));
        assert_eq!(machine.state(), ExpansionState::Expanding);
        assert_eq!(machine.pending_phase_work(), 1);

        machine.tick(t0 + ms(3_000));
        assert_eq!(machine.state(), ExpansionState::Expanded);
        assert_eq!(machine.visuals(), PanelVisuals::open());
    }

    #[test]
    fn drag_entry_expands_and_drag_exit_arms_debounce() {
        let t0 = Instant::now();
        let mut machine = ExpansionStateMachine::default();

        machine.file_drag_entered(t0);
        assert_eq!(machine.state(), ExpansionState::Expanding);
        machine.tick(t0 + ms(500));
        assert_eq!(machine.state(), ExpansionState::Expanded);

        machine.file_drag_exited(t0 + ms(600));
        assert!(machine.has_pending_debounce());
        machine.tick(t0 + ms(2_000));
        assert_eq!(machine.state(), ExpansionState::Collapsed);
    }

    #[test]
    fn external_requests_are_immediate_and_idempotent() {
        let mut machine = ExpansionStateMachine::default();

        machine.expand();
        assert_eq!(machine.state(), ExpansionState::Expanded);
        assert_eq!(machine.visuals(), PanelVisuals::open());
        let version = machine.state_version();
        machine.expand();
        assert_eq!(machine.state_version(), version);

        machine.toggle();
        assert_eq!(machine.state(), ExpansionState::Collapsed);
        machine.collapse();
        assert_eq!(machine.state(), ExpansionState::Collapsed);
        assert_eq!(machine.visuals(), PanelVisuals::default());

        machine.toggle();
        assert_eq!(machine.state(), ExpansionState::Expanded);
    }

    #[test]
    fn collapse_requests_wait_for_drag_to_end() {
        let t0 = Instant::now();
        let mut machine = ExpansionStateMachine::default();
        machine.file_drag_entered(t0);
        machine.tick(t0 + ms(500));
        assert_eq!(machine.state(), ExpansionState::Expanded);

        machine.collapse();
        machine.toggle();
        machine.tick(t0 + ms(1_000));
        assert_eq!(machine.state(), ExpansionState::Expanded);
        assert_eq!(machine.visuals(), PanelVisuals::open());
        assert!(machine.is_dragging_file());

        machine.file_drag_exited(t0 + ms(1_000));
        machine.collapse();
        assert_eq!(machine.state(), ExpansionState::Collapsed);
        assert!(!machine.has_pending_debounce());
    }

    #[test]
    fn external_collapse_cancels_running_sequence() {
        let t0 = Instant::now();
        let mut machine = ExpansionStateMachine::default();
        machine.hover_entered(t0);
        assert_eq!(machine.pending_phase_work(), 1);

        machine.collapse();
        assert_eq!(machine.pending_phase_work(), 0);
        assert_eq!(machine.next_deadline(), None);
        assert!(!machine.tick(t0 + ms(1_000)));
        assert_eq!(machine.state(), ExpansionState::Collapsed);
    }

    #[test]
    fn next_deadline_tracks_earliest_slot() {
        let t0 = Instant::now();
        let mut machine = ExpansionStateMachine::default();
        assert_eq!(machine.next_deadline(), None);

        machine.hover_entered(t0);
        assert_eq!(machine.next_deadline(), Some(t0 + ms(100)));
        machine.hover_exited(t0 + ms(10));
        assert_eq!(machine.next_deadline(), Some(t0 + ms(100)));
    }
}
