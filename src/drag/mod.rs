mod probe;

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{self, Receiver},
        Arc,
    },
    thread,
    time::Duration,
};

use eframe::egui::{Pos2, Rect};

pub use probe::{platform_probe, PointerProbe};

use crate::Waker;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DragPollSample {
    pub mouse_button_down: bool,
    pub pasteboard_has_file_urls: bool,
    pub mouse_location: Pos2,
}

impl DragPollSample {
    pub fn to_points(self, pixels_per_point: f32) -> Self {
        let scale = if pixels_per_point > 0.0 {
            1.0 / pixels_per_point
        } else {
            1.0
        };
        Self {
            mouse_location: Pos2::new(
                self.mouse_location.x * scale,
                self.mouse_location.y * scale,
            ),
            ..self
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DragEdge {
    Entered,
    Exited,
}

#[derive(Debug)]
pub struct DragSessionDetector {
    trigger_zone: Rect,
    active: bool,
}

impl DragSessionDetector {
    pub fn new(trigger_zone: Rect) -> Self {
        Self {
            trigger_zone,
            active: false,
        }
    }

    pub fn trigger_zone(&self) -> Rect {
        self.trigger_zone
    }

    pub fn set_trigger_zone(&mut self, zone: Rect) {
        self.trigger_zone = zone;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn observe(&mut self, sample: &DragPollSample) -> Option<DragEdge> {
        if self.active {
            if !sample.mouse_button_down {
                self.active = false;
                return Some(DragEdge::Exited);
            }
            return None;
        }

        if sample.mouse_button_down
            && sample.pasteboard_has_file_urls
            && self.trigger_zone.contains(sample.mouse_location)
        {
            self.active = true;
            return Some(DragEdge::Entered);
        }
        None
    }

    pub fn finish(&mut self) -> Option<DragEdge> {
        if self.active {
            self.active = false;
            Some(DragEdge::Exited)
        } else {
            None
        }
    }
}

pub struct DragPoller {
    samples: Receiver<DragPollSample>,
    running: Arc<AtomicBool>,
}

impl DragPoller {
    pub fn start(mut probe: Box<dyn PointerProbe>, interval: Duration, waker: Waker) -> Self {
        let (tx, rx) = mpsc::channel();
        let running = Arc::new(AtomicBool::new(true));
        let thread_running = running.clone();
        let probe_name = probe.name().to_owned();

        let spawned = thread::Builder::new()
            .name("drag-poller".into())
            .spawn(move || {
                let mut last: Option<DragPollSample> = None;
                while thread_running.load(Ordering::Relaxed) {
                    if let Some(sample) = probe.sample() {
                        if last != Some(sample) {
                            last = Some(sample);
                            if tx.send(sample).is_err() {
                                break;
                            }
                            waker();
                        }
                    }
                    thread::sleep(interval);
                }
                tracing::debug!("Drag poller stopped");
            });

        match spawned {
            Ok(_) => tracing::info!(
                probe = %probe_name,
                interval_ms = interval.as_millis() as u64,
                "Drag poller started"
            ),
            Err(err) => tracing::error!(error = %err, "Failed to spawn drag poller"),
        }

        Self {
            samples: rx,
            running,
        }
    }

    pub fn drain(&self) -> Vec<DragPollSample> {
        self.samples.try_iter().collect()
    }
}

impl Drop for DragPoller {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
    }
}
