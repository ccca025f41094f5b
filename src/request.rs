use std::sync::mpsc::{self, Receiver, Sender};

use crate::{expansion::ExpansionStateMachine, media::MediaSourceMonitor, Waker};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PanelRequest {
    Expand,
    Collapse,
    Toggle,
    TogglePlayPause,
    Next,
    Previous,
}

pub fn channel(waker: Waker) -> (RequestSender, RequestReceiver) {
    let (tx, rx) = mpsc::channel();
    (RequestSender { tx, waker }, RequestReceiver { rx })
}

#[derive(Clone)]
pub struct RequestSender {
    tx: Sender<PanelRequest>,
    waker: Waker,
}

impl RequestSender {
    pub fn send(&self, request: PanelRequest) {
        if self.tx.send(request).is_err() {
            tracing::debug!(?request, "Panel is gone, dropping request");
            return;
        }
        (self.waker)();
    }

    pub fn expand(&self) {
        self.send(PanelRequest::Expand);
    }

    pub fn collapse(&self) {
        self.send(PanelRequest::Collapse);
    }

    pub fn toggle(&self) {
        self.send(PanelRequest::Toggle);
    }

    pub fn toggle_play_pause(&self) {
        self.send(PanelRequest::TogglePlayPause);
    }

    pub fn next(&self) {
        self.send(PanelRequest::Next);
    }

    pub fn previous(&self) {
        self.send(PanelRequest::Previous);
    }
}

pub struct RequestReceiver {
    rx: Receiver<PanelRequest>,
}

impl RequestReceiver {
    pub fn drain(&self) -> Vec<PanelRequest> {
        self.rx.try_iter().collect()
    }
}

pub fn dispatch(
    request: PanelRequest,
    machine: &mut ExpansionStateMachine,
    monitor: &mut MediaSourceMonitor,
) {
    tracing::debug!(?request, "Handling panel request");
    match request {
        PanelRequest::Expand => machine.expand(),
        PanelRequest::Collapse => machine.collapse(),
        PanelRequest::Toggle => machine.toggle(),
        PanelRequest::TogglePlayPause => monitor.toggle_play_pause(),
        PanelRequest::Next => monitor.next(),
        PanelRequest::Previous => monitor.previous(),
    }
}
