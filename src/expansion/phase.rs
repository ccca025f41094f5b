use std::time::Instant;

/// One slot of deferred work.
///
/// Every schedule or cancel bumps the slot's epoch; a pending entry only runs
/// if the epoch it captured is still current. Scheduling therefore invalidates
/// whatever the slot held before, and there is never more than one entry per
/// slot.
#[derive(Debug)]
pub(crate) struct DeferredSlot<A> {
    epoch: u64,
    pending: Option<Deferred<A>>,
}

#[derive(Debug)]
struct Deferred<A> {
    due: Instant,
    epoch: u64,
    action: A,
}

impl<A: Copy> DeferredSlot<A> {
    pub(crate) fn new() -> Self {
        Self {
            epoch: 0,
            pending: None,
        }
    }

    pub(crate) fn schedule(&mut self, due: Instant, action: A) {
        self.epoch = self.epoch.wrapping_add(1);
        self.pending = Some(Deferred {
            due,
            epoch: self.epoch,
            action,
        });
    }

    pub(crate) fn cancel(&mut self) -> bool {
        self.epoch = self.epoch.wrapping_add(1);
        self.pending.take().is_some()
    }

    pub(crate) fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub(crate) fn due(&self) -> Option<Instant> {
        self.pending.as_ref().map(|d| d.due)
    }

    pub(crate) fn take_due(&mut self, now: Instant) -> Option<(Instant, A)> {
        let deferred = self.pending.as_ref()?;
        if deferred.due > now {
            return None;
        }
        let deferred = self.pending.take()?;
        if deferred.epoch != self.epoch {
            return None;
        }
        Some((deferred.due, deferred.action))
    }
}
