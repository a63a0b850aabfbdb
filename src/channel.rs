//! Multicast replay channel underlying change broadcast.
//!
//! A [`ReplayChannel`] owns an ordered set of subscriber taps plus a
//! retained last-value slot. Publishing updates the slot and then
//! delivers to every live tap, synchronously and in insertion order, so
//! all observers see one canonical event order. Subscribing delivers
//! the retained value immediately, then all subsequent events.
//!
//! External subscribers receive events through per-subscriber bounded
//! queues; a subscriber whose queue overflows is dropped rather than
//! blocking the publisher.

use crate::error::{Result, SourceError, StoreError};
use crossbeam_channel::{bounded, Receiver};
use parking_lot::{Condvar, Mutex};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::debug;

/// Default per-subscriber queue capacity before the subscriber is
/// considered slow and dropped.
pub const DEFAULT_BUFFER_SIZE: usize = 1000;

/// Identifier for a registered tap.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct TapId(u64);

/// What a tap observes on each delivery.
pub(crate) enum Delivery<E> {
    /// A published event.
    Next(E),
    /// Terminal source fault.
    Fault(SourceError),
}

/// A registered observer callback. Returns false to be removed.
pub(crate) type Tap<E> = Box<dyn FnMut(&Delivery<E>) -> bool + Send>;

struct ChannelState<E> {
    retained: Option<E>,
    fault: Option<SourceError>,
    taps: Vec<(TapId, Tap<E>)>,
    next_tap: u64,
}

/// Multicast, replay-latest-one, synchronous-delivery channel.
pub struct ReplayChannel<E> {
    state: Mutex<ChannelState<E>>,
    first_value: Condvar,
    /// Handed to subscriptions so they can detach without keeping the
    /// channel alive.
    this: Weak<ReplayChannel<E>>,
}

impl<E> ReplayChannel<E> {
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|this| ReplayChannel {
            state: Mutex::new(ChannelState {
                retained: None,
                fault: None,
                taps: Vec::new(),
                next_tap: 1,
            }),
            first_value: Condvar::new(),
            this: this.clone(),
        })
    }

    /// Whether the channel has terminated with a source fault.
    pub fn is_terminated(&self) -> bool {
        self.state.lock().fault.is_some()
    }

    /// The terminal fault, if the channel has one.
    pub fn fault_reason(&self) -> Option<SourceError> {
        self.state.lock().fault.clone()
    }

    /// Number of live taps (subscribers and derived pipelines).
    pub fn subscriber_count(&self) -> usize {
        self.state.lock().taps.len()
    }

    /// Drop every live tap without faulting the channel.
    ///
    /// Outstanding subscribers observe a disconnect after draining
    /// their queues; the retained value stays available to new
    /// subscribers.
    pub fn close(&self) {
        self.state.lock().taps.clear();
    }

    pub(crate) fn remove(&self, id: TapId) {
        self.state.lock().taps.retain(|(tap_id, _)| *tap_id != id);
    }
}

impl<E: Clone + Send + 'static> ReplayChannel<E> {
    /// Publish an event: retain it, then deliver to every live tap in
    /// insertion order before returning. Ignored once terminated.
    pub fn publish(&self, event: E) {
        let mut state = self.state.lock();
        if state.fault.is_some() {
            return;
        }
        state.retained = Some(event.clone());
        let delivery = Delivery::Next(event);
        let before = state.taps.len();
        state.taps.retain_mut(|(_, tap)| tap(&delivery));
        let dropped = before - state.taps.len();
        if dropped > 0 {
            debug!(dropped, "dropped slow or disconnected subscribers");
        }
        drop(state);
        self.first_value.notify_all();
    }

    /// Terminate the channel with a source fault.
    ///
    /// Every live tap observes the fault and is removed; subsequent
    /// publishes are ignored. Late subscribers still replay the
    /// retained value, then the fault.
    pub fn fail(&self, fault: SourceError) {
        let mut state = self.state.lock();
        if state.fault.is_some() {
            return;
        }
        debug!(%fault, "channel terminated by source fault");
        state.fault = Some(fault.clone());
        let delivery = Delivery::Fault(fault);
        for (_, tap) in state.taps.iter_mut() {
            tap(&delivery);
        }
        state.taps.clear();
        drop(state);
        self.first_value.notify_all();
    }

    /// The most recently published event, if any.
    pub fn latest(&self) -> Option<E> {
        self.state.lock().retained.clone()
    }

    /// Block until a first event has been published or the channel has
    /// faulted. Returns true when the channel is live with a retained
    /// event.
    pub fn wait_ready(&self) -> bool {
        let mut state = self.state.lock();
        while state.retained.is_none() && state.fault.is_none() {
            self.first_value.wait(&mut state);
        }
        state.fault.is_none()
    }

    /// Register an observer callback.
    ///
    /// The retained event (and the terminal fault, if any) is delivered
    /// to the tap before it joins the live set, so the tap observes the
    /// full canonical order from the latest event onward.
    pub(crate) fn tap(&self, mut tap: Tap<E>) -> TapId {
        let mut state = self.state.lock();
        let id = TapId(state.next_tap);
        state.next_tap += 1;

        let mut alive = true;
        if let Some(retained) = state.retained.clone() {
            alive = tap(&Delivery::Next(retained));
        }
        if let Some(fault) = state.fault.clone() {
            if alive {
                tap(&Delivery::Fault(fault));
            }
            return id;
        }
        if alive {
            state.taps.push((id, tap));
        }
        id
    }

    /// Subscribe with the default queue capacity.
    pub fn subscribe(&self) -> Subscription<E> {
        self.subscribe_with_capacity(DEFAULT_BUFFER_SIZE)
    }

    /// Subscribe with an explicit queue capacity.
    ///
    /// The retained event is enqueued before this returns. A subscriber
    /// that lets its queue overflow is dropped.
    pub fn subscribe_with_capacity(&self, capacity: usize) -> Subscription<E> {
        let (sender, receiver) = bounded(capacity.max(1));
        let id = self.tap(Box::new(move |delivery| match delivery {
            Delivery::Next(event) => sender.try_send(Ok(event.clone())).is_ok(),
            Delivery::Fault(fault) => {
                let _ = sender.try_send(Err(fault.clone()));
                false
            }
        }));
        Subscription {
            id,
            channel: self.this.clone(),
            receiver,
        }
    }
}

/// Handle to a single subscriber's event queue.
///
/// Dropping the handle (or calling [`unsubscribe`](Subscription::unsubscribe))
/// stops delivery to this subscriber only.
pub struct Subscription<E> {
    id: TapId,
    channel: Weak<ReplayChannel<E>>,
    receiver: Receiver<std::result::Result<E, SourceError>>,
}

impl<E> Subscription<E> {
    /// Receive the next event (blocking).
    pub fn recv(&self) -> Result<E> {
        match self.receiver.recv() {
            Ok(Ok(event)) => Ok(event),
            Ok(Err(fault)) => Err(StoreError::Source(fault)),
            Err(_) => Err(StoreError::Disconnected),
        }
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> Result<E> {
        match self.receiver.try_recv() {
            Ok(Ok(event)) => Ok(event),
            Ok(Err(fault)) => Err(StoreError::Source(fault)),
            Err(crossbeam_channel::TryRecvError::Empty) => Err(StoreError::Empty),
            Err(crossbeam_channel::TryRecvError::Disconnected) => Err(StoreError::Disconnected),
        }
    }

    /// Receive with a timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<E> {
        match self.receiver.recv_timeout(timeout) {
            Ok(Ok(event)) => Ok(event),
            Ok(Err(fault)) => Err(StoreError::Source(fault)),
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => Err(StoreError::Timeout),
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => Err(StoreError::Disconnected),
        }
    }

    /// Stop receiving. Dropping the handle has the same effect.
    pub fn unsubscribe(self) {}
}

impl<E> Drop for Subscription<E> {
    fn drop(&mut self) {
        if let Some(channel) = self.channel.upgrade() {
            channel.remove(self.id);
        }
    }
}
