//! Derived, de-duplicated views of the state.
//!
//! A selection maps every transition's `current` snapshot through a
//! projection, suppresses consecutive duplicates per its comparator,
//! and multicasts the survivors so that all subscribers share one
//! computation. Each selection keeps its own last-delivered value;
//! independent selections over the same projection are independent
//! pipelines.

mod keyed;

pub use keyed::Keyed;

use crate::channel::{Delivery, ReplayChannel, Subscription, Tap};
use crate::types::Transition;
use parking_lot::Mutex;
use std::sync::Arc;

/// A live, derived view of a store's state.
///
/// Cloning is cheap and shares the pipeline. Dropping the last clone
/// detaches the pipeline from the store; outstanding subscriptions
/// disconnect after draining their queues.
pub struct Selection<V> {
    inner: Arc<SelectionInner<V>>,
}

struct SelectionInner<V> {
    channel: Arc<ReplayChannel<V>>,
    detach: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl<V> Drop for SelectionInner<V> {
    fn drop(&mut self) {
        if let Some(detach) = self.detach.lock().take() {
            detach();
        }
        self.channel.close();
    }
}

impl<V: Clone + Send + 'static> Selection<V> {
    /// Attach a new selection pipeline to a transition channel.
    ///
    /// The retained transition, if any, is projected immediately, so
    /// the selection holds a latest value before this returns.
    pub(crate) fn build<T, P, C>(
        source: &Arc<ReplayChannel<Transition<T>>>,
        project: P,
        compare: C,
    ) -> Self
    where
        T: Send + Sync + 'static,
        P: Fn(&T) -> V + Send + 'static,
        C: Fn(&V, &V) -> bool + Send + 'static,
    {
        let channel = ReplayChannel::new();
        let output = Arc::clone(&channel);
        let mut delivered: Option<V> = None;
        let tap: Tap<Transition<T>> = Box::new(move |delivery| match delivery {
            Delivery::Next(transition) => {
                let value = project(transition.current.as_ref());
                let unchanged = delivered
                    .as_ref()
                    .map_or(false, |prev| compare(prev, &value));
                if !unchanged {
                    delivered = Some(value.clone());
                    output.publish(value);
                }
                true
            }
            Delivery::Fault(fault) => {
                output.fail(fault.clone());
                false
            }
        });
        let id = source.tap(tap);
        let detach_from = Arc::clone(source);
        Selection {
            inner: Arc::new(SelectionInner {
                channel,
                detach: Mutex::new(Some(Box::new(move || detach_from.remove(id)))),
            }),
        }
    }

    /// Subscribe to the de-duplicated value stream.
    ///
    /// The most recent value is delivered immediately.
    pub fn subscribe(&self) -> Subscription<V> {
        self.inner.channel.subscribe()
    }

    /// The most recently delivered value.
    ///
    /// `None` only before the underlying store has committed its first
    /// transition.
    pub fn latest(&self) -> Option<V> {
        self.inner.channel.latest()
    }
}

impl<V> Clone for Selection<V> {
    fn clone(&self) -> Self {
        Selection {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;

    fn transition(previous: i32, current: i32) -> Transition<i32> {
        Transition {
            previous: Arc::new(previous),
            current: Arc::new(current),
            action: None,
            error: None,
        }
    }

    #[test]
    fn test_selection_replays_then_dedups() {
        let channel = ReplayChannel::new();
        channel.publish(transition(1, 1));

        let selection = Selection::build(&channel, |value: &i32| *value, |a, b| a == b);
        let sub = selection.subscribe();
        assert_eq!(sub.try_recv().unwrap(), 1);

        channel.publish(transition(1, 1));
        assert!(matches!(sub.try_recv(), Err(StoreError::Empty)));

        channel.publish(transition(1, 2));
        assert_eq!(sub.try_recv().unwrap(), 2);
    }

    #[test]
    fn test_selections_keep_independent_dedup_state() {
        let channel = ReplayChannel::new();
        channel.publish(transition(0, 1));

        let early = Selection::build(&channel, |value: &i32| *value, |a, b| a == b);
        let early_sub = early.subscribe();
        assert_eq!(early_sub.try_recv().unwrap(), 1);

        channel.publish(transition(1, 2));

        // A selection built later starts from the retained transition;
        // its first delivery is the current value, not a diff.
        let late = Selection::build(&channel, |value: &i32| *value, |a, b| a == b);
        let late_sub = late.subscribe();
        assert_eq!(early_sub.try_recv().unwrap(), 2);
        assert_eq!(late_sub.try_recv().unwrap(), 2);
    }

    #[test]
    fn test_dropping_selection_detaches_pipeline() {
        let channel: Arc<ReplayChannel<Transition<i32>>> = ReplayChannel::new();
        channel.publish(transition(1, 1));

        let selection = Selection::build(&channel, |value: &i32| *value, |a, b| a == b);
        let sub = selection.subscribe();
        assert_eq!(sub.try_recv().unwrap(), 1);
        assert_eq!(channel.subscriber_count(), 1);

        drop(selection);
        assert_eq!(channel.subscriber_count(), 0);

        channel.publish(transition(1, 2));
        assert!(matches!(sub.try_recv(), Err(StoreError::Disconnected)));
    }
}
