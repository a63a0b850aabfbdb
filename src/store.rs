//! The reactive state cell tying all components together.

use crate::channel::{ReplayChannel, Subscription};
use crate::error::{BoxError, CommandError, SourceError};
use crate::select::{Keyed, Selection};
use crate::snapshot;
use crate::types::{Snapshot, Transition};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;
use tracing::{debug, trace};

/// Action label stamped on creation transitions. Stream-seeded stores
/// append the emission index.
const INIT_ACTION: &str = "init-store-";

/// A single mutable cell of application state.
///
/// Every change is committed as an immutable [`Transition`] and
/// broadcast to all subscribers in one canonical order. Updates are
/// serialized: each mutation command observes the snapshot committed by
/// the previous one, from any thread.
pub struct Store<T> {
    /// Broadcast channel retaining the latest committed transition.
    channel: Arc<ReplayChannel<Transition<T>>>,

    /// Serializes every read-compute-publish commit, including source
    /// emissions.
    write_lock: Arc<Mutex<()>>,
}

impl<T: Clone + Send + Sync + 'static> Store<T> {
    /// Create a store seeded with a concrete initial value.
    ///
    /// The creation transition pairs the value with itself and is
    /// published before this returns, so any subscriber observes it (or
    /// a successor) immediately.
    pub fn new(initial: T) -> Self {
        let channel = ReplayChannel::new();
        let seeded = snapshot::seed(initial);
        channel.publish(Transition {
            previous: Arc::clone(&seeded),
            current: seeded,
            action: Some(INIT_ACTION.to_string()),
            error: None,
        });
        Store {
            channel,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Create a store seeded from a stream of successive values.
    ///
    /// The source is drained on a dedicated thread. Emission `i`
    /// becomes a transition labelled `init-store-{i}`; the first pairs
    /// with itself, each later one with the snapshot of the emission
    /// before it. An `Err` item faults the change stream terminally.
    ///
    /// A `crossbeam_channel::Receiver` is the expected source, but any
    /// iterable of results works.
    pub fn from_source<S>(source: S) -> Self
    where
        S: IntoIterator<Item = std::result::Result<T, BoxError>> + Send + 'static,
    {
        let store = Store {
            channel: ReplayChannel::new(),
            write_lock: Arc::new(Mutex::new(())),
        };
        let channel = Arc::clone(&store.channel);
        let write_lock = Arc::clone(&store.write_lock);

        thread::spawn(move || {
            let mut previous: Option<Snapshot<T>> = None;
            for (index, item) in source.into_iter().enumerate() {
                match item {
                    Ok(value) => {
                        let current = snapshot::seed(value);
                        let prior = previous.replace(Arc::clone(&current));
                        let transition = Transition {
                            previous: prior.unwrap_or_else(|| Arc::clone(&current)),
                            current,
                            action: Some(format!("{INIT_ACTION}{index}")),
                            error: None,
                        };
                        let _guard = write_lock.lock();
                        channel.publish(transition);
                    }
                    Err(err) => {
                        channel.fail(SourceError::new(err));
                        return;
                    }
                }
            }
        });
        store
    }

    /// The full transition stream.
    ///
    /// The most recent transition is delivered at subscribe time, then
    /// every subsequent one in commit order. The stream never completes
    /// on its own; it terminates only if a seeding source faults.
    pub fn changes(&self) -> Subscription<Transition<T>> {
        self.channel.subscribe()
    }

    /// The most recently committed transition.
    ///
    /// `None` only on a stream-seeded store before its first emission.
    pub fn latest(&self) -> Option<Transition<T>> {
        self.channel.latest()
    }

    /// Derive a de-duplicated view of a projection of the state.
    ///
    /// Consecutive duplicates per `PartialEq` are suppressed. All
    /// subscribers to the returned selection share one projection
    /// computation and each immediately receives the latest value.
    pub fn select<V, P>(&self, project: P) -> Selection<V>
    where
        V: Clone + PartialEq + Send + 'static,
        P: Fn(&T) -> V + Send + 'static,
    {
        self.select_with(project, |a, b| a == b)
    }

    /// Like [`select`](Store::select) with an explicit comparator.
    ///
    /// `compare` returns true when two values should be considered
    /// unchanged, suppressing the newer one.
    pub fn select_with<V, P, C>(&self, project: P, compare: C) -> Selection<V>
    where
        V: Clone + Send + 'static,
        P: Fn(&T) -> V + Send + 'static,
        C: Fn(&V, &V) -> bool + Send + 'static,
    {
        Selection::build(&self.channel, project, compare)
    }

    /// Select a named field of a keyed state.
    ///
    /// The key resolves to a projection when the selection is built;
    /// missing fields project per the state type's [`Keyed`] impl.
    pub fn select_key(&self, key: impl Into<String>) -> Selection<T::Value>
    where
        T: Keyed,
        T::Value: PartialEq + Send + 'static,
    {
        let key = key.into();
        self.select(move |state: &T| state.field(&key))
    }

    /// Apply a mutation command against the current snapshot.
    pub fn update<F>(&self, command: F)
    where
        F: FnOnce(&mut T),
    {
        self.commit(None, |draft| {
            command(draft);
            Ok(())
        });
    }

    /// [`update`](Store::update) with an action label on the transition.
    pub fn update_named<F>(&self, action: impl Into<String>, command: F)
    where
        F: FnOnce(&mut T),
    {
        self.commit(Some(action.into()), |draft| {
            command(draft);
            Ok(())
        });
    }

    /// Apply a mutation command that may fail.
    ///
    /// A failing command does not advance the state: the transition
    /// carries the failure in its `error` field and re-publishes the
    /// prior snapshot as `current`. Nothing is returned to the caller;
    /// failures are in-band transition metadata only.
    pub fn try_update<F>(&self, command: F)
    where
        F: FnOnce(&mut T) -> std::result::Result<(), BoxError>,
    {
        self.commit(None, command);
    }

    /// [`try_update`](Store::try_update) with an action label.
    pub fn try_update_named<F>(&self, action: impl Into<String>, command: F)
    where
        F: FnOnce(&mut T) -> std::result::Result<(), BoxError>,
    {
        self.commit(Some(action.into()), command);
    }

    /// Read the latest transition, run the copy-on-write producer, and
    /// publish the result, atomically with respect to other commits.
    ///
    /// On a stream-seeded store this blocks until the first emission
    /// has been committed.
    fn commit<F>(&self, action: Option<String>, command: F)
    where
        F: FnOnce(&mut T) -> std::result::Result<(), BoxError>,
    {
        if !self.channel.wait_ready() {
            debug!(action = action.as_deref(), "update ignored: store faulted");
            return;
        }
        let _guard = self.write_lock.lock();
        let Some(last) = self.channel.latest() else {
            return;
        };
        let (current, error) = match snapshot::produce(&last.current, command) {
            Ok(next) => (next, None),
            Err(err) => (Arc::clone(&last.current), Some(CommandError::new(err))),
        };
        trace!(
            action = action.as_deref(),
            failed = error.is_some(),
            "committing transition"
        );
        self.channel.publish(Transition {
            previous: Arc::clone(&last.current),
            current,
            action,
            error,
        });
    }
}

impl<T> Drop for Store<T> {
    fn drop(&mut self) {
        // Ends outstanding `changes` subscriptions; selections end when
        // their own handles drop.
        self.channel.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_creation_transition_is_self_paired() {
        let store = Store::new(json!({"value": 1}));
        let transition = store.latest().unwrap();

        assert!(Arc::ptr_eq(&transition.previous, &transition.current));
        assert_eq!(transition.action.as_deref(), Some("init-store-"));
        assert!(transition.advanced());
    }

    #[test]
    fn test_update_publishes_new_snapshot() {
        let store = Store::new(json!({"value": 1}));
        store.update(|state| state["value"] = json!(2));

        let transition = store.latest().unwrap();
        assert_eq!(transition.previous["value"], 1);
        assert_eq!(transition.current["value"], 2);
        assert_eq!(transition.action, None);
    }

    #[test]
    fn test_update_named_labels_transition() {
        let store = Store::new(json!({"count": 0}));
        store.update_named("increment", |state| {
            state["count"] = json!(state["count"].as_i64().unwrap() + 1)
        });

        let transition = store.latest().unwrap();
        assert_eq!(transition.action.as_deref(), Some("increment"));
        assert_eq!(transition.current["count"], 1);
    }

    #[test]
    fn test_select_key_projects_field() {
        let store = Store::new(json!({"value": true}));
        let values = store.select_key("value");
        assert_eq!(values.latest(), Some(json!(true)));
    }

    #[test]
    fn test_selection_latest_tracks_updates() {
        let store = Store::new(json!({"value": 1}));
        let values = store.select(|state: &serde_json::Value| state["value"].clone());

        store.update(|state| state["value"] = json!(5));
        assert_eq!(values.latest(), Some(json!(5)));
    }
}
