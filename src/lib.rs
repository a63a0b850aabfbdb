//! # Rill
//!
//! A reactive, immutable state cell: one mutable slot of application
//! state that publishes every transition as a discrete, ordered event
//! and exposes derived, de-duplicated views to many independent
//! observers.
//!
//! ## Core Concepts
//!
//! - **Transitions**: Immutable `{previous, current, action, error}`
//!   records, one per change, observed by everyone in the same order
//! - **Snapshots**: `Arc`-frozen state values chained by copy-on-write,
//!   never mutated after publication
//! - **Changes**: A multicast, replay-latest-one broadcast of the full
//!   transition stream
//! - **Selections**: Shared projections of the state, de-duplicated
//!   against each view's last delivered value
//!
//! ## Example
//!
//! ```
//! use rill::Store;
//!
//! #[derive(Clone)]
//! struct App {
//!     count: u32,
//!     name: String,
//! }
//!
//! let store = Store::new(App { count: 0, name: "rill".into() });
//! let counts = store.select(|app: &App| app.count);
//!
//! store.update(|app| app.count += 1);
//! assert_eq!(counts.latest(), Some(1));
//!
//! let changes = store.changes();
//! let latest = changes.try_recv().unwrap();
//! assert_eq!(latest.current.count, 1);
//! ```

pub mod channel;
pub mod error;
pub mod select;
pub mod snapshot;
pub mod store;
pub mod types;

// Re-exports
pub use channel::{ReplayChannel, Subscription, DEFAULT_BUFFER_SIZE};
pub use error::{BoxError, CommandError, Result, SourceError, StoreError};
pub use select::{Keyed, Selection};
pub use snapshot::{produce, seed};
pub use store::Store;
pub use types::{Snapshot, Transition};
