//! Core types for the state cell.

use crate::error::CommandError;
use serde::ser::{Serialize, SerializeStruct, Serializer};
use std::fmt;
use std::sync::Arc;

/// An immutable snapshot of the state.
///
/// Snapshots are reference-counted; transitions sharing history share
/// the same allocation, and untouched substructure of `Arc`-bearing
/// state types survives copy-on-write untouched.
pub type Snapshot<T> = Arc<T>;

/// A single committed state transition.
///
/// Published for every change, including the creation transition. Both
/// snapshots are frozen at publication and never mutated afterwards.
#[derive(Debug)]
pub struct Transition<T> {
    /// The snapshot immediately before this transition.
    pub previous: Snapshot<T>,

    /// The snapshot immediately after this transition.
    ///
    /// On a failed update this is the same snapshot as the previous
    /// transition's `current`; the state does not advance.
    pub current: Snapshot<T>,

    /// Free-form label identifying the cause of the transition.
    pub action: Option<String>,

    /// Failure raised by the update command, if any.
    pub error: Option<CommandError>,
}

impl<T> Transition<T> {
    /// Whether the update command that produced this transition failed.
    pub fn failed(&self) -> bool {
        self.error.is_some()
    }

    /// Whether this transition advanced the state.
    pub fn advanced(&self) -> bool {
        self.error.is_none()
    }
}

impl<T> Clone for Transition<T> {
    fn clone(&self) -> Self {
        Transition {
            previous: Arc::clone(&self.previous),
            current: Arc::clone(&self.current),
            action: self.action.clone(),
            error: self.error.clone(),
        }
    }
}

impl<T: Serialize> Serialize for Transition<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut out = serializer.serialize_struct("Transition", 4)?;
        out.serialize_field("previous", self.previous.as_ref())?;
        out.serialize_field("current", self.current.as_ref())?;
        out.serialize_field("action", &self.action)?;
        out.serialize_field("error", &self.error.as_ref().map(|e| e.to_string()))?;
        out.end()
    }
}

impl<T: fmt::Display> fmt::Display for Transition<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.action {
            Some(action) => write!(f, "{} -> {} ({})", self.previous, self.current, action),
            None => write!(f, "{} -> {}", self.previous, self.current),
        }
    }
}
