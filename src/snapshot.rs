//! Copy-on-write snapshot production.
//!
//! The producer turns "apply this mutation against a draft" into
//! "return a new immutable snapshot". The base snapshot is never
//! observably mutated, and a failing mutation leaves it fully intact
//! for rollback.

use crate::error::BoxError;
use crate::types::Snapshot;
use std::sync::Arc;

/// Freeze an owned value as the head of a snapshot chain.
pub fn seed<T>(value: T) -> Snapshot<T> {
    Arc::new(value)
}

/// Derive a new snapshot by applying `mutate` to a draft copy of `base`.
///
/// The draft starts as a clone of the base, so state types holding
/// `Arc` or persistent collections share untouched substructure between
/// the old and new snapshots. An error from `mutate` propagates with
/// the base untouched.
pub fn produce<T, F>(base: &Snapshot<T>, mutate: F) -> std::result::Result<Snapshot<T>, BoxError>
where
    T: Clone,
    F: FnOnce(&mut T) -> std::result::Result<(), BoxError>,
{
    let mut draft = T::clone(base);
    mutate(&mut draft)?;
    Ok(Arc::new(draft))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone)]
    struct Inventory {
        items: Arc<Vec<String>>,
        revision: u64,
    }

    #[test]
    fn test_produce_leaves_base_untouched() {
        let base = seed(vec![1, 2, 3]);
        let next = produce(&base, |draft| {
            draft.push(4);
            Ok(())
        })
        .unwrap();

        assert_eq!(*base, vec![1, 2, 3]);
        assert_eq!(*next, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_failed_mutation_preserves_base() {
        let base = seed(vec![1, 2, 3]);
        let result = produce(&base, |draft| {
            draft.clear();
            Err("midway failure".into())
        });

        assert!(result.is_err());
        assert_eq!(*base, vec![1, 2, 3]);
    }

    #[test]
    fn test_untouched_substructure_is_shared() {
        let base = seed(Inventory {
            items: Arc::new(vec!["bolt".to_string(), "nut".to_string()]),
            revision: 1,
        });
        let next = produce(&base, |draft| {
            draft.revision += 1;
            Ok(())
        })
        .unwrap();

        assert_eq!(next.revision, 2);
        assert!(Arc::ptr_eq(&base.items, &next.items));
    }
}
