//! Versioned in-memory record store.
//!
//! The registries are the only mutable shared state in the core. Each store
//! serialises all mutations on its records behind one mutex and offers a
//! compare-and-swap shaped update: callers state a precondition which is
//! re-checked under the lock, so a caller whose view went stale loses the
//! race with a `Conflict` instead of silently overwriting.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use crate::error::{DispatchError, DispatchResult, Entity};

#[derive(Clone, Debug)]
struct Versioned<T> {
    version: u64,
    value: T,
}

/// Keyed record store with per-record versions.
#[derive(Debug)]
pub(crate) struct Store<T> {
    entity: Entity,
    entries: Mutex<HashMap<String, Versioned<T>>>,
}

impl<T: Clone> Store<T> {
    pub fn new(entity: Entity) -> Self {
        Self {
            entity,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Versioned<T>>> {
        // A poisoned lock means a panic mid-mutation elsewhere; the map is
        // still structurally valid, so keep serving rather than cascading.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert `value` under `id` unless the id is already taken.
    ///
    /// Returns `true` when the insert happened.
    pub fn insert_if_vacant(&self, id: &str, value: T) -> bool {
        let mut entries = self.lock();
        if entries.contains_key(id) {
            return false;
        }
        entries.insert(id.to_owned(), Versioned { version: 1, value });
        true
    }

    /// Fetch a record by id.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::NotFound` if the id is unknown.
    pub fn get(&self, id: &str) -> DispatchResult<T> {
        self.lock()
            .get(id)
            .map(|entry| entry.value.clone())
            .ok_or_else(|| DispatchError::not_found(self.entity, id))
    }

    /// Fetch a record by id, or `None` if absent.
    pub fn find(&self, id: &str) -> Option<T> {
        self.lock().get(id).map(|entry| entry.value.clone())
    }

    /// Snapshot every record matching `keep`.
    pub fn list<F>(&self, keep: F) -> Vec<T>
    where
        F: Fn(&T) -> bool,
    {
        self.lock()
            .values()
            .filter(|entry| keep(&entry.value))
            .map(|entry| entry.value.clone())
            .collect()
    }

    /// Return the record for `id`, inserting `make()` first if absent.
    ///
    /// The boolean is `true` when the record was created by this call.
    pub fn get_or_insert_with<F>(&self, id: &str, make: F) -> (T, bool)
    where
        F: FnOnce() -> T,
    {
        let mut entries = self.lock();
        if let Some(entry) = entries.get(id) {
            return (entry.value.clone(), false);
        }
        let value = make();
        entries.insert(
            id.to_owned(),
            Versioned {
                version: 1,
                value: value.clone(),
            },
        );
        (value, true)
    }

    /// Compare-and-swap update.
    ///
    /// `precondition` is evaluated against the current record under the
    /// store lock; if it fails, nothing changes and the returned `Conflict`
    /// carries its message. Otherwise `mutate` is applied, the record's
    /// version is bumped, and the updated record is returned.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown ids and `Conflict` when the
    /// precondition no longer holds.
    pub fn update_if<P, M>(&self, id: &str, precondition: P, mutate: M) -> DispatchResult<T>
    where
        P: FnOnce(&T) -> Result<(), String>,
        M: FnOnce(&mut T),
    {
        let mut entries = self.lock();
        let entry = entries
            .get_mut(id)
            .ok_or_else(|| DispatchError::not_found(self.entity, id))?;

        precondition(&entry.value).map_err(DispatchError::Conflict)?;

        mutate(&mut entry.value);
        entry.version += 1;
        tracing::trace!(entity = %self.entity, id, version = entry.version, "record updated");
        Ok(entry.value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_if_vacant_rejects_duplicates() {
        let store: Store<u32> = Store::new(Entity::Incident);
        assert!(store.insert_if_vacant("a", 1));
        assert!(!store.insert_if_vacant("a", 2));
        assert_eq!(store.get("a").unwrap(), 1);
    }

    #[test]
    fn update_if_surfaces_conflict_and_leaves_record_untouched() {
        let store: Store<u32> = Store::new(Entity::Vehicle);
        store.insert_if_vacant("v", 10);

        let err = store
            .update_if("v", |n| Err(format!("value was {n}")), |n| *n += 1)
            .expect_err("precondition failed");
        match err {
            DispatchError::Conflict(msg) => assert_eq!(msg, "value was 10"),
            other => panic!("expected Conflict, got {other:?}"),
        }
        assert_eq!(store.get("v").unwrap(), 10);

        let updated = store
            .update_if("v", |_| Ok(()), |n| *n += 1)
            .expect("precondition held");
        assert_eq!(updated, 11);
    }

    #[test]
    fn missing_ids_are_not_found() {
        let store: Store<u32> = Store::new(Entity::Incident);
        assert!(matches!(
            store.get("nope"),
            Err(DispatchError::NotFound { .. })
        ));
        assert!(matches!(
            store.update_if("nope", |_| Ok(()), |_| {}),
            Err(DispatchError::NotFound { .. })
        ));
        assert!(store.find("nope").is_none());
    }

    #[test]
    fn get_or_insert_with_is_idempotent() {
        let store: Store<u32> = Store::new(Entity::Handoff);
        let (first, created) = store.get_or_insert_with("h", || 7);
        assert!(created);
        let (second, created) = store.get_or_insert_with("h", || 99);
        assert!(!created);
        assert_eq!(first, second);
    }
}
