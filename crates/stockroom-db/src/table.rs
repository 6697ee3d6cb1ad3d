//! Keyed tables with per-row exclusive locks.

use std::collections::HashMap;
use std::fmt::Display;
use std::hash::Hash;
use std::sync::{Arc, Mutex, RwLock};

use crate::lock::{acquire_blocking, acquire_bounded, LockPolicy};
use crate::DbError;

type RowHandle<V> = Arc<Mutex<V>>;

/// An in-memory table of rows keyed by `K`.
///
/// Each row has its own lock. Updates run against a staged copy of the row
/// and are written back only when the closure returns `Ok`, so a failed
/// update leaves the row exactly as it was.
pub struct Table<K, V> {
    name: &'static str,
    rows: RwLock<HashMap<K, RowHandle<V>>>,
    policy: LockPolicy,
}

impl<K, V> Table<K, V>
where
    K: Eq + Hash + Clone + Display,
    V: Clone,
{
    /// Create an empty table.
    pub fn new(name: &'static str, policy: LockPolicy) -> Self {
        Self {
            name,
            rows: RwLock::new(HashMap::new()),
            policy,
        }
    }

    /// Table name, used in errors and logs.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The bounded lock policy used by [`Table::update`].
    pub fn policy(&self) -> LockPolicy {
        self.policy
    }

    /// Insert a new row. Fails if the key already exists.
    pub fn insert(&self, key: K, value: V) -> Result<(), DbError> {
        let mut rows = self.write_rows()?;
        if rows.contains_key(&key) {
            return Err(DbError::DuplicateKey {
                table: self.name.to_string(),
                key: key.to_string(),
            });
        }
        rows.insert(key, Arc::new(Mutex::new(value)));
        Ok(())
    }

    /// Check whether a row exists.
    pub fn contains(&self, key: &K) -> Result<bool, DbError> {
        Ok(self.read_rows()?.contains_key(key))
    }

    /// Copy a row out of the table.
    pub fn get(&self, key: &K) -> Result<Option<V>, DbError> {
        self.read(key, V::clone)
    }

    /// Run `f` against a row while holding its lock.
    pub fn read<R>(&self, key: &K, f: impl FnOnce(&V) -> R) -> Result<Option<R>, DbError> {
        let Some(handle) = self.handle(key)? else {
            return Ok(None);
        };
        let guard = acquire_blocking(&handle, self.name, &key.to_string())?;
        Ok(Some(f(&*guard)))
    }

    /// Update a row, acquiring its lock within the retry budget.
    ///
    /// `f` receives a staged copy; the copy replaces the row only if `f`
    /// returns `Ok`.
    pub fn update<T, E>(&self, key: &K, f: impl FnOnce(&mut V) -> Result<T, E>) -> Result<T, E>
    where
        E: From<DbError>,
    {
        let handle = self.require(key)?;
        let key_str = key.to_string();
        let mut guard = acquire_bounded(&handle, self.policy, self.name, &key_str)?;
        let mut staged = guard.clone();
        let out = f(&mut staged)?;
        *guard = staged;
        Ok(out)
    }

    /// Update a row, waiting for its lock without a retry budget.
    pub fn update_blocking<T, E>(
        &self,
        key: &K,
        f: impl FnOnce(&mut V) -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<DbError>,
    {
        let handle = self.require(key)?;
        let mut guard = acquire_blocking(&handle, self.name, &key.to_string())?;
        let mut staged = guard.clone();
        let out = f(&mut staged)?;
        *guard = staged;
        Ok(out)
    }

    /// Update a row, creating it with `init` first if it does not exist.
    pub fn upsert<T, E>(
        &self,
        key: K,
        init: impl FnOnce() -> V,
        f: impl FnOnce(&mut V) -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<DbError>,
    {
        let handle = match self.handle(&key)? {
            Some(handle) => handle,
            None => {
                let mut rows = self.write_rows()?;
                rows.entry(key.clone())
                    .or_insert_with(|| Arc::new(Mutex::new(init())))
                    .clone()
            }
        };
        let key_str = key.to_string();
        let mut guard = acquire_bounded(&handle, self.policy, self.name, &key_str)?;
        let mut staged = guard.clone();
        let out = f(&mut staged)?;
        *guard = staged;
        Ok(out)
    }

    /// Remove a row, returning its last value.
    pub fn remove(&self, key: &K) -> Result<Option<V>, DbError> {
        let handle = self.write_rows()?.remove(key);
        match handle {
            Some(handle) => {
                let guard = acquire_blocking(&handle, self.name, &key.to_string())?;
                Ok(Some(guard.clone()))
            }
            None => Ok(None),
        }
    }

    /// All keys currently in the table, in no particular order.
    pub fn keys(&self) -> Result<Vec<K>, DbError> {
        Ok(self.read_rows()?.keys().cloned().collect())
    }

    /// Copy every row out of the table, one row lock at a time.
    pub fn values(&self) -> Result<Vec<V>, DbError> {
        let handles: Vec<(K, RowHandle<V>)> = self
            .read_rows()?
            .iter()
            .map(|(k, h)| (k.clone(), Arc::clone(h)))
            .collect();

        handles
            .into_iter()
            .map(|(key, handle)| -> Result<V, DbError> {
                let guard = acquire_blocking(&handle, self.name, &key.to_string())?;
                Ok(guard.clone())
            })
            .collect()
    }

    /// Number of rows.
    pub fn len(&self) -> Result<usize, DbError> {
        Ok(self.read_rows()?.len())
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> Result<bool, DbError> {
        Ok(self.len()? == 0)
    }

    fn handle(&self, key: &K) -> Result<Option<RowHandle<V>>, DbError> {
        Ok(self.read_rows()?.get(key).cloned())
    }

    fn require(&self, key: &K) -> Result<RowHandle<V>, DbError> {
        self.handle(key)?.ok_or_else(|| DbError::NotFound {
            table: self.name.to_string(),
            key: key.to_string(),
        })
    }

    fn read_rows(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, HashMap<K, RowHandle<V>>>, DbError> {
        self.rows
            .read()
            .map_err(|_| DbError::Poisoned(self.name.to_string()))
    }

    fn write_rows(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<K, RowHandle<V>>>, DbError> {
        self.rows
            .write()
            .map_err(|_| DbError::Poisoned(self.name.to_string()))
    }
}

impl<K, V> std::fmt::Debug for Table<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table")
            .field("name", &self.name)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn table() -> Table<String, i64> {
        Table::new("counters", LockPolicy::default())
    }

    #[test]
    fn test_insert_and_get() {
        let t = table();
        t.insert("a".to_string(), 1).unwrap();
        assert_eq!(t.get(&"a".to_string()).unwrap(), Some(1));
        assert_eq!(t.get(&"b".to_string()).unwrap(), None);
    }

    #[test]
    fn test_duplicate_insert_rejected() {
        let t = table();
        t.insert("a".to_string(), 1).unwrap();
        let err = t.insert("a".to_string(), 2).unwrap_err();
        assert!(matches!(err, DbError::DuplicateKey { .. }));
        assert_eq!(t.get(&"a".to_string()).unwrap(), Some(1));
    }

    #[test]
    fn test_failed_update_leaves_row_untouched() {
        let t = table();
        t.insert("a".to_string(), 10).unwrap();

        let result: Result<(), DbError> = t.update(&"a".to_string(), |v| {
            *v = 99;
            Err(DbError::Poisoned("simulated".to_string()))
        });
        assert!(result.is_err());
        assert_eq!(t.get(&"a".to_string()).unwrap(), Some(10));
    }

    #[test]
    fn test_update_missing_row() {
        let t = table();
        let result: Result<(), DbError> = t.update(&"nope".to_string(), |_| Ok(()));
        assert!(matches!(result, Err(DbError::NotFound { .. })));
    }

    #[test]
    fn test_upsert_creates_then_updates() {
        let t = table();
        let v: Result<i64, DbError> = t.upsert("a".to_string(), || 0, |v| {
            *v += 5;
            Ok(*v)
        });
        assert_eq!(v.unwrap(), 5);
        let v: Result<i64, DbError> = t.upsert("a".to_string(), || 0, |v| {
            *v += 5;
            Ok(*v)
        });
        assert_eq!(v.unwrap(), 10);
    }

    #[test]
    fn test_remove() {
        let t = table();
        t.insert("a".to_string(), 3).unwrap();
        assert_eq!(t.remove(&"a".to_string()).unwrap(), Some(3));
        assert!(t.is_empty().unwrap());
    }

    #[test]
    fn test_concurrent_updates_are_serialized() {
        let t = Arc::new(Table::<String, i64>::new(
            "counters",
            LockPolicy::new(100_000, Duration::from_micros(10)),
        ));
        t.insert("hot".to_string(), 0).unwrap();

        std::thread::scope(|s| {
            for _ in 0..8 {
                let t = Arc::clone(&t);
                s.spawn(move || {
                    for _ in 0..100 {
                        let r: Result<(), DbError> = t.update(&"hot".to_string(), |v| {
                            *v += 1;
                            Ok(())
                        });
                        r.unwrap();
                    }
                });
            }
        });

        assert_eq!(t.get(&"hot".to_string()).unwrap(), Some(800));
    }
}
