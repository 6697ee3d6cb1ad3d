//! Append-only journals.

use std::sync::RwLock;

use crate::DbError;

/// An append-only sequence of entries.
///
/// Entries receive strictly increasing sequence numbers starting at 1, in
/// the order they were appended. Nothing can be modified or removed once
/// written.
pub struct Journal<T> {
    name: &'static str,
    entries: RwLock<Vec<T>>,
}

impl<T: Clone> Journal<T> {
    /// Create an empty journal.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Append an entry built from its sequence number.
    ///
    /// The sequence number is assigned under the journal's write lock, so
    /// sequence order always matches append order.
    pub fn append(&self, build: impl FnOnce(u64) -> T) -> Result<T, DbError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| DbError::Poisoned(self.name.to_string()))?;
        let seq = entries.len() as u64 + 1;
        let entry = build(seq);
        entries.push(entry.clone());
        Ok(entry)
    }

    /// Entries matching `pred`, in append order.
    pub fn scan(&self, mut pred: impl FnMut(&T) -> bool) -> Result<Vec<T>, DbError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| DbError::Poisoned(self.name.to_string()))?;
        Ok(entries.iter().filter(|e| pred(e)).cloned().collect())
    }

    /// All entries, in append order.
    pub fn all(&self) -> Result<Vec<T>, DbError> {
        self.scan(|_| true)
    }

    /// Number of entries written so far.
    pub fn len(&self) -> Result<usize, DbError> {
        Ok(self
            .entries
            .read()
            .map_err(|_| DbError::Poisoned(self.name.to_string()))?
            .len())
    }

    /// Whether nothing has been written yet.
    pub fn is_empty(&self) -> Result<bool, DbError> {
        Ok(self.len()? == 0)
    }
}

impl<T> std::fmt::Debug for Journal<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Journal")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
