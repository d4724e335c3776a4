use std::sync::Arc;

use crate::error::StoreResult;
use crate::traits::{check_range, KvStore, Order, Record};

/// A view of a shared store restricted to keys under a fixed prefix.
///
/// Keys passed in and handed back are relative to the prefix, so a contract
/// never sees (or reaches) another contract's entries.
#[derive(Clone)]
pub struct PrefixStore {
    inner: Arc<dyn KvStore>,
    prefix: Vec<u8>,
}

impl PrefixStore {
    pub fn new(inner: Arc<dyn KvStore>, prefix: impl Into<Vec<u8>>) -> Self {
        Self {
            inner,
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &[u8] {
        &self.prefix
    }

    fn full_key(&self, key: &[u8]) -> Vec<u8> {
        let mut full = Vec::with_capacity(self.prefix.len() + key.len());
        full.extend_from_slice(&self.prefix);
        full.extend_from_slice(key);
        full
    }

    /// Maps a relative `[start, end)` onto the inner store's key space.
    fn full_bounds(
        &self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
    ) -> StoreResult<(Vec<u8>, Option<Vec<u8>>)> {
        check_range(start, end)?;
        let start = match start {
            Some(start) => self.full_key(start),
            None => self.prefix.clone(),
        };
        let end = match end {
            Some(end) => Some(self.full_key(end)),
            None => prefix_end(&self.prefix),
        };
        Ok((start, end))
    }

    fn strip(&self, (key, value): Record) -> Option<Record> {
        key.strip_prefix(self.prefix.as_slice())
            .map(|relative| (relative.to_vec(), value))
    }
}

impl std::fmt::Debug for PrefixStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrefixStore")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

/// Smallest key that is greater than every key starting with `prefix`.
///
/// `None` when no such key exists (empty prefix or all `0xff`).
pub fn prefix_end(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.pop() {
        if last < u8::MAX {
            end.push(last + 1);
            return Some(end);
        }
    }
    None
}

impl KvStore for PrefixStore {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        self.inner.get(&self.full_key(key))
    }

    fn set(&self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        self.inner.set(&self.full_key(key), value)
    }

    fn delete(&self, key: &[u8]) -> StoreResult<()> {
        self.inner.delete(&self.full_key(key))
    }

    fn range(
        &self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
        order: Order,
    ) -> StoreResult<Vec<Record>> {
        let (start, end) = self.full_bounds(start, end)?;
        let records = self.inner.range(Some(&start), end.as_deref(), order)?;
        Ok(records
            .into_iter()
            .filter_map(|record| self.strip(record))
            .collect())
    }

    fn seek(
        &self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
        order: Order,
    ) -> StoreResult<Option<Record>> {
        let (start, end) = self.full_bounds(start, end)?;
        let record = self.inner.seek(Some(&start), end.as_deref(), order)?;
        Ok(record.and_then(|record| self.strip(record)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    #[test]
    fn prefix_end_increments_last_byte() {
        assert_eq!(prefix_end(b"ab"), Some(b"ac".to_vec()));
        assert_eq!(prefix_end(&[0x01, 0xff]), Some(vec![0x02]));
        assert_eq!(prefix_end(&[0xff, 0xff]), None);
        assert_eq!(prefix_end(b""), None);
    }

    #[test]
    fn scoped_stores_do_not_see_each_other() {
        let shared: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
        let alice = PrefixStore::new(shared.clone(), b"alice/".to_vec());
        let bob = PrefixStore::new(shared.clone(), b"bob/".to_vec());

        alice.set(b"balance", b"10").unwrap();
        bob.set(b"balance", b"20").unwrap();

        assert_eq!(alice.get(b"balance").unwrap(), Some(b"10".to_vec()));
        assert_eq!(bob.get(b"balance").unwrap(), Some(b"20".to_vec()));
        assert_eq!(shared.get(b"alice/balance").unwrap(), Some(b"10".to_vec()));

        let records = alice.range(None, None, Order::Ascending).unwrap();
        assert_eq!(records, vec![(b"balance".to_vec(), b"10".to_vec())]);
    }

    #[test]
    fn bounded_range_strips_prefix() {
        let shared: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
        let scoped = PrefixStore::new(shared, b"c1".to_vec());
        for key in [b"a", b"b", b"c", b"d"] {
            scoped.set(key, key).unwrap();
        }
        let records = scoped.range(Some(b"b"), Some(b"d"), Order::Descending).unwrap();
        let keys: Vec<_> = records.into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![b"c".to_vec(), b"b".to_vec()]);
    }

    #[test]
    fn seek_stays_inside_the_prefix() {
        let shared: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
        shared.set(b"a/z", b"outside").unwrap();
        shared.set(b"c/a", b"outside").unwrap();
        let scoped = PrefixStore::new(shared, b"b/".to_vec());
        assert_eq!(scoped.seek(None, None, Order::Ascending).unwrap(), None);

        scoped.set(b"k", b"v").unwrap();
        assert_eq!(
            scoped.seek(None, None, Order::Descending).unwrap(),
            Some((b"k".to_vec(), b"v".to_vec()))
        );
    }
}
