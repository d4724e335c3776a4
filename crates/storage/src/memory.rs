use std::collections::BTreeMap;
use std::ops::Bound;

use parking_lot::RwLock;

use crate::error::StoreResult;
use crate::traits::{check_range, KvStore, Order, Record};

/// In-memory ordered store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<Vec<u8>>,
        V: Into<Vec<u8>>,
    {
        let map = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            entries: RwLock::new(map),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

fn lower(start: Option<&[u8]>) -> Bound<Vec<u8>> {
    match start {
        Some(start) => Bound::Included(start.to_vec()),
        None => Bound::Unbounded,
    }
}

fn upper(end: Option<&[u8]>) -> Bound<Vec<u8>> {
    match end {
        Some(end) => Bound::Excluded(end.to_vec()),
        None => Bound::Unbounded,
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        self.entries.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> StoreResult<()> {
        self.entries.write().remove(key);
        Ok(())
    }

    fn range(
        &self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
        order: Order,
    ) -> StoreResult<Vec<Record>> {
        // BTreeMap::range panics when start > end.
        check_range(start, end)?;

        let entries = self.entries.read();
        let iter = entries
            .range::<Vec<u8>, _>((lower(start), upper(end)))
            .map(|(k, v)| (k.clone(), v.clone()));
        let records = match order {
            Order::Ascending => iter.collect(),
            Order::Descending => iter.rev().collect(),
        };
        Ok(records)
    }

    fn seek(
        &self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
        order: Order,
    ) -> StoreResult<Option<Record>> {
        check_range(start, end)?;

        let entries = self.entries.read();
        let mut iter = entries.range::<Vec<u8>, _>((lower(start), upper(end)));
        let entry = match order {
            Order::Ascending => iter.next(),
            Order::Descending => iter.next_back(),
        };
        Ok(entry.map(|(k, v)| (k.clone(), v.clone())))
    }
}
