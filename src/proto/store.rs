//! Storage for the connection's live streams: a slab keyed by a dense index,
//! with a hash map from the wire `StreamId` to that index. Mirrors the
//! two-level lookup a connection needs — "the next stream to service" versus
//! "the stream this inbound frame belongs to" — without paying for a tree
//! keyed directly by the (sparse, monotonically increasing) stream id.

use std::collections::HashMap;

use fnv::FnvBuildHasher;
use slab::Slab;

use crate::frame::StreamId;

#[derive(Debug)]
pub struct Store<V> {
    slab: Slab<V>,
    ids: HashMap<StreamId, usize, FnvBuildHasher>,
}

impl<V> Store<V> {
    pub fn new() -> Store<V> {
        Store {
            slab: Slab::new(),
            ids: HashMap::default(),
        }
    }

    pub fn insert(&mut self, id: StreamId, value: V) {
        let key = self.slab.insert(value);
        let prev = self.ids.insert(id, key);
        debug_assert!(prev.is_none(), "stream id reused while still live");
    }

    pub fn get(&self, id: &StreamId) -> Option<&V> {
        self.ids.get(id).map(|&key| &self.slab[key])
    }

    pub fn get_mut(&mut self, id: &StreamId) -> Option<&mut V> {
        match self.ids.get(id) {
            Some(&key) => Some(&mut self.slab[key]),
            None => None,
        }
    }

    pub fn remove(&mut self, id: &StreamId) -> Option<V> {
        let key = self.ids.remove(id)?;
        Some(self.slab.remove(key))
    }

    pub fn contains(&self, id: &StreamId) -> bool {
        self.ids.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.slab.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slab.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&StreamId, &V)> {
        self.ids.iter().map(move |(id, &key)| (id, &self.slab[key]))
    }

    pub fn drain_ids(&mut self) -> Vec<StreamId> {
        let ids: Vec<StreamId> = self.ids.keys().copied().collect();
        self.slab.clear();
        self.ids.clear();
        ids
    }
}

impl<V> Default for Store<V> {
    fn default() -> Self {
        Store::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_get_remove_round_trip() {
        let mut store: Store<&'static str> = Store::new();
        let id = StreamId::from(1);
        store.insert(id, "hello");
        assert_eq!(store.get(&id), Some(&"hello"));
        assert_eq!(store.len(), 1);

        assert_eq!(store.remove(&id), Some("hello"));
        assert!(store.get(&id).is_none());
        assert!(store.is_empty());
    }
}
