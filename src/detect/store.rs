//! Deduplicating store with an oldest-first retention cap.
//!
//! Entries are indexed three ways: by id (lookups and status transitions),
//! by dedup key (duplicates are dropped on insert), and by retention
//! timestamp (eviction). Eviction happens at the end of each batch insert
//! and is final.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};

/// Something the [`BoundedStore`] can hold.
pub trait Retained: Clone {
    fn id(&self) -> &str;
    fn dedup_key(&self) -> String;
    /// Eviction order: smallest first.
    fn retained_at(&self) -> DateTime<Utc>;
}

impl Retained for crate::detect::AnomalyDetection {
    fn id(&self) -> &str {
        &self.id
    }

    fn dedup_key(&self) -> String {
        crate::detect::AnomalyDetection::dedup_key(self)
    }

    fn retained_at(&self) -> DateTime<Utc> {
        self.detected_at
    }
}

pub struct BoundedStore<T: Retained> {
    capacity: usize,
    entries: HashMap<String, T>,
    by_key: HashMap<String, String>,
    // (timestamp, insertion seq) keeps ties in insertion order
    order: BTreeMap<(DateTime<Utc>, u64), String>,
    seq: u64,
}

/// What happened to each item of a batch.
#[derive(Debug, Clone)]
pub enum Admission<T> {
    Inserted(T),
    /// An entry with the same dedup key was already stored; it is returned.
    Duplicate(T),
}

impl<T> Admission<T> {
    pub fn into_inner(self) -> T {
        match self {
            Admission::Inserted(t) | Admission::Duplicate(t) => t,
        }
    }

    pub fn is_inserted(&self) -> bool {
        matches!(self, Admission::Inserted(_))
    }

    /// The item, when it was newly stored.
    pub fn inserted(&self) -> Option<&T> {
        match self {
            Admission::Inserted(t) => Some(t),
            Admission::Duplicate(_) => None,
        }
    }
}

impl<T: Retained> BoundedStore<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::new(),
            by_key: HashMap::new(),
            order: BTreeMap::new(),
            seq: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.entries.get(id)
    }

    /// Mutable access for status transitions. Callers must not change the
    /// fields that feed `dedup_key` or `retained_at`.
    pub fn get_mut(&mut self, id: &str) -> Option<&mut T> {
        self.entries.get_mut(id)
    }

    pub fn contains_key(&self, dedup_key: &str) -> bool {
        self.by_key.contains_key(dedup_key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.values()
    }

    /// Insert a batch, dropping any item whose dedup key is already present
    /// (including keys introduced earlier in the same batch), then evict down
    /// to capacity. Returns one admission per input item, in input order.
    pub fn insert_batch(&mut self, items: Vec<T>) -> Vec<Admission<T>> {
        let mut admissions = Vec::with_capacity(items.len());
        for item in items {
            let key = item.dedup_key();
            if let Some(existing) = self.by_key.get(&key).and_then(|id| self.entries.get(id)) {
                admissions.push(Admission::Duplicate(existing.clone()));
                continue;
            }

            let id = item.id().to_string();
            self.seq += 1;
            self.order.insert((item.retained_at(), self.seq), id.clone());
            self.by_key.insert(key, id.clone());
            admissions.push(Admission::Inserted(item.clone()));
            self.entries.insert(id, item);
        }
        self.evict();
        admissions
    }

    /// Drop oldest entries until `len() <= capacity`. Returns how many went.
    fn evict(&mut self) -> usize {
        let mut evicted = 0;
        while self.entries.len() > self.capacity {
            let Some((_, id)) = self.order.pop_first() else {
                break;
            };
            if let Some(item) = self.entries.remove(&id) {
                self.by_key.remove(&item.dedup_key());
                evicted += 1;
            }
        }
        if evicted > 0 {
            tracing::debug!(evicted, capacity = self.capacity, "Evicted oldest entries");
        }
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{AnomalyDetection, AnomalyType};
    use chrono::{Duration, TimeZone};

    fn anomaly(metric: &str, hours: i64) -> AnomalyDetection {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        AnomalyDetection::new(metric, AnomalyType::Spike, t0 + Duration::hours(hours))
    }

    #[test]
    fn test_duplicates_within_batch_keep_first() {
        let mut store = BoundedStore::new(10);
        let first = anomaly("compute", 1);
        let mut second = anomaly("compute", 1);
        second.actual_value = 42.0;

        let admissions = store.insert_batch(vec![first.clone(), second]);
        assert!(admissions[0].is_inserted());
        assert!(!admissions[1].is_inserted());
        assert_eq!(admissions[1].clone().into_inner().id, first.id);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&first.id).unwrap().actual_value, 0.0);
    }

    #[test]
    fn test_duplicates_across_batches_are_dropped() {
        let mut store = BoundedStore::new(10);
        store.insert_batch(vec![anomaly("compute", 1), anomaly("compute", 2)]);
        let again = store.insert_batch(vec![anomaly("compute", 1), anomaly("compute", 2)]);
        assert!(again.iter().all(|a| !a.is_inserted()));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_retention_cap_evicts_oldest() {
        let mut store = BoundedStore::new(1000);
        let items: Vec<_> = (0..1050).map(|h| anomaly("compute", h)).collect();
        let oldest: Vec<String> = items[..50].iter().map(|a| a.id.clone()).collect();

        store.insert_batch(items);
        assert_eq!(store.len(), 1000);
        assert!(oldest.iter().all(|id| store.get(id).is_none()));
        // Evicted keys are forgotten, so the occurrence may be stored again
        assert!(!store.contains_key(&anomaly("compute", 0).dedup_key()));
        assert!(store.contains_key(&anomaly("compute", 50).dedup_key()));
    }

    #[test]
    fn test_eviction_order_ignores_insertion_order() {
        let mut store = BoundedStore::new(2);
        store.insert_batch(vec![anomaly("a", 5), anomaly("b", 1)]);
        let late = anomaly("c", 3);
        store.insert_batch(vec![late.clone()]);

        let mut metrics: Vec<_> = store.iter().map(|a| a.metric.clone()).collect();
        metrics.sort();
        assert_eq!(metrics, vec!["a", "c"]);
        assert!(store.get(&late.id).is_some());
    }
}
