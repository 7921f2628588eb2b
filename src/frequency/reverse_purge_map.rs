//! Reverse-purge open-addressing hash map: the backing store for [`super::frequent`].
//!
//! Linear probing with drift tracking (the probe distance of an active entry from its
//! natural slot). Purging subtracts the median of a bounded sample of active weights from
//! every slot and deletes anything that drops to zero or below, using a reverse scan so
//! later entries slide forward and probe sequences stay dense.

use rand::seq::SliceRandom;
use rand::Rng;
use std::hash::Hash;

const LOAD_FACTOR: f64 = 0.75;
const DRIFT_LIMIT: u32 = 1024;
const MAX_SAMPLE_SIZE: usize = 1024;

struct Slot<T> {
    key: T,
    value: u64,
    drift: u32,
}

/// Open-addressing `(key, weight)` map with a reverse-purge eviction strategy, bounding
/// its footprint to at most `2^lg_max_size` slots.
pub struct ReversePurgeHashMap<T: Hash + Eq + Clone> {
    lg_size: u8,
    lg_max_size: u8,
    num_active: u32,
    slots: Vec<Option<Slot<T>>>,
}

impl<T: Hash + Eq + Clone> ReversePurgeHashMap<T> {
    pub fn new(lg_size: u8, lg_max_size: u8) -> Self {
        let size = 1usize << lg_size;
        ReversePurgeHashMap {
            lg_size,
            lg_max_size,
            num_active: 0,
            slots: (0..size).map(|_| None).collect(),
        }
    }

    pub fn lg_size(&self) -> u8 {
        self.lg_size
    }

    pub fn lg_max_size(&self) -> u8 {
        self.lg_max_size
    }

    pub fn capacity(&self) -> u32 {
        (((1u64 << self.lg_size) as f64) * LOAD_FACTOR) as u32
    }

    pub fn num_active(&self) -> u32 {
        self.num_active
    }

    fn hash_of(key: &T) -> u64 {
        use std::hash::Hasher;
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        key.hash(&mut hasher);
        hasher.finish()
    }

    pub fn get(&self, key: &T) -> u64 {
        let mask = (1u64 << self.lg_size) - 1;
        let mut probe = (Self::hash_of(key) & mask) as usize;
        loop {
            match &self.slots[probe] {
                Some(slot) if &slot.key == key => return slot.value,
                Some(_) => probe = (probe + 1) & mask as usize,
                None => return 0,
            }
        }
    }

    /// Adds `value` to `key`'s weight (inserting it at zero first if absent). Returns the
    /// purge offset incurred by this call, or 0 if no purge happened.
    pub fn adjust_or_put_value<R: Rng + ?Sized>(&mut self, key: T, value: u64, rng: &mut R) -> u64 {
        let mask = (1u64 << self.lg_size) - 1;
        let mut probe = (Self::hash_of(&key) & mask) as usize;
        let mut drift = 1u32;
        loop {
            match &mut self.slots[probe] {
                Some(slot) if slot.key == key => {
                    slot.value += value;
                    return 0;
                }
                Some(_) => {
                    probe = (probe + 1) & mask as usize;
                    drift += 1;
                    debug_assert!(drift < DRIFT_LIMIT, "drift limit reached");
                }
                None => break,
            }
        }
        self.slots[probe] = Some(Slot {
            key,
            value,
            drift,
        });
        self.num_active += 1;

        if self.num_active > self.capacity() {
            if self.lg_size < self.lg_max_size {
                self.resize(self.lg_size + 1, rng);
                0
            } else {
                self.purge(rng)
            }
        } else {
            0
        }
    }

    pub fn resize<R: Rng + ?Sized>(&mut self, new_lg_size: u8, rng: &mut R) {
        let old_slots = std::mem::replace(
            &mut self.slots,
            (0..(1usize << new_lg_size)).map(|_| None).collect(),
        );
        self.lg_size = new_lg_size;
        self.num_active = 0;
        for slot in old_slots.into_iter().flatten() {
            self.adjust_or_put_value(slot.key, slot.value, rng);
        }
    }

    /// Samples up to 1024 active weights, subtracts their median from every active slot,
    /// and deletes any slot that drops to zero or below. Returns the median (the purge's
    /// contribution to the sketch-wide error offset).
    pub fn purge<R: Rng + ?Sized>(&mut self, rng: &mut R) -> u64 {
        let active_indices: Vec<usize> = (0..self.slots.len())
            .filter(|&i| self.slots[i].is_some())
            .collect();
        let limit = MAX_SAMPLE_SIZE.min(active_indices.len());
        let mut sample_indices = active_indices.clone();
        sample_indices.shuffle(rng);
        sample_indices.truncate(limit);
        let mut samples: Vec<u64> = sample_indices
            .iter()
            .map(|&i| self.slots[i].as_ref().unwrap().value)
            .collect();
        samples.sort_unstable();
        let median = samples[samples.len() / 2];
        self.subtract_and_keep_positive_only(median);
        median
    }

    fn subtract_and_keep_positive_only(&mut self, amount: u64) {
        let size = self.slots.len();
        let mut first_empty = size - 1;
        while self.slots[first_empty].is_some() {
            if first_empty == 0 {
                break;
            }
            first_empty -= 1;
        }
        let mut probe = first_empty;
        while probe > 0 {
            probe -= 1;
            self.purge_one(probe, amount);
        }
        let mut probe = size;
        while probe > first_empty {
            probe -= 1;
            self.purge_one(probe, amount);
        }
    }

    fn purge_one(&mut self, index: usize, amount: u64) {
        if let Some(slot) = &mut self.slots[index] {
            if slot.value <= amount {
                self.hash_delete(index);
                self.num_active -= 1;
            } else {
                slot.value -= amount;
            }
        }
    }

    fn hash_delete(&mut self, delete_index: usize) {
        self.slots[delete_index] = None;
        let mask = (1u64 << self.lg_size) - 1;
        let mut drift = 1u32;
        let mut probe = (delete_index + 1) & mask as usize;
        let mut delete_index = delete_index;
        while self.slots[probe].is_some() {
            let probe_drift = self.slots[probe].as_ref().unwrap().drift;
            if probe_drift > drift {
                let moved = self.slots[probe].take().unwrap();
                self.slots[delete_index] = Some(Slot {
                    key: moved.key,
                    value: moved.value,
                    drift: moved.drift - drift,
                });
                drift = 0;
                delete_index = probe;
            }
            probe = (probe + 1) & mask as usize;
            drift += 1;
            debug_assert!(drift < DRIFT_LIMIT, "drift limit reached during delete");
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&T, u64)> {
        self.slots
            .iter()
            .filter_map(|slot| slot.as_ref().map(|s| (&s.key, s.value)))
    }
}
