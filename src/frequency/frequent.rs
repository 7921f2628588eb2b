//! Frequent Items - weighted top-k heavy hitters with deterministic error bounds.
//!
//! A weighted Misra-Gries variant backed by a reverse-purge open-addressing hash map
//! ([`super::reverse_purge_map::ReversePurgeHashMap`]). When the map hits its size cap, a
//! purge samples up to 1024 active weights, subtracts their median from every slot, and
//! drops anything that falls to zero or below; the accumulated median becomes the
//! sketch-wide error `offset`.
//!
//! # Error Modes
//!
//! - **NoFalsePositives**: every returned item is guaranteed truly frequent (threshold on
//!   the lower bound).
//! - **NoFalseNegatives**: every truly frequent item is guaranteed to be returned
//!   (threshold on the upper bound).
//!
//! # Examples
//!
//! ```
//! use sketch_core::frequency::frequent::{FrequentItems, ErrorType};
//!
//! let mut sketch = FrequentItems::new(10).unwrap();
//! for _ in 0..1000 {
//!     sketch.update("common".to_string());
//! }
//! for _ in 0..10 {
//!     sketch.update("rare".to_string());
//! }
//!
//! let items = sketch.get_frequent_items(ErrorType::NoFalsePositives, None);
//! assert_eq!(items[0].item, "common");
//! ```

use crate::common::serde::{self, Cursor, ItemSerde};
use crate::common::validation::{validate_byte_size, validate_min_size};
use crate::common::{Result, Sketch, SketchError};
use crate::frequency::reverse_purge_map::ReversePurgeHashMap;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::hash::Hash;

const FAMILY_ID: u8 = 10;
const SERIAL_VERSION: u8 = 1;
const MIN_LG_MAP_SIZE: u8 = 3;
const EPSILON_FACTOR: f64 = 3.5;

/// Selects which error guarantee [`FrequentItems::get_frequent_items`] enforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorType {
    /// Every returned item is guaranteed truly frequent (filters on the lower bound).
    NoFalsePositives,
    /// Every truly frequent item is guaranteed to be returned (filters on the upper bound).
    NoFalseNegatives,
}

/// A single row of [`FrequentItems::get_frequent_items`]: an item and its weight bounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrequentItemRow<T> {
    /// The tracked item.
    pub item: T,
    /// The stored (point) weight estimate.
    pub estimate: u64,
    /// `max(0, estimate - offset)`: a guaranteed-safe minimum.
    pub lower_bound: u64,
    /// `estimate`: a guaranteed-safe maximum.
    pub upper_bound: u64,
}

/// Weighted top-k heavy-hitters sketch with deterministic error bounds.
#[derive(Debug)]
pub struct FrequentItems<T: Hash + Eq + Clone> {
    map: ReversePurgeHashMap<T>,
    total_weight: u64,
    offset: u64,
    rng: SmallRng,
}

impl<T: Hash + Eq + Clone> FrequentItems<T> {
    /// Builds a sketch capped at `2^lg_max_map_size` tracked items, seeded from the OS.
    ///
    /// # Errors
    /// Returns [`SketchError::InvalidArgument`] if `lg_max_map_size < 3`.
    pub fn new(lg_max_map_size: u8) -> Result<Self> {
        Self::with_start_size(MIN_LG_MAP_SIZE, lg_max_map_size, SmallRng::from_os_rng())
    }

    /// Builds a sketch with a deterministic RNG seed, for reproducible purge sampling.
    ///
    /// # Errors
    /// Returns [`SketchError::InvalidArgument`] if `lg_max_map_size < 3`.
    pub fn with_seed(lg_max_map_size: u8, seed: u64) -> Result<Self> {
        Self::with_start_size(MIN_LG_MAP_SIZE, lg_max_map_size, SmallRng::seed_from_u64(seed))
    }

    fn with_start_size(lg_start: u8, lg_max_map_size: u8, rng: SmallRng) -> Result<Self> {
        if lg_max_map_size < MIN_LG_MAP_SIZE {
            return Err(SketchError::InvalidArgument {
                param: "lg_max_map_size".to_string(),
                value: lg_max_map_size.to_string(),
                constraint: format!("must be at least {MIN_LG_MAP_SIZE}"),
            });
        }
        let lg_start = lg_start.min(lg_max_map_size);
        Ok(FrequentItems {
            map: ReversePurgeHashMap::new(lg_start, lg_max_map_size),
            total_weight: 0,
            offset: 0,
            rng,
        })
    }

    /// Adds one occurrence of `item`.
    pub fn update(&mut self, item: T) {
        self.update_by(item, 1);
    }

    /// Adds `weight` occurrences of `item`.
    pub fn update_by(&mut self, item: T, weight: u64) {
        if weight == 0 {
            return;
        }
        self.total_weight += weight;
        let purge_offset = self.map.adjust_or_put_value(item, weight, &mut self.rng);
        self.offset += purge_offset;
    }

    /// The stored weight for `item`, or 0 if it isn't tracked.
    pub fn get_estimate(&self, item: &T) -> u64 {
        self.map.get(item)
    }

    /// A guaranteed-safe minimum for `item`'s true weight.
    pub fn get_lower_bound(&self, item: &T) -> u64 {
        self.get_estimate(item).saturating_sub(self.offset)
    }

    /// A guaranteed-safe maximum for `item`'s true weight.
    pub fn get_upper_bound(&self, item: &T) -> u64 {
        self.get_estimate(item)
    }

    /// Returns every tracked item satisfying `err_type`'s threshold predicate, sorted by
    /// descending estimate. `threshold` defaults to [`FrequentItems::offset`].
    pub fn get_frequent_items(&self, err_type: ErrorType, threshold: Option<u64>) -> Vec<FrequentItemRow<T>> {
        let threshold = threshold.unwrap_or(self.offset);
        let mut rows: Vec<FrequentItemRow<T>> = self
            .map
            .iter()
            .filter_map(|(item, estimate)| {
                let lower_bound = estimate.saturating_sub(self.offset);
                let upper_bound = estimate;
                let passes = match err_type {
                    ErrorType::NoFalsePositives => lower_bound > threshold,
                    ErrorType::NoFalseNegatives => upper_bound > threshold,
                };
                passes.then(|| FrequentItemRow {
                    item: item.clone(),
                    estimate,
                    lower_bound,
                    upper_bound,
                })
            })
            .collect();
        rows.sort_by(|a, b| b.estimate.cmp(&a.estimate));
        rows
    }

    /// The maximum guaranteed per-item error, as a fraction of total ingested weight:
    /// `EPSILON_FACTOR / 2^lg_max_map_size`.
    pub fn get_epsilon(&self) -> f64 {
        EPSILON_FACTOR / (1u64 << self.map.lg_max_size()) as f64
    }

    /// An a priori bound on `offset` for a sketch of this `lg_max_map_size` that has seen
    /// `estimated_total_weight` total weight.
    pub fn get_apriori_error(lg_max_map_size: u8, estimated_total_weight: u64) -> f64 {
        (EPSILON_FACTOR / (1u64 << lg_max_map_size) as f64) * estimated_total_weight as f64
    }

    /// Total weight ingested across every `update`/`update_by` call.
    pub fn total_weight(&self) -> u64 {
        self.total_weight
    }

    /// The accumulated purge-median error bound: for any untracked item, its true weight
    /// is at most this.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Number of items currently tracked.
    pub fn num_active(&self) -> u32 {
        self.map.num_active()
    }

    /// `true` if no items are currently tracked.
    pub fn is_empty(&self) -> bool {
        self.map.num_active() == 0
    }

    /// Merges `other`'s tracked items into `self`, replaying each through `update_by` and
    /// carrying forward `other`'s accumulated offset (the weight already purged from its
    /// untracked items).
    pub fn merge(&mut self, other: &Self) {
        for (item, weight) in other.map.iter() {
            self.update_by(item.clone(), weight);
        }
        self.offset += other.offset;
    }
}

impl<T: Hash + Eq + Clone + ItemSerde> Sketch for FrequentItems<T> {
    type Item = T;

    fn update(&mut self, item: &T) {
        FrequentItems::update(self, item.clone());
    }

    fn estimate(&self) -> f64 {
        self.total_weight as f64
    }

    fn is_empty(&self) -> bool {
        FrequentItems::is_empty(self)
    }

    fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        serde::write_u8(&mut buf, FAMILY_ID);
        serde::write_u8(&mut buf, SERIAL_VERSION);
        let is_empty = self.is_empty();
        serde::write_u8(&mut buf, if is_empty { 1 } else { 0 });
        if is_empty {
            return buf;
        }
        serde::write_u8(&mut buf, self.map.lg_size());
        serde::write_u8(&mut buf, self.map.lg_max_size());
        serde::write_u64(&mut buf, self.total_weight);
        serde::write_u64(&mut buf, self.offset);
        serde::write_u32(&mut buf, self.map.num_active());
        for (item, weight) in self.map.iter() {
            T::serialize_item(item, &mut buf);
            serde::write_u64(&mut buf, weight);
        }
        buf
    }

    fn deserialize(bytes: &[u8]) -> std::result::Result<Self, SketchError> {
        validate_byte_size(bytes.len())?;
        validate_min_size(bytes.len(), 3)?;
        let mut cursor = Cursor::new(bytes);
        let family_id = cursor.read_u8()?;
        if family_id != FAMILY_ID {
            return Err(SketchError::CorruptInput {
                reason: format!("expected Frequent-items family id {FAMILY_ID}, got {family_id}"),
            });
        }
        let ser_ver = cursor.read_u8()?;
        if ser_ver != SERIAL_VERSION {
            return Err(SketchError::CorruptInput {
                reason: format!("unsupported Frequent-items serial version {ser_ver}"),
            });
        }
        let empty_flag = cursor.read_u8()?;
        if empty_flag == 1 {
            return FrequentItems::with_start_size(MIN_LG_MAP_SIZE, MIN_LG_MAP_SIZE, SmallRng::from_os_rng());
        }
        let lg_cur_size = cursor.read_u8()?;
        let lg_max_size = cursor.read_u8()?;
        let total_weight = cursor.read_u64()?;
        let offset = cursor.read_u64()?;
        let num_active = cursor.read_u32()?;

        let mut sketch = FrequentItems::with_start_size(lg_cur_size, lg_max_size, SmallRng::from_os_rng())?;
        for _ in 0..num_active {
            let item = T::deserialize_item(&mut cursor)?;
            let weight = cursor.read_u64()?;
            sketch.update_by(item, weight);
        }
        sketch.total_weight = total_weight;
        sketch.offset = offset;
        Ok(sketch)
    }
}
