//! Bin stores: the backing state a DDSketch keeps for its positive and negative values.
//!
//! Three dense policies share one capacity/reframing algorithm (see
//! [`DenseStoreState`]) and differ only in how they `normalize` an out-of-window index and
//! `adjust` the window once capacity runs out. A [`SparseStore`] trades that fixed
//! capacity for an ordered map, useful for small or very sparse distributions.

use crate::common::{Result, SketchError};
use std::collections::BTreeMap;

/// Default growth increment for a dense store's backing array.
pub const DEFAULT_GROWTH_INCREMENT: i64 = 64;
/// Default overhead ratio applied on top of the growth increment.
pub const DEFAULT_OVERHEAD_RATIO: f64 = 0.1;

/// A materialized `(index, count)` pair. Bins are value objects, produced by store
/// iterators; they are never independently heap-owned.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bin {
    /// The logarithmic bucket index.
    pub index: i32,
    /// The non-negative count accumulated in this bucket.
    pub count: f64,
}

fn get_new_length(new_min: i64, new_max: i64, growth_increment: i64, overhead: i64) -> i64 {
    let desired_length = new_max - new_min + 1;
    ((desired_length + overhead - 1) / growth_increment + 1) * growth_increment
}

/// Shared dense-array state: an integer-indexed window of non-negative counts.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseStoreState {
    bins: Vec<f64>,
    offset: i64,
    min_index: i64,
    max_index: i64,
    growth_increment: i64,
    overhead: i64,
}

impl DenseStoreState {
    fn new(growth_increment: i64) -> Self {
        let overhead = ((growth_increment as f64) * DEFAULT_OVERHEAD_RATIO).ceil() as i64;
        DenseStoreState {
            bins: Vec::new(),
            offset: 0,
            min_index: i64::MAX,
            max_index: i64::MIN,
            growth_increment: growth_increment.max(1),
            overhead: overhead.max(1),
        }
    }

    fn is_empty(&self) -> bool {
        self.max_index < self.min_index
    }

    fn get_new_length(&self, new_min: i64, new_max: i64, cap: Option<i64>) -> i64 {
        let len = get_new_length(new_min, new_max, self.growth_increment, self.overhead);
        match cap {
            Some(cap) => len.min(cap),
            None => len,
        }
    }

    fn total_count(&self, from_index: i64, to_index: i64) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        let from = (from_index - self.offset).max(0) as usize;
        let to = ((to_index - self.offset).min(self.bins.len() as i64 - 1)) as usize;
        if from > to {
            return 0.0;
        }
        self.bins[from..=to].iter().sum()
    }

    fn get_total_count(&self) -> f64 {
        self.total_count(self.min_index, self.max_index)
    }

    fn reset_bins(&mut self, from_index: i64, to_index: i64) {
        let from = (from_index - self.offset) as usize;
        let to = (to_index - self.offset) as usize;
        for slot in &mut self.bins[from..=to] {
            *slot = 0.0;
        }
    }

    fn shift_bins(&mut self, shift: i64) {
        let min_arr = (self.min_index - self.offset) as usize;
        let max_arr = (self.max_index - self.offset) as usize;
        let len = max_arr - min_arr + 1;
        let window: Vec<f64> = self.bins[min_arr..=max_arr].to_vec();
        let dest = (min_arr as i64 + shift) as usize;
        self.bins[dest..dest + len].copy_from_slice(&window);
        if shift > 0 {
            for slot in &mut self.bins[min_arr..dest] {
                *slot = 0.0;
            }
        } else if shift < 0 {
            for slot in &mut self.bins[dest + len..max_arr + 1] {
                *slot = 0.0;
            }
        }
        self.offset -= shift;
    }

    fn center_bins(&mut self, new_min: i64, new_max: i64) {
        let middle = new_min + (new_max - new_min + 1) / 2;
        let shift = self.offset + (self.bins.len() as i64) / 2 - middle;
        self.shift_bins(shift);
        self.min_index = new_min;
        self.max_index = new_max;
    }

    fn extend_range_grow(&mut self, new_min: i64, new_max: i64, cap: Option<i64>) {
        let new_min = new_min.min(self.min_index);
        let new_max = new_max.max(self.max_index);
        if self.is_empty() {
            let initial_length = self.get_new_length(new_min, new_max, cap);
            if self.bins.is_empty() || initial_length >= self.bins.len() as i64 {
                self.bins.resize(initial_length as usize, 0.0);
            }
            self.offset = new_min;
            self.min_index = new_min;
            self.max_index = new_max;
        } else if new_min >= self.offset && new_max < self.offset + self.bins.len() as i64 {
            self.min_index = new_min;
            self.max_index = new_max;
        } else {
            let new_length = self.get_new_length(new_min, new_max, cap);
            if new_length > self.bins.len() as i64 {
                self.bins.resize(new_length as usize, 0.0);
            }
        }
    }

    fn iter(&self) -> impl Iterator<Item = Bin> + '_ {
        let offset = self.offset;
        let (lo, hi) = if self.is_empty() {
            (1, 0)
        } else {
            (self.min_index, self.max_index)
        };
        (lo..=hi).filter_map(move |index| {
            let count = self.bins[(index - offset) as usize];
            (count > 0.0).then_some(Bin {
                index: index as i32,
                count,
            })
        })
    }

    fn rev_iter(&self) -> impl Iterator<Item = Bin> + '_ {
        let offset = self.offset;
        let (lo, hi) = if self.is_empty() {
            (1, 0)
        } else {
            (self.min_index, self.max_index)
        };
        (lo..=hi).rev().filter_map(move |index| {
            let count = self.bins[(index - offset) as usize];
            (count > 0.0).then_some(Bin {
                index: index as i32,
                count,
            })
        })
    }
}

/// The three dense bin store policies, modeled as a sealed variant rather than dynamic
/// dispatch: the DDSketch carries the variant by value and `match`es on the hot path.
#[derive(Debug, Clone, PartialEq)]
pub enum DenseStore {
    /// Grows without bound to accommodate any index ever added.
    Unbounded(DenseStoreState),
    /// Merges the smallest bins together once `max_num_bins` is reached.
    CollapsingLowest {
        /// Shared dense-array state.
        state: DenseStoreState,
        /// Hard cap on the number of distinct bins this store will track.
        max_num_bins: i64,
        /// Sticky once set: the window has reached its cap and will never grow again.
        is_collapsed: bool,
    },
    /// Symmetric to `CollapsingLowest`: merges the largest bins together.
    CollapsingHighest {
        /// Shared dense-array state.
        state: DenseStoreState,
        /// Hard cap on the number of distinct bins this store will track.
        max_num_bins: i64,
        /// Sticky once set: the window has reached its cap and will never grow again.
        is_collapsed: bool,
    },
}

impl DenseStore {
    /// An unbounded dense store with the default growth increment.
    pub fn unbounded() -> Self {
        DenseStore::Unbounded(DenseStoreState::new(DEFAULT_GROWTH_INCREMENT))
    }

    /// A collapsing-lowest dense store capped at `max_num_bins` distinct buckets.
    pub fn collapsing_lowest(max_num_bins: u32) -> Self {
        DenseStore::CollapsingLowest {
            state: DenseStoreState::new(DEFAULT_GROWTH_INCREMENT),
            max_num_bins: max_num_bins as i64,
            is_collapsed: false,
        }
    }

    /// A collapsing-highest dense store capped at `max_num_bins` distinct buckets.
    pub fn collapsing_highest(max_num_bins: u32) -> Self {
        DenseStore::CollapsingHighest {
            state: DenseStoreState::new(DEFAULT_GROWTH_INCREMENT),
            max_num_bins: max_num_bins as i64,
            is_collapsed: false,
        }
    }

    fn state(&self) -> &DenseStoreState {
        match self {
            DenseStore::Unbounded(s) => s,
            DenseStore::CollapsingLowest { state, .. } => state,
            DenseStore::CollapsingHighest { state, .. } => state,
        }
    }

    fn state_mut(&mut self) -> &mut DenseStoreState {
        match self {
            DenseStore::Unbounded(s) => s,
            DenseStore::CollapsingLowest { state, .. } => state,
            DenseStore::CollapsingHighest { state, .. } => state,
        }
    }

    fn cap(&self) -> Option<i64> {
        match self {
            DenseStore::Unbounded(_) => None,
            DenseStore::CollapsingLowest { max_num_bins, .. } => Some(*max_num_bins),
            DenseStore::CollapsingHighest { max_num_bins, .. } => Some(*max_num_bins),
        }
    }

    fn adjust(&mut self, new_min: i64, new_max: i64) {
        match self {
            DenseStore::Unbounded(state) => state.center_bins(new_min, new_max),
            DenseStore::CollapsingLowest {
                state,
                is_collapsed,
                ..
            } => {
                if new_max - new_min + 1 > state.bins.len() as i64 {
                    let new_min = new_max - state.bins.len() as i64 + 1;
                    if new_min >= state.max_index {
                        let total = state.get_total_count();
                        let (mi, ma) = (state.min_index, state.max_index);
                        state.reset_bins(mi, ma);
                        state.offset = new_min;
                        state.min_index = new_min;
                        state.bins[0] = total;
                    } else {
                        let shift = state.offset - new_min;
                        if shift < 0 {
                            let collapsed = state.total_count(state.min_index, new_min - 1);
                            state.reset_bins(state.min_index, new_min - 1);
                            let idx = (new_min - state.offset) as usize;
                            state.bins[idx] += collapsed;
                            state.min_index = new_min;
                            state.shift_bins(shift);
                        } else {
                            state.shift_bins(shift);
                            state.min_index = new_min;
                        }
                    }
                    state.max_index = new_max;
                    *is_collapsed = true;
                } else {
                    state.center_bins(new_min, new_max);
                }
            }
            DenseStore::CollapsingHighest {
                state,
                is_collapsed,
                ..
            } => {
                if new_max - new_min + 1 > state.bins.len() as i64 {
                    let new_max = new_min + state.bins.len() as i64 - 1;
                    if new_max <= state.min_index {
                        let total = state.get_total_count();
                        let (mi, ma) = (state.min_index, state.max_index);
                        state.reset_bins(mi, ma);
                        let last = state.bins.len() as i64 - 1;
                        state.offset = new_max - last;
                        state.max_index = new_max;
                        let last_idx = state.bins.len() - 1;
                        state.bins[last_idx] = total;
                    } else {
                        let last = state.bins.len() as i64 - 1;
                        let target_offset = new_max - last;
                        let shift = state.offset - target_offset;
                        if shift > 0 {
                            let collapsed = state.total_count(new_max + 1, state.max_index);
                            state.reset_bins(new_max + 1, state.max_index);
                            let idx = (new_max - state.offset) as usize;
                            state.bins[idx] += collapsed;
                            state.max_index = new_max;
                            state.shift_bins(shift);
                        } else {
                            state.shift_bins(shift);
                            state.max_index = new_max;
                        }
                    }
                    state.min_index = new_min;
                    *is_collapsed = true;
                } else {
                    state.center_bins(new_min, new_max);
                }
            }
        }
    }

    fn extend_range(&mut self, new_min: i64, new_max: i64) {
        let cap = self.cap();
        let was_empty = self.state().is_empty();
        self.state_mut().extend_range_grow(new_min, new_max, cap);
        if was_empty {
            let (lo, hi) = (self.state().min_index, self.state().max_index);
            self.adjust(lo, hi);
        } else {
            let needs_adjust = {
                let s = self.state();
                !(new_min.min(s.min_index) >= s.offset
                    && new_max.max(s.max_index) < s.offset + s.bins.len() as i64)
            };
            if needs_adjust {
                let new_min = new_min.min(self.state().min_index);
                let new_max = new_max.max(self.state().max_index);
                self.adjust(new_min, new_max);
            }
        }
    }

    fn normalize(&mut self, index: i32) -> usize {
        let index = index as i64;
        match self {
            DenseStore::Unbounded(state) => {
                if index < state.min_index || index > state.max_index {
                    self.extend_range(index, index);
                }
                (index - self.state().offset) as usize
            }
            DenseStore::CollapsingLowest { is_collapsed, .. } => {
                if index < self.state().min_index {
                    if *is_collapsed {
                        return 0;
                    }
                    self.extend_range(index, index);
                    if self.is_collapsed() {
                        return 0;
                    }
                } else if index > self.state().max_index {
                    self.extend_range(index, index);
                }
                (index - self.state().offset) as usize
            }
            DenseStore::CollapsingHighest { is_collapsed, .. } => {
                if index > self.state().max_index {
                    if *is_collapsed {
                        return self.state().bins.len() - 1;
                    }
                    self.extend_range(index, index);
                    if self.is_collapsed() {
                        return self.state().bins.len() - 1;
                    }
                } else if index < self.state().min_index {
                    self.extend_range(index, index);
                }
                (index - self.state().offset) as usize
            }
        }
    }

    fn is_collapsed(&self) -> bool {
        match self {
            DenseStore::Unbounded(_) => false,
            DenseStore::CollapsingLowest { is_collapsed, .. } => *is_collapsed,
            DenseStore::CollapsingHighest { is_collapsed, .. } => *is_collapsed,
        }
    }

    /// Adds `count` (default 1) to the bucket for `index`. A `count` of `0` is a no-op.
    pub fn add(&mut self, index: i32, count: f64) {
        if count == 0.0 {
            return;
        }
        let array_index = self.normalize(index);
        self.state_mut().bins[array_index] += count;
    }

    /// Adds an already-materialized [`Bin`].
    pub fn add_bin(&mut self, bin: Bin) {
        self.add(bin.index, bin.count);
    }

    /// The sum of all counts across every bucket.
    pub fn get_total_count(&self) -> f64 {
        self.state().get_total_count()
    }

    /// The smallest non-empty bucket index.
    ///
    /// # Errors
    /// Returns [`SketchError::Empty`] if the store has no non-empty bucket.
    pub fn get_min_index(&self) -> Result<i32> {
        if self.is_empty() {
            return Err(SketchError::Empty {
                operation: "get_min_index".to_string(),
            });
        }
        Ok(self.state().min_index as i32)
    }

    /// The largest non-empty bucket index.
    ///
    /// # Errors
    /// Returns [`SketchError::Empty`] if the store has no non-empty bucket.
    pub fn get_max_index(&self) -> Result<i32> {
        if self.is_empty() {
            return Err(SketchError::Empty {
                operation: "get_max_index".to_string(),
            });
        }
        Ok(self.state().max_index as i32)
    }

    /// True iff the store holds no non-empty bucket.
    pub fn is_empty(&self) -> bool {
        self.state().is_empty()
    }

    /// Adds every non-empty bin of `other` into `self`, preserving this variant's
    /// collapsing discipline.
    pub fn merge(&mut self, other: &DenseStore) {
        match self {
            DenseStore::CollapsingLowest { .. } => {
                for bin in other.rev_iter() {
                    self.add_bin(bin);
                }
            }
            _ => {
                for bin in other.iter() {
                    self.add_bin(bin);
                }
            }
        }
    }

    /// Merges the non-empty entries of a sparse store into this dense store.
    pub fn merge_sparse(&mut self, other: &SparseStore) {
        for bin in other.iter() {
            self.add_bin(bin);
        }
    }

    /// Ascending, lazy iterator over non-empty `(index, count)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = Bin> + '_ {
        self.state().iter()
    }

    /// Descending, lazy iterator over non-empty `(index, count)` pairs.
    pub fn rev_iter(&self) -> impl Iterator<Item = Bin> + '_ {
        self.state().rev_iter()
    }
}

/// An ordered mapping from bin index to non-negative count; only non-zero counts are
/// stored. No collapsing, no fixed capacity — used when a DDSketch is configured for
/// sparse inputs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SparseStore {
    bins: BTreeMap<i32, f64>,
}

impl SparseStore {
    /// An empty sparse store.
    pub fn new() -> Self {
        SparseStore::default()
    }

    /// Adds `count` to the bucket for `index`. A `count` of `0` is a no-op; a bucket whose
    /// count drops back to exactly `0` is pruned.
    pub fn add(&mut self, index: i32, count: f64) {
        if count == 0.0 {
            return;
        }
        let entry = self.bins.entry(index).or_insert(0.0);
        *entry += count;
        if *entry == 0.0 {
            self.bins.remove(&index);
        }
    }

    /// Adds an already-materialized [`Bin`].
    pub fn add_bin(&mut self, bin: Bin) {
        self.add(bin.index, bin.count);
    }

    /// The sum of all counts across every bucket.
    pub fn get_total_count(&self) -> f64 {
        self.bins.values().sum()
    }

    /// The smallest non-empty bucket index.
    ///
    /// # Errors
    /// Returns [`SketchError::Empty`] if the store has no non-empty bucket.
    pub fn get_min_index(&self) -> Result<i32> {
        self.bins.keys().next().copied().ok_or(SketchError::Empty {
            operation: "get_min_index".to_string(),
        })
    }

    /// The largest non-empty bucket index.
    ///
    /// # Errors
    /// Returns [`SketchError::Empty`] if the store has no non-empty bucket.
    pub fn get_max_index(&self) -> Result<i32> {
        self.bins
            .keys()
            .next_back()
            .copied()
            .ok_or(SketchError::Empty {
                operation: "get_max_index".to_string(),
            })
    }

    /// True iff the store holds no non-empty bucket.
    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    /// Adds every non-empty bin of `other` into `self`.
    pub fn merge(&mut self, other: &SparseStore) {
        for (&index, &count) in &other.bins {
            self.add(index, count);
        }
    }

    /// Adds every non-empty bin of a dense store into `self`.
    pub fn merge_dense(&mut self, other: &DenseStore) {
        for bin in other.iter() {
            self.add_bin(bin);
        }
    }

    /// Ascending, lazy iterator over non-empty `(index, count)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = Bin> + '_ {
        self.bins.iter().map(|(&index, &count)| Bin { index, count })
    }

    /// Descending, lazy iterator over non-empty `(index, count)` pairs.
    pub fn rev_iter(&self) -> impl Iterator<Item = Bin> + '_ {
        self.bins
            .iter()
            .rev()
            .map(|(&index, &count)| Bin { index, count })
    }
}
