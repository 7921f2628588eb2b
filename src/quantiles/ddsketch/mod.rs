//! DDSketch: a relative-error quantile sketch over positive and negative reals.
//!
//! A `DDSketch` owns two [`store::DenseStore`]-or-[`store::SparseStore`] bin stores (one
//! for positive values, one for negative, stored as magnitudes), a `zero_count` for values
//! too small to index, and an [`IndexMapping`] that is the sole authority on
//! `value <-> index`.

pub mod mapping;
pub mod store;

use crate::common::serde::Cursor;
use crate::common::validation::{validate_byte_size, validate_min_size, validate_rank};
use crate::common::{serde, Mergeable, Result, Sketch, SketchError};
use mapping::{IndexMapping, IndexMappingLayout};
use store::{DenseStore, SparseStore};

const FAMILY_ID: u8 = 18;
const SERIAL_VERSION: u8 = 1;
const DEFAULT_MAX_NUM_BINS: u32 = 2048;

/// Which bin store backs a `DDSketch`'s positive and negative halves.
#[derive(Debug, Clone, PartialEq)]
enum Store {
    Dense(DenseStore),
    Sparse(SparseStore),
}

impl Store {
    fn add(&mut self, index: i32, count: f64) {
        match self {
            Store::Dense(s) => s.add(index, count),
            Store::Sparse(s) => s.add(index, count),
        }
    }

    fn get_total_count(&self) -> f64 {
        match self {
            Store::Dense(s) => s.get_total_count(),
            Store::Sparse(s) => s.get_total_count(),
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            Store::Dense(s) => s.is_empty(),
            Store::Sparse(s) => s.is_empty(),
        }
    }

    fn get_min_index(&self) -> Result<i32> {
        match self {
            Store::Dense(s) => s.get_min_index(),
            Store::Sparse(s) => s.get_min_index(),
        }
    }

    fn get_max_index(&self) -> Result<i32> {
        match self {
            Store::Dense(s) => s.get_max_index(),
            Store::Sparse(s) => s.get_max_index(),
        }
    }

    fn iter(&self) -> Box<dyn Iterator<Item = store::Bin> + '_> {
        match self {
            Store::Dense(s) => Box::new(s.iter()),
            Store::Sparse(s) => Box::new(s.iter()),
        }
    }

    fn rev_iter(&self) -> Box<dyn Iterator<Item = store::Bin> + '_> {
        match self {
            Store::Dense(s) => Box::new(s.rev_iter()),
            Store::Sparse(s) => Box::new(s.rev_iter()),
        }
    }

    fn merge(&mut self, other: &Store) {
        match (self, other) {
            (Store::Dense(a), Store::Dense(b)) => a.merge(b),
            (Store::Dense(a), Store::Sparse(b)) => a.merge_sparse(b),
            (Store::Sparse(a), Store::Dense(b)) => a.merge_dense(b),
            (Store::Sparse(a), Store::Sparse(b)) => a.merge(b),
        }
    }
}

/// The backing store policy a `DDSketch` is configured with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StoreKind {
    /// Grows without bound.
    Unbounded = 0,
    /// Caps the number of distinct bins, collapsing the smallest.
    CollapsingLowest = 1,
    /// Caps the number of distinct bins, collapsing the largest.
    CollapsingHighest = 2,
    /// Ordered map, no fixed capacity, best for sparse inputs.
    Sparse = 3,
}

impl StoreKind {
    fn from_u8(byte: u8) -> Result<Self> {
        match byte {
            0 => Ok(StoreKind::Unbounded),
            1 => Ok(StoreKind::CollapsingLowest),
            2 => Ok(StoreKind::CollapsingHighest),
            3 => Ok(StoreKind::Sparse),
            other => Err(SketchError::CorruptInput {
                reason: format!("unknown store kind byte {}", other),
            }),
        }
    }
}

impl Store {
    fn new(kind: StoreKind, max_num_bins: u32) -> Self {
        match kind {
            StoreKind::Unbounded => Store::Dense(DenseStore::unbounded()),
            StoreKind::CollapsingLowest => Store::Dense(DenseStore::collapsing_lowest(max_num_bins)),
            StoreKind::CollapsingHighest => {
                Store::Dense(DenseStore::collapsing_highest(max_num_bins))
            }
            StoreKind::Sparse => Store::Sparse(SparseStore::new()),
        }
    }
}

/// A relative-error quantile sketch over positive and negative reals.
///
/// # Examples
/// ```
/// use sketch_core::quantiles::ddsketch::DDSketch;
///
/// let mut sketch = DDSketch::new(0.01).unwrap();
/// for v in 1..=1000 {
///     sketch.update(v as f64, 1.0).unwrap();
/// }
/// assert_eq!(sketch.get_count(), 1000.0);
/// let median = sketch.get_quantile(0.5).unwrap();
/// assert!((median - 500.0).abs() / 500.0 <= 0.01);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct DDSketch {
    mapping: IndexMapping,
    positive_store: Store,
    negative_store: Store,
    zero_count: f64,
    store_kind: StoreKind,
    max_num_bins: u32,
}

impl DDSketch {
    /// Builds an unbounded DDSketch with the exact-log mapping at the given relative
    /// accuracy.
    ///
    /// # Errors
    /// Returns [`SketchError::InvalidArgument`] if `relative_accuracy` is not in `(0, 1)`.
    pub fn new(relative_accuracy: f64) -> Result<Self> {
        Self::with_store(relative_accuracy, StoreKind::Unbounded, DEFAULT_MAX_NUM_BINS)
    }

    /// Builds a DDSketch with an explicit store policy.
    ///
    /// # Errors
    /// Returns [`SketchError::InvalidArgument`] if `relative_accuracy` is not in `(0, 1)`.
    pub fn with_store(relative_accuracy: f64, store_kind: StoreKind, max_num_bins: u32) -> Result<Self> {
        let mapping = IndexMapping::log(relative_accuracy)?;
        Ok(DDSketch {
            mapping,
            positive_store: Store::new(store_kind, max_num_bins),
            negative_store: Store::new(store_kind, max_num_bins),
            zero_count: 0.0,
            store_kind,
            max_num_bins,
        })
    }

    /// The configured index mapping.
    pub fn mapping(&self) -> &IndexMapping {
        &self.mapping
    }

    /// Adds `value` with weight `weight` (default 1) to the sketch.
    ///
    /// # Errors
    /// Returns [`SketchError::InvalidArgument`] if `weight` is negative, or
    /// [`SketchError::OutOfRange`] if `|value|` exceeds the mapping's indexable range.
    pub fn update(&mut self, value: f64, weight: f64) -> Result<()> {
        if weight < 0.0 {
            return Err(SketchError::InvalidArgument {
                param: "weight".to_string(),
                value: weight.to_string(),
                constraint: "must be non-negative".to_string(),
            });
        }
        if weight == 0.0 {
            return Ok(());
        }
        let max_indexable = self.mapping.max_indexable_value();
        if value.abs() > max_indexable {
            return Err(SketchError::OutOfRange {
                value: value.to_string(),
                bound: format!("[-{max_indexable}, {max_indexable}]"),
            });
        }
        let min_indexable = self.mapping.min_indexable_value();
        if value.abs() <= min_indexable {
            self.zero_count += weight;
        } else if value > 0.0 {
            let index = self.mapping.index(value);
            self.positive_store.add(index, weight);
        } else {
            let index = self.mapping.index(-value);
            self.negative_store.add(index, weight);
        }
        Ok(())
    }

    /// The total count of values added (including those folded into `zero_count`).
    pub fn get_count(&self) -> f64 {
        self.zero_count + self.positive_store.get_total_count() + self.negative_store.get_total_count()
    }

    /// True iff no values have been added.
    pub fn get_is_empty(&self) -> bool {
        self.get_count() == 0.0
    }

    /// An estimate of the sum of all added values, weighted by bucket representative value.
    pub fn get_sum(&self) -> f64 {
        let positive: f64 = self
            .positive_store
            .iter()
            .map(|b| self.mapping.value(b.index) * b.count)
            .sum();
        let negative: f64 = self
            .negative_store
            .iter()
            .map(|b| self.mapping.value(b.index) * b.count)
            .sum();
        positive - negative
    }

    /// The smallest value added, or an error if the sketch is empty.
    ///
    /// # Errors
    /// Returns [`SketchError::Empty`] if no values have been added.
    pub fn get_min(&self) -> Result<f64> {
        if self.get_is_empty() {
            return Err(SketchError::Empty {
                operation: "get_min".to_string(),
            });
        }
        if !self.negative_store.is_empty() {
            let idx = self.negative_store.get_max_index()?;
            return Ok(-self.mapping.value(idx));
        }
        if self.zero_count > 0.0 {
            return Ok(0.0);
        }
        let idx = self.positive_store.get_min_index()?;
        Ok(self.mapping.value(idx))
    }

    /// The largest value added, or an error if the sketch is empty.
    ///
    /// # Errors
    /// Returns [`SketchError::Empty`] if no values have been added.
    pub fn get_max(&self) -> Result<f64> {
        if self.get_is_empty() {
            return Err(SketchError::Empty {
                operation: "get_max".to_string(),
            });
        }
        if !self.positive_store.is_empty() {
            let idx = self.positive_store.get_max_index()?;
            return Ok(self.mapping.value(idx));
        }
        if self.zero_count > 0.0 {
            return Ok(0.0);
        }
        let idx = self.negative_store.get_min_index()?;
        Ok(-self.mapping.value(idx))
    }

    /// The fraction of added values at or below `x`.
    ///
    /// # Errors
    /// Returns [`SketchError::Empty`] if no values have been added.
    pub fn get_rank(&self, x: f64) -> Result<f64> {
        let total = self.get_count();
        if total == 0.0 {
            return Err(SketchError::Empty {
                operation: "get_rank".to_string(),
            });
        }
        let count = if x >= 0.0 {
            let negative_mass = self.negative_store.get_total_count();
            let zero_mass = self.zero_count;
            let positive_mass: f64 = self
                .positive_store
                .iter()
                .filter(|b| self.mapping.value(b.index) <= x)
                .map(|b| b.count)
                .sum();
            negative_mass + zero_mass + positive_mass
        } else {
            self.negative_store
                .iter()
                .filter(|b| -self.mapping.value(b.index) <= x)
                .map(|b| b.count)
                .sum()
        };
        Ok(count / total)
    }

    /// The value at rank `q` (a fraction in `[0, 1]`).
    ///
    /// # Errors
    /// Returns [`SketchError::InvalidArgument`] if `q` is outside `[0, 1]`, or
    /// [`SketchError::Empty`] if the sketch has no values.
    pub fn get_quantile(&self, q: f64) -> Result<f64> {
        validate_rank(q)?;
        let n = self.get_count();
        if n == 0.0 {
            return Err(SketchError::Empty {
                operation: "get_quantile".to_string(),
            });
        }
        let rank = q * (n - 1.0);
        let mut remaining = rank;

        for bin in self.negative_store.rev_iter() {
            if remaining < bin.count {
                return Ok(-self.mapping.value(bin.index));
            }
            remaining -= bin.count;
        }
        if remaining < self.zero_count {
            return Ok(0.0);
        }
        remaining -= self.zero_count;
        for bin in self.positive_store.iter() {
            if remaining < bin.count {
                return Ok(self.mapping.value(bin.index));
            }
            remaining -= bin.count;
        }
        self.get_max()
    }

    fn write_preamble_and_body(&self, buf: &mut Vec<u8>) {
        serde::write_u8(buf, FAMILY_ID);
        serde::write_u8(buf, SERIAL_VERSION);
        let flags: u8 = if self.get_is_empty() { 1 } else { 0 };
        serde::write_u8(buf, flags);
        serde::write_u8(buf, self.mapping.layout() as u8);
        serde::write_f64(buf, self.mapping.relative_accuracy());
        serde::write_u8(buf, self.store_kind as u8);
        serde::write_u32(buf, self.max_num_bins);
        serde::write_f64(buf, self.zero_count);
        Self::write_store(buf, &self.positive_store);
        Self::write_store(buf, &self.negative_store);
    }

    fn write_store(buf: &mut Vec<u8>, store: &Store) {
        let bins: Vec<store::Bin> = store.iter().collect();
        serde::write_u32(buf, bins.len() as u32);
        for bin in bins {
            serde::write_i32(buf, bin.index);
            serde::write_f64(buf, bin.count);
        }
    }

    fn read_store(cursor: &mut Cursor, kind: StoreKind, max_num_bins: u32) -> Result<Store> {
        let count = cursor.read_u32()? as usize;
        let mut store = Store::new(kind, max_num_bins);
        for _ in 0..count {
            let index = cursor.read_i32()?;
            let weight = cursor.read_f64()?;
            store.add(index, weight);
        }
        Ok(store)
    }
}

impl Sketch for DDSketch {
    type Item = f64;

    fn update(&mut self, item: &f64) {
        let _ = DDSketch::update(self, *item, 1.0);
    }

    fn estimate(&self) -> f64 {
        self.get_count()
    }

    fn is_empty(&self) -> bool {
        self.get_is_empty()
    }

    fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.write_preamble_and_body(&mut buf);
        buf
    }

    fn deserialize(bytes: &[u8]) -> std::result::Result<Self, SketchError> {
        validate_byte_size(bytes.len())?;
        validate_min_size(bytes.len(), 4)?;
        let mut cursor = Cursor::new(bytes);
        let family_id = cursor.read_u8()?;
        if family_id != FAMILY_ID {
            return Err(SketchError::CorruptInput {
                reason: format!("expected DDSketch family id {FAMILY_ID}, got {family_id}"),
            });
        }
        let ser_ver = cursor.read_u8()?;
        if ser_ver != SERIAL_VERSION {
            return Err(SketchError::CorruptInput {
                reason: format!("unsupported DDSketch serial version {ser_ver}"),
            });
        }
        let _flags = cursor.read_u8()?;
        let layout = IndexMappingLayout::from_u8(cursor.read_u8()?)?;
        let relative_accuracy = cursor.read_f64()?;
        let mapping = match layout {
            IndexMappingLayout::Log => IndexMapping::log(relative_accuracy)?,
            IndexMappingLayout::LogLinear => IndexMapping::log_linear(relative_accuracy)?,
            IndexMappingLayout::LogQuadratic => IndexMapping::log_quadratic(relative_accuracy)?,
            IndexMappingLayout::LogQuartic => IndexMapping::log_quartic(relative_accuracy)?,
        };
        let store_kind = StoreKind::from_u8(cursor.read_u8()?)?;
        let max_num_bins = cursor.read_u32()?;
        let zero_count = cursor.read_f64()?;
        let positive_store = Self::read_store(&mut cursor, store_kind, max_num_bins)?;
        let negative_store = Self::read_store(&mut cursor, store_kind, max_num_bins)?;
        Ok(DDSketch {
            mapping,
            positive_store,
            negative_store,
            zero_count,
            store_kind,
            max_num_bins,
        })
    }
}

impl Mergeable for DDSketch {
    fn merge(&mut self, other: &Self) -> Result<()> {
        if self.mapping.layout() != other.mapping.layout()
            || (self.mapping.gamma_value() - other.mapping.gamma_value()).abs() > 1e-12
        {
            return Err(SketchError::IncompatibleMapping);
        }
        self.zero_count += other.zero_count;
        self.positive_store.merge(&other.positive_store);
        self.negative_store.merge(&other.negative_store);
        Ok(())
    }
}
