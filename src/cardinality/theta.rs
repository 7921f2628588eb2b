//! Theta sketch: a cardinality-estimating open-addressing hash table whose entries are
//! 64-bit hashes below a shrinking sampling threshold `theta`. The only sketch family in
//! this crate supporting set operations (union, intersection, A-not-B) on equal footing.
//!
//! # Examples
//!
//! ```
//! use sketch_core::cardinality::theta::ThetaSketch;
//!
//! let mut a = ThetaSketch::new(12).unwrap();
//! let mut b = ThetaSketch::new(12).unwrap();
//! for i in 0..1000u64 {
//!     a.update_u64(i);
//! }
//! for i in 500..1500u64 {
//!     b.update_u64(i);
//! }
//! assert!((a.estimate() - 1000.0).abs() < 50.0);
//! ```

pub mod setops;

use crate::common::hash::{hash64, hash_f64, hash_i64, hash_str, hash_u64, seed_hash};
use crate::common::serde::{self, Cursor};
use crate::common::validation::{validate_byte_size, validate_lg_k, validate_min_size, validate_p};
use crate::common::{Result, SketchError};

/// The reference implementation's exact-mode threshold: a signed 64-bit max, chosen for
/// cross-library (Java) compatibility.
pub const MAX_THETA: u64 = i64::MAX as u64;
/// The default seed used when a caller doesn't supply one, matching the reference
/// implementation's `DEFAULT_SEED`.
pub const DEFAULT_SEED: u64 = 9001;

const RESIZE_THRESHOLD: f64 = 0.5;
const REBUILD_THRESHOLD: f64 = 15.0 / 16.0;
const MIN_LG_K: u8 = 5;

const UPDATE_FAMILY_ID: u8 = 2;
const COMPACT_FAMILY_ID: u8 = 3;
const UPDATE_SERIAL_VERSION: u8 = 3;
/// Compact sketches are always written in the ULEB128-compressed encoding, which the
/// wire format reserves serial version 4 for (version 3 is the plain fixed-width form).
const COMPACT_SERIAL_VERSION: u8 = 4;

/// Caps how many array slots a single resize adds, expressed as a power-of-two growth
/// factor (`X8` quadruples... octuples the table per resize, up to the nominal cap).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeFactor {
    /// No growth; the table stays at its starting size.
    X1,
    /// Doubles per resize.
    X2,
    /// Quadruples per resize.
    X4,
    /// Octuples per resize (the reference implementation's default).
    X8,
}

impl ResizeFactor {
    fn lg_growth(self) -> u8 {
        match self {
            ResizeFactor::X1 => 0,
            ResizeFactor::X2 => 1,
            ResizeFactor::X4 => 2,
            ResizeFactor::X8 => 3,
        }
    }
}

/// Builds a [`ThetaSketch`] with non-default sizing, pre-sampling, seeding, or growth rate.
#[derive(Debug, Clone)]
pub struct ThetaSketchBuilder {
    lg_k: u8,
    p: f32,
    seed: u64,
    resize_factor: ResizeFactor,
}

impl Default for ThetaSketchBuilder {
    fn default() -> Self {
        ThetaSketchBuilder {
            lg_k: 12,
            p: 1.0,
            seed: DEFAULT_SEED,
            resize_factor: ResizeFactor::X8,
        }
    }
}

impl ThetaSketchBuilder {
    /// Starts a builder with the reference defaults: `lg_k=12`, `p=1.0`, the reference
    /// `DEFAULT_SEED`, and `ResizeFactor::X8`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the nominal entries exponent (`k = 2^lg_k`). Must be in `[5, 26]`.
    pub fn set_lg_k(mut self, lg_k: u8) -> Self {
        self.lg_k = lg_k;
        self
    }

    /// Sets a pre-sampling probability in `(0.0, 1.0]`.
    pub fn set_p(mut self, p: f32) -> Self {
        self.p = p;
        self
    }

    /// Sets the hash seed. Sketches must share a seed to be merged or combined.
    pub fn set_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Sets how aggressively the backing table grows per resize.
    pub fn set_resize_factor(mut self, rf: ResizeFactor) -> Self {
        self.resize_factor = rf;
        self
    }

    /// Builds the sketch.
    ///
    /// # Errors
    /// Returns [`SketchError::InvalidArgument`] if `lg_k` is outside `[5, 26]` or `p` is
    /// outside `(0.0, 1.0]`.
    pub fn build(self) -> Result<ThetaSketch> {
        validate_lg_k(self.lg_k)?;
        validate_p(self.p)?;
        let lg_cur_size = MIN_LG_K.min(self.lg_k);
        let starting_theta = ((self.p as f64) * MAX_THETA as f64).floor() as u64;
        Ok(ThetaSketch {
            lg_cur_size,
            lg_nom_size: self.lg_k,
            table: vec![0u64; 1usize << lg_cur_size],
            num_entries: 0,
            theta: starting_theta,
            p: self.p,
            seed: self.seed,
            resize_factor: self.resize_factor,
        })
    }
}

/// A mutable theta sketch accepting updates.
#[derive(Debug, Clone)]
pub struct ThetaSketch {
    lg_cur_size: u8,
    lg_nom_size: u8,
    table: Vec<u64>,
    num_entries: u32,
    theta: u64,
    p: f32,
    seed: u64,
    resize_factor: ResizeFactor,
}

impl ThetaSketch {
    /// Builds a sketch with `k = 2^lg_k` nominal entries, `p = 1.0`, and the reference
    /// default seed.
    ///
    /// # Errors
    /// Returns [`SketchError::InvalidArgument`] if `lg_k` is outside `[5, 26]`.
    pub fn new(lg_k: u8) -> Result<Self> {
        ThetaSketchBuilder::new().set_lg_k(lg_k).build()
    }

    /// Starts a [`ThetaSketchBuilder`].
    pub fn builder() -> ThetaSketchBuilder {
        ThetaSketchBuilder::new()
    }

    /// The nominal entries exponent.
    pub fn lg_nom_size(&self) -> u8 {
        self.lg_nom_size
    }

    /// The current sampling threshold.
    pub fn theta(&self) -> u64 {
        self.theta
    }

    /// Number of entries currently held (before any pending rebuild).
    pub fn num_entries(&self) -> u32 {
        self.num_entries
    }

    /// The hash seed this sketch was built with.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// The 16-bit fingerprint of this sketch's seed, embedded in every serialized form.
    pub fn seed_hash(&self) -> u16 {
        seed_hash(self.seed)
    }

    /// `true` iff no items have ever been accepted and no pre-sampling has occurred.
    pub fn is_empty(&self) -> bool {
        self.num_entries == 0 && self.theta == MAX_THETA
    }

    fn theta_fraction(&self) -> f64 {
        self.theta as f64 / MAX_THETA as f64
    }

    /// The estimated number of distinct items seen.
    pub fn estimate(&self) -> f64 {
        if self.theta == MAX_THETA {
            return self.num_entries as f64;
        }
        self.num_entries as f64 / self.theta_fraction()
    }

    /// A lower confidence bound at `num_std_dev` standard deviations (1, 2, or 3).
    pub fn lower_bound(&self, num_std_dev: u8) -> f64 {
        if self.theta == MAX_THETA {
            return self.num_entries as f64;
        }
        let est = self.estimate();
        let err = self.std_error(num_std_dev);
        (est - err).max(self.num_entries as f64)
    }

    /// An upper confidence bound at `num_std_dev` standard deviations (1, 2, or 3).
    pub fn upper_bound(&self, num_std_dev: u8) -> f64 {
        if self.theta == MAX_THETA {
            return self.num_entries as f64;
        }
        self.estimate() + self.std_error(num_std_dev)
    }

    fn std_error(&self, num_std_dev: u8) -> f64 {
        let tf = self.theta_fraction();
        if tf <= 0.0 || self.num_entries == 0 {
            return 0.0;
        }
        let est = self.estimate();
        let variance = est * (1.0 - tf) / tf;
        num_std_dev as f64 * variance.sqrt()
    }

    fn mask(&self) -> u64 {
        (1u64 << self.lg_cur_size) - 1
    }

    fn stride_for(&self, hash: u64) -> u64 {
        (((hash >> self.lg_cur_size) & 0x7f) | 1) as u64
    }

    /// Internal accessor used by set operations to read the raw entry array.
    pub(crate) fn entries(&self) -> impl Iterator<Item = u64> + '_ {
        self.table.iter().copied().filter(|&h| h != 0)
    }

    fn internal_update(&mut self, hash: u64) {
        if hash == 0 || hash >= self.theta {
            return;
        }
        let mask = self.mask();
        let mut probe = hash & mask;
        let stride = self.stride_for(hash);
        loop {
            let slot = self.table[probe as usize];
            if slot == hash {
                return;
            }
            if slot == 0 {
                break;
            }
            probe = (probe + stride) & mask;
        }
        self.table[probe as usize] = hash;
        self.num_entries += 1;

        let size = 1u64 << self.lg_cur_size;
        if self.num_entries as f64 > RESIZE_THRESHOLD * size as f64
            && self.lg_cur_size < self.lg_nom_size + 1
        {
            self.resize();
        } else if self.num_entries as f64 >= REBUILD_THRESHOLD * (1u64 << self.lg_nom_size) as f64
        {
            self.rebuild();
        }
    }

    fn resize(&mut self) {
        let growth = self.resize_factor.lg_growth().max(1);
        let new_lg_size = (self.lg_cur_size + growth).min(self.lg_nom_size + 1);
        self.rehash_into(new_lg_size, self.theta);
    }

    /// Finds a new `theta'` such that roughly `2^lg_nom_size` entries survive, drops the
    /// rest, and rehashes survivors into a table sized for the smaller entry count.
    fn rebuild(&mut self) {
        let target = 1usize << self.lg_nom_size;
        let mut values: Vec<u64> = self.table.iter().copied().filter(|&h| h != 0).collect();
        if values.len() <= target {
            return;
        }
        values.sort_unstable();
        let new_theta = values[target];
        self.rehash_into(self.lg_cur_size, new_theta);
    }

    fn rehash_into(&mut self, new_lg_size: u8, new_theta: u64) {
        let survivors: Vec<u64> = self
            .table
            .iter()
            .copied()
            .filter(|&h| h != 0 && h < new_theta)
            .collect();
        self.lg_cur_size = new_lg_size;
        self.theta = new_theta;
        self.table = vec![0u64; 1usize << new_lg_size];
        self.num_entries = 0;
        for h in survivors {
            let mask = self.mask();
            let mut probe = h & mask;
            let stride = self.stride_for(h);
            while self.table[probe as usize] != 0 {
                probe = (probe + stride) & mask;
            }
            self.table[probe as usize] = h;
            self.num_entries += 1;
        }
    }

    /// Forces a rebuild down to at most `2^lg_nom_size` entries.
    pub fn trim(&mut self) {
        if self.num_entries as u64 > 1u64 << self.lg_nom_size {
            self.rebuild();
        }
    }

    /// Updates with raw bytes, hashed directly.
    pub fn update_bytes(&mut self, data: &[u8]) {
        let hash = hash64(data, self.seed) & MAX_THETA;
        self.internal_update(hash);
    }

    /// Updates with a `u64`, widened and hashed.
    pub fn update_u64(&mut self, value: u64) {
        let hash = hash_u64(value, self.seed) & MAX_THETA;
        self.internal_update(hash);
    }

    /// Updates with an `i64`, widened and hashed.
    pub fn update_i64(&mut self, value: i64) {
        let hash = hash_i64(value, self.seed) & MAX_THETA;
        self.internal_update(hash);
    }

    /// Updates with an `f64`, canonicalized then hashed.
    pub fn update_f64(&mut self, value: f64) {
        let hash = hash_f64(value, self.seed) & MAX_THETA;
        self.internal_update(hash);
    }

    /// Updates with a string's UTF-8 bytes.
    pub fn update_str(&mut self, value: &str) {
        let hash = hash_str(value, self.seed) & MAX_THETA;
        self.internal_update(hash);
    }

    /// Produces an immutable, size-compacted snapshot, optionally sorted ascending.
    pub fn compact(&self, ordered: bool) -> CompactThetaSketch {
        let mut entries: Vec<u64> = self.entries().collect();
        if ordered {
            entries.sort_unstable();
        }
        CompactThetaSketch {
            entries,
            theta: self.theta,
            seed_hash: self.seed_hash(),
            is_ordered: ordered,
            is_empty: self.is_empty(),
        }
    }

    /// Serializes the update sketch (family id 2).
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        serde::write_u8(&mut buf, UPDATE_FAMILY_ID);
        serde::write_u8(&mut buf, UPDATE_SERIAL_VERSION);
        serde::write_u8(&mut buf, if self.is_empty() { 1 } else { 0 });
        serde::write_u8(&mut buf, self.lg_cur_size);
        serde::write_u8(&mut buf, self.lg_nom_size);
        serde::write_f32(&mut buf, self.p);
        serde::write_u64(&mut buf, self.seed);
        serde::write_u64(&mut buf, self.theta);
        serde::write_u32(&mut buf, self.num_entries);
        for &h in self.table.iter().filter(|&&h| h != 0) {
            serde::write_u64(&mut buf, h);
        }
        buf
    }

    /// Deserializes an update sketch.
    ///
    /// # Errors
    /// Returns [`SketchError::CorruptInput`] if the preamble is malformed or truncated.
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        validate_byte_size(bytes.len())?;
        validate_min_size(bytes.len(), 2)?;
        let mut cursor = Cursor::new(bytes);
        let family_id = cursor.read_u8()?;
        if family_id != UPDATE_FAMILY_ID {
            return Err(SketchError::CorruptInput {
                reason: format!("expected theta update family id {UPDATE_FAMILY_ID}, got {family_id}"),
            });
        }
        let ser_ver = cursor.read_u8()?;
        if ser_ver != UPDATE_SERIAL_VERSION {
            return Err(SketchError::CorruptInput {
                reason: format!("unsupported theta serial version {ser_ver}"),
            });
        }
        let _is_empty = cursor.read_u8()?;
        let lg_cur_size = cursor.read_u8()?;
        let lg_nom_size = cursor.read_u8()?;
        let p = cursor.read_f32()?;
        let seed = cursor.read_u64()?;
        let theta = cursor.read_u64()?;
        let num_entries = cursor.read_u32()?;
        let mut table = vec![0u64; 1usize << lg_cur_size];
        let mask = (1u64 << lg_cur_size) - 1;
        for _ in 0..num_entries {
            let h = cursor.read_u64()?;
            let stride = (((h >> lg_cur_size) & 0x7f) | 1) as u64;
            let mut probe = h & mask;
            while table[probe as usize] != 0 {
                probe = (probe + stride) & mask;
            }
            table[probe as usize] = h;
        }
        Ok(ThetaSketch {
            lg_cur_size,
            lg_nom_size,
            table,
            num_entries,
            theta,
            p,
            seed,
            resize_factor: ResizeFactor::X8,
        })
    }
}

/// An immutable, size-compacted theta sketch: the result of [`ThetaSketch::compact`] or a
/// set operation's result.
#[derive(Debug, Clone)]
pub struct CompactThetaSketch {
    entries: Vec<u64>,
    theta: u64,
    seed_hash: u16,
    is_ordered: bool,
    is_empty: bool,
}

impl CompactThetaSketch {
    /// An empty, exact-mode compact sketch with the given seed hash.
    pub fn empty(seed_hash: u16) -> Self {
        CompactThetaSketch {
            entries: Vec::new(),
            theta: MAX_THETA,
            seed_hash,
            is_ordered: true,
            is_empty: true,
        }
    }

    /// Builds a compact sketch directly from already-deduplicated entries.
    pub fn from_entries(entries: Vec<u64>, theta: u64, seed_hash: u16, is_ordered: bool) -> Self {
        let is_empty = entries.is_empty() && theta == MAX_THETA;
        CompactThetaSketch {
            entries,
            theta,
            seed_hash,
            is_ordered,
            is_empty,
        }
    }

    /// The retained hash entries.
    pub fn entries(&self) -> &[u64] {
        &self.entries
    }

    /// The sampling threshold at compaction time.
    pub fn theta(&self) -> u64 {
        self.theta
    }

    /// The 16-bit seed fingerprint.
    pub fn seed_hash(&self) -> u16 {
        self.seed_hash
    }

    /// `true` if entries are sorted ascending.
    pub fn is_ordered(&self) -> bool {
        self.is_ordered
    }

    /// `true` iff this sketch holds no entries and was never pre-sampled.
    pub fn is_empty(&self) -> bool {
        self.is_empty
    }

    fn theta_fraction(&self) -> f64 {
        self.theta as f64 / MAX_THETA as f64
    }

    /// The estimated number of distinct items.
    pub fn estimate(&self) -> f64 {
        if self.theta == MAX_THETA {
            return self.entries.len() as f64;
        }
        self.entries.len() as f64 / self.theta_fraction()
    }

    /// Two compact sketches agree bit-for-bit: same `theta`, entry count, seed hash, and
    /// entry multiset.
    pub fn exactly_equal(&self, other: &Self) -> bool {
        if self.theta != other.theta
            || self.entries.len() != other.entries.len()
            || self.seed_hash != other.seed_hash
        {
            return false;
        }
        let mut a = self.entries.clone();
        let mut b = other.entries.clone();
        a.sort_unstable();
        b.sort_unstable();
        a == b
    }

    /// Serializes the compact sketch (family id 3, serial version 4: ULEB128-encoded
    /// entries).
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        serde::write_u8(&mut buf, COMPACT_FAMILY_ID);
        serde::write_u8(&mut buf, COMPACT_SERIAL_VERSION);
        let mut flags = 0u8;
        if self.is_empty {
            flags |= 1;
        }
        if self.is_ordered {
            flags |= 2;
        }
        serde::write_u8(&mut buf, flags);
        serde::write_u16(&mut buf, self.seed_hash);
        serde::write_u64(&mut buf, self.theta);
        serde::write_u32(&mut buf, self.entries.len() as u32);
        for &h in &self.entries {
            serde::write_uleb128(&mut buf, h);
        }
        buf
    }

    /// Deserializes a compact sketch.
    ///
    /// # Errors
    /// Returns [`SketchError::CorruptInput`] if the preamble is malformed or truncated.
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        validate_byte_size(bytes.len())?;
        validate_min_size(bytes.len(), 2)?;
        let mut cursor = Cursor::new(bytes);
        let family_id = cursor.read_u8()?;
        if family_id != COMPACT_FAMILY_ID {
            return Err(SketchError::CorruptInput {
                reason: format!("expected theta compact family id {COMPACT_FAMILY_ID}, got {family_id}"),
            });
        }
        let ser_ver = cursor.read_u8()?;
        if ser_ver != COMPACT_SERIAL_VERSION {
            return Err(SketchError::CorruptInput {
                reason: format!("unsupported theta compact serial version {ser_ver}"),
            });
        }
        let flags = cursor.read_u8()?;
        let is_empty = flags & 1 != 0;
        let is_ordered = flags & 2 != 0;
        let seed_hash = cursor.read_u16()?;
        let theta = cursor.read_u64()?;
        let count = cursor.read_u32()?;
        let mut entries = Vec::with_capacity(count as usize);
        for _ in 0..count {
            entries.push(cursor.read_uleb128()?);
        }
        Ok(CompactThetaSketch {
            entries,
            theta,
            seed_hash,
            is_ordered,
            is_empty,
        })
    }
}
