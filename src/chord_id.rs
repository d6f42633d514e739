use std::{cmp::Ordering, fmt};

use num_bigint::BigUint;
use serde::{Serialize, Deserialize};

use crate::error::{Error, Result};

/// A ChordId is a point around the chord ring. Values are always reduced
/// into the [IdSpace] of the deployment they belong to.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChordId(pub u64);

impl ChordId {
	pub fn value(&self) -> u64 {
		self.0
	}

	/// Tests if self is in the range (lower, upper], walking clockwise.
	///
	/// When `lower > upper` the range wraps through zero. When both bounds
	/// are equal the range only contains that single point.
	pub fn is_between(&self, lower: &ChordId, upper: &ChordId) -> bool {
		match lower.cmp(upper) {
			Ordering::Less => (self > lower) && (self <= upper),
			Ordering::Equal => self == lower,
			Ordering::Greater => (self > lower) || (self <= upper),
		}
	}

	/// Tests if self is in the open range (lower, upper).
	pub fn is_between_exclusive(&self, lower: &ChordId, upper: &ChordId) -> bool {
		self != upper && self.is_between(lower, upper)
	}
}

impl From<u64> for ChordId {
	fn from(id: u64) -> Self {
		ChordId(id)
	}
}

impl fmt::Display for ChordId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// The identifier space of a ring: every id is smaller than `2^bits`.
///
/// All participants of one deployment must agree on `bits`; a mismatch is a
/// configuration error and is not detected by the protocol.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct IdSpace {
	bits: u32,
}

impl IdSpace {
	pub const MAX_BITS: u32 = 64;

	pub fn new(bits: u32) -> Result<Self> {
		if bits == 0 || bits > Self::MAX_BITS {
			return Err(Error::Configuration(format!(
				"ring capacity must be between 1 and {} bits, got {}", Self::MAX_BITS, bits
			)));
		}
		Ok(IdSpace { bits })
	}

	/// Number of bits, also the number of fingers each node keeps.
	pub fn bits(&self) -> u32 {
		self.bits
	}

	/// Number of distinct identifiers on the ring.
	pub fn capacity(&self) -> u128 {
		1u128 << self.bits
	}

	pub fn contains(&self, id: ChordId) -> bool {
		u128::from(id.0) < self.capacity()
	}

	/// Reduces an arbitrary value onto the ring.
	pub fn id(&self, value: u64) -> ChordId {
		ChordId((u128::from(value) % self.capacity()) as u64)
	}

	/// The point that finger `index` should cover: `(id + 2^index) mod 2^bits`.
	pub fn finger_start(&self, id: ChordId, index: u32) -> ChordId {
		let offset = 1u128 << index;
		ChordId(((u128::from(id.0) + offset) % self.capacity()) as u64)
	}

	/// Hashes a node address or application key onto the ring.
	/// The SHA-1 digest is read as a big-endian integer and reduced modulo `2^bits`.
	pub fn hash(&self, data: &str) -> ChordId {
		let digest = sha1_smol::Sha1::from(data).digest().bytes();
		let modulus = BigUint::from(1u8) << self.bits;
		let reduced = BigUint::from_bytes_be(&digest) % modulus;
		ChordId(reduced.to_u64_digits().first().copied().unwrap_or(0))
	}
}
