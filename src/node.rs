use std::{cmp::Ordering, fmt, hash::{Hash, Hasher}};

use serde::{Serialize, Deserialize};

use crate::chord_id::{ChordId, IdSpace};

/// Identity of a ring member: its position on the ring and the address it
/// can be dialed at.
///
/// Descriptors compare by id only. They are never mutated; a stale
/// descriptor is replaced wholesale.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeDescriptor {
	pub id: ChordId,
	pub addr: String,
}

impl NodeDescriptor {
	pub fn new(id: ChordId, addr: impl Into<String>) -> Self {
		NodeDescriptor { id, addr: addr.into() }
	}

	/// Creates a descriptor whose id is the hash of its address.
	pub fn from_addr(space: &IdSpace, addr: impl Into<String>) -> Self {
		let addr = addr.into();
		NodeDescriptor { id: space.hash(&addr), addr }
	}
}

impl PartialEq for NodeDescriptor {
	fn eq(&self, other: &Self) -> bool {
		self.id == other.id
	}
}

impl Eq for NodeDescriptor {}

impl PartialOrd for NodeDescriptor {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl Ord for NodeDescriptor {
	fn cmp(&self, other: &Self) -> Ordering {
		self.id.cmp(&other.id)
	}
}

impl Hash for NodeDescriptor {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.id.hash(state);
	}
}

impl fmt::Display for NodeDescriptor {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}@{}", self.id, self.addr)
	}
}
