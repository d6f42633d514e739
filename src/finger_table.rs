use crate::{chord_id::ChordId, node::NodeDescriptor};

/// Shortcuts around the ring. Slot `i` approximates the successor of
/// `owner.id + 2^i`; empty slots point back at the owner.
#[derive(Clone, Debug)]
pub struct FingerTable {
	owner: NodeDescriptor,
	fingers: Vec<NodeDescriptor>,
}

impl FingerTable {
	pub fn new(owner: NodeDescriptor, size: usize) -> Self {
		FingerTable {
			fingers: vec![owner.clone(); size],
			owner,
		}
	}

	pub fn len(&self) -> usize {
		self.fingers.len()
	}

	pub fn is_empty(&self) -> bool {
		self.fingers.is_empty()
	}

	pub fn get(&self, index: usize) -> Option<&NodeDescriptor> {
		self.fingers.get(index)
	}

	pub fn entries(&self) -> &[NodeDescriptor] {
		&self.fingers
	}

	/// Replaces a slot. Returns `true` if the entry changed.
	pub fn set(&mut self, index: usize, node: NodeDescriptor) -> bool {
		match self.fingers.get_mut(index) {
			Some(slot) => {
				// compare addresses too, a restarted peer may keep its id
				if *slot == node && slot.addr == node.addr {
					return false;
				}
				tracing::debug!("set finger {} to {}", index, node);
				*slot = node;
				true
			},
			None => {
				tracing::error!("set finger index out of range, index: {}", index);
				false
			},
		}
	}

	/// Scans from the farthest finger down and returns the first one that
	/// lies strictly between the owner and `id`. Falls back to the owner.
	pub fn closest_preceding_node(&self, id: &ChordId) -> &NodeDescriptor {
		self.fingers
			.iter()
			.rev()
			.find(|finger| finger.id.is_between_exclusive(&self.owner.id, id))
			.unwrap_or(&self.owner)
	}

	/// Points every slot holding `id` back at the owner.
	/// Returns the number of slots cleared.
	pub fn evict(&mut self, id: &ChordId) -> usize {
		if *id == self.owner.id {
			return 0;
		}
		let mut cleared = 0;
		for slot in self.fingers.iter_mut().filter(|slot| slot.id == *id) {
			*slot = self.owner.clone();
			cleared += 1;
		}
		cleared
	}

	/// The nearest finger that is not the owner, in slot order.
	pub fn nearest_peer(&self) -> Option<&NodeDescriptor> {
		self.fingers.iter().find(|finger| **finger != self.owner)
	}
}


#[cfg(test)]
mod tests {
	use super::*;

	fn node(id: u64) -> NodeDescriptor {
		NodeDescriptor::new(ChordId(id), format!("node-{}", id))
	}

	/// Table of node 5 on a 6 bit ring holding {5, 20, 40}.
	fn table() -> FingerTable {
		let mut table = FingerTable::new(node(5), 6);
		// starts: 6, 7, 9, 13, 21, 37
		for (i, id) in [20, 20, 20, 20, 40, 40].into_iter().enumerate() {
			table.set(i, node(id));
		}
		table
	}

	#[test]
	fn new_table_points_at_owner() {
		let table = FingerTable::new(node(5), 6);
		assert_eq!(table.len(), 6);
		assert!(table.entries().iter().all(|f| *f == node(5)));
		assert_eq!(table.closest_preceding_node(&ChordId(30)), &node(5));
		assert!(table.nearest_peer().is_none());
	}

	#[test]
	fn closest_preceding_prefers_farthest_finger() {
		let table = table();
		assert_eq!(table.closest_preceding_node(&ChordId(30)), &node(20));
		assert_eq!(table.closest_preceding_node(&ChordId(60)), &node(40));
		assert_eq!(table.closest_preceding_node(&ChordId(2)), &node(40));
	}

	#[test]
	fn closest_preceding_excludes_bounds() {
		let table = table();
		// 20 is not strictly before 20
		assert_eq!(table.closest_preceding_node(&ChordId(20)), &node(5));
		assert_eq!(table.closest_preceding_node(&ChordId(10)), &node(5));
		assert_eq!(table.closest_preceding_node(&ChordId(5)), &node(5));
	}

	#[test]
	fn set_reports_changes() {
		let mut table = table();
		assert!(!table.set(0, node(20)));
		assert!(table.set(0, node(12)));
		assert!(!table.set(17, node(12)));
		assert_eq!(table.get(0), Some(&node(12)));
	}

	#[test]
	fn evict_restores_owner() {
		let mut table = table();
		assert_eq!(table.evict(&ChordId(20)), 4);
		assert_eq!(table.nearest_peer(), Some(&node(40)));
		assert_eq!(table.closest_preceding_node(&ChordId(30)), &node(5));
		assert_eq!(table.evict(&ChordId(5)), 0);
	}
}
