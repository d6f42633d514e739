use std::collections::BTreeMap;

use crate::chord_id::ChordId;

/// Values stored in the ring.
pub type Value = String;

/// Keys held by one node. The ring decides which keys belong here; the
/// store itself never checks ownership.
#[derive(Clone, Debug, Default)]
pub struct KeyStore {
	entries: BTreeMap<ChordId, Value>,
}

impl KeyStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Inserts or overwrites a key, returning the previous value.
	pub fn put(&mut self, key: ChordId, value: Value) -> Option<Value> {
		self.entries.insert(key, value)
	}

	pub fn get(&self, key: &ChordId) -> Option<&Value> {
		self.entries.get(key)
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn keys(&self) -> impl Iterator<Item = &ChordId> {
		self.entries.keys()
	}

	/// Removes and returns every key in the ring range (lower, upper].
	pub fn drain_between(&mut self, lower: &ChordId, upper: &ChordId) -> Vec<(ChordId, Value)> {
		let moving: Vec<ChordId> = self.entries
			.keys()
			.filter(|key| key.is_between(lower, upper))
			.copied()
			.collect();

		moving.into_iter()
			.filter_map(|key| self.entries.remove(&key).map(|value| (key, value)))
			.collect()
	}

	/// Removes and returns everything.
	pub fn drain_all(&mut self) -> Vec<(ChordId, Value)> {
		std::mem::take(&mut self.entries).into_iter().collect()
	}

	pub fn extend(&mut self, entries: impl IntoIterator<Item = (ChordId, Value)>) {
		self.entries.extend(entries);
	}
}
