use tracing::{debug, instrument};

use crate::{
	adaptor::{ChordAdaptor, RemotePeer},
	chord_id::{ChordId, IdSpace},
	error::Result,
	node::NodeDescriptor,
	store::Value,
};


/// A client of the ring. It is not a member itself: every operation enters
/// through one known node, which resolves the owner of a key, and the
/// value is then read or written on that owner directly.
pub struct Associate<A: ChordAdaptor> {
	adaptor: A,
	entry: String,
	space: IdSpace,
}

impl<A: ChordAdaptor> Associate<A> {

	pub fn new(adaptor: A, entry: impl Into<String>, space: IdSpace) -> Self {
		let entry = entry.into();
		debug!("creating new associate through {}", entry);
		Associate { adaptor, entry, space }
	}

	pub fn entry(&self) -> &str {
		&self.entry
	}

	/// Position of an application key on the ring.
	pub fn hash(&self, key: &str) -> ChordId {
		self.space.hash(key)
	}

	fn entry_peer(&self) -> RemotePeer<'_, A> {
		RemotePeer::new(&self.adaptor, &self.entry)
	}

	pub async fn successor_of(&self, id: ChordId) -> Result<NodeDescriptor> {
		self.entry_peer().find_successor(id).await
	}

	pub async fn owner_of(&self, key: &str) -> Result<NodeDescriptor> {
		self.successor_of(self.hash(key)).await
	}

	/// Stores `value` under `key`, returning the node that now holds it.
	#[instrument(skip(self, value))]
	pub async fn put(&self, key: &str, value: impl Into<Value>) -> Result<NodeDescriptor> {
		self.put_at(self.hash(key), value.into()).await
	}

	#[instrument(skip(self))]
	pub async fn get(&self, key: &str) -> Result<Value> {
		self.get_at(self.hash(key)).await
	}

	pub async fn put_at(&self, id: ChordId, value: Value) -> Result<NodeDescriptor> {
		let owner = self.successor_of(id).await?;
		RemotePeer::new(&self.adaptor, &owner.addr).put(id, value).await?;
		debug!("stored {} at {}", id, owner);
		Ok(owner)
	}

	pub async fn get_at(&self, id: ChordId) -> Result<Value> {
		let owner = self.successor_of(id).await?;
		RemotePeer::new(&self.adaptor, &owner.addr).get(id).await
	}

	pub async fn predecessor(&self) -> Result<Option<NodeDescriptor>> {
		self.entry_peer().get_predecessor().await
	}

	pub async fn successor(&self) -> Result<NodeDescriptor> {
		self.entry_peer().get_successor().await
	}

	/// Human readable state of the entry node.
	pub async fn debug(&self) -> Result<String> {
		self.entry_peer().debug().await
	}
}
