use tracing::{debug, info, instrument, warn};

use crate::{
	adaptor::ChordAdaptor,
	chord_id::ChordId,
	error::{Error, Result},
	node::NodeDescriptor,
	store::Value,
};

use super::{ChordNode, message::{Hop, Request, Response}};


impl<A: ChordAdaptor> ChordNode<A> {

	/// Answers one request from a peer or client.
	#[instrument(skip(self), fields(node = %self.me.id))]
	pub async fn process(&self, request: Request) -> Response {
		let result = match request {
			// Lookup
			Request::FindSuccessor { id } => self.find_successor(id).await.map(Response::Node),
			Request::RouteStep { id } => self.route_step(id).map(Response::Step),

			// State Operations
			Request::GetPredecessor => self.predecessor().map(Response::Predecessor),
			Request::GetSuccessor => self.successor().map(Response::Node),
			Request::Ping => Ok(Response::Pong),

			// Membership
			Request::Join { bootstrap } => self.join(&bootstrap).await.map(|_| Response::Ack),
			Request::Stabilize => self.stabilize().await.map(|_| Response::Ack),
			Request::Notify { candidate } => self.notify(candidate).map(|moved| match moved {
				Some(keys) => Response::Keys(keys),
				None => Response::Ack,
			}),
			Request::SetSuccessor { node } => self.set_successor(node).map(|_| Response::Ack),
			Request::SetPredecessor { node } => self.set_predecessor(node).map(|_| Response::Ack),

			// Storage
			Request::Put { key, value } => self.put(key, value).map(|_| Response::Ack),
			Request::Get { key } => self.get(key).map(Response::Value),
			Request::TransferKeysBelow { boundary } => self.transfer_keys_below(boundary).map(Response::Keys),

			// Other
			Request::Debug => self.debug_report().map(Response::Debug),
		};

		match result {
			Ok(response) => response,
			Err(Error::NotFound(key)) => Response::NotFound(key),
			Err(Error::PeerUnreachable { addr, reason }) => Response::Unreachable { addr, reason },
			Err(e) => {
				warn!("request failed: {}", e);
				Response::Error(e.to_string())
			},
		}
	}

	/// Resolves the node responsible for `id`.
	///
	/// Each hop is a single [route_step](Self::route_step) answered by the
	/// next peer, so the walk happens here rather than as nested calls
	/// across the ring.
	#[instrument(skip(self), fields(node = %self.me.id))]
	pub async fn find_successor(&self, id: ChordId) -> Result<NodeDescriptor> {
		let max_hops = self.config.max_lookup_hops();
		let mut hop = self.route_step(id)?;

		for hops in 0..max_hops {
			let next = match hop {
				Hop::Done(node) => {
					debug!("successor of {} is {} after {} hops", id, node, hops);
					return Ok(node);
				},
				Hop::Forward(next) => next,
			};

			hop = if next == self.me {
				self.route_step(id)?
			} else {
				match self.peer(&next).route_step(id).await {
					Ok(hop) => hop,
					Err(e) => {
						if e.is_unreachable() {
							warn!("lookup of {} failed at {}: {}", id, next, e);
							self.evict(&next)?;
						}
						return Err(e);
					},
				}
			};
		}

		match hop {
			Hop::Done(node) => Ok(node),
			Hop::Forward(_) => Err(Error::RoutingExhausted { id, hops: max_hops }),
		}
	}

	/// One step of a lookup, answered from local state only.
	pub fn route_step(&self, id: ChordId) -> Result<Hop> {
		let state = self.lock_state()?;
		let successor = &state.successor;

		// only node in the ring, or asked about ourselves
		if *successor == self.me || id == self.me.id {
			return Ok(Hop::Done(self.me.clone()));
		}
		if id.is_between(&self.me.id, &successor.id) {
			return Ok(Hop::Done(successor.clone()));
		}

		let closest = state.fingers.closest_preceding_node(&id);
		if *closest == self.me {
			Ok(Hop::Done(successor.clone()))
		} else {
			Ok(Hop::Forward(closest.clone()))
		}
	}

	pub fn closest_preceding_node(&self, id: ChordId) -> Result<NodeDescriptor> {
		Ok(self.lock_state()?.fingers.closest_preceding_node(&id).clone())
	}

	/// Considers `candidate` as a new predecessor.
	///
	/// Returns `None` if it was rejected. Once accepted, the keys in
	/// (old predecessor, candidate] belong to the candidate and are removed
	/// and returned, so keys stored here while the ring was still settling
	/// reach their owner. Without an old predecessor the range starts at us.
	#[instrument(skip(self), fields(node = %self.me.id))]
	pub fn notify(&self, candidate: NodeDescriptor) -> Result<Option<Vec<(ChordId, Value)>>> {
		if candidate == self.me {
			debug!("ignoring self notification");
			return Ok(None);
		}

		let mut state = self.lock_state()?;
		let lower = match &state.predecessor {
			None => self.me.id,
			Some(predecessor) if candidate.id.is_between_exclusive(&predecessor.id, &self.me.id) => predecessor.id,
			Some(_) => return Ok(None),
		};

		info!("predecessor is now {}", candidate);
		let moved = state.store.drain_between(&lower, &candidate.id);
		if !moved.is_empty() {
			info!("handing {} keys in ({}, {}] to {}", moved.len(), lower, candidate.id, candidate);
		}
		state.predecessor = Some(candidate);
		Ok(Some(moved))
	}

	/// Replaces the successor, used when a neighbour leaves the ring.
	pub fn set_successor(&self, node: NodeDescriptor) -> Result<()> {
		info!("successor set to {}", node);
		self.lock_state()?.set_successor(node);
		Ok(())
	}

	/// Replaces the predecessor, used when a neighbour leaves the ring.
	/// Being told that we precede ourselves clears it.
	pub fn set_predecessor(&self, node: Option<NodeDescriptor>) -> Result<()> {
		let node = node.filter(|node| *node != self.me);
		info!("predecessor set to {:?}", node);
		self.lock_state()?.predecessor = node;
		Ok(())
	}

	/// Stores a value locally. Callers are expected to have found the owner first.
	pub fn put(&self, key: ChordId, value: Value) -> Result<()> {
		debug!("storing key {}", key);
		self.lock_state()?.store.put(key, value);
		Ok(())
	}

	pub fn get(&self, key: ChordId) -> Result<Value> {
		self.lock_state()?
			.store
			.get(&key)
			.cloned()
			.ok_or(Error::NotFound(key))
	}

	/// Hands over the keys a node joining at `boundary` now owns: everything
	/// in (predecessor, boundary]. The keys are removed in the same critical
	/// section, so a key is never held by both sides.
	///
	/// Nothing moves if `boundary` does not fall between our predecessor and us.
	pub fn transfer_keys_below(&self, boundary: ChordId) -> Result<Vec<(ChordId, Value)>> {
		let mut state = self.lock_state()?;
		let lower = match &state.predecessor {
			Some(predecessor) => predecessor.id,
			None => self.me.id,
		};
		let eligible = match &state.predecessor {
			Some(predecessor) => boundary.is_between_exclusive(&predecessor.id, &self.me.id),
			None => boundary != self.me.id,
		};
		if !eligible {
			debug!("{} is not in our sector, keeping keys", boundary);
			return Ok(Vec::new());
		}

		let moved = state.store.drain_between(&lower, &boundary);
		info!("transferring {} keys in ({}, {}]", moved.len(), lower, boundary);
		Ok(moved)
	}
}
