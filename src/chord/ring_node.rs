use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use tracing::info;

use crate::{
	adaptor::{ChordAdaptor, RemotePeer},
	chord_id::{ChordId, IdSpace},
	config::ChordConfig,
	error::{Error, Result},
	finger_table::FingerTable,
	node::NodeDescriptor,
	store::KeyStore,
};

/// Whether the node has taken its place on a ring yet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Membership {
	Unjoined,
	Joined,
}

/// The mutable part of a node, guarded by a single lock.
#[derive(Debug)]
pub(crate) struct RingState {
	pub successor: NodeDescriptor,
	pub predecessor: Option<NodeDescriptor>,
	pub fingers: FingerTable,
	pub store: KeyStore,
	pub membership: Membership,
	pub next_finger: usize,
	pub last_stabilized: Option<DateTime<Utc>>,
}

impl RingState {
	fn new(me: &NodeDescriptor, bits: u32) -> Self {
		RingState {
			successor: me.clone(),
			predecessor: None,
			fingers: FingerTable::new(me.clone(), bits as usize),
			store: KeyStore::new(),
			membership: Membership::Unjoined,
			next_finger: 0,
			last_stabilized: None,
		}
	}

	/// The successor doubles as the first finger.
	pub fn set_successor(&mut self, node: NodeDescriptor) {
		self.fingers.set(0, node.clone());
		self.successor = node;
	}
}

/// A copy of a node's routing state at one point in time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeSnapshot {
	pub node: NodeDescriptor,
	pub successor: NodeDescriptor,
	pub predecessor: Option<NodeDescriptor>,
	pub fingers: Vec<NodeDescriptor>,
	pub keys: Vec<ChordId>,
	pub membership: Membership,
}

/// One participant of the ring: its fixed identity, its routing state and
/// the adaptor used to reach its peers.
///
/// The state lock is never held while waiting on a peer, so remote calls
/// that arrive during maintenance are served in between.
pub struct ChordNode<A: ChordAdaptor> {
	pub(crate) me: NodeDescriptor,
	pub(crate) space: IdSpace,
	pub(crate) config: ChordConfig,
	pub(crate) adaptor: A,
	state: Mutex<RingState>,
}

impl<A: ChordAdaptor> ChordNode<A> {
	/// Creates an unjoined node that is its own successor.
	pub fn new(me: NodeDescriptor, config: ChordConfig, adaptor: A) -> Result<Self> {
		let space = config.validate()?;
		if !space.contains(me.id) {
			return Err(Error::Configuration(format!(
				"id {} does not fit a {} bit ring", me.id, space.bits()
			)));
		}
		Ok(ChordNode {
			state: Mutex::new(RingState::new(&me, space.bits())),
			me,
			space,
			config,
			adaptor,
		})
	}

	pub fn descriptor(&self) -> &NodeDescriptor {
		&self.me
	}

	pub fn id(&self) -> ChordId {
		self.me.id
	}

	pub fn space(&self) -> &IdSpace {
		&self.space
	}

	pub fn config(&self) -> &ChordConfig {
		&self.config
	}

	pub fn adaptor(&self) -> &A {
		&self.adaptor
	}

	pub(crate) fn lock_state(&self) -> Result<MutexGuard<'_, RingState>> {
		self.state.lock().map_err(|_| Error::LockPoisoned)
	}

	pub(crate) fn peer<'a>(&'a self, node: &'a NodeDescriptor) -> RemotePeer<'a, A> {
		RemotePeer::new(&self.adaptor, &node.addr)
	}

	pub fn successor(&self) -> Result<NodeDescriptor> {
		Ok(self.lock_state()?.successor.clone())
	}

	pub fn predecessor(&self) -> Result<Option<NodeDescriptor>> {
		Ok(self.lock_state()?.predecessor.clone())
	}

	pub fn fingers(&self) -> Result<Vec<NodeDescriptor>> {
		Ok(self.lock_state()?.fingers.entries().to_vec())
	}

	pub fn keys(&self) -> Result<Vec<ChordId>> {
		Ok(self.lock_state()?.store.keys().copied().collect())
	}

	pub fn membership(&self) -> Result<Membership> {
		Ok(self.lock_state()?.membership)
	}

	pub fn is_joined(&self) -> Result<bool> {
		Ok(self.membership()? == Membership::Joined)
	}

	/// Tests if `key` falls in this node's sector (predecessor, self].
	/// Without a predecessor the whole ring is in this sector, at least for the moment.
	pub fn owns(&self, key: &ChordId) -> Result<bool> {
		let state = self.lock_state()?;
		Ok(match &state.predecessor {
			Some(predecessor) => key.is_between(&predecessor.id, &self.me.id),
			None => true,
		})
	}

	pub fn snapshot(&self) -> Result<NodeSnapshot> {
		let state = self.lock_state()?;
		Ok(NodeSnapshot {
			node: self.me.clone(),
			successor: state.successor.clone(),
			predecessor: state.predecessor.clone(),
			fingers: state.fingers.entries().to_vec(),
			keys: state.store.keys().copied().collect(),
			membership: state.membership,
		})
	}

	/// Forgets a peer that failed to answer: its fingers point back at us,
	/// it stops being our predecessor, and if it was our successor the
	/// nearest remaining finger takes over.
	pub(crate) fn evict(&self, dead: &NodeDescriptor) -> Result<()> {
		if *dead == self.me {
			return Ok(());
		}
		let mut state = self.lock_state()?;
		state.fingers.evict(&dead.id);
		if state.predecessor.as_ref() == Some(dead) {
			info!("clearing unreachable predecessor {}", dead);
			state.predecessor = None;
		}
		if state.successor == *dead {
			let replacement = state.fingers.nearest_peer().cloned().unwrap_or_else(|| self.me.clone());
			info!("successor {} unreachable, falling back to {}", dead, replacement);
			state.set_successor(replacement);
		}
		Ok(())
	}

	pub(crate) fn debug_report(&self) -> Result<String> {
		let state = self.lock_state()?;
		let mut msg = String::new();
		// show predecessor/id/successor
		msg = msg + &format!("Id: {} Predecessor: {} Successor: {}\n",
			self.me,
			state.predecessor.as_ref().map(ToString::to_string).unwrap_or_else(|| "none".to_string()),
			state.successor,
		);
		msg = msg + &format!("Membership: {:?}\n", state.membership);
		msg = match state.last_stabilized {
			Some(at) => msg + &format!("Last stabilized: {}\n", at.to_rfc3339()),
			None => msg + "Never stabilized\n",
		};
		msg = msg + "Fingers:\n";
		for (index, finger) in state.fingers.entries().iter().enumerate() {
			let start = self.space.finger_start(self.me.id, index as u32);
			msg = msg + &format!("  {} start {} -> {}\n", index, start, finger);
		}
		msg = msg + &format!("Keys held: {}\n", state.store.len());
		Ok(msg)
	}
}
