use chrono::Utc;
use rand::Rng;
use tracing::{debug, info, instrument, warn};

use crate::{
	adaptor::ChordAdaptor,
	config::FingerRefresh,
	error::{Error, Result},
	finger_table::FingerTable,
	node::NodeDescriptor,
};

use super::{ChordNode, ring_node::Membership};


impl<A: ChordAdaptor> ChordNode<A> {

	/// Starts a new ring with this node as its only member.
	pub fn host(&self) -> Result<()> {
		info!("{} hosting a new ring", self.me);
		self.lock_state()?.membership = Membership::Joined;
		Ok(())
	}

	/// Joins the ring that `bootstrap` belongs to: adopt the successor it
	/// finds for us, then pull the keys we now own from that successor.
	#[instrument(skip(self), fields(node = %self.me.id))]
	pub async fn join(&self, bootstrap: &NodeDescriptor) -> Result<()> {
		if bootstrap.addr == self.me.addr {
			return Err(Error::Configuration(format!("{} cannot join through itself", self.me)));
		}

		let successor = self.peer(bootstrap).find_successor(self.me.id).await?;
		if successor == self.me && successor.addr != self.me.addr {
			return Err(Error::Configuration(format!(
				"id {} is already taken by {}", self.me.id, successor.addr
			)));
		}

		{
			let mut state = self.lock_state()?;
			state.set_successor(successor.clone());
			state.membership = Membership::Joined;
		}
		info!("joined through {}, successor is {}", bootstrap, successor);

		if successor == self.me {
			return Ok(());
		}
		let keys = self.peer(&successor).transfer_keys_below(self.me.id).await?;
		if !keys.is_empty() {
			info!("took over {} keys from {}", keys.len(), successor);
			self.lock_state()?.store.extend(keys);
		}
		Ok(())
	}

	/// Stabilize routine:
	/// 1. ask the successor for its predecessor
	/// 2. if that node sits between us and the successor, it becomes the successor
	/// 3. notify the (possibly new) successor about us and keep the keys it hands back
	#[instrument(skip(self), fields(node = %self.me.id))]
	pub async fn stabilize(&self) -> Result<()> {
		let (successor, local_predecessor) = {
			let state = self.lock_state()?;
			(state.successor.clone(), state.predecessor.clone())
		};

		let candidate = if successor == self.me {
			local_predecessor
		} else {
			match self.peer(&successor).get_predecessor().await {
				Ok(pred) => pred,
				Err(e) => {
					if e.is_unreachable() {
						warn!("successor {} did not answer: {}", successor, e);
						self.evict(&successor)?;
					}
					return Err(e);
				},
			}
		};

		let successor = {
			let mut state = self.lock_state()?;
			if let Some(candidate) = candidate {
				let closer = candidate.id.is_between_exclusive(&self.me.id, &state.successor.id);
				// a node alone on its ring attaches to whoever announced itself
				let alone = state.successor == self.me;
				if candidate != self.me && (closer || alone) {
					info!("successor is now {}", candidate);
					state.set_successor(candidate);
				}
			}
			state.last_stabilized = Some(Utc::now());
			state.successor.clone()
		};

		if successor != self.me {
			let keys = self.peer(&successor).notify(self.me.clone()).await?;
			if !keys.is_empty() {
				info!("took over {} keys from {}", keys.len(), successor);
				self.lock_state()?.store.extend(keys);
			}
		}
		Ok(())
	}

	/// Recomputes finger slots through the lookup engine.
	/// Returns how many entries changed.
	#[instrument(skip(self), fields(node = %self.me.id))]
	pub async fn fix_fingers(&self) -> Result<usize> {
		let size = self.space.bits() as usize;
		let indexes: Vec<usize> = match self.config.finger_refresh {
			FingerRefresh::All => (0..size).collect(),
			FingerRefresh::RoundRobin => {
				let mut state = self.lock_state()?;
				let index = state.next_finger % size;
				state.next_finger = (index + 1) % size;
				vec![index]
			},
			FingerRefresh::Random => vec![rand::thread_rng().gen_range(0..size)],
		};

		let mut changed = 0;
		for index in indexes {
			let start = self.space.finger_start(self.me.id, index as u32);
			let node = self.find_successor(start).await?;
			if self.lock_state()?.fingers.set(index, node) {
				changed += 1;
			}
		}
		if changed > 0 {
			debug!("{} fingers changed", changed);
		}
		Ok(changed)
	}

	/// Clears the predecessor if it no longer answers.
	#[instrument(skip(self), fields(node = %self.me.id))]
	pub async fn check_predecessor(&self) -> Result<()> {
		let predecessor = match self.predecessor()? {
			Some(predecessor) => predecessor,
			None => return Ok(()),
		};
		match self.peer(&predecessor).ping().await {
			Ok(()) => Ok(()),
			Err(e) if e.is_unreachable() => {
				info!("predecessor {} failed liveness check: {}", predecessor, e);
				self.evict(&predecessor)
			},
			Err(e) => Err(e),
		}
	}

	/// One maintenance tick. Failures are logged and the remaining steps
	/// still run; the next tick retries.
	pub async fn maintain(&self) {
		if let Err(e) = self.stabilize().await {
			warn!("stabilize skipped: {}", e);
		}
		if let Err(e) = self.fix_fingers().await {
			warn!("fix_fingers skipped: {}", e);
		}
		if self.config.check_predecessor {
			if let Err(e) = self.check_predecessor().await {
				warn!("check_predecessor skipped: {}", e);
			}
		}
	}

	/// Leaves the ring gracefully: every key goes to the successor, then the
	/// neighbours are spliced together. Afterwards the node is alone and unjoined.
	///
	/// If a key cannot be handed over the remaining keys stay here and the
	/// node keeps its place on the ring.
	///
	/// Once the keys are gone the node leaves even if a neighbour misses the
	/// splice; the first such error is returned and stabilization on the
	/// remaining nodes closes the gap.
	#[instrument(skip(self), fields(node = %self.me.id))]
	pub async fn leave(&self) -> Result<()> {
		let (successor, predecessor, entries) = {
			let mut state = self.lock_state()?;
			(state.successor.clone(), state.predecessor.clone(), state.store.drain_all())
		};

		let mut spliced = Ok(());
		if successor == self.me {
			info!("last node on the ring, {} keys are dropped", entries.len());
		} else {
			let peer = self.peer(&successor);
			for (index, (key, value)) in entries.iter().enumerate() {
				if let Err(e) = peer.put(*key, value.clone()).await {
					warn!("handing key {} to {} failed: {}", key, successor, e);
					self.lock_state()?.store.extend(entries[index..].iter().cloned());
					return Err(e);
				}
			}
			info!("handed {} keys to {}", entries.len(), successor);

			if let Some(predecessor) = &predecessor {
				if let Err(e) = self.peer(predecessor).set_successor(successor.clone()).await {
					warn!("predecessor {} missed the splice: {}", predecessor, e);
					spliced = Err(e);
				}
			}
			if let Err(e) = peer.set_predecessor(predecessor.clone()).await {
				warn!("successor {} missed the splice: {}", successor, e);
				spliced = spliced.and(Err(e));
			}
		}

		let mut state = self.lock_state()?;
		state.successor = self.me.clone();
		state.predecessor = None;
		state.fingers = FingerTable::new(self.me.clone(), self.space.bits() as usize);
		state.membership = Membership::Unjoined;
		spliced
	}
}
