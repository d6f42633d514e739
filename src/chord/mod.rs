use crate::{
	adaptor::tcp_adaptor::TCPAdaptor,
	associate::Associate,
	config::ChordConfig,
	chord_id::ChordId,
	error::{Error, Result},
	node::NodeDescriptor,
};

use std::{path::PathBuf, sync::Arc};

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use tracing::{info, warn};


pub mod message;

mod ring_node;
pub use ring_node::{ChordNode, Membership, NodeSnapshot};

pub mod state;
use state::ChordState;

mod private_ops;
mod public_ops;


/// The Chord itself. This struct acts like a builder in that it is created
/// and modified before being consumed by the start method which then
/// returns another type, ChordHandle.
#[derive(Debug)]
pub struct Chord {
	self_addr: Option<String>,
	self_id: Option<ChordId>,
	listen_addr: String,
	join_list: Vec<String>,
	join_or_host: bool,
	config: ChordConfig,
	file_path: Option<PathBuf>,
}

impl Chord {

	/// Creates a new Chord that will listen on `listen_addr`.
	/// Unless set otherwise, the bound address is advertised to peers and
	/// the node id is derived from it.
	pub fn new(listen_addr: impl Into<String>, config: ChordConfig) -> Self {
		Chord {
			self_addr: None,
			self_id: None,
			listen_addr: listen_addr.into(),
			join_list: Vec::new(),
			join_or_host: false,
			config,
			file_path: None,
		}
	}

	/// Create a new chord node from data stored in a file.
	/// Additionally set the chord to save back to this file.
	pub async fn from_file(path: PathBuf) -> Result<Self> {
		let state = ChordState::from_file(&path).await?;

		let mut chord = Chord::new(state.listen_addr, state.config);
		chord.self_addr = state.node_addr;
		chord.self_id = state.node_id;
		chord.set_join_list(state.known_addrs);
		chord.set_file(Some(path));
		Ok(chord)
	}

	/// Set the chord to save its state in a file located at path
	pub fn set_file(&mut self, path: Option<PathBuf>) {
		self.file_path = path;
	}

	/// Set the address advertised to other nodes
	pub fn set_self_addr(&mut self, addr: impl Into<String>) {
		self.self_addr = Some(addr.into());
	}

	/// Fix the ring position instead of hashing the address
	pub fn set_id(&mut self, id: ChordId) {
		self.self_id = Some(id);
	}

	/// Set the chord's listen address
	pub fn set_listen_addr(&mut self, addr: impl Into<String>) {
		self.listen_addr = addr.into();
	}

	/// Set if this chord will default to hosting if the join attempts fail
	pub fn set_join_or_host(&mut self, join_or_host: bool) {
		self.join_or_host = join_or_host;
	}

	/// Give the chord a list of address to try to join when it starts.
	/// If Some Address is passed to start() it will be tried before
	/// these addresses.
	pub fn set_join_list(&mut self, list: Vec<String>) {
		self.join_list = list;
	}

	/// Starts the node. This will take ownership of the Chord and return a ChordHandle.
	///
	/// If passed Some(Address) that address will be prepended to the join list.
	/// If the join list has any elements, the node will try to join each of
	/// them in turn. The first to answer will be used as the bootstrap.
	/// If no address is reachable, the node will not start unless it was
	/// told to host instead.
	/// If the join list is empty, the node will start, implicitly creating a
	/// new chord.
	pub async fn start(mut self, join_addr: Option<String>) -> Result<ChordHandle> {
		let space = self.config.validate()?;

		let listener = TcpListener::bind(&self.listen_addr).await.map_err(|e| {
			Error::Configuration(format!("cannot listen on {}: {}", self.listen_addr, e))
		})?;
		let bound = listener.local_addr()?.to_string();
		let self_addr = self.self_addr.take().unwrap_or_else(|| bound.clone());
		let self_id = self.self_id.unwrap_or_else(|| space.hash(&self_addr));
		let me = NodeDescriptor::new(self_id, self_addr);

		let adaptor = TCPAdaptor::new(self.config.rpc_timeout());
		let node = Arc::new(ChordNode::new(me, self.config.clone(), adaptor)?);

		// Start listener task
		info!("{} listening on {}", node.descriptor(), bound);
		let listener_handle = TCPAdaptor::listen_handler(listener, node.clone());

		let mut join_list = Vec::new();
		if let Some(addr) = join_addr {
			join_list.push(addr);
		}
		join_list.append(&mut self.join_list);

		if join_list.is_empty() {
			node.host()?;
		} else {
			let mut joined = false;
			for addr in join_list.iter() {
				let bootstrap = NodeDescriptor::from_addr(&space, addr.clone());
				match node.join(&bootstrap).await {
					Ok(()) => {
						joined = true;
						break;
					},
					// a taken id or a bad address will not get better with another bootstrap
					Err(e @ Error::Configuration(_)) => {
						listener_handle.abort();
						return Err(e);
					},
					// if the join fails, try next node
					Err(e) => warn!("could not join through {}: {}", addr, e),
				}
			}
			// if after the loop, no join succeeded
			// and not hosting as a fallback, quit
			if !joined {
				if self.join_or_host {
					node.host()?;
				} else {
					listener_handle.abort();
					return Err(Error::unreachable(join_list.join(", "), "no node in the join list could be joined"));
				}
			}
		}

		// Start maintenance task
		let maintenance_node = node.clone();
		let period = self.config.maintenance_interval();
		let file_path = self.file_path.clone();
		let listen_addr = self.listen_addr.clone();
		let maintenance_handle = tokio::spawn(async move {
			let mut interval = interval(period);
			interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
			// the first tick completes immediately
			interval.tick().await;
			loop {
				interval.tick().await;
				maintenance_node.maintain().await;
				if let Some(path) = &file_path {
					let saved = match ChordState::capture(&maintenance_node, listen_addr.clone()) {
						Ok(state) => state.save(path).await,
						Err(e) => Err(e),
					};
					if let Err(e) = saved {
						warn!("failed to save state to {}: {}", path.display(), e);
					}
				}
			}
		});

		Ok(ChordHandle {
			node,
			listener_handle,
			maintenance_handle,
		})
	}
}



/// A ChordHandle represents a connection to a started Chord.
pub struct ChordHandle {
	node: Arc<ChordNode<TCPAdaptor>>,
	listener_handle: JoinHandle<()>,
	maintenance_handle: JoinHandle<()>,
}

impl ChordHandle {
	pub fn node(&self) -> Arc<ChordNode<TCPAdaptor>> {
		self.node.clone()
	}

	pub fn descriptor(&self) -> &NodeDescriptor {
		self.node.descriptor()
	}

	/// Get a client that enters the ring through this node.
	pub fn associate(&self) -> Associate<TCPAdaptor> {
		Associate::new(self.node.adaptor().clone(), self.node.descriptor().addr.clone(), *self.node.space())
	}

	/// Hand all keys to the successor, splice the neighbours together and stop.
	pub async fn leave(self) -> Result<()> {
		self.maintenance_handle.abort();
		let _ = self.maintenance_handle.await;
		let left = self.node.leave().await;
		self.listener_handle.abort();
		let _ = self.listener_handle.await;
		left
	}

	/// Force the chord to stop without telling anyone.
	pub async fn stop(self) {
		self.listener_handle.abort();
		let _ = self.listener_handle.await;
		self.maintenance_handle.abort();
		let _ = self.maintenance_handle.await;
	}
}
