use std::{collections::HashMap, sync::{Arc, RwLock, Weak}};

use async_trait::async_trait;
use tracing::debug;

use super::ChordAdaptor;
use crate::{
	chord::{ChordNode, message::{Request, Response}},
	config::ChordConfig,
	error::{Error, Result},
	node::NodeDescriptor,
};

type Registry = Arc<RwLock<HashMap<String, Weak<ChordNode<MemoryAdaptor>>>>>;

/// A set of nodes living in one process, reachable by address without any
/// sockets. Calls run the callee's handler directly, so a whole ring can be
/// driven step by step.
#[derive(Clone, Default)]
pub struct MemoryNetwork {
	nodes: Registry,
}

impl MemoryNetwork {
	pub fn new() -> Self {
		Self::default()
	}

	/// An adaptor that reaches the nodes of this network.
	pub fn adaptor(&self) -> MemoryAdaptor {
		MemoryAdaptor { nodes: self.nodes.clone() }
	}

	/// Creates a node attached to this network and makes it reachable.
	pub fn spawn(&self, node: NodeDescriptor, config: ChordConfig) -> Result<Arc<ChordNode<MemoryAdaptor>>> {
		let node = Arc::new(ChordNode::new(node, config, self.adaptor())?);
		self.register(&node)?;
		Ok(node)
	}

	pub fn register(&self, node: &Arc<ChordNode<MemoryAdaptor>>) -> Result<()> {
		let mut nodes = self.nodes.write().map_err(|_| Error::LockPoisoned)?;
		nodes.insert(node.descriptor().addr.clone(), Arc::downgrade(node));
		Ok(())
	}

	/// Makes the node at `addr` unreachable, as if its process had died.
	/// Returns `false` if no such node was registered.
	pub fn crash(&self, addr: &str) -> Result<bool> {
		let mut nodes = self.nodes.write().map_err(|_| Error::LockPoisoned)?;
		Ok(nodes.remove(addr).is_some())
	}
}

#[derive(Clone)]
pub struct MemoryAdaptor {
	nodes: Registry,
}

#[async_trait]
impl ChordAdaptor for MemoryAdaptor {
	async fn call(&self, addr: &str, request: Request) -> Result<Response> {
		let node = {
			let nodes = self.nodes.read().map_err(|_| Error::LockPoisoned)?;
			nodes.get(addr).and_then(Weak::upgrade)
		};
		match node {
			Some(node) => Ok(node.process(request).await),
			None => {
				debug!("no node at {}", addr);
				Err(Error::unreachable(addr, "connection refused"))
			},
		}
	}
}
