#![allow(dead_code)]

use std::sync::Arc;

use chord_dht::{
	adaptor::memory_adaptor::{MemoryAdaptor, MemoryNetwork},
	ChordConfig, ChordId, ChordNode, NodeDescriptor,
};

pub type MemoryNode = Arc<ChordNode<MemoryAdaptor>>;

pub fn init_tracing() {
	let _ = tracing_subscriber::fmt()
		.with_test_writer()
		.with_max_level(tracing::Level::DEBUG)
		.try_init();
}

/// 6 bit ring, the size used in the classic Chord walkthroughs.
pub fn config() -> ChordConfig {
	ChordConfig::with_bits(6)
}

pub fn addr(id: u64) -> String {
	format!("node-{}", id)
}

pub fn node(network: &MemoryNetwork, id: u64, config: &ChordConfig) -> MemoryNode {
	network
		.spawn(NodeDescriptor::new(ChordId(id), addr(id)), config.clone())
		.expect("nodes should be created")
}

/// Hosts a ring at the first id and joins every other id through it.
/// Only successor pointers are repaired; fingers are left to the caller.
pub async fn build_ring(network: &MemoryNetwork, ids: &[u64], config: &ChordConfig) -> Vec<MemoryNode> {
	let nodes: Vec<MemoryNode> = ids.iter().map(|id| node(network, *id, config)).collect();
	nodes[0].host().expect("first node should host");
	for joining in &nodes[1..] {
		joining.join(nodes[0].descriptor()).await.expect("join through the first node");
	}
	stabilize_all(&nodes, 3 * nodes.len()).await;
	nodes
}

pub async fn stabilize_all(nodes: &[MemoryNode], rounds: usize) {
	for _ in 0..rounds {
		for node in nodes {
			node.stabilize().await.expect("stabilize on a healthy ring");
		}
	}
}

pub async fn fix_all(nodes: &[MemoryNode]) -> usize {
	let mut changed = 0;
	for node in nodes {
		changed += node.fix_fingers().await.expect("fix_fingers on a healthy ring");
	}
	changed
}

/// Full maintenance ticks, tolerating failures the way the background task does.
pub async fn maintain_all(nodes: &[MemoryNode], rounds: usize) {
	for _ in 0..rounds {
		for node in nodes {
			node.maintain().await;
		}
	}
}

/// Every node points at its neighbours in sorted id order.
pub fn assert_converged(nodes: &[MemoryNode]) {
	let mut sorted: Vec<&MemoryNode> = nodes.iter().collect();
	sorted.sort_by_key(|node| node.id());
	let count = sorted.len();
	for (index, node) in sorted.iter().enumerate() {
		let next = sorted[(index + 1) % count].descriptor();
		let prev = sorted[(index + count - 1) % count].descriptor();
		assert_eq!(&node.successor().unwrap(), next, "successor of {}", node.descriptor());
		if count > 1 {
			assert_eq!(node.predecessor().unwrap().as_ref(), Some(prev), "predecessor of {}", node.descriptor());
		}
	}
}

/// Each stored key sits on the node whose sector contains it.
pub fn assert_keys_owned(nodes: &[MemoryNode]) {
	for node in nodes {
		for key in node.keys().unwrap() {
			assert!(node.owns(&key).unwrap(), "{} holds {} outside its sector", node.descriptor(), key);
		}
	}
}
