use std::path::Path;

use serde::{Serialize, Deserialize};
use tokio::fs;

use crate::{adaptor::ChordAdaptor, chord_id::ChordId, config::ChordConfig, error::{Error, Result}};

use super::ChordNode;


/// What a node writes to disk so it can be restarted and rejoin the ring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChordState {
	/// Address advertised to peers. Defaults to the bound listen address.
	#[serde(default)]
	pub node_addr: Option<String>,
	/// Fixed ring position. Defaults to the hash of `node_addr`.
	#[serde(default)]
	pub node_id: Option<ChordId>,
	pub listen_addr: String,

	#[serde(default)]
	pub known_addrs: Vec<String>,
	#[serde(default)]
	pub config: ChordConfig,
}

impl ChordState {
	pub fn new(listen_addr: impl Into<String>, config: ChordConfig) -> Self {
		ChordState {
			node_addr: None,
			node_id: None,
			listen_addr: listen_addr.into(),
			known_addrs: Vec::new(),
			config,
		}
	}

	/// Records a running node: its identity and the peers it currently knows.
	pub fn capture<A: ChordAdaptor>(node: &ChordNode<A>, listen_addr: impl Into<String>) -> Result<Self> {
		let snapshot = node.snapshot()?;
		let mut known_addrs: Vec<String> = Vec::new();
		let peers = std::iter::once(&snapshot.successor)
			.chain(snapshot.predecessor.iter())
			.chain(snapshot.fingers.iter());
		for peer in peers {
			if *peer != snapshot.node && !known_addrs.contains(&peer.addr) {
				known_addrs.push(peer.addr.clone());
			}
		}

		Ok(ChordState {
			node_addr: Some(snapshot.node.addr),
			node_id: Some(snapshot.node.id),
			listen_addr: listen_addr.into(),
			known_addrs,
			config: node.config().clone(),
		})
	}

	pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
		let raw = fs::read_to_string(&path).await.map_err(|e| {
			Error::Configuration(format!("cannot read {}: {}", path.as_ref().display(), e))
		})?;
		let state: ChordState = serde_json::from_str(&raw).map_err(|e| {
			Error::Configuration(format!("invalid state file {}: {}", path.as_ref().display(), e))
		})?;
		state.config.validate()?;
		Ok(state)
	}

	pub async fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
		let raw = serde_json::to_string_pretty(self)?;
		fs::write(path, raw).await?;
		Ok(())
	}
}
