use serde::{Serialize, Deserialize};

use crate::{chord_id::ChordId, node::NodeDescriptor, store::Value};


/// Operations a node exposes to its peers and clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Request {
	// Lookup
	FindSuccessor{id: ChordId},
	RouteStep{id: ChordId},

	// State Operations
	GetPredecessor,
	GetSuccessor,
	Ping,

	// Membership
	Join{bootstrap: NodeDescriptor},
	Stabilize,
	Notify{candidate: NodeDescriptor},
	SetSuccessor{node: NodeDescriptor},
	SetPredecessor{node: Option<NodeDescriptor>},

	// Storage
	Put{key: ChordId, value: Value},
	Get{key: ChordId},
	TransferKeysBelow{boundary: ChordId},

	// Other
	Debug,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Response {
	Ack,
	Pong,
	Node(NodeDescriptor),
	Predecessor(Option<NodeDescriptor>),
	Step(Hop),
	Value(Value),
	Keys(Vec<(ChordId, Value)>),
	NotFound(ChordId),
	/// A peer further down the lookup could not be reached.
	Unreachable{addr: String, reason: String},
	Debug(String),
	Error(String),
}

/// The outcome of asking one node for one routing step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Hop {
	/// The node answering knows the successor of the id.
	Done(NodeDescriptor),
	/// Ask this node next.
	Forward(NodeDescriptor),
}
