use async_trait::async_trait;

use crate::{
	chord::message::{Hop, Request, Response},
	chord_id::ChordId,
	error::{Error, Result},
	node::NodeDescriptor,
	store::Value,
};


pub mod tcp_adaptor;
pub mod memory_adaptor;

/// Carries requests from one node to another.
///
/// An adaptor must give request/response semantics with a bounded wait and
/// report a dead or silent peer as [Error::PeerUnreachable].
#[async_trait]
pub trait ChordAdaptor: Send + Sync + 'static {
	/// Sends one request to the node listening at `addr` and waits for its answer.
	async fn call(&self, addr: &str, request: Request) -> Result<Response>;
}

/// Typed view of a remote node, built on top of an adaptor.
pub struct RemotePeer<'a, A: ?Sized> {
	adaptor: &'a A,
	addr: &'a str,
}

impl<'a, A: ChordAdaptor + ?Sized> RemotePeer<'a, A> {
	pub fn new(adaptor: &'a A, addr: &'a str) -> Self {
		RemotePeer { adaptor, addr }
	}

	pub fn addr(&self) -> &str {
		self.addr
	}

	async fn call(&self, request: Request) -> Result<Response> {
		self.adaptor.call(self.addr, request).await
	}

	pub async fn find_successor(&self, id: ChordId) -> Result<NodeDescriptor> {
		match self.call(Request::FindSuccessor { id }).await? {
			Response::Node(node) => Ok(node),
			other => Err(unexpected(other)),
		}
	}

	pub async fn route_step(&self, id: ChordId) -> Result<Hop> {
		match self.call(Request::RouteStep { id }).await? {
			Response::Step(hop) => Ok(hop),
			other => Err(unexpected(other)),
		}
	}

	pub async fn get_predecessor(&self) -> Result<Option<NodeDescriptor>> {
		match self.call(Request::GetPredecessor).await? {
			Response::Predecessor(pred) => Ok(pred),
			other => Err(unexpected(other)),
		}
	}

	pub async fn get_successor(&self) -> Result<NodeDescriptor> {
		match self.call(Request::GetSuccessor).await? {
			Response::Node(node) => Ok(node),
			other => Err(unexpected(other)),
		}
	}

	pub async fn ping(&self) -> Result<()> {
		match self.call(Request::Ping).await? {
			Response::Pong => Ok(()),
			other => Err(unexpected(other)),
		}
	}

	pub async fn join(&self, bootstrap: NodeDescriptor) -> Result<()> {
		self.ack(Request::Join { bootstrap }).await
	}

	pub async fn stabilize(&self) -> Result<()> {
		self.ack(Request::Stabilize).await
	}

	/// Returns the keys the peer handed over when it accepted us as its predecessor.
	pub async fn notify(&self, candidate: NodeDescriptor) -> Result<Vec<(ChordId, Value)>> {
		match self.call(Request::Notify { candidate }).await? {
			Response::Keys(keys) => Ok(keys),
			Response::Ack => Ok(Vec::new()),
			other => Err(unexpected(other)),
		}
	}

	pub async fn set_successor(&self, node: NodeDescriptor) -> Result<()> {
		self.ack(Request::SetSuccessor { node }).await
	}

	pub async fn set_predecessor(&self, node: Option<NodeDescriptor>) -> Result<()> {
		self.ack(Request::SetPredecessor { node }).await
	}

	pub async fn put(&self, key: ChordId, value: Value) -> Result<()> {
		self.ack(Request::Put { key, value }).await
	}

	pub async fn get(&self, key: ChordId) -> Result<Value> {
		match self.call(Request::Get { key }).await? {
			Response::Value(value) => Ok(value),
			other => Err(unexpected(other)),
		}
	}

	pub async fn transfer_keys_below(&self, boundary: ChordId) -> Result<Vec<(ChordId, Value)>> {
		match self.call(Request::TransferKeysBelow { boundary }).await? {
			Response::Keys(keys) => Ok(keys),
			other => Err(unexpected(other)),
		}
	}

	pub async fn debug(&self) -> Result<String> {
		match self.call(Request::Debug).await? {
			Response::Debug(msg) => Ok(msg),
			other => Err(unexpected(other)),
		}
	}

	async fn ack(&self, request: Request) -> Result<()> {
		match self.call(request).await? {
			Response::Ack => Ok(()),
			other => Err(unexpected(other)),
		}
	}
}

/// Turns an answer that does not match the request back into an error.
fn unexpected(response: Response) -> Error {
	match response {
		Response::NotFound(key) => Error::NotFound(key),
		Response::Unreachable { addr, reason } => Error::PeerUnreachable { addr, reason },
		Response::Error(msg) => Error::Remote(msg),
		other => Error::UnexpectedResponse(format!("{:?}", other)),
	}
}
