use crate::chord_id::ChordId;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by a chord node, its transports and its clients.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
	/// A remote call timed out, was refused or the connection dropped.
	#[error("peer {addr} unreachable: {reason}")]
	PeerUnreachable { addr: String, reason: String },

	/// The key is not held by the queried node.
	#[error("key {0} not found")]
	NotFound(ChordId),

	/// Ring capacity, address or state file problems. Fatal at startup.
	#[error("configuration error: {0}")]
	Configuration(String),

	/// A lookup did not settle within the allowed number of hops.
	#[error("lookup of {id} exhausted after {hops} hops")]
	RoutingExhausted { id: ChordId, hops: usize },

	/// The remote node reported a failure of its own.
	#[error("remote error: {0}")]
	Remote(String),

	/// The remote node answered with a message that does not fit the request.
	#[error("unexpected response: {0}")]
	UnexpectedResponse(String),

	#[error("JSON error: {0}")]
	Codec(#[from] serde_json::Error),

	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),

	#[error("node state lock poisoned")]
	LockPoisoned,
}

impl Error {
	pub(crate) fn unreachable(addr: impl Into<String>, reason: impl ToString) -> Self {
		Error::PeerUnreachable { addr: addr.into(), reason: reason.to_string() }
	}

	/// Returns `true` for failures caused by a peer that could not be reached.
	pub fn is_unreachable(&self) -> bool {
		matches!(self, Error::PeerUnreachable { .. })
	}
}
