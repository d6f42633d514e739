//! A Chord distributed hash table: nodes on an identifier ring that route
//! lookups through finger tables, repair themselves by periodic
//! stabilization and hand keys over as members join and leave.

pub mod chord;
pub use chord::{Chord, ChordHandle, ChordNode};

pub mod adaptor;
pub use adaptor::tcp_adaptor::TCPAdaptor;
pub use adaptor::memory_adaptor::MemoryNetwork;

pub mod associate;
pub use associate::Associate;

pub mod chord_id;
pub use chord_id::{ChordId, IdSpace};

pub mod config;
pub use config::ChordConfig;

pub mod error;
pub use error::{Error, Result};

pub mod finger_table;

pub mod node;
pub use node::NodeDescriptor;

pub mod store;
