use std::time::Duration;

use serde::{Serialize, Deserialize};

use crate::{chord_id::IdSpace, error::{Error, Result}};

/// How many fingers a maintenance tick recomputes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FingerRefresh {
	/// Every slot, every tick.
	All,
	/// The next slot in order, wrapping around.
	RoundRobin,
	/// One slot chosen at random.
	Random,
}

/// Tunables shared by every node of a deployment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChordConfig {
	/// Ring capacity in bits, `m`. Must match across the whole ring.
	pub bits: u32,
	/// Delay between maintenance ticks.
	pub maintenance_interval_ms: u64,
	/// Upper bound on a single remote call.
	pub rpc_timeout_ms: u64,
	pub finger_refresh: FingerRefresh,
	pub check_predecessor: bool,
	/// Lookups give up after this many hops. Defaults to `2 * bits`.
	pub max_lookup_hops: Option<usize>,
}

impl Default for ChordConfig {
	fn default() -> Self {
		ChordConfig {
			bits: 6,
			maintenance_interval_ms: 5_000,
			rpc_timeout_ms: 3_000,
			finger_refresh: FingerRefresh::All,
			check_predecessor: true,
			max_lookup_hops: None,
		}
	}
}

impl ChordConfig {
	pub fn with_bits(bits: u32) -> Self {
		ChordConfig { bits, ..Default::default() }
	}

	/// Checks the configuration, returning the id space it describes.
	pub fn validate(&self) -> Result<IdSpace> {
		let space = IdSpace::new(self.bits)?;
		if self.maintenance_interval_ms == 0 {
			return Err(Error::Configuration("maintenance interval must be positive".to_string()));
		}
		if self.rpc_timeout_ms == 0 {
			return Err(Error::Configuration("rpc timeout must be positive".to_string()));
		}
		if self.max_lookup_hops == Some(0) {
			return Err(Error::Configuration("lookups need at least one hop".to_string()));
		}
		Ok(space)
	}

	pub fn maintenance_interval(&self) -> Duration {
		Duration::from_millis(self.maintenance_interval_ms)
	}

	pub fn rpc_timeout(&self) -> Duration {
		Duration::from_millis(self.rpc_timeout_ms)
	}

	pub fn max_lookup_hops(&self) -> usize {
		self.max_lookup_hops.unwrap_or(2 * self.bits as usize)
	}
}
