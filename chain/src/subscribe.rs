// Copyright 2020 The Uplo Developers
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Consensus change subscriptions.
//!
//! Every committed block (and every reorg) produces exactly one
//! `ConsensusChange`, identified by a hash and recorded in a persistent
//! change log. A subscriber names the last change it has seen and the
//! bus replays everything after it, in order, before going live. Two
//! sentinel ids exist: all zeroes to replay from genesis, and 0x01
//! followed by zeroes to skip replay entirely.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use uplo_core::core::block::{Block, BlockID};
use uplo_core::core::hash::{Hash, HashWriter};
use uplo_core::core::target::Target;
use uplo_core::ser::{self, Readable, Reader, Writeable, Writer};

use crate::diff::Diff;

/// Decode budget for a streamed consensus change: a change spanning a
/// deep reorg carries many full blocks.
pub const CONSENSUS_CHANGE_DECODE_BUDGET: u64 = 100 * 1000 * 1000;

/// Identifies one consensus change.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct ConsensusChangeID(pub Hash);

/// Sentinel: replay every change since genesis.
pub const CONSENSUS_CHANGE_BEGINNING: ConsensusChangeID = ConsensusChangeID(Hash([0; 32]));

/// Sentinel: skip replay and deliver only new changes.
pub const CONSENSUS_CHANGE_RECENT: ConsensusChangeID = ConsensusChangeID(Hash([
	1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
	0,
]));

impl fmt::Display for ConsensusChangeID {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl Writeable for ConsensusChangeID {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		self.0.write(writer)
	}
}

impl Readable for ConsensusChangeID {
	fn read(reader: &mut dyn Reader) -> Result<ConsensusChangeID, ser::Error> {
		Ok(ConsensusChangeID(Hash::read(reader)?))
	}
}

/// The persisted form of one change: which blocks were reverted and
/// which applied. Everything else a subscriber needs is reconstructed
/// from the block map.
#[derive(Clone, Debug, PartialEq)]
pub struct ChangeEntry {
	/// Ids of the reverted blocks, newest first (the revert order).
	pub reverted_blocks: Vec<BlockID>,
	/// Ids of the applied blocks, in apply order.
	pub applied_blocks: Vec<BlockID>,
}

impl ChangeEntry {
	/// The change id: a hash over the entry's position and contents.
	pub fn id(&self, seq: u64) -> ConsensusChangeID {
		let mut hasher = HashWriter::default();
		hasher.write_u64(seq).expect("hash writer");
		self.reverted_blocks
			.write(&mut hasher)
			.expect("hash writer");
		self.applied_blocks.write(&mut hasher).expect("hash writer");
		ConsensusChangeID(hasher.into_hash())
	}
}

impl Writeable for ChangeEntry {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		self.reverted_blocks.write(writer)?;
		self.applied_blocks.write(writer)
	}
}

impl Readable for ChangeEntry {
	fn read(reader: &mut dyn Reader) -> Result<ChangeEntry, ser::Error> {
		Ok(ChangeEntry {
			reverted_blocks: Vec::read(reader)?,
			applied_blocks: Vec::read(reader)?,
		})
	}
}

/// One ordered state transition of the consensus set, as delivered to
/// subscribers and streamed over the wire. Reverts always precede
/// applies; the diff views are the per-block diff lists concatenated in
/// processing order (reverted diffs already inverted for forward
/// application).
#[derive(Clone, Debug, PartialEq)]
pub struct ConsensusChange {
	/// Identifies this change; the next change a subscriber expects.
	pub id: ConsensusChangeID,
	/// Blocks disconnected from the canonical chain, newest first.
	pub reverted_blocks: Vec<Block>,
	/// Blocks connected to the canonical chain, in order.
	pub applied_blocks: Vec<Block>,
	/// Diffs undoing the reverted blocks, in application order.
	pub reverted_diffs: Vec<Diff>,
	/// Diffs of the applied blocks, in application order.
	pub applied_diffs: Vec<Diff>,
	/// The target children of the new tip must meet.
	pub child_target: Target,
	/// The lowest timestamp a child of the new tip may carry.
	pub minimum_valid_child_timestamp: u64,
	/// Whether the consensus set believes it is close to the network
	/// tip.
	pub synced: bool,
}

impl Writeable for ConsensusChange {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		self.id.write(writer)?;
		self.reverted_blocks.write(writer)?;
		self.applied_blocks.write(writer)?;
		self.reverted_diffs.write(writer)?;
		self.applied_diffs.write(writer)?;
		self.child_target.write(writer)?;
		writer.write_u64(self.minimum_valid_child_timestamp)?;
		writer.write_bool(self.synced)
	}
}

impl Readable for ConsensusChange {
	fn read(reader: &mut dyn Reader) -> Result<ConsensusChange, ser::Error> {
		Ok(ConsensusChange {
			id: ConsensusChangeID::read(reader)?,
			reverted_blocks: Vec::read(reader)?,
			applied_blocks: Vec::read(reader)?,
			reverted_diffs: Vec::read(reader)?,
			applied_diffs: Vec::read(reader)?,
			child_target: Target::read(reader)?,
			minimum_valid_child_timestamp: reader.read_u64()?,
			synced: reader.read_bool()?,
		})
	}
}

/// Implemented by modules that track the consensus state. Delivery is
/// synchronous from the processor's thread: long work must be buffered
/// internally.
pub trait ConsensusSetSubscriber: Send {
	/// Processes one consensus change. An error is logged by the bus;
	/// it does not stop delivery to other subscribers.
	fn process_consensus_change(&mut self, change: &ConsensusChange) -> Result<(), failure::Error>;
}

/// A cancellation signal for subscription replay. Cancelling mid-replay
/// leaves the would-be subscriber entirely absent from the bus.
#[derive(Clone)]
pub struct CancelToken {
	cancelled: Arc<AtomicBool>,
}

impl CancelToken {
	/// A token that has not been cancelled.
	pub fn new() -> CancelToken {
		CancelToken {
			cancelled: Arc::new(AtomicBool::new(false)),
		}
	}

	/// Signals cancellation.
	pub fn cancel(&self) {
		self.cancelled.store(true, Ordering::SeqCst);
	}

	/// Whether cancellation was signalled.
	pub fn is_cancelled(&self) -> bool {
		self.cancelled.load(Ordering::SeqCst)
	}
}

impl Default for CancelToken {
	fn default() -> CancelToken {
		CancelToken::new()
	}
}
