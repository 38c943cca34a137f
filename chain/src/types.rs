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

//! Supporting types for the consensus set.

use chrono::Utc;

use uplo_core::core::block::Block;
use uplo_core::core::hash::Hash;
use uplo_core::core::target::{Difficulty, Target};
use uplo_core::ser::{self, Readable, Reader, Writeable, Writer};

use crate::diff::Diff;

/// A block together with everything the consensus set derived while
/// applying it: its height, the cumulative work of its chain, the
/// target its children must meet, the diffs it generated and the state
/// checksum after it was applied.
#[derive(Clone, Debug, PartialEq)]
pub struct ProcessedBlock {
	/// The block itself.
	pub block: Block,
	/// Height of the block.
	pub height: u64,
	/// Cumulative work of the chain ending in this block.
	pub total_work: Difficulty,
	/// The target this block's children must meet.
	pub child_target: Target,
	/// The ordered diffs applying this block generated. Empty for
	/// blocks sitting on a side branch.
	pub diffs: Vec<Diff>,
	/// Consensus checksum after this block was applied; the zero hash
	/// for side-branch blocks.
	pub consensus_checksum: Hash,
}

impl Writeable for ProcessedBlock {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		self.block.write(writer)?;
		writer.write_u64(self.height)?;
		self.total_work.write(writer)?;
		self.child_target.write(writer)?;
		self.diffs.write(writer)?;
		self.consensus_checksum.write(writer)
	}
}

impl Readable for ProcessedBlock {
	fn read(reader: &mut dyn Reader) -> Result<ProcessedBlock, ser::Error> {
		Ok(ProcessedBlock {
			block: Block::read(reader)?,
			height: reader.read_u64()?,
			total_work: Difficulty::read(reader)?,
			child_target: Target::read(reader)?,
			diffs: Vec::read(reader)?,
			consensus_checksum: Hash::read(reader)?,
		})
	}
}

/// The consensus set's view of time, injectable so tests control it.
pub trait Clock: Send + Sync {
	/// Seconds since the epoch.
	fn now(&self) -> u64;
}

/// The wall clock.
pub struct SystemClock;

impl Clock for SystemClock {
	fn now(&self) -> u64 {
		Utc::now().timestamp() as u64
	}
}
