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

//! Blocks and block headers.
//!
//! A block's id is the hash of its header: parent id, nonce, timestamp
//! and the Merkle root over the miner payouts and transactions. Proof of
//! work is the statement that this id, read as a 256-bit number, does
//! not exceed the child target of the parent.

use std::fmt;

use crate::core::currency::Currency;
use crate::core::hash::{DefaultHashable, Hash, Hashed};
use crate::core::target::Target;
use crate::core::transaction::{CoinOutput, CoinOutputID, Transaction};
use crate::crypto::merkle::Tree;
use crate::ser::{self, Readable, Reader, Writeable, Writer};

/// Id of a block: the hash of its header.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default, Serialize, Deserialize)]
pub struct BlockID(pub Hash);

impl BlockID {
	/// Id of miner payout `i` of this block.
	pub fn miner_payout_id(&self, i: u64) -> CoinOutputID {
		CoinOutputID(hash_all!(self.0, i))
	}

	/// Id of the Foundation subsidy output minted at this block, when
	/// the height is a subsidy height.
	pub fn foundation_subsidy_id(&self) -> CoinOutputID {
		CoinOutputID(hash_all!(self.0, crate::core::keys::SPECIFIER_FOUNDATION))
	}
}

impl fmt::Display for BlockID {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl Writeable for BlockID {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		self.0.write(writer)
	}
}

impl Readable for BlockID {
	fn read(reader: &mut dyn Reader) -> Result<BlockID, ser::Error> {
		Ok(BlockID(Hash::read(reader)?))
	}
}

/// The hashed portion of a block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
	/// Hash of the block previous to this in the chain.
	pub parent_id: BlockID,
	/// The nonce ground through while mining.
	pub nonce: [u8; 8],
	/// Timestamp at which the block was built, seconds since the epoch.
	pub timestamp: u64,
	/// Merkle root over the miner payouts and transactions.
	pub merkle_root: Hash,
}

impl DefaultHashable for BlockHeader {}

impl BlockHeader {
	/// The block id this header hashes to.
	pub fn id(&self) -> BlockID {
		BlockID(self.hash())
	}
}

impl Writeable for BlockHeader {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		self.parent_id.write(writer)?;
		writer.write_fixed_bytes(&self.nonce)?;
		writer.write_u64(self.timestamp)?;
		self.merkle_root.write(writer)
	}
}

impl Readable for BlockHeader {
	fn read(reader: &mut dyn Reader) -> Result<BlockHeader, ser::Error> {
		let parent_id = BlockID::read(reader)?;
		let nonce_bytes = reader.read_fixed_bytes(8)?;
		let mut nonce = [0; 8];
		nonce.copy_from_slice(&nonce_bytes[..]);
		let timestamp = reader.read_u64()?;
		let merkle_root = Hash::read(reader)?;
		Ok(BlockHeader {
			parent_id,
			nonce,
			timestamp,
			merkle_root,
		})
	}
}

/// A block: the header fields plus the payouts and transactions the
/// header's Merkle root commits to.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Block {
	/// Hash of the block previous to this in the chain.
	pub parent_id: BlockID,
	/// The nonce ground through while mining.
	pub nonce: [u8; 8],
	/// Timestamp at which the block was built, seconds since the epoch.
	pub timestamp: u64,
	/// Outputs paying the miner the subsidy and the collected fees.
	/// These mature before they can be spent.
	pub miner_payouts: Vec<CoinOutput>,
	/// The transactions applied by this block, in order.
	pub transactions: Vec<Transaction>,
}

impl Block {
	/// The Merkle root over the miner payouts then the transactions,
	/// each pushed as its encoding.
	pub fn merkle_root(&self) -> Hash {
		let mut tree = Tree::new();
		for payout in &self.miner_payouts {
			tree.push(&ser::ser_vec(payout).expect("in-memory serialization"));
		}
		for txn in &self.transactions {
			tree.push(&ser::ser_vec(txn).expect("in-memory serialization"));
		}
		tree.root()
	}

	/// The header of this block.
	pub fn header(&self) -> BlockHeader {
		BlockHeader {
			parent_id: self.parent_id,
			nonce: self.nonce,
			timestamp: self.timestamp,
			merkle_root: self.merkle_root(),
		}
	}

	/// The block id, which is also what the proof of work grinds on.
	pub fn id(&self) -> BlockID {
		self.header().id()
	}

	/// Whether this block's id satisfies the provided target.
	pub fn satisfies_target(&self, target: &Target) -> bool {
		target.meets(&self.id().0)
	}

	/// Sum of all miner fees in all transactions.
	pub fn total_fees(&self) -> Currency {
		let mut total = Currency::zero();
		for txn in &self.transactions {
			for fee in &txn.miner_fees {
				total += fee;
			}
		}
		total
	}

	/// Sum of all miner payout values.
	pub fn miner_payout_sum(&self) -> Currency {
		self.miner_payouts.iter().map(|o| &o.value).sum()
	}

	/// Id of miner payout `i`.
	pub fn miner_payout_id(&self, i: u64) -> CoinOutputID {
		self.id().miner_payout_id(i)
	}

	/// The encoded size of this block in bytes.
	pub fn encoded_len(&self) -> u64 {
		ser::ser_vec(self).expect("in-memory serialization").len() as u64
	}
}

impl Writeable for Block {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		self.parent_id.write(writer)?;
		writer.write_fixed_bytes(&self.nonce)?;
		writer.write_u64(self.timestamp)?;
		self.miner_payouts.write(writer)?;
		self.transactions.write(writer)
	}
}

impl Readable for Block {
	fn read(reader: &mut dyn Reader) -> Result<Block, ser::Error> {
		let parent_id = BlockID::read(reader)?;
		let nonce_bytes = reader.read_fixed_bytes(8)?;
		let mut nonce = [0; 8];
		nonce.copy_from_slice(&nonce_bytes[..]);
		let timestamp = reader.read_u64()?;
		let miner_payouts = Vec::read(reader)?;
		let transactions = Vec::read(reader)?;
		Ok(Block {
			parent_id,
			nonce,
			timestamp,
			miner_payouts,
			transactions,
		})
	}
}
