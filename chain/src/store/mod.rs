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

//! The persistence primitive of the consensus set: a transactional
//! bucket-oriented key/value store with single-writer/multi-reader
//! semantics. Every consensus mutation for a block happens inside one
//! write transaction and commits atomically, or not at all.
//!
//! Two implementations exist: `RedbStore`, the disk-backed store used
//! in production, and `MemStore`, a BTreeMap store for tests.

pub mod mem;
pub mod redb;

pub use self::mem::MemStore;
pub use self::redb::RedbStore;

/// Errors surfaced by a store backend.
#[derive(Clone, Debug, PartialEq, Fail)]
pub enum Error {
	/// Any backend failure; consensus treats these as fatal.
	#[fail(display = "store error: {}", _0)]
	Db(String),
}

/// The buckets the consensus set keeps. Delayed outputs and contract
/// expirations key their entries by a big-endian height prefix, so
/// byte-sorted iteration visits them in height order.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Bucket {
	/// height -> block id, the canonical chain.
	BlockPath,
	/// block id -> processed block, every block ever seen.
	BlockMap,
	/// coin output id -> coin output, the live UTXO set.
	CoinOutputs,
	/// file contract id -> contract, the live contracts.
	FileContracts,
	/// fund output id -> fund output, the live fund shares.
	FundOutputs,
	/// height || coin output id -> coin output, outputs maturing at
	/// that height.
	DelayedCoinOutputs,
	/// height || contract id -> (), contracts expiring at that height.
	FileContractExpirations,
	/// height -> (primary, failsafe), Foundation unlock hashes replaced
	/// at that height.
	FoundationUnlockHashes,
	/// sequence -> change entry, the consensus change log.
	ChangeLog,
	/// change id -> sequence, index into the change log.
	ChangeIndex,
	/// Singletons: current height, fund pool, Foundation addresses,
	/// change-log tail.
	Meta,
}

impl Bucket {
	/// The bucket's name in the underlying store.
	pub fn name(&self) -> &'static str {
		match self {
			Bucket::BlockPath => "block_path",
			Bucket::BlockMap => "block_map",
			Bucket::CoinOutputs => "coin_outputs",
			Bucket::FileContracts => "file_contracts",
			Bucket::FundOutputs => "fund_outputs",
			Bucket::DelayedCoinOutputs => "dsco",
			Bucket::FileContractExpirations => "fcex",
			Bucket::FoundationUnlockHashes => "foundation_unlock_hashes",
			Bucket::ChangeLog => "change_log",
			Bucket::ChangeIndex => "change_index",
			Bucket::Meta => "meta",
		}
	}

	/// Every bucket, in a fixed order.
	pub const ALL: [Bucket; 11] = [
		Bucket::BlockPath,
		Bucket::BlockMap,
		Bucket::CoinOutputs,
		Bucket::FileContracts,
		Bucket::FundOutputs,
		Bucket::DelayedCoinOutputs,
		Bucket::FileContractExpirations,
		Bucket::FoundationUnlockHashes,
		Bucket::ChangeLog,
		Bucket::ChangeIndex,
		Bucket::Meta,
	];
}

/// Read access to a consistent snapshot of the store.
pub trait ReadTx {
	/// Reads the value at `key`, if any.
	fn get(&self, bucket: Bucket, key: &[u8]) -> Result<Option<Vec<u8>>, Error>;

	/// Visits every pair of the bucket in byte-sorted key order.
	fn for_each(
		&self,
		bucket: Bucket,
		visit: &mut dyn FnMut(&[u8], &[u8]) -> Result<(), Error>,
	) -> Result<(), Error>;

	/// Visits every pair whose key starts with `prefix`, in byte-sorted
	/// key order.
	fn for_each_prefix(
		&self,
		bucket: Bucket,
		prefix: &[u8],
		visit: &mut dyn FnMut(&[u8], &[u8]) -> Result<(), Error>,
	) -> Result<(), Error>;
}

/// A write transaction. Dropping it without `commit` aborts every
/// change made through it.
pub trait WriteTx: ReadTx {
	/// Sets `key` to `value`.
	fn put(&mut self, bucket: Bucket, key: &[u8], value: &[u8]) -> Result<(), Error>;

	/// Removes `key`. Removing an absent key is not an error at this
	/// layer; callers check existence where it matters.
	fn delete(&mut self, bucket: Bucket, key: &[u8]) -> Result<(), Error>;

	/// Atomically publishes every change made through this transaction.
	fn commit(self: Box<Self>) -> Result<(), Error>;
}

/// A store holding the consensus buckets. One writer at a time; readers
/// see committed snapshots.
pub trait KvStore: Send + Sync {
	/// Opens a read snapshot.
	fn begin_read<'a>(&'a self) -> Result<Box<dyn ReadTx + 'a>, Error>;

	/// Opens the single write transaction. Blocks while another write
	/// transaction is open.
	fn begin_write<'a>(&'a self) -> Result<Box<dyn WriteTx + 'a>, Error>;
}
