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

//! Typed access to the consensus buckets, the consensus checksum, and
//! the invariant checks run after every commit in checked mode.
//!
//! Accessors that create or destroy entries verify the entry's
//! existence first; a violation means the diff machinery or the
//! database is corrupt, not that the caller passed bad input.

use byteorder::{BigEndian, ByteOrder};

use uplo_core::consensus;
use uplo_core::core::block::BlockID;
use uplo_core::core::currency::Currency;
use uplo_core::core::hash::Hash;
use uplo_core::core::keys::UnlockHash;
use uplo_core::core::transaction::{
	CoinOutput, CoinOutputID, FileContract, FileContractID, FundOutput, FundOutputID,
};
use uplo_core::crypto::merkle::Tree;
use uplo_core::global;
use uplo_core::ser::{self, Readable, Writeable};

use crate::error::Error;
use crate::store::{Bucket, ReadTx, WriteTx};
use crate::subscribe::{ChangeEntry, ConsensusChangeID};
use crate::types::ProcessedBlock;

const META_HEIGHT: &[u8] = b"height";
const META_FUND_POOL: &[u8] = b"fund_pool";
const META_FOUNDATION: &[u8] = b"foundation";
const META_CHANGE_TAIL: &[u8] = b"change_tail";

/// Big-endian height key, so byte order is height order.
pub fn height_key(height: u64) -> [u8; 8] {
	let mut key = [0u8; 8];
	BigEndian::write_u64(&mut key, height);
	key
}

fn height_and_id_key(height: u64, id: &Hash) -> Vec<u8> {
	let mut key = Vec::with_capacity(8 + Hash::LEN);
	key.extend_from_slice(&height_key(height));
	key.extend_from_slice(&id.0);
	key
}

fn enc<T: Writeable>(value: &T) -> Result<Vec<u8>, Error> {
	ser::ser_vec(value).map_err(Error::Serialization)
}

fn dec<T: Readable>(bytes: &[u8]) -> Result<T, Error> {
	ser::deserialize_default(&mut &bytes[..]).map_err(Error::Serialization)
}

// --- height and block path ---

/// Current height of the canonical chain.
pub fn get_height<T: ReadTx + ?Sized>(tx: &T) -> Result<u64, Error> {
	let bytes = tx
		.get(Bucket::Meta, META_HEIGHT)?
		.ok_or_else(|| Error::InconsistentState("height not initialized".to_string()))?;
	Ok(BigEndian::read_u64(&bytes))
}

/// Sets the current height.
pub fn set_height(tx: &mut dyn WriteTx, height: u64) -> Result<(), Error> {
	tx.put(Bucket::Meta, META_HEIGHT, &height_key(height))?;
	Ok(())
}

/// Whether the store has been initialized with a genesis block.
pub fn is_initialized<T: ReadTx + ?Sized>(tx: &T) -> Result<bool, Error> {
	Ok(tx.get(Bucket::Meta, META_HEIGHT)?.is_some())
}

/// The canonical block id at `height`, if the path reaches it.
pub fn get_path<T: ReadTx + ?Sized>(tx: &T, height: u64) -> Result<Option<BlockID>, Error> {
	match tx.get(Bucket::BlockPath, &height_key(height))? {
		Some(bytes) => Ok(Some(dec(&bytes)?)),
		None => Ok(None),
	}
}

/// Puts `id` on the canonical path at `height`.
pub fn push_path(tx: &mut dyn WriteTx, height: u64, id: &BlockID) -> Result<(), Error> {
	tx.put(Bucket::BlockPath, &height_key(height), &enc(id)?)?;
	Ok(())
}

/// Removes the canonical path entry at `height`.
pub fn pop_path(tx: &mut dyn WriteTx, height: u64) -> Result<(), Error> {
	tx.delete(Bucket::BlockPath, &height_key(height))?;
	Ok(())
}

// --- processed blocks ---

/// Loads a processed block by id.
pub fn get_processed_block<T: ReadTx + ?Sized>(
	tx: &T,
	id: &BlockID,
) -> Result<Option<ProcessedBlock>, Error> {
	match tx.get(Bucket::BlockMap, &id.0 .0)? {
		Some(bytes) => Ok(Some(dec(&bytes)?)),
		None => Ok(None),
	}
}

/// Stores a processed block under its id.
pub fn put_processed_block(tx: &mut dyn WriteTx, pb: &ProcessedBlock) -> Result<(), Error> {
	tx.put(Bucket::BlockMap, &pb.block.id().0 .0, &enc(pb)?)?;
	Ok(())
}

// --- coin outputs ---

/// Loads a live coin output.
pub fn get_coin_output<T: ReadTx + ?Sized>(
	tx: &T,
	id: &CoinOutputID,
) -> Result<Option<CoinOutput>, Error> {
	match tx.get(Bucket::CoinOutputs, &id.0 .0)? {
		Some(bytes) => Ok(Some(dec(&bytes)?)),
		None => Ok(None),
	}
}

/// Creates a live coin output. The id must be fresh.
pub fn add_coin_output(
	tx: &mut dyn WriteTx,
	id: &CoinOutputID,
	output: &CoinOutput,
) -> Result<(), Error> {
	if tx.get(Bucket::CoinOutputs, &id.0 .0)?.is_some() {
		return Err(Error::InconsistentState(format!(
			"coin output {} created twice",
			id
		)));
	}
	tx.put(Bucket::CoinOutputs, &id.0 .0, &enc(output)?)?;
	Ok(())
}

/// Destroys a live coin output. The id must exist.
pub fn remove_coin_output(tx: &mut dyn WriteTx, id: &CoinOutputID) -> Result<(), Error> {
	if tx.get(Bucket::CoinOutputs, &id.0 .0)?.is_none() {
		return Err(Error::InconsistentState(format!(
			"coin output {} removed twice",
			id
		)));
	}
	tx.delete(Bucket::CoinOutputs, &id.0 .0)?;
	Ok(())
}

// --- file contracts ---

/// Loads a live file contract.
pub fn get_file_contract<T: ReadTx + ?Sized>(
	tx: &T,
	id: &FileContractID,
) -> Result<Option<FileContract>, Error> {
	match tx.get(Bucket::FileContracts, &id.0 .0)? {
		Some(bytes) => Ok(Some(dec(&bytes)?)),
		None => Ok(None),
	}
}

/// Creates a live file contract along with its expiration entry.
pub fn add_file_contract(
	tx: &mut dyn WriteTx,
	id: &FileContractID,
	contract: &FileContract,
) -> Result<(), Error> {
	if tx.get(Bucket::FileContracts, &id.0 .0)?.is_some() {
		return Err(Error::InconsistentState(format!(
			"file contract {} created twice",
			id
		)));
	}
	tx.put(Bucket::FileContracts, &id.0 .0, &enc(contract)?)?;
	tx.put(
		Bucket::FileContractExpirations,
		&height_and_id_key(contract.window_end, &id.0),
		&[],
	)?;
	Ok(())
}

/// Destroys a live file contract along with its expiration entry.
pub fn remove_file_contract(tx: &mut dyn WriteTx, id: &FileContractID) -> Result<(), Error> {
	let contract = get_file_contract(&*tx, id)?.ok_or_else(|| {
		Error::InconsistentState(format!("file contract {} removed twice", id))
	})?;
	tx.delete(Bucket::FileContracts, &id.0 .0)?;
	tx.delete(
		Bucket::FileContractExpirations,
		&height_and_id_key(contract.window_end, &id.0),
	)?;
	Ok(())
}

/// Ids of the contracts whose windows end at `height`.
pub fn expiring_contracts_at<T: ReadTx + ?Sized>(
	tx: &T,
	height: u64,
) -> Result<Vec<FileContractID>, Error> {
	let mut ids = vec![];
	tx.for_each_prefix(
		Bucket::FileContractExpirations,
		&height_key(height),
		&mut |key, _| {
			ids.push(FileContractID(Hash::from_vec(&key[8..])));
			Ok(())
		},
	)?;
	Ok(ids)
}

// --- fund outputs and the pool ---

/// Loads a live fund output.
pub fn get_fund_output<T: ReadTx + ?Sized>(
	tx: &T,
	id: &FundOutputID,
) -> Result<Option<FundOutput>, Error> {
	match tx.get(Bucket::FundOutputs, &id.0 .0)? {
		Some(bytes) => Ok(Some(dec(&bytes)?)),
		None => Ok(None),
	}
}

/// Creates a live fund output. The id must be fresh.
pub fn add_fund_output(
	tx: &mut dyn WriteTx,
	id: &FundOutputID,
	output: &FundOutput,
) -> Result<(), Error> {
	if tx.get(Bucket::FundOutputs, &id.0 .0)?.is_some() {
		return Err(Error::InconsistentState(format!(
			"fund output {} created twice",
			id
		)));
	}
	tx.put(Bucket::FundOutputs, &id.0 .0, &enc(output)?)?;
	Ok(())
}

/// Destroys a live fund output. The id must exist.
pub fn remove_fund_output(tx: &mut dyn WriteTx, id: &FundOutputID) -> Result<(), Error> {
	if tx.get(Bucket::FundOutputs, &id.0 .0)?.is_none() {
		return Err(Error::InconsistentState(format!(
			"fund output {} removed twice",
			id
		)));
	}
	tx.delete(Bucket::FundOutputs, &id.0 .0)?;
	Ok(())
}

/// The current fund pool: the running sum of all contract taxes.
pub fn get_fund_pool<T: ReadTx + ?Sized>(tx: &T) -> Result<Currency, Error> {
	match tx.get(Bucket::Meta, META_FUND_POOL)? {
		Some(bytes) => dec(&bytes),
		None => Ok(Currency::zero()),
	}
}

/// Sets the fund pool.
pub fn set_fund_pool(tx: &mut dyn WriteTx, pool: &Currency) -> Result<(), Error> {
	tx.put(Bucket::Meta, META_FUND_POOL, &enc(pool)?)?;
	Ok(())
}

// --- delayed coin outputs ---

/// Creates a delayed coin output maturing at `maturity_height`.
pub fn add_delayed_coin_output(
	tx: &mut dyn WriteTx,
	maturity_height: u64,
	id: &CoinOutputID,
	output: &CoinOutput,
) -> Result<(), Error> {
	let key = height_and_id_key(maturity_height, &id.0);
	if tx.get(Bucket::DelayedCoinOutputs, &key)?.is_some() {
		return Err(Error::InconsistentState(format!(
			"delayed coin output {} created twice",
			id
		)));
	}
	tx.put(Bucket::DelayedCoinOutputs, &key, &enc(output)?)?;
	Ok(())
}

/// Destroys a delayed coin output.
pub fn remove_delayed_coin_output(
	tx: &mut dyn WriteTx,
	maturity_height: u64,
	id: &CoinOutputID,
) -> Result<(), Error> {
	let key = height_and_id_key(maturity_height, &id.0);
	if tx.get(Bucket::DelayedCoinOutputs, &key)?.is_none() {
		return Err(Error::InconsistentState(format!(
			"delayed coin output {} removed twice",
			id
		)));
	}
	tx.delete(Bucket::DelayedCoinOutputs, &key)?;
	Ok(())
}

/// The delayed outputs maturing exactly at `height`, in id order.
pub fn delayed_outputs_at<T: ReadTx + ?Sized>(
	tx: &T,
	height: u64,
) -> Result<Vec<(CoinOutputID, CoinOutput)>, Error> {
	let mut outputs = vec![];
	let mut decode_err = None;
	tx.for_each_prefix(
		Bucket::DelayedCoinOutputs,
		&height_key(height),
		&mut |key, value| {
			match dec::<CoinOutput>(value) {
				Ok(output) => outputs.push((CoinOutputID(Hash::from_vec(&key[8..])), output)),
				Err(e) => decode_err = Some(e),
			}
			Ok(())
		},
	)?;
	match decode_err {
		Some(e) => Err(e),
		None => Ok(outputs),
	}
}

// --- Foundation unlock hashes ---

/// The current Foundation (primary, failsafe) pair; None before the
/// hardfork block initializes it.
pub fn get_foundation<T: ReadTx + ?Sized>(
	tx: &T,
) -> Result<Option<(UnlockHash, UnlockHash)>, Error> {
	match tx.get(Bucket::Meta, META_FOUNDATION)? {
		Some(bytes) => {
			let mut reader = &bytes[..];
			let pair: FoundationPair =
				ser::deserialize_default(&mut reader).map_err(Error::Serialization)?;
			Ok(Some((pair.primary, pair.failsafe)))
		}
		None => Ok(None),
	}
}

/// Sets the current Foundation pair.
pub fn set_foundation(
	tx: &mut dyn WriteTx,
	primary: &UnlockHash,
	failsafe: &UnlockHash,
) -> Result<(), Error> {
	let pair = FoundationPair {
		primary: *primary,
		failsafe: *failsafe,
	};
	tx.put(Bucket::Meta, META_FOUNDATION, &enc(&pair)?)?;
	Ok(())
}

/// Clears the current Foundation pair (revert of the hardfork block).
pub fn clear_foundation(tx: &mut dyn WriteTx) -> Result<(), Error> {
	tx.delete(Bucket::Meta, META_FOUNDATION)?;
	Ok(())
}

/// Records the pair that was current before an update at `height`.
pub fn put_foundation_snapshot(
	tx: &mut dyn WriteTx,
	height: u64,
	primary: &UnlockHash,
	failsafe: &UnlockHash,
) -> Result<(), Error> {
	let pair = FoundationPair {
		primary: *primary,
		failsafe: *failsafe,
	};
	tx.put(Bucket::FoundationUnlockHashes, &height_key(height), &enc(&pair)?)?;
	Ok(())
}

/// Loads the pair snapshot taken at `height`, if an update happened
/// there.
pub fn get_foundation_snapshot<T: ReadTx + ?Sized>(
	tx: &T,
	height: u64,
) -> Result<Option<(UnlockHash, UnlockHash)>, Error> {
	match tx.get(Bucket::FoundationUnlockHashes, &height_key(height))? {
		Some(bytes) => {
			let pair: FoundationPair = dec(&bytes)?;
			Ok(Some((pair.primary, pair.failsafe)))
		}
		None => Ok(None),
	}
}

/// Removes the snapshot taken at `height`.
pub fn remove_foundation_snapshot(tx: &mut dyn WriteTx, height: u64) -> Result<(), Error> {
	tx.delete(Bucket::FoundationUnlockHashes, &height_key(height))?;
	Ok(())
}

struct FoundationPair {
	primary: UnlockHash,
	failsafe: UnlockHash,
}

impl Writeable for FoundationPair {
	fn write<W: ser::Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		self.primary.write(writer)?;
		self.failsafe.write(writer)
	}
}

impl Readable for FoundationPair {
	fn read(reader: &mut dyn ser::Reader) -> Result<FoundationPair, ser::Error> {
		Ok(FoundationPair {
			primary: UnlockHash::read(reader)?,
			failsafe: UnlockHash::read(reader)?,
		})
	}
}

// --- change log ---

/// Appends a change entry, returning its sequence number.
pub fn append_change(tx: &mut dyn WriteTx, entry: &ChangeEntry) -> Result<u64, Error> {
	let seq = change_count(&*tx)?;
	tx.put(Bucket::ChangeLog, &height_key(seq), &enc(entry)?)?;
	tx.put(
		Bucket::ChangeIndex,
		&entry.id(seq).0 .0,
		&height_key(seq),
	)?;
	tx.put(Bucket::Meta, META_CHANGE_TAIL, &height_key(seq + 1))?;
	Ok(seq)
}

/// Number of entries in the change log.
pub fn change_count<T: ReadTx + ?Sized>(tx: &T) -> Result<u64, Error> {
	match tx.get(Bucket::Meta, META_CHANGE_TAIL)? {
		Some(bytes) => Ok(BigEndian::read_u64(&bytes)),
		None => Ok(0),
	}
}

/// Loads the change entry at `seq`.
pub fn get_change_entry<T: ReadTx + ?Sized>(
	tx: &T,
	seq: u64,
) -> Result<Option<ChangeEntry>, Error> {
	match tx.get(Bucket::ChangeLog, &height_key(seq))? {
		Some(bytes) => Ok(Some(dec(&bytes)?)),
		None => Ok(None),
	}
}

/// Resolves a change id to its sequence number.
pub fn get_change_seq<T: ReadTx + ?Sized>(
	tx: &T,
	id: &ConsensusChangeID,
) -> Result<Option<u64>, Error> {
	Ok(tx
		.get(Bucket::ChangeIndex, &id.0 .0)?
		.map(|bytes| BigEndian::read_u64(&bytes)))
}

// --- consensus checksum ---

/// The consensus checksum: a Merkle root over every key/value pair of
/// the block path, the live outputs and contracts, the fund pool, and
/// the height-prefixed delayed-output and expiration buckets, visited
/// in bucket then key order.
pub fn consensus_checksum<T: ReadTx + ?Sized>(tx: &T) -> Result<Hash, Error> {
	let mut tree = Tree::new();
	let buckets = [
		Bucket::BlockPath,
		Bucket::CoinOutputs,
		Bucket::FileContracts,
		Bucket::FundOutputs,
	];
	for bucket in buckets.iter() {
		let mut pairs: Vec<(Vec<u8>, Vec<u8>)> = vec![];
		tx.for_each(*bucket, &mut |key, value| {
			pairs.push((key.to_vec(), value.to_vec()));
			Ok(())
		})?;
		for (key, value) in pairs {
			tree.push(&key);
			tree.push(&value);
		}
	}
	tree.push(&enc(&get_fund_pool(tx)?)?);
	for bucket in [Bucket::DelayedCoinOutputs, Bucket::FileContractExpirations].iter() {
		let mut pairs: Vec<(Vec<u8>, Vec<u8>)> = vec![];
		tx.for_each(*bucket, &mut |key, value| {
			pairs.push((key.to_vec(), value.to_vec()));
			Ok(())
		})?;
		for (key, value) in pairs {
			tree.push(&key);
			tree.push(&value);
		}
	}
	Ok(tree.root())
}

// --- consistency checks ---

/// Re-derives the conservation invariants from the raw buckets:
/// coin supply, fund supply, delayed-output bounds. Any failure means
/// the database or the diff machinery is corrupt.
pub fn check_consistency<T: ReadTx + ?Sized>(tx: &T, height: u64) -> Result<(), Error> {
	check_fund_supply(tx)?;
	check_delayed_bounds(tx, height)?;
	check_coin_supply(tx, height)?;
	Ok(())
}

fn check_fund_supply<T: ReadTx + ?Sized>(tx: &T) -> Result<(), Error> {
	let mut total = Currency::zero();
	let mut decode_err = None;
	tx.for_each(Bucket::FundOutputs, &mut |_, value| {
		match dec::<FundOutput>(value) {
			Ok(output) => total += output.value,
			Err(e) => decode_err = Some(e),
		}
		Ok(())
	})?;
	if let Some(e) = decode_err {
		return Err(e);
	}
	if total != Currency::from(consensus::TOTAL_FUND_SUPPLY) {
		return Err(Error::InconsistentState(format!(
			"fund supply is {} instead of {}",
			total,
			consensus::TOTAL_FUND_SUPPLY
		)));
	}
	Ok(())
}

fn check_delayed_bounds<T: ReadTx + ?Sized>(tx: &T, height: u64) -> Result<(), Error> {
	let maturity = global::maturity_delay();
	let mut bad: Option<u64> = None;
	tx.for_each(Bucket::DelayedCoinOutputs, &mut |key, _| {
		let h = BigEndian::read_u64(&key[..8]);
		if h <= height || h > height + maturity {
			bad = Some(h);
		}
		Ok(())
	})?;
	if let Some(h) = bad {
		return Err(Error::InconsistentState(format!(
			"delayed bucket at height {} outside ({}, {}]",
			h,
			height,
			height + maturity
		)));
	}

	// every matured-block bucket must hold at least that block's coinbase
	let mut sums: Vec<(u64, Currency)> = vec![];
	let mut decode_err = None;
	tx.for_each(Bucket::DelayedCoinOutputs, &mut |key, value| {
		let h = BigEndian::read_u64(&key[..8]);
		match dec::<CoinOutput>(value) {
			Ok(output) => match sums.last_mut() {
				Some((last_h, sum)) if *last_h == h => *sum += output.value,
				_ => sums.push((h, output.value)),
			},
			Err(e) => decode_err = Some(e),
		}
		Ok(())
	})?;
	if let Some(e) = decode_err {
		return Err(e);
	}
	for (h, sum) in sums {
		if h > maturity && h - maturity <= height {
			let coinbase = consensus::coinbase(h - maturity);
			if sum < coinbase {
				return Err(Error::InconsistentState(format!(
					"delayed bucket at height {} holds less than its coinbase",
					h
				)));
			}
		}
	}
	Ok(())
}

fn check_coin_supply<T: ReadTx + ?Sized>(tx: &T, height: u64) -> Result<(), Error> {
	let mut total = Currency::zero();
	let mut decode_err: Option<Error> = None;

	tx.for_each(Bucket::CoinOutputs, &mut |_, value| {
		match dec::<CoinOutput>(value) {
			Ok(output) => total += output.value,
			Err(e) => decode_err = Some(e),
		}
		Ok(())
	})?;
	tx.for_each(Bucket::DelayedCoinOutputs, &mut |_, value| {
		match dec::<CoinOutput>(value) {
			Ok(output) => total += output.value,
			Err(e) => decode_err = Some(e),
		}
		Ok(())
	})?;
	tx.for_each(Bucket::FileContracts, &mut |_, value| {
		match dec::<FileContract>(value) {
			Ok(contract) => total += contract.valid_proof_output_sum(),
			Err(e) => decode_err = Some(e),
		}
		Ok(())
	})?;
	if let Some(e) = decode_err {
		return Err(e);
	}

	// unclaimed fund-pool coins accrued to each live share
	let pool = get_fund_pool(tx)?;
	let mut claim_err = None;
	tx.for_each(Bucket::FundOutputs, &mut |_, value| {
		match dec::<FundOutput>(value) {
			Ok(output) => match pool.checked_sub(&output.claim_start) {
				Some(accrued) => {
					total += accrued
						.mul_div(fund_value_u64(&output.value), consensus::TOTAL_FUND_SUPPLY)
				}
				None => {
					claim_err = Some("fund output claim start exceeds the pool".to_string())
				}
			},
			Err(e) => claim_err = Some(e.to_string()),
		}
		Ok(())
	})?;
	if let Some(msg) = claim_err {
		return Err(Error::InconsistentState(msg));
	}

	let expected = consensus::expected_coin_supply(height);
	if total != expected {
		return Err(Error::InconsistentState(format!(
			"coin supply is {} but height {} expects {}",
			total, height, expected
		)));
	}
	Ok(())
}

/// Fund values fit u64 by the supply invariant.
pub fn fund_value_u64(value: &Currency) -> u64 {
	let bytes = value.to_bytes();
	let mut buf = [0u8; 8];
	let len = bytes.len().min(8);
	buf[8 - len..].copy_from_slice(&bytes[bytes.len() - len..]);
	BigEndian::read_u64(&buf)
}
