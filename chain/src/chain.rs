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

//! The consensus set facade: accepts blocks under a single-writer lock,
//! seeds and persists the chain, answers state queries and runs the
//! subscription bus.

use lru_cache::LruCache;
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use util::{Mutex, RwLock};

use uplo_core::consensus;
use uplo_core::core::block::{Block, BlockID};
use uplo_core::core::currency::Currency;
use uplo_core::core::hash::{Hash, ZERO_HASH};
use uplo_core::core::keys::UnlockHash;
use uplo_core::core::target::{Difficulty, Target};
use uplo_core::core::transaction::{
	CoinOutput, CoinOutputID, FileContract, FileContractID, FundOutput, FundOutputID,
	Transaction,
};
use uplo_core::genesis;
use uplo_core::global;

use crate::apply;
use crate::diff::{Diff, DiffDirection};
use crate::error::Error;
use crate::pipe::{self, Outcome};
use crate::state;
use crate::store::{KvStore, RedbStore};
use crate::subscribe::{
	CancelToken, ChangeEntry, ConsensusChange, ConsensusChangeID, ConsensusSetSubscriber,
	CONSENSUS_CHANGE_BEGINNING, CONSENSUS_CHANGE_RECENT,
};
use crate::types::{Clock, ProcessedBlock, SystemClock};

const BLOCK_CACHE_SIZE: usize = 1024;

/// A hook consulted at named decision points; returning true disrupts
/// the operation. Testing only.
pub type DisruptHook = Box<dyn Fn(&str) -> bool + Send + Sync>;

/// Construction options for the consensus set.
pub struct Options {
	/// Re-derive the conservation invariants after every applied block.
	/// Expensive; on by default only in debug builds.
	pub check_consistency: bool,
	/// Fault-injection hook.
	pub disrupt: Option<DisruptHook>,
}

impl Default for Options {
	fn default() -> Options {
		Options {
			check_consistency: cfg!(debug_assertions),
			disrupt: None,
		}
	}
}

/// The consensus set.
pub struct Chain {
	store: Arc<dyn KvStore>,
	clock: Arc<dyn Clock>,
	options: Options,
	// serializes accept_block, subscription hand-off and notification
	accept_lock: Mutex<()>,
	subscribers: Mutex<Vec<Arc<Mutex<dyn ConsensusSetSubscriber>>>>,
	invalid_blocks: RwLock<HashSet<BlockID>>,
	block_cache: Mutex<LruCache<BlockID, ProcessedBlock>>,
	// set on checksum mismatch; all further writes are refused
	fatal: AtomicBool,
}

impl Chain {
	/// Opens (or creates) the consensus set under
	/// `<data_dir>/consensus/consensus.db` with the wall clock.
	pub fn init(data_dir: &str, options: Options) -> Result<Chain, Error> {
		let path = Path::new(data_dir).join("consensus").join("consensus.db");
		let store = Arc::new(RedbStore::open(&path)?);
		Chain::with_store(store, Arc::new(SystemClock), options)
	}

	/// Builds a consensus set over any store and clock; tests inject an
	/// in-memory store and a controlled clock here.
	pub fn with_store(
		store: Arc<dyn KvStore>,
		clock: Arc<dyn Clock>,
		options: Options,
	) -> Result<Chain, Error> {
		let chain = Chain {
			store,
			clock,
			options,
			accept_lock: Mutex::new(()),
			subscribers: Mutex::new(vec![]),
			invalid_blocks: RwLock::new(HashSet::new()),
			block_cache: Mutex::new(LruCache::new(BLOCK_CACHE_SIZE)),
			fatal: AtomicBool::new(false),
		};
		chain.ensure_genesis()?;
		Ok(chain)
	}

	// Seeds an empty store with the genesis block and its change entry.
	fn ensure_genesis(&self) -> Result<(), Error> {
		let mut tx = self.store.begin_write()?;
		if state::is_initialized(&*tx)? {
			return Ok(());
		}
		let genesis_block = genesis::genesis_block();
		let genesis_id = genesis_block.id();
		info!("seeding consensus database with genesis {}", genesis_id);

		state::set_height(&mut *tx, 0)?;
		state::push_path(&mut *tx, 0, &genesis_id)?;
		state::set_fund_pool(&mut *tx, &Currency::zero())?;

		let mut diffs = vec![];
		for txn in &genesis_block.transactions {
			for (i, output) in txn.coin_outputs.iter().enumerate() {
				apply::push_diff(
					&mut *tx,
					&mut diffs,
					Diff::CoinOutput {
						direction: DiffDirection::Apply,
						id: txn.coin_output_id(i as u64),
						output: output.clone(),
					},
				)?;
			}
			for (i, output) in txn.fund_outputs.iter().enumerate() {
				apply::push_diff(
					&mut *tx,
					&mut diffs,
					Diff::FundOutput {
						direction: DiffDirection::Apply,
						id: txn.fund_output_id(i as u64),
						output: output.clone(),
					},
				)?;
			}
		}

		let pb = ProcessedBlock {
			block: genesis_block,
			height: 0,
			total_work: Difficulty::zero(),
			child_target: global::root_target(),
			diffs,
			consensus_checksum: state::consensus_checksum(&*tx)?,
		};
		state::put_processed_block(&mut *tx, &pb)?;
		let entry = ChangeEntry {
			reverted_blocks: vec![],
			applied_blocks: vec![genesis_id],
		};
		state::append_change(&mut *tx, &entry)?;
		tx.commit()?;
		Ok(())
	}

	fn disrupted(&self, tag: &str) -> bool {
		match &self.options.disrupt {
			Some(hook) => hook(tag),
			None => false,
		}
	}

	/// Accepts a block: validates it, runs fork choice, commits the
	/// resulting state change and notifies every subscriber in order.
	pub fn accept_block(&self, block: Block) -> Result<(), Error> {
		if self.fatal.load(Ordering::SeqCst) {
			return Err(Error::Unusable);
		}
		let _guard = self.accept_lock.lock();
		let id = block.id();
		if self.invalid_blocks.read().contains(&id) {
			return Err(Error::KnownInvalid);
		}
		if self.disrupted("AcceptBlock") {
			return Err(Error::Disrupted("AcceptBlock"));
		}

		let result = {
			let mut wtx = self.store.begin_write()?;
			match pipe::process_block(
				&mut *wtx,
				&block,
				self.clock.now(),
				self.options.check_consistency,
			) {
				Ok(Outcome::Extended { entry, seq }) => {
					if self.disrupted("CommitAcceptedBlock") {
						return Err(Error::Disrupted("CommitAcceptedBlock"));
					}
					wtx.commit()?;
					Ok((entry, seq))
				}
				Ok(Outcome::SideBranch) => {
					wtx.commit()?;
					Err(Error::NonExtendingBlock)
				}
				Err(e) => Err(e),
			}
		};

		match result {
			Ok((entry, seq)) => {
				self.block_cache.lock().clear();
				let change = self.change_for_entry(&entry, seq)?;
				debug!(
					"accepted block {} ({} reverted, {} applied)",
					id,
					change.reverted_blocks.len(),
					change.applied_blocks.len()
				);
				self.notify(&change);
				Ok(())
			}
			Err(e) => {
				if e == Error::ChecksumMismatch {
					error!("checksum mismatch while processing {}, refusing writes", id);
					self.fatal.store(true, Ordering::SeqCst);
				}
				if e.marks_block_invalid() {
					self.invalid_blocks.write().insert(id);
				}
				Err(e)
			}
		}
	}

	fn notify(&self, change: &ConsensusChange) {
		let subscribers = self.subscribers.lock();
		for subscriber in subscribers.iter() {
			if let Err(e) = subscriber.lock().process_consensus_change(change) {
				error!("subscriber failed to process change {}: {}", change.id, e);
			}
		}
	}

	// Reconstructs the full consensus change for a logged entry.
	fn change_for_entry(&self, entry: &ChangeEntry, seq: u64) -> Result<ConsensusChange, Error> {
		let tx = self.store.begin_read()?;
		let mut reverted_blocks = vec![];
		let mut reverted_diffs = vec![];
		for id in &entry.reverted_blocks {
			let pb = state::get_processed_block(&*tx, id)?.ok_or_else(|| {
				Error::InconsistentState("change entry names an unknown block".to_string())
			})?;
			reverted_blocks.push(pb.block.clone());
			for diff in pb.diffs.iter().rev() {
				reverted_diffs.push(diff.inverse());
			}
		}
		let mut applied_blocks = vec![];
		let mut applied_diffs = vec![];
		let mut tip: Option<ProcessedBlock> = None;
		for id in &entry.applied_blocks {
			let pb = state::get_processed_block(&*tx, id)?.ok_or_else(|| {
				Error::InconsistentState("change entry names an unknown block".to_string())
			})?;
			applied_blocks.push(pb.block.clone());
			applied_diffs.extend(pb.diffs.iter().cloned());
			tip = Some(pb);
		}
		let tip = tip.ok_or_else(|| {
			Error::InconsistentState("change entry applies no blocks".to_string())
		})?;
		let minimum_valid_child_timestamp = pipe::minimum_valid_child_timestamp(&*tx, &tip)?;
		let synced =
			self.clock.now() <= tip.block.timestamp + 12 * global::block_frequency();
		Ok(ConsensusChange {
			id: entry.id(seq),
			reverted_blocks,
			applied_blocks,
			reverted_diffs,
			applied_diffs,
			child_target: tip.child_target,
			minimum_valid_child_timestamp,
			synced,
		})
	}

	fn change_at_seq(&self, seq: u64) -> Result<ConsensusChange, Error> {
		let entry = {
			let tx = self.store.begin_read()?;
			state::get_change_entry(&*tx, seq)?.ok_or(Error::InvalidConsensusChangeID)?
		};
		self.change_for_entry(&entry, seq)
	}

	/// Registers a subscriber, first replaying every change strictly
	/// after `start` in order. `CONSENSUS_CHANGE_BEGINNING` replays from
	/// genesis and `CONSENSUS_CHANGE_RECENT` skips replay. Cancelling
	/// aborts replay and leaves the subscriber absent from the bus.
	pub fn subscribe(
		&self,
		subscriber: Arc<Mutex<dyn ConsensusSetSubscriber>>,
		start: ConsensusChangeID,
		cancel: &CancelToken,
	) -> Result<(), Error> {
		let mut next_seq = {
			let tx = self.store.begin_read()?;
			if start == CONSENSUS_CHANGE_BEGINNING {
				0
			} else if start == CONSENSUS_CHANGE_RECENT {
				state::change_count(&*tx)?
			} else {
				state::get_change_seq(&*tx, &start)?
					.ok_or(Error::InvalidConsensusChangeID)?
					+ 1
			}
		};
		loop {
			if cancel.is_cancelled() {
				return Err(Error::SubscriptionCancelled);
			}
			let count = {
				let tx = self.store.begin_read()?;
				state::change_count(&*tx)?
			};
			if next_seq < count {
				for seq in next_seq..count {
					if cancel.is_cancelled() {
						return Err(Error::SubscriptionCancelled);
					}
					let change = self.change_at_seq(seq)?;
					if let Err(e) = subscriber.lock().process_consensus_change(&change) {
						error!("subscriber failed during replay of {}: {}", change.id, e);
					}
				}
				next_seq = count;
				continue;
			}
			// caught up; go live unless new changes raced in
			let _guard = self.accept_lock.lock();
			let tx = self.store.begin_read()?;
			if state::change_count(&*tx)? == next_seq {
				self.subscribers.lock().push(subscriber);
				return Ok(());
			}
		}
	}

	/// Removes a subscriber from the bus.
	pub fn unsubscribe(&self, subscriber: &Arc<Mutex<dyn ConsensusSetSubscriber>>) {
		self.subscribers
			.lock()
			.retain(|s| !Arc::ptr_eq(s, subscriber));
	}

	/// Speculatively validates and diffs a transaction set against the
	/// current state without committing anything. The returned change
	/// carries only the would-be diffs.
	pub fn try_transaction_set(&self, txns: &[Transaction]) -> Result<ConsensusChange, Error> {
		let _guard = self.accept_lock.lock();
		let mut wtx = self.store.begin_write()?;
		let height = state::get_height(&*wtx)?;
		let mut diffs = vec![];
		for txn in txns {
			apply::apply_transaction(&mut *wtx, &mut diffs, height, txn)?;
		}
		let tip = self.tip_processed_block_in(&*wtx)?;
		let minimum_valid_child_timestamp = pipe::minimum_valid_child_timestamp(&*wtx, &tip)?;
		let synced =
			self.clock.now() <= tip.block.timestamp + 12 * global::block_frequency();
		// dropping the transaction rolls every staged change back
		drop(wtx);
		Ok(ConsensusChange {
			id: ConsensusChangeID(ZERO_HASH),
			reverted_blocks: vec![],
			applied_blocks: vec![],
			reverted_diffs: vec![],
			applied_diffs: diffs,
			child_target: tip.child_target,
			minimum_valid_child_timestamp,
			synced,
		})
	}

	fn tip_processed_block_in<T: crate::store::ReadTx + ?Sized>(
		&self,
		tx: &T,
	) -> Result<ProcessedBlock, Error> {
		let height = state::get_height(tx)?;
		let id = state::get_path(tx, height)?.ok_or_else(|| {
			Error::InconsistentState("canonical path misses its own tip".to_string())
		})?;
		state::get_processed_block(tx, &id)?.ok_or_else(|| {
			Error::InconsistentState("tip block missing from the block map".to_string())
		})
	}

	/// Current height of the canonical chain.
	pub fn height(&self) -> Result<u64, Error> {
		let tx = self.store.begin_read()?;
		state::get_height(&*tx)
	}

	/// Id of the canonical tip.
	pub fn tip_id(&self) -> Result<BlockID, Error> {
		let tx = self.store.begin_read()?;
		let height = state::get_height(&*tx)?;
		state::get_path(&*tx, height)?.ok_or_else(|| {
			Error::InconsistentState("canonical path misses its own tip".to_string())
		})
	}

	/// The canonical block at `height`, if any.
	pub fn block_at_height(&self, height: u64) -> Result<Option<Block>, Error> {
		let tx = self.store.begin_read()?;
		match state::get_path(&*tx, height)? {
			Some(id) => Ok(state::get_processed_block(&*tx, &id)?.map(|pb| pb.block)),
			None => Ok(None),
		}
	}

	/// The processed form of any known block, canonical or not.
	pub fn processed_block(&self, id: &BlockID) -> Result<Option<ProcessedBlock>, Error> {
		if let Some(pb) = self.block_cache.lock().get_mut(id) {
			return Ok(Some(pb.clone()));
		}
		let tx = self.store.begin_read()?;
		let pb = state::get_processed_block(&*tx, id)?;
		if let Some(ref pb) = pb {
			self.block_cache.lock().insert(*id, pb.clone());
		}
		Ok(pb)
	}

	/// The target the next block must meet.
	pub fn current_target(&self) -> Result<Target, Error> {
		let tx = self.store.begin_read()?;
		Ok(self.tip_processed_block_in(&*tx)?.child_target)
	}

	/// The lowest timestamp the next block may carry.
	pub fn minimum_valid_child_timestamp(&self) -> Result<u64, Error> {
		let tx = self.store.begin_read()?;
		let tip = self.tip_processed_block_in(&*tx)?;
		pipe::minimum_valid_child_timestamp(&*tx, &tip)
	}

	/// A live coin output, if present.
	pub fn coin_output(&self, id: &CoinOutputID) -> Result<Option<CoinOutput>, Error> {
		let tx = self.store.begin_read()?;
		state::get_coin_output(&*tx, id)
	}

	/// A live fund output, if present.
	pub fn fund_output(&self, id: &FundOutputID) -> Result<Option<FundOutput>, Error> {
		let tx = self.store.begin_read()?;
		state::get_fund_output(&*tx, id)
	}

	/// A live file contract, if present.
	pub fn file_contract(&self, id: &FileContractID) -> Result<Option<FileContract>, Error> {
		let tx = self.store.begin_read()?;
		state::get_file_contract(&*tx, id)
	}

	/// The current fund pool.
	pub fn fund_pool(&self) -> Result<Currency, Error> {
		let tx = self.store.begin_read()?;
		state::get_fund_pool(&*tx)
	}

	/// The current Foundation (primary, failsafe) addresses, once the
	/// hardfork has initialized them.
	pub fn foundation_addresses(&self) -> Result<Option<(UnlockHash, UnlockHash)>, Error> {
		let tx = self.store.begin_read()?;
		state::get_foundation(&*tx)
	}

	/// The live consensus checksum.
	pub fn consensus_checksum(&self) -> Result<Hash, Error> {
		let tx = self.store.begin_read()?;
		state::consensus_checksum(&*tx)
	}

	/// The segment index a storage proof for `id` must open, derived
	/// from the canonical block at the contract's window start.
	pub fn storage_proof_segment(&self, id: &FileContractID) -> Result<u64, Error> {
		let tx = self.store.begin_read()?;
		let contract =
			state::get_file_contract(&*tx, id)?.ok_or(Error::UnrecognizedFileContractID)?;
		let trigger = state::get_path(&*tx, contract.window_start)?
			.ok_or(Error::UnfinishedFileContract)?;
		Ok(consensus::storage_proof_segment(
			&trigger,
			id,
			contract.file_size,
		))
	}
}
