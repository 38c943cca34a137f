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

//! The chain test harness: a consensus set over an in-memory store and
//! a controlled clock, with helpers to mine blocks, fund spends and
//! form file contracts.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use uplo_chain::store::MemStore;
use uplo_chain::{Chain, Clock, Error, Options};
use uplo_core::consensus;
use uplo_core::core::block::Block;
use uplo_core::core::currency::Currency;
use uplo_core::core::hash::Hash;
use uplo_core::core::keys::{UnlockConditions, UnlockHash};
use uplo_core::core::transaction::{
	CoinInput, CoinOutput, CoinOutputID, CoveredFields, FileContract, FileContractID,
	StorageProof, Transaction, TransactionSignature,
};
use uplo_core::crypto::merkle::{self, SEGMENT_SIZE};
use uplo_core::crypto::signature::Keypair;
use uplo_core::global::{self, ChainTypes};

/// A clock the tests wind forward by hand.
pub struct TestClock {
	now: AtomicU64,
}

impl TestClock {
	/// A clock starting at `now`.
	pub fn starting_at(now: u64) -> TestClock {
		TestClock {
			now: AtomicU64::new(now),
		}
	}

	/// Moves the clock to `now`.
	pub fn set(&self, now: u64) {
		self.now.store(now, Ordering::SeqCst);
	}
}

impl Clock for TestClock {
	fn now(&self) -> u64 {
		self.now.load(Ordering::SeqCst)
	}
}

/// A deterministic keypair for tests.
pub fn keypair(seed: u8) -> Keypair {
	Keypair::from_seed([seed; 32])
}

/// A throwaway hash.
pub fn hash(seed: u8) -> Hash {
	Hash([seed; 32])
}

/// A coin output of `value` to `unlock_hash`.
pub fn coin_output(value: Currency, unlock_hash: UnlockHash) -> CoinOutput {
	CoinOutput { value, unlock_hash }
}

/// Fills in signature `i` by signing its sighash with `keypair`.
pub fn sign(txn: &mut Transaction, i: usize, keypair: &Keypair, height: u64) {
	let hash = txn.sig_hash(i, height);
	txn.transaction_signatures[i].signature = keypair.sign(&hash);
}

/// A contract over `data` paying out `100` whole coins, its output split
/// computed for the tax at `height`.
pub fn contract_for(
	data: &[u8],
	window_start: u64,
	window_end: u64,
	height: u64,
	unlock_hash: UnlockHash,
) -> FileContract {
	let payout = consensus::coin(100);
	let tax = consensus::tax(height, &payout);
	let portion = payout.checked_sub(&tax).unwrap();
	FileContract {
		file_size: data.len() as u64,
		file_merkle_root: merkle::segments_root(data),
		window_start,
		window_end,
		payout,
		valid_proof_outputs: vec![coin_output(portion.clone(), Default::default())],
		missed_proof_outputs: vec![coin_output(portion, Default::default())],
		unlock_hash,
		revision_number: 0,
	}
}

/// Drives a consensus set for one test.
pub struct Harness {
	pub chain: Chain,
	pub clock: Arc<TestClock>,
	pub miner: Keypair,
}

impl Harness {
	/// A fresh consensus set over an in-memory store, with conservation
	/// checks re-derived after every applied block.
	pub fn new() -> Harness {
		let _ = env_logger::try_init();
		global::set_chain_type(ChainTypes::AutomatedTesting);
		let clock = Arc::new(TestClock::starting_at(global::genesis_timestamp()));
		let chain = Chain::with_store(
			Arc::new(MemStore::new()),
			clock.clone(),
			Options {
				check_consistency: true,
				disrupt: None,
			},
		)
		.unwrap();
		Harness {
			chain,
			clock,
			miner: keypair(42),
		}
	}

	/// The address every mined payout is sent to.
	pub fn miner_hash(&self) -> UnlockHash {
		UnlockConditions::single_sig(self.miner.public_key()).unlock_hash()
	}

	/// Timestamp of the canonical tip.
	pub fn tip_timestamp(&self) -> u64 {
		let height = self.chain.height().unwrap();
		self.chain
			.block_at_height(height)
			.unwrap()
			.unwrap()
			.timestamp
	}

	/// A valid child of the current tip carrying `txns`, with the miner
	/// payout balancing the coinbase and fees.
	pub fn build_block(&self, txns: Vec<Transaction>, nonce: u8) -> Block {
		let height = self.chain.height().unwrap() + 1;
		let fees: Currency = txns
			.iter()
			.flat_map(|txn| txn.miner_fees.iter())
			.sum();
		Block {
			parent_id: self.chain.tip_id().unwrap(),
			nonce: [nonce, 0, 0, 0, 0, 0, 0, 0],
			timestamp: self.tip_timestamp() + global::block_frequency(),
			miner_payouts: vec![coin_output(
				consensus::coinbase(height) + fees,
				self.miner_hash(),
			)],
			transactions: txns,
		}
	}

	/// A valid block extending `parent` at `height`, for building side
	/// branches by hand. The nonce keeps sibling ids distinct.
	pub fn build_block_on(
		&self,
		parent: &Block,
		height: u64,
		nonce: u8,
		txns: Vec<Transaction>,
	) -> Block {
		let fees: Currency = txns
			.iter()
			.flat_map(|txn| txn.miner_fees.iter())
			.sum();
		Block {
			parent_id: parent.id(),
			nonce: [nonce, 0, 0, 0, 0, 0, 0, 0],
			timestamp: parent.timestamp + global::block_frequency() + nonce as u64,
			miner_payouts: vec![coin_output(
				consensus::coinbase(height) + fees,
				self.miner_hash(),
			)],
			transactions: txns,
		}
	}

	/// Submits a block after winding the clock past its timestamp.
	pub fn accept(&self, block: Block) -> Result<(), Error> {
		if block.timestamp > self.clock.now() {
			self.clock.set(block.timestamp);
		}
		self.chain.accept_block(block)
	}

	/// Mines one block carrying `txns` onto the tip.
	pub fn mine_block(&self, txns: Vec<Transaction>) -> Result<Block, Error> {
		let block = self.build_block(txns, 0);
		self.accept(block.clone())?;
		Ok(block)
	}

	/// Mines `count` empty blocks.
	pub fn mine_empty_blocks(&self, count: u64) {
		for _ in 0..count {
			self.mine_block(vec![]).unwrap();
		}
	}

	/// Mines a payout to the miner key and lets it mature.
	pub fn mine_spendable(&self) -> (CoinOutputID, Currency) {
		let block = self.mine_block(vec![]).unwrap();
		let id = block.miner_payout_id(0);
		let value = block.miner_payouts[0].value.clone();
		self.mine_empty_blocks(global::maturity_delay());
		(id, value)
	}

	/// A transaction spending `id` under the miner key, with one
	/// unsigned whole-transaction signature slot.
	pub fn spend_unsigned(&self, id: CoinOutputID, outputs: Vec<CoinOutput>) -> Transaction {
		let mut txn = Transaction {
			coin_inputs: vec![CoinInput {
				parent_id: id,
				unlock_conditions: UnlockConditions::single_sig(self.miner.public_key()),
			}],
			coin_outputs: outputs,
			..Default::default()
		};
		txn.transaction_signatures.push(TransactionSignature {
			parent_id: id.0,
			public_key_index: 0,
			timelock: 0,
			covered_fields: CoveredFields::whole_transaction(),
			signature: vec![],
		});
		txn
	}

	/// Signs slot 0 with the miner key at the height the next block
	/// lands.
	pub fn sign_spend(&self, txn: &mut Transaction) {
		let height = self.chain.height().unwrap() + 1;
		sign(txn, 0, &self.miner, height);
	}

	/// A signed transaction spending `id` into `outputs` plus `fees`.
	pub fn spend(
		&self,
		id: CoinOutputID,
		outputs: Vec<CoinOutput>,
		fees: Vec<Currency>,
	) -> Transaction {
		let mut txn = self.spend_unsigned(id, outputs);
		txn.miner_fees = fees;
		self.sign_spend(&mut txn);
		txn
	}

	/// Funds and forms a contract over `data` whose proof window opens
	/// `open_after` blocks past the forming block and spans `window_len`
	/// further blocks. Returns the contract id and body as applied.
	pub fn form_contract(
		&self,
		data: &[u8],
		open_after: u64,
		window_len: u64,
		unlock_hash: UnlockHash,
	) -> (FileContractID, FileContract) {
		let (fund_id, fund_value) = self.mine_spendable();
		let height = self.chain.height().unwrap() + 1;
		let contract = contract_for(
			data,
			height + open_after,
			height + open_after + window_len,
			height,
			unlock_hash,
		);
		let change = fund_value.checked_sub(&contract.payout).unwrap();
		let mut txn = self.spend_unsigned(fund_id, vec![coin_output(change, Default::default())]);
		txn.file_contracts.push(contract.clone());
		self.sign_spend(&mut txn);
		let contract_id = txn.file_contract_id(0);
		self.mine_block(vec![txn]).unwrap();
		(contract_id, contract)
	}

	/// A transaction proving the deterministic segment of `contract_id`
	/// over `data`. The window must already be open.
	pub fn proof_txn(&self, contract_id: FileContractID, data: &[u8]) -> Transaction {
		let index = self.chain.storage_proof_segment(&contract_id).unwrap();
		let (segment_bytes, hash_set) = if data.is_empty() {
			(vec![], vec![])
		} else {
			merkle::build_proof(data, index).unwrap()
		};
		let mut segment = [0u8; SEGMENT_SIZE];
		segment[..segment_bytes.len()].copy_from_slice(&segment_bytes);
		Transaction {
			storage_proofs: vec![StorageProof {
				parent_id: contract_id,
				segment,
				hash_set,
			}],
			..Default::default()
		}
	}
}
