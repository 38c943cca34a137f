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

//! Fork swaps: reverting the old branch restores every spent output and
//! every replaced Foundation address, and the recorded checksums hold
//! across the walk.

mod common;

use uplo_chain::diff::{commit_diff_set, Diff, DiffDirection};
use uplo_chain::store::{KvStore, MemStore};
use uplo_chain::{encode_foundation_update, state, Error, FoundationUpdate};
use uplo_core::core::currency::Currency;
use uplo_core::core::keys::{UnlockConditions, UnlockHash};
use uplo_core::core::transaction::{CoinInput, CoinOutputID, Transaction};
use uplo_core::genesis;
use uplo_core::global;

use self::common::{coin_output, hash, keypair, Harness};

#[test]
fn reorg_restores_spent_outputs() {
	let harness = Harness::new();
	let (id, value) = harness.mine_spendable();
	let fork_base = harness.chain.height().unwrap();
	let parent = harness.chain.block_at_height(fork_base).unwrap().unwrap();

	// spend on the incumbent branch
	let txn = harness.spend(id, vec![coin_output(value, Default::default())], vec![]);
	let spent_in = harness.mine_block(vec![txn.clone()]).unwrap();
	assert!(harness.chain.coin_output(&id).unwrap().is_none());
	let new_output = txn.coin_output_id(0);
	assert!(harness.chain.coin_output(&new_output).unwrap().is_some());

	// a strictly heavier branch without the spend displaces it
	let alt1 = harness.build_block_on(&parent, fork_base + 1, 1, vec![]);
	let alt2 = harness.build_block_on(&alt1, fork_base + 2, 2, vec![]);
	assert_eq!(harness.accept(alt1), Err(Error::NonExtendingBlock));
	harness.accept(alt2.clone()).unwrap();

	assert_eq!(harness.chain.height().unwrap(), fork_base + 2);
	assert_eq!(harness.chain.tip_id().unwrap(), alt2.id());
	assert!(harness.chain.coin_output(&id).unwrap().is_some());
	assert!(harness.chain.coin_output(&new_output).unwrap().is_none());

	// the displaced block remains available off the canonical path
	assert!(harness
		.chain
		.processed_block(&spent_in.id())
		.unwrap()
		.is_some());
}

#[test]
fn live_checksum_matches_recorded_checksum() {
	let harness = Harness::new();
	harness.mine_empty_blocks(4);
	let tip = harness.chain.tip_id().unwrap();
	let recorded = harness
		.chain
		.processed_block(&tip)
		.unwrap()
		.unwrap()
		.consensus_checksum;
	assert_eq!(harness.chain.consensus_checksum().unwrap(), recorded);

	// the checksum moves with every block
	harness.mine_empty_blocks(1);
	assert_ne!(harness.chain.consensus_checksum().unwrap(), recorded);
}

#[test]
fn checksums_survive_a_reorg() {
	let harness = Harness::new();
	let (id, value) = harness.mine_spendable();
	let fork_base = harness.chain.height().unwrap();
	let parent = harness.chain.block_at_height(fork_base).unwrap().unwrap();
	let checksum_at_base = harness.chain.consensus_checksum().unwrap();

	let txn = harness.spend(id, vec![coin_output(value, Default::default())], vec![]);
	harness.mine_block(vec![txn]).unwrap();

	// the revert path re-verifies the stored checksum of the fork base;
	// a mismatch would abort this accept
	let alt1 = harness.build_block_on(&parent, fork_base + 1, 1, vec![]);
	let alt2 = harness.build_block_on(&alt1, fork_base + 2, 2, vec![]);
	assert_eq!(harness.accept(alt1), Err(Error::NonExtendingBlock));
	harness.accept(alt2.clone()).unwrap();

	let base_block = harness
		.chain
		.block_at_height(fork_base)
		.unwrap()
		.unwrap();
	let stored = harness
		.chain
		.processed_block(&base_block.id())
		.unwrap()
		.unwrap()
		.consensus_checksum;
	assert_eq!(stored, checksum_at_base);

	// and the new tip's recorded checksum matches the live state
	let tip_checksum = harness
		.chain
		.processed_block(&alt2.id())
		.unwrap()
		.unwrap()
		.consensus_checksum;
	assert_eq!(harness.chain.consensus_checksum().unwrap(), tip_checksum);
}

#[test]
fn applying_then_reverting_diffs_is_identity() {
	let store = MemStore::new();
	let diffs = vec![
		Diff::CoinOutput {
			direction: DiffDirection::Apply,
			id: CoinOutputID(hash(1)),
			output: coin_output(Currency::from(5), Default::default()),
		},
		Diff::DelayedCoinOutput {
			direction: DiffDirection::Apply,
			id: CoinOutputID(hash(2)),
			output: coin_output(Currency::from(7), UnlockHash(hash(3))),
			maturity_height: 12,
		},
		Diff::FundPool {
			previous: Currency::zero(),
			adjusted: Currency::from(40),
		},
	];

	let mut tx = store.begin_write().unwrap();
	let before = state::consensus_checksum(&*tx).unwrap();

	commit_diff_set(&mut *tx, &diffs, DiffDirection::Apply).unwrap();
	assert!(state::get_coin_output(&*tx, &CoinOutputID(hash(1)))
		.unwrap()
		.is_some());
	assert_eq!(state::get_fund_pool(&*tx).unwrap(), Currency::from(40));
	assert_ne!(state::consensus_checksum(&*tx).unwrap(), before);

	commit_diff_set(&mut *tx, &diffs, DiffDirection::Revert).unwrap();
	assert!(state::get_coin_output(&*tx, &CoinOutputID(hash(1)))
		.unwrap()
		.is_none());
	assert_eq!(state::get_fund_pool(&*tx).unwrap(), Currency::zero());
	assert_eq!(state::consensus_checksum(&*tx).unwrap(), before);
}

// Mines to the point where the Foundation subsidy minted at `height` has
// matured, then spends it with an update to fresh addresses.
#[test]
fn foundation_update_and_revert() {
	let harness = Harness::new();
	let hardfork = global::foundation_hardfork_height();
	let frequency = global::foundation_subsidy_frequency();
	let delay = global::maturity_delay();

	// before the hardfork there are no Foundation addresses
	assert!(harness.chain.foundation_addresses().unwrap().is_none());

	// mine until the first two subsidies are live
	harness.mine_empty_blocks(hardfork + frequency + delay);
	let initial = harness.chain.foundation_addresses().unwrap().unwrap();
	assert_eq!(initial.0, genesis::initial_foundation_primary());
	assert_eq!(initial.1, genesis::initial_foundation_failsafe());

	let first_subsidy = harness
		.chain
		.block_at_height(hardfork)
		.unwrap()
		.unwrap()
		.id()
		.foundation_subsidy_id();
	let second_subsidy = harness
		.chain
		.block_at_height(hardfork + frequency)
		.unwrap()
		.unwrap()
		.id()
		.foundation_subsidy_id();
	let subsidy = harness.chain.coin_output(&first_subsidy).unwrap().unwrap();
	assert_eq!(subsidy.unlock_hash, initial.0);

	// an update authorized by spending a Foundation-held output
	let new_primary = UnlockConditions::single_sig(keypair(8).public_key()).unlock_hash();
	let new_failsafe = UnlockConditions::single_sig(keypair(9).public_key()).unlock_hash();
	let fork_base = harness.chain.height().unwrap();
	let parent = harness.chain.block_at_height(fork_base).unwrap().unwrap();
	let txn = Transaction {
		coin_inputs: vec![CoinInput {
			parent_id: first_subsidy,
			unlock_conditions: UnlockConditions::default(),
		}],
		coin_outputs: vec![coin_output(subsidy.value.clone(), Default::default())],
		arbitrary_data: vec![encode_foundation_update(&FoundationUpdate {
			new_primary,
			new_failsafe,
		})],
		..Default::default()
	};
	harness.mine_block(vec![txn]).unwrap();

	// addresses move, and the still-live subsidy is re-addressed to the
	// new primary
	assert_eq!(
		harness.chain.foundation_addresses().unwrap().unwrap(),
		(new_primary, new_failsafe)
	);
	let moved = harness.chain.coin_output(&second_subsidy).unwrap().unwrap();
	assert_eq!(moved.unlock_hash, new_primary);

	// reorging the update away restores the addresses and the subsidy
	let alt1 = harness.build_block_on(&parent, fork_base + 1, 1, vec![]);
	let alt2 = harness.build_block_on(&alt1, fork_base + 2, 2, vec![]);
	assert_eq!(harness.accept(alt1), Err(Error::NonExtendingBlock));
	harness.accept(alt2).unwrap();

	assert_eq!(
		harness.chain.foundation_addresses().unwrap().unwrap(),
		initial
	);
	let restored = harness.chain.coin_output(&second_subsidy).unwrap().unwrap();
	assert_eq!(restored.unlock_hash, initial.0);
	assert!(harness.chain.coin_output(&first_subsidy).unwrap().is_some());
}

#[test]
fn unsigned_foundation_update_rejected() {
	let harness = Harness::new();
	harness.mine_empty_blocks(global::foundation_hardfork_height());

	// arbitrary data alone carries no authority
	let txn = Transaction {
		arbitrary_data: vec![encode_foundation_update(&FoundationUpdate {
			new_primary: UnlockHash(hash(1)),
			new_failsafe: UnlockHash(hash(2)),
		})],
		..Default::default()
	};
	assert_eq!(
		harness.mine_block(vec![txn]).unwrap_err(),
		Error::UnsignedFoundationUpdate
	);
}
