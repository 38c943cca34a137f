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

//! Block acceptance: header rules, payout rules, spends and the state
//! checks every transaction runs against.

mod common;

use std::sync::Arc;

use uplo_chain::store::MemStore;
use uplo_chain::{Chain, Error, Options};
use uplo_core::core::block::BlockID;
use uplo_core::core::currency::Currency;
use uplo_core::core::keys::{PublicKey, UnlockConditions, UnlockHash};
use uplo_core::genesis;
use uplo_core::global;

use self::common::{coin_output, hash, keypair, sign, Harness};

#[test]
fn genesis_is_seeded() {
	let harness = Harness::new();
	assert_eq!(harness.chain.height().unwrap(), 0);
	assert_eq!(harness.chain.fund_pool().unwrap(), Currency::zero());

	let genesis_block = genesis::genesis_block();
	assert_eq!(harness.chain.tip_id().unwrap(), genesis_block.id());

	// the genesis fund allocation is live
	let fund_id = genesis_block.transactions[0].fund_output_id(0);
	let fund = harness.chain.fund_output(&fund_id).unwrap().unwrap();
	assert_eq!(fund.value, Currency::from(2_000));
}

#[test]
fn mining_extends_the_chain() {
	let harness = Harness::new();
	let block = harness.mine_block(vec![]).unwrap();
	assert_eq!(harness.chain.height().unwrap(), 1);
	assert_eq!(harness.chain.tip_id().unwrap(), block.id());

	// the same block again is known
	assert_eq!(harness.accept(block), Err(Error::BlockKnown));
}

#[test]
fn orphans_are_rejected() {
	let harness = Harness::new();
	let mut block = harness.build_block(vec![], 0);
	block.parent_id = BlockID(hash(77));
	assert_eq!(harness.accept(block), Err(Error::Orphan));
}

#[test]
fn early_timestamp_rejected() {
	let harness = Harness::new();
	harness.mine_empty_blocks(3);
	let minimum = harness.chain.minimum_valid_child_timestamp().unwrap();
	let mut block = harness.build_block(vec![], 0);
	block.timestamp = minimum;
	assert_eq!(harness.accept(block), Err(Error::EarlyTimestamp));
}

#[test]
fn future_timestamps_rejected() {
	let harness = Harness::new();
	harness.mine_empty_blocks(1);
	let now = harness.tip_timestamp();
	harness.clock.set(now);

	let mut block = harness.build_block(vec![], 0);
	block.timestamp = now + global::future_threshold() + 1;
	assert_eq!(
		harness.chain.accept_block(block),
		Err(Error::FutureTimestamp)
	);

	let mut block = harness.build_block(vec![], 1);
	block.timestamp = now + global::extreme_future_threshold() + 1;
	assert_eq!(
		harness.chain.accept_block(block),
		Err(Error::ExtremeFutureTimestamp)
	);

	// neither is a permanent verdict; the same block passes once the
	// clock catches up
	let block = harness.build_block(vec![], 2);
	harness
		.clock
		.set(block.timestamp.saturating_sub(global::future_threshold() + 1));
	assert_eq!(
		harness.chain.accept_block(block.clone()),
		Err(Error::FutureTimestamp)
	);
	harness.accept(block).unwrap();
}

#[test]
fn bad_miner_payouts_rejected() {
	let harness = Harness::new();
	let mut block = harness.build_block(vec![], 0);
	block.miner_payouts[0].value = Currency::from(1);
	let block_clone = block.clone();
	assert_eq!(harness.accept(block), Err(Error::BadMinerPayouts));

	// the verdict is remembered
	assert_eq!(harness.accept(block_clone), Err(Error::KnownInvalid));
}

#[test]
fn side_branch_is_informational() {
	let harness = Harness::new();
	harness.mine_empty_blocks(2);
	let parent = harness.chain.block_at_height(1).unwrap().unwrap();

	// equal cumulative work never displaces the incumbent
	let sibling = harness.build_block_on(&parent, 2, 9, vec![]);
	let tip_before = harness.chain.tip_id().unwrap();
	assert_eq!(harness.accept(sibling.clone()), Err(Error::NonExtendingBlock));
	assert_eq!(harness.chain.tip_id().unwrap(), tip_before);

	// the side block is stored regardless
	assert!(harness
		.chain
		.processed_block(&sibling.id())
		.unwrap()
		.is_some());
}

#[test]
fn spend_matured_payout() {
	let harness = Harness::new();
	let (id, value) = harness.mine_spendable();
	let recipient = UnlockConditions::single_sig(keypair(7).public_key()).unlock_hash();
	let txn = harness.spend(id, vec![coin_output(value.clone(), recipient)], vec![]);
	harness.mine_block(vec![txn]).unwrap();

	assert!(harness.chain.coin_output(&id).unwrap().is_none());
}

#[test]
fn immature_payout_cannot_be_spent() {
	let harness = Harness::new();
	let block = harness.mine_block(vec![]).unwrap();
	let id = block.miner_payout_id(0);
	let value = block.miner_payouts[0].value.clone();

	let txn = harness.spend(id, vec![coin_output(value, Default::default())], vec![]);
	assert_eq!(
		harness.mine_block(vec![txn]).unwrap_err(),
		Error::MissingCoinOutput
	);
}

#[test]
fn wrong_unlock_conditions_rejected() {
	let harness = Harness::new();
	let (id, value) = harness.mine_spendable();
	let height = harness.chain.height().unwrap() + 1;

	// reveal conditions of a key that does not own the output
	let thief = keypair(13);
	let mut txn = harness.spend_unsigned(id, vec![coin_output(value, Default::default())]);
	txn.coin_inputs[0].unlock_conditions = UnlockConditions::single_sig(thief.public_key());
	sign(&mut txn, 0, &thief, height);
	assert_eq!(
		harness.mine_block(vec![txn]).unwrap_err(),
		Error::WrongUnlockConditions
	);
}

#[test]
fn timelocked_conditions_rejected_until_height() {
	let harness = Harness::new();
	let (id, value) = harness.mine_spendable();

	// lock the coins behind conditions that only open far in the future
	let locked = UnlockConditions {
		timelock: harness.chain.height().unwrap() + 100,
		public_keys: vec![PublicKey::ed25519(harness.miner.public_key())],
		signatures_required: 1,
	};
	let txn = harness.spend(
		id,
		vec![coin_output(value.clone(), locked.unlock_hash())],
		vec![],
	);
	harness.mine_block(vec![txn.clone()]).unwrap();
	let locked_id = txn.coin_output_id(0);

	let height = harness.chain.height().unwrap() + 1;
	let mut spend = harness.spend_unsigned(
		locked_id,
		vec![coin_output(value, Default::default())],
	);
	spend.coin_inputs[0].unlock_conditions = locked;
	spend.transaction_signatures[0].parent_id = locked_id.0;
	sign(&mut spend, 0, &harness.miner, height);
	assert_eq!(
		harness.mine_block(vec![spend]).unwrap_err(),
		Error::TimelockNotSatisfied
	);
}

#[test]
fn input_output_mismatch_rejected() {
	let harness = Harness::new();
	let (id, value) = harness.mine_spendable();
	let short = value.checked_sub(&Currency::from(1)).unwrap();
	let txn = harness.spend(id, vec![coin_output(short, Default::default())], vec![]);
	assert_eq!(
		harness.mine_block(vec![txn]).unwrap_err(),
		Error::CoinInputOutputMismatch
	);
}

#[test]
fn fees_balance_against_outputs() {
	let harness = Harness::new();
	let (id, value) = harness.mine_spendable();
	let fee = Currency::from(12345);
	let change = value.checked_sub(&fee).unwrap();
	let txn = harness.spend(
		id,
		vec![coin_output(change, Default::default())],
		vec![fee],
	);
	harness.mine_block(vec![txn]).unwrap();
}

#[test]
fn double_spend_rolls_back_the_block() {
	let harness = Harness::new();
	let (id, value) = harness.mine_spendable();
	let first = harness.spend(
		id,
		vec![coin_output(value.clone(), Default::default())],
		vec![],
	);
	let second = harness.spend(id, vec![coin_output(value, UnlockHash(hash(1)))], vec![]);

	// the second spend sees the state after the first, so the parent is
	// already gone; the whole block unwinds
	assert_eq!(
		harness.mine_block(vec![first, second]).unwrap_err(),
		Error::MissingCoinOutput
	);
	assert!(harness.chain.coin_output(&id).unwrap().is_some());
	assert_eq!(harness.chain.height().unwrap(), 6);
}

#[test]
fn disrupt_hook_intercepts_acceptance() {
	let _ = env_logger::try_init();
	global::set_chain_type(global::ChainTypes::AutomatedTesting);
	let clock = Arc::new(common::TestClock::starting_at(global::genesis_timestamp()));
	let chain = Chain::with_store(
		Arc::new(MemStore::new()),
		clock,
		Options {
			check_consistency: true,
			disrupt: Some(Box::new(|tag| tag == "AcceptBlock")),
		},
	)
	.unwrap();
	let harness = Harness::new();
	let block = harness.build_block(vec![], 0);
	assert_eq!(
		chain.accept_block(block),
		Err(Error::Disrupted("AcceptBlock"))
	);
}
