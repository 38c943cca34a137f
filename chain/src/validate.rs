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

//! State-dependent transaction validation. Runs after stand-alone
//! validation and against the state as of the previous transaction in
//! the same block, so an in-block double spend fails exactly like any
//! other missing output.

use std::collections::HashSet;

use uplo_core::consensus;
use uplo_core::core::currency::Currency;
use uplo_core::core::transaction::{self, Transaction};
use uplo_core::crypto::merkle;
use uplo_core::global;

use crate::apply::parse_foundation_update;
use crate::error::Error;
use crate::state;
use crate::store::WriteTx;

/// Validates one transaction against the current state at `height`.
pub fn valid_transaction(
	tx: &dyn WriteTx,
	txn: &Transaction,
	height: u64,
) -> Result<(), Error> {
	txn.standalone_valid(height)?;
	valid_coin_inputs(tx, txn, height)?;
	valid_file_contract_revisions(tx, txn, height)?;
	valid_storage_proofs(tx, txn, height)?;
	valid_fund_flows(tx, txn, height)?;
	valid_foundation_updates(tx, txn, height)?;
	Ok(())
}

fn valid_coin_inputs(tx: &dyn WriteTx, txn: &Transaction, height: u64) -> Result<(), Error> {
	let mut input_sum = Currency::zero();
	for input in &txn.coin_inputs {
		let output =
			state::get_coin_output(tx, &input.parent_id)?.ok_or(Error::MissingCoinOutput)?;
		if input.unlock_conditions.unlock_hash() != output.unlock_hash {
			return Err(Error::WrongUnlockConditions);
		}
		if height < input.unlock_conditions.timelock {
			return Err(Error::TimelockNotSatisfied);
		}
		input_sum += output.value;
	}
	if input_sum != txn.coin_output_sum() {
		return Err(Error::CoinInputOutputMismatch);
	}
	Ok(())
}

fn valid_file_contract_revisions(
	tx: &dyn WriteTx,
	txn: &Transaction,
	height: u64,
) -> Result<(), Error> {
	for revision in &txn.file_contract_revisions {
		let contract = state::get_file_contract(tx, &revision.parent_id)?
			.ok_or(Error::UnrecognizedFileContractID)?;
		if height >= contract.window_start {
			return Err(Error::LateRevision);
		}
		if revision.new_revision_number <= contract.revision_number {
			return Err(Error::LowRevisionNumber);
		}
		if revision.unlock_conditions.unlock_hash() != contract.unlock_hash {
			return Err(Error::WrongUnlockConditions);
		}
		if height < revision.unlock_conditions.timelock {
			return Err(Error::TimelockNotSatisfied);
		}
		if revision.new_valid_proof_output_sum() != contract.valid_proof_output_sum()
			|| revision.new_missed_proof_output_sum() != contract.missed_proof_output_sum()
		{
			return Err(Error::AlteredRevisionPayouts);
		}
	}
	Ok(())
}

fn valid_storage_proofs(tx: &dyn WriteTx, txn: &Transaction, height: u64) -> Result<(), Error> {
	let mut proven: HashSet<_> = HashSet::new();
	for proof in &txn.storage_proofs {
		if !proven.insert(proof.parent_id) {
			return Err(Error::Transaction(transaction::Error::DoubleSpend));
		}
		let contract = state::get_file_contract(tx, &proof.parent_id)?
			.ok_or(Error::UnrecognizedFileContractID)?;
		if height <= contract.window_start {
			return Err(Error::UnfinishedFileContract);
		}

		if contract.file_size == 0 {
			// a proof of an empty file carries nothing to prove; only
			// accepted once the hardfork activating them has passed
			if height < global::empty_proof_hardfork_height()
				|| !proof.hash_set.is_empty()
				|| proof.segment.iter().any(|&b| b != 0)
			{
				return Err(Error::InvalidStorageProof);
			}
			continue;
		}

		let trigger_id = state::get_path(tx, contract.window_start)?.ok_or_else(|| {
			Error::InconsistentState("proof window opened beyond the chain tip".to_string())
		})?;
		let segment_index = consensus::storage_proof_segment(
			&trigger_id,
			&proof.parent_id,
			contract.file_size,
		);
		let num_segments = contract.segment_count();

		// the last segment of an unaligned file is proven truncated
		let segment_len = if segment_index == num_segments - 1
			&& contract.file_size % merkle::SEGMENT_SIZE as u64 != 0
		{
			(contract.file_size % merkle::SEGMENT_SIZE as u64) as usize
		} else {
			merkle::SEGMENT_SIZE
		};
		let ok = merkle::verify_segment(
			&proof.segment[..segment_len],
			&proof.hash_set,
			num_segments,
			segment_index,
			contract.file_merkle_root,
		);
		if !ok {
			return Err(Error::InvalidStorageProof);
		}
	}
	Ok(())
}

fn valid_fund_flows(tx: &dyn WriteTx, txn: &Transaction, height: u64) -> Result<(), Error> {
	let mut input_sum = Currency::zero();
	for input in &txn.fund_inputs {
		let output =
			state::get_fund_output(tx, &input.parent_id)?.ok_or(Error::MissingFundOutput)?;
		if input.unlock_conditions.unlock_hash() != output.unlock_hash {
			return Err(Error::WrongUnlockConditions);
		}
		if height < input.unlock_conditions.timelock {
			return Err(Error::TimelockNotSatisfied);
		}
		input_sum += output.value;
	}
	let output_sum: Currency = txn.fund_outputs.iter().map(|o| &o.value).sum();
	if input_sum != output_sum {
		return Err(Error::FundInputOutputMismatch);
	}
	Ok(())
}

// A Foundation update is authorized when one of the transaction's coin
// inputs is controlled by the current primary or failsafe address.
fn valid_foundation_updates(
	tx: &dyn WriteTx,
	txn: &Transaction,
	height: u64,
) -> Result<(), Error> {
	if height < global::foundation_hardfork_height() {
		// before the hardfork the specifier has no meaning
		return Ok(());
	}
	for data in &txn.arbitrary_data {
		let update = match parse_foundation_update(data) {
			None => continue,
			Some(Err(_)) => return Err(Error::InvalidFoundationUpdate),
			Some(Ok(update)) => update,
		};
		let _ = update;
		let (primary, failsafe) = match state::get_foundation(tx)? {
			Some(pair) => pair,
			// the hardfork block itself has no addresses yet
			None => return Err(Error::UnsignedFoundationUpdate),
		};
		let authorized = txn.coin_inputs.iter().any(|input| {
			let hash = input.unlock_conditions.unlock_hash();
			hash == primary || hash == failsafe
		});
		if !authorized {
			return Err(Error::UnsignedFoundationUpdate);
		}
	}
	Ok(())
}
