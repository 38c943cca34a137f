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

//! Applying and reverting blocks.
//!
//! Every state mutation is funneled through the diff engine: apply
//! validates each transaction, commits its diffs and records them, then
//! runs the block's maintenance (miner payouts, matured outputs,
//! contract expirations, the Foundation subsidy). Revert replays the
//! recorded diff list backwards and restores any Foundation snapshot.

use uplo_core::consensus;
use uplo_core::core::block::Block;
use uplo_core::core::keys::{UnlockHash, SPECIFIER_FOUNDATION};
use uplo_core::core::transaction::{CoinOutput, FileContract, Transaction};
use uplo_core::genesis;
use uplo_core::global;
use uplo_core::ser::{self, Readable, Reader, Writeable, Writer};

use crate::diff::{commit_diff, commit_diff_set, Diff, DiffDirection};
use crate::error::Error;
use crate::state;
use crate::store::WriteTx;
use crate::types::ProcessedBlock;
use crate::validate;

/// A Foundation unlock-hash update carried in arbitrary data after the
/// Foundation specifier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FoundationUpdate {
	/// The replacement primary address.
	pub new_primary: UnlockHash,
	/// The replacement failsafe address.
	pub new_failsafe: UnlockHash,
}

impl Writeable for FoundationUpdate {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		self.new_primary.write(writer)?;
		self.new_failsafe.write(writer)
	}
}

impl Readable for FoundationUpdate {
	fn read(reader: &mut dyn Reader) -> Result<FoundationUpdate, ser::Error> {
		Ok(FoundationUpdate {
			new_primary: UnlockHash::read(reader)?,
			new_failsafe: UnlockHash::read(reader)?,
		})
	}
}

/// Encodes an update as an arbitrary-data entry.
pub fn encode_foundation_update(update: &FoundationUpdate) -> Vec<u8> {
	let mut data = SPECIFIER_FOUNDATION.0.to_vec();
	data.extend_from_slice(&ser::ser_vec(update).expect("in-memory serialization"));
	data
}

/// Recognizes a Foundation update in an arbitrary-data entry: None when
/// the specifier is absent, otherwise the decode result.
pub fn parse_foundation_update(data: &[u8]) -> Option<Result<FoundationUpdate, ser::Error>> {
	if data.len() < 16 || data[..16] != SPECIFIER_FOUNDATION.0 {
		return None;
	}
	Some(ser::deserialize_default(&mut &data[16..]))
}

// Commits a diff and records it in the block's diff list.
pub(crate) fn push_diff(
	tx: &mut dyn WriteTx,
	diffs: &mut Vec<Diff>,
	diff: Diff,
) -> Result<(), Error> {
	commit_diff(tx, &diff, DiffDirection::Apply)?;
	diffs.push(diff);
	Ok(())
}

/// Validates and applies one transaction, recording its diffs.
pub fn apply_transaction(
	tx: &mut dyn WriteTx,
	diffs: &mut Vec<Diff>,
	height: u64,
	txn: &Transaction,
) -> Result<(), Error> {
	validate::valid_transaction(&*tx, txn, height)?;

	for input in &txn.coin_inputs {
		let output = state::get_coin_output(&*tx, &input.parent_id)?
			.ok_or(Error::MissingCoinOutput)?;
		push_diff(
			tx,
			diffs,
			Diff::CoinOutput {
				direction: DiffDirection::Revert,
				id: input.parent_id,
				output,
			},
		)?;
	}
	for (i, output) in txn.coin_outputs.iter().enumerate() {
		push_diff(
			tx,
			diffs,
			Diff::CoinOutput {
				direction: DiffDirection::Apply,
				id: txn.coin_output_id(i as u64),
				output: output.clone(),
			},
		)?;
	}
	for (i, contract) in txn.file_contracts.iter().enumerate() {
		push_diff(
			tx,
			diffs,
			Diff::FileContract {
				direction: DiffDirection::Apply,
				id: txn.file_contract_id(i as u64),
				contract: contract.clone(),
			},
		)?;
		let previous = state::get_fund_pool(&*tx)?;
		let adjusted = &previous + &consensus::tax(height, &contract.payout);
		push_diff(
			tx,
			diffs,
			Diff::FundPool {
				previous,
				adjusted,
			},
		)?;
	}
	for revision in &txn.file_contract_revisions {
		let contract = state::get_file_contract(&*tx, &revision.parent_id)?
			.ok_or(Error::UnrecognizedFileContractID)?;
		push_diff(
			tx,
			diffs,
			Diff::FileContract {
				direction: DiffDirection::Revert,
				id: revision.parent_id,
				contract: contract.clone(),
			},
		)?;
		let revised = FileContract {
			file_size: revision.new_file_size,
			file_merkle_root: revision.new_file_merkle_root,
			window_start: revision.new_window_start,
			window_end: revision.new_window_end,
			payout: contract.payout,
			valid_proof_outputs: revision.new_valid_proof_outputs.clone(),
			missed_proof_outputs: revision.new_missed_proof_outputs.clone(),
			unlock_hash: revision.new_unlock_hash,
			revision_number: revision.new_revision_number,
		};
		push_diff(
			tx,
			diffs,
			Diff::FileContract {
				direction: DiffDirection::Apply,
				id: revision.parent_id,
				contract: revised,
			},
		)?;
	}
	for proof in &txn.storage_proofs {
		let contract = state::get_file_contract(&*tx, &proof.parent_id)?
			.ok_or(Error::UnrecognizedFileContractID)?;
		for (i, output) in contract.valid_proof_outputs.iter().enumerate() {
			push_diff(
				tx,
				diffs,
				Diff::DelayedCoinOutput {
					direction: DiffDirection::Apply,
					id: proof.parent_id.storage_proof_output_id(true, i as u64),
					output: output.clone(),
					maturity_height: height + global::maturity_delay(),
				},
			)?;
		}
		push_diff(
			tx,
			diffs,
			Diff::FileContract {
				direction: DiffDirection::Revert,
				id: proof.parent_id,
				contract,
			},
		)?;
	}
	for input in &txn.fund_inputs {
		let output = state::get_fund_output(&*tx, &input.parent_id)?
			.ok_or(Error::MissingFundOutput)?;
		let pool = state::get_fund_pool(&*tx)?;
		let accrued = pool.checked_sub(&output.claim_start).ok_or_else(|| {
			Error::InconsistentState("fund output claim start exceeds the pool".to_string())
		})?;
		let claim = accrued.mul_div(
			state::fund_value_u64(&output.value),
			consensus::TOTAL_FUND_SUPPLY,
		);
		push_diff(
			tx,
			diffs,
			Diff::DelayedCoinOutput {
				direction: DiffDirection::Apply,
				id: input.parent_id.claim_output_id(),
				output: CoinOutput {
					value: claim,
					unlock_hash: input.claim_unlock_hash,
				},
				maturity_height: height + global::maturity_delay(),
			},
		)?;
		push_diff(
			tx,
			diffs,
			Diff::FundOutput {
				direction: DiffDirection::Revert,
				id: input.parent_id,
				output,
			},
		)?;
	}
	for (i, output) in txn.fund_outputs.iter().enumerate() {
		let mut output = output.clone();
		output.claim_start = state::get_fund_pool(&*tx)?;
		push_diff(
			tx,
			diffs,
			Diff::FundOutput {
				direction: DiffDirection::Apply,
				id: txn.fund_output_id(i as u64),
				output,
			},
		)?;
	}
	apply_foundation_updates(tx, diffs, height, txn)?;
	Ok(())
}

// Honors the first valid Foundation update of a block: snapshots the
// prior addresses keyed by height (which is also how later updates in
// the same block are recognized and ignored), installs the new pair and
// rewrites every still-live subsidy output to the new primary address.
fn apply_foundation_updates(
	tx: &mut dyn WriteTx,
	diffs: &mut Vec<Diff>,
	height: u64,
	txn: &Transaction,
) -> Result<(), Error> {
	if height < global::foundation_hardfork_height() {
		return Ok(());
	}
	for data in &txn.arbitrary_data {
		let update = match parse_foundation_update(data) {
			None => continue,
			Some(Err(_)) => return Err(Error::InvalidFoundationUpdate),
			Some(Ok(update)) => update,
		};
		if state::get_foundation_snapshot(&*tx, height)?.is_some() {
			// an update already happened in this block
			continue;
		}
		let (old_primary, old_failsafe) = match state::get_foundation(&*tx)? {
			Some(pair) => pair,
			None => return Err(Error::UnsignedFoundationUpdate),
		};
		state::put_foundation_snapshot(tx, height, &old_primary, &old_failsafe)?;
		state::set_foundation(tx, &update.new_primary, &update.new_failsafe)?;

		// move the unspent subsidies into the new primary's control
		let hardfork = global::foundation_hardfork_height();
		let frequency = global::foundation_subsidy_frequency();
		let mut subsidy_height = hardfork;
		while subsidy_height <= height {
			if let Some(block_id) = state::get_path(&*tx, subsidy_height)? {
				let id = block_id.foundation_subsidy_id();
				if let Some(output) = state::get_coin_output(&*tx, &id)? {
					if output.unlock_hash == old_primary {
						push_diff(
							tx,
							diffs,
							Diff::CoinOutput {
								direction: DiffDirection::Revert,
								id,
								output: output.clone(),
							},
						)?;
						push_diff(
							tx,
							diffs,
							Diff::CoinOutput {
								direction: DiffDirection::Apply,
								id,
								output: CoinOutput {
									value: output.value,
									unlock_hash: update.new_primary,
								},
							},
						)?;
					}
				}
			}
			subsidy_height += frequency;
		}
	}
	Ok(())
}

/// Applies a block's transactions and maintenance at `height`,
/// returning the ordered diff list.
pub fn apply_block(
	tx: &mut dyn WriteTx,
	block: &Block,
	height: u64,
) -> Result<Vec<Diff>, Error> {
	let expected_payout = consensus::coinbase(height) + block.total_fees();
	if block.miner_payout_sum() != expected_payout {
		return Err(Error::BadMinerPayouts);
	}

	let mut diffs = vec![];
	for txn in &block.transactions {
		apply_transaction(tx, &mut diffs, height, txn)?;
	}
	apply_miner_payouts(tx, &mut diffs, block, height)?;
	apply_matured_outputs(tx, &mut diffs, height)?;
	apply_contract_maintenance(tx, &mut diffs, height)?;
	apply_foundation_subsidy(tx, &mut diffs, block, height)?;
	Ok(diffs)
}

fn apply_miner_payouts(
	tx: &mut dyn WriteTx,
	diffs: &mut Vec<Diff>,
	block: &Block,
	height: u64,
) -> Result<(), Error> {
	for (i, payout) in block.miner_payouts.iter().enumerate() {
		push_diff(
			tx,
			diffs,
			Diff::DelayedCoinOutput {
				direction: DiffDirection::Apply,
				id: block.miner_payout_id(i as u64),
				output: payout.clone(),
				maturity_height: height + global::maturity_delay(),
			},
		)?;
	}
	Ok(())
}

fn apply_matured_outputs(
	tx: &mut dyn WriteTx,
	diffs: &mut Vec<Diff>,
	height: u64,
) -> Result<(), Error> {
	for (id, output) in state::delayed_outputs_at(&*tx, height)? {
		push_diff(
			tx,
			diffs,
			Diff::CoinOutput {
				direction: DiffDirection::Apply,
				id,
				output: output.clone(),
			},
		)?;
		push_diff(
			tx,
			diffs,
			Diff::DelayedCoinOutput {
				direction: DiffDirection::Revert,
				id,
				output,
				maturity_height: height,
			},
		)?;
	}
	Ok(())
}

// Contracts whose window closes at this height expire: their missed
// outputs enter the maturation pipeline and the contract dies.
fn apply_contract_maintenance(
	tx: &mut dyn WriteTx,
	diffs: &mut Vec<Diff>,
	height: u64,
) -> Result<(), Error> {
	for id in state::expiring_contracts_at(&*tx, height)? {
		let contract = state::get_file_contract(&*tx, &id)?.ok_or_else(|| {
			Error::InconsistentState(format!("expiration entry for a missing contract {}", id))
		})?;
		for (i, output) in contract.missed_proof_outputs.iter().enumerate() {
			push_diff(
				tx,
				diffs,
				Diff::DelayedCoinOutput {
					direction: DiffDirection::Apply,
					id: id.storage_proof_output_id(false, i as u64),
					output: output.clone(),
					maturity_height: height + global::maturity_delay(),
				},
			)?;
		}
		push_diff(
			tx,
			diffs,
			Diff::FileContract {
				direction: DiffDirection::Revert,
				id,
				contract,
			},
		)?;
	}
	Ok(())
}

fn apply_foundation_subsidy(
	tx: &mut dyn WriteTx,
	diffs: &mut Vec<Diff>,
	block: &Block,
	height: u64,
) -> Result<(), Error> {
	if height == global::foundation_hardfork_height() {
		state::set_foundation(
			tx,
			&genesis::initial_foundation_primary(),
			&genesis::initial_foundation_failsafe(),
		)?;
	}
	if let Some(value) = consensus::foundation_subsidy(height) {
		let (primary, _) = state::get_foundation(&*tx)?.ok_or_else(|| {
			Error::InconsistentState("subsidy height without foundation addresses".to_string())
		})?;
		push_diff(
			tx,
			diffs,
			Diff::DelayedCoinOutput {
				direction: DiffDirection::Apply,
				id: block.id().foundation_subsidy_id(),
				output: CoinOutput {
					value,
					unlock_hash: primary,
				},
				maturity_height: height + global::maturity_delay(),
			},
		)?;
	}
	Ok(())
}

/// Reverts a processed block: replays its diff list backwards and
/// restores the Foundation addresses it replaced.
pub fn revert_block(tx: &mut dyn WriteTx, pb: &ProcessedBlock) -> Result<(), Error> {
	commit_diff_set(tx, &pb.diffs, DiffDirection::Revert)?;
	if let Some((primary, failsafe)) = state::get_foundation_snapshot(&*tx, pb.height)? {
		state::set_foundation(tx, &primary, &failsafe)?;
		state::remove_foundation_snapshot(tx, pb.height)?;
	}
	if pb.height == global::foundation_hardfork_height() {
		state::clear_foundation(tx)?;
	}
	Ok(())
}
