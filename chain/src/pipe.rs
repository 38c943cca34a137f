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

//! The block acceptance pipeline: header checks, fork choice by
//! cumulative work, and the revert/apply walk of a fork swap. Runs
//! entirely inside one write transaction; any error leaves on-disk
//! state indistinguishable from before the call.

use uplo_core::consensus;
use uplo_core::core::block::{Block, BlockID};
use uplo_core::core::hash::ZERO_HASH;
use uplo_core::core::target::Target;
use uplo_core::global;

use crate::apply;
use crate::error::Error;
use crate::state;
use crate::store::{ReadTx, WriteTx};
use crate::subscribe::ChangeEntry;
use crate::types::ProcessedBlock;

/// What acceptance did, when it did not fail outright.
pub enum Outcome {
	/// The block extended (or reorganized onto) the heaviest chain and
	/// produced a committed change entry.
	Extended {
		/// The recorded change.
		entry: ChangeEntry,
		/// Its position in the change log.
		seq: u64,
	},
	/// The block was stored on a side branch. The caller reports
	/// `NonExtendingBlock` after committing.
	SideBranch,
}

/// Runs the full acceptance pipeline for `block` inside `tx`.
pub fn process_block(
	tx: &mut dyn WriteTx,
	block: &Block,
	now: u64,
	check_consistency: bool,
) -> Result<Outcome, Error> {
	let id = block.id();
	if state::get_processed_block(&*tx, &id)?.is_some() {
		return Err(Error::BlockKnown);
	}
	let parent = state::get_processed_block(&*tx, &block.parent_id)?.ok_or(Error::Orphan)?;
	let height = parent.height + 1;

	if !parent.child_target.meets(&id.0) {
		return Err(Error::BlockUnsolved);
	}
	if block.timestamp <= minimum_valid_child_timestamp(&*tx, &parent)? {
		return Err(Error::EarlyTimestamp);
	}
	if block.timestamp > now + global::extreme_future_threshold() {
		return Err(Error::ExtremeFutureTimestamp);
	}
	if block.timestamp > now + global::future_threshold() {
		return Err(Error::FutureTimestamp);
	}
	if block.encoded_len() > consensus::BLOCK_SIZE_LIMIT {
		return Err(Error::LargeBlock);
	}

	let child_target = child_target(tx, &parent, block)?;
	let total_work = &parent.total_work + &parent.child_target.difficulty();
	let pb = ProcessedBlock {
		block: block.clone(),
		height,
		total_work,
		child_target,
		diffs: vec![],
		consensus_checksum: ZERO_HASH,
	};

	let current_height = state::get_height(&*tx)?;
	let tip_id = state::get_path(&*tx, current_height)?.ok_or_else(|| {
		Error::InconsistentState("canonical path misses its own tip".to_string())
	})?;
	let tip = state::get_processed_block(&*tx, &tip_id)?.ok_or_else(|| {
		Error::InconsistentState("tip block missing from the block map".to_string())
	})?;

	// Fork choice: strictly more cumulative work, or the incumbent
	// chain stays.
	if pb.total_work <= tip.total_work {
		state::put_processed_block(tx, &pb)?;
		return Ok(Outcome::SideBranch);
	}

	// Collect the new branch back to the common ancestor. The loop
	// terminates because genesis is always on the canonical path.
	let mut new_chain: Vec<ProcessedBlock> = vec![];
	let mut cursor = parent.clone();
	while state::get_path(&*tx, cursor.height)? != Some(cursor.block.id()) {
		new_chain.push(cursor.clone());
		cursor = state::get_processed_block(&*tx, &cursor.block.parent_id)?.ok_or_else(
			|| Error::InconsistentState("side branch detached from the block map".to_string()),
		)?;
	}
	let ancestor_height = cursor.height;
	new_chain.reverse();
	new_chain.push(pb);

	// Revert the old branch, newest first, verifying the recorded
	// checksum of each uncovered state.
	let mut reverted: Vec<BlockID> = vec![];
	for h in (ancestor_height + 1..=current_height).rev() {
		let rid = state::get_path(&*tx, h)?.ok_or_else(|| {
			Error::InconsistentState("canonical path has a hole".to_string())
		})?;
		let rpb = state::get_processed_block(&*tx, &rid)?.ok_or_else(|| {
			Error::InconsistentState("canonical block missing from the block map".to_string())
		})?;
		apply::revert_block(tx, &rpb)?;
		state::pop_path(tx, h)?;
		state::set_height(tx, h - 1)?;

		let uncovered_id = state::get_path(&*tx, h - 1)?.ok_or_else(|| {
			Error::InconsistentState("canonical path has a hole".to_string())
		})?;
		let uncovered = state::get_processed_block(&*tx, &uncovered_id)?.ok_or_else(|| {
			Error::InconsistentState("canonical block missing from the block map".to_string())
		})?;
		if state::consensus_checksum(&*tx)? != uncovered.consensus_checksum {
			return Err(Error::ChecksumMismatch);
		}
		reverted.push(rid);
	}

	// Apply the new branch in order, regenerating diffs for blocks that
	// previously sat on the side branch.
	let mut applied: Vec<BlockID> = vec![];
	for mut ab in new_chain {
		let ab_id = ab.block.id();
		state::push_path(tx, ab.height, &ab_id)?;
		state::set_height(tx, ab.height)?;
		ab.diffs = apply::apply_block(tx, &ab.block, ab.height)?;
		ab.consensus_checksum = state::consensus_checksum(&*tx)?;
		if check_consistency {
			state::check_consistency(&*tx, ab.height)?;
		}
		state::put_processed_block(tx, &ab)?;
		applied.push(ab_id);
	}

	let entry = ChangeEntry {
		reverted_blocks: reverted,
		applied_blocks: applied,
	};
	let seq = state::append_change(tx, &entry)?;
	Ok(Outcome::Extended { entry, seq })
}

/// The lowest timestamp a child of `parent` may carry: the median of
/// the last eleven block timestamps ending at the parent.
pub fn minimum_valid_child_timestamp<T: ReadTx + ?Sized>(
	tx: &T,
	parent: &ProcessedBlock,
) -> Result<u64, Error> {
	let mut timestamps = vec![parent.block.timestamp];
	let mut cursor = parent.clone();
	while timestamps.len() < consensus::MEDIAN_TIMESTAMP_WINDOW && cursor.height > 0 {
		cursor = state::get_processed_block(tx, &cursor.block.parent_id)?.ok_or_else(|| {
			Error::InconsistentState("ancestor missing from the block map".to_string())
		})?;
		timestamps.push(cursor.block.timestamp);
	}
	timestamps.sort_unstable();
	Ok(timestamps[timestamps.len() / 2])
}

// The target for children of the incoming block: the parent's child
// target scaled by how the chain's pace compares to the block-frequency
// schedule over the retarget window.
fn child_target(
	tx: &dyn WriteTx,
	parent: &ProcessedBlock,
	block: &Block,
) -> Result<Target, Error> {
	if parent.height == 0 {
		return Ok(global::root_target());
	}
	let window = parent.height.min(consensus::TARGET_WINDOW);
	let mut anchor = parent.clone();
	for _ in 0..window {
		anchor = state::get_processed_block(tx, &anchor.block.parent_id)?.ok_or_else(|| {
			Error::InconsistentState("ancestor missing from the block map".to_string())
		})?;
	}
	let elapsed = block.timestamp.saturating_sub(anchor.block.timestamp);
	let expected = window * global::block_frequency();
	Ok(parent.child_target.retarget(elapsed, expected))
}
