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

//! All the consensus parameters and deterministic schedules: the coin
//! subsidy, the file-contract tax, the Foundation subsidy and the
//! expected total supply those imply. Network-dependent values (heights
//! of hardforks, targets, frequencies) route through `global`.

use crate::core::block::BlockID;
use crate::core::currency::Currency;
use crate::core::transaction::FileContractID;
use crate::crypto::merkle;
use crate::global;

/// A block may never exceed this encoded size in bytes.
pub const BLOCK_SIZE_LIMIT: u64 = 2_000_000;

/// Number of trailing blocks whose timestamps gate a child's timestamp:
/// a new block must be later than the median of this window.
pub const MEDIAN_TIMESTAMP_WINDOW: usize = 11;

/// The constant number of fund shares in existence.
pub const TOTAL_FUND_SUPPLY: u64 = 10_000;

/// Numerator of the file-contract tax rate (3.9%).
pub const TAX_NUMERATOR: u64 = 39;
/// Denominator of the file-contract tax rate.
pub const TAX_DENOMINATOR: u64 = 1_000;

/// Coinbase of the first block, in whole coins.
pub const INITIAL_COINBASE: u64 = 300_000;
/// Floor of the decaying coinbase, in whole coins.
pub const MINIMUM_COINBASE: u64 = 30_000;

/// Number of blocks the per-block retarget window reaches back.
pub const TARGET_WINDOW: u64 = 1_000;

/// Foundation subsidy per block, in whole coins; paid out in lumps every
/// subsidy period.
pub const FOUNDATION_SUBSIDY_PER_BLOCK: u64 = 30_000;

/// One whole coin, at the protocol's precision of 10^24 base units.
pub fn coin_precision() -> Currency {
	let trillion = 1_000_000_000_000u64;
	Currency::from(trillion) * trillion
}

/// `n` whole coins in base units.
pub fn coin(n: u64) -> Currency {
	coin_precision() * n
}

/// The coinbase minted by the block at `height`: starts at the initial
/// coinbase and decays by one coin per block down to the floor. The
/// genesis block mints nothing.
pub fn coinbase(height: u64) -> Currency {
	if height == 0 {
		return Currency::zero();
	}
	let whole = INITIAL_COINBASE
		.saturating_sub(height)
		.max(MINIMUM_COINBASE);
	coin(whole)
}

/// The portion of a file-contract payout collected for the fund pool.
/// Before the tax hardfork the raw rate applies; from the hardfork on
/// the result is rounded down to a multiple of the fund supply so that
/// per-share claims divide evenly.
pub fn tax(height: u64, payout: &Currency) -> Currency {
	let raw = payout.mul_div(TAX_NUMERATOR, TAX_DENOMINATOR);
	if height < global::tax_hardfork_height() {
		raw
	} else {
		raw.round_down(TOTAL_FUND_SUPPLY)
	}
}

/// The Foundation subsidy minted by the block at `height`, if any.
/// Subsidies appear at the hardfork height and every subsidy period
/// thereafter, covering the blocks of one period each.
pub fn foundation_subsidy(height: u64) -> Option<Currency> {
	let hardfork = global::foundation_hardfork_height();
	if height < hardfork {
		return None;
	}
	let frequency = global::foundation_subsidy_frequency();
	if (height - hardfork) % frequency != 0 {
		return None;
	}
	Some(coin(FOUNDATION_SUBSIDY_PER_BLOCK) * frequency)
}

// Sum of coinbases for heights 1..=height, in whole coins.
fn coinbase_sum_whole(height: u64) -> u64 {
	let decay_span = INITIAL_COINBASE - MINIMUM_COINBASE;
	if height <= decay_span {
		height * INITIAL_COINBASE - height * (height + 1) / 2
	} else {
		let decayed = decay_span * INITIAL_COINBASE - decay_span * (decay_span + 1) / 2;
		decayed + (height - decay_span) * MINIMUM_COINBASE
	}
}

/// The total number of coins the chain is expected to have minted up to
/// and including `height`: every coinbase plus every Foundation
/// subsidy. The conservation invariant checks live state against this.
pub fn expected_coin_supply(height: u64) -> Currency {
	let mut supply = coin(coinbase_sum_whole(height));
	let hardfork = global::foundation_hardfork_height();
	if height >= hardfork {
		let frequency = global::foundation_subsidy_frequency();
		let periods = (height - hardfork) / frequency + 1;
		supply += coin(FOUNDATION_SUBSIDY_PER_BLOCK) * frequency * periods;
	}
	supply
}

/// The deterministic segment index a storage proof must open: derived
/// from the id of the block at the contract's window start and the
/// contract id, modulo the number of segments. Zero for an empty file.
pub fn storage_proof_segment(
	trigger_id: &BlockID,
	contract_id: &FileContractID,
	file_size: u64,
) -> u64 {
	let num_segments = merkle::segment_count(file_size);
	if num_segments == 0 {
		return 0;
	}
	hash_all!(trigger_id.0, contract_id.0).to_u64() % num_segments
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::global::{self, ChainTypes};

	#[test]
	fn coinbase_decays_to_floor() {
		assert_eq!(coinbase(0), Currency::zero());
		assert_eq!(coinbase(1), coin(INITIAL_COINBASE - 1));
		assert_eq!(coinbase(270_000), coin(MINIMUM_COINBASE));
		assert_eq!(coinbase(1_000_000), coin(MINIMUM_COINBASE));
	}

	#[test]
	fn coinbase_sum_matches_iteration() {
		for height in &[0u64, 1, 2, 50, 1000] {
			let mut total = Currency::zero();
			for h in 1..=*height {
				total += coinbase(h);
			}
			assert_eq!(coin(coinbase_sum_whole(*height)), total, "{}", height);
		}
	}

	#[test]
	fn tax_rounding_after_hardfork() {
		global::set_chain_type(ChainTypes::AutomatedTesting);
		let payout = coin(100);
		let post = tax(global::tax_hardfork_height(), &payout);
		assert_eq!(post, post.round_down(TOTAL_FUND_SUPPLY));
	}
}
