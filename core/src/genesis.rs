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

//! Definition of the genesis blocks. The genesis block is never
//! validated; it seeds the block path, the fund allocation and the
//! starting target. On the automated-testing network the fund shares
//! are assigned to the empty unlock conditions so tests can spend them
//! without key management.

use crate::core::block::Block;
use crate::core::currency::Currency;
use crate::core::hash::Hash;
use crate::core::keys::{UnlockConditions, UnlockHash};
use crate::core::transaction::{FundOutput, Transaction};
use crate::global::{self, ChainTypes};

/// The fund allocation of the main network, (share count, address).
const MAINNET_FUND_ALLOCATION: [(u64, [u8; 32]); 3] = [
	(8_000, [0x11; 32]),
	(1_500, [0x22; 32]),
	(500, [0x33; 32]),
];

/// The genesis block for the active chain type.
pub fn genesis_block() -> Block {
	Block {
		parent_id: Default::default(),
		nonce: [0; 8],
		timestamp: global::genesis_timestamp(),
		miner_payouts: vec![],
		transactions: vec![genesis_transaction()],
	}
}

// The genesis transaction carries the initial fund allocation and
// nothing else. It spends no inputs; the genesis block is applied
// without validation.
fn genesis_transaction() -> Transaction {
	let fund_outputs = match global::chain_type() {
		ChainTypes::AutomatedTesting => {
			let anyone = UnlockConditions::default().unlock_hash();
			vec![
				FundOutput {
					value: Currency::from(2_000),
					unlock_hash: anyone,
					claim_start: Currency::zero(),
				},
				FundOutput {
					value: Currency::from(8_000),
					unlock_hash: anyone,
					claim_start: Currency::zero(),
				},
			]
		}
		ChainTypes::Testnet | ChainTypes::Mainnet => MAINNET_FUND_ALLOCATION
			.iter()
			.map(|&(value, addr)| FundOutput {
				value: Currency::from(value),
				unlock_hash: UnlockHash(Hash(addr)),
				claim_start: Currency::zero(),
			})
			.collect(),
	};
	Transaction {
		fund_outputs,
		..Default::default()
	}
}

/// The Foundation's primary unlock hash at the hardfork.
pub fn initial_foundation_primary() -> UnlockHash {
	match global::chain_type() {
		ChainTypes::AutomatedTesting => UnlockConditions::default().unlock_hash(),
		ChainTypes::Testnet | ChainTypes::Mainnet => UnlockHash(Hash([0x44; 32])),
	}
}

/// The Foundation's failsafe unlock hash at the hardfork.
pub fn initial_foundation_failsafe() -> UnlockHash {
	match global::chain_type() {
		ChainTypes::AutomatedTesting => UnlockConditions::default().unlock_hash(),
		ChainTypes::Testnet | ChainTypes::Mainnet => UnlockHash(Hash([0x55; 32])),
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::consensus::TOTAL_FUND_SUPPLY;

	#[test]
	fn genesis_allocates_full_fund_supply() {
		for chain_type in &[ChainTypes::AutomatedTesting, ChainTypes::Mainnet] {
			global::set_chain_type(*chain_type);
			let genesis = genesis_block();
			let total: Currency = genesis.transactions[0]
				.fund_outputs
				.iter()
				.map(|o| &o.value)
				.sum();
			assert_eq!(total, Currency::from(TOTAL_FUND_SUPPLY));
		}
	}
}
