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

//! Values that should be converted into configuration options are
//! gathered here: everything that varies between the main network, the
//! test network and the automated-testing network. Tests select the
//! automated-testing parameters, which shrink every delay and hardfork
//! height so full lifecycles fit in a handful of blocks.

use crate::core::target::Target;
use util::RwLock;

/// Types of chain a server can run with, dictates the genesis block and
/// the network parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum ChainTypes {
	/// For CI testing
	AutomatedTesting,
	/// Protocol testing network
	Testnet,
	/// Main production network
	Mainnet,
}

impl Default for ChainTypes {
	fn default() -> ChainTypes {
		ChainTypes::Mainnet
	}
}

lazy_static! {
	/// The active chain type, set once at startup.
	pub static ref CHAIN_TYPE: RwLock<ChainTypes> = RwLock::new(ChainTypes::Mainnet);
}

/// Set the chain type at startup (tests may call this repeatedly).
pub fn set_chain_type(new_type: ChainTypes) {
	let mut chain_type = CHAIN_TYPE.write();
	*chain_type = new_type;
}

/// The active chain type.
pub fn chain_type() -> ChainTypes {
	*CHAIN_TYPE.read()
}

/// Target number of seconds between blocks.
pub fn block_frequency() -> u64 {
	match chain_type() {
		ChainTypes::AutomatedTesting => 10,
		ChainTypes::Testnet | ChainTypes::Mainnet => 600,
	}
}

/// Number of blocks before a delayed coin output (coinbase, contract
/// payout, fund claim) matures into a spendable output.
pub fn maturity_delay() -> u64 {
	match chain_type() {
		ChainTypes::AutomatedTesting => 5,
		ChainTypes::Testnet | ChainTypes::Mainnet => 144,
	}
}

/// How far in the future a block timestamp may lie and still be
/// accepted.
pub fn future_threshold() -> u64 {
	match chain_type() {
		ChainTypes::AutomatedTesting => 3 * 60,
		ChainTypes::Testnet | ChainTypes::Mainnet => 3 * 60 * 60,
	}
}

/// Beyond this horizon a timestamp is considered hostile rather than
/// merely early.
pub fn extreme_future_threshold() -> u64 {
	2 * future_threshold()
}

/// The target the genesis block's children must meet.
pub fn root_target() -> Target {
	match chain_type() {
		ChainTypes::AutomatedTesting => Target::max(),
		ChainTypes::Testnet => {
			let mut t = [0u8; 32];
			t[0] = 0x08;
			Target(t)
		}
		ChainTypes::Mainnet => {
			let mut t = [0u8; 32];
			t[3] = 0x01;
			Target(t)
		}
	}
}

/// Timestamp of the genesis block.
pub fn genesis_timestamp() -> u64 {
	match chain_type() {
		ChainTypes::AutomatedTesting => 1_000_000,
		ChainTypes::Testnet => 1_522_000_000,
		ChainTypes::Mainnet => 1_433_600_000,
	}
}

/// Height of the hardfork that introduced the Foundation subsidy and
/// unlock-hash history, and with it sighash replay protection.
pub fn foundation_hardfork_height() -> u64 {
	match chain_type() {
		ChainTypes::AutomatedTesting => 5,
		ChainTypes::Testnet => 10_000,
		ChainTypes::Mainnet => 298_000,
	}
}

/// Blocks between Foundation subsidy payouts.
pub fn foundation_subsidy_frequency() -> u64 {
	match chain_type() {
		ChainTypes::AutomatedTesting => 5,
		ChainTypes::Testnet => 100,
		ChainTypes::Mainnet => 4_380,
	}
}

/// Height from which an empty storage proof is valid for a zero-size
/// file. Before it such proofs are rejected outright.
pub fn empty_proof_hardfork_height() -> u64 {
	match chain_type() {
		ChainTypes::AutomatedTesting => 3,
		ChainTypes::Testnet => 5_000,
		ChainTypes::Mainnet => 179_000,
	}
}

/// Height from which the file-contract tax is rounded down to a
/// multiple of the fund supply. Always active on the testing network so
/// that per-share claims divide exactly and conservation checks hold to
/// the base unit.
pub fn tax_hardfork_height() -> u64 {
	match chain_type() {
		ChainTypes::AutomatedTesting => 0,
		ChainTypes::Testnet => 1_000,
		ChainTypes::Mainnet => 21_000,
	}
}
