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

//! Common helpers shared by the core integration tests.

use uplo_core as core;

use self::core::core::currency::Currency;
use self::core::core::hash::Hash;
use self::core::core::keys::{PublicKey, UnlockConditions, UnlockHash};
use self::core::core::transaction::{
	CoinInput, CoinOutput, CoinOutputID, CoveredFields, Transaction, TransactionSignature,
};
use self::core::crypto::signature::Keypair;

/// A deterministic keypair for tests.
pub fn keypair(seed: u8) -> Keypair {
	Keypair::from_seed([seed; 32])
}

/// Single-signature unlock conditions for a keypair.
pub fn single_sig(keypair: &Keypair) -> UnlockConditions {
	UnlockConditions::single_sig(keypair.public_key())
}

/// A coin output of `value` base units to `unlock_hash`.
pub fn coin_output(value: u64, unlock_hash: UnlockHash) -> CoinOutput {
	CoinOutput {
		value: Currency::from(value),
		unlock_hash,
	}
}

/// A transaction spending one input under the given conditions, with an
/// unsigned whole-transaction signature slot per required signature.
pub fn spend_txn(
	parent_id: CoinOutputID,
	conditions: UnlockConditions,
	outputs: Vec<CoinOutput>,
) -> Transaction {
	let mut txn = Transaction {
		coin_inputs: vec![CoinInput {
			parent_id,
			unlock_conditions: conditions.clone(),
		}],
		coin_outputs: outputs,
		..Default::default()
	};
	for i in 0..conditions.signatures_required {
		txn.transaction_signatures.push(TransactionSignature {
			parent_id: parent_id.0,
			public_key_index: i,
			timelock: 0,
			covered_fields: CoveredFields::whole_transaction(),
			signature: vec![],
		});
	}
	txn
}

/// Fills in signature `i` by signing its sighash with `keypair`.
pub fn sign(txn: &mut Transaction, i: usize, keypair: &Keypair, height: u64) {
	let hash = txn.sig_hash(i, height);
	txn.transaction_signatures[i].signature = keypair.sign(&hash);
}

/// A public key under an algorithm nobody recognizes.
pub fn unknown_key(seed: u8) -> PublicKey {
	PublicKey {
		algorithm: self::core::core::keys::Specifier(*b"frobnicator\0\0\0\0\0"),
		key: vec![seed; 32],
	}
}

/// A throwaway hash.
pub fn hash(seed: u8) -> Hash {
	Hash([seed; 32])
}
