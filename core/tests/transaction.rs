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

//! Transaction integration tests: stand-alone validity, covered
//! fields, and the signature rules.

pub mod common;

use uplo_core as core;

use self::common::{coin_output, hash, keypair, sign, single_sig, spend_txn, unknown_key};
use self::core::consensus;
use self::core::core::currency::Currency;
use self::core::core::hash::ZERO_HASH;
use self::core::core::keys::{PublicKey, UnlockConditions};
use self::core::core::transaction::{
	CoinInput, CoinOutput, CoinOutputID, CoveredFields, Error, FileContract, StorageProof,
	Transaction, TransactionSignature,
};
use self::core::global::{self, ChainTypes};
use self::core::ser;

const HEIGHT: u64 = 10;

fn set_testing() {
	global::set_chain_type(ChainTypes::AutomatedTesting);
}

// A contract whose payout matches its outputs and the tax at HEIGHT.
fn good_contract() -> FileContract {
	set_testing();
	let payout = consensus::coin(100);
	let tax = consensus::tax(HEIGHT, &payout);
	let portion = payout.checked_sub(&tax).unwrap();
	FileContract {
		file_size: 0,
		file_merkle_root: ZERO_HASH,
		window_start: 100,
		window_end: 200,
		payout: payout.clone(),
		valid_proof_outputs: vec![CoinOutput {
			value: portion.clone(),
			unlock_hash: Default::default(),
		}],
		missed_proof_outputs: vec![CoinOutput {
			value: portion,
			unlock_hash: Default::default(),
		}],
		unlock_hash: Default::default(),
		revision_number: 0,
	}
}

#[test]
fn encoding_round_trip_and_determinism() {
	set_testing();
	let key = keypair(1);
	let mut txn = spend_txn(
		CoinOutputID(hash(9)),
		single_sig(&key),
		vec![coin_output(500, Default::default())],
	);
	txn.miner_fees.push(Currency::from(12));
	txn.arbitrary_data.push(b"hello world".to_vec());
	txn.file_contracts.push(good_contract());
	sign(&mut txn, 0, &key, HEIGHT);

	let bytes = ser::ser_vec(&txn).unwrap();
	let decoded: Transaction = ser::deserialize_default(&mut &bytes[..]).unwrap();
	assert_eq!(decoded, txn);
	// re-encoding a decoded value yields the exact original bytes
	assert_eq!(ser::ser_vec(&decoded).unwrap(), bytes);
}

#[test]
fn output_ids_ignore_signatures() {
	set_testing();
	let key = keypair(1);
	let mut txn = spend_txn(
		CoinOutputID(hash(9)),
		single_sig(&key),
		vec![coin_output(500, Default::default())],
	);
	let before = txn.coin_output_id(0);
	sign(&mut txn, 0, &key, HEIGHT);
	assert_eq!(txn.coin_output_id(0), before);
	// but the transaction id covers signatures
	let mut other = txn.clone();
	other.transaction_signatures[0].signature = vec![0; 64];
	assert_ne!(other.id(), txn.id());
}

#[test]
fn single_signature_accepted() {
	set_testing();
	let key = keypair(1);
	let mut txn = spend_txn(
		CoinOutputID(hash(9)),
		single_sig(&key),
		vec![coin_output(500, Default::default())],
	);
	sign(&mut txn, 0, &key, HEIGHT);
	txn.standalone_valid(HEIGHT).unwrap();

	// corrupting the signature invalidates it
	txn.transaction_signatures[0].signature[4] ^= 1;
	assert_eq!(txn.standalone_valid(HEIGHT), Err(Error::InvalidSignature));
}

// A transaction whose input's conditions carry an ed25519 key, an
// unrecognized-algorithm key and an entropy key.
fn mixed_txn(required: u64) -> (self::core::crypto::signature::Keypair, Transaction) {
	let ed = keypair(7);
	let conditions = UnlockConditions {
		timelock: 0,
		public_keys: vec![
			PublicKey::ed25519(ed.public_key()),
			unknown_key(2),
			PublicKey {
				algorithm: self::core::core::keys::ALGORITHM_ENTROPY,
				key: vec![3; 32],
			},
		],
		signatures_required: required,
	};
	let txn = Transaction {
		coin_inputs: vec![CoinInput {
			parent_id: CoinOutputID(hash(5)),
			unlock_conditions: conditions,
		}],
		coin_outputs: vec![coin_output(1, Default::default())],
		..Default::default()
	};
	(ed, txn)
}

fn push_sig(txn: &mut Transaction, key_index: u64) {
	txn.transaction_signatures.push(TransactionSignature {
		parent_id: hash(5),
		public_key_index: key_index,
		timelock: 0,
		covered_fields: CoveredFields::whole_transaction(),
		signature: vec![1; 16],
	});
}

#[test]
fn unknown_algorithm_plus_ed25519_accepted() {
	set_testing();
	let (ed, mut txn) = mixed_txn(2);
	push_sig(&mut txn, 0);
	push_sig(&mut txn, 1); // unrecognized algorithms verify unconditionally
	let sig = ed.sign(&txn.sig_hash(0, HEIGHT));
	txn.transaction_signatures[0].signature = sig;
	txn.standalone_valid(HEIGHT).unwrap();
}

#[test]
fn public_key_overuse_rejected() {
	set_testing();
	let (_, mut txn) = mixed_txn(2);
	// the unknown-algorithm key signs twice for the same parent
	push_sig(&mut txn, 1);
	push_sig(&mut txn, 1);
	assert_eq!(txn.standalone_valid(HEIGHT), Err(Error::PublicKeyOveruse));
}

#[test]
fn entropy_key_rejected() {
	set_testing();
	let (_, mut txn) = mixed_txn(2);
	push_sig(&mut txn, 1);
	push_sig(&mut txn, 2); // the entropy key can never sign
	assert_eq!(txn.standalone_valid(HEIGHT), Err(Error::EntropyKey));
}

#[test]
fn premature_signature_rejected() {
	set_testing();
	let (ed, mut txn) = mixed_txn(1);
	push_sig(&mut txn, 0);
	txn.transaction_signatures[0].timelock = HEIGHT + 1;
	let sig = ed.sign(&txn.sig_hash(0, HEIGHT));
	txn.transaction_signatures[0].signature = sig;
	assert_eq!(
		txn.standalone_valid(HEIGHT),
		Err(Error::PrematureSignature)
	);
}

#[test]
fn missing_signatures_rejected() {
	set_testing();
	let (_, mut txn) = mixed_txn(2);
	push_sig(&mut txn, 1);
	assert_eq!(txn.standalone_valid(HEIGHT), Err(Error::MissingSignatures));
}

#[test]
fn frivolous_signature_rejected() {
	set_testing();
	let (ed, mut txn) = mixed_txn(1);
	push_sig(&mut txn, 0);
	push_sig(&mut txn, 1); // one signature beyond the requirement
	let sig = ed.sign(&txn.sig_hash(0, HEIGHT));
	txn.transaction_signatures[0].signature = sig;
	assert_eq!(
		txn.standalone_valid(HEIGHT),
		Err(Error::FrivolousSignature)
	);

	// a signature for a parent nobody spends is frivolous too
	let (_, mut txn) = mixed_txn(1);
	txn.transaction_signatures.push(TransactionSignature {
		parent_id: hash(99),
		public_key_index: 0,
		timelock: 0,
		covered_fields: CoveredFields::whole_transaction(),
		signature: vec![],
	});
	assert_eq!(
		txn.standalone_valid(HEIGHT),
		Err(Error::FrivolousSignature)
	);
}

#[test]
fn invalid_pubkey_index_rejected() {
	set_testing();
	let (_, mut txn) = mixed_txn(1);
	push_sig(&mut txn, 7);
	assert_eq!(
		txn.standalone_valid(HEIGHT),
		Err(Error::InvalidPubKeyIndex)
	);
}

#[test]
fn whole_transaction_signature_independence() {
	set_testing();
	let key_a = keypair(11);
	let key_b = keypair(12);
	let mut txn = Transaction {
		coin_inputs: vec![
			CoinInput {
				parent_id: CoinOutputID(hash(1)),
				unlock_conditions: single_sig(&key_a),
			},
			CoinInput {
				parent_id: CoinOutputID(hash(2)),
				unlock_conditions: single_sig(&key_b),
			},
		],
		coin_outputs: vec![coin_output(4, Default::default())],
		..Default::default()
	};
	for (i, parent) in [hash(1), hash(2)].iter().enumerate() {
		txn.transaction_signatures.push(TransactionSignature {
			parent_id: *parent,
			public_key_index: 0,
			timelock: 0,
			covered_fields: CoveredFields::whole_transaction(),
			signature: vec![],
		});
		let _ = i;
	}
	let hash_a = txn.sig_hash(0, HEIGHT);
	sign(&mut txn, 0, &key_a, HEIGHT);
	sign(&mut txn, 1, &key_b, HEIGHT);
	txn.standalone_valid(HEIGHT).unwrap();

	// altering signature b's bytes does not move signature a's sighash
	txn.transaction_signatures[1].signature[10] ^= 1;
	assert_eq!(txn.sig_hash(0, HEIGHT), hash_a);
	assert_eq!(txn.standalone_valid(HEIGHT), Err(Error::InvalidSignature));
}

#[test]
fn covered_fields_rules() {
	set_testing();
	let key = keypair(1);
	let mut txn = spend_txn(
		CoinOutputID(hash(9)),
		single_sig(&key),
		vec![coin_output(500, Default::default())],
	);

	// whole transaction plus an index list is a violation
	txn.transaction_signatures[0].covered_fields.coin_inputs = vec![0];
	sign(&mut txn, 0, &key, HEIGHT);
	assert_eq!(
		txn.standalone_valid(HEIGHT),
		Err(Error::WholeTransactionViolation)
	);

	// unsorted indices
	let mut txn2 = spend_txn(
		CoinOutputID(hash(9)),
		single_sig(&key),
		vec![coin_output(500, Default::default())],
	);
	txn2.transaction_signatures[0].covered_fields = CoveredFields {
		whole_transaction: false,
		coin_inputs: vec![0, 0],
		..Default::default()
	};
	assert_eq!(
		txn2.standalone_valid(HEIGHT),
		Err(Error::SortedUniqueViolation)
	);

	// out-of-range index
	let mut txn3 = spend_txn(
		CoinOutputID(hash(9)),
		single_sig(&key),
		vec![coin_output(500, Default::default())],
	);
	txn3.transaction_signatures[0].covered_fields = CoveredFields {
		whole_transaction: false,
		coin_outputs: vec![5],
		..Default::default()
	};
	assert_eq!(
		txn3.standalone_valid(HEIGHT),
		Err(Error::SortedUniqueViolation)
	);
}

#[test]
fn partial_covered_fields_sign_only_selected() {
	set_testing();
	let key = keypair(1);
	let mut txn = spend_txn(
		CoinOutputID(hash(9)),
		single_sig(&key),
		vec![coin_output(500, Default::default())],
	);
	txn.arbitrary_data.push(b"mutable".to_vec());
	txn.transaction_signatures[0].covered_fields = CoveredFields {
		whole_transaction: false,
		coin_inputs: vec![0],
		coin_outputs: vec![0],
		..Default::default()
	};
	sign(&mut txn, 0, &key, HEIGHT);
	txn.standalone_valid(HEIGHT).unwrap();

	// uncovered fields can change without breaking the signature
	txn.arbitrary_data[0] = b"changed".to_vec();
	txn.standalone_valid(HEIGHT).unwrap();

	// covered fields cannot
	txn.coin_outputs[0].value = Currency::from(501);
	assert_eq!(txn.standalone_valid(HEIGHT), Err(Error::InvalidSignature));
}

#[test]
fn file_contract_standalone_rules() {
	set_testing();
	let mut txn = Transaction {
		file_contracts: vec![good_contract()],
		..Default::default()
	};
	txn.standalone_valid(HEIGHT).unwrap();

	// reversed window
	txn.file_contracts[0].window_start = 300;
	assert_eq!(
		txn.standalone_valid(HEIGHT),
		Err(Error::FileContractWindow)
	);

	// zero payout
	let mut txn = Transaction {
		file_contracts: vec![good_contract()],
		..Default::default()
	};
	txn.file_contracts[0].payout = Currency::zero();
	txn.file_contracts[0].valid_proof_outputs[0].value = Currency::zero();
	txn.file_contracts[0].missed_proof_outputs[0].value = Currency::zero();
	assert_eq!(txn.standalone_valid(HEIGHT), Err(Error::ZeroPayout));

	// outputs not matching payout minus tax
	let mut txn = Transaction {
		file_contracts: vec![good_contract()],
		..Default::default()
	};
	txn.file_contracts[0].valid_proof_outputs[0].value = Currency::from(1);
	assert_eq!(
		txn.standalone_valid(HEIGHT),
		Err(Error::FileContractOutputSum)
	);
}

#[test]
fn revision_standalone_rules() {
	set_testing();
	let mut txn = Transaction::default();
	txn.file_contract_revisions.push(
		self::core::core::transaction::FileContractRevision {
			parent_id: Default::default(),
			unlock_conditions: UnlockConditions::default(),
			new_revision_number: 0,
			new_file_size: 0,
			new_file_merkle_root: ZERO_HASH,
			new_window_start: 5,
			new_window_end: 10,
			new_valid_proof_outputs: vec![],
			new_missed_proof_outputs: vec![],
			new_unlock_hash: Default::default(),
		},
	);
	assert_eq!(txn.standalone_valid(HEIGHT), Err(Error::LowRevisionNumber));

	txn.file_contract_revisions[0].new_revision_number = 1;
	txn.file_contract_revisions[0].new_window_start = 10;
	assert_eq!(
		txn.standalone_valid(HEIGHT),
		Err(Error::FileContractWindow)
	);
}

#[test]
fn storage_proof_cannot_create_outputs() {
	set_testing();
	let txn = Transaction {
		storage_proofs: vec![StorageProof {
			parent_id: Default::default(),
			segment: [0; 64],
			hash_set: vec![],
		}],
		coin_outputs: vec![coin_output(1, Default::default())],
		..Default::default()
	};
	assert_eq!(
		txn.standalone_valid(HEIGHT),
		Err(Error::StorageProofWithOutputs)
	);
}

#[test]
fn double_spend_within_transaction() {
	set_testing();
	let key = keypair(1);
	let mut txn = spend_txn(
		CoinOutputID(hash(9)),
		single_sig(&key),
		vec![coin_output(500, Default::default())],
	);
	txn.coin_inputs.push(txn.coin_inputs[0].clone());
	assert_eq!(txn.standalone_valid(HEIGHT), Err(Error::DoubleSpend));
}
