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

//! Serialization integration tests across composite types.

pub mod common;

use uplo_core as core;

use self::common::{coin_output, hash, keypair, single_sig, spend_txn};
use self::core::core::currency::Currency;
use self::core::core::keys::UnlockConditions;
use self::core::core::transaction::{CoinOutputID, FundOutput, Transaction};
use self::core::ser::{self, Error};

#[test]
fn string_and_vec_round_trip() {
	let value = "net.addr.example:9981".to_string();
	let bytes = ser::ser_vec(&value).unwrap();
	// u64 length prefix plus utf-8 bytes
	assert_eq!(bytes.len(), 8 + value.len());
	let decoded: String = ser::deserialize_default(&mut &bytes[..]).unwrap();
	assert_eq!(decoded, value);

	let values: Vec<u64> = vec![1, 2, 3, u64::max_value()];
	let bytes = ser::ser_vec(&values).unwrap();
	let decoded: Vec<u64> = ser::deserialize_default(&mut &bytes[..]).unwrap();
	assert_eq!(decoded, values);
}

#[test]
fn unlock_conditions_round_trip() {
	let key = keypair(5);
	let conditions = UnlockConditions {
		timelock: 42,
		public_keys: vec![
			self::core::core::keys::PublicKey::ed25519(key.public_key()),
			self::core::core::keys::PublicKey::ed25519(keypair(6).public_key()),
		],
		signatures_required: 2,
	};
	let bytes = ser::ser_vec(&conditions).unwrap();
	let decoded: UnlockConditions = ser::deserialize_default(&mut &bytes[..]).unwrap();
	assert_eq!(decoded, conditions);
	assert_eq!(decoded.unlock_hash(), conditions.unlock_hash());
}

#[test]
fn fund_output_round_trip() {
	let output = FundOutput {
		value: Currency::from(2_000),
		unlock_hash: Default::default(),
		claim_start: Currency::from(123_456_789),
	};
	let bytes = ser::ser_vec(&output).unwrap();
	let decoded: FundOutput = ser::deserialize_default(&mut &bytes[..]).unwrap();
	assert_eq!(decoded, output);
}

#[test]
fn truncated_transaction_rejected() {
	let key = keypair(2);
	let txn = spend_txn(
		CoinOutputID(hash(3)),
		single_sig(&key),
		vec![coin_output(9, Default::default())],
	);
	let bytes = ser::ser_vec(&txn).unwrap();
	for cut in &[1usize, 8, bytes.len() / 2, bytes.len() - 1] {
		let res: Result<Transaction, Error> = ser::deserialize_default(&mut &bytes[..*cut]);
		assert!(res.is_err(), "decode of {} bytes succeeded", cut);
	}
}

#[test]
fn decode_budget_is_enforced() {
	let key = keypair(2);
	let txn = spend_txn(
		CoinOutputID(hash(3)),
		single_sig(&key),
		vec![coin_output(9, Default::default())],
	);
	let bytes = ser::ser_vec(&txn).unwrap();
	let res: Result<Transaction, Error> = ser::deserialize(&mut &bytes[..], 16);
	match res {
		Err(Error::TooLargeReadErr(_)) => {}
		other => panic!("expected budget error, got {:?}", other),
	}
}
