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

//! Core types: hashes, currency, targets, keys, transactions, blocks.

pub mod block;
pub mod currency;
pub mod hash;
pub mod keys;
pub mod target;
pub mod transaction;

pub use self::block::{Block, BlockHeader, BlockID};
pub use self::currency::Currency;
pub use self::hash::{Hash, Hashed, ZERO_HASH};
pub use self::keys::{PublicKey, Specifier, UnlockConditions, UnlockHash};
pub use self::target::{Difficulty, Target};
pub use self::transaction::{
	CoinInput, CoinOutput, CoinOutputID, CoveredFields, FileContract, FileContractID,
	FileContractRevision, FundInput, FundOutput, FundOutputID, StorageProof, Transaction,
	TransactionID, TransactionSignature,
};
