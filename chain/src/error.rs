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

//! Errors thrown while processing blocks and validating transactions
//! against the consensus state.

use uplo_core::core::transaction;
use uplo_core::ser;

use crate::store;

/// Errors thrown by the consensus set.
#[derive(Clone, Debug, PartialEq, Fail)]
pub enum Error {
	/// The block is already in the database.
	#[fail(display = "block already known")]
	BlockKnown,
	/// The block was previously found invalid.
	#[fail(display = "block previously found invalid")]
	KnownInvalid,
	/// The block id does not meet its parent's child target.
	#[fail(display = "block does not meet target")]
	BlockUnsolved,
	/// The block's parent is not known.
	#[fail(display = "block's parent is unknown")]
	Orphan,
	/// The block was accepted onto a side branch without extending the
	/// heaviest chain. Informational.
	#[fail(display = "block does not extend the heaviest chain")]
	NonExtendingBlock,
	/// Timestamp at or below the median of the previous blocks.
	#[fail(display = "block timestamp is too early")]
	EarlyTimestamp,
	/// Timestamp further ahead of the clock than allowed.
	#[fail(display = "block timestamp is too far in the future")]
	FutureTimestamp,
	/// Timestamp hostile in its futureness.
	#[fail(display = "block timestamp is in the extreme future")]
	ExtremeFutureTimestamp,
	/// The block exceeds the encoded size limit.
	#[fail(display = "block is too large")]
	LargeBlock,
	/// Miner payouts do not add up to the coinbase plus fees.
	#[fail(display = "miner payout sum is incorrect")]
	BadMinerPayouts,
	/// A transaction failed stand-alone validation.
	#[fail(display = "invalid transaction: {}", _0)]
	Transaction(transaction::Error),
	/// A coin input spending a nonexistent output.
	#[fail(display = "transaction spends a nonexistent coin output")]
	MissingCoinOutput,
	/// Revealed unlock conditions do not hash to the output's address.
	#[fail(display = "unlock conditions do not match the unlock hash")]
	WrongUnlockConditions,
	/// Unlock conditions used before their timelock expired.
	#[fail(display = "unlock conditions are timelocked")]
	TimelockNotSatisfied,
	/// Coin inputs do not equal coin outputs plus fees plus payouts.
	#[fail(display = "coin inputs do not equal coin outputs")]
	CoinInputOutputMismatch,
	/// A fund input spending a nonexistent output.
	#[fail(display = "transaction spends a nonexistent fund output")]
	MissingFundOutput,
	/// Fund inputs do not equal fund outputs.
	#[fail(display = "fund inputs do not equal fund outputs")]
	FundInputOutputMismatch,
	/// A revision or proof referencing an unknown contract.
	#[fail(display = "reference to a nonexistent file contract")]
	UnrecognizedFileContractID,
	/// A storage proof submitted before the contract window opened.
	#[fail(display = "storage proof submitted before the proof window opened")]
	UnfinishedFileContract,
	/// A revision that does not advance the revision number.
	#[fail(display = "revision number does not advance the file contract")]
	LowRevisionNumber,
	/// A revision submitted after the proof window opened.
	#[fail(display = "revision submitted after the proof window opened")]
	LateRevision,
	/// A revision altering the contract's payout split totals.
	#[fail(display = "revision alters the contract payouts")]
	AlteredRevisionPayouts,
	/// A storage proof that does not verify.
	#[fail(display = "invalid storage proof")]
	InvalidStorageProof,
	/// A Foundation update without authority from the current
	/// primary or failsafe addresses.
	#[fail(display = "unsigned Foundation unlock-hash update")]
	UnsignedFoundationUpdate,
	/// A Foundation update that does not decode.
	#[fail(display = "malformed Foundation unlock-hash update")]
	InvalidFoundationUpdate,
	/// A subscriber asked to resume from an id the change log does not
	/// hold.
	#[fail(display = "unknown consensus change id")]
	InvalidConsensusChangeID,
	/// Replay was cancelled before the subscriber went live.
	#[fail(display = "subscription cancelled during replay")]
	SubscriptionCancelled,
	/// The live state checksum diverged from the recorded one. Fatal:
	/// the consensus set refuses further writes.
	#[fail(display = "consensus checksum mismatch, database corrupt")]
	ChecksumMismatch,
	/// The consensus set is refusing operation after a fatal error.
	#[fail(display = "consensus set is unusable after a fatal error")]
	Unusable,
	/// A disrupt hook intercepted the operation (testing only).
	#[fail(display = "operation disrupted at {}", _0)]
	Disrupted(&'static str),
	/// A broken internal invariant. Indicates a bug or corruption.
	#[fail(display = "inconsistent consensus state: {}", _0)]
	InconsistentState(String),
	/// An underlying store failure.
	#[fail(display = "store error: {}", _0)]
	Store(store::Error),
	/// An underlying serialization failure.
	#[fail(display = "serialization error: {}", _0)]
	Serialization(ser::Error),
}

impl Error {
	/// Whether the error proves the submitted block can never be valid,
	/// as opposed to transient conditions like future timestamps or
	/// store trouble.
	pub fn marks_block_invalid(&self) -> bool {
		match self {
			Error::Transaction(_)
			| Error::MissingCoinOutput
			| Error::WrongUnlockConditions
			| Error::TimelockNotSatisfied
			| Error::CoinInputOutputMismatch
			| Error::MissingFundOutput
			| Error::FundInputOutputMismatch
			| Error::UnrecognizedFileContractID
			| Error::UnfinishedFileContract
			| Error::LowRevisionNumber
			| Error::LateRevision
			| Error::AlteredRevisionPayouts
			| Error::InvalidStorageProof
			| Error::UnsignedFoundationUpdate
			| Error::InvalidFoundationUpdate
			| Error::BadMinerPayouts
			| Error::EarlyTimestamp
			| Error::LargeBlock => true,
			_ => false,
		}
	}
}

impl From<store::Error> for Error {
	fn from(e: store::Error) -> Error {
		Error::Store(e)
	}
}

impl From<ser::Error> for Error {
	fn from(e: ser::Error) -> Error {
		Error::Serialization(e)
	}
}

impl From<transaction::Error> for Error {
	fn from(e: transaction::Error) -> Error {
		Error::Transaction(e)
	}
}
