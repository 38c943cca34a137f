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

//! Transactions.
//!
//! A transaction moves coins and funds, forms and resolves file
//! contracts, and carries arbitrary data. Everything a transaction
//! creates is content-addressed: output ids are derived from a domain
//! specifier, the signature-free fields and the output's index, so they
//! are fixed as soon as the transaction is built.

use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::consensus;
use crate::core::currency::Currency;
use crate::core::hash::{DefaultHashable, Hash, HashWriter};
use crate::core::keys::{
	PublicKey, Specifier, UnlockConditions, UnlockHash, ALGORITHM_ED25519, ALGORITHM_ENTROPY,
	SPECIFIER_COIN_OUTPUT, SPECIFIER_FILE_CONTRACT, SPECIFIER_FUND_OUTPUT,
	SPECIFIER_STORAGE_PROOF,
};
use crate::crypto::merkle::SEGMENT_SIZE;
use crate::crypto::signature::verify_hash;
use crate::global;
use crate::ser::{self, Readable, Reader, Writeable, Writer};

/// Errors thrown by stand-alone transaction validation.
#[derive(Clone, Debug, Eq, PartialEq, Fail)]
pub enum Error {
	/// A file contract whose proof window ends before it begins.
	#[fail(display = "file contract window must end after it begins")]
	FileContractWindow,
	/// A file contract with a zero payout.
	#[fail(display = "file contract must have a nonzero payout")]
	ZeroPayout,
	/// Contract payout does not equal proof outputs plus tax.
	#[fail(display = "file contract payout does not match its outputs and tax")]
	FileContractOutputSum,
	/// A revision number that cannot supersede anything.
	#[fail(display = "revision number does not advance the file contract")]
	LowRevisionNumber,
	/// A storage proof bundled with new outputs, contracts or revisions.
	#[fail(display = "transaction with a storage proof cannot introduce outputs or contracts")]
	StorageProofWithOutputs,
	/// The same parent spent twice within one transaction.
	#[fail(display = "transaction spends the same parent twice")]
	DoubleSpend,
	/// Covered fields declare the whole transaction and individual
	/// fields at the same time.
	#[fail(display = "whole transaction flagged, but not all fields were provided")]
	WholeTransactionViolation,
	/// A covered-fields index list that is unsorted, duplicated or out
	/// of range.
	#[fail(display = "covered fields indices are not sorted, unique and in range")]
	SortedUniqueViolation,
	/// Fewer valid signatures than the unlock conditions require.
	#[fail(display = "not all signatures are present")]
	MissingSignatures,
	/// A signature for an unknown parent, or one beyond the required
	/// count.
	#[fail(display = "frivolous signature detected")]
	FrivolousSignature,
	/// The same public key signing twice for one parent.
	#[fail(display = "public key was used multiple times while signing")]
	PublicKeyOveruse,
	/// A signature whose own timelock has not expired yet.
	#[fail(display = "signature used before its timelock expired")]
	PrematureSignature,
	/// A signature referencing an entropy public key.
	#[fail(display = "entropy public keys can never sign")]
	EntropyKey,
	/// A signature referencing a key index beyond the unlock conditions.
	#[fail(display = "public key index references a nonexistent key")]
	InvalidPubKeyIndex,
	/// An ed25519 signature that does not verify.
	#[fail(display = "invalid signature")]
	InvalidSignature,
}

macro_rules! impl_hash_newtype {
	($name:ident) => {
		impl $name {
			/// The raw hash behind this id.
			pub fn as_hash(&self) -> &Hash {
				&self.0
			}
		}

		impl fmt::Display for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				write!(f, "{}", self.0)
			}
		}

		impl Writeable for $name {
			fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
				self.0.write(writer)
			}
		}

		impl Readable for $name {
			fn read(reader: &mut dyn Reader) -> Result<$name, ser::Error> {
				Ok($name(Hash::read(reader)?))
			}
		}
	};
}

/// Id of a transaction: the hash of its full encoding.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default, Serialize, Deserialize)]
pub struct TransactionID(pub Hash);
impl_hash_newtype!(TransactionID);

/// Id of a coin output.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default, Serialize, Deserialize)]
pub struct CoinOutputID(pub Hash);
impl_hash_newtype!(CoinOutputID);

/// Id of a fund output.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default, Serialize, Deserialize)]
pub struct FundOutputID(pub Hash);
impl_hash_newtype!(FundOutputID);

/// Id of a file contract.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default, Serialize, Deserialize)]
pub struct FileContractID(pub Hash);
impl_hash_newtype!(FileContractID);

impl FundOutputID {
	/// The id of the delayed coin output minted when this fund output is
	/// spent and its accrued claim is paid out.
	pub fn claim_output_id(&self) -> CoinOutputID {
		CoinOutputID(hash_all!(self.0))
	}
}

impl FileContractID {
	/// The id of proof payout `i` of this contract; `valid` selects
	/// between the valid-proof and missed-proof output sets.
	pub fn storage_proof_output_id(&self, valid: bool, i: u64) -> CoinOutputID {
		CoinOutputID(hash_all!(SPECIFIER_STORAGE_PROOF, self.0, valid, i))
	}
}

/// A coin input, spending a prior coin output. The unlock conditions
/// must hash to the spent output's unlock hash.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinInput {
	/// The output being spent.
	pub parent_id: CoinOutputID,
	/// The revealed conditions guarding the output.
	pub unlock_conditions: UnlockConditions,
}

/// A coin output: some value sent to an unlock hash.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinOutput {
	/// Amount of coins.
	pub value: Currency,
	/// Address the coins are sent to.
	pub unlock_hash: UnlockHash,
}

/// An agreement to store data: the host must prove possession of the
/// file during the proof window or forfeit the valid payout.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileContract {
	/// Size in bytes of the file under contract.
	pub file_size: u64,
	/// Merkle root over the file's 64-byte segments.
	pub file_merkle_root: Hash,
	/// First height at which a storage proof window is open.
	pub window_start: u64,
	/// Height at which the contract expires unproven.
	pub window_end: u64,
	/// Total coins locked in the contract, including the tax.
	pub payout: Currency,
	/// Outputs created if a valid proof is submitted.
	pub valid_proof_outputs: Vec<CoinOutput>,
	/// Outputs created if the window closes without a proof.
	pub missed_proof_outputs: Vec<CoinOutput>,
	/// Address whose conditions authorize revisions.
	pub unlock_hash: UnlockHash,
	/// Monotonic revision counter.
	pub revision_number: u64,
}

impl FileContract {
	/// Sum of the valid-proof outputs.
	pub fn valid_proof_output_sum(&self) -> Currency {
		self.valid_proof_outputs.iter().map(|o| &o.value).sum()
	}

	/// Sum of the missed-proof outputs.
	pub fn missed_proof_output_sum(&self) -> Currency {
		self.missed_proof_outputs.iter().map(|o| &o.value).sum()
	}

	/// Number of 64-byte segments the contracted file spans.
	pub fn segment_count(&self) -> u64 {
		(self.file_size + SEGMENT_SIZE as u64 - 1) / SEGMENT_SIZE as u64
	}
}

/// A revision replacing the body of a live file contract. The payout is
/// immutable; only the file, windows, outputs and unlock hash move.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileContractRevision {
	/// The contract being revised.
	pub parent_id: FileContractID,
	/// Conditions hashing to the contract's unlock hash.
	pub unlock_conditions: UnlockConditions,
	/// Replacement revision number, strictly higher than the current.
	pub new_revision_number: u64,
	/// Replacement file size.
	pub new_file_size: u64,
	/// Replacement file Merkle root.
	pub new_file_merkle_root: Hash,
	/// Replacement window start.
	pub new_window_start: u64,
	/// Replacement window end.
	pub new_window_end: u64,
	/// Replacement valid-proof outputs.
	pub new_valid_proof_outputs: Vec<CoinOutput>,
	/// Replacement missed-proof outputs.
	pub new_missed_proof_outputs: Vec<CoinOutput>,
	/// Replacement unlock hash.
	pub new_unlock_hash: UnlockHash,
}

impl FileContractRevision {
	/// Sum of the replacement valid-proof outputs.
	pub fn new_valid_proof_output_sum(&self) -> Currency {
		self.new_valid_proof_outputs.iter().map(|o| &o.value).sum()
	}

	/// Sum of the replacement missed-proof outputs.
	pub fn new_missed_proof_output_sum(&self) -> Currency {
		self.new_missed_proof_outputs.iter().map(|o| &o.value).sum()
	}
}

/// Proof of storage for one deterministic segment of a contracted file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageProof {
	/// The contract being proven.
	pub parent_id: FileContractID,
	/// The 64-byte segment, zero-padded when the file ends short.
	#[serde(with = "segment_serde")]
	pub segment: [u8; SEGMENT_SIZE],
	/// The sibling hashes recombining to the contract's Merkle root.
	pub hash_set: Vec<Hash>,
}

// serde only provides array impls up to 32 elements, so the 64-byte
// segment gets explicit seq-based impls.
mod segment_serde {
	use super::SEGMENT_SIZE;
	use serde::de::{Deserializer, SeqAccess, Visitor};
	use serde::ser::{SerializeSeq, Serializer};
	use std::fmt::{Formatter, Result as FmtResult};

	pub fn serialize<S>(segment: &[u8; SEGMENT_SIZE], serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		let mut seq = serializer.serialize_seq(Some(segment.len()))?;
		for e in segment.iter() {
			seq.serialize_element(e)?;
		}
		seq.end()
	}

	pub fn deserialize<'d, D>(deserializer: D) -> Result<[u8; SEGMENT_SIZE], D::Error>
	where
		D: Deserializer<'d>,
	{
		struct SegmentVisitor;

		impl<'de> Visitor<'de> for SegmentVisitor {
			type Value = [u8; SEGMENT_SIZE];

			fn expecting(&self, formatter: &mut Formatter<'_>) -> FmtResult {
				formatter.write_str(concat!("an array of length ", 64))
			}

			fn visit_seq<A>(self, mut seq: A) -> Result<[u8; SEGMENT_SIZE], A::Error>
			where
				A: SeqAccess<'de>,
			{
				let mut arr = [0u8; SEGMENT_SIZE];
				for i in 0..SEGMENT_SIZE {
					arr[i] = seq
						.next_element()?
						.ok_or_else(|| serde::de::Error::invalid_length(i, &self))?;
				}
				Ok(arr)
			}
		}

		deserializer.deserialize_seq(SegmentVisitor)
	}
}

/// A fund input, spending a fund output whole and collecting its
/// accrued coin claim.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundInput {
	/// The fund output being spent.
	pub parent_id: FundOutputID,
	/// The revealed conditions guarding the output.
	pub unlock_conditions: UnlockConditions,
	/// Address receiving the accrued coin claim.
	pub claim_unlock_hash: UnlockHash,
}

/// A fund output, a share of the global fund supply that accrues coin
/// claims as the fund pool grows past its claim start.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundOutput {
	/// Amount of funds.
	pub value: Currency,
	/// Address the funds are sent to.
	pub unlock_hash: UnlockHash,
	/// Pool size when this output was created; claims accrue above it.
	pub claim_start: Currency,
}

/// Selector for which parts of a transaction a signature covers.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CoveredFields {
	/// Covers all fields; only the signature index lists may then be
	/// populated.
	pub whole_transaction: bool,
	/// Covered coin input indices.
	pub coin_inputs: Vec<u64>,
	/// Covered coin output indices.
	pub coin_outputs: Vec<u64>,
	/// Covered file contract indices.
	pub file_contracts: Vec<u64>,
	/// Covered revision indices.
	pub file_contract_revisions: Vec<u64>,
	/// Covered storage proof indices.
	pub storage_proofs: Vec<u64>,
	/// Covered fund input indices.
	pub fund_inputs: Vec<u64>,
	/// Covered fund output indices.
	pub fund_outputs: Vec<u64>,
	/// Covered miner fee indices.
	pub miner_fees: Vec<u64>,
	/// Covered arbitrary data indices.
	pub arbitrary_data: Vec<u64>,
	/// Covered signature indices.
	pub transaction_signatures: Vec<u64>,
}

impl CoveredFields {
	/// Covered fields marking the whole transaction, the common case.
	pub fn whole_transaction() -> CoveredFields {
		CoveredFields {
			whole_transaction: true,
			..Default::default()
		}
	}
}

/// A signature authorizing the spending of one parent (coin input, fund
/// input or contract revision).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionSignature {
	/// Id of the parent being signed for.
	pub parent_id: Hash,
	/// Index into the parent's unlock-condition key list.
	pub public_key_index: u64,
	/// Height before which this signature is invalid.
	pub timelock: u64,
	/// The parts of the transaction the signature covers.
	pub covered_fields: CoveredFields,
	/// The signature bytes, interpreted per the key's algorithm.
	pub signature: Vec<u8>,
}

/// A transaction, the unit of consensus change below a block.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Transaction {
	/// Coin outputs being spent.
	pub coin_inputs: Vec<CoinInput>,
	/// Coin outputs being created.
	pub coin_outputs: Vec<CoinOutput>,
	/// File contracts being formed.
	pub file_contracts: Vec<FileContract>,
	/// Revisions to live file contracts.
	pub file_contract_revisions: Vec<FileContractRevision>,
	/// Storage proofs resolving file contracts.
	pub storage_proofs: Vec<StorageProof>,
	/// Fund outputs being spent.
	pub fund_inputs: Vec<FundInput>,
	/// Fund outputs being created.
	pub fund_outputs: Vec<FundOutput>,
	/// Fees collected by the block's miner.
	pub miner_fees: Vec<Currency>,
	/// Uninterpreted data; a leading specifier selects a meaning.
	pub arbitrary_data: Vec<Vec<u8>>,
	/// Signatures over the above.
	pub transaction_signatures: Vec<TransactionSignature>,
}

impl Transaction {
	/// The transaction id, hashing the full encoding including
	/// signatures.
	pub fn id(&self) -> TransactionID {
		TransactionID(hash_all!(self))
	}

	/// Sum of all coins this transaction consumes on its output side:
	/// coin outputs, miner fees and contract payouts.
	pub fn coin_output_sum(&self) -> Currency {
		let mut total = Currency::zero();
		for output in &self.coin_outputs {
			total += &output.value;
		}
		for fee in &self.miner_fees {
			total += fee;
		}
		for contract in &self.file_contracts {
			total += &contract.payout;
		}
		total
	}

	/// Id of coin output `i`.
	pub fn coin_output_id(&self, i: u64) -> CoinOutputID {
		CoinOutputID(self.sibling_id(SPECIFIER_COIN_OUTPUT, i))
	}

	/// Id of file contract `i`.
	pub fn file_contract_id(&self, i: u64) -> FileContractID {
		FileContractID(self.sibling_id(SPECIFIER_FILE_CONTRACT, i))
	}

	/// Id of fund output `i`.
	pub fn fund_output_id(&self, i: u64) -> FundOutputID {
		FundOutputID(self.sibling_id(SPECIFIER_FUND_OUTPUT, i))
	}

	// Ids commit to the signature-free fields so that adding signatures
	// cannot move an output's address.
	fn sibling_id(&self, specifier: Specifier, i: u64) -> Hash {
		let mut hasher = HashWriter::default();
		specifier.write(&mut hasher).expect("hash writer");
		self.write_unsigned_fields(&mut hasher).expect("hash writer");
		hasher.write_u64(i).expect("hash writer");
		hasher.into_hash()
	}

	fn write_unsigned_fields<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		self.coin_inputs.write(writer)?;
		self.coin_outputs.write(writer)?;
		self.file_contracts.write(writer)?;
		self.file_contract_revisions.write(writer)?;
		self.storage_proofs.write(writer)?;
		self.fund_inputs.write(writer)?;
		self.fund_outputs.write(writer)?;
		self.miner_fees.write(writer)?;
		self.arbitrary_data.write(writer)?;
		Ok(())
	}

	/// The hash signed by signature `i`. Covers either the whole
	/// transaction (minus all signatures) or the selected fields; the
	/// signature's own parent id, key index and timelock are always
	/// mixed in. From the replay-protection hardfork on, a domain
	/// separator is prepended.
	pub fn sig_hash(&self, i: usize, current_height: u64) -> Hash {
		let sig = &self.transaction_signatures[i];
		let mut hasher = HashWriter::default();
		if current_height >= global::foundation_hardfork_height() {
			hasher
				.write_fixed_bytes(b"uplo/sighash/replay\0")
				.expect("hash writer");
		}
		if sig.covered_fields.whole_transaction {
			self.write_unsigned_fields(&mut hasher).expect("hash writer");
			sig.parent_id.write(&mut hasher).expect("hash writer");
			hasher.write_u64(sig.public_key_index).expect("hash writer");
			hasher.write_u64(sig.timelock).expect("hash writer");
		} else {
			let cf = &sig.covered_fields;
			for &idx in &cf.coin_inputs {
				self.coin_inputs[idx as usize]
					.write(&mut hasher)
					.expect("hash writer");
			}
			for &idx in &cf.coin_outputs {
				self.coin_outputs[idx as usize]
					.write(&mut hasher)
					.expect("hash writer");
			}
			for &idx in &cf.file_contracts {
				self.file_contracts[idx as usize]
					.write(&mut hasher)
					.expect("hash writer");
			}
			for &idx in &cf.file_contract_revisions {
				self.file_contract_revisions[idx as usize]
					.write(&mut hasher)
					.expect("hash writer");
			}
			for &idx in &cf.storage_proofs {
				self.storage_proofs[idx as usize]
					.write(&mut hasher)
					.expect("hash writer");
			}
			for &idx in &cf.fund_inputs {
				self.fund_inputs[idx as usize]
					.write(&mut hasher)
					.expect("hash writer");
			}
			for &idx in &cf.fund_outputs {
				self.fund_outputs[idx as usize]
					.write(&mut hasher)
					.expect("hash writer");
			}
			for &idx in &cf.miner_fees {
				self.miner_fees[idx as usize]
					.write(&mut hasher)
					.expect("hash writer");
			}
			for &idx in &cf.arbitrary_data {
				self.arbitrary_data[idx as usize]
					.write(&mut hasher)
					.expect("hash writer");
			}
			for &idx in &cf.transaction_signatures {
				self.transaction_signatures[idx as usize]
					.write(&mut hasher)
					.expect("hash writer");
			}
		}
		hasher.into_hash()
	}

	/// Stand-alone validity: everything that can be checked without the
	/// consensus state, including full signature verification.
	pub fn standalone_valid(&self, current_height: u64) -> Result<(), Error> {
		self.correct_file_contracts(current_height)?;
		self.correct_revisions()?;
		self.follows_storage_proof_rules()?;
		self.valid_covered_fields()?;
		self.valid_signatures(current_height)?;
		Ok(())
	}

	// Contract windows must be ordered and the payout must equal the
	// proof outputs plus the tax collected for the fund pool. Both
	// output sets pay out the same total, they only differ in who
	// receives it.
	fn correct_file_contracts(&self, current_height: u64) -> Result<(), Error> {
		for contract in &self.file_contracts {
			if contract.window_start >= contract.window_end {
				return Err(Error::FileContractWindow);
			}
			if contract.payout.is_zero() {
				return Err(Error::ZeroPayout);
			}
			let tax = consensus::tax(current_height, &contract.payout);
			let expected = contract
				.payout
				.checked_sub(&tax)
				.ok_or(Error::FileContractOutputSum)?;
			if contract.valid_proof_output_sum() != expected
				|| contract.missed_proof_output_sum() != expected
			{
				return Err(Error::FileContractOutputSum);
			}
		}
		Ok(())
	}

	fn correct_revisions(&self) -> Result<(), Error> {
		for revision in &self.file_contract_revisions {
			if revision.new_window_start >= revision.new_window_end {
				return Err(Error::FileContractWindow);
			}
			if revision.new_revision_number == 0 {
				return Err(Error::LowRevisionNumber);
			}
		}
		Ok(())
	}

	// A transaction carrying a storage proof must not create anything
	// new; a reorg could otherwise orphan outputs that honest parties
	// already built on.
	fn follows_storage_proof_rules(&self) -> Result<(), Error> {
		if self.storage_proofs.is_empty() {
			return Ok(());
		}
		if !self.coin_outputs.is_empty()
			|| !self.file_contracts.is_empty()
			|| !self.file_contract_revisions.is_empty()
			|| !self.fund_outputs.is_empty()
		{
			return Err(Error::StorageProofWithOutputs);
		}
		Ok(())
	}

	fn valid_covered_fields(&self) -> Result<(), Error> {
		for sig in &self.transaction_signatures {
			let cf = &sig.covered_fields;
			let groups: [(&[u64], usize); 10] = [
				(&cf.coin_inputs, self.coin_inputs.len()),
				(&cf.coin_outputs, self.coin_outputs.len()),
				(&cf.file_contracts, self.file_contracts.len()),
				(
					&cf.file_contract_revisions,
					self.file_contract_revisions.len(),
				),
				(&cf.storage_proofs, self.storage_proofs.len()),
				(&cf.fund_inputs, self.fund_inputs.len()),
				(&cf.fund_outputs, self.fund_outputs.len()),
				(&cf.miner_fees, self.miner_fees.len()),
				(&cf.arbitrary_data, self.arbitrary_data.len()),
				(
					&cf.transaction_signatures,
					self.transaction_signatures.len(),
				),
			];
			for (list, group_len) in groups.iter() {
				let mut prev: Option<u64> = None;
				for &idx in list.iter() {
					if idx >= *group_len as u64 {
						return Err(Error::SortedUniqueViolation);
					}
					if let Some(p) = prev {
						if idx <= p {
							return Err(Error::SortedUniqueViolation);
						}
					}
					prev = Some(idx);
				}
			}
			if cf.whole_transaction {
				// only the signature index list may accompany the flag
				if !cf.coin_inputs.is_empty()
					|| !cf.coin_outputs.is_empty()
					|| !cf.file_contracts.is_empty()
					|| !cf.file_contract_revisions.is_empty()
					|| !cf.storage_proofs.is_empty()
					|| !cf.fund_inputs.is_empty()
					|| !cf.fund_outputs.is_empty()
					|| !cf.miner_fees.is_empty()
					|| !cf.arbitrary_data.is_empty()
				{
					return Err(Error::WholeTransactionViolation);
				}
			}
		}
		Ok(())
	}

	fn valid_signatures(&self, current_height: u64) -> Result<(), Error> {
		struct SigTracker<'a> {
			remaining: u64,
			conditions: &'a UnlockConditions,
		}

		let mut sig_map: HashMap<Hash, SigTracker<'_>> = HashMap::new();
		for input in &self.coin_inputs {
			if sig_map
				.insert(
					input.parent_id.0,
					SigTracker {
						remaining: input.unlock_conditions.signatures_required,
						conditions: &input.unlock_conditions,
					},
				)
				.is_some()
			{
				return Err(Error::DoubleSpend);
			}
		}
		for revision in &self.file_contract_revisions {
			if sig_map
				.insert(
					revision.parent_id.0,
					SigTracker {
						remaining: revision.unlock_conditions.signatures_required,
						conditions: &revision.unlock_conditions,
					},
				)
				.is_some()
			{
				return Err(Error::DoubleSpend);
			}
		}
		for input in &self.fund_inputs {
			if sig_map
				.insert(
					input.parent_id.0,
					SigTracker {
						remaining: input.unlock_conditions.signatures_required,
						conditions: &input.unlock_conditions,
					},
				)
				.is_some()
			{
				return Err(Error::DoubleSpend);
			}
		}

		let mut used_keys: HashSet<(Hash, u64)> = HashSet::new();
		for (i, sig) in self.transaction_signatures.iter().enumerate() {
			let public_key = {
				let tracker = sig_map
					.get_mut(&sig.parent_id)
					.ok_or(Error::FrivolousSignature)?;
				if tracker.remaining == 0 {
					return Err(Error::FrivolousSignature);
				}
				if sig.public_key_index >= tracker.conditions.public_keys.len() as u64 {
					return Err(Error::InvalidPubKeyIndex);
				}
				if !used_keys.insert((sig.parent_id, sig.public_key_index)) {
					return Err(Error::PublicKeyOveruse);
				}
				if current_height < sig.timelock {
					return Err(Error::PrematureSignature);
				}
				tracker.remaining -= 1;
				tracker.conditions.public_keys[sig.public_key_index as usize].clone()
			};
			self.check_signature(&public_key, i, current_height)?;
		}

		for tracker in sig_map.values() {
			if tracker.remaining > 0 {
				return Err(Error::MissingSignatures);
			}
		}
		Ok(())
	}

	fn check_signature(
		&self,
		public_key: &PublicKey,
		i: usize,
		current_height: u64,
	) -> Result<(), Error> {
		match public_key.algorithm {
			ALGORITHM_ENTROPY => Err(Error::EntropyKey),
			ALGORITHM_ED25519 => {
				let hash = self.sig_hash(i, current_height);
				verify_hash(
					&hash,
					&public_key.key,
					&self.transaction_signatures[i].signature,
				)
				.map_err(|_| Error::InvalidSignature)
			}
			// Unrecognized algorithms are accepted unconditionally so
			// that they can be introduced by soft fork.
			_ => Ok(()),
		}
	}
}

impl DefaultHashable for Transaction {}
impl DefaultHashable for CoinOutput {}
impl DefaultHashable for FileContract {}

impl Writeable for CoinInput {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		self.parent_id.write(writer)?;
		self.unlock_conditions.write(writer)
	}
}

impl Readable for CoinInput {
	fn read(reader: &mut dyn Reader) -> Result<CoinInput, ser::Error> {
		Ok(CoinInput {
			parent_id: CoinOutputID::read(reader)?,
			unlock_conditions: UnlockConditions::read(reader)?,
		})
	}
}

impl Writeable for CoinOutput {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		self.value.write(writer)?;
		self.unlock_hash.write(writer)
	}
}

impl Readable for CoinOutput {
	fn read(reader: &mut dyn Reader) -> Result<CoinOutput, ser::Error> {
		Ok(CoinOutput {
			value: Currency::read(reader)?,
			unlock_hash: UnlockHash::read(reader)?,
		})
	}
}

impl Writeable for FileContract {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		ser_multiwrite!(
			writer,
			[write_u64, self.file_size],
			[write_fixed_bytes, &self.file_merkle_root.0],
			[write_u64, self.window_start],
			[write_u64, self.window_end]
		);
		self.payout.write(writer)?;
		self.valid_proof_outputs.write(writer)?;
		self.missed_proof_outputs.write(writer)?;
		self.unlock_hash.write(writer)?;
		writer.write_u64(self.revision_number)
	}
}

impl Readable for FileContract {
	fn read(reader: &mut dyn Reader) -> Result<FileContract, ser::Error> {
		let file_size = reader.read_u64()?;
		let file_merkle_root = Hash::read(reader)?;
		let (window_start, window_end) = ser_multiread!(reader, read_u64, read_u64);
		let payout = Currency::read(reader)?;
		let valid_proof_outputs = Vec::read(reader)?;
		let missed_proof_outputs = Vec::read(reader)?;
		let unlock_hash = UnlockHash::read(reader)?;
		let revision_number = reader.read_u64()?;
		Ok(FileContract {
			file_size,
			file_merkle_root,
			window_start,
			window_end,
			payout,
			valid_proof_outputs,
			missed_proof_outputs,
			unlock_hash,
			revision_number,
		})
	}
}

impl Writeable for FileContractRevision {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		self.parent_id.write(writer)?;
		self.unlock_conditions.write(writer)?;
		ser_multiwrite!(
			writer,
			[write_u64, self.new_revision_number],
			[write_u64, self.new_file_size],
			[write_fixed_bytes, &self.new_file_merkle_root.0],
			[write_u64, self.new_window_start],
			[write_u64, self.new_window_end]
		);
		self.new_valid_proof_outputs.write(writer)?;
		self.new_missed_proof_outputs.write(writer)?;
		self.new_unlock_hash.write(writer)
	}
}

impl Readable for FileContractRevision {
	fn read(reader: &mut dyn Reader) -> Result<FileContractRevision, ser::Error> {
		let parent_id = FileContractID::read(reader)?;
		let unlock_conditions = UnlockConditions::read(reader)?;
		let (new_revision_number, new_file_size) = ser_multiread!(reader, read_u64, read_u64);
		let new_file_merkle_root = Hash::read(reader)?;
		let (new_window_start, new_window_end) = ser_multiread!(reader, read_u64, read_u64);
		let new_valid_proof_outputs = Vec::read(reader)?;
		let new_missed_proof_outputs = Vec::read(reader)?;
		let new_unlock_hash = UnlockHash::read(reader)?;
		Ok(FileContractRevision {
			parent_id,
			unlock_conditions,
			new_revision_number,
			new_file_size,
			new_file_merkle_root,
			new_window_start,
			new_window_end,
			new_valid_proof_outputs,
			new_missed_proof_outputs,
			new_unlock_hash,
		})
	}
}

impl Writeable for StorageProof {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		self.parent_id.write(writer)?;
		writer.write_fixed_bytes(&self.segment)?;
		self.hash_set.write(writer)
	}
}

impl Readable for StorageProof {
	fn read(reader: &mut dyn Reader) -> Result<StorageProof, ser::Error> {
		let parent_id = FileContractID::read(reader)?;
		let segment_bytes = reader.read_fixed_bytes(SEGMENT_SIZE)?;
		let mut segment = [0; SEGMENT_SIZE];
		segment.copy_from_slice(&segment_bytes[..]);
		let hash_set = Vec::read(reader)?;
		Ok(StorageProof {
			parent_id,
			segment,
			hash_set,
		})
	}
}

impl Writeable for FundInput {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		self.parent_id.write(writer)?;
		self.unlock_conditions.write(writer)?;
		self.claim_unlock_hash.write(writer)
	}
}

impl Readable for FundInput {
	fn read(reader: &mut dyn Reader) -> Result<FundInput, ser::Error> {
		Ok(FundInput {
			parent_id: FundOutputID::read(reader)?,
			unlock_conditions: UnlockConditions::read(reader)?,
			claim_unlock_hash: UnlockHash::read(reader)?,
		})
	}
}

impl Writeable for FundOutput {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		self.value.write(writer)?;
		self.unlock_hash.write(writer)?;
		self.claim_start.write(writer)
	}
}

impl Readable for FundOutput {
	fn read(reader: &mut dyn Reader) -> Result<FundOutput, ser::Error> {
		Ok(FundOutput {
			value: Currency::read(reader)?,
			unlock_hash: UnlockHash::read(reader)?,
			claim_start: Currency::read(reader)?,
		})
	}
}

impl Writeable for CoveredFields {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		writer.write_bool(self.whole_transaction)?;
		self.coin_inputs.write(writer)?;
		self.coin_outputs.write(writer)?;
		self.file_contracts.write(writer)?;
		self.file_contract_revisions.write(writer)?;
		self.storage_proofs.write(writer)?;
		self.fund_inputs.write(writer)?;
		self.fund_outputs.write(writer)?;
		self.miner_fees.write(writer)?;
		self.arbitrary_data.write(writer)?;
		self.transaction_signatures.write(writer)
	}
}

impl Readable for CoveredFields {
	fn read(reader: &mut dyn Reader) -> Result<CoveredFields, ser::Error> {
		Ok(CoveredFields {
			whole_transaction: reader.read_bool()?,
			coin_inputs: Vec::read(reader)?,
			coin_outputs: Vec::read(reader)?,
			file_contracts: Vec::read(reader)?,
			file_contract_revisions: Vec::read(reader)?,
			storage_proofs: Vec::read(reader)?,
			fund_inputs: Vec::read(reader)?,
			fund_outputs: Vec::read(reader)?,
			miner_fees: Vec::read(reader)?,
			arbitrary_data: Vec::read(reader)?,
			transaction_signatures: Vec::read(reader)?,
		})
	}
}

impl Writeable for TransactionSignature {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		self.parent_id.write(writer)?;
		ser_multiwrite!(
			writer,
			[write_u64, self.public_key_index],
			[write_u64, self.timelock]
		);
		self.covered_fields.write(writer)?;
		writer.write_bytes(&self.signature)
	}
}

impl Readable for TransactionSignature {
	fn read(reader: &mut dyn Reader) -> Result<TransactionSignature, ser::Error> {
		let parent_id = Hash::read(reader)?;
		let (public_key_index, timelock) = ser_multiread!(reader, read_u64, read_u64);
		let covered_fields = CoveredFields::read(reader)?;
		let signature = reader.read_bytes_len_prefix()?;
		Ok(TransactionSignature {
			parent_id,
			public_key_index,
			timelock,
			covered_fields,
			signature,
		})
	}
}

impl Writeable for Transaction {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		self.write_unsigned_fields(writer)?;
		self.transaction_signatures.write(writer)
	}
}

impl Readable for Transaction {
	fn read(reader: &mut dyn Reader) -> Result<Transaction, ser::Error> {
		Ok(Transaction {
			coin_inputs: Vec::read(reader)?,
			coin_outputs: Vec::read(reader)?,
			file_contracts: Vec::read(reader)?,
			file_contract_revisions: Vec::read(reader)?,
			storage_proofs: Vec::read(reader)?,
			fund_inputs: Vec::read(reader)?,
			fund_outputs: Vec::read(reader)?,
			miner_fees: Vec::read(reader)?,
			arbitrary_data: Vec::read(reader)?,
			transaction_signatures: Vec::read(reader)?,
		})
	}
}
