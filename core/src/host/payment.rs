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

//! Payment request framings.
//!
//! A renter pays a host either by revising a file contract in the
//! host's favor or by drawing down an ephemeral account it has funded.
//! Ephemeral-account withdrawals are signed messages with an expiry
//! height so a captured message cannot be replayed forever.

use crate::core::currency::Currency;
use crate::core::hash::{DefaultHashable, Hashed};
use crate::core::keys::{PublicKey, UnlockHash};
use crate::core::transaction::FileContractID;
use crate::crypto::signature::verify_hash;
use crate::ser::{self, Readable, Reader, Writeable, Writer};

/// How many blocks past the current height a withdrawal expiry may
/// reach before it is considered hostile.
pub const WITHDRAWAL_EXPIRY_HORIZON: u64 = 20;

/// Errors thrown while validating payment messages.
#[derive(Clone, Debug, Eq, PartialEq, Fail)]
pub enum Error {
	/// The withdrawal expired at or below the current height.
	#[fail(display = "ephemeral account withdrawal message expired")]
	WithdrawalExpired,
	/// The withdrawal expiry lies beyond the allowed horizon.
	#[fail(display = "ephemeral account withdrawal expiry is too far in the future")]
	WithdrawalExtremeFuture,
	/// The withdrawal signature does not verify under the account key.
	#[fail(display = "ephemeral account withdrawal has an invalid signature")]
	WithdrawalInvalidSignature,
}

/// Request to pay by revising a file contract in the host's favor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PayByContractRequest {
	/// The contract whose revision carries the payment.
	pub contract_id: FileContractID,
	/// The revision number of the paying revision.
	pub new_revision_number: u64,
	/// Replacement valid-proof output values.
	pub new_valid_proof_values: Vec<Currency>,
	/// Replacement missed-proof output values.
	pub new_missed_proof_values: Vec<Currency>,
	/// Account refunded if the host cannot honor the payment.
	pub refund_account: UnlockHash,
	/// Renter signature over the revision.
	pub signature: Vec<u8>,
}

impl Writeable for PayByContractRequest {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		self.contract_id.write(writer)?;
		writer.write_u64(self.new_revision_number)?;
		self.new_valid_proof_values.write(writer)?;
		self.new_missed_proof_values.write(writer)?;
		self.refund_account.write(writer)?;
		writer.write_bytes(&self.signature)
	}
}

impl Readable for PayByContractRequest {
	fn read(reader: &mut dyn Reader) -> Result<PayByContractRequest, ser::Error> {
		Ok(PayByContractRequest {
			contract_id: FileContractID::read(reader)?,
			new_revision_number: reader.read_u64()?,
			new_valid_proof_values: Vec::read(reader)?,
			new_missed_proof_values: Vec::read(reader)?,
			refund_account: UnlockHash::read(reader)?,
			signature: reader.read_bytes_len_prefix()?,
		})
	}
}

/// A signed withdrawal from a host-held ephemeral account.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WithdrawalMessage {
	/// The account being drawn down, identified by its public key.
	pub account: PublicKey,
	/// Height at which the message expires.
	pub expiry: u64,
	/// Amount withdrawn.
	pub amount: Currency,
	/// Random bytes distinguishing otherwise identical withdrawals.
	pub nonce: [u8; 8],
}

impl DefaultHashable for WithdrawalMessage {}

impl WithdrawalMessage {
	/// Validates expiry bounds and the signature under the account key.
	pub fn validate(&self, current_height: u64, signature: &[u8]) -> Result<(), Error> {
		if self.expiry < current_height {
			return Err(Error::WithdrawalExpired);
		}
		if self.expiry > current_height + WITHDRAWAL_EXPIRY_HORIZON {
			return Err(Error::WithdrawalExtremeFuture);
		}
		verify_hash(&self.hash(), &self.account.key, signature)
			.map_err(|_| Error::WithdrawalInvalidSignature)
	}
}

impl Writeable for WithdrawalMessage {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		self.account.write(writer)?;
		writer.write_u64(self.expiry)?;
		self.amount.write(writer)?;
		writer.write_fixed_bytes(&self.nonce)
	}
}

impl Readable for WithdrawalMessage {
	fn read(reader: &mut dyn Reader) -> Result<WithdrawalMessage, ser::Error> {
		let account = PublicKey::read(reader)?;
		let expiry = reader.read_u64()?;
		let amount = Currency::read(reader)?;
		let nonce_bytes = reader.read_fixed_bytes(8)?;
		let mut nonce = [0; 8];
		nonce.copy_from_slice(&nonce_bytes[..]);
		Ok(WithdrawalMessage {
			account,
			expiry,
			amount,
			nonce,
		})
	}
}

/// Request to pay from an ephemeral account.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PayByEphemeralAccountRequest {
	/// The signed withdrawal.
	pub message: WithdrawalMessage,
	/// Signature over the withdrawal message hash.
	pub signature: Vec<u8>,
	/// Priority of the payment when the account runs dry.
	pub priority: i64,
}

impl PayByEphemeralAccountRequest {
	/// Validates the embedded withdrawal at the given height.
	pub fn validate(&self, current_height: u64) -> Result<(), Error> {
		self.message.validate(current_height, &self.signature)
	}
}

impl Writeable for PayByEphemeralAccountRequest {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		self.message.write(writer)?;
		writer.write_bytes(&self.signature)?;
		writer.write_i64(self.priority)
	}
}

impl Readable for PayByEphemeralAccountRequest {
	fn read(reader: &mut dyn Reader) -> Result<PayByEphemeralAccountRequest, ser::Error> {
		Ok(PayByEphemeralAccountRequest {
			message: WithdrawalMessage::read(reader)?,
			signature: reader.read_bytes_len_prefix()?,
			priority: reader.read_i64()?,
		})
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::crypto::signature::Keypair;

	fn signed_withdrawal(expiry: u64) -> (WithdrawalMessage, Vec<u8>) {
		let keypair = Keypair::from_seed([8; 32]);
		let message = WithdrawalMessage {
			account: PublicKey::ed25519(keypair.public_key()),
			expiry,
			amount: Currency::from(500),
			nonce: [1, 2, 3, 4, 5, 6, 7, 8],
		};
		let signature = keypair.sign(&message.hash());
		(message, signature)
	}

	#[test]
	fn valid_withdrawal() {
		let (message, signature) = signed_withdrawal(110);
		assert!(message.validate(100, &signature).is_ok());
	}

	#[test]
	fn expiry_bounds() {
		let (message, signature) = signed_withdrawal(99);
		assert_eq!(
			message.validate(100, &signature),
			Err(Error::WithdrawalExpired)
		);

		let (message, signature) = signed_withdrawal(100 + WITHDRAWAL_EXPIRY_HORIZON + 1);
		assert_eq!(
			message.validate(100, &signature),
			Err(Error::WithdrawalExtremeFuture)
		);
	}

	#[test]
	fn bad_signature() {
		let (message, mut signature) = signed_withdrawal(110);
		signature[5] ^= 1;
		assert_eq!(
			message.validate(100, &signature),
			Err(Error::WithdrawalInvalidSignature)
		);
	}

	#[test]
	fn request_round_trip() {
		let (message, signature) = signed_withdrawal(110);
		let request = PayByEphemeralAccountRequest {
			message,
			signature,
			priority: 3,
		};
		let bytes = ser::ser_vec(&request).unwrap();
		let decoded: PayByEphemeralAccountRequest =
			ser::deserialize_default(&mut &bytes[..]).unwrap();
		assert_eq!(decoded, request);
	}
}
