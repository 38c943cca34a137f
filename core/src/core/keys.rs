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

//! Specifiers, public keys and unlock conditions.
//!
//! A specifier is a 16-byte tag that makes encodings self-describing:
//! signature algorithms, arbitrary-data interpretations and output id
//! derivations all start with one. Unlock conditions gate the spending
//! of outputs; their Merkle root is the unlock hash that outputs commit
//! to.

use std::fmt;

use crate::core::hash::{DefaultHashable, Hash};
use crate::crypto::merkle::Tree;
use crate::ser::{self, Readable, Reader, Writeable, Writer};

/// A 16-byte tag identifying the interpretation of what follows it.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Specifier(pub [u8; 16]);

/// Signature algorithm: ed25519. Signatures under it are verified.
pub const ALGORITHM_ED25519: Specifier = Specifier(*b"ed25519\0\0\0\0\0\0\0\0\0");
/// Signature algorithm: entropy. A key that is pure entropy can never
/// sign; its use in a signature invalidates the transaction.
pub const ALGORITHM_ENTROPY: Specifier = Specifier(*b"entropy\0\0\0\0\0\0\0\0\0");

/// Arbitrary-data prefix announcing a host on the network.
pub const SPECIFIER_HOST_ANNOUNCEMENT: Specifier = Specifier(*b"HostAnnouncement");
/// Arbitrary-data prefix carrying a Foundation unlock-hash update.
pub const SPECIFIER_FOUNDATION: Specifier = Specifier(*b"foundation\0\0\0\0\0\0");

/// Output id derivation domain: coin outputs.
pub const SPECIFIER_COIN_OUTPUT: Specifier = Specifier(*b"coin output\0\0\0\0\0");
/// Output id derivation domain: fund outputs.
pub const SPECIFIER_FUND_OUTPUT: Specifier = Specifier(*b"fund output\0\0\0\0\0");
/// Output id derivation domain: file contracts.
pub const SPECIFIER_FILE_CONTRACT: Specifier = Specifier(*b"file contract\0\0\0");
/// Output id derivation domain: storage proof payouts.
pub const SPECIFIER_STORAGE_PROOF: Specifier = Specifier(*b"storage proof\0\0\0");

impl Specifier {
	/// The specifier bytes as a slice.
	pub fn as_bytes(&self) -> &[u8] {
		&self.0
	}
}

impl fmt::Debug for Specifier {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let printable: String = self
			.0
			.iter()
			.take_while(|&&b| b != 0)
			.map(|&b| b as char)
			.collect();
		write!(f, "Specifier({})", printable)
	}
}

impl fmt::Display for Specifier {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Debug::fmt(self, f)
	}
}

impl Writeable for Specifier {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		writer.write_fixed_bytes(&self.0)
	}
}

impl Readable for Specifier {
	fn read(reader: &mut dyn Reader) -> Result<Specifier, ser::Error> {
		let v = reader.read_fixed_bytes(16)?;
		let mut s = [0; 16];
		s.copy_from_slice(&v[..]);
		Ok(Specifier(s))
	}
}

/// A public key tagged with its signature algorithm. Keys under an
/// unrecognized algorithm are accepted unconditionally so that new
/// algorithms can soft-fork in.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKey {
	/// The signature algorithm this key belongs to.
	pub algorithm: Specifier,
	/// The raw key material, interpreted per algorithm.
	pub key: Vec<u8>,
}

impl PublicKey {
	/// An ed25519 public key.
	pub fn ed25519(key: [u8; 32]) -> PublicKey {
		PublicKey {
			algorithm: ALGORITHM_ED25519,
			key: key.to_vec(),
		}
	}
}

impl Writeable for PublicKey {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		self.algorithm.write(writer)?;
		writer.write_bytes(&self.key)
	}
}

impl Readable for PublicKey {
	fn read(reader: &mut dyn Reader) -> Result<PublicKey, ser::Error> {
		let algorithm = Specifier::read(reader)?;
		let key = reader.read_bytes_len_prefix()?;
		Ok(PublicKey { algorithm, key })
	}
}

impl DefaultHashable for PublicKey {}

/// The hash of a set of unlock conditions, the address that outputs are
/// sent to.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default, Serialize, Deserialize)]
pub struct UnlockHash(pub Hash);

impl fmt::Display for UnlockHash {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl Writeable for UnlockHash {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		self.0.write(writer)
	}
}

impl Readable for UnlockHash {
	fn read(reader: &mut dyn Reader) -> Result<UnlockHash, ser::Error> {
		Ok(UnlockHash(Hash::read(reader)?))
	}
}

/// The conditions that must be met to spend an output: after `timelock`,
/// any `signatures_required` distinct keys of `public_keys` must sign
/// the transaction.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UnlockConditions {
	/// Height before which the conditions cannot be satisfied.
	pub timelock: u64,
	/// The keys that may participate in unlocking.
	pub public_keys: Vec<PublicKey>,
	/// How many distinct keys must sign.
	pub signatures_required: u64,
}

impl UnlockConditions {
	/// Conditions requiring a single signature by a single ed25519 key,
	/// the common wallet case.
	pub fn single_sig(key: [u8; 32]) -> UnlockConditions {
		UnlockConditions {
			timelock: 0,
			public_keys: vec![PublicKey::ed25519(key)],
			signatures_required: 1,
		}
	}

	/// The unlock hash: a Merkle root over the timelock, each public key
	/// and the signature requirement, so a partial reveal is possible.
	pub fn unlock_hash(&self) -> UnlockHash {
		let mut tree = Tree::new();
		tree.push(&ser_leaf(&self.timelock));
		for key in &self.public_keys {
			tree.push(&ser_leaf(key));
		}
		tree.push(&ser_leaf(&self.signatures_required));
		UnlockHash(tree.root())
	}
}

fn ser_leaf<T: Writeable>(thing: &T) -> Vec<u8> {
	ser::ser_vec(thing).expect("in-memory serialization")
}

impl Writeable for UnlockConditions {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		writer.write_u64(self.timelock)?;
		self.public_keys.write(writer)?;
		writer.write_u64(self.signatures_required)
	}
}

impl Readable for UnlockConditions {
	fn read(reader: &mut dyn Reader) -> Result<UnlockConditions, ser::Error> {
		let timelock = reader.read_u64()?;
		let public_keys = Vec::read(reader)?;
		let signatures_required = reader.read_u64()?;
		Ok(UnlockConditions {
			timelock,
			public_keys,
			signatures_required,
		})
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn unlock_hash_commits_to_all_fields() {
		let base = UnlockConditions::single_sig([7; 32]);
		let mut timelocked = base.clone();
		timelocked.timelock = 10;
		let mut multi = base.clone();
		multi.signatures_required = 2;

		assert_ne!(base.unlock_hash(), timelocked.unlock_hash());
		assert_ne!(base.unlock_hash(), multi.unlock_hash());
	}

	#[test]
	fn specifier_display_strips_padding() {
		assert_eq!(format!("{}", ALGORITHM_ED25519), "Specifier(ed25519)");
	}
}
