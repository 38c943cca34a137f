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

//! Ed25519 signing and verification over 32-byte hashes.

use ed25519_dalek::{ExpandedSecretKey, Verifier};
use rand::{thread_rng, Rng};
use std::convert::TryFrom;

use super::Error;
use crate::core::hash::Hash;

/// Length in bytes of an ed25519 signature.
pub const SIGNATURE_LEN: usize = 64;
/// Length in bytes of an ed25519 public key.
pub const PUBLIC_KEY_LEN: usize = 32;

/// An ed25519 keypair, stored as the 32-byte seed it was derived from.
#[derive(Clone)]
pub struct Keypair {
	seed: [u8; 32],
	public: [u8; 32],
}

impl Keypair {
	/// Derives a keypair from a 32-byte seed. The same seed always
	/// yields the same keypair.
	pub fn from_seed(seed: [u8; 32]) -> Keypair {
		let secret =
			ed25519_dalek::SecretKey::from_bytes(&seed).expect("32-byte ed25519 seed");
		let public = ed25519_dalek::PublicKey::from(&secret);
		Keypair {
			seed,
			public: public.to_bytes(),
		}
	}

	/// Generates a fresh keypair from OS entropy.
	pub fn generate() -> Keypair {
		let mut seed = [0u8; 32];
		thread_rng().fill(&mut seed);
		Keypair::from_seed(seed)
	}

	/// The 32-byte public key.
	pub fn public_key(&self) -> [u8; 32] {
		self.public
	}

	/// Signs the provided hash.
	pub fn sign(&self, hash: &Hash) -> Vec<u8> {
		let secret =
			ed25519_dalek::SecretKey::from_bytes(&self.seed).expect("32-byte ed25519 seed");
		let public = ed25519_dalek::PublicKey::from(&secret);
		let expanded = ExpandedSecretKey::from(&secret);
		expanded.sign(&hash.0, &public).to_bytes().to_vec()
	}
}

/// Verifies an ed25519 signature over a hash. Key or signature bytes of
/// the wrong shape fail the same way a mismatched signature does.
pub fn verify_hash(hash: &Hash, public_key: &[u8], signature: &[u8]) -> Result<(), Error> {
	let public =
		ed25519_dalek::PublicKey::from_bytes(public_key).map_err(|_| Error::InvalidSignature)?;
	let signature =
		ed25519_dalek::Signature::try_from(signature).map_err(|_| Error::InvalidSignature)?;
	public
		.verify(&hash.0, &signature)
		.map_err(|_| Error::InvalidSignature)
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::core::hash::hash_bytes;

	#[test]
	fn sign_and_verify() {
		let keypair = Keypair::from_seed([1; 32]);
		let hash = hash_bytes(b"message");
		let sig = keypair.sign(&hash);
		assert!(verify_hash(&hash, &keypair.public_key(), &sig).is_ok());

		let mut bad = sig.clone();
		bad[0] ^= 1;
		assert_eq!(
			verify_hash(&hash, &keypair.public_key(), &bad),
			Err(Error::InvalidSignature)
		);
	}

	#[test]
	fn deterministic_from_seed() {
		let a = Keypair::from_seed([9; 32]);
		let b = Keypair::from_seed([9; 32]);
		assert_eq!(a.public_key(), b.public_key());
	}
}
