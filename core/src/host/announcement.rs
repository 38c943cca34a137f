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

//! Host announcements.
//!
//! A host announces itself by placing a signed record in a
//! transaction's arbitrary data: the announcement specifier, its net
//! address, its public key and an ed25519 signature over everything
//! before the signature. Anyone scanning the chain can recover the
//! address/key binding and verify it without trusting the relayer.

use crate::core::hash::hash_bytes;
use crate::core::keys::{PublicKey, Specifier, ALGORITHM_ED25519, SPECIFIER_HOST_ANNOUNCEMENT};
use crate::crypto::signature::{verify_hash, Keypair};
use crate::ser::{self, BinReader, BinWriter, Readable, Reader, Writeable, Writer};

/// Errors thrown when decoding a host announcement.
#[derive(Clone, Debug, Eq, PartialEq, Fail)]
pub enum Error {
	/// The data does not begin with the announcement specifier.
	#[fail(display = "data is not a host announcement")]
	NotAnnouncement,
	/// The key's signature algorithm is not ed25519.
	#[fail(display = "announcement signed under an unrecognized algorithm")]
	UnrecognizedSignature,
	/// The signature does not cover the announcement bytes.
	#[fail(display = "invalid signature")]
	InvalidSignature,
}

impl From<ser::Error> for Error {
	// Truncation and framing damage surface once signature material is
	// unreadable.
	fn from(_: ser::Error) -> Error {
		Error::InvalidSignature
	}
}

// Bound on a hostile announcement blob; real ones are under 200 bytes.
const MAX_ANNOUNCEMENT_SIZE: u64 = 16 * 1024;

/// Encodes and signs an announcement binding `net_address` to the
/// keypair's public key.
pub fn create_announcement(net_address: &str, keypair: &Keypair) -> Vec<u8> {
	let public_key = PublicKey::ed25519(keypair.public_key());
	let mut body = vec![];
	{
		let mut writer = BinWriter::new(&mut body);
		SPECIFIER_HOST_ANNOUNCEMENT
			.write(&mut writer)
			.expect("in-memory serialization");
		writer
			.write_string(net_address)
			.expect("in-memory serialization");
		public_key
			.write(&mut writer)
			.expect("in-memory serialization");
	}
	let signature = keypair.sign(&hash_bytes(&body));
	body.extend_from_slice(&signature);
	body
}

/// Decodes an announcement, verifying its signature, and returns the
/// announced net address and public key.
pub fn decode_announcement(data: &[u8]) -> Result<(String, PublicKey), Error> {
	let mut source = &data[..];
	let mut reader = BinReader::new(&mut source, MAX_ANNOUNCEMENT_SIZE);

	let specifier = Specifier::read(&mut reader)?;
	if specifier != SPECIFIER_HOST_ANNOUNCEMENT {
		return Err(Error::NotAnnouncement);
	}
	let net_address = reader.read_string()?;
	let public_key = PublicKey::read(&mut reader)?;
	if public_key.algorithm != ALGORITHM_ED25519 {
		debug!("announcement rejected: algorithm {}", public_key.algorithm);
		return Err(Error::UnrecognizedSignature);
	}
	let signature = reader.read_fixed_bytes(64)?;

	// The signature covers every byte before itself.
	let signed_len = data
		.len()
		.checked_sub(64)
		.ok_or(Error::InvalidSignature)?;
	verify_hash(&hash_bytes(&data[..signed_len]), &public_key.key, &signature)
		.map_err(|_| Error::InvalidSignature)?;
	Ok((net_address, public_key))
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn round_trip() {
		let keypair = Keypair::from_seed([3; 32]);
		let data = create_announcement("f.o:1234", &keypair);
		let (addr, key) = decode_announcement(&data).unwrap();
		assert_eq!(addr, "f.o:1234");
		assert_eq!(key, PublicKey::ed25519(keypair.public_key()));
	}

	#[test]
	fn corruption_matrix() {
		let keypair = Keypair::from_seed([3; 32]);
		let data = create_announcement("f.o:1234", &keypair);

		// flipping the leading specifier: not an announcement at all
		let mut bad = data.clone();
		bad[0] ^= 1;
		assert_eq!(decode_announcement(&bad), Err(Error::NotAnnouncement));

		// flipping the key's algorithm specifier: unrecognized signature
		let algorithm_offset = 16 + 8 + "f.o:1234".len();
		let mut bad = data.clone();
		bad[algorithm_offset] ^= 1;
		assert_eq!(
			decode_announcement(&bad),
			Err(Error::UnrecognizedSignature)
		);

		// flipping any address or signature byte: invalid signature
		for &offset in &[17, 25, data.len() - 1, data.len() - 40] {
			let mut bad = data.clone();
			bad[offset] ^= 1;
			assert_eq!(
				decode_announcement(&bad),
				Err(Error::InvalidSignature),
				"offset {}",
				offset
			);
		}
	}

	#[test]
	fn truncation_rejected() {
		let keypair = Keypair::from_seed([3; 32]);
		let data = create_announcement("f.o:1234", &keypair);
		assert!(decode_announcement(&data[..data.len() - 1]).is_err());
	}
}
