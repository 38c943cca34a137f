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

//! Pluggable cipher keys.
//!
//! Sector data is encrypted under one of four cipher types, identified
//! on disk by an 8-byte specifier. Twofish-GCM is an authenticated mode
//! with a 12-byte random nonce prepended to the ciphertext and a 16-byte
//! tag appended by the AEAD; the Threefish-512 and XChaCha20 modes are
//! deterministic keystreams with zero overhead, which is what allows
//! `decrypt_in_place` to start at any 64-byte block boundary.

use aes_gcm::aead::generic_array::typenum::U12;
use aes_gcm::aead::Aead;
use aes_gcm::AesGcm;
use chacha20::cipher::{KeyIvInit, StreamCipher, StreamCipherSeek};
use chacha20::XChaCha20;
use cipher::generic_array::GenericArray;
use cipher::{BlockEncrypt, KeyInit};
use rand::{thread_rng, Rng};
use std::fmt;
use threefish::Threefish512;
use twofish::Twofish;
use zeroize::Zeroize;

use super::Error;
use crate::core::hash::HashWriter;
use crate::ser::{self, Readable, Reader, Writeable, Writer};

/// Twofish-GCM ciphertext overhead: 12-byte nonce plus 16-byte tag.
pub const TWOFISH_OVERHEAD: usize = 28;
/// Keystream block size of the Threefish-512 and XChaCha20 modes.
pub const CIPHER_BLOCK_SIZE: usize = 64;
/// Length of the key material blob carried in a skyfile layout.
pub const KEY_DATA_LEN: usize = 64;

type TwofishGcm = AesGcm<Twofish, U12>;

/// The 8-byte on-disk identifier of a cipher type.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CipherType(pub [u8; 8]);

/// No encryption; data is stored as given.
pub const CIPHER_TYPE_PLAIN: CipherType = CipherType(*b"plain\0\0\0");
/// Twofish-GCM, an authenticated mode.
pub const CIPHER_TYPE_TWOFISH: CipherType = CipherType(*b"twofish\0");
/// Threefish-512 keystream.
pub const CIPHER_TYPE_THREEFISH: CipherType = CipherType(*b"3fish512");
/// XChaCha20 keystream.
pub const CIPHER_TYPE_XCHACHA20: CipherType = CipherType(*b"xchacha2");

/// Cipher type used for renter data by default.
pub const CIPHER_TYPE_DEFAULT_RENTER: CipherType = CIPHER_TYPE_THREEFISH;
/// Cipher type used for wallet seeds by default.
pub const CIPHER_TYPE_DEFAULT_WALLET: CipherType = CIPHER_TYPE_TWOFISH;

impl CipherType {
	/// The ciphertext overhead of this cipher type in bytes.
	pub fn overhead(&self) -> Result<usize, Error> {
		match *self {
			CIPHER_TYPE_PLAIN | CIPHER_TYPE_THREEFISH | CIPHER_TYPE_XCHACHA20 => Ok(0),
			CIPHER_TYPE_TWOFISH => Ok(TWOFISH_OVERHEAD),
			_ => Err(Error::InvalidCipherType),
		}
	}
}

impl fmt::Debug for CipherType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let printable: String = self
			.0
			.iter()
			.take_while(|&&b| b != 0)
			.map(|&b| b as char)
			.collect();
		write!(f, "CipherType({})", printable)
	}
}

impl Writeable for CipherType {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		writer.write_fixed_bytes(&self.0)
	}
}

impl Readable for CipherType {
	fn read(reader: &mut dyn Reader) -> Result<CipherType, ser::Error> {
		let v = reader.read_fixed_bytes(8)?;
		let mut t = [0; 8];
		t.copy_from_slice(&v[..]);
		Ok(CipherType(t))
	}
}

/// A cipher key: the type tag plus its key material. Keys are immutable
/// after construction and safe to share across threads for reads.
#[derive(Clone)]
pub enum CipherKey {
	/// No encryption.
	Plain,
	/// Twofish-GCM with a 32-byte key.
	TwofishGcm([u8; 32]),
	/// Threefish-512 keystream with a 64-byte key.
	Threefish512([u8; 64]),
	/// XChaCha20 keystream with a 32-byte key and a fixed 24-byte nonce
	/// carried in the key material.
	XChaCha20 {
		/// The 32-byte key.
		key: [u8; 32],
		/// The 24-byte nonce; fixed per key so encryption is
		/// deterministic.
		nonce: [u8; 24],
	},
}

impl CipherKey {
	/// Generates a new key of the given type from OS entropy.
	pub fn new(cipher_type: CipherType) -> Result<CipherKey, Error> {
		let mut entropy = [0u8; KEY_DATA_LEN];
		thread_rng().fill(&mut entropy[..]);
		let key = CipherKey::from_key_data(cipher_type, &entropy);
		entropy.zeroize();
		key
	}

	/// Builds a key of the given type from a 64-byte key-material blob,
	/// the form stored in a skyfile layout. Each type consumes the
	/// prefix it needs.
	pub fn from_key_data(
		cipher_type: CipherType,
		key_data: &[u8; KEY_DATA_LEN],
	) -> Result<CipherKey, Error> {
		match cipher_type {
			CIPHER_TYPE_PLAIN => Ok(CipherKey::Plain),
			CIPHER_TYPE_TWOFISH => {
				let mut key = [0u8; 32];
				key.copy_from_slice(&key_data[..32]);
				Ok(CipherKey::TwofishGcm(key))
			}
			CIPHER_TYPE_THREEFISH => {
				let mut key = [0u8; 64];
				key.copy_from_slice(key_data);
				Ok(CipherKey::Threefish512(key))
			}
			CIPHER_TYPE_XCHACHA20 => {
				let mut key = [0u8; 32];
				let mut nonce = [0u8; 24];
				key.copy_from_slice(&key_data[..32]);
				nonce.copy_from_slice(&key_data[32..56]);
				Ok(CipherKey::XChaCha20 { key, nonce })
			}
			_ => Err(Error::InvalidCipherType),
		}
	}

	/// The type tag of this key.
	pub fn cipher_type(&self) -> CipherType {
		match self {
			CipherKey::Plain => CIPHER_TYPE_PLAIN,
			CipherKey::TwofishGcm(_) => CIPHER_TYPE_TWOFISH,
			CipherKey::Threefish512(_) => CIPHER_TYPE_THREEFISH,
			CipherKey::XChaCha20 { .. } => CIPHER_TYPE_XCHACHA20,
		}
	}

	/// The 64-byte key-material blob for a skyfile layout, zero-padded
	/// beyond what the type uses.
	pub fn key_data(&self) -> [u8; KEY_DATA_LEN] {
		let mut data = [0u8; KEY_DATA_LEN];
		match self {
			CipherKey::Plain => {}
			CipherKey::TwofishGcm(key) => data[..32].copy_from_slice(key),
			CipherKey::Threefish512(key) => data.copy_from_slice(key),
			CipherKey::XChaCha20 { key, nonce } => {
				data[..32].copy_from_slice(key);
				data[32..56].copy_from_slice(nonce);
			}
		}
		data
	}

	/// Encrypts a plaintext. Ciphertext length is the plaintext length
	/// plus the type's overhead. Keystream types are deterministic; the
	/// Twofish mode draws a fresh random nonce and prepends it.
	pub fn encrypt(&self, plaintext: &[u8]) -> Vec<u8> {
		match self {
			CipherKey::Plain => plaintext.to_vec(),
			CipherKey::TwofishGcm(key) => {
				let mut nonce = [0u8; 12];
				thread_rng().fill(&mut nonce[..]);
				let aead = TwofishGcm::new(GenericArray::from_slice(key));
				let ciphertext = aead
					.encrypt(GenericArray::from_slice(&nonce), plaintext)
					.expect("aead encryption of an in-memory buffer");
				let mut out = Vec::with_capacity(nonce.len() + ciphertext.len());
				out.extend_from_slice(&nonce);
				out.extend_from_slice(&ciphertext);
				out
			}
			CipherKey::Threefish512(key) => {
				let mut out = plaintext.to_vec();
				threefish_keystream(key, 0, &mut out);
				out
			}
			CipherKey::XChaCha20 { key, nonce } => {
				let mut out = plaintext.to_vec();
				let mut stream = XChaCha20::new(
					GenericArray::from_slice(key),
					GenericArray::from_slice(nonce),
				);
				stream.apply_keystream(&mut out);
				out
			}
		}
	}

	/// Decrypts a ciphertext produced by `encrypt`. Fails with
	/// `InvalidSignature` when an authenticated mode rejects the data.
	pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, Error> {
		match self {
			CipherKey::Plain => Ok(ciphertext.to_vec()),
			CipherKey::TwofishGcm(key) => {
				if ciphertext.len() < TWOFISH_OVERHEAD {
					return Err(Error::InvalidSignature);
				}
				let (nonce, data) = ciphertext.split_at(12);
				let aead = TwofishGcm::new(GenericArray::from_slice(key));
				aead.decrypt(GenericArray::from_slice(nonce), data)
					.map_err(|_| Error::InvalidSignature)
			}
			CipherKey::Threefish512(_) | CipherKey::XChaCha20 { .. } => {
				let mut out = ciphertext.to_vec();
				self.decrypt_in_place(&mut out, 0)?;
				Ok(out)
			}
		}
	}

	/// Decrypts a buffer in place, starting the keystream at the given
	/// 64-byte block index. Only meaningful for keystream types; the
	/// buffer must start at a block boundary of the original plaintext.
	pub fn decrypt_in_place(&self, buf: &mut [u8], block_index: u64) -> Result<(), Error> {
		match self {
			CipherKey::Plain => Ok(()),
			CipherKey::TwofishGcm(_) => Err(Error::InvalidCipherType),
			CipherKey::Threefish512(key) => {
				threefish_keystream(key, block_index, buf);
				Ok(())
			}
			CipherKey::XChaCha20 { key, nonce } => {
				let mut stream = XChaCha20::new(
					GenericArray::from_slice(key),
					GenericArray::from_slice(nonce),
				);
				stream.seek(block_index * CIPHER_BLOCK_SIZE as u64);
				stream.apply_keystream(buf);
				Ok(())
			}
		}
	}

	/// Deterministically derives the key for a particular chunk and
	/// piece, as used for fanout piece encryption. Deriving from a plain
	/// key yields a plain key.
	pub fn derive(&self, chunk_index: u64, piece_index: u64) -> CipherKey {
		if let CipherKey::Plain = self {
			return CipherKey::Plain;
		}
		let mut hasher = HashWriter::default();
		hasher
			.write_fixed_bytes(b"key derivation")
			.expect("hash writer");
		hasher
			.write_fixed_bytes(&self.key_data())
			.expect("hash writer");
		hasher.write_u64(chunk_index).expect("hash writer");
		hasher.write_u64(piece_index).expect("hash writer");
		let h1 = hasher.into_hash();

		let mut hasher = HashWriter::default();
		hasher.write_fixed_bytes(b"key expansion").expect("hash writer");
		hasher.write_fixed_bytes(&h1.0).expect("hash writer");
		let h2 = hasher.into_hash();

		let mut key_data = [0u8; KEY_DATA_LEN];
		key_data[..32].copy_from_slice(&h1.0);
		key_data[32..].copy_from_slice(&h2.0);
		let derived = CipherKey::from_key_data(self.cipher_type(), &key_data)
			.expect("derive preserves the cipher type");
		key_data.zeroize();
		derived
	}
}

impl Drop for CipherKey {
	fn drop(&mut self) {
		match self {
			CipherKey::Plain => {}
			CipherKey::TwofishGcm(key) => key.zeroize(),
			CipherKey::Threefish512(key) => key.zeroize(),
			CipherKey::XChaCha20 { key, nonce } => {
				key.zeroize();
				nonce.zeroize();
			}
		}
	}
}

impl fmt::Debug for CipherKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		// never print key material
		write!(f, "CipherKey({:?})", self.cipher_type())
	}
}

// XORs the Threefish-512 keystream into buf. Keystream block i is the
// encryption of a 64-byte block carrying i little-endian in its first
// eight bytes.
fn threefish_keystream(key: &[u8; 64], start_block: u64, buf: &mut [u8]) {
	let tf = Threefish512::new(GenericArray::from_slice(key));
	let mut block_index = start_block;
	for chunk in buf.chunks_mut(CIPHER_BLOCK_SIZE) {
		let mut block = [0u8; CIPHER_BLOCK_SIZE];
		block[..8].copy_from_slice(&block_index.to_le_bytes());
		let mut ga = GenericArray::clone_from_slice(&block);
		tf.encrypt_block(&mut ga);
		for (b, k) in chunk.iter_mut().zip(ga.iter()) {
			*b ^= k;
		}
		block_index += 1;
	}
}

#[cfg(test)]
mod test {
	use super::*;

	fn all_types() -> Vec<CipherType> {
		vec![
			CIPHER_TYPE_PLAIN,
			CIPHER_TYPE_TWOFISH,
			CIPHER_TYPE_THREEFISH,
			CIPHER_TYPE_XCHACHA20,
		]
	}

	#[test]
	fn round_trip_all_types() {
		for t in all_types() {
			let key = CipherKey::new(t).unwrap();
			for len in &[0usize, 1, 63, 64, 65, 1000] {
				let plaintext: Vec<u8> = (0..*len).map(|i| i as u8).collect();
				let ciphertext = key.encrypt(&plaintext);
				assert_eq!(ciphertext.len(), plaintext.len() + t.overhead().unwrap());
				assert_eq!(key.decrypt(&ciphertext).unwrap(), plaintext, "{:?}", t);
			}
		}
	}

	#[test]
	fn keystream_modes_are_deterministic() {
		for t in &[CIPHER_TYPE_THREEFISH, CIPHER_TYPE_XCHACHA20] {
			let key = CipherKey::new(*t).unwrap();
			let plaintext = b"deterministic keystream".to_vec();
			assert_eq!(key.encrypt(&plaintext), key.encrypt(&plaintext));
		}
	}

	#[test]
	fn twofish_nonce_randomized() {
		let key = CipherKey::new(CIPHER_TYPE_TWOFISH).unwrap();
		let plaintext = b"same plaintext".to_vec();
		assert_ne!(key.encrypt(&plaintext), key.encrypt(&plaintext));
	}

	#[test]
	fn twofish_detects_tampering() {
		let key = CipherKey::new(CIPHER_TYPE_TWOFISH).unwrap();
		let mut ciphertext = key.encrypt(b"auth");
		let last = ciphertext.len() - 1;
		ciphertext[last] ^= 1;
		assert_eq!(key.decrypt(&ciphertext), Err(Error::InvalidSignature));
	}

	#[test]
	fn in_place_matches_whole_buffer() {
		for t in &[CIPHER_TYPE_THREEFISH, CIPHER_TYPE_XCHACHA20] {
			let key = CipherKey::new(*t).unwrap();
			let plaintext: Vec<u8> = (0..64 * 5).map(|i| (i * 7) as u8).collect();
			let ciphertext = key.encrypt(&plaintext);

			for block in 0..5u64 {
				let offset = (block as usize) * CIPHER_BLOCK_SIZE;
				let mut tail = ciphertext[offset..].to_vec();
				key.decrypt_in_place(&mut tail, block).unwrap();
				assert_eq!(tail, &plaintext[offset..], "{:?} block {}", t, block);
			}
		}
	}

	#[test]
	fn in_place_rejected_for_aead() {
		let key = CipherKey::new(CIPHER_TYPE_TWOFISH).unwrap();
		let mut buf = [0u8; 64];
		assert_eq!(
			key.decrypt_in_place(&mut buf, 0),
			Err(Error::InvalidCipherType)
		);
	}

	#[test]
	fn derived_keys_differ_and_are_stable() {
		let key = CipherKey::new(CIPHER_TYPE_THREEFISH).unwrap();
		let a = key.derive(0, 0);
		let b = key.derive(0, 1);
		let a2 = key.derive(0, 0);
		assert_eq!(a.key_data().to_vec(), a2.key_data().to_vec());
		assert_ne!(a.key_data().to_vec(), b.key_data().to_vec());
		assert_eq!(a.cipher_type(), CIPHER_TYPE_THREEFISH);
	}

	#[test]
	fn unknown_type_rejected() {
		let res = CipherKey::from_key_data(CipherType(*b"nonsense"), &[0u8; 64]);
		assert_eq!(res.err(), Some(Error::InvalidCipherType));
	}
}
