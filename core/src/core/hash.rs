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

//! Hash Function
//!
//! Primary hash function used in the protocol: blake2b with a 32-byte
//! digest. Everything that is content-addressed (blocks, transactions,
//! outputs, unlock conditions) hashes its deterministic binary encoding.

use blake2::blake2b::Blake2b;
use byteorder::{BigEndian, ByteOrder};
use std::convert::AsRef;
use std::{fmt, ops};
use util;

use crate::ser::{self, Readable, Reader, Writeable, Writer};

/// A hash consisting of all zeroes, used as a sentinel. No known hash
/// inputs would produce this hash as an output.
pub const ZERO_HASH: Hash = Hash([0; 32]);

/// A hash to uniquely (or close enough) identify one of the main blockchain
/// constructs. Used pervasively for blocks, transactions and outputs.
#[derive(Copy, Clone, PartialEq, PartialOrd, Eq, Ord, Hash, Serialize, Deserialize)]
pub struct Hash(pub [u8; 32]);

impl fmt::Debug for Hash {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let hash_hex = self.to_hex();
		const NUM_SHOW: usize = 12;
		write!(f, "{}", &hash_hex[..NUM_SHOW])
	}
}

impl fmt::Display for Hash {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.to_hex())
	}
}

impl Hash {
	/// Size of a hash in bytes.
	pub const LEN: usize = 32;

	/// Builds a Hash from a byte vector. If the vector is too short, it will be
	/// completed by zeroes. If it's too long, it will be truncated.
	pub fn from_vec(v: &[u8]) -> Hash {
		let mut h = [0; Hash::LEN];
		let copy_size = v.len().min(Hash::LEN);
		h[..copy_size].copy_from_slice(&v[..copy_size]);
		Hash(h)
	}

	/// Converts the hash to a byte vector
	pub fn to_vec(&self) -> Vec<u8> {
		self.0.to_vec()
	}

	/// The leading bytes of the hash interpreted as a big-endian u64,
	/// used to derive deterministic indices from hashes.
	pub fn to_u64(&self) -> u64 {
		BigEndian::read_u64(&self.0)
	}

	/// Convert a hash to hex string format.
	pub fn to_hex(&self) -> String {
		util::to_hex(self.to_vec())
	}

	/// Convert hex string back to hash.
	pub fn from_hex(hex: &str) -> Result<Hash, ser::Error> {
		let bytes = util::from_hex(hex.to_string()).map_err(|_| ser::Error::CorruptedData)?;
		if bytes.len() != Hash::LEN {
			return Err(ser::Error::CorruptedData);
		}
		Ok(Hash::from_vec(&bytes))
	}
}

impl ops::Index<usize> for Hash {
	type Output = u8;

	fn index(&self, idx: usize) -> &u8 {
		&self.0[idx]
	}
}

impl AsRef<[u8]> for Hash {
	fn as_ref(&self) -> &[u8] {
		&self.0
	}
}

impl Default for Hash {
	fn default() -> Hash {
		ZERO_HASH
	}
}

impl Readable for Hash {
	fn read(reader: &mut dyn Reader) -> Result<Hash, ser::Error> {
		let v = reader.read_fixed_bytes(32)?;
		let mut a = [0; 32];
		a.copy_from_slice(&v[..]);
		Ok(Hash(a))
	}
}

impl Writeable for Hash {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		writer.write_fixed_bytes(&self.0)
	}
}

/// A trait for types that have a canonical hash.
pub trait Hashed {
	/// Obtain the hash of the object
	fn hash(&self) -> Hash;
}

/// Implementing this trait means a type hashes as its deterministic binary
/// encoding, which is the default for all consensus types.
pub trait DefaultHashable: Writeable {}

impl<D: DefaultHashable> Hashed for D {
	fn hash(&self) -> Hash {
		let mut hasher = HashWriter::default();
		self.write(&mut hasher).expect("hash writer");
		hasher.into_hash()
	}
}

/// Serializer that outputs a hash of the serialized object.
pub struct HashWriter {
	state: Blake2b,
}

impl HashWriter {
	/// Consume the `HashWriter`, outputting its current hash into a 32-byte
	/// array.
	pub fn finalize(self, output: &mut [u8]) {
		output.copy_from_slice(self.state.finalize().as_bytes());
	}

	/// Consume the `HashWriter`, outputting a `Hash` corresponding to its
	/// current state.
	pub fn into_hash(self) -> Hash {
		let mut res = [0; 32];
		res.copy_from_slice(self.state.finalize().as_bytes());
		Hash(res)
	}
}

impl Default for HashWriter {
	fn default() -> HashWriter {
		HashWriter {
			state: Blake2b::new(32),
		}
	}
}

impl Writer for HashWriter {
	fn write_fixed_bytes(&mut self, bytes: &[u8]) -> Result<(), ser::Error> {
		self.state.update(bytes);
		Ok(())
	}
}

/// Hash of raw bytes, without any length framing.
pub fn hash_bytes(data: &[u8]) -> Hash {
	let mut state = Blake2b::new(32);
	state.update(data);
	let mut res = [0; 32];
	res.copy_from_slice(state.finalize().as_bytes());
	Hash(res)
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn hash_writer_matches_bytes() {
		let mut hasher = HashWriter::default();
		hasher.write_fixed_bytes(b"uplo").unwrap();
		assert_eq!(hasher.into_hash(), hash_bytes(b"uplo"));
	}

	#[test]
	fn hex_round_trip() {
		let h = hash_bytes(b"some data");
		assert_eq!(Hash::from_hex(&h.to_hex()).unwrap(), h);
	}
}
