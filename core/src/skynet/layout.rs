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

//! The skyfile base-sector layout and fanout.
//!
//! The first 99 bytes of a skylink's sector describe everything needed
//! to resolve the rest: sizes of the file, metadata and fanout, the
//! erasure-coding shape of the fanout and the cipher protecting it. The
//! fanout itself is a flat table of 32-byte Merkle roots, one row per
//! chunk, one column per piece.

use crate::core::hash::Hash;
use crate::crypto::cipher::{CipherType, CIPHER_TYPE_PLAIN, KEY_DATA_LEN};

/// Exact encoded size of a skyfile layout.
pub const SKYFILE_LAYOUT_SIZE: usize = 99;

/// The current layout version.
pub const SKYFILE_VERSION: u8 = 1;

/// Errors thrown when parsing a base sector.
#[derive(Clone, Debug, Eq, PartialEq, Fail)]
pub enum Error {
	/// A base sector shorter than a layout.
	#[fail(display = "base sector is too short to hold a layout")]
	ShortBaseSector,
	/// An unknown layout version.
	#[fail(display = "unrecognized skyfile layout version")]
	BadVersion,
	/// A fanout whose length is not a multiple of its row size.
	#[fail(display = "skyfile fanout length does not divide into chunks")]
	MalformedFanout,
}

/// The 99-byte header at the start of every skyfile's base sector.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SkyfileLayout {
	/// Layout version, currently always 1.
	pub version: u8,
	/// Length of the stored file in bytes.
	pub filesize: u64,
	/// Length of the JSON metadata blob.
	pub metadata_size: u64,
	/// Length of the fanout table.
	pub fanout_size: u64,
	/// Erasure-coding data pieces per fanout chunk.
	pub fanout_data_pieces: u8,
	/// Erasure-coding parity pieces per fanout chunk.
	pub fanout_parity_pieces: u8,
	/// Cipher protecting the fanout pieces.
	pub cipher_type: CipherType,
	/// Key material for the cipher, zero-padded.
	pub key_data: [u8; KEY_DATA_LEN],
}

impl Default for SkyfileLayout {
	fn default() -> SkyfileLayout {
		SkyfileLayout {
			version: SKYFILE_VERSION,
			filesize: 0,
			metadata_size: 0,
			fanout_size: 0,
			fanout_data_pieces: 0,
			fanout_parity_pieces: 0,
			cipher_type: CIPHER_TYPE_PLAIN,
			key_data: [0; KEY_DATA_LEN],
		}
	}
}

impl SkyfileLayout {
	/// Encodes the layout into its fixed 99-byte form. Producing any
	/// other length would be a bug in this file, not bad input.
	pub fn encode(&self) -> [u8; SKYFILE_LAYOUT_SIZE] {
		let mut bytes = [0u8; SKYFILE_LAYOUT_SIZE];
		let mut offset = 0;
		bytes[offset] = self.version;
		offset += 1;
		bytes[offset..offset + 8].copy_from_slice(&self.filesize.to_le_bytes());
		offset += 8;
		bytes[offset..offset + 8].copy_from_slice(&self.metadata_size.to_le_bytes());
		offset += 8;
		bytes[offset..offset + 8].copy_from_slice(&self.fanout_size.to_le_bytes());
		offset += 8;
		bytes[offset] = self.fanout_data_pieces;
		offset += 1;
		bytes[offset] = self.fanout_parity_pieces;
		offset += 1;
		bytes[offset..offset + 8].copy_from_slice(&self.cipher_type.0);
		offset += 8;
		bytes[offset..offset + KEY_DATA_LEN].copy_from_slice(&self.key_data);
		offset += KEY_DATA_LEN;
		assert_eq!(offset, SKYFILE_LAYOUT_SIZE, "layout encoding drifted");
		bytes
	}

	/// Decodes a layout from the head of a base sector.
	pub fn decode(base_sector: &[u8]) -> Result<SkyfileLayout, Error> {
		if base_sector.len() < SKYFILE_LAYOUT_SIZE {
			return Err(Error::ShortBaseSector);
		}
		let u64_at = |offset: usize| {
			let mut buf = [0u8; 8];
			buf.copy_from_slice(&base_sector[offset..offset + 8]);
			u64::from_le_bytes(buf)
		};
		let version = base_sector[0];
		if version != SKYFILE_VERSION {
			return Err(Error::BadVersion);
		}
		let filesize = u64_at(1);
		let metadata_size = u64_at(9);
		let fanout_size = u64_at(17);
		let fanout_data_pieces = base_sector[25];
		let fanout_parity_pieces = base_sector[26];
		let mut cipher = [0u8; 8];
		cipher.copy_from_slice(&base_sector[27..35]);
		let mut key_data = [0u8; KEY_DATA_LEN];
		key_data.copy_from_slice(&base_sector[35..35 + KEY_DATA_LEN]);
		Ok(SkyfileLayout {
			version,
			filesize,
			metadata_size,
			fanout_size,
			fanout_data_pieces,
			fanout_parity_pieces,
			cipher_type: CipherType(cipher),
			key_data,
		})
	}

	/// Total pieces per chunk.
	pub fn pieces_per_chunk(&self) -> u64 {
		self.fanout_data_pieces as u64 + self.fanout_parity_pieces as u64
	}

	/// Bytes of fanout per chunk. When there is a single data piece and
	/// no encryption every piece of a chunk is identical, so a single
	/// root is stored.
	pub fn chunk_roots_size(&self) -> u64 {
		if self.fanout_data_pieces == 1 && self.cipher_type == CIPHER_TYPE_PLAIN {
			Hash::LEN as u64
		} else {
			Hash::LEN as u64 * self.pieces_per_chunk()
		}
	}

	/// Decodes the flat fanout bytes into per-chunk, per-piece Merkle
	/// roots. Chunks with a single stored root are expanded to the full
	/// piece count, every piece sharing it.
	pub fn decode_fanout(&self, fanout: &[u8]) -> Result<Vec<Vec<Hash>>, Error> {
		let row = self.chunk_roots_size();
		if row == 0 {
			return if fanout.is_empty() {
				Ok(vec![])
			} else {
				Err(Error::MalformedFanout)
			};
		}
		if fanout.len() as u64 % row != 0 {
			return Err(Error::MalformedFanout);
		}
		let single_root =
			self.fanout_data_pieces == 1 && self.cipher_type == CIPHER_TYPE_PLAIN;
		let mut chunks = vec![];
		for chunk in fanout.chunks(row as usize) {
			let mut pieces = vec![];
			if single_root {
				let root = Hash::from_vec(chunk);
				for _ in 0..self.pieces_per_chunk().max(1) {
					pieces.push(root);
				}
			} else {
				for piece in chunk.chunks(Hash::LEN) {
					pieces.push(Hash::from_vec(piece));
				}
			}
			chunks.push(pieces);
		}
		Ok(chunks)
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::crypto::cipher::CIPHER_TYPE_THREEFISH;

	#[test]
	fn encode_is_99_bytes_and_round_trips() {
		let layout = SkyfileLayout {
			version: 1,
			filesize: 123456,
			metadata_size: 200,
			fanout_size: 96,
			fanout_data_pieces: 1,
			fanout_parity_pieces: 2,
			cipher_type: CIPHER_TYPE_THREEFISH,
			key_data: [7; KEY_DATA_LEN],
		};
		let bytes = layout.encode();
		assert_eq!(bytes.len(), SKYFILE_LAYOUT_SIZE);
		assert_eq!(SkyfileLayout::decode(&bytes).unwrap(), layout);
	}

	#[test]
	fn short_sector_rejected() {
		assert_eq!(
			SkyfileLayout::decode(&[0u8; 50]),
			Err(Error::ShortBaseSector)
		);
	}

	#[test]
	fn single_root_fanout_expands() {
		let layout = SkyfileLayout {
			fanout_data_pieces: 1,
			fanout_parity_pieces: 2,
			..Default::default()
		};
		assert_eq!(layout.chunk_roots_size(), 32);
		let fanout = [3u8; 64]; // two chunks
		let chunks = layout.decode_fanout(&fanout).unwrap();
		assert_eq!(chunks.len(), 2);
		for chunk in &chunks {
			assert_eq!(chunk.len(), 3);
			assert_eq!(chunk[0], chunk[1]);
			assert_eq!(chunk[1], chunk[2]);
		}
	}

	#[test]
	fn full_fanout_rows() {
		let layout = SkyfileLayout {
			fanout_data_pieces: 2,
			fanout_parity_pieces: 1,
			cipher_type: CIPHER_TYPE_THREEFISH,
			..Default::default()
		};
		assert_eq!(layout.chunk_roots_size(), 96);
		let fanout = vec![5u8; 192];
		let chunks = layout.decode_fanout(&fanout).unwrap();
		assert_eq!(chunks.len(), 2);
		assert_eq!(chunks[0].len(), 3);

		assert_eq!(
			layout.decode_fanout(&vec![0u8; 100]),
			Err(Error::MalformedFanout)
		);
	}
}
