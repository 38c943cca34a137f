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

//! Skylinks: 34-byte self-describing pointers into stored sectors.
//!
//! A skylink packs a 16-bit bitfield and a Merkle root. The bitfield,
//! read from the least significant bit up, holds a 2-bit version, a
//! run of ones selecting one of eight alignment modes, a zero
//! terminator, three bits of fetch-size units and the remaining bits of
//! offset units. Every mode trades offset resolution for fetch-size
//! range; all modes address within a single 4 MiB sector.

use data_encoding::{Encoding, Specification, BASE64URL_NOPAD};
use std::fmt;
use std::str::FromStr;

use crate::core::hash::Hash;
use crate::ser::{self, Readable, Reader, Writeable, Writer};

/// The size of a full sector, the addressing unit of every skylink.
pub const SECTOR_SIZE: u64 = 1 << 22;

/// Raw encoded size of a skylink: bitfield plus Merkle root.
pub const RAW_SKYLINK_SIZE: usize = 34;
/// Length of the base64-URL string form, unpadded.
pub const BASE64_SKYLINK_LEN: usize = 46;
/// Length of the base32-Hex string form, unpadded.
pub const BASE32_SKYLINK_LEN: usize = 55;

const OFFSET_ALIGN_BASE: u64 = 4096;
const MODES: u8 = 8;

lazy_static! {
	// lowercase base32-Hex without padding; uppercase input tolerated
	static ref BASE32: Encoding = {
		let mut spec = Specification::new();
		spec.symbols.push_str("0123456789abcdefghijklmnopqrstuv");
		spec.translate.from.push_str("ABCDEFGHIJKLMNOPQRSTUV");
		spec.translate.to.push_str("abcdefghijklmnopqrstuv");
		spec.encoding().expect("static base32 specification")
	};
}

/// Errors thrown by skylink construction and parsing.
#[derive(Clone, Debug, Eq, PartialEq, Fail)]
pub enum Error {
	/// A string form of the wrong length.
	#[fail(display = "skylink has incorrect size")]
	IncorrectSize,
	/// A string form carrying symbols outside its alphabet.
	#[fail(display = "skylink encoding is invalid")]
	InvalidEncoding,
	/// A bitfield violating the version or mode-window rules.
	#[fail(display = "skylink bitfield is invalid")]
	InvalidBitfield,
	/// An offset not aligned to the mode covering the fetch size.
	#[fail(display = "skylink offset is unaligned")]
	UnalignedOffset,
	/// Offset plus fetch size overflowing the sector.
	#[fail(display = "skylink fetch reaches beyond the sector")]
	FetchBeyondSector,
}

impl From<ser::Error> for Error {
	fn from(_: ser::Error) -> Error {
		Error::IncorrectSize
	}
}

// Offset alignment of a mode.
fn offset_align(m: u8) -> u64 {
	OFFSET_ALIGN_BASE << m
}

// Fetch-size alignment of a mode: 4 KiB for the first two modes,
// doubling thereafter.
fn fetch_align(m: u8) -> u64 {
	if m == 0 {
		OFFSET_ALIGN_BASE
	} else {
		OFFSET_ALIGN_BASE << (m - 1)
	}
}

// Fetch size reached before the first unit of a mode.
fn fetch_base(m: u8) -> u64 {
	if m == 0 {
		0
	} else {
		8 * fetch_align(m)
	}
}

// Largest fetch size a mode can express.
fn max_fetch(m: u8) -> u64 {
	fetch_base(m) + 8 * fetch_align(m)
}

/// A v1 skylink: an offset/fetch-size bitfield plus the Merkle root of
/// the sector it addresses.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct Skylink {
	bitfield: u16,
	merkle_root: Hash,
}

impl Skylink {
	/// Builds the canonical skylink addressing `length` bytes at
	/// `offset` of the sector with the given Merkle root. The length is
	/// rounded up to the smallest legal fetch size covering it and the
	/// smallest mode able to express that fetch size is chosen; the
	/// offset must be aligned to that mode.
	pub fn new(merkle_root: Hash, offset: u64, length: u64) -> Result<Skylink, Error> {
		let length = length.max(1);
		if length > SECTOR_SIZE {
			return Err(Error::FetchBeyondSector);
		}
		let mode = (0..MODES)
			.find(|&m| max_fetch(m) >= length)
			.expect("mode 7 covers a full sector");
		if offset % offset_align(mode) != 0 {
			return Err(Error::UnalignedOffset);
		}
		let align = fetch_align(mode);
		let above_base = length - fetch_base(mode);
		let units = (above_base + align - 1) / align;
		debug_assert!(units >= 1 && units <= 8);
		let fetch = fetch_base(mode) + units * align;
		if offset + fetch > SECTOR_SIZE {
			return Err(Error::FetchBeyondSector);
		}
		let offset_units = offset / offset_align(mode);

		let mut bitfield: u16 = ((1u16 << mode) - 1) << 2;
		bitfield |= ((units - 1) as u16) << (mode + 3);
		bitfield |= (offset_units as u16) << (mode + 6);
		Ok(Skylink {
			bitfield,
			merkle_root,
		})
	}

	/// Rebuilds a skylink from its raw bitfield and root, validating
	/// the bitfield.
	pub fn from_parts(bitfield: u16, merkle_root: Hash) -> Result<Skylink, Error> {
		let link = Skylink {
			bitfield,
			merkle_root,
		};
		link.offset_and_fetch_size()?;
		Ok(link)
	}

	/// The link version, 1-based. Only version 1 is defined.
	pub fn version(&self) -> u8 {
		(self.bitfield & 3) as u8 + 1
	}

	/// The raw bitfield.
	pub fn bitfield(&self) -> u16 {
		self.bitfield
	}

	/// The Merkle root of the addressed sector.
	pub fn merkle_root(&self) -> Hash {
		self.merkle_root
	}

	/// Decodes the bitfield into the addressed `(offset, fetch_size)`.
	pub fn offset_and_fetch_size(&self) -> Result<(u64, u64), Error> {
		if self.bitfield & 3 != 0 {
			// only version 1 carries a defined layout
			return Err(Error::InvalidBitfield);
		}
		let mut v = self.bitfield >> 2;
		let mut mode: u8 = 0;
		while v & 1 == 1 {
			mode += 1;
			if mode == MODES {
				return Err(Error::InvalidBitfield);
			}
			v >>= 1;
		}
		v >>= 1; // the zero terminating the mode window
		let units = (v & 7) as u64 + 1;
		v >>= 3;
		let offset_units = v as u64;

		let offset = offset_units * offset_align(mode);
		let fetch = fetch_base(mode) + units * fetch_align(mode);
		if offset + fetch > SECTOR_SIZE {
			return Err(Error::FetchBeyondSector);
		}
		Ok((offset, fetch))
	}

	/// The raw 34-byte form: little-endian bitfield then root.
	pub fn to_bytes(&self) -> [u8; RAW_SKYLINK_SIZE] {
		let mut bytes = [0u8; RAW_SKYLINK_SIZE];
		bytes[..2].copy_from_slice(&self.bitfield.to_le_bytes());
		bytes[2..].copy_from_slice(&self.merkle_root.0);
		bytes
	}

	/// Parses the raw 34-byte form.
	pub fn from_bytes(bytes: &[u8]) -> Result<Skylink, Error> {
		if bytes.len() != RAW_SKYLINK_SIZE {
			return Err(Error::IncorrectSize);
		}
		let bitfield = u16::from_le_bytes([bytes[0], bytes[1]]);
		Skylink::from_parts(bitfield, Hash::from_vec(&bytes[2..]))
	}

	/// The 46-character base64-URL string form.
	pub fn to_base64(&self) -> String {
		BASE64URL_NOPAD.encode(&self.to_bytes())
	}

	/// The 55-character base32-Hex string form, lowercase.
	pub fn to_base32(&self) -> String {
		BASE32.encode(&self.to_bytes())
	}
}

impl fmt::Display for Skylink {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.to_base64())
	}
}

impl FromStr for Skylink {
	type Err = Error;

	/// Parses either string form. A `?query` suffix is ignored and a
	/// `/path` suffix is not part of the link.
	fn from_str(s: &str) -> Result<Skylink, Error> {
		let s = s.split('?').next().unwrap_or("");
		let link = s.splitn(2, '/').next().unwrap_or("");
		let bytes = match link.len() {
			BASE64_SKYLINK_LEN => BASE64URL_NOPAD
				.decode(link.as_bytes())
				.map_err(|_| Error::InvalidEncoding)?,
			BASE32_SKYLINK_LEN => BASE32
				.decode(link.as_bytes())
				.map_err(|_| Error::InvalidEncoding)?,
			_ => return Err(Error::IncorrectSize),
		};
		Skylink::from_bytes(&bytes)
	}
}

impl Writeable for Skylink {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		writer.write_u16(self.bitfield)?;
		self.merkle_root.write(writer)
	}
}

impl Readable for Skylink {
	fn read(reader: &mut dyn Reader) -> Result<Skylink, ser::Error> {
		let bitfield = reader.read_u16()?;
		let merkle_root = Hash::read(reader)?;
		Skylink::from_parts(bitfield, merkle_root).map_err(|_| ser::Error::CorruptedData)
	}
}

#[cfg(test)]
mod test {
	use super::*;

	fn root() -> Hash {
		Hash([0xaa; 32])
	}

	#[test]
	fn manual_examples() {
		// (offset, requested length) -> (offset, fetch size)
		let cases: [(u64, u64, u64); 3] = [
			(4096, 1, 4096),
			(4096 * 2, 32 * 1024 + 1, 36 * 1024),
			(4096 * 4, 64 * 1024 + 1, 72 * 1024),
		];
		for &(offset, length, expected_fetch) in cases.iter() {
			let link = Skylink::new(root(), offset, length).unwrap();
			assert_eq!(
				link.offset_and_fetch_size().unwrap(),
				(offset, expected_fetch)
			);
		}
	}

	#[test]
	fn illegal_combinations() {
		assert_eq!(
			Skylink::new(root(), 2048, 4096),
			Err(Error::UnalignedOffset)
		);
		assert_eq!(
			Skylink::new(root(), 3 << 20, 2 << 20),
			Err(Error::FetchBeyondSector)
		);
	}

	#[test]
	fn fetch_size_table() {
		// kilobyte table of spec: rows by mode, columns units 1..8
		let expected: [[u64; 8]; 6] = [
			[4, 8, 12, 16, 20, 24, 28, 32],
			[36, 40, 44, 48, 52, 56, 60, 64],
			[72, 80, 88, 96, 104, 112, 120, 128],
			[144, 160, 176, 192, 208, 224, 240, 256],
			[288, 320, 352, 384, 416, 448, 480, 512],
			[576, 640, 704, 768, 832, 896, 960, 1024],
		];
		for (m, row) in expected.iter().enumerate() {
			for (u, kb) in row.iter().enumerate() {
				assert_eq!(
					fetch_base(m as u8) + (u as u64 + 1) * fetch_align(m as u8),
					kb * 1024
				);
			}
		}
		assert_eq!(max_fetch(6), 2048 * 1024);
		assert_eq!(max_fetch(7), 4096 * 1024);
	}

	#[test]
	fn eight_ones_invalid() {
		// version bits zero, mode window all ones
		let bitfield: u16 = 0b11_1111_1100;
		assert_eq!(
			Skylink::from_parts(bitfield, root()),
			Err(Error::InvalidBitfield)
		);
	}

	#[test]
	fn nonzero_version_invalid() {
		assert_eq!(
			Skylink::from_parts(0b01, root()),
			Err(Error::InvalidBitfield)
		);
	}

	#[test]
	fn string_round_trips() {
		let link = Skylink::new(root(), 4096 * 4, 100_000).unwrap();

		let b64 = link.to_base64();
		assert_eq!(b64.len(), BASE64_SKYLINK_LEN);
		assert_eq!(Skylink::from_str(&b64).unwrap(), link);

		let b32 = link.to_base32();
		assert_eq!(b32.len(), BASE32_SKYLINK_LEN);
		assert_eq!(Skylink::from_str(&b32).unwrap(), link);
		assert_eq!(Skylink::from_str(&b32.to_uppercase()).unwrap(), link);
	}

	#[test]
	fn base32_manual_example() {
		let link = Skylink::from_parts(65535 - 7175, Hash([0xff; 32])).unwrap();
		let b32 = link.to_base32();
		assert_eq!(b32.len(), BASE32_SKYLINK_LEN);
		assert_eq!(Skylink::from_str(&b32).unwrap(), link);

		let truncated = &b32[..b32.len() - 1];
		assert_eq!(Skylink::from_str(truncated), Err(Error::IncorrectSize));
		let extended = format!("{}0", b32);
		assert_eq!(
			Skylink::from_str(&extended),
			Err(Error::IncorrectSize)
		);
	}

	#[test]
	fn suffixes_ignored() {
		let link = Skylink::new(root(), 0, 4096).unwrap();
		let with_path = format!("{}/sub/file.html", link.to_base64());
		let with_query = format!("{}?attachment=true", link.to_base64());
		assert_eq!(Skylink::from_str(&with_path).unwrap(), link);
		assert_eq!(Skylink::from_str(&with_query).unwrap(), link);
	}

	#[test]
	fn zero_length_rounds_up() {
		let link = Skylink::new(root(), 0, 0).unwrap();
		assert_eq!(link.offset_and_fetch_size().unwrap(), (0, 4096));
	}
}
