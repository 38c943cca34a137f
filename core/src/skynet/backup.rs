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

//! Skylink backup and restore.
//!
//! A backup is the length-prefixed concatenation of the skylink string,
//! the base sector and, when the skyfile has one, the fanout bytes.
//! Restoring parses the frame, hands the sector bytes back for storage
//! and returns the original skylink unchanged.

use std::io::{Read, Write};
use std::str::FromStr;

use super::skylink::{self, Skylink};
use crate::ser::{self, BinReader, BinWriter, Reader, Writer};

/// Magic bytes heading every backup so stray files are rejected early.
const BACKUP_MAGIC: &[u8; 8] = b"uplobak\0";

/// Errors thrown by backup parsing.
#[derive(Clone, Debug, Eq, PartialEq, Fail)]
pub enum Error {
	/// Data that is not a skylink backup.
	#[fail(display = "data is not a skylink backup")]
	BadMagic,
	/// A backup whose embedded skylink does not parse.
	#[fail(display = "backup holds an invalid skylink: {}", _0)]
	BadSkylink(skylink::Error),
	/// An underlying framing error.
	#[fail(display = "serialization error: {}", _0)]
	Serialization(ser::Error),
}

impl From<ser::Error> for Error {
	fn from(e: ser::Error) -> Error {
		Error::Serialization(e)
	}
}

/// Writes a backup of the given skylink and its sector data. `fanout`
/// is present exactly when the skyfile's layout carries one.
pub fn backup_skylink(
	skylink: &Skylink,
	base_sector: &[u8],
	fanout: Option<&[u8]>,
	sink: &mut dyn Write,
) -> Result<(), Error> {
	let mut writer = BinWriter::new(sink);
	writer.write_fixed_bytes(BACKUP_MAGIC)?;
	writer.write_string(&skylink.to_base64())?;
	writer.write_bytes(base_sector)?;
	match fanout {
		Some(fanout) => {
			writer.write_bool(true)?;
			writer.write_bytes(fanout)?;
		}
		None => writer.write_bool(false)?,
	}
	Ok(())
}

/// Parses a backup, returning the skylink, the base sector bytes and
/// the fanout bytes when present. The caller rewrites the sectors into
/// storage; the skylink continues to address them unchanged.
pub fn restore_skylink(
	source: &mut dyn Read,
	budget: u64,
) -> Result<(Skylink, Vec<u8>, Option<Vec<u8>>), Error> {
	let mut reader = BinReader::new(source, budget);
	let magic = reader.read_fixed_bytes(BACKUP_MAGIC.len())?;
	if magic != BACKUP_MAGIC {
		return Err(Error::BadMagic);
	}
	let link_str = reader.read_string()?;
	let skylink = Skylink::from_str(&link_str).map_err(Error::BadSkylink)?;
	let base_sector = reader.read_bytes_len_prefix()?;
	let fanout = if reader.read_bool()? {
		Some(reader.read_bytes_len_prefix()?)
	} else {
		None
	};
	Ok((skylink, base_sector, fanout))
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::core::hash::Hash;

	#[test]
	fn backup_round_trip() {
		let link = Skylink::new(Hash([1; 32]), 0, 4096).unwrap();
		let base_sector = vec![2u8; 256];
		let fanout = vec![3u8; 96];

		let mut backup = vec![];
		backup_skylink(&link, &base_sector, Some(&fanout), &mut backup).unwrap();

		let (restored, sector, restored_fanout) =
			restore_skylink(&mut &backup[..], 1 << 20).unwrap();
		assert_eq!(restored, link);
		assert_eq!(sector, base_sector);
		assert_eq!(restored_fanout, Some(fanout));
	}

	#[test]
	fn backup_without_fanout() {
		let link = Skylink::new(Hash([1; 32]), 4096, 100).unwrap();
		let mut backup = vec![];
		backup_skylink(&link, &[9; 99], None, &mut backup).unwrap();
		let (restored, _, fanout) = restore_skylink(&mut &backup[..], 1 << 20).unwrap();
		assert_eq!(restored, link);
		assert_eq!(fanout, None);
	}

	#[test]
	fn bad_magic_rejected() {
		let data = vec![0u8; 64];
		assert_eq!(
			restore_skylink(&mut &data[..], 1 << 20).err(),
			Some(Error::BadMagic)
		);
	}
}
