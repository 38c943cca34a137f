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

//! Serialization and deserialization layer specialized for binary encoding.
//! Ensures consistency and safety. Basically a minimal subset of
//! serde but written with the consensus rules in mind: all integers are
//! fixed-width little-endian, all variable-length fields carry a u64
//! length prefix, and re-encoding a decoded value yields the original
//! bytes exactly.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fmt;
use std::io::{self, Read, Write};

/// Possible errors deriving from serializing or deserializing.
#[derive(Clone, Eq, PartialEq, Debug, Fail)]
pub enum Error {
	/// Wraps an io error produced when reading or writing
	#[fail(display = "IO error: {}", _0)]
	IOErr(String),
	/// Expected a given value that wasn't found
	#[fail(display = "expected {:?}, got {:?}", expected, received)]
	UnexpectedData {
		/// What we wanted
		expected: Vec<u8>,
		/// What we got
		received: Vec<u8>,
	},
	/// Data wasn't in a consumable format
	#[fail(display = "corrupted data")]
	CorruptedData,
	/// Decode would exceed the caller-supplied size budget
	#[fail(display = "too large read: {}", _0)]
	TooLargeReadErr(String),
	/// A declared element count was impossible to satisfy
	#[fail(display = "invalid element count")]
	CountError,
}

impl From<io::Error> for Error {
	fn from(e: io::Error) -> Error {
		Error::IOErr(format!("{}", e))
	}
}

/// Implementations defined how different numbers and binary structures are
/// written to an underlying stream or container (depending on implementation).
pub trait Writer {
	/// Writes a slice of bytes to the underlying writer, without any
	/// length prefix.
	fn write_fixed_bytes(&mut self, bytes: &[u8]) -> Result<(), Error>;

	/// Writes a u8 as binary
	fn write_u8(&mut self, n: u8) -> Result<(), Error> {
		self.write_fixed_bytes(&[n])
	}

	/// Writes a u16 as binary
	fn write_u16(&mut self, n: u16) -> Result<(), Error> {
		let mut bytes = [0; 2];
		(&mut bytes[..]).write_u16::<LittleEndian>(n)?;
		self.write_fixed_bytes(&bytes)
	}

	/// Writes a u32 as binary
	fn write_u32(&mut self, n: u32) -> Result<(), Error> {
		let mut bytes = [0; 4];
		(&mut bytes[..]).write_u32::<LittleEndian>(n)?;
		self.write_fixed_bytes(&bytes)
	}

	/// Writes a u64 as binary
	fn write_u64(&mut self, n: u64) -> Result<(), Error> {
		let mut bytes = [0; 8];
		(&mut bytes[..]).write_u64::<LittleEndian>(n)?;
		self.write_fixed_bytes(&bytes)
	}

	/// Writes an i64 as binary
	fn write_i64(&mut self, n: i64) -> Result<(), Error> {
		let mut bytes = [0; 8];
		(&mut bytes[..]).write_i64::<LittleEndian>(n)?;
		self.write_fixed_bytes(&bytes)
	}

	/// Writes a boolean as a single byte
	fn write_bool(&mut self, b: bool) -> Result<(), Error> {
		self.write_u8(if b { 1 } else { 0 })
	}

	/// Writes a variable-length byte sequence prefixed by its u64 length
	fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), Error> {
		self.write_u64(bytes.len() as u64)?;
		self.write_fixed_bytes(bytes)
	}

	/// Writes a string as length-prefixed UTF-8 bytes
	fn write_string(&mut self, s: &str) -> Result<(), Error> {
		self.write_bytes(s.as_bytes())
	}
}

/// Implementations defined how different numbers and binary structures are
/// read from an underlying stream or container (depending on implementation).
pub trait Reader {
	/// Read a fixed number of bytes from the underlying reader.
	fn read_fixed_bytes(&mut self, length: usize) -> Result<Vec<u8>, Error>;

	/// Read a u8 from the underlying Read
	fn read_u8(&mut self) -> Result<u8, Error> {
		let bytes = self.read_fixed_bytes(1)?;
		Ok(bytes[0])
	}

	/// Read a u16 from the underlying Read
	fn read_u16(&mut self) -> Result<u16, Error> {
		let bytes = self.read_fixed_bytes(2)?;
		Ok((&bytes[..]).read_u16::<LittleEndian>()?)
	}

	/// Read a u32 from the underlying Read
	fn read_u32(&mut self) -> Result<u32, Error> {
		let bytes = self.read_fixed_bytes(4)?;
		Ok((&bytes[..]).read_u32::<LittleEndian>()?)
	}

	/// Read a u64 from the underlying Read
	fn read_u64(&mut self) -> Result<u64, Error> {
		let bytes = self.read_fixed_bytes(8)?;
		Ok((&bytes[..]).read_u64::<LittleEndian>()?)
	}

	/// Read an i64 from the underlying Read
	fn read_i64(&mut self) -> Result<i64, Error> {
		let bytes = self.read_fixed_bytes(8)?;
		Ok((&bytes[..]).read_i64::<LittleEndian>()?)
	}

	/// Read a boolean; any byte other than 0 or 1 is corrupt data
	fn read_bool(&mut self) -> Result<bool, Error> {
		match self.read_u8()? {
			0 => Ok(false),
			1 => Ok(true),
			_ => Err(Error::CorruptedData),
		}
	}

	/// Read a u64-length-prefixed byte sequence
	fn read_bytes_len_prefix(&mut self) -> Result<Vec<u8>, Error> {
		let len = self.read_u64()?;
		if len > usize::max_value() as u64 {
			return Err(Error::TooLargeReadErr(format!(
				"length prefix of {} bytes",
				len
			)));
		}
		self.read_fixed_bytes(len as usize)
	}

	/// Read a length-prefixed UTF-8 string
	fn read_string(&mut self) -> Result<String, Error> {
		let bytes = self.read_bytes_len_prefix()?;
		String::from_utf8(bytes).map_err(|_| Error::CorruptedData)
	}

	/// Consumes a byte from the reader, producing an error if it doesn't have
	/// the expected value
	fn expect_u8(&mut self, val: u8) -> Result<u8, Error> {
		let b = self.read_u8()?;
		if b == val {
			Ok(b)
		} else {
			Err(Error::UnexpectedData {
				expected: vec![val],
				received: vec![b],
			})
		}
	}
}

/// Trait that every type that can be serialized as binary must implement.
/// Writes directly to a Writer, a utility type thinly wrapping an
/// underlying Write implementation.
pub trait Writeable {
	/// Write the data held by this Writeable to the provided writer
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), Error>;
}

/// Trait that every type that can be deserialized from binary must implement.
/// Reads directly to a Reader, a utility type thinly wrapping an
/// underlying Read implementation.
pub trait Readable: Sized {
	/// Reads the data necessary to this Readable from the provided reader
	fn read(reader: &mut dyn Reader) -> Result<Self, Error>;
}

/// Utility wrapper for an underlying byte Writer. Defines higher level
/// methods to write numbers, byte vectors, hashes, etc.
pub struct BinWriter<'a> {
	sink: &'a mut dyn Write,
}

impl<'a> BinWriter<'a> {
	/// Wraps a standard Write in a new BinWriter
	pub fn new(sink: &'a mut dyn Write) -> BinWriter<'a> {
		BinWriter { sink }
	}
}

impl<'a> Writer for BinWriter<'a> {
	fn write_fixed_bytes(&mut self, bytes: &[u8]) -> Result<(), Error> {
		self.sink.write_all(bytes)?;
		Ok(())
	}
}

/// Utility to read from an underlying byte Reader while enforcing a
/// total size budget on everything read through it.
pub struct BinReader<'a> {
	source: &'a mut dyn Read,
	budget: u64,
}

impl<'a> BinReader<'a> {
	/// Constructor for a new BinReader for the provided source with the
	/// provided size budget.
	pub fn new(source: &'a mut dyn Read, budget: u64) -> BinReader<'a> {
		BinReader { source, budget }
	}

	fn consume(&mut self, length: u64) -> Result<(), Error> {
		if length > self.budget {
			return Err(Error::TooLargeReadErr(format!(
				"read of {} bytes exceeds remaining budget of {}",
				length, self.budget
			)));
		}
		self.budget -= length;
		Ok(())
	}
}

impl<'a> Reader for BinReader<'a> {
	fn read_fixed_bytes(&mut self, length: usize) -> Result<Vec<u8>, Error> {
		self.consume(length as u64)?;
		let mut buf = vec![0; length];
		self.source
			.read_exact(&mut buf)
			.map(move |_| buf)
			.map_err(Error::from)
	}
}

/// The default size budget for deserialize_default, generous enough for
/// any single consensus object while still bounding hostile input.
pub const DEFAULT_DECODE_BUDGET: u64 = 16 * 1024 * 1024;

/// Deserializes a Readable from any std::io::Read implementation,
/// enforcing the provided size budget.
pub fn deserialize<T: Readable>(source: &mut dyn Read, budget: u64) -> Result<T, Error> {
	let mut reader = BinReader::new(source, budget);
	T::read(&mut reader)
}

/// Deserialize a Readable based on our default budget.
pub fn deserialize_default<T: Readable>(source: &mut dyn Read) -> Result<T, Error> {
	deserialize(source, DEFAULT_DECODE_BUDGET)
}

/// Serializes a Writeable into any std::io::Write implementation.
pub fn serialize<W: Writeable>(sink: &mut dyn Write, thing: &W) -> Result<(), Error> {
	let mut writer = BinWriter::new(sink);
	thing.write(&mut writer)
}

/// Serialize a Writeable (alias of serialize, kept for call-site symmetry
/// with deserialize_default).
pub fn serialize_default<W: Writeable>(sink: &mut dyn Write, thing: &W) -> Result<(), Error> {
	serialize(sink, thing)
}

/// Utility function to serialize a writeable directly in memory using a
/// Vec<u8>.
pub fn ser_vec<W: Writeable>(thing: &W) -> Result<Vec<u8>, Error> {
	let mut vec = vec![];
	serialize(&mut vec, thing)?;
	Ok(vec)
}

/// Reads multiple serialized items into a Vec.
pub fn read_multi<T: Readable>(reader: &mut dyn Reader, count: u64) -> Result<Vec<T>, Error> {
	// Very rough count sanity check: each element consumes at least one
	// byte, so a count beyond the budget can never be satisfied.
	let mut result: Vec<T> = Vec::with_capacity(count.min(4096) as usize);
	for _ in 0..count {
		result.push(T::read(reader)?);
	}
	Ok(result)
}

impl Writeable for u8 {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), Error> {
		writer.write_u8(*self)
	}
}

impl Readable for u8 {
	fn read(reader: &mut dyn Reader) -> Result<u8, Error> {
		reader.read_u8()
	}
}

impl Writeable for u16 {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), Error> {
		writer.write_u16(*self)
	}
}

impl Readable for u16 {
	fn read(reader: &mut dyn Reader) -> Result<u16, Error> {
		reader.read_u16()
	}
}

impl Writeable for u32 {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), Error> {
		writer.write_u32(*self)
	}
}

impl Readable for u32 {
	fn read(reader: &mut dyn Reader) -> Result<u32, Error> {
		reader.read_u32()
	}
}

impl Writeable for u64 {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), Error> {
		writer.write_u64(*self)
	}
}

impl Readable for u64 {
	fn read(reader: &mut dyn Reader) -> Result<u64, Error> {
		reader.read_u64()
	}
}

impl Writeable for i64 {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), Error> {
		writer.write_i64(*self)
	}
}

impl Readable for i64 {
	fn read(reader: &mut dyn Reader) -> Result<i64, Error> {
		reader.read_i64()
	}
}

impl Writeable for bool {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), Error> {
		writer.write_bool(*self)
	}
}

impl Readable for bool {
	fn read(reader: &mut dyn Reader) -> Result<bool, Error> {
		reader.read_bool()
	}
}

impl Writeable for String {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), Error> {
		writer.write_string(self)
	}
}

impl Readable for String {
	fn read(reader: &mut dyn Reader) -> Result<String, Error> {
		reader.read_string()
	}
}

impl<T: Writeable> Writeable for Vec<T> {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), Error> {
		writer.write_u64(self.len() as u64)?;
		for elem in self {
			elem.write(writer)?;
		}
		Ok(())
	}
}

impl<T: Readable> Readable for Vec<T> {
	fn read(reader: &mut dyn Reader) -> Result<Vec<T>, Error> {
		let count = reader.read_u64()?;
		read_multi(reader, count)
	}
}

impl<'a, W: Writeable> Writeable for &'a W {
	fn write<W2: Writer>(&self, writer: &mut W2) -> Result<(), Error> {
		Writeable::write(*self, writer)
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn primitive_round_trips() {
		let mut vec = vec![];
		serialize_default(&mut vec, &42u64).unwrap();
		assert_eq!(vec, [42, 0, 0, 0, 0, 0, 0, 0]);
		let n: u64 = deserialize_default(&mut &vec[..]).unwrap();
		assert_eq!(n, 42);
	}

	#[test]
	fn bool_strictness() {
		let res: Result<bool, Error> = deserialize_default(&mut &[2u8][..]);
		assert_eq!(res, Err(Error::CorruptedData));
	}

	#[test]
	fn budget_enforced() {
		let data = vec![0u8; 64];
		let mut slice = &data[..];
		let mut reader = BinReader::new(&mut slice, 16);
		assert!(reader.read_fixed_bytes(16).is_ok());
		match reader.read_fixed_bytes(1) {
			Err(Error::TooLargeReadErr(_)) => {}
			other => panic!("expected budget error, got {:?}", other),
		}
	}

	#[test]
	fn hostile_length_prefix() {
		// a length prefix far beyond the budget must fail before allocating
		let mut data = vec![];
		serialize_default(&mut data, &u64::max_value()).unwrap();
		let mut slice = &data[..];
		let mut reader = BinReader::new(&mut slice, 1024);
		match reader.read_bytes_len_prefix() {
			Err(Error::TooLargeReadErr(_)) => {}
			other => panic!("expected budget error, got {:?}", other),
		}
	}
}
