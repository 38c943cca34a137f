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

//! Proof-of-work targets and cumulative difficulty.
//!
//! A target is a 256-bit big-endian threshold; a block satisfies it when
//! its id, interpreted as a 256-bit big-endian number, does not exceed
//! it. The difficulty (work) of a target is `2^256 / (target + 1)`, and
//! fork choice compares the sum of work over a chain.

use num_bigint::BigUint;
use num_traits::{One, Zero};
use std::cmp::Ordering;
use std::fmt;
use std::ops::Add;

use crate::core::hash::Hash;
use crate::ser::{self, Readable, Reader, Writeable, Writer};

/// A 256-bit proof-of-work threshold, big-endian.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Target(pub [u8; 32]);

impl Target {
	/// The easiest possible target, met by every hash.
	pub fn max() -> Target {
		Target([0xff; 32])
	}

	/// Whether the provided block id satisfies this target.
	pub fn meets(&self, id: &Hash) -> bool {
		id.0 <= self.0
	}

	/// The target as a big integer.
	pub fn to_int(&self) -> BigUint {
		BigUint::from_bytes_be(&self.0)
	}

	/// Builds a target from a big integer, saturating at the maximum
	/// target on overflow and at one on zero (a zero target could never
	/// be met).
	pub fn from_int(i: &BigUint) -> Target {
		if i.is_zero() {
			let mut t = [0u8; 32];
			t[31] = 1;
			return Target(t);
		}
		let bytes = i.to_bytes_be();
		if bytes.len() > 32 {
			return Target::max();
		}
		let mut t = [0u8; 32];
		t[32 - bytes.len()..].copy_from_slice(&bytes);
		Target(t)
	}

	/// The expected amount of work needed to find a block under this
	/// target.
	pub fn difficulty(&self) -> Difficulty {
		// 2^256 / (target + 1)
		let numerator = BigUint::one() << 256;
		Difficulty(numerator / (self.to_int() + BigUint::one()))
	}

	/// Retargets against the block-frequency schedule: scales the target
	/// by `actual_secs / expected_secs`, clamped to a 1/400 step in
	/// either direction so a hostile timestamp cannot swing the
	/// difficulty.
	pub fn retarget(&self, actual_secs: u64, expected_secs: u64) -> Target {
		let parent = self.to_int();
		let actual = actual_secs.max(1);
		let expected = expected_secs.max(1);
		let adjusted = &parent * BigUint::from(actual) / BigUint::from(expected);
		let min = &parent * BigUint::from(399u32) / BigUint::from(400u32);
		let max = &parent * BigUint::from(401u32) / BigUint::from(400u32);
		let clamped = adjusted.max(min).min(max);
		Target::from_int(&clamped)
	}
}

impl fmt::Display for Target {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", util::to_hex(self.0.to_vec()))
	}
}

impl Writeable for Target {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		writer.write_fixed_bytes(&self.0)
	}
}

impl Readable for Target {
	fn read(reader: &mut dyn Reader) -> Result<Target, ser::Error> {
		let v = reader.read_fixed_bytes(32)?;
		let mut t = [0; 32];
		t.copy_from_slice(&v[..]);
		Ok(Target(t))
	}
}

/// The (cumulative) amount of expected hashing work, used for fork
/// choice. Encodes like Currency: length-prefixed big-endian magnitude.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Difficulty(BigUint);

impl Difficulty {
	/// Zero work.
	pub fn zero() -> Difficulty {
		Difficulty(BigUint::zero())
	}
}

impl Add for Difficulty {
	type Output = Difficulty;

	fn add(self, other: Difficulty) -> Difficulty {
		Difficulty(self.0 + other.0)
	}
}

impl<'a, 'b> Add<&'b Difficulty> for &'a Difficulty {
	type Output = Difficulty;

	fn add(self, other: &'b Difficulty) -> Difficulty {
		Difficulty(&self.0 + &other.0)
	}
}

impl PartialOrd for Difficulty {
	fn partial_cmp(&self, other: &Difficulty) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl Ord for Difficulty {
	fn cmp(&self, other: &Difficulty) -> Ordering {
		self.0.cmp(&other.0)
	}
}

impl fmt::Display for Difficulty {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0.to_str_radix(10))
	}
}

impl Writeable for Difficulty {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		let bytes = if self.0.is_zero() {
			vec![]
		} else {
			self.0.to_bytes_be()
		};
		writer.write_bytes(&bytes)
	}
}

impl Readable for Difficulty {
	fn read(reader: &mut dyn Reader) -> Result<Difficulty, ser::Error> {
		let bytes = reader.read_bytes_len_prefix()?;
		if let Some(0) = bytes.first() {
			return Err(ser::Error::CorruptedData);
		}
		Ok(Difficulty(BigUint::from_bytes_be(&bytes)))
	}
}
