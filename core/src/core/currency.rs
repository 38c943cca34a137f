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

//! Currency, an unbounded non-negative big integer. Coin values, fund
//! values and cumulative proof-of-work all use it. Subtraction is only
//! available in checked form since a negative amount is never a valid
//! consensus value.

use num_bigint::BigUint;
use num_traits::Zero;
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Div, Mul};

use crate::ser::{self, Readable, Reader, Writeable, Writer};
use serde_derive::{Deserialize, Serialize};

/// An unbounded non-negative integer quantity of coins or funds.
/// Encodes as a u64-length-prefixed big-endian magnitude with no leading
/// zero bytes, so the encoding of any value is unique.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Default, Hash, Serialize, Deserialize)]
pub struct Currency(BigUint);

impl Currency {
	/// The zero amount.
	pub fn zero() -> Currency {
		Currency(BigUint::zero())
	}

	/// Whether this amount is zero.
	pub fn is_zero(&self) -> bool {
		self.0.is_zero()
	}

	/// Checked subtraction. None if `other` exceeds `self`.
	pub fn checked_sub(&self, other: &Currency) -> Option<Currency> {
		if other.0 > self.0 {
			None
		} else {
			Some(Currency(&self.0 - &other.0))
		}
	}

	/// Floor division by another amount. None when dividing by zero.
	pub fn checked_div(&self, other: &Currency) -> Option<Currency> {
		if other.is_zero() {
			None
		} else {
			Some(Currency(&self.0 / &other.0))
		}
	}

	/// `self * num / denom` with the intermediate product computed at
	/// full precision. Panics on a zero denominator, which is a bug.
	pub fn mul_div(&self, num: u64, denom: u64) -> Currency {
		assert!(denom != 0, "mul_div by zero");
		Currency(&self.0 * BigUint::from(num) / BigUint::from(denom))
	}

	/// Round down to the closest multiple of `m`. Rounding to a multiple
	/// of zero leaves the value unchanged.
	pub fn round_down(&self, m: u64) -> Currency {
		if m == 0 {
			return self.clone();
		}
		let m = BigUint::from(m);
		Currency(&self.0 / &m * &m)
	}

	/// The big-endian magnitude bytes, empty for zero.
	pub fn to_bytes(&self) -> Vec<u8> {
		if self.is_zero() {
			vec![]
		} else {
			self.0.to_bytes_be()
		}
	}

	/// Rebuild from big-endian magnitude bytes.
	pub fn from_bytes(bytes: &[u8]) -> Currency {
		Currency(BigUint::from_bytes_be(bytes))
	}
}

impl From<u64> for Currency {
	fn from(n: u64) -> Currency {
		Currency(BigUint::from(n))
	}
}

impl fmt::Display for Currency {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0.to_str_radix(10))
	}
}

impl<'a, 'b> Add<&'b Currency> for &'a Currency {
	type Output = Currency;

	fn add(self, other: &'b Currency) -> Currency {
		Currency(&self.0 + &other.0)
	}
}

impl Add for Currency {
	type Output = Currency;

	fn add(self, other: Currency) -> Currency {
		Currency(self.0 + other.0)
	}
}

impl AddAssign for Currency {
	fn add_assign(&mut self, other: Currency) {
		self.0 += other.0;
	}
}

impl<'a> AddAssign<&'a Currency> for Currency {
	fn add_assign(&mut self, other: &'a Currency) {
		self.0 += &other.0;
	}
}

impl Mul<u64> for Currency {
	type Output = Currency;

	fn mul(self, other: u64) -> Currency {
		Currency(self.0 * BigUint::from(other))
	}
}

impl<'a> Mul<u64> for &'a Currency {
	type Output = Currency;

	fn mul(self, other: u64) -> Currency {
		Currency(&self.0 * BigUint::from(other))
	}
}

impl Div<u64> for Currency {
	type Output = Currency;

	fn div(self, other: u64) -> Currency {
		assert!(other != 0, "currency division by zero");
		Currency(self.0 / BigUint::from(other))
	}
}

impl Sum for Currency {
	fn sum<I: Iterator<Item = Currency>>(iter: I) -> Currency {
		iter.fold(Currency::zero(), |acc, c| acc + c)
	}
}

impl<'a> Sum<&'a Currency> for Currency {
	fn sum<I: Iterator<Item = &'a Currency>>(iter: I) -> Currency {
		iter.fold(Currency::zero(), |acc, c| &acc + c)
	}
}

impl Writeable for Currency {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		writer.write_bytes(&self.to_bytes())
	}
}

impl Readable for Currency {
	fn read(reader: &mut dyn Reader) -> Result<Currency, ser::Error> {
		let bytes = reader.read_bytes_len_prefix()?;
		// A leading zero byte would make the encoding ambiguous.
		if let Some(0) = bytes.first() {
			return Err(ser::Error::CorruptedData);
		}
		Ok(Currency::from_bytes(&bytes))
	}
}
