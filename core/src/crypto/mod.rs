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

//! The crypto facade: Merkle trees over 64-byte segments, ed25519
//! signing and verification, and the pluggable cipher keys used to
//! encrypt stored sectors.

pub mod cipher;
pub mod merkle;
pub mod signature;

pub use self::cipher::{CipherKey, CipherType};
pub use self::signature::Keypair;

/// Errors produced by the crypto facade.
#[derive(Clone, Debug, Eq, PartialEq, Fail)]
pub enum Error {
	/// A signature or an authenticated ciphertext failed verification.
	#[fail(display = "invalid signature")]
	InvalidSignature,
	/// An unknown cipher type specifier, or an operation the cipher type
	/// does not support.
	#[fail(display = "invalid cipher type")]
	InvalidCipherType,
	/// Provided key material has the wrong length for the algorithm.
	#[fail(display = "invalid key length")]
	InvalidKeyLength,
}
