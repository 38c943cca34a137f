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

//! Helper macros used throughout the core crate.

/// Allows the writing of multiple fields to a serializer in one go.
#[macro_export]
macro_rules! ser_multiwrite {
	($wrtr:ident, $([ $write_call:ident, $val:expr ]),* ) => {
		$( $wrtr.$write_call($val)?; )*
	}
}

/// Allows the reading of multiple fields from a deserializer in one go.
#[macro_export]
macro_rules! ser_multiread {
	($rdr:ident, $($read_call:ident),*) => {
		( $( $rdr.$read_call()?, )* )
	}
}

/// Hash of the deterministic encoding of all provided parts, in order.
/// The hash writer itself cannot fail, any error here is a bug.
#[macro_export]
macro_rules! hash_all {
	($($part:expr),+ $(,)?) => {{
		let mut hasher = $crate::core::hash::HashWriter::default();
		$( $crate::ser::Writeable::write(&$part, &mut hasher).expect("hash writer"); )+
		hasher.into_hash()
	}};
}
