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

//! Logging, locking primitives and small helpers shared across the Uplo
//! crates.

#![deny(non_upper_case_globals)]
#![deny(non_camel_case_types)]
#![deny(non_snake_case)]
#![deny(unused_mut)]
#![warn(missing_docs)]

#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate log;
#[macro_use]
extern crate serde_derive;

// Re-export so only has to be included once.
pub use parking_lot::Mutex;
pub use parking_lot::MutexGuard;
pub use parking_lot::RwLock;
pub use parking_lot::RwLockReadGuard;
pub use parking_lot::RwLockWriteGuard;

// Logging related.
pub mod logger;
pub use crate::logger::{init_logger, init_test_logger};

pub mod types;
pub use crate::types::{LogLevel, LoggingConfig};

mod hex;
pub use crate::hex::*;

/// Encapsulation of a value that is written exactly once and read many
/// times, without the cost of taking a lock on every read.
pub struct OneTime<T> {
	inner: RwLock<Option<T>>,
}

impl<T> OneTime<T>
where
	T: Clone,
{
	/// Builds a new, still unset, `OneTime`.
	pub fn new() -> OneTime<T> {
		OneTime {
			inner: RwLock::new(None),
		}
	}

	/// Initializes the value. Calling `set` a second time is a bug.
	pub fn init(&self, value: T) {
		let mut inner = self.inner.write();
		if inner.is_some() {
			panic!("OneTime initialized twice");
		}
		*inner = Some(value);
	}

	/// Borrows a copy of the inner value. Panics if not yet initialized.
	pub fn borrow(&self) -> T {
		let inner = self.inner.read();
		inner
			.clone()
			.expect("Cannot borrow one_time before initialization.")
	}

	/// Whether the value has been initialized.
	pub fn is_init(&self) -> bool {
		self.inner.read().is_some()
	}
}

impl<T> Default for OneTime<T>
where
	T: Clone,
{
	fn default() -> Self {
		OneTime::new()
	}
}
