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

//! In-memory store for tests: BTreeMaps behind a RwLock. Write
//! transactions stage a full copy and swap it in on commit, which gives
//! the same abort-on-drop behavior as the disk store.

use std::collections::BTreeMap;
use std::sync::Arc;

use util::{RwLock, RwLockWriteGuard};

use super::{Bucket, Error, KvStore, ReadTx, WriteTx};

type Tables = BTreeMap<&'static str, BTreeMap<Vec<u8>, Vec<u8>>>;

fn empty_tables() -> Tables {
	let mut tables = Tables::new();
	for bucket in Bucket::ALL.iter() {
		tables.insert(bucket.name(), BTreeMap::new());
	}
	tables
}

/// A purely in-memory store.
pub struct MemStore {
	inner: Arc<RwLock<Tables>>,
}

impl MemStore {
	/// A fresh, empty store.
	pub fn new() -> MemStore {
		MemStore {
			inner: Arc::new(RwLock::new(empty_tables())),
		}
	}
}

impl Default for MemStore {
	fn default() -> MemStore {
		MemStore::new()
	}
}

impl KvStore for MemStore {
	fn begin_read<'a>(&'a self) -> Result<Box<dyn ReadTx + 'a>, Error> {
		let snapshot = self.inner.read().clone();
		Ok(Box::new(MemReadTx { snapshot }))
	}

	fn begin_write<'a>(&'a self) -> Result<Box<dyn WriteTx + 'a>, Error> {
		let guard = self.inner.write();
		let staged = guard.clone();
		Ok(Box::new(MemWriteTx { guard, staged }))
	}
}

fn tables_get(tables: &Tables, bucket: Bucket, key: &[u8]) -> Option<Vec<u8>> {
	tables
		.get(bucket.name())
		.and_then(|table| table.get(key).cloned())
}

fn tables_for_each(
	tables: &Tables,
	bucket: Bucket,
	prefix: Option<&[u8]>,
	visit: &mut dyn FnMut(&[u8], &[u8]) -> Result<(), Error>,
) -> Result<(), Error> {
	if let Some(table) = tables.get(bucket.name()) {
		for (key, value) in table.iter() {
			if let Some(prefix) = prefix {
				if !key.starts_with(prefix) {
					continue;
				}
			}
			visit(key, value)?;
		}
	}
	Ok(())
}

struct MemReadTx {
	snapshot: Tables,
}

impl ReadTx for MemReadTx {
	fn get(&self, bucket: Bucket, key: &[u8]) -> Result<Option<Vec<u8>>, Error> {
		Ok(tables_get(&self.snapshot, bucket, key))
	}

	fn for_each(
		&self,
		bucket: Bucket,
		visit: &mut dyn FnMut(&[u8], &[u8]) -> Result<(), Error>,
	) -> Result<(), Error> {
		tables_for_each(&self.snapshot, bucket, None, visit)
	}

	fn for_each_prefix(
		&self,
		bucket: Bucket,
		prefix: &[u8],
		visit: &mut dyn FnMut(&[u8], &[u8]) -> Result<(), Error>,
	) -> Result<(), Error> {
		tables_for_each(&self.snapshot, bucket, Some(prefix), visit)
	}
}

struct MemWriteTx<'a> {
	guard: RwLockWriteGuard<'a, Tables>,
	staged: Tables,
}

impl<'a> ReadTx for MemWriteTx<'a> {
	fn get(&self, bucket: Bucket, key: &[u8]) -> Result<Option<Vec<u8>>, Error> {
		Ok(tables_get(&self.staged, bucket, key))
	}

	fn for_each(
		&self,
		bucket: Bucket,
		visit: &mut dyn FnMut(&[u8], &[u8]) -> Result<(), Error>,
	) -> Result<(), Error> {
		tables_for_each(&self.staged, bucket, None, visit)
	}

	fn for_each_prefix(
		&self,
		bucket: Bucket,
		prefix: &[u8],
		visit: &mut dyn FnMut(&[u8], &[u8]) -> Result<(), Error>,
	) -> Result<(), Error> {
		tables_for_each(&self.staged, bucket, Some(prefix), visit)
	}
}

impl<'a> WriteTx for MemWriteTx<'a> {
	fn put(&mut self, bucket: Bucket, key: &[u8], value: &[u8]) -> Result<(), Error> {
		self.staged
			.get_mut(bucket.name())
			.ok_or_else(|| Error::Db(format!("missing bucket {}", bucket.name())))?
			.insert(key.to_vec(), value.to_vec());
		Ok(())
	}

	fn delete(&mut self, bucket: Bucket, key: &[u8]) -> Result<(), Error> {
		self.staged
			.get_mut(bucket.name())
			.ok_or_else(|| Error::Db(format!("missing bucket {}", bucket.name())))?
			.remove(key);
		Ok(())
	}

	fn commit(self: Box<Self>) -> Result<(), Error> {
		let MemWriteTx { mut guard, staged } = *self;
		*guard = staged;
		Ok(())
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn writes_commit_atomically() {
		let store = MemStore::new();
		{
			let mut tx = store.begin_write().unwrap();
			tx.put(Bucket::Meta, b"a", b"1").unwrap();
			tx.commit().unwrap();
		}
		{
			// an aborted transaction leaves no trace
			let mut tx = store.begin_write().unwrap();
			tx.put(Bucket::Meta, b"b", b"2").unwrap();
			drop(tx);
		}
		let tx = store.begin_read().unwrap();
		assert_eq!(tx.get(Bucket::Meta, b"a").unwrap(), Some(b"1".to_vec()));
		assert_eq!(tx.get(Bucket::Meta, b"b").unwrap(), None);
	}

	#[test]
	fn prefix_iteration_is_sorted() {
		let store = MemStore::new();
		let mut tx = store.begin_write().unwrap();
		tx.put(Bucket::DelayedCoinOutputs, b"\x00\x02b", b"").unwrap();
		tx.put(Bucket::DelayedCoinOutputs, b"\x00\x02a", b"").unwrap();
		tx.put(Bucket::DelayedCoinOutputs, b"\x00\x03a", b"").unwrap();
		let mut seen = vec![];
		tx.for_each_prefix(Bucket::DelayedCoinOutputs, b"\x00\x02", &mut |k, _| {
			seen.push(k.to_vec());
			Ok(())
		})
		.unwrap();
		assert_eq!(seen, vec![b"\x00\x02a".to_vec(), b"\x00\x02b".to_vec()]);
	}
}
