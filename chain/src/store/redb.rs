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

//! Disk-backed store on top of redb. All tables are created at open so
//! read transactions never observe a missing table.

use std::fmt::Display;
use std::fs;
use std::path::Path;

use redb::{Database, ReadableTable, TableDefinition};

use super::{Bucket, Error, KvStore, ReadTx, WriteTx};

fn db_err<E: Display>(e: E) -> Error {
	Error::Db(e.to_string())
}

fn def(bucket: Bucket) -> TableDefinition<'static, &'static [u8], &'static [u8]> {
	TableDefinition::new(bucket.name())
}

/// A store backed by a single redb file.
pub struct RedbStore {
	db: Database,
}

impl RedbStore {
	/// Opens (or creates) the store at `path`, creating parent
	/// directories and every bucket.
	pub fn open(path: &Path) -> Result<RedbStore, Error> {
		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent).map_err(db_err)?;
		}
		let db = Database::create(path).map_err(db_err)?;
		let tx = db.begin_write().map_err(db_err)?;
		for bucket in Bucket::ALL.iter() {
			tx.open_table(def(*bucket)).map_err(db_err)?;
		}
		tx.commit().map_err(db_err)?;
		Ok(RedbStore { db })
	}
}

impl KvStore for RedbStore {
	fn begin_read<'a>(&'a self) -> Result<Box<dyn ReadTx + 'a>, Error> {
		let tx = self.db.begin_read().map_err(db_err)?;
		Ok(Box::new(RedbReadTx { tx }))
	}

	fn begin_write<'a>(&'a self) -> Result<Box<dyn WriteTx + 'a>, Error> {
		let tx = self.db.begin_write().map_err(db_err)?;
		Ok(Box::new(RedbWriteTx { tx }))
	}
}

struct RedbReadTx<'a> {
	tx: redb::ReadTransaction<'a>,
}

impl<'a> ReadTx for RedbReadTx<'a> {
	fn get(&self, bucket: Bucket, key: &[u8]) -> Result<Option<Vec<u8>>, Error> {
		let table = self.tx.open_table(def(bucket)).map_err(db_err)?;
		let result = table
			.get(key)
			.map_err(db_err)?
			.map(|guard| guard.value().to_vec());
		Ok(result)
	}

	fn for_each(
		&self,
		bucket: Bucket,
		visit: &mut dyn FnMut(&[u8], &[u8]) -> Result<(), Error>,
	) -> Result<(), Error> {
		let table = self.tx.open_table(def(bucket)).map_err(db_err)?;
		for item in table.iter().map_err(db_err)? {
			let (key, value) = item.map_err(db_err)?;
			visit(key.value(), value.value())?;
		}
		Ok(())
	}

	fn for_each_prefix(
		&self,
		bucket: Bucket,
		prefix: &[u8],
		visit: &mut dyn FnMut(&[u8], &[u8]) -> Result<(), Error>,
	) -> Result<(), Error> {
		let table = self.tx.open_table(def(bucket)).map_err(db_err)?;
		for item in table.range(prefix..).map_err(db_err)? {
			let (key, value) = item.map_err(db_err)?;
			if !key.value().starts_with(prefix) {
				break;
			}
			visit(key.value(), value.value())?;
		}
		Ok(())
	}
}

struct RedbWriteTx<'a> {
	tx: redb::WriteTransaction<'a>,
}

impl<'a> ReadTx for RedbWriteTx<'a> {
	fn get(&self, bucket: Bucket, key: &[u8]) -> Result<Option<Vec<u8>>, Error> {
		let table = self.tx.open_table(def(bucket)).map_err(db_err)?;
		let result = table
			.get(key)
			.map_err(db_err)?
			.map(|guard| guard.value().to_vec());
		Ok(result)
	}

	fn for_each(
		&self,
		bucket: Bucket,
		visit: &mut dyn FnMut(&[u8], &[u8]) -> Result<(), Error>,
	) -> Result<(), Error> {
		let table = self.tx.open_table(def(bucket)).map_err(db_err)?;
		for item in table.iter().map_err(db_err)? {
			let (key, value) = item.map_err(db_err)?;
			visit(key.value(), value.value())?;
		}
		Ok(())
	}

	fn for_each_prefix(
		&self,
		bucket: Bucket,
		prefix: &[u8],
		visit: &mut dyn FnMut(&[u8], &[u8]) -> Result<(), Error>,
	) -> Result<(), Error> {
		let table = self.tx.open_table(def(bucket)).map_err(db_err)?;
		for item in table.range(prefix..).map_err(db_err)? {
			let (key, value) = item.map_err(db_err)?;
			if !key.value().starts_with(prefix) {
				break;
			}
			visit(key.value(), value.value())?;
		}
		Ok(())
	}
}

impl<'a> WriteTx for RedbWriteTx<'a> {
	fn put(&mut self, bucket: Bucket, key: &[u8], value: &[u8]) -> Result<(), Error> {
		let mut table = self.tx.open_table(def(bucket)).map_err(db_err)?;
		table.insert(key, value).map_err(db_err)?;
		Ok(())
	}

	fn delete(&mut self, bucket: Bucket, key: &[u8]) -> Result<(), Error> {
		let mut table = self.tx.open_table(def(bucket)).map_err(db_err)?;
		table.remove(key).map_err(db_err)?;
		Ok(())
	}

	fn commit(self: Box<Self>) -> Result<(), Error> {
		let this = *self;
		this.tx.commit().map_err(db_err)
	}
}
