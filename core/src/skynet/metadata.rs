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

//! Skyfile metadata: the free-form JSON record stored alongside the
//! layout in the base sector. It names the file, maps subfile paths to
//! ranges within it and picks the file served when no path is given.

use serde_json;
use std::collections::BTreeMap;

/// The filename implied when a directory skyfile has no default path
/// set but does carry a file by this name.
pub const DEFAULT_PATH_FALLBACK: &str = "index.html";

/// Metadata about one subfile of a skyfile.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkyfileSubfileMetadata {
	/// Unix mode bits of the subfile.
	#[serde(default, skip_serializing_if = "is_zero_u32")]
	pub mode: u32,
	/// Name of the subfile.
	pub filename: String,
	/// MIME type served for the subfile.
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub contenttype: String,
	/// Offset of the subfile within the parent file's bytes.
	pub offset: u64,
	/// Length of the subfile in bytes.
	pub len: u64,
}

/// Metadata about a whole skyfile.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkyfileMetadata {
	/// Name of the file.
	pub filename: String,
	/// Length of the file in bytes.
	pub length: u64,
	/// Unix mode bits of the file.
	#[serde(default, skip_serializing_if = "is_zero_u32")]
	pub mode: u32,
	/// Subfiles by path, for directory skyfiles.
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub subfiles: BTreeMap<String, SkyfileSubfileMetadata>,
	/// The subfile served when the request names none.
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub defaultpath: String,
	/// Suppresses default-path resolution entirely.
	#[serde(default, skip_serializing_if = "is_false")]
	pub disabledefaultpath: bool,
}

fn is_zero_u32(n: &u32) -> bool {
	*n == 0
}

fn is_false(b: &bool) -> bool {
	!*b
}

impl SkyfileMetadata {
	/// Serializes to the JSON form stored in the base sector.
	pub fn to_json(&self) -> Vec<u8> {
		serde_json::to_vec(self).expect("skyfile metadata is always representable")
	}

	/// Parses the JSON form stored in a base sector.
	pub fn from_json(data: &[u8]) -> Result<SkyfileMetadata, serde_json::Error> {
		serde_json::from_slice(data)
	}

	/// Looks up a subfile by path, tolerating a leading slash.
	pub fn subfile(&self, path: &str) -> Option<&SkyfileSubfileMetadata> {
		self.subfiles.get(path.trim_start_matches('/'))
	}

	/// The path served when a request names none: the configured
	/// default path, or `index.html` when present, unless resolution is
	/// disabled.
	pub fn effective_default_path(&self) -> Option<&str> {
		if self.disabledefaultpath {
			return None;
		}
		if !self.defaultpath.is_empty() {
			return Some(self.defaultpath.trim_start_matches('/'));
		}
		if self.subfiles.contains_key(DEFAULT_PATH_FALLBACK) {
			return Some(DEFAULT_PATH_FALLBACK);
		}
		None
	}
}

#[cfg(test)]
mod test {
	use super::*;

	fn subfile(offset: u64, len: u64) -> SkyfileSubfileMetadata {
		SkyfileSubfileMetadata {
			mode: 0,
			filename: String::new(),
			contenttype: "text/html".to_string(),
			offset,
			len,
		}
	}

	#[test]
	fn json_round_trip() {
		let mut meta = SkyfileMetadata {
			filename: "site".to_string(),
			length: 300,
			..Default::default()
		};
		meta.subfiles
			.insert("index.html".to_string(), subfile(0, 100));
		meta.subfiles
			.insert("style.css".to_string(), subfile(100, 200));

		let json = meta.to_json();
		assert_eq!(SkyfileMetadata::from_json(&json).unwrap(), meta);
	}

	#[test]
	fn default_path_resolution() {
		let mut meta = SkyfileMetadata::default();
		assert_eq!(meta.effective_default_path(), None);

		meta.subfiles
			.insert("index.html".to_string(), subfile(0, 10));
		assert_eq!(meta.effective_default_path(), Some("index.html"));

		meta.defaultpath = "/main.html".to_string();
		assert_eq!(meta.effective_default_path(), Some("main.html"));

		meta.disabledefaultpath = true;
		assert_eq!(meta.effective_default_path(), None);
	}

	#[test]
	fn subfile_lookup_tolerates_slash() {
		let mut meta = SkyfileMetadata::default();
		meta.subfiles.insert("a/b.txt".to_string(), subfile(0, 1));
		assert!(meta.subfile("/a/b.txt").is_some());
		assert!(meta.subfile("a/b.txt").is_some());
		assert!(meta.subfile("missing").is_none());
	}
}
