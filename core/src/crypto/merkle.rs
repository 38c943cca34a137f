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

//! Merkle trees over data segments.
//!
//! Leaves are hashed with a `0x00` prefix and interior nodes with a
//! `0x01` prefix, so a leaf can never be confused with a node. The tree
//! over `n` leaves splits at the largest power of two strictly smaller
//! than `n`; the incremental pushing API below produces the same roots
//! as the recursive definition, which is what segment proofs rely on.

use blake2::blake2b::Blake2b;

use crate::core::hash::{Hash, ZERO_HASH};

/// Size in bytes of each leaf segment of a file Merkle tree.
pub const SEGMENT_SIZE: usize = 64;

/// Hash of a leaf: blake2b(0x00 || data).
pub fn leaf_hash(data: &[u8]) -> Hash {
	let mut state = Blake2b::new(32);
	state.update(&[0u8]);
	state.update(data);
	let mut res = [0; 32];
	res.copy_from_slice(state.finalize().as_bytes());
	Hash(res)
}

/// Hash of an interior node: blake2b(0x01 || left || right).
pub fn node_hash(left: &Hash, right: &Hash) -> Hash {
	let mut state = Blake2b::new(32);
	state.update(&[1u8]);
	state.update(&left.0);
	state.update(&right.0);
	let mut res = [0; 32];
	res.copy_from_slice(state.finalize().as_bytes());
	Hash(res)
}

/// An incremental Merkle tree builder. Leaves are pushed one at a time
/// and only O(log n) subtree roots are retained.
pub struct Tree {
	// (leaf count, root) per complete subtree, counts strictly
	// decreasing left to right
	stack: Vec<(u64, Hash)>,
}

impl Tree {
	/// A new, empty tree.
	pub fn new() -> Tree {
		Tree { stack: vec![] }
	}

	/// Push a leaf's data.
	pub fn push(&mut self, data: &[u8]) {
		self.push_leaf_hash(leaf_hash(data));
	}

	/// Push an already-hashed leaf.
	pub fn push_leaf_hash(&mut self, hash: Hash) {
		self.stack.push((1, hash));
		while self.stack.len() >= 2 {
			let (rc, rh) = self.stack[self.stack.len() - 1];
			let (lc, lh) = self.stack[self.stack.len() - 2];
			if lc != rc {
				break;
			}
			self.stack.pop();
			self.stack.pop();
			self.stack.push((lc + rc, node_hash(&lh, &rh)));
		}
	}

	/// Number of leaves pushed so far.
	pub fn leaves(&self) -> u64 {
		self.stack.iter().map(|&(c, _)| c).sum()
	}

	/// The root over everything pushed so far; the zero hash for an
	/// empty tree.
	pub fn root(&self) -> Hash {
		let mut iter = self.stack.iter().rev();
		let first = match iter.next() {
			Some(&(_, h)) => h,
			None => return ZERO_HASH,
		};
		iter.fold(first, |acc, &(_, h)| node_hash(&h, &acc))
	}
}

impl Default for Tree {
	fn default() -> Tree {
		Tree::new()
	}
}

/// Splits `data` into 64-byte segments (the last one possibly short)
/// and returns the Merkle root over them. The root of no data is the
/// zero hash.
pub fn segments_root(data: &[u8]) -> Hash {
	let mut tree = Tree::new();
	for segment in data.chunks(SEGMENT_SIZE) {
		tree.push(segment);
	}
	tree.root()
}

/// Number of segments covering `data_len` bytes.
pub fn segment_count(data_len: u64) -> u64 {
	(data_len + SEGMENT_SIZE as u64 - 1) / SEGMENT_SIZE as u64
}

fn largest_power_of_two_below(n: u64) -> u64 {
	debug_assert!(n > 1);
	let mut k = 1;
	while k * 2 < n {
		k *= 2;
	}
	k
}

fn range_root(segments: &[&[u8]]) -> Hash {
	match segments.len() {
		0 => ZERO_HASH,
		1 => leaf_hash(segments[0]),
		n => {
			let k = largest_power_of_two_below(n as u64) as usize;
			node_hash(&range_root(&segments[..k]), &range_root(&segments[k..]))
		}
	}
}

/// Builds the storage proof for segment `index` of `data`: the segment
/// itself (zero-padded to 64 bytes only in the caller's framing, here
/// returned as stored) plus the sibling subtree roots bottom-up.
/// Returns None when the index is out of range.
pub fn build_proof(data: &[u8], index: u64) -> Option<(Vec<u8>, Vec<Hash>)> {
	let segments: Vec<&[u8]> = data.chunks(SEGMENT_SIZE).collect();
	if index >= segments.len() as u64 {
		return None;
	}
	let mut hash_set = vec![];
	prove_range(&segments, index, &mut hash_set);
	Some((segments[index as usize].to_vec(), hash_set))
}

// Appends the sibling roots along the path to `index`. Ordering matches
// verify_segment: left-branch siblings are appended after the recursive
// descent, right-branch siblings before it.
fn prove_range(segments: &[&[u8]], index: u64, hash_set: &mut Vec<Hash>) {
	if segments.len() <= 1 {
		return;
	}
	let k = largest_power_of_two_below(segments.len() as u64) as usize;
	if (index as usize) < k {
		prove_range(&segments[..k], index, hash_set);
		hash_set.push(range_root(&segments[k..]));
	} else {
		hash_set.push(range_root(&segments[..k]));
		prove_range(&segments[k..], index - k as u64, hash_set);
	}
}

/// Verifies a storage proof: that `segment` is leaf `index` of a tree
/// with `num_segments` leaves and the provided `root`.
pub fn verify_segment(
	segment: &[u8],
	hash_set: &[Hash],
	num_segments: u64,
	index: u64,
	root: Hash,
) -> bool {
	if index >= num_segments {
		return false;
	}
	match fold_proof(hash_set, index, num_segments, leaf_hash(segment)) {
		Some(h) => h == root,
		None => false,
	}
}

// Recomputes the root from a proof, mirroring prove_range. None when
// the proof length does not match the tree shape exactly.
fn fold_proof(proof: &[Hash], index: u64, n: u64, leaf: Hash) -> Option<Hash> {
	if n == 0 {
		return None;
	}
	if n == 1 {
		return if proof.is_empty() { Some(leaf) } else { None };
	}
	let k = largest_power_of_two_below(n);
	if index < k {
		let (last, rest) = proof.split_last()?;
		Some(node_hash(&fold_proof(rest, index, k, leaf)?, last))
	} else {
		let (first, rest) = proof.split_first()?;
		Some(node_hash(first, &fold_proof(rest, index - k, n - k, leaf)?))
	}
}
