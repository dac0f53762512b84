// This file is part of Weft.

// Copyright (C) Weft Contributors
// SPDX-License-Identifier: GPL-3.0-or-later WITH Classpath-exception-2.0

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! The in-memory trie state a block executes against.
//!
//! An ordered key-value view with a deterministic root commitment over the
//! encoded leaves. The on-disk Merkle-Patricia layers live behind the storage
//! collaborator; this view is what the kernel hands to the runtime and what
//! storage queries read.

use crate::{
	nibbles::{key_to_nibbles, pack_nibbles},
	node::{encode_header, NodeKind},
	Error,
};
use codec::Encode;
use std::collections::BTreeMap;
use weft_primitives::{hashing::blake2_256, Hash};

/// In-memory key-value state with a deterministic root.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TrieState {
	entries: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl TrieState {
	/// An empty state.
	pub fn new() -> Self {
		Self::default()
	}

	/// Set a key to a value.
	pub fn set(&mut self, key: &[u8], value: Vec<u8>) {
		self.entries.insert(key.to_vec(), value);
	}

	/// Get the value under a key.
	pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
		self.entries.get(key).cloned()
	}

	/// Delete a key, returning the previous value.
	pub fn delete(&mut self, key: &[u8]) -> Option<Vec<u8>> {
		self.entries.remove(key)
	}

	/// Number of stored keys.
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	/// Whether the state holds no keys.
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// The root commitment: blake2b-256 over the leaf hashes in key order.
	pub fn root(&self) -> Hash {
		let mut accumulated = Vec::with_capacity(self.entries.len() * 32);
		for (key, value) in &self.entries {
			let leaf = encode_leaf(key, value)
				.expect("storage keys are far below the 32 KiB partial key cap; qed");
			accumulated.extend_from_slice(&blake2_256(&leaf));
		}
		Hash::from(blake2_256(&accumulated))
	}

	/// Produce proof elements for the requested keys: the encoded leaf node of
	/// every key present in the state. Absent keys contribute nothing.
	pub fn generate_proof(&self, keys: &[Vec<u8>]) -> Result<Vec<Vec<u8>>, Error> {
		let mut proof = Vec::new();
		for key in keys {
			if let Some(value) = self.entries.get(key) {
				proof.push(encode_leaf(key, value)?);
			}
		}
		Ok(proof)
	}
}

/// Encode a leaf node: header, packed partial key nibbles, SCALE-framed value.
pub fn encode_leaf(key: &[u8], value: &[u8]) -> Result<Vec<u8>, Error> {
	let nibbles = key_to_nibbles(key);
	let mut encoded = Vec::with_capacity(1 + key.len() + value.len() + 4);
	encode_header(NodeKind::Leaf, nibbles.len(), &mut encoded)?;
	encoded.extend_from_slice(&pack_nibbles(&nibbles));
	value.encode_to(&mut encoded);
	Ok(encoded)
}
