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

//! The storage view: trie states indexed by their root.

use crate::Error;
use parking_lot::RwLock;
use std::collections::HashMap;
use weft_primitives::{Hash, Header};
use weft_trie::TrieState;

const LOG_TARGET: &str = "state::storage";

/// Trie states keyed by root. The persistent database behind them is a
/// collaborator; the kernel reads and proves against this view.
pub struct StorageState {
	tries: RwLock<HashMap<Hash, TrieState>>,
	latest_root: RwLock<Option<Hash>>,
}

impl StorageState {
	/// An empty storage state.
	pub fn new() -> Self {
		Self { tries: RwLock::new(HashMap::new()), latest_root: RwLock::new(None) }
	}

	/// Store a trie state under its root and remember it as the latest.
	/// Returns the root.
	pub fn store_trie(&self, state: TrieState, header: Option<&Header>) -> Hash {
		let root = state.root();
		self.tries.write().insert(root, state);
		*self.latest_root.write() = Some(root);
		if let Some(header) = header {
			log::trace!(
				target: LOG_TARGET,
				"stored trie {root:?} for block {:?} (number {})",
				header.hash(),
				header.number,
			);
		}
		root
	}

	/// The trie state under `root`, or the most recently stored one for
	/// `None`.
	pub fn trie_state(&self, root: Option<&Hash>) -> Result<TrieState, Error> {
		let root = match root {
			Some(root) => *root,
			None => self.latest_root.read().ok_or(Error::NoStoredState)?,
		};
		self.tries.read().get(&root).cloned().ok_or(Error::StateNotFound(root))
	}

	/// Whether a state is stored under the root.
	pub fn contains(&self, root: &Hash) -> bool {
		self.tries.read().contains_key(root)
	}

	/// Produce a proof for the given keys against the state under `root`.
	pub fn generate_trie_proof(
		&self,
		root: &Hash,
		keys: &[Vec<u8>],
	) -> Result<Vec<Vec<u8>>, Error> {
		let state = self.trie_state(Some(root))?;
		Ok(state.generate_proof(keys)?)
	}
}

impl Default for StorageState {
	fn default() -> Self {
		Self::new()
	}
}
