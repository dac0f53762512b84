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

//! The authoritative view of the block tree and its per-block data.

use crate::{registry::RuntimeRegistry, Error};
use parking_lot::RwLock;
use std::{
	collections::HashMap,
	time::{SystemTime, UNIX_EPOCH},
};
use weft_blocktree::BlockTree;
use weft_primitives::{Block, BlockNumber, Body, Hash, Header};
use weft_runtime::RuntimeInstance;
use weft_telemetry::{TelemetryHandle, TelemetryMessage};
use weft_trie::TrieState;

const LOG_TARGET: &str = "state";

struct Inner {
	tree: BlockTree,
	headers: HashMap<Hash, Header>,
	bodies: HashMap<Hash, Body>,
}

/// Block state: the tree of unfinalized blocks, their headers and bodies, and
/// the runtime bound to each of them.
///
/// Structural mutation takes the writer side of one lock; reads run
/// concurrently. A thread that adds a block observes the updated head on its
/// next read.
pub struct BlockState {
	inner: RwLock<Inner>,
	registry: RuntimeRegistry,
	genesis_hash: Hash,
	telemetry: TelemetryHandle,
}

impl BlockState {
	/// Block state rooted at the genesis block.
	pub fn new(genesis_header: Header, telemetry: TelemetryHandle) -> Self {
		let genesis_hash = genesis_header.hash();
		let tree = BlockTree::new(genesis_hash, genesis_header.number, 0);
		let mut headers = HashMap::new();
		headers.insert(genesis_hash, genesis_header);
		let mut bodies = HashMap::new();
		bodies.insert(genesis_hash, Body::default());

		Self {
			inner: RwLock::new(Inner { tree, headers, bodies }),
			registry: RuntimeRegistry::new(telemetry.clone()),
			genesis_hash,
			telemetry,
		}
	}

	/// The genesis block hash.
	pub fn genesis_hash(&self) -> Hash {
		self.genesis_hash
	}

	/// The hash of the current best block.
	pub fn best_block_hash(&self) -> Hash {
		self.inner.read().tree.best_block()
	}

	/// The number of the current best block.
	pub fn best_block_number(&self) -> BlockNumber {
		self.inner.read().tree.best_block_number()
	}

	/// The header of the current best block.
	pub fn best_block_header(&self) -> Result<Header, Error> {
		let inner = self.inner.read();
		let best = inner.tree.best_block();
		inner.headers.get(&best).cloned().ok_or(Error::HeaderNotFound(best))
	}

	/// Add a block, stamping it with the current wall clock as arrival time.
	pub fn add_block(&self, block: &Block) -> Result<(), Error> {
		self.add_block_with_arrival_time(block, now_millis())
	}

	/// Add a block with an explicit arrival time.
	///
	/// Atomic: on error nothing is stored and the head is unchanged.
	pub fn add_block_with_arrival_time(
		&self,
		block: &Block,
		arrival_time: u64,
	) -> Result<(), Error> {
		let hash = block.hash();
		let mut inner = self.inner.write();
		inner.tree.add_block(
			hash,
			block.header.parent_hash,
			block.header.number,
			arrival_time,
		)?;
		inner.headers.insert(hash, block.header.clone());
		inner.bodies.insert(hash, block.body.clone());
		drop(inner);

		self.telemetry
			.send_message(TelemetryMessage::BlockImport { best: hash, height: block.header.number });
		Ok(())
	}

	/// The stored header of a block.
	pub fn get_header(&self, hash: &Hash) -> Result<Header, Error> {
		self.inner.read().headers.get(hash).cloned().ok_or(Error::HeaderNotFound(*hash))
	}

	/// The stored body of a block.
	pub fn get_block_body(&self, hash: &Hash) -> Result<Body, Error> {
		self.inner.read().bodies.get(hash).cloned().ok_or(Error::BodyNotFound(*hash))
	}

	/// The state root committed in a block's header.
	pub fn get_block_state_root(&self, hash: &Hash) -> Result<Hash, Error> {
		self.get_header(hash).map(|header| header.state_root)
	}

	/// Whether the block is in the tree.
	pub fn has_block(&self, hash: &Hash) -> bool {
		self.inner.read().tree.contains(hash)
	}

	/// Whether `node` descends from `ancestor`; a block descends from itself.
	pub fn is_descendant_of(&self, node: &Hash, ancestor: &Hash) -> bool {
		self.inner.read().tree.is_descendant_of(node, ancestor)
	}

	/// The hashes from `ancestor` to `descendant` inclusive, oldest first.
	pub fn subchain(&self, ancestor: &Hash, descendant: &Hash) -> Result<Vec<Hash>, Error> {
		Ok(self.inner.read().tree.subchain(ancestor, descendant)?)
	}

	/// The deepest common ancestor of two blocks.
	pub fn highest_common_ancestor(&self, a: &Hash, b: &Hash) -> Result<Hash, Error> {
		Ok(self.inner.read().tree.highest_common_ancestor(a, b)?)
	}

	/// All current leaves.
	pub fn leaves(&self) -> Vec<Hash> {
		self.inner.read().tree.leaves()
	}

	/// The runtime valid at the given block, or at the best block for `None`.
	pub fn get_runtime(&self, hash: Option<&Hash>) -> Result<RuntimeInstance, Error> {
		let hash = match hash {
			Some(hash) => *hash,
			None => self.best_block_hash(),
		};
		self.registry.get(&hash)
	}

	/// Bind a runtime instance to a block.
	pub fn store_runtime(&self, hash: Hash, instance: RuntimeInstance) {
		self.registry.store(hash, instance);
	}

	/// Detect a runtime change at `block_hash` and bind the right instance.
	pub fn handle_runtime_changes(
		&self,
		state: &TrieState,
		parent_runtime: &RuntimeInstance,
		block_hash: Hash,
	) -> Result<(), Error> {
		self.registry.handle_runtime_changes(state, parent_runtime, block_hash)
	}

	/// Direct access to the runtime registry, for code substitution.
	pub fn registry(&self) -> &RuntimeRegistry {
		&self.registry
	}

	/// Finalize a block: prune the tree down to it and release the headers,
	/// bodies and runtime bindings of every discarded block.
	pub fn finalize(&self, hash: &Hash) -> Result<(), Error> {
		let mut inner = self.inner.write();
		let pruned = inner.tree.prune(hash)?;
		for pruned_hash in &pruned {
			inner.headers.remove(pruned_hash);
			inner.bodies.remove(pruned_hash);
		}
		drop(inner);
		self.registry.prune(&pruned);

		let number = self.get_header(hash).map(|header| header.number).unwrap_or_default();
		log::info!(target: LOG_TARGET, "finalized block {hash:?} (number {number})");
		self.telemetry.send_message(TelemetryMessage::Finalized { hash: *hash, height: number });
		Ok(())
	}
}

fn now_millis() -> u64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|elapsed| elapsed.as_millis() as u64)
		.unwrap_or_default()
}
