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

//! The in-memory forest of candidate blocks, rooted at the last finalized
//! block.
//!
//! Nodes live in an arena (a flat vector) and refer to relatives by index, so
//! parent links cannot form ownership cycles and finalization is a bulk
//! release of indices. The tree is single-writer: callers wrap it in their own
//! lock and serialize structural mutation.

use std::collections::HashMap;
use weft_primitives::{BlockNumber, Hash};

const LOG_TARGET: &str = "blocktree";

/// Block tree errors.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
	/// The parent of the inserted block is not in the tree.
	#[error("cannot find parent block in blocktree: {0}")]
	ParentNotFound(Hash),
	/// The inserted block is already in the tree.
	#[error("block already exists in blocktree: {0}")]
	BlockAlreadyExists(Hash),
	/// A referenced block is not in the tree.
	#[error("cannot find node in blocktree: {0}")]
	NodeNotFound(Hash),
	/// The claimed ancestor is not on the path from the root to the
	/// descendant.
	#[error("{ancestor} is not an ancestor of {descendant}")]
	AncestorNotFound {
		/// The block claimed to be an ancestor.
		ancestor: Hash,
		/// The descendant whose chain was walked.
		descendant: Hash,
	},
}

/// An element in the block tree.
///
/// `number` is monotonically non-decreasing along any parent chain and
/// `depth` increases by exactly one per generation; children keep insertion
/// order and are unique by hash.
#[derive(Debug)]
struct TreeNode {
	hash: Hash,
	parent: Option<usize>,
	number: BlockNumber,
	children: Vec<usize>,
	depth: u64,
	arrival_time: u64,
}

/// The in-memory block tree.
///
/// The root is the last finalized block; the head is the leaf picked by the
/// fork-choice rule: greatest depth, ties broken by earliest arrival time,
/// then by smallest hash in byte order.
#[derive(Debug)]
pub struct BlockTree {
	arena: Vec<TreeNode>,
	lookup: HashMap<Hash, usize>,
	root: usize,
	head: usize,
}

impl BlockTree {
	/// A tree holding only the given (finalized) root block.
	pub fn new(root_hash: Hash, number: BlockNumber, arrival_time: u64) -> Self {
		let root = TreeNode {
			hash: root_hash,
			parent: None,
			number,
			children: Vec::new(),
			depth: 0,
			arrival_time,
		};
		let mut lookup = HashMap::new();
		lookup.insert(root_hash, 0);
		Self { arena: vec![root], lookup, root: 0, head: 0 }
	}

	/// Insert a block under its parent.
	///
	/// The insertion is atomic: on error the tree is unchanged. On success the
	/// fork-choice rule runs and the new block may become the head.
	pub fn add_block(
		&mut self,
		hash: Hash,
		parent_hash: Hash,
		number: BlockNumber,
		arrival_time: u64,
	) -> Result<(), Error> {
		if self.lookup.contains_key(&hash) {
			return Err(Error::BlockAlreadyExists(hash))
		}
		let parent =
			*self.lookup.get(&parent_hash).ok_or(Error::ParentNotFound(parent_hash))?;

		let index = self.arena.len();
		self.arena.push(TreeNode {
			hash,
			parent: Some(parent),
			number,
			children: Vec::new(),
			depth: self.arena[parent].depth + 1,
			arrival_time,
		});
		self.arena[parent].children.push(index);
		self.lookup.insert(hash, index);

		self.head = self.best_leaf();
		log::trace!(
			target: LOG_TARGET,
			"added block {hash:?} (number {number}), head is now {:?}",
			self.best_block(),
		);
		Ok(())
	}

	/// The hash of the current head.
	pub fn best_block(&self) -> Hash {
		self.arena[self.head].hash
	}

	/// The number of the current head.
	pub fn best_block_number(&self) -> BlockNumber {
		self.arena[self.head].number
	}

	/// The hash of the root (last finalized) block.
	pub fn root_hash(&self) -> Hash {
		self.arena[self.root].hash
	}

	/// Whether the block is in the tree.
	pub fn contains(&self, hash: &Hash) -> bool {
		self.lookup.contains_key(hash)
	}

	/// The block number of a node.
	pub fn number(&self, hash: &Hash) -> Result<BlockNumber, Error> {
		self.node(hash).map(|index| self.arena[index].number)
	}

	/// Whether `node` sits on the chain from the root down to and including
	/// `ancestor`'s subtree; a node is a descendant of itself.
	///
	/// Absent nodes answer `false`; across disjoint trees the question is
	/// undefined and the caller must ensure both blocks exist.
	pub fn is_descendant_of(&self, node: &Hash, ancestor: &Hash) -> bool {
		let (Some(&node), Some(&ancestor)) = (self.lookup.get(node), self.lookup.get(ancestor))
		else {
			return false
		};

		let target_depth = self.arena[ancestor].depth;
		let mut current = node;
		while self.arena[current].depth > target_depth {
			match self.arena[current].parent {
				Some(parent) => current = parent,
				None => return false,
			}
		}
		current == ancestor
	}

	/// The chain of hashes from `ancestor` to `descendant`, both inclusive,
	/// ordered oldest first.
	pub fn subchain(&self, ancestor: &Hash, descendant: &Hash) -> Result<Vec<Hash>, Error> {
		let ancestor_index = self.node(ancestor)?;
		let mut current = self.node(descendant)?;

		let mut chain = Vec::new();
		loop {
			chain.push(self.arena[current].hash);
			if current == ancestor_index {
				break
			}
			current = self.arena[current].parent.ok_or(Error::AncestorNotFound {
				ancestor: *ancestor,
				descendant: *descendant,
			})?;
			if self.arena[current].depth < self.arena[ancestor_index].depth {
				return Err(Error::AncestorNotFound {
					ancestor: *ancestor,
					descendant: *descendant,
				})
			}
		}
		chain.reverse();
		Ok(chain)
	}

	/// The deepest block that is an ancestor of both inputs.
	pub fn highest_common_ancestor(&self, a: &Hash, b: &Hash) -> Result<Hash, Error> {
		let mut a = self.node(a)?;
		let mut b = self.node(b)?;

		while self.arena[a].depth > self.arena[b].depth {
			a = self.arena[a].parent.expect("depth > 0 implies a parent; qed");
		}
		while self.arena[b].depth > self.arena[a].depth {
			b = self.arena[b].parent.expect("depth > 0 implies a parent; qed");
		}
		while a != b {
			a = self.arena[a].parent.expect("nodes share the arena root; qed");
			b = self.arena[b].parent.expect("nodes share the arena root; qed");
		}
		Ok(self.arena[a].hash)
	}

	/// All nodes without children. Never empty.
	pub fn leaves(&self) -> Vec<Hash> {
		self.arena
			.iter()
			.filter(|node| node.children.is_empty())
			.map(|node| node.hash)
			.collect()
	}

	/// Rewrite the root to the finalized block, releasing every node that is
	/// neither an ancestor nor a descendant of it. Returns the released
	/// hashes so callers can drop per-block resources.
	pub fn prune(&mut self, finalized: &Hash) -> Result<Vec<Hash>, Error> {
		let finalized = self.node(finalized)?;
		if finalized == self.root {
			return Ok(Vec::new())
		}

		// Collect the retained subtree, rebasing depths onto the new root.
		let base_depth = self.arena[finalized].depth;
		let mut retained = Vec::new();
		let mut remap = HashMap::new();
		let mut stack = vec![(finalized, None)];
		while let Some((old_index, new_parent)) = stack.pop() {
			let node = &self.arena[old_index];
			let new_index = retained.len();
			remap.insert(old_index, new_index);
			retained.push(TreeNode {
				hash: node.hash,
				parent: new_parent,
				number: node.number,
				children: Vec::new(),
				depth: node.depth - base_depth,
				arrival_time: node.arrival_time,
			});
			if let Some(parent) = new_parent {
				retained[parent].children.push(new_index);
			}
			// Reverse so children pop, and therefore re-link, in insertion
			// order.
			for &child in node.children.iter().rev() {
				stack.push((child, Some(new_index)));
			}
		}

		let pruned: Vec<Hash> = self
			.arena
			.iter()
			.enumerate()
			.filter(|(index, _)| !remap.contains_key(index))
			.map(|(_, node)| node.hash)
			.collect();

		let old_head = self.arena[self.head].hash;
		self.arena = retained;
		self.lookup = self
			.arena
			.iter()
			.enumerate()
			.map(|(index, node)| (node.hash, index))
			.collect();
		self.root = 0;
		self.head = match self.lookup.get(&old_head) {
			Some(&head) => head,
			None => self.best_leaf(),
		};

		log::debug!(
			target: LOG_TARGET,
			"pruned {} blocks below {:?}",
			pruned.len(),
			self.root_hash(),
		);
		Ok(pruned)
	}

	fn node(&self, hash: &Hash) -> Result<usize, Error> {
		self.lookup.get(hash).copied().ok_or(Error::NodeNotFound(*hash))
	}

	/// The fork-choice rule over all current leaves.
	fn best_leaf(&self) -> usize {
		let mut best = self.root;
		let mut best_is_leaf = self.arena[best].children.is_empty();
		for (index, node) in self.arena.iter().enumerate() {
			if !node.children.is_empty() {
				continue
			}
			if !best_is_leaf || self.prefer(index, best) {
				best = index;
				best_is_leaf = true;
			}
		}
		best
	}

	/// Whether leaf `a` wins over leaf `b`.
	fn prefer(&self, a: usize, b: usize) -> bool {
		let (a, b) = (&self.arena[a], &self.arena[b]);
		(a.depth, b.arrival_time, b.hash) > (b.depth, a.arrival_time, a.hash)
	}
}
