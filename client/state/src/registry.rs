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

//! The runtime registry: which runtime instance is valid at which block.
//!
//! Instances are shared across blocks until the `:code` key changes, so a
//! chain of a thousand blocks on one runtime holds a single instance. Code
//! substitutions replace the instance bound to a single historical block
//! without touching the parent instance, because the parent's code hash is
//! authenticated by its block header.

use crate::Error;
use parking_lot::RwLock;
use std::collections::HashMap;
use weft_primitives::{hashing::blake2_256, well_known_keys, Hash};
use weft_runtime::RuntimeInstance;
use weft_telemetry::{TelemetryHandle, TelemetryMessage};
use weft_trie::TrieState;

const LOG_TARGET: &str = "state::runtime";

/// Block hash to runtime instance bindings.
pub struct RuntimeRegistry {
	instances: RwLock<HashMap<Hash, RuntimeInstance>>,
	code_substituted_block_hash: RwLock<Option<Hash>>,
	telemetry: TelemetryHandle,
}

impl RuntimeRegistry {
	/// An empty registry.
	pub fn new(telemetry: TelemetryHandle) -> Self {
		Self {
			instances: RwLock::new(HashMap::new()),
			code_substituted_block_hash: RwLock::new(None),
			telemetry,
		}
	}

	/// The instance bound to the block.
	pub fn get(&self, block_hash: &Hash) -> Result<RuntimeInstance, Error> {
		self.instances
			.read()
			.get(block_hash)
			.cloned()
			.ok_or(Error::RuntimeNotFound(*block_hash))
	}

	/// Bind an instance to a block. Idempotent; binding a *different*
	/// instance to an already-bound block is a logic error and keeps the
	/// first binding.
	pub fn store(&self, block_hash: Hash, instance: RuntimeInstance) {
		let mut instances = self.instances.write();
		if let Some(existing) = instances.get(&block_hash) {
			if !std::sync::Arc::ptr_eq(existing, &instance) {
				log::error!(
					target: LOG_TARGET,
					"refusing to rebind block {block_hash:?} to a different runtime instance",
				);
			}
			return
		}
		instances.insert(block_hash, instance);
	}

	/// Inspect `:code` in the new block's state and bind the right instance.
	///
	/// An unchanged code blob shares the parent's instance identity; a changed
	/// one clones the parent instance onto the new code and reports the
	/// upgrade.
	pub fn handle_runtime_changes(
		&self,
		state: &TrieState,
		parent_runtime: &RuntimeInstance,
		block_hash: Hash,
	) -> Result<(), Error> {
		let code = state.get(well_known_keys::CODE).ok_or(Error::CodeNotFound)?;
		let code_hash = Hash::from(blake2_256(&code));

		if code_hash == parent_runtime.code_hash() {
			self.store(block_hash, parent_runtime.clone());
			return Ok(())
		}

		let upgraded = parent_runtime.clone_with_code(&code)?;
		let version = upgraded.version()?;
		log::info!(
			target: LOG_TARGET,
			"runtime upgraded at block {block_hash:?}: spec version {}",
			version.spec_version,
		);
		self.telemetry.send_message(TelemetryMessage::RuntimeUpgraded {
			block_hash,
			spec_version: version.spec_version,
		});
		self.store(block_hash, upgraded);
		Ok(())
	}

	/// Bind a substituted instance built from externally supplied code to a
	/// single block. The parent instance and its code hash stay untouched.
	pub fn handle_code_substitution(
		&self,
		block_hash: Hash,
		code: &[u8],
		builder: impl FnOnce(&[u8]) -> Result<RuntimeInstance, weft_runtime::Error>,
	) -> Result<(), Error> {
		if code.is_empty() {
			return Err(Error::Runtime(weft_runtime::Error::CodeEmpty))
		}
		let replacement = builder(code)?;
		log::info!(target: LOG_TARGET, "substituted runtime code at block {block_hash:?}");
		self.instances.write().insert(block_hash, replacement);
		*self.code_substituted_block_hash.write() = Some(block_hash);
		Ok(())
	}

	/// The block whose code was last substituted, if any.
	pub fn code_substituted_block_hash(&self) -> Option<Hash> {
		*self.code_substituted_block_hash.read()
	}

	/// Drop the bindings of pruned blocks.
	pub fn prune(&self, block_hashes: &[Hash]) {
		let mut instances = self.instances.write();
		for hash in block_hashes {
			instances.remove(hash);
		}
	}
}
