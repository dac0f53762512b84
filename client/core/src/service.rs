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

//! The core service implementation.

use crate::{Error, LOG_TARGET};
use codec::Encode;
use std::{collections::HashMap, sync::Arc};
use weft_keystore::{Keystore, Pair};
use weft_network::{framing::frame, message::Transactions, BlockAnnounce, BlockAnnouncer, Network, ProtocolNames};
use weft_primitives::{transaction_validity::Validity, Block, Extrinsic, Hash};
use weft_runtime::{RuntimeInstance, Version};
use weft_state::{BlockState, StorageState, TransactionState, ValidTransaction};
use weft_telemetry::{TelemetryHandle, TelemetryMessage};
use weft_trie::TrieState;

/// Builds a runtime instance from a code blob, delegating to the executor.
pub type RuntimeBuilder =
	Arc<dyn Fn(&[u8]) -> Result<RuntimeInstance, weft_runtime::Error> + Send + Sync>;

/// Hex key to hex value changes of one block, as reported by storage queries.
pub type QueryKeyValueChanges = HashMap<String, String>;

/// Everything the core service composes.
pub struct Config {
	/// The block tree and runtime bindings.
	pub block_state: Arc<BlockState>,
	/// The per-root storage view.
	pub storage_state: Arc<StorageState>,
	/// The transaction pool.
	pub transaction_state: Arc<TransactionState>,
	/// The peer-to-peer host.
	pub network: Arc<dyn Network>,
	/// The block-announce dispatch.
	pub announcer: Arc<dyn BlockAnnouncer>,
	/// The typed keystores.
	pub keystore: Arc<Keystore>,
	/// The telemetry sink.
	pub telemetry: TelemetryHandle,
	/// Per-block code substitutions working around known-bad historical
	/// runtimes.
	pub code_substitutes: HashMap<Hash, Vec<u8>>,
	/// The executor-backed instance constructor used for substitutions on the
	/// import path.
	pub runtime_builder: Option<RuntimeBuilder>,
}

/// The core service.
pub struct Service {
	block_state: Arc<BlockState>,
	storage_state: Arc<StorageState>,
	transaction_state: Arc<TransactionState>,
	network: Arc<dyn Network>,
	announcer: Arc<dyn BlockAnnouncer>,
	keystore: Arc<Keystore>,
	telemetry: TelemetryHandle,
	protocols: ProtocolNames,
	code_substitutes: HashMap<Hash, Vec<u8>>,
	runtime_builder: Option<RuntimeBuilder>,
}

impl Service {
	/// Assemble the service from its collaborators.
	pub fn new(config: Config) -> Self {
		let protocols = ProtocolNames::new(&config.block_state.genesis_hash());
		Self {
			block_state: config.block_state,
			storage_state: config.storage_state,
			transaction_state: config.transaction_state,
			network: config.network,
			announcer: config.announcer,
			keystore: config.keystore,
			telemetry: config.telemetry,
			protocols,
			code_substitutes: config.code_substitutes,
			runtime_builder: config.runtime_builder,
		}
	}

	/// Import a freshly produced block and announce it.
	///
	/// A failed announcement never fails the import; the announcer logs and
	/// moves on.
	pub fn handle_block_produced(&self, block: &Block, state: TrieState) -> Result<(), Error> {
		self.handle_block(block, state)?;
		self.announcer.announce_block(BlockAnnounce::from_header(&block.header, true));
		Ok(())
	}

	/// The shared import path: store state, extend the tree, resolve the
	/// block's runtime, reconcile the pool with any head change.
	fn handle_block(&self, block: &Block, state: TrieState) -> Result<(), Error> {
		let block_hash = block.hash();
		let previous_best = self.block_state.best_block_hash();

		self.storage_state.store_trie(state.clone(), Some(&block.header));
		self.block_state.add_block(block)?;

		let parent_runtime = self.block_state.get_runtime(Some(&block.header.parent_hash))?;
		let substituted = self.apply_configured_substitution(block_hash, &state)?;
		if !substituted {
			self.block_state.handle_runtime_changes(&state, &parent_runtime, block_hash)?;
		}

		let best = self.block_state.best_block_hash();
		if best != previous_best && block.header.parent_hash != previous_best {
			self.handle_chain_reorg(previous_best, best)?;
		}
		self.maintain_transaction_pool(block);

		log::debug!(
			target: LOG_TARGET,
			"imported block {block_hash:?} (number {}), best is {best:?}",
			block.header.number,
		);
		Ok(())
	}

	/// Reconcile the transaction pool across a head switch.
	///
	/// The discarded branch's extrinsics are parked in `pending`, newest
	/// block first, each at most once; they are not re-validated here.
	/// [`Service::revalidate_pending`] decides their fate against the new
	/// head. The new branch's extrinsics leave the ready queue, since they
	/// are now included on the canonical chain.
	pub fn handle_chain_reorg(&self, previous: Hash, best: Hash) -> Result<(), Error> {
		if previous == best {
			return Ok(())
		}

		let ancestor =
			self.block_state.highest_common_ancestor(&previous, &best).map_err(|error| {
				match error {
					weft_state::Error::Blocktree(weft_blocktree::Error::NodeNotFound(_)) =>
						Error::DisjointChains { previous, best },
					other => Error::State(other),
				}
			})?;

		let retreat = self.block_state.subchain(&ancestor, &previous)?;
		for hash in retreat.iter().skip(1).rev() {
			let body = self.block_state.get_block_body(hash)?;
			for extrinsic in body.iter() {
				self.transaction_state.add_to_pending(ValidTransaction::new(
					extrinsic.clone(),
					Validity::default(),
				));
			}
		}

		let advance = self.block_state.subchain(&ancestor, &best)?;
		for hash in advance.iter().skip(1) {
			let body = self.block_state.get_block_body(hash)?;
			for extrinsic in body.iter() {
				self.transaction_state.remove_from_queue(extrinsic);
			}
		}

		log::info!(
			target: LOG_TARGET,
			"reorged from {previous:?} to {best:?}, common ancestor {ancestor:?}",
		);
		Ok(())
	}

	/// Evict a block's extrinsics from the pool: they are included now.
	pub fn maintain_transaction_pool(&self, block: &Block) {
		for extrinsic in block.body.iter() {
			self.transaction_state.remove_extrinsic(extrinsic);
		}
	}

	/// Re-validate every parked extrinsic against the head runtime. Valid
	/// ones move to the ready queue with their fresh validity; fatally
	/// invalid ones are dropped and counted; retryable ones stay parked.
	pub fn revalidate_pending(&self) -> Result<(), Error> {
		let runtime = self.block_state.get_runtime(None)?;
		if let Ok(state) = self.storage_state.trie_state(None) {
			runtime.set_context_storage(state);
		}

		for transaction in self.transaction_state.pending() {
			match runtime.validate_transaction(transaction.extrinsic.as_ref())? {
				Ok(validity) => {
					self.transaction_state.remove_from_pending(&transaction.extrinsic);
					self.transaction_state.add_to_queue(ValidTransaction::new(
						transaction.extrinsic.clone(),
						validity,
					));
				},
				Err(error) if error.is_retriable() => {},
				Err(error) => {
					log::debug!(
						target: LOG_TARGET,
						"dropping pending extrinsic {:?}: {error}",
						transaction.extrinsic.hash(),
					);
					self.transaction_state.remove_from_pending(&transaction.extrinsic);
					self.telemetry.send_message(TelemetryMessage::TxPoolDropped {
						extrinsic: transaction.extrinsic.hash(),
					});
				},
			}
		}
		Ok(())
	}

	/// Validate a submitted extrinsic against the head runtime, pool it and
	/// gossip it to peers.
	pub fn handle_submitted_extrinsic(&self, extrinsic: Extrinsic) -> Result<(), Error> {
		let runtime = self.block_state.get_runtime(None)?;
		let state = self.storage_state.trie_state(None)?;
		runtime.set_context_storage(state);

		let validity = runtime
			.validate_transaction(extrinsic.as_ref())?
			.map_err(Error::InvalidTransaction)?;
		let propagate = validity.propagate;
		self.transaction_state.add_to_queue(ValidTransaction::new(extrinsic.clone(), validity));

		if propagate {
			let message = Transactions(vec![extrinsic]);
			self.network.gossip_message(&self.protocols.transactions, frame(&message.encode()));
		}
		Ok(())
	}

	/// Swap in a substituted runtime for `block_hash`, built by `builder`
	/// from the supplied code. The parent instance and its code hash are
	/// untouched; the substitution is recorded against the block.
	pub fn handle_code_substitution(
		&self,
		block_hash: Hash,
		state: &TrieState,
		builder: impl FnOnce(&[u8]) -> Result<RuntimeInstance, weft_runtime::Error>,
	) -> Result<(), Error> {
		let Some(code) = self.code_substitutes.get(&block_hash) else { return Ok(()) };

		let context = state.clone();
		self.block_state.registry().handle_code_substitution(block_hash, code, |code| {
			let instance = builder(code)?;
			instance.set_context_storage(context);
			Ok(instance)
		})?;
		Ok(())
	}

	/// Run the configured substitution on the import path, if any applies.
	/// Returns whether the block's runtime binding was substituted.
	fn apply_configured_substitution(
		&self,
		block_hash: Hash,
		state: &TrieState,
	) -> Result<bool, Error> {
		if !self.code_substitutes.contains_key(&block_hash) {
			return Ok(false)
		}
		let Some(builder) = self.runtime_builder.clone() else {
			log::warn!(
				target: LOG_TARGET,
				"code substitute configured for {block_hash:?} but no runtime builder is set",
			);
			return Ok(false)
		};
		self.handle_code_substitution(block_hash, state, |code| builder(code))?;
		Ok(true)
	}

	/// Storage values of `keys` changed along the canonical chain from `from`
	/// to `to` (inclusive); `to` defaults to the best block. Each block's
	/// entry lists only the keys whose value differs from the parent block's
	/// state.
	pub fn query_storage(
		&self,
		from: Hash,
		to: Option<Hash>,
		keys: &[Vec<u8>],
	) -> Result<HashMap<Hash, QueryKeyValueChanges>, Error> {
		let to = to.unwrap_or_else(|| self.block_state.best_block_hash());
		let chain = self.block_state.subchain(&from, &to)?;

		let mut changes_per_block = HashMap::new();
		for hash in chain {
			let changes = self.query_storage_at(hash, keys)?;
			changes_per_block.insert(hash, changes);
		}
		Ok(changes_per_block)
	}

	/// The subset of `keys` whose value at `block` differs from the parent
	/// block's state, as hex pairs. Deleted keys are not reported.
	pub fn query_storage_at(
		&self,
		block: Hash,
		keys: &[Vec<u8>],
	) -> Result<QueryKeyValueChanges, Error> {
		let header = self.block_state.get_header(&block)?;
		let state = self.storage_state.trie_state(Some(&header.state_root))?;
		let parent_state = if self.block_state.has_block(&header.parent_hash) {
			self.block_state
				.get_block_state_root(&header.parent_hash)
				.ok()
				.and_then(|root| self.storage_state.trie_state(Some(&root)).ok())
		} else {
			None
		};

		let mut changes = QueryKeyValueChanges::new();
		for key in keys {
			let Some(value) = state.get(key) else { continue };
			let previous = parent_state.as_ref().and_then(|parent| parent.get(key));
			if previous.as_deref() != Some(&value[..]) {
				changes
					.insert(array_bytes::bytes2hex("0x", key), array_bytes::bytes2hex("0x", &value));
			}
		}
		Ok(changes)
	}

	/// A read proof for `keys` at the given block, defaulting to the best
	/// block. Returns the block the proof was generated at.
	pub fn get_read_proof_at(
		&self,
		block: Option<Hash>,
		keys: &[Vec<u8>],
	) -> Result<(Hash, Vec<Vec<u8>>), Error> {
		let block = block.unwrap_or_else(|| self.block_state.best_block_hash());
		let state_root = self.block_state.get_block_state_root(&block)?;
		let proof = self.storage_state.generate_trie_proof(&state_root, keys)?;
		Ok((block, proof))
	}

	/// The runtime version at the given block, defaulting to the best block.
	pub fn get_runtime_version(&self, at: Option<&Hash>) -> Result<Version, Error> {
		Ok(self.block_state.get_runtime(at)?.version()?)
	}

	/// The runtime metadata at the given block, defaulting to the best block.
	pub fn get_metadata(&self, at: Option<&Hash>) -> Result<Vec<u8>, Error> {
		Ok(self.block_state.get_runtime(at)?.metadata()?)
	}

	/// Decode a session key blob through the head runtime.
	pub fn decode_session_keys(&self, encoded: &[u8]) -> Result<Vec<u8>, Error> {
		Ok(self.block_state.get_runtime(None)?.decode_session_keys(encoded)?)
	}

	/// Insert a keypair into the named keystore.
	pub fn insert_key(&self, pair: Pair, keystore_type: &str) -> Result<(), Error> {
		Ok(self.keystore.insert(keystore_type, pair)?)
	}

	/// Whether the named keystore holds the public key.
	pub fn has_key(&self, public_key_hex: &str, keystore_type: &str) -> Result<bool, Error> {
		Ok(self.keystore.has_key(public_key_hex, keystore_type)?)
	}

	/// The block state this service operates on.
	pub fn block_state(&self) -> &Arc<BlockState> {
		&self.block_state
	}

	/// The transaction pool this service maintains.
	pub fn transaction_state(&self) -> &Arc<TransactionState> {
		&self.transaction_state
	}
}
