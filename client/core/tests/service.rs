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

//! Core service scenarios: imports, reorgs, pool upkeep, storage queries,
//! runtime changes and key management.

use assert_matches::assert_matches;
use parking_lot::Mutex;
use std::{collections::HashMap, sync::Arc};
use weft_core::{Config, Error, Service};
use weft_keystore::{Keystore, Pair, Scheme};
use weft_network::{BlockAnnounce, BlockAnnouncer, Network, PeerId};
use weft_primitives::{
	transaction_validity::{InvalidTransaction, TransactionValidityError, Validity},
	well_known_keys, Block, Body, Digest, Extrinsic, Hash, Header,
};
use weft_runtime::{
	mock::{MockRuntime, DEFAULT_CODE},
	RuntimeInstance,
};
use weft_state::{BlockState, StorageState, TransactionState, ValidTransaction};
use weft_telemetry::{RecordingTelemetry, TelemetryMessage};
use weft_trie::TrieState;

struct RecordingNetwork {
	gossiped: Mutex<Vec<(String, Vec<u8>)>>,
}

impl RecordingNetwork {
	fn new() -> Arc<Self> {
		Arc::new(Self { gossiped: Mutex::new(Vec::new()) })
	}
}

impl Network for RecordingNetwork {
	fn gossip_message(&self, protocol: &str, data: Vec<u8>) {
		self.gossiped.lock().push((protocol.to_string(), data));
	}

	fn send_message(
		&self,
		_peer: PeerId,
		_protocol: &str,
		_data: Vec<u8>,
	) -> Result<(), weft_network::Error> {
		Ok(())
	}

	fn drop_peer(&self, _peer: PeerId) {}
}

struct RecordingAnnouncer {
	announced: Mutex<Vec<BlockAnnounce>>,
}

impl RecordingAnnouncer {
	fn new() -> Arc<Self> {
		Arc::new(Self { announced: Mutex::new(Vec::new()) })
	}
}

impl BlockAnnouncer for RecordingAnnouncer {
	fn announce_block(&self, announce: BlockAnnounce) {
		self.announced.lock().push(announce);
	}
}

struct TestContext {
	service: Service,
	block_state: Arc<BlockState>,
	storage_state: Arc<StorageState>,
	transaction_state: Arc<TransactionState>,
	network: Arc<RecordingNetwork>,
	announcer: Arc<RecordingAnnouncer>,
	telemetry: Arc<RecordingTelemetry>,
	genesis_header: Header,
	genesis_state: TrieState,
}

fn genesis_state() -> TrieState {
	let mut state = TrieState::new();
	state.set(well_known_keys::CODE, DEFAULT_CODE.to_vec());
	state
}

fn test_service_with(
	genesis_runtime: RuntimeInstance,
	code_substitutes: HashMap<Hash, Vec<u8>>,
) -> TestContext {
	let telemetry = RecordingTelemetry::new();
	let genesis_state = genesis_state();
	let genesis_header = Header::new(
		Hash::zero(),
		0,
		genesis_state.root(),
		Hash::zero(),
		Digest::default(),
	);

	let block_state = Arc::new(BlockState::new(genesis_header.clone(), telemetry.clone()));
	block_state.store_runtime(block_state.genesis_hash(), genesis_runtime);

	let storage_state = Arc::new(StorageState::new());
	storage_state.store_trie(genesis_state.clone(), Some(&genesis_header));

	let transaction_state = Arc::new(TransactionState::new(telemetry.clone()));
	let network = RecordingNetwork::new();
	let announcer = RecordingAnnouncer::new();

	let service = Service::new(Config {
		block_state: block_state.clone(),
		storage_state: storage_state.clone(),
		transaction_state: transaction_state.clone(),
		network: network.clone(),
		announcer: announcer.clone(),
		keystore: Arc::new(Keystore::new()),
		telemetry: telemetry.clone(),
		code_substitutes,
		runtime_builder: None,
	});

	TestContext {
		service,
		block_state,
		storage_state,
		transaction_state,
		network,
		announcer,
		telemetry,
		genesis_header,
		genesis_state,
	}
}

fn test_service() -> TestContext {
	test_service_with(MockRuntime::new().instance(), HashMap::new())
}

/// A block on `parent` carrying `body`; `marker` disambiguates forks with
/// equal parent and number.
fn block_on(parent: &Header, body: Body, state_root: Hash, marker: u8) -> Block {
	let header = Header::new(
		parent.hash(),
		parent.number + 1,
		state_root,
		Hash::repeat_byte(marker),
		Digest::default(),
	);
	Block::new(header, body)
}

fn tx(bytes: &[u8], priority: u64) -> ValidTransaction {
	ValidTransaction::new(Extrinsic(bytes.to_vec()), Validity::from_priority(priority))
}

#[test]
fn produced_blocks_are_announced_as_best() {
	// given
	let context = test_service();
	let block =
		block_on(&context.genesis_header, Body::default(), context.genesis_state.root(), 0);

	// when
	context.service.handle_block_produced(&block, context.genesis_state.clone()).unwrap();

	// then
	let announced = context.announcer.announced.lock().clone();
	assert_eq!(announced, vec![BlockAnnounce::from_header(&block.header, true)]);
	assert_eq!(context.block_state.best_block_hash(), block.hash());
}

#[test]
fn reorg_round_trip_parks_the_forked_extrinsic_exactly_once() {
	// given: a linear chain [g, 1..5] and a fork [2, 3', 4'] where 4'
	// carries an extrinsic.
	let context = test_service();
	let extrinsic = Extrinsic(b"nootwashere".to_vec());

	let mut chain = vec![context.genesis_header.clone()];
	for number in 1..=5u64 {
		let block = block_on(chain.last().unwrap(), Body::default(), Hash::zero(), 0);
		context.block_state.add_block_with_arrival_time(&block, number).unwrap();
		chain.push(block.header);
	}

	let fork_3 = block_on(&chain[2], Body::default(), Hash::zero(), 0xf1);
	context.block_state.add_block_with_arrival_time(&fork_3, 10).unwrap();
	let fork_4 = block_on(
		&fork_3.header,
		Body(vec![extrinsic.clone()]),
		Hash::zero(),
		0xf1,
	);
	context.block_state.add_block_with_arrival_time(&fork_4, 11).unwrap();

	// when: switching off the fork and back onto it.
	context.service.handle_chain_reorg(fork_4.hash(), chain[5].hash()).unwrap();
	context.service.handle_chain_reorg(chain[5].hash(), fork_4.hash()).unwrap();

	// then: the forked extrinsic sits in pending, exactly once.
	assert_eq!(context.transaction_state.pending_len(), 1);
	assert!(context.transaction_state.exists_in_pending(&extrinsic));
	assert_eq!(context.transaction_state.queue_len(), 0);
}

#[test]
fn reorg_to_a_direct_descendant_is_a_no_op_for_the_pool() {
	let context = test_service();
	let block_1 =
		block_on(&context.genesis_header, Body::default(), Hash::zero(), 0);
	context.block_state.add_block_with_arrival_time(&block_1, 1).unwrap();
	let block_2 = block_on(&block_1.header, Body::default(), Hash::zero(), 0);
	context.block_state.add_block_with_arrival_time(&block_2, 2).unwrap();

	context.service.handle_chain_reorg(block_1.hash(), block_2.hash()).unwrap();

	assert_eq!(context.transaction_state.pending_len(), 0);
	assert_eq!(context.transaction_state.queue_len(), 0);
}

#[test]
fn reorg_across_unknown_blocks_is_disjoint() {
	let context = test_service();
	let best = context.block_state.best_block_hash();

	let result = context.service.handle_chain_reorg(Hash::repeat_byte(0xde), best);

	assert_matches!(result, Err(Error::DisjointChains { .. }));
}

#[test]
fn maintenance_with_an_empty_block_keeps_the_queue_intact() {
	// given
	let context = test_service();
	for (bytes, priority) in [(b"a", 1u64), (b"b", 4), (b"c", 2), (b"d", 17), (b"e", 2)] {
		context.transaction_state.add_to_queue(tx(bytes, priority));
	}

	// when
	let block = block_on(&context.genesis_header, Body::default(), Hash::zero(), 0);
	context.service.maintain_transaction_pool(&block);

	// then: priority order, ties by insertion order.
	let order: Vec<Vec<u8>> = std::iter::from_fn(|| context.transaction_state.pop())
		.map(|transaction| transaction.extrinsic.0.clone())
		.collect();
	let expected: Vec<Vec<u8>> =
		[b"d", b"b", b"c", b"e", b"a"].iter().map(|bytes| bytes.to_vec()).collect();
	assert_eq!(order, expected);
}

#[test]
fn maintenance_evicts_included_extrinsics() {
	// given
	let context = test_service();
	context.transaction_state.add_to_queue(tx(b"a", 1));
	context.transaction_state.add_to_queue(tx(b"b", 4));

	// when
	let block = block_on(
		&context.genesis_header,
		Body::from_extrinsics(vec![b"a".to_vec()]),
		Hash::zero(),
		0,
	);
	context.service.maintain_transaction_pool(&block);

	// then
	let remaining: Vec<Vec<u8>> = std::iter::from_fn(|| context.transaction_state.pop())
		.map(|transaction| transaction.extrinsic.0.clone())
		.collect();
	assert_eq!(remaining, vec![b"b".to_vec()]);
}

#[test]
fn query_storage_reports_only_the_keys_changed_per_block() {
	// given: three blocks, each writing one fresh key.
	let context = test_service();
	let keys = [b"transfer.to".to_vec(), b"transfer.from".to_vec(), b"transfer.value".to_vec()];
	let values: [&[u8]; 3] = [b"some-address", b"another-address", b"value-gigamegablaster"];

	let mut parent = context.genesis_header.clone();
	let mut hashes = Vec::new();
	for (index, (key, value)) in keys.iter().zip(values).enumerate() {
		let mut state = TrieState::new();
		state.set(key, value.to_vec());
		let block = block_on(&parent, Body::default(), state.root(), 0);
		context.storage_state.store_trie(state, Some(&block.header));
		context
			.block_state
			.add_block_with_arrival_time(&block, index as u64 + 1)
			.unwrap();
		hashes.push(block.hash());
		parent = block.header;
	}

	// when: the whole range up to the best block.
	let changes = context.service.query_storage(hashes[0], None, &keys).unwrap();

	// then: one entry per block, each naming only its own key.
	assert_eq!(changes.len(), 3);
	for (index, hash) in hashes.iter().enumerate() {
		let entry = &changes[hash];
		assert_eq!(entry.len(), 1, "block {index} reports exactly its own key");
		assert_eq!(
			entry[&array_bytes::bytes2hex("0x", &keys[index])],
			array_bytes::bytes2hex("0x", values[index]),
		);
	}

	// when: an explicit subrange.
	let changes = context.service.query_storage(hashes[1], Some(hashes[2]), &keys).unwrap();

	// then
	assert_eq!(changes.len(), 2);
	assert!(changes.contains_key(&hashes[1]));
	assert!(changes.contains_key(&hashes[2]));
}

#[test]
fn unchanged_code_shares_the_runtime_across_an_import() {
	// given
	let context = test_service();
	let genesis_runtime = context.block_state.get_runtime(None).unwrap();

	// when: the imported block leaves :code untouched.
	let block =
		block_on(&context.genesis_header, Body::default(), context.genesis_state.root(), 0);
	context.service.handle_block_produced(&block, context.genesis_state.clone()).unwrap();

	// then
	let bound = context.block_state.get_runtime(Some(&block.hash())).unwrap();
	assert!(Arc::ptr_eq(&bound, &genesis_runtime));
}

#[test]
fn changed_code_upgrades_the_runtime_without_touching_the_parent() {
	// given
	let context = test_service();
	let genesis_runtime = context.block_state.get_runtime(None).unwrap();
	let code_hash_before = genesis_runtime.code_hash();

	let block_1 =
		block_on(&context.genesis_header, Body::default(), context.genesis_state.root(), 0);
	context.service.handle_block_produced(&block_1, context.genesis_state.clone()).unwrap();

	// when: the next block ships new code.
	let mut upgraded_state = context.genesis_state.clone();
	upgraded_state.set(well_known_keys::CODE, b"updated-runtime".to_vec());
	let block_2 = block_on(&block_1.header, Body::default(), upgraded_state.root(), 0);
	context.service.handle_block_produced(&block_2, upgraded_state).unwrap();

	// then: the new binding differs, earlier bindings are untouched.
	let upgraded = context.block_state.get_runtime(Some(&block_2.hash())).unwrap();
	assert_ne!(upgraded.code_hash(), code_hash_before);
	let old = context.block_state.get_runtime(Some(&block_1.hash())).unwrap();
	assert_eq!(old.code_hash(), code_hash_before);
	assert!(context
		.telemetry
		.messages()
		.iter()
		.any(|message| matches!(message, TelemetryMessage::RuntimeUpgraded { .. })));
}

#[test]
fn code_substitution_leaves_the_parent_code_hash_alone() {
	// given: a substitution configured for a known-bad historical block.
	let bad_block = Hash::repeat_byte(0x86);
	let substitutes = HashMap::from([(bad_block, b"fixed-code".to_vec())]);
	let context = test_service_with(MockRuntime::new().instance(), substitutes);

	let parent_runtime = context.block_state.get_runtime(None).unwrap();
	context.block_state.store_runtime(bad_block, parent_runtime.clone());
	let code_hash_before = parent_runtime.code_hash();

	// when
	context
		.service
		.handle_code_substitution(bad_block, &TrieState::new(), |code| {
			Ok(MockRuntime::from_code(code, 9).instance())
		})
		.unwrap();

	// then
	assert_eq!(parent_runtime.code_hash(), code_hash_before);
	assert_eq!(context.block_state.registry().code_substituted_block_hash(), Some(bad_block));
	let bound = context.block_state.get_runtime(Some(&bad_block)).unwrap();
	assert!(!Arc::ptr_eq(&bound, &parent_runtime));
}

#[test]
fn substitution_is_skipped_for_unconfigured_blocks() {
	let context = test_service();

	context
		.service
		.handle_code_substitution(Hash::repeat_byte(1), &TrieState::new(), |_| {
			panic!("builder must not run for unconfigured blocks")
		})
		.unwrap();

	assert_eq!(context.block_state.registry().code_substituted_block_hash(), None);
}

#[test]
fn submitted_extrinsics_are_pooled_and_gossiped() {
	// given
	let context = test_service();

	// when
	context.service.handle_submitted_extrinsic(Extrinsic(b"noot".to_vec())).unwrap();

	// then
	assert_eq!(context.transaction_state.queue_len(), 1);
	let gossiped = context.network.gossiped.lock().clone();
	assert_eq!(gossiped.len(), 1);
	assert!(gossiped[0].0.ends_with("/transactions/1"));
}

#[test]
fn invalid_submissions_are_rejected_and_not_gossiped() {
	// given
	let runtime = MockRuntime::new().given_validity(
		b"bad",
		Err(TransactionValidityError::Invalid(InvalidTransaction::BadProof)),
	);
	let context = test_service_with(runtime.instance(), HashMap::new());

	// when
	let result = context.service.handle_submitted_extrinsic(Extrinsic(b"bad".to_vec()));

	// then
	assert_matches!(result, Err(Error::InvalidTransaction(_)));
	assert_eq!(context.transaction_state.queue_len(), 0);
	assert!(context.network.gossiped.lock().is_empty());
}

#[test]
fn revalidation_sorts_pending_into_queue_drops_and_keeps() {
	// given: one extrinsic of each fate.
	let runtime = MockRuntime::new()
		.given_validity(
			b"fatal",
			Err(TransactionValidityError::Invalid(InvalidTransaction::BadProof)),
		)
		.given_validity(
			b"future",
			Err(TransactionValidityError::Invalid(InvalidTransaction::Future)),
		);
	let context = test_service_with(runtime.instance(), HashMap::new());
	for bytes in [&b"good"[..], b"fatal", b"future"] {
		context
			.transaction_state
			.add_to_pending(ValidTransaction::new(Extrinsic(bytes.to_vec()), Validity::default()));
	}

	// when
	context.service.revalidate_pending().unwrap();

	// then
	assert_eq!(context.transaction_state.queue_len(), 1);
	assert_eq!(
		context.transaction_state.pop().unwrap().extrinsic,
		Extrinsic(b"good".to_vec()),
	);
	assert_eq!(context.transaction_state.pending_len(), 1);
	assert!(context.transaction_state.exists_in_pending(&Extrinsic(b"future".to_vec())));
	assert!(context.telemetry.messages().iter().any(|message| matches!(
		message,
		TelemetryMessage::TxPoolDropped { extrinsic } if *extrinsic == Extrinsic(b"fatal".to_vec()).hash()
	)));
}

#[test]
fn insert_key_checks_store_name_and_scheme() {
	let context = test_service();

	// An unknown store is refused.
	let result = context.service.insert_key(Pair::generate(Scheme::Sr25519), "some-invalid-type");
	assert_matches!(result, Err(Error::Keystore(weft_keystore::Error::InvalidKeystoreName)));

	// A valid store with the wrong scheme is refused, naming both schemes.
	let error =
		context.service.insert_key(Pair::generate(Scheme::Sr25519), "gran").unwrap_err();
	assert_eq!(
		error.to_string(),
		"key type not supported, passed key type: sr25519, acceptable key type: ed25519",
	);

	// A valid store with the right scheme succeeds and the key is findable.
	let pair = Pair::generate(Scheme::Sr25519);
	let public = pair.public_hex();
	context.service.insert_key(pair, "acco").unwrap();
	assert!(context.service.has_key(&public, "acco").unwrap());
	assert!(!context.service.has_key(&public, "babe").unwrap());
	assert_matches!(
		context.service.has_key(&public, "xxxx"),
		Err(Error::Keystore(weft_keystore::Error::InvalidKeystoreName))
	);
}

#[test]
fn decode_session_keys_delegates_to_the_head_runtime() {
	let context = test_service();
	let decoded = context.service.decode_session_keys(&[1, 2, 3]).unwrap();
	assert_eq!(decoded, vec![1, 2, 3]);
}

#[test]
fn read_proofs_default_to_the_best_block() {
	// given
	let context = test_service();

	// when
	let (at, proof) = context
		.service
		.get_read_proof_at(None, &[well_known_keys::CODE.to_vec()])
		.unwrap();

	// then: resolved at the best block with one proof element for :code.
	assert_eq!(at, context.block_state.best_block_hash());
	assert_eq!(proof.len(), 1);

	// An unknown block fails instead of silently proving nothing.
	assert!(context
		.service
		.get_read_proof_at(Some(Hash::repeat_byte(0x99)), &[well_known_keys::CODE.to_vec()])
		.is_err());
}

#[test]
fn runtime_version_and_metadata_resolve_through_the_registry() {
	let runtime = MockRuntime::new().with_metadata(vec![0xab; 32]);
	let context = test_service_with(runtime.instance(), HashMap::new());

	let version = context.service.get_runtime_version(None).unwrap();
	assert_eq!(version.spec_name, "weft-mock");
	assert_eq!(context.service.get_metadata(None).unwrap(), vec![0xab; 32]);

	let absent = Hash::repeat_byte(0x77);
	assert!(context.service.get_runtime_version(Some(&absent)).is_err());
}
