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

//! The transaction pool.
//!
//! Two disjoint sets: the ready `queue`, ordered by descending priority with
//! ties broken by insertion order, and `pending`, the holding area for
//! extrinsics that still need (re)validation, such as arrivals from a
//! discarded branch. Both sets are independently locked and every operation
//! is thread-safe.

use parking_lot::Mutex;
use std::{
	cmp::Reverse,
	collections::{BTreeMap, HashMap},
	sync::Arc,
};
use weft_primitives::{transaction_validity::Validity, Extrinsic, Hash};
use weft_telemetry::{TelemetryHandle, TelemetryMessage};

const LOG_TARGET: &str = "txpool";

/// A validated transaction ready to live in the pool.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidTransaction {
	/// The raw extrinsic.
	pub extrinsic: Extrinsic,
	/// The validity the runtime reported for it.
	pub validity: Validity,
}

impl ValidTransaction {
	/// Create a new valid transaction.
	pub fn new(extrinsic: Extrinsic, validity: Validity) -> Self {
		Self { extrinsic, validity }
	}
}

/// Ascending order on this key yields descending priority, then insertion
/// order.
type QueueKey = (Reverse<u64>, u64);

#[derive(Default)]
struct Queue {
	by_order: BTreeMap<QueueKey, Arc<ValidTransaction>>,
	by_hash: HashMap<Hash, QueueKey>,
	next_insertion_id: u64,
}

/// The transaction pool.
pub struct TransactionState {
	queue: Mutex<Queue>,
	pending: Mutex<HashMap<Hash, Arc<ValidTransaction>>>,
	telemetry: TelemetryHandle,
}

impl TransactionState {
	/// An empty pool.
	pub fn new(telemetry: TelemetryHandle) -> Self {
		Self {
			queue: Mutex::new(Queue::default()),
			pending: Mutex::new(HashMap::new()),
			telemetry,
		}
	}

	/// Put a validated transaction into the ready queue, replacing any earlier
	/// entry for the same extrinsic. Returns the extrinsic hash.
	pub fn add_to_queue(&self, transaction: ValidTransaction) -> Hash {
		let hash = transaction.extrinsic.hash();
		let mut queue = self.queue.lock();
		if let Some(key) = queue.by_hash.remove(&hash) {
			queue.by_order.remove(&key);
		}
		let key = (Reverse(transaction.validity.priority), queue.next_insertion_id);
		queue.next_insertion_id += 1;
		queue.by_order.insert(key, Arc::new(transaction));
		queue.by_hash.insert(hash, key);
		drop(queue);

		self.notify_import();
		hash
	}

	/// Take the highest-priority ready transaction.
	pub fn pop(&self) -> Option<Arc<ValidTransaction>> {
		let mut queue = self.queue.lock();
		let (_, transaction) = queue.by_order.pop_first()?;
		queue.by_hash.remove(&transaction.extrinsic.hash());
		Some(transaction)
	}

	/// The highest-priority ready transaction without removing it.
	pub fn peek(&self) -> Option<Arc<ValidTransaction>> {
		self.queue.lock().by_order.first_key_value().map(|(_, tx)| tx.clone())
	}

	/// Park a transaction for (re)validation. A duplicate of an already
	/// parked extrinsic is ignored. Returns the extrinsic hash.
	pub fn add_to_pending(&self, transaction: ValidTransaction) -> Hash {
		let hash = transaction.extrinsic.hash();
		let inserted = {
			let mut pending = self.pending.lock();
			match pending.entry(hash) {
				std::collections::hash_map::Entry::Occupied(_) => false,
				std::collections::hash_map::Entry::Vacant(entry) => {
					entry.insert(Arc::new(transaction));
					true
				},
			}
		};
		if inserted {
			self.notify_import();
		}
		hash
	}

	/// All parked transactions.
	pub fn pending(&self) -> Vec<Arc<ValidTransaction>> {
		self.pending.lock().values().cloned().collect()
	}

	/// Whether the extrinsic is parked.
	pub fn exists_in_pending(&self, extrinsic: &Extrinsic) -> bool {
		self.pending.lock().contains_key(&extrinsic.hash())
	}

	/// Un-park an extrinsic.
	pub fn remove_from_pending(&self, extrinsic: &Extrinsic) -> Option<Arc<ValidTransaction>> {
		self.pending.lock().remove(&extrinsic.hash())
	}

	/// Drop an extrinsic from the ready queue.
	pub fn remove_from_queue(&self, extrinsic: &Extrinsic) {
		let mut queue = self.queue.lock();
		if let Some(key) = queue.by_hash.remove(&extrinsic.hash()) {
			queue.by_order.remove(&key);
		}
	}

	/// Drop an extrinsic from both sets.
	pub fn remove_extrinsic(&self, extrinsic: &Extrinsic) {
		self.remove_from_queue(extrinsic);
		self.pending.lock().remove(&extrinsic.hash());
	}

	/// Number of ready transactions.
	pub fn queue_len(&self) -> usize {
		self.queue.lock().by_order.len()
	}

	/// Number of parked transactions.
	pub fn pending_len(&self) -> usize {
		self.pending.lock().len()
	}

	fn notify_import(&self) {
		let ready = self.queue_len();
		let pending = self.pending_len();
		log::trace!(target: LOG_TARGET, "pool changed: {ready} ready, {pending} pending");
		self.telemetry.send_message(TelemetryMessage::TxPoolImport { ready, pending });
	}
}
