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

//! The core service: the seam between block production, the chain state and
//! the gossip layer.
//!
//! Inbound blocks get appended to the tree, checked for runtime upgrades and
//! code substitutions, reconciled against the transaction pool across head
//! changes, and announced to peers. Submitted extrinsics get validated,
//! pooled and gossiped. Storage queries and proofs resolve through the
//! per-root storage view.

pub mod service;

pub use service::{Config, QueryKeyValueChanges, RuntimeBuilder, Service};

use weft_primitives::{transaction_validity::TransactionValidityError, Hash};

const LOG_TARGET: &str = "core";

/// Core service errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	/// The two heads of a reorg share no ancestor in the tree; the head
	/// switch must not be committed.
	#[error("cannot reorg between disjoint chains {previous:?} and {best:?}")]
	DisjointChains {
		/// The head being retired.
		previous: Hash,
		/// The head that could not be committed.
		best: Hash,
	},
	/// The runtime rejected a submitted extrinsic.
	#[error("invalid transaction: {0}")]
	InvalidTransaction(TransactionValidityError),
	/// A chain state operation failed.
	#[error(transparent)]
	State(#[from] weft_state::Error),
	/// A runtime call failed.
	#[error(transparent)]
	Runtime(#[from] weft_runtime::Error),
	/// A keystore operation failed.
	#[error(transparent)]
	Keystore(#[from] weft_keystore::Error),
	/// A network operation failed.
	#[error(transparent)]
	Network(#[from] weft_network::Error),
}
