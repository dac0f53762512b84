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

//! The interface of a runtime instance.
//!
//! A runtime is a WebAssembly blob authenticated by the block it is
//! registered against. The executor that instantiates and runs the blob is a
//! collaborator; the host drives instances exclusively through [`Runtime`].
//!
//! Read calls (`version`, `metadata`, `validate_transaction`,
//! `decode_session_keys`) must be reentrant: the host issues them
//! concurrently from several threads. Only block execution requires exclusive
//! context storage, which callers serialize per instance.

use codec::{Decode, Encode};
use std::sync::Arc;
use weft_primitives::{transaction_validity::TransactionValidity, Hash};
use weft_trie::TrieState;

#[cfg(any(test, feature = "test-helpers"))]
pub mod mock;

/// Version information of a runtime.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct Version {
	/// Identifies the different runtimes.
	pub spec_name: String,
	/// Name of the implementation of the spec.
	pub impl_name: String,
	/// Version of the authorship interface.
	pub authoring_version: u32,
	/// Version of the runtime specification; bumped on every logic change.
	pub spec_version: u32,
	/// Version of the implementation of the specification.
	pub impl_version: u32,
	/// Version of the transaction format.
	pub transaction_version: u32,
}

/// Errors from driving a runtime instance.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	/// The call trapped or the executor rejected it.
	#[error("runtime execution failed: {0}")]
	ExecutionFailed(String),
	/// The call exceeded its execution budget.
	#[error("runtime call exceeded its execution budget")]
	Timeout,
	/// The call was cancelled by the host shutting down.
	#[error("runtime call was cancelled")]
	Cancelled,
	/// An instance was requested from an empty code blob.
	#[error("runtime code blob is empty")]
	CodeEmpty,
}

/// A shared handle to a runtime instance.
pub type RuntimeInstance = Arc<dyn Runtime>;

/// A runtime instance as seen by the host.
pub trait Runtime: Send + Sync {
	/// The version of this runtime.
	fn version(&self) -> Result<Version, Error>;

	/// The SCALE-encoded runtime metadata.
	fn metadata(&self) -> Result<Vec<u8>, Error>;

	/// Validate a single extrinsic against the instance's context storage.
	fn validate_transaction(&self, extrinsic: &[u8]) -> Result<TransactionValidity, Error>;

	/// Decode a concatenated session key blob into its raw public keys.
	fn decode_session_keys(&self, encoded: &[u8]) -> Result<Vec<u8>, Error>;

	/// The blake2b-256 hash of the code blob backing this instance.
	fn code_hash(&self) -> Hash;

	/// Swap in the storage the next calls execute against.
	///
	/// Callers must serialize block execution against a given instance.
	fn set_context_storage(&self, state: TrieState);

	/// A new instance sharing this one's configuration but running `code`.
	fn clone_with_code(&self, code: &[u8]) -> Result<RuntimeInstance, Error>;
}
