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

//! A scripted in-process runtime for tests.

use crate::{Error, Runtime, RuntimeInstance, Version};
use parking_lot::Mutex;
use std::{collections::HashMap, sync::Arc};
use weft_primitives::{
	hashing::blake2_256,
	transaction_validity::{TransactionValidity, Validity},
	Hash,
};
use weft_trie::TrieState;

/// The code blob a default mock pretends to run.
pub const DEFAULT_CODE: &[u8] = b"mock-runtime-code-v1";

/// An in-process [`Runtime`] with scripted validity results.
///
/// Unscripted extrinsics validate fine with priority 1; validity for specific
/// byte strings can be pinned with [`MockRuntime::given_validity`].
pub struct MockRuntime {
	code_hash: Hash,
	version: Version,
	metadata: Vec<u8>,
	validity: HashMap<Vec<u8>, TransactionValidity>,
	context: Mutex<Option<TrieState>>,
}

impl MockRuntime {
	/// A mock running [`DEFAULT_CODE`].
	pub fn new() -> Self {
		Self::from_code(DEFAULT_CODE, 264)
	}

	/// A mock pretending to run `code` at the given spec version.
	pub fn from_code(code: &[u8], spec_version: u32) -> Self {
		Self {
			code_hash: Hash::from(blake2_256(code)),
			version: Version {
				spec_name: "weft-mock".into(),
				impl_name: "weft-mock".into(),
				authoring_version: 1,
				spec_version,
				impl_version: 1,
				transaction_version: 1,
			},
			metadata: Vec::new(),
			validity: HashMap::new(),
			context: Mutex::new(None),
		}
	}

	/// Pin the validity result for an extrinsic byte string.
	pub fn given_validity(mut self, extrinsic: &[u8], validity: TransactionValidity) -> Self {
		self.validity.insert(extrinsic.to_vec(), validity);
		self
	}

	/// Set the metadata blob returned by [`Runtime::metadata`].
	pub fn with_metadata(mut self, metadata: Vec<u8>) -> Self {
		self.metadata = metadata;
		self
	}

	/// Finish building and share the instance.
	pub fn instance(self) -> RuntimeInstance {
		Arc::new(self)
	}

	/// The storage last supplied via [`Runtime::set_context_storage`].
	pub fn context_storage(&self) -> Option<TrieState> {
		self.context.lock().clone()
	}
}

impl Default for MockRuntime {
	fn default() -> Self {
		Self::new()
	}
}

impl Runtime for MockRuntime {
	fn version(&self) -> Result<Version, Error> {
		Ok(self.version.clone())
	}

	fn metadata(&self) -> Result<Vec<u8>, Error> {
		Ok(self.metadata.clone())
	}

	fn validate_transaction(&self, extrinsic: &[u8]) -> Result<TransactionValidity, Error> {
		Ok(self
			.validity
			.get(extrinsic)
			.cloned()
			.unwrap_or_else(|| Ok(Validity::from_priority(1))))
	}

	fn decode_session_keys(&self, encoded: &[u8]) -> Result<Vec<u8>, Error> {
		Ok(encoded.to_vec())
	}

	fn code_hash(&self) -> Hash {
		self.code_hash
	}

	fn set_context_storage(&self, state: TrieState) {
		*self.context.lock() = Some(state);
	}

	fn clone_with_code(&self, code: &[u8]) -> Result<RuntimeInstance, Error> {
		if code.is_empty() {
			return Err(Error::CodeEmpty)
		}
		let mut upgraded = Self::from_code(code, self.version.spec_version + 1);
		upgraded.validity = self.validity.clone();
		upgraded.metadata = self.metadata.clone();
		Ok(Arc::new(upgraded))
	}
}
