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

//! The chain state the core service operates on: the block tree with its
//! runtime bindings, the per-root storage view and the transaction pool.

pub mod block_state;
pub mod registry;
pub mod storage_state;
pub mod transaction_state;

pub use block_state::BlockState;
pub use registry::RuntimeRegistry;
pub use storage_state::StorageState;
pub use transaction_state::{TransactionState, ValidTransaction};

use weft_primitives::Hash;

/// State errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	/// No header stored for the block.
	#[error("header not found for block {0}")]
	HeaderNotFound(Hash),
	/// No body stored for the block.
	#[error("body not found for block {0}")]
	BodyNotFound(Hash),
	/// No trie state stored under the root.
	#[error("no state stored under root {0}")]
	StateNotFound(Hash),
	/// Nothing has been stored yet.
	#[error("no trie state has been stored")]
	NoStoredState,
	/// No runtime bound to the block.
	#[error("no runtime registered for block {0}")]
	RuntimeNotFound(Hash),
	/// The `:code` entry is missing from the state.
	#[error("no :code entry in state")]
	CodeNotFound,
	/// A block tree operation failed.
	#[error(transparent)]
	Blocktree(#[from] weft_blocktree::Error),
	/// A runtime call failed.
	#[error(transparent)]
	Runtime(#[from] weft_runtime::Error),
	/// A trie encoding operation failed.
	#[error(transparent)]
	Trie(#[from] weft_trie::Error),
}
