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

//! Trie node encoding and the in-memory trie state.
//!
//! The node header codec is the bit-exact format committed to by every state
//! root; the persistent Merkle-Patricia database sits behind a collaborator
//! interface and reuses this codec.

pub mod nibbles;
pub mod node;
pub mod state;

pub use node::{decode_header, encode_header, NodeKind};
pub use state::TrieState;

/// Errors produced by the node codec.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	/// The partial key cannot be represented in the header's extended length.
	#[error("partial key length cannot be larger than or equal to 2^16: {0}")]
	PartialKeyTooBig(usize),
	/// The header byte carries the reserved `00` variant bits.
	#[error("node header has an unknown variant: {0:#010b}")]
	UnknownNodeVariant(u8),
	/// An I/O error from the underlying sink or source, surfaced verbatim.
	#[error(transparent)]
	Io(#[from] std::io::Error),
}
