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

//! The block header.

use crate::{digest::Digest, hashing::blake2_256, BlockNumber, Hash};
use codec::{Decode, Encode};

/// A block header.
///
/// The number is compact-encoded on the wire; everything else encodes as-is.
/// The header hash is blake2b-256 over the SCALE encoding and is recomputed
/// on demand.
#[derive(Clone, Debug, Default, PartialEq, Eq, Encode, Decode)]
pub struct Header {
	/// The parent hash.
	pub parent_hash: Hash,
	/// The block number.
	#[codec(compact)]
	pub number: BlockNumber,
	/// The state trie merkle root.
	pub state_root: Hash,
	/// The merkle root of the extrinsics.
	pub extrinsics_root: Hash,
	/// A chain-specific digest of data useful for light clients or referencing
	/// auxiliary data.
	pub digest: Digest,
}

impl Header {
	/// Create a new header.
	pub fn new(
		parent_hash: Hash,
		number: BlockNumber,
		state_root: Hash,
		extrinsics_root: Hash,
		digest: Digest,
	) -> Self {
		Self { parent_hash, number, state_root, extrinsics_root, digest }
	}

	/// The blake2b-256 hash of the SCALE-encoded header.
	pub fn hash(&self) -> Hash {
		Hash::from(blake2_256(&self.encode()))
	}
}
