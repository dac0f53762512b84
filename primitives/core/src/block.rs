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

//! Blocks, bodies and opaque extrinsics.

use crate::{hashing::blake2_256, header::Header, Hash};
use codec::{Decode, Encode};

/// An opaque extrinsic: a byte string whose meaning only the runtime knows.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Encode, Decode)]
pub struct Extrinsic(pub Vec<u8>);

impl Extrinsic {
	/// The blake2b-256 hash of the raw bytes, used as the pool identity.
	pub fn hash(&self) -> Hash {
		Hash::from(blake2_256(&self.0))
	}
}

impl From<Vec<u8>> for Extrinsic {
	fn from(bytes: Vec<u8>) -> Self {
		Self(bytes)
	}
}

impl AsRef<[u8]> for Extrinsic {
	fn as_ref(&self) -> &[u8] {
		&self.0
	}
}

/// A block body: the ordered extrinsics of a block.
#[derive(Clone, Debug, Default, PartialEq, Eq, Encode, Decode)]
pub struct Body(pub Vec<Extrinsic>);

impl Body {
	/// A body from raw extrinsic byte strings.
	pub fn from_extrinsics(extrinsics: Vec<Vec<u8>>) -> Self {
		Self(extrinsics.into_iter().map(Extrinsic).collect())
	}

	/// Iterate over the extrinsics.
	pub fn iter(&self) -> impl Iterator<Item = &Extrinsic> {
		self.0.iter()
	}
}

/// A block: a header and its body.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct Block {
	/// The block header.
	pub header: Header,
	/// The accompanying extrinsics.
	pub body: Body,
}

impl Block {
	/// Create a new block.
	pub fn new(header: Header, body: Body) -> Self {
		Self { header, body }
	}

	/// The block hash: the hash of the header.
	pub fn hash(&self) -> Hash {
		self.header.hash()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::digest::Digest;

	#[test]
	fn extrinsic_hash_is_over_raw_bytes() {
		let ext = Extrinsic(vec![1, 2, 3]);
		assert_eq!(ext.hash(), Hash::from(blake2_256(&[1, 2, 3])));
	}

	#[test]
	fn block_hash_is_header_hash() {
		let header = Header::new(Hash::zero(), 7, Hash::zero(), Hash::zero(), Digest::default());
		let block = Block::new(header.clone(), Body::from_extrinsics(vec![vec![1]]));
		assert_eq!(block.hash(), header.hash());
	}
}
