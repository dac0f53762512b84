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

//! Header digests: consensus-layer items committed in the block header.

use codec::{Decode, Encode};

/// Consensus engine unique id.
pub type ConsensusEngineId = [u8; 4];

/// Generic header digest.
#[derive(Clone, Debug, Default, PartialEq, Eq, Encode, Decode)]
pub struct Digest {
	/// A list of digest items.
	pub logs: Vec<DigestItem>,
}

impl Digest {
	/// Attach a digest item.
	pub fn push(&mut self, item: DigestItem) {
		self.logs.push(item);
	}
}

/// Digest item that is able to encode/decode 'system' digest items and
/// provide opaque access to other items.
///
/// The variant indices are part of the wire format and must not change.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub enum DigestItem {
	/// A pre-runtime digest.
	///
	/// These are messages from the consensus engine to the runtime, although
	/// the consensus engine can (and should) read them itself to avoid
	/// code and state duplication.
	#[codec(index = 6)]
	PreRuntime(ConsensusEngineId, Vec<u8>),
	/// A message from the runtime to the consensus engine.
	#[codec(index = 4)]
	Consensus(ConsensusEngineId, Vec<u8>),
	/// Put a Seal on it.
	#[codec(index = 5)]
	Seal(ConsensusEngineId, Vec<u8>),
	/// Some other thing. Unsupported and experimental.
	#[codec(index = 0)]
	Other(Vec<u8>),
	/// An indication for the light clients that the runtime execution
	/// environment is updated.
	#[codec(index = 8)]
	RuntimeEnvironmentUpdated,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn digest_item_indices_are_stable() {
		assert_eq!(DigestItem::PreRuntime(*b"BABE", vec![1]).encode()[0], 6);
		assert_eq!(DigestItem::Consensus(*b"FRNK", vec![]).encode()[0], 4);
		assert_eq!(DigestItem::Seal(*b"BABE", vec![]).encode()[0], 5);
		assert_eq!(DigestItem::Other(vec![]).encode()[0], 0);
		assert_eq!(DigestItem::RuntimeEnvironmentUpdated.encode(), vec![8]);
	}

	#[test]
	fn digest_roundtrips() {
		let mut digest = Digest::default();
		digest.push(DigestItem::PreRuntime(*b"BABE", vec![0x02, 0x01]));
		digest.push(DigestItem::Seal(*b"BABE", vec![0xaa; 64]));

		let decoded = Digest::decode(&mut &digest.encode()[..]).unwrap();
		assert_eq!(digest, decoded);
	}
}
