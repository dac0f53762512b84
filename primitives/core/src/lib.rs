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

//! Primitive types shared by every part of the host: hashes, headers, blocks,
//! digests and transaction validity.

pub mod block;
pub mod digest;
pub mod hashing;
pub mod header;
pub mod transaction_validity;

pub use block::{Block, Body, Extrinsic};
pub use digest::{ConsensusEngineId, Digest, DigestItem};
pub use header::Header;

/// Block hash type. 32 bytes, blake2b-256 of the SCALE-encoded header.
pub type Hash = primitive_types::H256;

/// Block number type.
pub type BlockNumber = u64;

/// Storage keys with a meaning known to the host.
pub mod well_known_keys {
	/// The runtime code blob lives under this key in every block's state.
	pub const CODE: &[u8] = b":code";
}
