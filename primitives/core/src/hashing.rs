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

//! Hashing functions. Everything chain-visible is blake2b.

use crate::Hash;

/// Do a blake2b-256 hash and return the result.
pub fn blake2_256(data: &[u8]) -> [u8; 32] {
	let hash = blake2b_simd::Params::new().hash_length(32).hash(data);
	let mut out = [0u8; 32];
	out.copy_from_slice(hash.as_bytes());
	out
}

/// Do a blake2b-128 hash and return the result.
pub fn blake2_128(data: &[u8]) -> [u8; 16] {
	let hash = blake2b_simd::Params::new().hash_length(16).hash(data);
	let mut out = [0u8; 16];
	out.copy_from_slice(hash.as_bytes());
	out
}

/// blake2b-256 of the input as a [`Hash`].
pub fn blake2_256_hash(data: &[u8]) -> Hash {
	Hash::from(blake2_256(data))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn blake2_256_known_vector() {
		// blake2b-256 of the empty input.
		let expected = array_bytes::hex2bytes(
			"0e5751c026e543b2e8ab2eb06099daa1d1e5df47778f7787faab45cdf12fe3a8",
		)
		.unwrap();
		assert_eq!(blake2_256(&[]).to_vec(), expected);
	}

	#[test]
	fn hash_lengths_differ() {
		assert_ne!(blake2_256(b"weft")[..16], blake2_128(b"weft"));
	}
}
