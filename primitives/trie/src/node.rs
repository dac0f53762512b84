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

//! Node header encoding.
//!
//! A node starts with a header byte: the two high bits select the variant,
//! the low six bits hold the partial key length in nibbles, saturated at 63.
//! Lengths of 63 and above continue in extension bytes, each the remaining
//! length clamped to 255, ending with the first byte below 255.

use crate::Error;
use std::io::{Read, Write};

/// Partial key lengths must stay below this, in nibbles.
pub const MAX_PARTIAL_KEY_LENGTH: usize = 1 << 16;

const KEY_LENGTH_MASK: u8 = 0x3f;

/// The node variants distinguished by the header byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
	/// A leaf node; always carries a value.
	Leaf,
	/// A branch node without a value.
	BranchWithoutValue,
	/// A branch node with a value.
	BranchWithValue,
}

impl NodeKind {
	/// The variant bits, already shifted into the two high bits.
	fn variant_bits(self) -> u8 {
		match self {
			NodeKind::Leaf => 0b01 << 6,
			NodeKind::BranchWithoutValue => 0b10 << 6,
			NodeKind::BranchWithValue => 0b11 << 6,
		}
	}
}

/// Encode the node header for a partial key of `partial_key_len` nibbles.
///
/// Writes are not atomic: on failure the sink may have received a prefix of
/// the header and must be discarded by the caller.
pub fn encode_header<W: Write>(
	kind: NodeKind,
	partial_key_len: usize,
	writer: &mut W,
) -> Result<(), Error> {
	let mut header = kind.variant_bits();
	if partial_key_len < (KEY_LENGTH_MASK as usize) {
		header |= partial_key_len as u8;
		writer.write_all(&[header])?;
		return Ok(())
	}

	header |= KEY_LENGTH_MASK;
	writer.write_all(&[header])?;

	if partial_key_len >= MAX_PARTIAL_KEY_LENGTH {
		return Err(Error::PartialKeyTooBig(partial_key_len))
	}

	let mut remaining = partial_key_len - KEY_LENGTH_MASK as usize;
	loop {
		let byte = remaining.min(u8::MAX as usize) as u8;
		writer.write_all(&[byte])?;
		remaining -= byte as usize;
		if byte < u8::MAX {
			break
		}
	}

	Ok(())
}

/// Decode a node header, returning the variant and the partial key length in
/// nibbles.
pub fn decode_header<R: Read>(reader: &mut R) -> Result<(NodeKind, usize), Error> {
	let header = read_byte(reader)?;
	let kind = match header >> 6 {
		0b01 => NodeKind::Leaf,
		0b10 => NodeKind::BranchWithoutValue,
		0b11 => NodeKind::BranchWithValue,
		_ => return Err(Error::UnknownNodeVariant(header)),
	};

	let mut key_len = (header & KEY_LENGTH_MASK) as usize;
	if key_len == KEY_LENGTH_MASK as usize {
		loop {
			let byte = read_byte(reader)?;
			key_len += byte as usize;
			if key_len >= MAX_PARTIAL_KEY_LENGTH {
				return Err(Error::PartialKeyTooBig(key_len))
			}
			if byte < u8::MAX {
				break
			}
		}
	}

	Ok((kind, key_len))
}

fn read_byte<R: Read>(reader: &mut R) -> Result<u8, Error> {
	let mut buf = [0u8; 1];
	reader.read_exact(&mut buf)?;
	Ok(buf[0])
}
