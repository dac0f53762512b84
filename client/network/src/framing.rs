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

//! Stream framing: a compact-encoded length followed by the SCALE body.

use crate::Error;
use codec::{Compact, Encode};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Frames past this many bytes are refused outright.
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Prefix a payload with its compact-encoded length.
pub fn frame(payload: &[u8]) -> Vec<u8> {
	let mut framed = Compact(payload.len() as u32).encode();
	framed.extend_from_slice(payload);
	framed
}

/// Read one length-prefixed frame off the stream.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Vec<u8>, Error> {
	let length = read_compact_length(reader).await?;
	if length > MAX_FRAME_SIZE {
		return Err(Error::FrameTooLarge(length))
	}

	let mut payload = vec![0u8; length];
	reader.read_exact(&mut payload).await?;
	Ok(payload)
}

/// Write one length-prefixed frame to the stream.
pub async fn write_frame<W: AsyncWrite + Unpin>(
	writer: &mut W,
	payload: &[u8],
) -> Result<(), Error> {
	writer.write_all(&frame(payload)).await?;
	Ok(())
}

/// Decode a SCALE compact length byte by byte, without over-reading the
/// stream.
async fn read_compact_length<R: AsyncRead + Unpin>(reader: &mut R) -> Result<usize, Error> {
	let first = reader.read_u8().await?;
	let length = match first & 0b11 {
		0 => (first >> 2) as usize,
		1 => {
			let second = reader.read_u8().await?;
			(u16::from_le_bytes([first, second]) >> 2) as usize
		},
		2 => {
			let mut rest = [0u8; 3];
			reader.read_exact(&mut rest).await?;
			(u32::from_le_bytes([first, rest[0], rest[1], rest[2]]) >> 2) as usize
		},
		_ => {
			// Big-integer mode: the upper bits count the extra bytes past four.
			// A frame length never needs more than four.
			let extra_bytes = (first >> 2) as usize + 4;
			if extra_bytes > 4 {
				return Err(Error::FrameTooLarge(usize::MAX))
			}
			let mut rest = [0u8; 4];
			reader.read_exact(&mut rest).await?;
			u32::from_le_bytes(rest) as usize
		},
	};
	Ok(length)
}

#[cfg(test)]
mod tests {
	use super::*;
	use assert_matches::assert_matches;

	async fn roundtrip(payload: Vec<u8>) -> Vec<u8> {
		let framed = frame(&payload);
		read_frame(&mut &framed[..]).await.unwrap()
	}

	#[tokio::test]
	async fn roundtrips_across_length_modes() {
		// Single-byte, two-byte and four-byte compact prefixes.
		for size in [0usize, 1, 63, 64, 1 << 10, (1 << 14) - 1, 1 << 14, 1 << 20] {
			let payload = vec![0xda; size];
			assert_eq!(roundtrip(payload.clone()).await, payload, "size {size}");
		}
	}

	#[tokio::test]
	async fn oversized_frames_are_refused() {
		let framed = frame(&[]);
		// A length prefix claiming far more than the limit.
		let huge = Compact((MAX_FRAME_SIZE as u32) * 2).encode();
		assert_matches!(read_frame(&mut &huge[..]).await, Err(Error::FrameTooLarge(_)));
		assert_matches!(read_frame(&mut &framed[..]).await, Ok(payload) if payload.is_empty());
	}

	#[tokio::test]
	async fn truncated_payload_is_an_io_error() {
		let mut framed = frame(&[1, 2, 3, 4]);
		framed.truncate(3);
		assert_matches!(read_frame(&mut &framed[..]).await, Err(Error::Io(_)));
	}

	#[tokio::test]
	async fn write_then_read() {
		let mut buffer = Vec::new();
		write_frame(&mut buffer, b"announce").await.unwrap();
		assert_eq!(read_frame(&mut &buffer[..]).await.unwrap(), b"announce");
	}
}
