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

//! Wire messages of the block-announce and sync protocols.
//!
//! Handshakes and announcements are not tagged on the wire: the first frame
//! on a fresh announce stream is a handshake, everything after is an
//! announcement. [`Message`] is the tagged in-process representation receipt
//! dispatches over.

use codec::{Decode, Encode};
use weft_primitives::{BlockNumber, Body, Digest, Extrinsic, Hash, Header};

/// Role flags of a node, as advertised in its handshake.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Encode, Decode)]
pub struct Roles(pub u8);

impl Roles {
	/// A full node, keeping all block data.
	pub const FULL: Roles = Roles(1);
	/// A light client.
	pub const LIGHT: Roles = Roles(1 << 1);
	/// An authority, producing or finalizing blocks.
	pub const AUTHORITY: Roles = Roles(1 << 2);
}

/// The first message exchanged on a fresh block-announce stream.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct BlockAnnounceHandshake {
	/// The sender's roles.
	pub roles: Roles,
	/// The sender's best block number.
	pub best_block_number: u64,
	/// The sender's best block hash.
	pub best_block_hash: Hash,
	/// The sender's genesis hash; must match ours.
	pub genesis_hash: Hash,
}

/// A block announcement: the announced header's fields plus a best-block
/// marker.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct BlockAnnounce {
	/// Parent hash of the announced block.
	pub parent_hash: Hash,
	/// Number of the announced block.
	#[codec(compact)]
	pub number: BlockNumber,
	/// State root of the announced block.
	pub state_root: Hash,
	/// Extrinsics root of the announced block.
	pub extrinsics_root: Hash,
	/// Digest of the announced block.
	pub digest: Digest,
	/// Whether the sender considers the block its new best.
	pub best_block: bool,
}

impl BlockAnnounce {
	/// Announce the given header.
	pub fn from_header(header: &Header, best_block: bool) -> Self {
		Self {
			parent_hash: header.parent_hash,
			number: header.number,
			state_root: header.state_root,
			extrinsics_root: header.extrinsics_root,
			digest: header.digest.clone(),
			best_block,
		}
	}

	/// Reassemble the announced header.
	pub fn header(&self) -> Header {
		Header::new(
			self.parent_hash,
			self.number,
			self.state_root,
			self.extrinsics_root,
			self.digest.clone(),
		)
	}
}

/// Bits of block data a request asks for.
pub mod block_attributes {
	/// Include the header.
	pub const HEADER: u8 = 1;
	/// Include the body.
	pub const BODY: u8 = 1 << 1;
	/// Include the justification.
	pub const JUSTIFICATION: u8 = 1 << 4;
}

/// Where a block request starts walking.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Encode, Decode)]
pub enum FromBlock {
	/// Start at this hash.
	#[codec(index = 0)]
	Hash(Hash),
	/// Start at this number.
	#[codec(index = 1)]
	Number(u64),
}

/// Which way a block request walks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Encode, Decode)]
pub enum Direction {
	/// From the start block towards its children.
	Ascending,
	/// From the start block towards genesis.
	Descending,
}

/// A request for blocks on the sync protocol.
///
/// Ids are client-chosen and must not repeat within a session.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct BlockRequest {
	/// Client-chosen request id.
	pub id: u64,
	/// Requested data, a [`block_attributes`] bitfield.
	pub fields: u8,
	/// Where to start.
	pub from: FromBlock,
	/// Which way to walk.
	pub direction: Direction,
	/// Cap on the number of returned blocks.
	pub max: Option<u32>,
}

/// One block of a response.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct BlockData {
	/// The block's hash.
	pub hash: Hash,
	/// The header, when requested.
	pub header: Option<Header>,
	/// The body, when requested.
	pub body: Option<Body>,
	/// The justification, when requested.
	pub justification: Option<Vec<u8>>,
}

/// The answer to a [`BlockRequest`], echoing its id.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct BlockResponse {
	/// The id of the request this answers.
	pub id: u64,
	/// The requested blocks, in request order.
	pub blocks: Vec<BlockData>,
}

/// Extrinsics gossiped on the transactions protocol.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct Transactions(pub Vec<Extrinsic>);

/// Every message the notification protocols move, tagged for dispatch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Message {
	/// A block-announce handshake.
	Handshake(BlockAnnounceHandshake),
	/// A block announcement.
	BlockAnnounce(BlockAnnounce),
	/// A sync block request.
	BlockRequest(BlockRequest),
	/// A sync block response.
	BlockResponse(BlockResponse),
	/// Gossiped extrinsics.
	Transactions(Transactions),
}
