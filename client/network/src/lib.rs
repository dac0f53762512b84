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

//! The block-announce gossip protocol.
//!
//! The peer-to-peer host (stream transport, peer discovery, connection
//! management) is a collaborator behind [`Network`]; this crate owns what
//! travels over the notification streams: handshake negotiation, announce
//! validation and dispatch, and the per-peer stream tasks.

pub mod block_announce;
pub mod config;
pub mod framing;
pub mod message;
pub mod service;

pub use block_announce::{BlockAnnounceHandler, HandshakeState};
pub use config::ProtocolNames;
pub use message::{
	BlockAnnounce, BlockAnnounceHandshake, BlockRequest, BlockResponse, Message, Roles,
};
pub use service::BlockAnnounceService;

use weft_primitives::Hash;

const LOG_TARGET: &str = "sync";

/// Network errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	/// The peer runs a different chain.
	#[error("genesis hash mismatch: ours {ours:?}, theirs {theirs:?}")]
	GenesisMismatch {
		/// Our genesis hash.
		ours: Hash,
		/// The hash the peer claimed.
		theirs: Hash,
	},
	/// An inbound frame announced a length past the limit.
	#[error("frame of {0} bytes exceeds the maximum frame size")]
	FrameTooLarge(usize),
	/// Nothing arrived on the stream within the idle window.
	#[error("stream idled past the read timeout")]
	Timeout,
	/// The host is shutting down.
	#[error("operation cancelled by shutdown")]
	Cancelled,
	/// A message failed to decode.
	#[error("failed to decode message: {0}")]
	Decode(#[from] codec::Error),
	/// A stream I/O failure.
	#[error(transparent)]
	Io(#[from] std::io::Error),
	/// A chain state lookup failed.
	#[error(transparent)]
	State(#[from] weft_state::Error),
}

/// Identity of a connected peer, assigned by the transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId([u8; 32]);

impl PeerId {
	/// A random peer id, handy in tests.
	pub fn random() -> Self {
		Self(rand::random())
	}
}

impl From<[u8; 32]> for PeerId {
	fn from(bytes: [u8; 32]) -> Self {
		Self(bytes)
	}
}

impl std::fmt::Display for PeerId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", array_bytes::bytes2hex("", &self.0[..8]))
	}
}

/// The peer-to-peer host the protocol runs over.
pub trait Network: Send + Sync {
	/// Broadcast a framed message to every peer of the protocol.
	fn gossip_message(&self, protocol: &str, data: Vec<u8>);

	/// Send a framed message to one peer, opening the substream if needed.
	fn send_message(&self, peer: PeerId, protocol: &str, data: Vec<u8>) -> Result<(), Error>;

	/// Disconnect a misbehaving peer.
	fn drop_peer(&self, peer: PeerId);
}

/// The sync engine announcements are handed to.
pub trait Syncer: Send + Sync {
	/// Digest an announcement; optionally answer with a block request to send
	/// back to the announcing peer.
	fn handle_block_announce(&self, peer: PeerId, announce: &BlockAnnounce)
		-> Option<BlockRequest>;
}

/// The outbound announcement entry point the block import path uses.
pub trait BlockAnnouncer: Send + Sync {
	/// Announce a block to every peer whose session allows it.
	fn announce_block(&self, announce: BlockAnnounce);
}
