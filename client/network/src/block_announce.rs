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

//! The per-peer handshake and announce state machine.
//!
//! A session starts when the first stream to or from a peer opens and dies
//! with the connection. Until the peer's handshake validates, announcements
//! in either direction are parked in the session; a validated session moves
//! them immediately. Sessions are sharded under per-peer mutexes so peers
//! progress in parallel while each session stays strictly sequential.

use crate::{
	config::ProtocolNames,
	framing::frame,
	message::{BlockAnnounce, BlockAnnounceHandshake, Roles},
	Error, Network, PeerId, Syncer, LOG_TARGET,
};
use codec::Encode;
use parking_lot::{Mutex, RwLock};
use std::{
	collections::{HashMap, HashSet},
	sync::Arc,
};
use weft_state::BlockState;

/// Where a peer session stands in the handshake exchange.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandshakeState {
	/// Nothing exchanged yet.
	None,
	/// We initiated and sent our handshake; theirs is outstanding.
	Sent,
	/// Their handshake arrived and checked out.
	Validated,
	/// Their handshake was invalid; the peer is ignored until it drops.
	Invalid,
}

/// An announcement parked until the session validates.
#[derive(Debug)]
enum PendingAnnounce {
	/// Queued locally, flushed to the peer.
	Outbound(BlockAnnounce),
	/// Received early, flushed to the syncer.
	Inbound(BlockAnnounce),
}

/// Per-peer protocol state.
#[derive(Debug)]
struct PeerSession {
	state: HandshakeState,
	pending_announce: Option<PendingAnnounce>,
}

impl PeerSession {
	fn new() -> Self {
		Self { state: HandshakeState::None, pending_announce: None }
	}
}

/// The block-announce protocol handler.
pub struct BlockAnnounceHandler<N, S> {
	block_state: Arc<BlockState>,
	network: Arc<N>,
	syncer: Arc<S>,
	protocols: ProtocolNames,
	roles: Roles,
	sessions: RwLock<HashMap<PeerId, Arc<Mutex<PeerSession>>>>,
	request_tracker: Mutex<HashSet<u64>>,
}

impl<N: Network, S: Syncer> BlockAnnounceHandler<N, S> {
	/// A handler for the chain identified by `block_state`'s genesis.
	pub fn new(block_state: Arc<BlockState>, network: Arc<N>, syncer: Arc<S>, roles: Roles) -> Self {
		let protocols = ProtocolNames::new(&block_state.genesis_hash());
		Self {
			block_state,
			network,
			syncer,
			protocols,
			roles,
			sessions: RwLock::new(HashMap::new()),
			request_tracker: Mutex::new(HashSet::new()),
		}
	}

	/// The protocol names this handler speaks.
	pub fn protocols(&self) -> &ProtocolNames {
		&self.protocols
	}

	/// Create the session for a freshly connected peer.
	pub fn on_peer_connected(&self, peer: PeerId) {
		self.sessions
			.write()
			.entry(peer)
			.or_insert_with(|| Arc::new(Mutex::new(PeerSession::new())));
	}

	/// Destroy the session of a disconnected peer.
	pub fn on_disconnect(&self, peer: PeerId) {
		self.sessions.write().remove(&peer);
		log::trace!(target: LOG_TARGET, "session for peer {peer} destroyed");
	}

	/// The handshake state of a peer, if a session exists.
	pub fn handshake_state(&self, peer: &PeerId) -> Option<HandshakeState> {
		self.sessions.read().get(peer).map(|session| session.lock().state)
	}

	/// Handle a handshake received from a peer.
	pub fn on_handshake(&self, peer: PeerId, handshake: BlockAnnounceHandshake) -> Result<(), Error> {
		let session = self.session(peer);
		let mut session = session.lock();

		if let Err(error) = self.validate_handshake(&handshake) {
			match session.state {
				HandshakeState::None | HandshakeState::Sent => {
					log::debug!(
						target: LOG_TARGET,
						"invalid handshake from peer {peer}: {error}",
					);
					session.state = HandshakeState::Invalid;
					session.pending_announce = None;
				},
				HandshakeState::Validated => {
					log::debug!(
						target: LOG_TARGET,
						"validated peer {peer} re-sent an invalid handshake, dropping it",
					);
					self.network.drop_peer(peer);
				},
				HandshakeState::Invalid => {},
			}
			return Err(error)
		}

		match session.state {
			HandshakeState::None => {
				// The peer initiated; answer with our side of the exchange.
				if let Err(error) = self.send_our_handshake(peer) {
					log::debug!(
						target: LOG_TARGET,
						"failed to answer handshake of peer {peer}: {error}",
					);
				}
				session.state = HandshakeState::Validated;
				self.flush_pending(peer, &mut session);
			},
			HandshakeState::Sent => {
				session.state = HandshakeState::Validated;
				self.flush_pending(peer, &mut session);
			},
			// A duplicate handshake carries nothing new.
			HandshakeState::Validated | HandshakeState::Invalid => {},
		}
		Ok(())
	}

	/// Handle an announcement received from a peer.
	pub fn on_block_announce(&self, peer: PeerId, announce: BlockAnnounce) -> Result<(), Error> {
		let session = self.session(peer);
		let mut session = session.lock();

		match session.state {
			HandshakeState::None | HandshakeState::Sent => {
				// Not validated yet; park it instead of feeding the syncer.
				session.pending_announce = Some(PendingAnnounce::Inbound(announce));
			},
			HandshakeState::Validated => self.hand_to_syncer(peer, announce),
			HandshakeState::Invalid => {
				log::trace!(
					target: LOG_TARGET,
					"dropping announcement from invalid peer {peer}",
				);
			},
		}
		Ok(())
	}

	fn session(&self, peer: PeerId) -> Arc<Mutex<PeerSession>> {
		if let Some(session) = self.sessions.read().get(&peer) {
			return session.clone()
		}
		self.sessions
			.write()
			.entry(peer)
			.or_insert_with(|| Arc::new(Mutex::new(PeerSession::new())))
			.clone()
	}

	/// Genesis must match; roles are informational.
	fn validate_handshake(&self, handshake: &BlockAnnounceHandshake) -> Result<(), Error> {
		let ours = self.block_state.genesis_hash();
		if handshake.genesis_hash != ours {
			return Err(Error::GenesisMismatch { ours, theirs: handshake.genesis_hash })
		}
		Ok(())
	}

	fn our_handshake(&self) -> Result<BlockAnnounceHandshake, Error> {
		let best = self.block_state.best_block_header()?;
		Ok(BlockAnnounceHandshake {
			roles: self.roles,
			best_block_number: best.number,
			best_block_hash: best.hash(),
			genesis_hash: self.block_state.genesis_hash(),
		})
	}

	fn send_our_handshake(&self, peer: PeerId) -> Result<(), Error> {
		let handshake = self.our_handshake()?;
		self.network.send_message(
			peer,
			&self.protocols.block_announces,
			frame(&handshake.encode()),
		)
	}

	fn flush_pending(&self, peer: PeerId, session: &mut PeerSession) {
		match session.pending_announce.take() {
			Some(PendingAnnounce::Outbound(announce)) => {
				if let Err(error) = self.network.send_message(
					peer,
					&self.protocols.block_announces,
					frame(&announce.encode()),
				) {
					log::debug!(
						target: LOG_TARGET,
						"failed to flush announcement to peer {peer}: {error}",
					);
				}
			},
			Some(PendingAnnounce::Inbound(announce)) => self.hand_to_syncer(peer, announce),
			None => {},
		}
	}

	fn hand_to_syncer(&self, peer: PeerId, announce: BlockAnnounce) {
		let Some(request) = self.syncer.handle_block_announce(peer, &announce) else { return };

		// Ids repeat only on duplicated requests; send each at most once.
		if !self.request_tracker.lock().insert(request.id) {
			log::trace!(
				target: LOG_TARGET,
				"block request {} already sent, skipping",
				request.id,
			);
			return
		}
		if let Err(error) =
			self.network.send_message(peer, &self.protocols.sync, frame(&request.encode()))
		{
			log::debug!(
				target: LOG_TARGET,
				"failed to send block request to peer {peer}: {error}",
			);
		}
	}
}

impl<N: Network, S: Syncer> crate::BlockAnnouncer for BlockAnnounceHandler<N, S> {
	fn announce_block(&self, announce: BlockAnnounce) {
		let sessions: Vec<(PeerId, Arc<Mutex<PeerSession>>)> =
			self.sessions.read().iter().map(|(peer, session)| (*peer, session.clone())).collect();

		for (peer, session) in sessions {
			let mut session = session.lock();
			match session.state {
				HandshakeState::Validated => {
					if let Err(error) = self.network.send_message(
						peer,
						&self.protocols.block_announces,
						frame(&announce.encode()),
					) {
						log::debug!(
							target: LOG_TARGET,
							"failed to announce block to peer {peer}: {error}",
						);
					}
				},
				HandshakeState::None => {
					session.pending_announce = Some(PendingAnnounce::Outbound(announce.clone()));
					if let Err(error) = self.send_our_handshake(peer) {
						log::debug!(
							target: LOG_TARGET,
							"failed to open announce exchange with peer {peer}: {error}",
						);
						continue
					}
					session.state = HandshakeState::Sent;
				},
				HandshakeState::Sent => {
					// Still waiting on the peer; remember the newest block and
					// nudge with our handshake again.
					session.pending_announce = Some(PendingAnnounce::Outbound(announce.clone()));
					if let Err(error) = self.send_our_handshake(peer) {
						log::debug!(
							target: LOG_TARGET,
							"failed to re-send handshake to peer {peer}: {error}",
						);
					}
				},
				HandshakeState::Invalid => {
					log::trace!(
						target: LOG_TARGET,
						"skipping announcement to invalid peer {peer}",
					);
				},
			}
		}
	}
}
