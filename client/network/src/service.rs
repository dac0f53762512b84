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

//! Peer stream tasks.
//!
//! One task per inbound announce stream, drawn from a bounded pool. The
//! first frame decodes as the peer's handshake, everything after as
//! announcements. A task dies on decode failure, idle timeout, protocol
//! error or host shutdown, and tears its session down with it.

use crate::{
	block_announce::BlockAnnounceHandler,
	config::StreamLimits,
	framing::read_frame,
	message::{BlockAnnounce, BlockAnnounceHandshake, Message},
	Error, Network, PeerId, Syncer, LOG_TARGET,
};
use codec::Decode;
use std::sync::Arc;
use tokio::{
	io::AsyncRead,
	sync::{watch, Semaphore},
	task::JoinHandle,
	time::timeout,
};

/// Serves announce streams through a bounded task pool.
pub struct BlockAnnounceService<N, S> {
	handler: Arc<BlockAnnounceHandler<N, S>>,
	limits: StreamLimits,
	slots: Arc<Semaphore>,
	shutdown: watch::Receiver<bool>,
}

impl<N: Network + 'static, S: Syncer + 'static> BlockAnnounceService<N, S> {
	/// A service around `handler`. `shutdown` flipping to `true` cancels
	/// every running peer task.
	pub fn new(
		handler: Arc<BlockAnnounceHandler<N, S>>,
		limits: StreamLimits,
		shutdown: watch::Receiver<bool>,
	) -> Self {
		let slots = Arc::new(Semaphore::new(limits.max_peers));
		Self { handler, limits, slots, shutdown }
	}

	/// The protocol handler driven by this service.
	pub fn handler(&self) -> &Arc<BlockAnnounceHandler<N, S>> {
		&self.handler
	}

	/// Spawn the task serving one peer's announce stream.
	pub fn spawn_peer_stream<R>(&self, peer: PeerId, stream: R) -> JoinHandle<()>
	where
		R: AsyncRead + Unpin + Send + 'static,
	{
		let handler = self.handler.clone();
		let slots = self.slots.clone();
		let mut shutdown = self.shutdown.clone();
		let read_timeout = self.limits.read_timeout;

		tokio::spawn(async move {
			let _slot = match slots.acquire_owned().await {
				Ok(slot) => slot,
				Err(_) => return,
			};
			handler.on_peer_connected(peer);
			if let Err(error) =
				drive_peer_stream(&handler, peer, stream, read_timeout, &mut shutdown).await
			{
				log::debug!(target: LOG_TARGET, "stream of peer {peer} closed: {error}");
			}
			handler.on_disconnect(peer);
		})
	}
}

async fn drive_peer_stream<N: Network, S: Syncer, R: AsyncRead + Unpin>(
	handler: &BlockAnnounceHandler<N, S>,
	peer: PeerId,
	mut stream: R,
	read_timeout: std::time::Duration,
	shutdown: &mut watch::Receiver<bool>,
) -> Result<(), Error> {
	let mut awaiting_handshake = true;
	loop {
		let frame = tokio::select! {
			_ = shutdown.changed() => return Err(Error::Cancelled),
			frame = timeout(read_timeout, read_frame(&mut stream)) =>
				frame.map_err(|_| Error::Timeout)??,
		};

		let message = if awaiting_handshake {
			Message::Handshake(BlockAnnounceHandshake::decode(&mut &frame[..])?)
		} else {
			Message::BlockAnnounce(BlockAnnounce::decode(&mut &frame[..])?)
		};
		awaiting_handshake = false;

		match message {
			Message::Handshake(handshake) => handler.on_handshake(peer, handshake)?,
			Message::BlockAnnounce(announce) => handler.on_block_announce(peer, announce)?,
			Message::BlockRequest(_) | Message::BlockResponse(_) | Message::Transactions(_) => {
				log::trace!(
					target: LOG_TARGET,
					"ignoring sync-protocol message on the announce stream of peer {peer}",
				);
			},
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{framing::write_frame, message::Roles, BlockAnnouncer, HandshakeState};
	use codec::Encode;
	use parking_lot::Mutex;
	use std::time::Duration;
	use weft_primitives::{Digest, Hash, Header};
	use weft_state::BlockState;

	struct NullNetwork {
		sent: Mutex<Vec<(PeerId, String)>>,
	}

	impl NullNetwork {
		fn new() -> Arc<Self> {
			Arc::new(Self { sent: Mutex::new(Vec::new()) })
		}
	}

	impl Network for NullNetwork {
		fn gossip_message(&self, _protocol: &str, _data: Vec<u8>) {}

		fn send_message(&self, peer: PeerId, protocol: &str, _data: Vec<u8>) -> Result<(), Error> {
			self.sent.lock().push((peer, protocol.to_string()));
			Ok(())
		}

		fn drop_peer(&self, _peer: PeerId) {}
	}

	struct CountingSyncer {
		announces: Mutex<Vec<BlockAnnounce>>,
	}

	impl CountingSyncer {
		fn new() -> Arc<Self> {
			Arc::new(Self { announces: Mutex::new(Vec::new()) })
		}
	}

	impl Syncer for CountingSyncer {
		fn handle_block_announce(
			&self,
			_peer: PeerId,
			announce: &BlockAnnounce,
		) -> Option<crate::BlockRequest> {
			self.announces.lock().push(announce.clone());
			None
		}
	}

	fn genesis_header() -> Header {
		Header::new(Hash::zero(), 0, Hash::zero(), Hash::zero(), Digest::default())
	}

	fn service(
		syncer: Arc<CountingSyncer>,
		limits: StreamLimits,
	) -> (BlockAnnounceService<NullNetwork, CountingSyncer>, watch::Sender<bool>, Hash) {
		let block_state =
			Arc::new(BlockState::new(genesis_header(), weft_telemetry::disconnected()));
		let genesis = block_state.genesis_hash();
		let handler = Arc::new(BlockAnnounceHandler::new(
			block_state,
			NullNetwork::new(),
			syncer,
			Roles::FULL,
		));
		let (shutdown_tx, shutdown_rx) = watch::channel(false);
		(BlockAnnounceService::new(handler, limits, shutdown_rx), shutdown_tx, genesis)
	}

	fn handshake(genesis: Hash) -> BlockAnnounceHandshake {
		BlockAnnounceHandshake {
			roles: Roles::FULL,
			best_block_number: 0,
			best_block_hash: genesis,
			genesis_hash: genesis,
		}
	}

	fn announce(number: u64) -> BlockAnnounce {
		BlockAnnounce {
			parent_hash: Hash::repeat_byte(1),
			number,
			state_root: Hash::zero(),
			extrinsics_root: Hash::zero(),
			digest: Digest::default(),
			best_block: true,
		}
	}

	#[tokio::test]
	async fn first_frame_is_the_handshake_then_announcements_flow() {
		// given
		let syncer = CountingSyncer::new();
		let (service, _shutdown, genesis) = service(syncer.clone(), StreamLimits::default());
		let peer = PeerId::random();
		let (mut local, remote) = tokio::io::duplex(4096);

		// when
		let task = service.spawn_peer_stream(peer, remote);
		write_frame(&mut local, &handshake(genesis).encode()).await.unwrap();
		write_frame(&mut local, &announce(1).encode()).await.unwrap();
		write_frame(&mut local, &announce(2).encode()).await.unwrap();
		drop(local);
		task.await.unwrap();

		// then: the handshake validated and both announcements reached the
		// syncer, in order.
		assert_eq!(syncer.announces.lock().clone(), vec![announce(1), announce(2)]);
	}

	#[tokio::test]
	async fn session_is_destroyed_when_the_stream_closes() {
		let (service, _shutdown, genesis) = service(CountingSyncer::new(), StreamLimits::default());
		let peer = PeerId::random();
		let (mut local, remote) = tokio::io::duplex(4096);

		let task = service.spawn_peer_stream(peer, remote);
		write_frame(&mut local, &handshake(genesis).encode()).await.unwrap();
		drop(local);
		task.await.unwrap();

		assert_eq!(service.handler().handshake_state(&peer), None);
	}

	#[tokio::test]
	async fn idle_streams_time_out() {
		let limits = StreamLimits { read_timeout: Duration::from_millis(20), ..Default::default() };
		let (service, _shutdown, _genesis) = service(CountingSyncer::new(), limits);
		let peer = PeerId::random();
		// Keep the write half alive so only the timeout can end the task.
		let (_local, remote) = tokio::io::duplex(4096);

		let task = service.spawn_peer_stream(peer, remote);
		task.await.unwrap();

		assert_eq!(service.handler().handshake_state(&peer), None);
	}

	#[tokio::test]
	async fn shutdown_cancels_running_tasks() {
		let (service, shutdown, _genesis) = service(CountingSyncer::new(), StreamLimits::default());
		let peer = PeerId::random();
		let (_local, remote) = tokio::io::duplex(4096);

		let task = service.spawn_peer_stream(peer, remote);
		shutdown.send(true).unwrap();
		task.await.unwrap();
	}

	#[tokio::test]
	async fn announcements_before_the_handshake_are_parked() {
		// given
		let syncer = CountingSyncer::new();
		let (service, _shutdown, genesis) = service(syncer.clone(), StreamLimits::default());
		let peer = PeerId::random();
		let handler = service.handler().clone();
		handler.on_peer_connected(peer);

		// when: the local side announces before any handshake exchange.
		handler.announce_block(announce(9));
		assert_eq!(handler.handshake_state(&peer), Some(HandshakeState::Sent));

		// then: driving the peer's handshake through the stream flushes it.
		let (mut local, remote) = tokio::io::duplex(4096);
		let task = service.spawn_peer_stream(peer, remote);
		write_frame(&mut local, &handshake(genesis).encode()).await.unwrap();
		drop(local);
		task.await.unwrap();
		assert!(syncer.announces.lock().is_empty());
	}
}
