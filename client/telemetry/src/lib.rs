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

//! Telemetry events emitted by the kernel.
//!
//! The transport to a telemetry endpoint is a collaborator; services receive
//! a [`TelemetryHandle`] and fire structured messages into it. Hosts without
//! an endpoint use [`NoTelemetry`].

use serde::Serialize;
use std::sync::Arc;
use weft_primitives::{BlockNumber, Hash};

const LOG_TARGET: &str = "telemetry";

/// A structured telemetry event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "msg", rename_all = "snake_case")]
pub enum TelemetryMessage {
	/// A block made it into the tree.
	BlockImport {
		/// Hash of the imported block.
		best: Hash,
		/// Its number.
		height: BlockNumber,
	},
	/// The `:code` blob changed at a block.
	RuntimeUpgraded {
		/// The block binding the new runtime.
		block_hash: Hash,
		/// The new spec version.
		spec_version: u32,
	},
	/// Pool content changed after an import.
	TxPoolImport {
		/// Transactions ready for inclusion.
		ready: usize,
		/// Transactions awaiting validation.
		pending: usize,
	},
	/// A pending extrinsic failed re-validation and was dropped.
	TxPoolDropped {
		/// Hash of the dropped extrinsic.
		extrinsic: Hash,
	},
	/// A block was finalized.
	Finalized {
		/// Hash of the finalized block.
		hash: Hash,
		/// Its number.
		height: BlockNumber,
	},
}

/// Where telemetry messages go.
pub trait Telemetry: Send + Sync {
	/// Deliver one message. Must not block.
	fn send_message(&self, message: TelemetryMessage);
}

/// A shared telemetry sink.
pub type TelemetryHandle = Arc<dyn Telemetry>;

/// Discards every message.
pub struct NoTelemetry;

impl Telemetry for NoTelemetry {
	fn send_message(&self, _message: TelemetryMessage) {}
}

/// A handle that drops everything, for hosts without an endpoint.
pub fn disconnected() -> TelemetryHandle {
	Arc::new(NoTelemetry)
}

/// Writes messages as JSON lines through the logging facade.
pub struct LogTelemetry;

impl Telemetry for LogTelemetry {
	fn send_message(&self, message: TelemetryMessage) {
		match serde_json::to_string(&message) {
			Ok(json) => log::debug!(target: LOG_TARGET, "{json}"),
			Err(error) => log::warn!(target: LOG_TARGET, "unserializable message: {error}"),
		}
	}
}

/// Records every message, for assertions in tests.
#[cfg(any(test, feature = "test-helpers"))]
pub struct RecordingTelemetry {
	messages: parking_lot::Mutex<Vec<TelemetryMessage>>,
}

#[cfg(any(test, feature = "test-helpers"))]
impl RecordingTelemetry {
	/// An empty recorder.
	pub fn new() -> Arc<Self> {
		Arc::new(Self { messages: parking_lot::Mutex::new(Vec::new()) })
	}

	/// Everything received so far.
	pub fn messages(&self) -> Vec<TelemetryMessage> {
		self.messages.lock().clone()
	}
}

#[cfg(any(test, feature = "test-helpers"))]
impl Telemetry for RecordingTelemetry {
	fn send_message(&self, message: TelemetryMessage) {
		self.messages.lock().push(message);
	}
}
