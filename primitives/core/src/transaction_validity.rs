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

//! Transaction validity as reported by the runtime.

use codec::{Decode, Encode};

/// Priority for a transaction. Additive. Higher is better.
pub type TransactionPriority = u64;

/// Minimum number of blocks a transaction will remain valid for.
/// `TransactionLongevity::MAX` means "forever".
pub type TransactionLongevity = u64;

/// Tag for a transaction. No grammar attached; the runtime only requires
/// byte-wise equality.
pub type TransactionTag = Vec<u8>;

/// Information on a valid transaction, as returned by the runtime.
#[derive(Clone, Debug, Default, PartialEq, Eq, Encode, Decode)]
pub struct Validity {
	/// Priority of the transaction: ordering criterion for the ready queue.
	pub priority: TransactionPriority,
	/// Transaction dependencies: tags that must be provided by other
	/// transactions in the queue before this one becomes valid.
	pub requires: Vec<TransactionTag>,
	/// Tags provided by the transaction.
	pub provides: Vec<TransactionTag>,
	/// Longevity in blocks, counted from the validation block.
	pub longevity: TransactionLongevity,
	/// Whether the transaction should be gossiped to peers.
	pub propagate: bool,
}

impl Validity {
	/// A validity with the given priority and default everything else.
	pub fn from_priority(priority: TransactionPriority) -> Self {
		Self { priority, longevity: TransactionLongevity::MAX, propagate: true, ..Default::default() }
	}
}

/// An invalid transaction validity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Encode, Decode, thiserror::Error)]
pub enum InvalidTransaction {
	/// The call of the transaction is not expected.
	#[error("transaction call is not expected")]
	Call,
	/// Inability to pay some fees (e.g. account balance too low).
	#[error("inability to pay some fees")]
	Payment,
	/// The transaction is not yet valid for the current state; it may become
	/// valid in the future.
	#[error("transaction will be valid in the future")]
	Future,
	/// The transaction is outdated (e.g. its nonce was already used).
	#[error("transaction is outdated")]
	Stale,
	/// The transaction's proofs (e.g. signature) are invalid.
	#[error("bad proof, e.g. signature is invalid")]
	BadProof,
	/// The transaction birth block is ancient.
	#[error("ancient birth block")]
	AncientBirthBlock,
	/// The transaction would exhaust the block resources.
	#[error("exhausts block resources")]
	ExhaustsResources,
	/// Any other custom invalidity, runtime-specific.
	#[error("unknown invalidity: {0}")]
	Custom(u8),
}

/// An unknown transaction validity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Encode, Decode, thiserror::Error)]
pub enum UnknownTransaction {
	/// Could not look up some information required to validate the transaction.
	#[error("could not look up information required to validate the transaction")]
	CannotLookup,
	/// No validator found for the given unsigned transaction.
	#[error("no validator found for the given unsigned transaction")]
	NoUnsignedValidator,
	/// Any other custom unknown validity, runtime-specific.
	#[error("unknown validity: {0}")]
	Custom(u8),
}

/// Errors that can occur while checking the validity of a transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Encode, Decode, thiserror::Error)]
pub enum TransactionValidityError {
	/// The transaction is invalid.
	#[error("invalid transaction: {0}")]
	Invalid(#[from] InvalidTransaction),
	/// Transaction validity can't be determined.
	#[error("unknown transaction validity: {0}")]
	Unknown(#[from] UnknownTransaction),
}

impl TransactionValidityError {
	/// Whether the transaction may become valid later and is worth keeping
	/// around for another validation attempt.
	pub fn is_retriable(&self) -> bool {
		match self {
			Self::Invalid(InvalidTransaction::Future | InvalidTransaction::Stale) => true,
			Self::Invalid(_) => false,
			Self::Unknown(_) => true,
		}
	}
}

/// Information on a transaction's validity.
pub type TransactionValidity = Result<Validity, TransactionValidityError>;
