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

//! Typed in-memory keystores.
//!
//! Every consumer of keys (block production, finality voting, account
//! management) gets its own named store with a fixed signature scheme:
//! `gran` keys are ed25519, everything else sr25519. Keys are looked up by
//! their 0x-prefixed public key hex. Durable storage of key material is a
//! collaborator concern.

use parking_lot::RwLock;
use rand::rngs::OsRng;
use std::collections::HashMap;

/// Keystore errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	/// The named keystore does not exist.
	#[error("invalid keystore name")]
	InvalidKeystoreName,
	/// The key's scheme does not match the store's scheme.
	#[error("key type not supported, passed key type: {passed}, acceptable key type: {acceptable}")]
	KeyTypeNotSupported {
		/// Scheme of the offered key.
		passed: Scheme,
		/// Scheme the store accepts.
		acceptable: Scheme,
	},
}

/// A signature scheme.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scheme {
	/// Schnorr over Ristretto255.
	Sr25519,
	/// Ed25519.
	Ed25519,
}

impl std::fmt::Display for Scheme {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Scheme::Sr25519 => write!(f, "sr25519"),
			Scheme::Ed25519 => write!(f, "ed25519"),
		}
	}
}

/// The known store names, in the order they appear in session keys.
pub const STORE_NAMES: &[&str] = &["babe", "gran", "acco", "aura", "imon", "audi"];

/// A keypair of either scheme.
#[derive(Clone)]
pub enum Pair {
	/// An sr25519 keypair.
	Sr25519(Box<schnorrkel::Keypair>),
	/// An ed25519 keypair.
	Ed25519(Box<ed25519_dalek::SigningKey>),
}

impl Pair {
	/// Generate a fresh keypair of the given scheme.
	pub fn generate(scheme: Scheme) -> Self {
		match scheme {
			Scheme::Sr25519 =>
				Pair::Sr25519(Box::new(schnorrkel::Keypair::generate_with(&mut OsRng))),
			Scheme::Ed25519 =>
				Pair::Ed25519(Box::new(ed25519_dalek::SigningKey::generate(&mut OsRng))),
		}
	}

	/// The scheme of this pair.
	pub fn scheme(&self) -> Scheme {
		match self {
			Pair::Sr25519(_) => Scheme::Sr25519,
			Pair::Ed25519(_) => Scheme::Ed25519,
		}
	}

	/// The raw public key bytes.
	pub fn public(&self) -> Vec<u8> {
		match self {
			Pair::Sr25519(pair) => pair.public.to_bytes().to_vec(),
			Pair::Ed25519(pair) => pair.verifying_key().to_bytes().to_vec(),
		}
	}

	/// The 0x-prefixed public key hex, the lookup identity.
	pub fn public_hex(&self) -> String {
		array_bytes::bytes2hex("0x", self.public())
	}
}

/// A single-scheme store.
struct Store {
	scheme: Scheme,
	keys: RwLock<HashMap<String, Pair>>,
}

impl Store {
	fn new(scheme: Scheme) -> Self {
		Self { scheme, keys: RwLock::new(HashMap::new()) }
	}

	fn insert(&self, pair: Pair) -> Result<(), Error> {
		if pair.scheme() != self.scheme {
			return Err(Error::KeyTypeNotSupported {
				passed: pair.scheme(),
				acceptable: self.scheme,
			})
		}
		self.keys.write().insert(pair.public_hex(), pair);
		Ok(())
	}

	fn contains(&self, public_hex: &str) -> bool {
		self.keys.read().contains_key(public_hex)
	}
}

/// The collection of all typed stores.
pub struct Keystore {
	stores: HashMap<&'static str, Store>,
}

impl Keystore {
	/// A keystore with every known store empty.
	pub fn new() -> Self {
		let mut stores = HashMap::new();
		for &name in STORE_NAMES {
			let scheme = if name == "gran" { Scheme::Ed25519 } else { Scheme::Sr25519 };
			stores.insert(name, Store::new(scheme));
		}
		Self { stores }
	}

	/// Insert a keypair into the named store.
	pub fn insert(&self, store_name: &str, pair: Pair) -> Result<(), Error> {
		self.store(store_name)?.insert(pair)
	}

	/// Whether the named store holds the given public key.
	pub fn has_key(&self, public_hex: &str, store_name: &str) -> Result<bool, Error> {
		Ok(self.store(store_name)?.contains(&normalize_hex(public_hex)))
	}

	/// The scheme accepted by the named store.
	pub fn scheme(&self, store_name: &str) -> Result<Scheme, Error> {
		self.store(store_name).map(|store| store.scheme)
	}

	fn store(&self, name: &str) -> Result<&Store, Error> {
		self.stores.get(name).ok_or(Error::InvalidKeystoreName)
	}
}

impl Default for Keystore {
	fn default() -> Self {
		Self::new()
	}
}

fn normalize_hex(hex: &str) -> String {
	let stripped = hex.strip_prefix("0x").unwrap_or(hex);
	format!("0x{}", stripped.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
	use super::*;
	use assert_matches::assert_matches;

	#[test]
	fn insert_and_lookup() {
		let keystore = Keystore::new();
		let pair = Pair::generate(Scheme::Sr25519);
		let public = pair.public_hex();

		keystore.insert("acco", pair).unwrap();

		assert!(keystore.has_key(&public, "acco").unwrap());
		assert!(!keystore.has_key(&public, "babe").unwrap());
		assert!(!keystore.has_key(&public, "gran").unwrap());
	}

	#[test]
	fn lookup_accepts_unprefixed_hex() {
		let keystore = Keystore::new();
		let pair = Pair::generate(Scheme::Ed25519);
		let public = pair.public_hex();
		keystore.insert("gran", pair).unwrap();

		assert!(keystore.has_key(public.strip_prefix("0x").unwrap(), "gran").unwrap());
	}

	#[test]
	fn unknown_store_name_fails() {
		let keystore = Keystore::new();
		let error = keystore.has_key("0x00", "some-invalid-type").unwrap_err();
		assert_eq!(error.to_string(), "invalid keystore name");

		assert_matches!(
			keystore.insert("some-invalid-type", Pair::generate(Scheme::Sr25519)),
			Err(Error::InvalidKeystoreName)
		);
	}

	#[test]
	fn scheme_mismatch_names_both_types() {
		let keystore = Keystore::new();
		let error = keystore.insert("gran", Pair::generate(Scheme::Sr25519)).unwrap_err();
		assert_eq!(
			error.to_string(),
			"key type not supported, passed key type: sr25519, acceptable key type: ed25519",
		);
	}
}
