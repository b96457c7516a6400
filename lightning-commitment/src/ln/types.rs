// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Various wrapper types (most around 32-byte arrays or integer amounts) for use in lightning.

use crate::chain::transaction::OutPoint;

use bitcoin::amount::Amount;
use bitcoin::hashes::{sha256::Hash as Sha256, Hash as _};

use core::cmp::Ordering;
use core::fmt;

/// One of the two participants of a channel.
///
/// Used both to say whose view of the channel a commitment transaction renders (the party who
/// can broadcast it) and which party offered a given HTLC.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Side {
	/// Us.
	Local,
	/// Our channel counterparty.
	Remote,
}

impl Side {
	/// Returns the other participant.
	pub fn opposite(self) -> Side {
		match self {
			Side::Local => Side::Remote,
			Side::Remote => Side::Local,
		}
	}
}

impl fmt::Display for Side {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Side::Local => f.write_str("local"),
			Side::Remote => f.write_str("remote"),
		}
	}
}

/// A unique 32-byte identifier for a channel.
///
/// Commitment transactions only ever need the _v1_ variety, which is derived from the funding
/// outpoint (txid & index).
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ChannelId(pub [u8; 32]);

impl ChannelId {
	/// Create _v1_ channel ID based on a funding TX ID and output index
	pub fn v1_from_funding_txid(txid: &[u8; 32], output_index: u16) -> Self {
		let mut res = [0; 32];
		res[..].copy_from_slice(&txid[..]);
		res[30] ^= ((output_index >> 8) & 0xff) as u8;
		res[31] ^= ((output_index >> 0) & 0xff) as u8;
		Self(res)
	}

	/// Create _v1_ channel ID from a funding tx outpoint
	pub fn v1_from_funding_outpoint(outpoint: OutPoint) -> Self {
		Self::v1_from_funding_txid(outpoint.txid.as_byte_array(), outpoint.index)
	}
}

impl fmt::Display for ChannelId {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		fmt::Display::fmt(&crate::util::logger::DebugBytes(&self.0), f)
	}
}

/// The payment hash is the hash of the [`PaymentPreimage`] which is the value used to lock funds
/// in HTLCs while they transit the lightning network.
#[derive(Hash, Copy, Clone, PartialEq, Eq, Debug, Ord, PartialOrd)]
pub struct PaymentHash(pub [u8; 32]);

impl fmt::Display for PaymentHash {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		fmt::Display::fmt(&crate::util::logger::DebugBytes(&self.0), f)
	}
}

/// The payment preimage is the "secret key" which is used to claim the funds of an HTLC on-chain
/// or in a lightning channel.
#[derive(Hash, Copy, Clone, PartialEq, Eq, Debug, Ord, PartialOrd)]
pub struct PaymentPreimage(pub [u8; 32]);

impl From<PaymentPreimage> for PaymentHash {
	fn from(value: PaymentPreimage) -> Self {
		PaymentHash(Sha256::hash(&value.0).to_byte_array())
	}
}

/// An amount of millisatoshis, the unit channel balances and HTLCs are denominated in.
///
/// Converting to satoshis always rounds down; whatever is cut off ends up as transaction fee.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AmountMsat(u64);

impl AmountMsat {
	/// Zero millisatoshis.
	pub const ZERO: AmountMsat = AmountMsat(0);

	/// Wraps a raw millisatoshi count.
	pub const fn from_msat(msat: u64) -> Self {
		AmountMsat(msat)
	}

	/// Converts a satoshi amount, returning `None` if the result does not fit in a `u64`.
	pub fn from_sat(sat: Amount) -> Option<Self> {
		sat.to_sat().checked_mul(1000).map(AmountMsat)
	}

	/// Returns the raw millisatoshi count.
	pub const fn to_msat(self) -> u64 {
		self.0
	}

	/// Converts to whole satoshis, dropping any sub-satoshi remainder.
	pub fn to_sat_round_down(self) -> Amount {
		Amount::from_sat(self.0 / 1000)
	}

	/// Adds two amounts, returning `None` on overflow.
	pub fn checked_add(self, other: AmountMsat) -> Option<AmountMsat> {
		self.0.checked_add(other.0).map(AmountMsat)
	}

	/// Subtracts `other`, returning `None` if it is larger than `self`.
	pub fn checked_sub(self, other: AmountMsat) -> Option<AmountMsat> {
		self.0.checked_sub(other.0).map(AmountMsat)
	}

	/// Compares against a satoshi amount without risking overflow on the conversion.
	pub fn cmp_sat(self, sat: Amount) -> Ordering {
		(self.0 as u128).cmp(&(sat.to_sat() as u128 * 1000))
	}

	/// Whether this amount is worth at least `sat`.
	pub fn at_least_sat(self, sat: Amount) -> bool {
		self.cmp_sat(sat) != Ordering::Less
	}
}

impl fmt::Display for AmountMsat {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{}msat", self.0)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn side_opposite() {
		assert_eq!(Side::Local.opposite(), Side::Remote);
		assert_eq!(Side::Remote.opposite(), Side::Local);
		assert_eq!(Side::Local.opposite().opposite(), Side::Local);
		assert_eq!(Side::Remote.to_string(), "remote");
	}

	#[test]
	fn msat_to_sat_truncates() {
		assert_eq!(AmountMsat::from_msat(999).to_sat_round_down(), Amount::ZERO);
		assert_eq!(AmountMsat::from_msat(1999).to_sat_round_down(), Amount::from_sat(1));
		assert_eq!(AmountMsat::from_msat(546_000).to_sat_round_down(), Amount::from_sat(546));
		assert_eq!(AmountMsat::from_sat(Amount::from_sat(546)), Some(AmountMsat::from_msat(546_000)));
		assert_eq!(AmountMsat::from_sat(Amount::from_sat(u64::MAX / 999)), None);
	}

	#[test]
	fn msat_checked_arithmetic() {
		let a = AmountMsat::from_msat(u64::MAX - 1);
		assert_eq!(a.checked_add(AmountMsat::from_msat(1)), Some(AmountMsat::from_msat(u64::MAX)));
		assert_eq!(a.checked_add(AmountMsat::from_msat(2)), None);
		assert_eq!(AmountMsat::from_msat(5).checked_sub(AmountMsat::from_msat(6)), None);
		let six = AmountMsat::from_msat(6);
		assert_eq!(six.checked_sub(six), Some(AmountMsat::ZERO));
	}

	#[test]
	fn msat_compares_against_sat() {
		let dust = Amount::from_sat(546);
		assert!(AmountMsat::from_msat(546_000).at_least_sat(dust));
		assert!(!AmountMsat::from_msat(545_999).at_least_sat(dust));
		assert_eq!(AmountMsat::from_msat(u64::MAX).cmp_sat(Amount::MAX), Ordering::Less);
		assert_eq!(AmountMsat::from_msat(1_001).cmp_sat(Amount::from_sat(1)), Ordering::Greater);
		assert_eq!(AmountMsat::from_msat(42).to_string(), "42msat");
	}

	#[test]
	fn payment_hash_from_preimage() {
		// sha256 of 32 zero bytes
		let hash: PaymentHash = PaymentPreimage([0; 32]).into();
		assert_eq!(
			hash.to_string(),
			"66687aadf862bd776c8fc18b8e9f8e20089714856ee233b3902a591d0d5f2925"
		);
	}
}
