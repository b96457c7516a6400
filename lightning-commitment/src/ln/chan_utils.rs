// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Various utilities for building scripts, deriving keys and sizing fees related to channels, as
//! well as the [`CommitmentTransaction`] produced by a [`TxBuilder`].
//!
//! [`TxBuilder`]: crate::ln::tx_builder::TxBuilder

use bitcoin::address::Address;
use bitcoin::amount::Amount;
use bitcoin::opcodes;
use bitcoin::script::{Builder, Script, ScriptBuf};
use bitcoin::transaction::Transaction;
use bitcoin::{Network, PubkeyHash, Txid, WPubkeyHash};

use bitcoin::hashes::ripemd160::Hash as Ripemd160;
use bitcoin::hashes::sha256::Hash as Sha256;
use bitcoin::hashes::{Hash, HashEngine};

use bitcoin::secp256k1::{self, PublicKey, Scalar, Secp256k1, SecretKey};

use crate::ln::types::{AmountMsat, PaymentHash, Side};
use crate::prelude::*;

/// The weight of a commitment transaction without any HTLC outputs, non-anchor variant.
pub const COMMITMENT_TX_BASE_WEIGHT: u64 = 724;
/// The weight every untrimmed HTLC output adds to a commitment transaction.
pub const COMMITMENT_TX_WEIGHT_PER_HTLC: u64 = 172;

/// The weight of a BIP141 witnessScript for a BOLT3's "offered HTLC output" on a commitment transaction, non-anchor variant.
pub const OFFERED_HTLC_SCRIPT_WEIGHT: usize = 133;

/// Gets the weight for an HTLC-Success transaction.
#[inline]
pub fn htlc_success_tx_weight() -> u64 {
	const HTLC_SUCCESS_TX_WEIGHT: u64 = 703;
	HTLC_SUCCESS_TX_WEIGHT
}

/// Gets the weight for an HTLC-Timeout transaction.
#[inline]
pub fn htlc_timeout_tx_weight() -> u64 {
	const HTLC_TIMEOUT_TX_WEIGHT: u64 = 663;
	HTLC_TIMEOUT_TX_WEIGHT
}

fn fee_for_weight(feerate_per_kw: u32, weight: u64) -> Amount {
	Amount::from_sat(feerate_per_kw as u64 * weight / 1000)
}

/// The fee an HTLC-Timeout transaction pays at the given feerate, rounded down.
pub fn htlc_timeout_fee(feerate_per_kw: u32) -> Amount {
	fee_for_weight(feerate_per_kw, htlc_timeout_tx_weight())
}

/// The fee an HTLC-Success transaction pays at the given feerate, rounded down.
pub fn htlc_success_fee(feerate_per_kw: u32) -> Amount {
	fee_for_weight(feerate_per_kw, htlc_success_tx_weight())
}

/// The base fee of a commitment transaction carrying `num_untrimmed_htlcs` HTLC outputs.
///
/// Like every other BOLT #3 fee this rounds down.
pub fn commit_tx_base_fee(feerate_per_kw: u32, num_untrimmed_htlcs: usize) -> Amount {
	fee_for_weight(
		feerate_per_kw,
		COMMITMENT_TX_BASE_WEIGHT + num_untrimmed_htlcs as u64 * COMMITMENT_TX_WEIGHT_PER_HTLC,
	)
}

/// An HTLC which is pending in a channel, as seen by both commitment transactions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InFlightHTLC {
	/// The channel-unique identifier the offerer assigned this HTLC.
	pub htlc_id: u64,
	/// The value of the HTLC. The value as it appears in the commitment transaction is this
	/// rounded down to whole satoshis.
	pub amount_msat: AmountMsat,
	/// The hash of the preimage which unlocks this HTLC.
	pub payment_hash: PaymentHash,
	/// The CLTV lock-time at which this HTLC expires.
	pub cltv_expiry: u32,
	/// The party which offered this HTLC.
	pub offerer: Side,
}

impl InFlightHTLC {
	/// Whether this HTLC is "offered" on the commitment transaction rendered for `side`, ie
	/// outbound in relation to that commitment transaction.
	pub fn is_offered_on(&self, side: Side) -> bool {
		self.offerer == side
	}
}

/// Whether `htlc` is too small to be worth an output on the commitment transaction rendered for
/// `side`.
///
/// An offered HTLC must cover the dust limit plus the fee of the HTLC-Timeout transaction which
/// would claim it, a received one the dust limit plus the HTLC-Success fee.
pub fn htlc_is_trimmed(
	htlc: &InFlightHTLC, feerate_per_kw: u32, dust_limit: Amount, side: Side,
) -> bool {
	let htlc_fee = if htlc.is_offered_on(side) {
		htlc_timeout_fee(feerate_per_kw)
	} else {
		htlc_success_fee(feerate_per_kw)
	};
	match dust_limit.checked_add(htlc_fee).and_then(AmountMsat::from_sat) {
		Some(threshold) => htlc.amount_msat < threshold,
		// Nothing can be worth more than this
		None => true,
	}
}

/// Counts the HTLCs which survive [`htlc_is_trimmed`] on the commitment transaction rendered for
/// `side`.
pub fn commit_tx_num_untrimmed(
	htlcs: &[InFlightHTLC], feerate_per_kw: u32, dust_limit: Amount, side: Side,
) -> usize {
	htlcs.iter().filter(|htlc| !htlc_is_trimmed(htlc, feerate_per_kw, dust_limit, side)).count()
}

/// Derives a per-commitment-transaction public key (eg an htlc key or a delayed_payment key)
/// from the base point and the per_commitment_point.
pub fn derive_public_key<T: secp256k1::Signing>(
	secp_ctx: &Secp256k1<T>, per_commitment_point: &PublicKey, base_point: &PublicKey,
) -> PublicKey {
	let mut sha = Sha256::engine();
	sha.input(&per_commitment_point.serialize());
	sha.input(&base_point.serialize());
	let res = Sha256::from_engine(sha).to_byte_array();

	let hashkey = PublicKey::from_secret_key(
		&secp_ctx,
		&SecretKey::from_slice(&res).expect("Hashes should always be valid keys unless SHA-256 is broken"),
	);
	base_point.combine(&hashkey)
		.expect("Addition only fails if the tweak is the inverse of the key. This is not possible when the tweak contains the hash of the key.")
}

/// Derives a per-commitment-transaction revocation public key from its constituent parts.
///
/// Only the cheating participant owns a valid witness to propagate a revoked
/// commitment transaction, thus per_commitment_point always come from cheater
/// and revocation_base_point always come from punisher, which is the broadcaster
/// of the transaction spending with this key knowledge.
pub fn derive_public_revocation_key<T: secp256k1::Verification>(
	secp_ctx: &Secp256k1<T>, per_commitment_point: &PublicKey,
	countersignatory_revocation_base_point: &PublicKey,
) -> PublicKey {
	let rev_append_commit_hash_key = {
		let mut sha = Sha256::engine();
		sha.input(&countersignatory_revocation_base_point.serialize());
		sha.input(&per_commitment_point.serialize());

		Sha256::from_engine(sha).to_byte_array()
	};
	let commit_append_rev_hash_key = {
		let mut sha = Sha256::engine();
		sha.input(&per_commitment_point.serialize());
		sha.input(&countersignatory_revocation_base_point.serialize());

		Sha256::from_engine(sha).to_byte_array()
	};

	let countersignatory_contrib = countersignatory_revocation_base_point.mul_tweak(&secp_ctx, &Scalar::from_be_bytes(rev_append_commit_hash_key).unwrap())
		.expect("Multiplying a valid public key by a hash is expected to never fail per secp256k1 docs");
	let broadcaster_contrib = per_commitment_point.mul_tweak(&secp_ctx, &Scalar::from_be_bytes(commit_append_rev_hash_key).unwrap())
		.expect("Multiplying a valid public key by a hash is expected to never fail per secp256k1 docs");
	countersignatory_contrib.combine(&broadcaster_contrib)
		.expect("Addition only fails if the tweak is the inverse of the key. This is not possible when the tweak commits to the key.")
}

/// One counterparty's public keys which do not change over the life of a channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelPublicKeys {
	/// The base point which is used (with derive_public_revocation_key) to derive per-commitment
	/// revocation keys. This is combined with the per-commitment-secret generated by the
	/// counterparty to create a secret which the counterparty can reveal to revoke previous
	/// states.
	pub revocation_basepoint: PublicKey,
	/// The public key on which the non-broadcaster (ie the countersignatory) receives an immediately
	/// spendable primary channel balance on the broadcaster's commitment transaction. This key is
	/// static across every commitment transaction.
	pub payment_point: PublicKey,
	/// The base point which is used (with derive_public_key) to derive a per-commitment payment
	/// public key which receives non-HTLC-encumbered funds which are only available for spending
	/// after some delay (or can be claimed via the revocation path).
	pub delayed_payment_basepoint: PublicKey,
	/// The base point which is used (with derive_public_key) to derive a per-commitment public key
	/// which is used to encumber HTLC-in-flight outputs.
	pub htlc_basepoint: PublicKey,
}

/// The set of public keys which are used in the creation of one commitment transaction.
///
/// A broadcaster key is provided from potential broadcaster of the computed transaction.
/// A countersignatory key is coming from a protocol participant unable to broadcast the
/// transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Keyset {
	/// The revocation key which is used to allow the broadcaster of the commitment
	/// transaction to provide their counterparty the ability to punish them if they broadcast
	/// an old state.
	pub revocation_key: PublicKey,
	/// Broadcaster's Payment Key (which isn't allowed to be spent from for some delay)
	pub broadcaster_delayed_payment_key: PublicKey,
	/// Broadcaster's HTLC Key
	pub broadcaster_htlc_key: PublicKey,
	/// Countersignatory's HTLC Key
	pub countersignatory_htlc_key: PublicKey,
	/// The key the countersignatory's balance is paid to, without any delay.
	pub countersignatory_payment_key: PublicKey,
}

impl Keyset {
	/// Create per-state keys from channel base points and the broadcaster's per-commitment point.
	/// Key set is asymmetric and can't be used as part of counter-signatory set of transactions.
	pub fn derive_new<T: secp256k1::Signing + secp256k1::Verification>(
		secp_ctx: &Secp256k1<T>, per_commitment_point: &PublicKey,
		broadcaster_keys: &ChannelPublicKeys, countersignatory_keys: &ChannelPublicKeys,
	) -> Keyset {
		Keyset {
			revocation_key: derive_public_revocation_key(
				&secp_ctx,
				&per_commitment_point,
				&countersignatory_keys.revocation_basepoint,
			),
			broadcaster_delayed_payment_key: derive_public_key(
				&secp_ctx,
				&per_commitment_point,
				&broadcaster_keys.delayed_payment_basepoint,
			),
			broadcaster_htlc_key: derive_public_key(
				&secp_ctx,
				&per_commitment_point,
				&broadcaster_keys.htlc_basepoint,
			),
			countersignatory_htlc_key: derive_public_key(
				&secp_ctx,
				&per_commitment_point,
				&countersignatory_keys.htlc_basepoint,
			),
			countersignatory_payment_key: countersignatory_keys.payment_point,
		}
	}
}

/// The maximum length of a script returned by get_revokeable_redeemscript.
// Calculated as 6 bytes of opcodes, 1 byte push plus 2 bytes for contest_delay, and two public
// keys of 33 bytes (+ 1 push).
pub const REVOKEABLE_REDEEMSCRIPT_MAX_LENGTH: usize = 6 + 3 + 34 * 2;

/// A script either spendable by the revocation
/// key or the broadcaster_delayed_payment_key and satisfying the relative-locktime OP_CSV constrain.
/// Encumbering a `to_local` output on a commitment transaction.
pub fn get_revokeable_redeemscript(
	revocation_key: &PublicKey, contest_delay: u16, broadcaster_delayed_payment_key: &PublicKey,
) -> ScriptBuf {
	let res = Builder::new()
		.push_opcode(opcodes::all::OP_IF)
		.push_slice(&revocation_key.serialize())
		.push_opcode(opcodes::all::OP_ELSE)
		.push_int(contest_delay as i64)
		.push_opcode(opcodes::all::OP_CSV)
		.push_opcode(opcodes::all::OP_DROP)
		.push_slice(&broadcaster_delayed_payment_key.serialize())
		.push_opcode(opcodes::all::OP_ENDIF)
		.push_opcode(opcodes::all::OP_CHECKSIG)
		.into_script();
	debug_assert!(res.len() <= REVOKEABLE_REDEEMSCRIPT_MAX_LENGTH);
	res
}

/// Gets the witness redeemscript for an HTLC output in a commitment transaction, given the keys
/// explicitly rather than via a [`Keyset`].
pub fn get_htlc_redeemscript_with_explicit_keys(
	payment_hash: &PaymentHash, cltv_expiry: u32, offered: bool, broadcaster_htlc_key: &PublicKey,
	countersignatory_htlc_key: &PublicKey, revocation_key: &PublicKey,
) -> ScriptBuf {
	let payment_hash160 = Ripemd160::hash(&payment_hash.0[..]).to_byte_array();
	if offered {
		let script = Builder::new().push_opcode(opcodes::all::OP_DUP)
		              .push_opcode(opcodes::all::OP_HASH160)
		              .push_slice(&PubkeyHash::hash(&revocation_key.serialize()))
		              .push_opcode(opcodes::all::OP_EQUAL)
		              .push_opcode(opcodes::all::OP_IF)
		              .push_opcode(opcodes::all::OP_CHECKSIG)
		              .push_opcode(opcodes::all::OP_ELSE)
		              .push_slice(&countersignatory_htlc_key.serialize())
		              .push_opcode(opcodes::all::OP_SWAP)
		              .push_opcode(opcodes::all::OP_SIZE)
		              .push_int(32)
		              .push_opcode(opcodes::all::OP_EQUAL)
		              .push_opcode(opcodes::all::OP_NOTIF)
		              .push_opcode(opcodes::all::OP_DROP)
		              .push_int(2)
		              .push_opcode(opcodes::all::OP_SWAP)
		              .push_slice(&broadcaster_htlc_key.serialize())
		              .push_int(2)
		              .push_opcode(opcodes::all::OP_CHECKMULTISIG)
		              .push_opcode(opcodes::all::OP_ELSE)
		              .push_opcode(opcodes::all::OP_HASH160)
		              .push_slice(&payment_hash160)
		              .push_opcode(opcodes::all::OP_EQUALVERIFY)
		              .push_opcode(opcodes::all::OP_CHECKSIG)
		              .push_opcode(opcodes::all::OP_ENDIF)
		              .push_opcode(opcodes::all::OP_ENDIF)
		              .into_script();
		debug_assert_eq!(script.len(), OFFERED_HTLC_SCRIPT_WEIGHT);
		script
	} else {
		Builder::new().push_opcode(opcodes::all::OP_DUP)
		              .push_opcode(opcodes::all::OP_HASH160)
		              .push_slice(&PubkeyHash::hash(&revocation_key.serialize()))
		              .push_opcode(opcodes::all::OP_EQUAL)
		              .push_opcode(opcodes::all::OP_IF)
		              .push_opcode(opcodes::all::OP_CHECKSIG)
		              .push_opcode(opcodes::all::OP_ELSE)
		              .push_slice(&countersignatory_htlc_key.serialize())
		              .push_opcode(opcodes::all::OP_SWAP)
		              .push_opcode(opcodes::all::OP_SIZE)
		              .push_int(32)
		              .push_opcode(opcodes::all::OP_EQUAL)
		              .push_opcode(opcodes::all::OP_IF)
		              .push_opcode(opcodes::all::OP_HASH160)
		              .push_slice(&payment_hash160)
		              .push_opcode(opcodes::all::OP_EQUALVERIFY)
		              .push_int(2)
		              .push_opcode(opcodes::all::OP_SWAP)
		              .push_slice(&broadcaster_htlc_key.serialize())
		              .push_int(2)
		              .push_opcode(opcodes::all::OP_CHECKMULTISIG)
		              .push_opcode(opcodes::all::OP_ELSE)
		              .push_opcode(opcodes::all::OP_DROP)
		              .push_int(cltv_expiry as i64)
		              .push_opcode(opcodes::all::OP_CLTV)
		              .push_opcode(opcodes::all::OP_DROP)
		              .push_opcode(opcodes::all::OP_CHECKSIG)
		              .push_opcode(opcodes::all::OP_ENDIF)
		              .push_opcode(opcodes::all::OP_ENDIF)
		              .into_script()
	}
}

/// Gets the witness redeemscript for `htlc` on the commitment transaction rendered for `side`.
#[inline]
pub fn get_htlc_redeemscript(htlc: &InFlightHTLC, side: Side, keys: &Keyset) -> ScriptBuf {
	get_htlc_redeemscript_with_explicit_keys(
		&htlc.payment_hash,
		htlc.cltv_expiry,
		htlc.is_offered_on(side),
		&keys.broadcaster_htlc_key,
		&keys.countersignatory_htlc_key,
		&keys.revocation_key,
	)
}

/// Gets the script_pubkey paying the countersignatory's balance directly to their payment key.
pub fn get_to_countersignatory_script(payment_key: &PublicKey) -> ScriptBuf {
	ScriptBuf::new_p2wpkh(&WPubkeyHash::hash(&payment_key.serialize()))
}

/// Commitment transaction numbers which appear in the transactions themselves are XOR'd with a
/// shared secret first. This prevents on-chain observers from discovering how many commitment
/// transactions occurred in a channel before it was closed.
///
/// This function gets the shared secret from relevant channel public keys and can be used to
/// "decrypt" the commitment transaction number given a commitment transaction on-chain.
pub fn get_commitment_transaction_number_obscure_factor(
	broadcaster_payment_basepoint: &PublicKey, countersignatory_payment_basepoint: &PublicKey,
	outbound_from_broadcaster: bool,
) -> u64 {
	let mut sha = Sha256::engine();

	if outbound_from_broadcaster {
		sha.input(&broadcaster_payment_basepoint.serialize());
		sha.input(&countersignatory_payment_basepoint.serialize());
	} else {
		sha.input(&countersignatory_payment_basepoint.serialize());
		sha.input(&broadcaster_payment_basepoint.serialize());
	}
	let res = Sha256::from_engine(sha).to_byte_array();

	((res[26] as u64) << 5 * 8)
		| ((res[27] as u64) << 4 * 8)
		| ((res[28] as u64) << 3 * 8)
		| ((res[29] as u64) << 2 * 8)
		| ((res[30] as u64) << 1 * 8)
		| ((res[31] as u64) << 0 * 8)
}

/// Recovers the obscured commitment number a commitment transaction carries in its locktime and
/// its single input's sequence.
///
/// Returns `None` if `tx` does not look like a commitment transaction.
pub fn get_obscured_commitment_number(tx: &Transaction) -> Option<u64> {
	if tx.input.len() != 1 {
		return None;
	}
	let locktime = tx.lock_time.to_consensus_u32();
	let sequence = tx.input[0].sequence.0;
	if locktime >> 8 * 3 != 0x20 || sequence >> 8 * 3 != 0x80 {
		return None;
	}
	Some((((sequence & 0xffffff) as u64) << 8 * 3) | (locktime & 0xffffff) as u64)
}

/// What a commitment transaction output pays to, beyond its script.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HTLCMapEntry {
	/// Not an HTLC output.
	Empty,
	/// The output of the HTLC at this index in the slice the transaction was built from.
	Htlc(usize),
	/// The rendering side's own balance. Only used while building; never handed out.
	ToLocal,
	/// The other side's balance. Only used while building; never handed out.
	ToRemote,
}

/// Where a balance output ended up in a commitment transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DirectOutput {
	/// The output's index in the transaction.
	pub index: u32,
	/// The output's value.
	pub value: Amount,
}

/// The positions of the two balance outputs of a commitment transaction, each `None` if the
/// balance was below the dust limit and has no output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DirectOutputs {
	/// The delayed, revocable output paying the side the transaction was rendered for.
	pub to_local: Option<DirectOutput>,
	/// The output paying the other side immediately.
	pub to_remote: Option<DirectOutput>,
}

impl DirectOutputs {
	/// Returns the output paying `side`'s balance, where [`Side::Local`] is the side the
	/// transaction was rendered for.
	pub fn get(&self, side: Side) -> Option<DirectOutput> {
		match side {
			Side::Local => self.to_local,
			Side::Remote => self.to_remote,
		}
	}
}

/// A finalized, unsigned commitment transaction along with the data needed to sign and later
/// resolve its outputs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitmentTransaction {
	transaction: Transaction,
	txid: Txid,
	htlc_map: Vec<HTLCMapEntry>,
	witness_scripts: Vec<Option<ScriptBuf>>,
	direct_outputs: Option<DirectOutputs>,
	funding_satoshis: Amount,
	feerate_per_kw: u32,
	base_fee: Amount,
	network: Network,
}

impl CommitmentTransaction {
	pub(crate) fn new(
		transaction: Transaction, htlc_map: Vec<HTLCMapEntry>,
		witness_scripts: Vec<Option<ScriptBuf>>, direct_outputs: Option<DirectOutputs>,
		funding_satoshis: Amount, feerate_per_kw: u32, base_fee: Amount, network: Network,
	) -> Self {
		debug_assert_eq!(transaction.output.len(), htlc_map.len());
		debug_assert_eq!(transaction.output.len(), witness_scripts.len());
		let txid = transaction.compute_txid();
		CommitmentTransaction {
			transaction,
			txid,
			htlc_map,
			witness_scripts,
			direct_outputs,
			funding_satoshis,
			feerate_per_kw,
			base_fee,
			network,
		}
	}

	/// The unsigned transaction.
	pub fn transaction(&self) -> &Transaction {
		&self.transaction
	}

	/// The transaction's txid, computed once at build time.
	pub fn txid(&self) -> Txid {
		self.txid
	}

	/// One entry per output, co-indexed with the transaction's outputs. Each is either
	/// [`HTLCMapEntry::Htlc`] or [`HTLCMapEntry::Empty`].
	pub fn htlc_map(&self) -> &[HTLCMapEntry] {
		&self.htlc_map
	}

	/// The output index of the HTLC at `htlc_idx` in the slice the transaction was built from, or
	/// `None` if it was trimmed.
	pub fn htlc_output_index(&self, htlc_idx: usize) -> Option<u32> {
		self.htlc_map
			.iter()
			.position(|entry| *entry == HTLCMapEntry::Htlc(htlc_idx))
			.map(|idx| idx as u32)
	}

	/// The witness script the output at `output_idx` is locked to. HTLC outputs and the
	/// `to_local` output have one; the `to_remote` output pays a key hash and has none.
	pub fn witness_script(&self, output_idx: usize) -> Option<&Script> {
		self.witness_scripts.get(output_idx).and_then(|script| script.as_deref())
	}

	/// The positions of the balance outputs, if they were asked for at build time.
	pub fn direct_outputs(&self) -> Option<&DirectOutputs> {
		self.direct_outputs.as_ref()
	}

	/// The feerate the transaction was built at.
	pub fn feerate_per_kw(&self) -> u32 {
		self.feerate_per_kw
	}

	/// The fee the protocol charges the channel opener for this transaction.
	pub fn base_fee(&self) -> Amount {
		self.base_fee
	}

	/// The fee the transaction actually pays, ie the funding amount less the sum of all outputs.
	///
	/// This exceeds [`Self::base_fee`] by the value of trimmed HTLCs, trimmed balances and the
	/// sub-satoshi remainders of every output, and falls short of it when the opener could not
	/// afford the whole base fee.
	pub fn actual_fee(&self) -> Amount {
		let total_out: Amount = self.transaction.output.iter().map(|output| output.value).sum();
		self.funding_satoshis
			.checked_sub(total_out)
			.expect("Outputs never exceed the funding amount")
	}

	/// The obscured commitment number encoded in the transaction.
	pub fn obscured_commitment_number(&self) -> u64 {
		get_obscured_commitment_number(&self.transaction)
			.expect("We always encode the commitment number")
	}

	/// The address of the output at `output_idx` on the network the transaction was built for.
	pub fn output_address(&self, output_idx: usize) -> Option<Address> {
		let output = self.transaction.output.get(output_idx)?;
		Address::from_script(&output.script_pubkey, self.network).ok()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	use crate::ln::types::PaymentPreimage;

	use bitcoin::hex::{DisplayHex, FromHex};
	use bitcoin::secp256k1::Secp256k1;

	use core::str::FromStr;

	fn pubkey(hex: &str) -> PublicKey {
		PublicKey::from_str(hex).unwrap()
	}

	fn test_keys() -> Keyset {
		Keyset {
			revocation_key: pubkey("0212a140cd0c6539d07cd08dfe09984dec3251ea808b892efeac3ede9402bf2b19"),
			broadcaster_delayed_payment_key: pubkey("03fd5960528dc152014952efdb702a88f71e3c1653b2314431701ec77e57fde83c"),
			broadcaster_htlc_key: pubkey("030d417a46946384f88d5f3337267c5e579765875dc4daca813e21734b140639e7"),
			countersignatory_htlc_key: pubkey("0394854aa6eab5b2a8122cc726e9dded053a2184d88256816826d6231c068d4a5b"),
			countersignatory_payment_key: pubkey("032c0b7cf95324a07d05398b240174dc0c2be444d96b159aa6c7f7b1e668680991"),
		}
	}

	fn htlc(amount_msat: u64, preimage_byte: u8, cltv_expiry: u32, offerer: Side) -> InFlightHTLC {
		InFlightHTLC {
			htlc_id: preimage_byte as u64,
			amount_msat: AmountMsat::from_msat(amount_msat),
			payment_hash: PaymentPreimage([preimage_byte; 32]).into(),
			cltv_expiry,
			offerer,
		}
	}

	#[test]
	fn test_key_derivation() {
		// BOLT #3 Appendix E
		let secp_ctx = Secp256k1::new();
		let base_secret = SecretKey::from_slice(
			&<Vec<u8>>::from_hex("000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f")
				.unwrap(),
		)
		.unwrap();
		let per_commitment_secret = SecretKey::from_slice(
			&<Vec<u8>>::from_hex("1f1e1d1c1b1a191817161514131211100f0e0d0c0b0a09080706050403020100")
				.unwrap(),
		)
		.unwrap();
		let base_point = PublicKey::from_secret_key(&secp_ctx, &base_secret);
		let per_commitment_point = PublicKey::from_secret_key(&secp_ctx, &per_commitment_secret);
		assert_eq!(
			base_point,
			pubkey("036d6caac248af96f6afa7f904f550253a0f3ef3f5aa2fe6838a95b216691468e2")
		);
		assert_eq!(
			per_commitment_point,
			pubkey("025f7117a78150fe2ef97db7cfc83bd57b2e2c0d0dd25eaf467a4a1c2a45ce1486")
		);

		assert_eq!(
			derive_public_key(&secp_ctx, &per_commitment_point, &base_point),
			pubkey("0235f2dbfaa89b57ec7b055afe29849ef7ddfeb1cefdb9ebdc43f5494984db29e5")
		);
		assert_eq!(
			derive_public_revocation_key(&secp_ctx, &per_commitment_point, &base_point),
			pubkey("02916e326636d19c33f13e8c0c3a03dd157f332f3e99c317c141dd865eb01f8ff0")
		);

		let static_keys = ChannelPublicKeys {
			revocation_basepoint: base_point,
			payment_point: base_point,
			delayed_payment_basepoint: base_point,
			htlc_basepoint: base_point,
		};
		let keys = Keyset::derive_new(&secp_ctx, &per_commitment_point, &static_keys, &static_keys);
		assert_eq!(
			keys.broadcaster_htlc_key,
			pubkey("0235f2dbfaa89b57ec7b055afe29849ef7ddfeb1cefdb9ebdc43f5494984db29e5")
		);
		assert_eq!(keys.broadcaster_delayed_payment_key, keys.broadcaster_htlc_key);
		assert_eq!(keys.countersignatory_htlc_key, keys.broadcaster_htlc_key);
		assert_eq!(
			keys.revocation_key,
			pubkey("02916e326636d19c33f13e8c0c3a03dd157f332f3e99c317c141dd865eb01f8ff0")
		);
		assert_eq!(keys.countersignatory_payment_key, base_point);
	}

	#[test]
	fn test_obscure_factor() {
		let local_payment_basepoint =
			pubkey("034f355bdcb7cc0af728ef3cceb9615d90684bb5b2ca5f859ab0f0b704075871aa");
		let remote_payment_basepoint =
			pubkey("032c0b7cf95324a07d05398b240174dc0c2be444d96b159aa6c7f7b1e668680991");
		assert_eq!(
			get_commitment_transaction_number_obscure_factor(
				&local_payment_basepoint,
				&remote_payment_basepoint,
				true
			),
			0x2bb038521914
		);
		// The opener's basepoint always goes first, whoever broadcasts.
		assert_eq!(
			get_commitment_transaction_number_obscure_factor(
				&remote_payment_basepoint,
				&local_payment_basepoint,
				false
			),
			0x2bb038521914
		);
	}

	#[test]
	fn test_scripts() {
		let keys = test_keys();

		assert_eq!(
			get_revokeable_redeemscript(&keys.revocation_key, 144, &keys.broadcaster_delayed_payment_key)
				.as_bytes()
				.to_lower_hex_string(),
			"63210212a140cd0c6539d07cd08dfe09984dec3251ea808b892efeac3ede9402bf2b1967029000b2752103fd5960528dc152014952efdb702a88f71e3c1653b2314431701ec77e57fde83c68ac"
		);

		let offered = htlc(2_000_000, 2, 502, Side::Local);
		assert_eq!(
			get_htlc_redeemscript(&offered, Side::Local, &keys).as_bytes().to_lower_hex_string(),
			"76a91414011f7254d96b819c76986c277d115efce6f7b58763ac67210394854aa6eab5b2a8122cc726e9dded053a2184d88256816826d6231c068d4a5b7c820120876475527c21030d417a46946384f88d5f3337267c5e579765875dc4daca813e21734b140639e752ae67a914b43e1b38138a41b37f7cd9a1d274bc63e3a9b5d188ac6868"
		);

		let received = htlc(1_000_000, 0, 500, Side::Remote);
		assert_eq!(
			get_htlc_redeemscript(&received, Side::Local, &keys).as_bytes().to_lower_hex_string(),
			"76a91414011f7254d96b819c76986c277d115efce6f7b58763ac67210394854aa6eab5b2a8122cc726e9dded053a2184d88256816826d6231c068d4a5b7c8201208763a914b8bcb07f6344b42ab04250c86a6e8b75d3fdbbc688527c21030d417a46946384f88d5f3337267c5e579765875dc4daca813e21734b140639e752ae677502f401b175ac6868"
		);

		assert_eq!(
			get_to_countersignatory_script(&keys.countersignatory_payment_key)
				.as_bytes()
				.to_lower_hex_string(),
			"0014cc1b07838e387deacd0e5232e1e8b49f4c29e484"
		);
	}

	#[test]
	fn test_fees() {
		assert_eq!(htlc_timeout_fee(253), Amount::from_sat(167));
		assert_eq!(htlc_success_fee(253), Amount::from_sat(177));
		assert_eq!(commit_tx_base_fee(15000, 0), Amount::from_sat(10860));
		assert_eq!(commit_tx_base_fee(647, 5), Amount::from_sat(1024));
		assert_eq!(commit_tx_base_fee(0, 483), Amount::ZERO);
		assert_eq!(commit_tx_base_fee(u32::MAX, 0), Amount::from_sat(u32::MAX as u64 * 724 / 1000));
	}

	#[test]
	fn test_trim_breakeven() {
		let dust_limit = Amount::from_sat(546);
		let feerate = 253;

		// Offered on the rendering side: 546 + 167
		assert!(htlc_is_trimmed(&htlc(712_000, 1, 500, Side::Local), feerate, dust_limit, Side::Local));
		assert!(htlc_is_trimmed(&htlc(712_999, 1, 500, Side::Local), feerate, dust_limit, Side::Local));
		assert!(!htlc_is_trimmed(&htlc(713_000, 1, 500, Side::Local), feerate, dust_limit, Side::Local));

		// Received on the rendering side: 546 + 177
		assert!(htlc_is_trimmed(&htlc(722_999, 1, 500, Side::Remote), feerate, dust_limit, Side::Local));
		assert!(!htlc_is_trimmed(&htlc(723_000, 1, 500, Side::Remote), feerate, dust_limit, Side::Local));

		// The same HTLC is received on the other side's commitment.
		let offered_by_us = htlc(720_000, 1, 500, Side::Local);
		assert!(!htlc_is_trimmed(&offered_by_us, feerate, dust_limit, Side::Local));
		assert!(htlc_is_trimmed(&offered_by_us, feerate, dust_limit, Side::Remote));

		// A dust limit which overflows counts everything as trimmed.
		assert!(htlc_is_trimmed(&htlc(u64::MAX, 1, 500, Side::Local), feerate, Amount::MAX, Side::Local));
	}

	#[test]
	fn test_num_untrimmed() {
		let htlcs = vec![
			htlc(1_000_000, 0, 500, Side::Remote),
			htlc(2_000_000, 1, 501, Side::Remote),
			htlc(2_000_000, 2, 502, Side::Local),
			htlc(3_000_000, 3, 503, Side::Local),
			htlc(4_000_000, 4, 504, Side::Remote),
		];
		let dust_limit = Amount::from_sat(546);
		assert_eq!(commit_tx_num_untrimmed(&htlcs, 0, dust_limit, Side::Local), 5);
		assert_eq!(commit_tx_num_untrimmed(&htlcs, 647, dust_limit, Side::Local), 5);
		assert_eq!(commit_tx_num_untrimmed(&htlcs, 648, dust_limit, Side::Local), 4);
		assert_eq!(commit_tx_num_untrimmed(&htlcs, 2070, dust_limit, Side::Local), 3);
		assert_eq!(commit_tx_num_untrimmed(&htlcs, 2195, dust_limit, Side::Local), 2);
		assert_eq!(commit_tx_num_untrimmed(&htlcs, 3703, dust_limit, Side::Local), 1);
		assert_eq!(commit_tx_num_untrimmed(&htlcs, 4915, dust_limit, Side::Local), 0);
		assert_eq!(commit_tx_num_untrimmed(&[], 4915, dust_limit, Side::Local), 0);
	}

	#[test]
	fn test_direct_outputs_by_side() {
		let to_local = DirectOutput { index: 1, value: Amount::from_sat(6_989_140) };
		let outputs = DirectOutputs { to_local: Some(to_local), to_remote: None };
		assert_eq!(outputs.get(Side::Local), Some(to_local));
		assert_eq!(outputs.get(Side::Remote), None);
	}
}
