// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Defines the `TxBuilder` trait, and the `SpecTxBuilder` type

use core::cmp::Ordering;
use core::ops::Deref;

use bitcoin::absolute::LockTime;
use bitcoin::amount::Amount;
use bitcoin::script::ScriptBuf;
use bitcoin::transaction::{Transaction, TxIn, TxOut, Version};
use bitcoin::{Sequence, Witness};

use crate::chain::transaction::OutPoint;
use crate::ln::chan_utils::{
	self, CommitmentTransaction, DirectOutput, DirectOutputs, HTLCMapEntry, InFlightHTLC, Keyset,
};
use crate::ln::types::{AmountMsat, ChannelId, Side};
use crate::prelude::*;
use crate::util::config::ChainParameters;
use crate::util::logger::{Logger, WithContext};
use crate::util::transaction_utils::{check_transaction, sort_outputs};

/// Everything about a channel and its current state a commitment transaction depends on, other
/// than the balances and HTLCs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitmentParameters {
	/// The output the commitment transaction spends.
	pub funding_outpoint: OutPoint,
	/// The value of the funding output.
	pub funding_satoshis: Amount,
	/// The side which opened, and therefore funded, the channel. It pays the commitment
	/// transaction fee.
	pub opener: Side,
	/// The side the transaction is rendered for, ie the side able to broadcast it.
	pub side: Side,
	/// The relative locktime the broadcaster must wait before claiming its own balance.
	pub to_self_delay: u16,
	/// The per-commitment keys of this state, with `side` as the broadcaster.
	pub keys: Keyset,
	/// The feerate the transaction pays, in satoshis per 1000 weight units.
	pub feerate_per_kw: u32,
	/// The broadcaster's dust limit. Outputs below it are left out of the transaction.
	pub dust_limit: Amount,
	/// The commitment number, already XOR'd with the channel's obscure factor.
	///
	/// See [`chan_utils::get_commitment_transaction_number_obscure_factor`].
	pub obscured_commitment_number: u64,
}

/// The figures a commitment transaction is built from, available without building it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommitmentStats {
	/// The fee the opener owes, given the number of untrimmed HTLCs.
	pub base_fee: Amount,
	/// How many HTLCs get an output of their own.
	pub untrimmed_htlc_count: usize,
	/// The rendering side's balance, less the fee if it is the opener.
	pub to_self_msat: AmountMsat,
	/// The other side's balance, less the fee if it is the opener.
	pub to_other_msat: AmountMsat,
	/// Whether the opener's balance covered the whole base fee. If not, the opener's balance is
	/// zero and the transaction pays less than the base fee.
	pub base_fee_covered: bool,
}

/// Deducts `fee` from whichever of `self_pay_msat` and `other_pay_msat` belongs to the `opener`,
/// as seen from `side`.
///
/// The non-opener never contributes. If the opener cannot cover the whole fee its balance drops
/// to zero and `false` is returned.
pub fn try_subtract_fee(
	opener: Side, side: Side, fee: Amount, self_pay_msat: &mut AmountMsat,
	other_pay_msat: &mut AmountMsat,
) -> bool {
	let payer = if opener == side { self_pay_msat } else { other_pay_msat };
	match AmountMsat::from_sat(fee).and_then(|fee_msat| payer.checked_sub(fee_msat)) {
		Some(remainder) => {
			*payer = remainder;
			true
		},
		None => {
			*payer = AmountMsat::ZERO;
			false
		},
	}
}

/// Builds commitment transactions.
pub trait TxBuilder {
	/// Works out how many HTLCs survive trimming, the resulting fee, and what each side is left
	/// with once the opener paid it.
	fn build_commitment_stats(
		&self, params: &CommitmentParameters, self_pay_msat: AmountMsat,
		other_pay_msat: AmountMsat, htlcs: &[InFlightHTLC],
	) -> CommitmentStats;

	/// Builds the unsigned commitment transaction paying `self_pay_msat` to `params.side` and
	/// `other_pay_msat` to its counterparty, with an output for each of `htlcs` worth more than
	/// the dust limit plus the cost of claiming it.
	///
	/// If `want_direct_outputs` is set, the returned transaction records where the two balance
	/// outputs ended up.
	///
	/// # Panics
	///
	/// Panics if the balances overflow or together exceed the funding amount, or if the result
	/// would have no outputs at all.
	fn build_commitment_transaction<L: Deref>(
		&self, params: &CommitmentParameters, self_pay_msat: AmountMsat,
		other_pay_msat: AmountMsat, htlcs: &[InFlightHTLC], want_direct_outputs: bool,
		chain_params: &ChainParameters, logger: &L,
	) -> (CommitmentTransaction, CommitmentStats)
	where
		L::Target: Logger;
}

/// A [`TxBuilder`] producing BOLT #3 commitment transactions for channels without anchor outputs.
#[derive(Clone, Debug, Default)]
pub struct SpecTxBuilder {}

/// What we know about an output besides its [`TxOut`], carried along through sorting.
struct OutputData {
	entry: HTLCMapEntry,
	cltv_expiry: Option<u32>,
	witness_script: Option<ScriptBuf>,
}

impl TxBuilder for SpecTxBuilder {
	fn build_commitment_stats(
		&self, params: &CommitmentParameters, self_pay_msat: AmountMsat,
		other_pay_msat: AmountMsat, htlcs: &[InFlightHTLC],
	) -> CommitmentStats {
		let untrimmed_htlc_count = chan_utils::commit_tx_num_untrimmed(
			htlcs,
			params.feerate_per_kw,
			params.dust_limit,
			params.side,
		);
		let base_fee = chan_utils::commit_tx_base_fee(params.feerate_per_kw, untrimmed_htlc_count);

		let mut to_self_msat = self_pay_msat;
		let mut to_other_msat = other_pay_msat;
		let base_fee_covered = try_subtract_fee(
			params.opener,
			params.side,
			base_fee,
			&mut to_self_msat,
			&mut to_other_msat,
		);

		CommitmentStats {
			base_fee,
			untrimmed_htlc_count,
			to_self_msat,
			to_other_msat,
			base_fee_covered,
		}
	}

	fn build_commitment_transaction<L: Deref>(
		&self, params: &CommitmentParameters, self_pay_msat: AmountMsat,
		other_pay_msat: AmountMsat, htlcs: &[InFlightHTLC], want_direct_outputs: bool,
		chain_params: &ChainParameters, logger: &L,
	) -> (CommitmentTransaction, CommitmentStats)
	where
		L::Target: Logger,
	{
		let logger = WithContext::from(
			logger,
			Some(ChannelId::v1_from_funding_outpoint(params.funding_outpoint)),
		);

		let total_pay_msat = self_pay_msat
			.checked_add(other_pay_msat)
			.expect("Channel balances cannot overflow a u64 of millisatoshis");
		assert!(
			total_pay_msat.cmp_sat(params.funding_satoshis) != Ordering::Greater,
			"Balances of {} and {} exceed the funding amount of {}sat",
			self_pay_msat,
			other_pay_msat,
			params.funding_satoshis.to_sat()
		);

		let stats = self.build_commitment_stats(params, self_pay_msat, other_pay_msat, htlcs);
		log_trace!(
			logger,
			"Building commitment transaction for {} side at {} sat/kW: base fee {}sat for {} untrimmed HTLCs, paid by {} side",
			params.side,
			params.feerate_per_kw,
			stats.base_fee.to_sat(),
			stats.untrimmed_htlc_count,
			params.opener
		);
		if !stats.base_fee_covered {
			log_trace!(
				logger,
				"   ...{} side opened the channel but cannot cover the full base fee of {}sat",
				params.opener,
				stats.base_fee.to_sat()
			);
		}

		let capacity = htlcs.len() + 2;
		let mut outputs: Vec<(TxOut, OutputData)> = Vec::with_capacity(capacity);

		// Offered HTLCs go first, then received ones. Sorting makes this invisible in the
		// result but keeps the emission order fixed.
		for offered in [true, false] {
			for (idx, htlc) in htlcs.iter().enumerate() {
				if htlc.is_offered_on(params.side) != offered {
					continue;
				}
				if chan_utils::htlc_is_trimmed(
					htlc,
					params.feerate_per_kw,
					params.dust_limit,
					params.side,
				) {
					log_trace!(
						logger,
						"   ...trimming {} HTLC with value {}sat, hash {}, due to dust limit {}",
						if offered { "outbound" } else { "inbound" },
						htlc.amount_msat.to_sat_round_down().to_sat(),
						htlc.payment_hash,
						params.dust_limit.to_sat()
					);
					continue;
				}
				let witness_script =
					chan_utils::get_htlc_redeemscript(htlc, params.side, &params.keys);
				log_trace!(
					logger,
					"   ...including {} HTLC with value {}sat, hash {}, script {}",
					if offered { "outbound" } else { "inbound" },
					htlc.amount_msat.to_sat_round_down().to_sat(),
					htlc.payment_hash,
					log_bytes!(witness_script.as_bytes())
				);
				outputs.push((
					TxOut {
						value: htlc.amount_msat.to_sat_round_down(),
						script_pubkey: witness_script.to_p2wsh(),
					},
					OutputData {
						entry: HTLCMapEntry::Htlc(idx),
						cltv_expiry: Some(htlc.cltv_expiry),
						witness_script: Some(witness_script),
					},
				));
			}
		}
		debug_assert_eq!(outputs.len(), stats.untrimmed_htlc_count);

		if stats.to_self_msat.at_least_sat(params.dust_limit) {
			let witness_script = chan_utils::get_revokeable_redeemscript(
				&params.keys.revocation_key,
				params.to_self_delay,
				&params.keys.broadcaster_delayed_payment_key,
			);
			log_trace!(
				logger,
				"   ...including to_local output with value {}sat, script {}",
				stats.to_self_msat.to_sat_round_down().to_sat(),
				log_bytes!(witness_script.as_bytes())
			);
			outputs.push((
				TxOut {
					value: stats.to_self_msat.to_sat_round_down(),
					script_pubkey: witness_script.to_p2wsh(),
				},
				OutputData {
					entry: if want_direct_outputs {
						HTLCMapEntry::ToLocal
					} else {
						HTLCMapEntry::Empty
					},
					cltv_expiry: None,
					witness_script: Some(witness_script),
				},
			));
		} else {
			log_trace!(
				logger,
				"   ...omitting to_local output with value {}msat, below dust limit {}",
				stats.to_self_msat.to_msat(),
				params.dust_limit.to_sat()
			);
		}

		if stats.to_other_msat.at_least_sat(params.dust_limit) {
			log_trace!(
				logger,
				"   ...including to_remote output with value {}sat, key {}",
				stats.to_other_msat.to_sat_round_down().to_sat(),
				log_pubkey!(params.keys.countersignatory_payment_key)
			);
			outputs.push((
				TxOut {
					value: stats.to_other_msat.to_sat_round_down(),
					script_pubkey: chan_utils::get_to_countersignatory_script(
						&params.keys.countersignatory_payment_key,
					),
				},
				OutputData {
					entry: if want_direct_outputs {
						HTLCMapEntry::ToRemote
					} else {
						HTLCMapEntry::Empty
					},
					cltv_expiry: None,
					witness_script: None,
				},
			));
		} else {
			log_trace!(
				logger,
				"   ...omitting to_remote output with value {}msat, below dust limit {}",
				stats.to_other_msat.to_msat(),
				params.dust_limit.to_sat()
			);
		}

		assert!(!outputs.is_empty(), "A commitment transaction must have at least one output");
		assert!(outputs.len() <= capacity);

		// Identical HTLC outputs are ordered by expiry. Balance outputs never tie with anything
		// in a way the tie-breaker can resolve, so they keep their emission order.
		sort_outputs(&mut outputs, |a, b| match (a.cltv_expiry, b.cltv_expiry) {
			(Some(a_expiry), Some(b_expiry)) => a_expiry.cmp(&b_expiry),
			_ => Ordering::Equal,
		});

		let mut txouts = Vec::with_capacity(outputs.len());
		let mut htlc_map = Vec::with_capacity(outputs.len());
		let mut witness_scripts = Vec::with_capacity(outputs.len());
		for (txout, data) in outputs {
			txouts.push(txout);
			htlc_map.push(data.entry);
			witness_scripts.push(data.witness_script);
		}
		let direct_outputs = locate_direct_outputs(&txouts, &mut htlc_map, want_direct_outputs);

		let transaction = make_transaction(
			params.funding_outpoint,
			params.obscured_commitment_number,
			txouts,
		);
		if let Err(e) = check_transaction(&transaction) {
			panic!("Built a malformed commitment transaction: {}", e);
		}

		let tx = CommitmentTransaction::new(
			transaction,
			htlc_map,
			witness_scripts,
			direct_outputs,
			params.funding_satoshis,
			params.feerate_per_kw,
			stats.base_fee,
			chain_params.network,
		);
		log_debug!(
			logger,
			"Built {} for {} side, paying an actual fee of {}sat",
			log_tx!(tx.transaction()),
			params.side,
			tx.actual_fee().to_sat()
		);

		(tx, stats)
	}
}

/// Clears the balance tags from `htlc_map`, returning where the tagged outputs are if they were
/// asked for.
fn locate_direct_outputs(
	txouts: &[TxOut], htlc_map: &mut [HTLCMapEntry], want_direct_outputs: bool,
) -> Option<DirectOutputs> {
	let mut direct_outputs = DirectOutputs::default();
	for (idx, entry) in htlc_map.iter_mut().enumerate() {
		let slot = match entry {
			HTLCMapEntry::ToLocal => &mut direct_outputs.to_local,
			HTLCMapEntry::ToRemote => &mut direct_outputs.to_remote,
			_ => continue,
		};
		*slot = Some(DirectOutput { index: idx as u32, value: txouts[idx].value });
		*entry = HTLCMapEntry::Empty;
	}
	if want_direct_outputs {
		Some(direct_outputs)
	} else {
		debug_assert_eq!(direct_outputs, DirectOutputs::default());
		None
	}
}

/// Assembles the version 2 transaction spending `funding_outpoint`, with the 48-bit obscured
/// commitment number split across its locktime and input sequence.
fn make_transaction(
	funding_outpoint: OutPoint, obscured_commitment_number: u64, output: Vec<TxOut>,
) -> Transaction {
	let lock_time = LockTime::from_consensus(
		((0x20 as u32) << 8 * 3) | ((obscured_commitment_number & 0xffffff) as u32),
	);
	let sequence = Sequence(
		((0x80 as u32) << 8 * 3) | ((obscured_commitment_number >> 3 * 8) & 0xffffff) as u32,
	);

	Transaction {
		version: Version::TWO,
		lock_time,
		input: vec![TxIn {
			previous_output: funding_outpoint.into_bitcoin_outpoint(),
			script_sig: ScriptBuf::new(),
			sequence,
			witness: Witness::new(),
		}],
		output,
	}
}
