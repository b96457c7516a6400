// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Transaction helpers shared by the commitment builder: canonical output ordering and a
//! context-free structural check.

use bitcoin::amount::Amount;
use bitcoin::consensus::encode;
use bitcoin::transaction::{Transaction, TxOut};

use core::cmp::Ordering;
use core::fmt;

/// The total amount of bitcoin which will ever exist, in satoshis.
pub const MAX_MONEY: Amount = Amount::from_sat(21_000_000 * 100_000_000);

/// Sorts `outputs` into BIP 69 order (ascending value, then ascending script_pubkey bytes),
/// falling back to `tie_breaker` on the auxiliary data for outputs which are otherwise identical.
///
/// The sort is stable: outputs which compare equal keep their relative order.
pub fn sort_outputs<T, C: Fn(&T, &T) -> Ordering>(outputs: &mut Vec<(TxOut, T)>, tie_breaker: C) {
	outputs.sort_by(|a, b| {
		a.0.value.cmp(&b.0.value).then_with(|| {
			a.0.script_pubkey[..].cmp(&b.0.script_pubkey[..]).then_with(|| tie_breaker(&a.1, &b.1))
		})
	});
}

/// The reason a transaction failed [`check_transaction`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TxCheckError {
	/// The transaction spends nothing.
	NoInputs,
	/// The transaction creates nothing.
	NoOutputs,
	/// The same outpoint is spent by more than one input.
	DuplicateInput,
	/// The output at the given index pays more than can ever exist.
	OutputValueOutOfRange {
		/// Index of the offending output.
		index: usize,
	},
	/// The outputs together pay more than can ever exist.
	TotalValueOutOfRange,
	/// Encoding and decoding the transaction did not yield the same transaction.
	EncodingMismatch,
}

impl fmt::Display for TxCheckError {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			TxCheckError::NoInputs => f.write_str("transaction has no inputs"),
			TxCheckError::NoOutputs => f.write_str("transaction has no outputs"),
			TxCheckError::DuplicateInput => f.write_str("transaction spends an outpoint twice"),
			TxCheckError::OutputValueOutOfRange { index } => {
				write!(f, "output {} exceeds the maximum money supply", index)
			},
			TxCheckError::TotalValueOutOfRange => {
				f.write_str("total output value exceeds the maximum money supply")
			},
			TxCheckError::EncodingMismatch => {
				f.write_str("transaction does not survive a consensus encoding round trip")
			},
		}
	}
}

/// Performs the context-free checks a node applies to any transaction: at least one input and one
/// output, no outpoint spent twice, every output value and their sum within the money supply, and
/// a lossless consensus encoding.
pub fn check_transaction(tx: &Transaction) -> Result<(), TxCheckError> {
	if tx.input.is_empty() {
		return Err(TxCheckError::NoInputs);
	}
	if tx.output.is_empty() {
		return Err(TxCheckError::NoOutputs);
	}
	for (idx, input) in tx.input.iter().enumerate() {
		if tx.input[..idx].iter().any(|prev| prev.previous_output == input.previous_output) {
			return Err(TxCheckError::DuplicateInput);
		}
	}

	let mut total = Amount::ZERO;
	for (index, output) in tx.output.iter().enumerate() {
		if output.value > MAX_MONEY {
			return Err(TxCheckError::OutputValueOutOfRange { index });
		}
		total = match total.checked_add(output.value) {
			Some(total) if total <= MAX_MONEY => total,
			_ => return Err(TxCheckError::TotalValueOutOfRange),
		};
	}

	let encoded = encode::serialize(tx);
	match encode::deserialize::<Transaction>(&encoded) {
		Ok(decoded) if decoded == *tx => Ok(()),
		_ => Err(TxCheckError::EncodingMismatch),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	use bitcoin::absolute::LockTime;
	use bitcoin::hashes::Hash;
	use bitcoin::script::{Builder, ScriptBuf};
	use bitcoin::transaction::{OutPoint, TxIn, TxOut, Version};
	use bitcoin::{Sequence, Txid, Witness};

	#[test]
	fn sort_output_by_value() {
		let txout1 = TxOut {
			value: Amount::from_sat(100),
			script_pubkey: Builder::new().push_int(0).into_script(),
		};
		let txout1_ = txout1.clone();

		let txout2 = TxOut {
			value: Amount::from_sat(99),
			script_pubkey: Builder::new().push_int(0).into_script(),
		};
		let txout2_ = txout2.clone();

		let mut outputs = vec![(txout1, "ignore"), (txout2, "ignore")];
		sort_outputs(&mut outputs, |_, _| {
			unreachable!();
		});

		assert_eq!(&outputs, &vec![(txout2_, "ignore"), (txout1_, "ignore")]);
	}

	#[test]
	fn sort_output_by_script_pubkey() {
		let txout1 = TxOut {
			value: Amount::from_sat(100),
			script_pubkey: Builder::new().push_int(3).into_script(),
		};
		let txout1_ = txout1.clone();

		let txout2 = TxOut {
			value: Amount::from_sat(100),
			script_pubkey: Builder::new().push_int(1).push_int(2).into_script(),
		};
		let txout2_ = txout2.clone();

		let mut outputs = vec![(txout1, "ignore"), (txout2, "ignore")];
		sort_outputs(&mut outputs, |_, _| {
			unreachable!();
		});

		assert_eq!(&outputs, &vec![(txout2_, "ignore"), (txout1_, "ignore")]);
	}

	#[test]
	fn sort_output_by_bip_test() {
		let txout1 = TxOut {
			value: Amount::from_sat(100000000),
			script_pubkey: script_from_hex("41046a0765b5865641ce08dd39690aade26dfbf5511430ca428a3089261361cef170e3929a68aee3d8d4848b0c5111b0a37b82b86ad559fd2a745b44d8e8d9dfdc0cac"),
		};
		let txout1_ = txout1.clone();

		// doesn't deserialize cleanly:
		let txout2 = TxOut {
			value: Amount::from_sat(2400000000),
			script_pubkey: script_from_hex("41044a656f065871a353f216ca26cef8dde2f03e8c16202d2e8ad769f02032cb86a5eb5e56842e92e19141d60a01928f8dd2c875a390f67c1f6c94cfc617c0ea45afac"),
		};
		let txout2_ = txout2.clone();

		let mut outputs = vec![(txout1, "ignore"), (txout2, "ignore")];
		sort_outputs(&mut outputs, |_, _| {
			unreachable!();
		});

		assert_eq!(&outputs, &vec![(txout1_, "ignore"), (txout2_, "ignore")]);
	}

	#[test]
	fn sort_output_tie_breaker_test() {
		let txout1 = TxOut {
			value: Amount::from_sat(100),
			script_pubkey: Builder::new().push_int(1).push_int(2).into_script(),
		};
		let txout1_ = txout1.clone();

		let txout2 = txout1.clone();
		let txout2_ = txout1.clone();

		let mut outputs = vec![(txout1, 420), (txout2, 69)];
		sort_outputs(&mut outputs, |a, b| a.cmp(b));

		assert_eq!(&outputs, &vec![(txout2_, 69), (txout1_, 420)]);
	}

	#[test]
	fn sort_output_keeps_ties_in_place() {
		let txout = TxOut {
			value: Amount::from_sat(100),
			script_pubkey: Builder::new().push_int(1).into_script(),
		};
		let mut outputs: Vec<(TxOut, u32)> = (0..16).map(|i| (txout.clone(), i)).collect();
		sort_outputs(&mut outputs, |_, _| Ordering::Equal);
		assert_eq!(outputs.iter().map(|(_, i)| *i).collect::<Vec<_>>(), (0..16).collect::<Vec<_>>());
	}

	fn script_from_hex(hex_str: &str) -> ScriptBuf {
		ScriptBuf::from_hex(hex_str).unwrap()
	}

	macro_rules! bip_txout_tests {
		($($name:ident: $value:expr,)*) => {
			$(
				#[test]
				fn $name() {
					let expected_raw: Vec<(u64, &str)> = $value;
					let expected: Vec<(TxOut, &str)> = expected_raw.iter()
						.map(|txout_raw| TxOut {
							value: Amount::from_sat(txout_raw.0),
							script_pubkey: script_from_hex(txout_raw.1)
						}).map(|txout| (txout, "ignore"))
					.collect();

					let mut outputs = expected.clone();
					outputs.reverse(); // prep it

					// actually do the work!
					sort_outputs(&mut outputs, |_, _| { unreachable!(); });

					assert_eq!(outputs, expected);
				}
			)*
		}
	}

	const TXOUT1: [(u64, &str); 2] = [
		(400057456, "76a9144a5fba237213a062f6f57978f796390bdcf8d01588ac"),
		(40000000000, "76a9145be32612930b8323add2212a4ec03c1562084f8488ac"),
	];
	const TXOUT2: [(u64, &str); 2] = [
		(100000000, "41046a0765b5865641ce08dd39690aade26dfbf5511430ca428a3089261361cef170e3929a68aee3d8d4848b0c5111b0a37b82b86ad559fd2a745b44d8e8d9dfdc0cac"),
		(2400000000, "41044a656f065871a353f216ca26cef8dde2f03e8c16202d2e8ad769f02032cb86a5eb5e56842e92e19141d60a01928f8dd2c875a390f67c1f6c94cfc617c0ea45afac"),
	];
	bip_txout_tests! {
		bip69_txout_test_1: TXOUT1.to_vec(),
		bip69_txout_test_2: TXOUT2.to_vec(),
	}

	fn spend(vout: u32, values: &[u64]) -> Transaction {
		Transaction {
			version: Version::TWO,
			lock_time: LockTime::ZERO,
			input: vec![TxIn {
				previous_output: OutPoint { txid: Txid::all_zeros(), vout },
				script_sig: ScriptBuf::new(),
				sequence: Sequence::MAX,
				witness: Witness::new(),
			}],
			output: values
				.iter()
				.map(|value| TxOut {
					value: Amount::from_sat(*value),
					script_pubkey: Builder::new().push_int(1).into_script(),
				})
				.collect(),
		}
	}

	#[test]
	fn check_accepts_simple_spend() {
		assert_eq!(check_transaction(&spend(0, &[1000, 2000])), Ok(()));
		assert_eq!(check_transaction(&spend(0, &[MAX_MONEY.to_sat()])), Ok(()));
	}

	#[test]
	fn check_rejects_malformed() {
		let mut tx = spend(0, &[1000]);
		tx.output.clear();
		assert_eq!(check_transaction(&tx), Err(TxCheckError::NoOutputs));

		let mut tx = spend(0, &[1000]);
		tx.input.clear();
		assert_eq!(check_transaction(&tx), Err(TxCheckError::NoInputs));

		let mut tx = spend(0, &[1000]);
		let dup = tx.input[0].clone();
		tx.input.push(dup);
		assert_eq!(check_transaction(&tx), Err(TxCheckError::DuplicateInput));

		let tx = spend(0, &[1, MAX_MONEY.to_sat() + 1]);
		assert_eq!(check_transaction(&tx), Err(TxCheckError::OutputValueOutOfRange { index: 1 }));

		let half = MAX_MONEY.to_sat() / 2 + 1;
		let tx = spend(0, &[half, half]);
		assert_eq!(check_transaction(&tx), Err(TxCheckError::TotalValueOutOfRange));
	}
}
