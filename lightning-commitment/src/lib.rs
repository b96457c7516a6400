// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

#![crate_name = "lightning_commitment"]

//! Builds the commitment transaction for one side of a Lightning payment channel, exactly as
//! [BOLT #3] lays it out.
//!
//! A commitment transaction spends the channel's funding output and pays out the current balance
//! split between the two channel participants plus one output for every in-flight HTLC that is
//! worth claiming on-chain. Both participants must derive byte-identical transactions from the
//! same channel state, so every step here (dust trimming, fee sizing, funder-pays fee allocation,
//! output scripts, canonical output ordering and the obscured commitment number) is fixed by the
//! protocol.
//!
//! The entry point is [`ln::tx_builder::SpecTxBuilder`], which implements
//! [`ln::tx_builder::TxBuilder`]. Script and key helpers live in [`ln::chan_utils`].
//!
//! [BOLT #3]: https://github.com/lightning/bolts/blob/master/03-transactions.md

#![cfg_attr(not(any(test, feature = "_test_utils")), deny(missing_docs))]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]
#![cfg_attr(all(not(feature = "std"), not(test)), no_std)]

pub extern crate bitcoin;
extern crate alloc;
#[cfg(any(test, feature = "std"))]
extern crate core;

#[macro_use]
pub mod util;
pub mod chain;
pub mod ln;

#[allow(unused_imports)]
mod prelude {
	pub use alloc::{boxed::Box, format, string::String, vec, vec::Vec};

	pub use alloc::string::ToString;
}
