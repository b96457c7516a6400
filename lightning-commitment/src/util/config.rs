// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Chain-level settings which the commitment transaction builder is handed explicitly on every
//! call, rather than reading them from process-wide state.

use bitcoin::Network;

/// Parameters describing the chain a channel's funding output lives on.
///
/// Default::default() targets Bitcoin mainnet.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ChainParameters {
	/// The network commitment transactions are built for. Used to render the address of each
	/// commitment output, e.g. via [`CommitmentTransaction::output_address`].
	///
	/// Default value: [`Network::Bitcoin`].
	///
	/// [`CommitmentTransaction::output_address`]: crate::ln::chan_utils::CommitmentTransaction::output_address
	pub network: Network,
}

impl ChainParameters {
	/// Builds parameters for the given network.
	pub fn new(network: Network) -> Self {
		ChainParameters { network }
	}
}

impl Default for ChainParameters {
	fn default() -> Self {
		ChainParameters { network: Network::Bitcoin }
	}
}

impl From<Network> for ChainParameters {
	fn from(network: Network) -> Self {
		ChainParameters::new(network)
	}
}

#[cfg(test)]
mod tests {
	use super::ChainParameters;
	use bitcoin::Network;

	#[test]
	fn defaults_to_mainnet() {
		assert_eq!(ChainParameters::default().network, Network::Bitcoin);
		assert_eq!(ChainParameters::from(Network::Regtest), ChainParameters::new(Network::Regtest));
	}
}
