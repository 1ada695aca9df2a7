//! Chain parameters every replica must agree on.

use serde::{Deserialize, Serialize};

/// Consensus parameters. Nodes with different values will not converge.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainParams {
    /// Wall-clock length of one slot, in milliseconds.
    pub slot_duration_ms: u64,

    /// A draw participates when its stake-weighted value exceeds
    /// `2^hardness_exponent`.
    pub hardness_exponent: u32,

    /// Freshly minted units credited to the signer of every adopted node.
    pub reward: u64,

    /// Units withheld from the receiver of every applied transaction and
    /// paid to the signer of the including node.
    pub fee: u64,

    /// Seed shared by the genesis node and every draw.
    pub genesis_seed: u64,
}

impl Default for ChainParams {
    fn default() -> Self {
        Self {
            slot_duration_ms: 1_000,
            hardness_exponent: 252,
            reward: 10,
            fee: 1,
            genesis_seed: 42,
        }
    }
}
