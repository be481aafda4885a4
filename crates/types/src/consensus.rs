//! Consensus payloads ferried between the network and the consensus engine.
//!
//! The synchronizer does not interpret these beyond routing; validation is
//! the consensus engine's job.

use crate::{Address, Hash, Height, Signature};
use sbor::prelude::*;

/// A block proposal for a given height and round.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct Proposal {
    /// Height being proposed.
    pub height: Height,

    /// Consensus round.
    pub round: i16,

    /// Encoded proposed block.
    pub block_data: Vec<u8>,

    /// Proposer's signature over the proposal.
    pub signature: Signature,
}

/// A consensus vote for a given height and round.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct Vote {
    /// Height being voted on.
    pub height: Height,

    /// Consensus round.
    pub round: i16,

    /// The voter's address.
    pub voter: Address,

    /// Hash of the block being voted for; zero for a nil vote.
    pub block_hash: Hash,

    /// The voter's signature.
    pub signature: Signature,
}

impl Vote {
    /// Whether this vote is for no block (a nil vote).
    pub fn is_nil(&self) -> bool {
        self.block_hash.is_zero()
    }
}
