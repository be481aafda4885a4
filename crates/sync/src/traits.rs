//! Collaborator interfaces.
//!
//! The synchronizer reads the ledger and drives the consensus engine through
//! these traits; it owns neither. Both must be thread-safe — the synchronizer
//! holds no locks of its own and calls straight through.

use crate::error::SyncError;
use meridian_types::{
    Address, Block, Certificate, ChainParams, Genesis, Hash, Height, Proposal, PublicKey,
    Transaction, Vote,
};

/// A committed block as stored by the ledger: its height and raw encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedBlock {
    /// Height the block was committed at.
    pub height: Height,

    /// The block's raw encoding.
    pub data: Vec<u8>,
}

/// Read surface of the ledger, plus `commit_block`.
pub trait StateFacade: Send + Sync {
    /// Height of the committed tip.
    fn last_block_height(&self) -> Height;

    /// Hash of the committed tip.
    fn last_block_hash(&self) -> Hash;

    /// Unix time (seconds) the tip block was created.
    fn last_block_time(&self) -> u64;

    /// Consensus parameters fixed at genesis.
    fn params(&self) -> ChainParams;

    /// The genesis document.
    fn genesis(&self) -> Genesis;

    /// A committed block by height, if present.
    fn committed_block(&self, height: Height) -> Option<CommittedBlock>;

    /// Certificate of the committed tip, if any block has been committed.
    fn last_certificate(&self) -> Option<Certificate>;

    /// Resolve the public key registered for an address.
    fn public_key(&self, address: &Address) -> Option<PublicKey>;

    /// Queue gossiped transactions into the pending pool.
    fn add_pending_transactions(&self, transactions: Vec<Transaction>);

    /// Commit the next block. Heights must be strictly consecutive.
    fn commit_block(&self, block: Block, certificate: Certificate) -> Result<(), SyncError>;
}

/// Control surface of the consensus engine.
pub trait Consensus: Send + Sync {
    /// Tell consensus the state has advanced; it decides whether to move.
    fn move_to_new_height(&self);

    /// The height and round consensus is currently working on.
    fn height_round(&self) -> (Height, i16);

    /// Queue a proposal received outside the active round.
    fn add_proposal(&self, proposal: Proposal);

    /// Install the proposal for the active round.
    fn set_proposal(&self, proposal: Proposal);

    /// Feed a vote received from the network.
    fn add_vote(&self, vote: Vote);

    /// Our proposal for a height/round, if we have one.
    fn proposal(&self, height: Height, round: i16) -> Option<Proposal>;

    /// Votes we hold for a height/round.
    fn round_votes(&self, height: Height, round: i16) -> Vec<Vote>;
}
