//! Mock collaborators for component tests.

use crate::error::SyncError;
use crate::traits::{CommittedBlock, Consensus, StateFacade};
use meridian_types::{
    Address, Block, BlockHeader, Certificate, ChainParams, ChainType, Genesis, Hash, Height,
    Proposal, PublicKey, Signature, Transaction, ValidatorKey, Vote, BLOCK_VERSION,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_secs()
}

/// Build a structurally valid block and its certificate for a height.
pub fn generate_test_block(height: Height) -> (Block, Certificate) {
    let key = ValidatorKey::generate();
    let payload = height.to_le_bytes().to_vec();
    let block = Block {
        header: BlockHeader {
            version: BLOCK_VERSION,
            unix_time: 1_700_000_000 + height * 10,
            prev_block_hash: Hash::from_bytes(&height.to_le_bytes()),
            state_root: Hash::from_bytes(b"state"),
            proposer: key.address(),
        },
        prev_certificate: (height > 1).then(|| Certificate {
            height: height - 1,
            round: 0,
            committers: vec![0, 1, 2, 3],
            absentees: vec![],
            signature: Signature::zero(),
        }),
        transactions: vec![Transaction {
            signer: key.address(),
            payload: payload.clone(),
            public_key: Some(key.public_key()),
            signature: key.sign(&payload),
        }],
    };
    let certificate = Certificate {
        height,
        round: 0,
        committers: vec![0, 1, 2, 3],
        absentees: vec![],
        signature: Signature::zero(),
    };
    (block, certificate)
}

struct MockStateInner {
    last_height: Height,
    last_hash: Hash,
    last_time: u64,
    blocks: HashMap<Height, Vec<u8>>,
    certificates: HashMap<Height, Certificate>,
    committed: Vec<Height>,
}

/// In-memory [`StateFacade`] for tests.
///
/// Starts at height zero with a last-block time hours in the past, so the
/// catch-up decision sees a node that is far behind.
pub struct MockState {
    genesis: Genesis,
    inner: Mutex<MockStateInner>,
    public_keys: Mutex<HashMap<Address, PublicKey>>,
    pending_transactions: Mutex<Vec<Transaction>>,
}

impl MockState {
    /// A fresh mock chain of the given type.
    pub fn new(chain_type: ChainType) -> std::sync::Arc<Self> {
        let genesis = Genesis::new(
            Hash::from_bytes(b"mock genesis"),
            chain_type,
            ChainParams::default(),
        );
        let genesis_time = unix_now().saturating_sub(8 * 60 * 60);
        std::sync::Arc::new(Self {
            genesis,
            inner: Mutex::new(MockStateInner {
                last_height: 0,
                last_hash: Hash::ZERO,
                last_time: genesis_time,
                blocks: HashMap::new(),
                certificates: HashMap::new(),
                committed: Vec::new(),
            }),
            public_keys: Mutex::new(HashMap::new()),
            pending_transactions: Mutex::new(Vec::new()),
        })
    }

    /// Append a block to the store, advancing the tip. Panics on a gap.
    pub fn append_block(&self, height: Height, block: &Block, certificate: Certificate) {
        let mut inner = self.inner.lock();
        assert_eq!(
            height,
            inner.last_height + 1,
            "mock store requires consecutive appends"
        );
        inner.blocks.insert(height, block.to_bytes());
        inner.certificates.insert(height, certificate);
        inner.last_height = height;
        inner.last_hash = block.hash();
        inner.last_time = u64::from(block.header.unix_time);
    }

    /// Pretend the tip block was created at `time` (unix seconds).
    pub fn set_last_block_time(&self, time: u64) {
        self.inner.lock().last_time = time;
    }

    /// Register a public key for address resolution.
    pub fn register_public_key(&self, address: Address, public_key: PublicKey) {
        self.public_keys.lock().insert(address, public_key);
    }

    /// Heights committed through [`StateFacade::commit_block`], in order.
    pub fn committed_heights(&self) -> Vec<Height> {
        self.inner.lock().committed.clone()
    }

    /// Transactions handed over by the transactions handler.
    pub fn pending_transactions(&self) -> Vec<Transaction> {
        self.pending_transactions.lock().clone()
    }
}

impl StateFacade for MockState {
    fn last_block_height(&self) -> Height {
        self.inner.lock().last_height
    }

    fn last_block_hash(&self) -> Hash {
        self.inner.lock().last_hash
    }

    fn last_block_time(&self) -> u64 {
        self.inner.lock().last_time
    }

    fn params(&self) -> ChainParams {
        self.genesis.params
    }

    fn genesis(&self) -> Genesis {
        self.genesis.clone()
    }

    fn committed_block(&self, height: Height) -> Option<CommittedBlock> {
        self.inner
            .lock()
            .blocks
            .get(&height)
            .map(|data| CommittedBlock {
                height,
                data: data.clone(),
            })
    }

    fn last_certificate(&self) -> Option<Certificate> {
        let inner = self.inner.lock();
        inner.certificates.get(&inner.last_height).cloned()
    }

    fn public_key(&self, address: &Address) -> Option<PublicKey> {
        self.public_keys.lock().get(address).copied()
    }

    fn add_pending_transactions(&self, transactions: Vec<Transaction>) {
        self.pending_transactions.lock().extend(transactions);
    }

    fn commit_block(&self, block: Block, certificate: Certificate) -> Result<(), SyncError> {
        let mut inner = self.inner.lock();
        let next = inner.last_height + 1;
        if certificate.height != next {
            return Err(SyncError::State(format!(
                "out-of-order commit: expected {next}, got {}",
                certificate.height
            )));
        }
        inner.blocks.insert(next, block.to_bytes());
        inner.certificates.insert(next, certificate);
        inner.last_height = next;
        inner.last_hash = block.hash();
        inner.last_time = u64::from(block.header.unix_time);
        inner.committed.push(next);
        Ok(())
    }
}

struct MockConsensusInner {
    height: Height,
    round: i16,
    proposals: HashMap<(Height, i16), Proposal>,
    set_proposals: Vec<Proposal>,
    queued_proposals: Vec<Proposal>,
    votes: Vec<Vote>,
    moved: u32,
}

/// In-memory [`Consensus`] for tests.
pub struct MockConsensus {
    inner: Mutex<MockConsensusInner>,
}

impl MockConsensus {
    /// A fresh mock consensus at height 1, round 0.
    pub fn new() -> std::sync::Arc<Self> {
        std::sync::Arc::new(Self {
            inner: Mutex::new(MockConsensusInner {
                height: 1,
                round: 0,
                proposals: HashMap::new(),
                set_proposals: Vec::new(),
                queued_proposals: Vec::new(),
                votes: Vec::new(),
                moved: 0,
            }),
        })
    }

    /// Install a proposal we will serve for queries.
    pub fn store_proposal(&self, proposal: Proposal) {
        let mut inner = self.inner.lock();
        inner
            .proposals
            .insert((proposal.height, proposal.round), proposal);
    }

    /// Force the height/round consensus reports.
    pub fn set_height_round(&self, height: Height, round: i16) {
        let mut inner = self.inner.lock();
        inner.height = height;
        inner.round = round;
    }

    /// Proposals installed through [`Consensus::set_proposal`].
    pub fn set_proposals(&self) -> Vec<Proposal> {
        self.inner.lock().set_proposals.clone()
    }

    /// Proposals queued through [`Consensus::add_proposal`].
    pub fn queued_proposals(&self) -> Vec<Proposal> {
        self.inner.lock().queued_proposals.clone()
    }

    /// Votes fed in through [`Consensus::add_vote`].
    pub fn received_votes(&self) -> Vec<Vote> {
        self.inner.lock().votes.clone()
    }

    /// How many times [`Consensus::move_to_new_height`] was called.
    pub fn move_count(&self) -> u32 {
        self.inner.lock().moved
    }
}

impl Consensus for MockConsensus {
    fn move_to_new_height(&self) {
        self.inner.lock().moved += 1;
    }

    fn height_round(&self) -> (Height, i16) {
        let inner = self.inner.lock();
        (inner.height, inner.round)
    }

    fn add_proposal(&self, proposal: Proposal) {
        self.inner.lock().queued_proposals.push(proposal);
    }

    fn set_proposal(&self, proposal: Proposal) {
        self.inner.lock().set_proposals.push(proposal);
    }

    fn add_vote(&self, vote: Vote) {
        self.inner.lock().votes.push(vote);
    }

    fn proposal(&self, height: Height, round: i16) -> Option<Proposal> {
        self.inner.lock().proposals.get(&(height, round)).cloned()
    }

    fn round_votes(&self, height: Height, round: i16) -> Vec<Vote> {
        self.inner
            .lock()
            .votes
            .iter()
            .filter(|v| v.height == height && v.round == round)
            .cloned()
            .collect()
    }
}
