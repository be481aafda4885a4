//! Block, certificate, and transaction types.

use crate::{Address, Hash, Height, PublicKey, Signature};
use sbor::prelude::*;

/// Block format version produced by this implementation.
pub const BLOCK_VERSION: u8 = 1;

/// A transaction carried inside a block or gossiped to the pool.
///
/// The signer's public key may be stripped before a block is stored or
/// relayed; receivers resolve it from the ledger by address before any
/// signature check.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct Transaction {
    /// Address of the signer.
    pub signer: Address,

    /// Opaque transaction payload.
    pub payload: Vec<u8>,

    /// Signer's public key; `None` when stripped.
    pub public_key: Option<PublicKey>,

    /// Signature over the payload.
    pub signature: Signature,
}

impl Transaction {
    /// Whether the public key has been stripped from this transaction.
    pub fn is_public_key_stripped(&self) -> bool {
        self.public_key.is_none()
    }

    /// Attach a resolved public key.
    pub fn set_public_key(&mut self, public_key: PublicKey) {
        self.public_key = Some(public_key);
    }

    /// Hash of the encoded transaction.
    pub fn hash(&self) -> Hash {
        let bytes = basic_encode(self).expect("transaction serialization should never fail");
        Hash::from_bytes(&bytes)
    }
}

/// Header of a block.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct BlockHeader {
    /// Block format version.
    pub version: u8,

    /// Unix time the block was proposed, in seconds.
    pub unix_time: u32,

    /// Hash of the previous block.
    pub prev_block_hash: Hash,

    /// State root after applying this block.
    pub state_root: Hash,

    /// Address of the proposer.
    pub proposer: Address,
}

/// A block: header, the certificate that committed the previous block, and
/// the transactions.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct Block {
    /// The block header.
    pub header: BlockHeader,

    /// Certificate for the previous block. Absent only for the first block.
    pub prev_certificate: Option<Certificate>,

    /// Transactions committed by this block.
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Hash of the block (header hash).
    pub fn hash(&self) -> Hash {
        let bytes = basic_encode(&self.header).expect("header serialization should never fail");
        Hash::from_bytes(&bytes)
    }

    /// Encode to raw bytes for the wire or the block store.
    pub fn to_bytes(&self) -> Vec<u8> {
        basic_encode(self).expect("block serialization should never fail")
    }

    /// Decode from raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, sbor::DecodeError> {
        basic_decode(bytes)
    }

    /// Structural validity checks, performed before committing a block that
    /// arrived over the network.
    pub fn basic_check(&self) -> Result<(), BlockError> {
        if self.header.version != BLOCK_VERSION {
            return Err(BlockError::UnsupportedVersion(self.header.version));
        }
        if self.header.unix_time == 0 {
            return Err(BlockError::ZeroTimestamp);
        }
        if self.transactions.is_empty() {
            return Err(BlockError::EmptyTransactions);
        }
        Ok(())
    }
}

/// The aggregated consensus signature proving a block was committed.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct Certificate {
    /// Height of the committed block.
    pub height: Height,

    /// Consensus round the block was committed in.
    pub round: i16,

    /// Committee member numbers eligible to sign.
    pub committers: Vec<i32>,

    /// Committee members that did not sign.
    pub absentees: Vec<i32>,

    /// Aggregated BLS signature of the non-absent committers.
    pub signature: Signature,
}

impl Certificate {
    /// Structural validity checks.
    pub fn basic_check(&self) -> Result<(), CertificateError> {
        if self.height == 0 {
            return Err(CertificateError::ZeroHeight);
        }
        if self.committers.is_empty() {
            return Err(CertificateError::NoCommitters);
        }
        for absentee in &self.absentees {
            if !self.committers.contains(absentee) {
                return Err(CertificateError::UnknownAbsentee(*absentee));
            }
        }
        Ok(())
    }
}

/// Structural block check failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BlockError {
    #[error("unsupported block version: {0}")]
    UnsupportedVersion(u8),

    #[error("block timestamp is zero")]
    ZeroTimestamp,

    #[error("block has no transactions")]
    EmptyTransactions,
}

/// Structural certificate check failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CertificateError {
    #[error("certificate height is zero")]
    ZeroHeight,

    #[error("certificate has no committers")]
    NoCommitters,

    #[error("absentee {0} is not a committer")]
    UnknownAbsentee(i32),
}
