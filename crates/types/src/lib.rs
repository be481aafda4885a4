//! Core types for the Meridian blockchain node.
//!
//! This crate provides the foundational types used throughout the node:
//!
//! - **Primitives**: Hash, BLS keys and signatures, addresses
//! - **Identifiers**: PeerId, block heights, service bitmask
//! - **Chain types**: Block, Certificate, Transaction, Proposal, Vote
//! - **Genesis**: chain type and fixed parameters
//!
//! # Design Philosophy
//!
//! This crate is self-contained with minimal dependencies. It does not depend
//! on any other workspace crates, making it the foundation layer.

mod block;
mod consensus;
mod crypto;
mod genesis;
mod hash;
mod peer;
mod service;

/// A block height. Genesis is height zero.
pub type Height = u32;

pub use block::{
    Block, BlockError, BlockHeader, Certificate, CertificateError, Transaction, BLOCK_VERSION,
};
pub use consensus::{Proposal, Vote};
pub use crypto::{
    aggregate_signatures, verify_aggregate, Address, PublicKey, SecretKey, Signature, ValidatorKey,
};
pub use genesis::{ChainParams, ChainType, Genesis};
pub use hash::{Hash, HexError};
pub use peer::PeerId;
pub use service::Services;
