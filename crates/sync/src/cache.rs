//! Bounded cache of downloaded blocks and certificates, keyed by height.
//!
//! Eviction is observational only: callers never depend on a prior entry
//! still being present. Adding a block also caches the certificate it
//! carries for the previous height, which is how the commit pump finds the
//! certificate for height H inside the block announced at H+1.

use crate::error::SyncError;
use meridian_types::{Block, Certificate, Height};
use quick_cache::sync::Cache as QuickCache;
use std::sync::Arc;

/// Height-keyed LRU of blocks and certificates.
pub struct Cache {
    blocks: QuickCache<Height, Arc<Block>>,
    certificates: QuickCache<Height, Certificate>,
}

impl Cache {
    /// Create a cache holding up to `size` blocks (and as many certificates).
    pub fn new(size: usize) -> Result<Self, SyncError> {
        if size == 0 {
            return Err(SyncError::Config("cache size cannot be zero".into()));
        }
        Ok(Self {
            blocks: QuickCache::new(size),
            certificates: QuickCache::new(size),
        })
    }

    /// Cache a block at a height, plus its embedded previous-height
    /// certificate if present.
    pub fn add_block(&self, height: Height, block: Arc<Block>) {
        if let Some(prev_cert) = &block.prev_certificate {
            if height > 0 {
                self.add_certificate(height - 1, prev_cert.clone());
            }
        }
        self.blocks.insert(height, block);
    }

    /// Cache a certificate at a height.
    pub fn add_certificate(&self, height: Height, certificate: Certificate) {
        self.certificates.insert(height, certificate);
    }

    /// The cached block at a height, if still present.
    pub fn get_block(&self, height: Height) -> Option<Arc<Block>> {
        self.blocks.get(&height)
    }

    /// The cached certificate at a height, if still present.
    pub fn get_certificate(&self, height: Height) -> Option<Certificate> {
        self.certificates.get(&height)
    }

    /// Whether a block is cached at this height.
    pub fn has_block_in_cache(&self, height: Height) -> bool {
        self.blocks.peek(&height).is_some()
    }

    /// Number of cached blocks.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Whether no blocks are cached.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}
