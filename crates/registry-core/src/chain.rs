use crate::{constants::HASH_HEX_SIZE, now_secs, Block, Body};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Trait the storage backends should implement for the chain to operate.
/// This lives in `registry-core` to avoid a circular dependency.
///
/// Blocks are keyed by `block.height`. Scans return blocks in height order.
pub trait ChainStore: Send + Sync {
    fn put_block(&self, block: &Block) -> anyhow::Result<()>;
    fn get_block(&self, height: u64) -> anyhow::Result<Option<Block>>;
    fn count(&self) -> anyhow::Result<u64>;
    fn find_by_hash(&self, hash: &str) -> anyhow::Result<Option<Block>>;
    fn find_by_address(&self, address: &str) -> anyhow::Result<Vec<Block>>;
    fn close(&self) -> anyhow::Result<()>;
}

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("block #{0} not found")]
    NotFound(u64),
    #[error("previous block #{0} is missing from the store")]
    PreviousBlockMissing(u64),
    #[error("failed to persist block #{height}")]
    StoreWriteFailed {
        height: u64,
        #[source]
        source: anyhow::Error,
    },
    #[error("store error: {0}")]
    Store(#[from] anyhow::Error),
    #[error("block serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("chain integrity check failed at heights {:?}", .0.heights())]
    Integrity(IntegrityReport),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Stored hash does not match the recomputed hash.
    HashMismatch,
    /// `previousBlockHash` does not match the hash of the block below.
    BrokenLink,
    /// The store reports more blocks than it can return.
    Missing,
    /// The stored record could not be read back as a block.
    Corrupt,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct IntegrityFailure {
    pub height: u64,
    pub kind: FailureKind,
}

/// Every integrity break found by one `validate_chain` run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct IntegrityReport {
    pub failures: Vec<IntegrityFailure>,
}

impl IntegrityReport {
    /// Distinct failing heights, ascending.
    pub fn heights(&self) -> Vec<u64> {
        let mut heights: Vec<u64> = self.failures.iter().map(|f| f.height).collect();
        heights.dedup();
        heights
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Chain façade that delegates persistence to a `ChainStore`.
///
/// Appends go through a single lock shared by all clones, so height
/// assignment never races.
pub struct Chain<S: ChainStore> {
    store: Arc<S>,
    append_lock: Arc<Mutex<()>>,
}

impl<S: ChainStore> Clone for Chain<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            append_lock: Arc::clone(&self.append_lock),
        }
    }
}

impl<S: ChainStore> Chain<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            append_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Ensure a genesis block exists. Idempotent. Returns true if one was created.
    pub fn ensure_genesis(&self) -> Result<bool, ChainError> {
        let _guard = self.append_lock.lock();
        self.ensure_genesis_locked()
    }

    fn ensure_genesis_locked(&self) -> Result<bool, ChainError> {
        if self.store.count()? > 0 {
            return Ok(false);
        }
        let genesis = Block::genesis(now_secs())?;
        self.store
            .put_block(&genesis)
            .map_err(|source| ChainError::StoreWriteFailed { height: 0, source })?;
        info!(hash = %genesis.hash, "added genesis block");
        Ok(true)
    }

    /// Number of blocks in the chain.
    pub fn height(&self) -> Result<u64, ChainError> {
        Ok(self.store.count()?)
    }

    /// Return (height, tip_hash). Height is the block count; no hash when empty.
    pub fn tip(&self) -> Result<(u64, Option<String>), ChainError> {
        let height = self.store.count()?;
        if height == 0 {
            return Ok((0, None));
        }
        let tip = self.store.get_block(height - 1)?;
        Ok((height, tip.map(|b| b.hash)))
    }

    /// Seal `body` into a new block on top of the chain and persist it.
    pub fn append(&self, body: Body) -> Result<Block, ChainError> {
        let _guard = self.append_lock.lock();
        self.ensure_genesis_locked()?;

        let height = self.store.count()?;
        let previous = self
            .store
            .get_block(height - 1)?
            .ok_or(ChainError::PreviousBlockMissing(height - 1))?;

        let mut block = Block::new(body);
        if let Body::Claim(claim) = &mut block.body {
            claim.star.story_decoded = None;
        }
        block.height = height;
        block.time = now_secs();
        block.previous_block_hash = previous.hash;
        block.hash = block.compute_hash()?;

        self.store
            .put_block(&block)
            .map_err(|source| ChainError::StoreWriteFailed { height, source })?;
        info!(height, hash = %block.hash, "added new block");
        Ok(block)
    }

    pub fn get_block(&self, height: u64) -> Result<Block, ChainError> {
        self.store
            .get_block(height)?
            .ok_or(ChainError::NotFound(height))
    }

    pub fn get_block_by_hash(&self, hash: &str) -> Result<Option<Block>, ChainError> {
        if hash.len() != HASH_HEX_SIZE {
            debug!(hash, "lookup with malformed hash");
            return Ok(None);
        }
        Ok(self.store.find_by_hash(hash)?)
    }

    pub fn get_blocks_by_address(&self, address: &str) -> Result<Vec<Block>, ChainError> {
        Ok(self.store.find_by_address(address)?)
    }

    /// Recompute the hash of the block at `height` and compare it to the stored one.
    pub fn validate_block(&self, height: u64) -> Result<bool, ChainError> {
        let block = self.get_block(height)?;
        let valid = is_intact(&block)?;
        if !valid {
            warn!(height, hash = %block.hash, "block hash mismatch");
        }
        Ok(valid)
    }

    /// Check every block hash and every previous-hash link. All failures are
    /// collected into one report rather than stopping at the first.
    pub fn validate_chain(&self) -> Result<(), ChainError> {
        let height = self.store.count()?;
        let mut report = IntegrityReport::default();
        let mut previous: Option<Block> = None;

        for h in 0..height {
            let block = match self.store.get_block(h) {
                Ok(Some(block)) => block,
                Ok(None) => {
                    report.failures.push(IntegrityFailure {
                        height: h,
                        kind: FailureKind::Missing,
                    });
                    previous = None;
                    continue;
                }
                Err(err) => {
                    warn!(height = h, error = %err, "unreadable block record");
                    report.failures.push(IntegrityFailure {
                        height: h,
                        kind: FailureKind::Corrupt,
                    });
                    previous = None;
                    continue;
                }
            };
            if !is_intact(&block)? {
                report.failures.push(IntegrityFailure {
                    height: h,
                    kind: FailureKind::HashMismatch,
                });
            }
            if let Some(prev) = &previous {
                if block.previous_block_hash != prev.hash {
                    report.failures.push(IntegrityFailure {
                        height: h,
                        kind: FailureKind::BrokenLink,
                    });
                }
            }
            previous = Some(block);
        }

        if report.is_empty() {
            debug!(height, "no errors detected");
            Ok(())
        } else {
            warn!(errors = report.failures.len(), heights = ?report.heights(), "chain integrity failures");
            Err(ChainError::Integrity(report))
        }
    }

    /// Overwrite the stored block at `block.height` without resealing it.
    ///
    /// Testing only: exists to corrupt a chain so the integrity checks can be
    /// exercised.
    #[doc(hidden)]
    pub fn overwrite_block_unchecked(&self, block: &Block) -> Result<(), ChainError> {
        let _guard = self.append_lock.lock();
        warn!(height = block.height, "overwriting block without resealing");
        Ok(self.store.put_block(block)?)
    }
}

fn is_intact(block: &Block) -> Result<bool, ChainError> {
    Ok(block.compute_hash()? == block.hash)
}
