//! In-memory `ChainStore`, used by tests and benchmarks.
use crate::{chain::ChainStore, Block};
use anyhow::{bail, Result};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Default)]
pub struct MemoryStore {
    blocks: RwLock<BTreeMap<u64, Block>>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `put_block` fail until switched back off.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl ChainStore for MemoryStore {
    fn put_block(&self, block: &Block) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            bail!("write rejected for block #{}", block.height);
        }
        self.blocks.write().insert(block.height, block.clone());
        Ok(())
    }

    fn get_block(&self, height: u64) -> Result<Option<Block>> {
        Ok(self.blocks.read().get(&height).cloned())
    }

    fn count(&self) -> Result<u64> {
        Ok(self.blocks.read().len() as u64)
    }

    fn find_by_hash(&self, hash: &str) -> Result<Option<Block>> {
        Ok(self.blocks.read().values().find(|b| b.hash == hash).cloned())
    }

    fn find_by_address(&self, address: &str) -> Result<Vec<Block>> {
        Ok(self
            .blocks
            .read()
            .values()
            .filter(|b| b.body.address() == Some(address))
            .cloned()
            .collect())
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}
