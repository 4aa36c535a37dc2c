use anyhow::{Context, Result};
use registry_core::{Block, ChainStore};
use sled::{Db, IVec, Tree};
use std::path::Path;
use tracing::{debug, info};

const TREE_BLOCKS: &str = "blocks";

/// Sled-backed block store: one `blocks` tree keyed by big-endian height,
/// values are the JSON-serialized blocks.
#[derive(Clone)]
pub struct SledStore {
  db: Db,
  blocks: Tree,
}

impl SledStore {
  pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
    let db = sled::open(path).context("open sled database")?;
    let blocks = db.open_tree(TREE_BLOCKS).context("open blocks tree")?;
    info!(blocks = blocks.len(), "sled store opened");
    Ok(Self { db, blocks })
  }

  /// Drop every stored block.
  pub fn clear(&self) -> Result<()> {
    self.blocks.clear()?;
    self.db.flush()?;
    Ok(())
  }

  fn decode(height_key: &[u8], value: &IVec) -> Result<Block> {
    serde_json::from_slice(value)
      .with_context(|| format!("corrupt block record under key {height_key:?}"))
  }

  fn scan<F>(&self, mut keep: F) -> Result<Vec<Block>>
  where
    F: FnMut(&Block) -> bool,
  {
    let mut found = Vec::new();
    for entry in self.blocks.iter() {
      let (key, value) = entry?;
      let block = Self::decode(&key, &value)?;
      if keep(&block) {
        found.push(block);
      }
    }
    Ok(found)
  }
}

impl ChainStore for SledStore {
  fn put_block(&self, block: &Block) -> Result<()> {
    let key = block.height.to_be_bytes();
    let bytes = serde_json::to_vec(block)?;
    self.blocks.insert(key, bytes)?;
    self.blocks.flush()?;
    debug!(height = block.height, "block persisted");
    Ok(())
  }

  fn get_block(&self, height: u64) -> Result<Option<Block>> {
    let key = height.to_be_bytes();
    self
      .blocks
      .get(key)?
      .map(|ivec| Self::decode(&key, &ivec))
      .transpose()
  }

  fn count(&self) -> Result<u64> {
    Ok(self.blocks.len() as u64)
  }

  fn find_by_hash(&self, hash: &str) -> Result<Option<Block>> {
    for entry in self.blocks.iter() {
      let (key, value) = entry?;
      let block = Self::decode(&key, &value)?;
      if block.hash == hash {
        return Ok(Some(block));
      }
    }
    Ok(None)
  }

  fn find_by_address(&self, address: &str) -> Result<Vec<Block>> {
    self.scan(|block| block.body.address() == Some(address))
  }

  fn close(&self) -> Result<()> {
    self.db.flush()?;
    Ok(())
  }
}
