//! Star registration: the only path that writes claims to the chain.
use parking_lot::Mutex;
use registry_core::{encode_story, Block, Body, Chain, ChainError, ChainStore, Star, StarClaim, StoryError};
use registry_mempool::{Mempool, SignatureVerdict, ValidationRequest};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("wallet address is not valid")]
    Unauthorized,
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error("stored story cannot be decoded: {0}")]
    Story(#[from] StoryError),
}

/// A star as submitted by a wallet, story still in plain text.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StarSubmission {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub declination: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right_ascension: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub magnitude: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constellation: Option<String>,
    pub story: String,
}

impl StarSubmission {
    fn into_star(self) -> Star {
        Star {
            declination: self.declination,
            right_ascension: self.right_ascension,
            magnitude: self.magnitude,
            constellation: self.constellation,
            story: encode_story(&self.story),
            story_decoded: None,
        }
    }
}

/// Ties the chain to the mempool: a claim is appended only while its wallet
/// holds a valid license, and a successful append consumes that license.
pub struct StarRegistry<S: ChainStore> {
    chain: Chain<S>,
    mempool: Mempool,
    claim_lock: Arc<Mutex<()>>,
}

impl<S: ChainStore> Clone for StarRegistry<S> {
    fn clone(&self) -> Self {
        Self {
            chain: self.chain.clone(),
            mempool: self.mempool.clone(),
            claim_lock: Arc::clone(&self.claim_lock),
        }
    }
}

impl<S: ChainStore> StarRegistry<S> {
    pub fn new(chain: Chain<S>, mempool: Mempool) -> Self {
        Self {
            chain,
            mempool,
            claim_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn chain(&self) -> &Chain<S> {
        &self.chain
    }

    pub fn mempool(&self) -> &Mempool {
        &self.mempool
    }

    pub fn request_validation(&self, address: &str) -> ValidationRequest {
        self.mempool.request_validation(address)
    }

    pub fn validate_signature(&self, address: &str, signature: &str) -> SignatureVerdict {
        self.mempool.validate_signature(address, signature)
    }

    /// Append `star` for `address` and consume the address's license.
    ///
    /// The license check, the append and the consumption happen under one
    /// lock, so a license never authorizes more than one block. If the append
    /// fails the license is left in place.
    pub fn submit_claim(&self, address: &str, star: StarSubmission) -> Result<Block, RegistryError> {
        let _guard = self.claim_lock.lock();
        let Some(ticket) = self.mempool.valid_license(address) else {
            debug!(address, "claim without a valid license");
            return Err(RegistryError::Unauthorized);
        };
        let body = Body::Claim(StarClaim {
            address: address.to_string(),
            star: star.into_star(),
        });
        let block = self.chain.append(body)?;
        self.mempool.consume_license_if(address, ticket);
        info!(address, height = block.height, "star registered");
        Ok(block.with_decoded_story()?)
    }

    pub fn star_by_hash(&self, hash: &str) -> Result<Option<Block>, RegistryError> {
        match self.chain.get_block_by_hash(hash)? {
            Some(block) => Ok(Some(block.with_decoded_story()?)),
            None => Ok(None),
        }
    }

    pub fn stars_by_address(&self, address: &str) -> Result<Vec<Block>, RegistryError> {
        self.chain
            .get_blocks_by_address(address)?
            .into_iter()
            .map(|block| block.with_decoded_story().map_err(RegistryError::from))
            .collect()
    }

    pub fn block_at(&self, height: u64) -> Result<Block, RegistryError> {
        Ok(self.chain.get_block(height)?.with_decoded_story()?)
    }
}
