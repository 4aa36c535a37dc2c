pub mod chain;
pub mod constants;
pub mod memory;
pub mod story;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};

pub use chain::{Chain, ChainError, ChainStore, FailureKind, IntegrityFailure, IntegrityReport};
pub use story::{decode_story, encode_story, StoryError};

/// Seconds since the Unix epoch.
pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Lowercase hex SHA-256 digest of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Celestial coordinates and narrative of a registered star.
///
/// `story` always holds the hex-encoded narrative. `story_decoded` is only
/// filled in on the way out to a client and is never persisted.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Star {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub declination: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right_ascension: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub magnitude: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constellation: Option<String>,
    pub story: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub story_decoded: Option<String>,
}

/// A star claimed by a wallet address.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StarClaim {
    pub address: String,
    pub star: Star,
}

/// Block payload: the genesis marker or a star claim.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Body {
    Genesis(String),
    Claim(StarClaim),
}

impl Body {
    pub fn claim(&self) -> Option<&StarClaim> {
        match self {
            Body::Claim(claim) => Some(claim),
            Body::Genesis(_) => None,
        }
    }

    pub fn address(&self) -> Option<&str> {
        self.claim().map(|c| c.address.as_str())
    }
}

/// A ledger block.
///
/// Field order is significant: the JSON serialization of this struct, with
/// `hash` empty, is the preimage of `hash`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub hash: String,
    pub height: u64,
    pub body: Body,
    pub time: u64,
    pub previous_block_hash: String,
}

impl Block {
    /// An unsealed block carrying only `body`; the chain fills in the rest.
    pub fn new(body: Body) -> Self {
        Self {
            hash: String::new(),
            height: 0,
            body,
            time: 0,
            previous_block_hash: String::new(),
        }
    }

    /// The genesis block at height 0, hashed and ready to persist.
    pub fn genesis(time: u64) -> Result<Self, serde_json::Error> {
        let mut block = Block::new(Body::Genesis(constants::GENESIS_BODY.to_string()));
        block.time = time;
        block.hash = block.compute_hash()?;
        Ok(block)
    }

    pub fn is_genesis(&self) -> bool {
        self.height == 0 && matches!(self.body, Body::Genesis(_))
    }

    /// SHA-256 over the JSON form of this block with `hash` cleared.
    /// The block itself is left untouched.
    pub fn compute_hash(&self) -> Result<String, serde_json::Error> {
        let mut unsealed = self.clone();
        unsealed.hash.clear();
        Ok(sha256_hex(&serde_json::to_vec(&unsealed)?))
    }

    /// Fill in `storyDecoded` for presentation.
    pub fn with_decoded_story(mut self) -> Result<Self, StoryError> {
        if let Body::Claim(claim) = &mut self.body {
            claim.star.story_decoded = Some(decode_story(&claim.star.story)?);
        }
        Ok(self)
    }
}
