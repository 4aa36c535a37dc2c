//! HTTP routes.
//!
//! | Method | Path | |
//! |---|---|---|
//! | GET | `/stars/hash/{hash}` | star block by hash |
//! | GET | `/stars/address/{address}` | every star of a wallet |
//! | GET | `/block/{height}` | block by height |
//! | POST | `/block` | register a star (needs a license) |
//! | POST | `/requestValidation` | open a validation request |
//! | POST | `/message-signature/validate` | sign the request, obtain a license |
use crate::error::{ApiError, FieldError};
use crate::registry::{StarRegistry, StarSubmission};
use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use registry_core::{Block, ChainError, ChainStore, IntegrityFailure};
use registry_mempool::{SignatureVerdict, ValidationRequest};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

#[derive(Serialize)]
struct Head {
    height: u64,
    hash: Option<String>,
}

#[derive(Serialize)]
struct Validity {
    valid: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    failures: Vec<IntegrityFailure>,
}

#[derive(Serialize)]
struct Stars {
    stars: Vec<Block>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StarIn {
    pub declination: Option<String>,
    pub right_ascension: Option<String>,
    pub magnitude: Option<String>,
    pub constellation: Option<String>,
    pub story: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ClaimIn {
    pub address: Option<String>,
    pub star: Option<StarIn>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AddressIn {
    pub address: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SignatureIn {
    pub address: Option<String>,
    pub signature: Option<String>,
}

pub fn router<S: ChainStore + 'static>(registry: StarRegistry<S>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/chain/head", get(chain_head::<S>))
        .route("/chain/validate", get(chain_validate::<S>))
        .route("/stars/hash/{hash}", get(star_by_hash::<S>))
        .route("/stars/address/{address}", get(stars_by_address::<S>))
        .route("/block/{height}", get(block_by_height::<S>))
        .route("/block", post(post_block::<S>))
        .route("/requestValidation", post(request_validation::<S>))
        .route("/message-signature/validate", post(validate_signature::<S>))
        .layer(TraceLayer::new_for_http())
        .with_state(registry)
}

async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

async fn chain_head<S: ChainStore + 'static>(
    State(registry): State<StarRegistry<S>>,
) -> Result<Json<Head>, ApiError> {
    let (height, hash) = registry.chain().tip()?;
    Ok(Json(Head { height, hash }))
}

async fn chain_validate<S: ChainStore + 'static>(
    State(registry): State<StarRegistry<S>>,
) -> Result<Json<Validity>, ApiError> {
    match registry.chain().validate_chain() {
        Ok(()) => Ok(Json(Validity {
            valid: true,
            failures: Vec::new(),
        })),
        Err(ChainError::Integrity(report)) => Ok(Json(Validity {
            valid: false,
            failures: report.failures,
        })),
        Err(err) => Err(err.into()),
    }
}

async fn star_by_hash<S: ChainStore + 'static>(
    State(registry): State<StarRegistry<S>>,
    Path(hash): Path<String>,
) -> Result<Json<Block>, ApiError> {
    registry
        .star_by_hash(&hash)?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

async fn stars_by_address<S: ChainStore + 'static>(
    State(registry): State<StarRegistry<S>>,
    Path(address): Path<String>,
) -> Result<Json<Stars>, ApiError> {
    Ok(Json(Stars {
        stars: registry.stars_by_address(&address)?,
    }))
}

async fn block_by_height<S: ChainStore + 'static>(
    State(registry): State<StarRegistry<S>>,
    Path(height): Path<u64>,
) -> Result<Json<Block>, ApiError> {
    Ok(Json(registry.block_at(height)?))
}

async fn post_block<S: ChainStore + 'static>(
    State(registry): State<StarRegistry<S>>,
    Json(claim): Json<ClaimIn>,
) -> Result<Json<Block>, ApiError> {
    let (address, star) = match (claim.address, claim.star) {
        (Some(address), Some(star)) => (address, star),
        (address, star) => {
            let mut errors = Vec::new();
            if address.is_none() {
                errors.push(FieldError::missing("address"));
            }
            if star.is_none() {
                errors.push(FieldError::missing("star"));
            }
            return Err(ApiError::Validation(errors));
        }
    };
    let Some(story) = star.story else {
        return Err(ApiError::Validation(vec![FieldError::missing("star.story")]));
    };
    let submission = StarSubmission {
        declination: star.declination,
        right_ascension: star.right_ascension,
        magnitude: star.magnitude,
        constellation: star.constellation,
        story,
    };
    Ok(Json(registry.submit_claim(&address, submission)?))
}

async fn request_validation<S: ChainStore + 'static>(
    State(registry): State<StarRegistry<S>>,
    Json(body): Json<AddressIn>,
) -> Result<Json<ValidationRequest>, ApiError> {
    let address = body
        .address
        .ok_or_else(|| ApiError::Validation(vec![FieldError::missing("address")]))?;
    Ok(Json(registry.request_validation(&address)))
}

async fn validate_signature<S: ChainStore + 'static>(
    State(registry): State<StarRegistry<S>>,
    Json(body): Json<SignatureIn>,
) -> Result<Json<SignatureVerdict>, ApiError> {
    let (address, signature) = match (body.address, body.signature) {
        (Some(address), Some(signature)) => (address, signature),
        (address, signature) => {
            let mut errors = Vec::new();
            if address.is_none() {
                errors.push(FieldError::missing("address"));
            }
            if signature.is_none() {
                errors.push(FieldError::missing("signature"));
            }
            return Err(ApiError::Validation(errors));
        }
    };
    Ok(Json(registry.validate_signature(&address, &signature)))
}
