pub mod config;
pub mod error;
pub mod registry;
pub mod routes;

pub use registry::{RegistryError, StarRegistry, StarSubmission};
pub use routes::router;
