//! In-memory simulator of the Volume Purchase Program service.
//!
//! Serves the bootstrap document and every operation `vpp-client` dispatches
//! to, against a single in-memory account seeded with a few products. Used
//! for local development and for end-to-end tests of the client; data is
//! lost on restart.

pub mod routes;
pub mod store;

pub use routes::router;
pub use store::{AppState, SeedAsset, SimConfig};
