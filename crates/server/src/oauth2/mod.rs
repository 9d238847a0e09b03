//! OAuth2 client credentials and token issuance.
//!
//! ## Supported grants
//!
//! - Client Credentials (client id + secret issued by `/oauth2/token/create`)
//! - Refresh Token (rotating)
//!
//! ## Endpoints
//!
//! - `GET /oauth2/authorize` - Bearer token validation
//! - `POST /oauth2/token/create` - Client rotation for the session user
//! - `GET|POST /oauth2/token` - Token endpoint

pub mod clients;
pub mod endpoints;
pub mod service;
pub mod state;
pub mod tokens;

pub use endpoints::router;
pub use state::{OAuth2Settings, OAuth2State};

/// OpenAPI tag for OAuth2 endpoints
pub const OAUTH2_TAG: &str = "OAuth2";
