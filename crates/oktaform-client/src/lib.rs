//! oktaform-client
//!
//! Authenticated REST client for the identity platform's management API.
//! Handles credentials (static API token or private-key JWT), the
//! process-wide cap on in-flight requests, transparent 429 backoff,
//! pagination and cooperative cancellation. Resources consume it as an
//! opaque collaborator.

pub mod auth;
pub mod client;
pub mod config;
pub mod error;

pub use crate::client::{ApiRequest, ApiResponse, OktaClient};
pub use crate::config::{ClientConfig, Credentials};
pub use crate::error::{ApiErrorBody, ClientError};
