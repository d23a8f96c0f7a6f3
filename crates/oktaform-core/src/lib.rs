//! oktaform-core
//!
//! Pure domain vocabulary shared by the client, the provider and the CLI:
//! attribute schemas, resource data, lifecycle statuses, platform wire
//! models and REST path conventions. No HTTP dependency.

pub mod api_paths;
pub mod data;
pub mod error;
pub mod import_id;
pub mod models;
pub mod permissions;
pub mod schema;
pub mod shape;
pub mod status;

pub use crate::data::ResourceData;
pub use crate::error::CoreError;
pub use crate::schema::{AttrMode, AttrType, Attribute, AttributeChange, Schema};
pub use crate::status::LifecycleStatus;
