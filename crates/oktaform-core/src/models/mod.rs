//! Wire models for the platform's management API.
//!
//! Field names follow the API's camelCase JSON; optional fields are
//! skipped on write so PUT/POST bodies only carry what was declared.

pub mod admin_role;
pub mod app;
pub mod app_connection;
pub mod auth_server_scope;
pub mod inline_hook;
pub mod link_definition;
pub mod network_zone;
pub mod policy_rule;
pub mod schema_property;
pub mod trusted_origin;
pub mod user;
pub mod user_type;
