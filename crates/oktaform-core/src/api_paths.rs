//! REST path conventions.
//!
//! Pure string functions. These define the canonical layout of the
//! management API endpoints every resource talks to.

pub const APPS: &str = "/api/v1/apps";

pub fn app(id: &str) -> String {
    format!("/api/v1/apps/{id}")
}

pub fn app_lifecycle(id: &str, transition: &str) -> String {
    format!("/api/v1/apps/{id}/lifecycle/{transition}")
}

pub fn app_group(app_id: &str, group_id: &str) -> String {
    format!("/api/v1/apps/{app_id}/groups/{group_id}")
}

pub fn app_connection(app_id: &str) -> String {
    format!("/api/v1/apps/{app_id}/connections/default")
}

pub fn app_connection_lifecycle(app_id: &str, transition: &str) -> String {
    format!("/api/v1/apps/{app_id}/connections/default/lifecycle/{transition}")
}

pub const USERS: &str = "/api/v1/users";

pub fn user(id: &str) -> String {
    format!("/api/v1/users/{id}")
}

pub fn user_lifecycle(id: &str, transition: &str) -> String {
    format!("/api/v1/users/{id}/lifecycle/{transition}")
}

pub fn user_roles(id: &str) -> String {
    format!("/api/v1/users/{id}/roles")
}

pub const USER_TYPES: &str = "/api/v1/meta/types/user";

pub fn user_type(id: &str) -> String {
    format!("/api/v1/meta/types/user/{id}")
}

/// User profile schema. `schema_id` is `default` or the custom user type's schema ID.
pub fn user_schema(schema_id: &str) -> String {
    format!("/api/v1/meta/schemas/user/{schema_id}")
}

pub const GROUP_SCHEMA: &str = "/api/v1/meta/schemas/group/default";

pub const LINKED_OBJECTS: &str = "/api/v1/meta/schemas/user/linkedObjects";

pub fn linked_object(primary_name: &str) -> String {
    format!("/api/v1/meta/schemas/user/linkedObjects/{primary_name}")
}

pub const ZONES: &str = "/api/v1/zones";

pub fn zone(id: &str) -> String {
    format!("/api/v1/zones/{id}")
}

pub fn zone_lifecycle(id: &str, transition: &str) -> String {
    format!("/api/v1/zones/{id}/lifecycle/{transition}")
}

pub const TRUSTED_ORIGINS: &str = "/api/v1/trustedOrigins";

pub fn trusted_origin(id: &str) -> String {
    format!("/api/v1/trustedOrigins/{id}")
}

pub fn trusted_origin_lifecycle(id: &str, transition: &str) -> String {
    format!("/api/v1/trustedOrigins/{id}/lifecycle/{transition}")
}

pub const INLINE_HOOKS: &str = "/api/v1/inlineHooks";

pub fn inline_hook(id: &str) -> String {
    format!("/api/v1/inlineHooks/{id}")
}

pub fn inline_hook_lifecycle(id: &str, transition: &str) -> String {
    format!("/api/v1/inlineHooks/{id}/lifecycle/{transition}")
}

pub const ADMIN_ROLES: &str = "/api/v1/iam/roles";

pub fn admin_role(id: &str) -> String {
    format!("/api/v1/iam/roles/{id}")
}

pub fn admin_role_permissions(id: &str) -> String {
    format!("/api/v1/iam/roles/{id}/permissions")
}

pub fn admin_role_permission(id: &str, permission: &str) -> String {
    format!("/api/v1/iam/roles/{id}/permissions/{permission}")
}

pub fn auth_server_scopes(auth_server_id: &str) -> String {
    format!("/api/v1/authorizationServers/{auth_server_id}/scopes")
}

pub fn auth_server_scope(auth_server_id: &str, id: &str) -> String {
    format!("/api/v1/authorizationServers/{auth_server_id}/scopes/{id}")
}

pub fn policy_rules(policy_id: &str) -> String {
    format!("/api/v1/policies/{policy_id}/rules")
}

pub fn policy_rule(policy_id: &str, rule_id: &str) -> String {
    format!("/api/v1/policies/{policy_id}/rules/{rule_id}")
}

pub fn policy_rule_lifecycle(policy_id: &str, rule_id: &str, transition: &str) -> String {
    format!("/api/v1/policies/{policy_id}/rules/{rule_id}/lifecycle/{transition}")
}

pub const TOKEN: &str = "/oauth2/v1/token";
