use std::collections::BTreeMap;
use std::sync::Arc;

use oktaform_core::Schema;

use crate::error::ProvisionerError;
use crate::resource::Resource;
use crate::resources;

/// Resource kinds by type name.
#[derive(Clone, Default)]
pub struct Registry {
    resources: BTreeMap<&'static str, Arc<dyn Resource>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, resource: impl Resource + 'static) -> &mut Self {
        self.resources.insert(resource.type_name(), Arc::new(resource));
        self
    }

    /// Every resource kind the provider ships.
    pub fn okta() -> Self {
        let mut registry = Self::new();
        registry
            .register(resources::app_basic_auth::AppBasicAuth::new())
            .register(resources::app_saml::AppSaml::new())
            .register(resources::app_connection::AppConnection::new())
            .register(resources::app_group_assignment::AppGroupAssignment::new())
            .register(resources::user::UserResource::new())
            .register(resources::user_type::UserTypeResource::new())
            .register(resources::schema_property::SchemaProperty::user())
            .register(resources::schema_property::SchemaProperty::group())
            .register(resources::link_definition::LinkDefinitionResource::new())
            .register(resources::trusted_origin::TrustedOriginResource::new())
            .register(resources::network_zone::NetworkZoneResource::new())
            .register(resources::inline_hook::InlineHookResource::new())
            .register(resources::admin_role_custom::AdminRoleCustom::new())
            .register(resources::auth_server_scope::AuthServerScope::new())
            .register(resources::policy_rule_signon::PolicyRuleSignOn::new())
            .register(resources::policy_rules_signon::PolicyRulesSignOn::new());
        registry
    }

    pub fn get(&self, resource_type: &str) -> Result<&Arc<dyn Resource>, ProvisionerError> {
        self.resources.get(resource_type).ok_or_else(|| {
            ProvisionerError::PreconditionViolated(format!(
                "unsupported resource type \"{resource_type}\""
            ))
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Arc<dyn Resource>)> {
        self.resources.iter().map(|(name, r)| (*name, r))
    }

    pub fn schemas(&self) -> BTreeMap<&'static str, &Schema> {
        self.resources
            .iter()
            .map(|(name, r)| (*name, r.schema()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_is_registered_under_its_own_name() {
        let registry = Registry::okta();
        let names: Vec<&str> = registry.iter().map(|(n, _)| n).collect();
        assert_eq!(names.len(), 16);
        for (name, resource) in registry.iter() {
            assert_eq!(name, resource.type_name());
            assert!(name.starts_with("okta_"));
        }
    }

    #[test]
    fn unknown_type_is_a_precondition_failure() {
        let registry = Registry::okta();
        assert!(matches!(
            registry.get("okta_nope"),
            Err(ProvisionerError::PreconditionViolated(_))
        ));
    }
}
