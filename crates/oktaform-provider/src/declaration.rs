//! The declarations file: provider settings plus desired resources.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use oktaform_core::ResourceData;

use crate::addr::ResourceAddr;
use crate::error::ProvisionerError;
use crate::settings::{ProviderSettings, TimeoutOverrides};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Declarations {
    #[serde(default)]
    pub provider: ProviderSection,
    #[serde(default)]
    pub resources: Vec<ResourceDecl>,
}

/// Connection and runtime settings. Anything set here overrides the
/// corresponding environment variable.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub min_wait: Option<Duration>,
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub max_wait: Option<Duration>,
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<Duration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_parallel_requests: Option<usize>,
    #[serde(flatten)]
    pub settings: ProviderSettings,
}

impl std::fmt::Debug for ProviderSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSection")
            .field("org_name", &self.org_name)
            .field("base_url", &self.base_url)
            .field("endpoint", &self.endpoint)
            .field("api_token", &self.api_token.as_ref().map(|_| "****"))
            .field("client_id", &self.client_id)
            .field("private_key", &self.private_key.as_ref().map(|_| "****"))
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// One `resources` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDecl {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub name: String,
    #[serde(default)]
    pub attributes: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<ResourceAddr>,
    #[serde(default)]
    pub timeouts: TimeoutOverrides,
}

impl ResourceDecl {
    pub fn addr(&self) -> ResourceAddr {
        ResourceAddr::new(&self.resource_type, &self.name)
    }

    pub fn data(&self) -> ResourceData {
        ResourceData::from_attributes(self.attributes.clone())
    }
}

impl Declarations {
    pub fn load(path: &Path) -> Result<Self, ProvisionerError> {
        let bytes = std::fs::read(path)?;
        let decls: Self = serde_json::from_slice(&bytes)?;
        decls.check_addresses()?;
        tracing::debug!(path = %path.display(), resources = decls.resources.len(), "declarations loaded");
        Ok(decls)
    }

    pub fn find(&self, addr: &ResourceAddr) -> Option<&ResourceDecl> {
        self.resources.iter().find(|d| &d.addr() == addr)
    }

    /// Addresses are unique and every `depends_on` names a declared resource.
    pub fn check_addresses(&self) -> Result<(), ProvisionerError> {
        let mut seen = HashSet::new();
        for decl in &self.resources {
            if !seen.insert(decl.addr()) {
                return Err(ProvisionerError::PreconditionViolated(format!(
                    "duplicate resource address {}",
                    decl.addr()
                )));
            }
        }
        for decl in &self.resources {
            if let Some(missing) = decl.depends_on.iter().find(|d| !seen.contains(*d)) {
                return Err(ProvisionerError::PreconditionViolated(format!(
                    "{} depends on undeclared resource {missing}",
                    decl.addr()
                )));
            }
        }
        Ok(())
    }
}
