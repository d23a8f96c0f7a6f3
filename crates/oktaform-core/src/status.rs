use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Observable lifecycle status of a remote entity.
///
/// Apps, zones, hooks, rules and origins only use `Active` / `Inactive`.
/// Users move through the wider set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleStatus {
    Active,
    Inactive,
    Staged,
    Provisioned,
    Suspended,
    Deprovisioned,
    Recovery,
    LockedOut,
    PasswordExpired,
}

impl LifecycleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Inactive => "INACTIVE",
            Self::Staged => "STAGED",
            Self::Provisioned => "PROVISIONED",
            Self::Suspended => "SUSPENDED",
            Self::Deprovisioned => "DEPROVISIONED",
            Self::Recovery => "RECOVERY",
            Self::LockedOut => "LOCKED_OUT",
            Self::PasswordExpired => "PASSWORD_EXPIRED",
        }
    }

    /// Status as declared. `PROVISIONED`, `RECOVERY`, `LOCKED_OUT` and
    /// `PASSWORD_EXPIRED` are credential states of an activated account,
    /// not statuses a declaration can ask for, so they read as `Active`.
    pub fn settled(self) -> Self {
        match self {
            Self::Provisioned | Self::Recovery | Self::LockedOut | Self::PasswordExpired => {
                Self::Active
            }
            other => other,
        }
    }
}

impl fmt::Display for LifecycleStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LifecycleStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(Self::Active),
            "INACTIVE" => Ok(Self::Inactive),
            "STAGED" => Ok(Self::Staged),
            "PROVISIONED" => Ok(Self::Provisioned),
            "SUSPENDED" => Ok(Self::Suspended),
            "DEPROVISIONED" => Ok(Self::Deprovisioned),
            "RECOVERY" => Ok(Self::Recovery),
            "LOCKED_OUT" => Ok(Self::LockedOut),
            "PASSWORD_EXPIRED" => Ok(Self::PasswordExpired),
            other => Err(CoreError::UnknownStatus(other.to_string())),
        }
    }
}

/// Allowed `status` values for resources with a binary lifecycle.
pub const BINARY_STATUSES: &[&str] = &["ACTIVE", "INACTIVE"];
